/*
 * @file gf2.rs
 *
 * Incremental GF(2) linear solver used by the per-partition hash search.
 * Each key contributes six parity equations at once: <mask[j], key> = bit j
 * of a 6-bit target code.  The solver keeps the equations in reduced
 * row-echelon form so that adding a key is O(rows) word operations and the
 * six masks can be read straight out of the echelon basis.
 */

/** Number of code bits produced per key; a partition never exceeds 2^6 keys. */
pub const CODE_BITS: usize = 6;

/** Maximum keys per partition. */
pub const MAX_SET: usize = 1 << CODE_BITS;

/** Parity of a 64-bit word: 1 if an odd number of bits are set, else 0. */
#[inline(always)]
pub fn parity(x: u64) -> u64 {
    (x.count_ones() & 1) as u64
}

/** Mask of the highest set bit.  Caller guarantees `x != 0`. */
#[inline(always)]
fn pivot_bit(x: u64) -> u64 {
    1u64 << (63 - x.leading_zeros())
}

/** One reduced equation: a key combination and the XOR of its target codes. */
#[derive(Clone, Copy)]
struct Row {
    key: u64,
    code: u8,
}

/**
 * A system of parity constraints over GF(2)^64 with 6-bit augmentation.
 *
 * Invariant: every stored row has a distinct pivot (its highest set bit),
 * and no row has any other row's pivot set, i.e. the rows form a reduced
 * row-echelon basis of the constraints accepted so far.
 */
pub struct CodeSystem {
    rows: Vec<Row>,
}

impl CodeSystem {
    pub fn new() -> Self {
        CodeSystem { rows: Vec::with_capacity(MAX_SET) }
    }

    /**
     * Require `parity(mask[j] & key) == bit j of code` for all six masks.
     *
     * Returns `false` if the new constraint contradicts the ones already
     * accepted (the key is a GF(2) combination of earlier keys whose codes
     * XOR to something else).  A redundant but consistent constraint is
     * accepted without growing the system.
     */
    pub fn constrain(&mut self, key: u64, code: u8) -> bool {
        let (mut k, mut c) = (key, code);
        for row in &self.rows {
            if k & pivot_bit(row.key) != 0 {
                k ^= row.key;
                c ^= row.code;
            }
        }
        if k == 0 {
            return c == 0;
        }
        /* Back-substitute to keep the basis fully reduced. */
        let p = pivot_bit(k);
        for row in &mut self.rows {
            if row.key & p != 0 {
                row.key ^= k;
                row.code ^= c;
            }
        }
        self.rows.push(Row { key: k, code: c });
        true
    }

    /**
     * Read the six masks out of the echelon basis, free coordinates zero.
     *
     * Because each row is zero at every other row's pivot, setting bit
     * `pivot(row)` of `mask[j]` to bit j of the row's code satisfies every
     * accepted constraint exactly.
     */
    pub fn solve(&self) -> [u64; CODE_BITS] {
        let mut masks = [0u64; CODE_BITS];
        for row in &self.rows {
            let p = pivot_bit(row.key);
            for (j, mask) in masks.iter_mut().enumerate() {
                if row.code >> j & 1 != 0 {
                    *mask |= p;
                }
            }
        }
        masks
    }
}

/**
 * Echelon basis of bare keys, tracking which input positions combine into
 * each row.  Used to discover a partition's GF(2) dependencies before any
 * target codes are chosen: a dependent key's code is forced to the XOR of
 * its support's codes, so the caller wants the support spelled out.
 */
pub struct KeyBasis {
    rows: Vec<(u64, u64)>, /* (reduced key, source-position mask) */
}

impl KeyBasis {
    pub fn new() -> Self {
        KeyBasis { rows: Vec::with_capacity(MAX_SET) }
    }

    /**
     * Insert the key at input position `position` (< 64).  Returns `None`
     * if the key is independent of everything inserted so far, otherwise
     * the mask of earlier positions whose keys XOR to it (empty for a
     * zero key).
     */
    pub fn insert(&mut self, position: usize, key: u64) -> Option<u64> {
        let (mut k, mut srcs) = (key, 1u64 << position);
        for &(row, row_srcs) in &self.rows {
            if k & pivot_bit(row) != 0 {
                k ^= row;
                srcs ^= row_srcs;
            }
        }
        if k == 0 {
            return Some(srcs ^ 1 << position);
        }
        let p = pivot_bit(k);
        for (row, row_srcs) in &mut self.rows {
            if *row & p != 0 {
                *row ^= k;
                *row_srcs ^= srcs;
            }
        }
        self.rows.push((k, srcs));
        None
    }
}
