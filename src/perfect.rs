/*
 * @file perfect.rs
 *
 * The perfect-hash structure itself: test-bit partition search on the
 * outside, per-partition GF(2) linear-map search on the inside, and the
 * table-free O(1) lookup that both searches exist to serve.
 */

use crate::gf2::{parity, CodeSystem, KeyBasis, CODE_BITS, MAX_SET};
use bincode::{Decode, Encode};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/** Maximum number of test bits used to partition the key set. */
const TEST_BITS: usize = 2;

/** Maximum number of partitions (2^TEST_BITS). */
const MAX_SETS: usize = 1 << TEST_BITS;

/** Hard ceiling on the key-set size: 4 partitions of at most 64 keys. */
pub const MAX_KEYS: usize = MAX_SETS * MAX_SET;

/**
 * Recommended bincode configuration for serializing these structures.
 * Fixed at the default standard config so the wire format is stable.
 */
pub const STD_BINCODE_CONFIG: bincode::config::Configuration = bincode::config::standard();

/** Why a build failed.  Lookup itself has no error path. */
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BuildError {
    /// The input holds more keys than 2 test bits and 64-slot partitions
    /// can ever accommodate (4 * 64 = 256).
    #[error("key set of {0} keys exceeds the 256-key ceiling")]
    KeySetTooLarge(usize),

    /// The same key appears twice in the input.  A perfect hash cannot give
    /// both occurrences distinct slots, so this is rejected up front rather
    /// than left as a silent aliased mapping.
    #[error("duplicate key {0:#018x} in input")]
    DuplicateKey(u64),

    /// No test-bit combination yielded solvable partitions within the
    /// search budgets.  Vanishingly rare for well-distributed keys; supply
    /// a different (for example re-hashed) key set and rebuild.
    #[error("no injective partition and mask assignment found for this key set")]
    Exhausted,
}

/**
 * Build knobs.  Implements `Default`, so `BuildOptions::default()` gives
 * reasonable settings.
 */
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BuildOptions {
    /**
     * How many hash keys to try when building a [`KeyedIndex`](crate::KeyedIndex).
     *
     * Each attempt hashes the keys under a fresh SipHash key, so a chance
     * 64-bit collision or an unsolvable hashed set is simply re-rolled.
     * Ignored by [`PerfectIndex::build`], which gets its keys as-is.
     *
     * Default: 8.
     */
    pub max_tries: usize,

    /**
     * How many target-code assignments to try per partition before the
     * outer search moves on to the next test-bit combination.
     *
     * Only consulted for partitions whose keys are linearly dependent
     * over GF(2): dependent keys have their codes forced, and an attempt
     * is abandoned when a forced code collides with an assigned one.
     * Independent partitions solve on the first assignment, always.
     *
     * Default: 64.
     */
    pub code_trials: usize,

    /**
     * Optional seed to make construction deterministic.  If omitted, the
     * retry shuffles (and the hash keys of a
     * [`KeyedIndex`](crate::KeyedIndex)) are drawn from OS entropy.
     *
     * Default: `None`.
     */
    pub seed: Option<u64>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions { max_tries: 8, code_trials: 64, seed: None }
    }
}

pub(crate) fn rng_from_options(options: &BuildOptions) -> StdRng {
    match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/**
 * A perfect hash over a small fixed set of 64-bit keys.
 *
 * Construction picks 0-2 single-bit masks ("test bits") splitting the key
 * set into at most 4 partitions of at most 64 keys, then finds 6 masks per
 * partition whose parity bits give every key in that partition a distinct
 * 6-bit code.  A lookup is the 2 test-bit probes plus 6 AND+popcount rounds;
 * there is no table to cache-miss on.
 *
 * For every key present at build time, [`index`](Self::index) returns a
 * distinct value below [`table_size`](Self::table_size).  Keys that were
 * *not* present still map somewhere in range and may alias a real key's
 * slot; the structure stores nothing to detect this.
 *
 * The structure is immutable after construction, so `&PerfectIndex` lookups
 * are safe from any number of threads.
 */
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct PerfectIndex {
    /** Single-bit partition masks; zero means the slot is unused. */
    test_bits: [u64; TEST_BITS],

    /** Six parity masks per partition. */
    sets: [[u64; CODE_BITS]; MAX_SETS],

    /** Number of test bits in use, 0..=2. */
    tested: u8,
}

/** Which partition a key belongs to, per the test-bit masks. */
#[inline(always)]
fn selector(test_bits: &[u64; TEST_BITS], key: u64) -> usize {
    let mut sel = 0;
    let mut bit = 1;
    for &mask in test_bits {
        if key & mask != 0 {
            sel |= bit;
        }
        bit <<= 1;
    }
    sel
}

impl PerfectIndex {
    /** Build with default [`BuildOptions`]. */
    pub fn new(keys: &[u64]) -> Result<Self, BuildError> {
        Self::build(keys, &BuildOptions::default())
    }

    /**
     * Build a perfect hash for `keys`.
     *
     * The keys must be distinct and there may be at most 256 of them; they
     * are assumed to be well distributed over all 64 bits (hash anything
     * that isn't, or use [`KeyedIndex`](crate::KeyedIndex)).  The input
     * slice is never mutated; all search scratch is local to this call.
     *
     * Key sets of at most 64 keys are first attempted with zero test bits
     * (table size 64), falling back to 1 and then 2 test bits only if the
     * single-partition search fails.  Larger sets start at the smallest
     * test-bit count whose partitions can hold them.
     */
    pub fn build(keys: &[u64], options: &BuildOptions) -> Result<Self, BuildError> {
        if keys.len() > MAX_KEYS {
            return Err(BuildError::KeySetTooLarge(keys.len()));
        }
        let mut sorted = keys.to_vec();
        sorted.sort_unstable();
        for pair in sorted.windows(2) {
            if pair[0] == pair[1] {
                return Err(BuildError::DuplicateKey(pair[0]));
            }
        }

        let mut rng = rng_from_options(options);
        let first_tier = match keys.len() {
            0..=64 => 0,
            65..=128 => 1,
            _ => 2,
        };
        for tested in first_tier..=TEST_BITS as u8 {
            if let Some(built) = Self::search(keys, tested, options.code_trials, &mut rng) {
                return Ok(built);
            }
        }
        Err(BuildError::Exhausted)
    }

    /**
     * Enumerate test-bit combinations for a fixed test-bit count and accept
     * the first one whose partitions all solve.  First-found wins: balance
     * beyond the 64-key partition cap is not optimized for, which keeps the
     * search deterministic for a fixed seed.
     */
    fn search(keys: &[u64], tested: u8, trials: usize, rng: &mut StdRng) -> Option<Self> {
        match tested {
            0 => Self::try_bits(keys, [0, 0], 0, trials, rng),
            1 => {
                for b0 in 0..64 {
                    let built = Self::try_bits(keys, [1 << b0, 0], 1, trials, rng);
                    if built.is_some() {
                        return built;
                    }
                }
                None
            }
            _ => {
                for b0 in 0..63 {
                    for b1 in b0 + 1..64 {
                        let built = Self::try_bits(keys, [1 << b0, 1 << b1], 2, trials, rng);
                        if built.is_some() {
                            return built;
                        }
                    }
                }
                None
            }
        }
    }

    /**
     * Partition `keys` by one candidate set of test bits and run the
     * per-partition mask search.  Rejects immediately, without touching the
     * inner search, if any partition overflows its 64 slots.
     */
    fn try_bits(
        keys: &[u64],
        test_bits: [u64; TEST_BITS],
        tested: u8,
        trials: usize,
        rng: &mut StdRng,
    ) -> Option<Self> {
        let mut groups: [Vec<u64>; MAX_SETS] = Default::default();
        for &key in keys {
            groups[selector(&test_bits, key)].push(key);
        }
        if groups.iter().any(|group| group.len() > MAX_SET) {
            return None;
        }

        /* Unused selector values get empty groups and all-zero masks. */
        let mut sets = [[0u64; CODE_BITS]; MAX_SETS];
        for (set, group) in sets.iter_mut().zip(&groups) {
            *set = solve_set(group, trials, rng)?;
        }
        Some(PerfectIndex { test_bits, sets, tested })
    }

    /**
     * The unique index of `key`, below [`table_size`](Self::table_size).
     *
     * Unique only for keys supplied at build time; any other key maps to an
     * arbitrary in-range value.  Constant time, no side effects.
     */
    #[inline]
    pub fn index(&self, key: u64) -> usize {
        let sel = selector(&self.test_bits, key);
        let mut idx = sel << CODE_BITS;
        for (i, &mask) in self.sets[sel].iter().enumerate() {
            idx |= (parity(mask & key) as usize) << i;
        }
        idx
    }

    /** Size of the lookup table this structure indexes into: 64, 128 or 256. */
    #[inline]
    pub fn table_size(&self) -> usize {
        MAX_SET << self.tested
    }
}

/**
 * Find 6 masks whose parity code is injective over one partition.
 *
 * Every key is assigned a distinct 6-bit target code and the resulting
 * linear system is solved by elimination; injectivity then holds by
 * construction.  If the partition's keys are linearly independent over
 * GF(2) (the common case for well-distributed keys) any distinct codes
 * will do and the input-order assignment is installed directly.
 *
 * A dependent key has no freedom: its code is forced to the XOR of the
 * codes of the independent keys it combines ("its support").  So each
 * attempt assigns the supports first from a shuffled pool, takes the
 * forced codes as they come, and starts over with a fresh shuffle when a
 * forced code lands on a slot some other key already holds, up to
 * `trials` attempts in total.
 */
fn solve_set(keys: &[u64], trials: usize, rng: &mut StdRng) -> Option<[u64; CODE_BITS]> {
    debug_assert!(keys.len() <= MAX_SET);

    /* The dependency structure is fixed by the keys; find it once. */
    let mut basis = KeyBasis::new();
    let mut deps = Vec::new();
    for (i, &key) in keys.iter().enumerate() {
        if let Some(support) = basis.insert(i, key) {
            deps.push((i, support));
        }
    }

    if deps.is_empty() {
        let codes: Vec<u8> = (0..keys.len() as u8).collect();
        return Some(install(keys, &codes));
    }

    let mut pool: Vec<u8> = (0..MAX_SET as u8).collect();
    let mut codes = vec![0u8; keys.len()];
    'attempt: for _ in 0..trials {
        pool.shuffle(rng);
        let (mut at, mut used, mut assigned) = (0usize, 0u64, 0u64);
        for &(dep, support) in &deps {
            let mut forced = 0u8;
            let mut rest = support;
            while rest != 0 {
                let i = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                if assigned >> i & 1 == 0 {
                    codes[i] = next_free(&pool, &mut at, used);
                    used |= 1u64 << codes[i];
                    assigned |= 1 << i;
                }
                forced ^= codes[i];
            }
            if used >> forced & 1 != 0 {
                continue 'attempt;
            }
            codes[dep] = forced;
            used |= 1u64 << forced;
            assigned |= 1 << dep;
        }
        for i in 0..keys.len() {
            if assigned >> i & 1 == 0 {
                codes[i] = next_free(&pool, &mut at, used);
                used |= 1u64 << codes[i];
            }
        }
        return Some(install(keys, &codes));
    }
    None
}

/** Next code from the shuffled pool that no key holds yet. */
fn next_free(pool: &[u8], at: &mut usize, used: u64) -> u8 {
    loop {
        let code = pool[*at];
        *at += 1;
        if used >> code & 1 == 0 {
            return code;
        }
    }
}

/**
 * Read the masks for a finished assignment.  The codes are distinct and
 * honor every dependency, so elimination cannot hit an inconsistency.
 */
fn install(keys: &[u64], codes: &[u8]) -> [u64; CODE_BITS] {
    let mut system = CodeSystem::new();
    for (&key, &code) in keys.iter().zip(codes) {
        let consistent = system.constrain(key, code);
        debug_assert!(consistent);
    }
    system.solve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{thread_rng, Rng};

    fn random_keys(n: usize) -> Vec<u64> {
        let mut rng = thread_rng();
        (0..n).map(|_| rng.gen::<u64>()).collect()
    }

    fn assert_injective(built: &PerfectIndex, keys: &[u64]) {
        let size = built.table_size();
        let mut seen = vec![false; size];
        for &key in keys {
            let idx = built.index(key);
            assert!(idx < size, "index {} out of range {}", idx, size);
            assert!(!seen[idx], "slot {} assigned twice", idx);
            seen[idx] = true;
        }
    }

    #[test]
    fn ten_keys_fit_in_64() {
        let keys = random_keys(10);
        let built = PerfectIndex::new(&keys).unwrap();
        assert_eq!(built.table_size(), 64);
        assert_injective(&built, &keys);
    }

    #[test]
    fn hundred_keys_fit_in_128() {
        let keys = random_keys(100);
        let built = PerfectIndex::new(&keys).unwrap();
        assert_eq!(built.table_size(), 128);
        assert_injective(&built, &keys);
    }

    #[test]
    fn two_hundred_keys_fit_in_256() {
        let keys = random_keys(200);
        let built = PerfectIndex::new(&keys).unwrap();
        assert_eq!(built.table_size(), 256);
        assert_injective(&built, &keys);
    }

    #[test]
    fn three_hundred_keys_rejected() {
        let keys = random_keys(300);
        assert_eq!(PerfectIndex::new(&keys).unwrap_err(), BuildError::KeySetTooLarge(300));
    }

    #[test]
    fn duplicate_key_rejected() {
        let keys = [7, 11, 13, 11, 17];
        assert_eq!(PerfectIndex::new(&keys).unwrap_err(), BuildError::DuplicateKey(11));
    }

    #[test]
    fn empty_key_set_builds_trivially() {
        let built = PerfectIndex::new(&[]).unwrap();
        assert_eq!(built.table_size(), 64);
        assert_eq!(built.index(0xdead_beef), 0);
    }

    #[test]
    fn dependent_keys_stay_in_the_small_tier() {
        /* 0..=63 span only six bits, so nearly every key is a GF(2)
         * combination of earlier ones; a full 64-key set must still
         * solve without spilling into the 1-test-bit tier. */
        let keys: Vec<u64> = (0..64).collect();
        let built = PerfectIndex::new(&keys).unwrap();
        assert_eq!(built.table_size(), 64);
        assert_injective(&built, &keys);
    }

    #[test]
    fn sequential_keys_solve_at_every_tier() {
        for n in [10usize, 100, 200] {
            let keys: Vec<u64> = (0..n as u64).collect();
            let built = PerfectIndex::new(&keys).unwrap();
            assert_injective(&built, &keys);
        }
    }

    #[test]
    fn lookups_are_stable() {
        let keys = random_keys(100);
        let built = PerfectIndex::new(&keys).unwrap();
        for &key in &keys {
            assert_eq!(built.index(key), built.index(key));
        }
    }

    #[test]
    fn foreign_keys_stay_in_range() {
        let keys = random_keys(10);
        let built = PerfectIndex::new(&keys).unwrap();
        let mut rng = thread_rng();
        for _ in 0..1000 {
            assert!(built.index(rng.gen::<u64>()) < built.table_size());
        }
    }

    #[test]
    fn seeded_builds_are_deterministic() {
        let keys = random_keys(150);
        let options = BuildOptions { seed: Some(42), ..BuildOptions::default() };
        let a = PerfectIndex::build(&keys, &options).unwrap();
        let b = PerfectIndex::build(&keys, &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn bincode_round_trip() {
        let keys = random_keys(100);
        let built = PerfectIndex::new(&keys).unwrap();
        let bytes = bincode::encode_to_vec(&built, STD_BINCODE_CONFIG).unwrap();
        let (back, _): (PerfectIndex, usize) =
            bincode::decode_from_slice(&bytes, STD_BINCODE_CONFIG).unwrap();
        assert_eq!(built, back);
    }
}
