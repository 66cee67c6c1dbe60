/*!
 * Table-free perfect hashing for small sets of 64-bit keys.
 *
 * This crate provides a [`PerfectIndex`] object: given a fixed set of
 * distinct 64-bit keys (tens to ~200, hard ceiling 256), it finds, once, a
 * function mapping every key in the set to a unique small integer below
 * [`table_size`](PerfectIndex::table_size) (64, 128 or 256).  The function
 * carries no table at all -- a lookup is a couple of single-bit probes plus
 * six AND-and-parity rounds over the key -- so it is suitable as a direct
 * index into a size-bounded array where a general `HashMap` would be
 * overkill.  A [`KeyedIndex<K>`] wrapper does the same for any `K: Hash`
 * by folding keys to 64 bits with SipHash first.
 *
 * It has a significant and intentional limitation: the keys themselves are
 * not stored.  Looking up a key that was not part of the build returns an
 * arbitrary in-range value, possibly aliasing a real key's slot, and
 * nothing detects this.  There is also no insertion, removal or resizing
 * after construction; a new key set means a new build.
 *
 * # Internals
 *
 * Construction works in two nested searches.  The outer search picks 0, 1
 * or 2 "test bits" -- single-bit masks over the key -- splitting the key
 * set into up to 4 partitions of at most 64 keys; a combination leaving
 * any partition over 64 keys is rejected outright.  For each partition the
 * inner search finds 6 masks `M[0..5]` such that the 6-bit code
 * `code(k) = sum of parity(M[i] & k) << i` is distinct for every key in
 * the partition: each key is assigned a distinct target code and the GF(2)
 * linear system `parity(M[i] & k) = bit i of code(k)` is solved by Gaussian
 * elimination.  The final index is `(partition << 6) | code(k)`.
 *
 * If a partition's keys are linearly independent over GF(2) -- the usual
 * case for well-distributed keys -- the first target assignment always
 * solves.  A dependent key has no freedom: its code is forced to the XOR
 * of the codes of the keys it combines.  The inner search assigns those
 * first, takes the forced codes as they come, and retries a bounded
 * number of assignments when forced codes collide; the outer search moves
 * on to the next bit combination when a partition refuses to solve.
 *
 * # Failure
 *
 * Construction is a bounded search and can fail, returning a [`BuildError`]
 * rather than looping: oversized inputs and duplicate keys are rejected up
 * front, and exhausting every test-bit combination (exponentially unlikely
 * for well-hashed keys) reports [`BuildError::Exhausted`].  Budgets are
 * adjustable through [`BuildOptions`], which can also pin a seed to make
 * construction fully deterministic.
 *
 * # Concurrency
 *
 * A built structure is immutable.  [`index`](PerfectIndex::index) takes
 * `&self`, never fails and touches no shared state, so any number of
 * threads may look up keys concurrently.
 *
 * # Serialization
 *
 * [`PerfectIndex`] and [`KeyedIndex`] implement
 * [`Encode`](bincode::enc::Encode) and [`Decode`](bincode::de::Decode);
 * the persisted state is just the test-bit masks, the per-partition mask
 * rows and (for the keyed form) the hash key.  Use [`STD_BINCODE_CONFIG`]
 * so the wire format stays stable across callers.
 */

mod gf2;
mod keyed;
mod perfect;

pub use keyed::{HasherKey, KeyedIndex};
pub use perfect::{BuildError, BuildOptions, PerfectIndex, MAX_KEYS, STD_BINCODE_CONFIG};
