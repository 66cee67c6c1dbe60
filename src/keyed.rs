/*
 * @file keyed.rs
 *
 * Typed front end: hash arbitrary `K: Hash` keys down to 64 bits with
 * SipHash under a per-instance key, then index the hashed values with the
 * core structure.  A bad draw (a 64-bit collision, or a hashed set the
 * core search cannot solve) is handled by re-rolling the hash key.
 */

use crate::perfect::{rng_from_options, BuildError, BuildOptions, PerfectIndex};
use core::hash::Hash;
use rand::RngCore;
use siphasher::sip128::{Hasher128, SipHasher13};
use std::marker::PhantomData;

/** A key for the SipHash13 hash function. */
pub type HasherKey = [u8; 16];

fn hash_to_u64<K: Hash>(hash_key: &HasherKey, key: &K) -> u64 {
    let mut hasher = SipHasher13::new_with_key(hash_key);
    key.hash(&mut hasher);
    hasher.finish128().h1
}

/**
 * A perfect hash over a small fixed set of arbitrary hashable keys.
 *
 * This is [`PerfectIndex`] behind a SipHash13 layer, the same way the core
 * expects "well hashed" 64-bit inputs: each instance stores the 16-byte
 * hash key it was built with, so lookups are deterministic for the lifetime
 * of the structure (including across serialization).
 *
 * As with the core, only keys supplied at build time get unique indices;
 * any other key still maps somewhere below [`table_size`](Self::table_size).
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyedIndex<K> {
    /** The SipHash key used to fold inputs to 64 bits. */
    hash_key: HasherKey,

    /** Untyped structure, consulted after hashing. */
    core: PerfectIndex,

    /** Phantom to hold the type of K. */
    _phantom: PhantomData<K>,
}

impl<K: Hash> KeyedIndex<K> {
    /**
     * Build a perfect hash for the distinct keys in `keys`.
     *
     * You can pass a `HashSet<K>`, `BTreeSet<K>`, `Vec<K>` etc.  Duplicate
     * entries make every attempt fail (their hashes collide under every
     * hash key), so after `options.max_tries` attempts the build reports
     * the duplicate.  More than 256 keys is rejected immediately.
     */
    pub fn build<'a, Collection>(
        keys: &'a Collection,
        options: &BuildOptions,
    ) -> Result<Self, BuildError>
    where
        for<'b> &'b Collection: IntoIterator<Item = &'b K>,
    {
        let mut rng = rng_from_options(options);
        let mut last = BuildError::Exhausted;
        for _ in 0..options.max_tries.max(1) {
            let mut hash_key = [0u8; 16];
            rng.fill_bytes(&mut hash_key);
            let hashed: Vec<u64> =
                keys.into_iter().map(|key| hash_to_u64(&hash_key, key)).collect();
            match PerfectIndex::build(&hashed, options) {
                Ok(core) => return Ok(KeyedIndex { hash_key, core, _phantom: PhantomData }),
                Err(err @ BuildError::KeySetTooLarge(_)) => return Err(err),
                Err(err) => last = err, /* fresh hash key may fare better */
            }
        }
        Err(last)
    }

    /**
     * The unique index of `key`, below [`table_size`](Self::table_size).
     * Unique only for keys supplied at build time.
     */
    pub fn index(&self, key: &K) -> usize {
        self.core.index(hash_to_u64(&self.hash_key, key))
    }

    /** Size of the lookup table this structure indexes into: 64, 128 or 256. */
    pub fn table_size(&self) -> usize {
        self.core.table_size()
    }
}

/* PhantomData keeps the derive machinery from accepting these, so encode
 * and decode the two real fields by hand. */
impl<K> bincode::Encode for KeyedIndex<K> {
    fn encode<E: bincode::enc::Encoder>(
        &self,
        encoder: &mut E,
    ) -> Result<(), bincode::error::EncodeError> {
        bincode::Encode::encode(&self.hash_key, encoder)?;
        bincode::Encode::encode(&self.core, encoder)
    }
}

impl<K, Context> bincode::Decode<Context> for KeyedIndex<K> {
    fn decode<D: bincode::de::Decoder<Context = Context>>(
        decoder: &mut D,
    ) -> Result<Self, bincode::error::DecodeError> {
        Ok(KeyedIndex {
            hash_key: <HasherKey as bincode::Decode<Context>>::decode(decoder)?,
            core: <PerfectIndex as bincode::Decode<Context>>::decode(decoder)?,
            _phantom: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::STD_BINCODE_CONFIG;

    #[test]
    fn string_keys_get_distinct_slots() {
        let keys: Vec<String> = (0..40).map(|i| format!("key-{}", i)).collect();
        let built = KeyedIndex::build(&keys, &BuildOptions::default()).unwrap();
        assert_eq!(built.table_size(), 64);

        let mut seen = vec![false; built.table_size()];
        for key in &keys {
            let idx = built.index(key);
            assert!(idx < built.table_size());
            assert!(!seen[idx], "slot {} assigned twice", idx);
            seen[idx] = true;
        }
    }

    #[test]
    fn hundred_and_fifty_keys_need_256() {
        let keys: Vec<u32> = (0..150).collect();
        let built = KeyedIndex::build(&keys, &BuildOptions::default()).unwrap();
        assert_eq!(built.table_size(), 256);
        let mut seen = vec![false; built.table_size()];
        for key in &keys {
            let idx = built.index(key);
            assert!(!seen[idx]);
            seen[idx] = true;
        }
    }

    #[test]
    fn too_many_keys_rejected() {
        let keys: Vec<u32> = (0..300).collect();
        assert_eq!(
            KeyedIndex::build(&keys, &BuildOptions::default()).unwrap_err(),
            BuildError::KeySetTooLarge(300)
        );
    }

    #[test]
    fn bincode_round_trip() {
        let keys: Vec<String> = (0..30).map(|i| format!("node/{}", i)).collect();
        let built = KeyedIndex::build(&keys, &BuildOptions::default()).unwrap();
        let bytes = bincode::encode_to_vec(&built, STD_BINCODE_CONFIG).unwrap();
        let (back, _): (KeyedIndex<String>, usize) =
            bincode::decode_from_slice(&bytes, STD_BINCODE_CONFIG).unwrap();
        assert_eq!(built, back);
        for key in &keys {
            assert_eq!(built.index(key), back.index(key));
        }
    }
}
