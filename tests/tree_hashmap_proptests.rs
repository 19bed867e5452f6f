// TreeHashMap property tests against the public API.
//
// Property 1: differential equivalence with std HashMap.
//  - Model: std::collections::HashMap<u16, u32>.
//  - Operations: put, put_if_absent, remove, get.
//  - Invariant: every return value matches; after the run, len and every
//    key's value match the model.
//  - Keys go through a hasher that keeps only a few bits, so buckets
//    treeify, split and untreeify along the way.
//
// Property 2: idempotent update.
//  - put(k, v1) then put(k, v2) leaves get(k) == v2 and grows len by at
//    most one.
use proptest::prelude::*;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hasher};
use tree_hashmap::TreeHashMap;

// Keeps the low `bits` bits of the key, so distinct keys share hashes.
#[derive(Clone)]
struct MaskBuildHasher {
    bits: u32,
}
struct MaskHasher {
    h: u64,
    mask: u64,
}
impl BuildHasher for MaskBuildHasher {
    type Hasher = MaskHasher;
    fn build_hasher(&self) -> Self::Hasher {
        MaskHasher {
            h: 0,
            mask: (1u64 << self.bits) - 1,
        }
    }
}
impl Hasher for MaskHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.h = (self.h << 8) | u64::from(b);
        }
    }
    fn write_u16(&mut self, n: u16) {
        self.h = u64::from(n);
    }
    fn finish(&self) -> u64 {
        self.h & self.mask
    }
}

#[derive(Clone, Debug)]
enum Op {
    Put(u16, u32),
    PutIfAbsent(u16, u32),
    Remove(u16),
    Get(u16),
}

fn arb_op(keys: u16) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..keys, any::<u32>()).prop_map(|(k, v)| Op::Put(k, v)),
        1 => (0..keys, any::<u32>()).prop_map(|(k, v)| Op::PutIfAbsent(k, v)),
        3 => (0..keys).prop_map(Op::Remove),
        2 => (0..keys).prop_map(Op::Get),
    ]
}

// Property 1: differential equivalence under low-entropy hashing.
proptest! {
    #![proptest_config(ProptestConfig { cases: 48, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_std_hashmap(
        bits in 0u32..=6,
        ops in proptest::collection::vec(arb_op(512), 1..600),
    ) {
        let mut sut: TreeHashMap<u16, u32, MaskBuildHasher> =
            TreeHashMap::with_hasher(MaskBuildHasher { bits });
        let mut model: HashMap<u16, u32> = HashMap::new();
        for op in ops {
            match op {
                Op::Put(k, v) => prop_assert_eq!(sut.put(k, v), model.insert(k, v)),
                Op::PutIfAbsent(k, v) => {
                    let existing = model.get(&k).copied();
                    prop_assert_eq!(sut.put_if_absent(k, v).copied(), existing);
                    model.entry(k).or_insert(v);
                }
                Op::Remove(k) => {
                    prop_assert_eq!(sut.remove(&k), model.remove(&k));
                    prop_assert!(sut.get(&k).is_none());
                    prop_assert!(!sut.contains_key(&k));
                }
                Op::Get(k) => prop_assert_eq!(sut.get(&k), model.get(&k)),
            }
            prop_assert_eq!(sut.len(), model.len());
            prop_assert!(sut.capacity() == 0 || sut.capacity().is_power_of_two());
        }
        for (k, v) in &model {
            prop_assert_eq!(sut.get(k), Some(v));
        }
        prop_assert_eq!(sut.check_invariants(), Ok(()));
    }
}

// Property 2: idempotent update.
proptest! {
    #[test]
    fn prop_put_twice_keeps_last(
        seed in proptest::collection::vec((any::<u16>(), any::<u32>()), 0..64),
        k in any::<u16>(),
        v1 in any::<u32>(),
        v2 in any::<u32>(),
    ) {
        let mut m: TreeHashMap<u16, u32> = seed.into_iter().collect();
        let before = m.len();
        let was_present = m.contains_key(&k);
        m.put(k, v1);
        prop_assert_eq!(m.put(k, v2), Some(v1));
        prop_assert_eq!(m.get(&k), Some(&v2));
        prop_assert_eq!(m.len(), before + usize::from(!was_present));
    }
}
