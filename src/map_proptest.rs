#![cfg(test)]

// Property tests for TreeHashMap kept inside the crate so every step can
// also run the structural checker against the internal table.

use crate::map::{BucketShape, TreeHashMap};
use crate::order::{KeyOrdering, QueryOrdering};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Put(usize, i32),
    PutIfAbsent(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

// Pools are large enough that colliding hashers push buckets past the
// treeify threshold, and removals shrink them back.
fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=40).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Put(i, v)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::PutIfAbsent(i, v)),
            2 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::Get),
            1 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..200).prop_map(move |ops| (pool.clone(), ops))
    })
}

// State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - `put` returns the model's previous value; `put_if_absent` never overwrites.
// - `get`/`contains_key` parity, including borrowed `&str` lookups.
// - `remove` returns the model's value exactly once.
// - `iter` yields each live entry exactly once.
// - `check_invariants` holds and `len`/`is_empty` match after each op.
fn run_state_machine<S, O>(
    mut sut: TreeHashMap<Key, i32, S, O>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: BuildHasher,
    O: KeyOrdering<Key> + QueryOrdering<Key, Key> + QueryOrdering<Key, str>,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    for op in ops {
        match op {
            OpI::Put(i, v) => {
                let k = key_from(&pool, i);
                let expected = model.insert(k.clone(), v);
                prop_assert_eq!(sut.put(k, v), expected);
            }
            OpI::PutIfAbsent(i, v) => {
                let k = key_from(&pool, i);
                let existing = model.get(&k).copied();
                prop_assert_eq!(sut.put_if_absent(k.clone(), v).copied(), existing);
                model.entry(k).or_insert(v);
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.remove(k.0.as_str()), model.remove(&k));
                prop_assert!(!sut.contains_key(&k));
            }
            OpI::Get(i) => {
                let k = key_from(&pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
            }
            OpI::Contains(s) => {
                let has = sut.contains_key(s.as_str());
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(has, has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(&pool, i);
                match (sut.get_mut(&k), model.get_mut(&k)) {
                    (Some(sv), Some(mv)) => {
                        *sv = sv.saturating_add(d);
                        *mv = mv.saturating_add(d);
                    }
                    (None, None) => {}
                    (s, m) => prop_assert!(false, "presence mismatch: {:?} vs {:?}", s, m),
                }
            }
            OpI::Iterate => {
                let s_entries: BTreeSet<_> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let m_entries: BTreeSet<_> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(sut.iter().count(), model.len());
                prop_assert_eq!(s_entries, m_entries);
            }
        }

        prop_assert_eq!(sut.check_invariants(), Ok(()));
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    for (k, v) in &model {
        prop_assert_eq!(sut.get(k), Some(v));
    }
    Ok(())
}

// Collision variant using a constant hasher to stress tree buckets.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Eight distinct hashes, all in bucket 0 of any table up to 64 buckets, so
// trees are ordered by hash as well as by tie-break.
#[derive(Clone, Default)]
struct LowEntropyBuildHasher;
#[derive(Default)]
struct LowEntropyHasher(u64);
impl BuildHasher for LowEntropyBuildHasher {
    type Hasher = LowEntropyHasher;
    fn build_hasher(&self) -> Self::Hasher {
        LowEntropyHasher::default()
    }
}
impl Hasher for LowEntropyHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.wrapping_add(u64::from(b));
        }
    }
    fn finish(&self) -> u64 {
        (self.0 % 8) << 6
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(TreeHashMap::new(), pool, ops)?;
    }

    // Worst-case collisions, no key order: hash-equal keys are placed by
    // insertion sequence and lookups must search both subtrees.
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(TreeHashMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }

    // Worst-case collisions with the key order used for placement and for
    // both `Key` and borrowed `&str` lookups.
    #[test]
    fn prop_state_machine_ordered_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(TreeHashMap::ordered_with_hasher(ConstBuildHasher), pool, ops)?;
    }

    #[test]
    fn prop_state_machine_low_entropy((pool, ops) in arb_scenario()) {
        run_state_machine(TreeHashMap::with_hasher(LowEntropyBuildHasher), pool, ops)?;
    }
}

// Property: inserting then removing n distinct colliding keys in a random
// order returns to an empty map, passing through both bucket shapes.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_collision_fill_and_drain(order in Just((0u32..48).collect::<Vec<_>>()).prop_shuffle()) {
        let mut m: TreeHashMap<u32, u32, ConstBuildHasher> = TreeHashMap::with_hasher(ConstBuildHasher);
        for &k in &order {
            prop_assert_eq!(m.put(k, k + 1), None);
        }
        prop_assert_eq!(m.bucket_shape(&0), BucketShape::Tree(48));
        for (removed, &k) in order.iter().enumerate() {
            prop_assert_eq!(m.remove(&k), Some(k + 1));
            prop_assert_eq!(m.check_invariants(), Ok(()));
            let left = 48 - removed - 1;
            match m.bucket_shape(&0) {
                BucketShape::Tree(n) | BucketShape::Chain(n) => prop_assert_eq!(n, left),
                BucketShape::Empty => prop_assert_eq!(left, 0),
            }
        }
        prop_assert!(m.is_empty());
    }
}
