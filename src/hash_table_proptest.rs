#![cfg(test)]

// Property tests for HashTable kept inside the crate so they can call the
// internal invariant checks.

use crate::config::TableConfig;
use crate::element::{I32I32, StrStr};
use crate::hash_table::{HashTable, Insert};
use proptest::prelude::*;

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, Vec<u8>),
    Remove(usize),
    Get(usize),
    Clone,
    Clear,
}

fn arb_bytes() -> impl Strategy<Value = Vec<u8>> {
    // Straddles both inline limits.
    proptest::collection::vec(any::<u8>(), 0..60)
}

fn arb_scenario() -> impl Strategy<Value = (Vec<Vec<u8>>, Vec<Op>)> {
    proptest::collection::vec(arb_bytes(), 1..=12).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            6 => (idx.clone(), arb_bytes()).prop_map(|(i, v)| Op::Insert(i, v)),
            3 => idx.clone().prop_map(Op::Remove),
            3 => idx.prop_map(Op::Get),
            1 => Just(Op::Clone),
            1 => Just(Op::Clear),
        ];
        (Just(pool), proptest::collection::vec(op, 1..80))
    })
}

/// Array-order model: a vector with the same swap-remove discipline.
#[derive(Default)]
struct Model {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Model {
    fn position(&self, key: &[u8]) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> Insert {
        match self.position(key) {
            Some(i) => {
                self.entries[i].1 = value.to_vec();
                Insert::Replaced(i)
            }
            None => {
                self.entries.push((key.to_vec(), value.to_vec()));
                Insert::Added(self.entries.len() - 1)
            }
        }
    }

    fn remove(&mut self, key: &[u8]) -> bool {
        match self.position(key) {
            Some(i) => {
                self.entries.swap_remove(i);
                true
            }
            None => false,
        }
    }
}

fn assert_matches(sut: &HashTable<StrStr>, model: &Model) -> Result<(), TestCaseError> {
    prop_assert_eq!(sut.len(), model.entries.len());
    prop_assert!(sut.len() < sut.bucket_count());
    for (i, (k, v)) in sut.iter().enumerate() {
        let (mk, mv) = &model.entries[i];
        prop_assert_eq!(k, &mk[..]);
        prop_assert_eq!(v, &mv[..]);
    }
    sut.check_invariants();
    Ok(())
}

// Property: the table matches an array-order model after every operation,
// including positions reported by insert and the order left by removals.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_string_table_matches_model((pool, ops) in arb_scenario()) {
        let mut sut: HashTable<StrStr> = HashTable::with_capacity(2).unwrap();
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let k = &pool[i];
                    let got = sut.insert(k, &v).unwrap();
                    prop_assert_eq!(got, model.insert(k, &v));
                }
                Op::Remove(i) => {
                    let k = &pool[i];
                    prop_assert_eq!(sut.remove(k), model.remove(k));
                    prop_assert!(!sut.contains_key(k));
                }
                Op::Get(i) => {
                    let k = &pool[i];
                    let expected = model.position(k).map(|p| &model.entries[p].1[..]);
                    prop_assert_eq!(sut.get(k), expected);
                    prop_assert_eq!(sut.index_of(k), model.position(k));
                }
                Op::Clone => {
                    let copy = sut.try_clone().unwrap();
                    assert_matches(&copy, &model)?;
                    sut = copy;
                }
                Op::Clear => {
                    sut.clear();
                    model.entries.clear();
                }
            }
            assert_matches(&sut, &model)?;
            prop_assert!(!sut.alloc_error());
        }
    }
}

// Property: a fixed table never grows; inserts beyond its threshold fail
// without disturbing what is already stored, and overwrites always succeed.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_fixed_table_rejects_overflow(
        keys in proptest::collection::vec(-64i32..64, 1..120),
        capacity in 1usize..24,
    ) {
        let config = TableConfig::new().initial_capacity(capacity).fixed(true);
        let mut sut: HashTable<I32I32> = HashTable::with_config(config).unwrap();
        let limit = sut.rehash_threshold().min(sut.capacity());
        let buckets = sut.bucket_count();
        let mut stored: Vec<i32> = Vec::new();

        for k in keys {
            let present = stored.contains(&k);
            let result = sut.insert(&k, &k.wrapping_mul(3));
            if present || stored.len() < limit {
                prop_assert!(result.is_ok());
                if !present {
                    stored.push(k);
                }
            } else {
                prop_assert!(result.is_err());
                prop_assert!(sut.alloc_error());
                sut.clear_alloc_error();
            }
            prop_assert_eq!(sut.len(), stored.len());
            prop_assert_eq!(sut.bucket_count(), buckets);
        }
        for k in &stored {
            prop_assert_eq!(sut.get(k), Some(&k.wrapping_mul(3)));
        }
        sut.check_invariants();
    }
}
