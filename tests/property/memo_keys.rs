//! Memo key determinism

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use strata::{Memoized, StoreError};

/// Keys do not depend on the insertion order of map arguments.
#[test]
fn test_key_insertion_order_independence() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let memo = Memoized::new("order", |_: &HashMap<String, i64>| -> Result<i64, StoreError> { Ok(0) })
        .unwrap();

    runner
        .run(
            &prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..12),
            |entries: BTreeMap<String, i64>| {
                let forward: HashMap<String, i64> = entries.clone().into_iter().collect();
                let mut backward = HashMap::with_capacity(1);
                for (k, v) in entries.into_iter().rev() {
                    backward.insert(k, v);
                }
                prop_assert_eq!(
                    memo.cache_key(&forward).unwrap(),
                    memo.cache_key(&backward).unwrap()
                );
                Ok(())
            },
        )
        .unwrap();
}

/// Distinct arguments give distinct keys.
#[test]
fn test_distinct_args_distinct_keys() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let memo = Memoized::new("distinct", |_: &(i64, String)| -> Result<i64, StoreError> { Ok(0) })
        .unwrap();

    runner
        .run(
            &((any::<i64>(), "[a-z]{0,8}"), (any::<i64>(), "[a-z]{0,8}")),
            |(a, b)| {
                prop_assume!(a != b);
                prop_assert_ne!(memo.cache_key(&a).unwrap(), memo.cache_key(&b).unwrap());
                Ok(())
            },
        )
        .unwrap();
}
