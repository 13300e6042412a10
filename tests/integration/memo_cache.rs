//! Memoization backed by a persisted store.

use super::test_utils::StateFixture;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strata::{LoadMode, Memoized, ReplicateConfig, ReplicateEngine, StateAccess, StateStore, StoreError};

#[test]
fn cache_survives_process_restart() {
    let fixture = StateFixture::new();
    let invocations = AtomicUsize::new(0);
    let slow_sum = |xs: &Vec<i64>| -> Result<i64, StoreError> {
        invocations.fetch_add(1, Ordering::SeqCst);
        Ok(xs.iter().sum())
    };

    {
        let store = StateStore::open(&fixture.path, LoadMode::AllowMissing).unwrap();
        let memo = Memoized::new("slow_sum", &slow_sum).unwrap();
        assert_eq!(memo.call(&store, &vec![1, 2, 3]).unwrap(), 6);
        store.save(&fixture.path, 0).unwrap();
    }

    let store = StateStore::open(&fixture.path, LoadMode::Require).unwrap();
    let memo = Memoized::new("slow_sum", &slow_sum).unwrap();
    assert_eq!(memo.call(&store, &vec![1, 2, 3]).unwrap(), 6);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(memo.stats().hits, 1);
}

#[test]
fn structured_results_round_trip() {
    let store = StateStore::new();
    let histogram = Memoized::new("histogram", |words: &Vec<String>| -> Result<BTreeMap<String, usize>, StoreError> {
        let mut counts = BTreeMap::new();
        for word in words {
            *counts.entry(word.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    })
    .unwrap();

    let words: Vec<String> = ["a", "b", "a"].iter().map(|w| w.to_string()).collect();
    let first = histogram.call(&store, &words).unwrap();
    let second = histogram.call(&store, &words).unwrap();
    assert_eq!(first, second);
    assert_eq!(second.get("a"), Some(&2));
    assert_eq!(histogram.stats().hits, 1);
}

#[test]
fn stale_entry_of_wrong_type_is_recomputed() {
    let store = StateStore::new();
    let as_text = Memoized::new("convert", |x: &i64| -> Result<String, StoreError> {
        Ok(x.to_string())
    })
    .unwrap();
    as_text.call(&store, &5).unwrap();

    // same name and key, new return type
    let as_number = Memoized::new("convert", |x: &i64| -> Result<Vec<i64>, StoreError> {
        Ok(vec![*x])
    })
    .unwrap();
    assert_eq!(as_number.call(&store, &5).unwrap(), vec![5]);
    assert_eq!(as_number.stats().misses, 1);
    assert_eq!(as_number.call(&store, &5).unwrap(), vec![5]);
    assert_eq!(as_number.stats().hits, 1);
}

#[test]
fn memo_in_replicate_scope_lives_in_replicate_namespace() {
    let store = StateStore::new();
    let double = Memoized::new("double", |x: &usize| -> Result<usize, StoreError> { Ok(2 * x) })
        .unwrap();

    ReplicateEngine::new(ReplicateConfig::new(2))
        .run(&store, |ctx| {
            double.call(ctx.state(), &ctx.index())?;
            Ok::<(), StoreError>(())
        })
        .unwrap();

    assert!(store.contains("replicates.0.memo.double").unwrap());
    assert!(store.contains("replicates.1.memo.double").unwrap());
    assert!(!store.contains("memo").unwrap());
}
