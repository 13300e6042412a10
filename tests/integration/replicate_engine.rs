//! Replicate engine + collector end to end.

use super::test_utils::StateFixture;
use std::collections::BTreeSet;
use strata::replicate::FailureCause;
use strata::{
    collect, collect_as, collect_indexed, CollectError, LoadMode, Memoized, ReplicateConfig,
    ReplicateEngine, ReplicateError, StateAccess, StateStore, StoreError, Value,
};

fn record_index(ctx: &strata::ReplicateContext) -> Result<(), StoreError> {
    ctx.state().set("idx", Value::from(ctx.index()))
}

#[test]
fn parallel_replicates_are_isolated() {
    let store = StateStore::new();
    ReplicateEngine::new(ReplicateConfig::new(5).parallel(0))
        .run(&store, record_index)
        .unwrap();

    let indices: Vec<usize> = collect_as(&store, "replicates", "idx").unwrap();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
}

#[test]
fn partial_failure_collects_survivors() {
    let store = StateStore::new();
    let err = ReplicateEngine::new(ReplicateConfig::new(4).parallel(2))
        .run(&store, |ctx| {
            if ctx.index() == 2 {
                return Err(StoreError::Conversion("replicate 2 blew up".into()));
            }
            record_index(ctx)
        })
        .unwrap_err();

    match &err {
        ReplicateError::Failed { report } => {
            assert_eq!(report.failed_indices(), vec![2]);
            assert_eq!(report.completed, vec![0, 1, 3]);
        }
        other => panic!("unexpected error {}", other),
    }
    assert!(err.to_string().contains("#2"));

    let values = collect(&store, "replicates", "idx").unwrap();
    assert_eq!(values.len(), 3);
}

#[test]
fn many_workers_produce_distinct_results() {
    let store = StateStore::new();
    let report = ReplicateEngine::new(ReplicateConfig::new(50).parallel(8))
        .run(&store, |ctx| {
            // spread completion order
            std::thread::sleep(std::time::Duration::from_millis((ctx.index() % 5) as u64));
            ctx.state().set("value", Value::from(ctx.index() * 10))
        })
        .unwrap();
    assert_eq!(report.completed.len(), 50);

    let values: Vec<usize> = collect_as(&store, "replicates", "value").unwrap();
    let distinct: BTreeSet<usize> = values.iter().copied().collect();
    assert_eq!(distinct.len(), 50);
    // index order regardless of completion order
    assert_eq!(values, (0..50).map(|i| i * 10).collect::<Vec<_>>());
}

#[test]
fn index_ten_sorts_after_two() {
    let store = StateStore::new();
    ReplicateEngine::new(ReplicateConfig::new(12))
        .run(&store, record_index)
        .unwrap();
    let indexed = collect_indexed(&store, "replicates", "idx").unwrap();
    let order: Vec<usize> = indexed.iter().map(|(i, _)| *i).collect();
    assert_eq!(order, (0..12).collect::<Vec<_>>());
}

#[test]
fn fail_fast_reports_skipped() {
    let store = StateStore::new();
    let err = ReplicateEngine::new(ReplicateConfig::new(6).with_fail_fast(true))
        .run(&store, |ctx| {
            if ctx.index() == 0 {
                return Err(StoreError::Conversion("bad start".into()));
            }
            record_index(ctx)
        })
        .unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.skipped, vec![1, 2, 3, 4, 5]);
    assert!(report.completed.is_empty());
    assert!(matches!(
        collect(&store, "replicates", "idx"),
        Err(CollectError::NoResults { .. })
    ));
}

#[test]
fn panicking_replicate_does_not_poison_store() {
    let store = StateStore::new();
    let err = ReplicateEngine::new(ReplicateConfig::new(3).parallel(3))
        .run(&store, |ctx| {
            ctx.state().set("started", Value::from(true))?;
            if ctx.index() == 0 {
                panic!("numerical instability");
            }
            record_index(ctx)
        })
        .unwrap_err();
    let report = err.report().unwrap();
    assert!(matches!(report.failures[0].cause, FailureCause::Panicked(_)));

    // the store is still usable after a worker panic
    store.set("after", Value::from(1i64)).unwrap();
    assert!(store.contains("replicates.0.started").unwrap());
}

#[test]
fn replicates_share_a_memo_cache() {
    let store = StateStore::new();
    let expensive = Memoized::new("expensive", |x: &u64| -> Result<u64, StoreError> {
        Ok(x * 3)
    })
    .unwrap();

    ReplicateEngine::new(ReplicateConfig::new(8).parallel(4))
        .run(&store, |ctx| {
            // every replicate asks for the same argument
            let out = expensive.call(ctx.shared(), &7u64)?;
            ctx.state().set("out", Value::from(out as i64))
        })
        .unwrap();

    let outs: Vec<i64> = collect_as(&store, "replicates", "out").unwrap();
    assert_eq!(outs, vec![21; 8]);
    let stats = expensive.stats();
    assert_eq!(stats.hits + stats.misses, 8);
    assert!(stats.misses >= 1);
    assert_eq!(store.children("memo.expensive").unwrap().len(), 1);
}

#[test]
fn results_survive_save_and_reload() {
    let fixture = StateFixture::new();
    let store = StateStore::new();
    ReplicateEngine::new(ReplicateConfig::new(4).parallel(2))
        .run(&store, record_index)
        .unwrap();
    store.save(&fixture.path, 0).unwrap();

    let reloaded = StateStore::open(&fixture.path, LoadMode::Require).unwrap();
    let indices: Vec<usize> = collect_as(&reloaded, "replicates", "idx").unwrap();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}
