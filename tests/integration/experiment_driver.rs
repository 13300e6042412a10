//! Experiment driver configured from a TOML file.

use super::test_utils::StateFixture;
use strata::{ApiError, Experiment, LoadMode, Memoized, StateAccess, StateStore, StoreError, Value};

fn write_config(fixture: &StateFixture, parallel: bool, extra: &str) -> std::path::PathBuf {
    let config_path = fixture.dir.path().join("experiment.toml");
    let body = format!(
        "state_filename = {:?}\nn_replicates = 6\nparallel = {}\nprocesses = 3\nrotate_n_state_files = 1\n{}",
        fixture.path.to_str().unwrap(),
        parallel,
        extra
    );
    std::fs::write(&config_path, body).unwrap();
    config_path
}

#[test]
fn configured_run_collects_and_persists() {
    let fixture = StateFixture::new();
    let config_path = write_config(&fixture, true, "");
    let experiment = Experiment::from_config_file(&config_path).unwrap();
    assert_eq!(experiment.config().max_workers, 3);

    let means = experiment
        .run(|exp| {
            exp.store().set("params.offset", Value::from(0.5))?;
            exp.run_replicates(|ctx| -> Result<(), StoreError> {
                let offset = ctx.shared().get("params.offset")?.as_f64().unwrap_or(0.0);
                ctx.state().set("mean", Value::from(ctx.index() as f64 + offset))
            })?;
            exp.collect_as::<f64>("mean")
        })
        .unwrap();
    assert_eq!(means, vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5]);

    let saved = StateStore::open(&fixture.path, LoadMode::Require).unwrap();
    assert_eq!(saved.children("replicates").unwrap().len(), 6);
}

#[test]
fn clean_second_run_reuses_memo_without_rotation() {
    let fixture = StateFixture::new();
    let config_path = write_config(&fixture, true, "");
    let fib = Memoized::new("fib", |n: &u32| -> Result<u64, ApiError> {
        let (mut a, mut b) = (0u64, 1u64);
        for _ in 0..*n {
            let next = a + b;
            a = b;
            b = next;
        }
        Ok(a)
    })
    .unwrap();

    for _ in 0..2 {
        let experiment = Experiment::from_config_file(&config_path).unwrap();
        let value = experiment.run(|exp| fib.call(exp.store(), &40u32)).unwrap();
        assert_eq!(value, 102_334_155);
    }

    assert_eq!(fib.stats().misses, 1);
    assert_eq!(fib.stats().hits, 1);
    // first run wrote the primary; the second was clean and skipped rotation
    assert!(!fixture.backup(1).exists());
}

#[test]
fn replicate_failure_surfaces_as_api_error() {
    let fixture = StateFixture::new();
    let config_path = write_config(&fixture, false, "fail_fast = true\n");
    let experiment = Experiment::from_config_file(&config_path).unwrap();

    let err = experiment
        .run(|exp| {
            exp.run_replicates(|ctx| {
                if ctx.index() == 3 {
                    Err("ran out of samples".to_string())
                } else {
                    Ok(())
                }
            })
        })
        .unwrap_err();

    match err {
        ApiError::Replicate(replicate) => {
            let report = replicate.report().unwrap();
            assert_eq!(report.failed_indices(), vec![3]);
            assert_eq!(report.skipped, vec![4, 5]);
        }
        other => panic!("unexpected error {}", other),
    }
}
