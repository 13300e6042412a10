//! Store round-trip properties

use proptest::prelude::*;
use strata::{LoadMode, StateAccess, StateStore, Value};
use tempfile::TempDir;

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}"
}

fn path() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..4).prop_map(|segments| segments.join("."))
}

fn leaf_value() -> impl Strategy<Value = Value> {
    let scalar = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1e9f64..1e9f64).prop_map(Value::from),
        "[ -~]{0,12}".prop_map(Value::from),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::from),
    ];
    scalar.prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(Value::from),
        ]
    })
}

/// Set then get returns the value for any valid path.
#[test]
fn test_set_get_roundtrip_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(path(), leaf_value()), |(path, value)| {
            let store = StateStore::new();
            store.set(&path, value.clone()).unwrap();
            prop_assert_eq!(store.get(&path).unwrap(), value);
            prop_assert!(store.contains(&path).unwrap());
            Ok(())
        })
        .unwrap();
}

#[derive(Debug, Clone)]
enum Op {
    Set(String, Value),
    Delete(String),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (path(), leaf_value()).prop_map(|(path, value)| Op::Set(path, value)),
        1 => path().prop_map(Op::Delete),
    ]
}

/// Save followed by load yields an identical tree, whatever mix of sets and
/// deletes built it (including groups emptied by deletes).
#[test]
fn test_save_load_identity_property() {
    let mut runner = proptest::test_runner::TestRunner::new(proptest::test_runner::Config {
        cases: 64,
        ..Default::default()
    });
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("prop.strata");

    runner
        .run(&prop::collection::vec(op(), 0..24), |ops| {
            let store = StateStore::new();
            for op in ops {
                // structural errors and deletes of absent paths leave the tree unchanged
                let _ = match op {
                    Op::Set(path, value) => store.set(&path, value),
                    Op::Delete(path) => store.delete(&path),
                };
            }
            store.save(&file, 0).unwrap();
            let loaded = StateStore::open(&file, LoadMode::Require).unwrap();
            prop_assert_eq!(loaded.snapshot().unwrap(), store.snapshot().unwrap());
            prop_assert_eq!(loaded.keys().unwrap(), store.keys().unwrap());
            prop_assert_eq!(loaded.is_empty().unwrap(), store.is_empty().unwrap());
            Ok(())
        })
        .unwrap();
}

/// A delete leaves the paths outside the deleted subtree untouched.
#[test]
fn test_delete_removes_only_its_subtree() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(
                prop::collection::vec((path(), leaf_value()), 1..12),
                any::<prop::sample::Index>(),
                1usize..4,
            ),
            |(entries, pick, depth)| {
                let store = StateStore::new();
                for (path, value) in entries {
                    let _ = store.set(&path, value);
                }
                let before = store.keys().unwrap();
                // a leaf, or one of its ancestor groups
                let chosen = pick.get(&before);
                let segments: Vec<&str> = chosen.split('.').collect();
                let victim = segments[..depth.min(segments.len())].join(".");

                store.delete(&victim).unwrap();
                prop_assert!(!store.contains(&victim).unwrap());
                let prefix = format!("{}.", victim);
                let expected: Vec<String> = before
                    .into_iter()
                    .filter(|key| key != &victim && !key.starts_with(&prefix))
                    .collect();
                prop_assert_eq!(store.keys().unwrap(), expected);
                Ok(())
            },
        )
        .unwrap();
}
