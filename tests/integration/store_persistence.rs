//! Store persistence: save/load identity, rotation, lazy loading, reset.

use super::test_utils::{populated_store, StateFixture};
use strata::{LoadMode, SaveOutcome, StateAccess, StateStore, StoreError, Value};

#[test]
fn save_then_load_reproduces_tree() {
    let fixture = StateFixture::new();
    let store = populated_store();
    store.save(&fixture.path, 0).unwrap();

    let loaded = StateStore::open(&fixture.path, LoadMode::Require).unwrap();
    assert_eq!(loaded.snapshot().unwrap(), store.snapshot().unwrap());
    assert_eq!(loaded.keys().unwrap(), vec!["list", "values.int"]);
}

#[test]
fn rotation_keeps_previous_generations() {
    let fixture = StateFixture::new();
    let store = StateStore::new();
    for generation in 1..=3i64 {
        store.set("generation", Value::from(generation)).unwrap();
        assert_eq!(store.save(&fixture.path, 2).unwrap(), SaveOutcome::Written);
    }

    let generation_of = |path: &std::path::Path| {
        StateStore::open(path, LoadMode::Require)
            .unwrap()
            .get("generation")
            .unwrap()
    };
    assert_eq!(generation_of(&fixture.path), Value::from(3i64));
    assert_eq!(generation_of(&fixture.backup(1)), Value::from(2i64));
    assert_eq!(generation_of(&fixture.backup(2)), Value::from(1i64));
    assert!(!fixture.backup(3).exists());
}

#[test]
fn unchanged_store_skips_save() {
    let fixture = StateFixture::new();
    let store = populated_store();
    store.save(&fixture.path, 2).unwrap();
    assert_eq!(store.save(&fixture.path, 2).unwrap(), SaveOutcome::Skipped);
    // a skipped save must not rotate
    assert!(!fixture.backup(1).exists());

    std::fs::remove_file(&fixture.path).unwrap();
    assert_eq!(store.save(&fixture.path, 2).unwrap(), SaveOutcome::Written);
}

#[test]
fn deleting_group_removes_descendants() {
    let store = StateStore::new();
    store.set("a.b.c", Value::from(1i64)).unwrap();
    store.set("a.b.d", Value::from(2i64)).unwrap();
    store.set("a.e", Value::from(3i64)).unwrap();

    store.delete("a.b").unwrap();
    assert!(!store.contains("a.b.c").unwrap());
    assert!(!store.contains("a.b").unwrap());
    assert_eq!(store.children("a").unwrap(), vec!["e"]);
}

#[test]
fn structural_errors() {
    let store = StateStore::new();
    store.set("leaf", Value::from(1i64)).unwrap();
    store.set("group.x", Value::from(1i64)).unwrap();

    assert!(matches!(
        store.set("leaf.child", Value::Null),
        Err(StoreError::PathConflict(_))
    ));
    assert!(matches!(store.get("group"), Err(StoreError::NotALeaf(_))));
    assert!(matches!(store.get("nothing"), Err(StoreError::KeyNotFound(_))));
    assert!(matches!(store.delete("nothing"), Err(StoreError::KeyNotFound(_))));
}

#[test]
fn corrupt_file_is_reported_with_path() {
    let fixture = StateFixture::new();
    std::fs::write(&fixture.path, b"STRATA\0\0\x01\0\0\0garbage").unwrap();
    match StateStore::open(&fixture.path, LoadMode::AllowMissing) {
        Err(StoreError::CorruptFile { path, .. }) => assert_eq!(path, fixture.path),
        other => panic!("expected CorruptFile, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn lazy_store_loads_on_first_access() {
    let fixture = StateFixture::new();
    populated_store().save(&fixture.path, 0).unwrap();

    let lazy = StateStore::open_lazy(&fixture.path, LoadMode::Require);
    assert_eq!(lazy.source(), Some(fixture.path.clone()));
    assert_eq!(lazy.get("values.int").unwrap(), Value::from(123i64));
}

#[test]
fn reset_with_files_removes_backups() {
    let fixture = StateFixture::new();
    let store = populated_store();
    store.save(&fixture.path, 3).unwrap();
    store.set("more", Value::from(true)).unwrap();
    store.save(&fixture.path, 3).unwrap();

    store.reset(true).unwrap();
    assert!(!fixture.path.exists());
    assert!(!fixture.backup(1).exists());
    assert!(store.is_empty().unwrap());
}

#[test]
fn concurrent_writers_share_one_tree() {
    let store = StateStore::new();
    std::thread::scope(|s| {
        for t in 0..8 {
            let handle = store.clone();
            s.spawn(move || {
                for i in 0..50 {
                    handle
                        .set(&format!("threads.t{}.i{}", t, i), Value::from(i as i64))
                        .unwrap();
                }
            });
        }
    });
    assert_eq!(store.len().unwrap(), 400);
    assert_eq!(store.children("threads").unwrap().len(), 8);
}
