use super::test_utilities::*;
use hearth::storage::MetaStore;
use hearth::storage::file::{FileMetaStore, SyncMode};
use std::collections::HashSet;
use test_log::test;

fn cids(store: &dyn MetaStore, name: &str) -> HashSet<String> {
    store
        .meta(name, "")
        .unwrap()
        .into_iter()
        .map(|m| m.cid)
        .collect()
}

#[test]
fn test_meta_store_basic_flow() {
    let config = TestConfig::new("meta_basic");
    for (label, store) in meta_stores(&config.temp_dir) {
        assert!(store.databases().unwrap().is_empty(), "{label}");
        assert!(store.meta("dne", "").unwrap().is_empty(), "{label}");

        let first = envelope("cid", "data", &[]);
        store.set("db1", "", &first, &raw(&first)).unwrap();

        let items = store.meta("db1", "").unwrap();
        assert_eq!(items.len(), 1, "{label}");
        assert_eq!(items[0].cid, "cid", "{label}");
        assert_eq!(items[0].data, "data", "{label}");

        let second = envelope("cid2", "data2", &[]);
        store.set("db1", "", &second, &raw(&second)).unwrap();
        assert_eq!(store.meta("db1", "").unwrap().len(), 2, "{label}");

        // "db1" is not a metadata key, so no database is known yet
        assert!(store.databases().unwrap().is_empty(), "{label}");
    }
}

#[test]
fn test_resubmitting_cid_keeps_latest() {
    let config = TestConfig::new("meta_idempotent");
    for (label, store) in meta_stores(&config.temp_dir) {
        let first = envelope("cid", "first", &[]);
        let second = envelope("cid", "second", &[]);
        store.set(&config.database, "", &first, &raw(&first)).unwrap();
        store
            .set(&config.database, "", &second, &raw(&second))
            .unwrap();

        let items = store.meta(&config.database, "").unwrap();
        assert_eq!(items.len(), 1, "{label}");
        assert_eq!(items[0].data, "second", "{label}");
    }
}

#[test]
fn test_parent_pruning() {
    let config = TestConfig::new("meta_prune");
    for (label, store) in meta_stores(&config.temp_dir) {
        let a = envelope("c1", "a", &[]);
        let side = envelope("side", "s", &[]);
        let b = envelope("c2", "b", &["c1"]);
        store.set("db1", "", &a, &raw(&a)).unwrap();
        store.set("db1", "", &side, &raw(&side)).unwrap();
        let outcome = store.set("db1", "", &b, &raw(&b)).unwrap();

        assert_eq!(outcome.pruned, vec!["c1".to_string()], "{label}");
        let remaining = cids(store.as_ref(), "db1");
        assert!(!remaining.contains("c1"), "{label}");
        assert!(remaining.contains("c2"), "{label}");
        assert!(remaining.contains("side"), "{label}");
    }
}

#[test]
fn test_pruning_is_scoped_to_database() {
    let config = TestConfig::new("meta_prune_scope");
    for (label, store) in meta_stores(&config.temp_dir) {
        let a = envelope("c1", "a", &[]);
        store.set("db1", "", &a, &raw(&a)).unwrap();
        store.set("db2", "", &a, &raw(&a)).unwrap();

        let b = envelope("c2", "b", &["c1"]);
        store.set("db1", "", &b, &raw(&b)).unwrap();

        assert!(cids(store.as_ref(), "db2").contains("c1"), "{label}");
        assert!(!cids(store.as_ref(), "db1").contains("c1"), "{label}");
    }
}

#[test]
fn test_delete() {
    let config = TestConfig::new("meta_delete");
    for (label, store) in meta_stores(&config.temp_dir) {
        let a = envelope("c1", "a", &[]);
        store.set("db1", "", &a, &raw(&a)).unwrap();
        store.delete("db1", "", "c1").unwrap();
        assert!(store.meta("db1", "").unwrap().is_empty(), "{label}");

        // absent envelopes and databases are fine
        store.delete("db1", "", "c1").unwrap();
        store.delete("nope", "", "c1").unwrap();
    }
}

#[test]
fn test_branch_does_not_partition() {
    let config = TestConfig::new("meta_branch");
    for (label, store) in meta_stores(&config.temp_dir) {
        let a = envelope("c1", "a", &[]);
        store.set("db1", "main", &a, &raw(&a)).unwrap();
        assert_eq!(store.meta("db1", "other").unwrap().len(), 1, "{label}");
    }
}

#[test]
fn test_database_versions_projection() {
    let config = TestConfig::new("meta_versions");
    for (label, store) in meta_stores(&config.temp_dir) {
        let a = envelope("c1", "a", &[]);
        store.set("fp.todos.0.17", "", &a, &raw(&a)).unwrap();
        store.set("fp.todos.0.18", "", &a, &raw(&a)).unwrap();
        store.set("fp.notes.1.0", "", &a, &raw(&a)).unwrap();
        store.set("fp.broken", "", &a, &raw(&a)).unwrap();

        let databases = store.databases().unwrap();
        let pairs: Vec<(&str, &str)> = databases
            .iter()
            .map(|d| (d.name.as_str(), d.version.as_str()))
            .collect();
        assert_eq!(pairs, vec![("notes", "1.0"), ("todos", "0.18")], "{label}");
    }
}

#[test]
fn test_file_store_restart_recovers_versions_and_envelopes() {
    let config = TestConfig::new("meta_restart");
    let meta_dir = config.temp_dir.path().join("meta");
    let a = envelope("c1", "a", &["p0"]);
    let raw_a = br#"{"cid":"c1","data":"a","parents":["p0"]}"#;

    {
        let store = FileMetaStore::new(&meta_dir, SyncMode::Immediate).unwrap();
        store.init().unwrap();
        store.set("fp.todos.0.18", "", &a, raw_a).unwrap();
    }

    let store = FileMetaStore::new(&meta_dir, SyncMode::Immediate).unwrap();
    store.init().unwrap();
    let databases = store.databases().unwrap();
    assert_eq!(databases.len(), 1);
    assert_eq!(databases[0].name, "todos");
    assert_eq!(databases[0].version, "0.18");

    let items = store.meta("fp.todos.0.18", "").unwrap();
    assert_eq!(items, vec![a]);
    assert_eq!(
        std::fs::read(meta_dir.join("fp.todos.0.18").join("c1")).unwrap(),
        raw_a
    );
}

#[test]
fn test_prune_failure_does_not_fail_write() {
    let config = TestConfig::new("meta_prune_failure");
    let meta_dir = config.temp_dir.path().join("meta");
    let store = FileMetaStore::new(&meta_dir, SyncMode::None).unwrap();
    store.init().unwrap();

    let a = envelope("c1", "a", &[]);
    store.set("db1", "", &a, &raw(&a)).unwrap();

    // a directory where the parent envelope should be cannot be unlinked
    std::fs::create_dir(meta_dir.join("db1").join("stuck")).unwrap();
    let b = envelope("c2", "b", &["c1", "stuck"]);
    let outcome = store.set("db1", "", &b, &raw(&b)).unwrap();

    assert_eq!(outcome.pruned, vec!["c1".to_string()]);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].0, "stuck");
    assert!(meta_dir.join("db1").join("c2").exists());
    assert_eq!(store.meta("db1", "").unwrap().len(), 1);
}
