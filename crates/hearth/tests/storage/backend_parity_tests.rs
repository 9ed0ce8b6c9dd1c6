use super::test_utilities::*;
use hearth::StorageError;
use hearth::storage::StorageBackend;
use hearth::storage::file::SyncMode;
use test_log::test;

#[test]
fn test_memory_vs_file_basic_operations() {
    let config = TestConfig::new("parity_basic");
    let memory = StorageBackend::new_memory();
    let file = StorageBackend::new_file_with_paths(
        SyncMode::Immediate,
        config.temp_dir.path().join("data"),
        config.temp_dir.path().join("meta"),
    )
    .unwrap();

    let mut results = Vec::new();
    for backend in [&memory, &file] {
        let blobs = backend.create_blob_store().unwrap();
        let meta = backend.create_meta_store().unwrap();

        blobs.set_bytes("todos/bafy.car", b"car").unwrap();
        let a = envelope("c1", "a", &[]);
        let b = envelope("c2", "b", &["c1"]);
        meta.set("fp.todos.0.18", "", &a, &raw(&a)).unwrap();
        meta.set("fp.todos.0.18", "", &b, &raw(&b)).unwrap();

        results.push((
            blobs.get_bytes("todos/bafy.car").unwrap(),
            meta.meta("fp.todos.0.18", "").unwrap(),
            meta.databases().unwrap(),
        ));
    }

    assert_eq!(results[0], results[1]);
}

#[test]
fn test_second_file_backend_on_same_directory_is_rejected() {
    let config = TestConfig::new("parity_lock");
    let data_dir = config.temp_dir.path().join("data");
    let meta_dir = config.temp_dir.path().join("meta");

    let _first = StorageBackend::new_file_with_paths(SyncMode::None, &data_dir, &meta_dir).unwrap();
    let second = StorageBackend::new_file_with_paths(SyncMode::None, &data_dir, &meta_dir);

    match second {
        Err(StorageError::DirectoryLocked { pid, .. }) => {
            assert_eq!(pid, Some(std::process::id()));
        }
        other => panic!("expected directory lock error, got {other:?}"),
    }
}

#[test]
fn test_key_below_existing_blob_is_not_found_on_both_backends() {
    let config = TestConfig::new("parity_below_blob");
    for (label, store) in blob_stores(&config.temp_dir) {
        store.set_bytes("todos", b"x").unwrap();

        match store.get("todos/bafy") {
            Err(StorageError::NotFound { key }) => assert_eq!(key, "todos/bafy", "{label}"),
            Err(other) => panic!("{label}: expected NotFound, got {other:?}"),
            Ok(_) => panic!("{label}: expected NotFound, got a blob"),
        }
    }
}
