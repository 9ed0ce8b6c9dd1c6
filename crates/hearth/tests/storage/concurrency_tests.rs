use super::test_utilities::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use test_log::test;

#[test]
fn test_concurrent_sets_on_distinct_keys() {
    let config = TestConfig::new("concurrent_distinct");
    for (label, store) in blob_stores(&config.temp_dir) {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for j in 0..20 {
                        let key = format!("db/{i}-{j}");
                        store.set_bytes(&key, key.as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..8 {
            for j in 0..20 {
                let key = format!("db/{i}-{j}");
                assert_eq!(store.get_bytes(&key).unwrap(), key.as_bytes(), "{label}");
            }
        }
    }
}

#[test]
fn test_reader_never_sees_partial_blob() {
    let config = TestConfig::new("concurrent_partial");
    let small = vec![b'a'; 1024];
    let large = vec![b'b'; 256 * 1024];

    for (label, store) in blob_stores(&config.temp_dir) {
        store.set_bytes("db/hot", &small).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            let (small, large) = (small.clone(), large.clone());
            thread::spawn(move || {
                for i in 0..50 {
                    let content = if i % 2 == 0 { &large } else { &small };
                    store.set_bytes("db/hot", content).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        while !done.load(Ordering::SeqCst) {
            let read = store.get_bytes("db/hot").unwrap();
            assert!(read == small || read == large, "{label}: torn read of {} bytes", read.len());
        }
        writer.join().unwrap();
    }
}

#[test]
fn test_concurrent_meta_writers_and_readers() {
    let config = TestConfig::new("concurrent_meta");
    for (label, store) in meta_stores(&config.temp_dir) {
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let mut previous: Option<String> = None;
                    for i in 0..25 {
                        let cid = format!("w{w}-{i}");
                        let parents: Vec<&str> = previous.iter().map(String::as_str).collect();
                        let meta = envelope(&cid, "data", &parents);
                        store.set("shared", "", &meta, &raw(&meta)).unwrap();
                        previous = Some(cid);
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    let items = store.meta("shared", "").unwrap();
                    assert!(items.len() <= 8);
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        // each writer's chain collapses to its head
        let mut heads: Vec<String> = store
            .meta("shared", "")
            .unwrap()
            .into_iter()
            .map(|m| m.cid)
            .collect();
        heads.sort();
        assert_eq!(heads, vec!["w0-24", "w1-24", "w2-24", "w3-24"], "{label}");
    }
}
