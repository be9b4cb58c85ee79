//! Integration tests for the metadata store.

mod common;

use std::sync::Arc;
use std::thread;

use common::init_tracing;
use pagepool::{Error, ErrorKind, MetadataStore};
use tempfile::tempdir;

fn key(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

/// set, get, delete on the zero key.
#[test]
fn test_set_get_delete_scenario() {
    init_tracing();
    let dir = tempdir().unwrap();
    let store = MetadataStore::open(dir.path().join("meta")).unwrap();

    store.set(&[0x00; 8], &[0x01; 8]).unwrap();
    assert_eq!(store.get(&[0x00; 8]).unwrap(), Some([0x01; 8]));

    let before = store.free_size();
    store.delete(&[0x00; 8]).unwrap();
    assert_eq!(store.get(&[0x00; 8]).unwrap(), None);
    assert_eq!(store.free_size(), before + 16);
}

/// 255 distinct keys fit; the 256th does not, but overwrites still do.
#[test]
fn test_capacity_is_255_keys() {
    init_tracing();
    let dir = tempdir().unwrap();
    let store = MetadataStore::open(dir.path().join("meta")).unwrap();

    for n in 0..255 {
        store.set(&key(n), &key(n * 2)).unwrap();
    }
    assert_eq!(store.len(), 255);
    assert_eq!(store.free_size(), 8);

    let err = store.set(&key(255), &key(0)).unwrap_err();
    assert!(matches!(err, Error::StoreFull { needed: 16, free: 8 }));
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(store.get(&key(255)).unwrap(), None);

    store.set(&key(10), &key(999)).unwrap();
    assert_eq!(store.get(&key(10)).unwrap(), Some(key(999)));
    assert_eq!(store.free_size(), 8);

    store.delete(&key(0)).unwrap();
    store.set(&key(255), &key(0)).unwrap();
    assert_eq!(store.len(), 255);
}

/// Setting the same key twice costs space once.
#[test]
fn test_set_is_idempotent_on_space() {
    let dir = tempdir().unwrap();
    let store = MetadataStore::open(dir.path().join("meta")).unwrap();

    store.set(&key(1), &key(1)).unwrap();
    let after_first = store.free_size();
    store.set(&key(1), &key(1)).unwrap();
    assert_eq!(store.free_size(), after_first);
}

/// free_size after 255 sets matches what a reopen recovers.
#[test]
fn test_free_size_survives_reopen() {
    init_tracing();
    let dir = tempdir().unwrap();
    let path = dir.path().join("meta");

    let live = {
        let store = MetadataStore::open(&path).unwrap();
        for n in 0..255 {
            store.set(&key(n), &key(n + 1)).unwrap();
        }
        let live = store.free_size();
        store.close().unwrap();
        live
    };

    let store = MetadataStore::open(&path).unwrap();
    assert_eq!(store.free_size(), live);
    assert_eq!(store.len(), 255);
    for n in 0..255 {
        assert_eq!(store.get(&key(n)).unwrap(), Some(key(n + 1)));
    }
}

/// Every mutation is on disk before it returns, even without close.
#[test]
fn test_mutations_durable_without_close() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("meta");

    let store = MetadataStore::open(&path).unwrap();
    store.set(b"cataloga", b"00000001").unwrap();
    store.set(b"catalogb", b"00000002").unwrap();
    store.delete(b"cataloga").unwrap();

    // A second handle on the same file sees the latest page.
    let reader = MetadataStore::open(&path).unwrap();
    assert_eq!(reader.get(b"cataloga").unwrap(), None);
    assert_eq!(reader.get(b"catalogb").unwrap(), Some(*b"00000002"));
    drop(store);
}

/// Concurrent writers on disjoint keys all land.
#[test]
fn test_concurrent_writers() {
    let dir = tempdir().unwrap();
    let store = Arc::new(MetadataStore::open(dir.path().join("meta")).unwrap());

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..20u64 {
                    let k = key(t * 100 + i);
                    store.set(&k, &key(t)).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 80);
    assert_eq!(store.free_size(), 4088 - 80 * 16);
    assert_eq!(store.get(&key(305)).unwrap(), Some(key(3)));
}
