//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Once;

use pagepool::buffer::replacer::LruReplacer;
use pagepool::BufferManager;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub const PAGE_SIZE: usize = 256;

/// Install a test-captured subscriber once per test binary. `RUST_LOG` overrides
/// the default filter.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("pagepool=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_test_writer()
            .try_init();
    });
}

/// Open an LRU buffer manager holding `capacity` pages of `PAGE_SIZE`.
pub fn open_bm(path: &Path, capacity: usize) -> BufferManager {
    BufferManager::new(
        path,
        PAGE_SIZE,
        PAGE_SIZE * capacity,
        Box::new(LruReplacer::new()),
    )
    .unwrap()
}

/// Fresh temp dir plus a buffer manager over `test.db` inside it.
pub fn create_bm(capacity: usize) -> (BufferManager, TempDir) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let bm = open_bm(&dir.path().join("test.db"), capacity);
    (bm, dir)
}
