//! pagepool - a page-granular buffer pool with pluggable eviction, plus a
//! single-page durable metadata store.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            pagepool                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌───────────────────────────────┐  ┌───────────────────────┐   │
//! │  │   Buffer Pool (buffer/)       │  │  Metadata (metadata/) │   │
//! │  │  BufferManager + PinnedPage   │  │  MetadataStore        │   │
//! │  │  ┌─────────────────────────┐  │  │  255 x (8B key,       │   │
//! │  │  │ Replacement: LRU|Random │  │  │         8B value)     │   │
//! │  │  └─────────────────────────┘  │  │  one 4KB page, synced │   │
//! │  └───────────────────────────────┘  └───────────────────────┘   │
//! │                 ↓                                               │
//! │  ┌───────────────────────────────┐                              │
//! │  │   Storage Layer (storage/)    │                              │
//! │  │ DiskManager + Page + Header   │                              │
//! │  └───────────────────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, Error, config)
//! - [`buffer`] - Buffer pool management and eviction policies
//! - [`storage`] - Disk I/O and the checksummed page format
//! - [`metadata`] - Durable fixed-width key/value page
//!
//! # Quick Start
//! ```
//! use pagepool::{BufferManager, BufferManagerOptions, PageId};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let bm = BufferManager::open(dir.path().join("data.db"), BufferManagerOptions::default()).unwrap();
//!
//! let page = bm.create_page(PageId::new(0)).unwrap();
//! page.set_bytes(0, b"hello").unwrap();
//! bm.unpin(&page).unwrap();
//! bm.flush(PageId::new(0)).unwrap();
//!
//! let again = bm.pin_guarded(PageId::new(0)).unwrap();
//! assert_eq!(again.get_bytes(0, 5).unwrap(), b"hello");
//! ```

pub mod buffer;
pub mod common;
pub mod metadata;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{BufferManagerOptions, PolicyKind, DEFAULT_PAGE_SIZE, PAGE_HEADER_SIZE};
pub use common::{Error, ErrorKind, PageId, Result};

pub use buffer::{BufferManager, BufferPoolStats, PinnedPage, StatsSnapshot};
pub use metadata::MetadataStore;
pub use storage::page::{Page, PageContents, PageHeader};
pub use storage::DiskManager;
