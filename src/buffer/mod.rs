//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between callers and the page
//! file. It keeps at most `capacity` pages resident and writes dirty pages
//! back when they are evicted or flushed.
//!
//! # Components
//! - [`BufferManager`] - The page cache
//! - [`PinnedPage`] - RAII guard that unpins on drop
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy implementations

mod buffer_manager;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_manager::BufferManager;
pub use page_guard::PinnedPage;
pub use stats::{BufferPoolStats, StatsSnapshot};
