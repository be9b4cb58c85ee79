//! Eviction policy implementations (replacers).
//!
//! A replacer tracks exactly the pages that are resident and unpinned, and
//! picks one of them when the buffer manager needs room.
//!
//! Implementations:
//! - [`LruReplacer`] - Least recently unpinned first
//! - [`RandomReplacer`] - Uniformly random victim

mod lru;
mod random;

pub use lru::LruReplacer;
pub use random::RandomReplacer;

use crate::common::PageId;

/// Eviction strategy over the set of unpinned resident pages.
///
/// Implementations are single-threaded; the buffer manager only touches its
/// policy while holding its structural lock. All operations are O(1).
pub trait ReplacementPolicy: Send {
    /// Register a page whose pin count just dropped to zero.
    ///
    /// The page must not already be tracked.
    fn add(&mut self, page_id: PageId);

    /// Stop tracking a page that is about to be pinned or dropped.
    ///
    /// No-op if the page is not tracked.
    fn remove(&mut self, page_id: PageId);

    /// Remove and return the next victim, or `None` if nothing is tracked.
    fn evict(&mut self) -> Option<PageId>;

    /// Whether the page is currently tracked.
    fn contains(&self, page_id: PageId) -> bool;

    /// Number of tracked pages.
    fn len(&self) -> usize;

    /// Whether no page is tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short policy name for logs and stats.
    fn name(&self) -> &'static str;
}
