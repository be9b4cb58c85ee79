//! RAII guard for pinned pages.
//!
//! [`PinnedPage`] holds one pin on a page and releases it when dropped, so a
//! pin can't leak on an early return.

use std::ops::Deref;
use std::sync::Arc;

use tracing::warn;

use crate::common::PageId;
use crate::storage::page::Page;

use super::buffer_manager::BufferManager;

/// A pin on a page that is released on drop.
///
/// Obtained from [`BufferManager::pin_guarded`] or
/// [`BufferManager::create_page_guarded`]. Derefs to [`Page`]; mutate through
/// [`Page::latch`] or the page's `set_bytes`.
///
/// # Example
/// ```ignore
/// let page = bm.pin_guarded(PageId::new(3))?;
/// page.set_bytes(0, b"hi")?;
/// // guard drops here, page unpinned
/// ```
pub struct PinnedPage<'a> {
    /// Reference back to the manager for unpin on drop.
    bm: &'a BufferManager,
    page: Arc<Page>,
}

impl<'a> PinnedPage<'a> {
    pub(crate) fn new(bm: &'a BufferManager, page: Arc<Page>) -> Self {
        Self { bm, page }
    }

    /// Get the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    /// Shared handle to the page. The handle does not carry a pin of its own.
    #[inline]
    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }
}

impl Deref for PinnedPage<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.page
    }
}

impl Drop for PinnedPage<'_> {
    fn drop(&mut self) {
        // The guard owns exactly one pin, so this only fails if someone
        // unpinned on our behalf.
        if let Err(err) = self.bm.unpin(&self.page) {
            warn!(page_num = self.page.page_num(), %err, "buffer.guard_unpin_failed");
        }
    }
}
