//! Buffer Manager - the core page caching layer.
//!
//! The [`BufferManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting
//! - Dirty page write-back on eviction and explicit flush
//! - Pluggable eviction policies

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::buffer::replacer::ReplacementPolicy;
use crate::buffer::{BufferPoolStats, PinnedPage};
use crate::common::config::{capacity_for, BufferManagerOptions};
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;
use crate::storage::DiskManager;

/// Bookkeeping guarded by the structural lock.
struct PoolState {
    /// Resident pages. An entry exists exactly while the page is in memory.
    page_table: HashMap<PageId, Arc<Page>>,
    /// Pin counts of pinned pages. Absence means zero.
    pin_count: HashMap<PageId, usize>,
    /// Tracks exactly the resident pages with pin count zero.
    policy: Box<dyn ReplacementPolicy>,
}

/// Caches pages of one file under a fixed memory budget.
///
/// # Architecture
/// ```text
/// ┌───────────────────────────────────────────────────────────┐
/// │                     BufferManager                         │
/// │  ┌────────────── state: Mutex<PoolState> ──────────────┐  │
/// │  │ page_table        pin_count         policy          │  │
/// │  │ PageId → Arc<Page> PageId → usize   dyn Replacement │  │
/// │  └─────────────────────────────────────────────────────┘  │
/// │  ┌──────────────────────┐   ┌──────────────────────────┐  │
/// │  │ disk: Mutex<Disk..>  │   │ stats (atomics)          │  │
/// │  └──────────────────────┘   └──────────────────────────┘  │
/// └───────────────────────────────────────────────────────────┘
/// ```
///
/// # Page States
/// ```text
/// NotResident ──pin/create──▶ Pinned(n ≥ 1) ──unpin to 0──▶ Unpinned
///      ▲                        │    ▲                          │
///      └──delete (n == 1)───────┘    └──────────pin─────────────┤
///      ▲                                                        │
///      └──────────────────────────evict─────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `state`: one structural lock over page table, pin counts and policy.
///   It is held through the disk read of a miss and the write-back of an
///   eviction victim, so no thread ever sees a page that is resident with
///   pin count zero but missing from the policy.
/// - `flush`/`flush_all` look pages up under the structural lock and write
///   them outside it, holding only the page latch and the disk lock.
/// - Lock order is structural lock → page latch → disk lock.
/// - Callers must only hold a page latch while they hold a pin on that page;
///   latching an unpinned page can deadlock against eviction.
///
/// # Usage
/// ```
/// use pagepool::{BufferManager, BufferManagerOptions, PageId};
///
/// let dir = tempfile::tempdir().unwrap();
/// let bm = BufferManager::open(dir.path().join("pages.db"), BufferManagerOptions::default()).unwrap();
///
/// let page = bm.create_page(PageId::new(0)).unwrap();
/// page.set_bytes(0, b"hello").unwrap();
/// bm.unpin(&page).unwrap();
/// bm.flush(PageId::new(0)).unwrap();
///
/// let page = bm.pin(PageId::new(0)).unwrap();
/// assert_eq!(page.get_bytes(0, 5).unwrap(), b"hello");
/// bm.unpin(&page).unwrap();
/// ```
pub struct BufferManager {
    state: Mutex<PoolState>,

    /// Handles all disk I/O.
    disk: Mutex<DiskManager>,

    /// Performance statistics.
    stats: BufferPoolStats,

    page_size: usize,

    /// Maximum resident pages (immutable after construction).
    capacity: usize,
}

impl BufferManager {
    /// Open a buffer manager over `path`, creating the file if absent.
    ///
    /// `capacity` is `max_size_bytes / page_size`. Any pages already tracked
    /// by `policy` are discarded.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` for a page size that cannot hold a header or a
    ///   budget below one page
    /// - I/O errors from opening the file
    pub fn new<P: AsRef<Path>>(
        path: P,
        page_size: usize,
        max_size_bytes: usize,
        mut policy: Box<dyn ReplacementPolicy>,
    ) -> Result<Self> {
        let capacity = capacity_for(page_size, max_size_bytes)?;
        let disk = DiskManager::open(path, page_size)?;

        while policy.evict().is_some() {}

        debug!(
            page_size,
            capacity,
            policy = policy.name(),
            "buffer.open"
        );

        Ok(Self {
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(capacity),
                pin_count: HashMap::new(),
                policy,
            }),
            disk: Mutex::new(disk),
            stats: BufferPoolStats::new(),
            page_size,
            capacity,
        })
    }

    /// Open a buffer manager from [`BufferManagerOptions`].
    pub fn open<P: AsRef<Path>>(path: P, options: BufferManagerOptions) -> Result<Self> {
        Self::new(
            path,
            options.page_size,
            options.max_size_bytes,
            options.policy.build(),
        )
    }

    // ========================================================================
    // Public API: Pin and unpin
    // ========================================================================

    /// Pin a page, loading it from disk if it is not resident.
    ///
    /// A page slot that was never written comes back as a clean zero-filled
    /// page at version 0.
    ///
    /// # Errors
    /// - `Error::BufferPoolFull` if the pool is full and every page is pinned
    /// - `Error::PageOffsetOverflow` if the page lies beyond any file offset
    /// - `Error::ChecksumMismatch` / `Error::PageNumberMismatch` if the stored
    ///   image is corrupt
    /// - I/O errors from the read or from writing back an eviction victim
    pub fn pin(&self, page_id: PageId) -> Result<Arc<Page>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(page) = state.page_table.get(&page_id) {
            let page = Arc::clone(page);
            let count = state.pin_count.entry(page_id).or_insert(0);
            *count += 1;
            if *count == 1 {
                state.policy.remove(page_id);
            }
            self.stats.record_hit();
            trace!(page_num = page_id.0, pins = *count, "buffer.pin_hit");
            return Ok(page);
        }

        page_id.offset(self.page_size)?;
        self.stats.record_miss();
        self.ensure_free_slot(state)?;

        let page = self.load_page(page_id)?;
        let page = Arc::new(page);
        state.page_table.insert(page_id, Arc::clone(&page));
        state.pin_count.insert(page_id, 1);

        trace!(page_num = page_id.0, "buffer.pin_miss");
        Ok(page)
    }

    /// Unpin a page previously returned by `pin` or `create_page`.
    ///
    /// When the last pin is released the page becomes evictable. It is not
    /// written to disk until it is flushed or evicted.
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the page holds no pins, or if `page` is a
    /// stale handle to a page that has since left the pool.
    pub fn unpin(&self, page: &Page) -> Result<()> {
        let page_id = page.page_id();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let is_current = state
            .page_table
            .get(&page_id)
            .is_some_and(|resident| std::ptr::eq(Arc::as_ptr(resident), page));
        if !is_current {
            return Err(Error::PageNotPinned(page_id.0));
        }

        let remaining = match state.pin_count.get_mut(&page_id) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => return Err(Error::PageNotPinned(page_id.0)),
        };

        if remaining == 0 {
            state.pin_count.remove(&page_id);
            state.policy.add(page_id);
        }

        trace!(page_num = page_id.0, pins = remaining, "buffer.unpin");
        Ok(())
    }

    /// Pin a page and wrap it in a guard that unpins on drop.
    pub fn pin_guarded(&self, page_id: PageId) -> Result<PinnedPage<'_>> {
        let page = self.pin(page_id)?;
        Ok(PinnedPage::new(self, page))
    }

    // ========================================================================
    // Public API: Create and delete pages
    // ========================================================================

    /// Create a zero-filled page in memory, pinned once.
    ///
    /// Nothing is written until the page is flushed or evicted. The caller
    /// must make sure `page_id` does not already hold data on disk; it would
    /// be overwritten at the next write-back.
    ///
    /// # Errors
    /// - `Error::PageAlreadyResident` if the page is already in the pool
    /// - `Error::PageOffsetOverflow` if the page lies beyond any file offset
    /// - `Error::BufferPoolFull` if the pool is full and every page is pinned
    pub fn create_page(&self, page_id: PageId) -> Result<Arc<Page>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.page_table.contains_key(&page_id) {
            return Err(Error::PageAlreadyResident(page_id.0));
        }

        page_id.offset(self.page_size)?;
        self.ensure_free_slot(state)?;

        let page = Arc::new(Page::create(page_id, self.page_size));
        state.page_table.insert(page_id, Arc::clone(&page));
        state.pin_count.insert(page_id, 1);
        self.stats.record_create();

        debug!(page_num = page_id.0, "buffer.create_page");
        Ok(page)
    }

    /// Create a page and wrap it in a guard that unpins on drop.
    pub fn create_page_guarded(&self, page_id: PageId) -> Result<PinnedPage<'_>> {
        let page = self.create_page(page_id)?;
        Ok(PinnedPage::new(self, page))
    }

    /// Drop a page from the pool without writing it.
    ///
    /// The caller must hold the only pin, which this call consumes, and must
    /// not hold the page latch. Unflushed changes are discarded: the dropped
    /// copy is marked clean, so a `flush` that resolved it earlier writes
    /// nothing. Bytes already on disk are left in place.
    ///
    /// # Errors
    /// - `Error::PageSharedPin` if other pins are outstanding
    /// - `Error::PageNotPinned` if the page is not pinned (or `page` is stale)
    pub fn delete_page(&self, page: &Page) -> Result<()> {
        let page_id = page.page_id();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let is_current = state
            .page_table
            .get(&page_id)
            .is_some_and(|resident| std::ptr::eq(Arc::as_ptr(resident), page));

        match state.pin_count.get(&page_id).copied() {
            Some(1) if is_current => {}
            Some(pin_count) if is_current => {
                return Err(Error::PageSharedPin {
                    page_num: page_id.0,
                    pin_count,
                })
            }
            _ => return Err(Error::PageNotPinned(page_id.0)),
        }

        state.pin_count.remove(&page_id);
        state.page_table.remove(&page_id);
        state.policy.remove(page_id);
        page.latch().discard();
        self.stats.record_delete();

        debug!(page_num = page_id.0, "buffer.delete_page");
        Ok(())
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write a page to disk if it is resident and dirty, then sync.
    ///
    /// # Errors
    /// I/O errors from the write or sync. The page stays dirty on failure.
    pub fn flush(&self, page_id: PageId) -> Result<()> {
        let page = {
            let state = self.state.lock();
            match state.page_table.get(&page_id) {
                Some(page) => Arc::clone(page),
                None => return Ok(()),
            }
        };

        if self.write_back(&page)? {
            debug!(page_num = page_id.0, "buffer.flush");
        }
        Ok(())
    }

    /// Flush every dirty resident page.
    ///
    /// # Errors
    /// Stops at the first I/O error.
    pub fn flush_all(&self) -> Result<()> {
        let pages: Vec<Arc<Page>> = {
            let state = self.state.lock();
            state.page_table.values().cloned().collect()
        };

        let mut written = 0usize;
        for page in &pages {
            if self.write_back(page)? {
                written += 1;
            }
        }

        debug!(written, resident = pages.len(), "buffer.flush_all");
        Ok(())
    }

    /// Flush everything and release the file.
    pub fn close(self) -> Result<()> {
        self.flush_all()?;
        self.disk.lock().sync()?;
        debug!(stats = %self.stats.snapshot(), "buffer.close");
        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Maximum number of resident pages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Page size of the backing file.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Name of the eviction policy in use.
    pub fn policy_name(&self) -> &'static str {
        self.state.lock().policy.name()
    }

    /// Number of resident pages.
    pub fn resident_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Whether the page is currently cached.
    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Whether the page is resident, unpinned and known to the policy.
    pub fn is_evictable(&self, page_id: PageId) -> bool {
        self.state.lock().policy.contains(page_id)
    }

    /// Pin count of a resident page, or `None` if the page isn't resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<usize> {
        let state = self.state.lock();
        if !state.page_table.contains_key(&page_id) {
            return None;
        }
        Some(state.pin_count.get(&page_id).copied().unwrap_or(0))
    }

    // ========================================================================
    // Internal: Loading, eviction and write-back
    // ========================================================================

    /// Read a page image from disk and verify it.
    fn load_page(&self, page_id: PageId) -> Result<Page> {
        let raw = self.disk.lock().read_page(page_id)?;

        match raw {
            Some(bytes) => {
                self.stats.record_read();
                Page::new(page_id, &bytes, false).inspect_err(|err| {
                    warn!(page_num = page_id.0, %err, "buffer.load_corrupt");
                })
            }
            None => Ok(Page::unwritten(page_id, self.page_size)),
        }
    }

    /// Make room for one more resident page, evicting if at capacity.
    ///
    /// A victim whose write-back fails stays resident and dirty and goes back
    /// into the policy through `add`, which for LRU makes it the most recent
    /// candidate. The next eviction therefore tries a different page first.
    fn ensure_free_slot(&self, state: &mut PoolState) -> Result<()> {
        while state.page_table.len() >= self.capacity {
            let victim = state.policy.evict().ok_or(Error::BufferPoolFull {
                capacity: self.capacity,
            })?;

            let Some(page) = state.page_table.get(&victim).cloned() else {
                // The policy only ever tracks resident pages.
                warn!(page_num = victim.0, "buffer.evict_stale_candidate");
                continue;
            };

            if let Err(err) = self.write_back(&page) {
                state.policy.add(victim);
                return Err(err);
            }

            state.page_table.remove(&victim);
            self.stats.record_eviction();
            debug!(page_num = victim.0, "buffer.evict");
        }
        Ok(())
    }

    /// Write a page if dirty. Returns whether anything was written.
    ///
    /// The latch is held across checksum refresh and disk write so that the
    /// image on disk is the one whose checksum was just computed, and a failed
    /// write leaves the page dirty.
    fn write_back(&self, page: &Page) -> Result<bool> {
        let mut contents = page.latch();
        if !contents.is_dirty() {
            return Ok(false);
        }

        let image = contents.get_for_write();
        if let Err(err) = self.disk.lock().write_page(page.page_id(), &image) {
            contents.restore_dirty();
            warn!(page_num = page.page_num(), %err, "buffer.write_back_failed");
            return Err(err);
        }

        self.stats.record_write();
        Ok(true)
    }
}
