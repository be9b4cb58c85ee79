//! Configuration constants and options for the buffer pool and metadata store.

use crate::buffer::replacer::{LruReplacer, RandomReplacer, ReplacementPolicy};
use crate::common::{Error, Result};

/// Size of the on-disk page header in bytes.
///
/// # Layout
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       8     page number (big-endian)
/// 8       8     version (big-endian)
/// 16      8     checksum (big-endian)
/// ```
pub const PAGE_HEADER_SIZE: usize = 24;

/// Default page size in bytes (4KB).
///
/// Matches the OS page size on most systems, so a single page write is
/// a single block write on the device.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default buffer pool budget: 64 pages of 4KB.
pub const DEFAULT_MAX_SIZE_BYTES: usize = 64 * DEFAULT_PAGE_SIZE;

/// Size of the single page backing a [`MetadataStore`](crate::MetadataStore).
pub const METADATA_PAGE_SIZE: usize = 4096;

/// Fixed key width of the metadata store.
pub const FIXED_KEY_SIZE: usize = 8;

/// Fixed value width of the metadata store.
pub const FIXED_VAL_SIZE: usize = 8;

/// Bytes used by the `num_items` prefix of the metadata page.
pub const METADATA_COUNT_SIZE: usize = 8;

/// Bytes consumed by one key/value pair in the metadata page.
pub const METADATA_ENTRY_SIZE: usize = FIXED_KEY_SIZE + FIXED_VAL_SIZE;

/// Maximum number of distinct keys one metadata page can hold (255).
pub const MAX_METADATA_ITEMS: usize =
    (METADATA_PAGE_SIZE - METADATA_COUNT_SIZE) / METADATA_ENTRY_SIZE;

/// Which eviction strategy a [`BufferManager`](crate::BufferManager) uses.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// Evict the least recently unpinned page.
    #[default]
    Lru,
    /// Evict an arbitrary unpinned page. A fixed seed makes the choice
    /// reproducible.
    Random { seed: Option<u64> },
}

impl PolicyKind {
    /// Build a fresh, empty policy of this kind.
    pub fn build(self) -> Box<dyn ReplacementPolicy> {
        match self {
            PolicyKind::Lru => Box::new(LruReplacer::new()),
            PolicyKind::Random { seed: Some(seed) } => Box::new(RandomReplacer::with_seed(seed)),
            PolicyKind::Random { seed: None } => Box::new(RandomReplacer::new()),
        }
    }
}

/// Construction options for a [`BufferManager`](crate::BufferManager).
///
/// # Example
/// ```
/// use pagepool::{BufferManagerOptions, PolicyKind};
///
/// let options = BufferManagerOptions {
///     page_size: 512,
///     max_size_bytes: 512 * 8,
///     policy: PolicyKind::Lru,
/// };
/// assert_eq!(options.capacity().unwrap(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferManagerOptions {
    /// Size of every page in the backing file. Must match the value the file
    /// was created with; the file format does not record it.
    pub page_size: usize,
    /// Memory budget for resident pages.
    pub max_size_bytes: usize,
    /// Eviction strategy.
    pub policy: PolicyKind,
}

impl Default for BufferManagerOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            policy: PolicyKind::Lru,
        }
    }
}

impl BufferManagerOptions {
    /// Number of pages that may be resident at once.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the page cannot hold its own header or the
    /// budget is smaller than a single page.
    pub fn capacity(&self) -> Result<usize> {
        capacity_for(self.page_size, self.max_size_bytes)
    }
}

/// Resident-page capacity for a memory budget: `max_size_bytes / page_size`.
pub(crate) fn capacity_for(page_size: usize, max_size_bytes: usize) -> Result<usize> {
    validate_page_size(page_size)?;
    let capacity = max_size_bytes / page_size;
    if capacity == 0 {
        return Err(Error::InvalidConfig(format!(
            "max_size_bytes {} is smaller than one page of {} bytes",
            max_size_bytes, page_size
        )));
    }
    Ok(capacity)
}

/// Check that a page size leaves room for at least one payload byte.
pub(crate) fn validate_page_size(page_size: usize) -> Result<()> {
    if page_size <= PAGE_HEADER_SIZE {
        return Err(Error::InvalidConfig(format!(
            "page_size {} must exceed the {}-byte header",
            page_size, PAGE_HEADER_SIZE
        )));
    }
    Ok(())
}
