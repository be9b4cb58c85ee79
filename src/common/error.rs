//! Error types for pagepool.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of an [`Error`].
///
/// Callers that only care about *what kind* of failure happened (for example
/// to decide whether to retry with fewer pinned pages) match on this instead
/// of the individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The buffer pool or metadata store has no room left.
    Capacity,
    /// A caller passed a malformed argument (bad length, offset, config).
    InvalidArgument,
    /// The call is not legal in the current pin state.
    InvalidState,
    /// On-disk bytes failed verification.
    Corruption,
    /// The operating system reported an I/O failure.
    Io,
}

/// All possible errors in pagepool.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every resident page is pinned, so nothing can be evicted.
    #[error("buffer pool is full: all {capacity} resident pages are pinned")]
    BufferPoolFull { capacity: usize },

    /// The metadata page has no room for another key.
    #[error("metadata store is full: {needed} bytes needed, {free} free")]
    StoreFull { needed: usize, free: usize },

    /// A metadata key or value had the wrong width.
    #[error("{what} must be exactly {expected} bytes, got {actual}")]
    InvalidKeyLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A byte range falls outside the page payload.
    #[error("range {offset}..{offset}+{len} is outside the {payload_size}-byte payload")]
    OutOfRange {
        offset: usize,
        len: usize,
        payload_size: usize,
    },

    /// The page's byte range does not fit in a 64-bit file offset.
    #[error("page {page_num} with {page_size}-byte pages is beyond the addressable file range")]
    PageOffsetOverflow { page_num: u64, page_size: usize },

    /// Invalid construction parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Attempted to unpin a page that wasn't pinned.
    ///
    /// This indicates a bug - unpinning should match pinning.
    #[error("page {0} is not pinned")]
    PageNotPinned(u64),

    /// Attempted to delete a page that other callers still hold.
    #[error("page {page_num} has {pin_count} pins; delete requires exactly one")]
    PageSharedPin { page_num: u64, pin_count: usize },

    /// Attempted to create a page that is already cached.
    #[error("page {0} is already resident")]
    PageAlreadyResident(u64),

    /// Stored checksum does not match the page contents.
    #[error("page {page_num} checksum mismatch: stored {stored:#x}, computed {computed:#x}")]
    ChecksumMismatch {
        page_num: u64,
        stored: u64,
        computed: u64,
    },

    /// The header names a different page than the slot it was read from.
    #[error("page slot {expected} holds a header for page {found}")]
    PageNumberMismatch { expected: u64, found: u64 },

    /// The metadata page cannot have been written by this store.
    #[error("metadata page is corrupt: {0}")]
    MetadataCorrupt(String),
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::BufferPoolFull { .. } | Error::StoreFull { .. } => ErrorKind::Capacity,
            Error::InvalidKeyLength { .. }
            | Error::OutOfRange { .. }
            | Error::PageOffsetOverflow { .. }
            | Error::InvalidConfig(_) => ErrorKind::InvalidArgument,
            Error::PageNotPinned(_)
            | Error::PageSharedPin { .. }
            | Error::PageAlreadyResident(_) => ErrorKind::InvalidState,
            Error::ChecksumMismatch { .. }
            | Error::PageNumberMismatch { .. }
            | Error::MetadataCorrupt(_) => ErrorKind::Corruption,
        }
    }
}
