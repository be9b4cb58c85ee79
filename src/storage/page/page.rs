//! Page - the fundamental unit of storage.
//!
//! A [`Page`] is the in-memory form of one fixed-size block of the backing
//! file: a [`PageHeader`] plus an opaque payload. Its mutable state lives
//! behind a per-page latch so concurrent writers see a single sequential
//! order of reads and writes.

use parking_lot::{Mutex, MutexGuard};

use crate::common::config::validate_page_size;
use crate::common::{Error, PageId, Result};

use super::page_header::PageHeader;

/// A resident page.
///
/// The page number and size are fixed at construction. Everything else
/// (payload, version, checksum, dirty flag) is reached through the latch,
/// either implicitly via the convenience methods on `Page` or explicitly by
/// holding [`Page::latch`] across a read-modify-write sequence.
///
/// # Example
/// ```
/// use pagepool::{Page, PageId};
///
/// let page = Page::create(PageId::new(3), 128);
/// page.set_bytes(0, b"abc").unwrap();
/// assert_eq!(page.get_bytes(0, 3).unwrap(), b"abc");
/// assert_eq!(page.version(), 1);
///
/// // Read-modify-write under one latch acquisition.
/// {
///     let mut contents = page.latch();
///     let mut counter = contents.get_bytes(0, 1).unwrap();
///     counter[0] += 1;
///     contents.set_bytes(0, &counter).unwrap();
/// }
/// assert_eq!(page.get_bytes(0, 1).unwrap(), b"b");
/// ```
pub struct Page {
    page_id: PageId,
    page_size: usize,
    latch: Mutex<PageContents>,
}

/// The latch-protected part of a [`Page`].
///
/// Obtained through [`Page::latch`]; the latch is released when the guard
/// drops, including on early returns with `?`.
#[derive(Debug)]
pub struct PageContents {
    page_id: PageId,
    version: u64,
    checksum: u64,
    dirty: bool,
    payload: Box<[u8]>,
}

impl Page {
    /// Build a page from raw bytes, or initialize a fresh one.
    ///
    /// `raw_bytes.len()` is the page size. With `create` set the contents of
    /// `raw_bytes` are ignored and a zeroed page is produced; otherwise the
    /// header is parsed and the checksum validated.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if the page cannot hold a header
    /// - `Error::ChecksumMismatch` / `Error::PageNumberMismatch` if the stored
    ///   bytes fail verification
    pub fn new(page_id: PageId, raw_bytes: &[u8], create: bool) -> Result<Self> {
        validate_page_size(raw_bytes.len())?;
        if create {
            Ok(Self::create(page_id, raw_bytes.len()))
        } else {
            Self::from_bytes(page_id, raw_bytes)
        }
    }

    /// Create a fresh zero-filled page at version 0.
    ///
    /// The page starts dirty: it has never been written, so its checksum is
    /// not yet meaningful and the first flush must compute it.
    ///
    /// # Panics
    /// Panics if `page_size` cannot hold a header.
    pub fn create(page_id: PageId, page_size: usize) -> Self {
        Self::blank(page_id, page_size, true)
    }

    /// Zero-filled page at version 0 standing in for a slot that was never
    /// written. It stays clean until mutated, so pinning a hole never causes
    /// a write by itself.
    pub(crate) fn unwritten(page_id: PageId, page_size: usize) -> Self {
        Self::blank(page_id, page_size, false)
    }

    fn blank(page_id: PageId, page_size: usize, dirty: bool) -> Self {
        assert!(page_size > PageHeader::SIZE, "page too small for PageHeader");

        let contents = PageContents {
            page_id,
            version: 0,
            checksum: 0,
            dirty,
            payload: vec![0u8; page_size - PageHeader::SIZE].into_boxed_slice(),
        };

        Self {
            page_id,
            page_size,
            latch: Mutex::new(contents),
        }
    }

    /// Parse and verify a page image read from disk.
    fn from_bytes(page_id: PageId, raw: &[u8]) -> Result<Self> {
        let header = PageHeader::from_bytes(raw);
        let computed = PageHeader::compute_checksum(raw);
        if header.checksum != computed {
            return Err(Error::ChecksumMismatch {
                page_num: page_id.0,
                stored: header.checksum,
                computed,
            });
        }
        if header.page_num != page_id.0 {
            return Err(Error::PageNumberMismatch {
                expected: page_id.0,
                found: header.page_num,
            });
        }

        let contents = PageContents {
            page_id,
            version: header.version,
            checksum: header.checksum,
            dirty: false,
            payload: raw[PageHeader::SIZE..].to_vec().into_boxed_slice(),
        };

        Ok(Self {
            page_id,
            page_size: raw.len(),
            latch: Mutex::new(contents),
        })
    }

    /// Acquire the page latch.
    ///
    /// Hold the returned guard for the whole of a read-modify-write sequence.
    /// The latch is not reentrant: while holding it, use the guard's methods
    /// rather than the convenience methods on `Page`.
    #[inline]
    pub fn latch(&self) -> MutexGuard<'_, PageContents> {
        self.latch.lock()
    }

    /// Page id.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Page number as written in the header.
    #[inline]
    pub fn page_num(&self) -> u64 {
        self.page_id.0
    }

    /// Full page size, header included.
    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Usable payload bytes.
    #[inline]
    pub fn payload_size(&self) -> usize {
        self.page_size - PageHeader::SIZE
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.latch().version
    }

    /// Checksum as of the last write-out (or load).
    pub fn checksum(&self) -> u64 {
        self.latch().checksum
    }

    /// Whether the page was mutated since its last write-out.
    pub fn is_dirty(&self) -> bool {
        self.latch().dirty
    }

    /// Write `data` into the payload at `offset`.
    pub fn set_bytes(&self, offset: usize, data: &[u8]) -> Result<()> {
        self.latch().set_bytes(offset, data)
    }

    /// Copy `length` payload bytes starting at `offset`.
    pub fn get_bytes(&self, offset: usize, length: usize) -> Result<Vec<u8>> {
        self.latch().get_bytes(offset, length)
    }

    /// Produce the full page image for disk, refreshing the checksum if dirty.
    pub fn get_for_write(&self) -> Vec<u8> {
        self.latch().get_for_write()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("page_id", &self.page_id)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl PageContents {
    /// Write `data` into the payload at `offset`.
    ///
    /// Bumps the version and marks the page dirty. The checksum is left
    /// stale until [`get_for_write`](Self::get_for_write).
    ///
    /// # Errors
    /// `Error::OutOfRange` if `offset + data.len()` exceeds the payload.
    pub fn set_bytes(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = self.check_range(offset, data.len())?;
        self.payload[offset..end].copy_from_slice(data);
        self.version += 1;
        self.dirty = true;
        Ok(())
    }

    /// Copy `length` payload bytes starting at `offset`.
    ///
    /// # Errors
    /// `Error::OutOfRange` if the range exceeds the payload.
    pub fn get_bytes(&self, offset: usize, length: usize) -> Result<Vec<u8>> {
        let end = self.check_range(offset, length)?;
        Ok(self.payload[offset..end].to_vec())
    }

    /// Produce the full page image for disk.
    ///
    /// If the page is dirty the checksum is recomputed over the new image and
    /// the page becomes clean; the caller is expected to write the bytes out
    /// immediately. Calling it again without a mutation in between returns
    /// identical bytes.
    pub fn get_for_write(&mut self) -> Vec<u8> {
        let mut image = vec![0u8; PageHeader::SIZE + self.payload.len()];
        image[PageHeader::SIZE..].copy_from_slice(&self.payload);

        let mut header = PageHeader {
            page_num: self.page_id.0,
            version: self.version,
            checksum: self.checksum,
        };

        if self.dirty {
            header.write_to(&mut image);
            header.checksum = PageHeader::compute_checksum(&image);
            self.checksum = header.checksum;
            self.dirty = false;
        }

        header.write_to(&mut image);
        image
    }

    /// Current version.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Checksum as of the last write-out (or load).
    #[inline]
    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    /// Whether the page was mutated since its last write-out.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Put the dirty flag back after a write-out that never reached disk.
    pub(crate) fn restore_dirty(&mut self) {
        self.dirty = true;
    }

    /// Drop pending changes of a copy that left the pool without a write.
    pub(crate) fn discard(&mut self) {
        self.dirty = false;
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<usize> {
        match offset.checked_add(len) {
            Some(end) if end <= self.payload.len() => Ok(end),
            _ => Err(Error::OutOfRange {
                offset,
                len,
                payload_size: self.payload.len(),
            }),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;

    const PAGE_SIZE: usize = 128;

    fn written_image(page: &Page) -> Vec<u8> {
        page.get_for_write()
    }

    #[test]
    fn test_create_page() {
        let page = Page::create(PageId::new(5), PAGE_SIZE);
        assert_eq!(page.page_num(), 5);
        assert_eq!(page.page_size(), PAGE_SIZE);
        assert_eq!(page.payload_size(), PAGE_SIZE - 24);
        assert_eq!(page.version(), 0);
        assert!(page.is_dirty());
        assert_eq!(page.get_bytes(0, page.payload_size()).unwrap(), vec![0u8; 104]);
    }

    #[test]
    fn test_new_with_create_ignores_raw_bytes() {
        let raw = vec![0xFFu8; PAGE_SIZE];
        let page = Page::new(PageId::new(1), &raw, true).unwrap();
        assert_eq!(page.get_bytes(0, 4).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_new_rejects_tiny_page() {
        let raw = vec![0u8; 24];
        let err = Page::new(PageId::new(0), &raw, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_set_bytes_bumps_version_not_checksum() {
        let page = Page::create(PageId::new(0), PAGE_SIZE);
        written_image(&page);
        let checksum = page.checksum();

        page.set_bytes(10, b"hello").unwrap();
        page.set_bytes(0, b"x").unwrap();

        assert_eq!(page.version(), 2);
        assert!(page.is_dirty());
        assert_eq!(page.checksum(), checksum);
        assert_eq!(page.get_bytes(10, 5).unwrap(), b"hello");
    }

    #[test]
    fn test_set_bytes_out_of_range() {
        let page = Page::create(PageId::new(0), PAGE_SIZE);
        let payload = page.payload_size();

        assert!(page.set_bytes(payload - 2, b"ab").is_ok());
        let err = page.set_bytes(payload - 1, b"ab").unwrap_err();
        assert!(matches!(err, Error::OutOfRange { .. }));
        assert!(page.set_bytes(usize::MAX, b"a").is_err());

        // Failed write leaves the version alone.
        assert_eq!(page.version(), 1);
    }

    #[test]
    fn test_get_bytes_out_of_range() {
        let page = Page::create(PageId::new(0), PAGE_SIZE);
        assert!(page.get_bytes(0, page.payload_size() + 1).is_err());
        assert!(page.get_bytes(page.payload_size(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_get_for_write_cleans_and_is_idempotent() {
        let page = Page::create(PageId::new(9), PAGE_SIZE);
        page.set_bytes(0, &[1, 2, 3]).unwrap();

        let first = page.get_for_write();
        assert!(!page.is_dirty());
        let second = page.get_for_write();
        assert_eq!(first, second);

        let header = PageHeader::from_bytes(&first);
        assert_eq!(header.page_num, 9);
        assert_eq!(header.version, 1);
        assert_eq!(header.checksum, page.checksum());
        assert!(header.verify_checksum(&first));
        assert_eq!(&first[24..27], &[1, 2, 3]);
    }

    #[test]
    fn test_load_roundtrip() {
        let page = Page::create(PageId::new(4), PAGE_SIZE);
        page.set_bytes(50, b"persist").unwrap();
        let image = page.get_for_write();

        let loaded = Page::new(PageId::new(4), &image, false).unwrap();
        assert_eq!(loaded.version(), 1);
        assert_eq!(loaded.checksum(), page.checksum());
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.get_bytes(50, 7).unwrap(), b"persist");
    }

    #[test]
    fn test_load_detects_flipped_bit() {
        let page = Page::create(PageId::new(2), PAGE_SIZE);
        page.set_bytes(0, b"data").unwrap();
        let image = page.get_for_write();

        for byte in [0usize, 9, 17, 30, PAGE_SIZE - 1] {
            let mut corrupted = image.clone();
            corrupted[byte] ^= 0x01;
            let err = Page::new(PageId::new(2), &corrupted, false).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Corruption, "byte {}", byte);
        }
    }

    #[test]
    fn test_load_detects_misplaced_page() {
        let page = Page::create(PageId::new(2), PAGE_SIZE);
        let image = page.get_for_write();

        let err = Page::new(PageId::new(3), &image, false).unwrap_err();
        assert!(matches!(
            err,
            Error::PageNumberMismatch { expected: 3, found: 2 }
        ));
    }

    #[test]
    fn test_latch_read_modify_write() {
        use std::sync::Arc;
        use std::thread;

        let page = Arc::new(Page::create(PageId::new(0), PAGE_SIZE));
        let mut handles = vec![];

        for _ in 0..8 {
            let page = Arc::clone(&page);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let mut contents = page.latch();
                    let current = contents.get_bytes(0, 2).unwrap();
                    let next = u16::from_be_bytes([current[0], current[1]]) + 1;
                    contents.set_bytes(0, &next.to_be_bytes()).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(page.get_bytes(0, 2).unwrap(), 800u16.to_be_bytes());
        assert_eq!(page.version(), 800);
    }
}
