//! Disk Manager - low-level file I/O for buffer pool pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading page images
//! - Writing page images durably, extending the file as needed
//! - Tracking the file length

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::common::config::validate_page_size;
use crate::common::{Error, PageId, Result};

/// Manages disk I/O for a single page file.
///
/// # File Layout
/// The file is a flat array of fixed-size pages:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0       P       2P      ...       N×P
/// ```
///
/// Page N is located at file offset `N × page_size`. The page size is not
/// recorded in the file; reopening with a different size is the caller's
/// mistake to avoid.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BufferManager` serializes
/// access to it behind a mutex.
///
/// # Durability
/// Every write is followed by `sync_all()`; a write that returns `Ok` is on
/// stable storage.
pub struct DiskManager {
    file: File,
    page_size: usize,
    /// Current length of the file in bytes.
    file_len: u64,
}

impl DiskManager {
    /// Open a page file, creating it if it doesn't exist.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if `page_size` cannot hold a header
    /// - I/O errors from opening the file
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        validate_page_size(page_size)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        let file_len = file.metadata()?.len();
        debug!(
            path = %path.as_ref().display(),
            page_size,
            file_len,
            "disk.open"
        );

        Ok(Self {
            file,
            page_size,
            file_len,
        })
    }

    /// Read the raw image of a page.
    ///
    /// Returns `None` if the page has never been written: either it lies past
    /// the end of the file, or it is an all-zero hole left behind when a later
    /// page extended the file. A real page image always carries a non-zero
    /// checksum, so it can never be all zeros.
    ///
    /// # Errors
    /// - `Error::PageOffsetOverflow` if the page is not addressable
    /// - I/O errors from the seek or read
    pub fn read_page(&mut self, page_id: PageId) -> Result<Option<Vec<u8>>> {
        let offset = page_id.offset(self.page_size)?;
        if offset + self.page_size as u64 > self.file_len {
            return Ok(None);
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; self.page_size];
        self.file.read_exact(&mut buf)?;

        if buf.iter().all(|&b| b == 0) {
            return Ok(None);
        }
        Ok(Some(buf))
    }

    /// Write a full page image and sync it to disk.
    ///
    /// Writing past the end of the file extends it; any skipped pages read
    /// back as holes.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if `data` is not exactly one page
    /// - `Error::PageOffsetOverflow` if the page is not addressable
    /// - I/O errors from the write or the sync
    pub fn write_page(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        if data.len() != self.page_size {
            return Err(Error::InvalidConfig(format!(
                "page image is {} bytes, expected {}",
                data.len(),
                self.page_size
            )));
        }

        let offset = page_id.offset(self.page_size)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.sync_all()?; // fsync for durability

        self.file_len = self.file_len.max(offset + self.page_size as u64);
        Ok(())
    }

    /// Sync all file data and metadata.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Number of page slots the file currently spans.
    #[inline]
    pub fn page_count(&self) -> u64 {
        self.file_len / self.page_size as u64
    }

    /// Get the total size of the file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        self.file_len
    }

    /// Swap the underlying handle, e.g. for a read-only one that makes every
    /// write fail.
    #[cfg(test)]
    pub(crate) fn replace_file(&mut self, file: File) -> File {
        std::mem::replace(&mut self.file, file)
    }
}
