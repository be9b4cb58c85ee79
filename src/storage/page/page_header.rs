//! Page header.
//!
//! Every page starts with a [`PageHeader`] containing:
//! - the page number the page belongs to
//! - a version counter bumped on every mutation
//! - a CRC32 checksum for integrity

use crate::common::config::PAGE_HEADER_SIZE;

/// Metadata stored at the beginning of every page.
///
/// # Layout (24 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       8     page_num (big-endian)
/// 8       8     version (big-endian)
/// 16      8     checksum (CRC32 zero-extended, big-endian)
/// ```
///
/// # Checksum
/// The checksum is computed over the entire page (header and payload) with
/// the checksum field itself set to zero. A flipped bit anywhere on the page,
/// including the page number and version, is therefore detected.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// Page number this page was written for.
    pub page_num: u64,
    /// Number of mutations applied since the page was created.
    pub version: u64,
    /// Checksum of the page contents.
    pub checksum: u64,
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = PAGE_HEADER_SIZE;

    /// Offset of each field within the header.
    pub const OFFSET_PAGE_NUM: usize = 0;
    pub const OFFSET_VERSION: usize = 8;
    pub const OFFSET_CHECKSUM: usize = 16;

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        Self {
            page_num: read_u64(data, Self::OFFSET_PAGE_NUM),
            version: read_u64(data, Self::OFFSET_VERSION),
            checksum: read_u64(data, Self::OFFSET_CHECKSUM),
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_PAGE_NUM..Self::OFFSET_PAGE_NUM + 8]
            .copy_from_slice(&self.page_num.to_be_bytes());
        data[Self::OFFSET_VERSION..Self::OFFSET_VERSION + 8]
            .copy_from_slice(&self.version.to_be_bytes());
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 8]
            .copy_from_slice(&self.checksum.to_be_bytes());
    }

    /// Compute the checksum of a full page image.
    ///
    /// The checksum field (bytes 16-23) is hashed as zeros, so the checksum
    /// doesn't include itself.
    pub fn compute_checksum(page_data: &[u8]) -> u64 {
        let mut hasher = crc32fast::Hasher::new();

        hasher.update(&page_data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 8]);
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 8..]);

        u64::from(hasher.finalize())
    }

    /// Verify that the stored checksum matches the computed checksum.
    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_be_bytes(buf)
}

// ============================================================================
// TESTS
// ============================================================================
