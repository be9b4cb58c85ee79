//! Page identifier type.

use std::fmt;

use crate::common::{Error, Result};

/// Identifies a page in the backing file.
///
/// Page `n` occupies bytes `[n * page_size, (n + 1) * page_size)`. The number
/// is also written into the first 8 bytes of the page header, so it is a
/// `u64` to match the on-disk field.
///
/// # Example
/// ```
/// use pagepool::PageId;
///
/// let page_id = PageId::new(42);
/// assert_eq!(page_id.0, 42);
/// assert_eq!(page_id.offset(4096).unwrap(), 42 * 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(id: u64) -> Self {
        PageId(id)
    }

    /// Byte offset of this page in a file of `page_size`-byte pages.
    ///
    /// # Errors
    /// `Error::PageOffsetOverflow` if the page's last byte does not fit in a
    /// `u64` offset.
    pub fn offset(&self, page_size: usize) -> Result<u64> {
        let size = page_size as u64;
        self.0
            .checked_mul(size)
            .filter(|start| start.checked_add(size).is_some())
            .ok_or(Error::PageOffsetOverflow {
                page_num: self.0,
                page_size,
            })
    }
}

impl From<u64> for PageId {
    fn from(id: u64) -> Self {
        PageId(id)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_new() {
        let pid = PageId::new(42);
        assert_eq!(pid.0, 42);
        assert_eq!(PageId::from(42), pid);
    }

    #[test]
    fn test_page_id_offset() {
        assert_eq!(PageId::new(0).offset(512).unwrap(), 0);
        assert_eq!(PageId::new(3).offset(512).unwrap(), 1536);
    }

    #[test]
    fn test_page_id_offset_overflow() {
        let err = PageId::new(u64::MAX / 2).offset(256).unwrap_err();
        assert!(matches!(
            err,
            Error::PageOffsetOverflow { page_num, page_size: 256 } if page_num == u64::MAX / 2
        ));

        // Start fits but the page's end does not.
        let last = u64::MAX / 512;
        assert!(PageId::new(last).offset(512).is_err());
        assert!(PageId::new(last - 1).offset(512).is_ok());
    }

    #[test]
    fn test_page_id_ordering() {
        assert!(PageId::new(1) < PageId::new(2));
        assert!(PageId::new(5) > PageId::new(3));
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
    }
}
