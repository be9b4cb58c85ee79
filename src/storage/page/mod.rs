//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - A resident page with its latch
//! - [`PageContents`] - The latch-protected payload and header state
//! - [`PageHeader`] - Metadata at the start of every page

#[allow(clippy::module_inception)]
mod page;
mod page_header;

pub use page::{Page, PageContents};
pub use page_header::PageHeader;
