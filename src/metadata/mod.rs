//! Metadata store - a durable key/value page.
//!
//! [`MetadataStore`] keeps up to 255 fixed-width (8-byte key, 8-byte value)
//! entries in a single 4KB page. It is independent of the buffer pool and
//! trades throughput for a simple durability story: every write rewrites
//! and syncs the entire page.

mod store;

pub use store::{MetadataKey, MetadataStore, MetadataValue};
