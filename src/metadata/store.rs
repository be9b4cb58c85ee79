//! Single-page metadata store.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::common::config::{
    FIXED_KEY_SIZE, FIXED_VAL_SIZE, MAX_METADATA_ITEMS, METADATA_COUNT_SIZE, METADATA_ENTRY_SIZE,
    METADATA_PAGE_SIZE,
};
use crate::common::{Error, Result};

/// Fixed-width metadata key.
pub type MetadataKey = [u8; FIXED_KEY_SIZE];

/// Fixed-width metadata value.
pub type MetadataValue = [u8; FIXED_VAL_SIZE];

/// A durable key/value store that fits in one page.
///
/// # Page Layout
/// ```text
/// Offset        Size  Field
/// ------        ----  -----
/// 0             8     num_items (big-endian)
/// 8 + 16*i      8     key i
/// 16 + 16*i     8     value i
/// ...                 zero padding up to 4096
/// ```
///
/// # Durability
/// Every mutation rewrites the whole page and syncs it before returning, so
/// the file always holds exactly one complete page image. If the write fails
/// the in-memory state is rolled back to match the disk.
///
/// # Thread Safety
/// One lock covers the file, the map and the free-byte counter; every
/// operation is fully serialized.
///
/// # Example
/// ```
/// use pagepool::MetadataStore;
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = MetadataStore::open(dir.path().join("meta")).unwrap();
///
/// store.set(&[0u8; 8], &[1u8; 8]).unwrap();
/// assert_eq!(store.get(&[0u8; 8]).unwrap(), Some([1u8; 8]));
///
/// store.delete(&[0u8; 8]).unwrap();
/// assert_eq!(store.get(&[0u8; 8]).unwrap(), None);
/// store.close().unwrap();
/// ```
pub struct MetadataStore {
    path: PathBuf,
    inner: Mutex<StoreState>,
}

struct StoreState {
    file: File,
    entries: BTreeMap<MetadataKey, MetadataValue>,
    free_bytes: usize,
}

impl MetadataStore {
    /// Open the store at `path`, creating it if absent, and recover its
    /// contents.
    ///
    /// A file shorter than one page is treated as uninitialized: it is
    /// overwritten with a zero page, which is synced before `open` returns.
    ///
    /// # Errors
    /// - `Error::MetadataCorrupt` if the page claims more items than fit or
    ///   repeats a key
    /// - I/O errors from opening, reading or initializing the file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.metadata()?.len() < METADATA_PAGE_SIZE as u64 {
            write_image(&mut file, &[0u8; METADATA_PAGE_SIZE])?;
            debug!(path = %path.display(), "metadata.init");
        }

        let mut image = vec![0u8; METADATA_PAGE_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut image)?;

        let entries = decode_page(&image)?;
        let free_bytes = free_bytes_for(entries.len());

        debug!(
            path = %path.display(),
            items = entries.len(),
            free_bytes,
            "metadata.open"
        );

        Ok(Self {
            path,
            inner: Mutex::new(StoreState {
                file,
                entries,
                free_bytes,
            }),
        })
    }

    /// Look up a key. Served from memory.
    ///
    /// # Errors
    /// `Error::InvalidKeyLength` if `key` is not 8 bytes.
    pub fn get(&self, key: &[u8]) -> Result<Option<MetadataValue>> {
        let key = fixed::<FIXED_KEY_SIZE>("key", key)?;
        Ok(self.inner.lock().entries.get(&key).copied())
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert or overwrite a key, durably.
    ///
    /// Overwriting an existing key costs no space.
    ///
    /// # Errors
    /// - `Error::InvalidKeyLength` if `key` or `value` is not 8 bytes
    /// - `Error::StoreFull` if the key is new and the page has no room
    /// - I/O errors from the rewrite; the store is unchanged in that case
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let key = fixed::<FIXED_KEY_SIZE>("key", key)?;
        let value = fixed::<FIXED_VAL_SIZE>("value", value)?;

        let mut guard = self.inner.lock();
        let state = &mut *guard;

        let needed = if state.entries.contains_key(&key) {
            0
        } else {
            METADATA_ENTRY_SIZE
        };
        if needed > state.free_bytes {
            return Err(Error::StoreFull {
                needed,
                free: state.free_bytes,
            });
        }

        let previous = state.entries.insert(key, value);
        if let Err(err) = state.persist() {
            match previous {
                Some(old) => state.entries.insert(key, old),
                None => state.entries.remove(&key),
            };
            warn!(%err, "metadata.set_rolled_back");
            return Err(err);
        }

        state.free_bytes -= needed;
        trace!(new_key = previous.is_none(), free_bytes = state.free_bytes, "metadata.set");
        Ok(())
    }

    /// Remove a key, durably. No-op if the key is absent.
    ///
    /// # Errors
    /// - `Error::InvalidKeyLength` if `key` is not 8 bytes
    /// - I/O errors from the rewrite; the key is kept in that case
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let key = fixed::<FIXED_KEY_SIZE>("key", key)?;

        let mut guard = self.inner.lock();
        let state = &mut *guard;

        let Some(old) = state.entries.remove(&key) else {
            return Ok(());
        };

        if let Err(err) = state.persist() {
            state.entries.insert(key, old);
            warn!(%err, "metadata.delete_rolled_back");
            return Err(err);
        }

        state.free_bytes += METADATA_ENTRY_SIZE;
        trace!(free_bytes = state.free_bytes, "metadata.delete");
        Ok(())
    }

    /// Bytes still available for new entries.
    pub fn free_size(&self) -> usize {
        self.inner.lock().free_bytes
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the page one last time and release the file.
    pub fn close(self) -> Result<()> {
        let mut state = self.inner.into_inner();
        state.persist()?;
        debug!(path = %self.path.display(), items = state.entries.len(), "metadata.close");
        Ok(())
    }
}

impl StoreState {
    /// Rewrite the whole page from the in-memory map and sync it.
    fn persist(&mut self) -> Result<()> {
        let image = encode_page(&self.entries);
        write_image(&mut self.file, &image)
    }
}

fn free_bytes_for(items: usize) -> usize {
    METADATA_PAGE_SIZE - METADATA_COUNT_SIZE - items * METADATA_ENTRY_SIZE
}

fn fixed<const N: usize>(what: &'static str, bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| Error::InvalidKeyLength {
        what,
        expected: N,
        actual: bytes.len(),
    })
}

fn encode_page(entries: &BTreeMap<MetadataKey, MetadataValue>) -> Vec<u8> {
    let mut image = vec![0u8; METADATA_PAGE_SIZE];
    image[..METADATA_COUNT_SIZE].copy_from_slice(&(entries.len() as u64).to_be_bytes());

    let mut offset = METADATA_COUNT_SIZE;
    for (key, value) in entries {
        image[offset..offset + FIXED_KEY_SIZE].copy_from_slice(key);
        offset += FIXED_KEY_SIZE;
        image[offset..offset + FIXED_VAL_SIZE].copy_from_slice(value);
        offset += FIXED_VAL_SIZE;
    }
    image
}

fn decode_page(image: &[u8]) -> Result<BTreeMap<MetadataKey, MetadataValue>> {
    let mut count = [0u8; METADATA_COUNT_SIZE];
    count.copy_from_slice(&image[..METADATA_COUNT_SIZE]);
    let num_items = u64::from_be_bytes(count);
    if num_items > MAX_METADATA_ITEMS as u64 {
        return Err(Error::MetadataCorrupt(format!(
            "{num_items} items claimed, at most {MAX_METADATA_ITEMS} fit"
        )));
    }

    let mut entries = BTreeMap::new();
    for i in 0..num_items as usize {
        let start = METADATA_COUNT_SIZE + i * METADATA_ENTRY_SIZE;
        let key = fixed::<FIXED_KEY_SIZE>("key", &image[start..start + FIXED_KEY_SIZE])?;
        let value = fixed::<FIXED_VAL_SIZE>(
            "value",
            &image[start + FIXED_KEY_SIZE..start + METADATA_ENTRY_SIZE],
        )?;
        if entries.insert(key, value).is_some() {
            return Err(Error::MetadataCorrupt(format!("entry {i} repeats an earlier key")));
        }
    }
    Ok(entries)
}

fn write_image(file: &mut File, image: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(image)?;
    file.sync_all()?;
    Ok(())
}
