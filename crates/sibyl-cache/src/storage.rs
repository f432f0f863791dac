//! Cache storage: an in-memory `HashMap` mirrored to one JSON file.
//!
//! Every insert rewrites the whole mapping. The new contents go to a
//! temporary file in the same directory which then atomically replaces the
//! cache file, so a crash mid-write leaves the previous version intact.

use crate::CacheKey;
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_slice, to_writer};
use sibyl_core::{Completion, Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufWriter, ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// A stored completion. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Trimmed completion text
    pub text: String,
    /// Full response payload, kept for auditing
    pub raw: Value,
}

impl CacheEntry {
    /// Creates a new entry.
    pub fn new<T: Into<String>>(text: T, raw: Value) -> Self {
        Self {
            text: text.into(),
            raw,
        }
    }
}

impl From<Completion> for CacheEntry {
    fn from(completion: Completion) -> Self {
        Self {
            text: completion.text,
            raw: completion.raw,
        }
    }
}

/// Append-only, write-through response cache.
#[derive(Debug)]
pub struct ResponseCache {
    path: PathBuf,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl ResponseCache {
    /// Opens the cache stored at `path`.
    ///
    /// Only a file that does not exist yields an empty cache; its parent
    /// directory is created. Any other read failure is returned.
    ///
    /// # Errors
    /// Returns `CorruptCache` if the file exists but cannot be deserialized,
    /// or an IO error if it cannot be read or the directory cannot be created.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();

        match fs::read(&path) {
            Ok(bytes) => {
                let entries: HashMap<CacheKey, CacheEntry> =
                    from_slice(&bytes).map_err(|source| Error::CorruptCache {
                        path: path.clone(),
                        source,
                    })?;
                info!("Loaded {} cached responses from {}", entries.len(), path.display());
                Ok(Self { path, entries })
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(parent_dir(&path))?;
                info!("No response cache at {}, starting empty", path.display());
                Ok(Self {
                    path,
                    entries: HashMap::new(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Looks up a stored completion.
    pub fn lookup(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Stores a completion and persists the whole cache before returning.
    ///
    /// Entries are write-once: inserting under an existing key keeps the
    /// original entry and does not touch the file.
    ///
    /// # Errors
    /// Returns an error if the cache file cannot be written. The in-memory
    /// mapping is left as it was before the call.
    pub fn insert(&mut self, key: CacheKey, entry: CacheEntry) -> Result<()> {
        if self.entries.contains_key(&key) {
            debug!("Cache entry {} already present, keeping it", key.short());
            return Ok(());
        }

        debug!("Caching response under {}", key.short());
        self.entries.insert(key.clone(), entry);

        if let Err(error) = self.persist() {
            self.entries.remove(&key);
            return Err(error);
        }

        debug!("Cache now holds {} entries", self.entries.len());
        Ok(())
    }

    /// Writes the full mapping to a temporary file and swaps it into place.
    fn persist(&self) -> Result<()> {
        let ordered: BTreeMap<&CacheKey, &CacheEntry> = self.entries.iter().collect();

        let mut temp_file = NamedTempFile::new_in(parent_dir(&self.path))?;
        {
            let mut writer = BufWriter::new(temp_file.as_file_mut());
            to_writer(&mut writer, &ordered)?;
            writer.flush()?;
        }
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.path).map_err(|error| error.error)?;
        sync_dir(parent_dir(&self.path))?;

        Ok(())
    }

    /// Returns the location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&CacheKey, &CacheEntry)> {
        self.entries.iter()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            text_bytes: self.entries.values().map(|entry| entry.text.len()).sum(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in the cache
    pub entries: usize,
    /// Total size of the cached completion texts in bytes
    pub text_bytes: usize,
}

/// Directory holding `path`, treating a bare file name as the current directory.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Flushes directory metadata so a completed rename survives power loss.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

/// Directories cannot be opened for syncing on this platform.
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
