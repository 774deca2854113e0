//! Prompt bundle cache with LRU eviction.
//!
//! Wraps another [`PromptStore`] and keeps parsed bundles in memory, keyed by
//! path. An entry is reloaded when the file's modification time changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime};

use tracing::debug;

use crate::conditioning::{PromptBundle, PromptStore};
use crate::error::Result;

/// Maximum number of bundles to keep in cache.
const DEFAULT_MAX_ENTRIES: usize = 8;

/// A cached bundle with access timestamp.
struct CacheEntry {
    bundle: Arc<PromptBundle>,
    modified: Option<SystemTime>,
    last_accessed: Instant,
}

/// Prompt store that caches the bundles of an inner store.
pub struct CachedPromptStore<S> {
    inner: S,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
    max_entries: usize,
}

impl<S: PromptStore> CachedPromptStore<S> {
    /// Creates a new cache with default capacity.
    pub fn new(inner: S) -> Self {
        Self::with_capacity(inner, DEFAULT_MAX_ENTRIES)
    }

    /// Creates a new cache with specified capacity.
    pub fn with_capacity(inner: S, max_entries: usize) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Returns the number of cached bundles.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Checks if a bundle path is cached.
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }

    /// Clears all entries from the cache.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Evicts the least recently used entry.
    fn evict_lru(entries: &mut HashMap<PathBuf, CacheEntry>) {
        let oldest_key = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(k, _)| k.clone());

        if let Some(key) = oldest_key {
            debug!(path = %key.display(), "evicting prompt bundle");
            entries.remove(&key);
        }
    }
}

impl<S: PromptStore> PromptStore for CachedPromptStore<S> {
    fn load_bundle(&self, path: &Path) -> Result<Arc<PromptBundle>> {
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();

        {
            let mut entries = self.lock();
            if let Some(entry) = entries.get_mut(path) {
                if entry.modified == modified {
                    entry.last_accessed = Instant::now();
                    return Ok(Arc::clone(&entry.bundle));
                }
            }
        }

        // Inner load runs unlocked.
        let bundle = self.inner.load_bundle(path)?;

        let mut entries = self.lock();
        if entries.len() >= self.max_entries && !entries.contains_key(path) {
            Self::evict_lru(&mut entries);
        }
        entries.insert(
            path.to_path_buf(),
            CacheEntry {
                bundle: Arc::clone(&bundle),
                modified,
                last_accessed: Instant::now(),
            },
        );

        Ok(bundle)
    }
}
