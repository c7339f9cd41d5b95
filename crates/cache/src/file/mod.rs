//! File-backed store
//!
//! Blobs are CBOR payloads under a 16 x 16 shard tree, addressed by the key's
//! identifier. A [`FileIndex`] tracks expiry and tags in memory and is
//! persisted on the sweep schedule, on [`FileCache::flush`] and on drop.
//! After a restart, blobs missing from the index are re-adopted with an
//! estimated expiry of `mtime + default_ttl`.

mod atomic;
mod index;
mod paths;

pub use paths::{blob_path, index_path, INDEX_KEY, SHARD_ALPHABET};

use crate::codec::{decode, encode};
use crate::config::FileConfig;
use crate::errors::{CacheError, Result};
use crate::hashing::{id, is_id};
use crate::sweeper::Sweeper;
use crate::traits::{incr_by_compose, Cache, Cacheable};
use crate::ttl::{expires_after, expires_at, Ttl};
use atomic::{is_temp_name, write_atomic};
use index::FileIndex;
use parking_lot::{Mutex, MutexGuard};
use paths::{create_shard_tree, shard_dirs};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// TTL cache persisting values as files under a root directory
pub struct FileCache {
    inner: Arc<FileInner>,
    sweeper: Mutex<Option<Sweeper>>,
}

struct FileInner {
    root: PathBuf,
    default_ttl: Duration,
    index: FileIndex,
    // One lock per first-level shard; held while a blob and its index
    // entry change together
    blob_locks: Box<[Mutex<()>]>,
}

/// Outcome of the startup directory scan
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Reconciliation {
    /// Un-indexed blobs adopted with an estimated expiry
    adopted: usize,
    /// Un-indexed blobs whose estimated expiry had already passed
    discarded: usize,
}

impl FileCache {
    /// Open (or create) a file cache rooted at `config.root`.
    ///
    /// Creates the shard tree, loads the persisted index, adopts blobs the
    /// index does not know about, and persists the reconciled index before
    /// returning. Un-indexed blobs whose estimated expiry has already passed
    /// are deleted from disk.
    pub fn open(config: FileConfig) -> Result<Self> {
        config.validate()?;
        create_shard_tree(&config.root)?;

        let index = FileIndex::load(index_path(&config.root))?;
        let inner = Arc::new(FileInner {
            root: config.root,
            default_ttl: config.default_ttl,
            index,
            blob_locks: SHARD_ALPHABET.iter().map(|_| Mutex::new(())).collect(),
        });

        let outcome = inner.reconcile()?;
        if outcome != Reconciliation::default() {
            tracing::debug!(
                "Reconciled file cache {}: adopted {}, discarded {}",
                inner.root.display(),
                outcome.adopted,
                outcome.discarded
            );
        }
        inner.index.persist()?;

        let sweep_inner = Arc::clone(&inner);
        let sweeper = Sweeper::spawn("file-cache", config.sweep_interval, move || {
            match sweep_inner.sweep() {
                Ok(0) => {}
                Ok(removed) => tracing::debug!("Swept {} expired file cache entries", removed),
                Err(e) => tracing::warn!("File cache sweep error: {}", e),
            }
        })?;

        Ok(Self {
            inner,
            sweeper: Mutex::new(sweeper),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Path of the blob that holds `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        blob_path(&self.inner.root, &id(key))
    }

    /// Reclaim expired entries and persist the index now; returns how many
    /// entries were dropped from the index
    pub fn sweep(&self) -> Result<usize> {
        self.inner.sweep()
    }

    /// Persist the index without sweeping
    pub fn flush(&self) -> Result<()> {
        self.inner.index.persist()
    }

    /// Indexed entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.inner.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the background sweep and persist the index. Idempotent; also
    /// runs on drop.
    pub fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }
        if let Err(e) = self.flush() {
            tracing::warn!("Failed to persist file cache index on shutdown: {}", e);
        }
    }
}

impl FileInner {
    fn blob_path(&self, id: &str) -> PathBuf {
        blob_path(&self.root, id)
    }

    fn lock_blob(&self, id: &str) -> MutexGuard<'_, ()> {
        let slot = id
            .as_bytes()
            .first()
            .and_then(|first| SHARD_ALPHABET.iter().position(|c| c == first))
            .unwrap_or(0);
        self.blob_locks[slot].lock()
    }

    /// Adopt blobs present on disk but absent from the index
    fn reconcile(&self) -> Result<Reconciliation> {
        let now = SystemTime::now();
        let mut outcome = Reconciliation::default();

        for dir in shard_dirs(&self.root) {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => return Err(CacheError::io(dir, "scan shard directory", e)),
            };

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => return Err(CacheError::io(&dir, "scan shard directory", e)),
                };
                let name = entry.file_name();
                let name = name.to_string_lossy();

                if is_temp_name(&name) {
                    // Left over from an interrupted write
                    remove_quietly(&entry.path());
                    continue;
                }
                if !is_id(&name) || self.index.contains(&name) {
                    continue;
                }

                let modified = match entry.metadata().and_then(|m| m.modified()) {
                    Ok(modified) => modified,
                    Err(e) => return Err(CacheError::io(entry.path(), "read blob metadata", e)),
                };
                let estimate = expires_after(modified, self.default_ttl);

                if estimate > now {
                    if self.index.insert_if_absent(&name, estimate) {
                        outcome.adopted += 1;
                    }
                } else {
                    remove_quietly(&entry.path());
                    outcome.discarded += 1;
                }
            }
        }

        Ok(outcome)
    }

    fn sweep(&self) -> Result<usize> {
        let expired = self.index.take_expired(SystemTime::now());

        for id in &expired {
            let _blob = self.lock_blob(id);
            // Re-put between the index filter and this point
            if self.index.contains(id) {
                continue;
            }
            self.index.untag(std::slice::from_ref(id));
            let path = self.blob_path(id);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!("Failed to remove expired blob {}: {}", path.display(), e);
                }
            }
        }

        self.index.persist()?;
        Ok(expired.len())
    }

    /// Forget `id` and delete its blob; a blob that is already gone is fine
    fn remove(&self, id: &str) -> Result<()> {
        let _blob = self.lock_blob(id);
        self.index.remove(id);
        let path = self.blob_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(path, "remove blob", e)),
        }
    }

    /// Remove every id even if some fail; reports the first failure
    fn remove_all(&self, ids: impl IntoIterator<Item = String>) -> Result<()> {
        let mut first_error = None;
        for id in ids {
            if let Err(e) = self.remove(&id) {
                tracing::warn!("Failed to invalidate {}: {}", id, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove stale cache file {}: {}", path.display(), e);
        }
    }
}

impl Cache for FileCache {
    fn get<T: Cacheable>(&self, key: &str, dest: &mut T) -> Result<()> {
        let id = id(key);
        self.inner.index.check(&id)?;

        let path = self.inner.blob_path(&id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Invalidated since the index check
                self.inner.index.check(&id)?;
                return Err(CacheError::io(path, "read blob", e));
            }
            Err(e) => return Err(CacheError::io(path, "read blob", e)),
        };

        *dest = decode(&bytes).map_err(|e| e.with_key(key))?;
        Ok(())
    }

    fn put<T: Cacheable>(&self, key: &str, value: &T, ttl: Ttl) -> Result<()> {
        let bytes = encode(value).map_err(|e| e.with_key(key))?;
        let id = id(key);

        // Blob first, so a live index entry never points at a missing file
        let _blob = self.inner.lock_blob(&id);
        write_atomic(&self.inner.blob_path(&id), &bytes)?;
        self.inner
            .index
            .insert(&id, expires_at(ttl, self.inner.default_ttl));
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.inner.index.is_live(&id(key))
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        self.inner.remove(&id(key))
    }

    fn invalidate_multi(&self, keys: &[&str]) -> Result<()> {
        self.inner.remove_all(keys.iter().map(|key| id(key)))
    }

    fn incr(&self, key: &str, ttl: Ttl) -> Result<i64> {
        incr_by_compose(self, key, ttl)
    }

    fn tag(&self, key: &str, tags: &[&str]) -> Result<()> {
        self.inner.index.tag(&id(key), tags);
        Ok(())
    }

    fn invalidate_tags(&self, tags: &[&str]) -> Result<()> {
        let ids = self.inner.index.take_tagged(tags);
        self.inner.remove_all(ids)
    }
}

impl Drop for FileCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("root", &self.inner.root)
            .field("default_ttl", &self.inner.default_ttl)
            .field("entry_count", &self.len())
            .finish()
    }
}
