//! In-process store
//!
//! Records live in a `HashMap` behind one reader/writer lock; tags live in a
//! separate [`TagIndex`] with its own lock. Expiry is enforced lazily on every
//! read and physically reclaimed by a periodic sweep that rebuilds the map.

mod record;

use crate::config::MemoryConfig;
use crate::errors::{CacheError, Result};
use crate::recovery::NativeValue;
use crate::sweeper::Sweeper;
use crate::tags::TagIndex;
use crate::traits::{incr_by_compose, Cache, Cacheable};
use crate::ttl::{expires_at, Ttl};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use record::Record;

/// TTL cache holding values natively in process memory
pub struct MemoryCache {
    inner: Arc<MemoryInner>,
    sweeper: Mutex<Option<Sweeper>>,
}

struct MemoryInner {
    records: RwLock<HashMap<String, Record>>,
    tags: TagIndex,
    default_ttl: Duration,
}

impl MemoryCache {
    /// Create a cache and start its background sweep
    pub fn new(config: MemoryConfig) -> Result<Self> {
        let inner = Arc::new(MemoryInner {
            records: RwLock::new(HashMap::new()),
            tags: TagIndex::new(),
            default_ttl: config.default_ttl,
        });

        let sweep_inner = Arc::clone(&inner);
        let sweeper = Sweeper::spawn("memory-cache", config.sweep_interval, move || {
            let removed = sweep_inner.sweep();
            if removed > 0 {
                tracing::debug!("Swept {} expired memory cache records", removed);
            }
        })?;

        Ok(Self {
            inner,
            sweeper: Mutex::new(sweeper),
        })
    }

    /// Reclaim every expired record now; returns how many were dropped
    pub fn sweep(&self) -> usize {
        self.inner.sweep()
    }

    /// Resident records, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.inner.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the background sweep. Idempotent; also runs on drop.
    pub fn shutdown(&self) {
        if let Some(sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }
    }
}

impl MemoryInner {
    /// Filter-and-replace under the write lock, then drop the swept keys
    /// from the tag table before a re-put can retag them
    fn sweep(&self) -> usize {
        let now = SystemTime::now();
        let mut records = self.records.write();
        let (expired, live): (HashMap<String, Record>, HashMap<String, Record>) =
            std::mem::take(&mut *records)
                .into_iter()
                .partition(|(_, record)| record.is_expired(now));
        *records = live;

        let gone: Vec<String> = expired.into_keys().collect();
        self.tags.prune(&gone);
        gone.len()
    }

    fn remove(&self, keys: &[&str]) {
        let mut records = self.records.write();
        for key in keys {
            records.remove(*key);
        }
    }
}

impl Cache for MemoryCache {
    fn get<T: Cacheable>(&self, key: &str, dest: &mut T) -> Result<()> {
        let record = match self.inner.records.read().get(key) {
            Some(record) => record.clone(),
            None => return Err(CacheError::NotFound),
        };

        if record.is_expired(SystemTime::now()) {
            return Err(CacheError::Expired);
        }

        record.data.recover_into(dest)
    }

    fn put<T: Cacheable>(&self, key: &str, value: &T, ttl: Ttl) -> Result<()> {
        let record = Record::new(
            NativeValue::new(value.clone()),
            expires_at(ttl, self.inner.default_ttl),
        );
        self.inner.records.write().insert(key.to_string(), record);
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        let records = self.inner.records.read();
        records
            .get(key)
            .is_some_and(|record| !record.is_expired(SystemTime::now()))
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        self.inner.remove(&[key]);
        Ok(())
    }

    fn invalidate_multi(&self, keys: &[&str]) -> Result<()> {
        self.inner.remove(keys);
        Ok(())
    }

    fn incr(&self, key: &str, ttl: Ttl) -> Result<i64> {
        incr_by_compose(self, key, ttl)
    }

    fn tag(&self, key: &str, tags: &[&str]) -> Result<()> {
        self.inner.tags.tag(key, tags);
        Ok(())
    }

    fn invalidate_tags(&self, tags: &[&str]) -> Result<()> {
        let keys = self.inner.tags.take(tags);
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.invalidate_multi(&keys)
    }
}

impl Drop for MemoryCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("default_ttl", &self.inner.default_ttl)
            .field("entry_count", &self.len())
            .finish()
    }
}
