//! Persistent index of the file store
//!
//! Mirrors `id -> expiry` and `tag -> ids` in memory. Lookups and mutations
//! take the in-memory locks only; persistence encodes a snapshot and writes
//! it outside those locks.

use crate::codec::{decode, encode};
use crate::errors::{CacheError, Result};
use crate::file::atomic::write_atomic;
use crate::tags::{TagIndex, TagTable};
use crate::ttl::is_expired;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

/// On-disk form of the index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct IndexSnapshot {
    pub records: BTreeMap<String, SystemTime>,
    pub tags: TagTable,
}

pub(crate) struct FileIndex {
    path: PathBuf,
    records: RwLock<HashMap<String, SystemTime>>,
    tags: TagIndex,
    // Serializes writers of the index file
    persist_lock: Mutex<()>,
}

impl FileIndex {
    /// Load the index at `path`. A missing file yields an empty index; an
    /// unreadable payload is logged and replaced by an empty index.
    pub fn load(path: PathBuf) -> Result<Self> {
        let snapshot = match fs::read(&path) {
            Ok(bytes) => match decode::<IndexSnapshot>(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(
                        "Discarding unreadable cache index {}: {}",
                        path.display(),
                        e
                    );
                    IndexSnapshot::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexSnapshot::default(),
            Err(e) => return Err(CacheError::io(path, "read index file", e)),
        };

        tracing::debug!(
            "Loaded cache index {} with {} records and {} tags",
            path.display(),
            snapshot.records.len(),
            snapshot.tags.len()
        );

        Ok(Self {
            path,
            records: RwLock::new(snapshot.records.into_iter().collect()),
            tags: TagIndex::from_table(snapshot.tags),
            persist_lock: Mutex::new(()),
        })
    }

    /// `NotFound` / `Expired` exactly like the memory store, `Ok` if live
    pub fn check(&self, id: &str) -> Result<()> {
        let expires_at = match self.records.read().get(id) {
            Some(at) => *at,
            None => return Err(CacheError::NotFound),
        };
        if is_expired(expires_at, SystemTime::now()) {
            return Err(CacheError::Expired);
        }
        Ok(())
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.check(id).is_ok()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.read().contains_key(id)
    }

    pub fn insert(&self, id: &str, expires_at: SystemTime) {
        self.records.write().insert(id.to_string(), expires_at);
    }

    /// Insert only if `id` is not indexed yet; returns whether it was added
    pub fn insert_if_absent(&self, id: &str, expires_at: SystemTime) -> bool {
        let mut records = self.records.write();
        if records.contains_key(id) {
            return false;
        }
        records.insert(id.to_string(), expires_at);
        true
    }

    pub fn remove(&self, id: &str) -> Option<SystemTime> {
        self.records.write().remove(id)
    }

    /// Drop every expired record and return their ids
    pub fn take_expired(&self, now: SystemTime) -> Vec<String> {
        let mut records = self.records.write();
        let (expired, live): (HashMap<_, _>, HashMap<_, _>) = std::mem::take(&mut *records)
            .into_iter()
            .partition(|(_, at)| is_expired(*at, now));
        *records = live;
        expired.into_keys().collect()
    }

    pub fn tag(&self, id: &str, tags: &[&str]) {
        self.tags.tag(id, tags);
    }

    pub fn take_tagged(&self, tags: &[&str]) -> Vec<String> {
        self.tags.take(tags)
    }

    pub fn untag(&self, ids: &[String]) {
        self.tags.prune(ids);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        let records = self
            .records
            .read()
            .iter()
            .map(|(id, at)| (id.clone(), *at))
            .collect();
        IndexSnapshot {
            records,
            tags: self.tags.snapshot(),
        }
    }

    /// Write the current index to disk
    pub fn persist(&self) -> Result<()> {
        let _writer = self.persist_lock.lock();
        let snapshot = self.snapshot();
        let bytes = encode(&snapshot)?;
        write_atomic(&self.path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn later() -> SystemTime {
        SystemTime::now() + Duration::from_secs(3600)
    }

    #[test]
    fn missing_file_is_an_empty_index() {
        let temp_dir = TempDir::new().unwrap();
        let index = FileIndex::load(temp_dir.path().join("index")).unwrap();
        assert_eq!(index.len(), 0);
        assert!(matches!(index.check("abc"), Err(CacheError::NotFound)));
    }

    #[test]
    fn check_distinguishes_expired_from_missing() {
        let temp_dir = TempDir::new().unwrap();
        let index = FileIndex::load(temp_dir.path().join("index")).unwrap();
        index.insert("live", later());
        index.insert("stale", SystemTime::now() - Duration::from_secs(1));

        assert!(index.check("live").is_ok());
        assert!(matches!(index.check("stale"), Err(CacheError::Expired)));
        assert!(index.contains("stale"));
        assert!(!index.is_live("stale"));
    }

    #[test]
    fn take_expired_filters_and_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let index = FileIndex::load(temp_dir.path().join("index")).unwrap();
        index.insert("live", later());
        index.insert("stale-1", SystemTime::UNIX_EPOCH);
        index.insert("stale-2", SystemTime::UNIX_EPOCH);

        let mut expired = index.take_expired(SystemTime::now());
        expired.sort();
        assert_eq!(expired, vec!["stale-1", "stale-2"]);
        assert_eq!(index.len(), 1);
        assert!(index.is_live("live"));
    }

    #[test]
    fn persisted_index_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index");
        let expiry = later();

        let index = FileIndex::load(path.clone()).unwrap();
        index.insert("id-1", expiry);
        index.tag("id-1", &["pages"]);
        index.persist().unwrap();

        let reloaded = FileIndex::load(path).unwrap();
        assert_eq!(reloaded.snapshot(), index.snapshot());
        assert_eq!(reloaded.take_tagged(&["pages"]), vec!["id-1"]);
    }

    #[test]
    fn corrupt_index_is_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index");
        fs::write(&path, b"not cbor at all \xff").unwrap();

        let index = FileIndex::load(path).unwrap();
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn insert_if_absent_keeps_existing_expiry() {
        let temp_dir = TempDir::new().unwrap();
        let index = FileIndex::load(temp_dir.path().join("index")).unwrap();
        let expiry = later();
        index.insert("id", expiry);

        assert!(!index.insert_if_absent("id", SystemTime::UNIX_EPOCH));
        assert_eq!(index.snapshot().records.get("id"), Some(&expiry));
        assert!(index.insert_if_absent("other", expiry));
    }
}
