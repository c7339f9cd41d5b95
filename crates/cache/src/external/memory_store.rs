//! In-process [`KvStore`]

use super::store::KvStore;
use crate::codec::{decode, encode};
use crate::errors::{CacheError, Result};
use crate::ttl::{expires_after, is_expired};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Reference key/value engine kept in process memory
///
/// Honours per-entry TTLs lazily (expired entries read as absent and are
/// dropped on access) and offers an atomic `incr` over CBOR-encoded `i64`
/// values, matching what [`ExternalCache`](super::ExternalCache) writes.
#[derive(Debug)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Entry>>,
    native_incr: bool,
}

#[derive(Debug)]
struct Entry {
    bytes: Vec<u8>,
    expires_at: SystemTime,
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            native_incr: true,
        }
    }

    /// A store that does not advertise an increment primitive
    pub fn without_native_incr() -> Self {
        Self {
            native_incr: false,
            ..Self::new()
        }
    }

    /// Stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let now = SystemTime::now();
        let mut entries = self.entries.lock();
        match entries.get(id) {
            Some(entry) if !is_expired(entry.expires_at, now) => Ok(Some(entry.bytes.clone())),
            Some(_) => {
                entries.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set_with_ttl(&self, id: &str, bytes: Vec<u8>, ttl: Duration) -> Result<()> {
        let expires_at = expires_after(SystemTime::now(), ttl);
        self.entries
            .lock()
            .insert(id.to_string(), Entry { bytes, expires_at });
        Ok(())
    }

    fn delete(&self, ids: &[String]) -> Result<()> {
        let mut entries = self.entries.lock();
        for id in ids {
            entries.remove(id);
        }
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    fn has_native_incr(&self) -> bool {
        self.native_incr
    }

    fn incr(&self, id: &str, ttl: Duration) -> Option<Result<i64>> {
        if !self.native_incr {
            return None;
        }

        let now = SystemTime::now();
        let mut entries = self.entries.lock();

        let current = match entries.get(id) {
            Some(entry) if !is_expired(entry.expires_at, now) => {
                match decode::<i64>(&entry.bytes) {
                    Ok(value) => value,
                    Err(e) => return Some(Err(CacheError::backend("incr", e))),
                }
            }
            _ => 0,
        };

        let next = current.wrapping_add(1);
        let bytes = match encode(&next) {
            Ok(bytes) => bytes,
            Err(e) => return Some(Err(e)),
        };
        entries.insert(
            id.to_string(),
            Entry {
                bytes,
                expires_at: expires_after(now, ttl),
            },
        );
        Some(Ok(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn expired_entries_read_as_absent() {
        let store = MemoryKvStore::new();
        store
            .set_with_ttl("a", vec![1, 2, 3], Duration::from_millis(10))
            .unwrap();
        assert_eq!(store.get("a").unwrap(), Some(vec![1, 2, 3]));

        thread::sleep(Duration::from_millis(30));
        assert_eq!(store.get("a").unwrap(), None);
        assert!(!store.exists("a").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn delete_ignores_absent_ids() {
        let store = MemoryKvStore::new();
        store.set_with_ttl("a", vec![1], Duration::from_secs(60)).unwrap();
        store
            .delete(&["a".to_string(), "missing".to_string()])
            .unwrap();
        assert!(!store.exists("a").unwrap());
    }

    #[test]
    fn native_incr_is_atomic() {
        let store = Arc::new(MemoryKvStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.incr("n", Duration::from_secs(60)).unwrap().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let bytes = store.get("n").unwrap().unwrap();
        assert_eq!(decode::<i64>(&bytes).unwrap(), 800);
    }

    #[test]
    fn incr_over_a_non_integer_is_a_backend_error() {
        let store = MemoryKvStore::new();
        let bytes = encode(&"text").unwrap();
        store.set_with_ttl("n", bytes, Duration::from_secs(60)).unwrap();

        let err = store.incr("n", Duration::from_secs(60)).unwrap().unwrap_err();
        assert!(matches!(err, CacheError::Backend { operation: "incr", .. }));
    }

    #[test]
    fn incr_can_be_withheld() {
        let store = MemoryKvStore::without_native_incr();
        assert!(!store.has_native_incr());
        assert!(store.incr("n", Duration::from_secs(60)).is_none());
    }
}
