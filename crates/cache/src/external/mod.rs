//! Cache façade over an external key/value engine
//!
//! [`ExternalCache`] turns any [`KvStore`] into a full [`Cache`]: keys are
//! hashed and namespaced, values go through the CBOR codec, and tags are kept
//! in the store itself as encoded id sets.

mod memory_store;
mod store;

pub use memory_store::MemoryKvStore;
pub use store::KvStore;

use crate::codec::{decode, encode};
use crate::config::ExternalConfig;
use crate::errors::{CacheError, Result};
use crate::hashing::id;
use crate::traits::{incr_by_compose, AtomicityCapability, Cache, Cacheable};
use crate::ttl::{resolve_ttl, Ttl, FOREVER};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::Duration;

/// [`Cache`] backed by a [`KvStore`]
pub struct ExternalCache<S: KvStore> {
    store: S,
    prefix: String,
    default_ttl: Duration,
    // Serializes tag-set read-modify-write within this process
    tag_lock: Mutex<()>,
}

impl<S: KvStore> ExternalCache<S> {
    pub fn new(store: S, config: ExternalConfig) -> Self {
        Self {
            store,
            prefix: config.prefix,
            default_ttl: config.default_ttl,
            tag_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Storage id of `key` inside the store
    pub fn storage_id(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, id(key))
    }

    fn tag_id(&self, tag: &str) -> String {
        format!("{}:tag:{}", self.prefix, id(tag))
    }

    fn tag_members(&self, tag_id: &str) -> Result<BTreeSet<String>> {
        match self.store.get(tag_id)? {
            Some(bytes) => decode(&bytes).map_err(|e| e.with_key(tag_id)),
            None => Ok(BTreeSet::new()),
        }
    }
}

impl<S: KvStore> Cache for ExternalCache<S> {
    fn get<T: Cacheable>(&self, key: &str, dest: &mut T) -> Result<()> {
        let bytes = self
            .store
            .get(&self.storage_id(key))?
            .ok_or(CacheError::NotFound)?;
        *dest = decode(&bytes).map_err(|e| e.with_key(key))?;
        Ok(())
    }

    fn put<T: Cacheable>(&self, key: &str, value: &T, ttl: Ttl) -> Result<()> {
        let bytes = encode(value).map_err(|e| e.with_key(key))?;
        self.store.set_with_ttl(
            &self.storage_id(key),
            bytes,
            resolve_ttl(ttl, self.default_ttl),
        )
    }

    fn exists(&self, key: &str) -> bool {
        match self.store.exists(&self.storage_id(key)) {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!("Treating '{}' as absent after store error: {}", key, e);
                false
            }
        }
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        self.store.delete(&[self.storage_id(key)])
    }

    fn invalidate_multi(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = keys.iter().map(|key| self.storage_id(key)).collect();
        self.store.delete(&ids)
    }

    fn incr(&self, key: &str, ttl: Ttl) -> Result<i64> {
        let ttl_resolved = resolve_ttl(ttl, self.default_ttl);
        match self.store.incr(&self.storage_id(key), ttl_resolved) {
            Some(result) => result,
            None => incr_by_compose(self, key, ttl),
        }
    }

    fn tag(&self, key: &str, tags: &[&str]) -> Result<()> {
        let member = self.storage_id(key);
        let _guard = self.tag_lock.lock();

        for tag in tags {
            let tag_id = self.tag_id(tag);
            let mut members = self.tag_members(&tag_id)?;
            if members.insert(member.clone()) {
                let bytes = encode(&members).map_err(|e| e.with_key(&tag_id))?;
                self.store.set_with_ttl(&tag_id, bytes, FOREVER)?;
            }
        }
        Ok(())
    }

    fn invalidate_tags(&self, tags: &[&str]) -> Result<()> {
        let _guard = self.tag_lock.lock();

        let mut doomed = BTreeSet::new();
        for tag in tags {
            let tag_id = self.tag_id(tag);
            doomed.extend(self.tag_members(&tag_id)?);
            doomed.insert(tag_id);
        }

        let doomed: Vec<String> = doomed.into_iter().collect();
        self.store.delete(&doomed)
    }

    fn incr_atomicity(&self) -> AtomicityCapability {
        if self.store.has_native_incr() {
            AtomicityCapability::Native
        } else {
            AtomicityCapability::BestEffort
        }
    }
}

impl<S: KvStore + std::fmt::Debug> std::fmt::Debug for ExternalCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalCache")
            .field("store", &self.store)
            .field("prefix", &self.prefix)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Arc;
    use std::thread;

    fn cache() -> ExternalCache<MemoryKvStore> {
        ExternalCache::new(MemoryKvStore::new(), ExternalConfig::default())
    }

    /// Store whose every call fails
    struct Unreachable;

    impl KvStore for Unreachable {
        fn get(&self, _id: &str) -> Result<Option<Vec<u8>>> {
            Err(refused("get"))
        }

        fn set_with_ttl(&self, _id: &str, _bytes: Vec<u8>, _ttl: Duration) -> Result<()> {
            Err(refused("set"))
        }

        fn delete(&self, _ids: &[String]) -> Result<()> {
            Err(refused("delete"))
        }

        fn exists(&self, _id: &str) -> Result<bool> {
            Err(refused("exists"))
        }
    }

    fn refused(operation: &'static str) -> CacheError {
        CacheError::backend(
            operation,
            io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        )
    }

    #[test]
    fn storage_ids_are_namespaced_digests() {
        let cache = ExternalCache::new(
            MemoryKvStore::new(),
            ExternalConfig::default().with_prefix("app"),
        );
        assert_eq!(cache.storage_id("k"), format!("app:{}", id("k")));
    }

    #[test]
    fn put_get_round_trip() {
        let cache = cache();
        cache.put("k", &vec![1u16, 2, 3], Ttl::Default).unwrap();

        let mut value: Vec<u16> = Vec::new();
        cache.get("k", &mut value).unwrap();
        assert_eq!(value, vec![1, 2, 3]);
        assert!(cache.exists("k"));

        cache.invalidate("k").unwrap();
        assert!(matches!(cache.get("k", &mut value), Err(CacheError::NotFound)));
    }

    #[test]
    fn store_expiry_reads_as_not_found() {
        let cache = cache();
        cache
            .put("k", &1u8, Ttl::For(Duration::from_millis(10)))
            .unwrap();
        thread::sleep(Duration::from_millis(30));

        let mut value = 0u8;
        assert!(matches!(cache.get("k", &mut value), Err(CacheError::NotFound)));
        assert!(!cache.exists("k"));
    }

    #[test]
    fn incr_uses_the_native_primitive_when_offered() {
        let cache = Arc::new(cache());
        assert_eq!(cache.incr_atomicity(), AtomicityCapability::Native);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..50 {
                        cache.incr("hits", Ttl::Default).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.fetch::<i64>("hits").unwrap(), 200);
    }

    #[test]
    fn incr_composes_without_a_native_primitive() {
        let cache = ExternalCache::new(
            MemoryKvStore::without_native_incr(),
            ExternalConfig::default(),
        );
        assert_eq!(cache.incr_atomicity(), AtomicityCapability::BestEffort);
        assert_eq!(cache.incr("n", Ttl::Default).unwrap(), 1);
        assert_eq!(cache.incr("n", Ttl::Default).unwrap(), 2);
    }

    #[test]
    fn tags_live_in_the_store() {
        let cache = cache();
        for key in ["k1", "k2", "k3"] {
            cache.put(key, &key.to_string(), Ttl::Default).unwrap();
        }
        cache.tag("k1", &["t1"]).unwrap();
        cache.tag("k2", &["t1", "t2"]).unwrap();
        cache.tag("k3", &["t3"]).unwrap();

        cache.invalidate_tags(&["t1"]).unwrap();
        assert!(!cache.exists("k1"));
        assert!(!cache.exists("k2"));
        assert!(cache.exists("k3"));

        // t2 still names k2, which is simply gone
        cache.invalidate_tags(&["t2", "unknown"]).unwrap();
        assert!(cache.exists("k3"));
        assert_eq!(cache.store().len(), 2, "k3 and the t3 tag set remain");
    }

    #[test]
    fn store_failures_surface_as_backend_errors() {
        let cache = ExternalCache::new(Unreachable, ExternalConfig::default());

        let mut value = String::new();
        let err = cache.get("k", &mut value).unwrap_err();
        assert!(matches!(err, CacheError::Backend { operation: "get", .. }));
        assert!(err.is_transient());

        assert!(matches!(
            cache.put("k", &value, Ttl::Default),
            Err(CacheError::Backend { operation: "set", .. })
        ));
        assert!(!cache.exists("k"));
        assert!(matches!(
            cache.incr("n", Ttl::Default),
            Err(CacheError::Backend { operation: "get", .. })
        ));
    }
}
