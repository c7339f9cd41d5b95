//! The uniform cache contract
//!
//! Every backend implements [`Cache`]; callers are written against the trait
//! (`fn handler<C: Cache>(cache: &C)`) and never name a backend type.

use crate::errors::Result;
use crate::ttl::Ttl;
use serde::{de::DeserializeOwned, Serialize};

/// Values that can pass through any backend: serializable for the durable
/// stores, `Clone + 'static` so the in-process store can hold them natively.
pub trait Cacheable: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Whether a backend's `incr` is a single atomic step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicityCapability {
    /// The underlying engine increments natively; no update is lost
    Native,
    /// Read-then-write composition; concurrent increments on one key can be lost
    BestEffort,
}

/// TTL-based key/value cache
pub trait Cache: Send + Sync {
    /// Read the value stored under `key` into `dest`.
    ///
    /// Fails with [`CacheError::NotFound`](crate::CacheError::NotFound) when
    /// nothing is stored and [`CacheError::Expired`](crate::CacheError::Expired)
    /// when the entry is stale but not yet reclaimed. `dest` is left untouched
    /// on any error.
    fn get<T: Cacheable>(&self, key: &str, dest: &mut T) -> Result<()>;

    /// Store `value` under `key`, replacing any previous entry
    fn put<T: Cacheable>(&self, key: &str, value: &T, ttl: Ttl) -> Result<()>;

    /// True if a live (unexpired) entry exists
    fn exists(&self, key: &str) -> bool;

    /// Remove `key`; removing an absent key is not an error
    fn invalidate(&self, key: &str) -> Result<()>;

    /// Remove every key in `keys`
    fn invalidate_multi(&self, keys: &[&str]) -> Result<()>;

    /// Increment the integer under `key`, treating a missing or expired entry
    /// as zero, and return the new value
    fn incr(&self, key: &str, ttl: Ttl) -> Result<i64>;

    /// Register `key` under each of `tags`
    fn tag(&self, key: &str, tags: &[&str]) -> Result<()>;

    /// Remove every key registered under any of `tags`, then forget the tags
    fn invalidate_tags(&self, tags: &[&str]) -> Result<()>;

    /// How `incr` behaves under concurrent callers
    fn incr_atomicity(&self) -> AtomicityCapability {
        AtomicityCapability::BestEffort
    }

    /// Owned-value convenience over [`Cache::get`]
    fn fetch<T: Cacheable + Default>(&self, key: &str) -> Result<T> {
        let mut value = T::default();
        self.get(key, &mut value)?;
        Ok(value)
    }
}

/// Shared read-modify-write increment used by backends without a native one
pub(crate) fn incr_by_compose<C: Cache + ?Sized>(cache: &C, key: &str, ttl: Ttl) -> Result<i64> {
    let mut current: i64 = 0;
    match cache.get(key, &mut current) {
        Ok(()) => {}
        Err(e) if e.is_miss() => current = 0,
        Err(e) => return Err(e),
    }

    let next = current.wrapping_add(1);
    cache.put(key, &next, ttl)?;
    Ok(next)
}
