//! Primitive key/value interface of an external engine

use crate::errors::Result;
use std::time::Duration;

/// Minimal operations a remote or embedded key/value engine must offer to be
/// wrapped by [`ExternalCache`](super::ExternalCache)
///
/// Ids handed to a store are already namespaced and hashed. TTLs arrive
/// resolved: the store never sees the `Default`/`Forever` sentinels.
/// Implementations report their own failures as
/// [`CacheError::Backend`](crate::CacheError::Backend).
pub trait KvStore: Send + Sync {
    /// Bytes stored under `id`, or `None` if absent or expired
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Store `bytes` under `id` for `ttl`
    fn set_with_ttl(&self, id: &str, bytes: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Remove every id; absent ids are ignored
    fn delete(&self, ids: &[String]) -> Result<()>;

    fn exists(&self, id: &str) -> Result<bool>;

    /// Whether [`KvStore::incr`] is implemented natively
    fn has_native_incr(&self) -> bool {
        false
    }

    /// Atomically increment the integer under `id`, creating it with `ttl`
    /// when absent. `None` means the engine has no such primitive.
    fn incr(&self, id: &str, ttl: Duration) -> Option<Result<i64>> {
        let _ = (id, ttl);
        None
    }
}

impl<S: KvStore + ?Sized> KvStore for std::sync::Arc<S> {
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(id)
    }

    fn set_with_ttl(&self, id: &str, bytes: Vec<u8>, ttl: Duration) -> Result<()> {
        (**self).set_with_ttl(id, bytes, ttl)
    }

    fn delete(&self, ids: &[String]) -> Result<()> {
        (**self).delete(ids)
    }

    fn exists(&self, id: &str) -> Result<bool> {
        (**self).exists(id)
    }

    fn has_native_incr(&self) -> bool {
        (**self).has_native_incr()
    }

    fn incr(&self, id: &str, ttl: Duration) -> Option<Result<i64>> {
        (**self).incr(id, ttl)
    }
}
