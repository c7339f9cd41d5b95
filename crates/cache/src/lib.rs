//! TTL key/value caching for stashkit
//!
//! One contract, [`Cache`], over interchangeable backends:
//! - [`MemoryCache`]: values held natively in process memory
//! - [`FileCache`]: CBOR blobs in a sharded directory tree with a persisted index
//! - [`ExternalCache`]: any [`KvStore`] engine behind the same contract
//!
//! Every backend resolves TTLs the same way (see [`Ttl`]), reports
//! [`CacheError::NotFound`] and [`CacheError::Expired`] as distinct misses,
//! and supports tag-based invalidation.

pub mod codec;
pub mod config;
pub mod errors;
pub mod external;
pub mod file;
pub mod hashing;
pub mod memory;
pub mod recovery;
pub mod sweeper;
pub mod tags;
pub mod traits;
pub mod ttl;

pub use config::{ExternalConfig, FileConfig, MemoryConfig};
pub use errors::{CacheError, RecoveryHint, Result, SerializationOp};
pub use external::{ExternalCache, KvStore, MemoryKvStore};
pub use file::FileCache;
pub use hashing::{id, id_of};
pub use memory::MemoryCache;
pub use recovery::NativeValue;
pub use sweeper::Sweeper;
pub use traits::{AtomicityCapability, Cache, Cacheable};
pub use ttl::{Ttl, FOREVER};
