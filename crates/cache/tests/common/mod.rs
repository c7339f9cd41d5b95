//! Shared helpers for the integration tests

#![allow(dead_code)]

use stashkit_cache::{
    ExternalCache, ExternalConfig, FileCache, FileConfig, MemoryCache, MemoryConfig,
    MemoryKvStore,
};
use std::sync::Once;
use std::time::Duration;
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`; later calls are no-ops
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Memory cache with the sweep left to the test
pub fn memory_cache(default_ttl: Duration) -> MemoryCache {
    init_tracing();
    MemoryCache::new(
        MemoryConfig::default()
            .with_default_ttl(default_ttl)
            .with_sweep_interval(Duration::ZERO),
    )
    .unwrap()
}

/// File cache in a fresh temp dir; keep the `TempDir` alive with the cache
pub fn file_cache(default_ttl: Duration) -> (FileCache, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let cache = open_file_cache(&temp_dir, default_ttl);
    (cache, temp_dir)
}

pub fn open_file_cache(temp_dir: &TempDir, default_ttl: Duration) -> FileCache {
    FileCache::open(
        FileConfig::new(temp_dir.path())
            .with_default_ttl(default_ttl)
            .with_sweep_interval(Duration::ZERO),
    )
    .unwrap()
}

/// Memory cache whose background sweep runs every `sweep_interval`
pub fn swept_memory_cache(sweep_interval: Duration) -> MemoryCache {
    init_tracing();
    MemoryCache::new(MemoryConfig::default().with_sweep_interval(sweep_interval)).unwrap()
}

/// File cache whose background sweep runs every `sweep_interval`
pub fn swept_file_cache(sweep_interval: Duration) -> (FileCache, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let cache =
        FileCache::open(FileConfig::new(temp_dir.path()).with_sweep_interval(sweep_interval))
            .unwrap();
    (cache, temp_dir)
}

pub fn external_cache(default_ttl: Duration) -> ExternalCache<MemoryKvStore> {
    init_tracing();
    ExternalCache::new(
        MemoryKvStore::new(),
        ExternalConfig::default().with_default_ttl(default_ttl),
    )
}
