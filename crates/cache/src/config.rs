//! Backend configuration
//!
//! Plain structs with defaults and `with_*` builders. All of them
//! (de)serialize with durations written as whole seconds, so they can be
//! embedded in an application's own config file.

use crate::errors::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for [`MemoryCache`](crate::MemoryCache)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// TTL applied when a caller passes `Ttl::Default`
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,
    /// Period of the background sweep; zero disables it
    #[serde(with = "duration_secs")]
    pub sweep_interval: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl MemoryConfig {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Configuration for [`FileCache`](crate::FileCache)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Root of the shard tree
    pub root: PathBuf,
    /// TTL applied when a caller passes `Ttl::Default`, and the lifetime
    /// assumed for blobs found on disk without an index entry
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,
    /// Period of the background sweep and index persistence; zero disables it
    #[serde(with = "duration_secs")]
    pub sweep_interval: Duration,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("stashkit").join("file-cache"),
            default_ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl FileConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(CacheError::configuration("file cache root must not be empty"));
        }
        Ok(())
    }
}

/// Configuration for [`ExternalCache`](crate::ExternalCache)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    /// TTL applied when a caller passes `Ttl::Default`
    #[serde(with = "duration_secs")]
    pub default_ttl: Duration,
    /// Namespace prepended to every storage id
    pub prefix: String,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(24 * 60 * 60),
            prefix: "stashkit".to_string(),
        }
    }
}

impl ExternalConfig {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
