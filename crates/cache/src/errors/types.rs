//! Core error types for the cache

use std::fmt;
use std::path::PathBuf;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Boxed error produced by an external collaborator or a codec
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type shared by every cache backend
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No record exists for the key
    #[error("cache entry not found")]
    NotFound,

    /// A record exists but its expiry has passed
    #[error("cache entry expired")]
    Expired,

    /// The payload could not be encoded, or stored bytes could not be decoded
    #[error("failed to {operation} cache value{}: {source}", describe_key(.key))]
    Serialization {
        key: String,
        operation: SerializationOp,
        #[source]
        source: BoxError,
    },

    /// A native value could not be transferred into the caller's destination
    #[error("cannot recover a stored `{found}` into a `{expected}` destination")]
    TypeRecovery {
        expected: &'static str,
        found: &'static str,
    },

    /// File system failure
    #[error("I/O error during {operation} on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Failure reported by an external key/value collaborator
    #[error("backend {operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The background sweep task could not be started
    #[error("failed to start {name} sweeper: {source}")]
    Background {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid cache configuration
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

/// Direction of a failed codec operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationOp {
    Encode,
    Decode,
}

impl fmt::Display for SerializationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => f.write_str("encode"),
            Self::Decode => f.write_str("decode"),
        }
    }
}

fn describe_key(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        format!(" for '{key}'")
    }
}

impl CacheError {
    /// Build an I/O error with the path and operation that failed
    pub fn io(path: impl Into<PathBuf>, operation: &'static str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Wrap a collaborator failure
    pub fn backend(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }

    /// Build a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Attach the caller's key to a serialization error
    #[must_use]
    pub fn with_key(self, key: &str) -> Self {
        match self {
            Self::Serialization {
                operation, source, ..
            } => Self::Serialization {
                key: key.to_string(),
                operation,
                source,
            },
            other => other,
        }
    }
}
