//! Recovery hints for cache errors

use super::types::{CacheError, SerializationOp};
use std::path::PathBuf;
use std::time::Duration;

/// What a caller can reasonably do about an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryHint {
    /// The value is simply not cached; compute it and put it back
    Recompute,

    /// Retry the operation
    Retry { after: Duration },

    /// Check file permissions
    CheckPermissions { path: PathBuf },

    /// The stored payload is unusable; invalidate it and recompute
    ClearAndRetry,

    /// No automated recovery possible
    Manual { instructions: String },
}

impl CacheError {
    /// Get the recovery hint for this error
    #[must_use]
    pub fn recovery_hint(&self) -> RecoveryHint {
        match self {
            Self::NotFound | Self::Expired => RecoveryHint::Recompute,
            Self::Serialization {
                operation: SerializationOp::Decode,
                ..
            } => RecoveryHint::ClearAndRetry,
            Self::Serialization {
                operation: SerializationOp::Encode,
                ..
            } => RecoveryHint::Manual {
                instructions: "Check that the value is serializable".to_string(),
            },
            Self::TypeRecovery { expected, found } => RecoveryHint::Manual {
                instructions: format!("Read the entry as `{found}` instead of `{expected}`"),
            },
            Self::Io { path, source, .. } => match source.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    RecoveryHint::CheckPermissions { path: path.clone() }
                }
                _ => RecoveryHint::Retry {
                    after: Duration::from_millis(100),
                },
            },
            Self::Backend { .. } => RecoveryHint::Retry {
                after: Duration::from_millis(100),
            },
            Self::Background { .. } => RecoveryHint::Manual {
                instructions: "Check the process thread limits".to_string(),
            },
            Self::Configuration { message } => RecoveryHint::Manual {
                instructions: message.clone(),
            },
        }
    }

    /// True for the NotFound and Expired sentinels, the errors callers are
    /// expected to answer by recomputing the value
    #[must_use]
    pub const fn is_miss(&self) -> bool {
        matches!(self, Self::NotFound | Self::Expired)
    }

    /// Check if this error indicates stored data that can no longer be read
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Serialization {
                operation: SerializationOp::Decode,
                ..
            }
        )
    }

    /// Check if this error is transient and can be retried
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.recovery_hint(), RecoveryHint::Retry { .. })
    }
}
