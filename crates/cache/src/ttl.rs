//! Record/TTL model shared by every backend

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Finite stand-in for "never expires": 100 000 hours, a little over 11 years.
///
/// Keeping it finite means expiry is always `now + duration`.
pub const FOREVER: Duration = Duration::from_secs(100_000 * 60 * 60);

/// Requested lifetime of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ttl {
    /// Use the backend's configured default
    #[default]
    Default,
    /// Keep the entry for [`FOREVER`]
    Forever,
    /// Keep the entry for exactly this long
    For(Duration),
}

impl Ttl {
    /// Interpret a signed number of seconds: `0` is the backend default,
    /// `-1` is forever, any other negative value is already expired.
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            0 => Self::Default,
            -1 => Self::Forever,
            s if s < 0 => Self::For(Duration::ZERO),
            s => Self::For(Duration::from_secs(s.unsigned_abs())),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Default
        } else {
            Self::For(duration)
        }
    }
}

/// Resolve a requested TTL against the backend default
pub fn resolve_ttl(requested: Ttl, default: Duration) -> Duration {
    match requested {
        Ttl::Default => default,
        Ttl::Forever => FOREVER,
        Ttl::For(duration) => duration,
    }
}

/// Absolute expiry for an entry written now
pub fn expires_at(requested: Ttl, default: Duration) -> SystemTime {
    expires_after(SystemTime::now(), resolve_ttl(requested, default))
}

/// `start + lifetime`, clamped to `start + FOREVER` if the sum overflows
pub(crate) fn expires_after(start: SystemTime, lifetime: Duration) -> SystemTime {
    start
        .checked_add(lifetime)
        .or_else(|| start.checked_add(FOREVER))
        .unwrap_or(start)
}

/// An entry whose expiry is at or before `now` is logically gone
#[inline]
pub fn is_expired(expires_at: SystemTime, now: SystemTime) -> bool {
    expires_at <= now
}
