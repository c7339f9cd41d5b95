//! Records held by the in-process store

use crate::recovery::NativeValue;
use crate::ttl::is_expired;
use std::time::SystemTime;

/// A natively stored value and its absolute expiry
#[derive(Debug, Clone)]
pub(crate) struct Record {
    pub data: NativeValue,
    pub expires_at: SystemTime,
}

impl Record {
    pub fn new(data: NativeValue, expires_at: SystemTime) -> Self {
        Self { data, expires_at }
    }

    #[inline]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        is_expired(self.expires_at, now)
    }
}
