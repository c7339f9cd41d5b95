//! Error handling for the cache
//!
//! Every backend reports failures through [`CacheError`]. The two sentinel
//! conditions, [`CacheError::NotFound`] and [`CacheError::Expired`], are plain
//! unit variants so callers branch on them by variant, never by message.

mod hints;
mod types;

pub use hints::*;
pub use types::*;
