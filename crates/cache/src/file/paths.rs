//! Shard layout of the file store
//!
//! `root/<id[0]>/<id[1]>/<id>`: two levels of one hex nibble each, 16 x 16
//! directories, created up front so writes never have to create parents.

use crate::errors::{CacheError, Result};
use crate::hashing::id;
use std::fs;
use std::path::{Path, PathBuf};

/// Characters an identifier can start with, one directory per character
pub const SHARD_ALPHABET: &[u8; 16] = b"0123456789abcdef";

/// Key whose identifier names the persisted index file
pub const INDEX_KEY: &str = "stashkit/file-index";

/// Blob path for an identifier
pub fn blob_path(root: &Path, id: &str) -> PathBuf {
    root.join(&id[..1]).join(&id[1..2]).join(id)
}

/// Location of the persisted index, directly under the root so the shard
/// walk never mistakes it for a blob
pub fn index_path(root: &Path) -> PathBuf {
    root.join(id(INDEX_KEY))
}

/// Every `(first, second)` shard directory under `root`
pub fn shard_dirs(root: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    SHARD_ALPHABET.iter().flat_map(move |first| {
        SHARD_ALPHABET.iter().map(move |second| {
            root.join(char::from(*first).to_string())
                .join(char::from(*second).to_string())
        })
    })
}

/// Create the root and its full shard tree
pub fn create_shard_tree(root: &Path) -> Result<()> {
    for dir in shard_dirs(root) {
        match fs::create_dir_all(&dir) {
            Ok(()) => {}
            Err(e) => return Err(CacheError::io(dir, "create shard directory", e)),
        }
    }
    Ok(())
}
