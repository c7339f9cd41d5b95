//! Atomic file writes so readers never observe a partially written blob

use crate::errors::{CacheError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Prefix and suffix of in-flight temporary files
pub const TEMP_PREFIX: char = '.';
pub const TEMP_SUFFIX: &str = ".tmp";

/// Write `content` to `path` by writing a temporary sibling and renaming it
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) => p,
        None => {
            return Err(CacheError::configuration(format!(
                "invalid cache path '{}': no parent directory",
                path.display()
            )))
        }
    };

    // Same directory as the target so the rename stays on one filesystem
    let temp_path = parent.join(format!("{TEMP_PREFIX}{}{TEMP_SUFFIX}", Uuid::new_v4()));

    let result = (|| -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| CacheError::io(&temp_path, "create temporary file", e))?;

        file.write_all(content)
            .map_err(|e| CacheError::io(&temp_path, "write temporary file", e))?;

        file.sync_all()
            .map_err(|e| CacheError::io(&temp_path, "sync temporary file", e))?;

        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
        return result;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        CacheError::io(path, "rename temporary file", e)
    })
}

/// True for names produced by [`write_atomic`] for its temporary files
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)
}
