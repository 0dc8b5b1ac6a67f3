//! Utility functions shared by the CLI and the stores.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::{PlaybookError, Result};

/// Maximum file size that can be read into memory (10 MB).
///
/// Snapshots, edit batches and tag lists are small. Anything larger is almost
/// certainly the wrong file.
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Read a file into a string, refusing files over [`MAX_FILE_SIZE`].
///
/// # Errors
///
/// Returns an error if:
/// * The file cannot be read (doesn't exist, permission denied, etc.)
/// * The file exceeds `MAX_FILE_SIZE`
pub fn read_to_string_limited(path: &Path) -> Result<String> {
    read_to_string_with_limit(path, MAX_FILE_SIZE)
}

/// Read a file into a string with a custom size limit.
pub fn read_to_string_with_limit(path: &Path, max_size: u64) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| PlaybookError::storage(path, e))?;

    let size = metadata.len();
    if size > max_size {
        return Err(PlaybookError::storage(
            path,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file is too large ({} bytes, max {} bytes)", size, max_size),
            ),
        ));
    }

    fs::read_to_string(path).map_err(|e| PlaybookError::storage(path, e))
}

/// Write a file atomically via a synced sibling temp file (`.<name>.tmp`)
/// and rename.
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| PlaybookError::storage(parent, e))?;
        }
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));
    {
        let mut file =
            fs::File::create(&temp_path).map_err(|e| PlaybookError::storage(&temp_path, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| PlaybookError::storage(&temp_path, e))?;
        file.sync_all()
            .map_err(|e| PlaybookError::storage(&temp_path, e))?;
    }
    fs::rename(&temp_path, path).map_err(|e| PlaybookError::storage(path, e))?;

    Ok(())
}
