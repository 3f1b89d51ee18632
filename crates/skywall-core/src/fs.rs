//! Filesystem helpers
//!
//! External readers of the policy artifact and the status file must always
//! see a complete JSON object, so every write here goes through a temp file
//! in the target directory followed by a rename.

use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Create the parent directory of `path` recursively if it does not exist
pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Atomically replace the file at `path` with `contents`
///
/// The temp file lives next to the target so the rename stays on one
/// filesystem.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent_dir(path).await?;

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::generic(format!("Not a file path: {}", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Read a file to a string, mapping absence to `None`
pub async fn read_to_string_opt(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
