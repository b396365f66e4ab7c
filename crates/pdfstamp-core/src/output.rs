//! Atomic output writes

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::StampError;

/// Write `bytes` to `path` so readers see either the old file or the complete new one
///
/// The data goes to a temporary file in the same directory which is then
/// renamed over `path`. On any failure the temporary file is removed and
/// `path` is left as it was.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StampError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| write_error(path, e))?;
    temp.write_all(bytes).map_err(|e| write_error(path, e))?;
    temp.as_file().sync_all().map_err(|e| write_error(path, e))?;
    temp.persist(path).map_err(|e| write_error(path, e.error))?;

    tracing::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

fn write_error(path: &Path, err: std::io::Error) -> StampError {
    StampError::Write(format!("{}: {}", path.display(), err))
}
