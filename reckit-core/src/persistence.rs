//! Atomic JSON persistence for run artifacts.
//!
//! Settings records and run overviews are written tmp-then-rename so a
//! crashed or cancelled run never leaves a truncated JSON file behind.

use std::ffi::OsString;
use std::io;
use std::path::Path;

/// Serialize `data` as pretty-printed JSON and write it atomically.
///
/// The payload lands in a `.tmp` sibling first and is renamed into place.
/// Missing parent directories are created.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, &json)
}

/// Write raw bytes atomically via a `.tmp` sibling.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(OsString::from(".tmp"));
    let tmp = std::path::PathBuf::from(tmp_name);
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}

/// Read and deserialize a JSON file, `None` when it does not exist.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&content)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}
