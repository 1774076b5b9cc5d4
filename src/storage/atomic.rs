//! Crash-safe file primitives.
//!
//! Every record is published by writing a sibling temp file and renaming it
//! over the target. Readers therefore see either the previous complete value
//! or the new one, never a torn write. Reads never fail on bad content: a
//! missing or unparsable file degrades to a default.

use crate::error::{LoopError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Temp path used while publishing `path`.
///
/// The pid suffix keeps two processes writing the same record from sharing
/// a temp file.
#[must_use]
pub fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map_or_else(|| "record".into(), |name| name.to_string_lossy().to_string());
    path.with_file_name(format!("{file_name}.{}.tmp", std::process::id()))
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// # Errors
///
/// Returns an error if serialization, the temp write, or the rename fails.
/// The target is left untouched on failure.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    atomic_write(path, buf.as_bytes())
}

/// Atomically replace `path` with `contents`.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the temp
/// file cannot be written or renamed.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        LoopError::Config(format!("Invalid record path: {}", path.display()))
    })?;
    fs::create_dir_all(parent)?;

    let temp_path = temp_path_for(path);
    let result = write_and_sync(&temp_path, contents).and_then(|()| {
        fs::rename(&temp_path, path)?;
        Ok(())
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    } else {
        debug!(path = %path.display(), bytes = contents.len(), "Record published");
    }
    result
}

fn write_and_sync(temp_path: &Path, contents: &[u8]) -> Result<()> {
    let file = File::create(temp_path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(contents)?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| LoopError::Io(e.into_error()))?
        .sync_all()?;
    Ok(())
}

/// Read and deserialize a JSON record.
///
/// Returns `None` when the file is missing or cannot be parsed.
#[must_use]
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Unreadable record, using default");
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Corrupt record, using default");
            None
        }
    }
}

/// Read a JSON record, substituting `T::default()` when missing or corrupt.
#[must_use]
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    read_json_opt(path).unwrap_or_default()
}
