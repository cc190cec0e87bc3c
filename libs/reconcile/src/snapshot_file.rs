//! Snapshot files on disk.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::structs::Snapshot;

/// Errors reading a snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotFileError {
    #[error("cannot read snapshot {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Extension is neither `.json` nor `.toml`.
    #[error("unsupported snapshot format: {} (expected .json or .toml)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("invalid snapshot {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

/// Reads a snapshot, picking the parser by file extension.
pub fn read_snapshot(path: &Path) -> Result<Snapshot, SnapshotFileError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SnapshotFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |message: String| SnapshotFileError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&raw).map_err(|e| parse_error(e.to_string())),
        Some("toml") => toml::from_str(&raw).map_err(|e| parse_error(e.to_string())),
        _ => Err(SnapshotFileError::UnsupportedFormat(path.to_path_buf())),
    }
}
