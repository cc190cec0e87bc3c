//! Snapshot file loading.

use std::path::Path;

use convoy_reconcile::Snapshot;

use crate::error::CliError;

/// Loads a snapshot, picking the parser by file extension.
pub fn load(path: &Path) -> Result<Snapshot, CliError> {
    Ok(convoy_reconcile::read_snapshot(path)?)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use convoy_reconcile::SnapshotFileError;
    use convoy_testing::mock;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("convoyctl-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_load_json_roundtrip() {
        let node = mock::node();
        let job = mock::job();
        let allocs = mock::allocs(&job, &node, 2);
        let snapshot = mock::snapshot(vec![job], vec![node], allocs);

        let path = temp_path("snapshot.json");
        std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();
        let loaded = load(&path);
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.unwrap(), snapshot);
    }

    #[test]
    fn test_load_errors() {
        let missing = temp_path("missing.json");
        assert!(matches!(load(&missing), Err(CliError::Snapshot(SnapshotFileError::Read { .. }))));

        let yaml = temp_path("snapshot.yaml");
        std::fs::write(&yaml, "jobs: []").unwrap();
        let result = load(&yaml);
        std::fs::remove_file(&yaml).ok();
        assert!(matches!(result, Err(CliError::Snapshot(SnapshotFileError::UnsupportedFormat(_)))));

        let broken = temp_path("broken.toml");
        std::fs::write(&broken, "[[jobs]]\nid = 3").unwrap();
        let result = load(&broken);
        std::fs::remove_file(&broken).ok();
        assert!(matches!(result, Err(CliError::Snapshot(SnapshotFileError::Parse { .. }))));
    }
}
