//! Point-in-time JSON snapshots written between workflow steps.
//!
//! Snapshots exist for diagnosing a failed run; nothing reads them back.

use std::path::Path;

use serde_json::Value;

use crate::error::FactoryError;

pub trait SnapshotSink {
    fn write(&self, path: &Path, value: &Value) -> Result<(), FactoryError>;
}

/// Writes pretty-printed JSON files, creating parent directories as needed.
#[derive(Debug, Clone, Default)]
pub struct FileSnapshotSink;

impl SnapshotSink for FileSnapshotSink {
    fn write(&self, path: &Path, value: &Value) -> Result<(), FactoryError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(value)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_pretty_json_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-data").join("application.json");

        FileSnapshotSink
            .write(&path, &json!({"application": {"id": 7}}))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\n"));
        let parsed: Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["application"]["id"], 7);
    }

    #[test]
    fn overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current-app.json");

        FileSnapshotSink.write(&path, &json!({"step": 1})).unwrap();
        FileSnapshotSink.write(&path, &json!({"step": 2})).unwrap();

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["step"], 2);
    }
}
