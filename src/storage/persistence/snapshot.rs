//! Atomic JSON snapshot of all blackout windows

use super::PersistenceError;
use crate::data::BlackoutWindow;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

pub const SNAPSHOT_FILE_NAME: &str = "blackouts.json";

const SCHEMA_VERSION: u32 = 1;

/// Snapshot metadata
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SnapshotMetadata {
    /// Schema version for compatibility
    pub schema_version: u32,
    /// When the snapshot was written
    pub saved_at: DateTime<Utc>,
    /// Number of windows in the snapshot
    pub window_count: usize,
}

#[derive(serde::Serialize)]
struct SnapshotOut<'a> {
    #[serde(flatten)]
    metadata: SnapshotMetadata,
    windows: Vec<&'a BlackoutWindow>,
}

#[derive(serde::Deserialize)]
struct SnapshotIn {
    #[serde(flatten)]
    metadata: SnapshotMetadata,
    windows: Vec<BlackoutWindow>,
}

/// A snapshot file inside a data directory
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(SNAPSHOT_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all windows. A missing file is an empty store.
    pub async fn load(&self) -> Result<Vec<BlackoutWindow>, PersistenceError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let snapshot: SnapshotIn = serde_json::from_slice(&data)
            .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;

        if snapshot.metadata.schema_version != SCHEMA_VERSION {
            return Err(PersistenceError::UnsupportedVersion(
                snapshot.metadata.schema_version,
            ));
        }

        tracing::info!(
            path = %self.path.display(),
            windows = snapshot.windows.len(),
            saved_at = %snapshot.metadata.saved_at,
            "Loaded blackout snapshot"
        );

        Ok(snapshot.windows)
    }

    /// Replace the snapshot with `windows`.
    ///
    /// Writes to a sibling temporary file and renames it over the target,
    /// so readers of the file never observe a partial snapshot.
    pub async fn save(&self, windows: &[Arc<BlackoutWindow>]) -> Result<SnapshotMetadata, PersistenceError> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let metadata = SnapshotMetadata {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            window_count: windows.len(),
        };
        let snapshot = SnapshotOut {
            metadata: metadata.clone(),
            windows: windows.iter().map(|w| w.as_ref()).collect(),
        };
        let data = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path).await?;

        tracing::debug!(
            path = %self.path.display(),
            windows = metadata.window_count,
            "Saved blackout snapshot"
        );

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BlackoutRequest;
    use chrono::Duration;

    fn window(id: &str) -> Arc<BlackoutWindow> {
        let request = BlackoutRequest::new("Production").with_service("Web");
        Arc::new(
            BlackoutWindow::from_request(id, request, Utc::now(), Duration::hours(1)).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path());

        assert!(file.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("nested"));

        let windows = vec![window("a"), window("b")];
        let metadata = file.save(&windows).await.unwrap();
        assert_eq!(metadata.window_count, 2);

        let loaded = file.load().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(&loaded[0], windows[0].as_ref());
        assert!(!file.path().with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_rejects_unknown_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path());
        let body = serde_json::json!({
            "schema_version": 99,
            "saved_at": Utc::now(),
            "window_count": 0,
            "windows": []
        });
        std::fs::write(file.path(), serde_json::to_vec(&body).unwrap()).unwrap();

        assert!(matches!(
            file.load().await,
            Err(PersistenceError::UnsupportedVersion(99))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path());
        std::fs::write(file.path(), b"{not json").unwrap();

        assert!(matches!(
            file.load().await,
            Err(PersistenceError::Deserialization(_))
        ));
    }
}
