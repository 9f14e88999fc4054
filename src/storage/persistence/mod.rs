//! Snapshot persistence for the window store
//!
//! The whole window set is written as one JSON document on every
//! committed change and read back on start-up.

pub mod snapshot;

pub use snapshot::{SnapshotFile, SnapshotMetadata, SNAPSHOT_FILE_NAME};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Unsupported snapshot schema version {0}")]
    UnsupportedVersion(u32),
}
