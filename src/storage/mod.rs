pub mod engine;
pub mod persistence;
pub mod visibility;

pub use engine::{bounded, MemoryWindowStore, StorageError, WindowStore};
pub use persistence::{PersistenceError, SnapshotFile};
pub use visibility::{visible, Visibility};
