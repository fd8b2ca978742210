pub mod pattern;
pub mod rollover;
pub mod storage;

pub use pattern::{DateFolderPattern, FolderPattern, PatternError};
pub use rollover::{CompressionMode, RolloverEvent, RotationTrigger};
pub use storage::{StorageBackend, StorageBackendError};
