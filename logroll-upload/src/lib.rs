mod errors;
pub use errors::PipelineError;

// Storage sinks (no-op and opendal object store)
pub mod storage;
pub use storage::{
    select_storage, BackendConfig, CloudBackend, LocalBackend, NoopStorage, ObjectStorage,
};

// Compression stage
pub mod compressor;
pub use compressor::{CompressionHandle, Compressor};

// Bounded upload stage
pub mod upload_pool;
pub use upload_pool::{
    destination_key, UploadHandle, UploadOutcome, UploadPool, UploadPoolConfig, UploadTask,
};

// Rollover -> compression -> upload chaining and exit-time drain
pub mod coordinator;
pub use coordinator::{InFlight, RolloverCoordinator};
pub mod shutdown;
pub use shutdown::{PipelineState, ShutdownReport, ShutdownSequencer};

mod pipeline;
pub use pipeline::{UploadConfig, UploadPipeline};

// Time-based rolling file acting as the rotation trigger
pub mod rolling;
pub use rolling::{RollingConfig, RollingFile};

pub mod upload_metrics;

// Unit tests
#[cfg(test)]
mod test_support;
#[cfg(test)]
mod compressor_test;
#[cfg(test)]
mod shutdown_test;
