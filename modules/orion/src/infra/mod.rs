pub mod error_log;
pub mod hasher;
pub mod local_storage;

pub use error_log::TracingErrorSink;
pub use hasher::SaltedSha256Hasher;
pub use local_storage::LocalDiskStorage;
