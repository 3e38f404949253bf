pub mod config;
pub mod retry;
pub mod storage;

pub use config::{DeletionConfig, StorageConfig};
pub use retry::{BackoffPolicy, RetryAttempt, RetryDecision, RetryTracker};
