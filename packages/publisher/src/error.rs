use common::storage::StorageError;
use sea_orm::DbErr;
use thiserror::Error;

/// Why a publish attempt was rolled back, as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackReason {
    BadRequest,
    NotFound,
    InternalError,
}

/// Errors surfaced by the publishing workflow.
///
/// Every variant implies the relational transaction was rolled back and any
/// asset written during the attempt was queued for compensating deletion.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("asset storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] DbErr),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PublishError {
    pub fn reason(&self) -> RollbackReason {
        match self {
            PublishError::Validation(_) => RollbackReason::BadRequest,
            PublishError::NotFound(_) => RollbackReason::NotFound,
            PublishError::Storage(_) | PublishError::Persistence(_) | PublishError::Internal(_) => {
                RollbackReason::InternalError
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PublishError>;
