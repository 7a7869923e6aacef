use thiserror::Error;

use crate::status::StatusCode;

/// A failure reported by the engine through a status code.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoundaryError {
    /// A point lookup found nothing.
    #[error("key not found")]
    NotFound,
    /// Retryable conflict or deadlock.
    #[error("transient conflict or deadlock")]
    Conflict,
    /// `create_table` lost a naming race or the table pre-existed.
    #[error("table already exists")]
    TableAlreadyExists,
    /// The engine rejected the requested partitioning method.
    #[error("invalid partition method")]
    InvalidPartitionMethod,
    /// A batch was applied only partially.
    #[error("batch not fully applied")]
    BatchNotFullySuccess,
    /// A non-retryable failure. Carries the raw status so unknown codes are
    /// not silently collapsed.
    #[error("permanent engine failure (status {0})")]
    Permanent(i32),
}

impl BoundaryError {
    /// Translates a raw status integer, mapping `SUCCESS` to `Ok(())` and
    /// unknown codes to [`BoundaryError::Permanent`].
    pub fn check(raw: i32) -> Result<(), BoundaryError> {
        match StatusCode::from_raw(raw) {
            Some(StatusCode::Success) => Ok(()),
            Some(StatusCode::NotFound) => Err(BoundaryError::NotFound),
            Some(StatusCode::ConflictOrDeadlock) => Err(BoundaryError::Conflict),
            Some(StatusCode::TableAlreadyExists) => Err(BoundaryError::TableAlreadyExists),
            Some(StatusCode::InvalidPartitionMethod) => Err(BoundaryError::InvalidPartitionMethod),
            Some(StatusCode::BatchNotFullySuccess) => Err(BoundaryError::BatchNotFullySuccess),
            Some(StatusCode::Permanent) => Err(BoundaryError::Permanent(raw)),
            None => Err(BoundaryError::Permanent(raw)),
        }
    }
}
