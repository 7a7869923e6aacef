use kvt_boundary::{BoundaryError, StatusCode};
use thiserror::Error;

/// An error surfaced to the storage consumer.
///
/// The adapter never retries; [`BackendError::Conflict`] marks the failures
/// a consumer may retry by re-running its transaction.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The caller passed bytes the active encoding cannot represent, or
    /// requested an operation the table's partitioning cannot serve.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    /// The manager, store or transaction is no longer usable.
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// A stored value failed to deserialize.
    #[error("malformed stored value: {0}")]
    Encoding(String),
    /// A failure reported by the engine.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Engine-side failure kinds, translated from boundary status codes.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Retryable conflict or deadlock; the consumer may re-run the
    /// transaction.
    #[error("transient conflict or deadlock")]
    Conflict,
    /// A point lookup found nothing. Used internally for single-key reads;
    /// slices report absence as an empty result instead.
    #[error("key not found")]
    NotFound,
    /// The engine refused to start a transaction.
    #[error("engine out of transaction resources")]
    ResourceExhausted,
    /// The engine failed to come up.
    #[error("engine initialization failed: {0}")]
    Initialization(String),
    /// A non-retryable engine failure.
    #[error("permanent engine failure ({context}, status {code})")]
    Permanent {
        /// Raw boundary status code.
        code: i32,
        /// The operation that failed.
        context: &'static str,
    },
}

impl StorageError {
    /// Translates an engine failure observed during `context`.
    pub(crate) fn backend(context: &'static str, error: BoundaryError) -> StorageError {
        let backend = match error {
            BoundaryError::Conflict => BackendError::Conflict,
            BoundaryError::NotFound => BackendError::NotFound,
            BoundaryError::Permanent(code) => BackendError::Permanent { code, context },
            // Naming races and partition rejections are handled where they
            // can occur; reaching here means the engine broke its contract.
            BoundaryError::TableAlreadyExists => BackendError::Permanent {
                code: StatusCode::TableAlreadyExists.as_raw(),
                context,
            },
            BoundaryError::InvalidPartitionMethod => BackendError::Permanent {
                code: StatusCode::InvalidPartitionMethod.as_raw(),
                context,
            },
            BoundaryError::BatchNotFullySuccess => BackendError::Permanent {
                code: StatusCode::BatchNotFullySuccess.as_raw(),
                context,
            },
        };
        StorageError::Backend(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_stays_retryable() {
        let err = StorageError::backend("commit", BoundaryError::Conflict);
        assert!(matches!(
            err,
            StorageError::Backend(BackendError::Conflict)
        ));
    }

    #[test]
    fn unknown_permanent_keeps_code_and_context() {
        let err = StorageError::backend("scan", BoundaryError::Permanent(42));
        match err {
            StorageError::Backend(BackendError::Permanent { code, context }) => {
                assert_eq!(code, 42);
                assert_eq!(context, "scan");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
