//! # Engine Error Types
//!
//! What callers of the engine see. Domain and database errors pass
//! through transparently; request-shape problems get their own variant.

use thiserror::Error;

use atelier_core::error::{CoreError, ValidationError};
use atelier_db::DbError;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule was violated (transition gate, deposit cap, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database operation failed (including NotFound).
    #[error(transparent)]
    Db(#[from] DbError),

    /// The request itself is malformed: wrong source type, empty line
    /// list, an override naming an unknown item.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

/// Convenience type alias for Results with EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_wraps_through_core() {
        let err: EngineError = ValidationError::Required {
            field: "designation".to_string(),
        }
        .into();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));
        assert!(err.to_string().contains("designation"));
    }

    #[test]
    fn test_db_not_found_passes_through() {
        let err: EngineError = DbError::not_found("Document", "abc").into();
        assert!(err.to_string().contains("abc"));
    }
}
