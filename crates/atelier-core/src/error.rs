//! # Error Types
//!
//! Domain-specific error types for atelier-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  atelier-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  atelier-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  atelier-engine errors (separate crate)                                │
//! │  └── EngineError      - What callers of the engine see                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → Caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (type, status, amounts)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A persisted document type string is not one of the seven types.
    ///
    /// ## When This Occurs
    /// - Corrupted row, or data written by a newer schema version
    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    /// A persisted status string is not a known status.
    #[error("Unknown document status: {0}")]
    UnknownDocumentStatus(String),

    /// A persisted discount kind string is not PERCENTAGE or FIXED.
    #[error("Unknown discount kind: {0}")]
    UnknownDiscountKind(String),

    /// The conversion graph has no edge from `from` to `to`.
    ///
    /// ## When This Occurs
    /// - Converting a DEVIS straight to FACTURE (must pass through BC)
    /// - Converting from a terminal type (AVOIR, FACTURE_ACOMPTE)
    #[error("Cannot convert {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// The source document is not in a status that allows conversion.
    ///
    /// ## When This Occurs
    /// - Converting a DRAFT quote (must be ACCEPTED first)
    /// - Invoicing an order that was never CONFIRMED
    #[error("{doc_type} {number} is {status}, conversion requires one of: {required}")]
    StatusGate {
        doc_type: String,
        number: String,
        status: String,
        required: String,
    },

    /// A requested deposit would exceed what the quote still allows.
    ///
    /// ## When This Occurs
    /// Existing deposits plus the requested amount exceed the quote's TTC.
    /// `remaining` is how much can still be requested.
    #[error(
        "Deposit of {requested} exceeds quote total {quote_ttc}; remaining allowed: {remaining}"
    )]
    DepositExceedsQuote {
        requested: Money,
        quote_ttc: Money,
        remaining: Money,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidTransition {
            from: "DEVIS".to_string(),
            to: "FACTURE".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot convert DEVIS to FACTURE");
    }

    #[test]
    fn test_deposit_cap_message_carries_remaining() {
        let err = CoreError::DepositExceedsQuote {
            requested: Money::from_centimes(600_000),
            quote_ttc: Money::from_centimes(1_000_000),
            remaining: Money::from_centimes(400_000),
        };
        let msg = err.to_string();
        assert!(msg.contains("6000.00 DH"));
        assert!(msg.contains("remaining allowed: 4000.00 DH"));
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "designation".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
