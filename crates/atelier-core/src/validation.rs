//! # Validation Module
//!
//! Input validation utilities for the document engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Engine request (Rust)                                        │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Domain rules (transition gates, deposit cap)                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints (document numbers)                             │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: Multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a line designation.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 200 characters
pub fn validate_designation(designation: &str) -> ValidationResult<()> {
    let designation = designation.trim();

    if designation.is_empty() {
        return Err(ValidationError::Required {
            field: "designation".to_string(),
        });
    }

    if designation.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "designation".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a client name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 200 characters
pub fn validate_client_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "client name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "client name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Fractional values are fine (2.5 m² of panel)
pub fn validate_quantity(qty: Decimal) -> ValidationResult<()> {
    if qty <= Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates a unit price in dirhams.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (goodwill lines)
pub fn validate_unit_price(price: Decimal) -> ValidationResult<()> {
    if price < Decimal::ZERO {
        return Err(ValidationError::MustBePositive {
            field: "unit price".to_string(),
        });
    }

    Ok(())
}

/// Validates a discount percentage (line or global).
///
/// ## Rules
/// - Must be between 0 and 100 inclusive
pub fn validate_discount_percent(percent: Decimal) -> ValidationResult<()> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: "discount percent".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

/// Validates a deposit percentage.
///
/// ## Rules
/// - Must be between 1 and 100 inclusive (a 0% deposit is meaningless)
pub fn validate_deposit_percent(percent: u32) -> ValidationResult<()> {
    if percent == 0 || percent > 100 {
        return Err(ValidationError::OutOfRange {
            field: "deposit percent".to_string(),
            min: 1,
            max: 100,
        });
    }

    Ok(())
}

/// Validates a VAT rate percentage.
///
/// ## Rules
/// - Must be between 0 and 100 inclusive
/// - Unrecognized-but-plausible rates pass; the calculator accepts them
///   and `TvaRate::is_recognized` flags them for the caller
pub fn validate_tva_rate(rate: Decimal) -> ValidationResult<()> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: "tva rate".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Rules
/// - Must be a valid UUID format
/// - 36 characters with hyphens: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validate_designation() {
        assert!(validate_designation("Panneau chêne massif 200×80").is_ok());
        assert!(validate_designation("").is_err());
        assert!(validate_designation("   ").is_err());
        assert!(validate_designation(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(dec!(1)).is_ok());
        assert!(validate_quantity(dec!(2.5)).is_ok());
        assert!(validate_quantity(dec!(0)).is_err());
        assert!(validate_quantity(dec!(-1)).is_err());
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(dec!(0)).is_ok());
        assert!(validate_unit_price(dec!(1099.99)).is_ok());
        assert!(validate_unit_price(dec!(-1)).is_err());
    }

    #[test]
    fn test_validate_discount_percent() {
        assert!(validate_discount_percent(dec!(0)).is_ok());
        assert!(validate_discount_percent(dec!(100)).is_ok());
        assert!(validate_discount_percent(dec!(100.01)).is_err());
        assert!(validate_discount_percent(dec!(-5)).is_err());
    }

    #[test]
    fn test_validate_deposit_percent() {
        assert!(validate_deposit_percent(1).is_ok());
        assert!(validate_deposit_percent(30).is_ok());
        assert!(validate_deposit_percent(100).is_ok());
        assert!(validate_deposit_percent(0).is_err());
        assert!(validate_deposit_percent(101).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
