//! # Validation Module
//!
//! Input validation utilities for Stockflow.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Field checks (THIS MODULE)                                   │
//! │  ├── quantity ≥ 1, prices ≥ 0, discount ≤ 100%                         │
//! │  └── titles, identifiers                                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Document rules (lifecycle module)                            │
//! │  ├── quote expiration, forbidden transitions                           │
//! │  └── locked / expired documents                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints on quantities and prices                        │
//! │  └── Foreign keys (cascade items, null product refs)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockflow_core::validation::{validate_quantity, validate_discount_bps};
//!
//! validate_quantity(5).unwrap();
//! validate_discount_bps(1000).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::DiscountRate;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of a product title.
pub const MAX_TITLE_LEN: usize = 500;

/// Largest quantity accepted on a line item or ledger record.
pub const MAX_ITEM_QUANTITY: i64 = i32::MAX as i64;

/// Largest price accepted, in cents (ten digits: 99,999,999.99).
pub const MAX_PRICE_CENTS: i64 = 9_999_999_999;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product title.
///
/// ## Rules
/// - Must not be empty
/// - At most 500 characters
///
/// ## Example
/// ```rust
/// use stockflow_core::validation::validate_title;
///
/// assert!(validate_title("Notebook A5").is_ok());
/// assert!(validate_title("  ").is_err());
/// ```
pub fn validate_title(title: &str) -> ValidationResult<()> {
    let title = title.trim();

    if title.is_empty() {
        return Err(ValidationError::Required {
            field: "title".to_string(),
        });
    }

    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TooLong {
            field: "title".to_string(),
            max: MAX_TITLE_LEN,
        });
    }

    Ok(())
}

/// Validates a tenant identifier. Any non-blank string is accepted.
pub fn validate_tenant_id(tenant_id: &str) -> ValidationResult<()> {
    if tenant_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "tenant_id".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line item or movement quantity.
///
/// ## Rules
/// - Must be at least 1
/// - At most [`MAX_ITEM_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty < 1 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
/// - At most [`MAX_PRICE_CENTS`]
///
/// ## Example
/// ```rust
/// use stockflow_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents("unit_price", 1099).is_ok());
/// assert!(validate_price_cents("unit_price", 0).is_ok());
/// assert!(validate_price_cents("unit_price", -100).is_err());
/// assert!(validate_price_cents("unit_price", 10_000_000_000).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a discount in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps > DiscountRate::FULL_BPS {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: DiscountRate::FULL_BPS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_title() {
        assert!(validate_title("Notebook A5").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"A".repeat(501)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(10_000).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(matches!(
            validate_quantity(MAX_ITEM_QUANTITY + 1),
            Err(ValidationError::OutOfRange { min: 1, .. })
        ));
        assert!(validate_quantity(i64::MAX).is_err());
    }

    #[test]
    fn test_validate_price_cents() {
        assert!(validate_price_cents("unit_price", 0).is_ok());
        assert!(validate_price_cents("unit_price", 1099).is_ok());
        assert!(validate_price_cents("unit_price", MAX_PRICE_CENTS).is_ok());
        let err = validate_price_cents("unit_price", -1).unwrap_err();
        assert!(err.to_string().starts_with("unit_price"));
        assert!(validate_price_cents("unit_price", MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_price_cents("unit_price", i64::MAX).is_err());
    }

    #[test]
    fn test_validate_discount_bps() {
        assert!(validate_discount_bps(0).is_ok());
        assert!(validate_discount_bps(1250).is_ok());
        assert!(validate_discount_bps(10_000).is_ok());
        assert!(validate_discount_bps(10_001).is_err());
    }

    #[test]
    fn test_validate_tenant_id() {
        assert!(validate_tenant_id("acme").is_ok());
        assert!(validate_tenant_id(" ").is_err());
    }
}
