//! # Error Types
//!
//! Domain-specific error types for stockflow-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockflow-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Structural invariant / input failures          │
//! │                                                                         │
//! │  stockflow-db errors (separate crate)                                  │
//! │  └── DbError          - Storage failures, lock conflicts, FK guards    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A document that fails validation is never persisted: the error is raised
//! before the first write of its transaction.

use thiserror::Error;

use crate::types::{DocumentKind, DocumentStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product does not exist for this tenant.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Document does not exist for this tenant.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Document is in a state that forbids item or header edits.
    ///
    /// ## When This Occurs
    /// - Editing items of a canceled or rejected order
    /// - Editing a quote that was already converted
    #[error("Document {document_id} is {status}, it can no longer be edited")]
    DocumentLocked {
        document_id: String,
        status: DocumentStatus,
    },

    /// Operation requires a quote but the document is an order.
    #[error("Document {document_id} is a {kind}, expected a quote")]
    NotAQuote {
        document_id: String,
        kind: DocumentKind,
    },

    /// Quote has already been turned into an order.
    #[error("Quote {0} was already converted")]
    AlreadyConverted(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input and invariant validation errors.
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

    /// Invalid format (e.g., unknown status, expiration on an order).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A quote was submitted without an expiration date.
    #[error("Quotes require an expiration date")]
    QuoteWithoutExpiration,

    /// A quote can never hold the finalized status.
    #[error("Quotes cannot be finalized; convert them to an order instead")]
    QuoteCannotFinalize,

    /// Status change not permitted by the document state machine.
    #[error("Cannot move a {kind} from {from} to {to}: {reason}")]
    InvalidTransition {
        kind: DocumentKind,
        from: DocumentStatus,
        to: DocumentStatus,
        reason: String,
    },

    /// Expired quotes are frozen.
    #[error("Quote expired on {expired_on} and can no longer be changed")]
    QuoteExpired { expired_on: chrono::NaiveDate },
}

// =============================================================================
// Missing Reference Warning
// =============================================================================

/// A line item whose product was deleted after the item was created.
///
/// Not an error: finalize skips such items and reports them so the caller
/// can surface a warning.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MissingReference {
    pub item_id: String,
    pub line_no: i64,
}

impl std::fmt::Display for MissingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {} ({}) references a deleted product",
            self.line_no, self.item_id
        )
    }
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
        let err = CoreError::DocumentLocked {
            document_id: "42".to_string(),
            status: DocumentStatus::Canceled,
        };
        assert_eq!(
            err.to_string(),
            "Document 42 is canceled, it can no longer be edited"
        );

        let err = ValidationError::InvalidTransition {
            kind: DocumentKind::Quote,
            from: DocumentStatus::Approved,
            to: DocumentStatus::Finalized,
            reason: "quotes are never finalized".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot move a quote from approved to finalized: quotes are never finalized"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::QuoteWithoutExpiration.into();
        assert!(matches!(
            core_err,
            CoreError::Validation(ValidationError::QuoteWithoutExpiration)
        ));
    }

    #[test]
    fn test_missing_reference_display() {
        let warning = MissingReference {
            item_id: "item-1".to_string(),
            line_no: 2,
        };
        assert_eq!(
            warning.to_string(),
            "line 2 (item-1) references a deleted product"
        );
    }
}
