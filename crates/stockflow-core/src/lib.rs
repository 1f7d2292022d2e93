//! # stockflow-core: Pure Business Logic for Stockflow
//!
//! Money, discount math, domain types, the document state machine and input
//! validation. This crate performs no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockflow Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   Collaborators (web front office, PDF renderer, dashboards)    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ explicit tenant id on every call       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         stockflow-db (DocumentService, StockLedger, repos)      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockflow-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ lifecycle │  │ validation│  │   │
//! │  │   │  Document │  │   Money   │  │  totals   │  │   rules   │  │   │
//! │  │   │  LineItem │  │ discount  │  │ statuses  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, CommercialDocument, LineItem, ledger rows)
//! - [`money`] - Money type with integer arithmetic
//! - [`lifecycle`] - Totals, status transitions, stock effect decisions
//! - [`report`] - Read models for the report and metrics collaborators
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation
//!
//! ## Example Usage
//!
//! ```rust
//! use stockflow_core::lifecycle::compute_totals;
//! use stockflow_core::{DiscountRate, Money};
//!
//! // 3 × 20.00 with 10% off
//! let totals = compute_totals([(3, Money::from_cents(2000))], DiscountRate::from_bps(1000)).unwrap();
//! assert_eq!(totals.total.cents(), 5400);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod lifecycle;
pub mod money;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, MissingReference, ValidationError};
pub use lifecycle::{DocumentTotals, DocumentUpdate, LineItemInput, NewDocument, StockEffect};
pub use money::Money;
pub use report::{DocumentReport, InventoryValuation, ReportLine, SalesSummary};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Days a quote stays valid when created without an expiration date.
pub const DEFAULT_QUOTE_VALIDITY_DAYS: u32 = 7;
