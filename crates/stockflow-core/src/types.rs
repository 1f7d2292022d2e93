//! # Domain Types
//!
//! Core domain types used throughout Stockflow.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────┐    ┌─────────────────┐    ┌────────────────┐  │
//! │  │ CommercialDocument  │───►│    LineItem     │───►│    Product     │  │
//! │  │ ──────────────────  │ 1:N│  ─────────────  │weak│  ────────────  │  │
//! │  │ kind (order/quote)  │    │  quantity       │    │  quantity      │  │
//! │  │ status              │    │  unit_price     │    │  cost_price    │  │
//! │  │ discount_bps        │    │  purchase_price │    │  selling_price │  │
//! │  │ total (derived)     │    │   (snapshot)    │    └───────┬────────┘  │
//! │  └─────────────────────┘    └─────────────────┘            │           │
//! │                                                            │           │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┴───────┐   │
//! │  │   Inflow     │   │   Outflow    │──►│  StockMovement (in/out)  │   │
//! │  │  (stock in)  │   │ (stock out)  │   │  append-only audit trail │   │
//! │  └──────────────┘   └──────────────┘   └──────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity carries a `tenant_id`; repositories filter on it in every
//! statement.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Discount Rate
// =============================================================================

/// Discount percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// Discounts carry two fraction digits (`12.50%`), so 1 bps = 0.01% and
/// 10000 bps = 100%. Integer storage keeps the total math exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// 100% expressed in basis points.
    pub const FULL_BPS: u32 = 10_000;

    /// Creates a discount rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero discount.
    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }

    /// Checks if the discount is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for DiscountRate {
    fn default() -> Self {
        DiscountRate::zero()
    }
}

impl fmt::Display for DiscountRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product held in stock.
///
/// `quantity` is written by the stock ledger only (after the opening
/// quantity set at creation). It may go negative; no lower bound is enforced.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this product belongs to.
    pub tenant_id: String,

    /// Display name.
    pub title: String,

    /// Current on-hand quantity.
    pub quantity: i64,

    /// Cost in cents (snapshotted onto line items as purchase price).
    pub cost_price_cents: i64,

    /// Selling price in cents (a suggestion; line items carry their own price).
    pub selling_price_cents: i64,

    /// Optional free-text description.
    pub description: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the cost price as Money.
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    /// Returns the selling price as Money.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }
}

// =============================================================================
// Document Kind
// =============================================================================

/// Discriminator between the two commercial document variants.
///
/// Orders and quotes share one table and one struct; kind-specific rules
/// live in [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Sales order; finalizing it moves stock.
    Order,
    /// Quote (budget); never moves stock, may be converted into an order.
    Quote,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Order => "order",
            DocumentKind::Quote => "quote",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "order" | "sale" => Ok(DocumentKind::Order),
            "quote" | "budget" => Ok(DocumentKind::Quote),
            other => Err(ValidationError::InvalidFormat {
                field: "kind".to_string(),
                reason: format!("unknown document kind '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Document Status
// =============================================================================

/// The status of a commercial document.
///
/// ## State Flow
/// ```text
/// draft ─► pending ─┬─► waiting_payment ─┐
///                   ├─► finalized ───────┼─► delivered / sent
///                   ├─► approved ────────┼─► converted (quotes only)
///                   ├─► rejected         │
///                   └─► canceled ◄───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Pending,
    WaitingPayment,
    Finalized,
    Canceled,
    Delivered,
    Sent,
    Approved,
    Rejected,
    Converted,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 10] = [
        DocumentStatus::Draft,
        DocumentStatus::Pending,
        DocumentStatus::WaitingPayment,
        DocumentStatus::Finalized,
        DocumentStatus::Canceled,
        DocumentStatus::Delivered,
        DocumentStatus::Sent,
        DocumentStatus::Approved,
        DocumentStatus::Rejected,
        DocumentStatus::Converted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Pending => "pending",
            DocumentStatus::WaitingPayment => "waiting_payment",
            DocumentStatus::Finalized => "finalized",
            DocumentStatus::Canceled => "canceled",
            DocumentStatus::Delivered => "delivered",
            DocumentStatus::Sent => "sent",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Converted => "converted",
        }
    }

    /// Statuses in which the document's items are reflected in stock.
    ///
    /// Only the transition into `Finalized` propagates; `Delivered` and
    /// `Sent` follow a finalized order and keep its outflows in place.
    pub fn commits_stock(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Finalized | DocumentStatus::Delivered | DocumentStatus::Sent
        )
    }

    /// Statuses that freeze the document: no item or header edits.
    pub fn locks_edits(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Canceled | DocumentStatus::Rejected | DocumentStatus::Converted
        )
    }
}

impl Default for DocumentStatus {
    fn default() -> Self {
        DocumentStatus::Draft
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        DocumentStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == wanted || (wanted == "waiting" && *status == DocumentStatus::WaitingPayment))
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("unknown document status '{}'", s.trim()),
            })
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Pix,
    Boleto,
}

// =============================================================================
// Commercial Document
// =============================================================================

/// A sale, order or quote: a priced collection of line items with a status.
///
/// `total_cents` is derived from the items and the discount; it is written
/// only by the total recompute step of the lifecycle engine.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CommercialDocument {
    pub id: String,
    pub tenant_id: String,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    /// Discount in basis points (1000 = 10%).
    pub discount_bps: u32,
    pub total_cents: i64,
    pub client_id: Option<String>,
    pub seller_id: Option<String>,
    pub cashier_id: Option<String>,
    /// Required for quotes.
    #[ts(as = "Option<String>")]
    pub expiration_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    /// Set once the document's outflows have been emitted.
    pub stock_committed: bool,
    /// For converted quotes: the order created from it.
    pub converted_to: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CommercialDocument {
    #[inline]
    pub fn discount(&self) -> DiscountRate {
        DiscountRate::from_bps(self.discount_bps)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Tag written on outflows emitted for this document.
    pub fn sale_reference(&self) -> String {
        format!("Sale {}", self.id)
    }

    /// Returns true if a quote's expiration date lies before `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.kind == DocumentKind::Quote
            && self.expiration_date.map(|d| d < today).unwrap_or(false)
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// A line item of a document.
///
/// `purchase_price_cents` is a point-in-time snapshot of the product's cost
/// price, captured when the item is first stored and never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LineItem {
    pub id: String,
    pub document_id: String,
    /// 1-based position within the document.
    pub line_no: i64,
    /// Weak reference; NULL once the product is deleted.
    pub product_id: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub purchase_price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LineItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    /// unit price × quantity, before the document discount. `None` if the
    /// product does not fit in `i64` cents.
    #[inline]
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price().checked_mul_quantity(self.quantity)
    }
}

// =============================================================================
// Stock Movements
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
}

impl MovementType {
    /// The direction that undoes this one.
    pub fn opposite(&self) -> Self {
        match self {
            MovementType::In => MovementType::Out,
            MovementType::Out => MovementType::In,
        }
    }

    /// Signed change to product quantity for a movement of `quantity` units.
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            MovementType::In => quantity,
            MovementType::Out => -quantity,
        }
    }
}

/// Append-only audit record, one per ledger application.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    /// Always positive; direction is carried by `movement_type`.
    pub quantity: i64,
    pub movement_type: MovementType,
    /// Inflow or outflow that caused the movement.
    pub source_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Stock entering the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Inflow {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub supplier_reference: Option<String>,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Stock leaving the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Outflow {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// `"Sale {document_id}"` for outflows emitted by finalize.
    pub sale_reference: Option<String>,
    pub description: Option<String>,
    /// Originating document, if any.
    pub document_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Ledger Inputs
// =============================================================================

/// Input for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub title: String,
    /// Opening stock.
    pub quantity: i64,
    pub cost_price_cents: i64,
    pub selling_price_cents: i64,
    pub description: Option<String>,
}

/// Input for recording stock that enters the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInflow {
    pub product_id: String,
    pub quantity: i64,
    pub supplier_reference: Option<String>,
    pub description: Option<String>,
}

/// Input for recording stock that leaves the warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOutflow {
    pub product_id: String,
    pub quantity: i64,
    pub sale_reference: Option<String>,
    pub description: Option<String>,
    pub document_id: Option<String>,
}

impl NewOutflow {
    /// A manual outflow with no document attached.
    pub fn manual(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            sale_reference: None,
            description: None,
            document_id: None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_rate() {
        let rate = DiscountRate::from_bps(1000);
        assert_eq!(rate.bps(), 1000);
        assert_eq!(rate.to_string(), "10.00%");
        assert_eq!(DiscountRate::from_bps(1250).to_string(), "12.50%");
        assert!(DiscountRate::default().is_zero());
    }

    #[test]
    fn test_status_parsing_roundtrips_names() {
        for status in DocumentStatus::ALL {
            assert_eq!(status.as_str().parse::<DocumentStatus>().unwrap(), status);
        }
        assert_eq!(
            "waiting".parse::<DocumentStatus>().unwrap(),
            DocumentStatus::WaitingPayment
        );
        assert!("archived".parse::<DocumentStatus>().is_err());
    }

    #[test]
    fn test_status_serde_matches_storage_names() {
        let json = serde_json::to_string(&DocumentStatus::WaitingPayment).unwrap();
        assert_eq!(json, "\"waiting_payment\"");
    }

    #[test]
    fn test_kind_parsing_accepts_aliases() {
        assert_eq!("budget".parse::<DocumentKind>().unwrap(), DocumentKind::Quote);
        assert_eq!("Order".parse::<DocumentKind>().unwrap(), DocumentKind::Order);
        assert!("invoice".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn test_commits_stock() {
        assert!(DocumentStatus::Finalized.commits_stock());
        assert!(DocumentStatus::Delivered.commits_stock());
        assert!(!DocumentStatus::Canceled.commits_stock());
        assert!(!DocumentStatus::Draft.commits_stock());
    }

    #[test]
    fn test_movement_direction() {
        assert_eq!(MovementType::In.signed(3), 3);
        assert_eq!(MovementType::Out.signed(3), -3);
        assert_eq!(MovementType::Out.opposite(), MovementType::In);
    }

    #[test]
    fn test_quote_expiry() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let now = Utc::now();
        let mut doc = CommercialDocument {
            id: "d1".to_string(),
            tenant_id: "t1".to_string(),
            kind: DocumentKind::Quote,
            status: DocumentStatus::Draft,
            discount_bps: 0,
            total_cents: 0,
            client_id: None,
            seller_id: None,
            cashier_id: None,
            expiration_date: NaiveDate::from_ymd_opt(2026, 3, 9),
            payment_method: None,
            stock_committed: false,
            converted_to: None,
            created_at: now,
            updated_at: now,
        };
        assert!(doc.is_expired(today));

        doc.expiration_date = Some(today);
        assert!(!doc.is_expired(today));

        doc.kind = DocumentKind::Order;
        doc.expiration_date = NaiveDate::from_ymd_opt(2020, 1, 1);
        assert!(!doc.is_expired(today));
        assert_eq!(doc.sale_reference(), "Sale d1");
    }
}
