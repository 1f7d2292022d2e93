//! # Document Lifecycle Rules
//!
//! Pure rules for commercial documents: totals, the status state machine,
//! and the decision of what a status change does to stock.
//!
//! ## Status Change → Stock Effect
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  committed?   target status            effect                           │
//! │  ──────────   ──────────────────────   ────────────────────────────     │
//! │  no           finalized                Propagate (one outflow / item)   │
//! │  yes          finalized/delivered/sent None (already in the ledger)     │
//! │  yes          anything else            Reverse (undo own outflows)      │
//! │  no           anything else            None                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here touches storage. The db crate's `DocumentService` applies
//! these decisions inside a transaction.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{
    CommercialDocument, DiscountRate, DocumentKind, DocumentStatus, LineItem, PaymentMethod,
};
use crate::validation::{
    validate_discount_bps, validate_price_cents, validate_quantity, ValidationResult,
};

// =============================================================================
// Inputs
// =============================================================================

/// A line item as submitted by the caller.
///
/// `id` is `None` for new items. When present it must name an item already
/// stored on the document; that item keeps its purchase price snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItemInput {
    pub id: Option<String>,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl LineItemInput {
    /// Convenience constructor for a new item.
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price_cents: i64) -> Self {
        Self {
            id: None,
            product_id: product_id.into(),
            quantity,
            unit_price_cents,
        }
    }
}

/// Input for creating an order or a quote.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewDocument {
    pub kind: DocumentKind,
    /// Initial status; `draft` when absent.
    pub status: Option<DocumentStatus>,
    pub discount_bps: u32,
    pub client_id: Option<String>,
    pub seller_id: Option<String>,
    pub cashier_id: Option<String>,
    /// Quotes get a default expiration when absent.
    #[ts(as = "Option<String>")]
    pub expiration_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub items: Vec<LineItemInput>,
}

impl NewDocument {
    /// A draft order with no header fields set.
    pub fn order(items: Vec<LineItemInput>) -> Self {
        Self::empty(DocumentKind::Order, items)
    }

    /// A draft quote with no header fields set.
    pub fn quote(items: Vec<LineItemInput>) -> Self {
        Self::empty(DocumentKind::Quote, items)
    }

    fn empty(kind: DocumentKind, items: Vec<LineItemInput>) -> Self {
        Self {
            kind,
            status: None,
            discount_bps: 0,
            client_id: None,
            seller_id: None,
            cashier_id: None,
            expiration_date: None,
            payment_method: None,
            items,
        }
    }

    pub fn with_discount(mut self, bps: u32) -> Self {
        self.discount_bps = bps;
        self
    }

    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_expiration(mut self, date: NaiveDate) -> Self {
        self.expiration_date = Some(date);
        self
    }
}

/// Edits to an existing document. `None` leaves a field unchanged.
///
/// `items`, when present, is the complete new item set: stored items not
/// listed are deleted. `expiration_date` applies to quotes only; setting it
/// on an order is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DocumentUpdate {
    pub discount_bps: Option<u32>,
    pub client_id: Option<String>,
    pub seller_id: Option<String>,
    pub cashier_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub expiration_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub items: Option<Vec<LineItemInput>>,
}

// =============================================================================
// Totals
// =============================================================================

/// Derived amounts of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DocumentTotals {
    /// Σ quantity × unit price.
    pub subtotal: Money,
    pub discount: DiscountRate,
    /// subtotal − total.
    pub discount_amount: Money,
    pub total: Money,
}

/// Computes the totals for `(quantity, unit_price)` lines.
///
/// `total = subtotal × (1 − discount)`, rounded half-up to the cent. An
/// empty line set yields zero. A subtotal that does not fit in `i64` cents
/// is rejected as out of range.
///
/// ## Example
/// ```rust
/// use stockflow_core::lifecycle::compute_totals;
/// use stockflow_core::{DiscountRate, Money};
///
/// let totals = compute_totals([(3, Money::from_cents(2000))], DiscountRate::from_bps(1000)).unwrap();
/// assert_eq!(totals.total.cents(), 5400);
/// assert_eq!(totals.discount_amount.cents(), 600);
/// ```
pub fn compute_totals<I>(lines: I, discount: DiscountRate) -> ValidationResult<DocumentTotals>
where
    I: IntoIterator<Item = (i64, Money)>,
{
    let mut subtotal = Money::zero();
    for (quantity, unit_price) in lines {
        subtotal = unit_price
            .checked_mul_quantity(quantity)
            .and_then(|line_total| subtotal.checked_add(line_total))
            .ok_or_else(total_out_of_range)?;
    }
    let total = subtotal.apply_discount(discount);

    Ok(DocumentTotals {
        subtotal,
        discount,
        discount_amount: subtotal - total,
        total,
    })
}

/// Totals for stored line items.
pub fn totals_for_items(items: &[LineItem], discount: DiscountRate) -> ValidationResult<DocumentTotals> {
    compute_totals(
        items.iter().map(|item| (item.quantity, item.unit_price())),
        discount,
    )
}

pub(crate) fn total_out_of_range() -> ValidationError {
    ValidationError::OutOfRange {
        field: "total".to_string(),
        min: 0,
        max: i64::MAX,
    }
}

/// Unit price after the document discount, half-up to the cent.
#[inline]
pub fn discounted_unit_price(unit_price: Money, discount: DiscountRate) -> Money {
    unit_price.apply_discount(discount)
}

/// Audit description written on an outflow emitted by finalize.
pub fn outflow_description(document_id: &str, unit_price: Money, discount: DiscountRate) -> String {
    format!(
        "Sale {}: discounted unit price {}",
        document_id,
        discounted_unit_price(unit_price, discount)
    )
}

// =============================================================================
// Expiration
// =============================================================================

/// Expiration assigned to quotes created without one.
pub fn default_expiration(created_on: NaiveDate, validity_days: u32) -> NaiveDate {
    created_on + Duration::days(i64::from(validity_days))
}

/// Fails if `document` is a quote whose expiration date is before `today`.
pub fn ensure_not_expired(document: &CommercialDocument, today: NaiveDate) -> ValidationResult<()> {
    match document.expiration_date {
        Some(expired_on) if document.is_expired(today) => {
            Err(ValidationError::QuoteExpired { expired_on })
        }
        _ => Ok(()),
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validates one submitted line item.
pub fn validate_line_item(item: &LineItemInput) -> ValidationResult<()> {
    if item.product_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "product_id".to_string(),
        });
    }
    validate_quantity(item.quantity)?;
    validate_price_cents("unit_price", item.unit_price_cents)?;
    Ok(())
}

/// Validates a new document. Call after defaults (expiration) are applied.
pub fn validate_new_document(doc: &NewDocument) -> ValidationResult<()> {
    validate_discount_bps(doc.discount_bps)?;

    let status = doc.status.unwrap_or_default();
    if doc.kind == DocumentKind::Quote {
        if doc.expiration_date.is_none() {
            return Err(ValidationError::QuoteWithoutExpiration);
        }
        if status == DocumentStatus::Finalized {
            return Err(ValidationError::QuoteCannotFinalize);
        }
    } else if doc.expiration_date.is_some() {
        return Err(order_expiration());
    }
    if status == DocumentStatus::Converted {
        return Err(ValidationError::InvalidTransition {
            kind: doc.kind,
            from: DocumentStatus::Draft,
            to: DocumentStatus::Converted,
            reason: "documents are only converted through quote conversion".to_string(),
        });
    }

    for item in &doc.items {
        validate_line_item(item)?;
    }
    Ok(())
}

/// Validates header edits against the document they apply to.
pub fn validate_update(document: &CommercialDocument, update: &DocumentUpdate) -> ValidationResult<()> {
    if let Some(bps) = update.discount_bps {
        validate_discount_bps(bps)?;
    }
    if let Some(items) = &update.items {
        for item in items {
            validate_line_item(item)?;
        }
    }
    match document.kind {
        DocumentKind::Quote => {
            if document.expiration_date.is_none() && update.expiration_date.is_none() {
                return Err(ValidationError::QuoteWithoutExpiration);
            }
        }
        DocumentKind::Order => {
            if update.expiration_date.is_some() {
                return Err(order_expiration());
            }
        }
    }
    Ok(())
}

fn order_expiration() -> ValidationError {
    ValidationError::InvalidFormat {
        field: "expiration_date".to_string(),
        reason: "orders carry no expiration date".to_string(),
    }
}

/// Fails with `DocumentLocked` on canceled, rejected or converted documents.
pub fn ensure_editable(document: &CommercialDocument) -> CoreResult<()> {
    if document.status.locks_edits() {
        return Err(CoreError::DocumentLocked {
            document_id: document.id.clone(),
            status: document.status,
        });
    }
    Ok(())
}

/// Checks a status change requested through `set_status`.
///
/// Everything is allowed except:
/// - leaving `converted`
/// - entering `converted` (only quote conversion sets it)
/// - finalizing a quote
pub fn validate_transition(
    kind: DocumentKind,
    from: DocumentStatus,
    to: DocumentStatus,
) -> ValidationResult<()> {
    let reject = |reason: &str| {
        Err(ValidationError::InvalidTransition {
            kind,
            from,
            to,
            reason: reason.to_string(),
        })
    };

    if from == to {
        return Ok(());
    }
    if from == DocumentStatus::Converted {
        return reject("converted quotes are final");
    }
    if to == DocumentStatus::Converted {
        return match kind {
            DocumentKind::Order => reject("orders are never converted"),
            DocumentKind::Quote => reject("use quote conversion to convert a quote"),
        };
    }
    if kind == DocumentKind::Quote && to == DocumentStatus::Finalized {
        return reject("quotes are never finalized");
    }
    Ok(())
}

/// Checks the preconditions of converting `document` into an order.
pub fn ensure_convertible(document: &CommercialDocument, today: NaiveDate) -> CoreResult<()> {
    if document.kind != DocumentKind::Quote {
        return Err(CoreError::NotAQuote {
            document_id: document.id.clone(),
            kind: document.kind,
        });
    }
    if document.status == DocumentStatus::Converted || document.converted_to.is_some() {
        return Err(CoreError::AlreadyConverted(document.id.clone()));
    }
    ensure_not_expired(document, today)?;
    Ok(())
}

// =============================================================================
// Stock Effect
// =============================================================================

/// What a status change must do to the stock ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    /// Emit one outflow per item and mark the document committed.
    Propagate,
    /// Undo the document's outflows and clear the committed flag.
    Reverse,
    None,
}

/// Decides the ledger effect of moving a document to `to`.
///
/// `committed` is the document's `stock_committed` flag: finalizing twice
/// never propagates twice.
pub fn stock_effect(committed: bool, to: DocumentStatus) -> StockEffect {
    match (committed, to) {
        (false, DocumentStatus::Finalized) => StockEffect::Propagate,
        (true, status) if !status.commits_stock() => StockEffect::Reverse,
        _ => StockEffect::None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::validation::{MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

    fn document(kind: DocumentKind, status: DocumentStatus) -> CommercialDocument {
        let now = Utc::now();
        CommercialDocument {
            id: "doc-1".to_string(),
            tenant_id: "t1".to_string(),
            kind,
            status,
            discount_bps: 0,
            total_cents: 0,
            client_id: None,
            seller_id: None,
            cashier_id: None,
            expiration_date: NaiveDate::from_ymd_opt(2026, 1, 31),
            payment_method: None,
            stock_committed: false,
            converted_to: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_totals_with_discount() {
        let totals = compute_totals(
            [(3, Money::from_cents(2000)), (1, Money::from_cents(550))],
            DiscountRate::from_bps(1000),
        )
        .unwrap();
        assert_eq!(totals.subtotal.cents(), 6550);
        assert_eq!(totals.total.cents(), 5895);
        assert_eq!(totals.discount_amount.cents(), 655);
    }

    #[test]
    fn test_totals_round_half_up() {
        // 0.15 at 50% off = 0.075 → 0.08
        let totals = compute_totals([(1, Money::from_cents(15))], DiscountRate::from_bps(5000)).unwrap();
        assert_eq!(totals.total.cents(), 8);
        assert_eq!(totals.discount_amount.cents(), 7);
    }

    #[test]
    fn test_totals_empty_is_zero() {
        let totals = compute_totals(Vec::new(), DiscountRate::from_bps(2500)).unwrap();
        assert_eq!(totals.subtotal, Money::zero());
        assert_eq!(totals.total, Money::zero());
    }

    #[test]
    fn test_full_discount() {
        let totals = compute_totals([(2, Money::from_cents(999))], DiscountRate::from_bps(10_000)).unwrap();
        assert_eq!(totals.total, Money::zero());
        assert_eq!(totals.discount_amount.cents(), 1998);
    }

    #[test]
    fn test_totals_overflow_is_out_of_range() {
        let max_line = (MAX_ITEM_QUANTITY, Money::from_cents(MAX_PRICE_CENTS));
        let err = compute_totals([max_line], DiscountRate::zero()).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref field, .. } if field == "total"));

        // Each line fits, their sum does not
        let big = (1, Money::from_cents(i64::MAX / 2 + 1));
        assert!(compute_totals([big, big], DiscountRate::zero()).is_err());
    }

    #[test]
    fn test_outflow_description_carries_discounted_price() {
        let description = outflow_description("abc", Money::from_cents(2000), DiscountRate::from_bps(1000));
        assert_eq!(description, "Sale abc: discounted unit price 18.00");
    }

    #[test]
    fn test_default_expiration() {
        assert_eq!(default_expiration(date(2026, 2, 25), 7), date(2026, 3, 4));
    }

    #[test]
    fn test_quote_requires_expiration() {
        let doc = NewDocument::quote(vec![LineItemInput::new("p1", 1, 100)]);
        assert!(matches!(
            validate_new_document(&doc),
            Err(ValidationError::QuoteWithoutExpiration)
        ));

        let doc = doc.with_expiration(date(2026, 5, 1));
        assert!(validate_new_document(&doc).is_ok());
    }

    #[test]
    fn test_quote_cannot_be_created_finalized() {
        let doc = NewDocument::quote(vec![])
            .with_expiration(date(2026, 5, 1))
            .with_status(DocumentStatus::Finalized);
        assert!(matches!(
            validate_new_document(&doc),
            Err(ValidationError::QuoteCannotFinalize)
        ));
    }

    #[test]
    fn test_new_document_rejects_bad_items() {
        let doc = NewDocument::order(vec![LineItemInput::new("p1", 0, 100)]);
        assert!(validate_new_document(&doc).is_err());

        let doc = NewDocument::order(vec![LineItemInput::new("p1", 1, -1)]);
        assert!(validate_new_document(&doc).is_err());

        let doc = NewDocument::order(vec![]).with_discount(10_001);
        assert!(validate_new_document(&doc).is_err());

        let doc = NewDocument::order(vec![]).with_status(DocumentStatus::Converted);
        assert!(validate_new_document(&doc).is_err());
    }

    #[test]
    fn test_orders_reject_expiration_date() {
        let doc = NewDocument::order(vec![]).with_expiration(date(2026, 5, 1));
        assert!(matches!(
            validate_new_document(&doc),
            Err(ValidationError::InvalidFormat { ref field, .. }) if field == "expiration_date"
        ));

        let order = document(DocumentKind::Order, DocumentStatus::Draft);
        let update = DocumentUpdate {
            expiration_date: Some(date(2026, 5, 1)),
            ..Default::default()
        };
        assert!(validate_update(&order, &update).is_err());
        assert!(validate_update(&order, &DocumentUpdate::default()).is_ok());

        let quote = document(DocumentKind::Quote, DocumentStatus::Draft);
        assert!(validate_update(&quote, &update).is_ok());
    }

    #[test]
    fn test_transitions() {
        use DocumentKind::*;
        use DocumentStatus::*;

        assert!(validate_transition(Order, Draft, Finalized).is_ok());
        assert!(validate_transition(Order, Finalized, Canceled).is_ok());
        assert!(validate_transition(Quote, Draft, Approved).is_ok());
        assert!(validate_transition(Quote, Approved, Approved).is_ok());

        assert!(validate_transition(Quote, Approved, Finalized).is_err());
        assert!(validate_transition(Order, Pending, Converted).is_err());
        assert!(validate_transition(Quote, Approved, Converted).is_err());
        assert!(validate_transition(Quote, Converted, Draft).is_err());
    }

    #[test]
    fn test_ensure_editable() {
        assert!(ensure_editable(&document(DocumentKind::Order, DocumentStatus::Finalized)).is_ok());
        for status in [DocumentStatus::Canceled, DocumentStatus::Rejected, DocumentStatus::Converted] {
            let err = ensure_editable(&document(DocumentKind::Order, status)).unwrap_err();
            assert!(matches!(err, CoreError::DocumentLocked { .. }));
        }
    }

    #[test]
    fn test_ensure_convertible() {
        let quote = document(DocumentKind::Quote, DocumentStatus::Approved);
        assert!(ensure_convertible(&quote, date(2026, 1, 31)).is_ok());

        assert!(matches!(
            ensure_convertible(&quote, date(2026, 2, 1)),
            Err(CoreError::Validation(ValidationError::QuoteExpired { .. }))
        ));

        let order = document(DocumentKind::Order, DocumentStatus::Draft);
        assert!(matches!(
            ensure_convertible(&order, date(2026, 1, 1)),
            Err(CoreError::NotAQuote { .. })
        ));

        let converted = document(DocumentKind::Quote, DocumentStatus::Converted);
        assert!(matches!(
            ensure_convertible(&converted, date(2026, 1, 1)),
            Err(CoreError::AlreadyConverted(_))
        ));
    }

    #[test]
    fn test_stock_effect() {
        use DocumentStatus::*;

        assert_eq!(stock_effect(false, Finalized), StockEffect::Propagate);
        assert_eq!(stock_effect(true, Finalized), StockEffect::None);
        assert_eq!(stock_effect(true, Delivered), StockEffect::None);
        assert_eq!(stock_effect(true, Canceled), StockEffect::Reverse);
        assert_eq!(stock_effect(true, Pending), StockEffect::Reverse);
        assert_eq!(stock_effect(false, Canceled), StockEffect::None);
        assert_eq!(stock_effect(false, Delivered), StockEffect::None);
    }
}
