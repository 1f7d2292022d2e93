//! # Document Lifecycle Engine
//!
//! Creates, edits and transitions commercial documents, and propagates
//! their effect into the stock ledger.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Document Lifecycle                                │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── create_document() → items snapshot purchase price              │
//! │                           → total recomputed                           │
//! │                                                                         │
//! │  2. EDIT                                                               │
//! │     └── update_document() → items matched by id, total recomputed      │
//! │         (stock-committed? reverse own outflows, re-emit)               │
//! │                                                                         │
//! │  3. FINALIZE (orders)                                                  │
//! │     └── set_status(finalized) → one outflow per item                   │
//! │                               → stock_committed = true                 │
//! │                                                                         │
//! │  4. CANCEL                                                             │
//! │     └── set_status(canceled) → outflows reversed, flag cleared         │
//! │                                                                         │
//! │  Quotes: create → approve → convert_to_order() → new draft order       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation runs in one transaction, retried as a whole on SQLite
//! lock conflicts. A failed operation leaves nothing behind.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::document::{self as docs, DocumentHeader, NewItemRow};
use crate::repository::product::fetch_product;
use crate::repository::stock;
use crate::retry::{with_conflict_retry, RetryPolicy};
use stockflow_core::lifecycle::{
    default_expiration, ensure_convertible, ensure_editable, ensure_not_expired,
    outflow_description, stock_effect, validate_line_item, validate_new_document,
    validate_transition, validate_update,
};
use stockflow_core::validation::validate_tenant_id;
use stockflow_core::{
    CommercialDocument, CoreError, DocumentKind, DocumentReport, DocumentStatus, DocumentUpdate,
    LineItemInput, MissingReference, NewDocument, NewOutflow, Outflow, StockEffect, ValidationError,
};

// =============================================================================
// Outcome
// =============================================================================

/// Result of a document mutation, with what it did to stock.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    /// The document as committed.
    pub document: CommercialDocument,
    /// Ledger decision taken for the status change.
    pub effect: StockEffect,
    /// Outflows emitted by this call.
    pub outflows: Vec<Outflow>,
    /// Outflows of this document reversed by this call.
    pub reversed: usize,
    /// Items whose product was deleted: skipped by finalize, carried over
    /// without stock effect by conversion.
    pub skipped: Vec<MissingReference>,
}

#[derive(Debug, Default)]
struct Propagation {
    outflows: Vec<Outflow>,
    skipped: Vec<MissingReference>,
}

// =============================================================================
// Service
// =============================================================================

/// The document lifecycle engine.
///
/// ## Usage
/// ```rust,ignore
/// let service = db.lifecycle();
/// let quote = service.create_document("tenant-a", &NewDocument::quote(items)).await?.document;
/// let order = service.convert_to_order("tenant-a", &quote.id).await?.document;
/// let outcome = service.finalize("tenant-a", &order.id).await?;
/// for warning in &outcome.skipped {
///     eprintln!("{warning}");
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DocumentService {
    pool: SqlitePool,
    retry: RetryPolicy,
    quote_validity_days: u32,
    /// Pinned business date; `None` means today (UTC).
    as_of: Option<NaiveDate>,
}

impl DocumentService {
    /// Creates a new DocumentService.
    pub fn new(pool: SqlitePool, retry: RetryPolicy, quote_validity_days: u32) -> Self {
        DocumentService {
            pool,
            retry,
            quote_validity_days,
            as_of: None,
        }
    }

    /// Evaluates quote expiration against `date` instead of today.
    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates an order or a quote with its items.
    ///
    /// Quotes without an expiration date get today + the configured validity.
    /// A document created directly as `finalized` propagates its outflows in
    /// the same transaction.
    pub async fn create_document(&self, tenant_id: &str, input: &NewDocument) -> DbResult<FinalizeOutcome> {
        validate_tenant_id(tenant_id)?;

        let mut input = input.clone();
        if input.kind == DocumentKind::Quote && input.expiration_date.is_none() {
            input.expiration_date = Some(default_expiration(self.today(), self.quote_validity_days));
        }
        validate_new_document(&input)?;
        if input.kind == DocumentKind::Quote {
            if let Some(expired_on) = input.expiration_date.filter(|date| *date < self.today()) {
                return Err(ValidationError::QuoteExpired { expired_on }.into());
            }
        }

        with_conflict_retry(&self.retry, "create_document", || {
            self.try_create(tenant_id, &input)
        })
        .await
    }

    async fn try_create(&self, tenant_id: &str, input: &NewDocument) -> DbResult<FinalizeOutcome> {
        let mut tx = self.pool.begin().await?;

        let status = input.status.unwrap_or_default();
        let header = DocumentHeader {
            kind: input.kind,
            status,
            discount_bps: input.discount_bps,
            client_id: input.client_id.as_deref(),
            seller_id: input.seller_id.as_deref(),
            cashier_id: input.cashier_id.as_deref(),
            expiration_date: input.expiration_date,
            payment_method: input.payment_method,
        };
        let id = docs::insert_document(&mut tx, tenant_id, &header).await?;

        for (index, item) in input.items.iter().enumerate() {
            insert_new_item(&mut tx, tenant_id, &id, index as i64 + 1, item).await?;
        }
        docs::store_total(&mut tx, tenant_id, &id, input.discount_bps).await?;

        let effect = stock_effect(false, status);
        let propagation = match effect {
            StockEffect::Propagate => {
                let document = load(&mut tx, tenant_id, &id).await?;
                propagate(&mut tx, &document).await?
            }
            _ => Propagation::default(),
        };

        let document = load(&mut tx, tenant_id, &id).await?;
        tx.commit().await?;

        info!(
            tenant_id,
            id = %document.id,
            kind = %document.kind,
            status = %document.status,
            total = %document.total(),
            "Document created"
        );

        Ok(FinalizeOutcome {
            document,
            effect,
            outflows: propagation.outflows,
            reversed: 0,
            skipped: propagation.skipped,
        })
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Edits the header and, optionally, replaces the item set.
    ///
    /// ## Item matching
    /// - input item with an `id`: updates that stored item, keeping its
    ///   purchase price snapshot
    /// - input item without `id`: new item, snapshots the product's cost
    /// - stored item not in the input: deleted
    ///
    /// On a stock-committed document the old outflows are reversed and new
    /// ones emitted for the resulting items.
    pub async fn update_document(
        &self,
        tenant_id: &str,
        id: &str,
        update: &DocumentUpdate,
    ) -> DbResult<FinalizeOutcome> {
        with_conflict_retry(&self.retry, "update_document", || {
            self.try_update(tenant_id, id, update)
        })
        .await
    }

    async fn try_update(&self, tenant_id: &str, id: &str, update: &DocumentUpdate) -> DbResult<FinalizeOutcome> {
        let mut tx = self.pool.begin().await?;

        let mut document = lock_document(&mut tx, tenant_id, id).await?;
        ensure_editable(&document)?;
        ensure_not_expired(&document, self.today())?;
        validate_update(&document, update)?;

        let discount_changed = update
            .discount_bps
            .map(|bps| bps != document.discount_bps)
            .unwrap_or(false);

        if let Some(bps) = update.discount_bps {
            document.discount_bps = bps;
        }
        if let Some(client_id) = &update.client_id {
            document.client_id = Some(client_id.clone());
        }
        if let Some(seller_id) = &update.seller_id {
            document.seller_id = Some(seller_id.clone());
        }
        if let Some(cashier_id) = &update.cashier_id {
            document.cashier_id = Some(cashier_id.clone());
        }
        if let Some(method) = update.payment_method {
            document.payment_method = Some(method);
        }
        // Quotes only; validate_update rejects it on orders
        if let Some(date) = update.expiration_date {
            if date < self.today() {
                return Err(ValidationError::QuoteExpired { expired_on: date }.into());
            }
            document.expiration_date = Some(date);
        }
        docs::update_header(&mut tx, &document).await?;

        if let Some(items) = &update.items {
            replace_items(&mut tx, tenant_id, id, items).await?;
        }
        docs::store_total(&mut tx, tenant_id, id, document.discount_bps).await?;

        let mut outcome = FinalizeOutcome {
            document: document.clone(),
            effect: StockEffect::None,
            outflows: Vec::new(),
            reversed: 0,
            skipped: Vec::new(),
        };

        if document.stock_committed && (update.items.is_some() || discount_changed) {
            outcome.reversed = stock::reverse_document_outflows(&mut tx, tenant_id, id).await?;
            let propagation = propagate(&mut tx, &document).await?;
            outcome.outflows = propagation.outflows;
            outcome.skipped = propagation.skipped;
            info!(
                tenant_id,
                id,
                reversed = outcome.reversed,
                emitted = outcome.outflows.len(),
                "Stock reconciled after edit"
            );
        }

        outcome.document = load(&mut tx, tenant_id, id).await?;
        tx.commit().await?;

        debug!(tenant_id, id, total = %outcome.document.total(), "Document updated");
        Ok(outcome)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Moves a document to `status`, applying the stock effect.
    ///
    /// ## Stock effect
    /// - first entry into `finalized`: one outflow per item, flag set
    /// - committed document leaving finalized/delivered/sent: outflows
    ///   reversed, flag cleared
    /// - anything else: no ledger change (a second finalize is a no-op)
    pub async fn set_status(
        &self,
        tenant_id: &str,
        id: &str,
        status: DocumentStatus,
    ) -> DbResult<FinalizeOutcome> {
        with_conflict_retry(&self.retry, "set_status", || {
            self.try_set_status(tenant_id, id, status)
        })
        .await
    }

    /// Finalizes a document: `set_status(.., finalized)`.
    pub async fn finalize(&self, tenant_id: &str, id: &str) -> DbResult<FinalizeOutcome> {
        self.set_status(tenant_id, id, DocumentStatus::Finalized).await
    }

    async fn try_set_status(
        &self,
        tenant_id: &str,
        id: &str,
        to: DocumentStatus,
    ) -> DbResult<FinalizeOutcome> {
        let mut tx = self.pool.begin().await?;

        let document = lock_document(&mut tx, tenant_id, id).await?;
        let from = document.status;
        validate_transition(document.kind, from, to)?;

        // An expired quote may still be closed, nothing else
        if !matches!(to, DocumentStatus::Rejected | DocumentStatus::Canceled) {
            ensure_not_expired(&document, self.today())?;
        }

        docs::set_status(&mut tx, tenant_id, id, to).await?;

        let effect = stock_effect(document.stock_committed, to);
        let mut outcome = FinalizeOutcome {
            document: document.clone(),
            effect,
            outflows: Vec::new(),
            reversed: 0,
            skipped: Vec::new(),
        };

        match effect {
            StockEffect::Propagate => {
                let propagation = propagate(&mut tx, &document).await?;
                outcome.outflows = propagation.outflows;
                outcome.skipped = propagation.skipped;
            }
            StockEffect::Reverse => {
                outcome.reversed = stock::reverse_document_outflows(&mut tx, tenant_id, id).await?;
                docs::set_stock_committed(&mut tx, tenant_id, id, false).await?;
            }
            StockEffect::None => {
                if to == DocumentStatus::Finalized {
                    debug!(tenant_id, id, "Document already committed to stock, nothing to emit");
                }
            }
        }

        outcome.document = load(&mut tx, tenant_id, id).await?;
        tx.commit().await?;

        info!(
            tenant_id,
            id,
            from = %from,
            to = %to,
            emitted = outcome.outflows.len(),
            reversed = outcome.reversed,
            "Document status changed"
        );
        Ok(outcome)
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Turns a quote into a new draft order.
    ///
    /// The order copies the quote's client, seller, cashier, payment method,
    /// discount and items (purchase price snapshots included). The quote is
    /// marked `converted`. No stock effect.
    ///
    /// Items whose product was deleted are still copied, and reported in
    /// `skipped` since finalizing the order will not move stock for them.
    pub async fn convert_to_order(&self, tenant_id: &str, quote_id: &str) -> DbResult<FinalizeOutcome> {
        with_conflict_retry(&self.retry, "convert_to_order", || {
            self.try_convert(tenant_id, quote_id)
        })
        .await
    }

    async fn try_convert(&self, tenant_id: &str, quote_id: &str) -> DbResult<FinalizeOutcome> {
        let mut tx = self.pool.begin().await?;

        let quote = lock_document(&mut tx, tenant_id, quote_id).await?;
        ensure_convertible(&quote, self.today())?;

        let header = DocumentHeader {
            kind: DocumentKind::Order,
            status: DocumentStatus::Draft,
            discount_bps: quote.discount_bps,
            client_id: quote.client_id.as_deref(),
            seller_id: quote.seller_id.as_deref(),
            cashier_id: quote.cashier_id.as_deref(),
            expiration_date: None,
            payment_method: quote.payment_method,
        };
        let order_id = docs::insert_document(&mut tx, tenant_id, &header).await?;

        let items = docs::fetch_items(&mut *tx, tenant_id, quote_id).await?;
        let mut skipped = Vec::new();
        for item in &items {
            if item.product_id.is_none() {
                let warning = MissingReference {
                    item_id: item.id.clone(),
                    line_no: item.line_no,
                };
                warn!(tenant_id, quote_id, %warning, "Converting item without product");
                skipped.push(warning);
            }
            let row = NewItemRow {
                line_no: item.line_no,
                product_id: item.product_id.as_deref(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                purchase_price_cents: item.purchase_price_cents,
                created_at: Utc::now(),
            };
            docs::insert_item(&mut tx, &order_id, &row).await?;
        }
        docs::store_total(&mut tx, tenant_id, &order_id, quote.discount_bps).await?;
        docs::mark_converted(&mut tx, tenant_id, quote_id, &order_id).await?;

        let order = load(&mut tx, tenant_id, &order_id).await?;
        tx.commit().await?;

        info!(
            tenant_id,
            quote_id,
            order_id = %order.id,
            total = %order.total(),
            skipped = skipped.len(),
            "Quote converted to order"
        );
        Ok(FinalizeOutcome {
            document: order,
            effect: StockEffect::None,
            outflows: Vec::new(),
            reversed: 0,
            skipped,
        })
    }

    // =========================================================================
    // Delete & Read
    // =========================================================================

    /// Deletes a document and its items, reversing its outflows first if it
    /// is stock-committed.
    pub async fn delete_document(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        with_conflict_retry(&self.retry, "delete_document", || async move {
            let mut tx = self.pool.begin().await?;

            let document = lock_document(&mut tx, tenant_id, id).await?;
            let reversed = if document.stock_committed {
                stock::reverse_document_outflows(&mut tx, tenant_id, id).await?
            } else {
                0
            };
            docs::delete_document(&mut tx, tenant_id, id).await?;

            tx.commit().await?;
            info!(tenant_id, id, reversed, "Document deleted");
            Ok(())
        })
        .await
    }

    /// Gets a document by ID.
    pub async fn get_document(&self, tenant_id: &str, id: &str) -> DbResult<Option<CommercialDocument>> {
        docs::fetch_document(&self.pool, tenant_id, id).await
    }

    /// Document, lines and totals for the report collaborator.
    pub async fn document_report(&self, tenant_id: &str, id: &str) -> DbResult<DocumentReport> {
        docs::DocumentRepository::new(self.pool.clone())
            .report(tenant_id, id)
            .await
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

/// Takes the write lock on a document and loads it.
async fn lock_document(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    id: &str,
) -> DbResult<CommercialDocument> {
    if !docs::touch_document(conn, tenant_id, id).await? {
        return Err(CoreError::DocumentNotFound(id.to_string()).into());
    }
    load(conn, tenant_id, id).await
}

async fn load(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<CommercialDocument> {
    docs::fetch_document(&mut *conn, tenant_id, id)
        .await?
        .ok_or_else(|| CoreError::DocumentNotFound(id.to_string()).into())
}

/// Inserts a new item, snapshotting the product's current cost price.
async fn insert_new_item(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    document_id: &str,
    line_no: i64,
    item: &LineItemInput,
) -> DbResult<String> {
    let product = fetch_product(&mut *conn, tenant_id, &item.product_id)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;

    let row = NewItemRow {
        line_no,
        product_id: Some(&product.id),
        quantity: item.quantity,
        unit_price_cents: item.unit_price_cents,
        purchase_price_cents: product.cost_price_cents,
        created_at: Utc::now(),
    };
    docs::insert_item(conn, document_id, &row).await
}

/// Applies a full replacement item set to a stored document.
async fn replace_items(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    document_id: &str,
    items: &[LineItemInput],
) -> DbResult<()> {
    let existing = docs::fetch_items(&mut *conn, tenant_id, document_id).await?;
    let mut kept: HashSet<&str> = HashSet::new();

    for (index, item) in items.iter().enumerate() {
        validate_line_item(item)?;
        let line_no = index as i64 + 1;

        match item.id.as_deref() {
            Some(item_id) => {
                if !existing.iter().any(|stored| stored.id == item_id) {
                    return Err(DbError::not_found("LineItem", item_id));
                }
                if fetch_product(&mut *conn, tenant_id, &item.product_id).await?.is_none() {
                    return Err(CoreError::ProductNotFound(item.product_id.clone()).into());
                }
                docs::update_item(
                    conn,
                    document_id,
                    item_id,
                    line_no,
                    &item.product_id,
                    item.quantity,
                    item.unit_price_cents,
                )
                .await?;
                kept.insert(item_id);
            }
            None => {
                insert_new_item(conn, tenant_id, document_id, line_no, item).await?;
            }
        }
    }

    for stored in existing.iter().filter(|stored| !kept.contains(stored.id.as_str())) {
        debug!(document_id, item_id = %stored.id, "Removing line item");
        docs::delete_item(conn, document_id, &stored.id).await?;
    }
    Ok(())
}

/// Emits one outflow per item and marks the document committed.
///
/// Items whose product was deleted are skipped and reported.
async fn propagate(conn: &mut SqliteConnection, document: &CommercialDocument) -> DbResult<Propagation> {
    let items = docs::fetch_items(&mut *conn, &document.tenant_id, &document.id).await?;
    let discount = document.discount();
    let mut propagation = Propagation::default();

    for item in &items {
        let Some(product_id) = item.product_id.as_deref() else {
            let warning = MissingReference {
                item_id: item.id.clone(),
                line_no: item.line_no,
            };
            warn!(
                tenant_id = %document.tenant_id,
                document_id = %document.id,
                %warning,
                "Skipping item without product during finalize"
            );
            propagation.skipped.push(warning);
            continue;
        };

        let outflow = NewOutflow {
            product_id: product_id.to_string(),
            quantity: item.quantity,
            sale_reference: Some(document.sale_reference()),
            description: Some(outflow_description(&document.id, item.unit_price(), discount)),
            document_id: Some(document.id.clone()),
        };
        propagation
            .outflows
            .push(stock::insert_outflow(conn, &document.tenant_id, &outflow).await?);
    }

    docs::set_stock_committed(conn, &document.tenant_id, &document.id, true).await?;
    info!(
        tenant_id = %document.tenant_id,
        document_id = %document.id,
        emitted = propagation.outflows.len(),
        skipped = propagation.skipped.len(),
        "Document committed to stock"
    );
    Ok(propagation)
}

// =============================================================================
// Unit Tests
// =============================================================================
