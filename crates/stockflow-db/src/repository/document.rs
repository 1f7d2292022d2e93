//! # Document Repository
//!
//! Storage of commercial documents (orders and quotes) and their line items.
//!
//! The public methods are read-only. Every write goes through
//! [`crate::lifecycle::DocumentService`], which calls the crate-private
//! transaction helpers below so that item edits, totals and stock effects
//! commit together.
//!
//! ## Tenant Scoping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  documents.tenant_id = ?          (direct)                             │
//! │  line_items ──► documents.tenant_id = ?   (through the parent)         │
//! │  products used by items: tenant_id = ? (a foreign tenant's product     │
//! │  is reported as not found)                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use stockflow_core::lifecycle::{totals_for_items, DocumentTotals};
use stockflow_core::{
    CommercialDocument, DocumentKind, DocumentReport, DocumentStatus, LineItem, PaymentMethod,
    ReportLine,
};

/// Read access to documents and line items.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    /// Creates a new DocumentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DocumentRepository { pool }
    }

    /// Gets a document by ID.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<CommercialDocument>> {
        fetch_document(&self.pool, tenant_id, id).await
    }

    /// Line items of a document, in line order.
    pub async fn items(&self, tenant_id: &str, document_id: &str) -> DbResult<Vec<LineItem>> {
        fetch_items(&self.pool, tenant_id, document_id).await
    }

    /// Lists the tenant's documents, newest first, optionally of one kind.
    pub async fn list(
        &self,
        tenant_id: &str,
        kind: Option<DocumentKind>,
    ) -> DbResult<Vec<CommercialDocument>> {
        let documents = sqlx::query_as::<_, CommercialDocument>(
            r#"
            SELECT
                id, tenant_id, kind, status, discount_bps, total_cents,
                client_id, seller_id, cashier_id, expiration_date, payment_method,
                stock_committed, converted_to, created_at, updated_at
            FROM documents
            WHERE tenant_id = ?1 AND (?2 IS NULL OR kind = ?2)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(tenant_id)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(documents)
    }

    /// Document, printable lines and totals for the report collaborator.
    pub async fn report(&self, tenant_id: &str, id: &str) -> DbResult<DocumentReport> {
        let document = self
            .get_by_id(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Document", id))?;

        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT li.id, p.title
            FROM line_items li
            INNER JOIN documents d ON d.id = li.document_id
            LEFT JOIN products p ON p.id = li.product_id AND p.tenant_id = d.tenant_id
            WHERE li.document_id = ?1 AND d.tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let items = self.items(tenant_id, id).await?;
        let discount = document.discount();
        let lines = items
            .iter()
            .map(|item| {
                let title = rows
                    .iter()
                    .find(|(item_id, _)| *item_id == item.id)
                    .and_then(|(_, title)| title.clone());
                ReportLine::from_item(item, title, discount)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DocumentReport {
            totals: totals_for_items(&items, discount)?,
            document,
            lines,
        })
    }
}

// =============================================================================
// Shared reads
// =============================================================================

pub(crate) async fn fetch_document<'e, E>(
    executor: E,
    tenant_id: &str,
    id: &str,
) -> DbResult<Option<CommercialDocument>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let document = sqlx::query_as::<_, CommercialDocument>(
        r#"
        SELECT
            id, tenant_id, kind, status, discount_bps, total_cents,
            client_id, seller_id, cashier_id, expiration_date, payment_method,
            stock_committed, converted_to, created_at, updated_at
        FROM documents
        WHERE id = ?1 AND tenant_id = ?2
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(executor)
    .await?;

    Ok(document)
}

pub(crate) async fn fetch_items<'e, E>(
    executor: E,
    tenant_id: &str,
    document_id: &str,
) -> DbResult<Vec<LineItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let items = sqlx::query_as::<_, LineItem>(
        r#"
        SELECT
            li.id, li.document_id, li.line_no, li.product_id, li.quantity,
            li.unit_price_cents, li.purchase_price_cents, li.created_at
        FROM line_items li
        INNER JOIN documents d ON d.id = li.document_id
        WHERE li.document_id = ?1 AND d.tenant_id = ?2
        ORDER BY li.line_no
        "#,
    )
    .bind(document_id)
    .bind(tenant_id)
    .fetch_all(executor)
    .await?;

    Ok(items)
}

// =============================================================================
// Transaction-level writes
// =============================================================================

/// Header fields written when a document is created.
pub(crate) struct DocumentHeader<'a> {
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub discount_bps: u32,
    pub client_id: Option<&'a str>,
    pub seller_id: Option<&'a str>,
    pub cashier_id: Option<&'a str>,
    pub expiration_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
}

pub(crate) async fn insert_document(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    header: &DocumentHeader<'_>,
) -> DbResult<String> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    debug!(tenant_id, id = %id, kind = %header.kind, "Inserting document");

    sqlx::query(
        r#"
        INSERT INTO documents (
            id, tenant_id, kind, status, discount_bps, total_cents,
            client_id, seller_id, cashier_id, expiration_date, payment_method,
            stock_committed, converted_to, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?9, ?10, 0, NULL, ?11, ?11)
        "#,
    )
    .bind(&id)
    .bind(tenant_id)
    .bind(header.kind)
    .bind(header.status)
    .bind(header.discount_bps)
    .bind(header.client_id)
    .bind(header.seller_id)
    .bind(header.cashier_id)
    .bind(header.expiration_date)
    .bind(header.payment_method)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

/// Bumps `updated_at`. Run first in a mutation: it takes the write lock and
/// proves the document exists for the tenant.
pub(crate) async fn touch_document(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    id: &str,
) -> DbResult<bool> {
    let result = sqlx::query("UPDATE documents SET updated_at = ?3 WHERE id = ?1 AND tenant_id = ?2")
        .bind(id)
        .bind(tenant_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Rewrites the editable header fields from `document`.
pub(crate) async fn update_header(
    conn: &mut SqliteConnection,
    document: &CommercialDocument,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE documents SET
            discount_bps = ?3,
            client_id = ?4,
            seller_id = ?5,
            cashier_id = ?6,
            expiration_date = ?7,
            payment_method = ?8
        WHERE id = ?1 AND tenant_id = ?2
        "#,
    )
    .bind(&document.id)
    .bind(&document.tenant_id)
    .bind(document.discount_bps)
    .bind(&document.client_id)
    .bind(&document.seller_id)
    .bind(&document.cashier_id)
    .bind(document.expiration_date)
    .bind(document.payment_method)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn set_status(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    id: &str,
    status: DocumentStatus,
) -> DbResult<()> {
    sqlx::query("UPDATE documents SET status = ?3 WHERE id = ?1 AND tenant_id = ?2")
        .bind(id)
        .bind(tenant_id)
        .bind(status)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn set_stock_committed(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    id: &str,
    committed: bool,
) -> DbResult<()> {
    sqlx::query("UPDATE documents SET stock_committed = ?3 WHERE id = ?1 AND tenant_id = ?2")
        .bind(id)
        .bind(tenant_id)
        .bind(committed)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn mark_converted(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    quote_id: &str,
    order_id: &str,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE documents SET status = ?3, converted_to = ?4
        WHERE id = ?1 AND tenant_id = ?2
        "#,
    )
    .bind(quote_id)
    .bind(tenant_id)
    .bind(DocumentStatus::Converted)
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Line item fields written on insert.
pub(crate) struct NewItemRow<'a> {
    pub line_no: i64,
    pub product_id: Option<&'a str>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub purchase_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

pub(crate) async fn insert_item(
    conn: &mut SqliteConnection,
    document_id: &str,
    row: &NewItemRow<'_>,
) -> DbResult<String> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        r#"
        INSERT INTO line_items (
            id, document_id, line_no, product_id, quantity,
            unit_price_cents, purchase_price_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&id)
    .bind(document_id)
    .bind(row.line_no)
    .bind(row.product_id)
    .bind(row.quantity)
    .bind(row.unit_price_cents)
    .bind(row.purchase_price_cents)
    .bind(row.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

/// Updates an existing item. The purchase price snapshot is never touched.
pub(crate) async fn update_item(
    conn: &mut SqliteConnection,
    document_id: &str,
    item_id: &str,
    line_no: i64,
    product_id: &str,
    quantity: i64,
    unit_price_cents: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE line_items SET
            line_no = ?3,
            product_id = ?4,
            quantity = ?5,
            unit_price_cents = ?6
        WHERE id = ?1 AND document_id = ?2
        "#,
    )
    .bind(item_id)
    .bind(document_id)
    .bind(line_no)
    .bind(product_id)
    .bind(quantity)
    .bind(unit_price_cents)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn delete_item(
    conn: &mut SqliteConnection,
    document_id: &str,
    item_id: &str,
) -> DbResult<()> {
    sqlx::query("DELETE FROM line_items WHERE id = ?1 AND document_id = ?2")
        .bind(item_id)
        .bind(document_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn delete_document(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    id: &str,
) -> DbResult<()> {
    sqlx::query("DELETE FROM documents WHERE id = ?1 AND tenant_id = ?2")
        .bind(id)
        .bind(tenant_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Recomputes the document total from its stored items and writes it.
///
/// The only writer of `total_cents`.
pub(crate) async fn store_total(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    document_id: &str,
    discount_bps: u32,
) -> DbResult<DocumentTotals> {
    let items = fetch_items(&mut *conn, tenant_id, document_id).await?;
    let totals = totals_for_items(&items, stockflow_core::DiscountRate::from_bps(discount_bps))?;

    sqlx::query("UPDATE documents SET total_cents = ?3 WHERE id = ?1 AND tenant_id = ?2")
        .bind(document_id)
        .bind(tenant_id)
        .bind(totals.total.cents())
        .execute(&mut *conn)
        .await?;

    debug!(document_id, total = %totals.total, "Document total recomputed");
    Ok(totals)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::testing::{new_product, test_db};
    use stockflow_core::{DocumentKind, LineItemInput, NewDocument};

    #[tokio::test]
    async fn test_list_filters_by_kind_and_tenant() {
        let db = test_db().await;
        let product = db.products().create("t1", &new_product("Pen", 5, 100)).await.unwrap();
        let service = db.lifecycle();

        service
            .create_document("t1", &NewDocument::order(vec![LineItemInput::new(&product.id, 1, 200)]))
            .await
            .unwrap();
        service
            .create_document("t1", &NewDocument::quote(vec![LineItemInput::new(&product.id, 1, 200)]))
            .await
            .unwrap();

        let repo = db.documents();
        assert_eq!(repo.list("t1", None).await.unwrap().len(), 2);
        assert_eq!(repo.list("t1", Some(DocumentKind::Quote)).await.unwrap().len(), 1);
        assert!(repo.list("t2", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_lines_and_totals() {
        let db = test_db().await;
        let pen = db.products().create("t1", &new_product("Pen", 5, 100)).await.unwrap();
        let ink = db.products().create("t1", &new_product("Ink", 5, 300)).await.unwrap();

        let order = db
            .lifecycle()
            .create_document(
                "t1",
                &NewDocument::order(vec![
                    LineItemInput::new(&pen.id, 3, 2000),
                    LineItemInput::new(&ink.id, 1, 550),
                ])
                .with_discount(1000),
            )
            .await
            .unwrap()
            .document;

        let report = db.documents().report("t1", &order.id).await.unwrap();
        assert_eq!(report.lines.len(), 2);
        assert_eq!(report.lines[0].product_title.as_deref(), Some("Pen"));
        assert_eq!(report.lines[0].line_total.cents(), 6000);
        assert_eq!(report.lines[1].discounted_unit_price.cents(), 495);
        assert_eq!(report.totals.subtotal.cents(), 6550);
        assert_eq!(report.totals.total.cents(), 5895);
        assert_eq!(report.document.total_cents, 5895);

        assert!(db.documents().report("t2", &order.id).await.is_err());
    }
}
