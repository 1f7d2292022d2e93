//! # Metrics Repository
//!
//! Aggregate figures for dashboards: sales over stock-committed orders and
//! the value of the stock on hand. Read-only.

use sqlx::SqlitePool;

use crate::error::DbResult;
use stockflow_core::{InventoryValuation, Money, SalesSummary};

/// Repository for aggregate read queries.
#[derive(Debug, Clone)]
pub struct MetricsRepository {
    pool: SqlitePool,
}

impl MetricsRepository {
    /// Creates a new MetricsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MetricsRepository { pool }
    }

    /// Sales value, cost and profit of the tenant's stock-committed orders.
    ///
    /// Cost uses each item's purchase price snapshot, so later product cost
    /// changes never rewrite past profit.
    pub async fn sales_summary(&self, tenant_id: &str) -> DbResult<SalesSummary> {
        let (committed_documents, sales_value): (i64, Option<i64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), SUM(total_cents)
            FROM documents
            WHERE tenant_id = ?1 AND kind = 'order' AND stock_committed = 1
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        let (sales_cost, units_sold): (Option<i64>, Option<i64>) = sqlx::query_as(
            r#"
            SELECT SUM(li.quantity * li.purchase_price_cents), SUM(li.quantity)
            FROM line_items li
            INNER JOIN documents d ON d.id = li.document_id
            WHERE d.tenant_id = ?1 AND d.kind = 'order' AND d.stock_committed = 1
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        let sales_value = Money::from_cents(sales_value.unwrap_or(0));
        let sales_cost = Money::from_cents(sales_cost.unwrap_or(0));

        Ok(SalesSummary {
            committed_documents,
            sales_value,
            sales_cost,
            profit: sales_value - sales_cost,
            units_sold: units_sold.unwrap_or(0),
        })
    }

    /// Quantity on hand valued at cost and at selling price.
    pub async fn inventory_valuation(&self, tenant_id: &str) -> DbResult<InventoryValuation> {
        let (product_count, total_quantity, cost_value, selling_value): (
            i64,
            Option<i64>,
            Option<i64>,
            Option<i64>,
        ) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                SUM(quantity),
                SUM(quantity * cost_price_cents),
                SUM(quantity * selling_price_cents)
            FROM products
            WHERE tenant_id = ?1
            "#,
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(InventoryValuation {
            product_count,
            total_quantity: total_quantity.unwrap_or(0),
            cost_value: Money::from_cents(cost_value.unwrap_or(0)),
            selling_value: Money::from_cents(selling_value.unwrap_or(0)),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{new_product, test_db};
    use stockflow_core::{LineItemInput, Money, NewDocument};

    #[tokio::test]
    async fn test_sales_summary_counts_committed_orders_only() {
        let db = test_db().await;
        let service = db.lifecycle();
        let product = db.products().create("t1", &new_product("Pen", 20, 400)).await.unwrap();

        let sold = service
            .create_document(
                "t1",
                &NewDocument::order(vec![LineItemInput::new(&product.id, 3, 1000)]).with_discount(1000),
            )
            .await
            .unwrap()
            .document;
        service.finalize("t1", &sold.id).await.unwrap();

        // Draft order and quote do not count
        service
            .create_document("t1", &NewDocument::order(vec![LineItemInput::new(&product.id, 5, 1000)]))
            .await
            .unwrap();
        service
            .create_document("t1", &NewDocument::quote(vec![LineItemInput::new(&product.id, 5, 1000)]))
            .await
            .unwrap();

        // Raising the cost afterwards leaves past profit alone
        db.products()
            .update_details("t1", &product.id, "Pen", 900, 1000, None)
            .await
            .unwrap();

        let summary = db.metrics().sales_summary("t1").await.unwrap();
        assert_eq!(summary.committed_documents, 1);
        assert_eq!(summary.sales_value, Money::from_cents(2700));
        assert_eq!(summary.sales_cost, Money::from_cents(1200));
        assert_eq!(summary.profit, Money::from_cents(1500));
        assert_eq!(summary.units_sold, 3);

        let other = db.metrics().sales_summary("t2").await.unwrap();
        assert_eq!(other.committed_documents, 0);
        assert_eq!(other.sales_value, Money::zero());
    }

    #[tokio::test]
    async fn test_inventory_valuation() {
        let db = test_db().await;
        db.products().create("t1", &new_product("Pen", 10, 100)).await.unwrap();
        db.products().create("t1", &new_product("Ink", 2, 250)).await.unwrap();

        let valuation = db.metrics().inventory_valuation("t1").await.unwrap();
        assert_eq!(valuation.product_count, 2);
        assert_eq!(valuation.total_quantity, 12);
        assert_eq!(valuation.cost_value, Money::from_cents(1500));
        assert_eq!(valuation.selling_value, Money::from_cents(3000));

        let empty = db.metrics().inventory_valuation("t2").await.unwrap();
        assert_eq!(empty.product_count, 0);
        assert_eq!(empty.cost_value, Money::zero());
    }
}
