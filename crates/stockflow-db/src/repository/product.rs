//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - CRUD scoped by tenant
//! - Guarded deletion (ledger history blocks it)
//!
//! `quantity` is never written here after creation: the stock ledger owns
//! it (see [`crate::repository::stock`]).
//!
//! ## Deletion Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  delete(product)                                                        │
//! │       │                                                                 │
//! │       ├── touch the row (write lock, NotFound)                        │
//! │       ├── inflows, outflows or movements? → ReferentialIntegrity       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DELETE FROM products                                                  │
//! │       └── line_items.product_id      → NULL (weak reference)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::retry::{with_conflict_retry, RetryPolicy};
use stockflow_core::validation::{validate_price_cents, validate_tenant_id, validate_title};
use stockflow_core::{NewProduct, Product};

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        ProductRepository { pool, retry }
    }

    /// Creates a product with its opening quantity.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::Domain)` - Invalid title or prices
    pub async fn create(&self, tenant_id: &str, input: &NewProduct) -> DbResult<Product> {
        validate_tenant_id(tenant_id)?;
        validate_title(&input.title)?;
        validate_price_cents("cost_price", input.cost_price_cents)?;
        validate_price_cents("selling_price", input.selling_price_cents)?;

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            tenant_id: tenant_id.to_string(),
            title: input.title.trim().to_string(),
            quantity: input.quantity,
            cost_price_cents: input.cost_price_cents,
            selling_price_cents: input.selling_price_cents,
            description: input.description.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(tenant_id, title = %product.title, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, title, quantity,
                cost_price_cents, selling_price_cents, description,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.title)
        .bind(product.quantity)
        .bind(product.cost_price_cents)
        .bind(product.selling_price_cents)
        .bind(&product.description)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found for this tenant
    /// * `Ok(None)` - No such product for this tenant
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Product>> {
        fetch_product(&self.pool, tenant_id, id).await
    }

    /// Lists the tenant's products ordered by title.
    pub async fn list(&self, tenant_id: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, tenant_id, title, quantity,
                cost_price_cents, selling_price_cents, description,
                created_at, updated_at
            FROM products
            WHERE tenant_id = ?1
            ORDER BY title
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates the descriptive fields and prices of a product.
    ///
    /// Existing line items keep their purchase price snapshot.
    pub async fn update_details(
        &self,
        tenant_id: &str,
        id: &str,
        title: &str,
        cost_price_cents: i64,
        selling_price_cents: i64,
        description: Option<&str>,
    ) -> DbResult<()> {
        validate_title(title)?;
        validate_price_cents("cost_price", cost_price_cents)?;
        validate_price_cents("selling_price", selling_price_cents)?;

        debug!(tenant_id, id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                title = ?3,
                cost_price_cents = ?4,
                selling_price_cents = ?5,
                description = ?6,
                updated_at = ?7
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(title.trim())
        .bind(cost_price_cents)
        .bind(selling_price_cents)
        .bind(description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Deletes a product without ledger history.
    ///
    /// Any inflow, outflow or stock movement of the product blocks deletion,
    /// so the audit trail is never lost.
    ///
    /// ## Returns
    /// * `Ok(())` - Deleted; line items referencing it now hold NULL
    /// * `Err(DbError::ReferentialIntegrity)` - Ledger records reference it
    /// * `Err(DbError::NotFound)` - No such product for this tenant
    pub async fn delete(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        with_conflict_retry(&self.retry, "delete_product", || self.try_delete(tenant_id, id)).await
    }

    async fn try_delete(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        // Write first: takes the lock before the history is counted
        let touched = sqlx::query("UPDATE products SET updated_at = ?3 WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        if touched.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        let (inflows, outflows, movements): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM inflows WHERE product_id = ?1 AND tenant_id = ?2),
                (SELECT COUNT(*) FROM outflows WHERE product_id = ?1 AND tenant_id = ?2),
                (SELECT COUNT(*) FROM stock_movements WHERE product_id = ?1 AND tenant_id = ?2)
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_one(&mut *tx)
        .await?;

        if inflows > 0 || outflows > 0 || movements > 0 {
            return Err(DbError::referenced(
                "Product",
                id,
                format!(
                    "{} inflow(s), {} outflow(s), {} movement(s)",
                    inflows, outflows, movements
                ),
            ));
        }

        sqlx::query("DELETE FROM products WHERE id = ?1 AND tenant_id = ?2")
            .bind(id)
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(tenant_id, id, "Product deleted");
        Ok(())
    }

    /// Counts the tenant's products.
    pub async fn count(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE tenant_id = ?1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Loads one product of a tenant, on the pool or inside a transaction.
pub(crate) async fn fetch_product<'e, E>(
    executor: E,
    tenant_id: &str,
    id: &str,
) -> DbResult<Option<Product>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT
            id, tenant_id, title, quantity,
            cost_price_cents, selling_price_cents, description,
            created_at, updated_at
        FROM products
        WHERE id = ?1 AND tenant_id = ?2
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .fetch_optional(executor)
    .await?;

    Ok(product)
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_product, test_db, test_file_db};
    use stockflow_core::{LineItemInput, NewDocument, NewInflow};

    #[tokio::test]
    async fn test_create_and_get() {
        let db = test_db().await;
        let repo = db.products();

        let created = repo.create("t1", &new_product("Pen", 10, 150)).await.unwrap();
        assert_eq!(created.quantity, 10);

        let fetched = repo.get_by_id("t1", &created.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Pen");
        assert_eq!(fetched.cost_price_cents, 150);
    }

    #[tokio::test]
    async fn test_products_are_tenant_scoped() {
        let db = test_db().await;
        let repo = db.products();

        let product = repo.create("t1", &new_product("Pen", 1, 100)).await.unwrap();

        assert!(repo.get_by_id("t2", &product.id).await.unwrap().is_none());
        assert!(repo.list("t2").await.unwrap().is_empty());
        assert_eq!(repo.count("t1").await.unwrap(), 1);
        assert!(matches!(
            repo.delete("t2", &product.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let db = test_db().await;
        let repo = db.products();

        assert!(repo.create("t1", &new_product(" ", 1, 100)).await.is_err());
        assert!(repo.create("t1", &new_product("Pen", 1, -1)).await.is_err());
        assert!(repo.create("", &new_product("Pen", 1, 100)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_details_keeps_quantity() {
        let db = test_db().await;
        let repo = db.products();
        let product = repo.create("t1", &new_product("Pen", 7, 100)).await.unwrap();

        repo.update_details("t1", &product.id, "Blue pen", 120, 300, Some("ink"))
            .await
            .unwrap();

        let fetched = repo.get_by_id("t1", &product.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Blue pen");
        assert_eq!(fetched.cost_price_cents, 120);
        assert_eq!(fetched.quantity, 7);
    }

    #[tokio::test]
    async fn test_delete_blocked_by_ledger_history() {
        let db = test_db().await;
        let product = db.products().create("t1", &new_product("Pen", 0, 100)).await.unwrap();

        db.ledger()
            .record_inflow(
                "t1",
                &NewInflow {
                    product_id: product.id.clone(),
                    quantity: 5,
                    supplier_reference: None,
                    description: None,
                },
            )
            .await
            .unwrap();

        let err = db.products().delete("t1", &product.id).await.unwrap_err();
        assert!(matches!(err, DbError::ReferentialIntegrity { .. }));
        assert!(db.products().get_by_id("t1", &product.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_nulls_line_item_references() {
        let db = test_db().await;
        let product = db.products().create("t1", &new_product("Pen", 5, 100)).await.unwrap();

        let order = db
            .lifecycle()
            .create_document("t1", &NewDocument::order(vec![LineItemInput::new(&product.id, 2, 500)]))
            .await
            .unwrap()
            .document;

        db.products().delete("t1", &product.id).await.unwrap();

        let items = db.documents().items("t1", &order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].product_id.is_none());
        assert_eq!(items[0].purchase_price_cents, 100);
    }

    #[tokio::test]
    async fn test_delete_blocked_by_movement_history_alone() {
        let db = test_db().await;
        let product = db.products().create("t1", &new_product("Pen", 0, 100)).await.unwrap();

        let recorded = db
            .ledger()
            .record_inflow(
                "t1",
                &NewInflow {
                    product_id: product.id.clone(),
                    quantity: 5,
                    supplier_reference: None,
                    description: None,
                },
            )
            .await
            .unwrap();
        db.ledger().delete_inflow("t1", &recorded.id).await.unwrap();
        assert!(db.ledger().inflows_for_product("t1", &product.id).await.unwrap().is_empty());

        let err = db.products().delete("t1", &product.id).await.unwrap_err();
        assert!(matches!(err, DbError::ReferentialIntegrity { .. }));
        assert_eq!(
            db.ledger().movements_for_product("t1", &product.id).await.unwrap().len(),
            2
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deletes_resolve_cleanly() {
        let (db, path) = test_file_db().await;
        let product = db.products().create("t1", &new_product("Pen", 1, 100)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let repo = db.products();
            let id = product.id.clone();
            handles.push(tokio::spawn(async move { repo.delete("t1", &id).await }));
        }

        let mut deleted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => deleted += 1,
                Err(err) => assert!(matches!(err, DbError::NotFound { .. }), "{err:?}"),
            }
        }
        assert_eq!(deleted, 1);
        assert!(db.products().get_by_id("t1", &product.id).await.unwrap().is_none());

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
