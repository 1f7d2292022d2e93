//! # Stock Ledger
//!
//! Owns product quantities and the append-only movement history.
//!
//! ## Ledger Application
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  record_outflow(P, 3)                 delete_outflow(O)                 │
//! │  ─────────────────────                ─────────────────                 │
//! │  BEGIN                                BEGIN                             │
//! │  UPDATE products                      DELETE outflow O RETURNING        │
//! │     SET quantity = quantity - 3       UPDATE products                   │
//! │  INSERT movement(out, 3, O)              SET quantity = quantity + 3    │
//! │  INSERT outflow O                     INSERT movement(in, 3, O)         │
//! │  COMMIT                               COMMIT                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Quantities change through delta statements only, so concurrent writers
//! never lose an update. The product UPDATE runs first in each transaction:
//! it checks the product exists for the tenant and takes SQLite's write
//! lock before anything is read.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::retry::{with_conflict_retry, RetryPolicy};
use stockflow_core::validation::validate_quantity;
use stockflow_core::{CoreError, Inflow, MovementType, NewInflow, NewOutflow, Outflow, StockMovement};

/// The stock ledger: inflows, outflows and their movements.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl StockLedger {
    /// Creates a new StockLedger.
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        StockLedger { pool, retry }
    }

    // =========================================================================
    // Inflows
    // =========================================================================

    /// Records stock entering: `quantity += q` plus an `in` movement.
    pub async fn record_inflow(&self, tenant_id: &str, input: &NewInflow) -> DbResult<Inflow> {
        validate_quantity(input.quantity)?;
        with_conflict_retry(&self.retry, "record_inflow", || {
            self.try_record_inflow(tenant_id, input)
        })
        .await
    }

    async fn try_record_inflow(&self, tenant_id: &str, input: &NewInflow) -> DbResult<Inflow> {
        let mut tx = self.pool.begin().await?;

        let inflow = Inflow {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            product_id: input.product_id.clone(),
            quantity: input.quantity,
            supplier_reference: input.supplier_reference.clone(),
            description: input.description.clone(),
            created_at: Utc::now(),
        };

        apply_movement(
            &mut tx,
            tenant_id,
            &inflow.product_id,
            inflow.quantity,
            MovementType::In,
            &inflow.id,
        )
        .await?;

        sqlx::query(
            r#"
            INSERT INTO inflows (
                id, tenant_id, product_id, quantity,
                supplier_reference, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&inflow.id)
        .bind(&inflow.tenant_id)
        .bind(&inflow.product_id)
        .bind(inflow.quantity)
        .bind(&inflow.supplier_reference)
        .bind(&inflow.description)
        .bind(inflow.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(tenant_id, product_id = %inflow.product_id, quantity = inflow.quantity, "Inflow recorded");
        Ok(inflow)
    }

    /// Deletes an inflow, taking its quantity back out of stock.
    ///
    /// The original `in` movement stays; an `out` movement is appended.
    pub async fn delete_inflow(&self, tenant_id: &str, inflow_id: &str) -> DbResult<()> {
        with_conflict_retry(&self.retry, "delete_inflow", || {
            self.try_delete_inflow(tenant_id, inflow_id)
        })
        .await
    }

    async fn try_delete_inflow(&self, tenant_id: &str, inflow_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        // Delete first: it takes the write lock and yields the row to reverse
        let inflow = sqlx::query_as::<_, Inflow>(
            r#"
            DELETE FROM inflows
            WHERE id = ?1 AND tenant_id = ?2
            RETURNING id, tenant_id, product_id, quantity,
                      supplier_reference, description, created_at
            "#,
        )
        .bind(inflow_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Inflow", inflow_id))?;

        apply_movement(
            &mut tx,
            tenant_id,
            &inflow.product_id,
            inflow.quantity,
            MovementType::In.opposite(),
            &inflow.id,
        )
        .await?;

        tx.commit().await?;
        info!(tenant_id, inflow_id, "Inflow deleted and reversed");
        Ok(())
    }

    // =========================================================================
    // Outflows
    // =========================================================================

    /// Records stock leaving: `quantity -= q` plus an `out` movement.
    ///
    /// No lower bound: stock may go negative.
    pub async fn record_outflow(&self, tenant_id: &str, input: &NewOutflow) -> DbResult<Outflow> {
        validate_quantity(input.quantity)?;
        with_conflict_retry(&self.retry, "record_outflow", || async move {
            let mut tx = self.pool.begin().await?;
            let outflow = insert_outflow(&mut tx, tenant_id, input).await?;
            tx.commit().await?;
            Ok(outflow)
        })
        .await
    }

    /// Deletes an outflow, putting its quantity back into stock.
    pub async fn delete_outflow(&self, tenant_id: &str, outflow_id: &str) -> DbResult<()> {
        with_conflict_retry(&self.retry, "delete_outflow", || async move {
            let mut tx = self.pool.begin().await?;
            let outflow = take_outflow(&mut tx, tenant_id, outflow_id).await?;
            reverse_outflow(&mut tx, &outflow).await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Movement history of a product, oldest first.
    pub async fn movements_for_product(
        &self,
        tenant_id: &str,
        product_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, tenant_id, product_id, quantity, movement_type, source_id, created_at
            FROM stock_movements
            WHERE tenant_id = ?1 AND product_id = ?2
            ORDER BY created_at, rowid
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Inflows of a product, oldest first.
    pub async fn inflows_for_product(&self, tenant_id: &str, product_id: &str) -> DbResult<Vec<Inflow>> {
        let inflows = sqlx::query_as::<_, Inflow>(
            r#"
            SELECT id, tenant_id, product_id, quantity, supplier_reference, description, created_at
            FROM inflows
            WHERE tenant_id = ?1 AND product_id = ?2
            ORDER BY created_at, rowid
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(inflows)
    }

    /// Outflows of a product, oldest first.
    pub async fn outflows_for_product(&self, tenant_id: &str, product_id: &str) -> DbResult<Vec<Outflow>> {
        let outflows = sqlx::query_as::<_, Outflow>(
            r#"
            SELECT id, tenant_id, product_id, quantity, sale_reference,
                   description, document_id, created_at
            FROM outflows
            WHERE tenant_id = ?1 AND product_id = ?2
            ORDER BY created_at, rowid
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(outflows)
    }

    /// Outflows emitted for a document.
    pub async fn outflows_for_document(&self, tenant_id: &str, document_id: &str) -> DbResult<Vec<Outflow>> {
        let mut conn = self.pool.acquire().await?;
        document_outflows(&mut conn, tenant_id, document_id).await
    }
}

// =============================================================================
// Transaction-level operations
// =============================================================================
// Used by the ledger above and by the document lifecycle engine, always
// inside a caller-owned transaction.

/// Applies one movement: the product's quantity changes by the signed
/// amount and an audit row is appended.
///
/// The quantity UPDATE runs first, so this also takes the write lock and
/// fails with `ProductNotFound` for a product outside the tenant.
pub(crate) async fn apply_movement(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    product_id: &str,
    quantity: i64,
    movement_type: MovementType,
    source_id: &str,
) -> DbResult<()> {
    apply_delta(conn, tenant_id, product_id, movement_type.signed(quantity)).await?;
    append_movement(conn, tenant_id, product_id, quantity, movement_type, source_id).await
}

/// `quantity += delta` for one product of a tenant.
async fn apply_delta(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    product_id: &str,
    delta: i64,
) -> DbResult<()> {
    debug!(tenant_id, product_id, delta, "Applying stock delta");

    let result = sqlx::query(
        r#"
        UPDATE products
        SET quantity = quantity + ?3, updated_at = ?4
        WHERE id = ?1 AND tenant_id = ?2
        "#,
    )
    .bind(product_id)
    .bind(tenant_id)
    .bind(delta)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::ProductNotFound(product_id.to_string()).into());
    }
    Ok(())
}

/// Appends one audit row. `quantity` is always positive.
async fn append_movement(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    product_id: &str,
    quantity: i64,
    movement_type: MovementType,
    source_id: &str,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, tenant_id, product_id, quantity, movement_type, source_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(tenant_id)
    .bind(product_id)
    .bind(quantity)
    .bind(movement_type)
    .bind(source_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Inserts an outflow and applies it to the ledger.
pub(crate) async fn insert_outflow(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    input: &NewOutflow,
) -> DbResult<Outflow> {
    let outflow = Outflow {
        id: Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        product_id: input.product_id.clone(),
        quantity: input.quantity,
        sale_reference: input.sale_reference.clone(),
        description: input.description.clone(),
        document_id: input.document_id.clone(),
        created_at: Utc::now(),
    };

    apply_movement(
        conn,
        tenant_id,
        &outflow.product_id,
        outflow.quantity,
        MovementType::Out,
        &outflow.id,
    )
    .await?;

    sqlx::query(
        r#"
        INSERT INTO outflows (
            id, tenant_id, product_id, quantity,
            sale_reference, description, document_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&outflow.id)
    .bind(&outflow.tenant_id)
    .bind(&outflow.product_id)
    .bind(outflow.quantity)
    .bind(&outflow.sale_reference)
    .bind(&outflow.description)
    .bind(&outflow.document_id)
    .bind(outflow.created_at)
    .execute(&mut *conn)
    .await?;

    debug!(tenant_id, outflow_id = %outflow.id, quantity = outflow.quantity, "Outflow applied");
    Ok(outflow)
}

/// Deletes an outflow row and returns it.
async fn take_outflow(conn: &mut SqliteConnection, tenant_id: &str, outflow_id: &str) -> DbResult<Outflow> {
    sqlx::query_as::<_, Outflow>(
        r#"
        DELETE FROM outflows
        WHERE id = ?1 AND tenant_id = ?2
        RETURNING id, tenant_id, product_id, quantity, sale_reference,
                  description, document_id, created_at
        "#,
    )
    .bind(outflow_id)
    .bind(tenant_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Outflow", outflow_id))
}

/// Puts a deleted outflow's quantity back and appends an `in` movement.
async fn reverse_outflow(conn: &mut SqliteConnection, outflow: &Outflow) -> DbResult<()> {
    apply_movement(
        conn,
        &outflow.tenant_id,
        &outflow.product_id,
        outflow.quantity,
        MovementType::Out.opposite(),
        &outflow.id,
    )
    .await?;

    info!(tenant_id = %outflow.tenant_id, outflow_id = %outflow.id, "Outflow reversed");
    Ok(())
}

/// Outflows of a document inside a transaction.
pub(crate) async fn document_outflows(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    document_id: &str,
) -> DbResult<Vec<Outflow>> {
    let outflows = sqlx::query_as::<_, Outflow>(
        r#"
        SELECT id, tenant_id, product_id, quantity, sale_reference,
               description, document_id, created_at
        FROM outflows
        WHERE tenant_id = ?1 AND document_id = ?2
        ORDER BY created_at, rowid
        "#,
    )
    .bind(tenant_id)
    .bind(document_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(outflows)
}

/// Deletes and reverses every outflow of a document. Returns how many.
pub(crate) async fn reverse_document_outflows(
    conn: &mut SqliteConnection,
    tenant_id: &str,
    document_id: &str,
) -> DbResult<usize> {
    let outflows = document_outflows(conn, tenant_id, document_id).await?;
    for outflow in &outflows {
        take_outflow(conn, tenant_id, &outflow.id).await?;
        reverse_outflow(conn, outflow).await?;
    }
    Ok(outflows.len())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_product, test_db, test_file_db};
    use crate::Database;

    fn inflow(product_id: &str, quantity: i64) -> NewInflow {
        NewInflow {
            product_id: product_id.to_string(),
            quantity,
            supplier_reference: Some("ACME".to_string()),
            description: None,
        }
    }

    async fn quantity(db: &Database, tenant_id: &str, product_id: &str) -> i64 {
        db.products()
            .get_by_id(tenant_id, product_id)
            .await
            .unwrap()
            .unwrap()
            .quantity
    }

    #[tokio::test]
    async fn test_inflow_round_trip_restores_quantity() {
        let db = test_db().await;
        let product = db.products().create("t1", &new_product("Pen", 4, 100)).await.unwrap();
        let ledger = db.ledger();

        let recorded = ledger.record_inflow("t1", &inflow(&product.id, 6)).await.unwrap();
        assert_eq!(quantity(&db, "t1", &product.id).await, 10);

        ledger.delete_inflow("t1", &recorded.id).await.unwrap();
        assert_eq!(quantity(&db, "t1", &product.id).await, 4);

        let movements = ledger.movements_for_product("t1", &product.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].movement_type, MovementType::In);
        assert_eq!(movements[1].movement_type, MovementType::Out);
        assert_eq!(movements[1].quantity, 6);
        assert!(movements.iter().all(|m| m.source_id == recorded.id));
        assert!(ledger.inflows_for_product("t1", &product.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outflow_round_trip_restores_quantity() {
        let db = test_db().await;
        let product = db.products().create("t1", &new_product("Pen", 4, 100)).await.unwrap();
        let ledger = db.ledger();

        let outflow = ledger
            .record_outflow("t1", &NewOutflow::manual(&product.id, 3))
            .await
            .unwrap();
        assert_eq!(quantity(&db, "t1", &product.id).await, 1);

        ledger.delete_outflow("t1", &outflow.id).await.unwrap();
        assert_eq!(quantity(&db, "t1", &product.id).await, 4);

        let movements = ledger.movements_for_product("t1", &product.id).await.unwrap();
        let kinds: Vec<_> = movements.iter().map(|m| m.movement_type).collect();
        assert_eq!(kinds, vec![MovementType::Out, MovementType::In]);
    }

    #[tokio::test]
    async fn test_movement_history_replays_to_quantity() {
        let db = test_db().await;
        let product = db.products().create("t1", &new_product("Pen", 4, 100)).await.unwrap();
        let ledger = db.ledger();

        let first = ledger.record_inflow("t1", &inflow(&product.id, 6)).await.unwrap();
        let sold = ledger
            .record_outflow("t1", &NewOutflow::manual(&product.id, 9))
            .await
            .unwrap();
        ledger.record_inflow("t1", &inflow(&product.id, 2)).await.unwrap();
        ledger.delete_outflow("t1", &sold.id).await.unwrap();
        ledger.delete_inflow("t1", &first.id).await.unwrap();

        // Opening quantity plus the signed history gives the stored quantity
        let movements = ledger.movements_for_product("t1", &product.id).await.unwrap();
        let replayed: i64 = movements
            .iter()
            .map(|m| m.movement_type.signed(m.quantity))
            .sum();
        assert_eq!(movements.len(), 5);
        assert!(movements.iter().all(|m| m.quantity > 0));
        assert_eq!(4 + replayed, quantity(&db, "t1", &product.id).await);
        assert_eq!(quantity(&db, "t1", &product.id).await, 6);
    }

    #[tokio::test]
    async fn test_apply_movement_unknown_product_writes_nothing() {
        let db = test_db().await;
        let product = db.products().create("t1", &new_product("Pen", 4, 100)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let err = apply_movement(&mut conn, "t2", &product.id, 3, MovementType::Out, "src")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));

        apply_movement(&mut conn, "t1", &product.id, 3, MovementType::Out, "src")
            .await
            .unwrap();
        drop(conn);

        assert_eq!(quantity(&db, "t1", &product.id).await, 1);
        let movements = db.ledger().movements_for_product("t1", &product.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Out);
        assert_eq!(movements[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_stock_may_go_negative() {
        let db = test_db().await;
        let product = db.products().create("t1", &new_product("Pen", 1, 100)).await.unwrap();

        db.ledger()
            .record_outflow("t1", &NewOutflow::manual(&product.id, 5))
            .await
            .unwrap();
        assert_eq!(quantity(&db, "t1", &product.id).await, -4);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_quantity() {
        let db = test_db().await;
        let product = db.products().create("t1", &new_product("Pen", 1, 100)).await.unwrap();

        assert!(db.ledger().record_inflow("t1", &inflow(&product.id, 0)).await.is_err());
        assert!(db
            .ledger()
            .record_outflow("t1", &NewOutflow::manual(&product.id, -2))
            .await
            .is_err());
        assert!(db
            .ledger()
            .record_inflow("t1", &inflow(&product.id, i64::MAX))
            .await
            .is_err());
        assert_eq!(quantity(&db, "t1", &product.id).await, 1);
    }

    #[tokio::test]
    async fn test_cross_tenant_writes_fail_and_persist_nothing() {
        let db = test_db().await;
        let product = db.products().create("t1", &new_product("Pen", 5, 100)).await.unwrap();
        let ledger = db.ledger();

        let err = ledger.record_inflow("t2", &inflow(&product.id, 3)).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));

        let outflow = ledger
            .record_outflow("t1", &NewOutflow::manual(&product.id, 2))
            .await
            .unwrap();
        assert!(matches!(
            ledger.delete_outflow("t2", &outflow.id).await,
            Err(DbError::NotFound { .. })
        ));

        assert_eq!(quantity(&db, "t1", &product.id).await, 3);
        assert!(ledger.movements_for_product("t2", &product.id).await.unwrap().is_empty());
        assert_eq!(ledger.movements_for_product("t1", &product.id).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_outflows_all_land() {
        let (db, path) = test_file_db().await;
        let product = db.products().create("t1", &new_product("Pen", 100, 100)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = db.clone();
            let product_id = product.id.clone();
            handles.push(tokio::spawn(async move {
                db.ledger()
                    .record_outflow("t1", &NewOutflow::manual(&product_id, 2))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(quantity(&db, "t1", &product.id).await, 60);
        assert_eq!(
            db.ledger().movements_for_product("t1", &product.id).await.unwrap().len(),
            20
        );

        db.close().await;
        let _ = std::fs::remove_file(&path);
    }
}
