//! # Order Repository
//!
//! Order placement and queries. Placement is the only stock-mutating path in
//! the system outside catalog management.
//!
//! ## Placement Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       place_order(draft)                                │
//! │                                                                         │
//! │  1. STRUCTURAL VALIDATION (pure, no database)                          │
//! │     └── line count, quantities, prices, discount                       │
//! │                                                                         │
//! │  2. BEGIN TRANSACTION                                                  │
//! │     │                                                                   │
//! │     ├── per product line: product exists?                              │
//! │     │     └── variant given? conditional decrement:                    │
//! │     │         UPDATE variants SET quantity = quantity - n              │
//! │     │         WHERE id = ? AND quantity >= n                           │
//! │     │         (0 rows → VariantNotFound / InsufficientStock)           │
//! │     │                                                                   │
//! │     ├── per service line: service exists?                              │
//! │     │                                                                   │
//! │     ├── declared total within 1 cent of computed total?                │
//! │     │                                                                   │
//! │     └── INSERT order + order_items                                     │
//! │                                                                         │
//! │  3. COMMIT (all stock decrements + rows, or nothing)                   │
//! │                                                                         │
//! │  Any failure before commit rolls back every decrement already made     │
//! │  earlier in the same order.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Items store plain catalog ids and the unit price at order time. Later
//! catalog edits or deletions never rewrite an order.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::order::{check_declared_total, validate_draft};
use tally_core::{
    CoreError, LineTarget, Order, OrderDetail, OrderDraft, OrderItem, OrderPayment, PaymentStatus,
};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Places an order: validates every line, decrements stock, persists the
    /// order with its items. All-or-nothing.
    ///
    /// ## Validation Sequence (fail-fast)
    /// 1. Structural checks on the draft (pure, before the transaction)
    /// 2. Product lines: product exists; variant exists under it with
    ///    enough stock (decremented in the same statement that checks it)
    /// 3. Service lines: service exists
    /// 4. Declared total within one cent of `sum(price × qty) − discount`
    ///
    /// ## Concurrency
    /// The decrement `UPDATE ... WHERE quantity >= n` is the serialization
    /// point for concurrent orders on one variant: whichever transaction
    /// commits first wins the stock, the loser sees zero rows affected and
    /// rolls back with `InsufficientStock`.
    ///
    /// ## Returns
    /// The persisted order aggregate with assigned ids and an empty payment
    /// history.
    pub async fn place_order(&self, draft: OrderDraft) -> DbResult<OrderDetail> {
        validate_draft(&draft)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for line in &draft.lines {
            match &line.target {
                LineTarget::Product {
                    product_id,
                    variant_id,
                } => {
                    let exists: Option<i64> =
                        sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
                            .bind(product_id)
                            .fetch_optional(&mut *tx)
                            .await?;

                    if exists.is_none() {
                        return Err(CoreError::ProductNotFound(product_id.clone()).into());
                    }

                    if let Some(variant_id) = variant_id {
                        // Check-and-decrement in one statement. Zero rows
                        // means the variant is missing or short on stock;
                        // re-read to tell the two apart.
                        let result = sqlx::query(
                            r#"
                            UPDATE variants SET
                                quantity = quantity - ?1,
                                updated_at = ?2
                            WHERE id = ?3 AND product_id = ?4 AND quantity >= ?1
                            "#,
                        )
                        .bind(line.quantity)
                        .bind(now)
                        .bind(variant_id)
                        .bind(product_id)
                        .execute(&mut *tx)
                        .await?;

                        if result.rows_affected() == 0 {
                            let available: Option<i64> = sqlx::query_scalar(
                                "SELECT quantity FROM variants WHERE id = ?1 AND product_id = ?2",
                            )
                            .bind(variant_id)
                            .bind(product_id)
                            .fetch_optional(&mut *tx)
                            .await?;

                            return Err(match available {
                                None => CoreError::VariantNotFound(variant_id.clone()).into(),
                                Some(available) => CoreError::InsufficientStock {
                                    variant_id: variant_id.clone(),
                                    available,
                                    requested: line.quantity,
                                }
                                .into(),
                            });
                        }
                    }
                }

                LineTarget::Service { service_id } => {
                    let exists: Option<i64> =
                        sqlx::query_scalar("SELECT 1 FROM services WHERE id = ?1")
                            .bind(service_id)
                            .fetch_optional(&mut *tx)
                            .await?;

                    if exists.is_none() {
                        return Err(CoreError::ServiceNotFound(service_id.clone()).into());
                    }
                }
            }
        }

        check_declared_total(&draft.lines, draft.discount_cents, draft.declared_total_cents)?;

        // The stored total is the declared one: it is what the customer was
        // quoted, already verified to be within tolerance.
        let order = Order {
            id: generate_order_id(),
            created_at: now,
            discount_cents: draft.discount_cents,
            total_cents: draft.declared_total_cents,
            payment_status: PaymentStatus::Pending,
        };

        debug!(id = %order.id, total_cents = %order.total_cents, "Placing order");

        sqlx::query(
            r#"
            INSERT INTO orders (id, created_at, discount_cents, total_cents, payment_status)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&order.id)
        .bind(order.created_at)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(order.payment_status)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let item = OrderItem {
                id: generate_order_item_id(),
                order_id: order.id.clone(),
                target: line.target.clone(),
                quantity: line.quantity,
                price_cents: line.price_cents,
            };

            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, product_id, service_id, variant_id,
                    quantity, price_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(item.target.product_id())
            .bind(item.target.service_id())
            .bind(item.target.variant_id())
            .bind(item.quantity)
            .bind(item.price_cents)
            .execute(&mut *tx)
            .await?;

            items.push(item);
        }

        tx.commit().await?;

        debug!(id = %order.id, items = items.len(), "Order placed");

        Ok(OrderDetail {
            order,
            items,
            payments: Vec::new(),
        })
    }

    /// Gets an order with its items and payment history.
    ///
    /// ## Returns
    /// * `Ok(Some(_))` - Order found
    /// * `Ok(None)` - Order not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<OrderDetail>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, created_at, discount_cents, total_cents, payment_status
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(order) = order else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, order_id, product_id, service_id, variant_id,
                   quantity, price_cents
            FROM order_items
            WHERE order_id = ?1
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(ItemRow::into_item)
            .collect::<DbResult<Vec<_>>>()?;

        let payments = sqlx::query_as::<_, OrderPayment>(
            r#"
            SELECT id, order_id, amount_cents, payment_date, status,
                   created_at, updated_at
            FROM order_payments
            WHERE order_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(OrderDetail {
            order,
            items,
            payments,
        }))
    }

    /// Lists orders, newest first, paged.
    pub async fn list(&self, skip: i64, limit: i64) -> DbResult<Vec<Order>> {
        debug!(skip = %skip, limit = %limit, "Listing orders");

        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, created_at, discount_cents, total_cents, payment_status
            FROM orders
            ORDER BY created_at DESC, id
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Deletes an order with its items and payments, in one transaction.
    ///
    /// Stock is NOT restored; deletion is an administrative correction, not
    /// a cancellation flow.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting order");

        let mut tx = self.pool.begin().await?;

        // Children first. The FK cascade is a DDL backstop only.
        sqlx::query("DELETE FROM order_payments WHERE order_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw order_items row. The three nullable reference columns collapse into a
/// [`LineTarget`] on the way out; the table CHECK constraints guarantee a
/// valid combination.
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: String,
    order_id: String,
    product_id: Option<String>,
    service_id: Option<String>,
    variant_id: Option<String>,
    quantity: i64,
    price_cents: i64,
}

impl ItemRow {
    fn into_item(self) -> DbResult<OrderItem> {
        let ItemRow {
            id,
            order_id,
            product_id,
            service_id,
            variant_id,
            quantity,
            price_cents,
        } = self;

        let target = LineTarget::from_parts(product_id, service_id, variant_id).map_err(
            |reason| DbError::Internal(format!("order item {} has invalid target: {}", id, reason)),
        )?;

        Ok(OrderItem {
            id,
            order_id,
            target,
            quantity,
            price_cents,
        })
    }
}

/// Helper to generate a new order ID.
pub fn generate_order_id() -> String {
    Uuid::new_v4().to_string()
}

/// Helper to generate a new order item ID.
pub fn generate_order_item_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::{NewProduct, NewVariant, VariantUpdate};
    use crate::repository::service::NewService;
    use tally_core::DraftLine;

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// Seeds a one-variant product, returns (product_id, variant_id).
    async fn seed_variant(db: &Database, quantity: i64, price_cents: i64) -> (String, String) {
        let created = db
            .products()
            .create(NewProduct {
                name: "Hoodie".to_string(),
                description: None,
                color: Some("black".to_string()),
                image_url: None,
                variants: vec![NewVariant {
                    size: Some("M".to_string()),
                    quantity,
                    selling_price_cents: price_cents,
                    item_cost_cents: price_cents / 2,
                }],
            })
            .await
            .unwrap();
        (created.product.id, created.variants[0].id.clone())
    }

    async fn seed_service(db: &Database, price_cents: i64) -> String {
        db.services()
            .create(NewService {
                name: "Embroidery".to_string(),
                size: None,
                price_cents,
                image_url: None,
            })
            .await
            .unwrap()
            .id
    }

    fn product_line(product_id: &str, variant_id: &str, quantity: i64, price_cents: i64) -> DraftLine {
        DraftLine {
            target: LineTarget::Product {
                product_id: product_id.to_string(),
                variant_id: Some(variant_id.to_string()),
            },
            quantity,
            price_cents,
        }
    }

    fn service_line(service_id: &str, quantity: i64, price_cents: i64) -> DraftLine {
        DraftLine {
            target: LineTarget::Service {
                service_id: service_id.to_string(),
            },
            quantity,
            price_cents,
        }
    }

    async fn stock_of(db: &Database, product_id: &str, variant_id: &str) -> i64 {
        db.products()
            .get_with_variants(product_id)
            .await
            .unwrap()
            .unwrap()
            .variants
            .iter()
            .find(|v| v.id == variant_id)
            .unwrap()
            .quantity
    }

    #[tokio::test]
    async fn test_place_order_decrements_stock() {
        let db = setup().await;
        let (pid, vid) = seed_variant(&db, 10, 1000).await;
        let sid = seed_service(&db, 500).await;

        // 2×10.00 + 1×5.00 − 1.00 discount = 24.00
        let detail = db
            .orders()
            .place_order(OrderDraft {
                lines: vec![
                    product_line(&pid, &vid, 2, 1000),
                    service_line(&sid, 1, 500),
                ],
                discount_cents: 100,
                declared_total_cents: 2400,
            })
            .await
            .unwrap();

        assert_eq!(detail.order.total_cents, 2400);
        assert_eq!(detail.order.discount_cents, 100);
        assert_eq!(detail.order.payment_status, PaymentStatus::Pending);
        assert_eq!(detail.items.len(), 2);
        assert!(detail.payments.is_empty());
        assert_eq!(stock_of(&db, &pid, &vid).await, 8);

        let fetched = db.orders().get_by_id(&detail.order.id).await.unwrap().unwrap();
        assert_eq!(fetched.items.len(), 2);
        assert_eq!(fetched.items[0].order_id, detail.order.id);
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_earlier_decrements() {
        let db = setup().await;
        let (pid_a, vid_a) = seed_variant(&db, 5, 1000).await;
        let (pid_b, vid_b) = seed_variant(&db, 1, 800).await;

        // First line would succeed; second is short on stock
        let err = db
            .orders()
            .place_order(OrderDraft {
                lines: vec![
                    product_line(&pid_a, &vid_a, 2, 1000),
                    product_line(&pid_b, &vid_b, 3, 800),
                ],
                discount_cents: 0,
                declared_total_cents: 4400,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 1,
                requested: 3,
                ..
            })
        ));

        // The first decrement was rolled back with the transaction
        assert_eq!(stock_of(&db, &pid_a, &vid_a).await, 5);
        assert_eq!(stock_of(&db, &pid_b, &vid_b).await, 1);
        assert!(db.orders().list(0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_declared_total_tolerance() {
        let db = setup().await;
        let (pid, vid) = seed_variant(&db, 50, 1000).await;
        let sid = seed_service(&db, 500).await;
        let lines = || {
            vec![
                product_line(&pid, &vid, 2, 1000),
                service_line(&sid, 1, 500),
            ]
        };

        // Computed total is 2400; one cent of rounding slack is allowed
        for declared in [2400, 2401] {
            db.orders()
                .place_order(OrderDraft {
                    lines: lines(),
                    discount_cents: 100,
                    declared_total_cents: declared,
                })
                .await
                .unwrap();
        }

        let err = db
            .orders()
            .place_order(OrderDraft {
                lines: lines(),
                discount_cents: 100,
                declared_total_cents: 2500,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::PriceMismatch {
                expected_cents: 2400,
                declared_cents: 2500,
            })
        ));

        // Two accepted orders consumed stock; the rejected one did not
        assert_eq!(stock_of(&db, &pid, &vid).await, 46);
    }

    #[tokio::test]
    async fn test_unknown_references() {
        let db = setup().await;
        let (pid, _vid) = seed_variant(&db, 5, 1000).await;

        let err = db
            .orders()
            .place_order(OrderDraft {
                lines: vec![product_line("missing", "also-missing", 1, 1000)],
                discount_cents: 0,
                declared_total_cents: 1000,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));

        let err = db
            .orders()
            .place_order(OrderDraft {
                lines: vec![product_line(&pid, "missing", 1, 1000)],
                discount_cents: 0,
                declared_total_cents: 1000,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::VariantNotFound(_))));

        let err = db
            .orders()
            .place_order(OrderDraft {
                lines: vec![service_line("missing", 1, 1000)],
                discount_cents: 0,
                declared_total_cents: 1000,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ServiceNotFound(_))));
    }

    #[tokio::test]
    async fn test_structural_validation_runs_before_any_lookup() {
        let db = setup().await;

        let err = db
            .orders()
            .place_order(OrderDraft {
                lines: vec![],
                discount_cents: 0,
                declared_total_cents: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        // Zero quantity fails on the line itself, not on the missing product
        let err = db
            .orders()
            .place_order(OrderDraft {
                lines: vec![product_line("missing", "missing", 0, 1000)],
                discount_cents: 0,
                declared_total_cents: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InvalidLineItem { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_items_snapshot_catalog_at_order_time() {
        let db = setup().await;
        let (pid, vid) = seed_variant(&db, 10, 1000).await;

        let detail = db
            .orders()
            .place_order(OrderDraft {
                lines: vec![product_line(&pid, &vid, 1, 1000)],
                discount_cents: 0,
                declared_total_cents: 1000,
            })
            .await
            .unwrap();

        // Reprice the variant, then delete the product entirely
        db.products()
            .update_variant(
                &pid,
                &vid,
                VariantUpdate {
                    size: Some("M".to_string()),
                    quantity: 9,
                    selling_price_cents: 9999,
                    item_cost_cents: 5000,
                },
            )
            .await
            .unwrap();
        db.products().delete(&pid).await.unwrap();

        let fetched = db.orders().get_by_id(&detail.order.id).await.unwrap().unwrap();
        assert_eq!(fetched.items[0].price_cents, 1000);
        assert_eq!(fetched.items[0].target.product_id(), Some(pid.as_str()));
        assert_eq!(fetched.items[0].target.variant_id(), Some(vid.as_str()));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let db = setup().await;
        let sid = seed_service(&db, 500).await;

        for _ in 0..3 {
            db.orders()
                .place_order(OrderDraft {
                    lines: vec![service_line(&sid, 1, 500)],
                    discount_cents: 0,
                    declared_total_cents: 500,
                })
                .await
                .unwrap();
        }

        let orders = db.orders().list(0, 10).await.unwrap();
        assert_eq!(orders.len(), 3);
        assert!(orders.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        assert_eq!(db.orders().list(0, 2).await.unwrap().len(), 2);
        assert_eq!(db.orders().list(2, 2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_order() {
        let db = setup().await;
        let sid = seed_service(&db, 3000).await;

        let detail = db
            .orders()
            .place_order(OrderDraft {
                lines: vec![service_line(&sid, 1, 3000)],
                discount_cents: 0,
                declared_total_cents: 3000,
            })
            .await
            .unwrap();
        db.payments()
            .record_payment(&detail.order.id, 1000, None)
            .await
            .unwrap();

        db.orders().delete(&detail.order.id).await.unwrap();

        assert!(db.orders().get_by_id(&detail.order.id).await.unwrap().is_none());
        assert!(db.payments().list(0, 10).await.unwrap().is_empty());

        let err = db.orders().delete(&detail.order.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_orders_never_oversell() {
        let db = setup().await;
        let (pid, vid) = seed_variant(&db, 5, 800).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let db = db.clone();
            let pid = pid.clone();
            let vid = vid.clone();
            handles.push(tokio::spawn(async move {
                db.orders()
                    .place_order(OrderDraft {
                        lines: vec![product_line(&pid, &vid, 1, 800)],
                        discount_cents: 0,
                        declared_total_cents: 800,
                    })
                    .await
            }));
        }

        let mut accepted = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(DbError::Domain(CoreError::InsufficientStock { .. })) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(accepted, 5);
        assert_eq!(rejected, 5);
        assert_eq!(stock_of(&db, &pid, &vid).await, 0);
    }
}
