//! # Payment Repository
//!
//! Payment recording against orders, and the derived payment status.
//!
//! ## The Overpayment Race
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │           Why the insert is conditional                                 │
//! │                                                                         │
//! │  Order total: 100.00          Naive flow (BROKEN):                     │
//! │  Already paid: 60.00                                                   │
//! │                               Request A          Request B             │
//! │                               read paid=60       read paid=60          │
//! │                               60+30 ≤ 100 ✓      60+30 ≤ 100 ✓        │
//! │                               INSERT 30          INSERT 30             │
//! │                               → paid=120, over the total               │
//! │                                                                         │
//! │  Fixed flow: the admission check runs INSIDE the insert statement      │
//! │                                                                         │
//! │  INSERT INTO order_payments (...)                                      │
//! │  SELECT ...                                                            │
//! │  WHERE (running sum) + amount <= total                                 │
//! │                                                                         │
//! │  SQLite serializes writers, so exactly one of two racing inserts       │
//! │  sees the sum that still fits. The other inserts zero rows and is      │
//! │  rejected with the fresh numbers.                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Derivation
//! `orders.payment_status` is recomputed from the payment sum in the same
//! transaction as every successful insert, via one pure function
//! ([`derive_payment_status`]). A payment never becomes visible without its
//! status update.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::order::{check_payment_fits, derive_payment_status};
use tally_core::{validation, CoreError, Money, OrderPayment, PaymentState, PaymentStatus};

/// Repository for payment database operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a payment against an order.
    ///
    /// ## What This Does
    /// 1. Looks up the order (`OrderNotFound` if absent)
    /// 2. Inserts the payment row, conditionally on the running payment sum
    ///    plus this amount staying within the order total (exact integer
    ///    comparison, no tolerance)
    /// 3. Recomputes and persists the order's payment status from the new
    ///    sum, in the same transaction
    ///
    /// ## Arguments
    /// * `order_id` - Order the payment applies to
    /// * `amount_cents` - Amount paid, must be positive
    /// * `payment_date` - When the payment was taken; defaults to now
    ///
    /// ## Errors
    /// * `OrderNotFound` - No such order
    /// * `InvalidPaymentAmount` - Zero or negative amount
    /// * `OverpaymentRejected` - Would push the cumulative paid amount past
    ///   the total; carries total/paid/remaining
    pub async fn record_payment(
        &self,
        order_id: &str,
        amount_cents: i64,
        payment_date: Option<DateTime<Utc>>,
    ) -> DbResult<OrderPayment> {
        validation::validate_payment_amount(amount_cents)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let total_cents: Option<i64> =
            sqlx::query_scalar("SELECT total_cents FROM orders WHERE id = ?1")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(total_cents) = total_cents else {
            return Err(CoreError::OrderNotFound(order_id.to_string()).into());
        };

        let payment = OrderPayment {
            id: generate_payment_id(),
            order_id: order_id.to_string(),
            amount_cents,
            payment_date: payment_date.unwrap_or(now),
            status: PaymentState::Completed,
            created_at: now,
            updated_at: now,
        };

        debug!(order_id = %order_id, amount_cents = %amount_cents, "Recording payment");

        // Admission and insert in one statement: the row only lands if the
        // running sum plus this amount stays within the order total.
        let result = sqlx::query(
            r#"
            INSERT INTO order_payments (
                id, order_id, amount_cents, payment_date, status,
                created_at, updated_at
            )
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
            WHERE (
                SELECT COALESCE(SUM(amount_cents), 0)
                FROM order_payments
                WHERE order_id = ?2
            ) + ?3 <= ?8
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_id)
        .bind(payment.amount_cents)
        .bind(payment.payment_date)
        .bind(payment.status)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .bind(total_cents)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Re-read the sum the insert saw and report the precise gap.
            let paid_cents = self.sum_for_order(&mut tx, order_id).await?;

            check_payment_fits(
                Money::from_cents(total_cents),
                Money::from_cents(paid_cents),
                Money::from_cents(amount_cents),
            )?;

            // The guard refused but the re-read fits. Contention artifact;
            // the caller can retry.
            return Err(DbError::TransactionFailed(
                "payment admission check raced".to_string(),
            ));
        }

        let paid_cents = self.sum_for_order(&mut tx, order_id).await?;
        let status =
            derive_payment_status(Money::from_cents(total_cents), Money::from_cents(paid_cents));

        sqlx::query("UPDATE orders SET payment_status = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(status)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            order_id = %order_id,
            paid_cents = %paid_cents,
            status = ?status,
            "Payment recorded"
        );

        Ok(payment)
    }

    /// Re-derives and persists an order's payment status from its stored
    /// payment sum.
    ///
    /// Repair path: idempotent, normally a no-op because `record_payment`
    /// keeps the status current.
    pub async fn recompute_status(&self, order_id: &str) -> DbResult<PaymentStatus> {
        let mut tx = self.pool.begin().await?;

        let total_cents: Option<i64> =
            sqlx::query_scalar("SELECT total_cents FROM orders WHERE id = ?1")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(total_cents) = total_cents else {
            return Err(CoreError::OrderNotFound(order_id.to_string()).into());
        };

        let paid_cents = self.sum_for_order(&mut tx, order_id).await?;
        let status =
            derive_payment_status(Money::from_cents(total_cents), Money::from_cents(paid_cents));

        sqlx::query("UPDATE orders SET payment_status = ?2 WHERE id = ?1")
            .bind(order_id)
            .bind(status)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(order_id = %order_id, status = ?status, "Payment status recomputed");
        Ok(status)
    }

    /// Lists payments for one order, oldest first.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Order doesn't exist (distinct from an
    ///   order with no payments, which returns `Ok(vec![])`)
    pub async fn list_for_order(&self, order_id: &str) -> DbResult<Vec<OrderPayment>> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = ?1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Err(DbError::not_found("Order", order_id));
        }

        let payments = sqlx::query_as::<_, OrderPayment>(
            r#"
            SELECT id, order_id, amount_cents, payment_date, status,
                   created_at, updated_at
            FROM order_payments
            WHERE order_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Lists payments across all orders, newest first, paged.
    pub async fn list(&self, skip: i64, limit: i64) -> DbResult<Vec<OrderPayment>> {
        let payments = sqlx::query_as::<_, OrderPayment>(
            r#"
            SELECT id, order_id, amount_cents, payment_date, status,
                   created_at, updated_at
            FROM order_payments
            ORDER BY created_at DESC, id
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Total paid against one order, in cents. Zero for an unknown order.
    pub async fn get_total_paid(&self, order_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM order_payments WHERE order_id = ?1",
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Total payments received across all orders, in cents.
    pub async fn total_paid_all(&self) -> DbResult<i64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(amount_cents), 0) FROM order_payments")
                .fetch_one(&self.pool)
                .await?;

        Ok(total)
    }

    /// Total payments attributable to a product: the sum of payments on
    /// orders that contain at least one line for it.
    ///
    /// Computed by joining payments to items at query time, counted once per
    /// payment even when an order holds several lines for the product.
    pub async fn total_for_product(&self, product_id: &str) -> DbResult<i64> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Err(DbError::not_found("Product", product_id));
        }

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(p.amount_cents), 0)
            FROM order_payments p
            WHERE EXISTS (
                SELECT 1 FROM order_items i
                WHERE i.order_id = p.order_id AND i.product_id = ?1
            )
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Total payments attributable to a service. See [`Self::total_for_product`].
    pub async fn total_for_service(&self, service_id: &str) -> DbResult<i64> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM services WHERE id = ?1")
            .bind(service_id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Err(DbError::not_found("Service", service_id));
        }

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(p.amount_cents), 0)
            FROM order_payments p
            WHERE EXISTS (
                SELECT 1 FROM order_items i
                WHERE i.order_id = p.order_id AND i.service_id = ?1
            )
            "#,
        )
        .bind(service_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Payment sum for an order inside an open transaction.
    async fn sum_for_order(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        order_id: &str,
    ) -> DbResult<i64> {
        let paid: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM order_payments WHERE order_id = ?1",
        )
        .bind(order_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(paid)
    }
}

/// Helper to generate a new payment ID.
pub fn generate_payment_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
