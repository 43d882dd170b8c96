//! # Ledger Repository
//!
//! Daily reconciliation ledgers: sales records and cashout transactions.
//!
//! These are append-mostly bookkeeping tables with no interaction with the
//! order/payment invariants. A sales record summarizes one business day and
//! may reference the cashout it was reconciled against.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{validation, CashoutTransaction, SalesRecord};

// =============================================================================
// Input Types
// =============================================================================

/// Input for creating a sales record.
#[derive(Debug, Clone)]
pub struct NewSalesRecord {
    pub record_date: NaiveDate,
    pub total_sales_cents: i64,
    pub order_count: i64,
    /// Cashout this record reconciles against; must exist when given.
    pub cashout_id: Option<String>,
    pub note: Option<String>,
}

/// Input for creating a cashout transaction.
#[derive(Debug, Clone)]
pub struct NewCashout {
    pub amount_cents: i64,
    pub transaction_date: NaiveDate,
    pub note: Option<String>,
}

/// Aggregate of one day's orders, for composing a sales record.
#[derive(Debug, Clone, Copy)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_sales_cents: i64,
    pub order_count: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for reconciliation ledger operations.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Creates a sales record.
    ///
    /// ## Errors
    /// * `NotFound` - `cashout_id` given but no such cashout exists
    pub async fn create_sales_record(&self, input: NewSalesRecord) -> DbResult<SalesRecord> {
        validation::validate_non_negative("total_sales", input.total_sales_cents)?;
        validation::validate_non_negative("order_count", input.order_count)?;

        if let Some(cashout_id) = &input.cashout_id {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM cashout_transactions WHERE id = ?1")
                    .bind(cashout_id)
                    .fetch_optional(&self.pool)
                    .await?;

            if exists.is_none() {
                return Err(DbError::not_found("Cashout", cashout_id));
            }
        }

        let record = SalesRecord {
            id: generate_sales_record_id(),
            record_date: input.record_date,
            total_sales_cents: input.total_sales_cents,
            order_count: input.order_count,
            cashout_id: input.cashout_id,
            note: input.note,
            created_at: Utc::now(),
        };

        debug!(id = %record.id, date = %record.record_date, "Creating sales record");

        sqlx::query(
            r#"
            INSERT INTO sales_records (
                id, record_date, total_sales_cents, order_count,
                cashout_id, note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.id)
        .bind(record.record_date)
        .bind(record.total_sales_cents)
        .bind(record.order_count)
        .bind(&record.cashout_id)
        .bind(&record.note)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    /// Lists sales records, most recent day first, paged.
    pub async fn list_sales_records(&self, skip: i64, limit: i64) -> DbResult<Vec<SalesRecord>> {
        let records = sqlx::query_as::<_, SalesRecord>(
            r#"
            SELECT id, record_date, total_sales_cents, order_count,
                   cashout_id, note, created_at
            FROM sales_records
            ORDER BY record_date DESC, id
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Creates a cashout transaction.
    pub async fn create_cashout(&self, input: NewCashout) -> DbResult<CashoutTransaction> {
        validation::validate_amount_cents(input.amount_cents)?;

        let cashout = CashoutTransaction {
            id: generate_cashout_id(),
            amount_cents: input.amount_cents,
            transaction_date: input.transaction_date,
            note: input.note,
            created_at: Utc::now(),
        };

        debug!(id = %cashout.id, date = %cashout.transaction_date, "Creating cashout");

        sqlx::query(
            r#"
            INSERT INTO cashout_transactions (
                id, amount_cents, transaction_date, note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&cashout.id)
        .bind(cashout.amount_cents)
        .bind(cashout.transaction_date)
        .bind(&cashout.note)
        .bind(cashout.created_at)
        .execute(&self.pool)
        .await?;

        Ok(cashout)
    }

    /// Lists cashout transactions, most recent day first, paged.
    pub async fn list_cashouts(&self, skip: i64, limit: i64) -> DbResult<Vec<CashoutTransaction>> {
        let cashouts = sqlx::query_as::<_, CashoutTransaction>(
            r#"
            SELECT id, amount_cents, transaction_date, note, created_at
            FROM cashout_transactions
            ORDER BY transaction_date DESC, id
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(cashouts)
    }

    /// Sums one day's orders (total and count) from the orders table.
    ///
    /// Convenience for composing a [`SalesRecord`] at close of business; the
    /// record itself stays a manual write so the books can be corrected.
    pub async fn daily_summary(&self, date: NaiveDate) -> DbResult<DailySummary> {
        let (total_sales_cents, order_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(total_cents), 0), COUNT(*)
            FROM orders
            WHERE date(created_at) = ?1
            "#,
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(DailySummary {
            date,
            total_sales_cents,
            order_count,
        })
    }
}

/// Helper to generate a new sales record ID.
pub fn generate_sales_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Helper to generate a new cashout ID.
pub fn generate_cashout_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
