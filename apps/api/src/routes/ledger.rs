//! Reconciliation ledger endpoints: sales records and cashouts.
//!
//! These are append-style bookkeeping rows. A sales record summarizes a
//! business day and may reference the cashout it was reconciled against;
//! the summary endpoint computes that day's numbers from the orders
//! table so the client can prefill the record.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tally_core::{CashoutTransaction, SalesRecord};
use tally_db::repository::ledger::{DailySummary, NewCashout, NewSalesRecord};

use super::{AppState, PageParams};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateSalesRecordRequest {
    pub record_date: NaiveDate,
    pub total_sales_cents: i64,
    pub order_count: i64,
    #[serde(default)]
    pub cashout_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCashoutRequest {
    pub amount_cents: i64,
    pub transaction_date: NaiveDate,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    /// Business day in `YYYY-MM-DD` form.
    pub date: NaiveDate,
}

// -- Response types --

#[derive(Serialize)]
pub struct SalesRecordResponse {
    pub id: String,
    pub record_date: NaiveDate,
    pub total_sales_cents: i64,
    pub order_count: i64,
    pub cashout_id: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct CashoutResponse {
    pub id: String,
    pub amount_cents: i64,
    pub transaction_date: NaiveDate,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct DailySummaryResponse {
    pub date: NaiveDate,
    pub total_sales_cents: i64,
    pub order_count: i64,
}

impl From<SalesRecord> for SalesRecordResponse {
    fn from(record: SalesRecord) -> Self {
        SalesRecordResponse {
            id: record.id,
            record_date: record.record_date,
            total_sales_cents: record.total_sales_cents,
            order_count: record.order_count,
            cashout_id: record.cashout_id,
            note: record.note,
            created_at: record.created_at,
        }
    }
}

impl From<CashoutTransaction> for CashoutResponse {
    fn from(cashout: CashoutTransaction) -> Self {
        CashoutResponse {
            id: cashout.id,
            amount_cents: cashout.amount_cents,
            transaction_date: cashout.transaction_date,
            note: cashout.note,
            created_at: cashout.created_at,
        }
    }
}

impl From<DailySummary> for DailySummaryResponse {
    fn from(summary: DailySummary) -> Self {
        DailySummaryResponse {
            date: summary.date,
            total_sales_cents: summary.total_sales_cents,
            order_count: summary.order_count,
        }
    }
}

// -- Handlers --

/// `POST /sales-records` - record a daily sales summary.
#[tracing::instrument(skip(state, req))]
pub async fn create_sales_record(
    State(state): State<AppState>,
    Json(req): Json<CreateSalesRecordRequest>,
) -> Result<(StatusCode, Json<SalesRecordResponse>), ApiError> {
    let input = NewSalesRecord {
        record_date: req.record_date,
        total_sales_cents: req.total_sales_cents,
        order_count: req.order_count,
        cashout_id: req.cashout_id,
        note: req.note,
    };
    let record = state.db.ledger().create_sales_record(input).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// `GET /sales-records?skip=&limit=` - list sales records, newest day first.
#[tracing::instrument(skip(state))]
pub async fn list_sales_records(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<SalesRecordResponse>>, ApiError> {
    let (skip, limit) = params.bounds();
    let records = state.db.ledger().list_sales_records(skip, limit).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// `GET /sales-records/summary?date=` - computed totals for one day.
#[tracing::instrument(skip(state))]
pub async fn daily_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<DailySummaryResponse>, ApiError> {
    let summary = state.db.ledger().daily_summary(params.date).await?;
    Ok(Json(summary.into()))
}

/// `POST /cashouts` - record a cash drawer withdrawal.
#[tracing::instrument(skip(state, req))]
pub async fn create_cashout(
    State(state): State<AppState>,
    Json(req): Json<CreateCashoutRequest>,
) -> Result<(StatusCode, Json<CashoutResponse>), ApiError> {
    let input = NewCashout {
        amount_cents: req.amount_cents,
        transaction_date: req.transaction_date,
        note: req.note,
    };
    let cashout = state.db.ledger().create_cashout(input).await?;
    Ok((StatusCode::CREATED, Json(cashout.into())))
}

/// `GET /cashouts?skip=&limit=` - list cashouts, newest day first.
#[tracing::instrument(skip(state))]
pub async fn list_cashouts(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<CashoutResponse>>, ApiError> {
    let (skip, limit) = params.bounds();
    let cashouts = state.db.ledger().list_cashouts(skip, limit).await?;
    Ok(Json(cashouts.into_iter().map(Into::into).collect()))
}
