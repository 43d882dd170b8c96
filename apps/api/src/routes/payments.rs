//! Payment recording and attribution endpoints.
//!
//! Recording a payment is the second guarded write path: the payment row
//! is only inserted if the running sum stays within the order total, and
//! the order's payment_status is re-derived in the same transaction.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::{OrderPayment, PaymentState};

use super::{AppState, PageParams};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub amount_cents: i64,
    /// When the payment was taken; defaults to now.
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
}

// -- Response types --

#[derive(Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub order_id: String,
    pub amount_cents: i64,
    pub payment_date: DateTime<Utc>,
    pub status: PaymentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct PaymentTotalResponse {
    pub total_cents: i64,
}

impl From<OrderPayment> for PaymentResponse {
    fn from(payment: OrderPayment) -> Self {
        PaymentResponse {
            id: payment.id,
            order_id: payment.order_id,
            amount_cents: payment.amount_cents,
            payment_date: payment.payment_date,
            status: payment.status,
            created_at: payment.created_at,
            updated_at: payment.updated_at,
        }
    }
}

// -- Handlers --

/// `POST /orders/{id}/payments` - record a payment against an order.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let payment = state
        .db
        .payments()
        .record_payment(&id, req.amount_cents, req.payment_date)
        .await?;
    Ok((StatusCode::CREATED, Json(payment.into())))
}

/// `GET /orders/{id}/payments` - list an order's payments, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let payments = state.db.payments().list_for_order(&id).await?;
    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

/// `GET /payments?skip=&limit=` - list payments across all orders.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let (skip, limit) = params.bounds();
    let payments = state.db.payments().list(skip, limit).await?;
    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

/// `GET /payments/total` - sum of all recorded payments.
#[tracing::instrument(skip(state))]
pub async fn total(
    State(state): State<AppState>,
) -> Result<Json<PaymentTotalResponse>, ApiError> {
    let total_cents = state.db.payments().total_paid_all().await?;
    Ok(Json(PaymentTotalResponse { total_cents }))
}

/// `GET /products/{id}/payments/total` - payments attributed to a product.
///
/// A payment counts once per order containing the product, regardless of
/// how many of the order's lines reference it.
#[tracing::instrument(skip(state))]
pub async fn product_total(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentTotalResponse>, ApiError> {
    let total_cents = state.db.payments().total_for_product(&id).await?;
    Ok(Json(PaymentTotalResponse { total_cents }))
}

/// `GET /services/{id}/payments/total` - payments attributed to a service.
#[tracing::instrument(skip(state))]
pub async fn service_total(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentTotalResponse>, ApiError> {
    let total_cents = state.db.payments().total_for_service(&id).await?;
    Ok(Json(PaymentTotalResponse { total_cents }))
}
