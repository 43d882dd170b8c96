//! Order placement and query endpoints.
//!
//! `POST /orders` is the write path that matters: it runs the stock
//! decrement, price check and order insert in one database transaction.
//! A line references either a product (optionally a variant) or a
//! service; the three nullable ids collapse into a [`LineTarget`] here,
//! at the boundary, so the rest of the system never sees an ambiguous
//! line.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::{DraftLine, LineTarget, Order, OrderDetail, OrderDraft, OrderItem, PaymentStatus};

use super::payments::PaymentResponse;
use super::{AppState, PageParams};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub discount_cents: i64,
    /// Grand total the client computed and quoted to the customer.
    pub total_cents: i64,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub price_cents: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_status: PaymentStatus,
    pub items: Vec<OrderItemResponse>,
    pub payments: Vec<PaymentResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: Option<String>,
    pub service_id: Option<String>,
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub price_cents: i64,
}

/// List-view shape: the order row without items or payments.
#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_status: PaymentStatus,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        let product_id = item.target.product_id().map(str::to_string);
        let service_id = item.target.service_id().map(str::to_string);
        let variant_id = item.target.variant_id().map(str::to_string);
        OrderItemResponse {
            id: item.id,
            product_id,
            service_id,
            variant_id,
            quantity: item.quantity,
            price_cents: item.price_cents,
        }
    }
}

impl From<OrderDetail> for OrderResponse {
    fn from(detail: OrderDetail) -> Self {
        OrderResponse {
            id: detail.order.id,
            created_at: detail.order.created_at,
            discount_cents: detail.order.discount_cents,
            total_cents: detail.order.total_cents,
            payment_status: detail.order.payment_status,
            items: detail.items.into_iter().map(Into::into).collect(),
            payments: detail.payments.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Order> for OrderSummaryResponse {
    fn from(order: Order) -> Self {
        OrderSummaryResponse {
            id: order.id,
            created_at: order.created_at,
            discount_cents: order.discount_cents,
            total_cents: order.total_cents,
            payment_status: order.payment_status,
        }
    }
}

/// Decodes the wire shape (three nullable ids per line) into a draft.
fn to_draft(req: CreateOrderRequest) -> Result<OrderDraft, ApiError> {
    let mut lines = Vec::with_capacity(req.items.len());
    for (index, item) in req.items.into_iter().enumerate() {
        let target = LineTarget::from_parts(item.product_id, item.service_id, item.variant_id)
            .map_err(|reason| {
                ApiError::BadRequest(format!("Line item {index} is invalid: {reason}"))
            })?;
        lines.push(DraftLine {
            target,
            quantity: item.quantity,
            price_cents: item.price_cents,
        });
    }

    Ok(OrderDraft {
        lines,
        discount_cents: req.discount_cents,
        declared_total_cents: req.total_cents,
    })
}

// -- Handlers --

/// `POST /orders` - place an order.
///
/// Stock is decremented and the declared total is verified inside one
/// transaction; any failure leaves no trace.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let draft = to_draft(req)?;
    let detail = state.db.orders().place_order(draft).await?;
    Ok((StatusCode::CREATED, Json(detail.into())))
}

/// `GET /orders/{id}` - load an order with items and payments.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let detail = state
        .db
        .orders()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order not found: {id}")))?;
    Ok(Json(detail.into()))
}

/// `GET /orders?skip=&limit=` - list orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<OrderSummaryResponse>>, ApiError> {
    let (skip, limit) = params.bounds();
    let orders = state.db.orders().list(skip, limit).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// `DELETE /orders/{id}` - delete an order with its items and payments.
///
/// Stock is NOT restored; deletion is an administrative correction, not
/// a return flow.
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.orders().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
