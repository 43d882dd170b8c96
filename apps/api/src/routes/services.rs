//! Service catalog endpoints.
//!
//! Services are priced like variants but carry no stock, so there is no
//! quantity anywhere on this surface.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::Service;
use tally_db::repository::service::NewService;

use super::{AppState, PageParams};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    #[serde(default)]
    pub size: Option<String>,
    pub price_cents: i64,
    #[serde(default)]
    pub image_url: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ServiceResponse {
    pub id: String,
    pub name: String,
    pub size: Option<String>,
    pub price_cents: i64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Service> for ServiceResponse {
    fn from(service: Service) -> Self {
        ServiceResponse {
            id: service.id,
            name: service.name,
            size: service.size,
            price_cents: service.price_cents,
            image_url: service.image_url,
            created_at: service.created_at,
        }
    }
}

// -- Handlers --

/// `POST /services` - create a service.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<ServiceResponse>), ApiError> {
    let input = NewService {
        name: req.name,
        size: req.size,
        price_cents: req.price_cents,
        image_url: req.image_url,
    };
    let service = state.db.services().create(input).await?;
    Ok((StatusCode::CREATED, Json(service.into())))
}

/// `GET /services?skip=&limit=` - list services.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<ServiceResponse>>, ApiError> {
    let (skip, limit) = params.bounds();
    let services = state.db.services().list(skip, limit).await?;
    Ok(Json(services.into_iter().map(Into::into).collect()))
}

/// `GET /services/{id}` - load a service.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ServiceResponse>, ApiError> {
    let service = state
        .db
        .services()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Service not found: {id}")))?;
    Ok(Json(service.into()))
}

/// `DELETE /services/{id}` - delete a service.
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.services().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
