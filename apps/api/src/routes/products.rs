//! Product and variant catalog endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::{ProductWithVariants, Variant};
use tally_db::repository::product::{NewProduct, NewVariant, ProductUpdate, VariantUpdate};

use super::{AppState, PageParams};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantRequest>,
}

#[derive(Deserialize)]
pub struct VariantRequest {
    #[serde(default)]
    pub size: Option<String>,
    pub quantity: i64,
    pub selling_price_cents: i64,
    pub item_cost_cents: i64,
}

/// Full-replacement body for `PUT /products/{id}`. Omitted optional
/// fields are cleared, not kept.
#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub variants: Vec<VariantResponse>,
}

#[derive(Serialize)]
pub struct VariantResponse {
    pub id: String,
    pub product_id: String,
    pub size: Option<String>,
    pub quantity: i64,
    pub selling_price_cents: i64,
    pub item_cost_cents: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct VariantCountResponse {
    pub count: i64,
}

impl From<Variant> for VariantResponse {
    fn from(variant: Variant) -> Self {
        VariantResponse {
            id: variant.id,
            product_id: variant.product_id,
            size: variant.size,
            quantity: variant.quantity,
            selling_price_cents: variant.selling_price_cents,
            item_cost_cents: variant.item_cost_cents,
            updated_at: variant.updated_at,
        }
    }
}

impl From<ProductWithVariants> for ProductResponse {
    fn from(full: ProductWithVariants) -> Self {
        ProductResponse {
            id: full.product.id,
            name: full.product.name,
            description: full.product.description,
            color: full.product.color,
            image_url: full.product.image_url,
            created_at: full.product.created_at,
            variants: full.variants.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<CreateProductRequest> for NewProduct {
    fn from(req: CreateProductRequest) -> Self {
        NewProduct {
            name: req.name,
            description: req.description,
            color: req.color,
            image_url: req.image_url,
            variants: req.variants.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<VariantRequest> for NewVariant {
    fn from(req: VariantRequest) -> Self {
        NewVariant {
            size: req.size,
            quantity: req.quantity,
            selling_price_cents: req.selling_price_cents,
            item_cost_cents: req.item_cost_cents,
        }
    }
}

// -- Handlers --

/// `POST /products` - create a product with its initial variants.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state.db.products().create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// `GET /products?skip=&limit=` - list products with their variants.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let (skip, limit) = params.bounds();
    let products = state.db.products().list(skip, limit).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// `GET /products/search?q=` - search by name or color substring.
#[tracing::instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.db.products().search(&params.q).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// `GET /products/count` - total number of variants across the catalog.
#[tracing::instrument(skip(state))]
pub async fn count(
    State(state): State<AppState>,
) -> Result<Json<VariantCountResponse>, ApiError> {
    let count = state.db.products().count_variants().await?;
    Ok(Json(VariantCountResponse { count }))
}

/// `GET /products/{id}` - load a product with its variants.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .db
        .products()
        .get_with_variants(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product not found: {id}")))?;
    Ok(Json(product.into()))
}

/// `PUT /products/{id}` - replace a product's descriptive fields.
#[tracing::instrument(skip(state, req))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let input = ProductUpdate {
        name: req.name,
        description: req.description,
        color: req.color,
        image_url: req.image_url,
    };
    let product = state.db.products().update(&id, input).await?;
    let variants = state.db.products().variants_by_product(&product.id).await?;
    Ok(Json(ProductWithVariants { product, variants }.into()))
}

/// `DELETE /products/{id}` - delete a product and its variants.
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.db.products().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /products/{id}/variants` - add a variant to a product.
#[tracing::instrument(skip(state, req))]
pub async fn add_variant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<VariantRequest>,
) -> Result<(StatusCode, Json<VariantResponse>), ApiError> {
    let variant = state.db.products().add_variant(&id, req.into()).await?;
    Ok((StatusCode::CREATED, Json(variant.into())))
}

/// `GET /products/{id}/variants` - list a product's variants.
#[tracing::instrument(skip(state))]
pub async fn list_variants(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<VariantResponse>>, ApiError> {
    let variants = state.db.products().variants_by_product(&id).await?;
    Ok(Json(variants.into_iter().map(Into::into).collect()))
}

/// `PUT /products/{id}/variants/{vid}` - replace a variant.
///
/// `quantity` is an absolute restock; order placement is the only path
/// that decrements stock.
#[tracing::instrument(skip(state, req))]
pub async fn update_variant(
    State(state): State<AppState>,
    Path((id, vid)): Path<(String, String)>,
    Json(req): Json<VariantRequest>,
) -> Result<Json<VariantResponse>, ApiError> {
    let input = VariantUpdate {
        size: req.size,
        quantity: req.quantity,
        selling_price_cents: req.selling_price_cents,
        item_cost_cents: req.item_cost_cents,
    };
    let variant = state.db.products().update_variant(&id, &vid, input).await?;
    Ok(Json(variant.into()))
}

/// `DELETE /products/{id}/variants/{vid}` - delete a variant.
#[tracing::instrument(skip(state))]
pub async fn remove_variant(
    State(state): State<AppState>,
    Path((id, vid)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.db.products().delete_variant(&id, &vid).await?;
    Ok(StatusCode::NO_CONTENT)
}
