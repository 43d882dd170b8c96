//! HTTP API server for the Tally inventory and order system.
//!
//! Provides REST endpoints over the catalog (products, variants,
//! services), order placement, payment recording and the reconciliation
//! ledgers, with structured logging (tracing) and permissive CORS for
//! local POS clients.

pub mod config;
pub mod error;
pub mod routes;

use axum::Router;
use axum::routing::{delete, get, post, put};
use tally_db::Database;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(db: Database) -> Router {
    let state = AppState { db };

    Router::new()
        .route("/health", get(routes::health::check))
        // Catalog: products and variants
        .route("/products", post(routes::products::create))
        .route("/products", get(routes::products::list))
        .route("/products/search", get(routes::products::search))
        .route("/products/count", get(routes::products::count))
        .route("/products/{id}", get(routes::products::get))
        .route("/products/{id}", put(routes::products::update))
        .route("/products/{id}", delete(routes::products::remove))
        .route("/products/{id}/variants", post(routes::products::add_variant))
        .route("/products/{id}/variants", get(routes::products::list_variants))
        .route(
            "/products/{id}/variants/{vid}",
            put(routes::products::update_variant),
        )
        .route(
            "/products/{id}/variants/{vid}",
            delete(routes::products::remove_variant),
        )
        // Catalog: services
        .route("/services", post(routes::services::create))
        .route("/services", get(routes::services::list))
        .route("/services/{id}", get(routes::services::get))
        .route("/services/{id}", delete(routes::services::remove))
        // Orders
        .route("/orders", post(routes::orders::create))
        .route("/orders", get(routes::orders::list))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}", delete(routes::orders::remove))
        // Payments
        .route("/orders/{id}/payments", post(routes::payments::create))
        .route("/orders/{id}/payments", get(routes::payments::list_for_order))
        .route("/payments", get(routes::payments::list))
        .route("/payments/total", get(routes::payments::total))
        .route(
            "/products/{id}/payments/total",
            get(routes::payments::product_total),
        )
        .route(
            "/services/{id}/payments/total",
            get(routes::payments::service_total),
        )
        // Reconciliation ledgers
        .route("/sales-records", post(routes::ledger::create_sales_record))
        .route("/sales-records", get(routes::ledger::list_sales_records))
        .route("/sales-records/summary", get(routes::ledger::daily_summary))
        .route("/cashouts", post(routes::ledger::create_cashout))
        .route("/cashouts", get(routes::ledger::list_cashouts))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
