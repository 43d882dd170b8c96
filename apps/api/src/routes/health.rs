//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// `GET /health` - liveness plus a database ping.
///
/// Always returns 200; a broken database shows up as `"database": "down"`
/// so orchestrators can distinguish "process up" from "storage up".
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = if state.db.health_check().await {
        "up"
    } else {
        "down"
    };

    Json(HealthResponse {
        status: "ok",
        database,
    })
}
