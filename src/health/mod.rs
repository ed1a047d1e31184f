/*!
 * # Health Check Module
 *
 * - Basic health check (`/health`) - store reachability
 * - Status (`/api/v1/status`) - version and environment
 */

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::AppState;

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Marks process start; uptime is measured from the first call.
pub fn mark_started() {
    STARTED_AT.get_or_init(Instant::now);
}

fn uptime_seconds() -> u64 {
    STARTED_AT.get().map_or(0, |start| start.elapsed().as_secs())
}

/// Basic health status
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthInfo {
    pub status: HealthStatus,
    /// `database` or `in-memory`
    pub storage: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct StatusInfo {
    pub status: String,
    pub service: String,
    pub version: String,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service and store are reachable", body = HealthInfo),
        (status = 503, description = "Store is unreachable", body = HealthInfo)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthInfo>) {
    debug!("Health check endpoint called");

    let (status, storage) = match state.db.as_ref() {
        Some(db) => match db.ping().await {
            Ok(()) => (HealthStatus::Up, "database"),
            Err(e) => {
                error!(error = %e, "Database health check failed");
                (HealthStatus::Down, "database")
            }
        },
        None => (HealthStatus::Up, "in-memory"),
    };

    let code = match status {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(HealthInfo {
            status,
            storage: storage.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime_seconds(),
            timestamp: Utc::now(),
        }),
    )
}

/// Service status endpoint
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "health",
    responses(
        (status = 200, description = "Service status", body = StatusInfo)
    )
)]
pub async fn api_status(State(state): State<AppState>) -> Json<StatusInfo> {
    Json(StatusInfo {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        timestamp: Utc::now(),
    })
}

/// `/health` at the root; mount `status_routes` under `/api/v1`.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

pub fn status_routes() -> Router<AppState> {
    Router::new().route("/status", get(api_status))
}
