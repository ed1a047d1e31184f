//! Ticket workflow API
//!
//! Lifecycle state machine for work tickets: acceptance, milestone tracking,
//! director review, pause accounting and KPI compliance.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{http::HeaderValue, http::StatusCode, response::Json, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowMethods, CorsLayer},
};

use crate::repositories::{
    InMemoryProcedureCatalog, InMemoryTicketStore, ProcedureCatalog, ProcedureRepository,
    TicketRepository, TicketStore,
};
use crate::services::{AnalyticsService, TicketWorkflowService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub tickets: TicketWorkflowService,
    pub analytics: AnalyticsService,
    /// `None` when running on the in-memory backend
    pub db: Option<Arc<DatabaseConnection>>,
}

impl AppState {
    fn from_stores(
        config: config::AppConfig,
        store: Arc<dyn TicketStore>,
        catalog: Arc<dyn ProcedureCatalog>,
        db: Option<Arc<DatabaseConnection>>,
    ) -> Self {
        Self {
            config,
            tickets: TicketWorkflowService::new(store.clone(), catalog.clone()),
            analytics: AnalyticsService::new(store, catalog),
            db,
        }
    }

    /// Wires the services to the SeaORM repositories.
    pub fn with_database(config: config::AppConfig, db: Arc<DatabaseConnection>) -> Self {
        Self::from_stores(
            config,
            Arc::new(TicketRepository::new(db.clone())),
            Arc::new(ProcedureRepository::new(db.clone())),
            Some(db),
        )
    }

    /// Wires the services to process-local stores.
    pub fn in_memory(
        config: config::AppConfig,
        store: InMemoryTicketStore,
        catalog: InMemoryProcedureCatalog,
    ) -> Self {
        Self::from_stores(config, Arc::new(store), Arc::new(catalog), None)
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<T>, errors::ServiceError>;

/// Everything served under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(health::status_routes())
        .nest("/tickets", handlers::tickets::ticket_routes())
        .nest("/analytics", handlers::analytics::analytics_routes())
}

/// Full application router with the HTTP middleware stack applied.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(health::health_routes())
        .nest("/api/tickets", handlers::tickets::ticket_routes())
        .nest("/api/analytics", handlers::analytics::analytics_routes())
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .fallback(endpoint_not_found)
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn endpoint_not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}

/// CORS from configuration. Config validation already rejects a
/// non-development environment with neither origins nor an explicit opt-in.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(cfg.cors_allow_credentials)
    } else if cfg.should_allow_permissive_cors() {
        tracing::info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        tracing::error!("No usable CORS origin configured; cross-origin requests will be refused");
        CorsLayer::new()
    }
}

pub mod prelude {
    pub use crate::config::{AppConfig, StorageBackend};
    pub use crate::errors::{ErrorResponse, ServiceError};
    pub use crate::models::*;
    pub use crate::repositories::{ProcedureCatalog, TicketFilter, TicketStore};
use crate::services::{AnalyticsService, TicketWorkflowService};
    pub use crate::{build_router, AppState};
}
