#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use ticketflow_api::{
    build_router,
    config::AppConfig,
    db::{self, DbConfig},
    entities::procedimiento,
    models::KpiSchema,
    repositories::{InMemoryProcedureCatalog, InMemoryTicketStore},
    AppState,
};
use tower::ServiceExt;

pub const PROCEDURE: &str = "PROC-CALLS";
pub const DIRECTOR: &str = "DIR-1";

/// KPI definitions of the seeded procedure.
pub fn procedure_kpis() -> Value {
    json!({"calls": {"meta": 10, "tipo": "resultado"}})
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.cors_allow_any_origin = true;
    cfg.list_default_limit = 2;
    cfg.list_max_limit = 3;
    cfg
}

/// Router plus state for one test.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Option<InMemoryTicketStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub request_id: Option<String>,
    pub body: Value,
}

impl TestApp {
    /// Application over the in-memory stores with one procedure seeded.
    pub fn new() -> Self {
        let store = InMemoryTicketStore::new();
        let catalog = InMemoryProcedureCatalog::new()
            .with_procedure(PROCEDURE, KpiSchema::from_json(Some(&procedure_kpis())));
        let state = AppState::in_memory(test_config(), store.clone(), catalog);
        Self {
            router: build_router(state.clone()),
            state,
            store: Some(store),
        }
    }

    /// Application over a migrated in-memory SQLite database.
    pub async fn with_database() -> Self {
        let cfg = test_config();
        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            idle_timeout: Duration::from_secs(3600),
            ..Default::default()
        })
        .await
        .expect("sqlite connection");
        db::run_migrations(&pool).await.expect("migrations");

        procedimiento::ActiveModel {
            codigo: Set(PROCEDURE.to_string()),
            nombre: Set("Call campaign".to_string()),
            descripcion: Set(None),
            kpis: Set(Some(procedure_kpis())),
            activo: Set(true),
        }
        .insert(&pool)
        .await
        .expect("seed procedure");

        let state = AppState::with_database(cfg, Arc::new(pool));
        Self {
            router: build_router(state.clone()),
            state,
            store: None,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        self.send(builder.body(body).expect("failed to build request"))
            .await
    }

    /// Sends `raw` verbatim as a JSON body, for bodies that do not parse.
    pub async fn request_raw(&self, method: Method, uri: &str, raw: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(raw.to_string()))
            .expect("failed to build request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request");

        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            request_id,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, Some(body)).await
    }

    /// Creates a ticket with 50% and 100% milestones, assigned by [`DIRECTOR`].
    pub async fn create_ticket(&self, id: &str) -> TestResponse {
        let response = self
            .post(
                "/api/v1/tickets",
                json!({
                    "id": id,
                    "codigo_actividad": "ACT-1",
                    "titulo": "Quarterly calls",
                    "tiempo_estimado": 8.0,
                    "codigo_procedimiento": PROCEDURE,
                    "asignado_por": DIRECTOR,
                    "hitos": [{"porcentaje": 50}, {"porcentaje": 100}],
                    "recursos": {"sala": "B2"},
                    "metadatos": {"origen": "import"}
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response
    }

    /// Creates and accepts a ticket for `empleado`.
    pub async fn active_ticket(&self, id: &str, empleado: &str) {
        self.create_ticket(id).await;
        let response = self
            .patch(
                &format!("/api/v1/tickets/{id}/accept"),
                json!({"empleado_id": empleado}),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    }
}
