use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ticket Workflow API",
        version = "1.0.0",
        description = r#"
# Ticket Workflow API

Lifecycle management for work tickets.

## States

`CREADO` -> `ACTIVO` (accept) -> `EN_REVISION` (100% milestone or reassignment request)
-> `COMPLETADO` (approve), back to `ACTIVO` (reject) or `CREADO` (reassign).
`ACTIVO` <-> `EN_PAUSA` through pause and resume. `CANCELADO` is reached through the
administrative estado override.

## Error Handling

Failures use a consistent body:

```json
{
  "error": "Bad Request",
  "message": "Missing required KPIs: calls",
  "details": { "missing_kpis": ["calls"], "required_kpis": ["calls"] },
  "request_id": "0b6c8f0e-6c43-4b8e-9a63-3c1f1d0f4a11",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

Every response carries an `x-request-id` header.
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "tickets", description = "Ticket lifecycle endpoints"),
        (name = "analytics", description = "Per-procedure reporting"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::tickets::create_ticket,
        crate::handlers::tickets::list_tickets,
        crate::handlers::tickets::get_ticket,
        crate::handlers::tickets::accept_ticket,
        crate::handlers::tickets::update_milestone,
        crate::handlers::tickets::set_estado,
        crate::handlers::tickets::request_reassignment,
        crate::handlers::tickets::review_ticket,
        crate::handlers::tickets::submit_kpis,
        crate::handlers::tickets::pause_ticket,
        crate::handlers::tickets::resume_ticket,
        crate::handlers::analytics::procedure_analytics,
        crate::health::health_check,
        crate::health::api_status,
    ),
    components(
        schemas(
            crate::models::TicketEstado,
            crate::models::KpiSummary,
            crate::models::PauseRecord,
            crate::models::ResumeMetrics,
            crate::models::ProcedureStats,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url(OPENAPI_JSON_PATH, ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from(OPENAPI_JSON_PATH).try_it_out_enabled(true))
}
