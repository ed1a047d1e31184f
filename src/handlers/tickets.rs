use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::common::{missing, present, validate_input, AppJson};
use crate::{
    errors::{ErrorResponse, ServiceError},
    models::{
        Hito, KpiSummary, Kpis, Metadatos, NewTicket, PauseRecord, ReviewDecision, Ticket,
        TicketEstado,
    },
    repositories::TicketFilter,
    ApiResult, AppState,
};

// Request DTOs: required fields are optional here so that an absent field
// becomes a 400 with a precise message instead of a body rejection.

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTicketRequest {
    #[validate(length(max = 64))]
    pub id: Option<String>,
    pub codigo_actividad: Option<String>,
    pub titulo: Option<String>,
    /// Estimated effort in hours
    #[validate(range(min = 0.0))]
    pub tiempo_estimado: Option<f64>,
    pub codigo_linea_trabajo: Option<String>,
    pub codigo_procedimiento: Option<String>,
    pub descripcion: Option<String>,
    pub asignado_a: Option<String>,
    pub asignado_por: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub flujo: Option<Value>,
    /// `[{"porcentaje": 50}, {"porcentaje": 100}]`
    #[schema(value_type = Option<Vec<Object>>)]
    pub hitos: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub kpis: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub recursos: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub metadatos: Option<Value>,
    #[schema(value_type = Option<Object>)]
    pub triggers: Option<Value>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTicketsQuery {
    /// Filter by lifecycle state, e.g. `ACTIVO`
    pub estado: Option<String>,
    pub asignado_a: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AcceptTicketRequest {
    pub empleado_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateMilestoneRequest {
    #[validate(range(min = 0, max = 100))]
    pub porcentaje: Option<i32>,
    pub completado: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetEstadoRequest {
    #[schema(example = "CANCELADO")]
    pub estado: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequestReassignmentRequest {
    pub empleado_id: Option<String>,
    #[validate(length(max = 2000))]
    pub razon: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReviewTicketRequest {
    pub revisor_id: Option<String>,
    /// `aprobar`, `rechazar` or `reasignar`
    pub accion: Option<String>,
    #[validate(length(max = 4000))]
    pub feedback: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub hito_porcentaje: Option<i32>,
    /// Required when `accion` is `reasignar`
    pub nuevo_asignado: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitKpisRequest {
    /// `{"calls": {"valor": 12}}`
    #[schema(value_type = Option<Object>)]
    pub kpis_especificos: Option<Value>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PauseTicketRequest {
    pub solicitante_id: Option<String>,
    #[validate(length(max = 2000))]
    pub razon: Option<String>,
    pub aprobador_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResumeTicketRequest {
    pub reanudado_por: Option<String>,
}

// Response payloads

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketMessageResponse {
    pub ticket: Ticket,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct KpiSubmissionResponse {
    pub ticket: Ticket,
    pub kpi_summary: KpiSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PauseResponse {
    pub ticket: Ticket,
    pub message: String,
    pub pause_info: PauseRecord,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResumeResponse {
    pub ticket: Ticket,
    pub message: String,
    pub pause_duration_hours: i64,
    pub total_pause_time_hours: i64,
    pub deadline_extended: bool,
}

/// Ticket routes, relative to the mount point (`/api/tickets`, `/api/v1/tickets`).
pub fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tickets).post(create_ticket))
        .route("/:id", get(get_ticket))
        .route("/:id/accept", patch(accept_ticket))
        .route("/:id/hito", patch(update_milestone))
        .route("/:id/estado", patch(set_estado))
        .route("/:id/request-reassignment", patch(request_reassignment))
        .route("/:id/review", post(review_ticket))
        .route("/:id/kpis", post(submit_kpis))
        .route("/:id/pause", patch(pause_ticket))
        .route("/:id/resume", patch(resume_ticket))
}

fn sub_document<T: serde::de::DeserializeOwned + Default>(
    field: &str,
    value: Option<Value>,
) -> Result<T, ServiceError> {
    match value {
        None => Ok(T::default()),
        Some(v) => serde_json::from_value(v)
            .map_err(|e| ServiceError::InvalidArgument(format!("Invalid {}: {}", field, e))),
    }
}

/// Milestones must be addressable by the 0..=100 range the update route accepts.
fn check_hitos(hitos: &[Hito]) -> Result<(), ServiceError> {
    match hitos.iter().find(|h| !(0..=100).contains(&h.porcentaje)) {
        Some(h) => Err(ServiceError::InvalidArgument(format!(
            "Invalid hitos: porcentaje {} is outside 0..=100",
            h.porcentaje
        ))),
        None => Ok(()),
    }
}

fn parse_estado(raw: Option<&str>) -> Result<TicketEstado, ServiceError> {
    raw.and_then(|s| TicketEstado::from_str(s).ok())
        .ok_or_else(|| ServiceError::InvalidState("Invalid estado".to_string()))
}

#[utoipa::path(
    post,
    path = "/api/v1/tickets",
    summary = "Create ticket",
    request_body = CreateTicketRequest,
    responses(
        (status = 201, description = "Ticket created in CREADO", body = Ticket,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 409, description = "Ticket id already exists", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn create_ticket(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), ServiceError> {
    validate_input(&payload)?;
    let required = "Missing required fields: id, codigo_actividad, titulo, tiempo_estimado";
    let (Some(id), Some(codigo_actividad), Some(titulo), Some(tiempo_estimado)) = (
        present(&payload.id),
        present(&payload.codigo_actividad),
        present(&payload.titulo),
        payload.tiempo_estimado.filter(|hours| *hours > 0.0),
    ) else {
        return Err(missing(required));
    };
    let hitos = sub_document::<Vec<Hito>>("hitos", payload.hitos)?;
    check_hitos(&hitos)?;

    let draft = NewTicket {
        id: id.to_string(),
        codigo_actividad: codigo_actividad.to_string(),
        titulo: titulo.to_string(),
        tiempo_estimado,
        codigo_linea_trabajo: payload.codigo_linea_trabajo,
        codigo_procedimiento: payload.codigo_procedimiento,
        descripcion: payload.descripcion,
        asignado_a: payload.asignado_a,
        asignado_por: payload.asignado_por,
        flujo: payload.flujo,
        hitos,
        kpis: sub_document::<Kpis>("kpis", payload.kpis)?,
        recursos: payload.recursos,
        metadatos: sub_document::<Metadatos>("metadatos", payload.metadatos)?,
        triggers: payload.triggers,
    };

    let ticket = state.tickets.create_ticket(draft).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

#[utoipa::path(
    get,
    path = "/api/v1/tickets",
    summary = "List tickets",
    description = "Newest first; `limit` is capped by configuration",
    params(ListTicketsQuery),
    responses(
        (status = 200, description = "Tickets", body = Vec<Ticket>),
        (status = 400, description = "Unknown estado filter", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(query): Query<ListTicketsQuery>,
) -> ApiResult<Vec<Ticket>> {
    let estado = query
        .estado
        .as_deref()
        .map(|raw| parse_estado(Some(raw)))
        .transpose()?;
    let filter = TicketFilter {
        estado,
        asignado_a: query.asignado_a,
        limit: state.config.effective_limit(query.limit),
        offset: query.offset.unwrap_or(0),
    };

    let tickets = state.tickets.list_tickets(filter).await?;
    Ok(Json(tickets))
}

#[utoipa::path(
    get,
    path = "/api/v1/tickets/{id}",
    summary = "Get ticket",
    params(("id" = String, Path, description = "Ticket id")),
    responses(
        (status = 200, description = "Ticket", body = Ticket),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn get_ticket(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Ticket> {
    let ticket = state.tickets.get_ticket(&id).await?;
    Ok(Json(ticket))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tickets/{id}/accept",
    summary = "Accept ticket",
    description = "CREADO -> ACTIVO. Only one concurrent accept can win.",
    params(("id" = String, Path, description = "Ticket id")),
    request_body = AcceptTicketRequest,
    responses(
        (status = 200, description = "Ticket accepted", body = Ticket),
        (status = 400, description = "empleado_id missing", body = ErrorResponse),
        (status = 404, description = "Ticket not found or already accepted", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn accept_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<AcceptTicketRequest>,
) -> ApiResult<Ticket> {
    validate_input(&payload)?;
    let empleado_id =
        present(&payload.empleado_id).ok_or_else(|| missing("empleado_id is required"))?;

    let ticket = state.tickets.accept(&id, empleado_id).await?;
    Ok(Json(ticket))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tickets/{id}/hito",
    summary = "Update milestone",
    description = "Completing the 100% milestone moves the ticket to EN_REVISION",
    params(("id" = String, Path, description = "Ticket id")),
    request_body = UpdateMilestoneRequest,
    responses(
        (status = 200, description = "Milestone updated", body = Ticket),
        (status = 400, description = "Ticket not ACTIVO or fields missing", body = ErrorResponse),
        (status = 404, description = "Ticket or milestone not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn update_milestone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateMilestoneRequest>,
) -> ApiResult<Ticket> {
    let (Some(porcentaje), Some(completado)) = (payload.porcentaje, payload.completado) else {
        return Err(missing("porcentaje and completado are required"));
    };
    validate_input(&payload)?;

    let ticket = state
        .tickets
        .update_milestone(&id, porcentaje, completado)
        .await?;
    Ok(Json(ticket))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tickets/{id}/estado",
    summary = "Set estado",
    description = "Administrative override of the lifecycle state",
    params(("id" = String, Path, description = "Ticket id")),
    request_body = SetEstadoRequest,
    responses(
        (status = 200, description = "Estado set", body = Ticket),
        (status = 400, description = "Invalid estado", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn set_estado(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<SetEstadoRequest>,
) -> ApiResult<Ticket> {
    let estado = parse_estado(payload.estado.as_deref())?;
    let ticket = state.tickets.set_estado(&id, estado).await?;
    Ok(Json(ticket))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tickets/{id}/request-reassignment",
    summary = "Request reassignment",
    params(("id" = String, Path, description = "Ticket id")),
    request_body = RequestReassignmentRequest,
    responses(
        (status = 200, description = "Reassignment requested", body = TicketMessageResponse),
        (status = 400, description = "Ticket not ACTIVO or fields missing", body = ErrorResponse),
        (status = 403, description = "Caller is not the assignee", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn request_reassignment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<RequestReassignmentRequest>,
) -> ApiResult<TicketMessageResponse> {
    validate_input(&payload)?;
    let (Some(empleado_id), Some(razon)) = (present(&payload.empleado_id), present(&payload.razon))
    else {
        return Err(missing("Missing required fields: empleado_id, razon"));
    };

    let ticket = state
        .tickets
        .request_reassignment(&id, empleado_id, razon)
        .await?;
    Ok(Json(TicketMessageResponse {
        ticket,
        message: "Reassignment requested. Waiting for director approval.".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/tickets/{id}/review",
    summary = "Review ticket",
    description = "Approve, reject or reassign a ticket in EN_REVISION",
    params(("id" = String, Path, description = "Ticket id")),
    request_body = ReviewTicketRequest,
    responses(
        (status = 200, description = "Review recorded", body = TicketMessageResponse),
        (status = 400, description = "Invalid accion, missing fields or wrong state", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn review_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<ReviewTicketRequest>,
) -> ApiResult<TicketMessageResponse> {
    validate_input(&payload)?;
    let (Some(revisor_id), Some(accion), Some(feedback)) = (
        present(&payload.revisor_id),
        present(&payload.accion),
        present(&payload.feedback),
    ) else {
        return Err(missing("Missing required fields: revisor_id, accion, feedback"));
    };
    let decision = ReviewDecision::parse(accion, payload.nuevo_asignado.clone())?;

    let ticket = state
        .tickets
        .review(&id, revisor_id, &decision, feedback, payload.hito_porcentaje)
        .await?;
    Ok(Json(TicketMessageResponse {
        ticket,
        message: decision.success_message().to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/tickets/{id}/kpis",
    summary = "Submit KPIs",
    description = "Every KPI declared by the ticket's procedure must be present",
    params(("id" = String, Path, description = "Ticket id")),
    request_body = SubmitKpisRequest,
    responses(
        (status = 200, description = "KPIs stored and scored", body = KpiSubmissionResponse),
        (status = 400, description = "Missing KPIs", body = ErrorResponse),
        (status = 404, description = "Ticket or procedure not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn submit_kpis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<SubmitKpisRequest>,
) -> ApiResult<KpiSubmissionResponse> {
    let Some(Value::Object(especificos)) = payload.kpis_especificos else {
        return Err(missing("kpis_especificos object is required"));
    };

    let (ticket, kpi_summary) = state.tickets.submit_kpis(&id, especificos).await?;
    Ok(Json(KpiSubmissionResponse {
        ticket,
        kpi_summary,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tickets/{id}/pause",
    summary = "Pause ticket",
    description = "Anyone but the assigning director must name an approver",
    params(("id" = String, Path, description = "Ticket id")),
    request_body = PauseTicketRequest,
    responses(
        (status = 200, description = "Ticket paused", body = PauseResponse),
        (status = 400, description = "Approval required, wrong state or fields missing", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn pause_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<PauseTicketRequest>,
) -> ApiResult<PauseResponse> {
    validate_input(&payload)?;
    let (Some(solicitante_id), Some(razon)) =
        (present(&payload.solicitante_id), present(&payload.razon))
    else {
        return Err(missing("Missing required fields: solicitante_id, razon"));
    };

    let (ticket, pause_info) = state
        .tickets
        .pause(&id, solicitante_id, razon, payload.aprobador_id.as_deref())
        .await?;
    Ok(Json(PauseResponse {
        ticket,
        message: "Ticket paused successfully".to_string(),
        pause_info,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tickets/{id}/resume",
    summary = "Resume ticket",
    params(("id" = String, Path, description = "Ticket id")),
    request_body = ResumeTicketRequest,
    responses(
        (status = 200, description = "Ticket resumed", body = ResumeResponse),
        (status = 400, description = "Ticket not paused or fields missing", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    tag = "tickets"
)]
pub async fn resume_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<ResumeTicketRequest>,
) -> ApiResult<ResumeResponse> {
    let reanudado_por =
        present(&payload.reanudado_por).ok_or_else(|| missing("reanudado_por is required"))?;

    let (ticket, metrics) = state.tickets.resume(&id, reanudado_por).await?;
    Ok(Json(ResumeResponse {
        ticket,
        message: "Ticket resumed successfully".to_string(),
        pause_duration_hours: metrics.pause_duration_hours,
        total_pause_time_hours: metrics.total_pause_time_hours,
        deadline_extended: metrics.deadline_extended,
    }))
}
