use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "message": "Missing required KPIs: calls",
    "details": { "missing_kpis": ["calls"], "required_kpis": ["calls"] },
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    #[schema(example = "Not Found")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "Not found: Ticket TCK-001 not found")]
    pub message: String,
    /// Structured context for caller-correctable failures
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "req-abc123xyz")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when error occurred
    #[schema(example = "2024-12-09T10:30:00.000Z")]
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ticket {0} not found or already accepted")]
    NotFoundOrAlreadyAccepted(String),

    #[error("Hito {porcentaje}% not found")]
    MilestoneNotFound { ticket_id: String, porcentaje: i32 },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cross-directoral pause requires aprobador_id")]
    ApprovalRequired { original_director: Option<String> },

    #[error("Missing required KPIs: {}", .missing.join(", "))]
    MissingKpis {
        missing: Vec<String>,
        required: Vec<String>,
    },

    #[error("No pause metadata found")]
    NoPauseRecord,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::InvalidArgument(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_)
            | Self::NotFoundOrAlreadyAccepted(_)
            | Self::MilestoneNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidState(_)
            | Self::InvalidArgument(_)
            | Self::ValidationError(_)
            | Self::ApprovalRequired { .. }
            | Self::MissingKpis { .. }
            | Self::NoPauseRecord => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::DatabaseError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::SerializationError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Structured context attached to the error body.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::MissingKpis { missing, required } => Some(json!({
                "missing_kpis": missing,
                "required_kpis": required,
            })),
            Self::ApprovalRequired { original_director } => Some(json!({
                "requires_approval": true,
                "original_director": original_director,
            })),
            Self::MilestoneNotFound {
                ticket_id,
                porcentaje,
            } => Some(json!({
                "ticket_id": ticket_id,
                "porcentaje": porcentaje,
            })),
            _ => None,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "persistence",
            Self::NotFound(_) => "not_found",
            Self::NotFoundOrAlreadyAccepted(_) => "not_found_or_already_accepted",
            Self::MilestoneNotFound { .. } => "milestone_not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::InvalidArgument(_) | Self::ValidationError(_) => "invalid_argument",
            Self::Forbidden(_) => "forbidden",
            Self::ApprovalRequired { .. } => "approval_required",
            Self::MissingKpis { .. } => "missing_kpis",
            Self::NoPauseRecord => "no_pause_record",
            Self::Conflict(_) => "conflict",
            Self::SerializationError(_) | Self::InternalError(_) | Self::Other(_) => "internal",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: self.details(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
