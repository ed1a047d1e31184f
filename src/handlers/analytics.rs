use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    errors::{ErrorResponse, ServiceError},
    models::{AnalyticsWindow, ProcedureInfo, ProcedurePerformance, TimeBucket, TopPerformer},
    ApiResult, AppState,
};

/// Analytics routes, relative to `/api/analytics` and `/api/v1/analytics`.
pub fn analytics_routes() -> Router<AppState> {
    Router::new().route("/procedure/:codigo", get(procedure_analytics))
}

/// Creation-date window. Accepts RFC 3339 timestamps or `YYYY-MM-DD`; a
/// bare `date_to` covers that whole day.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnalyticsWindowQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DateRange {
    /// Echo of `date_from`, or `all`
    pub from: String,
    /// Echo of `date_to`, or `all`
    pub to: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcedureAnalyticsResponse {
    pub procedure: ProcedureInfo,
    pub date_range: DateRange,
    pub performance: ProcedurePerformance,
    pub top_performers: Vec<TopPerformer>,
    pub time_distribution: Vec<TimeBucket>,
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn parse_bound(field: &str, raw: &str, bound: Bound) -> Result<DateTime<Utc>, ServiceError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let invalid = || {
        ServiceError::InvalidArgument(format!(
            "{} must be an RFC 3339 timestamp or YYYY-MM-DD",
            field
        ))
    };
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())?;
    let at = match bound {
        Bound::Start => day.and_hms_opt(0, 0, 0),
        Bound::End => day.and_hms_nano_opt(23, 59, 59, 999_999_999),
    };
    at.map(|naive| naive.and_utc()).ok_or_else(invalid)
}

impl AnalyticsWindowQuery {
    fn window(&self) -> Result<AnalyticsWindow, ServiceError> {
        let date_from = self
            .date_from
            .as_deref()
            .map(|raw| parse_bound("date_from", raw, Bound::Start))
            .transpose()?;
        let date_to = self
            .date_to
            .as_deref()
            .map(|raw| parse_bound("date_to", raw, Bound::End))
            .transpose()?;
        Ok(AnalyticsWindow { date_from, date_to })
    }

    fn date_range(self) -> DateRange {
        DateRange {
            from: self.date_from.unwrap_or_else(|| "all".to_string()),
            to: self.date_to.unwrap_or_else(|| "all".to_string()),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics/procedure/{codigo}",
    summary = "Procedure performance",
    description = "Completion, efficiency, pause and KPI figures for the tickets of one procedure",
    params(("codigo" = String, Path, description = "Procedure code"), AnalyticsWindowQuery),
    responses(
        (status = 200, description = "Aggregated figures", body = ProcedureAnalyticsResponse),
        (status = 400, description = "Unparseable date window", body = ErrorResponse),
        (status = 404, description = "Procedure not found", body = ErrorResponse)
    ),
    tag = "analytics"
)]
pub async fn procedure_analytics(
    State(state): State<AppState>,
    Path(codigo): Path<String>,
    Query(query): Query<AnalyticsWindowQuery>,
) -> ApiResult<ProcedureAnalyticsResponse> {
    let window = query.window()?;
    let (procedure, stats) = state
        .analytics
        .procedure_performance(&codigo, window)
        .await?;

    Ok(Json(ProcedureAnalyticsResponse {
        procedure,
        date_range: query.date_range(),
        performance: stats.performance,
        top_performers: stats.top_performers,
        time_distribution: stats.time_distribution,
    }))
}
