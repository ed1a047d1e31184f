mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use common::{TestApp, DIRECTOR, PROCEDURE};
use serde_json::json;
use ticketflow_api::{
    errors::ServiceError,
    models::{AnalyticsWindow, Hito, NewTicket, Rendimiento, Ticket, TicketEstado},
    repositories::{ProcedureCatalog, ProcedureRepository, TicketFilter, TicketRepository, TicketStore},
};

fn ticket(id: &str) -> Ticket {
    Ticket::new(
        NewTicket {
            id: id.into(),
            codigo_actividad: "ACT".into(),
            titulo: "Stored".into(),
            tiempo_estimado: 3.5,
            codigo_procedimiento: Some(PROCEDURE.into()),
            asignado_por: Some(DIRECTOR.into()),
            hitos: vec![Hito::new(50), Hito::new(100)],
            triggers: Some(json!({"on_complete": "notify"})),
            ..Default::default()
        },
        Utc::now(),
    )
}

async fn repositories() -> (TicketRepository, ProcedureRepository) {
    let app = TestApp::with_database().await;
    let db = app.state.db.clone().expect("database-backed state");
    (
        TicketRepository::new(Arc::clone(&db)),
        ProcedureRepository::new(db),
    )
}

#[tokio::test]
async fn insert_get_and_duplicate() {
    let (repo, _) = repositories().await;
    let original = ticket("DB-1");

    let stored = repo.insert(&original).await.unwrap();
    assert_eq!(stored.id, "DB-1");
    assert_eq!(stored.estado, TicketEstado::Creado);
    assert_eq!(stored.triggers, original.triggers);
    assert_eq!(stored.hitos, original.hitos);

    assert_matches!(repo.insert(&original).await, Err(ServiceError::Conflict(_)));
    assert!(repo.get("DB-404").await.unwrap().is_none());
}

#[tokio::test]
async fn conditional_update_only_matches_expected_state() {
    let (repo, _) = repositories().await;
    let mut current = repo.insert(&ticket("DB-2")).await.unwrap();

    current.accept("EMP-1", Utc::now()).unwrap();
    let first = repo
        .conditional_update(&current, TicketEstado::Creado)
        .await
        .unwrap();
    assert_eq!(first.map(|t| t.estado), Some(TicketEstado::Activo));

    // The row is ACTIVO now, so a second guarded write matches nothing.
    let mut stale = ticket("DB-2");
    stale.accept("EMP-2", Utc::now()).unwrap();
    let second = repo
        .conditional_update(&stale, TicketEstado::Creado)
        .await
        .unwrap();
    assert!(second.is_none());

    let stored = repo.get("DB-2").await.unwrap().unwrap();
    assert_eq!(stored.asignado_a.as_deref(), Some("EMP-1"));
}

#[tokio::test]
async fn update_replaces_the_aggregate() {
    let (repo, _) = repositories().await;
    let mut current = repo.insert(&ticket("DB-3")).await.unwrap();
    let now = Utc::now();
    current.accept("EMP-1", now).unwrap();
    current.pause(DIRECTOR, "Budget", None, now).unwrap();

    let saved = repo.update(&current).await.unwrap().unwrap();
    assert_eq!(saved.estado, TicketEstado::EnPausa);
    assert_eq!(
        saved.metadatos.pausa_actual.as_ref().map(|p| p.razon.as_str()),
        Some("Budget")
    );

    assert!(repo.update(&ticket("DB-missing")).await.unwrap().is_none());
}

#[tokio::test]
async fn list_applies_filters_and_paging() {
    let (repo, _) = repositories().await;
    for id in ["DB-L1", "DB-L2", "DB-L3"] {
        repo.insert(&ticket(id)).await.unwrap();
    }
    let mut active = repo.get("DB-L2").await.unwrap().unwrap();
    active.accept("EMP-1", Utc::now()).unwrap();
    repo.update(&active).await.unwrap();

    let all = repo.list(&TicketFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);

    let filtered = repo
        .list(&TicketFilter {
            estado: Some(TicketEstado::Activo),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, "DB-L2");

    let page = repo
        .list(&TicketFilter {
            limit: 2,
            offset: 2,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn procedure_catalog_reads_kpi_definitions() {
    let (_, catalog) = repositories().await;

    let schema = catalog.kpi_schema(PROCEDURE).await.unwrap().unwrap();
    assert_eq!(schema.names(), vec!["calls".to_string()]);
    assert_eq!(schema.get("calls").and_then(|d| d.meta), Some(10.0));

    assert!(catalog.kpi_schema("PROC-404").await.unwrap().is_none());
}

#[tokio::test]
async fn full_workflow_over_sqlite() {
    let app = TestApp::with_database().await;

    let health = app.get("/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["storage"], "database");

    app.active_ticket("DB-FLOW", "EMP-1").await;

    let (first, second) = tokio::join!(
        app.patch("/api/v1/tickets/DB-FLOW/accept", json!({"empleado_id": "EMP-2"})),
        app.patch("/api/v1/tickets/DB-FLOW/accept", json!({"empleado_id": "EMP-3"})),
    );
    assert_eq!(first.status, StatusCode::NOT_FOUND);
    assert_eq!(second.status, StatusCode::NOT_FOUND);

    let kpis = app
        .post(
            "/api/v1/tickets/DB-FLOW/kpis",
            json!({"kpis_especificos": {"calls": {"valor": "11"}}}),
        )
        .await;
    assert_eq!(kpis.status, StatusCode::OK);
    assert_eq!(kpis.body["kpi_summary"]["compliance_rate"], "100.00%");

    app.patch(
        "/api/v1/tickets/DB-FLOW/hito",
        json!({"porcentaje": 100, "completado": true}),
    )
    .await;
    let reviewed = app
        .post(
            "/api/v1/tickets/DB-FLOW/review",
            json!({"revisor_id": DIRECTOR, "accion": "aprobar", "feedback": "ok"}),
        )
        .await;
    assert_eq!(reviewed.body["ticket"]["estado"], "COMPLETADO");

    let stored = app.get("/api/v1/tickets/DB-FLOW").await;
    assert_eq!(stored.body["estado"], "COMPLETADO");
    assert_eq!(stored.body["kpis"]["especificos"]["calls"]["valor"], "11");
    assert_eq!(stored.body["metadatos"]["origen"], "import");
}

#[tokio::test]
async fn concurrent_accepts_over_sqlite_have_one_winner() {
    let app = TestApp::with_database().await;
    app.create_ticket("DB-RACE").await;

    let (first, second) = tokio::join!(
        app.patch("/api/v1/tickets/DB-RACE/accept", json!({"empleado_id": "EMP-1"})),
        app.patch("/api/v1/tickets/DB-RACE/accept", json!({"empleado_id": "EMP-2"})),
    );
    let mut statuses = vec![first.status.as_u16(), second.status.as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![200, 404]);
}

#[tokio::test]
async fn procedure_stats_over_sqlite_respect_code_and_window() {
    let (repo, procedures) = repositories().await;
    let march = |day| Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap();

    let mut done = ticket("DB-AN-1");
    done.fecha_creacion = march(5);
    done.estado = TicketEstado::Completado;
    done.asignado_a = Some("EMP-1".into());
    done.tiempo_real = Some(2.0);
    done.eficiencia_temporal = Some(1.2);
    done.kpis.rendimiento = Some(Rendimiento {
        eficiencia_temporal: Some(1.2),
        cumplimiento_kpis: 0.8,
    });

    let mut open = ticket("DB-AN-2");
    open.fecha_creacion = march(20);

    let mut early = ticket("DB-AN-3");
    early.fecha_creacion = march(1);

    let mut elsewhere = ticket("DB-AN-4");
    elsewhere.fecha_creacion = march(5);
    elsewhere.codigo_procedimiento = Some("PROC-OTHER".into());

    for t in [&done, &open, &early, &elsewhere] {
        repo.insert(t).await.unwrap();
    }

    let window = AnalyticsWindow {
        date_from: Some(march(2)),
        date_to: Some(march(31)),
    };
    let stats = repo.procedure_stats(PROCEDURE, &window).await.unwrap();
    assert_eq!(stats.performance.total_tickets, 2);
    assert_eq!(stats.performance.completados, 1);
    assert_eq!(stats.performance.completion_rate, "50.00%");
    assert_eq!(stats.performance.eficiencia_promedio, Some(1.2));
    assert_eq!(stats.performance.kpi_compliance_avg, Some(0.8));
    assert_eq!(stats.top_performers[0].empleado_id, "EMP-1");
    assert_eq!(stats.time_distribution[0].categoria, "Muy eficiente");

    let everything = repo
        .procedure_stats(PROCEDURE, &AnalyticsWindow::default())
        .await
        .unwrap();
    assert_eq!(everything.performance.total_tickets, 3);

    let info = procedures.find(PROCEDURE).await.unwrap().unwrap();
    assert_eq!(info.nombre, "Call campaign");
    assert!(procedures.find("PROC-404").await.unwrap().is_none());
}

#[tokio::test]
async fn procedure_analytics_route_over_sqlite() {
    let app = TestApp::with_database().await;
    app.active_ticket("DB-AN-HTTP", "EMP-1").await;

    let response = app
        .get(&format!("/api/analytics/procedure/{PROCEDURE}"))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["procedure"]["nombre"], "Call campaign");
    assert_eq!(response.body["performance"]["total_tickets"], 1);
    assert_eq!(response.body["performance"]["completados"], 0);
}
