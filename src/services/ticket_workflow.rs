use chrono::Utc;
use metrics::counter;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::models::{
    KpiSummary, NewTicket, PauseRecord, ResumeMetrics, ReviewDecision, Ticket, TicketEstado,
};
use crate::repositories::{ProcedureCatalog, TicketFilter, TicketStore};

/// Drives every ticket transition: load the row, let the aggregate decide,
/// write the result back.
#[derive(Clone)]
pub struct TicketWorkflowService {
    store: Arc<dyn TicketStore>,
    catalog: Arc<dyn ProcedureCatalog>,
}

impl TicketWorkflowService {
    pub fn new(store: Arc<dyn TicketStore>, catalog: Arc<dyn ProcedureCatalog>) -> Self {
        Self { store, catalog }
    }

    async fn observe<T, Fut>(
        &self,
        operation: &'static str,
        task: Fut,
    ) -> Result<T, ServiceError>
    where
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let result = crate::tracing::with_metrics(operation, task).await;
        if let Err(err) = &result {
            counter!(
                "ticketflow.tickets.rejected",
                1,
                "operation" => operation,
                "kind" => err.kind()
            );
            if !err.status_code().is_server_error() {
                warn!(operation, kind = err.kind(), error = %err, "ticket operation rejected");
            }
        }
        result
    }

    fn record_transition(operation: &'static str, ticket: &Ticket) {
        counter!(
            "ticketflow.tickets.transition",
            1,
            "operation" => operation,
            "estado" => ticket.estado.to_string()
        );
        info!(
            ticket_id = %ticket.id,
            operation,
            estado = %ticket.estado,
            "ticket transition applied"
        );
    }

    async fn load(&self, id: &str) -> Result<Ticket, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Ticket {} not found", id)))
    }

    async fn persist(&self, operation: &'static str, ticket: Ticket) -> Result<Ticket, ServiceError> {
        let saved = self
            .store
            .update(&ticket)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Ticket {} not found", ticket.id)))?;
        Self::record_transition(operation, &saved);
        Ok(saved)
    }

    /// Registers a new ticket in CREADO.
    #[instrument(skip(self, draft), fields(ticket_id = %draft.id))]
    pub async fn create_ticket(&self, draft: NewTicket) -> Result<Ticket, ServiceError> {
        self.observe("create", async {
            let ticket = Ticket::new(draft, Utc::now());
            let saved = self.store.insert(&ticket).await?;
            Self::record_transition("create", &saved);
            Ok(saved)
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_ticket(&self, id: &str) -> Result<Ticket, ServiceError> {
        self.load(id).await
    }

    #[instrument(skip(self))]
    pub async fn list_tickets(&self, filter: TicketFilter) -> Result<Vec<Ticket>, ServiceError> {
        self.store.list(&filter).await
    }

    /// CREADO -> ACTIVO; succeeds at most once per ticket.
    #[instrument(skip(self), fields(ticket_id = %id, actor = %empleado_id))]
    pub async fn accept(&self, id: &str, empleado_id: &str) -> Result<Ticket, ServiceError> {
        self.observe("accept", async {
            let not_accepted = || ServiceError::NotFoundOrAlreadyAccepted(id.to_string());
            let mut ticket = self.store.get(id).await?.ok_or_else(not_accepted)?;
            ticket.accept(empleado_id, Utc::now())?;

            let saved = self
                .store
                .conditional_update(&ticket, TicketEstado::Creado)
                .await?
                .ok_or_else(not_accepted)?;
            Self::record_transition("accept", &saved);
            Ok(saved)
        })
        .await
    }

    #[instrument(skip(self), fields(ticket_id = %id))]
    pub async fn update_milestone(
        &self,
        id: &str,
        porcentaje: i32,
        completado: bool,
    ) -> Result<Ticket, ServiceError> {
        self.observe("update_milestone", async {
            let mut ticket = self.load(id).await?;
            ticket.update_milestone(porcentaje, completado, Utc::now())?;
            self.persist("update_milestone", ticket).await
        })
        .await
    }

    #[instrument(skip(self), fields(ticket_id = %id))]
    pub async fn set_estado(&self, id: &str, estado: TicketEstado) -> Result<Ticket, ServiceError> {
        self.observe("set_estado", async {
            let mut ticket = self.load(id).await?;
            ticket.set_estado(estado, Utc::now());
            self.persist("set_estado", ticket).await
        })
        .await
    }

    #[instrument(skip(self, razon), fields(ticket_id = %id, actor = %empleado_id))]
    pub async fn request_reassignment(
        &self,
        id: &str,
        empleado_id: &str,
        razon: &str,
    ) -> Result<Ticket, ServiceError> {
        self.observe("request_reassignment", async {
            let mut ticket = self.load(id).await?;
            ticket.request_reassignment(empleado_id, razon, Utc::now())?;
            self.persist("request_reassignment", ticket).await
        })
        .await
    }

    #[instrument(
        skip(self, feedback),
        fields(ticket_id = %id, actor = %revisor_id, accion = decision.accion())
    )]
    pub async fn review(
        &self,
        id: &str,
        revisor_id: &str,
        decision: &ReviewDecision,
        feedback: &str,
        hito_porcentaje: Option<i32>,
    ) -> Result<Ticket, ServiceError> {
        self.observe("review", async {
            let mut ticket = self.load(id).await?;
            ticket.review(revisor_id, decision, feedback, hito_porcentaje, Utc::now())?;
            self.persist("review", ticket).await
        })
        .await
    }

    /// Stores a KPI submission and scores it against the ticket's procedure.
    #[instrument(skip(self, especificos), fields(ticket_id = %id, submitted = especificos.len()))]
    pub async fn submit_kpis(
        &self,
        id: &str,
        especificos: Map<String, Value>,
    ) -> Result<(Ticket, KpiSummary), ServiceError> {
        self.observe("submit_kpis", async {
            let mut ticket = self.load(id).await?;
            let procedure_not_found = || ServiceError::NotFound("Procedure not found".to_string());
            let codigo = ticket
                .codigo_procedimiento
                .clone()
                .ok_or_else(procedure_not_found)?;
            let schema = self
                .catalog
                .kpi_schema(&codigo)
                .await?
                .ok_or_else(procedure_not_found)?;

            let summary = ticket.apply_kpis(especificos, &schema, Utc::now())?;
            let saved = self.persist("submit_kpis", ticket).await?;
            Ok((saved, summary))
        })
        .await
    }

    #[instrument(skip(self, razon), fields(ticket_id = %id, actor = %solicitante_id))]
    pub async fn pause(
        &self,
        id: &str,
        solicitante_id: &str,
        razon: &str,
        aprobador_id: Option<&str>,
    ) -> Result<(Ticket, PauseRecord), ServiceError> {
        self.observe("pause", async {
            let mut ticket = self.load(id).await?;
            let record = ticket.pause(solicitante_id, razon, aprobador_id, Utc::now())?;
            let saved = self.persist("pause", ticket).await?;
            Ok((saved, record))
        })
        .await
    }

    #[instrument(skip(self), fields(ticket_id = %id, actor = %reanudado_por))]
    pub async fn resume(
        &self,
        id: &str,
        reanudado_por: &str,
    ) -> Result<(Ticket, ResumeMetrics), ServiceError> {
        self.observe("resume", async {
            let mut ticket = self.load(id).await?;
            let metrics = ticket.resume(reanudado_por, Utc::now())?;
            let saved = self.persist("resume", ticket).await?;
            Ok((saved, metrics))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Hito, KpiSchema};
    use crate::repositories::{InMemoryProcedureCatalog, InMemoryTicketStore};
    use assert_matches::assert_matches;
    use serde_json::json;

    fn service() -> (TicketWorkflowService, InMemoryTicketStore) {
        let store = InMemoryTicketStore::new();
        let catalog = InMemoryProcedureCatalog::new().with_procedure(
            "PROC-1",
            KpiSchema::from_json(Some(&json!({"calls": {"meta": 10}}))),
        );
        (
            TicketWorkflowService::new(Arc::new(store.clone()), Arc::new(catalog)),
            store,
        )
    }

    fn draft(id: &str) -> NewTicket {
        NewTicket {
            id: id.into(),
            codigo_actividad: "ACT".into(),
            titulo: "Check".into(),
            tiempo_estimado: 4.0,
            codigo_procedimiento: Some("PROC-1".into()),
            asignado_por: Some("DIR-1".into()),
            hitos: vec![Hito::new(50), Hito::new(100)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn full_lifecycle_reaches_completed() {
        let (svc, _) = service();
        svc.create_ticket(draft("T-1")).await.unwrap();

        let ticket = svc.accept("T-1", "EMP-1").await.unwrap();
        assert_eq!(ticket.estado, TicketEstado::Activo);

        let ticket = svc.update_milestone("T-1", 100, true).await.unwrap();
        assert_eq!(ticket.estado, TicketEstado::EnRevision);

        let ticket = svc
            .review("T-1", "DIR-1", &ReviewDecision::Approve, "ok", None)
            .await
            .unwrap();
        assert_eq!(ticket.estado, TicketEstado::Completado);
        assert_eq!(ticket.hito_aprobado, Some(100));
    }

    #[tokio::test]
    async fn concurrent_accepts_yield_one_winner() {
        let (svc, store) = service();
        svc.create_ticket(draft("T-2")).await.unwrap();

        let (a, b) = tokio::join!(svc.accept("T-2", "EMP-1"), svc.accept("T-2", "EMP-2"));
        let outcomes = [a, b];
        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(ServiceError::NotFoundOrAlreadyAccepted(_)))));
        assert_eq!(
            store.get("T-2").await.unwrap().unwrap().estado,
            TicketEstado::Activo
        );
    }

    #[tokio::test]
    async fn accept_unknown_ticket_reports_not_found_or_accepted() {
        let (svc, _) = service();
        assert_matches!(
            svc.accept("missing", "EMP-1").await,
            Err(ServiceError::NotFoundOrAlreadyAccepted(_))
        );
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let (svc, _) = service();
        svc.create_ticket(draft("T-3")).await.unwrap();
        assert_matches!(
            svc.create_ticket(draft("T-3")).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn kpis_need_known_procedure() {
        let (svc, _) = service();
        let mut orphan = draft("T-4");
        orphan.codigo_procedimiento = Some("PROC-404".into());
        svc.create_ticket(orphan).await.unwrap();

        let submitted = json!({"calls": {"valor": 12}}).as_object().cloned().unwrap();
        assert_matches!(
            svc.submit_kpis("T-4", submitted).await,
            Err(ServiceError::NotFound(msg)) if msg == "Procedure not found"
        );
    }

    #[tokio::test]
    async fn kpis_are_scored_and_stored() {
        let (svc, store) = service();
        svc.create_ticket(draft("T-5")).await.unwrap();

        let submitted = json!({"calls": {"valor": 5}}).as_object().cloned().unwrap();
        let (_, summary) = svc.submit_kpis("T-5", submitted).await.unwrap();
        assert_eq!(summary.compliance_rate, "0.00%");

        let stored = store.get("T-5").await.unwrap().unwrap();
        assert_eq!(stored.kpis.especificos["calls"], json!({"valor": 5}));
        assert_eq!(stored.kpis.rendimiento.unwrap().cumplimiento_kpis, 0.0);
    }

    #[tokio::test]
    async fn pause_and_resume_round_trip() {
        let (svc, _) = service();
        svc.create_ticket(draft("T-6")).await.unwrap();
        svc.accept("T-6", "EMP-1").await.unwrap();

        assert_matches!(
            svc.pause("T-6", "EMP-1", "waiting", None).await,
            Err(ServiceError::ApprovalRequired { .. })
        );
        let (ticket, record) = svc
            .pause("T-6", "EMP-1", "waiting", Some("DIR-1"))
            .await
            .unwrap();
        assert_eq!(ticket.estado, TicketEstado::EnPausa);
        assert!(record.requirio_aprobacion);

        let (ticket, metrics) = svc.resume("T-6", "EMP-1").await.unwrap();
        assert_eq!(ticket.estado, TicketEstado::Activo);
        assert_eq!(metrics.pause_duration_hours, 0);
        assert_eq!(ticket.tiempo_pausa_total, 0);
        assert_eq!(ticket.metadatos.pausas_historicas.len(), 1);
    }

    #[tokio::test]
    async fn missing_ticket_is_not_found() {
        let (svc, _) = service();
        assert_matches!(
            svc.set_estado("nope", TicketEstado::Cancelado).await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(svc.get_ticket("nope").await, Err(ServiceError::NotFound(_)));
    }
}
