use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;

use crate::errors::ServiceError;
use crate::models::{
    AnalyticsWindow, KpiSchema, ProcedureInfo, ProcedureStats, Ticket, TicketEstado,
};
use crate::repositories::{ProcedureCatalog, TicketFilter, TicketStore};

/// Process-local ticket store. Each row is guarded by its shard lock, so the
/// estado check in `conditional_update` is atomic with the write.
#[derive(Clone, Default)]
pub struct InMemoryTicketStore(Arc<DashMap<String, Ticket>>);

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn get(&self, id: &str) -> Result<Option<Ticket>, ServiceError> {
        Ok(self.0.get(id).map(|t| t.clone()))
    }

    async fn insert(&self, ticket: &Ticket) -> Result<Ticket, ServiceError> {
        match self.0.entry(ticket.id.clone()) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "Ticket {} already exists",
                ticket.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(ticket.clone());
                Ok(ticket.clone())
            }
        }
    }

    async fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, ServiceError> {
        let mut tickets: Vec<Ticket> = self
            .0
            .iter()
            .filter(|t| filter.matches(t.value()))
            .map(|t| t.value().clone())
            .collect();
        tickets.sort_by(|a, b| {
            b.fecha_creacion
                .cmp(&a.fecha_creacion)
                .then_with(|| a.id.cmp(&b.id))
        });

        let offset = usize::try_from(filter.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.limit).unwrap_or(usize::MAX);
        Ok(tickets.into_iter().skip(offset).take(limit).collect())
    }

    async fn update(&self, ticket: &Ticket) -> Result<Option<Ticket>, ServiceError> {
        Ok(self.0.get_mut(&ticket.id).map(|mut slot| {
            *slot = ticket.clone();
            ticket.clone()
        }))
    }

    async fn conditional_update(
        &self,
        ticket: &Ticket,
        expected: TicketEstado,
    ) -> Result<Option<Ticket>, ServiceError> {
        let Some(mut slot) = self.0.get_mut(&ticket.id) else {
            return Ok(None);
        };
        if slot.estado != expected {
            return Ok(None);
        }
        *slot = ticket.clone();
        Ok(Some(ticket.clone()))
    }

    async fn procedure_stats(
        &self,
        codigo: &str,
        window: &AnalyticsWindow,
    ) -> Result<ProcedureStats, ServiceError> {
        let tickets: Vec<Ticket> = self
            .0
            .iter()
            .filter(|t| {
                t.codigo_procedimiento.as_deref() == Some(codigo) && window.contains(t.fecha_creacion)
            })
            .map(|t| t.value().clone())
            .collect();
        Ok(ProcedureStats::from_tickets(&tickets))
    }
}

/// Process-local procedure catalog keyed by procedure code. Procedures added
/// here are named after their code.
#[derive(Clone, Default)]
pub struct InMemoryProcedureCatalog(Arc<DashMap<String, KpiSchema>>);

impl InMemoryProcedureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, codigo: impl Into<String>, schema: KpiSchema) {
        self.0.insert(codigo.into(), schema);
    }

    pub fn with_procedure(self, codigo: impl Into<String>, schema: KpiSchema) -> Self {
        self.insert(codigo, schema);
        self
    }
}

#[async_trait]
impl ProcedureCatalog for InMemoryProcedureCatalog {
    async fn kpi_schema(&self, codigo: &str) -> Result<Option<KpiSchema>, ServiceError> {
        Ok(self.0.get(codigo).map(|s| s.clone()))
    }

    async fn find(&self, codigo: &str) -> Result<Option<ProcedureInfo>, ServiceError> {
        Ok(self.0.get(codigo).map(|entry| ProcedureInfo {
            codigo: entry.key().clone(),
            nombre: entry.key().clone(),
        }))
    }
}
