use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::errors::ServiceError;
use crate::models::{
    AnalyticsWindow, KpiSchema, ProcedureInfo, ProcedureStats, Ticket, TicketEstado,
};

pub mod memory;
pub mod procedure_repository;
pub mod ticket_repository;

pub use memory::{InMemoryProcedureCatalog, InMemoryTicketStore};
pub use procedure_repository::ProcedureRepository;
pub use ticket_repository::TicketRepository;

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Listing criteria; results are newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketFilter {
    pub estado: Option<TicketEstado>,
    pub asignado_a: Option<String>,
    pub limit: u64,
    pub offset: u64,
}

impl Default for TicketFilter {
    fn default() -> Self {
        Self {
            estado: None,
            asignado_a: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl TicketFilter {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.estado.map_or(true, |e| ticket.estado == e)
            && self
                .asignado_a
                .as_deref()
                .map_or(true, |a| ticket.asignado_a.as_deref() == Some(a))
    }
}

/// Row-level persistence for the ticket aggregate.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Ticket>, ServiceError>;

    /// Fails with `Conflict` when the id is taken.
    async fn insert(&self, ticket: &Ticket) -> Result<Ticket, ServiceError>;

    async fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, ServiceError>;

    /// Whole-aggregate replace. `None` when the row no longer exists.
    async fn update(&self, ticket: &Ticket) -> Result<Option<Ticket>, ServiceError>;

    /// Replace only while the stored row is still in `expected`; `None`
    /// when no row matched.
    async fn conditional_update(
        &self,
        ticket: &Ticket,
        expected: TicketEstado,
    ) -> Result<Option<Ticket>, ServiceError>;

    /// Aggregates the tickets of procedure `codigo` created inside `window`.
    async fn procedure_stats(
        &self,
        codigo: &str,
        window: &AnalyticsWindow,
    ) -> Result<ProcedureStats, ServiceError>;
}

/// Read-only lookup of procedure KPI definitions.
#[async_trait]
pub trait ProcedureCatalog: Send + Sync {
    /// `None` when the procedure does not exist.
    async fn kpi_schema(&self, codigo: &str) -> Result<Option<KpiSchema>, ServiceError>;

    async fn find(&self, codigo: &str) -> Result<Option<ProcedureInfo>, ServiceError>;
}
