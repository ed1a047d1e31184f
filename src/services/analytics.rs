use std::sync::Arc;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::models::{AnalyticsWindow, ProcedureInfo, ProcedureStats};
use crate::repositories::{ProcedureCatalog, TicketStore};

/// Read-only reporting over stored tickets.
#[derive(Clone)]
pub struct AnalyticsService {
    tickets: Arc<dyn TicketStore>,
    catalog: Arc<dyn ProcedureCatalog>,
}

impl AnalyticsService {
    pub fn new(tickets: Arc<dyn TicketStore>, catalog: Arc<dyn ProcedureCatalog>) -> Self {
        Self { tickets, catalog }
    }

    /// Performance of one procedure inside `window`; `NotFound` when the
    /// catalog does not know the code.
    #[instrument(skip(self))]
    pub async fn procedure_performance(
        &self,
        codigo: &str,
        window: AnalyticsWindow,
    ) -> Result<(ProcedureInfo, ProcedureStats), ServiceError> {
        crate::tracing::with_metrics("procedure_analytics", async {
            let procedure = self
                .catalog
                .find(codigo)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Procedure not found".to_string()))?;
            let stats = self.tickets.procedure_stats(codigo, &window).await?;
            info!(
                codigo = %codigo,
                total_tickets = stats.performance.total_tickets,
                "procedure analytics computed"
            );
            Ok::<_, ServiceError>((procedure, stats))
        })
        .await
    }
}
