pub mod analytics;
pub mod procedure;
pub mod ticket;

pub use analytics::{
    AnalyticsWindow, ProcedureInfo, ProcedurePerformance, ProcedureStats, TimeBucket, TopPerformer,
};
pub use procedure::{KpiDefinition, KpiEvaluation, KpiSchema, KpiSummary};
pub use ticket::{
    Hito, Kpis, Metadatos, NewTicket, PauseRecord, ReassignmentRecord, Rendimiento,
    ResumeMetrics, ResumedPause, ReviewDecision, Revision, Ticket, TicketEstado,
};
