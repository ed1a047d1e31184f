pub mod analytics;
pub mod ticket_workflow;

pub use analytics::AnalyticsService;
pub use ticket_workflow::TicketWorkflowService;
