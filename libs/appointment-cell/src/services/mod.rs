pub mod lifecycle;
pub mod records;
pub mod workflow;

pub use lifecycle::AppointmentLifecycleService;
pub use records::RecordsGateway;
pub use workflow::AppointmentWorkflowService;
