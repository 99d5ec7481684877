pub mod audit;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod store;

pub use audit::{AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, NoopAuditSink};
pub use domain::document::{Document, DocumentId, DocumentStatus};
pub use domain::process::{ApprovalProcess, ProcessId, ProcessSnapshot, ProcessStatus};
pub use domain::step::{ApprovalStep, Decision, StepId, StepStatus};
pub use domain::user::{Role, User, UserId};
pub use engine::{ApprovalWorkflowEngine, DEFAULT_DEADLINE_DAYS, DEFAULT_REJECT_COMMENT};
pub use errors::{EngineError, StoreError};
pub use store::{DocumentCatalog, IdentityProvider, NewProcess, NewStep, WorkflowStore};
