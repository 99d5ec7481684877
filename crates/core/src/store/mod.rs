use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::document::{Document, DocumentId, DocumentStatus};
use crate::domain::process::{ApprovalProcess, ProcessId, ProcessSnapshot, ProcessStatus};
use crate::domain::step::{ApprovalStep, Decision, StepId, StepStatus};
use crate::domain::user::{User, UserId};
use crate::errors::StoreError;

pub mod memory;

pub use memory::{InMemoryDocumentCatalog, InMemoryWorkflowStore, StaticIdentityProvider};

/// A process row before the store has assigned it an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewProcess {
    pub document_id: DocumentId,
    pub initiator_id: UserId,
    pub status: ProcessStatus,
    pub start_date: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

/// A step row before the store has assigned it an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewStep {
    pub step_number: u32,
    pub assignee_id: UserId,
    pub status: StepStatus,
    pub assigned_at: Option<DateTime<Utc>>,
}

/// Narrow persistence interface for processes and their step chains. The
/// engine is storage-agnostic; SQL and in-memory implementations both live
/// behind this trait.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Persists a process together with its full step chain. The write is
    /// atomic: readers either see the process with every step or nothing.
    async fn create_process(
        &self,
        process: NewProcess,
        steps: Vec<NewStep>,
    ) -> Result<ProcessSnapshot, StoreError>;

    async fn process(&self, id: ProcessId) -> Result<Option<ApprovalProcess>, StoreError>;

    async fn step(&self, id: StepId) -> Result<Option<ApprovalStep>, StoreError>;

    /// Steps of one process, ascending by `step_number`.
    async fn steps_for_process(&self, id: ProcessId) -> Result<Vec<ApprovalStep>, StoreError>;

    async fn complete_step(
        &self,
        id: StepId,
        decision: Decision,
        comment: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn activate_step(
        &self,
        id: StepId,
        assigned_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn finish_process(
        &self,
        id: ProcessId,
        status: ProcessStatus,
        end_date: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn list_processes(&self) -> Result<Vec<ApprovalProcess>, StoreError>;
}

/// Read/write access to the routed document, limited to what the engine
/// needs: lookup plus the status field.
#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    async fn document(&self, id: DocumentId) -> Result<Option<Document>, StoreError>;

    async fn set_document_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
    ) -> Result<(), StoreError>;
}

/// Read-only identity of the caller starting a process.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_user(&self) -> Result<Option<User>, StoreError>;
}
