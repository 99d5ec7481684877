use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::document::{Document, DocumentId, DocumentStatus};
use crate::domain::process::{ApprovalProcess, ProcessId, ProcessSnapshot, ProcessStatus};
use crate::domain::step::{ApprovalStep, Decision, StepId, StepStatus};
use crate::domain::user::User;
use crate::errors::StoreError;

use super::{DocumentCatalog, IdentityProvider, NewProcess, NewStep, WorkflowStore};

#[derive(Default)]
struct WorkflowTables {
    processes: HashMap<i64, ApprovalProcess>,
    steps: HashMap<i64, ApprovalStep>,
    next_process_id: i64,
    next_step_id: i64,
}

/// In-memory workflow store. A single lock over both tables keeps
/// process-plus-steps creation atomic for readers, matching the SQL
/// implementation's transaction.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    tables: RwLock<WorkflowTables>,
}

#[async_trait::async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn create_process(
        &self,
        process: NewProcess,
        steps: Vec<NewStep>,
    ) -> Result<ProcessSnapshot, StoreError> {
        let mut tables = self.tables.write().await;

        tables.next_process_id += 1;
        let process_id = ProcessId(tables.next_process_id);
        let stored = ApprovalProcess {
            id: process_id,
            document_id: process.document_id,
            initiator_id: process.initiator_id,
            status: process.status,
            start_date: process.start_date,
            deadline: process.deadline,
            end_date: None,
        };
        tables.processes.insert(process_id.0, stored.clone());

        let mut chain = Vec::with_capacity(steps.len());
        for step in steps {
            tables.next_step_id += 1;
            let stored_step = ApprovalStep {
                id: StepId(tables.next_step_id),
                process_id,
                step_number: step.step_number,
                assignee_id: step.assignee_id,
                status: step.status,
                decision: None,
                comment: String::new(),
                assigned_at: step.assigned_at,
                completed_at: None,
            };
            tables.steps.insert(stored_step.id.0, stored_step.clone());
            chain.push(stored_step);
        }
        chain.sort_by_key(|step| step.step_number);

        Ok(ProcessSnapshot { process: stored, steps: chain })
    }

    async fn process(&self, id: ProcessId) -> Result<Option<ApprovalProcess>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.processes.get(&id.0).cloned())
    }

    async fn step(&self, id: StepId) -> Result<Option<ApprovalStep>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.steps.get(&id.0).cloned())
    }

    async fn steps_for_process(&self, id: ProcessId) -> Result<Vec<ApprovalStep>, StoreError> {
        let tables = self.tables.read().await;
        let mut steps: Vec<ApprovalStep> =
            tables.steps.values().filter(|step| step.process_id == id).cloned().collect();
        steps.sort_by_key(|step| step.step_number);
        Ok(steps)
    }

    async fn complete_step(
        &self,
        id: StepId,
        decision: Decision,
        comment: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let step = tables
            .steps
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::Backend(format!("step {} does not exist", id.0)))?;
        step.status = StepStatus::Completed;
        step.decision = Some(decision);
        step.comment = comment.to_owned();
        step.completed_at = Some(completed_at);
        Ok(())
    }

    async fn activate_step(
        &self,
        id: StepId,
        assigned_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let step = tables
            .steps
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::Backend(format!("step {} does not exist", id.0)))?;
        step.status = StepStatus::Pending;
        step.assigned_at = Some(assigned_at);
        Ok(())
    }

    async fn finish_process(
        &self,
        id: ProcessId,
        status: ProcessStatus,
        end_date: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let process = tables
            .processes
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::Backend(format!("process {} does not exist", id.0)))?;
        process.status = status;
        process.end_date = Some(end_date);
        Ok(())
    }

    async fn list_processes(&self) -> Result<Vec<ApprovalProcess>, StoreError> {
        let tables = self.tables.read().await;
        let mut processes: Vec<ApprovalProcess> = tables.processes.values().cloned().collect();
        processes.sort_by_key(|process| process.id);
        Ok(processes)
    }
}

#[derive(Default)]
struct CatalogTable {
    documents: HashMap<i64, Document>,
    next_id: i64,
}

#[derive(Default)]
pub struct InMemoryDocumentCatalog {
    table: RwLock<CatalogTable>,
}

impl InMemoryDocumentCatalog {
    /// Test/fixture helper: registers a draft document and returns it.
    pub async fn add_document(&self, name: &str, category: Option<&str>) -> Document {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let now = Utc::now();
        let document = Document {
            id: DocumentId(table.next_id),
            name: name.to_owned(),
            category: category.map(str::to_owned),
            status: DocumentStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        table.documents.insert(document.id.0, document.clone());
        document
    }
}

#[async_trait::async_trait]
impl DocumentCatalog for InMemoryDocumentCatalog {
    async fn document(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let table = self.table.read().await;
        Ok(table.documents.get(&id.0).cloned())
    }

    async fn set_document_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
    ) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        let document = table
            .documents
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::Backend(format!("document {} does not exist", id.0)))?;
        document.status = status;
        document.updated_at = Utc::now();
        Ok(())
    }
}

/// Identity provider with a fixed answer, for tests and single-user CLI runs.
#[derive(Clone, Debug, Default)]
pub struct StaticIdentityProvider {
    user: Option<User>,
}

impl StaticIdentityProvider {
    pub fn signed_in(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn current_user(&self) -> Result<Option<User>, StoreError> {
        Ok(self.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::document::DocumentStatus;
    use crate::domain::process::ProcessStatus;
    use crate::domain::step::{Decision, StepStatus};
    use crate::domain::user::UserId;
    use crate::store::{NewProcess, NewStep, WorkflowStore};

    use super::{DocumentCatalog, InMemoryDocumentCatalog, InMemoryWorkflowStore};

    fn new_process(document_id: i64) -> NewProcess {
        let now = Utc::now();
        NewProcess {
            document_id: crate::domain::document::DocumentId(document_id),
            initiator_id: UserId(1),
            status: ProcessStatus::InProgress,
            start_date: now,
            deadline: now + Duration::days(5),
        }
    }

    fn chain(assignees: &[i64]) -> Vec<NewStep> {
        assignees
            .iter()
            .enumerate()
            .map(|(index, assignee)| NewStep {
                step_number: index as u32 + 1,
                assignee_id: UserId(*assignee),
                status: if index == 0 { StepStatus::Pending } else { StepStatus::Waiting },
                assigned_at: (index == 0).then(Utc::now),
            })
            .collect()
    }

    #[tokio::test]
    async fn create_process_assigns_ids_and_orders_steps() {
        let store = InMemoryWorkflowStore::default();

        let snapshot =
            store.create_process(new_process(10), chain(&[5, 6, 7])).await.expect("create");

        assert_eq!(snapshot.process.id.0, 1);
        assert_eq!(snapshot.steps.len(), 3);
        assert_eq!(
            snapshot.steps.iter().map(|s| s.step_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(snapshot.steps.iter().all(|s| s.process_id == snapshot.process.id));
    }

    #[tokio::test]
    async fn complete_and_activate_mutate_single_steps() {
        let store = InMemoryWorkflowStore::default();
        let snapshot = store.create_process(new_process(10), chain(&[5, 6])).await.expect("create");

        let now = Utc::now();
        store
            .complete_step(snapshot.steps[0].id, Decision::Approve, "ok", now)
            .await
            .expect("complete");
        store.activate_step(snapshot.steps[1].id, now).await.expect("activate");

        let steps = store.steps_for_process(snapshot.process.id).await.expect("steps");
        assert_eq!(steps[0].status, StepStatus::Completed);
        assert_eq!(steps[0].decision, Some(Decision::Approve));
        assert_eq!(steps[1].status, StepStatus::Pending);
        assert!(steps[1].assigned_at.is_some());
    }

    #[tokio::test]
    async fn finish_process_sets_terminal_status_and_end_date() {
        let store = InMemoryWorkflowStore::default();
        let snapshot = store.create_process(new_process(10), chain(&[5])).await.expect("create");

        store
            .finish_process(snapshot.process.id, ProcessStatus::Completed, Utc::now())
            .await
            .expect("finish");

        let process = store.process(snapshot.process.id).await.expect("find").expect("exists");
        assert_eq!(process.status, ProcessStatus::Completed);
        assert!(process.end_date.is_some());
    }

    #[tokio::test]
    async fn document_catalog_updates_status_in_place() {
        let catalog = InMemoryDocumentCatalog::default();
        let document = catalog.add_document("Budget 2026", Some("finance")).await;

        catalog.set_document_status(document.id, DocumentStatus::Review).await.expect("update");

        let found = catalog.document(document.id).await.expect("find").expect("exists");
        assert_eq!(found.status, DocumentStatus::Review);
    }
}
