use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::audit::{AuditEvent, AuditOutcome, AuditSink};
use crate::domain::document::{DocumentId, DocumentStatus};
use crate::domain::process::{ApprovalProcess, ProcessId, ProcessSnapshot, ProcessStatus};
use crate::domain::step::{ApprovalStep, Decision, StepId, StepStatus};
use crate::domain::user::UserId;
use crate::errors::EngineError;
use crate::store::{DocumentCatalog, IdentityProvider, NewProcess, NewStep, WorkflowStore};

pub const DEFAULT_DEADLINE_DAYS: i64 = 5;

/// Comment recorded on a rejected step when the approver gave none. Kept as
/// the literal the original dataset uses so historical records stay uniform.
pub const DEFAULT_REJECT_COMMENT: &str = "Отклонено";

/// Drives a document through an ordered approver chain: one pending step at a
/// time, approval of the last step completes the process, rejection of any
/// step terminates it immediately.
///
/// Mutations on the same process are serialized through a per-process lock,
/// so concurrent approve/reject calls cannot leave two steps pending or
/// apply two terminal transitions.
pub struct ApprovalWorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    documents: Arc<dyn DocumentCatalog>,
    identity: Arc<dyn IdentityProvider>,
    audit: Arc<dyn AuditSink>,
    default_deadline: Duration,
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ApprovalWorkflowEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        documents: Arc<dyn DocumentCatalog>,
        identity: Arc<dyn IdentityProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            documents,
            identity,
            audit,
            default_deadline: Duration::days(DEFAULT_DEADLINE_DAYS),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_deadline_days(mut self, days: i64) -> Self {
        self.default_deadline = Duration::days(days.max(1));
        self
    }

    /// Creates a process with one step per approver, in list order. The first
    /// step starts pending, the rest waiting; the routed document moves to
    /// review. Process and steps are persisted atomically.
    pub async fn start_process(
        &self,
        document_id: DocumentId,
        approver_ids: &[UserId],
        deadline: Option<DateTime<Utc>>,
    ) -> Result<ProcessSnapshot, EngineError> {
        let initiator =
            self.identity.current_user().await?.ok_or(EngineError::Unauthenticated)?;

        if approver_ids.is_empty() {
            return Err(EngineError::EmptyApproverList);
        }

        let document = self
            .documents
            .document(document_id)
            .await?
            .ok_or(EngineError::DocumentNotFound(document_id))?;

        let now = Utc::now();
        let deadline = deadline.unwrap_or(now + self.default_deadline);

        let steps = approver_ids
            .iter()
            .enumerate()
            .map(|(index, assignee)| NewStep {
                step_number: index as u32 + 1,
                assignee_id: *assignee,
                status: if index == 0 { StepStatus::Pending } else { StepStatus::Waiting },
                assigned_at: (index == 0).then_some(now),
            })
            .collect();

        let snapshot = self
            .store
            .create_process(
                NewProcess {
                    document_id: document.id,
                    initiator_id: initiator.id,
                    status: ProcessStatus::InProgress,
                    start_date: now,
                    deadline,
                },
                steps,
            )
            .await?;

        self.documents.set_document_status(document.id, DocumentStatus::Review).await?;

        tracing::info!(
            event_name = "workflow.process_started",
            process_id = snapshot.process.id.0,
            document_id = document.id.0,
            initiator_id = initiator.id.0,
            approver_count = snapshot.steps.len(),
            "approval process started"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(snapshot.process.id),
                "workflow.process_started",
                actor(initiator.id),
                AuditOutcome::Success,
            )
            .with_metadata("document_id", document.id.0.to_string())
            .with_metadata("approver_count", snapshot.steps.len().to_string()),
        );

        Ok(snapshot)
    }

    /// Records an approve/reject decision on the currently pending step.
    ///
    /// Expected races come back as `Ok(false)` rather than an error: the step
    /// does not exist, it belongs to another process, or it is no longer
    /// pending (a double-submitted form racing a legitimate decision).
    /// Callers check the boolean; `Err` is reserved for storage failures.
    pub async fn record_decision(
        &self,
        process_id: ProcessId,
        step_id: StepId,
        decision: Decision,
        comment: Option<&str>,
    ) -> Result<bool, EngineError> {
        let lock = self.process_lock(process_id).await;
        let _guard = lock.lock().await;

        let Some(step) = self.store.step(step_id).await? else {
            return Ok(self.refuse(process_id, step_id, "step_not_found"));
        };
        if step.process_id != process_id {
            return Ok(self.refuse(process_id, step_id, "process_mismatch"));
        }
        if !step.is_pending() {
            return Ok(self.refuse(process_id, step_id, "step_not_pending"));
        }

        let process = self.store.process(process_id).await?.ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "step {} references missing process {}",
                step_id.0, process_id.0
            ))
        })?;

        let terminal = match decision {
            Decision::Approve => self.approve(&process, &step, comment).await?,
            Decision::Reject => {
                self.reject(&process, &step, comment).await?;
                true
            }
        };

        // A terminal process takes no further decisions, so its registry
        // entry can go; a late retry recreates it and is then refused.
        if terminal {
            self.locks.lock().await.remove(&process_id.0);
        }

        Ok(true)
    }

    /// Returns true when this approval was the last one and the process
    /// reached its terminal status.
    async fn approve(
        &self,
        process: &ApprovalProcess,
        step: &ApprovalStep,
        comment: Option<&str>,
    ) -> Result<bool, EngineError> {
        let now = Utc::now();
        self.store
            .complete_step(step.id, Decision::Approve, comment.unwrap_or(""), now)
            .await?;

        tracing::info!(
            event_name = "workflow.step_approved",
            process_id = process.id.0,
            step_id = step.id.0,
            step_number = step.step_number,
            "approval step approved"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(process.id),
                "workflow.step_approved",
                actor(step.assignee_id),
                AuditOutcome::Success,
            )
            .with_metadata("step_number", step.step_number.to_string()),
        );

        // Sequential activation: strictly the lowest-numbered waiting step.
        let steps = self.store.steps_for_process(process.id).await?;
        let next = steps.iter().filter(|s| s.is_waiting()).min_by_key(|s| s.step_number);

        match next {
            Some(next) => {
                self.store.activate_step(next.id, now).await?;
                tracing::info!(
                    event_name = "workflow.step_activated",
                    process_id = process.id.0,
                    step_id = next.id.0,
                    step_number = next.step_number,
                    assignee_id = next.assignee_id.0,
                    "next approval step activated"
                );
                Ok(false)
            }
            None => {
                self.store.finish_process(process.id, ProcessStatus::Completed, now).await?;
                self.documents
                    .set_document_status(process.document_id, DocumentStatus::Approved)
                    .await?;
                tracing::info!(
                    event_name = "workflow.process_completed",
                    process_id = process.id.0,
                    document_id = process.document_id.0,
                    "approval process completed"
                );
                self.audit.emit(AuditEvent::new(
                    Some(process.id),
                    "workflow.process_completed",
                    actor(step.assignee_id),
                    AuditOutcome::Success,
                ));
                Ok(true)
            }
        }
    }

    async fn reject(
        &self,
        process: &ApprovalProcess,
        step: &ApprovalStep,
        comment: Option<&str>,
    ) -> Result<(), EngineError> {
        let now = Utc::now();
        let comment = match comment {
            Some(text) if !text.is_empty() => text,
            _ => DEFAULT_REJECT_COMMENT,
        };
        self.store.complete_step(step.id, Decision::Reject, comment, now).await?;

        // Rejection short-circuits the chain; waiting steps stay waiting.
        self.store.finish_process(process.id, ProcessStatus::Rejected, now).await?;
        self.documents
            .set_document_status(process.document_id, DocumentStatus::Rejected)
            .await?;

        tracing::info!(
            event_name = "workflow.process_rejected",
            process_id = process.id.0,
            step_id = step.id.0,
            step_number = step.step_number,
            document_id = process.document_id.0,
            "approval process rejected"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(process.id),
                "workflow.step_rejected",
                actor(step.assignee_id),
                AuditOutcome::Success,
            )
            .with_metadata("step_number", step.step_number.to_string())
            .with_metadata("comment", comment),
        );
        self.audit.emit(AuditEvent::new(
            Some(process.id),
            "workflow.process_rejected",
            actor(step.assignee_id),
            AuditOutcome::Success,
        ));

        Ok(())
    }

    /// True iff the process is still in progress and its deadline has passed.
    pub fn is_overdue(&self, process: &ApprovalProcess) -> bool {
        process.is_overdue_at(Utc::now())
    }

    pub async fn snapshot(
        &self,
        process_id: ProcessId,
    ) -> Result<Option<ProcessSnapshot>, EngineError> {
        let Some(process) = self.store.process(process_id).await? else {
            return Ok(None);
        };
        let steps = self.store.steps_for_process(process_id).await?;
        Ok(Some(ProcessSnapshot { process, steps }))
    }

    pub async fn list_all(&self) -> Result<Vec<ProcessSnapshot>, EngineError> {
        let processes = self.store.list_processes().await?;
        let mut snapshots = Vec::with_capacity(processes.len());
        for process in processes {
            let steps = self.store.steps_for_process(process.id).await?;
            snapshots.push(ProcessSnapshot { process, steps });
        }
        Ok(snapshots)
    }

    /// Processes whose current pending step is assigned to `user_id` —
    /// the user's approval inbox. Processes with no pending step are
    /// excluded.
    pub async fn list_for_approver(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ProcessSnapshot>, EngineError> {
        let snapshots = self.list_all().await?;
        Ok(snapshots
            .into_iter()
            .filter(|snapshot| {
                snapshot.current_step().is_some_and(|step| step.assignee_id == user_id)
            })
            .collect())
    }

    pub async fn list_initiated_by(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ProcessSnapshot>, EngineError> {
        let snapshots = self.list_all().await?;
        Ok(snapshots
            .into_iter()
            .filter(|snapshot| snapshot.process.initiator_id == user_id)
            .collect())
    }

    pub async fn list_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<ProcessSnapshot>, EngineError> {
        let snapshots = self.list_all().await?;
        Ok(snapshots
            .into_iter()
            .filter(|snapshot| snapshot.process.document_id == document_id)
            .collect())
    }

    pub async fn list_terminal(&self) -> Result<Vec<ProcessSnapshot>, EngineError> {
        let snapshots = self.list_all().await?;
        Ok(snapshots.into_iter().filter(|snapshot| snapshot.process.is_terminal()).collect())
    }

    fn refuse(&self, process_id: ProcessId, step_id: StepId, reason: &str) -> bool {
        tracing::debug!(
            event_name = "workflow.decision_refused",
            process_id = process_id.0,
            step_id = step_id.0,
            reason,
            "decision not recorded"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(process_id),
                "workflow.decision_refused",
                "engine",
                AuditOutcome::Refused,
            )
            .with_metadata("step_id", step_id.0.to_string())
            .with_metadata("reason", reason),
        );
        false
    }

    async fn process_lock(&self, id: ProcessId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id.0).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    #[cfg(test)]
    async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }
}

fn actor(user_id: UserId) -> String {
    format!("user:{}", user_id.0)
}
