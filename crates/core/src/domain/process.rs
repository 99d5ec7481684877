use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::document::DocumentId;
use crate::domain::step::{ApprovalStep, StepStatus};
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProcessId(pub i64);

/// `InProgress` is the only non-terminal status and is reachable only at
/// creation. `Cancelled` is kept for record compatibility; no engine
/// transition produces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    InProgress,
    Completed,
    Rejected,
    Cancelled,
}

impl ProcessStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::InProgress => "in_progress",
            ProcessStatus::Completed => "completed",
            ProcessStatus::Rejected => "rejected",
            ProcessStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> ProcessStatus {
        match raw {
            "completed" => ProcessStatus::Completed,
            "rejected" => ProcessStatus::Rejected,
            "cancelled" => ProcessStatus::Cancelled,
            _ => ProcessStatus::InProgress,
        }
    }
}

/// One routing of a document through an ordered approver chain. `end_date` is
/// absent while the process is in progress and set exactly once on the
/// terminal transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalProcess {
    pub id: ProcessId,
    pub document_id: DocumentId,
    pub initiator_id: UserId,
    pub status: ProcessStatus,
    pub start_date: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl ApprovalProcess {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Point-in-time predicate: a process is overdue only while still in
    /// progress. Terminal processes are never overdue, however late they
    /// finished.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ProcessStatus::InProgress && now > self.deadline
    }
}

/// A process together with its full step chain, steps ascending by
/// `step_number`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub process: ApprovalProcess,
    pub steps: Vec<ApprovalStep>,
}

impl ProcessSnapshot {
    /// The single currently-active step awaiting its assignee's decision, if
    /// any. All "whose turn is it" reads go through here.
    pub fn current_step(&self) -> Option<&ApprovalStep> {
        self.steps.iter().find(|step| step.status == StepStatus::Pending)
    }
}
