use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::process::ProcessId;
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepId(pub i64);

/// A step never regresses: Waiting -> Pending -> Completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Waiting,
    Pending,
    Completed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Waiting => "waiting",
            StepStatus::Pending => "pending",
            StepStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> StepStatus {
        match raw {
            "pending" => StepStatus::Pending,
            "completed" => StepStatus::Completed,
            _ => StepStatus::Waiting,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }

    pub fn parse(raw: &str) -> Option<Decision> {
        match raw {
            "approve" => Some(Decision::Approve),
            "reject" => Some(Decision::Reject),
            _ => None,
        }
    }
}

/// One approver's gate within a process. `step_number` is the 1-based position
/// in the approver chain, fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: StepId,
    pub process_id: ProcessId,
    pub step_number: u32,
    pub assignee_id: UserId,
    pub status: StepStatus,
    pub decision: Option<Decision>,
    pub comment: String,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ApprovalStep {
    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }

    pub fn is_waiting(&self) -> bool {
        self.status == StepStatus::Waiting
    }
}
