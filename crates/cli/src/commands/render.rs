//! JSON views of workflow state for command output. These are flattened
//! snapshots, not the domain types themselves, so the output schema stays
//! stable if the domain grows fields.

use chrono::{DateTime, Utc};
use docflow_core::domain::process::ProcessSnapshot;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ProcessView {
    pub process_id: i64,
    pub document_id: i64,
    pub initiator_id: i64,
    pub status: &'static str,
    pub start_date: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub overdue: bool,
    pub steps: Vec<StepView>,
}

#[derive(Debug, Serialize)]
pub struct StepView {
    pub step_id: i64,
    pub step_number: u32,
    pub assignee_id: i64,
    pub status: &'static str,
    pub decision: Option<&'static str>,
    pub comment: String,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub fn process_view(snapshot: &ProcessSnapshot, now: DateTime<Utc>) -> ProcessView {
    ProcessView {
        process_id: snapshot.process.id.0,
        document_id: snapshot.process.document_id.0,
        initiator_id: snapshot.process.initiator_id.0,
        status: snapshot.process.status.as_str(),
        start_date: snapshot.process.start_date,
        deadline: snapshot.process.deadline,
        end_date: snapshot.process.end_date,
        overdue: snapshot.process.is_overdue_at(now),
        steps: snapshot
            .steps
            .iter()
            .map(|step| StepView {
                step_id: step.id.0,
                step_number: step.step_number,
                assignee_id: step.assignee_id.0,
                status: step.status.as_str(),
                decision: step.decision.map(|decision| decision.as_str()),
                comment: step.comment.clone(),
                assigned_at: step.assigned_at,
                completed_at: step.completed_at,
            })
            .collect(),
    }
}

pub fn process_views(snapshots: &[ProcessSnapshot], now: DateTime<Utc>) -> Vec<ProcessView> {
    snapshots.iter().map(|snapshot| process_view(snapshot, now)).collect()
}
