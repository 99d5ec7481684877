use chrono::{DateTime, Utc};
use sqlx::Row;

use docflow_core::domain::document::DocumentId;
use docflow_core::domain::process::{ApprovalProcess, ProcessId, ProcessSnapshot, ProcessStatus};
use docflow_core::domain::step::{ApprovalStep, Decision, StepId, StepStatus};
use docflow_core::domain::user::UserId;
use docflow_core::errors::StoreError;
use docflow_core::store::{NewProcess, NewStep, WorkflowStore};

use super::{parse_optional_timestamp, parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlWorkflowStore {
    pool: DbPool,
}

impl SqlWorkflowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PROCESS_COLUMNS: &str =
    "process_id, document_id, initiator_id, status, start_date, deadline, end_date";

const STEP_COLUMNS: &str = "step_id, process_id, step_number, assignee_id, status, decision,
     comment, assigned_at, completed_at";

fn row_to_process(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalProcess, RepositoryError> {
    let id: i64 =
        row.try_get("process_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let document_id: i64 =
        row.try_get("document_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let initiator_id: i64 =
        row.try_get("initiator_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let start_date: String =
        row.try_get("start_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let deadline: String =
        row.try_get("deadline").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let end_date: Option<String> =
        row.try_get("end_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ApprovalProcess {
        id: ProcessId(id),
        document_id: DocumentId(document_id),
        initiator_id: UserId(initiator_id),
        status: ProcessStatus::parse(&status),
        start_date: parse_timestamp("start_date", &start_date)?,
        deadline: parse_timestamp("deadline", &deadline)?,
        end_date: parse_optional_timestamp("end_date", end_date)?,
    })
}

fn row_to_step(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalStep, RepositoryError> {
    let id: i64 = row.try_get("step_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let process_id: i64 =
        row.try_get("process_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let step_number: i64 =
        row.try_get("step_number").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let assignee_id: i64 =
        row.try_get("assignee_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let decision: Option<String> =
        row.try_get("decision").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let comment: String =
        row.try_get("comment").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let assigned_at: Option<String> =
        row.try_get("assigned_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let completed_at: Option<String> =
        row.try_get("completed_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(ApprovalStep {
        id: StepId(id),
        process_id: ProcessId(process_id),
        step_number: step_number as u32,
        assignee_id: UserId(assignee_id),
        status: StepStatus::parse(&status),
        decision: decision.as_deref().and_then(Decision::parse),
        comment,
        assigned_at: parse_optional_timestamp("assigned_at", assigned_at)?,
        completed_at: parse_optional_timestamp("completed_at", completed_at)?,
    })
}

impl SqlWorkflowStore {
    async fn try_create_process(
        &self,
        process: NewProcess,
        steps: Vec<NewStep>,
    ) -> Result<ProcessSnapshot, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO approval_processes
                 (document_id, initiator_id, status, start_date, deadline, end_date)
             VALUES (?, ?, ?, ?, ?, NULL)",
        )
        .bind(process.document_id.0)
        .bind(process.initiator_id.0)
        .bind(process.status.as_str())
        .bind(process.start_date.to_rfc3339())
        .bind(process.deadline.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        let process_id = ProcessId(inserted.last_insert_rowid());

        let mut chain = Vec::with_capacity(steps.len());
        for step in steps {
            let inserted = sqlx::query(
                "INSERT INTO approval_steps
                     (process_id, step_number, assignee_id, status, decision, comment,
                      assigned_at, completed_at)
                 VALUES (?, ?, ?, ?, NULL, '', ?, NULL)",
            )
            .bind(process_id.0)
            .bind(step.step_number as i64)
            .bind(step.assignee_id.0)
            .bind(step.status.as_str())
            .bind(step.assigned_at.map(|at| at.to_rfc3339()))
            .execute(&mut *tx)
            .await?;

            chain.push(ApprovalStep {
                id: StepId(inserted.last_insert_rowid()),
                process_id,
                step_number: step.step_number,
                assignee_id: step.assignee_id,
                status: step.status,
                decision: None,
                comment: String::new(),
                assigned_at: step.assigned_at,
                completed_at: None,
            });
        }

        tx.commit().await?;
        chain.sort_by_key(|step| step.step_number);

        Ok(ProcessSnapshot {
            process: ApprovalProcess {
                id: process_id,
                document_id: process.document_id,
                initiator_id: process.initiator_id,
                status: process.status,
                start_date: process.start_date,
                deadline: process.deadline,
                end_date: None,
            },
            steps: chain,
        })
    }

    async fn try_process(
        &self,
        id: ProcessId,
    ) -> Result<Option<ApprovalProcess>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PROCESS_COLUMNS} FROM approval_processes WHERE process_id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_process(row)?)),
            None => Ok(None),
        }
    }

    async fn try_step(&self, id: StepId) -> Result<Option<ApprovalStep>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {STEP_COLUMNS} FROM approval_steps WHERE step_id = ?"))
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_step(row)?)),
            None => Ok(None),
        }
    }

    async fn try_steps_for_process(
        &self,
        id: ProcessId,
    ) -> Result<Vec<ApprovalStep>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM approval_steps
             WHERE process_id = ? ORDER BY step_number ASC"
        ))
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_step).collect()
    }

    async fn try_complete_step(
        &self,
        id: StepId,
        decision: Decision,
        comment: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE approval_steps
             SET status = 'completed', decision = ?, comment = ?, completed_at = ?
             WHERE step_id = ?",
        )
        .bind(decision.as_str())
        .bind(comment)
        .bind(completed_at.to_rfc3339())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn try_activate_step(
        &self,
        id: StepId,
        assigned_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE approval_steps SET status = 'pending', assigned_at = ? WHERE step_id = ?",
        )
        .bind(assigned_at.to_rfc3339())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn try_finish_process(
        &self,
        id: ProcessId,
        status: ProcessStatus,
        end_date: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE approval_processes SET status = ?, end_date = ? WHERE process_id = ?")
            .bind(status.as_str())
            .bind(end_date.to_rfc3339())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn try_list_processes(&self) -> Result<Vec<ApprovalProcess>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {PROCESS_COLUMNS} FROM approval_processes ORDER BY process_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_process).collect()
    }
}

#[async_trait::async_trait]
impl WorkflowStore for SqlWorkflowStore {
    async fn create_process(
        &self,
        process: NewProcess,
        steps: Vec<NewStep>,
    ) -> Result<ProcessSnapshot, StoreError> {
        self.try_create_process(process, steps).await.map_err(StoreError::from)
    }

    async fn process(&self, id: ProcessId) -> Result<Option<ApprovalProcess>, StoreError> {
        self.try_process(id).await.map_err(StoreError::from)
    }

    async fn step(&self, id: StepId) -> Result<Option<ApprovalStep>, StoreError> {
        self.try_step(id).await.map_err(StoreError::from)
    }

    async fn steps_for_process(&self, id: ProcessId) -> Result<Vec<ApprovalStep>, StoreError> {
        self.try_steps_for_process(id).await.map_err(StoreError::from)
    }

    async fn complete_step(
        &self,
        id: StepId,
        decision: Decision,
        comment: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.try_complete_step(id, decision, comment, completed_at)
            .await
            .map_err(StoreError::from)
    }

    async fn activate_step(
        &self,
        id: StepId,
        assigned_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.try_activate_step(id, assigned_at).await.map_err(StoreError::from)
    }

    async fn finish_process(
        &self,
        id: ProcessId,
        status: ProcessStatus,
        end_date: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.try_finish_process(id, status, end_date).await.map_err(StoreError::from)
    }

    async fn list_processes(&self) -> Result<Vec<ApprovalProcess>, StoreError> {
        self.try_list_processes().await.map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use docflow_core::audit::InMemoryAuditSink;
    use docflow_core::domain::document::DocumentStatus;
    use docflow_core::domain::process::ProcessStatus;
    use docflow_core::domain::step::{Decision, StepStatus};
    use docflow_core::domain::user::{Role, UserId};
    use docflow_core::engine::ApprovalWorkflowEngine;
    use docflow_core::store::{DocumentCatalog, NewProcess, NewStep, WorkflowStore};

    use super::SqlWorkflowStore;
    use crate::repositories::{SqlDocumentCatalog, SqlIdentityProvider, SqlUserDirectory};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    /// Parent rows so that process/step FK constraints are satisfied.
    async fn seed_parents(pool: &sqlx::SqlitePool) -> (i64, Vec<UserId>) {
        let users = SqlUserDirectory::new(pool.clone());
        let mut user_ids = Vec::new();
        for (username, full_name) in
            [("petrov", "Ivan Petrov"), ("sidorova", "Elena Sidorova"), ("kim", "Olga Kim")]
        {
            let user =
                users.create_user(username, full_name, Role::Manager).await.expect("create user");
            user_ids.push(user.id);
        }

        let catalog = SqlDocumentCatalog::new(pool.clone());
        let document =
            catalog.create_document("Supply contract", Some("legal")).await.expect("create doc");

        (document.id.0, user_ids)
    }

    fn chain(assignees: &[UserId]) -> Vec<NewStep> {
        assignees
            .iter()
            .enumerate()
            .map(|(index, assignee)| NewStep {
                step_number: index as u32 + 1,
                assignee_id: *assignee,
                status: if index == 0 { StepStatus::Pending } else { StepStatus::Waiting },
                assigned_at: (index == 0).then(Utc::now),
            })
            .collect()
    }

    #[tokio::test]
    async fn create_process_round_trips_with_ordered_steps() {
        let pool = setup().await;
        let (document_id, users) = seed_parents(&pool).await;
        let store = SqlWorkflowStore::new(pool);

        let now = Utc::now();
        let snapshot = store
            .create_process(
                NewProcess {
                    document_id: docflow_core::domain::document::DocumentId(document_id),
                    initiator_id: users[0],
                    status: ProcessStatus::InProgress,
                    start_date: now,
                    deadline: now + Duration::days(5),
                },
                chain(&users),
            )
            .await
            .expect("create");

        let found =
            store.process(snapshot.process.id).await.expect("find").expect("should exist");
        assert_eq!(found.status, ProcessStatus::InProgress);
        assert!(found.end_date.is_none());

        let steps = store.steps_for_process(snapshot.process.id).await.expect("steps");
        assert_eq!(steps.len(), 3);
        assert_eq!(steps.iter().map(|s| s.step_number).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(steps[0].status, StepStatus::Pending);
        assert!(steps[0].assigned_at.is_some());
        assert_eq!(steps[1].status, StepStatus::Waiting);
        assert!(steps[1].assigned_at.is_none());
    }

    #[tokio::test]
    async fn step_mutations_round_trip() {
        let pool = setup().await;
        let (document_id, users) = seed_parents(&pool).await;
        let store = SqlWorkflowStore::new(pool);

        let now = Utc::now();
        let snapshot = store
            .create_process(
                NewProcess {
                    document_id: docflow_core::domain::document::DocumentId(document_id),
                    initiator_id: users[0],
                    status: ProcessStatus::InProgress,
                    start_date: now,
                    deadline: now + Duration::days(5),
                },
                chain(&users[..2]),
            )
            .await
            .expect("create");

        store
            .complete_step(snapshot.steps[0].id, Decision::Approve, "ok by legal", now)
            .await
            .expect("complete");
        store.activate_step(snapshot.steps[1].id, now).await.expect("activate");
        store
            .finish_process(snapshot.process.id, ProcessStatus::Rejected, now)
            .await
            .expect("finish");

        let steps = store.steps_for_process(snapshot.process.id).await.expect("steps");
        assert_eq!(steps[0].status, StepStatus::Completed);
        assert_eq!(steps[0].decision, Some(Decision::Approve));
        assert_eq!(steps[0].comment, "ok by legal");
        assert!(steps[0].completed_at.is_some());
        assert_eq!(steps[1].status, StepStatus::Pending);

        let process =
            store.process(snapshot.process.id).await.expect("find").expect("should exist");
        assert_eq!(process.status, ProcessStatus::Rejected);
        assert!(process.end_date.is_some());
    }

    #[tokio::test]
    async fn engine_runs_the_full_chain_over_sql_storage() {
        let pool = setup().await;
        let (document_id, users) = seed_parents(&pool).await;
        let document_id = docflow_core::domain::document::DocumentId(document_id);

        let catalog = Arc::new(SqlDocumentCatalog::new(pool.clone()));
        let engine = ApprovalWorkflowEngine::new(
            Arc::new(SqlWorkflowStore::new(pool.clone())),
            catalog.clone(),
            Arc::new(SqlIdentityProvider::new(pool.clone(), users[0])),
            Arc::new(InMemoryAuditSink::default()),
        );

        let snapshot = engine
            .start_process(document_id, &[users[1], users[2]], None)
            .await
            .expect("start");
        assert_eq!(
            catalog.document(document_id).await.expect("find").expect("exists").status,
            DocumentStatus::Review
        );

        let approved = engine
            .record_decision(snapshot.process.id, snapshot.steps[0].id, Decision::Approve, None)
            .await
            .expect("approve");
        assert!(approved);

        let mid = engine.snapshot(snapshot.process.id).await.expect("snapshot").expect("exists");
        assert_eq!(mid.current_step().map(|s| s.assignee_id), Some(users[2]));

        let finished = engine
            .record_decision(snapshot.process.id, mid.steps[1].id, Decision::Approve, None)
            .await
            .expect("approve last");
        assert!(finished);

        let done = engine.snapshot(snapshot.process.id).await.expect("snapshot").expect("exists");
        assert_eq!(done.process.status, ProcessStatus::Completed);
        assert_eq!(
            catalog.document(document_id).await.expect("find").expect("exists").status,
            DocumentStatus::Approved
        );
    }
}
