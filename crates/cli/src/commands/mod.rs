pub mod config;
pub mod decide;
pub mod doctor;
pub mod inbox;
pub mod list;
pub mod migrate;
pub mod render;
pub mod seed;
pub mod start;

use std::sync::Arc;

use docflow_core::audit::NoopAuditSink;
use docflow_core::config::AppConfig;
use docflow_core::domain::user::{User, UserId};
use docflow_core::engine::ApprovalWorkflowEngine;
use docflow_core::errors::EngineError;
use docflow_core::store::{IdentityProvider, StaticIdentityProvider};
use docflow_db::{
    connect_with_settings, DbPool, SqlDocumentCatalog, SqlIdentityProvider, SqlUserDirectory,
    SqlWorkflowStore,
};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Shared failure triple for async command bodies: error class, message,
/// and the exit code the class maps to.
pub(crate) type CommandFailure = (&'static str, String, u8);

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    use docflow_core::config::LoadOptions;

    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(command, "config_validation", format!("configuration issue: {error}"), 2)
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

pub(crate) async fn open_pool(config: &AppConfig) -> Result<DbPool, CommandFailure> {
    connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))
}

pub(crate) async fn resolve_user(pool: &DbPool, username: &str) -> Result<User, CommandFailure> {
    let directory = SqlUserDirectory::new(pool.clone());
    let found = directory
        .find_by_username(username)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    found.ok_or_else(|| ("unknown_user", format!("no user named `{username}`"), 6u8))
}

/// Wires the workflow engine over SQL storage. Commands that act on behalf
/// of a user pass the resolved session id; read-only maintenance commands
/// run anonymously.
pub(crate) fn workflow_engine(
    pool: &DbPool,
    config: &AppConfig,
    session_user: Option<UserId>,
) -> ApprovalWorkflowEngine {
    let identity: Arc<dyn IdentityProvider> = match session_user {
        Some(id) => Arc::new(SqlIdentityProvider::new(pool.clone(), id)),
        None => Arc::new(StaticIdentityProvider::anonymous()),
    };

    ApprovalWorkflowEngine::new(
        Arc::new(SqlWorkflowStore::new(pool.clone())),
        Arc::new(SqlDocumentCatalog::new(pool.clone())),
        identity,
        Arc::new(NoopAuditSink),
    )
    .with_default_deadline_days(config.workflow.default_deadline_days)
}

pub(crate) fn engine_failure(error: EngineError) -> CommandFailure {
    let class = match &error {
        EngineError::DocumentNotFound(_) => "document_not_found",
        EngineError::ProcessNotFound(_) => "process_not_found",
        EngineError::EmptyApproverList => "empty_approver_list",
        EngineError::Unauthenticated => "unauthenticated",
        EngineError::InvariantViolation(_) => "invariant_violation",
        EngineError::Store(_) => "storage",
    };
    (class, error.to_string(), 7u8)
}
