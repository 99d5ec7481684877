use chrono::{DateTime, Utc};
use docflow_core::domain::document::DocumentId;

use crate::commands::{self, render, CommandResult};

pub fn run(
    document: i64,
    approvers: &[String],
    deadline: Option<DateTime<Utc>>,
    as_user: &str,
) -> CommandResult {
    let config = match commands::load_config("start") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match commands::build_runtime("start") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = commands::open_pool(&config).await?;
        let initiator = commands::resolve_user(&pool, as_user).await?;

        let mut approver_ids = Vec::with_capacity(approvers.len());
        for username in approvers {
            approver_ids.push(commands::resolve_user(&pool, username).await?.id);
        }

        let engine = commands::workflow_engine(&pool, &config, Some(initiator.id));
        let snapshot = engine
            .start_process(DocumentId(document), &approver_ids, deadline)
            .await
            .map_err(commands::engine_failure)?;

        let view = render::process_view(&snapshot, Utc::now());
        pool.close().await;
        Ok::<_, commands::CommandFailure>(view)
    });

    match result {
        Ok(view) => {
            let message = format!(
                "started process {} for document {} with {} approval steps",
                view.process_id,
                view.document_id,
                view.steps.len()
            );
            let data = serde_json::to_value(&view).unwrap_or(serde_json::Value::Null);
            CommandResult::success_with_data("start", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("start", error_class, message, exit_code)
        }
    }
}
