use chrono::Utc;
use docflow_core::domain::document::DocumentId;

use crate::commands::{self, render, CommandResult};

/// Lists approval processes. Filters compose: `--document` or `--initiator`
/// narrow the base set, `--terminal` and `--overdue` drop rows from it.
pub fn run(
    overdue: bool,
    terminal: bool,
    initiator: Option<&str>,
    document: Option<i64>,
) -> CommandResult {
    let config = match commands::load_config("list") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match commands::build_runtime("list") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = commands::open_pool(&config).await?;
        let engine = commands::workflow_engine(&pool, &config, None);

        let mut snapshots = if let Some(document_id) = document {
            engine.list_for_document(DocumentId(document_id)).await
        } else if let Some(username) = initiator {
            let user = commands::resolve_user(&pool, username).await?;
            engine.list_initiated_by(user.id).await
        } else if terminal {
            engine.list_terminal().await
        } else {
            engine.list_all().await
        }
        .map_err(commands::engine_failure)?;

        if terminal {
            snapshots.retain(|snapshot| snapshot.process.is_terminal());
        }
        let now = Utc::now();
        if overdue {
            snapshots.retain(|snapshot| snapshot.process.is_overdue_at(now));
        }

        let views = render::process_views(&snapshots, now);
        pool.close().await;
        Ok::<_, commands::CommandFailure>(views)
    });

    match result {
        Ok(views) => {
            let message = format!("{} processes", views.len());
            let data = serde_json::to_value(&views).unwrap_or(serde_json::Value::Null);
            CommandResult::success_with_data("list", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("list", error_class, message, exit_code)
        }
    }
}
