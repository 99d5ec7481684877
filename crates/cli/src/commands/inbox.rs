use chrono::Utc;

use crate::commands::{self, render, CommandResult};

/// Lists the processes whose current pending step is assigned to the given
/// user, oldest first in creation order.
pub fn run(as_user: &str) -> CommandResult {
    let config = match commands::load_config("inbox") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match commands::build_runtime("inbox") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = commands::open_pool(&config).await?;
        let user = commands::resolve_user(&pool, as_user).await?;

        let engine = commands::workflow_engine(&pool, &config, None);
        let snapshots =
            engine.list_for_approver(user.id).await.map_err(commands::engine_failure)?;

        let views = render::process_views(&snapshots, Utc::now());
        pool.close().await;
        Ok::<_, commands::CommandFailure>((user.username, views))
    });

    match result {
        Ok((username, views)) => {
            let message = format!("{} processes waiting on {}", views.len(), username);
            let data = serde_json::to_value(&views).unwrap_or(serde_json::Value::Null);
            CommandResult::success_with_data("inbox", message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("inbox", error_class, message, exit_code)
        }
    }
}
