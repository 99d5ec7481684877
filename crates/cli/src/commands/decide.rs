use chrono::Utc;
use docflow_core::domain::process::ProcessId;
use docflow_core::domain::step::{Decision, StepId};

use crate::commands::{self, render, CommandResult};

/// Records an approve or reject decision on a pending step. A refused
/// decision (stale step id, wrong process, step no longer pending) is a
/// distinct non-zero exit so scripts can tell it from a hard failure.
pub fn run(
    decision: Decision,
    process: i64,
    step: i64,
    comment: Option<&str>,
) -> CommandResult {
    let command = decision.as_str();

    let config = match commands::load_config(command) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match commands::build_runtime(command) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = commands::open_pool(&config).await?;
        let engine = commands::workflow_engine(&pool, &config, None);

        let applied = engine
            .record_decision(ProcessId(process), StepId(step), decision, comment)
            .await
            .map_err(commands::engine_failure)?;

        if !applied {
            return Err((
                "decision_refused",
                format!("step {step} of process {process} is not awaiting a decision"),
                8u8,
            ));
        }

        let snapshot = engine
            .snapshot(ProcessId(process))
            .await
            .map_err(commands::engine_failure)?
            .ok_or_else(|| {
                ("process_not_found", format!("process {process} disappeared"), 7u8)
            })?;

        let view = render::process_view(&snapshot, Utc::now());
        pool.close().await;
        Ok::<_, commands::CommandFailure>(view)
    });

    match result {
        Ok(view) => {
            let message = format!(
                "recorded {} on step {} of process {} (process now {})",
                command, step, process, view.status
            );
            let data = serde_json::to_value(&view).unwrap_or(serde_json::Value::Null);
            CommandResult::success_with_data(command, message, data)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}
