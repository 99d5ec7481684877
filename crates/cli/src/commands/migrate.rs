use crate::commands::{self, CommandResult};
use docflow_db::migrations;

pub fn run() -> CommandResult {
    let config = match commands::load_config("migrate") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match commands::build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = commands::open_pool(&config).await?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<(), commands::CommandFailure>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
