use crate::commands::{self, CommandResult};
use docflow_db::{fixtures, migrations};

pub fn run() -> CommandResult {
    let config = match commands::load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match commands::build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = commands::open_pool(&config).await?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let summary = fixtures::seed_demo(&pool)
            .await
            .map_err(|error| ("seed", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<_, commands::CommandFailure>(summary)
    });

    match result {
        Ok(summary) => CommandResult::success(
            "seed",
            format!(
                "seeded {} users and {} documents",
                summary.users_created, summary.documents_created
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
