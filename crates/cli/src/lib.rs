pub mod commands;

use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use docflow_core::domain::step::Decision;

#[derive(Debug, Parser)]
#[command(
    name = "docflow",
    about = "DocFlow approval workflow CLI",
    long_about = "Route documents through sequential approval chains and operate the \
                  backing database: migrations, fixtures, config inspection, readiness checks.",
    after_help = "Examples:\n  docflow migrate\n  docflow seed\n  docflow start --document 1 --approver sidorova --approver kim --as-user volkov\n  docflow approve --process 1 --step 1 --comment \"looks good\"\n  docflow inbox --as-user kim\n  docflow list --overdue"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Apply migrations and load the deterministic demo dataset (idempotent)")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, database connectivity, and schema readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Start an approval process for a document with an ordered approver chain")]
    Start {
        #[arg(long, help = "Id of the document to route")]
        document: i64,
        #[arg(
            long = "approver",
            required = true,
            help = "Approver username, repeat in routing order"
        )]
        approvers: Vec<String>,
        #[arg(long, help = "Explicit deadline as an RFC 3339 timestamp")]
        deadline: Option<DateTime<Utc>>,
        #[arg(long = "as-user", help = "Username acting as the initiator")]
        as_user: String,
    },
    #[command(about = "Approve the pending step of a process")]
    Approve {
        #[arg(long, help = "Process id")]
        process: i64,
        #[arg(long, help = "Step id")]
        step: i64,
        #[arg(long, help = "Optional approval comment")]
        comment: Option<String>,
    },
    #[command(about = "Reject the pending step, which terminates the whole process")]
    Reject {
        #[arg(long, help = "Process id")]
        process: i64,
        #[arg(long, help = "Step id")]
        step: i64,
        #[arg(long, help = "Rejection comment, a default is used when omitted")]
        comment: Option<String>,
    },
    #[command(about = "List processes whose pending step is assigned to a user")]
    Inbox {
        #[arg(long = "as-user", help = "Username whose inbox to show")]
        as_user: String,
    },
    #[command(about = "List approval processes with optional filters")]
    List {
        #[arg(long, help = "Only processes past their deadline and still in progress")]
        overdue: bool,
        #[arg(long, help = "Only completed or rejected processes")]
        terminal: bool,
        #[arg(long, help = "Only processes started by this username")]
        initiator: Option<String>,
        #[arg(long, help = "Only processes routing this document id")]
        document: Option<i64>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Start { document, approvers, deadline, as_user } => {
            commands::start::run(document, &approvers, deadline, &as_user)
        }
        Command::Approve { process, step, comment } => {
            commands::decide::run(Decision::Approve, process, step, comment.as_deref())
        }
        Command::Reject { process, step, comment } => {
            commands::decide::run(Decision::Reject, process, step, comment.as_deref())
        }
        Command::Inbox { as_user } => commands::inbox::run(&as_user),
        Command::List { overdue, terminal, initiator, document } => {
            commands::list::run(overdue, terminal, initiator.as_deref(), document)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn init_logging() {
    use docflow_core::config::LogFormat::*;
    use docflow_core::config::{AppConfig, LoadOptions};
    use tracing::Level;

    let config = AppConfig::load(LoadOptions::default()).unwrap_or_default();
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // Commands print JSON to stdout, so logs go to stderr. A second init in
    // the same process (tests) is a no-op.
    let _ = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
}
