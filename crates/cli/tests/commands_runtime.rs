use std::env;
use std::sync::{Mutex, OnceLock};

use docflow_cli::commands::{decide, inbox, list, migrate, seed, start};
use docflow_core::domain::step::Decision;
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("DOCFLOW_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("DOCFLOW_DATABASE_URL", "postgres://localhost/docflow")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("DOCFLOW_DATABASE_URL", &url)], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["status"], "ok");
        let message = first_payload["message"].as_str().unwrap_or("");
        assert!(message.contains("4 users"), "unexpected seed summary: {message}");
        assert!(message.contains("3 documents"), "unexpected seed summary: {message}");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["status"], "ok");
        let message = second_payload["message"].as_str().unwrap_or("");
        assert!(message.contains("0 users"), "second seed should create nothing: {message}");
    });
}

#[test]
fn start_rejects_unknown_usernames() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("DOCFLOW_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0);

        let result = start::run(1, &["sidorova".to_string()], None, "nobody");
        assert_eq!(result.exit_code, 6, "expected unknown user failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "unknown_user");
    });
}

#[test]
fn approval_chain_runs_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("DOCFLOW_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0);

        let started = start::run(
            1,
            &["sidorova".to_string(), "kim".to_string()],
            None,
            "volkov",
        );
        assert_eq!(started.exit_code, 0, "start failed: {}", started.output);

        let payload = parse_payload(&started.output);
        assert_eq!(payload["status"], "ok");
        let data = &payload["data"];
        assert_eq!(data["status"], "in_progress");
        assert_eq!(data["steps"][0]["status"], "pending");
        assert_eq!(data["steps"][1]["status"], "waiting");

        let process = data["process_id"].as_i64().expect("process id");
        let first_step = data["steps"][0]["step_id"].as_i64().expect("step id");
        let second_step = data["steps"][1]["step_id"].as_i64().expect("step id");

        let first = decide::run(Decision::Approve, process, first_step, Some("looks good"));
        assert_eq!(first.exit_code, 0, "first approval failed: {}", first.output);
        let payload = parse_payload(&first.output);
        assert_eq!(payload["data"]["steps"][1]["status"], "pending");

        let second = decide::run(Decision::Approve, process, second_step, None);
        assert_eq!(second.exit_code, 0, "second approval failed: {}", second.output);
        let payload = parse_payload(&second.output);
        assert_eq!(payload["data"]["status"], "completed");

        let empty_inbox = inbox::run("kim");
        assert_eq!(empty_inbox.exit_code, 0);
        let payload = parse_payload(&empty_inbox.output);
        assert_eq!(payload["data"].as_array().map(Vec::len), Some(0));

        let terminal = list::run(false, true, None, None);
        assert_eq!(terminal.exit_code, 0);
        let payload = parse_payload(&terminal.output);
        assert_eq!(payload["data"].as_array().map(Vec::len), Some(1));
    });
}

#[test]
fn rejection_terminates_the_process_and_repeat_decisions_are_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("DOCFLOW_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0);

        let started = start::run(
            2,
            &["sidorova".to_string(), "kim".to_string()],
            None,
            "volkov",
        );
        assert_eq!(started.exit_code, 0, "start failed: {}", started.output);

        let payload = parse_payload(&started.output);
        let process = payload["data"]["process_id"].as_i64().expect("process id");
        let first_step = payload["data"]["steps"][0]["step_id"].as_i64().expect("step id");

        let rejected = decide::run(Decision::Reject, process, first_step, None);
        assert_eq!(rejected.exit_code, 0, "rejection failed: {}", rejected.output);
        let payload = parse_payload(&rejected.output);
        assert_eq!(payload["data"]["status"], "rejected");
        assert_eq!(payload["data"]["steps"][1]["status"], "waiting");

        let repeat = decide::run(Decision::Approve, process, first_step, None);
        assert_eq!(repeat.exit_code, 8, "expected refused decision code");
        let payload = parse_payload(&repeat.output);
        assert_eq!(payload["error_class"], "decision_refused");
    });
}

#[test]
fn inbox_shows_only_the_current_assignee() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir);

    with_env(&[("DOCFLOW_DATABASE_URL", &url)], || {
        assert_eq!(seed::run().exit_code, 0);

        let started = start::run(
            3,
            &["sidorova".to_string(), "kim".to_string()],
            None,
            "petrov",
        );
        assert_eq!(started.exit_code, 0, "start failed: {}", started.output);

        let pending = inbox::run("sidorova");
        let payload = parse_payload(&pending.output);
        assert_eq!(payload["data"].as_array().map(Vec::len), Some(1));

        let waiting = inbox::run("kim");
        let payload = parse_payload(&waiting.output);
        assert_eq!(payload["data"].as_array().map(Vec::len), Some(0));
    });
}

fn database_url(dir: &tempfile::TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("docflow.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DOCFLOW_DATABASE_URL",
        "DOCFLOW_DATABASE_MAX_CONNECTIONS",
        "DOCFLOW_DATABASE_TIMEOUT_SECS",
        "DOCFLOW_WORKFLOW_DEADLINE_DAYS",
        "DOCFLOW_LOGGING_LEVEL",
        "DOCFLOW_LOGGING_FORMAT",
        "DOCFLOW_LOG_LEVEL",
        "DOCFLOW_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
