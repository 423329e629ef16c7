use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use fieldops_cli::commands::{config, doctor, import, migrate, poll};
use fieldops_core::config::LoadOptions;
use fieldops_server::submissions::CSV_HEADER;
use serde_json::Value;

#[test]
fn migrate_returns_success_with_file_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());

    with_env(&[("FIELDOPS_DATABASE_URL", &url)], || {
        let result = migrate::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("FIELDOPS_DATABASE_URL", "postgres://localhost/fieldops")], || {
        let result = migrate::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn missing_explicit_config_file_is_a_config_failure() {
    with_env(&[], || {
        let options = LoadOptions {
            config_path: Some("does-not-exist/fieldops.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        };
        let result = poll::run(&options);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn import_reconciles_csv_into_jobs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());
    let csv_path = dir.path().join("submissions.csv");
    fs::write(
        &csv_path,
        format!(
            "{CSV_HEADER}\n\
             sub-1,10 Elm Dr,Repair,replaced filter,,Dana,Reyes,,,,\n\
             sub-2,10 Elm Dr,Repair,checked refrigerant,copper line set,Dana,Reyes,,,,\n"
        ),
    )
    .expect("write csv");

    with_env(&[("FIELDOPS_DATABASE_URL", &url)], || {
        let result = import::run(&LoadOptions::default(), &csv_path);
        assert_eq!(result.exit_code, 0, "expected successful import: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "import");
        assert_eq!(payload["details"]["submissions_processed"], 2);
        assert_eq!(payload["details"]["jobs_created"], 1);
        assert_eq!(payload["details"]["jobs_matched"], 1);

        let rerun = import::run(&LoadOptions::default(), &csv_path);
        let rerun_payload = parse_payload(&rerun.output);
        assert_eq!(rerun_payload["details"]["jobs_created"], 0);
        assert_eq!(rerun_payload["details"]["notes_added"], 0);
    });
}

#[test]
fn import_reports_unreadable_input() {
    with_env(&[], || {
        let result = import::run(&LoadOptions::default(), Path::new("missing/submissions.csv"));
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "input_read");
    });
}

#[test]
fn poll_with_billing_disabled_records_failed_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());

    with_env(&[("FIELDOPS_DATABASE_URL", &url)], || {
        let result = poll::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 8);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "poll");
        assert_eq!(payload["error_class"], "poll_failed");
        assert_eq!(payload["details"]["status"], "failed");
    });
}

#[test]
fn doctor_json_reports_ready_after_migrate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());

    with_env(&[("FIELDOPS_DATABASE_URL", &url)], || {
        assert_eq!(migrate::run(&LoadOptions::default()).exit_code, 0);

        let report = parse_payload(&doctor::run(&LoadOptions::default(), true));
        assert_eq!(report["overall_status"], "pass");

        let checks = report["checks"].as_array().expect("checks");
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("database_schema"), "pass");
        assert_eq!(status_of("billing_readiness"), "skipped");
    });
}

#[test]
fn doctor_fails_schema_check_before_migrate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(dir.path());

    with_env(&[("FIELDOPS_DATABASE_URL", &url)], || {
        let report = parse_payload(&doctor::run(&LoadOptions::default(), true));
        assert_eq!(report["overall_status"], "fail");
    });
}

#[test]
fn config_attributes_env_sources_and_redacts_secrets() {
    with_env(
        &[
            ("FIELDOPS_DATABASE_URL", "sqlite::memory:"),
            ("FIELDOPS_POLL_SHARED_SECRET", "poll-secret-value"),
        ],
        || {
            let output = config::run(&LoadOptions::default());
            assert!(output.contains(
                "- database.url = sqlite::memory: (source: env (FIELDOPS_DATABASE_URL))"
            ));
            assert!(output.contains("- poll.shared_secret = <redacted>"));
            assert!(output.contains("- billing.enabled = false (source: default)"));
            assert!(!output.contains("poll-secret-value"));
        },
    );
}

fn database_url(dir: &Path) -> String {
    format!("sqlite://{}", dir.join("fieldops.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "FIELDOPS_DATABASE_URL",
        "FIELDOPS_DATABASE_MAX_CONNECTIONS",
        "FIELDOPS_DATABASE_TIMEOUT_SECS",
        "FIELDOPS_SERVER_BIND_ADDRESS",
        "FIELDOPS_SERVER_PORT",
        "FIELDOPS_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "FIELDOPS_MATCHING_ADDRESS_THRESHOLD",
        "FIELDOPS_MATCHING_JOB_CANDIDATE_LIMIT",
        "FIELDOPS_RECONCILE_PLACEHOLDER_EMAIL",
        "FIELDOPS_RECONCILE_FALLBACK_CREATED_BY",
        "FIELDOPS_BILLING_ENABLED",
        "FIELDOPS_BILLING_BASE_URL",
        "FIELDOPS_BILLING_USERNAME",
        "FIELDOPS_BILLING_PASSWORD",
        "FIELDOPS_BILLING_ORGANIZATION_ID",
        "FIELDOPS_BILLING_DEV_KEY",
        "FIELDOPS_BILLING_WEBHOOK_SECRET",
        "FIELDOPS_EMAIL_ENABLED",
        "FIELDOPS_EMAIL_BASE_URL",
        "FIELDOPS_EMAIL_API_KEY",
        "FIELDOPS_EMAIL_FROM_ADDRESS",
        "FIELDOPS_GEOCODE_ENABLED",
        "FIELDOPS_GEOCODE_BASE_URL",
        "FIELDOPS_POLL_SHARED_SECRET",
        "FIELDOPS_POLL_BATCH_LIMIT",
        "FIELDOPS_LOGGING_LEVEL",
        "FIELDOPS_LOGGING_FORMAT",
        "FIELDOPS_LOG_LEVEL",
        "FIELDOPS_LOG_FORMAT",
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
