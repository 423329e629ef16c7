use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use fieldops_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

const UNSET: &str = "<unset>";

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries: Vec<(&str, String, Option<&str>)> = vec![
        ("database.url", config.database.url.clone(), Some("FIELDOPS_DATABASE_URL")),
        ("database.max_connections", config.database.max_connections.to_string(), Some("FIELDOPS_DATABASE_MAX_CONNECTIONS")),
        ("database.timeout_secs", config.database.timeout_secs.to_string(), Some("FIELDOPS_DATABASE_TIMEOUT_SECS")),
        ("server.bind_address", config.server.bind_address.clone(), Some("FIELDOPS_SERVER_BIND_ADDRESS")),
        ("server.port", config.server.port.to_string(), Some("FIELDOPS_SERVER_PORT")),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string(), Some("FIELDOPS_SERVER_GRACEFUL_SHUTDOWN_SECS")),
        ("matching.address_threshold", config.matching.address_threshold.to_string(), Some("FIELDOPS_MATCHING_ADDRESS_THRESHOLD")),
        ("matching.job_candidate_limit", config.matching.job_candidate_limit.to_string(), Some("FIELDOPS_MATCHING_JOB_CANDIDATE_LIMIT")),
        ("reconcile.placeholder_email", config.reconcile.placeholder_email.clone(), Some("FIELDOPS_RECONCILE_PLACEHOLDER_EMAIL")),
        ("reconcile.placeholder_name", config.reconcile.placeholder_name.clone(), None),
        ("reconcile.fallback_created_by", config.reconcile.fallback_created_by.clone(), Some("FIELDOPS_RECONCILE_FALLBACK_CREATED_BY")),
        ("billing.enabled", config.billing.enabled.to_string(), Some("FIELDOPS_BILLING_ENABLED")),
        ("billing.base_url", config.billing.base_url.clone(), Some("FIELDOPS_BILLING_BASE_URL")),
        ("billing.username", config.billing.username.clone().unwrap_or_else(|| UNSET.to_string()), Some("FIELDOPS_BILLING_USERNAME")),
        ("billing.password", redact(config.billing.password.as_ref()), Some("FIELDOPS_BILLING_PASSWORD")),
        ("billing.organization_id", config.billing.organization_id.clone().unwrap_or_else(|| UNSET.to_string()), Some("FIELDOPS_BILLING_ORGANIZATION_ID")),
        ("billing.dev_key", redact(config.billing.dev_key.as_ref()), Some("FIELDOPS_BILLING_DEV_KEY")),
        ("billing.webhook_secret", redact(config.billing.webhook_secret.as_ref()), Some("FIELDOPS_BILLING_WEBHOOK_SECRET")),
        ("billing.signature_header", config.billing.signature_header.clone(), None),
        ("email.enabled", config.email.enabled.to_string(), Some("FIELDOPS_EMAIL_ENABLED")),
        ("email.base_url", config.email.base_url.clone(), Some("FIELDOPS_EMAIL_BASE_URL")),
        ("email.api_key", redact(config.email.api_key.as_ref()), Some("FIELDOPS_EMAIL_API_KEY")),
        ("email.from_address", config.email.from_address.clone(), Some("FIELDOPS_EMAIL_FROM_ADDRESS")),
        ("geocode.enabled", config.geocode.enabled.to_string(), Some("FIELDOPS_GEOCODE_ENABLED")),
        ("geocode.base_url", config.geocode.base_url.clone().unwrap_or_else(|| UNSET.to_string()), Some("FIELDOPS_GEOCODE_BASE_URL")),
        ("poll.shared_secret", redact(config.poll.shared_secret.as_ref()), Some("FIELDOPS_POLL_SHARED_SECRET")),
        ("poll.batch_limit", config.poll.batch_limit.to_string(), Some("FIELDOPS_POLL_BATCH_LIMIT")),
        ("logging.level", config.logging.level.clone(), Some("FIELDOPS_LOGGING_LEVEL")),
        ("logging.format", format!("{:?}", config.logging.format), Some("FIELDOPS_LOGGING_FORMAT")),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in entries {
        let source =
            field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }
    lines.join("\n")
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("fieldops.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/fieldops.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact(secret: Option<&SecretString>) -> String {
    match secret {
        None => UNSET.to_string(),
        Some(secret) if secret.expose_secret().trim().is_empty() => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
    }
}
