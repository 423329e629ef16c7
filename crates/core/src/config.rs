use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matching::DEFAULT_ADDRESS_THRESHOLD;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub matching: MatchingConfig,
    pub reconcile: ReconcileConfig,
    pub billing: BillingConfig,
    pub email: EmailConfig,
    pub geocode: GeocodeConfig,
    pub poll: PollConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MatchingConfig {
    pub address_threshold: u8,
    pub job_candidate_limit: u32,
}

#[derive(Clone, Debug)]
pub struct ReconcileConfig {
    pub placeholder_email: String,
    pub placeholder_name: String,
    pub fallback_created_by: String,
}

#[derive(Clone, Debug)]
pub struct BillingConfig {
    pub enabled: bool,
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub organization_id: Option<String>,
    pub dev_key: Option<SecretString>,
    pub webhook_secret: Option<SecretString>,
    pub signature_header: String,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub from_address: String,
}

#[derive(Clone, Debug)]
pub struct GeocodeConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PollConfig {
    pub shared_secret: Option<SecretString>,
    pub batch_limit: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub billing_enabled: Option<bool>,
    pub billing_base_url: Option<String>,
    pub billing_webhook_secret: Option<String>,
    pub email_enabled: Option<bool>,
    pub poll_shared_secret: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://fieldops.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            matching: MatchingConfig {
                address_threshold: DEFAULT_ADDRESS_THRESHOLD,
                job_candidate_limit: 100,
            },
            reconcile: ReconcileConfig {
                placeholder_email: "placeholder@fieldops.invalid".to_string(),
                placeholder_name: "N/A".to_string(),
                fallback_created_by: "system".to_string(),
            },
            billing: BillingConfig {
                enabled: false,
                base_url: "https://api.billing.example.com/v3".to_string(),
                username: None,
                password: None,
                organization_id: None,
                dev_key: None,
                webhook_secret: None,
                signature_header: "x-billing-signature".to_string(),
            },
            email: EmailConfig {
                enabled: false,
                base_url: "https://api.email.example.com".to_string(),
                api_key: None,
                from_address: "billing@fieldops.invalid".to_string(),
            },
            geocode: GeocodeConfig { enabled: false, base_url: None },
            poll: PollConfig { shared_secret: None, batch_limit: 200 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("fieldops.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Socket address the HTTP server binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(matching) = patch.matching {
            if let Some(address_threshold) = matching.address_threshold {
                self.matching.address_threshold = address_threshold;
            }
            if let Some(job_candidate_limit) = matching.job_candidate_limit {
                self.matching.job_candidate_limit = job_candidate_limit;
            }
        }

        if let Some(reconcile) = patch.reconcile {
            if let Some(placeholder_email) = reconcile.placeholder_email {
                self.reconcile.placeholder_email = placeholder_email;
            }
            if let Some(placeholder_name) = reconcile.placeholder_name {
                self.reconcile.placeholder_name = placeholder_name;
            }
            if let Some(fallback_created_by) = reconcile.fallback_created_by {
                self.reconcile.fallback_created_by = fallback_created_by;
            }
        }

        if let Some(billing) = patch.billing {
            if let Some(enabled) = billing.enabled {
                self.billing.enabled = enabled;
            }
            if let Some(base_url) = billing.base_url {
                self.billing.base_url = base_url;
            }
            if let Some(username) = billing.username {
                self.billing.username = Some(username);
            }
            if let Some(password) = billing.password {
                self.billing.password = Some(secret_value(password));
            }
            if let Some(organization_id) = billing.organization_id {
                self.billing.organization_id = Some(organization_id);
            }
            if let Some(dev_key) = billing.dev_key {
                self.billing.dev_key = Some(secret_value(dev_key));
            }
            if let Some(webhook_secret) = billing.webhook_secret {
                self.billing.webhook_secret = Some(secret_value(webhook_secret));
            }
            if let Some(signature_header) = billing.signature_header {
                self.billing.signature_header = signature_header;
            }
        }

        if let Some(email) = patch.email {
            if let Some(enabled) = email.enabled {
                self.email.enabled = enabled;
            }
            if let Some(base_url) = email.base_url {
                self.email.base_url = base_url;
            }
            if let Some(api_key) = email.api_key {
                self.email.api_key = Some(secret_value(api_key));
            }
            if let Some(from_address) = email.from_address {
                self.email.from_address = from_address;
            }
        }

        if let Some(geocode) = patch.geocode {
            if let Some(enabled) = geocode.enabled {
                self.geocode.enabled = enabled;
            }
            if let Some(base_url) = geocode.base_url {
                self.geocode.base_url = Some(base_url);
            }
        }

        if let Some(poll) = patch.poll {
            if let Some(shared_secret) = poll.shared_secret {
                self.poll.shared_secret = Some(secret_value(shared_secret));
            }
            if let Some(batch_limit) = poll.batch_limit {
                self.poll.batch_limit = batch_limit;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FIELDOPS_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("FIELDOPS_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("FIELDOPS_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("FIELDOPS_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("FIELDOPS_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FIELDOPS_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("FIELDOPS_SERVER_PORT") {
            self.server.port = parse_u16("FIELDOPS_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("FIELDOPS_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("FIELDOPS_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("FIELDOPS_MATCHING_ADDRESS_THRESHOLD") {
            self.matching.address_threshold =
                parse_u8("FIELDOPS_MATCHING_ADDRESS_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("FIELDOPS_MATCHING_JOB_CANDIDATE_LIMIT") {
            self.matching.job_candidate_limit =
                parse_u32("FIELDOPS_MATCHING_JOB_CANDIDATE_LIMIT", &value)?;
        }

        if let Some(value) = read_env("FIELDOPS_RECONCILE_PLACEHOLDER_EMAIL") {
            self.reconcile.placeholder_email = value;
        }
        if let Some(value) = read_env("FIELDOPS_RECONCILE_FALLBACK_CREATED_BY") {
            self.reconcile.fallback_created_by = value;
        }

        if let Some(value) = read_env("FIELDOPS_BILLING_ENABLED") {
            self.billing.enabled = parse_bool("FIELDOPS_BILLING_ENABLED", &value)?;
        }
        if let Some(value) = read_env("FIELDOPS_BILLING_BASE_URL") {
            self.billing.base_url = value;
        }
        if let Some(value) = read_env("FIELDOPS_BILLING_USERNAME") {
            self.billing.username = Some(value);
        }
        if let Some(value) = read_env("FIELDOPS_BILLING_PASSWORD") {
            self.billing.password = Some(secret_value(value));
        }
        if let Some(value) = read_env("FIELDOPS_BILLING_ORGANIZATION_ID") {
            self.billing.organization_id = Some(value);
        }
        if let Some(value) = read_env("FIELDOPS_BILLING_DEV_KEY") {
            self.billing.dev_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FIELDOPS_BILLING_WEBHOOK_SECRET") {
            self.billing.webhook_secret = Some(secret_value(value));
        }

        if let Some(value) = read_env("FIELDOPS_EMAIL_ENABLED") {
            self.email.enabled = parse_bool("FIELDOPS_EMAIL_ENABLED", &value)?;
        }
        if let Some(value) = read_env("FIELDOPS_EMAIL_BASE_URL") {
            self.email.base_url = value;
        }
        if let Some(value) = read_env("FIELDOPS_EMAIL_API_KEY") {
            self.email.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FIELDOPS_EMAIL_FROM_ADDRESS") {
            self.email.from_address = value;
        }

        if let Some(value) = read_env("FIELDOPS_GEOCODE_ENABLED") {
            self.geocode.enabled = parse_bool("FIELDOPS_GEOCODE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("FIELDOPS_GEOCODE_BASE_URL") {
            self.geocode.base_url = Some(value);
        }

        if let Some(value) = read_env("FIELDOPS_POLL_SHARED_SECRET") {
            self.poll.shared_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("FIELDOPS_POLL_BATCH_LIMIT") {
            self.poll.batch_limit = parse_u32("FIELDOPS_POLL_BATCH_LIMIT", &value)?;
        }

        let log_level =
            read_env("FIELDOPS_LOGGING_LEVEL").or_else(|| read_env("FIELDOPS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FIELDOPS_LOGGING_FORMAT").or_else(|| read_env("FIELDOPS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(enabled) = overrides.billing_enabled {
            self.billing.enabled = enabled;
        }
        if let Some(base_url) = overrides.billing_base_url {
            self.billing.base_url = base_url;
        }
        if let Some(webhook_secret) = overrides.billing_webhook_secret {
            self.billing.webhook_secret = Some(secret_value(webhook_secret));
        }
        if let Some(enabled) = overrides.email_enabled {
            self.email.enabled = enabled;
        }
        if let Some(shared_secret) = overrides.poll_shared_secret {
            self.poll.shared_secret = Some(secret_value(shared_secret));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_matching(&self.matching)?;
        validate_reconcile(&self.reconcile)?;
        validate_billing(&self.billing)?;
        validate_email(&self.email)?;
        validate_geocode(&self.geocode)?;
        validate_poll(&self.poll)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("fieldops.toml"), PathBuf::from("config/fieldops.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_matching(matching: &MatchingConfig) -> Result<(), ConfigError> {
    if matching.address_threshold == 0 || matching.address_threshold > 100 {
        return Err(ConfigError::Validation(
            "matching.address_threshold must be in range 1..=100".to_string(),
        ));
    }

    if matching.job_candidate_limit == 0 {
        return Err(ConfigError::Validation(
            "matching.job_candidate_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_reconcile(reconcile: &ReconcileConfig) -> Result<(), ConfigError> {
    if !reconcile.placeholder_email.contains('@') {
        return Err(ConfigError::Validation(
            "reconcile.placeholder_email must be an email address".to_string(),
        ));
    }

    if reconcile.placeholder_name.trim().is_empty()
        || reconcile.fallback_created_by.trim().is_empty()
    {
        return Err(ConfigError::Validation(
            "reconcile.placeholder_name and reconcile.fallback_created_by must not be empty"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_billing(billing: &BillingConfig) -> Result<(), ConfigError> {
    if billing.signature_header.trim().is_empty() {
        return Err(ConfigError::Validation(
            "billing.signature_header must not be empty".to_string(),
        ));
    }

    if !billing.enabled {
        return Ok(());
    }

    require_http_url("billing.base_url", &billing.base_url)?;

    let missing_username =
        billing.username.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
    let missing_password = is_blank_secret(billing.password.as_ref());
    let missing_org =
        billing.organization_id.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
    let missing_dev_key = is_blank_secret(billing.dev_key.as_ref());

    if missing_username || missing_password || missing_org || missing_dev_key {
        return Err(ConfigError::Validation(
            "billing.enabled is true but billing.username, billing.password, \
             billing.organization_id and billing.dev_key are not all set"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_email(email: &EmailConfig) -> Result<(), ConfigError> {
    if !email.enabled {
        return Ok(());
    }

    require_http_url("email.base_url", &email.base_url)?;

    if is_blank_secret(email.api_key.as_ref()) {
        return Err(ConfigError::Validation(
            "email.api_key is required when email.enabled is true".to_string(),
        ));
    }

    if !email.from_address.contains('@') {
        return Err(ConfigError::Validation(
            "email.from_address must be an email address".to_string(),
        ));
    }

    Ok(())
}

fn validate_geocode(geocode: &GeocodeConfig) -> Result<(), ConfigError> {
    if !geocode.enabled {
        return Ok(());
    }

    match &geocode.base_url {
        Some(base_url) => require_http_url("geocode.base_url", base_url),
        None => Err(ConfigError::Validation(
            "geocode.base_url is required when geocode.enabled is true".to_string(),
        )),
    }
}

fn validate_poll(poll: &PollConfig) -> Result<(), ConfigError> {
    if poll.batch_limit == 0 {
        return Err(ConfigError::Validation(
            "poll.batch_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn require_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn is_blank_secret(value: Option<&SecretString>) -> bool {
    value.map(|secret| secret.expose_secret().trim().is_empty()).unwrap_or(true)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    matching: Option<MatchingPatch>,
    reconcile: Option<ReconcilePatch>,
    billing: Option<BillingPatch>,
    email: Option<EmailPatch>,
    geocode: Option<GeocodePatch>,
    poll: Option<PollPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingPatch {
    address_threshold: Option<u8>,
    job_candidate_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ReconcilePatch {
    placeholder_email: Option<String>,
    placeholder_name: Option<String>,
    fallback_created_by: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BillingPatch {
    enabled: Option<bool>,
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    organization_id: Option<String>,
    dev_key: Option<String>,
    webhook_secret: Option<String>,
    signature_header: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailPatch {
    enabled: Option<bool>,
    base_url: Option<String>,
    api_key: Option<String>,
    from_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeocodePatch {
    enabled: Option<bool>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PollPatch {
    shared_secret: Option<String>,
    batch_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
