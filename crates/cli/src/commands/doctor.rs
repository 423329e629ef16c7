use fieldops_core::config::{AppConfig, LoadOptions};
use fieldops_db::{connect_with_config, DbPool};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: &LoadOptions, json_output: bool) -> String {
    let report = build_report(options);

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.extend(integration_checks(&config));
            checks.extend(database_checks(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["billing_readiness", "database_connectivity", "database_schema"] {
                checks.push(DoctorCheck::skipped(
                    name,
                    "skipped because configuration did not load",
                ));
            }
        }
    }

    // Disabled integrations are reported as skipped and do not fail the report.
    let healthy = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if healthy { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if healthy {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn integration_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let billing = if config.billing.enabled {
        let webhook = if config.billing.webhook_secret.is_some() {
            "webhook signatures verified"
        } else {
            "webhook signatures NOT verified (no secret)"
        };
        DoctorCheck::pass(
            "billing_readiness",
            format!("credentials present for `{}`; {webhook}", config.billing.base_url),
        )
    } else {
        DoctorCheck::skipped("billing_readiness", "billing integration disabled")
    };

    let email = if config.email.enabled {
        DoctorCheck::pass(
            "email_readiness",
            format!("sending as `{}` via `{}`", config.email.from_address, config.email.base_url),
        )
    } else {
        DoctorCheck::skipped("email_readiness", "confirmation emails disabled")
    };

    let geocode = if config.geocode.enabled {
        DoctorCheck::pass("geocode_readiness", "county lookup enabled")
    } else {
        DoctorCheck::skipped("geocode_readiness", "county lookup disabled; ledger uses `Unknown`")
    };

    vec![billing, email, geocode]
}

fn database_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck::fail(
                "database_connectivity",
                format!("failed to initialize async runtime: {error}"),
            )];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("database_schema", "skipped because connection failed"),
                ];
            }
        };

        let connectivity = DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        );
        let schema = schema_check(&pool).await;
        pool.close().await;
        vec![connectivity, schema]
    })
}

async fn schema_check(pool: &DbPool) -> DoctorCheck {
    let probe =
        sqlx::query_scalar::<_, i64>("SELECT last_value FROM job_number_sequence WHERE id = 1")
            .fetch_optional(pool)
            .await;
    match probe {
        Ok(Some(last_value)) => DoctorCheck::pass(
            "database_schema",
            format!("migrations applied; last job number issued is {last_value}"),
        ),
        Ok(None) => DoctorCheck::fail(
            "database_schema",
            "job number sequence is not seeded; run `fieldops migrate`",
        ),
        Err(error) => DoctorCheck::fail(
            "database_schema",
            format!("schema not ready ({error}); run `fieldops migrate`"),
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
