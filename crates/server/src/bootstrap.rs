use std::sync::Arc;

use axum::Router;
use fieldops_core::config::{AppConfig, ConfigError, LoadOptions};
use fieldops_db::repositories::{
    SqlCustomerRepository, SqlJobRepository, SqlProposalRepository,
    SqlSubmissionReceiptRepository, SqlSyncRunRepository,
};
use fieldops_db::{connect_with_config, migrations, DbPool, SubmissionReceiptRepository};
use thiserror::Error;
use tracing::info;

use crate::billing::{BillingClient, BillingError, HttpBillingClient};
use crate::email::{EmailError, EmailSender, EmailTemplates, HttpEmailSender, NoopEmailSender};
use crate::geocode::{CountyLookup, GeocodeError, HttpCountyLookup, NoopCountyLookup};
use crate::health;
use crate::payments::{self, PaymentPoller, PaymentReconciler, PaymentsState, ProposalService};
use crate::submissions::{self, SubmissionReconciler, SubmissionsState};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub services: Services,
}

/// Reconcilers and services wired to SQL repositories and the configured integrations.
#[derive(Clone)]
pub struct Services {
    pub submissions: Arc<SubmissionReconciler>,
    pub receipts: Arc<dyn SubmissionReceiptRepository>,
    pub payments: Arc<PaymentReconciler>,
    pub poller: Arc<PaymentPoller>,
    pub proposals: Arc<ProposalService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Billing(#[from] BillingError),
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_config(&config.database)
        .await
        .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let services = build_services(&config, &db_pool)?;
    Ok(Application { config, db_pool, services })
}

pub fn build_services(config: &AppConfig, pool: &DbPool) -> Result<Services, BootstrapError> {
    let customers = Arc::new(SqlCustomerRepository::new(pool.clone()));
    let jobs = Arc::new(SqlJobRepository::new(pool.clone()));
    let receipts: Arc<dyn SubmissionReceiptRepository> =
        Arc::new(SqlSubmissionReceiptRepository::new(pool.clone()));
    let proposals = Arc::new(SqlProposalRepository::new(pool.clone()));
    let runs = Arc::new(SqlSyncRunRepository::new(pool.clone()));

    let billing: Option<Arc<dyn BillingClient>> = if config.billing.enabled {
        Some(Arc::new(HttpBillingClient::from_config(&config.billing)?))
    } else {
        None
    };
    let email: Arc<dyn EmailSender> = if config.email.enabled {
        Arc::new(HttpEmailSender::from_config(&config.email)?)
    } else {
        Arc::new(NoopEmailSender)
    };
    let counties: Arc<dyn CountyLookup> = if config.geocode.enabled {
        Arc::new(HttpCountyLookup::from_config(&config.geocode)?)
    } else {
        Arc::new(NoopCountyLookup)
    };
    info!(
        event_name = "system.bootstrap.integrations",
        correlation_id = "bootstrap",
        billing = config.billing.enabled,
        email = config.email.enabled,
        geocode = config.geocode.enabled,
        "integration clients configured"
    );

    let submissions = Arc::new(SubmissionReconciler::new(
        customers.clone(),
        jobs.clone(),
        receipts.clone(),
        &config.matching,
        config.reconcile.clone(),
    ));
    let payments = Arc::new(PaymentReconciler::new(
        proposals.clone(),
        jobs.clone(),
        customers.clone(),
        email,
        Arc::new(EmailTemplates::embedded()?),
        counties,
    ));
    let poller = Arc::new(PaymentPoller::new(
        billing.clone(),
        proposals.clone(),
        runs,
        payments.clone(),
        config.poll.batch_limit,
    ));
    let proposals = Arc::new(ProposalService::new(proposals, jobs, customers, billing));

    Ok(Services { submissions, receipts, payments, poller, proposals })
}

impl Application {
    pub fn router(&self) -> Router {
        router(&self.config, self.db_pool.clone(), &self.services)
    }
}

pub fn router(config: &AppConfig, db_pool: DbPool, services: &Services) -> Router {
    health::router(db_pool)
        .merge(submissions::router(SubmissionsState {
            reconciler: services.submissions.clone(),
            receipts: services.receipts.clone(),
        }))
        .merge(payments::router(PaymentsState {
            reconciler: services.payments.clone(),
            poller: services.poller.clone(),
            proposals: services.proposals.clone(),
            webhook_secret: config.billing.webhook_secret.clone(),
            signature_header: config.billing.signature_header.clone(),
            poll_secret: config.poll.shared_secret.clone(),
        }))
}
