use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use fieldops_core::domain::customer::{Customer, CustomerId};
use fieldops_core::domain::job::{ChecklistItem, ChecklistUpdate, Job, JobId, JobNote, JobNumber};
use fieldops_core::domain::payment::{PaymentLedgerEntry, Proposal, ProposalId};
use fieldops_core::domain::submission::{SubmissionId, SubmissionReceipt};
use fieldops_core::domain::sync::SyncRun;
use fieldops_core::errors::ApplicationError;

pub mod customer;
pub mod job;
pub mod memory;
pub mod proposal;
pub mod submission;
pub mod sync_run;

pub use customer::SqlCustomerRepository;
pub use job::SqlJobRepository;
pub use memory::{
    InMemoryCustomerRepository, InMemoryJobRepository, InMemoryProposalRepository,
    InMemorySubmissionReceiptRepository, InMemorySyncRunRepository,
};
pub use proposal::SqlProposalRepository;
pub use submission::SqlSubmissionReceiptRepository;
pub use sync_run::SqlSyncRunRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("record not found: {0}")]
    NotFound(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(what) => Self::NotFound(what),
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
    async fn save(&self, customer: Customer) -> Result<(), RepositoryError>;

    /// Non-placeholder customers with a non-blank address, oldest first.
    async fn list_with_address(&self) -> Result<Vec<Customer>, RepositoryError>;

    /// Returns the placeholder customer, inserting `candidate` only when none exists yet.
    async fn get_or_create_placeholder(
        &self,
        candidate: Customer,
    ) -> Result<Customer, RepositoryError>;

    /// `created_by` of the oldest real customer, used to attribute system-created records.
    async fn first_created_by(&self) -> Result<Option<String>, RepositoryError>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;

    /// Most recent job whose service address equals `address`, ignoring case and
    /// surrounding whitespace.
    async fn find_by_exact_address(&self, address: &str) -> Result<Option<Job>, RepositoryError>;

    /// Up to `limit` jobs with a service address, most recently created first.
    async fn list_recent_with_address(&self, limit: u32) -> Result<Vec<Job>, RepositoryError>;

    /// Allocates the next job number. Concurrent callers never receive the same value.
    async fn next_job_number(&self) -> Result<JobNumber, RepositoryError>;

    async fn insert(&self, job: Job) -> Result<(), RepositoryError>;

    /// Rewrites both note collections of a job in one statement.
    async fn update_notes(
        &self,
        id: &JobId,
        additional_notes: &[JobNote],
        materials_notes: &[JobNote],
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn first_created_by(&self) -> Result<Option<String>, RepositoryError>;

    /// Adds a checklist item unless the job already has one with the same key.
    async fn ensure_checklist_item(&self, item: ChecklistItem) -> Result<(), RepositoryError>;

    async fn checklist(&self, job_id: &JobId) -> Result<Vec<ChecklistItem>, RepositoryError>;

    async fn check_item(
        &self,
        job_id: &JobId,
        item_key: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<ChecklistUpdate, RepositoryError>;
}

#[async_trait]
pub trait SubmissionReceiptRepository: Send + Sync {
    async fn find(&self, id: &SubmissionId) -> Result<Option<SubmissionReceipt>, RepositoryError>;
    async fn record(&self, receipt: SubmissionReceipt) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProposalRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, RepositoryError>;
    async fn save(&self, proposal: Proposal) -> Result<(), RepositoryError>;

    /// Proposal holding `invoice_id` on any of its stages.
    async fn find_by_invoice_id(&self, invoice_id: &str)
        -> Result<Option<Proposal>, RepositoryError>;

    /// Approved proposals with at least one invoiced stage still unpaid, oldest first.
    async fn list_open(&self, limit: u32) -> Result<Vec<Proposal>, RepositoryError>;

    /// Stores a ledger entry. Returns `false` when the stage already has one.
    async fn insert_ledger_entry(&self, entry: PaymentLedgerEntry)
        -> Result<bool, RepositoryError>;

    async fn ledger_for_proposal(
        &self,
        id: &ProposalId,
    ) -> Result<Vec<PaymentLedgerEntry>, RepositoryError>;
}

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    async fn save(&self, run: SyncRun) -> Result<(), RepositoryError>;
    async fn list_recent(&self, limit: u32) -> Result<Vec<SyncRun>, RepositoryError>;
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

/// Fixed-width UTC form so stored timestamps sort lexically in time order.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|value| parse_timestamp(column, &value)).transpose()
}

pub(crate) fn parse_decimal(column: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw).map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}
