//! Proposal approval and per-stage invoice issuance.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use fieldops_core::domain::customer::Customer;
use fieldops_core::domain::job::ChecklistItem;
use fieldops_core::domain::payment::{
    InvoiceLineItem, PaymentStage, Proposal, ProposalId, ProposalStatus,
};
use fieldops_core::errors::{ApplicationError, DomainError};
use fieldops_db::repositories::{CustomerRepository, JobRepository, ProposalRepository};
use serde::Serialize;
use tracing::{info, warn};

use super::PaymentsState;
use crate::api::{correlation_id, ApiError};
use crate::billing::{BillingClient, BillingSession, NewBillingCustomer, NewInvoice};

#[derive(Debug, Serialize)]
pub struct ApprovalOutcome {
    pub proposal: Proposal,
    /// Set when the deposit invoice could not be issued; the approval itself stands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_invoice_error: Option<String>,
}

pub struct ProposalService {
    proposals: Arc<dyn ProposalRepository>,
    jobs: Arc<dyn JobRepository>,
    customers: Arc<dyn CustomerRepository>,
    billing: Option<Arc<dyn BillingClient>>,
}

impl ProposalService {
    pub fn new(
        proposals: Arc<dyn ProposalRepository>,
        jobs: Arc<dyn JobRepository>,
        customers: Arc<dyn CustomerRepository>,
        billing: Option<Arc<dyn BillingClient>>,
    ) -> Self {
        Self { proposals, jobs, customers, billing }
    }

    async fn load(&self, id: &ProposalId) -> Result<Proposal, ApplicationError> {
        self.proposals
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("proposal `{id}`")))
    }

    /// Approves a draft proposal, seeds the job's payment checklist, then issues the deposit
    /// invoice when billing is enabled.
    pub async fn approve(&self, id: &ProposalId) -> Result<ApprovalOutcome, ApplicationError> {
        let mut proposal = self.load(id).await?;
        let now = Utc::now();
        proposal.approve(now)?;
        self.proposals.save(proposal.clone()).await?;

        for stage in PaymentStage::ALL {
            self.jobs
                .ensure_checklist_item(ChecklistItem {
                    job_id: proposal.job_id.clone(),
                    item_key: stage.checklist_key().to_string(),
                    label: stage.label().to_string(),
                    checked: false,
                    checked_at: None,
                })
                .await?;
        }
        info!(
            event_name = "proposals.approved",
            correlation_id = %proposal.id,
            job_id = %proposal.job_id,
            "proposal approved"
        );

        if self.billing.is_none() {
            return Ok(ApprovalOutcome { proposal, deposit_invoice_error: None });
        }
        match self.issue_stage_invoice(id, PaymentStage::Deposit).await {
            Ok(invoiced) => Ok(ApprovalOutcome { proposal: invoiced, deposit_invoice_error: None }),
            Err(error) => {
                warn!(
                    event_name = "proposals.deposit_invoice.failed",
                    correlation_id = %proposal.id,
                    error = %error,
                    "deposit invoice could not be issued"
                );
                Ok(ApprovalOutcome { proposal, deposit_invoice_error: Some(error.to_string()) })
            }
        }
    }

    /// Creates and sends the invoice for `stage`. A stage that already carries an invoice
    /// is returned unchanged.
    pub async fn issue_stage_invoice(
        &self,
        id: &ProposalId,
        stage: PaymentStage,
    ) -> Result<Proposal, ApplicationError> {
        let billing = self.billing.as_ref().ok_or_else(|| {
            ApplicationError::Integration("billing integration is disabled".to_string())
        })?;
        let mut proposal = self.load(id).await?;
        if proposal.status != ProposalStatus::Approved {
            return Err(DomainError::InvariantViolation(format!(
                "cannot invoice `{}` stage of a {} proposal",
                stage.as_str(),
                proposal.status.as_str()
            ))
            .into());
        }
        let entry = proposal.stage(stage).cloned().ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "proposal `{id}` has no `{}` stage",
                stage.as_str()
            ))
        })?;
        if entry.is_paid() {
            return Err(DomainError::StageAlreadyPaid { stage }.into());
        }
        if entry.invoice_id.is_some() {
            return Ok(proposal);
        }

        let session = billing.login().await?;
        let customer_id = self.ensure_billing_customer(billing.as_ref(), &session, &proposal).await?;
        let job_number = match self.jobs.find_by_id(&proposal.job_id).await? {
            Some(job) => job.job_number.0,
            None => proposal.job_id.0.clone(),
        };

        let invoice_id = billing
            .create_invoice(
                &session,
                &NewInvoice {
                    customer_id,
                    invoice_number: format!("{job_number}-{}", stage.as_str().to_ascii_uppercase()),
                    description: format!("{} for job {job_number}", stage.label()),
                    amount: entry.amount,
                    line_items: vec![InvoiceLineItem {
                        description: stage.label().to_string(),
                        amount: entry.amount,
                    }],
                },
            )
            .await?;
        billing.send_invoice(&session, &invoice_id).await?;

        proposal.assign_invoice(stage, invoice_id.clone(), Utc::now())?;
        self.proposals.save(proposal.clone()).await?;
        info!(
            event_name = "proposals.invoice.issued",
            correlation_id = %proposal.id,
            stage = stage.as_str(),
            invoice_id = %invoice_id,
            "stage invoice issued"
        );
        Ok(proposal)
    }

    async fn ensure_billing_customer(
        &self,
        billing: &dyn BillingClient,
        session: &BillingSession,
        proposal: &Proposal,
    ) -> Result<String, ApplicationError> {
        let mut customer: Customer = self
            .customers
            .find_by_id(&proposal.customer_id)
            .await?
            .ok_or_else(|| {
                ApplicationError::NotFound(format!("customer `{}`", proposal.customer_id.0))
            })?;

        if let Some(existing) = customer.billing_customer_id.clone() {
            match billing.get_customer(session, &existing).await {
                Ok(remote) => return Ok(remote.id),
                Err(error) if error.is_not_found() => {
                    warn!(
                        event_name = "proposals.billing_customer.missing",
                        correlation_id = %proposal.id,
                        billing_customer_id = %existing,
                        "billing customer no longer exists, recreating"
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }

        let created = billing
            .create_customer(
                session,
                &NewBillingCustomer {
                    name: customer.name.clone(),
                    email: customer.email.clone(),
                    address: customer.address.clone(),
                },
            )
            .await?;
        customer.billing_customer_id = Some(created.clone());
        customer.updated_at = Utc::now();
        self.customers.save(customer).await?;
        Ok(created)
    }
}

pub async fn approve_proposal(
    State(state): State<PaymentsState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApprovalOutcome>, ApiError> {
    let correlation_id = correlation_id(&headers);
    state
        .proposals
        .approve(&ProposalId(id))
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &correlation_id))
}

pub async fn issue_invoice(
    State(state): State<PaymentsState>,
    Path((id, stage)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Proposal>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let stage = PaymentStage::parse(&stage).ok_or_else(|| {
        ApiError::bad_request(format!("unknown payment stage `{stage}`"), &correlation_id)
    })?;
    state
        .proposals
        .issue_stage_invoice(&ProposalId(id), stage)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &correlation_id))
}
