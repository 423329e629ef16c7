use std::sync::Arc;

use chrono::{DateTime, Utc};
use fieldops_core::domain::job::{ChecklistUpdate, JobId};
use fieldops_core::domain::payment::{
    InvoiceLineItem, PaymentLedgerEntry, PaymentStage, Proposal, ProposalId, StageTransition,
    TaxBreakdown,
};
use fieldops_core::errors::ApplicationError;
use fieldops_db::repositories::{
    CustomerRepository, JobRepository, ProposalRepository, RepositoryError,
};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::email::{EmailError, EmailSender, EmailTemplates, PaymentConfirmation};
use crate::geocode::{CountyLookup, UNKNOWN_COUNTY};

/// A payment observed in the billing platform, from either the poll or a webhook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoicePayment {
    pub invoice_id: String,
    pub paid_at: DateTime<Utc>,
    /// Empty when the source carried no itemisation; the stage amount is then untaxed.
    pub line_items: Vec<InvoiceLineItem>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmailDelivery {
    Sent,
    /// No customer email on file, or the job belongs to the placeholder customer.
    Skipped,
}

#[derive(Debug)]
pub struct AppliedPayment {
    pub proposal_id: ProposalId,
    pub job_id: JobId,
    pub stage: PaymentStage,
    pub amount: Decimal,
    pub next_stage: Option<PaymentStage>,
    pub ledger_written: bool,
    pub checklist: Result<ChecklistUpdate, RepositoryError>,
    pub confirmation: Result<EmailDelivery, EmailError>,
}

impl AppliedPayment {
    /// Side effects never undo the transition; their failures are only logged.
    pub fn log_side_effects(&self, correlation_id: &str) {
        if let Err(error) = &self.checklist {
            warn!(
                event_name = "payments.checklist.failed",
                correlation_id = %correlation_id,
                proposal_id = %self.proposal_id,
                stage = self.stage.as_str(),
                error = %error,
                "checklist auto-check failed"
            );
        }
        if let Err(error) = &self.confirmation {
            warn!(
                event_name = "payments.confirmation_email.failed",
                correlation_id = %correlation_id,
                proposal_id = %self.proposal_id,
                stage = self.stage.as_str(),
                error = %error,
                "payment confirmation email failed"
            );
        }
    }
}

#[derive(Debug)]
pub enum PaymentOutcome {
    Applied(AppliedPayment),
    AlreadyPaid { proposal_id: ProposalId, stage: PaymentStage },
    UnknownInvoice { invoice_id: String },
}

/// Applies observed invoice payments to proposal stages.
pub struct PaymentReconciler {
    proposals: Arc<dyn ProposalRepository>,
    jobs: Arc<dyn JobRepository>,
    customers: Arc<dyn CustomerRepository>,
    email: Arc<dyn EmailSender>,
    templates: Arc<EmailTemplates>,
    counties: Arc<dyn CountyLookup>,
}

impl PaymentReconciler {
    pub fn new(
        proposals: Arc<dyn ProposalRepository>,
        jobs: Arc<dyn JobRepository>,
        customers: Arc<dyn CustomerRepository>,
        email: Arc<dyn EmailSender>,
        templates: Arc<EmailTemplates>,
        counties: Arc<dyn CountyLookup>,
    ) -> Self {
        Self { proposals, jobs, customers, email, templates, counties }
    }

    /// Marks the stage billed under `payment.invoice_id` as paid.
    ///
    /// Repeated observations of the same payment are no-ops. The ledger entry is written
    /// before the proposal so that a retry after a failed save finds the stage still open
    /// and the ledger insert already done.
    pub async fn apply_invoice_payment(
        &self,
        payment: InvoicePayment,
    ) -> Result<PaymentOutcome, ApplicationError> {
        let Some(mut proposal) = self.proposals.find_by_invoice_id(&payment.invoice_id).await?
        else {
            return Ok(PaymentOutcome::UnknownInvoice { invoice_id: payment.invoice_id });
        };
        let Some(stage) = proposal.stage_for_invoice(&payment.invoice_id) else {
            return Ok(PaymentOutcome::UnknownInvoice { invoice_id: payment.invoice_id });
        };

        let (amount, next_stage) = match proposal.record_stage_payment(stage, payment.paid_at)? {
            StageTransition::AlreadyPaid { stage } => {
                info!(
                    event_name = "payments.stage.already_paid",
                    correlation_id = %payment.invoice_id,
                    proposal_id = %proposal.id,
                    stage = stage.as_str(),
                    "payment already recorded"
                );
                return Ok(PaymentOutcome::AlreadyPaid { proposal_id: proposal.id, stage });
            }
            StageTransition::Applied { amount, next_stage, .. } => (amount, next_stage),
        };

        let ledger_entry = self.ledger_entry(&proposal, stage, amount, &payment).await;
        let ledger_written = self.proposals.insert_ledger_entry(ledger_entry).await?;
        self.proposals.save(proposal.clone()).await?;

        info!(
            event_name = "payments.stage.paid",
            correlation_id = %payment.invoice_id,
            proposal_id = %proposal.id,
            stage = stage.as_str(),
            amount = %amount,
            proposal_status = proposal.status.as_str(),
            "payment stage marked paid"
        );

        let checklist =
            self.jobs.check_item(&proposal.job_id, stage.checklist_key(), payment.paid_at).await;
        let confirmation = self
            .send_confirmation(&proposal, stage, amount, next_stage, &payment.invoice_id)
            .await;

        Ok(PaymentOutcome::Applied(AppliedPayment {
            proposal_id: proposal.id,
            job_id: proposal.job_id,
            stage,
            amount,
            next_stage,
            ledger_written,
            checklist,
            confirmation,
        }))
    }

    async fn ledger_entry(
        &self,
        proposal: &Proposal,
        stage: PaymentStage,
        amount: Decimal,
        payment: &InvoicePayment,
    ) -> PaymentLedgerEntry {
        let taxes = if payment.line_items.is_empty() {
            TaxBreakdown::untaxed(amount)
        } else {
            TaxBreakdown::from_line_items(&payment.line_items)
        };

        PaymentLedgerEntry {
            id: Uuid::new_v4().to_string(),
            proposal_id: proposal.id.clone(),
            job_id: proposal.job_id.clone(),
            stage,
            invoice_id: payment.invoice_id.clone(),
            amount,
            taxes,
            county: self.county_for_job(&proposal.job_id).await,
            received_at: payment.paid_at,
        }
    }

    async fn county_for_job(&self, job_id: &JobId) -> String {
        let address = match self.jobs.find_by_id(job_id).await {
            Ok(Some(job)) => job.service_address,
            Ok(None) => None,
            Err(error) => {
                warn!(
                    event_name = "payments.county.job_lookup_failed",
                    correlation_id = %job_id,
                    error = %error,
                    "could not load job for county lookup"
                );
                None
            }
        };
        let Some(address) = address.filter(|value| !value.trim().is_empty()) else {
            return UNKNOWN_COUNTY.to_string();
        };

        match self.counties.county_for(&address).await {
            Ok(Some(county)) => county,
            Ok(None) => UNKNOWN_COUNTY.to_string(),
            Err(error) => {
                warn!(
                    event_name = "payments.county.lookup_failed",
                    correlation_id = %job_id,
                    error = %error,
                    "county lookup failed"
                );
                UNKNOWN_COUNTY.to_string()
            }
        }
    }

    async fn send_confirmation(
        &self,
        proposal: &Proposal,
        stage: PaymentStage,
        amount: Decimal,
        next_stage: Option<PaymentStage>,
        invoice_id: &str,
    ) -> Result<EmailDelivery, EmailError> {
        let customer = match self.customers.find_by_id(&proposal.customer_id).await {
            Ok(customer) => customer,
            Err(error) => {
                warn!(
                    event_name = "payments.confirmation_email.customer_lookup_failed",
                    correlation_id = %invoice_id,
                    error = %error,
                    "could not load customer for confirmation email"
                );
                None
            }
        };
        let Some(customer) = customer.filter(|customer| !customer.is_placeholder) else {
            return Ok(EmailDelivery::Skipped);
        };
        let Some(email) = customer.email.clone().filter(|email| !email.trim().is_empty()) else {
            return Ok(EmailDelivery::Skipped);
        };

        let job_number = match self.jobs.find_by_id(&proposal.job_id).await {
            Ok(Some(job)) => job.job_number.0,
            _ => proposal.job_id.0.clone(),
        };

        let message = self.templates.payment_confirmation(&PaymentConfirmation {
            customer_name: customer.name,
            customer_email: email,
            job_number,
            stage_label: stage.label().to_string(),
            next_stage_label: next_stage.map(|next| next.label().to_string()),
            amount: format!("{:.2}", amount),
            invoice_id: invoice_id.to_string(),
        })?;
        self.email.send(message).await?;
        Ok(EmailDelivery::Sent)
    }
}
