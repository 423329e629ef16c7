use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::job::JobId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub String);

impl std::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment milestones, in the order they are collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStage {
    Deposit,
    Progress,
    Final,
}

impl PaymentStage {
    pub const ALL: [PaymentStage; 3] = [Self::Deposit, Self::Progress, Self::Final];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Progress => "progress",
            Self::Final => "final",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "deposit" => Some(Self::Deposit),
            "progress" => Some(Self::Progress),
            "final" => Some(Self::Final),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Deposit => "Deposit",
            Self::Progress => "Progress payment",
            Self::Final => "Final payment",
        }
    }

    /// Job checklist entry that gets ticked when this stage is paid.
    pub fn checklist_key(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit_received",
            Self::Progress => "progress_payment_received",
            Self::Final => "final_payment_received",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    Approved,
    Paid,
    Cancelled,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "approved" => Some(Self::Approved),
            "paid" => Some(Self::Paid),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePayment {
    pub stage: PaymentStage,
    pub amount: Decimal,
    pub invoice_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl StagePayment {
    pub fn unpaid(stage: PaymentStage, amount: Decimal) -> Self {
        Self { stage, amount, invoice_id: None, paid_at: None }
    }

    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub job_id: JobId,
    pub customer_id: CustomerId,
    pub status: ProposalStatus,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub current_stage: Option<PaymentStage>,
    /// Always holds one entry per [`PaymentStage`], in stage order.
    pub stages: Vec<StagePayment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of applying an observed payment to a stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageTransition {
    Applied { stage: PaymentStage, amount: Decimal, next_stage: Option<PaymentStage> },
    AlreadyPaid { stage: PaymentStage },
}

impl Proposal {
    pub fn stage(&self, stage: PaymentStage) -> Option<&StagePayment> {
        self.stages.iter().find(|entry| entry.stage == stage)
    }

    fn stage_mut(&mut self, stage: PaymentStage) -> Result<&mut StagePayment, DomainError> {
        let id = self.id.0.clone();
        self.stages.iter_mut().find(|entry| entry.stage == stage).ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "proposal `{id}` has no `{}` stage",
                stage.as_str()
            ))
        })
    }

    pub fn stage_for_invoice(&self, invoice_id: &str) -> Option<PaymentStage> {
        self.stages
            .iter()
            .find(|entry| entry.invoice_id.as_deref() == Some(invoice_id))
            .map(|entry| entry.stage)
    }

    /// Stages that have an invoice in the billing platform but no recorded payment yet.
    pub fn open_invoiced_stages(&self) -> Vec<(PaymentStage, String)> {
        self.stages
            .iter()
            .filter(|entry| !entry.is_paid())
            .filter_map(|entry| entry.invoice_id.clone().map(|invoice| (entry.stage, invoice)))
            .collect()
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != ProposalStatus::Draft {
            return Err(DomainError::InvalidProposalTransition {
                from: self.status,
                to: ProposalStatus::Approved,
            });
        }

        self.status = ProposalStatus::Approved;
        self.current_stage = self.next_unpaid_stage();
        self.updated_at = now;
        Ok(())
    }

    pub fn assign_invoice(
        &mut self,
        stage: PaymentStage,
        invoice_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status != ProposalStatus::Approved {
            return Err(DomainError::InvariantViolation(format!(
                "cannot invoice `{}` stage of a {} proposal",
                stage.as_str(),
                self.status.as_str()
            )));
        }
        let entry = self.stage_mut(stage)?;
        if entry.is_paid() {
            return Err(DomainError::StageAlreadyPaid { stage });
        }
        entry.invoice_id = Some(invoice_id.into());
        self.updated_at = now;
        Ok(())
    }

    /// Marks a stage paid. Paid stages are never reverted: observing the same payment again
    /// reports [`StageTransition::AlreadyPaid`] and leaves the proposal untouched.
    pub fn record_stage_payment(
        &mut self,
        stage: PaymentStage,
        paid_at: DateTime<Utc>,
    ) -> Result<StageTransition, DomainError> {
        if self.status == ProposalStatus::Cancelled {
            return Err(DomainError::InvalidProposalTransition {
                from: self.status,
                to: ProposalStatus::Paid,
            });
        }

        let entry = self.stage_mut(stage)?;
        if entry.is_paid() {
            return Ok(StageTransition::AlreadyPaid { stage });
        }
        entry.paid_at = Some(paid_at);
        let amount = entry.amount;

        self.paid_amount += amount;
        self.current_stage = self.next_unpaid_stage();
        if self.current_stage.is_none() {
            self.status = ProposalStatus::Paid;
        }
        self.updated_at = paid_at;

        Ok(StageTransition::Applied { stage, amount, next_stage: self.current_stage })
    }

    fn next_unpaid_stage(&self) -> Option<PaymentStage> {
        PaymentStage::ALL
            .into_iter()
            .find(|stage| self.stage(*stage).map(|entry| !entry.is_paid()).unwrap_or(false))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub description: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub subtotal: Decimal,
    pub state_tax: Decimal,
    pub county_tax: Decimal,
}

impl TaxBreakdown {
    pub fn from_line_items(items: &[InvoiceLineItem]) -> Self {
        let mut breakdown = Self::default();
        for item in items {
            let description = item.description.to_ascii_lowercase();
            if description.contains("state tax") {
                breakdown.state_tax += item.amount;
            } else if description.contains("county tax") {
                breakdown.county_tax += item.amount;
            } else {
                breakdown.subtotal += item.amount;
            }
        }
        breakdown
    }

    pub fn untaxed(amount: Decimal) -> Self {
        Self { subtotal: amount, ..Self::default() }
    }

    pub fn total(&self) -> Decimal {
        self.subtotal + self.state_tax + self.county_tax
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLedgerEntry {
    pub id: String,
    pub proposal_id: ProposalId,
    pub job_id: JobId,
    pub stage: PaymentStage,
    pub invoice_id: String,
    pub amount: Decimal,
    pub taxes: TaxBreakdown,
    pub county: String,
    pub received_at: DateTime<Utc>,
}
