use sqlx::Row;

use fieldops_core::domain::customer::CustomerId;
use fieldops_core::domain::job::JobId;
use fieldops_core::domain::payment::{
    PaymentLedgerEntry, PaymentStage, Proposal, ProposalId, ProposalStatus, StagePayment,
    TaxBreakdown,
};

use super::{
    decode_error, encode_timestamp, parse_decimal, parse_optional_timestamp, parse_timestamp,
    ProposalRepository, RepositoryError,
};
use crate::DbPool;

const PROPOSAL_COLUMNS: &str = "id, job_id, customer_id, status, total_amount, paid_amount,
     current_stage,
     deposit_amount, deposit_invoice_id, deposit_paid_at,
     progress_amount, progress_invoice_id, progress_paid_at,
     final_amount, final_invoice_id, final_paid_at,
     created_at, updated_at";

pub struct SqlProposalRepository {
    pool: DbPool,
}

impl SqlProposalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_stage(
    row: &sqlx::sqlite::SqliteRow,
    stage: PaymentStage,
) -> Result<StagePayment, RepositoryError> {
    let prefix = stage.as_str();
    let amount: String = row.try_get(format!("{prefix}_amount").as_str()).map_err(decode_error)?;
    let invoice_id: Option<String> =
        row.try_get(format!("{prefix}_invoice_id").as_str()).map_err(decode_error)?;
    let paid_at: Option<String> =
        row.try_get(format!("{prefix}_paid_at").as_str()).map_err(decode_error)?;

    Ok(StagePayment {
        stage,
        amount: parse_decimal("proposal.stage_amount", &amount)?,
        invoice_id,
        paid_at: parse_optional_timestamp("proposal.stage_paid_at", paid_at)?,
    })
}

fn row_to_proposal(row: &sqlx::sqlite::SqliteRow) -> Result<Proposal, RepositoryError> {
    let status: String = row.try_get("status").map_err(decode_error)?;
    let total_amount: String = row.try_get("total_amount").map_err(decode_error)?;
    let paid_amount: String = row.try_get("paid_amount").map_err(decode_error)?;
    let current_stage: Option<String> = row.try_get("current_stage").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    let current_stage = match current_stage {
        Some(raw) => Some(
            PaymentStage::parse(&raw)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown payment stage `{raw}`")))?,
        ),
        None => None,
    };

    let stages = PaymentStage::ALL
        .into_iter()
        .map(|stage| row_to_stage(row, stage))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Proposal {
        id: ProposalId(row.try_get("id").map_err(decode_error)?),
        job_id: JobId(row.try_get("job_id").map_err(decode_error)?),
        customer_id: CustomerId(row.try_get("customer_id").map_err(decode_error)?),
        status: ProposalStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown proposal status `{status}`")))?,
        total_amount: parse_decimal("proposal.total_amount", &total_amount)?,
        paid_amount: parse_decimal("proposal.paid_amount", &paid_amount)?,
        current_stage,
        stages,
        created_at: parse_timestamp("proposal.created_at", &created_at)?,
        updated_at: parse_timestamp("proposal.updated_at", &updated_at)?,
    })
}

fn row_to_ledger_entry(row: &sqlx::sqlite::SqliteRow) -> Result<PaymentLedgerEntry, RepositoryError> {
    let stage: String = row.try_get("stage").map_err(decode_error)?;
    let amount: String = row.try_get("amount").map_err(decode_error)?;
    let subtotal: String = row.try_get("subtotal").map_err(decode_error)?;
    let state_tax: String = row.try_get("state_tax").map_err(decode_error)?;
    let county_tax: String = row.try_get("county_tax").map_err(decode_error)?;
    let received_at: String = row.try_get("received_at").map_err(decode_error)?;

    Ok(PaymentLedgerEntry {
        id: row.try_get("id").map_err(decode_error)?,
        proposal_id: ProposalId(row.try_get("proposal_id").map_err(decode_error)?),
        job_id: JobId(row.try_get("job_id").map_err(decode_error)?),
        stage: PaymentStage::parse(&stage)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown payment stage `{stage}`")))?,
        invoice_id: row.try_get("invoice_id").map_err(decode_error)?,
        amount: parse_decimal("payment_ledger.amount", &amount)?,
        taxes: TaxBreakdown {
            subtotal: parse_decimal("payment_ledger.subtotal", &subtotal)?,
            state_tax: parse_decimal("payment_ledger.state_tax", &state_tax)?,
            county_tax: parse_decimal("payment_ledger.county_tax", &county_tax)?,
        },
        county: row.try_get("county").map_err(decode_error)?,
        received_at: parse_timestamp("payment_ledger.received_at", &received_at)?,
    })
}

fn stage_of(proposal: &Proposal, stage: PaymentStage) -> Result<&StagePayment, RepositoryError> {
    proposal.stage(stage).ok_or_else(|| {
        RepositoryError::Decode(format!("proposal `{}` is missing its {} stage", proposal.id, stage.as_str()))
    })
}

#[async_trait::async_trait]
impl ProposalRepository for SqlProposalRepository {
    async fn find_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PROPOSAL_COLUMNS} FROM proposal WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_proposal).transpose()
    }

    async fn save(&self, proposal: Proposal) -> Result<(), RepositoryError> {
        let deposit = stage_of(&proposal, PaymentStage::Deposit)?;
        let progress = stage_of(&proposal, PaymentStage::Progress)?;
        let final_stage = stage_of(&proposal, PaymentStage::Final)?;

        sqlx::query(
            "INSERT INTO proposal (id, job_id, customer_id, status, total_amount, paid_amount,
                                   current_stage,
                                   deposit_amount, deposit_invoice_id, deposit_paid_at,
                                   progress_amount, progress_invoice_id, progress_paid_at,
                                   final_amount, final_invoice_id, final_paid_at,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 total_amount = excluded.total_amount,
                 paid_amount = excluded.paid_amount,
                 current_stage = excluded.current_stage,
                 deposit_amount = excluded.deposit_amount,
                 deposit_invoice_id = excluded.deposit_invoice_id,
                 deposit_paid_at = excluded.deposit_paid_at,
                 progress_amount = excluded.progress_amount,
                 progress_invoice_id = excluded.progress_invoice_id,
                 progress_paid_at = excluded.progress_paid_at,
                 final_amount = excluded.final_amount,
                 final_invoice_id = excluded.final_invoice_id,
                 final_paid_at = excluded.final_paid_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&proposal.id.0)
        .bind(&proposal.job_id.0)
        .bind(&proposal.customer_id.0)
        .bind(proposal.status.as_str())
        .bind(proposal.total_amount.to_string())
        .bind(proposal.paid_amount.to_string())
        .bind(proposal.current_stage.map(|stage| stage.as_str()))
        .bind(deposit.amount.to_string())
        .bind(&deposit.invoice_id)
        .bind(deposit.paid_at.map(encode_timestamp))
        .bind(progress.amount.to_string())
        .bind(&progress.invoice_id)
        .bind(progress.paid_at.map(encode_timestamp))
        .bind(final_stage.amount.to_string())
        .bind(&final_stage.invoice_id)
        .bind(final_stage.paid_at.map(encode_timestamp))
        .bind(encode_timestamp(proposal.created_at))
        .bind(encode_timestamp(proposal.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_invoice_id(
        &self,
        invoice_id: &str,
    ) -> Result<Option<Proposal>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposal
             WHERE deposit_invoice_id = ?1 OR progress_invoice_id = ?1 OR final_invoice_id = ?1
             LIMIT 1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_proposal).transpose()
    }

    async fn list_open(&self, limit: u32) -> Result<Vec<Proposal>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposal
             WHERE status = 'approved'
               AND ((deposit_invoice_id IS NOT NULL AND deposit_paid_at IS NULL)
                 OR (progress_invoice_id IS NOT NULL AND progress_paid_at IS NULL)
                 OR (final_invoice_id IS NOT NULL AND final_paid_at IS NULL))
             ORDER BY created_at ASC
             LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_proposal).collect()
    }

    async fn insert_ledger_entry(
        &self,
        entry: PaymentLedgerEntry,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO payment_ledger (id, proposal_id, job_id, stage, invoice_id, amount,
                                         subtotal, state_tax, county_tax, county, received_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(proposal_id, stage) DO NOTHING",
        )
        .bind(&entry.id)
        .bind(&entry.proposal_id.0)
        .bind(&entry.job_id.0)
        .bind(entry.stage.as_str())
        .bind(&entry.invoice_id)
        .bind(entry.amount.to_string())
        .bind(entry.taxes.subtotal.to_string())
        .bind(entry.taxes.state_tax.to_string())
        .bind(entry.taxes.county_tax.to_string())
        .bind(&entry.county)
        .bind(encode_timestamp(entry.received_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ledger_for_proposal(
        &self,
        id: &ProposalId,
    ) -> Result<Vec<PaymentLedgerEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, proposal_id, job_id, stage, invoice_id, amount, subtotal, state_tax,
                    county_tax, county, received_at
             FROM payment_ledger
             WHERE proposal_id = ?
             ORDER BY received_at ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_ledger_entry).collect()
    }
}
