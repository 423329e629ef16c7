use sqlx::Row;

use fieldops_core::domain::job::JobId;
use fieldops_core::domain::submission::{SubmissionId, SubmissionReceipt};

use super::{
    decode_error, encode_timestamp, parse_timestamp, RepositoryError, SubmissionReceiptRepository,
};
use crate::DbPool;

pub struct SqlSubmissionReceiptRepository {
    pool: DbPool,
}

impl SqlSubmissionReceiptRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SubmissionReceiptRepository for SqlSubmissionReceiptRepository {
    async fn find(&self, id: &SubmissionId) -> Result<Option<SubmissionReceipt>, RepositoryError> {
        let row = sqlx::query(
            "SELECT submission_id, job_id, source_updated_at, received_at
             FROM form_submission WHERE submission_id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let job_id: Option<String> = row.try_get("job_id").map_err(decode_error)?;
        let source_updated_at: String = row.try_get("source_updated_at").map_err(decode_error)?;
        let received_at: String = row.try_get("received_at").map_err(decode_error)?;

        Ok(Some(SubmissionReceipt {
            submission_id: SubmissionId(row.try_get("submission_id").map_err(decode_error)?),
            job_id: job_id.map(JobId),
            source_updated_at: parse_timestamp(
                "form_submission.source_updated_at",
                &source_updated_at,
            )?,
            received_at: parse_timestamp("form_submission.received_at", &received_at)?,
        }))
    }

    async fn record(&self, receipt: SubmissionReceipt) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO form_submission (submission_id, job_id, source_updated_at, received_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(submission_id) DO UPDATE SET
                 job_id = excluded.job_id,
                 source_updated_at = excluded.source_updated_at,
                 received_at = excluded.received_at",
        )
        .bind(&receipt.submission_id.0)
        .bind(receipt.job_id.as_ref().map(|id| id.0.as_str()))
        .bind(encode_timestamp(receipt.source_updated_at))
        .bind(encode_timestamp(receipt.received_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
