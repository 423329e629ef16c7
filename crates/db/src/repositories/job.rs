use chrono::{DateTime, Utc};
use sqlx::Row;

use fieldops_core::domain::customer::CustomerId;
use fieldops_core::domain::job::{
    address_key, ChecklistItem, ChecklistUpdate, Job, JobId, JobNote, JobNumber, JobStatus, JobType,
};

use super::{
    decode_error, encode_timestamp, parse_optional_timestamp, parse_timestamp, JobRepository,
    RepositoryError,
};
use crate::DbPool;

const JOB_COLUMNS: &str = "id, job_number, customer_id, service_address, job_type, status,
     additional_notes, materials_notes, created_by, created_at, updated_at";

pub struct SqlJobRepository {
    pool: DbPool,
}

impl SqlJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_notes(column: &str, raw: &str) -> Result<Vec<JobNote>, RepositoryError> {
    serde_json::from_str(raw).map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

fn encode_notes(notes: &[JobNote]) -> Result<String, RepositoryError> {
    serde_json::to_string(notes).map_err(decode_error)
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<Job, RepositoryError> {
    let job_type: String = row.try_get("job_type").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let additional_notes: String = row.try_get("additional_notes").map_err(decode_error)?;
    let materials_notes: String = row.try_get("materials_notes").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Job {
        id: JobId(row.try_get("id").map_err(decode_error)?),
        job_number: JobNumber(row.try_get("job_number").map_err(decode_error)?),
        customer_id: CustomerId(row.try_get("customer_id").map_err(decode_error)?),
        service_address: row.try_get("service_address").map_err(decode_error)?,
        job_type: JobType::parse(&job_type)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown job type `{job_type}`")))?,
        status: JobStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown job status `{status}`")))?,
        additional_notes: decode_notes("job.additional_notes", &additional_notes)?,
        materials_notes: decode_notes("job.materials_notes", &materials_notes)?,
        created_by: row.try_get("created_by").map_err(decode_error)?,
        created_at: parse_timestamp("job.created_at", &created_at)?,
        updated_at: parse_timestamp("job.updated_at", &updated_at)?,
    })
}

fn row_to_checklist_item(row: &sqlx::sqlite::SqliteRow) -> Result<ChecklistItem, RepositoryError> {
    let checked: i64 = row.try_get("checked").map_err(decode_error)?;
    let checked_at: Option<String> = row.try_get("checked_at").map_err(decode_error)?;

    Ok(ChecklistItem {
        job_id: JobId(row.try_get("job_id").map_err(decode_error)?),
        item_key: row.try_get("item_key").map_err(decode_error)?,
        label: row.try_get("label").map_err(decode_error)?,
        checked: checked != 0,
        checked_at: parse_optional_timestamp("job_checklist_item.checked_at", checked_at)?,
    })
}

#[async_trait::async_trait]
impl JobRepository for SqlJobRepository {
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM job WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn find_by_exact_address(&self, address: &str) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM job
             WHERE service_address_key = ?
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(address_key(address))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn list_recent_with_address(&self, limit: u32) -> Result<Vec<Job>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM job
             WHERE service_address IS NOT NULL AND TRIM(service_address) <> ''
             ORDER BY created_at DESC
             LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_job).collect()
    }

    async fn next_job_number(&self) -> Result<JobNumber, RepositoryError> {
        let value: i64 = sqlx::query_scalar(
            "UPDATE job_number_sequence
             SET last_value = last_value + 1
             WHERE id = 1
             RETURNING last_value",
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("job number sequence".to_string()))?;

        Ok(JobNumber::from_sequence(value))
    }

    async fn insert(&self, job: Job) -> Result<(), RepositoryError> {
        let additional_notes = encode_notes(&job.additional_notes)?;
        let materials_notes = encode_notes(&job.materials_notes)?;

        sqlx::query(
            "INSERT INTO job (id, job_number, customer_id, service_address, service_address_key,
                              job_type, status, additional_notes, materials_notes, created_by,
                              created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id.0)
        .bind(&job.job_number.0)
        .bind(&job.customer_id.0)
        .bind(&job.service_address)
        .bind(job.service_address.as_deref().map(address_key))
        .bind(job.job_type.as_str())
        .bind(job.status.as_str())
        .bind(additional_notes)
        .bind(materials_notes)
        .bind(&job.created_by)
        .bind(encode_timestamp(job.created_at))
        .bind(encode_timestamp(job.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_notes(
        &self,
        id: &JobId,
        additional_notes: &[JobNote],
        materials_notes: &[JobNote],
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE job
             SET additional_notes = ?, materials_notes = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(encode_notes(additional_notes)?)
        .bind(encode_notes(materials_notes)?)
        .bind(encode_timestamp(updated_at))
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("job `{id}`")));
        }
        Ok(())
    }

    async fn first_created_by(&self) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT created_by FROM job ORDER BY created_at ASC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get::<String, _>("created_by").map_err(decode_error)).transpose()
    }

    async fn ensure_checklist_item(&self, item: ChecklistItem) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO job_checklist_item (job_id, item_key, label, checked, checked_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(job_id, item_key) DO NOTHING",
        )
        .bind(&item.job_id.0)
        .bind(&item.item_key)
        .bind(&item.label)
        .bind(i64::from(item.checked))
        .bind(item.checked_at.map(encode_timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn checklist(&self, job_id: &JobId) -> Result<Vec<ChecklistItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT job_id, item_key, label, checked, checked_at
             FROM job_checklist_item
             WHERE job_id = ?
             ORDER BY item_key ASC",
        )
        .bind(&job_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_checklist_item).collect()
    }

    async fn check_item(
        &self,
        job_id: &JobId,
        item_key: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<ChecklistUpdate, RepositoryError> {
        let result = sqlx::query(
            "UPDATE job_checklist_item
             SET checked = 1, checked_at = ?
             WHERE job_id = ? AND item_key = ? AND checked = 0",
        )
        .bind(encode_timestamp(checked_at))
        .bind(&job_id.0)
        .bind(item_key)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(ChecklistUpdate::Checked);
        }

        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT checked FROM job_checklist_item WHERE job_id = ? AND item_key = ?",
        )
        .bind(&job_id.0)
        .bind(item_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match exists {
            Some(_) => ChecklistUpdate::AlreadyChecked,
            None => ChecklistUpdate::Missing,
        })
    }
}
