use sqlx::Row;

use fieldops_core::domain::sync::{SyncRun, SyncRunStatus, SyncTrigger};

use super::{
    decode_error, encode_timestamp, parse_optional_timestamp, parse_timestamp, RepositoryError,
    SyncRunRepository,
};
use crate::DbPool;

pub struct SqlSyncRunRepository {
    pool: DbPool,
}

impl SqlSyncRunRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<SyncRun, RepositoryError> {
    let trigger: String = row.try_get("trigger_kind").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let started_at: String = row.try_get("started_at").map_err(decode_error)?;
    let finished_at: Option<String> = row.try_get("finished_at").map_err(decode_error)?;
    let proposals_checked: i64 = row.try_get("proposals_checked").map_err(decode_error)?;
    let stages_paid: i64 = row.try_get("stages_paid").map_err(decode_error)?;
    let errors: String = row.try_get("errors").map_err(decode_error)?;

    Ok(SyncRun {
        id: row.try_get("id").map_err(decode_error)?,
        trigger: SyncTrigger::parse(&trigger)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown sync trigger `{trigger}`")))?,
        status: SyncRunStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown sync status `{status}`")))?,
        started_at: parse_timestamp("payment_sync_run.started_at", &started_at)?,
        finished_at: parse_optional_timestamp("payment_sync_run.finished_at", finished_at)?,
        proposals_checked: u32::try_from(proposals_checked).map_err(decode_error)?,
        stages_paid: u32::try_from(stages_paid).map_err(decode_error)?,
        errors: serde_json::from_str(&errors).map_err(decode_error)?,
    })
}

#[async_trait::async_trait]
impl SyncRunRepository for SqlSyncRunRepository {
    async fn save(&self, run: SyncRun) -> Result<(), RepositoryError> {
        let errors = serde_json::to_string(&run.errors).map_err(decode_error)?;

        sqlx::query(
            "INSERT INTO payment_sync_run (id, trigger_kind, status, started_at, finished_at,
                                           proposals_checked, stages_paid, errors)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 finished_at = excluded.finished_at,
                 proposals_checked = excluded.proposals_checked,
                 stages_paid = excluded.stages_paid,
                 errors = excluded.errors",
        )
        .bind(&run.id)
        .bind(run.trigger.as_str())
        .bind(run.status.as_str())
        .bind(encode_timestamp(run.started_at))
        .bind(run.finished_at.map(encode_timestamp))
        .bind(i64::from(run.proposals_checked))
        .bind(i64::from(run.stages_paid))
        .bind(errors)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SyncRun>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, trigger_kind, status, started_at, finished_at,
                    proposals_checked, stages_paid, errors
             FROM payment_sync_run
             ORDER BY started_at DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_run).collect()
    }
}
