//! Spreadsheet import of field reports.

use chrono::{DateTime, Utc};
use fieldops_core::domain::job::JobId;
use fieldops_core::domain::submission::{Submission, SubmissionId, Technician};
use serde::Deserialize;

use super::reconciler::{ProcessingResult, SubmissionReconciler};

/// Column layout expected in import files.
pub const CSV_HEADER: &str = "submission_id,address,job_type,additional_notes,materials_needed,technician_first_name,technician_last_name,technician_email,created_at,updated_at,job_id";

#[derive(Debug, Deserialize)]
struct CsvRow {
    submission_id: String,
    address: String,
    #[serde(default)]
    job_type: Option<String>,
    #[serde(default)]
    additional_notes: Option<String>,
    #[serde(default)]
    materials_needed: Option<String>,
    #[serde(default)]
    technician_first_name: String,
    #[serde(default)]
    technician_last_name: String,
    #[serde(default)]
    technician_email: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    job_id: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty())
}

fn parse_timestamp(column: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>, String> {
    match non_blank(raw) {
        None => Ok(None),
        Some(value) => DateTime::parse_from_rfc3339(&value)
            .map(|parsed| Some(parsed.with_timezone(&Utc)))
            .map_err(|error| format!("{column} `{value}` is not an RFC 3339 timestamp: {error}")),
    }
}

impl CsvRow {
    fn into_submission(self, imported_at: DateTime<Utc>) -> Result<Submission, String> {
        let id = self.submission_id.trim().to_string();
        if id.is_empty() {
            return Err("submission_id is blank".to_string());
        }
        let address = self.address.trim().to_string();
        if address.is_empty() {
            return Err(format!("submission {id}: address is blank"));
        }

        let created_at = parse_timestamp("created_at", self.created_at)
            .map_err(|error| format!("submission {id}: {error}"))?
            .unwrap_or(imported_at);
        let updated_at = parse_timestamp("updated_at", self.updated_at)
            .map_err(|error| format!("submission {id}: {error}"))?
            .unwrap_or(created_at);

        Ok(Submission {
            id: SubmissionId(id),
            address,
            job_type: non_blank(self.job_type),
            additional_notes: non_blank(self.additional_notes),
            materials_needed: non_blank(self.materials_needed),
            technician: Technician {
                first_name: self.technician_first_name,
                last_name: self.technician_last_name,
                email: non_blank(self.technician_email),
            },
            created_at,
            updated_at,
            job_id: non_blank(self.job_id).map(JobId),
        })
    }
}

/// Parses an import file. Rows that cannot be read become error strings naming the line.
pub fn parse_submissions_csv(input: &str) -> (Vec<Submission>, Vec<String>) {
    let imported_at = Utc::now();
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(input.as_bytes());
    let mut submissions = Vec::new();
    let mut errors = Vec::new();

    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        match row {
            Ok(row) => match row.into_submission(imported_at) {
                Ok(submission) => submissions.push(submission),
                Err(error) => errors.push(format!("line {line}: {error}")),
            },
            Err(error) => errors.push(format!("line {line}: {error}")),
        }
    }

    (submissions, errors)
}

/// Parses and reconciles an import file in one go.
pub async fn import_csv(reconciler: &SubmissionReconciler, input: &str) -> ProcessingResult {
    let (submissions, errors) = parse_submissions_csv(input);
    reconciler.process(&submissions).await.with_input_errors(errors)
}
