//! Workforce-forms webhook payloads.
//!
//! A delivery is a list of question/answer pairs plus a submitter block. Answers are picked
//! out by question label once, here, so the reconciler only ever sees a typed [`Submission`].

use chrono::{DateTime, Utc};
use fieldops_core::domain::job::JobId;
use fieldops_core::domain::submission::{Submission, SubmissionId, Technician};
use serde::Deserialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FormsPayloadError {
    #[error("submission id is missing")]
    MissingId,
    #[error("submission `{0}` has no service address answer")]
    MissingAddress(String),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormsWebhookPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub submitter: Submitter,
    #[serde(default)]
    pub answers: Vec<FormAnswer>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submitter {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FormAnswer {
    pub question: String,
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Address,
    JobType,
    Notes,
    Materials,
}

fn classify(question: &str) -> Option<Field> {
    let label = question.trim().to_ascii_lowercase();
    if label.contains("address") {
        Some(Field::Address)
    } else if label.contains("job type") || label.contains("type of job") {
        Some(Field::JobType)
    } else if label.contains("material") || label.contains("parts") {
        Some(Field::Materials)
    } else if label.contains("note") {
        Some(Field::Notes)
    } else {
        None
    }
}

impl FormsWebhookPayload {
    pub fn submission_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    fn answer(&self, field: Field) -> Option<String> {
        self.answers
            .iter()
            .filter(|entry| classify(&entry.question) == Some(field))
            .filter_map(|entry| entry.answer.as_deref().map(str::trim))
            .find(|answer| !answer.is_empty())
            .map(str::to_string)
    }

    /// Validates the delivery and converts it; missing timestamps fall back to `received_at`.
    pub fn into_submission(self, received_at: DateTime<Utc>) -> Result<Submission, FormsPayloadError> {
        let id = self.submission_id().ok_or(FormsPayloadError::MissingId)?.to_string();
        let address = self
            .answer(Field::Address)
            .ok_or_else(|| FormsPayloadError::MissingAddress(id.clone()))?;
        let created_at = self.created_at.unwrap_or(received_at);

        Ok(Submission {
            id: SubmissionId(id),
            address,
            job_type: self.answer(Field::JobType),
            additional_notes: self.answer(Field::Notes),
            materials_needed: self.answer(Field::Materials),
            technician: Technician {
                first_name: self.submitter.first_name.clone(),
                last_name: self.submitter.last_name.clone(),
                email: self.submitter.email.clone(),
            },
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
            job_id: self
                .job_id
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| JobId(value.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::{FormsPayloadError, FormsWebhookPayload};

    fn payload(value: serde_json::Value) -> FormsWebhookPayload {
        serde_json::from_value(value).expect("payload decodes")
    }

    #[test]
    fn answers_are_picked_by_question_label() {
        let submission = payload(json!({
            "id": "sub-1",
            "createdAt": "2026-05-01T12:00:00Z",
            "updatedAt": "2026-05-01T12:30:00Z",
            "submitter": { "firstName": "Dana", "lastName": "Reyes", "email": "dana@example.com" },
            "answers": [
                { "question": "Service Address", "answer": " 10 Elm Dr " },
                { "question": "Job Type", "answer": "Emergency repair" },
                { "question": "Additional Notes", "answer": "replaced filter" },
                { "question": "Materials / Parts Needed", "answer": "" },
                { "question": "Customer signature", "answer": "signed" }
            ]
        }))
        .into_submission(Utc::now())
        .expect("valid");

        assert_eq!(submission.id.0, "sub-1");
        assert_eq!(submission.address, "10 Elm Dr");
        assert_eq!(submission.job_type.as_deref(), Some("Emergency repair"));
        assert_eq!(submission.additional_notes.as_deref(), Some("replaced filter"));
        assert_eq!(submission.materials_needed, None);
        assert_eq!(submission.technician.display_name(), "Dana Reyes");
        assert!(submission.updated_at > submission.created_at);
    }

    #[test]
    fn missing_id_or_address_is_rejected() {
        let no_id = payload(json!({ "answers": [{ "question": "Address", "answer": "1 A St" }] }));
        assert_eq!(no_id.into_submission(Utc::now()).err(), Some(FormsPayloadError::MissingId));

        let no_address = payload(json!({ "id": "sub-2", "answers": [] }));
        assert_eq!(
            no_address.into_submission(Utc::now()).err(),
            Some(FormsPayloadError::MissingAddress("sub-2".to_string()))
        );
    }

    #[test]
    fn missing_timestamps_use_receipt_time() {
        let received = Utc::now();
        let submission = payload(json!({
            "id": "sub-3",
            "jobId": "J-7",
            "answers": [{ "question": "Job site address", "answer": "1 A St" }]
        }))
        .into_submission(received)
        .expect("valid");

        assert_eq!(submission.created_at, received);
        assert_eq!(submission.updated_at, received);
        assert_eq!(submission.job_id.map(|id| id.0).as_deref(), Some("J-7"));
    }
}
