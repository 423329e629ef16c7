use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl Technician {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            "Unknown Technician".to_string()
        } else {
            name.to_string()
        }
    }
}

/// A field report coming from the workforce-forms platform, already decoded from
/// whichever transport delivered it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub address: String,
    pub job_type: Option<String>,
    pub additional_notes: Option<String>,
    pub materials_needed: Option<String>,
    pub technician: Technician,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Job matched upstream by the originating integration, if any.
    pub job_id: Option<JobId>,
}

/// Record of a submission version that has already been processed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub submission_id: SubmissionId,
    pub job_id: Option<JobId>,
    pub source_updated_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

impl SubmissionReceipt {
    pub fn covers(&self, submission: &Submission) -> bool {
        self.submission_id == submission.id && self.source_updated_at == submission.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::Technician;

    #[test]
    fn display_name_joins_and_falls_back() {
        let tech = Technician {
            first_name: " Dana ".to_string(),
            last_name: "Reyes".to_string(),
            email: None,
        };
        assert_eq!(tech.display_name(), "Dana Reyes");
        assert_eq!(Technician::default().display_name(), "Unknown Technician");
    }
}
