use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::customer::CustomerId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lookup key for exact service-address matches: trimmed and Unicode-lowercased.
pub fn address_key(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Human-readable job number, `JOB-0001` style.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobNumber(pub String);

impl JobNumber {
    pub fn from_sequence(value: i64) -> Self {
        Self(format!("JOB-{value:04}"))
    }
}

impl std::fmt::Display for JobNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Installation,
    Repair,
    Maintenance,
    Emergency,
}

impl JobType {
    /// Maps the free-text job type a technician typed into a form. Anything that is not
    /// recognisably one of the known types is treated as maintenance.
    pub fn from_free_text(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Maintenance;
        };
        let value = raw.trim().to_ascii_lowercase();

        if value.contains("emergency") || value.contains("urgent") {
            Self::Emergency
        } else if value.contains("install") || value.contains("replacement") {
            Self::Installation
        } else if value.contains("repair") || value.contains("fix") || value.contains("service call")
        {
            Self::Repair
        } else {
            Self::Maintenance
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installation => "installation",
            Self::Repair => "repair",
            Self::Maintenance => "maintenance",
            Self::Emergency => "emergency",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "installation" => Some(Self::Installation),
            "repair" => Some(Self::Repair),
            "maintenance" => Some(Self::Maintenance),
            "emergency" => Some(Self::Emergency),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    NotScheduled,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotScheduled => "not_scheduled",
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "not_scheduled" => Some(Self::NotScheduled),
            "scheduled" => Some(Self::Scheduled),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    Undone,
    Done,
}

/// One entry in a job's note collections.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobNote {
    pub id: String,
    pub text: String,
    pub status: NoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub technician: String,
    pub synced_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_number: JobNumber,
    pub customer_id: CustomerId,
    pub service_address: Option<String>,
    pub job_type: JobType,
    pub status: JobStatus,
    pub additional_notes: Vec<JobNote>,
    pub materials_notes: Vec<JobNote>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub job_id: JobId,
    pub item_key: String,
    pub label: String,
    pub checked: bool,
    pub checked_at: Option<DateTime<Utc>>,
}

/// Result of a best-effort checklist auto-check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecklistUpdate {
    Checked,
    AlreadyChecked,
    Missing,
}
