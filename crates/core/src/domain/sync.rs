use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Poll,
    Cli,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poll => "poll",
            Self::Cli => "cli",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "poll" => Some(Self::Poll),
            "cli" => Some(Self::Cli),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl SyncRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "completed_with_errors" => Some(Self::CompletedWithErrors),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One payment polling cycle, persisted for operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: String,
    pub trigger: SyncTrigger,
    pub status: SyncRunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub proposals_checked: u32,
    pub stages_paid: u32,
    pub errors: Vec<String>,
}

impl SyncRun {
    pub fn start(trigger: SyncTrigger, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trigger,
            status: SyncRunStatus::Running,
            started_at: now,
            finished_at: None,
            proposals_checked: 0,
            stages_paid: 0,
            errors: Vec::new(),
        }
    }

    /// Closes the run, deriving its status from the collected item errors.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.finished_at = Some(now);
        self.status = if self.errors.is_empty() {
            SyncRunStatus::Completed
        } else {
            SyncRunStatus::CompletedWithErrors
        };
    }

    pub fn fail(&mut self, reason: impl Into<String>, now: DateTime<Utc>) {
        self.errors.push(reason.into());
        self.finished_at = Some(now);
        self.status = SyncRunStatus::Failed;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{SyncRun, SyncRunStatus, SyncTrigger};

    #[test]
    fn finish_reflects_item_errors() {
        let mut clean = SyncRun::start(SyncTrigger::Poll, Utc::now());
        clean.finish(Utc::now());
        assert_eq!(clean.status, SyncRunStatus::Completed);

        let mut noisy = SyncRun::start(SyncTrigger::Cli, Utc::now());
        noisy.errors.push("invoice INV-9: timeout".to_string());
        noisy.finish(Utc::now());
        assert_eq!(noisy.status, SyncRunStatus::CompletedWithErrors);
        assert!(noisy.finished_at.is_some());
    }

    #[test]
    fn failed_run_keeps_reason() {
        let mut run = SyncRun::start(SyncTrigger::Poll, Utc::now());
        run.fail("billing login rejected", Utc::now());

        assert_eq!(run.status, SyncRunStatus::Failed);
        assert_eq!(run.errors, vec!["billing login rejected".to_string()]);
        assert_eq!(SyncRunStatus::parse(run.status.as_str()), Some(SyncRunStatus::Failed));
    }
}
