use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::job::{JobNote, NoteStatus};
use crate::domain::submission::Submission;

/// Note entry built from one free-text submission field, or `None` when the field is
/// blank.
pub fn note_from_submission(
    submission: &Submission,
    text: Option<&str>,
    synced_at: DateTime<Utc>,
) -> Option<JobNote> {
    let text = text.map(str::trim).filter(|value| !value.is_empty())?;

    Some(JobNote {
        id: Uuid::new_v4().to_string(),
        text: text.to_string(),
        status: NoteStatus::Undone,
        created_at: submission.created_at,
        updated_at: submission.updated_at,
        technician: submission.technician.display_name(),
        synced_at,
        submission_id: Some(submission.id.0.clone()),
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NoteMerge {
    pub notes: Vec<JobNote>,
    /// Fresh notes whose submission had no earlier entry in the collection.
    pub added: usize,
    /// Fresh notes that superseded an earlier entry from the same submission.
    pub replaced: usize,
    pub removed: usize,
}

/// Rewrites a note collection for a batch of reprocessed submissions.
///
/// Every existing entry tagged with a submission id from `reprocessed` is dropped before
/// `fresh` is appended, so each submission keeps at most one live entry. Entries from other
/// submissions, and manual entries without a submission id, are kept in place.
pub fn merge_submission_notes(
    existing: Vec<JobNote>,
    reprocessed: &HashSet<String>,
    fresh: Vec<JobNote>,
) -> NoteMerge {
    let mut purged_ids = HashSet::new();
    let mut notes = Vec::with_capacity(existing.len() + fresh.len());

    for note in existing {
        match note.submission_id.as_deref() {
            Some(id) if reprocessed.contains(id) => {
                purged_ids.insert(id.to_string());
            }
            _ => notes.push(note),
        }
    }
    let removed = purged_ids.len();

    let mut added = 0;
    let mut replaced = 0;
    for note in fresh {
        let supersedes =
            note.submission_id.as_deref().map(|id| purged_ids.contains(id)).unwrap_or(false);
        if supersedes {
            replaced += 1;
        } else {
            added += 1;
        }
        notes.push(note);
    }

    NoteMerge { notes, added, replaced, removed }
}
