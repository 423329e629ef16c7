use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fieldops_core::config::{MatchingConfig, ReconcileConfig};
use fieldops_core::domain::customer::{Customer, CustomerId};
use fieldops_core::domain::job::{Job, JobId, JobNote, JobStatus, JobType};
use fieldops_core::domain::submission::{Submission, SubmissionReceipt};
use fieldops_core::errors::{ApplicationError, DomainError};
use fieldops_core::matching::{AddressCandidate, CandidateResolver};
use fieldops_core::notes::{merge_submission_notes, note_from_submission};
use fieldops_db::repositories::{CustomerRepository, JobRepository, SubmissionReceiptRepository};
use serde::Serialize;
use tracing::{info, warn};

/// Summary of one reconciliation batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub submissions_processed: u32,
    pub jobs_matched: u32,
    pub jobs_created: u32,
    pub notes_added: u32,
    pub notes_updated: u32,
    pub materials_added: u32,
    pub errors: Vec<String>,
}

impl ProcessingResult {
    pub fn writes(&self) -> u32 {
        self.notes_added + self.notes_updated + self.materials_added
    }

    /// Partial success still counts as success as long as something was written.
    fn settle(&mut self) {
        self.success = self.errors.is_empty() || self.writes() > 0;
    }

    /// Folds errors found before reconciliation (e.g. unparsable import rows) into the result.
    pub fn with_input_errors(mut self, errors: Vec<String>) -> Self {
        if !errors.is_empty() {
            let mut combined = errors;
            combined.append(&mut self.errors);
            self.errors = combined;
            self.settle();
        }
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JobResolution {
    Matched,
    Created,
}

/// What one submission contributes to its job.
struct PendingSubmission {
    receipt: SubmissionReceipt,
    additional: Option<JobNote>,
    materials: Option<JobNote>,
}

/// Per-job accumulator holding one entry per submission id. A repeated id keeps the version
/// with the latest `updated_at`, and the later row on ties.
#[derive(Default)]
struct PendingNotes {
    order: Vec<String>,
    latest: HashMap<String, PendingSubmission>,
}

impl PendingNotes {
    fn push(&mut self, entry: PendingSubmission) {
        let key = entry.receipt.submission_id.0.clone();
        let newer_kept = self
            .latest
            .get(&key)
            .map(|current| current.receipt.source_updated_at > entry.receipt.source_updated_at);
        match newer_kept {
            Some(true) => {}
            Some(false) => {
                self.latest.insert(key, entry);
            }
            None => {
                self.order.push(key.clone());
                self.latest.insert(key, entry);
            }
        }
    }

    fn submission_ids(&self) -> HashSet<String> {
        self.order.iter().cloned().collect()
    }

    fn into_entries(mut self) -> Vec<PendingSubmission> {
        self.order.iter().filter_map(|key| self.latest.remove(key)).collect()
    }
}

struct NoteCounts {
    notes_added: u32,
    notes_updated: u32,
    materials_added: u32,
}

/// Resolves field-report submissions to jobs and merges their notes, one write per job.
pub struct SubmissionReconciler {
    customers: Arc<dyn CustomerRepository>,
    jobs: Arc<dyn JobRepository>,
    receipts: Arc<dyn SubmissionReceiptRepository>,
    resolver: CandidateResolver,
    job_candidate_limit: u32,
    reconcile: ReconcileConfig,
}

impl SubmissionReconciler {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        jobs: Arc<dyn JobRepository>,
        receipts: Arc<dyn SubmissionReceiptRepository>,
        matching: &MatchingConfig,
        reconcile: ReconcileConfig,
    ) -> Self {
        Self {
            customers,
            jobs,
            receipts,
            resolver: CandidateResolver::new(matching.address_threshold),
            job_candidate_limit: matching.job_candidate_limit,
            reconcile,
        }
    }

    pub async fn process(&self, submissions: &[Submission]) -> ProcessingResult {
        let synced_at = Utc::now();
        let mut result = ProcessingResult::default();
        let mut order: Vec<JobId> = Vec::new();
        let mut pending: HashMap<JobId, PendingNotes> = HashMap::new();

        for submission in submissions {
            let (job_id, resolution) = match self.resolve_job(submission, synced_at).await {
                Ok(resolved) => resolved,
                Err(error) => {
                    warn!(
                        event_name = "reconcile.submission.failed",
                        correlation_id = %submission.id,
                        error = %error,
                        "submission skipped"
                    );
                    result.errors.push(format!("submission {}: {error}", submission.id));
                    continue;
                }
            };

            result.submissions_processed += 1;
            match resolution {
                JobResolution::Matched => result.jobs_matched += 1,
                JobResolution::Created => result.jobs_created += 1,
            }

            let entry = pending.entry(job_id.clone()).or_insert_with(|| {
                order.push(job_id.clone());
                PendingNotes::default()
            });
            entry.push(PendingSubmission {
                receipt: SubmissionReceipt {
                    submission_id: submission.id.clone(),
                    job_id: Some(job_id.clone()),
                    source_updated_at: submission.updated_at,
                    received_at: synced_at,
                },
                additional: note_from_submission(
                    submission,
                    submission.additional_notes.as_deref(),
                    synced_at,
                ),
                materials: note_from_submission(
                    submission,
                    submission.materials_needed.as_deref(),
                    synced_at,
                ),
            });
        }

        for job_id in order {
            let Some(notes) = pending.remove(&job_id) else {
                continue;
            };
            match self.write_notes(&job_id, notes, synced_at).await {
                Ok(counts) => {
                    result.notes_added += counts.notes_added;
                    result.notes_updated += counts.notes_updated;
                    result.materials_added += counts.materials_added;
                }
                Err(error) => {
                    warn!(
                        event_name = "reconcile.job_notes.failed",
                        correlation_id = %job_id,
                        error = %error,
                        "job note write failed"
                    );
                    result.errors.push(format!("job {job_id}: {error}"));
                }
            }
        }

        result.settle();
        info!(
            event_name = "reconcile.batch.completed",
            correlation_id = "batch",
            submissions = submissions.len(),
            processed = result.submissions_processed,
            jobs_created = result.jobs_created,
            errors = result.errors.len(),
            "submission batch reconciled"
        );
        result
    }

    async fn resolve_job(
        &self,
        submission: &Submission,
        now: DateTime<Utc>,
    ) -> Result<(JobId, JobResolution), ApplicationError> {
        if let Some(job_id) = &submission.job_id {
            if self.jobs.find_by_id(job_id).await?.is_some() {
                return Ok((job_id.clone(), JobResolution::Matched));
            }
            warn!(
                event_name = "reconcile.prelinked_job.missing",
                correlation_id = %submission.id,
                job_id = %job_id,
                "pre-linked job not found; matching by address"
            );
        }

        let address = submission.address.trim();
        if address.is_empty() {
            return Err(DomainError::InvariantViolation(format!(
                "submission `{}` has no service address",
                submission.id
            ))
            .into());
        }

        if let Some(job) = self.jobs.find_by_exact_address(address).await? {
            return Ok((job.id, JobResolution::Matched));
        }

        let recent = self.jobs.list_recent_with_address(self.job_candidate_limit).await?;
        let candidates: Vec<AddressCandidate<JobId>> = recent
            .iter()
            .filter_map(|job| {
                job.service_address
                    .as_deref()
                    .map(|service_address| AddressCandidate::new(job.id.clone(), service_address))
            })
            .collect();
        if let Some(job_id) = self.resolver.resolve(address, &candidates) {
            return Ok((job_id, JobResolution::Matched));
        }

        let job = self.create_job(submission, address, now).await?;
        Ok((job.id, JobResolution::Created))
    }

    async fn create_job(
        &self,
        submission: &Submission,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<Job, ApplicationError> {
        let created_by = self.attribution().await?;
        let customer_id = self.resolve_customer(address, &created_by, now).await?;

        let job = Job {
            id: JobId::generate(),
            job_number: self.jobs.next_job_number().await?,
            customer_id,
            service_address: Some(address.to_string()),
            job_type: JobType::from_free_text(submission.job_type.as_deref()),
            status: JobStatus::NotScheduled,
            additional_notes: Vec::new(),
            materials_notes: Vec::new(),
            created_by,
            created_at: now,
            updated_at: now,
        };
        self.jobs.insert(job.clone()).await?;

        info!(
            event_name = "reconcile.job.created",
            correlation_id = %submission.id,
            job_id = %job.id,
            job_number = %job.job_number,
            customer_id = %job.customer_id,
            "job created from submission"
        );
        Ok(job)
    }

    async fn resolve_customer(
        &self,
        address: &str,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> Result<CustomerId, ApplicationError> {
        let customers = self.customers.list_with_address().await?;
        let candidates: Vec<AddressCandidate<CustomerId>> = customers
            .iter()
            .filter_map(|customer| {
                customer
                    .address
                    .as_deref()
                    .map(|customer_address| AddressCandidate::new(customer.id.clone(), customer_address))
            })
            .collect();
        if let Some(customer_id) = self.resolver.resolve(address, &candidates) {
            return Ok(customer_id);
        }

        let placeholder = self
            .customers
            .get_or_create_placeholder(Customer::placeholder(
                self.reconcile.placeholder_name.as_str(),
                self.reconcile.placeholder_email.as_str(),
                created_by,
                now,
            ))
            .await?;
        Ok(placeholder.id)
    }

    /// Identity recorded as creator of system-made records.
    async fn attribution(&self) -> Result<String, ApplicationError> {
        if let Some(created_by) = self.customers.first_created_by().await? {
            return Ok(created_by);
        }
        if let Some(created_by) = self.jobs.first_created_by().await? {
            return Ok(created_by);
        }
        Ok(self.reconcile.fallback_created_by.clone())
    }

    async fn write_notes(
        &self,
        job_id: &JobId,
        pending: PendingNotes,
        now: DateTime<Utc>,
    ) -> Result<NoteCounts, ApplicationError> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("job `{job_id}`")))?;

        let submission_ids = pending.submission_ids();
        let mut receipts = Vec::new();
        let mut fresh_additional = Vec::new();
        let mut fresh_materials = Vec::new();
        for entry in pending.into_entries() {
            receipts.push(entry.receipt);
            fresh_additional.extend(entry.additional);
            fresh_materials.extend(entry.materials);
        }

        let additional =
            merge_submission_notes(job.additional_notes, &submission_ids, fresh_additional);
        let materials =
            merge_submission_notes(job.materials_notes, &submission_ids, fresh_materials);
        self.jobs.update_notes(job_id, &additional.notes, &materials.notes, now).await?;

        for receipt in receipts {
            let submission_id = receipt.submission_id.clone();
            if let Err(error) = self.receipts.record(receipt).await {
                warn!(
                    event_name = "reconcile.receipt.failed",
                    correlation_id = %submission_id,
                    error = %error,
                    "could not record submission receipt"
                );
            }
        }

        Ok(NoteCounts {
            notes_added: count(additional.added),
            notes_updated: count(additional.replaced + materials.replaced),
            materials_added: count(materials.added),
        })
    }
}

fn count(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use fieldops_core::config::AppConfig;
    use fieldops_core::domain::customer::{Customer, CustomerId};
    use fieldops_core::domain::job::{Job, JobId, JobNumber, JobStatus, JobType};
    use fieldops_core::domain::submission::{Submission, SubmissionId, Technician};
    use fieldops_db::repositories::{
        CustomerRepository, InMemoryCustomerRepository, InMemoryJobRepository,
        InMemorySubmissionReceiptRepository, JobRepository, SubmissionReceiptRepository,
    };

    use super::SubmissionReconciler;

    struct Harness {
        reconciler: SubmissionReconciler,
        customers: Arc<InMemoryCustomerRepository>,
        jobs: Arc<InMemoryJobRepository>,
        receipts: Arc<InMemorySubmissionReceiptRepository>,
    }

    fn harness() -> Harness {
        let config = AppConfig::default();
        let customers = Arc::new(InMemoryCustomerRepository::default());
        let jobs = Arc::new(InMemoryJobRepository::default());
        let receipts = Arc::new(InMemorySubmissionReceiptRepository::default());
        let reconciler = SubmissionReconciler::new(
            customers.clone(),
            jobs.clone(),
            receipts.clone(),
            &config.matching,
            config.reconcile.clone(),
        );
        Harness { reconciler, customers, jobs, receipts }
    }

    fn submission(id: &str, address: &str, notes: Option<&str>) -> Submission {
        let now = Utc::now();
        Submission {
            id: SubmissionId(id.to_string()),
            address: address.to_string(),
            job_type: Some("Repair".to_string()),
            additional_notes: notes.map(str::to_string),
            materials_needed: None,
            technician: Technician {
                first_name: "Dana".to_string(),
                last_name: "Reyes".to_string(),
                email: None,
            },
            created_at: now,
            updated_at: now,
            job_id: None,
        }
    }

    fn customer(id: &str, address: &str) -> Customer {
        let now = Utc::now() - Duration::days(3);
        Customer {
            id: CustomerId(id.to_string()),
            name: format!("Customer {id}"),
            address: Some(address.to_string()),
            email: Some(format!("{id}@example.com")),
            phone: None,
            billing_customer_id: None,
            is_placeholder: false,
            created_by: "office-manager".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn job(id: &str, address: &str) -> Job {
        let now = Utc::now() - Duration::days(1);
        Job {
            id: JobId(id.to_string()),
            job_number: JobNumber::from_sequence(900),
            customer_id: CustomerId("C-1".to_string()),
            service_address: Some(address.to_string()),
            job_type: JobType::Installation,
            status: JobStatus::Scheduled,
            additional_notes: Vec::new(),
            materials_notes: Vec::new(),
            created_by: "office-manager".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn only_job(h: &Harness) -> Job {
        let jobs = h.jobs.list_recent_with_address(10).await.expect("jobs");
        assert_eq!(jobs.len(), 1, "expected exactly one job");
        jobs.into_iter().next().expect("one job")
    }

    #[tokio::test]
    async fn new_address_creates_job_with_one_tagged_note() {
        let h = harness();

        let result = h
            .reconciler
            .process(&[submission("sub-1", "10 Elm Dr", Some("replaced filter"))])
            .await;

        assert!(result.success);
        assert_eq!(result.submissions_processed, 1);
        assert_eq!(result.jobs_created, 1);
        assert_eq!(result.notes_added, 1);

        let job = only_job(&h).await;
        assert_eq!(job.service_address.as_deref(), Some("10 Elm Dr"));
        assert_eq!(job.job_number.0, "JOB-0001");
        assert_eq!(job.job_type, JobType::Repair);
        assert_eq!(job.status, JobStatus::NotScheduled);
        assert_eq!(job.additional_notes.len(), 1);
        assert_eq!(job.additional_notes[0].text, "replaced filter");
        assert_eq!(job.additional_notes[0].submission_id.as_deref(), Some("sub-1"));
        assert_eq!(job.additional_notes[0].technician, "Dana Reyes");
    }

    #[tokio::test]
    async fn reprocessing_edited_submission_supersedes_old_note() {
        let h = harness();
        h.reconciler.process(&[submission("sub-1", "10 Elm Dr", Some("replaced filter"))]).await;

        let mut edited = submission("sub-1", "10 Elm Dr", Some("replaced filter and coil"));
        edited.updated_at = edited.updated_at + Duration::minutes(5);
        let result = h.reconciler.process(&[edited]).await;

        assert_eq!(result.jobs_matched, 1);
        assert_eq!(result.jobs_created, 0);
        assert_eq!(result.notes_updated, 1);
        assert_eq!(result.notes_added, 0);

        let job = only_job(&h).await;
        let tagged: Vec<_> = job
            .additional_notes
            .iter()
            .filter(|note| note.submission_id.as_deref() == Some("sub-1"))
            .collect();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].text, "replaced filter and coil");
    }

    #[tokio::test]
    async fn reprocessing_unchanged_submission_is_idempotent() {
        let h = harness();
        let original = submission("sub-1", "10 Elm Dr", Some("replaced filter"));

        h.reconciler.process(&[original.clone()]).await;
        let first = only_job(&h).await;
        h.reconciler.process(&[original]).await;
        let second = only_job(&h).await;

        let texts = |job: &Job| job.additional_notes.iter().map(|n| n.text.clone()).collect::<Vec<_>>();
        assert_eq!(texts(&first), texts(&second));
        assert_ne!(first.additional_notes[0].id, second.additional_notes[0].id);
    }

    #[tokio::test]
    async fn reprocessing_one_submission_leaves_siblings_untouched() {
        let h = harness();
        h.reconciler
            .process(&[
                submission("sub-x", "10 Elm Dr", Some("checked refrigerant")),
                submission("sub-y", "10 Elm Dr", Some("cleaned drain line")),
            ])
            .await;
        let before = only_job(&h).await;
        let y_before = before
            .additional_notes
            .iter()
            .find(|note| note.submission_id.as_deref() == Some("sub-y"))
            .cloned()
            .expect("y note");

        h.reconciler.process(&[submission("sub-x", "10 Elm Dr", Some("recharged system"))]).await;

        let after = only_job(&h).await;
        assert_eq!(after.additional_notes.len(), 2);
        assert!(after.additional_notes.contains(&y_before));
        assert!(after.additional_notes.iter().any(|note| note.text == "recharged system"));
        assert!(!after.additional_notes.iter().any(|note| note.text == "checked refrigerant"));
    }

    #[tokio::test]
    async fn unmatched_addresses_share_one_placeholder_customer() {
        let h = harness();
        h.customers.save(customer("C-1", "77 Distant Rd, Durham")).await.expect("seed");

        let result = h
            .reconciler
            .process(&[
                submission("sub-1", "10 Elm Dr", Some("a")),
                submission("sub-2", "4410 Pinecrest Court", Some("b")),
            ])
            .await;
        assert_eq!(result.jobs_created, 2);

        let jobs = h.jobs.list_recent_with_address(10).await.expect("jobs");
        assert_eq!(jobs[0].customer_id, jobs[1].customer_id);

        let owner =
            h.customers.find_by_id(&jobs[0].customer_id).await.expect("find").expect("owner");
        assert!(owner.is_placeholder);
        assert_eq!(owner.email.as_deref(), Some("placeholder@fieldops.invalid"));
        assert_eq!(owner.name, "N/A");
        assert_eq!(owner.created_by, "office-manager");
        assert_eq!(jobs[0].created_by, "office-manager");
    }

    #[tokio::test]
    async fn close_customer_address_owns_the_new_job() {
        let h = harness();
        h.customers.save(customer("C-7", "500 Oak Avenue")).await.expect("seed");

        h.reconciler.process(&[submission("sub-1", "500 Oak Ave.", Some("noisy blower"))]).await;

        let job = only_job(&h).await;
        assert_eq!(job.customer_id, CustomerId("C-7".to_string()));
    }

    #[tokio::test]
    async fn existing_job_is_matched_by_fuzzy_address() {
        let h = harness();
        h.jobs.insert(job("J-1", "123 Main Street, Apt 4B")).await.expect("seed");

        let result =
            h.reconciler.process(&[submission("sub-1", "123 main st", Some("swapped capacitor"))]).await;

        assert_eq!(result.jobs_matched, 1);
        assert_eq!(result.jobs_created, 0);
        let job = only_job(&h).await;
        assert_eq!(job.id, JobId("J-1".to_string()));
        assert_eq!(job.additional_notes.len(), 1);
    }

    #[tokio::test]
    async fn prelinked_job_wins_and_missing_link_falls_back_to_address() {
        let h = harness();
        h.jobs.insert(job("J-9", "1 Harbor Way")).await.expect("seed");

        let mut linked = submission("sub-1", "somewhere unrelated", Some("linked"));
        linked.job_id = Some(JobId("J-9".to_string()));
        let mut dangling = submission("sub-2", "1 Harbor Way", Some("dangling"));
        dangling.job_id = Some(JobId("J-404".to_string()));

        let result = h.reconciler.process(&[linked, dangling]).await;

        assert_eq!(result.jobs_matched, 2);
        let job = only_job(&h).await;
        assert_eq!(job.additional_notes.len(), 2);
    }

    #[tokio::test]
    async fn materials_land_in_their_own_collection() {
        let h = harness();
        let mut with_parts = submission("sub-1", "10 Elm Dr", None);
        with_parts.materials_needed = Some("  16x25 filter  ".to_string());

        let result = h.reconciler.process(&[with_parts]).await;

        assert_eq!(result.materials_added, 1);
        assert_eq!(result.notes_added, 0);
        let job = only_job(&h).await;
        assert!(job.additional_notes.is_empty());
        assert_eq!(job.materials_notes[0].text, "16x25 filter");
    }

    #[tokio::test]
    async fn bad_submission_is_reported_without_blocking_the_batch() {
        let h = harness();

        let result = h
            .reconciler
            .process(&[
                submission("sub-bad", "   ", Some("lost")),
                submission("sub-ok", "10 Elm Dr", Some("kept")),
            ])
            .await;

        assert!(result.success, "a written note keeps the batch successful");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("sub-bad"));
        assert_eq!(result.submissions_processed, 1);

        let failed_only = h.reconciler.process(&[submission("sub-bad", "", None)]).await;
        assert!(!failed_only.success);
    }

    #[tokio::test]
    async fn processed_submissions_leave_receipts() {
        let h = harness();
        let original = submission("sub-1", "10 Elm Dr", Some("replaced filter"));
        h.reconciler.process(&[original.clone()]).await;

        let receipt = h.receipts.find(&original.id).await.expect("find").expect("receipt");
        assert!(receipt.covers(&original));
        assert!(receipt.job_id.is_some());
    }

    #[tokio::test]
    async fn repeated_submission_in_one_batch_keeps_one_note() {
        let h = harness();
        let original = submission("sub-1", "10 Elm Dr", Some("replaced filter"));
        let mut edited = submission("sub-1", "10 Elm Dr", Some("replaced filter and coil"));
        edited.updated_at = original.updated_at + Duration::minutes(5);

        let result = h.reconciler.process(&[original, edited.clone()]).await;

        assert_eq!(result.notes_added, 1);
        let job = only_job(&h).await;
        let texts: Vec<&str> = job.additional_notes.iter().map(|note| note.text.as_str()).collect();
        assert_eq!(texts, vec!["replaced filter and coil"]);

        let receipt = h.receipts.find(&edited.id).await.expect("find").expect("receipt");
        assert!(receipt.covers(&edited));
    }

    #[tokio::test]
    async fn stale_row_later_in_batch_does_not_override_newer_edit() {
        let h = harness();
        let mut edited = submission("sub-1", "10 Elm Dr", Some("replaced filter and coil"));
        edited.materials_needed = Some("coil".to_string());
        let mut stale = submission("sub-1", "10 Elm Dr", Some("replaced filter"));
        stale.updated_at = edited.updated_at - Duration::minutes(5);

        h.reconciler.process(&[edited, stale]).await;

        let job = only_job(&h).await;
        let texts: Vec<&str> = job.additional_notes.iter().map(|note| note.text.as_str()).collect();
        assert_eq!(texts, vec!["replaced filter and coil"]);
        assert_eq!(job.materials_notes.len(), 1);
    }
}
