use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use fieldops_core::domain::customer::{Customer, CustomerId};
use fieldops_core::domain::job::{
    address_key, ChecklistItem, ChecklistUpdate, Job, JobId, JobNote, JobNumber,
};
use fieldops_core::domain::payment::{PaymentLedgerEntry, PaymentStage, Proposal, ProposalId, ProposalStatus};
use fieldops_core::domain::submission::{SubmissionId, SubmissionReceipt};
use fieldops_core::domain::sync::SyncRun;

use super::{
    CustomerRepository, JobRepository, ProposalRepository, RepositoryError,
    SubmissionReceiptRepository, SyncRunRepository,
};

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<String, Customer>>,
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id.0).cloned())
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }

    async fn list_with_address(&self) -> Result<Vec<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        let mut listed: Vec<Customer> = customers
            .values()
            .filter(|customer| !customer.is_placeholder && customer.has_address())
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(listed)
    }

    async fn get_or_create_placeholder(
        &self,
        candidate: Customer,
    ) -> Result<Customer, RepositoryError> {
        let mut customers = self.customers.write().await;
        let existing = customers.values().find(|customer| {
            customer.is_placeholder
                || (candidate.email.is_some() && customer.email == candidate.email)
        });
        if let Some(existing) = existing {
            return Ok(existing.clone());
        }

        let placeholder = Customer { is_placeholder: true, address: None, ..candidate };
        customers.insert(placeholder.id.0.clone(), placeholder.clone());
        Ok(placeholder)
    }

    async fn first_created_by(&self) -> Result<Option<String>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers
            .values()
            .filter(|customer| !customer.is_placeholder)
            .min_by_key(|customer| customer.created_at)
            .map(|customer| customer.created_by.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<String, Job>>,
    checklists: RwLock<HashMap<(String, String), ChecklistItem>>,
    last_job_number: RwLock<i64>,
}

#[async_trait::async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(&id.0).cloned())
    }

    async fn find_by_exact_address(&self, address: &str) -> Result<Option<Job>, RepositoryError> {
        let wanted = address_key(address);
        let jobs = self.jobs.read().await;
        Ok(jobs
            .values()
            .filter(|job| {
                job.service_address
                    .as_deref()
                    .map(|candidate| address_key(candidate) == wanted)
                    .unwrap_or(false)
            })
            .max_by_key(|job| job.created_at)
            .cloned())
    }

    async fn list_recent_with_address(&self, limit: u32) -> Result<Vec<Job>, RepositoryError> {
        let jobs = self.jobs.read().await;
        let mut listed: Vec<Job> = jobs
            .values()
            .filter(|job| {
                job.service_address.as_deref().map(|value| !value.trim().is_empty()).unwrap_or(false)
            })
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed.truncate(limit as usize);
        Ok(listed)
    }

    async fn next_job_number(&self) -> Result<JobNumber, RepositoryError> {
        let mut last = self.last_job_number.write().await;
        *last += 1;
        Ok(JobNumber::from_sequence(*last))
    }

    async fn insert(&self, job: Job) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.0.clone(), job);
        Ok(())
    }

    async fn update_notes(
        &self,
        id: &JobId,
        additional_notes: &[JobNote],
        materials_notes: &[JobNote],
        updated_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id.0).ok_or_else(|| RepositoryError::NotFound(format!("job `{id}`")))?;
        job.additional_notes = additional_notes.to_vec();
        job.materials_notes = materials_notes.to_vec();
        job.updated_at = updated_at;
        Ok(())
    }

    async fn first_created_by(&self) -> Result<Option<String>, RepositoryError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.values().min_by_key(|job| job.created_at).map(|job| job.created_by.clone()))
    }

    async fn ensure_checklist_item(&self, item: ChecklistItem) -> Result<(), RepositoryError> {
        let mut checklists = self.checklists.write().await;
        checklists.entry((item.job_id.0.clone(), item.item_key.clone())).or_insert(item);
        Ok(())
    }

    async fn checklist(&self, job_id: &JobId) -> Result<Vec<ChecklistItem>, RepositoryError> {
        let checklists = self.checklists.read().await;
        let mut items: Vec<ChecklistItem> =
            checklists.values().filter(|item| item.job_id == *job_id).cloned().collect();
        items.sort_by(|a, b| a.item_key.cmp(&b.item_key));
        Ok(items)
    }

    async fn check_item(
        &self,
        job_id: &JobId,
        item_key: &str,
        checked_at: DateTime<Utc>,
    ) -> Result<ChecklistUpdate, RepositoryError> {
        let mut checklists = self.checklists.write().await;
        let Some(item) = checklists.get_mut(&(job_id.0.clone(), item_key.to_string())) else {
            return Ok(ChecklistUpdate::Missing);
        };
        if item.checked {
            return Ok(ChecklistUpdate::AlreadyChecked);
        }
        item.checked = true;
        item.checked_at = Some(checked_at);
        Ok(ChecklistUpdate::Checked)
    }
}

#[derive(Default)]
pub struct InMemorySubmissionReceiptRepository {
    receipts: RwLock<HashMap<String, SubmissionReceipt>>,
}

#[async_trait::async_trait]
impl SubmissionReceiptRepository for InMemorySubmissionReceiptRepository {
    async fn find(&self, id: &SubmissionId) -> Result<Option<SubmissionReceipt>, RepositoryError> {
        let receipts = self.receipts.read().await;
        Ok(receipts.get(&id.0).cloned())
    }

    async fn record(&self, receipt: SubmissionReceipt) -> Result<(), RepositoryError> {
        let mut receipts = self.receipts.write().await;
        receipts.insert(receipt.submission_id.0.clone(), receipt);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProposalRepository {
    proposals: RwLock<HashMap<String, Proposal>>,
    ledger: RwLock<HashMap<(String, PaymentStage), PaymentLedgerEntry>>,
}

#[async_trait::async_trait]
impl ProposalRepository for InMemoryProposalRepository {
    async fn find_by_id(&self, id: &ProposalId) -> Result<Option<Proposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        Ok(proposals.get(&id.0).cloned())
    }

    async fn save(&self, proposal: Proposal) -> Result<(), RepositoryError> {
        let mut proposals = self.proposals.write().await;
        proposals.insert(proposal.id.0.clone(), proposal);
        Ok(())
    }

    async fn find_by_invoice_id(
        &self,
        invoice_id: &str,
    ) -> Result<Option<Proposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        Ok(proposals.values().find(|proposal| proposal.stage_for_invoice(invoice_id).is_some()).cloned())
    }

    async fn list_open(&self, limit: u32) -> Result<Vec<Proposal>, RepositoryError> {
        let proposals = self.proposals.read().await;
        let mut listed: Vec<Proposal> = proposals
            .values()
            .filter(|proposal| {
                proposal.status == ProposalStatus::Approved
                    && !proposal.open_invoiced_stages().is_empty()
            })
            .cloned()
            .collect();
        listed.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        listed.truncate(limit as usize);
        Ok(listed)
    }

    async fn insert_ledger_entry(
        &self,
        entry: PaymentLedgerEntry,
    ) -> Result<bool, RepositoryError> {
        let mut ledger = self.ledger.write().await;
        let key = (entry.proposal_id.0.clone(), entry.stage);
        if ledger.contains_key(&key) {
            return Ok(false);
        }
        ledger.insert(key, entry);
        Ok(true)
    }

    async fn ledger_for_proposal(
        &self,
        id: &ProposalId,
    ) -> Result<Vec<PaymentLedgerEntry>, RepositoryError> {
        let ledger = self.ledger.read().await;
        let mut entries: Vec<PaymentLedgerEntry> =
            ledger.values().filter(|entry| entry.proposal_id == *id).cloned().collect();
        entries.sort_by(|a, b| a.received_at.cmp(&b.received_at));
        Ok(entries)
    }
}

#[derive(Default)]
pub struct InMemorySyncRunRepository {
    runs: RwLock<HashMap<String, SyncRun>>,
}

#[async_trait::async_trait]
impl SyncRunRepository for InMemorySyncRunRepository {
    async fn save(&self, run: SyncRun) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write().await;
        runs.insert(run.id.clone(), run);
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SyncRun>, RepositoryError> {
        let runs = self.runs.read().await;
        let mut listed: Vec<SyncRun> = runs.values().cloned().collect();
        listed.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        listed.truncate(limit as usize);
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use fieldops_core::domain::customer::{Customer, CustomerId};
    use fieldops_core::domain::job::{Job, JobId, JobNumber, JobStatus, JobType};

    use crate::repositories::{
        CustomerRepository, InMemoryCustomerRepository, InMemoryJobRepository, JobRepository,
    };

    fn job(id: &str, address: &str, age_minutes: i64) -> Job {
        let created = Utc::now() - Duration::minutes(age_minutes);
        Job {
            id: JobId(id.to_string()),
            job_number: JobNumber::from_sequence(age_minutes),
            customer_id: CustomerId("C-1".to_string()),
            service_address: Some(address.to_string()),
            job_type: JobType::Maintenance,
            status: JobStatus::NotScheduled,
            additional_notes: Vec::new(),
            materials_notes: Vec::new(),
            created_by: "system".to_string(),
            created_at: created,
            updated_at: created,
        }
    }

    #[tokio::test]
    async fn in_memory_placeholder_is_reused() {
        let repo = InMemoryCustomerRepository::default();
        let now = Utc::now();

        let first = repo
            .get_or_create_placeholder(Customer::placeholder("N/A", "p@fieldops.invalid", "system", now))
            .await
            .expect("first");
        let second = repo
            .get_or_create_placeholder(Customer::placeholder("N/A", "p@fieldops.invalid", "system", now))
            .await
            .expect("second");

        assert_eq!(first.id, second.id);
        assert!(repo.list_with_address().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn in_memory_customer_listing_needs_address() {
        let repo = InMemoryCustomerRepository::default();
        let now = Utc::now();
        repo.save(Customer {
            id: CustomerId("C-1".to_string()),
            name: "Pat Lee".to_string(),
            address: Some("500 Oak Ave".to_string()),
            email: None,
            phone: None,
            billing_customer_id: None,
            is_placeholder: false,
            created_by: "owner".to_string(),
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("save");

        assert_eq!(repo.list_with_address().await.expect("list").len(), 1);
        assert_eq!(repo.first_created_by().await.expect("creator").as_deref(), Some("owner"));
    }

    #[tokio::test]
    async fn in_memory_jobs_mirror_sql_lookup_rules() {
        let repo = InMemoryJobRepository::default();
        repo.insert(job("J-old", "500 Oak Ave", 30)).await.expect("old");
        repo.insert(job("J-new", "500 oak ave ", 5)).await.expect("new");
        repo.insert(job("J-other", "10 Elm Dr", 10)).await.expect("other");

        let exact = repo.find_by_exact_address("500 OAK AVE").await.expect("exact");
        assert_eq!(exact.map(|job| job.id.0), Some("J-new".to_string()));

        let recent = repo.list_recent_with_address(2).await.expect("recent");
        let ids: Vec<&str> = recent.iter().map(|job| job.id.0.as_str()).collect();
        assert_eq!(ids, vec!["J-new", "J-other"]);

        assert_eq!(repo.next_job_number().await.expect("number").0, "JOB-0001");
        assert_eq!(repo.next_job_number().await.expect("number").0, "JOB-0002");

        repo.insert(job("J-accent", "12 Éclair Ct", 1)).await.expect("accent");
        let folded = repo.find_by_exact_address("12 ÉCLAIR CT").await.expect("folded");
        assert_eq!(folded.map(|job| job.id.0), Some("J-accent".to_string()));
    }
}
