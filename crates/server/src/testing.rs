//! In-process doubles for the outbound integrations, shared by the payment tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use fieldops_core::domain::customer::{Customer, CustomerId};
use fieldops_core::domain::job::{ChecklistItem, Job, JobId, JobNumber, JobStatus, JobType};
use fieldops_core::domain::payment::{
    PaymentStage, Proposal, ProposalId, ProposalStatus, StagePayment,
};
use fieldops_db::repositories::{
    CustomerRepository, InMemoryCustomerRepository, InMemoryJobRepository,
    InMemoryProposalRepository, InMemorySyncRunRepository, JobRepository, ProposalRepository,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::sync::Mutex;

use crate::billing::{
    BillingClient, BillingError, BillingSession, NewBillingCustomer, NewInvoice, RemoteCustomer,
    RemoteInvoice,
};
use crate::email::{EmailError, EmailMessage, EmailSender, EmailTemplates};
use crate::geocode::{CountyLookup, GeocodeError};
use crate::payments::{PaymentPoller, PaymentReconciler, PaymentsState, ProposalService};

#[derive(Default)]
pub struct FakeBillingClient {
    pub invoices: Mutex<HashMap<String, RemoteInvoice>>,
    pub customers: Mutex<HashMap<String, RemoteCustomer>>,
    pub created_invoices: Mutex<Vec<NewInvoice>>,
    pub sent_invoices: Mutex<Vec<String>>,
    pub fail_login: AtomicBool,
    next_id: AtomicU32,
}

impl FakeBillingClient {
    pub async fn put_invoice(&self, invoice: RemoteInvoice) {
        self.invoices.lock().await.insert(invoice.id.clone(), invoice);
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait::async_trait]
impl BillingClient for FakeBillingClient {
    async fn login(&self) -> Result<BillingSession, BillingError> {
        if self.fail_login.load(Ordering::SeqCst) {
            return Err(BillingError::Status { operation: "login", status: 401 });
        }
        Ok(BillingSession::new("session-1"))
    }

    async fn get_invoice(
        &self,
        _session: &BillingSession,
        invoice_id: &str,
    ) -> Result<RemoteInvoice, BillingError> {
        self.invoices
            .lock()
            .await
            .get(invoice_id)
            .cloned()
            .ok_or(BillingError::Status { operation: "get_invoice", status: 404 })
    }

    async fn create_invoice(
        &self,
        _session: &BillingSession,
        invoice: &NewInvoice,
    ) -> Result<String, BillingError> {
        let id = self.next_id("INV");
        self.created_invoices.lock().await.push(invoice.clone());
        self.put_invoice(RemoteInvoice {
            id: id.clone(),
            status: "open".to_string(),
            amount: invoice.amount,
            paid_at: None,
            line_items: invoice.line_items.clone(),
        })
        .await;
        Ok(id)
    }

    async fn send_invoice(
        &self,
        _session: &BillingSession,
        invoice_id: &str,
    ) -> Result<(), BillingError> {
        self.sent_invoices.lock().await.push(invoice_id.to_string());
        Ok(())
    }

    async fn create_customer(
        &self,
        _session: &BillingSession,
        customer: &NewBillingCustomer,
    ) -> Result<String, BillingError> {
        let id = self.next_id("BC");
        self.customers.lock().await.insert(
            id.clone(),
            RemoteCustomer { id: id.clone(), name: customer.name.clone(), email: customer.email.clone() },
        );
        Ok(id)
    }

    async fn get_customer(
        &self,
        _session: &BillingSession,
        customer_id: &str,
    ) -> Result<RemoteCustomer, BillingError> {
        self.customers
            .lock()
            .await
            .get(customer_id)
            .cloned()
            .ok_or(BillingError::Status { operation: "get_customer", status: 404 })
    }
}

#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
    fail_next: AtomicBool,
}

impl RecordingEmailSender {
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(EmailError::Status { status: 502 });
        }
        self.sent.lock().await.push(message);
        Ok(())
    }
}

pub struct FixedCountyLookup(pub &'static str);

#[async_trait::async_trait]
impl CountyLookup for FixedCountyLookup {
    async fn county_for(&self, _address: &str) -> Result<Option<String>, GeocodeError> {
        Ok(Some(self.0.to_string()))
    }
}

pub struct Fixture {
    pub payments: Arc<PaymentReconciler>,
    pub proposals: Arc<InMemoryProposalRepository>,
    pub jobs: Arc<InMemoryJobRepository>,
    pub customers: Arc<InMemoryCustomerRepository>,
    pub runs: Arc<InMemorySyncRunRepository>,
    pub email: Arc<RecordingEmailSender>,
    pub billing: Arc<FakeBillingClient>,
}

pub const PROPOSAL_ID: &str = "P-1";

impl Fixture {
    pub async fn proposal(&self) -> Proposal {
        self.proposals
            .find_by_id(&ProposalId(PROPOSAL_ID.to_string()))
            .await
            .expect("proposal lookup")
            .expect("seeded proposal")
    }

    pub async fn make_customer_placeholder(&self) {
        let id = CustomerId("C-1".to_string());
        let mut customer =
            self.customers.find_by_id(&id).await.expect("lookup").expect("seeded customer");
        customer.is_placeholder = true;
        self.customers.save(customer).await.expect("save");
    }
}

/// Customer, job with checklist, and an approved 3000/4000/3000 proposal whose deposit is
/// invoiced as `INV-DEP`.
pub async fn seeded_payments() -> Fixture {
    let now = Utc::now();
    let customers = Arc::new(InMemoryCustomerRepository::default());
    let jobs = Arc::new(InMemoryJobRepository::default());
    let proposals = Arc::new(InMemoryProposalRepository::default());

    customers
        .save(Customer {
            id: CustomerId("C-1".to_string()),
            name: "Pat Lee".to_string(),
            address: Some("12 Oak St, Raleigh NC".to_string()),
            email: Some("pat@example.com".to_string()),
            phone: None,
            billing_customer_id: None,
            is_placeholder: false,
            created_by: "office".to_string(),
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("seed customer");

    let job_id = JobId("J-1".to_string());
    jobs.insert(Job {
        id: job_id.clone(),
        job_number: JobNumber::from_sequence(1),
        customer_id: CustomerId("C-1".to_string()),
        service_address: Some("12 Oak St, Raleigh NC".to_string()),
        job_type: JobType::Installation,
        status: JobStatus::Scheduled,
        additional_notes: Vec::new(),
        materials_notes: Vec::new(),
        created_by: "office".to_string(),
        created_at: now,
        updated_at: now,
    })
    .await
    .expect("seed job");
    for stage in PaymentStage::ALL {
        jobs.ensure_checklist_item(ChecklistItem {
            job_id: job_id.clone(),
            item_key: stage.checklist_key().to_string(),
            label: stage.label().to_string(),
            checked: false,
            checked_at: None,
        })
        .await
        .expect("seed checklist");
    }

    let mut proposal = Proposal {
        id: ProposalId(PROPOSAL_ID.to_string()),
        job_id,
        customer_id: CustomerId("C-1".to_string()),
        status: ProposalStatus::Draft,
        total_amount: Decimal::new(10_000, 0),
        paid_amount: Decimal::ZERO,
        current_stage: None,
        stages: vec![
            StagePayment::unpaid(PaymentStage::Deposit, Decimal::new(3_000, 0)),
            StagePayment::unpaid(PaymentStage::Progress, Decimal::new(4_000, 0)),
            StagePayment::unpaid(PaymentStage::Final, Decimal::new(3_000, 0)),
        ],
        created_at: now,
        updated_at: now,
    };
    proposal.approve(now).expect("approve");
    proposal.assign_invoice(PaymentStage::Deposit, "INV-DEP", now).expect("invoice");
    proposals.save(proposal).await.expect("seed proposal");

    let email = Arc::new(RecordingEmailSender::default());
    let payments = Arc::new(PaymentReconciler::new(
        proposals.clone(),
        jobs.clone(),
        customers.clone(),
        email.clone(),
        Arc::new(EmailTemplates::embedded().expect("templates")),
        Arc::new(FixedCountyLookup("Wake")),
    ));

    Fixture {
        payments,
        proposals,
        jobs,
        customers,
        runs: Arc::new(InMemorySyncRunRepository::default()),
        email,
        billing: Arc::new(FakeBillingClient::default()),
    }
}

/// Router state over the fixture, with billing enabled against the fake platform.
pub fn payments_state(
    fixture: &Fixture,
    webhook_secret: Option<&str>,
    poll_secret: Option<&str>,
) -> PaymentsState {
    let billing: Arc<dyn BillingClient> = fixture.billing.clone();
    PaymentsState {
        reconciler: fixture.payments.clone(),
        poller: Arc::new(PaymentPoller::new(
            Some(billing.clone()),
            fixture.proposals.clone(),
            fixture.runs.clone(),
            fixture.payments.clone(),
            50,
        )),
        proposals: Arc::new(ProposalService::new(
            fixture.proposals.clone(),
            fixture.jobs.clone(),
            fixture.customers.clone(),
            Some(billing),
        )),
        webhook_secret: webhook_secret.map(|secret| SecretString::from(secret.to_string())),
        signature_header: "x-billing-signature".to_string(),
        poll_secret: poll_secret.map(|secret| SecretString::from(secret.to_string())),
    }
}
