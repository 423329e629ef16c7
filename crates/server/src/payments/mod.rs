pub mod invoicing;
pub mod poll;
pub mod reconciler;
pub mod webhook;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use secrecy::SecretString;

pub use invoicing::{ApprovalOutcome, ProposalService};
pub use poll::PaymentPoller;
pub use reconciler::{AppliedPayment, EmailDelivery, InvoicePayment, PaymentOutcome, PaymentReconciler};
pub use webhook::BillingEvent;

#[derive(Clone)]
pub struct PaymentsState {
    pub reconciler: Arc<PaymentReconciler>,
    pub poller: Arc<PaymentPoller>,
    pub proposals: Arc<ProposalService>,
    /// Billing webhook deliveries are only authenticated when this is set.
    pub webhook_secret: Option<SecretString>,
    pub signature_header: String,
    pub poll_secret: Option<SecretString>,
}

pub fn router(state: PaymentsState) -> Router {
    Router::new()
        .route("/api/v1/billing/webhook", post(webhook::billing_webhook))
        .route("/api/v1/billing/poll", get(poll::trigger_poll))
        .route("/api/v1/billing/runs", get(poll::list_runs))
        .route("/api/v1/proposals/{id}/approve", post(invoicing::approve_proposal))
        .route("/api/v1/proposals/{id}/stages/{stage}/invoice", post(invoicing::issue_invoice))
        .with_state(state)
}
