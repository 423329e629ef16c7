use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use fieldops_core::domain::sync::{SyncRun, SyncTrigger};
use fieldops_core::errors::ApplicationError;
use fieldops_db::repositories::{ProposalRepository, SyncRunRepository};
use secrecy::ExposeSecret;
use tracing::{info, warn};

use super::reconciler::{InvoicePayment, PaymentOutcome, PaymentReconciler};
use super::PaymentsState;
use crate::api::{bearer_matches, correlation_id, ApiError};
use crate::billing::BillingClient;

const RECENT_RUNS: u32 = 20;

/// Pulls invoice status for open proposal stages and applies any payments found.
pub struct PaymentPoller {
    billing: Option<Arc<dyn BillingClient>>,
    proposals: Arc<dyn ProposalRepository>,
    runs: Arc<dyn SyncRunRepository>,
    reconciler: Arc<PaymentReconciler>,
    batch_limit: u32,
}

impl PaymentPoller {
    pub fn new(
        billing: Option<Arc<dyn BillingClient>>,
        proposals: Arc<dyn ProposalRepository>,
        runs: Arc<dyn SyncRunRepository>,
        reconciler: Arc<PaymentReconciler>,
        batch_limit: u32,
    ) -> Self {
        Self { billing, proposals, runs, reconciler, batch_limit }
    }

    /// Runs one cycle and persists its record. Failing to reach the billing platform fails
    /// the run as a whole; errors on single invoices are collected and the cycle continues.
    pub async fn run_cycle(&self, trigger: SyncTrigger) -> Result<SyncRun, ApplicationError> {
        let mut run = SyncRun::start(trigger, Utc::now());
        info!(
            event_name = "payments.poll.started",
            correlation_id = %run.id,
            trigger = trigger.as_str(),
            "payment poll started"
        );

        let Some(billing) = self.billing.as_ref() else {
            run.fail("billing integration is disabled", Utc::now());
            return self.record(run).await;
        };
        let session = match billing.login().await {
            Ok(session) => session,
            Err(error) => {
                run.fail(format!("billing login failed: {error}"), Utc::now());
                return self.record(run).await;
            }
        };
        let proposals = match self.proposals.list_open(self.batch_limit).await {
            Ok(proposals) => proposals,
            Err(error) => {
                run.fail(format!("could not list open proposals: {error}"), Utc::now());
                return self.record(run).await;
            }
        };

        for proposal in proposals {
            run.proposals_checked += 1;
            for (stage, invoice_id) in proposal.open_invoiced_stages() {
                let invoice = match billing.get_invoice(&session, &invoice_id).await {
                    Ok(invoice) => invoice,
                    Err(error) => {
                        run.errors.push(format!(
                            "proposal {} {} invoice {invoice_id}: {error}",
                            proposal.id,
                            stage.as_str()
                        ));
                        continue;
                    }
                };
                if !invoice.is_paid() {
                    continue;
                }

                let payment = InvoicePayment {
                    invoice_id: invoice.id.clone(),
                    paid_at: invoice.paid_at.unwrap_or_else(Utc::now),
                    line_items: invoice.line_items,
                };
                match self.reconciler.apply_invoice_payment(payment).await {
                    Ok(PaymentOutcome::Applied(applied)) => {
                        applied.log_side_effects(&run.id);
                        run.stages_paid += 1;
                    }
                    Ok(PaymentOutcome::AlreadyPaid { .. } | PaymentOutcome::UnknownInvoice { .. }) => {}
                    Err(error) => run.errors.push(format!(
                        "proposal {} {} invoice {invoice_id}: {error}",
                        proposal.id,
                        stage.as_str()
                    )),
                }
            }
        }

        run.finish(Utc::now());
        self.record(run).await
    }

    async fn record(&self, run: SyncRun) -> Result<SyncRun, ApplicationError> {
        self.runs.save(run.clone()).await?;
        if run.errors.is_empty() {
            info!(
                event_name = "payments.poll.finished",
                correlation_id = %run.id,
                status = run.status.as_str(),
                proposals_checked = run.proposals_checked,
                stages_paid = run.stages_paid,
                "payment poll finished"
            );
        } else {
            warn!(
                event_name = "payments.poll.finished",
                correlation_id = %run.id,
                status = run.status.as_str(),
                proposals_checked = run.proposals_checked,
                stages_paid = run.stages_paid,
                errors = run.errors.len(),
                "payment poll finished with errors"
            );
        }
        Ok(run)
    }

    pub async fn recent_runs(&self) -> Result<Vec<SyncRun>, ApplicationError> {
        Ok(self.runs.list_recent(RECENT_RUNS).await?)
    }
}

fn authorize(state: &PaymentsState, headers: &HeaderMap, correlation_id: &str) -> Result<(), ApiError> {
    let expected = state.poll_secret.as_ref().map(|secret| secret.expose_secret());
    if bearer_matches(headers, expected) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("poll token mismatch", correlation_id))
    }
}

pub async fn trigger_poll(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
) -> Result<Json<SyncRun>, ApiError> {
    let correlation_id = correlation_id(&headers);
    authorize(&state, &headers, &correlation_id)?;

    state
        .poller
        .run_cycle(SyncTrigger::Poll)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &correlation_id))
}

pub async fn list_runs(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SyncRun>>, ApiError> {
    let correlation_id = correlation_id(&headers);
    authorize(&state, &headers, &correlation_id)?;

    state
        .poller
        .recent_runs()
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &correlation_id))
}
