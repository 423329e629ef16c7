//! Billing-platform webhook deliveries.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::{DateTime, Utc};
use fieldops_core::domain::payment::InvoiceLineItem;
use fieldops_core::webhook::verify_signature;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::reconciler::{InvoicePayment, PaymentOutcome};
use super::PaymentsState;
use crate::api::{correlation_id, ApiError};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "eventType")]
pub enum BillingEvent {
    #[serde(rename = "invoice.paid")]
    InvoicePaid(InvoicePaidEvent),
    #[serde(rename = "payment.received")]
    PaymentReceived(PaymentReceivedEvent),
    #[serde(rename = "payment.updated")]
    PaymentUpdated(PaymentUpdatedEvent),
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePaidEvent {
    pub invoice_id: String,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub line_items: Vec<InvoiceLineItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceivedEvent {
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub invoice_ids: Vec<String>,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdatedEvent {
    pub invoice_id: String,
    pub status: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl BillingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvoicePaid(_) => "invoice.paid",
            Self::PaymentReceived(_) => "payment.received",
            Self::PaymentUpdated(_) => "payment.updated",
            Self::Unknown => "unknown",
        }
    }

    /// Payments this event reports. Events that do not report a completed payment yield none.
    pub fn into_payments(self, received_at: DateTime<Utc>) -> Vec<InvoicePayment> {
        match self {
            Self::InvoicePaid(event) => vec![InvoicePayment {
                invoice_id: event.invoice_id,
                paid_at: event.paid_at.unwrap_or(received_at),
                line_items: event.line_items,
            }],
            Self::PaymentReceived(event) => {
                let paid_at = event.received_at.unwrap_or(received_at);
                event
                    .invoice_ids
                    .into_iter()
                    .filter(|id| !id.trim().is_empty())
                    .map(|invoice_id| InvoicePayment { invoice_id, paid_at, line_items: Vec::new() })
                    .collect()
            }
            Self::PaymentUpdated(event) => {
                if !matches!(event.status.trim().to_ascii_lowercase().as_str(), "paid" | "paid_in_full") {
                    return Vec::new();
                }
                vec![InvoicePayment {
                    invoice_id: event.invoice_id,
                    paid_at: event.updated_at.unwrap_or(received_at),
                    line_items: Vec::new(),
                }]
            }
            Self::Unknown => Vec::new(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct BillingWebhookResponse {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<&'static str>,
    pub applied: u32,
    pub already_paid: u32,
    pub unknown_invoices: u32,
    pub errors: u32,
}

/// Checks the delivery signature when a secret is configured.
pub(crate) fn authenticate(state: &PaymentsState, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(secret) = state.webhook_secret.as_ref() else {
        return true;
    };
    headers
        .get(state.signature_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(|signature| verify_signature(secret.expose_secret().as_bytes(), body, signature))
        .unwrap_or(false)
}

pub async fn billing_webhook(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<BillingWebhookResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    if !authenticate(&state, &headers, &body) {
        return Err(ApiError::unauthorized("billing webhook signature mismatch", &correlation_id));
    }

    let event = match serde_json::from_slice::<BillingEvent>(&body) {
        Ok(event) => event,
        Err(error) => {
            warn!(
                event_name = "billing.webhook.undecodable",
                correlation_id = %correlation_id,
                error = %error,
                "billing webhook payload ignored"
            );
            return Ok(Json(BillingWebhookResponse { received: true, ..Default::default() }));
        }
    };

    let event_name = event.name();
    let mut response =
        BillingWebhookResponse { received: true, event: Some(event_name), ..Default::default() };

    for payment in event.into_payments(Utc::now()) {
        let invoice_id = payment.invoice_id.clone();
        match state.reconciler.apply_invoice_payment(payment).await {
            Ok(PaymentOutcome::Applied(applied)) => {
                applied.log_side_effects(&correlation_id);
                response.applied += 1;
            }
            Ok(PaymentOutcome::AlreadyPaid { .. }) => response.already_paid += 1,
            Ok(PaymentOutcome::UnknownInvoice { .. }) => {
                warn!(
                    event_name = "billing.webhook.unknown_invoice",
                    correlation_id = %correlation_id,
                    invoice_id = %invoice_id,
                    "no proposal stage carries this invoice"
                );
                response.unknown_invoices += 1;
            }
            Err(error) => {
                warn!(
                    event_name = "billing.webhook.apply_failed",
                    correlation_id = %correlation_id,
                    invoice_id = %invoice_id,
                    error = %error,
                    "billing webhook payment could not be applied"
                );
                response.errors += 1;
            }
        }
    }

    info!(
        event_name = "billing.webhook.processed",
        correlation_id = %correlation_id,
        billing_event = event_name,
        applied = response.applied,
        already_paid = response.already_paid,
        "billing webhook processed"
    );
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use fieldops_core::webhook::compute_signature;
    use fieldops_db::repositories::ProposalRepository;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::BillingEvent;
    use crate::payments::router;
    use crate::testing::{payments_state, seeded_payments};

    const SECRET: &str = "whsec-test";

    #[test]
    fn events_decode_by_type_and_unknown_types_are_kept() {
        let event: BillingEvent = serde_json::from_value(json!({
            "eventType": "payment.received",
            "paymentId": "PAY-1",
            "invoiceIds": ["INV-1", "INV-2"]
        }))
        .expect("decode");
        assert_eq!(event.into_payments(Utc::now()).len(), 2);

        let event: BillingEvent =
            serde_json::from_value(json!({ "eventType": "customer.created", "id": "x" }))
                .expect("decode");
        assert_eq!(event, BillingEvent::Unknown);

        let pending: BillingEvent = serde_json::from_value(json!({
            "eventType": "payment.updated", "invoiceId": "INV-1", "status": "pending"
        }))
        .expect("decode");
        assert!(pending.into_payments(Utc::now()).is_empty());
    }

    async fn deliver(app: &axum::Router, body: &str, signature: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::post("/api/v1/billing/webhook")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            request = request.header("x-billing-signature", signature);
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::from(body.to_string())).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn signed_delivery_applies_payment_once() {
        let fixture = seeded_payments().await;
        let app = router(payments_state(&fixture, Some(SECRET), None));
        let body = json!({ "eventType": "invoice.paid", "invoiceId": "INV-DEP" }).to_string();
        let signature = compute_signature(SECRET.as_bytes(), body.as_bytes());

        let (status, first) = deliver(&app, &body, Some(&signature)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["applied"], 1);

        let (status, second) = deliver(&app, &body, Some(&signature)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["applied"], 0);
        assert_eq!(second["already_paid"], 1);
        assert_eq!(fixture.proposal().await.paid_amount, Decimal::new(3000, 0));
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_without_mutation() {
        let fixture = seeded_payments().await;
        let app = router(payments_state(&fixture, Some(SECRET), None));
        let body = json!({ "eventType": "invoice.paid", "invoiceId": "INV-DEP" }).to_string();
        let forged = compute_signature(b"wrong-secret", body.as_bytes());

        let (status, _) = deliver(&app, &body, Some(&forged)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = deliver(&app, &body, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let proposal = fixture.proposal().await;
        assert_eq!(proposal.paid_amount, Decimal::ZERO);
        assert!(fixture.proposals.ledger_for_proposal(&proposal.id).await.expect("ledger").is_empty());
    }

    #[tokio::test]
    async fn unknown_and_undecodable_events_are_acknowledged() {
        let fixture = seeded_payments().await;
        let app = router(payments_state(&fixture, None, None));

        let (status, body) = deliver(&app, r#"{"eventType":"customer.created"}"#, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);
        assert_eq!(body["event"], "unknown");

        let (status, body) = deliver(&app, "not json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);
    }
}
