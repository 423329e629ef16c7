pub mod forms;
pub mod import;
pub mod reconciler;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use fieldops_db::repositories::SubmissionReceiptRepository;
use serde::Serialize;
use tracing::info;

use crate::api::{correlation_id, ApiError};
use forms::FormsWebhookPayload;
pub use import::{import_csv, parse_submissions_csv, CSV_HEADER};
pub use reconciler::{ProcessingResult, SubmissionReconciler};

#[derive(Clone)]
pub struct SubmissionsState {
    pub reconciler: Arc<SubmissionReconciler>,
    pub receipts: Arc<dyn SubmissionReceiptRepository>,
}

#[derive(Debug, Serialize)]
pub struct FormsWebhookResponse {
    pub received: bool,
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessingResult>,
}

pub fn router(state: SubmissionsState) -> Router {
    Router::new()
        .route("/api/v1/forms/webhook", post(forms_webhook))
        .route("/api/v1/forms/import", post(forms_import))
        .with_state(state)
}

pub async fn forms_webhook(
    State(state): State<SubmissionsState>,
    headers: HeaderMap,
    Json(payload): Json<FormsWebhookPayload>,
) -> Result<(StatusCode, Json<FormsWebhookResponse>), ApiError> {
    let correlation_id = correlation_id(&headers);
    let submission = payload
        .into_submission(Utc::now())
        .map_err(|error| ApiError::bad_request(error.to_string(), &correlation_id))?;

    let receipt = state
        .receipts
        .find(&submission.id)
        .await
        .map_err(|error| ApiError::from_application(error.into(), &correlation_id))?;
    if receipt.map(|receipt| receipt.covers(&submission)).unwrap_or(false) {
        info!(
            event_name = "forms.webhook.duplicate",
            correlation_id = %correlation_id,
            submission_id = %submission.id,
            "duplicate forms delivery acknowledged"
        );
        return Ok((
            StatusCode::OK,
            Json(FormsWebhookResponse { received: true, duplicate: true, result: None }),
        ));
    }

    let result = state.reconciler.process(std::slice::from_ref(&submission)).await;
    info!(
        event_name = "forms.webhook.processed",
        correlation_id = %correlation_id,
        submission_id = %submission.id,
        success = result.success,
        "forms delivery reconciled"
    );

    Ok((
        StatusCode::OK,
        Json(FormsWebhookResponse { received: true, duplicate: false, result: Some(result) }),
    ))
}

pub async fn forms_import(
    State(state): State<SubmissionsState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<ProcessingResult>, ApiError> {
    let correlation_id = correlation_id(&headers);
    if body.trim().is_empty() {
        return Err(ApiError::bad_request("import body is empty", &correlation_id));
    }

    let result = import_csv(&state.reconciler, &body).await;
    info!(
        event_name = "forms.import.processed",
        correlation_id = %correlation_id,
        processed = result.submissions_processed,
        errors = result.errors.len(),
        "forms import reconciled"
    );
    Ok(Json(result))
}
