//! Transactional email delivery and the templates rendered for it.

use fieldops_core::config::EmailConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::debug;

const PAYMENT_CONFIRMATION: &str = "payment_confirmation.html";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("email integration is not configured: {0}")]
    NotConfigured(String),
    #[error("email template failed to render: {0}")]
    Template(#[from] tera::Error),
    #[error("email request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email service returned HTTP {status}")]
    Status { status: u16 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

pub struct HttpEmailSender {
    client: Client,
    base_url: String,
    api_key: SecretString,
    from_address: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl HttpEmailSender {
    pub fn from_config(config: &EmailConfig) -> Result<Self, EmailError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| EmailError::NotConfigured("email.api_key is not set".to_string()))?;

        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait::async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&SendEmailRequest {
                from: &self.from_address,
                to: &message.to,
                subject: &message.subject,
                html: &message.html,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmailError::Status { status: status.as_u16() });
        }
        Ok(())
    }
}

/// Sender used while the email integration is disabled.
#[derive(Default)]
pub struct NoopEmailSender;

#[async_trait::async_trait]
impl EmailSender for NoopEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        debug!(
            event_name = "integration.email.skipped",
            correlation_id = "none",
            subject = %message.subject,
            "email integration disabled; message dropped"
        );
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentConfirmation {
    pub customer_name: String,
    pub customer_email: String,
    pub job_number: String,
    pub stage_label: String,
    pub next_stage_label: Option<String>,
    pub amount: String,
    pub invoice_id: String,
}

pub struct EmailTemplates {
    tera: Tera,
}

impl EmailTemplates {
    pub fn embedded() -> Result<Self, EmailError> {
        let mut tera = Tera::default();
        tera.add_raw_template(
            PAYMENT_CONFIRMATION,
            include_str!("../../../templates/email/payment_confirmation.html"),
        )?;
        Ok(Self { tera })
    }

    pub fn payment_confirmation(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<EmailMessage, EmailError> {
        let context = Context::from_serialize(confirmation)?;
        let html = self.tera.render(PAYMENT_CONFIRMATION, &context)?;

        Ok(EmailMessage {
            to: confirmation.customer_email.clone(),
            subject: format!(
                "{} received for job {}",
                confirmation.stage_label, confirmation.job_number
            ),
            html,
        })
    }
}
