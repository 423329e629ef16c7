//! Client for the billing platform's REST API.
//!
//! Every call after `login` carries the session id and the developer key as headers.

use chrono::{DateTime, Utc};
use fieldops_core::config::BillingConfig;
use fieldops_core::domain::payment::InvoiceLineItem;
use fieldops_core::errors::ApplicationError;
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("billing integration is not configured: {0}")]
    NotConfigured(String),
    #[error("billing request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("billing platform returned HTTP {status} for {operation}")]
    Status { operation: &'static str, status: u16 },
    #[error("billing response for {operation} could not be decoded: {message}")]
    Decode { operation: &'static str, message: String },
}

impl BillingError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

impl From<BillingError> for ApplicationError {
    fn from(value: BillingError) -> Self {
        match value {
            BillingError::NotConfigured(message) => Self::Configuration(message),
            other => Self::Integration(other.to_string()),
        }
    }
}

/// Authenticated session handle returned by [`BillingClient::login`].
#[derive(Clone, Debug)]
pub struct BillingSession {
    id: SecretString,
}

impl BillingSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: SecretString::from(id.into()) }
    }

    pub fn id(&self) -> &str {
        self.id.expose_secret()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteInvoice {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub line_items: Vec<InvoiceLineItem>,
}

impl RemoteInvoice {
    pub fn is_paid(&self) -> bool {
        matches!(self.status.trim().to_ascii_lowercase().as_str(), "paid" | "paid_in_full")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    pub customer_id: String,
    pub invoice_number: String,
    pub description: String,
    pub amount: Decimal,
    pub line_items: Vec<InvoiceLineItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBillingCustomer {
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCustomer {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[async_trait::async_trait]
pub trait BillingClient: Send + Sync {
    async fn login(&self) -> Result<BillingSession, BillingError>;
    async fn get_invoice(
        &self,
        session: &BillingSession,
        invoice_id: &str,
    ) -> Result<RemoteInvoice, BillingError>;
    /// Creates an invoice and returns its billing-platform id.
    async fn create_invoice(
        &self,
        session: &BillingSession,
        invoice: &NewInvoice,
    ) -> Result<String, BillingError>;
    async fn send_invoice(
        &self,
        session: &BillingSession,
        invoice_id: &str,
    ) -> Result<(), BillingError>;
    /// Creates a customer and returns its billing-platform id.
    async fn create_customer(
        &self,
        session: &BillingSession,
        customer: &NewBillingCustomer,
    ) -> Result<String, BillingError>;
    async fn get_customer(
        &self,
        session: &BillingSession,
        customer_id: &str,
    ) -> Result<RemoteCustomer, BillingError>;
}

pub struct HttpBillingClient {
    client: Client,
    base_url: String,
    username: String,
    password: SecretString,
    organization_id: String,
    dev_key: SecretString,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    user_name: &'a str,
    password: &'a str,
    org_id: &'a str,
    dev_key: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    session_id: String,
}

#[derive(Deserialize)]
struct CreatedResponse {
    id: String,
}

impl HttpBillingClient {
    pub fn from_config(config: &BillingConfig) -> Result<Self, BillingError> {
        let missing = |field: &str| BillingError::NotConfigured(format!("billing.{field} is not set"));

        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone().ok_or_else(|| missing("username"))?,
            password: config.password.clone().ok_or_else(|| missing("password"))?,
            organization_id: config
                .organization_id
                .clone()
                .ok_or_else(|| missing("organization_id"))?,
            dev_key: config.dev_key.clone().ok_or_else(|| missing("dev_key"))?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder, session: &BillingSession) -> RequestBuilder {
        builder.header("sessionId", session.id()).header("devKey", self.dev_key.expose_secret())
    }
}

async fn read_json<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, BillingError> {
    let status = response.status();
    if !status.is_success() {
        return Err(BillingError::Status { operation, status: status.as_u16() });
    }
    response
        .json::<T>()
        .await
        .map_err(|error| BillingError::Decode { operation, message: error.to_string() })
}

#[async_trait::async_trait]
impl BillingClient for HttpBillingClient {
    async fn login(&self) -> Result<BillingSession, BillingError> {
        let response = self
            .client
            .post(self.url("login"))
            .json(&LoginRequest {
                user_name: &self.username,
                password: self.password.expose_secret(),
                org_id: &self.organization_id,
                dev_key: self.dev_key.expose_secret(),
            })
            .send()
            .await?;

        let login: LoginResponse = read_json("login", response).await?;
        if login.session_id.trim().is_empty() {
            return Err(BillingError::Decode {
                operation: "login",
                message: "empty session id".to_string(),
            });
        }
        Ok(BillingSession::new(login.session_id))
    }

    async fn get_invoice(
        &self,
        session: &BillingSession,
        invoice_id: &str,
    ) -> Result<RemoteInvoice, BillingError> {
        let request = self.client.get(self.url(&format!("invoices/{invoice_id}")));
        let response = self.authorized(request, session).send().await?;
        read_json("get_invoice", response).await
    }

    async fn create_invoice(
        &self,
        session: &BillingSession,
        invoice: &NewInvoice,
    ) -> Result<String, BillingError> {
        let request = self.client.post(self.url("invoices")).json(invoice);
        let response = self.authorized(request, session).send().await?;
        let created: CreatedResponse = read_json("create_invoice", response).await?;
        Ok(created.id)
    }

    async fn send_invoice(
        &self,
        session: &BillingSession,
        invoice_id: &str,
    ) -> Result<(), BillingError> {
        let request = self.client.post(self.url(&format!("invoices/{invoice_id}/send")));
        let response = self.authorized(request, session).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BillingError::Status { operation: "send_invoice", status: status.as_u16() });
        }
        Ok(())
    }

    async fn create_customer(
        &self,
        session: &BillingSession,
        customer: &NewBillingCustomer,
    ) -> Result<String, BillingError> {
        let request = self.client.post(self.url("customers")).json(customer);
        let response = self.authorized(request, session).send().await?;
        let created: CreatedResponse = read_json("create_customer", response).await?;
        Ok(created.id)
    }

    async fn get_customer(
        &self,
        session: &BillingSession,
        customer_id: &str,
    ) -> Result<RemoteCustomer, BillingError> {
        let request = self.client.get(self.url(&format!("customers/{customer_id}")));
        let response = self.authorized(request, session).send().await?;
        read_json("get_customer", response).await
    }
}
