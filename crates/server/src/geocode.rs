use fieldops_core::config::GeocodeConfig;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// County recorded on ledger entries when the lookup has nothing better.
pub const UNKNOWN_COUNTY: &str = "Unknown";

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding is not configured: {0}")]
    NotConfigured(String),
    #[error("geocoding request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("geocoding service returned HTTP {status}")]
    Status { status: u16 },
}

/// Address to county lookup used for the tax jurisdiction on payment ledger entries.
#[async_trait::async_trait]
pub trait CountyLookup: Send + Sync {
    async fn county_for(&self, address: &str) -> Result<Option<String>, GeocodeError>;
}

pub struct HttpCountyLookup {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CountyResponse {
    #[serde(default)]
    county: Option<String>,
}

impl HttpCountyLookup {
    pub fn from_config(config: &GeocodeConfig) -> Result<Self, GeocodeError> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| GeocodeError::NotConfigured("geocode.base_url is not set".to_string()))?;
        Ok(Self { client: Client::new(), base_url })
    }
}

#[async_trait::async_trait]
impl CountyLookup for HttpCountyLookup {
    async fn county_for(&self, address: &str) -> Result<Option<String>, GeocodeError> {
        let response =
            self.client.get(&self.base_url).query(&[("address", address)]).send().await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(GeocodeError::Status { status: status.as_u16() });
        }

        let body: CountyResponse = response.json().await?;
        Ok(body.county.map(|county| county.trim().to_string()).filter(|county| !county.is_empty()))
    }
}

#[derive(Default)]
pub struct NoopCountyLookup;

#[async_trait::async_trait]
impl CountyLookup for NoopCountyLookup {
    async fn county_for(&self, _address: &str) -> Result<Option<String>, GeocodeError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::Query, routing::get, Json, Router};
    use fieldops_core::config::GeocodeConfig;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    use super::{CountyLookup, HttpCountyLookup};

    #[tokio::test]
    async fn county_comes_from_address_query() {
        async fn lookup(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
            match params.get("address").map(String::as_str) {
                Some("10 Elm Dr, Raleigh NC") => Json(json!({ "county": "Wake" })),
                _ => Json(json!({ "county": "  " })),
            }
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/county", get(lookup))).await.ok();
        });

        let lookup = HttpCountyLookup::from_config(&GeocodeConfig {
            enabled: true,
            base_url: Some(format!("http://{address}/county")),
        })
        .expect("lookup");

        assert_eq!(
            lookup.county_for("10 Elm Dr, Raleigh NC").await.expect("known").as_deref(),
            Some("Wake")
        );
        assert_eq!(lookup.county_for("nowhere").await.expect("blank"), None);
    }
}
