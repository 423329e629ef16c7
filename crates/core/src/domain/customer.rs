use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Identifier of the mirrored customer record in the billing platform.
    pub billing_customer_id: Option<String>,
    pub is_placeholder: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Builds the sentinel customer that owns jobs created from unmatched addresses.
    pub fn placeholder(
        name: impl Into<String>,
        email: impl Into<String>,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CustomerId::generate(),
            name: name.into(),
            address: None,
            email: Some(email.into()),
            phone: None,
            billing_customer_id: None,
            is_placeholder: true,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_address(&self) -> bool {
        self.address.as_deref().map(|value| !value.trim().is_empty()).unwrap_or(false)
    }
}
