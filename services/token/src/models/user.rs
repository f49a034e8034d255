//! Users and the app-password credentials they own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Attribute that marks a user as a service account.
pub const USER_ATTRIBUTE_SA: &str = "goauthentik.io/user/service-account";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub pk: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl User {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            pk: Uuid::new_v4(),
            username: username.into(),
            name: String::new(),
            email: String::new(),
            is_active: true,
            attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn service_account(mut self) -> Self {
        self.attributes
            .insert(USER_ATTRIBUTE_SA.to_string(), Value::Bool(true));
        self
    }

    #[must_use]
    pub const fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Stable, non-reversible identifier (hex SHA-256 of the primary key).
    #[must_use]
    pub fn uid(&self) -> String {
        let digest = Sha256::digest(self.pk.to_string().as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Truthy service-account attribute.
    #[must_use]
    pub fn is_service_account(&self) -> bool {
        match self.attributes.get(USER_ATTRIBUTE_SA) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            _ => false,
        }
    }
}

/// What a credential may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenIntent {
    Api,
    AppPassword,
    Recovery,
    Verification,
}

/// A secret owned by a user.
#[derive(Debug, Clone)]
pub struct Credential {
    pub identifier: String,
    pub key: String,
    pub intent: TokenIntent,
    pub user_pk: Uuid,
    pub expires: Option<DateTime<Utc>>,
}

impl Credential {
    #[must_use]
    pub fn app_password(
        identifier: impl Into<String>,
        key: impl Into<String>,
        user_pk: Uuid,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            key: key.into(),
            intent: TokenIntent::AppPassword,
            user_pk,
            expires: None,
        }
    }

    #[must_use]
    pub const fn with_intent(mut self, intent: TokenIntent) -> Self {
        self.intent = intent;
        self
    }

    #[must_use]
    pub const fn with_expiry(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|e| e <= now)
    }
}
