use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{OAuth2Provider, SubjectMode, User};

/// OpenID Connect ID token payload.
///
/// Built per response and stored on the refresh token it was issued with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdToken {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub auth_time: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,

    // Scope claims
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl IdToken {
    pub fn new(
        issuer: String,
        subject: String,
        audience: String,
        ttl_seconds: i64,
        auth_time: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        IdToken {
            iss: issuer,
            sub: subject,
            aud: audience,
            exp: now.saturating_add(ttl_seconds),
            iat: now,
            auth_time,
            nonce: None,
            at_hash: None,
            claims: Map::new(),
        }
    }

    pub fn with_nonce(mut self, nonce: Option<String>) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_at_hash(mut self, at_hash: String) -> Self {
        self.at_hash = Some(at_hash);
        self
    }

    pub fn with_claims(mut self, claims: Map<String, Value>) -> Self {
        self.claims.extend(claims);
        self
    }
}

/// `sub` for `user` under the provider's subject mode.
pub fn subject_for(provider: &OAuth2Provider, user: &User) -> String {
    match provider.sub_mode {
        SubjectMode::HashedUserId => user.uid(),
        SubjectMode::UserId => user.pk.to_string(),
        SubjectMode::UserUsername => user.username.clone(),
        SubjectMode::UserEmail => user.email.clone(),
    }
}

/// Claims released by the `email` and `profile` scopes.
pub fn scope_claims(user: &User, scope: &[String]) -> Map<String, Value> {
    let mut claims = Map::new();
    for s in scope {
        match s.as_str() {
            "email" => {
                claims.insert("email".into(), Value::String(user.email.clone()));
                claims.insert("email_verified".into(), Value::Bool(true));
            }
            "profile" => {
                claims.insert("name".into(), Value::String(user.name.clone()));
                claims.insert("given_name".into(), Value::String(user.name.clone()));
                claims.insert(
                    "preferred_username".into(),
                    Value::String(user.username.clone()),
                );
                claims.insert("nickname".into(), Value::String(user.username.clone()));
            }
            _ => {}
        }
    }
    claims
}
