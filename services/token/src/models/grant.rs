//! Persisted grant evidence: authorization codes and refresh tokens.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::jwt::IdToken;

/// Single-use code issued by the authorization step.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub code: String,
    pub provider_id: Uuid,
    pub user_pk: Uuid,
    pub scope: Vec<String>,
    pub expires: DateTime<Utc>,
    /// The authorization request carried the `openid` scope.
    pub is_open_id: bool,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub auth_time: DateTime<Utc>,
}

impl AuthorizationCode {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// Rotating refresh token together with the access token minted alongside it.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub access_token: String,
    pub refresh_token: String,
    pub provider_id: Uuid,
    pub user_pk: Uuid,
    pub scope: Vec<String>,
    pub expires: DateTime<Utc>,
    pub revoked: bool,
    pub id_token: Option<IdToken>,
}

impl RefreshToken {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}
