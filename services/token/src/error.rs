//! Error taxonomy for the token endpoint.
//!
//! Protocol errors (`TokenError`) are recovered locally and rendered as
//! RFC 6749 §5.2 bodies. Everything that is not part of that taxonomy is
//! either a 403 (`UserAuthError`) or a 500 (`BackendError`, timeouts).

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// RFC 6749 §5.2 token endpoint errors.
///
/// Distinct failure causes deliberately collapse onto the same variant, so
/// a caller cannot tell an unknown grant from an expired or revoked one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid_request")]
    InvalidRequest,

    #[error("invalid_client")]
    InvalidClient,

    #[error("invalid_grant")]
    InvalidGrant,

    #[error("invalid_scope")]
    InvalidScope,

    #[error("unsupported_grant_type")]
    UnsupportedGrantType,
}

impl TokenError {
    /// Wire value of the `error` field.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidScope => "invalid_scope",
            Self::UnsupportedGrantType => "unsupported_grant_type",
        }
    }

    /// Fixed human-readable text for `error_description`.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidRequest => {
                "The request is missing a required parameter, includes an unsupported parameter \
                 value, repeats a parameter, or is otherwise malformed"
            }
            Self::InvalidClient => {
                "Client authentication failed (e.g., unknown client, no client authentication \
                 included, or unsupported authentication method)"
            }
            Self::InvalidGrant => {
                "The provided authorization grant or refresh token is invalid, expired, revoked, \
                 does not match the redirection URI used in the authorization request, or was \
                 issued to another client"
            }
            Self::InvalidScope => {
                "The requested scope is invalid, unknown, or malformed"
            }
            Self::UnsupportedGrantType => {
                "The authorization grant type is not supported by the authorization server"
            }
        }
    }
}

/// Authentication failures that are distinguishable from grant errors (403).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAuthError {
    #[error("access_denied")]
    AccessDenied,
}

impl UserAuthError {
    /// Wire value of the `error` field.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
        }
    }

    /// Fixed human-readable text for `error_description`.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::AccessDenied => "The resource owner or authorization server denied the request",
        }
    }
}

/// Failure of a collaborator the endpoint depends on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("{component} unavailable: {reason}")]
    Unavailable {
        component: &'static str,
        reason: String,
    },

    #[error("provider misconfigured: {0}")]
    Misconfigured(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("key material error: {0}")]
    KeyMaterial(String),
}

impl BackendError {
    /// Convenience constructor for store failures.
    pub fn store(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            component: "store",
            reason: reason.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for BackendError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Signing(err.to_string())
    }
}

/// Error raised while handling a grant exchange.
///
/// Extractor and factory return this so protocol errors and 403s travel
/// on the same channel as collaborator failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    UserAuth(#[from] UserAuthError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Error body per RFC 6749 §5.2.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Everything the token endpoint can end in besides success.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error(transparent)]
    Grant(#[from] GrantError),

    #[error("request exceeded its time budget")]
    Timeout,
}

impl From<TokenError> for EndpointError {
    fn from(err: TokenError) -> Self {
        Self::Grant(err.into())
    }
}

impl EndpointError {
    /// HTTP status for this outcome.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Grant(GrantError::Token(_)) => StatusCode::BAD_REQUEST,
            Self::Grant(GrantError::UserAuth(_)) => StatusCode::FORBIDDEN,
            Self::Grant(GrantError::Backend(_)) | Self::Timeout => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Label used for the error metric.
    #[must_use]
    pub const fn metric_label(&self) -> &'static str {
        match self {
            Self::Grant(GrantError::Token(e)) => e.code(),
            Self::Grant(GrantError::UserAuth(e)) => e.code(),
            Self::Grant(GrantError::Backend(_)) => "server_error",
            Self::Timeout => "timeout",
        }
    }

    /// Response body. Backend details are never exposed.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let (error, description) = match self {
            Self::Grant(GrantError::Token(e)) => (e.code(), e.description()),
            Self::Grant(GrantError::UserAuth(e)) => (e.code(), e.description()),
            Self::Grant(GrantError::Backend(_)) | Self::Timeout => (
                "server_error",
                "The authorization server encountered an unexpected condition",
            ),
        };
        ErrorBody {
            error: error.to_string(),
            error_description: Some(description.to_string()),
        }
    }
}

/// Startup configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// JWKS lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwksError {
    #[error("not_found")]
    NotFound,

    #[error(transparent)]
    Backend(#[from] BackendError),
}
