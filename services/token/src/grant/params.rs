//! Raw token request fields and their first, untrusted parse.

use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::json;

use crate::error::TokenError;
use crate::events::{Event, EventAction};

/// Form-encoded token request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequestForm {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Client credentials presented with the request. Missing values are empty.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ClientAuth {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAuth")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Reads client credentials from `Authorization: Basic`, falling back to
/// the `client_id`/`client_secret` form fields.
#[must_use]
pub fn extract_client_auth(authorization: Option<&str>, form: &TokenRequestForm) -> ClientAuth {
    if let Some(auth) = authorization.and_then(parse_basic) {
        return auth;
    }
    ClientAuth {
        client_id: form.client_id.clone().unwrap_or_default(),
        client_secret: form.client_secret.clone().unwrap_or_default(),
    }
}

fn parse_basic(header: &str) -> Option<ClientAuth> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (client_id, client_secret) = decoded.split_once(':')?;
    Some(ClientAuth {
        client_id: client_id.to_string(),
        client_secret: client_secret.to_string(),
    })
}

/// Grant types this endpoint understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
    ClientCredentials,
}

impl GrantType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::ClientCredentials => "client_credentials",
        }
    }
}

impl FromStr for GrantType {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "refresh_token" => Ok(Self::RefreshToken),
            "client_credentials" => Ok(Self::ClientCredentials),
            _ => Err(TokenError::UnsupportedGrantType),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request metadata that travels into audit events.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub path: String,
}

impl RequestContext {
    /// Client IP is the first `X-Forwarded-For` hop when present.
    #[must_use]
    pub fn new(
        forwarded_for: Option<&str>,
        peer_ip: Option<String>,
        user_agent: Option<&str>,
        path: impl Into<String>,
    ) -> Self {
        let forwarded = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Self {
            client_ip: forwarded.or(peer_ip),
            user_agent: user_agent.map(str::to_string),
            path: path.into(),
        }
    }

    /// Starts an event carrying the client IP and the HTTP request details.
    #[must_use]
    pub fn event(&self, action: EventAction) -> Event {
        Event::new(action)
            .with_client_ip(self.client_ip.clone())
            .with_context(
                "http_request",
                json!({
                    "path": self.path,
                    "user_agent": self.user_agent.as_deref().unwrap_or_default(),
                }),
            )
    }
}

/// Parsed but unvalidated request. Never leaves the grant module.
#[derive(Debug, Clone)]
pub(crate) struct TokenRequestDraft {
    pub grant_type: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: Vec<String>,
    pub code: String,
    pub code_verifier: Option<String>,
    pub refresh_token: String,
    pub username: String,
    pub password: String,
}

impl TokenRequestDraft {
    pub(crate) fn parse(form: &TokenRequestForm, client: &ClientAuth) -> Self {
        let field = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            grant_type: field(&form.grant_type),
            client_secret: client.client_secret.clone(),
            redirect_uri: field(&form.redirect_uri).to_lowercase(),
            scope: form
                .scope
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            code: field(&form.code),
            code_verifier: form.code_verifier.clone().filter(|v| !v.is_empty()),
            refresh_token: field(&form.refresh_token),
            username: field(&form.username),
            password: field(&form.password),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> TokenRequestForm {
        TokenRequestForm {
            client_id: Some("form-id".into()),
            client_secret: Some("form-secret".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_basic_header_wins() {
        let header = format!("Basic {}", STANDARD.encode("c1:s:1"));
        let auth = extract_client_auth(Some(&header), &form());
        assert_eq!(auth.client_id, "c1");
        assert_eq!(auth.client_secret, "s:1");
    }

    #[test]
    fn test_malformed_header_falls_back_to_form() {
        for header in ["Basic !!!", "Bearer abc", "Basic", "Basic bm9jb2xvbg=="] {
            let auth = extract_client_auth(Some(header), &form());
            assert_eq!(auth.client_id, "form-id", "header {header}");
        }
    }

    #[test]
    fn test_missing_values_are_empty() {
        let auth = extract_client_auth(None, &TokenRequestForm::default());
        assert_eq!(auth, ClientAuth::default());
    }

    #[test]
    fn test_debug_hides_secret() {
        let auth = extract_client_auth(None, &form());
        assert!(!format!("{auth:?}").contains("form-secret"));
    }

    #[test]
    fn test_grant_type_closed_set() {
        assert_eq!(
            "refresh_token".parse::<GrantType>().unwrap(),
            GrantType::RefreshToken
        );
        assert_eq!(
            "password".parse::<GrantType>(),
            Err(TokenError::UnsupportedGrantType)
        );
        assert_eq!("".parse::<GrantType>(), Err(TokenError::UnsupportedGrantType));
    }

    #[test]
    fn test_draft_normalises_fields() {
        let form = TokenRequestForm {
            redirect_uri: Some("HTTPS://App.Example/CB".into()),
            scope: Some("openid  email\tprofile".into()),
            code_verifier: Some(String::new()),
            ..Default::default()
        };
        let draft = TokenRequestDraft::parse(&form, &ClientAuth::default());
        assert_eq!(draft.redirect_uri, "https://app.example/cb");
        assert_eq!(draft.scope, vec!["openid", "email", "profile"]);
        assert!(draft.code_verifier.is_none());
    }

    #[test]
    fn test_request_context_prefers_forwarded_for() {
        let ctx = RequestContext::new(
            Some("203.0.113.9, 10.0.0.1"),
            Some("10.0.0.2".into()),
            None,
            "/application/o/token/",
        );
        assert_eq!(ctx.client_ip.as_deref(), Some("203.0.113.9"));

        let ctx = RequestContext::new(None, Some("10.0.0.2".into()), None, "/");
        assert_eq!(ctx.client_ip.as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn test_event_carries_request_details() {
        let ctx = RequestContext::new(
            None,
            Some("10.0.0.2".into()),
            Some("curl/8.5.0"),
            "/application/o/token/",
        );
        let event = ctx.event(EventAction::Login);
        assert_eq!(event.client_ip.as_deref(), Some("10.0.0.2"));
        assert_eq!(event.context["http_request"]["path"], "/application/o/token/");
        assert_eq!(event.context["http_request"]["user_agent"], "curl/8.5.0");
    }
}
