//! OAuth2 providers (clients) and the applications they are bound to.

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::validity::TokenValidity;

/// Confidential clients authenticate with a secret; public clients do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    #[default]
    Confidential,
    Public,
}

impl std::str::FromStr for ClientType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "confidential" => Ok(Self::Confidential),
            "public" => Ok(Self::Public),
            other => Err(format!("unknown client type: {other}")),
        }
    }
}

/// Registered redirect URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectUris {
    /// The `*` sentinel: any redirect URI is accepted.
    Any,
    /// Exact-match list.
    Exact(Vec<String>),
}

impl RedirectUris {
    /// Parses the stored whitespace/newline separated form.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == "*" {
            return Self::Any;
        }
        Self::Exact(raw.split_whitespace().map(str::to_string).collect())
    }

    /// Case-insensitive match of an already lower-cased redirect URI.
    #[must_use]
    pub fn allows(&self, redirect_uri: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(uris) => uris.iter().any(|u| u.to_lowercase() == redirect_uri),
        }
    }

    /// Registered URIs usable as CORS origins. Empty for the wildcard.
    #[must_use]
    pub fn origins(&self) -> &[String] {
        match self {
            Self::Any => &[],
            Self::Exact(uris) => uris,
        }
    }

    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::Any)
    }
}

/// How the `sub` claim of ID tokens is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectMode {
    #[default]
    HashedUserId,
    UserId,
    UserUsername,
    UserEmail,
}

/// OAuth2 provider configuration, one per client.
#[derive(Debug, Clone)]
pub struct OAuth2Provider {
    pub id: Uuid,
    pub name: String,
    pub client_type: ClientType,
    pub client_id: String,
    /// Empty for public clients.
    pub client_secret: String,
    pub redirect_uris: RedirectUris,
    pub token_validity: TokenValidity,
    /// Certificate key pair used to sign ID tokens.
    pub signing_key: Option<Uuid>,
    pub sub_mode: SubjectMode,
    pub include_claims_in_id_token: bool,
}

impl OAuth2Provider {
    /// Confidential provider with defaults suitable for tests and bootstrapping.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            client_type: ClientType::Confidential,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uris: RedirectUris::Exact(Vec::new()),
            token_validity: TokenValidity::default(),
            signing_key: None,
            sub_mode: SubjectMode::default(),
            include_claims_in_id_token: true,
        }
    }

    #[must_use]
    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = client_type;
        self
    }

    #[must_use]
    pub fn with_redirect_uris(mut self, raw: &str) -> Self {
        self.redirect_uris = RedirectUris::parse(raw);
        self
    }

    #[must_use]
    pub const fn with_token_validity(mut self, validity: TokenValidity) -> Self {
        self.token_validity = validity;
        self
    }

    #[must_use]
    pub const fn with_signing_key(mut self, key_id: Uuid) -> Self {
        self.signing_key = Some(key_id);
        self
    }

    #[must_use]
    pub const fn with_sub_mode(mut self, mode: SubjectMode) -> Self {
        self.sub_mode = mode;
        self
    }

    #[must_use]
    pub const fn with_claims_in_id_token(mut self, include: bool) -> Self {
        self.include_claims_in_id_token = include;
        self
    }

    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.client_type == ClientType::Confidential
    }
}

/// Application a provider is exposed through.
#[derive(Debug, Clone)]
pub struct Application {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub provider_id: Option<Uuid>,
}

impl Application {
    #[must_use]
    pub fn new(slug: impl Into<String>, provider_id: Option<Uuid>) -> Self {
        let slug = slug.into();
        Self {
            id: Uuid::new_v4(),
            name: slug.clone(),
            slug,
            provider_id,
        }
    }
}

/// Scheme, host and port of a URL, used to compare CORS origins.
#[must_use]
pub fn origin_triple(raw: &str) -> Option<(String, String, Option<u16>)> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some((url.scheme().to_string(), host, url.port_or_known_default()))
}
