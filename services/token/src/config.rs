//! Centralized configuration for the token service.
//!
//! Loaded from environment variables (and `.env`) and validated at startup.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::logging::{LogConfig, DEFAULT_SERVICE_NAME};
use crate::models::{ClientType, TokenValidity};

/// Client seeded into the in-memory store by the development binary.
#[derive(Debug, Clone)]
pub struct BootstrapClient {
    pub client_id: String,
    pub client_secret: String,
    pub client_type: ClientType,
    /// Whitespace separated; `*` accepts any redirect URI
    pub redirect_uris: String,
    pub app_slug: String,
    pub token_validity: TokenValidity,
    pub signing_key_path: Option<String>,
}

/// Token service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base URL ID token issuers are derived from
    pub issuer_base_url: String,
    /// Time budget of one token request
    pub request_timeout: Duration,

    /// Logging
    pub log: LogConfig,

    /// Optional development client
    pub bootstrap: Option<BootstrapClient>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_env(&lookup, "PORT", 9000)?;
        let issuer_base_url = lookup("ISSUER_BASE_URL")
            .unwrap_or_else(|| "http://localhost:9000".to_string())
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&issuer_base_url).map_err(|e| ConfigError::Invalid {
            name: "ISSUER_BASE_URL",
            reason: e.to_string(),
        })?;
        let request_timeout = Duration::from_secs(parse_env(&lookup, "REQUEST_TIMEOUT_SECS", 10)?);

        let log = LogConfig {
            level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            json: parse_env(&lookup, "LOG_JSON", false)?,
            service: lookup("SERVICE_NAME")
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
        };

        let bootstrap = match lookup("BOOTSTRAP_CLIENT_ID") {
            Some(client_id) if !client_id.is_empty() => Some(BootstrapClient {
                client_id,
                client_secret: lookup("BOOTSTRAP_CLIENT_SECRET").unwrap_or_default(),
                client_type: parse_env(&lookup, "BOOTSTRAP_CLIENT_TYPE", ClientType::Confidential)?,
                redirect_uris: lookup("BOOTSTRAP_REDIRECT_URIS").unwrap_or_default(),
                app_slug: lookup("BOOTSTRAP_APP_SLUG").unwrap_or_else(|| "default".to_string()),
                token_validity: parse_env(
                    &lookup,
                    "BOOTSTRAP_TOKEN_VALIDITY",
                    TokenValidity::default(),
                )?,
                signing_key_path: lookup("BOOTSTRAP_SIGNING_KEY_PATH").filter(|p| !p.is_empty()),
            }),
            _ => None,
        };

        Ok(Self {
            host,
            port,
            issuer_base_url,
            request_timeout,
            log,
            bootstrap,
        })
    }
}

/// Parse variable with default value.
fn parse_env<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
