//! OAuth2/OIDC token service library.
//!
//! Exchanges authorization codes, refresh tokens and service-account
//! credentials for tokens, and publishes the verification keys of each
//! provider.

#![forbid(unsafe_code)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod grant;
pub mod jwks;
pub mod jwt;
pub mod keys;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod policy;
pub mod server;
pub mod storage;
pub mod tokens;

// Re-exports for convenience
pub use config::Config;
pub use endpoint::Backends;
pub use error::{EndpointError, GrantError, TokenError, UserAuthError};
