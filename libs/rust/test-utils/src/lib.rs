//! Shared test utilities for the OAuth2 token service.
//!
//! This crate provides:
//! - A seeded in-memory harness around the token and JWKS endpoints
//! - Collaborators that fail or stall on demand
//! - Proptest generators for verifiers, scopes and tokens

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use fixtures::Harness;
pub use generators::*;
