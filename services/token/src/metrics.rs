//! Prometheus metrics for the token endpoint.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oauth2_tokens_issued_total",
        "Total number of token responses issued",
        &["grant_type"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Token endpoint errors counter.
pub static TOKEN_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oauth2_token_errors_total",
        "Total number of token endpoint errors",
        &["error"]
    )
    .expect("Failed to register token_errors metric")
});

/// Security events counter.
pub static SECURITY_EVENTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oauth2_security_events_total",
        "Total number of security events",
        &["event_type"]
    )
    .expect("Failed to register security_events metric")
});

/// JWKS requests counter.
pub static JWKS_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "oauth2_jwks_requests_total",
        "Total number of JWKS requests",
        &["status"]
    )
    .expect("Failed to register jwks_requests metric")
});

/// Record a token issuance.
pub fn record_token_issued(grant_type: &str) {
    TOKENS_ISSUED.with_label_values(&[grant_type]).inc();
}

/// Record a token endpoint error.
pub fn record_token_error(error: &str) {
    TOKEN_ERRORS.with_label_values(&[error]).inc();
}

/// Record a security event.
pub fn record_security_event(event_type: &str) {
    SECURITY_EVENTS.with_label_values(&[event_type]).inc();
}

/// Record a JWKS request outcome.
pub fn record_jwks_request(status: &str) {
    JWKS_REQUESTS.with_label_values(&[status]).inc();
}

/// Text exposition of the default registry.
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
