//! Shared proptest generators for token service tests.

use proptest::prelude::*;

/// Scope values a provider would typically grant.
pub const KNOWN_SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "offline_access",
    "goauthentik.io/api",
];

/// Generate PKCE verifiers (RFC 7636 §4.1: 43 to 128 unreserved characters).
pub fn code_verifier_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9._~-]{43,128}"
}

/// Generate opaque authorization codes.
pub fn authorization_code_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{16,64}"
}

/// Generate opaque refresh token values.
pub fn refresh_token_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{20,64}"
}

/// Generate client identifiers.
pub fn client_id_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{8,40}"
}

/// Generate non-empty scope sets drawn from [`KNOWN_SCOPES`].
pub fn scope_strategy() -> impl Strategy<Value = Vec<String>> {
    proptest::sample::subsequence(KNOWN_SCOPES, 1..=KNOWN_SCOPES.len())
        .prop_map(|scopes| scopes.into_iter().map(str::to_string).collect())
}

/// Generate a granted scope set together with a subset of it.
pub fn scope_subset_strategy() -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
    scope_strategy().prop_flat_map(|granted| {
        let len = granted.len();
        (
            Just(granted.clone()),
            proptest::sample::subsequence(granted, 0..=len),
        )
    })
}

/// Generate a granted scope set together with a request that contains at
/// least one scope outside of it.
pub fn scope_widening_strategy() -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
    (scope_strategy(), "[a-z]{3,12}:extra").prop_map(|(granted, foreign)| {
        let mut requested = granted.clone();
        requested.push(foreign);
        (granted, requested)
    })
}

/// Generate HTTP(S) redirect URIs with mixed case.
pub fn redirect_uri_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("http"), Just("https")],
        "[a-zA-Z][a-zA-Z0-9]{2,12}",
        prop_oneof![Just("com"), Just("org"), Just("Example")],
        "[a-zA-Z0-9/]{0,20}",
    )
        .prop_map(|(scheme, host, tld, path)| format!("{scheme}://{host}.{tld}/{path}"))
}
