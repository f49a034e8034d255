//! PKCE (RFC 7636) verification.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const METHOD_S256: &str = "S256";

/// Challenge derived from `verifier` under `method`. Anything but `S256`
/// is treated as `plain`.
#[must_use]
pub fn compute_challenge(verifier: &str, method: Option<&str>) -> String {
    match method {
        Some(METHOD_S256) => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
        _ => verifier.to_string(),
    }
}

/// Constant-time comparison against the stored challenge. A code without
/// a stored challenge never matches a presented verifier.
#[must_use]
pub fn verify(verifier: &str, challenge: Option<&str>, method: Option<&str>) -> bool {
    let Some(challenge) = challenge else {
        return false;
    };
    let computed = compute_challenge(verifier, method);
    computed.as_bytes().ct_eq(challenge.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7636 Appendix B
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn test_s256_rfc_vector() {
        assert_eq!(compute_challenge(VERIFIER, Some("S256")), CHALLENGE);
        assert!(verify(VERIFIER, Some(CHALLENGE), Some("S256")));
    }

    #[test]
    fn test_plain_and_unknown_methods() {
        assert!(verify("abc", Some("abc"), Some("plain")));
        assert!(verify("abc", Some("abc"), None));
        assert!(verify("abc", Some("abc"), Some("s256")));
    }

    #[test]
    fn test_mismatch() {
        assert!(!verify("wrong", Some(CHALLENGE), Some("S256")));
        assert!(!verify(VERIFIER, Some(VERIFIER), Some("S256")));
        assert!(!verify(VERIFIER, None, Some("S256")));
    }
}
