//! Property-based tests for PKCE verification.

use oauth2_token::grant::pkce::{compute_challenge, verify, METHOD_S256};
use proptest::prelude::*;
use test_utils::code_verifier_strategy;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A verifier always matches the challenge derived from it.
    #[test]
    fn prop_verifier_matches_own_challenge(
        verifier in code_verifier_strategy(),
        s256 in any::<bool>(),
    ) {
        let method = s256.then_some(METHOD_S256);
        let challenge = compute_challenge(&verifier, method);
        prop_assert!(verify(&verifier, Some(&challenge), method));
    }

    /// Distinct verifiers never match each other's S256 challenge.
    #[test]
    fn prop_distinct_verifiers_rejected(
        a in code_verifier_strategy(),
        b in code_verifier_strategy(),
    ) {
        prop_assume!(a != b);
        let challenge = compute_challenge(&a, Some(METHOD_S256));
        prop_assert!(!verify(&b, Some(&challenge), Some(METHOD_S256)));
    }

    /// S256 challenges are 43 base64url characters without padding.
    #[test]
    fn prop_s256_challenge_shape(verifier in code_verifier_strategy()) {
        let challenge = compute_challenge(&verifier, Some(METHOD_S256));
        prop_assert_eq!(challenge.len(), 43);
        prop_assert!(!challenge.contains('='));
        prop_assert!(!challenge.contains('+') && !challenge.contains('/'));
    }

    /// A presented verifier never matches a code without a challenge.
    #[test]
    fn prop_missing_challenge_rejected(verifier in code_verifier_strategy()) {
        prop_assert!(!verify(&verifier, None, None));
        prop_assert!(!verify(&verifier, None, Some(METHOD_S256)));
    }

    /// Unknown methods fall back to plain comparison.
    #[test]
    fn prop_unknown_method_is_plain(verifier in code_verifier_strategy()) {
        prop_assert!(verify(&verifier, Some(&verifier), Some("plain")));
        prop_assert!(verify(&verifier, Some(&verifier), Some("S512")));
    }
}
