use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Opaque token values and the digests derived from them.
pub struct TokenGenerator;

impl TokenGenerator {
    /// Opaque token: 32 random bytes, base64url without padding.
    pub fn generate() -> String {
        let mut random_bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut random_bytes);
        URL_SAFE_NO_PAD.encode(random_bytes)
    }

    /// Digest safe to log or attach to audit events in place of a secret.
    pub fn fingerprint(token: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
    }

    /// OIDC `at_hash`: left half of SHA-256 over the access token.
    pub fn at_hash(access_token: &str) -> String {
        let digest = Sha256::digest(access_token.as_bytes());
        URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_tokens() {
        let token1 = TokenGenerator::generate();
        let token2 = TokenGenerator::generate();
        assert_ne!(token1, token2);
        assert_eq!(token1.len(), 43);
    }

    #[test]
    fn test_fingerprint_deterministic() {
        assert_eq!(
            TokenGenerator::fingerprint("test-token"),
            TokenGenerator::fingerprint("test-token")
        );
        assert_ne!(
            TokenGenerator::fingerprint("token1"),
            TokenGenerator::fingerprint("token2")
        );
    }

    #[test]
    fn test_at_hash_is_half_digest() {
        // 16 bytes -> 22 base64url characters
        assert_eq!(TokenGenerator::at_hash("access").len(), 22);
        let at_hash = TokenGenerator::at_hash("access");
        assert!(TokenGenerator::fingerprint("access").starts_with(&at_hash[..21]));
    }
}
