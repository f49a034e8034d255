use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::JwksError;
use crate::keys::{CertificateKeyPair, KeyMaterialProvider, PublicKeyMaterial};
use crate::storage::OAuthStore;

/// Verification key entry.
///
/// EC keys reuse `n`/`e` for the X/Y coordinates and advertise `EC256`,
/// matching what existing verifiers of this endpoint consume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub kid: String,
    pub n: String,
    pub e: String,
}

impl Jwk {
    pub fn from_key_pair(key: &CertificateKeyPair) -> Self {
        let (kty, alg, n, e) = match key.public_material() {
            PublicKeyMaterial::Rsa { modulus, exponent } => {
                ("RSA", "RS256", b64_enc(modulus), b64_enc(exponent))
            }
            PublicKeyMaterial::Ec { x, y } => ("EC", "EC256", b64_enc(x), b64_enc(y)),
        };
        Jwk {
            kty: kty.to_string(),
            alg: alg.to_string(),
            key_use: "sig".to_string(),
            kid: key.kid().to_string(),
            n,
            e,
        }
    }
}

/// `{"keys": [...]}` document served per application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub fn new() -> Self {
        Jwks { keys: Vec::new() }
    }

    pub fn add_key(&mut self, key: Jwk) {
        self.keys.push(key);
    }
}

/// Base64url without padding of a big-endian unsigned integer, with
/// leading zero bytes stripped. Zero encodes as the empty string.
pub fn b64_enc(big_endian: &[u8]) -> String {
    let start = big_endian
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(big_endian.len());
    URL_SAFE_NO_PAD.encode(&big_endian[start..])
}

/// Resolves an application slug to the key set of its provider.
pub struct JwksPublisher {
    store: Arc<dyn OAuthStore>,
    keys: Arc<dyn KeyMaterialProvider>,
}

impl JwksPublisher {
    pub fn new(store: Arc<dyn OAuthStore>, keys: Arc<dyn KeyMaterialProvider>) -> Self {
        JwksPublisher { store, keys }
    }

    /// Key set for the provider bound to `slug`.
    pub async fn get_jwks(&self, slug: &str) -> Result<Jwks, JwksError> {
        let application = self
            .store
            .application_by_slug(slug)
            .await?
            .ok_or(JwksError::NotFound)?;
        let provider_id = application.provider_id.ok_or(JwksError::NotFound)?;
        let provider = self
            .store
            .provider(provider_id)
            .await?
            .ok_or(JwksError::NotFound)?;

        let mut jwks = Jwks::new();
        match self.keys.signing_key(&provider).await? {
            Some(key) => jwks.add_key(Jwk::from_key_pair(&key)),
            None => debug!(slug, "Provider has no signing key"),
        }
        Ok(jwks)
    }
}
