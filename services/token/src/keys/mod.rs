//! Signing key material.
//!
//! A provider's signing key is a PEM-encoded private key, either RSA or
//! NIST P-256. Public parameters are derived once at load time so the
//! JWKS path never touches the private half.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey};
use ring::rand::SystemRandom;
use ring::rsa::PublicKeyComponents;
use ring::signature::{ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, KeyPair, RsaKeyPair};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::error::BackendError;
use crate::models::OAuth2Provider;

const EC_POINT_LEN: usize = 65;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid PEM: {0}")]
    Pem(String),

    #[error("unsupported PEM block {0:?}")]
    UnsupportedBlock(String),

    #[error("unsupported key type: {0}")]
    UnsupportedKey(String),
}

impl From<KeyError> for BackendError {
    fn from(err: KeyError) -> Self {
        Self::KeyMaterial(err.to_string())
    }
}

/// Public numbers of a signing key, tagged by key family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyMaterial {
    /// Big-endian modulus and public exponent.
    Rsa { modulus: Vec<u8>, exponent: Vec<u8> },
    /// Big-endian affine coordinates on P-256.
    Ec { x: Vec<u8>, y: Vec<u8> },
}

impl PublicKeyMaterial {
    /// JWS algorithm for tokens signed with this key.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            Self::Rsa { .. } => Algorithm::RS256,
            Self::Ec { .. } => Algorithm::ES256,
        }
    }
}

/// Private key plus its derived public material.
pub struct CertificateKeyPair {
    pub id: Uuid,
    pub name: String,
    kid: String,
    public: PublicKeyMaterial,
    private_pem: Zeroizing<String>,
}

impl std::fmt::Debug for CertificateKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateKeyPair")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kid", &self.kid)
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl CertificateKeyPair {
    /// Loads a PKCS#8 (or PKCS#1 RSA) private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM cannot be parsed or holds neither an
    /// RSA nor a P-256 key.
    pub fn from_pem(name: impl Into<String>, private_pem: &str) -> Result<Self, KeyError> {
        let block = pem::parse(private_pem).map_err(|e| KeyError::Pem(e.to_string()))?;
        let der = Zeroizing::new(block.contents().to_vec());

        let (public, public_der) = match block.tag() {
            "PRIVATE KEY" => public_from_pkcs8(&der)?,
            "RSA PRIVATE KEY" => {
                let pair = RsaKeyPair::from_der(&der)
                    .map_err(|e| KeyError::UnsupportedKey(e.to_string()))?;
                rsa_public(&pair)
            }
            other => return Err(KeyError::UnsupportedBlock(other.to_string())),
        };

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kid: URL_SAFE_NO_PAD.encode(Sha256::digest(&public_der)),
            public,
            private_pem: Zeroizing::new(private_pem.to_string()),
        })
    }

    /// Key id advertised in JWKS and set in JWT headers.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    #[must_use]
    pub const fn public_material(&self) -> &PublicKeyMaterial {
        &self.public
    }

    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.public.algorithm()
    }

    /// Encoding key for `jsonwebtoken`.
    ///
    /// # Errors
    ///
    /// Returns an error if `jsonwebtoken` rejects the PEM.
    pub fn encoding_key(&self) -> Result<EncodingKey, KeyError> {
        let pem = self.private_pem.as_bytes();
        match self.public {
            PublicKeyMaterial::Rsa { .. } => EncodingKey::from_rsa_pem(pem),
            PublicKeyMaterial::Ec { .. } => EncodingKey::from_ec_pem(pem),
        }
        .map_err(|e| KeyError::Pem(e.to_string()))
    }
}

fn public_from_pkcs8(der: &[u8]) -> Result<(PublicKeyMaterial, Vec<u8>), KeyError> {
    if let Ok(pair) = RsaKeyPair::from_pkcs8(der) {
        return Ok(rsa_public(&pair));
    }

    let pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, der, &SystemRandom::new())
        .map_err(|e| KeyError::UnsupportedKey(e.to_string()))?;
    let point = pair.public_key().as_ref();
    // Uncompressed SEC1 point: 0x04 || X || Y
    if point.len() != EC_POINT_LEN || point[0] != 0x04 {
        return Err(KeyError::UnsupportedKey("unexpected EC point encoding".into()));
    }
    let public = PublicKeyMaterial::Ec {
        x: point[1..33].to_vec(),
        y: point[33..].to_vec(),
    };
    Ok((public, point.to_vec()))
}

fn rsa_public(pair: &RsaKeyPair) -> (PublicKeyMaterial, Vec<u8>) {
    let components = PublicKeyComponents::<Vec<u8>>::from(pair.public());
    let public = PublicKeyMaterial::Rsa {
        modulus: components.n,
        exponent: components.e,
    };
    (public, pair.public_key().as_ref().to_vec())
}

/// Resolves the active signing key of a provider.
#[async_trait]
pub trait KeyMaterialProvider: Send + Sync {
    /// `Ok(None)` when the provider has no signing key configured.
    async fn signing_key(
        &self,
        provider: &OAuth2Provider,
    ) -> Result<Option<Arc<CertificateKeyPair>>, BackendError>;
}
