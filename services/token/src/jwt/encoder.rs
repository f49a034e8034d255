use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

use crate::error::BackendError;
use crate::jwt::claims::IdToken;
use crate::keys::CertificateKeyPair;

/// Signs ID tokens for a provider.
///
/// With a signing key the token is RS256 or ES256 and carries the key id;
/// without one it falls back to HS256 keyed by the client secret.
pub struct JwtEncoder<'a> {
    signing_key: Option<&'a CertificateKeyPair>,
    client_secret: &'a str,
}

impl<'a> JwtEncoder<'a> {
    pub fn new(signing_key: Option<&'a CertificateKeyPair>, client_secret: &'a str) -> Self {
        JwtEncoder {
            signing_key,
            client_secret,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.signing_key
            .map_or(Algorithm::HS256, CertificateKeyPair::algorithm)
    }

    pub fn encode(&self, token: &IdToken) -> Result<String, BackendError> {
        let mut header = Header::new(self.algorithm());
        let key = match self.signing_key {
            Some(pair) => {
                header.kid = Some(pair.kid().to_string());
                pair.encoding_key()?
            }
            None => EncodingKey::from_secret(self.client_secret.as_bytes()),
        };

        Ok(encode(&header, token, &key)?)
    }
}
