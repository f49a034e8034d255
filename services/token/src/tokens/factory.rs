//! Mints tokens for validated grants.
//!
//! The new refresh token is persisted before the presented code or refresh
//! token is consumed. Consumption uses the store's atomic operations; if
//! another exchange got there first the new token is revoked again and the
//! request fails, so at most one caller ever receives tokens for a grant.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::generator::TokenGenerator;
use super::response::{TokenResponse, TOKEN_TYPE_BEARER};
use crate::error::{BackendError, GrantError, TokenError};
use crate::grant::{Grant, GrantRequest};
use crate::jwt::{scope_claims, subject_for, IdToken, JwtEncoder};
use crate::keys::KeyMaterialProvider;
use crate::metrics;
use crate::models::{OAuth2Provider, RefreshToken, User};
use crate::storage::OAuthStore;

/// Turns a validated [`GrantRequest`] into a token response.
pub struct TokenFactory {
    store: Arc<dyn OAuthStore>,
    keys: Arc<dyn KeyMaterialProvider>,
    issuer_base: String,
}

/// ID token inputs that depend on the grant.
struct IdTokenSeed {
    nonce: Option<String>,
    auth_time: i64,
}

impl TokenFactory {
    pub fn new(
        store: Arc<dyn OAuthStore>,
        keys: Arc<dyn KeyMaterialProvider>,
        issuer_base: impl Into<String>,
    ) -> Self {
        Self {
            store,
            keys,
            issuer_base: issuer_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Mints the response for a validated grant and consumes the grant.
    ///
    /// # Errors
    ///
    /// `invalid_scope` when a refresh asks for more than was granted,
    /// `invalid_grant` when a concurrent exchange consumed the grant first,
    /// backend errors from the store, key material or signing.
    pub async fn mint(&self, request: GrantRequest) -> Result<TokenResponse, GrantError> {
        let GrantRequest {
            provider,
            scope,
            grant,
            ..
        } = request;
        let grant_type = grant.grant_type();

        let (scope, seed) = match &grant {
            Grant::AuthorizationCode { code, .. } => (
                code.scope.clone(),
                code.is_open_id.then(|| IdTokenSeed {
                    nonce: code.nonce.clone(),
                    auth_time: code.auth_time.timestamp(),
                }),
            ),
            Grant::RefreshToken { token, .. } => {
                let original: HashSet<&str> = token.scope.iter().map(String::as_str).collect();
                if scope.iter().any(|s| !original.contains(s.as_str())) {
                    warn!(
                        client_id = %provider.client_id,
                        requested = ?scope,
                        granted = ?token.scope,
                        "Refresh requested scope outside the original grant"
                    );
                    return Err(TokenError::InvalidScope.into());
                }
                let seed = token.id_token.as_ref().map(|id| IdTokenSeed {
                    nonce: None,
                    auth_time: id.auth_time,
                });
                (scope, seed)
            }
            Grant::ClientCredentials { .. } => (
                scope,
                Some(IdTokenSeed {
                    nonce: None,
                    auth_time: Utc::now().timestamp(),
                }),
            ),
        };

        let expires = Utc::now()
            .checked_add_signed(provider.token_validity.as_chrono())
            .ok_or_else(|| {
                BackendError::Misconfigured(format!(
                    "token validity {} of {} is out of range",
                    provider.token_validity, provider.client_id
                ))
            })?;

        let user = grant.user();
        let mut token = RefreshToken {
            access_token: TokenGenerator::generate(),
            refresh_token: TokenGenerator::generate(),
            provider_id: provider.id,
            user_pk: user.pk,
            scope,
            expires,
            revoked: false,
            id_token: None,
        };

        let mut encoded_id_token = None;
        if let Some(seed) = seed {
            let id_token = self.id_token(&provider, user, &token, seed).await?;
            encoded_id_token = Some(self.encode(&provider, &id_token).await?);
            token.id_token = Some(id_token);
        }

        self.store.save_refresh_token(&token).await?;
        self.consume(&grant, &token).await?;

        metrics::record_token_issued(grant_type.as_str());
        info!(
            client_id = %provider.client_id,
            grant_type = %grant_type,
            user_pk = %user.pk,
            "Issued tokens"
        );

        let refresh_token = match grant {
            Grant::ClientCredentials { .. } => None,
            Grant::AuthorizationCode { .. } | Grant::RefreshToken { .. } => {
                Some(token.refresh_token)
            }
        };

        Ok(TokenResponse {
            access_token: token.access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: provider.token_validity.as_secs(),
            id_token: encoded_id_token,
        })
    }

    /// Deletes the code or revokes the presented refresh token. Loses the
    /// race cleanly by revoking the token just persisted.
    async fn consume(&self, grant: &Grant, minted: &RefreshToken) -> Result<(), GrantError> {
        let consumed = match grant {
            Grant::AuthorizationCode { code, .. } => {
                self.store.delete_authorization_code(&code.code).await?
            }
            Grant::RefreshToken { token, .. } => {
                self.store.revoke_refresh_token(&token.refresh_token).await?
            }
            Grant::ClientCredentials { .. } => true,
        };

        if !consumed {
            warn!(
                grant_type = %grant.grant_type(),
                "Grant consumed by a concurrent exchange"
            );
            self.store.revoke_refresh_token(&minted.refresh_token).await?;
            return Err(TokenError::InvalidGrant.into());
        }
        Ok(())
    }

    async fn id_token(
        &self,
        provider: &OAuth2Provider,
        user: &User,
        token: &RefreshToken,
        seed: IdTokenSeed,
    ) -> Result<IdToken, GrantError> {
        let ttl = i64::try_from(provider.token_validity.as_secs()).unwrap_or(i64::MAX);
        let mut id_token = IdToken::new(
            self.issuer(provider).await?,
            subject_for(provider, user),
            provider.client_id.clone(),
            ttl,
            seed.auth_time,
        )
        .with_nonce(seed.nonce)
        .with_at_hash(TokenGenerator::at_hash(&token.access_token));

        if provider.include_claims_in_id_token {
            id_token = id_token.with_claims(scope_claims(user, &token.scope));
        }
        Ok(id_token)
    }

    async fn issuer(&self, provider: &OAuth2Provider) -> Result<String, GrantError> {
        let application = self.store.application_for_provider(provider.id).await?;
        Ok(match application {
            Some(app) => format!("{}/application/o/{}/", self.issuer_base, app.slug),
            None => {
                debug!(client_id = %provider.client_id, "No application bound, using base issuer");
                format!("{}/", self.issuer_base)
            }
        })
    }

    async fn encode(
        &self,
        provider: &OAuth2Provider,
        id_token: &IdToken,
    ) -> Result<String, GrantError> {
        let key = self.keys.signing_key(provider).await?;
        let encoder = JwtEncoder::new(key.as_deref(), &provider.client_secret);
        Ok(encoder.encode(id_token)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::GrantType;
    use crate::models::{Application, AuthorizationCode, TokenValidity};
    use crate::storage::MemoryStore;
    use chrono::Duration;

    async fn setup() -> (MemoryStore, TokenFactory, OAuth2Provider, User) {
        let store = MemoryStore::new();
        let provider = OAuth2Provider::new("c1", "s1");
        let user = User::new("alice").with_email("alice@example.com");
        store.insert_provider(provider.clone()).await;
        store.insert_user(user.clone()).await;
        store
            .insert_application(Application::new("my-app", Some(provider.id)))
            .await;
        let factory = TokenFactory::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            "https://idp.example/",
        );
        (store, factory, provider, user)
    }

    fn previous(provider: &OAuth2Provider, user: &User, scope: &[&str]) -> RefreshToken {
        RefreshToken {
            access_token: "old-at".into(),
            refresh_token: "old-rt".into(),
            provider_id: provider.id,
            user_pk: user.pk,
            scope: scope.iter().map(ToString::to_string).collect(),
            expires: Utc::now() + Duration::hours(1),
            revoked: false,
            id_token: None,
        }
    }

    fn request(provider: &OAuth2Provider, scope: &[&str], grant: Grant) -> GrantRequest {
        GrantRequest {
            provider: provider.clone(),
            scope: scope.iter().map(ToString::to_string).collect(),
            grant,
        }
    }

    #[tokio::test]
    async fn test_scope_widening_rejected_before_minting() {
        let (store, factory, provider, user) = setup().await;
        let token = previous(&provider, &user, &["openid"]);
        store.save_refresh_token(&token).await.unwrap();

        let err = factory
            .mint(request(
                &provider,
                &["openid", "email"],
                Grant::RefreshToken { token, user },
            ))
            .await
            .unwrap_err();

        assert_eq!(err, GrantError::Token(TokenError::InvalidScope));
        assert_eq!(store.refresh_tokens_for(provider.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_revokes() {
        let (store, factory, provider, user) = setup().await;
        let token = previous(&provider, &user, &["openid", "email"]);
        store.save_refresh_token(&token).await.unwrap();

        let response = factory
            .mint(request(&provider, &["email"], Grant::RefreshToken { token, user }))
            .await
            .unwrap();

        let new_rt = response.refresh_token.unwrap();
        assert_ne!(new_rt, "old-rt");
        assert_ne!(response.access_token, "old-at");
        // no id token on the presented token, so none is minted
        assert!(response.id_token.is_none());

        let old = store.refresh_token("old-rt", provider.id).await.unwrap().unwrap();
        assert!(old.revoked);
        let new = store.refresh_token(&new_rt, provider.id).await.unwrap().unwrap();
        assert!(!new.revoked);
        assert_eq!(new.scope, vec!["email".to_string()]);
    }

    #[tokio::test]
    async fn test_code_exchange_builds_id_token_with_nonce() {
        let (store, factory, provider, user) = setup().await;
        let code = AuthorizationCode {
            code: "abc123".into(),
            provider_id: provider.id,
            user_pk: user.pk,
            scope: vec!["openid".into(), "email".into()],
            expires: Utc::now() + Duration::minutes(1),
            is_open_id: true,
            nonce: Some("n-0S6".into()),
            code_challenge: None,
            code_challenge_method: None,
            auth_time: Utc::now(),
        };
        store.insert_authorization_code(code.clone()).await;

        let response = factory
            .mint(request(&provider, &[], Grant::AuthorizationCode { code, user }))
            .await
            .unwrap();

        assert_eq!(response.expires_in, 600);
        assert!(response.id_token.is_some());
        assert!(store.authorization_code("abc123").await.unwrap().is_none());

        let stored = store
            .refresh_token(&response.refresh_token.unwrap(), provider.id)
            .await
            .unwrap()
            .unwrap();
        let id_token = stored.id_token.unwrap();
        assert_eq!(id_token.iss, "https://idp.example/application/o/my-app/");
        assert_eq!(id_token.nonce.as_deref(), Some("n-0S6"));
        assert_eq!(
            id_token.at_hash.as_deref(),
            Some(TokenGenerator::at_hash(&response.access_token).as_str())
        );
        assert_eq!(id_token.claims["email"], "alice@example.com");
    }

    #[tokio::test]
    async fn test_lost_race_revokes_minted_token() {
        let (store, factory, provider, user) = setup().await;
        // code already consumed by someone else
        let code = AuthorizationCode {
            code: "gone".into(),
            provider_id: provider.id,
            user_pk: user.pk,
            scope: vec![],
            expires: Utc::now() + Duration::minutes(1),
            is_open_id: false,
            nonce: None,
            code_challenge: None,
            code_challenge_method: None,
            auth_time: Utc::now(),
        };

        let err = factory
            .mint(request(&provider, &[], Grant::AuthorizationCode { code, user }))
            .await
            .unwrap_err();
        assert_eq!(err, GrantError::Token(TokenError::InvalidGrant));

        let tokens = store.refresh_tokens_for(provider.id).await;
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].revoked);
    }

    #[tokio::test]
    async fn test_unrepresentable_validity_fails_without_minting() {
        let (store, factory, mut provider, user) = setup().await;
        provider.token_validity =
            TokenValidity::new(std::time::Duration::from_secs(60_480_000_000_000));
        let token = previous(&provider, &user, &["openid"]);
        store.save_refresh_token(&token).await.unwrap();

        let err = factory
            .mint(request(&provider, &[], Grant::RefreshToken { token, user }))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GrantError::Backend(BackendError::Misconfigured(_))
        ));
        let stored = store.refresh_tokens_for(provider.id).await;
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].revoked);
    }

    #[tokio::test]
    async fn test_client_credentials_omits_refresh_token() {
        let (store, factory, provider, user) = setup().await;
        let application = Application::new("my-app", Some(provider.id));

        let response = factory
            .mint(request(
                &provider,
                &["openid"],
                Grant::ClientCredentials { user, application },
            ))
            .await
            .unwrap();

        assert!(response.refresh_token.is_none());
        assert!(response.id_token.is_some());
        let stored = store.refresh_tokens_for(provider.id).await;
        assert_eq!(stored.len(), 1);
        assert!(stored[0].id_token.is_some());
        assert_eq!(GrantType::ClientCredentials.as_str(), "client_credentials");
    }
}
