//! Grant-specific validation of token requests.
//!
//! Turns a [`TokenRequestDraft`] into a [`GrantRequest`] or a protocol error.
//! Checks run in a fixed order; each one assumes the previous ones passed.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use super::params::{ClientAuth, GrantType, RequestContext, TokenRequestDraft, TokenRequestForm};
use super::pkce;
use crate::error::{GrantError, TokenError, UserAuthError};
use crate::events::{EventAction, EventSink};
use crate::metrics;
use crate::models::{
    Application, AuthorizationCode, OAuth2Provider, RefreshToken, TokenIntent, User,
};
use crate::policy::PolicyEngine;
use crate::storage::OAuthStore;
use crate::tokens::TokenGenerator;

/// Evidence resolved for exactly one grant type.
#[derive(Debug, Clone)]
pub enum Grant {
    /// Live code issued to the requesting provider, and its owner.
    AuthorizationCode {
        code: AuthorizationCode,
        user: User,
    },
    /// Unrevoked, unexpired refresh token, and its owner.
    RefreshToken {
        token: RefreshToken,
        user: User,
    },
    /// Service account that passed the application's policy.
    ClientCredentials {
        user: User,
        application: Application,
    },
}

impl Grant {
    #[must_use]
    pub const fn grant_type(&self) -> GrantType {
        match self {
            Self::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Self::RefreshToken { .. } => GrantType::RefreshToken,
            Self::ClientCredentials { .. } => GrantType::ClientCredentials,
        }
    }

    #[must_use]
    pub const fn user(&self) -> &User {
        match self {
            Self::AuthorizationCode { user, .. }
            | Self::RefreshToken { user, .. }
            | Self::ClientCredentials { user, .. } => user,
        }
    }
}

/// Validated token request.
#[derive(Debug, Clone)]
pub struct GrantRequest {
    pub provider: OAuth2Provider,
    /// Requested scope. For refresh grants without an explicit scope this
    /// is the presented token's scope.
    pub scope: Vec<String>,
    pub grant: Grant,
}

/// Validates token requests against the store, policy engine and event sink.
pub struct GrantExtractor {
    store: Arc<dyn OAuthStore>,
    policy: Arc<dyn PolicyEngine>,
    events: Arc<dyn EventSink>,
}

impl GrantExtractor {
    pub fn new(
        store: Arc<dyn OAuthStore>,
        policy: Arc<dyn PolicyEngine>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            policy,
            events,
        }
    }

    /// Validates a token request for an already resolved provider.
    ///
    /// # Errors
    ///
    /// Protocol errors for invalid requests, [`UserAuthError`] for a
    /// deactivated service account, backend errors from collaborators.
    pub async fn extract(
        &self,
        provider: OAuth2Provider,
        form: &TokenRequestForm,
        client: &ClientAuth,
        ctx: &RequestContext,
    ) -> Result<GrantRequest, GrantError> {
        let draft = TokenRequestDraft::parse(form, client);
        let grant_type = draft.grant_type.parse::<GrantType>();

        if matches!(
            grant_type,
            Ok(GrantType::AuthorizationCode | GrantType::RefreshToken)
        ) && provider.is_confidential()
            && !secrets_match(&provider.client_secret, &draft.client_secret)
        {
            warn!(client_id = %provider.client_id, "Invalid client secret");
            return Err(TokenError::InvalidClient.into());
        }

        let mut scope = draft.scope.clone();
        let grant = match grant_type {
            Ok(GrantType::AuthorizationCode) => self.authorization_code(&provider, &draft).await?,
            Ok(GrantType::RefreshToken) => {
                let grant = self.refresh_token(&provider, &draft, ctx).await?;
                if let Grant::RefreshToken { token, .. } = &grant {
                    // RFC 6749 §6: omitted scope means the original scope
                    if scope.is_empty() {
                        scope.clone_from(&token.scope);
                    }
                }
                grant
            }
            Ok(GrantType::ClientCredentials) => {
                self.client_credentials(&provider, &draft, ctx).await?
            }
            Err(err) => {
                warn!(grant_type = %draft.grant_type, "Invalid grant type");
                return Err(err.into());
            }
        };

        Ok(GrantRequest {
            provider,
            scope,
            grant,
        })
    }

    async fn authorization_code(
        &self,
        provider: &OAuth2Provider,
        draft: &TokenRequestDraft,
    ) -> Result<Grant, GrantError> {
        if draft.code.is_empty() {
            warn!("Missing authorization code");
            return Err(TokenError::InvalidGrant.into());
        }

        if provider.redirect_uris.is_wildcard() {
            warn!(
                redirect = %draft.redirect_uri,
                "Provider has wildcard allowed redirect_uri set, allowing all"
            );
        } else if !provider.redirect_uris.allows(&draft.redirect_uri) {
            warn!(
                redirect = %draft.redirect_uri,
                expected = ?provider.redirect_uris.origins(),
                "Invalid redirect uri"
            );
            return Err(TokenError::InvalidClient.into());
        }

        let fingerprint = TokenGenerator::fingerprint(&draft.code);
        let Some(code) = self.store.authorization_code(&draft.code).await? else {
            warn!(code = %fingerprint, "Code does not exist");
            return Err(TokenError::InvalidGrant.into());
        };
        if code.is_expired(Utc::now()) {
            warn!(code = %fingerprint, "Code is expired");
            return Err(TokenError::InvalidGrant.into());
        }
        if code.provider_id != provider.id {
            warn!(code = %fingerprint, "Invalid code: issued to another client");
            return Err(TokenError::InvalidGrant.into());
        }

        if let Some(verifier) = draft.code_verifier.as_deref() {
            if !pkce::verify(
                verifier,
                code.code_challenge.as_deref(),
                code.code_challenge_method.as_deref(),
            ) {
                warn!(code = %fingerprint, "Code challenge not matching");
                return Err(TokenError::InvalidGrant.into());
            }
        }

        let Some(user) = self.store.user(code.user_pk).await? else {
            warn!(code = %fingerprint, "Code owner no longer exists");
            return Err(TokenError::InvalidGrant.into());
        };

        Ok(Grant::AuthorizationCode { code, user })
    }

    async fn refresh_token(
        &self,
        provider: &OAuth2Provider,
        draft: &TokenRequestDraft,
        ctx: &RequestContext,
    ) -> Result<Grant, GrantError> {
        if draft.refresh_token.is_empty() {
            warn!("Missing refresh token");
            return Err(TokenError::InvalidGrant.into());
        }

        let fingerprint = TokenGenerator::fingerprint(&draft.refresh_token);
        let Some(token) = self
            .store
            .refresh_token(&draft.refresh_token, provider.id)
            .await?
        else {
            warn!(token = %fingerprint, "Refresh token does not exist");
            return Err(TokenError::InvalidGrant.into());
        };
        if token.is_expired(Utc::now()) {
            warn!(token = %fingerprint, "Refresh token is expired");
            return Err(TokenError::InvalidGrant.into());
        }
        if token.revoked {
            warn!(
                token = %fingerprint,
                client_id = %provider.client_id,
                "Refresh token is revoked"
            );
            metrics::record_security_event("revoked_refresh_token_reuse");
            self.events
                .emit(
                    ctx.event(EventAction::SuspiciousRequest)
                        .with_user(token.user_pk)
                        .with_context("message", "Revoked refresh token was used")
                        .with_context("token", fingerprint)
                        .with_context("client_id", provider.client_id.clone()),
                )
                .await?;
            return Err(TokenError::InvalidGrant.into());
        }

        let Some(user) = self.store.user(token.user_pk).await? else {
            warn!(token = %fingerprint, "Refresh token owner no longer exists");
            return Err(TokenError::InvalidGrant.into());
        };

        Ok(Grant::RefreshToken { token, user })
    }

    async fn client_credentials(
        &self,
        provider: &OAuth2Provider,
        draft: &TokenRequestDraft,
        ctx: &RequestContext,
    ) -> Result<Grant, GrantError> {
        let Some(user) = self.store.user_by_username(&draft.username).await? else {
            debug!(username = %draft.username, "Unknown user for client credentials");
            return Err(TokenError::InvalidGrant.into());
        };

        let credential = self
            .store
            .credential_by_key(&draft.password)
            .await?
            .filter(|c| c.intent == TokenIntent::AppPassword && !c.is_expired(Utc::now()));
        let Some(credential) = credential.filter(|c| c.user_pk == user.pk) else {
            debug!(username = %user.username, "No live app password for user");
            return Err(TokenError::InvalidGrant.into());
        };

        if !user.is_service_account() {
            info!(username = %user.username, "Non-service-account tried to use client credentials");
            return Err(TokenError::InvalidGrant.into());
        }
        if !user.is_active {
            warn!(username = %user.username, "Deactivated service account tried to authenticate");
            return Err(UserAuthError::AccessDenied.into());
        }

        self.events
            .emit(
                ctx.event(EventAction::Login)
                    .with_user(user.pk)
                    .with_context("method", "token")
                    .with_context(
                        "method_args",
                        json!({ "identifier": credential.identifier }),
                    ),
            )
            .await?;

        let Some(application) = self.store.application_for_provider(provider.id).await? else {
            warn!(client_id = %provider.client_id, "Provider is not bound to an application");
            return Err(TokenError::InvalidGrant.into());
        };

        let verdict = self.policy.evaluate(&application, &user).await?;
        if !verdict.passing {
            info!(
                username = %user.username,
                app = %application.slug,
                messages = ?verdict.messages,
                "User not authenticated for application"
            );
            return Err(TokenError::InvalidGrant.into());
        }

        Ok(Grant::ClientCredentials { user, application })
    }
}

fn secrets_match(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}
