//! Collaborators that fail or stall on demand.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oauth2_token::error::BackendError;
use oauth2_token::events::{Event, EventSink};
use oauth2_token::keys::{CertificateKeyPair, KeyMaterialProvider};
use oauth2_token::models::{
    Application, AuthorizationCode, Credential, OAuth2Provider, RefreshToken, User,
};
use oauth2_token::storage::{MemoryStore, OAuthStore};
use uuid::Uuid;

fn unavailable() -> BackendError {
    BackendError::store("connection refused")
}

/// Store whose every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

#[async_trait]
impl OAuthStore for UnavailableStore {
    async fn provider_by_client_id(&self, _: &str) -> Result<Option<OAuth2Provider>, BackendError> {
        Err(unavailable())
    }

    async fn provider(&self, _: Uuid) -> Result<Option<OAuth2Provider>, BackendError> {
        Err(unavailable())
    }

    async fn application_by_slug(&self, _: &str) -> Result<Option<Application>, BackendError> {
        Err(unavailable())
    }

    async fn application_for_provider(
        &self,
        _: Uuid,
    ) -> Result<Option<Application>, BackendError> {
        Err(unavailable())
    }

    async fn user(&self, _: Uuid) -> Result<Option<User>, BackendError> {
        Err(unavailable())
    }

    async fn user_by_username(&self, _: &str) -> Result<Option<User>, BackendError> {
        Err(unavailable())
    }

    async fn credential_by_key(&self, _: &str) -> Result<Option<Credential>, BackendError> {
        Err(unavailable())
    }

    async fn authorization_code(&self, _: &str) -> Result<Option<AuthorizationCode>, BackendError> {
        Err(unavailable())
    }

    async fn delete_authorization_code(&self, _: &str) -> Result<bool, BackendError> {
        Err(unavailable())
    }

    async fn refresh_token(&self, _: &str, _: Uuid) -> Result<Option<RefreshToken>, BackendError> {
        Err(unavailable())
    }

    async fn save_refresh_token(&self, _: &RefreshToken) -> Result<(), BackendError> {
        Err(unavailable())
    }

    async fn revoke_refresh_token(&self, _: &str) -> Result<bool, BackendError> {
        Err(unavailable())
    }
}

#[async_trait]
impl KeyMaterialProvider for UnavailableStore {
    async fn signing_key(
        &self,
        _: &OAuth2Provider,
    ) -> Result<Option<Arc<CertificateKeyPair>>, BackendError> {
        Err(BackendError::KeyMaterial("key vault sealed".to_string()))
    }
}

/// Event sink that rejects every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableEventSink;

#[async_trait]
impl EventSink for UnavailableEventSink {
    async fn emit(&self, _: Event) -> Result<(), BackendError> {
        Err(BackendError::Unavailable {
            component: "events",
            reason: "queue full".to_string(),
        })
    }
}

/// Delays client resolution, then answers from the wrapped store.
#[derive(Clone)]
pub struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowStore {
    /// Wraps `inner`, sleeping `delay` before each client lookup.
    #[must_use]
    pub const fn new(inner: MemoryStore, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl OAuthStore for SlowStore {
    async fn provider_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<OAuth2Provider>, BackendError> {
        tokio::time::sleep(self.delay).await;
        self.inner.provider_by_client_id(client_id).await
    }

    async fn provider(&self, id: Uuid) -> Result<Option<OAuth2Provider>, BackendError> {
        self.inner.provider(id).await
    }

    async fn application_by_slug(&self, slug: &str) -> Result<Option<Application>, BackendError> {
        self.inner.application_by_slug(slug).await
    }

    async fn application_for_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Option<Application>, BackendError> {
        self.inner.application_for_provider(provider_id).await
    }

    async fn user(&self, pk: Uuid) -> Result<Option<User>, BackendError> {
        self.inner.user(pk).await
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, BackendError> {
        self.inner.user_by_username(username).await
    }

    async fn credential_by_key(&self, key: &str) -> Result<Option<Credential>, BackendError> {
        self.inner.credential_by_key(key).await
    }

    async fn authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, BackendError> {
        self.inner.authorization_code(code).await
    }

    async fn delete_authorization_code(&self, code: &str) -> Result<bool, BackendError> {
        self.inner.delete_authorization_code(code).await
    }

    async fn refresh_token(
        &self,
        token: &str,
        provider_id: Uuid,
    ) -> Result<Option<RefreshToken>, BackendError> {
        self.inner.refresh_token(token, provider_id).await
    }

    async fn save_refresh_token(&self, token: &RefreshToken) -> Result<(), BackendError> {
        self.inner.save_refresh_token(token).await
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<bool, BackendError> {
        self.inner.revoke_refresh_token(token).await
    }
}
