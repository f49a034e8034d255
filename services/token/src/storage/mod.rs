//! Persistence seam for providers, users and grants.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::BackendError;
use crate::models::{
    Application, AuthorizationCode, Credential, OAuth2Provider, RefreshToken, User,
};

pub use memory::MemoryStore;

/// Point lookups by natural key plus the two atomic grant mutations.
#[async_trait]
pub trait OAuthStore: Send + Sync {
    async fn provider_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<OAuth2Provider>, BackendError>;

    async fn provider(&self, id: Uuid) -> Result<Option<OAuth2Provider>, BackendError>;

    async fn application_by_slug(&self, slug: &str) -> Result<Option<Application>, BackendError>;

    /// First application bound to the provider.
    async fn application_for_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Option<Application>, BackendError>;

    async fn user(&self, pk: Uuid) -> Result<Option<User>, BackendError>;

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, BackendError>;

    async fn credential_by_key(&self, key: &str) -> Result<Option<Credential>, BackendError>;

    async fn authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, BackendError>;

    /// Deletes the code if it still exists. `false` means another caller
    /// consumed it first.
    async fn delete_authorization_code(&self, code: &str) -> Result<bool, BackendError>;

    /// Refresh token issued to the given provider.
    async fn refresh_token(
        &self,
        token: &str,
        provider_id: Uuid,
    ) -> Result<Option<RefreshToken>, BackendError>;

    async fn save_refresh_token(&self, token: &RefreshToken) -> Result<(), BackendError>;

    /// Marks the token revoked if it is not already. `false` means it was
    /// already revoked or no longer exists.
    async fn revoke_refresh_token(&self, token: &str) -> Result<bool, BackendError>;
}
