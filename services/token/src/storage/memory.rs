//! In-memory store used by the development binary and the tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::OAuthStore;
use crate::error::BackendError;
use crate::keys::{CertificateKeyPair, KeyMaterialProvider};
use crate::models::{
    Application, AuthorizationCode, Credential, OAuth2Provider, RefreshToken, User,
};

#[derive(Default)]
struct Tables {
    providers: HashMap<Uuid, OAuth2Provider>,
    applications: Vec<Application>,
    users: HashMap<Uuid, User>,
    credentials: HashMap<String, Credential>,
    codes: HashMap<String, AuthorizationCode>,
    refresh_tokens: HashMap<String, RefreshToken>,
    keys: HashMap<Uuid, Arc<CertificateKeyPair>>,
}

/// All tables behind one lock, so delete-if-present and
/// revoke-if-unrevoked are atomic.
#[derive(Default, Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_provider(&self, provider: OAuth2Provider) {
        let mut tables = self.tables.write().await;
        tables.providers.insert(provider.id, provider);
    }

    pub async fn insert_application(&self, application: Application) {
        let mut tables = self.tables.write().await;
        tables.applications.push(application);
    }

    pub async fn insert_user(&self, user: User) {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.pk, user);
    }

    pub async fn insert_credential(&self, credential: Credential) {
        let mut tables = self.tables.write().await;
        tables.credentials.insert(credential.key.clone(), credential);
    }

    pub async fn insert_authorization_code(&self, code: AuthorizationCode) {
        let mut tables = self.tables.write().await;
        tables.codes.insert(code.code.clone(), code);
    }

    pub async fn insert_refresh_token(&self, token: RefreshToken) {
        let mut tables = self.tables.write().await;
        tables.refresh_tokens.insert(token.refresh_token.clone(), token);
    }

    pub async fn insert_key(&self, key: CertificateKeyPair) -> Uuid {
        let id = key.id;
        let mut tables = self.tables.write().await;
        tables.keys.insert(id, Arc::new(key));
        id
    }

    /// Every refresh token issued to a provider, for inspection.
    pub async fn refresh_tokens_for(&self, provider_id: Uuid) -> Vec<RefreshToken> {
        let tables = self.tables.read().await;
        tables
            .refresh_tokens
            .values()
            .filter(|t| t.provider_id == provider_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OAuthStore for MemoryStore {
    async fn provider_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<OAuth2Provider>, BackendError> {
        let tables = self.tables.read().await;
        Ok(tables
            .providers
            .values()
            .find(|p| p.client_id == client_id)
            .cloned())
    }

    async fn provider(&self, id: Uuid) -> Result<Option<OAuth2Provider>, BackendError> {
        Ok(self.tables.read().await.providers.get(&id).cloned())
    }

    async fn application_by_slug(&self, slug: &str) -> Result<Option<Application>, BackendError> {
        let tables = self.tables.read().await;
        Ok(tables.applications.iter().find(|a| a.slug == slug).cloned())
    }

    async fn application_for_provider(
        &self,
        provider_id: Uuid,
    ) -> Result<Option<Application>, BackendError> {
        let tables = self.tables.read().await;
        Ok(tables
            .applications
            .iter()
            .find(|a| a.provider_id == Some(provider_id))
            .cloned())
    }

    async fn user(&self, pk: Uuid) -> Result<Option<User>, BackendError> {
        Ok(self.tables.read().await.users.get(&pk).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, BackendError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn credential_by_key(&self, key: &str) -> Result<Option<Credential>, BackendError> {
        Ok(self.tables.read().await.credentials.get(key).cloned())
    }

    async fn authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, BackendError> {
        Ok(self.tables.read().await.codes.get(code).cloned())
    }

    async fn delete_authorization_code(&self, code: &str) -> Result<bool, BackendError> {
        Ok(self.tables.write().await.codes.remove(code).is_some())
    }

    async fn refresh_token(
        &self,
        token: &str,
        provider_id: Uuid,
    ) -> Result<Option<RefreshToken>, BackendError> {
        let tables = self.tables.read().await;
        Ok(tables
            .refresh_tokens
            .get(token)
            .filter(|t| t.provider_id == provider_id)
            .cloned())
    }

    async fn save_refresh_token(&self, token: &RefreshToken) -> Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        tables
            .refresh_tokens
            .insert(token.refresh_token.clone(), token.clone());
        Ok(())
    }

    async fn revoke_refresh_token(&self, token: &str) -> Result<bool, BackendError> {
        let mut tables = self.tables.write().await;
        match tables.refresh_tokens.get_mut(token) {
            Some(t) if !t.revoked => {
                t.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl KeyMaterialProvider for MemoryStore {
    async fn signing_key(
        &self,
        provider: &OAuth2Provider,
    ) -> Result<Option<Arc<CertificateKeyPair>>, BackendError> {
        let Some(key_id) = provider.signing_key else {
            return Ok(None);
        };
        Ok(self.tables.read().await.keys.get(&key_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn refresh_token(provider_id: Uuid, value: &str) -> RefreshToken {
        RefreshToken {
            access_token: format!("at-{value}"),
            refresh_token: value.to_string(),
            provider_id,
            user_pk: Uuid::new_v4(),
            scope: vec!["openid".into()],
            expires: Utc::now() + Duration::hours(1),
            revoked: false,
            id_token: None,
        }
    }

    #[tokio::test]
    async fn test_delete_code_only_once() {
        let store = MemoryStore::new();
        store
            .insert_authorization_code(AuthorizationCode {
                code: "abc123".into(),
                provider_id: Uuid::new_v4(),
                user_pk: Uuid::new_v4(),
                scope: vec![],
                expires: Utc::now() + Duration::minutes(1),
                is_open_id: false,
                nonce: None,
                code_challenge: None,
                code_challenge_method: None,
                auth_time: Utc::now(),
            })
            .await;

        assert!(store.delete_authorization_code("abc123").await.unwrap());
        assert!(!store.delete_authorization_code("abc123").await.unwrap());
        assert!(store.authorization_code("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_is_monotonic() {
        let store = MemoryStore::new();
        let provider_id = Uuid::new_v4();
        store
            .save_refresh_token(&refresh_token(provider_id, "rt-1"))
            .await
            .unwrap();

        assert!(store.revoke_refresh_token("rt-1").await.unwrap());
        assert!(!store.revoke_refresh_token("rt-1").await.unwrap());
        assert!(!store.revoke_refresh_token("unknown").await.unwrap());

        let stored = store.refresh_token("rt-1", provider_id).await.unwrap().unwrap();
        assert!(stored.revoked);
    }

    #[tokio::test]
    async fn test_refresh_token_scoped_to_provider() {
        let store = MemoryStore::new();
        let provider_id = Uuid::new_v4();
        store
            .save_refresh_token(&refresh_token(provider_id, "rt-1"))
            .await
            .unwrap();

        assert!(store.refresh_token("rt-1", provider_id).await.unwrap().is_some());
        assert!(store.refresh_token("rt-1", Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signing_key_absent_without_binding() {
        let store = MemoryStore::new();
        let provider = OAuth2Provider::new("c1", "s1");
        assert!(store.signing_key(&provider).await.unwrap().is_none());
    }
}
