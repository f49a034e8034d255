//! Seeded in-memory deployment of the token service.
//!
//! `Harness` wires a `MemoryStore`, a `MemoryEventSink` and a static policy
//! behind the real endpoints, with one confidential client bound to one
//! application.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Method};
use oauth2_token::endpoint::{EndpointResponse, TokenEndpoint, TokenRequest};
use oauth2_token::events::MemoryEventSink;
use oauth2_token::grant::TokenRequestForm;
use oauth2_token::jwks::JwksPublisher;
use oauth2_token::keys::CertificateKeyPair;
use oauth2_token::models::{
    Application, AuthorizationCode, ClientType, Credential, OAuth2Provider, RefreshToken, User,
};
use oauth2_token::policy::StaticPolicy;
use oauth2_token::server::{AppState, TOKEN_PATH};
use oauth2_token::storage::MemoryStore;
use oauth2_token::Backends;

/// PKCS#8 RSA-2048 signing key.
pub const RSA_SIGNING_PEM: &str = include_str!("../keys/rsa_signing.pem");
/// PKCS#8 P-256 signing key.
pub const EC_SIGNING_PEM: &str = include_str!("../keys/ec_signing.pem");
/// Modulus of `RSA_SIGNING_PEM`, as published in the JWKS.
pub const RSA_MODULUS_B64: &str = "rfHkn38tNr4FBt8mFmLIbzy8n0vGEGIJcrOO3bgSeeREYPSamXG20OAiYkwMRFdfn1oYkqtcmhZKchbdWbqrCroeJYWGYOaqIhRqmRvgIrjUqkmuLUbEYx_JcQrSEHxmEetof0D6MC4BjLnZ91H33b3AeusoZyyPJ--cj8YpaBWBoYlXMfpqMrmrT7srOx6ZzwiDfQSvBsmaMKBbO1ueRRsZ_wLGpn0wJs2iAugfw2W2mCap5_5Y-QQdHgCyLcpLLUZoXw19pw1Hvicqndv8uQiPx6heYKjzdOQjuEF3rD3oM5-eVhm61cRr4bqX9wpPbgYfoFFOdlG6BzWowGUlYw";
/// X coordinate of `EC_SIGNING_PEM`.
pub const EC_X_B64: &str = "f_7DF-w_Hz5ccdb6ACJxz4vSsnwxZaNBmhDlfFEuM4c";

/// Client id of the seeded provider.
pub const CLIENT_ID: &str = "c1";
/// Client secret of the seeded provider.
pub const CLIENT_SECRET: &str = "s1";
/// Only redirect URI the seeded provider accepts.
pub const REDIRECT_URI: &str = "http://localhost/cb";
/// Slug of the application bound to the seeded provider.
pub const APP_SLUG: &str = "app";
/// Issuer base passed to the endpoint.
pub const ISSUER_BASE: &str = "http://localhost:9000";

/// Which key, if any, the provider signs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningKey {
    /// `RSA_SIGNING_PEM`, RS256
    Rsa,
    /// `EC_SIGNING_PEM`, ES256
    Ec,
    /// HS256 with the client secret
    None,
}

/// Builder for [`Harness`].
#[derive(Debug, Clone)]
pub struct HarnessBuilder {
    client_type: ClientType,
    redirect_uris: String,
    policy: StaticPolicy,
    signing_key: SigningKey,
    bind_application: bool,
    request_timeout: Duration,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            client_type: ClientType::Confidential,
            redirect_uris: REDIRECT_URI.to_string(),
            policy: StaticPolicy::allow(),
            signing_key: SigningKey::Rsa,
            bind_application: true,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl HarnessBuilder {
    /// Client type of the seeded provider.
    #[must_use]
    pub const fn client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = client_type;
        self
    }

    /// Raw allowed redirect URIs, newline separated or `*`.
    #[must_use]
    pub fn redirect_uris(mut self, raw: &str) -> Self {
        self.redirect_uris = raw.to_string();
        self
    }

    /// Policy evaluated for client credentials.
    #[must_use]
    pub fn policy(mut self, policy: StaticPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Key the provider signs ID tokens with.
    #[must_use]
    pub const fn signing_key(mut self, key: SigningKey) -> Self {
        self.signing_key = key;
        self
    }

    /// Leaves the provider without an application.
    #[must_use]
    pub const fn unbound(mut self) -> Self {
        self.bind_application = false;
        self
    }

    /// Builds the harness.
    ///
    /// # Panics
    ///
    /// Panics if a bundled test key fails to parse.
    pub async fn build(self) -> Harness {
        let store = MemoryStore::new();
        let events = MemoryEventSink::new();

        let mut provider = OAuth2Provider::new(CLIENT_ID, CLIENT_SECRET)
            .with_client_type(self.client_type)
            .with_redirect_uris(&self.redirect_uris);
        let pem = match self.signing_key {
            SigningKey::Rsa => Some(RSA_SIGNING_PEM),
            SigningKey::Ec => Some(EC_SIGNING_PEM),
            SigningKey::None => None,
        };
        if let Some(pem) = pem {
            let key = CertificateKeyPair::from_pem("test-key", pem).expect("bundled test key");
            provider = provider.with_signing_key(store.insert_key(key).await);
        }

        let application = Application::new(APP_SLUG, Some(provider.id));
        if self.bind_application {
            store.insert_application(application.clone()).await;
        }
        store.insert_provider(provider.clone()).await;

        let user = User::new("alice")
            .with_email("alice@example.com")
            .with_name("Alice Example");
        store.insert_user(user.clone()).await;

        let backends = Backends::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(self.policy),
            Arc::new(events.clone()),
        );
        let endpoint = Arc::new(TokenEndpoint::new(
            &backends,
            ISSUER_BASE,
            self.request_timeout,
        ));
        let jwks = Arc::new(JwksPublisher::new(
            backends.store.clone(),
            backends.keys.clone(),
        ));

        Harness {
            store,
            events,
            provider,
            application,
            user,
            endpoint,
            jwks,
        }
    }
}

/// One client, one application, one human user.
pub struct Harness {
    /// Backing store, shared with the endpoints.
    pub store: MemoryStore,
    /// Every event emitted so far.
    pub events: MemoryEventSink,
    /// Provider for [`CLIENT_ID`].
    pub provider: OAuth2Provider,
    /// Application with slug [`APP_SLUG`]. Not stored when unbound.
    pub application: Application,
    /// `alice`, a human user.
    pub user: User,
    /// Token endpoint under test.
    pub endpoint: Arc<TokenEndpoint>,
    /// JWKS publisher under test.
    pub jwks: Arc<JwksPublisher>,
}

impl Harness {
    /// Starts from the default deployment.
    #[must_use]
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Confidential client signing with the RSA key.
    pub async fn new() -> Self {
        Self::builder().build().await
    }

    /// Router state over the same endpoints.
    #[must_use]
    pub fn app_state(&self) -> AppState {
        AppState {
            token: self.endpoint.clone(),
            jwks: self.jwks.clone(),
        }
    }

    /// Unsaved code owned by the harness user; OpenID when `scope`
    /// contains `openid`.
    #[must_use]
    pub fn authorization_code(&self, code: &str, scope: &[&str]) -> AuthorizationCode {
        let now = Utc::now();
        AuthorizationCode {
            code: code.to_string(),
            provider_id: self.provider.id,
            user_pk: self.user.pk,
            scope: scope.iter().map(|s| (*s).to_string()).collect(),
            expires: now + chrono::Duration::minutes(10),
            is_open_id: scope.contains(&"openid"),
            nonce: None,
            code_challenge: None,
            code_challenge_method: None,
            auth_time: now,
        }
    }

    /// Stores a fresh code for `scope`.
    pub async fn insert_code(&self, code: &str, scope: &[&str]) -> AuthorizationCode {
        let code = self.authorization_code(code, scope);
        self.store.insert_authorization_code(code.clone()).await;
        code
    }

    /// Unsaved, unrevoked refresh token owned by the harness user.
    #[must_use]
    pub fn refresh_token(&self, token: &str, scope: &[&str]) -> RefreshToken {
        RefreshToken {
            access_token: format!("at-{token}"),
            refresh_token: token.to_string(),
            provider_id: self.provider.id,
            user_pk: self.user.pk,
            scope: scope.iter().map(|s| (*s).to_string()).collect(),
            expires: Utc::now() + chrono::Duration::hours(1),
            revoked: false,
            id_token: None,
        }
    }

    /// Stores a live refresh token for `scope`.
    pub async fn insert_refresh_token(&self, token: &str, scope: &[&str]) -> RefreshToken {
        let token = self.refresh_token(token, scope);
        self.store.insert_refresh_token(token.clone()).await;
        token
    }

    /// Service account with a live app password.
    pub async fn service_account(&self, username: &str, password: &str) -> User {
        let user = User::new(username).service_account();
        self.store.insert_user(user.clone()).await;
        self.store
            .insert_credential(Credential::app_password(
                format!("{username}-app-password"),
                password,
                user.pk,
            ))
            .await;
        user
    }

    /// Form carrying the harness client's credentials.
    #[must_use]
    pub fn form(&self, grant_type: &str) -> TokenRequestForm {
        TokenRequestForm {
            grant_type: Some(grant_type.to_string()),
            client_id: Some(CLIENT_ID.to_string()),
            client_secret: Some(CLIENT_SECRET.to_string()),
            redirect_uri: Some(REDIRECT_URI.to_string()),
            ..Default::default()
        }
    }

    /// Code exchange form for `code`.
    #[must_use]
    pub fn code_form(&self, code: &str) -> TokenRequestForm {
        let mut form = self.form("authorization_code");
        form.code = Some(code.to_string());
        form
    }

    /// Refresh form for `token`.
    #[must_use]
    pub fn refresh_form(&self, token: &str) -> TokenRequestForm {
        let mut form = self.form("refresh_token");
        form.refresh_token = Some(token.to_string());
        form
    }

    /// Client credentials form for a service account.
    #[must_use]
    pub fn client_credentials_form(
        &self,
        username: &str,
        password: &str,
    ) -> TokenRequestForm {
        let mut form = self.form("client_credentials");
        form.username = Some(username.to_string());
        form.password = Some(password.to_string());
        form
    }

    /// POSTs `form` to the token endpoint.
    pub async fn post(&self, form: TokenRequestForm) -> EndpointResponse {
        self.endpoint.handle(request(form, HeaderMap::new())).await
    }

    /// POSTs `form` with an `Authorization` header.
    ///
    /// # Panics
    ///
    /// Panics if `authorization` is not a valid header value.
    pub async fn post_with_authorization(
        &self,
        form: TokenRequestForm,
        authorization: &str,
    ) -> EndpointResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(authorization).expect("header value"),
        );
        self.endpoint.handle(request(form, headers)).await
    }
}

/// POST to the token path from 127.0.0.1.
#[must_use]
pub fn request(form: TokenRequestForm, headers: HeaderMap) -> TokenRequest {
    TokenRequest {
        method: Method::POST,
        headers,
        form,
        peer_ip: Some("127.0.0.1".to_string()),
        path: TOKEN_PATH.to_string(),
    }
}
