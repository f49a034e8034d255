//! Token endpoint orchestration.
//!
//! resolve client -> validate grant -> mint -> serialize, with CORS headers
//! applied to every outcome.

use std::sync::Arc;
use std::time::Duration;

use http::header::{AUTHORIZATION, USER_AGENT};
use http::{HeaderMap, Method, StatusCode};
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::cors::cors_allow;
use super::response::EndpointResponse;
use super::Backends;
use crate::error::{EndpointError, GrantError, TokenError};
use crate::grant::{
    extract_client_auth, ClientAuth, GrantExtractor, RequestContext, TokenRequestForm,
};
use crate::metrics;
use crate::storage::OAuthStore;
use crate::tokens::{TokenFactory, TokenResponse};

/// Inbound token request, independent of the HTTP framework.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub form: TokenRequestForm,
    pub peer_ip: Option<String>,
    pub path: String,
}

/// `POST`/`OPTIONS` handler of the token endpoint.
pub struct TokenEndpoint {
    store: Arc<dyn OAuthStore>,
    extractor: GrantExtractor,
    factory: TokenFactory,
    request_timeout: Duration,
}

impl TokenEndpoint {
    pub fn new(backends: &Backends, issuer_base: &str, request_timeout: Duration) -> Self {
        Self {
            store: backends.store.clone(),
            extractor: GrantExtractor::new(
                backends.store.clone(),
                backends.policy.clone(),
                backends.events.clone(),
            ),
            factory: TokenFactory::new(backends.store.clone(), backends.keys.clone(), issuer_base),
            request_timeout,
        }
    }

    /// Dispatches on the request method.
    pub async fn handle(&self, request: TokenRequest) -> EndpointResponse {
        if request.method == Method::OPTIONS {
            return self.options(&request.headers);
        }
        self.post(request).await
    }

    /// Preflight. Always `{}` with status 200.
    pub fn options(&self, headers: &HeaderMap) -> EndpointResponse {
        let mut response = EndpointResponse::token(StatusCode::OK, &json!({}));
        cors_allow(headers, &Method::OPTIONS, &mut response.headers, &[]);
        response
    }

    /// Response for a body that could not be decoded as a token request.
    #[must_use]
    pub fn malformed(reason: &str) -> EndpointResponse {
        debug!(reason, "Malformed token request body");
        let err = EndpointError::from(TokenError::InvalidRequest);
        metrics::record_token_error(err.metric_label());
        EndpointResponse::token(err.status_code(), &err.body())
    }

    pub async fn post(&self, request: TokenRequest) -> EndpointResponse {
        let authorization = request
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let client = extract_client_auth(authorization, &request.form);
        let ctx = RequestContext::new(
            request
                .headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok()),
            request.peer_ip.clone(),
            request.headers.get(USER_AGENT).and_then(|v| v.to_str().ok()),
            request.path.clone(),
        );

        let mut allowed_origins = Vec::new();
        let outcome = timeout(
            self.request_timeout,
            self.exchange(&client, &request.form, &ctx, &mut allowed_origins),
        )
        .await
        .map_err(|_| EndpointError::Timeout)
        .and_then(|result| result.map_err(EndpointError::from));

        let mut response = match outcome {
            Ok(tokens) => EndpointResponse::token(StatusCode::OK, &tokens),
            Err(err) => {
                match &err {
                    EndpointError::Grant(GrantError::Backend(e)) => {
                        error!(client_id = %client.client_id, error = %e, "Token exchange failed");
                    }
                    EndpointError::Timeout => {
                        error!(client_id = %client.client_id, "Token exchange timed out");
                    }
                    EndpointError::Grant(e) => {
                        debug!(client_id = %client.client_id, error = %e, "Token request rejected");
                    }
                }
                metrics::record_token_error(err.metric_label());
                EndpointResponse::token(err.status_code(), &err.body())
            }
        };

        cors_allow(
            &request.headers,
            &request.method,
            &mut response.headers,
            &allowed_origins,
        );
        response
    }

    async fn exchange(
        &self,
        client: &ClientAuth,
        form: &TokenRequestForm,
        ctx: &RequestContext,
        allowed_origins: &mut Vec<String>,
    ) -> Result<TokenResponse, GrantError> {
        let Some(provider) = self.store.provider_by_client_id(&client.client_id).await? else {
            warn!(client_id = %client.client_id, "OAuth2Provider does not exist");
            return Err(TokenError::InvalidClient.into());
        };
        *allowed_origins = provider.redirect_uris.origins().to_vec();

        let request = self.extractor.extract(provider, form, client, ctx).await?;
        debug!(grant_type = %request.grant.grant_type(), "Minting tokens");
        self.factory.mint(request).await
    }
}
