//! HTTP binding of the endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{Extensions, HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::endpoint::{jwks_response, Backends, EndpointResponse, TokenEndpoint, TokenRequest};
use crate::grant::TokenRequestForm;
use crate::jwks::JwksPublisher;
use crate::metrics;

/// Path of the token endpoint.
pub const TOKEN_PATH: &str = "/application/o/token/";

/// Shared router state.
#[derive(Clone)]
pub struct AppState {
    pub token: Arc<TokenEndpoint>,
    pub jwks: Arc<JwksPublisher>,
}

impl AppState {
    pub fn new(backends: &Backends, config: &Config) -> Self {
        Self {
            token: Arc::new(TokenEndpoint::new(
                backends,
                &config.issuer_base_url,
                config.request_timeout,
            )),
            jwks: Arc::new(JwksPublisher::new(
                backends.store.clone(),
                backends.keys.clone(),
            )),
        }
    }
}

impl IntoResponse for EndpointResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, Json(self.body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(TOKEN_PATH, post(token).options(token_preflight))
        .route("/application/o/{slug}/jwks/", get(jwks))
        .route("/metrics", get(metrics_text))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn token(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    extensions: Extensions,
    form: Result<Form<TokenRequestForm>, FormRejection>,
) -> EndpointResponse {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => return TokenEndpoint::malformed(&rejection.body_text()),
    };
    let peer_ip = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    state
        .token
        .handle(TokenRequest {
            method,
            headers,
            form,
            peer_ip,
            path: uri.path().to_string(),
        })
        .await
}

async fn token_preflight(State(state): State<AppState>, headers: HeaderMap) -> EndpointResponse {
    state.token.options(&headers)
}

async fn jwks(State(state): State<AppState>, Path(slug): Path<String>) -> EndpointResponse {
    jwks_response(&state.jwks, &slug).await
}

async fn metrics_text() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}
