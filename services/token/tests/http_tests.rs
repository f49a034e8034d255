//! Router-level tests: routing, form decoding, headers and failure modes.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use oauth2_token::endpoint::TokenEndpoint;
use oauth2_token::events::MemoryEventSink;
use oauth2_token::jwks::JwksPublisher;
use oauth2_token::policy::StaticPolicy;
use oauth2_token::server::{router, AppState, TOKEN_PATH};
use oauth2_token::Backends;
use serde_json::Value;
use test_utils::fixtures::{APP_SLUG, ISSUER_BASE, REDIRECT_URI};
use test_utils::mocks::{SlowStore, UnavailableEventSink, UnavailableStore};
use test_utils::Harness;
use tower::ServiceExt;

fn token_post(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(TOKEN_PATH)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::ORIGIN, "http://localhost")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn app_with(backends: &Backends, request_timeout: Duration) -> axum::Router {
    router(AppState {
        token: Arc::new(TokenEndpoint::new(backends, ISSUER_BASE, request_timeout)),
        jwks: Arc::new(JwksPublisher::new(
            backends.store.clone(),
            backends.keys.clone(),
        )),
    })
}

#[tokio::test]
async fn test_form_post_exchanges_code() {
    let h = Harness::new().await;
    h.insert_code("abc123", &["openid"]).await;
    let app = router(h.app_state());

    let body = format!(
        "grant_type=authorization_code&code=abc123&client_id=c1&client_secret=s1&redirect_uri={}",
        REDIRECT_URI.replace(':', "%3A").replace('/', "%2F")
    );
    let response = app.oneshot(token_post(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost"
    );
    let json = json_body(response).await;
    assert_eq!(json["token_type"], "bearer");
    assert!(json["id_token"].is_string());
}

#[tokio::test]
async fn test_error_response_shape() {
    let h = Harness::new().await;
    let app = router(h.app_state());

    let response = app
        .oneshot(token_post("grant_type=password&client_id=c1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");
    let json = json_body(response).await;
    assert_eq!(json["error"], "unsupported_grant_type");
    assert!(json["error_description"].is_string());
}

#[tokio::test]
async fn test_foreign_origin_gets_no_cors() {
    let h = Harness::new().await;
    let app = router(h.app_state());
    let mut request = token_post("grant_type=password&client_id=c1");
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://evil.example".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();

    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_non_form_body_is_invalid_request() {
    let h = Harness::new().await;
    let app = router(h.app_state());

    let mut request = token_post(r#"{"grant_type":"authorization_code"}"#);
    request
        .headers_mut()
        .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_request");
    assert!(json["error_description"].is_string());
}

#[tokio::test]
async fn test_preflight() {
    let h = Harness::new().await;
    let app = router(h.app_state());
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri(TOKEN_PATH)
        .header(header::ORIGIN, "https://any.example")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://any.example");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "authorization");
    assert!(headers[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .contains("POST"));
    assert_eq!(json_body(response).await, serde_json::json!({}));
}

#[tokio::test]
async fn test_jwks_route() {
    let h = Harness::new().await;
    let app = router(h.app_state());

    let request = Request::builder()
        .uri(format!("/application/o/{APP_SLUG}/jwks/"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["keys"][0]["kty"], "RSA");

    let request = Request::builder()
        .uri("/application/o/missing/jwks/")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_route() {
    let h = Harness::new().await;
    let app = router(h.app_state());
    app.clone()
        .oneshot(token_post("grant_type=password&client_id=c1"))
        .await
        .unwrap();

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("oauth2_token_errors_total"));
}

#[tokio::test]
async fn test_store_outage_is_server_error() {
    let backends = Backends::new(
        Arc::new(UnavailableStore),
        Arc::new(UnavailableStore),
        Arc::new(StaticPolicy::allow()),
        Arc::new(MemoryEventSink::new()),
    );
    let app = app_with(&backends, Duration::from_secs(5));

    let response = app
        .oneshot(token_post("grant_type=authorization_code&client_id=c1&code=x"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "server_error");
    assert!(!json.to_string().contains("connection refused"));
}

#[tokio::test]
async fn test_event_sink_outage_is_server_error() {
    let h = Harness::new().await;
    h.service_account("svc", "app-pw").await;
    let backends = Backends::new(
        Arc::new(h.store.clone()),
        Arc::new(h.store.clone()),
        Arc::new(StaticPolicy::allow()),
        Arc::new(UnavailableEventSink),
    );
    let app = app_with(&backends, Duration::from_secs(5));

    let response = app
        .oneshot(token_post(
            "grant_type=client_credentials&client_id=c1&username=svc&password=app-pw",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let h = Harness::new().await;
    h.insert_code("abc123", &["openid"]).await;
    let backends = Backends::new(
        Arc::new(SlowStore::new(h.store.clone(), Duration::from_millis(500))),
        Arc::new(h.store.clone()),
        Arc::new(StaticPolicy::allow()),
        Arc::new(h.events.clone()),
    );
    let app = app_with(&backends, Duration::from_millis(20));

    let response = app
        .oneshot(token_post(
            "grant_type=authorization_code&client_id=c1&client_secret=s1&code=abc123",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "server_error");
    // Nothing was consumed.
    assert!(h.store.refresh_tokens_for(h.provider.id).await.is_empty());
}
