use http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use http::{HeaderValue, StatusCode};
use serde_json::json;
use tracing::error;

use super::response::EndpointResponse;
use crate::error::JwksError;
use crate::jwks::JwksPublisher;
use crate::metrics;

/// JWKS for an application slug. Public key material only, so any origin
/// may read it.
pub async fn jwks_response(publisher: &JwksPublisher, slug: &str) -> EndpointResponse {
    let mut response = match publisher.get_jwks(slug).await {
        Ok(jwks) => {
            metrics::record_jwks_request("ok");
            EndpointResponse::json(StatusCode::OK, &jwks)
        }
        Err(JwksError::NotFound) => {
            metrics::record_jwks_request("not_found");
            EndpointResponse::json(StatusCode::NOT_FOUND, &json!({"error": "not_found"}))
        }
        Err(JwksError::Backend(e)) => {
            error!(slug, error = %e, "Failed to load signing key");
            metrics::record_jwks_request("error");
            EndpointResponse::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "server_error"}),
            )
        }
    };
    response
        .headers
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}
