use http::header::{CACHE_CONTROL, PRAGMA};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Serialize;
use serde_json::Value;

/// Transport-neutral response produced by the endpoints.
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl EndpointResponse {
    pub fn json(status: StatusCode, body: &impl Serialize) -> Self {
        let body = serde_json::to_value(body).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize response body");
            Value::Object(serde_json::Map::new())
        });
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Token endpoint response; never cached (RFC 6749 §5.1).
    pub fn token(status: StatusCode, body: &impl Serialize) -> Self {
        let mut response = Self::json(status, body);
        response
            .headers
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
            .headers
            .insert(PRAGMA, HeaderValue::from_static("no-cache"));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_response_is_not_cacheable() {
        let response = EndpointResponse::token(StatusCode::OK, &json!({}));
        assert_eq!(response.headers[CACHE_CONTROL], "no-store");
        assert_eq!(response.headers[PRAGMA], "no-cache");
        assert_eq!(response.body, json!({}));
    }
}
