//! Cross-origin headers for the token endpoint.

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ORIGIN,
};
use http::{HeaderMap, HeaderValue, Method};
use tracing::warn;

use crate::models::provider::origin_triple;

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS, PUT, PATCH, DELETE";

/// Echoes the request origin when it shares scheme, host and port with one
/// of `allowed`. Preflights accept any origin.
pub fn cors_allow(
    request_headers: &HeaderMap,
    method: &Method,
    response_headers: &mut HeaderMap,
    allowed: &[String],
) {
    let Some(origin) = request_headers.get(ORIGIN) else {
        return;
    };

    let permitted = *method == Method::OPTIONS
        || origin
            .to_str()
            .ok()
            .and_then(origin_triple)
            .is_some_and(|received| {
                allowed
                    .iter()
                    .filter_map(|uri| origin_triple(uri))
                    .any(|candidate| candidate == received)
            });

    if !permitted {
        warn!(origin = ?origin, "CORS: Origin is not an allowed origin");
        return;
    }

    response_headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    response_headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );

    if *method == Method::OPTIONS {
        if let Some(requested) = request_headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
            response_headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }
        response_headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
    }
}
