//! Hardened outbound header set.
//!
//! Every request the gateway dispatches carries the same defensive header
//! block: no-store caching, content-type/frame/XSS hardening, restrictive
//! referrer and permissions policies, plus the bound bearer credential and the
//! current anti-forgery token when present.

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE,
};

pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Build the hardened header block for one outbound request.
///
/// Caller-supplied values that are not valid header values are skipped with a
/// warning rather than sent mangled.
pub fn hardened_headers(bearer: Option<&str>, csrf_token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("x-xss-protection"),
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );

    if let Some(token) = bearer {
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("bearer credential is not a valid header value, omitted"),
        }
    }
    if let Some(token) = csrf_token {
        match HeaderValue::from_str(token) {
            Ok(value) => {
                headers.insert(HeaderName::from_static("x-csrf-token"), value);
            }
            Err(_) => tracing::warn!("anti-forgery token is not a valid header value, omitted"),
        }
    }

    headers
}
