//! Conditional requests and cache headers.
//!
//! When a cache time is configured, every response produced here carries:
//!
//! - `Cache-Control: public,max-age={seconds until expiry}`
//! - `Date: {now}`
//! - `Last-Modified: {source modification time}`
//! - `Expires: {now + cache time}`
//!
//! A request whose `If-Modified-Since` equals the source modification time
//! (to the second) is answered with `304 Not Modified` without touching the
//! image service. Only exact equality counts: an `If-Modified-Since` later
//! than the modification time still gets a full response.

use axum::{
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::ImageError;
use crate::imaging::{ImageService, QueryParams};
use crate::time::{format_http_date, format_timestamp, parse_http_date, CacheTime};

/// Serve a matched request, answering conditional requests when enabled.
///
/// Errors from the image service are returned as is.
pub async fn respond(
    service: &dyn ImageService,
    parts: &Parts,
    path: &str,
    params: &QueryParams,
    cache_time: Option<&CacheTime>,
) -> Result<Response, ImageError> {
    let Some(cache_time) = cache_time else {
        return service.image_response(path, params).await;
    };

    let source_path = service.source_path(path)?;
    let modified_time = service.source_timestamp(&source_path).await?;
    let now = Utc::now();

    if is_not_modified(&parts.headers, modified_time) {
        debug!(path = path, modified_time, "Source not modified");
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        apply_cache_headers(&mut response, cache_time, Some(modified_time), now);
        return Ok(response);
    }

    let mut response = service.image_response(path, params).await?;
    apply_cache_headers(&mut response, cache_time, Some(modified_time), now);
    Ok(response)
}

/// Whether `If-Modified-Since` names exactly `modified_time`.
///
/// A missing or unparsable header means "modified".
pub fn is_not_modified(headers: &HeaderMap, modified_time: i64) -> bool {
    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_http_date)
        .is_some_and(|since| since == modified_time)
}

/// Set `Cache-Control`, `Date`, `Last-Modified` and `Expires` on `response`.
///
/// `Last-Modified` is left out when `modified_time` is `None`.
pub fn apply_cache_headers(
    response: &mut Response,
    cache_time: &CacheTime,
    modified_time: Option<i64>,
    now: DateTime<Utc>,
) {
    let expires_at = cache_time.expires_at(now);
    let max_age = cache_time.max_age(now);
    let headers = response.headers_mut();

    set_header(
        headers,
        header::CACHE_CONTROL,
        format!("public,max-age={}", max_age),
    );
    set_header(headers, header::DATE, format_http_date(now));
    if let Some(last_modified) = modified_time.and_then(format_timestamp) {
        set_header(headers, header::LAST_MODIFIED, last_modified);
    }
    set_header(headers, header::EXPIRES, format_http_date(expires_at));
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(name, value);
    }
}
