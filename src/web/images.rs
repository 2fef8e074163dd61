use std::time::SystemTime;

use axum::body::Body;
use axum::http::header::{
    CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use axum::http::response::Builder;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};
use httpdate::{fmt_http_date, parse_http_date};

use crate::constants::IMAGE_CACHE_CONTROL;
use crate::error::ComicError;

/// Cache headers for a rendered image. Images only change when the run is rendered again.
#[derive(Clone, Debug)]
pub(crate) struct ImageCacheHeaders {
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
    modified_at: SystemTime,
}

impl ImageCacheHeaders {
    /// `name` identifies the image within the run, eg `panel_2` or `comic`.
    pub(crate) fn for_render(run_id: &str, name: &str, rendered_at: DateTime<Utc>) -> Self {
        let modified_at = SystemTime::from(rendered_at);
        let etag = HeaderValue::from_str(&format!(
            "W/\"{}-{}-{}\"",
            run_id,
            name,
            rendered_at.timestamp_millis()
        ))
        .ok();
        let last_modified = HeaderValue::from_str(&fmt_http_date(modified_at)).ok();
        Self {
            etag,
            last_modified,
            modified_at,
        }
    }

    pub(crate) fn etag(&self) -> Option<&HeaderValue> {
        self.etag.as_ref()
    }

    pub(crate) fn last_modified(&self) -> Option<&HeaderValue> {
        self.last_modified.as_ref()
    }
}

/// Applies image cache headers to a response builder.
pub(crate) fn apply_cache_headers(mut builder: Builder, cache: &ImageCacheHeaders) -> Builder {
    builder = builder.header(CACHE_CONTROL, IMAGE_CACHE_CONTROL.as_str());
    if let Some(etag) = cache.etag() {
        builder = builder.header(ETAG, etag.clone());
    }
    if let Some(last_modified) = cache.last_modified() {
        builder = builder.header(LAST_MODIFIED, last_modified.clone());
    }
    builder
}

/// Returns true when the request matches a not-modified response.
pub(crate) fn is_not_modified(headers: &HeaderMap, cache: &ImageCacheHeaders) -> bool {
    if let Some(if_none_match) = headers.get(IF_NONE_MATCH) {
        if let Ok(value) = if_none_match.to_str() {
            let value = value.trim();
            if value == "*" {
                return true;
            }
            if let Some(etag) = cache.etag().and_then(|value| value.to_str().ok())
                && value.split(',').any(|candidate| candidate.trim() == etag)
            {
                return true;
            }
        }
        return false;
    }

    // http dates have whole-second precision
    if let Some(if_modified_since) = headers.get(IF_MODIFIED_SINCE)
        && let Ok(value) = if_modified_since.to_str()
        && let Ok(since) = parse_http_date(value)
        && let Ok(modified) = parse_http_date(&fmt_http_date(cache.modified_at))
        && modified <= since
    {
        return true;
    }

    false
}

/// Builds a 304 response that preserves cache headers.
pub(crate) fn not_modified_response(cache: &ImageCacheHeaders) -> Result<Response, ComicError> {
    let builder = Response::builder().status(StatusCode::NOT_MODIFIED);
    let builder = apply_cache_headers(builder, cache);
    builder.body(Body::empty()).map_err(ComicError::from)
}

/// A PNG download, or a 304 if the client already has it.
pub(crate) fn png_download(
    headers: &HeaderMap,
    cache: &ImageCacheHeaders,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<Response, ComicError> {
    if is_not_modified(headers, cache) {
        return not_modified_response(cache);
    }
    let builder = Response::builder()
        .header(CONTENT_TYPE, "image/png")
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        );
    apply_cache_headers(builder, cache)
        .body(Body::from(bytes))
        .map_err(ComicError::from)
}
