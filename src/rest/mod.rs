//! REST facade over the [`UnifiedFetcher`].
//!
//! Every data endpoint answers with `cacheStats` in its JSON body and the
//! request's trace in `X-XRay-Trace` / `X-Cache-Status`, on errors too.

pub mod endpoints;
pub mod error;

use std::sync::Arc;
use std::time::Instant;

use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::fetcher::UnifiedFetcher;
use crate::trace::SpanCollector;

pub use error::{ApiError, ErrorResponse};

/// `X-XRay-Trace`, in the lower-case form the `http` crate stores.
pub const TRACE_HEADER_NAME: HeaderName = HeaderName::from_static("x-xray-trace");
/// `X-Cache-Status`.
pub const CACHE_STATUS_HEADER_NAME: HeaderName = HeaderName::from_static("x-cache-status");

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<UnifiedFetcher>,
    pub started: Instant,
}

impl AppState {
    pub fn new(fetcher: Arc<UnifiedFetcher>) -> Self {
        Self {
            fetcher,
            started: Instant::now(),
        }
    }
}

/// Build the REST router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(endpoints::health))
        .route("/api/fetch-scripture", get(endpoints::fetch_scripture))
        .route("/api/translation-notes", get(endpoints::translation_notes))
        .route("/api/translation-questions", get(endpoints::translation_questions))
        .route(
            "/api/fetch-translation-word-links",
            get(endpoints::translation_word_links),
        )
        .route("/api/fetch-translation-word", get(endpoints::translation_word))
        .route(
            "/api/fetch-translation-academy",
            get(endpoints::translation_academy),
        )
        .route("/api/list-languages", get(endpoints::list_languages))
        .with_state(state)
}

/// Write `trace` into response headers.
pub fn attach_trace(headers: &mut HeaderMap, trace: &SpanCollector) {
    let tree = trace.trace();
    if let Ok(value) = HeaderValue::from_str(&tree.encode()) {
        headers.insert(TRACE_HEADER_NAME, value);
    }
    headers.insert(
        CACHE_STATUS_HEADER_NAME,
        HeaderValue::from_static(tree.status().as_str()),
    );
}

/// A JSON result carried together with the request's trace.
pub struct Traced {
    trace: SpanCollector,
    body: Result<Value, ApiError>,
}

impl Traced {
    pub fn new(trace: SpanCollector, body: Result<Value, ApiError>) -> Self {
        Self { trace, body }
    }
}

impl IntoResponse for Traced {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Ok(mut body) => {
                if let Value::Object(map) = &mut body {
                    if let Ok(stats) = serde_json::to_value(self.trace.cache_stats()) {
                        map.insert("cacheStats".to_string(), stats);
                    }
                }
                Json(body).into_response()
            }
            Err(err) => {
                tracing::debug!(status = %err.status(), error = %err, "request failed");
                err.into_response()
            }
        };
        attach_trace(response.headers_mut(), &self.trace);
        response
    }
}
