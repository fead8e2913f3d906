//! Per-request trace of cache and network operations.
//!
//! Every archive-cache or catalog-cache lookup is recorded as a span whose
//! URL uses the `internal://` scheme; real network hops keep their
//! `https://` URL. Cache statistics only ever count internal spans, so a
//! trace merged in from a nested call contributes its cache activity without
//! double-counting the transport between the two services.
//!
//! The wire form is `base64(JSON(TraceTree))`, carried in [`TRACE_HEADER`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const TRACE_HEADER: &str = "X-XRay-Trace";
pub const CACHE_STATUS_HEADER: &str = "X-Cache-Status";
pub const INTERNAL_SCHEME: &str = "internal://";

/// One timed cache or network operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSpan {
    pub url: String,
    pub duration_ms: u64,
    pub status_code: u16,
    pub size_bytes: u64,
    pub cached: bool,
}

impl TraceSpan {
    pub fn internal(path: &str, cached: bool, size_bytes: u64, elapsed: Duration) -> Self {
        Self {
            url: format!("{INTERNAL_SCHEME}{path}"),
            duration_ms: elapsed.as_millis() as u64,
            status_code: 200,
            size_bytes,
            cached,
        }
    }

    pub fn network(url: &str, status_code: u16, size_bytes: u64, elapsed: Duration) -> Self {
        Self {
            url: url.to_string(),
            duration_ms: elapsed.as_millis() as u64,
            status_code,
            size_bytes,
            cached: false,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.url.starts_with(INTERNAL_SCHEME)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
}

impl CacheStats {
    pub fn from_spans(spans: &[TraceSpan]) -> Self {
        let (hits, misses) = spans
            .iter()
            .filter(|s| s.is_internal())
            .fold((0, 0), |(h, m), s| if s.cached { (h + 1, m) } else { (h, m + 1) });
        Self {
            hits,
            misses,
            total: hits + misses,
        }
    }

    pub fn status(&self) -> CacheStatus {
        match (self.hits, self.misses) {
            (0, _) => CacheStatus::Miss,
            (_, 0) => CacheStatus::Hit,
            _ => CacheStatus::Partial,
        }
    }
}

/// Per-request classification reported in [`CACHE_STATUS_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
    Partial,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::Partial => "partial",
        }
    }
}

/// Serializable snapshot of a request's spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceTree {
    pub spans: Vec<TraceSpan>,
    pub cache_stats: CacheStats,
    pub total_duration_ms: u64,
}

impl TraceTree {
    pub fn new(spans: Vec<TraceSpan>, total: Duration) -> Self {
        let cache_stats = CacheStats::from_spans(&spans);
        Self {
            spans,
            cache_stats,
            total_duration_ms: total.as_millis() as u64,
        }
    }

    pub fn status(&self) -> CacheStatus {
        self.cache_stats.status()
    }

    /// Encode as a header value.
    pub fn encode(&self) -> String {
        // Serializing plain structs of strings and integers cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// Decode a header value. Whitespace injected by proxies or line folding
    /// is ignored; anything malformed yields `None`.
    pub fn decode(header: &str) -> Option<Self> {
        let compact: String = header.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return None;
        }
        let bytes = match STANDARD.decode(compact.as_bytes()) {
            Ok(b) => b,
            Err(e) => {
                debug!(error = %e, "dropping trace header with invalid base64");
                return None;
            }
        };
        match serde_json::from_slice::<TraceTree>(&bytes) {
            Ok(mut tree) => {
                // Stats are always derived from the spans themselves.
                tree.cache_stats = CacheStats::from_spans(&tree.spans);
                Some(tree)
            }
            Err(e) => {
                debug!(error = %e, "dropping trace header with invalid JSON");
                None
            }
        }
    }
}

/// Request-scoped span sink.
///
/// Cheap to clone; all clones feed the same trace, so a collector can be
/// handed to every task of a fan-out.
#[derive(Debug, Clone)]
pub struct SpanCollector {
    inner: Arc<Mutex<Vec<TraceSpan>>>,
    started: Instant,
}

impl Default for SpanCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SpanCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            started: Instant::now(),
        }
    }

    pub fn add_span(&self, span: TraceSpan) {
        self.inner.lock().push(span);
    }

    pub fn trace(&self) -> TraceTree {
        TraceTree::new(self.inner.lock().clone(), self.started.elapsed())
    }

    /// Fold a nested call's cache activity into this trace.
    ///
    /// Only `internal://` spans are taken; the nested call's own network
    /// hops are already represented by whatever span this side recorded for
    /// the call itself.
    pub fn merge(&self, nested: &TraceTree) {
        let mut spans = self.inner.lock();
        spans.extend(nested.spans.iter().filter(|s| s.is_internal()).cloned());
    }

    /// Decode and merge a header value; malformed input is dropped silently.
    pub fn merge_header(&self, header: &str) -> bool {
        match TraceTree::decode(header) {
            Some(nested) => {
                self.merge(&nested);
                true
            }
            None => false,
        }
    }

    pub fn serialize(&self) -> String {
        self.trace().encode()
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats::from_spans(&self.inner.lock())
    }

    pub fn status(&self) -> CacheStatus {
        self.cache_stats().status()
    }
}
