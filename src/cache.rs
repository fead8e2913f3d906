//! Process-wide caches for archive bytes and catalog lookups.
//!
//! Eviction policy for archives: bounded by total archive bytes
//! (`capacity_bytes`, weighed per entry) with a fixed time-to-live, both
//! enforced by moka's TinyLFU admission and LRU eviction. `refresh` drops a
//! single key explicitly.
//!
//! Downloads are single-flighted per [`ArchiveKey`]. The download itself runs
//! in a spawned task that populates the cache on success, and callers only
//! await a shared handle to it, so a caller that times out or is dropped
//! never cancels a download other requests are waiting on.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogEntry, CatalogQuery, CatalogSource, Fetched};
use crate::error::{ResourceError, Result};
use crate::trace::{SpanCollector, TraceSpan};

/// Sole index of the archive cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArchiveKey {
    pub organization: String,
    pub repository: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

impl ArchiveKey {
    pub fn new(
        organization: impl Into<String>,
        repository: impl Into<String>,
        git_ref: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            repository: repository.into(),
            git_ref: git_ref.into(),
        }
    }

    pub fn cache_path(&self) -> String {
        format!(
            "archive/{}/{}/{}",
            self.organization, self.repository, self.git_ref
        )
    }
}

impl fmt::Display for ArchiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.organization, self.repository, self.git_ref)
    }
}

/// Raw archive bytes held by the cache.
#[derive(Debug)]
pub struct CacheEntry {
    pub key: ArchiveKey,
    pub bytes: Bytes,
    pub fetched_at: DateTime<Utc>,
    hits: AtomicU64,
}

impl CacheEntry {
    fn new(key: ArchiveKey, bytes: Bytes) -> Self {
        Self {
            key,
            bytes,
            fetched_at: Utc::now(),
            hits: AtomicU64::new(0),
        }
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub capacity_bytes: u64,
    pub ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            capacity_bytes: 512 * 1024 * 1024,
            ttl: Duration::from_secs(3600),
        }
    }
}

type Download = Shared<BoxFuture<'static, Result<Arc<CacheEntry>>>>;

enum Lookup {
    Cached,
    Pending(Download),
}

/// Maps an [`ArchiveKey`] to archive bytes, downloading on miss.
pub struct ArchiveCache {
    source: Arc<dyn CatalogSource>,
    entries: Cache<ArchiveKey, Arc<CacheEntry>>,
    in_flight: Arc<Mutex<HashMap<ArchiveKey, Download>>>,
}

impl ArchiveCache {
    pub fn new(source: Arc<dyn CatalogSource>, policy: CachePolicy) -> Self {
        let entries = Cache::builder()
            .max_capacity(policy.capacity_bytes)
            .weigher(|_key: &ArchiveKey, entry: &Arc<CacheEntry>| -> u32 {
                u32::try_from(entry.bytes.len()).unwrap_or(u32::MAX)
            })
            .time_to_live(policy.ttl)
            .eviction_listener(|key, _entry, cause| {
                debug!(archive = %key, ?cause, "archive evicted");
            })
            .build();

        Self {
            source,
            entries,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the archive for `key`, downloading it if absent.
    ///
    /// Records one `internal://archive/...` span (hit or miss) and, for the
    /// caller that starts a download, one network span for the transfer.
    pub async fn get(&self, key: &ArchiveKey, trace: &SpanCollector) -> Result<Arc<CacheEntry>> {
        let started = Instant::now();

        loop {
            if let Some(entry) = self.entries.get(key).await {
                entry.hits.fetch_add(1, Ordering::Relaxed);
                trace.add_span(TraceSpan::internal(
                    &key.cache_path(),
                    true,
                    entry.bytes.len() as u64,
                    started.elapsed(),
                ));
                return Ok(entry);
            }

            let download = match self.join_or_start(key, trace) {
                Lookup::Cached => continue,
                Lookup::Pending(download) => download,
            };

            let result = download.await;
            let size = result.as_ref().map(|e| e.bytes.len() as u64).unwrap_or(0);
            trace.add_span(TraceSpan::internal(
                &key.cache_path(),
                false,
                size,
                started.elapsed(),
            ));
            return result;
        }
    }

    fn join_or_start(&self, key: &ArchiveKey, trace: &SpanCollector) -> Lookup {
        let mut in_flight = self.in_flight.lock();

        if let Some(existing) = in_flight.get(key) {
            debug!(archive = %key, "joining in-flight download");
            return Lookup::Pending(existing.clone());
        }
        // A download may have finished between the cache probe and the lock.
        if self.entries.contains_key(key) {
            return Lookup::Cached;
        }

        let source = Arc::clone(&self.source);
        let entries = self.entries.clone();
        let registry = Arc::clone(&self.in_flight);
        let owned_key = key.clone();
        let trace = trace.clone();

        let task = tokio::spawn(async move {
            let result = download(source.as_ref(), &owned_key, &trace).await;
            if let Ok(entry) = &result {
                entries.insert(owned_key.clone(), Arc::clone(entry)).await;
            }
            registry.lock().remove(&owned_key);
            result
        });

        let join_key = key.clone();
        let download = async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) => Err(ResourceError::fetch(
                    join_key.to_string(),
                    None,
                    format!("download task failed: {join_error}"),
                )),
            }
        }
        .boxed()
        .shared();

        in_flight.insert(key.clone(), download.clone());
        Lookup::Pending(download)
    }

    /// Drop `key` so the next `get` downloads it again.
    pub async fn refresh(&self, key: &ArchiveKey) {
        self.entries.invalidate(key).await;
    }

    pub async fn peek(&self, key: &ArchiveKey) -> Option<Arc<CacheEntry>> {
        self.entries.get(key).await
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn weighted_size(&self) -> u64 {
        self.entries.weighted_size()
    }

    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }
}

async fn download(
    source: &dyn CatalogSource,
    key: &ArchiveKey,
    trace: &SpanCollector,
) -> Result<Arc<CacheEntry>> {
    let started = Instant::now();
    let outcome = source.fetch_archive(key).await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(Fetched { url, status, bytes }) => {
            trace.add_span(TraceSpan::network(&url, status, bytes.len() as u64, elapsed));
            info!(
                archive = %key,
                size_bytes = bytes.len(),
                duration_ms = elapsed.as_millis() as u64,
                "archive downloaded"
            );
            Ok(Arc::new(CacheEntry::new(key.clone(), bytes)))
        }
        Err(err) => {
            let (url, status) = match &err {
                ResourceError::Fetch { url, status, .. } => (url.clone(), status.unwrap_or(0)),
                _ => (format!("{}/{}", source.base_url(), key.cache_path()), 0),
            };
            trace.add_span(TraceSpan::network(&url, status, 0, elapsed));
            warn!(archive = %key, error = %err, "archive download failed");
            Err(err)
        }
    }
}

/// TTL cache in front of catalog search.
pub struct CatalogCache {
    source: Arc<dyn CatalogSource>,
    entries: Cache<CatalogQuery, Arc<Vec<CatalogEntry>>>,
}

impl CatalogCache {
    pub fn new(source: Arc<dyn CatalogSource>, ttl: Duration) -> Self {
        Self {
            source,
            entries: Cache::builder()
                .max_capacity(4096)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Concurrent misses for the same query share one catalog request.
    pub async fn search(
        &self,
        query: &CatalogQuery,
        trace: &SpanCollector,
    ) -> Result<Arc<Vec<CatalogEntry>>> {
        let started = Instant::now();
        let path = query.cache_path();

        if let Some(hit) = self.entries.get(query).await {
            trace.add_span(TraceSpan::internal(&path, true, hit.len() as u64, started.elapsed()));
            return Ok(hit);
        }

        let source = Arc::clone(&self.source);
        let network_trace = trace.clone();
        let owned = query.clone();
        let result = self
            .entries
            .try_get_with(query.clone(), async move {
                let requested = Instant::now();
                let url = format!("{}/api/v1/catalog/search/{}", source.base_url(), owned.cache_path());
                match source.search(&owned).await {
                    Ok(entries) => {
                        network_trace.add_span(TraceSpan::network(
                            &url,
                            200,
                            entries.len() as u64,
                            requested.elapsed(),
                        ));
                        Ok(Arc::new(entries))
                    }
                    Err(err) => {
                        let status = match &err {
                            ResourceError::Fetch { status, .. } => status.unwrap_or(0),
                            _ => 0,
                        };
                        network_trace.add_span(TraceSpan::network(&url, status, 0, requested.elapsed()));
                        Err(err)
                    }
                }
            })
            .await
            .map_err(|shared: Arc<ResourceError>| (*shared).clone());

        let size = result.as_ref().map(|r| r.len() as u64).unwrap_or(0);
        trace.add_span(TraceSpan::internal(&path, false, size, started.elapsed()));
        result
    }
}
