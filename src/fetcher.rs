//! Unified Fetcher: parse → resolve → extract → assemble.
//!
//! The only entry point the REST and MCP layers use. Every operation takes
//! the request's [`SpanCollector`] and is bounded by the request timeout; a
//! timed-out request abandons its own work but never a shared download.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{ArchiveCache, ArchiveKey, CachePolicy, CatalogCache};
use crate::catalog::{CatalogSource, HttpCatalog, LanguageEntry, ResourceKind};
use crate::error::{ResourceError, Result};
use crate::extract::markdown::{self as md, ArticleId, MarkdownArticle};
use crate::extract::{self, AnnotationRow, ArchiveReader, ScriptureOptions, ScriptureResult};
use crate::reference::Reference;
use crate::resolver::{OrgSelector, ResolveRequest, Resolver};
use crate::trace::{SpanCollector, TraceSpan};

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub cache: CachePolicy,
    pub catalog_ttl: Duration,
    pub default_branch: String,
    pub timeout: Duration,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            cache: CachePolicy::default(),
            catalog_ttl: Duration::from_secs(300),
            default_branch: "master".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// A dictionary article together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordArticle {
    pub term: String,
    pub organization: String,
    #[serde(flatten)]
    pub article: MarkdownArticle,
}

pub struct UnifiedFetcher {
    source: Arc<dyn CatalogSource>,
    resolver: Resolver,
    default_branch: String,
    timeout: Duration,
}

impl UnifiedFetcher {
    pub fn new(source: Arc<dyn CatalogSource>, settings: FetcherSettings) -> Self {
        let archives = Arc::new(ArchiveCache::new(Arc::clone(&source), settings.cache));
        let catalog = CatalogCache::new(Arc::clone(&source), settings.catalog_ttl);
        Self {
            resolver: Resolver::new(archives, catalog, settings.default_branch.clone()),
            source,
            default_branch: settings.default_branch,
            timeout: settings.timeout,
        }
    }

    /// Fetcher backed by the remote catalog at `base_url`.
    pub fn http(base_url: &str, settings: FetcherSettings) -> Result<Self> {
        let catalog = HttpCatalog::new(base_url, settings.timeout)?;
        Ok(Self::new(Arc::new(catalog), settings))
    }

    pub fn archives(&self) -> &Arc<ArchiveCache> {
        self.resolver.archives()
    }

    async fn bounded<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(ResourceError::Timeout(self.timeout.as_secs())),
        }
    }

    /// Scripture text per resolved translation, one result per translation.
    pub async fn fetch_scripture(
        &self,
        reference: &str,
        language: &str,
        organizations: &OrgSelector,
        variants: &[String],
        options: ScriptureOptions,
        trace: &SpanCollector,
    ) -> Result<Vec<ScriptureResult>> {
        let reference = Reference::parse(reference)?;
        let variants = if variants.is_empty() {
            vec!["ult".to_string()]
        } else {
            variants.to_vec()
        };
        let request = ResolveRequest {
            language: language.to_string(),
            kind: ResourceKind::Scripture,
            variants,
            organizations: organizations.clone(),
            identifier: reference.to_string(),
        };

        let results = self
            .bounded(self.resolver.resolve(
                &request,
                trace,
                |entry, source| extract::scripture(entry, &reference, source, options),
                |result: &ScriptureResult| result.translation.clone(),
            ))
            .await?;
        info!(reference = %reference, results = results.len(), "scripture fetched");
        Ok(results)
    }

    /// Annotation rows for `reference` from notes, questions or word links.
    pub async fn fetch_annotations(
        &self,
        reference: &str,
        language: &str,
        organizations: &OrgSelector,
        kind: ResourceKind,
        include_intro: bool,
        trace: &SpanCollector,
    ) -> Result<Vec<AnnotationRow>> {
        if !matches!(
            kind,
            ResourceKind::Notes | ResourceKind::Questions | ResourceKind::WordLinks
        ) {
            return Err(ResourceError::not_found("annotation table", kind.label()));
        }
        let reference = Reference::parse(reference)?;
        let request = ResolveRequest {
            language: language.to_string(),
            kind,
            variants: Vec::new(),
            organizations: organizations.clone(),
            identifier: reference.to_string(),
        };

        let tables = self
            .bounded(self.resolver.resolve(
                &request,
                trace,
                |entry, source| {
                    extract::annotations(entry, &reference, kind, include_intro)
                        .map(|rows| (source.organization.clone(), rows))
                },
                |(organization, _): &(String, Vec<AnnotationRow>)| organization.clone(),
            ))
            .await?;

        let rows: Vec<AnnotationRow> = tables.into_iter().flat_map(|(_, rows)| rows).collect();
        debug!(reference = %reference, kind = %kind, rows = rows.len(), "annotations fetched");
        Ok(rows)
    }

    /// A dictionary or training article. Without an identifier, the
    /// archive's table of contents.
    pub async fn fetch_markdown(
        &self,
        language: &str,
        organizations: &OrgSelector,
        kind: ResourceKind,
        identifier: Option<&str>,
        trace: &SpanCollector,
    ) -> Result<MarkdownArticle> {
        if !matches!(kind, ResourceKind::Words | ResourceKind::Academy) {
            return Err(ResourceError::not_found("article collection", kind.label()));
        }
        let words = kind == ResourceKind::Words;
        let id = identifier
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .map(|i| match ArticleId::parse(i) {
                ArticleId::Search { id, .. } if words => ArticleId::word(&id, None),
                parsed => parsed,
            });

        let request = ResolveRequest {
            language: language.to_string(),
            kind,
            variants: Vec::new(),
            organizations: organizations.clone(),
            identifier: id
                .as_ref()
                .map(ArticleId::describe)
                .unwrap_or_else(|| "table of contents".to_string()),
        };

        let resolved = self
            .bounded(self.resolver.resolve(
                &request,
                trace,
                |entry, source| {
                    let article = match &id {
                        Some(id) => extract::markdown(entry, id)?,
                        None => md::table_of_contents(&ArchiveReader::open(entry)?, words),
                    };
                    Ok((source.organization.clone(), article))
                },
                |(organization, article): &(String, MarkdownArticle)| {
                    (article.path.clone(), organization.clone())
                },
            ))
            .await;

        match (resolved, &id, organizations) {
            (Ok(found), _, _) => found
                .into_iter()
                .next()
                .map(|(_, article)| article)
                .ok_or_else(|| ResourceError::not_found(kind.label(), request.identifier.clone())),
            (Err(ResourceError::Fetch { .. }), Some(ArticleId::Path(path)), OrgSelector::One(org))
                if path.ends_with(".md") =>
            {
                let key = ArchiveKey::new(org, format!("{language}_{}", kind.code()), &self.default_branch);
                self.bounded(self.raw_article(&key, path, trace)).await
            }
            (Err(err), _, _) => Err(err),
        }
    }

    /// Single-file download used when the archive itself is unavailable.
    async fn raw_article(&self, key: &ArchiveKey, path: &str, trace: &SpanCollector) -> Result<MarkdownArticle> {
        let started = Instant::now();
        match self.source.fetch_raw(key, path).await {
            Ok(fetched) => {
                trace.add_span(TraceSpan::network(
                    &fetched.url,
                    fetched.status,
                    fetched.bytes.len() as u64,
                    started.elapsed(),
                ));
                let content = String::from_utf8(fetched.bytes.to_vec())
                    .map_err(|e| ResourceError::parse(path, e.to_string()))?;
                info!(archive = %key, path, "served article from raw file");
                Ok(MarkdownArticle {
                    title: md::first_heading(&content),
                    content,
                    path: path.to_string(),
                })
            }
            Err(err) => {
                warn!(archive = %key, path, error = %err, "raw file fallback failed");
                Err(err)
            }
        }
    }

    /// Dictionary entries for `term`, one per organization that has it.
    pub async fn fetch_word(
        &self,
        term: &str,
        category: Option<&str>,
        language: &str,
        organizations: &OrgSelector,
        trace: &SpanCollector,
    ) -> Result<Vec<WordArticle>> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Err(ResourceError::not_found("translation word", "empty term"));
        }
        let id = ArticleId::word(&term, category.map(str::trim).filter(|c| !c.is_empty()));
        self.bounded(self.words(&[(term, id)], language, organizations, trace))
            .await
    }

    /// Dictionary entries linked from the word-link rows of `reference`.
    ///
    /// The link lookup is traced under its own collector and merged into
    /// `trace` afterwards, the same way a downstream service's trace would be.
    /// Both phases share one deadline.
    pub async fn fetch_words_for_reference(
        &self,
        reference: &str,
        language: &str,
        organizations: &OrgSelector,
        trace: &SpanCollector,
    ) -> Result<Vec<WordArticle>> {
        self.bounded(self.linked_words(reference, language, organizations, trace))
            .await
    }

    async fn linked_words(
        &self,
        reference: &str,
        language: &str,
        organizations: &OrgSelector,
        trace: &SpanCollector,
    ) -> Result<Vec<WordArticle>> {
        let nested = SpanCollector::new();
        let links = self
            .fetch_annotations(
                reference,
                language,
                organizations,
                ResourceKind::WordLinks,
                false,
                &nested,
            )
            .await;
        trace.merge(&nested.trace());
        let links = links?;

        let mut seen = HashSet::new();
        let wanted: Vec<(String, ArticleId)> = links
            .iter()
            .filter_map(|row| row.get("TWLink"))
            .filter_map(md::rc_link_path)
            .filter(|path| seen.insert(path.clone()))
            .map(|path| {
                let term = path
                    .rsplit('/')
                    .next()
                    .unwrap_or(&path)
                    .trim_end_matches(".md")
                    .to_string();
                (term, ArticleId::Path(path))
            })
            .collect();

        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        self.words(&wanted, language, organizations, trace).await
    }

    async fn words(
        &self,
        wanted: &[(String, ArticleId)],
        language: &str,
        organizations: &OrgSelector,
        trace: &SpanCollector,
    ) -> Result<Vec<WordArticle>> {
        let lookups = wanted.iter().map(|(term, id)| async move {
            let request = ResolveRequest {
                language: language.to_string(),
                kind: ResourceKind::Words,
                variants: Vec::new(),
                organizations: organizations.clone(),
                identifier: id.describe(),
            };
            self.resolver
                .resolve(
                    &request,
                    trace,
                    |entry, source| {
                        Ok(WordArticle {
                            term: term.clone(),
                            organization: source.organization.clone(),
                            article: extract::markdown(entry, id)?,
                        })
                    },
                    |word: &WordArticle| (word.term.clone(), word.organization.clone()),
                )
                .await
        });

        let mut articles = Vec::new();
        let mut last_error = None;
        for outcome in join_all(lookups).await {
            match outcome {
                Ok(found) => articles.extend(found),
                Err(err) => {
                    debug!(error = %err, "translation word unavailable");
                    last_error = Some(err);
                }
            }
        }

        match (articles.is_empty(), last_error) {
            (true, Some(err)) => Err(err),
            _ => Ok(articles),
        }
    }

    /// Languages the catalog publishes content in.
    pub async fn list_languages(
        &self,
        organization: Option<&str>,
        trace: &SpanCollector,
    ) -> Result<Vec<LanguageEntry>> {
        let started = Instant::now();
        let url = format!("{}/api/v1/catalog/list/languages", self.source.base_url());
        let outcome = self.bounded(self.source.list_languages(organization)).await;
        let (status, size) = match &outcome {
            Ok(languages) => (200, languages.len() as u64),
            Err(ResourceError::Fetch { status, .. }) => (status.unwrap_or(0), 0),
            Err(_) => (0, 0),
        };
        trace.add_span(TraceSpan::network(&url, status, size, started.elapsed()));
        outcome
    }
}
