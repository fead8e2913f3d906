//! Multi-Organization Resolver.
//!
//! A request names a language, a resource kind, one or more variants and an
//! [`OrgSelector`]. Resolution runs in two concurrent phases:
//!
//! 1. every (organization, variant) pair is looked up in the catalog and
//!    turned into zero or more archive [`Target`]s;
//! 2. every target's archive is fetched through the [`ArchiveCache`] and
//!    handed to the extractor.
//!
//! Failures of single pairs or targets are logged and dropped. The call only
//! fails when nothing succeeded, with one aggregate error for the request.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{ArchiveCache, ArchiveKey, CacheEntry, CatalogCache};
use crate::catalog::{variant_candidates, CatalogEntry, CatalogQuery, ResourceKind};
use crate::error::{ResourceError, Result};
use crate::extract::Provenance;
use crate::trace::SpanCollector;

/// Which organizations a request covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OrgSelector {
    All,
    One(String),
    Many(Vec<String>),
}

impl OrgSelector {
    /// Parse a raw parameter: absent, empty or `all` selects everything; a
    /// comma-separated value selects each listed organization.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Self::All;
        };
        if raw.eq_ignore_ascii_case("all") {
            return Self::All;
        }
        if raw.contains(',') {
            return Self::from_names(raw.split(',').map(str::to_string));
        }
        Self::One(raw.to_string())
    }

    /// Normalize a list of names; duplicates and blanks are dropped.
    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        let mut names: Vec<String> = names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty() && seen.insert(n.to_lowercase()))
            .collect();

        if names.iter().any(|n| n.eq_ignore_ascii_case("all")) {
            return Self::All;
        }
        match names.len() {
            0 => Self::All,
            1 => Self::One(names.remove(0)),
            _ => Self::Many(names),
        }
    }

    /// Catalog owner filters, `None` meaning every owner.
    pub fn owners(&self) -> Vec<Option<&str>> {
        match self {
            Self::All => vec![None],
            Self::One(name) => vec![Some(name.as_str())],
            Self::Many(names) => names.iter().map(|n| Some(n.as_str())).collect(),
        }
    }
}

impl fmt::Display for OrgSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all organizations"),
            Self::One(name) => f.write_str(name),
            Self::Many(names) => f.write_str(&names.join(",")),
        }
    }
}

/// One concrete archive to extract from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub key: ArchiveKey,
    pub provenance: Provenance,
}

#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub language: String,
    pub kind: ResourceKind,
    /// Repository codes to resolve. Empty means the kind's own code.
    pub variants: Vec<String>,
    pub organizations: OrgSelector,
    /// What was asked for, used in the aggregate error.
    pub identifier: String,
}

impl ResolveRequest {
    fn variants(&self) -> Vec<String> {
        if self.variants.is_empty() {
            vec![self.kind.code().to_string()]
        } else {
            let mut seen = HashSet::new();
            self.variants
                .iter()
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty() && seen.insert(v.clone()))
                .collect()
        }
    }

    fn describe(&self) -> String {
        format!(
            "{} [{}] ({}, {})",
            self.identifier,
            self.variants().join(","),
            self.language,
            self.organizations
        )
    }
}

pub struct Resolver {
    archives: Arc<ArchiveCache>,
    catalog: CatalogCache,
    default_branch: String,
}

impl Resolver {
    pub fn new(archives: Arc<ArchiveCache>, catalog: CatalogCache, default_branch: impl Into<String>) -> Self {
        Self {
            archives,
            catalog,
            default_branch: default_branch.into(),
        }
    }

    pub fn archives(&self) -> &Arc<ArchiveCache> {
        &self.archives
    }

    /// Resolve, fetch and extract, deduplicating by `key_of`.
    ///
    /// Results arrive in completion order and the first result for a key
    /// wins; callers must not rely on ordering across organizations.
    pub async fn resolve<T, K, F, G>(
        &self,
        request: &ResolveRequest,
        trace: &SpanCollector,
        extract: F,
        key_of: G,
    ) -> Result<Vec<T>>
    where
        T: Send,
        K: Eq + Hash + Send,
        F: Fn(&CacheEntry, &Provenance) -> Result<T> + Send + Sync,
        G: Fn(&T) -> K + Send + Sync,
    {
        let mut failures: Vec<ResourceError> = Vec::new();
        let targets = self.targets(request, trace, &mut failures).await;

        let extract = &extract;
        let mut pending: FuturesUnordered<_> = targets
            .into_iter()
            .map(|target| async move {
                let outcome = match self.archives.get(&target.key, trace).await {
                    Ok(entry) => extract(&entry, &target.provenance),
                    Err(err) => Err(err),
                };
                (target, outcome)
            })
            .collect();

        let mut results: IndexMap<K, T> = IndexMap::new();
        while let Some((target, outcome)) = pending.next().await {
            match outcome {
                Ok(value) => {
                    let key = key_of(&value);
                    if results.contains_key(&key) {
                        debug!(archive = %target.key, "dropping duplicate result");
                    } else {
                        results.insert(key, value);
                    }
                }
                Err(err) => {
                    if matches!(err, ResourceError::Parse { .. }) {
                        warn!(archive = %target.key, error = %err, "unreadable archive content");
                    } else {
                        warn!(archive = %target.key, error = %err, "dropping failed target");
                    }
                    failures.push(err);
                }
            }
        }

        if results.is_empty() {
            return Err(aggregate(request, &failures));
        }
        Ok(results.into_values().collect())
    }

    /// Phase one: turn every (organization, variant) pair into targets.
    pub async fn targets(
        &self,
        request: &ResolveRequest,
        trace: &SpanCollector,
        failures: &mut Vec<ResourceError>,
    ) -> Vec<Target> {
        let variants = request.variants();
        let owners = request.organizations.owners();

        let mut pending: FuturesUnordered<_> = owners
            .iter()
            .flat_map(|owner| variants.iter().map(move |variant| (*owner, variant.as_str())))
            .map(|(owner, variant)| async move {
                let outcome = self.resolve_pair(request, owner, variant, trace).await;
                (owner, variant, outcome)
            })
            .collect();

        let mut targets = Vec::new();
        while let Some((owner, variant, outcome)) = pending.next().await {
            match outcome {
                Ok(found) => targets.extend(found),
                Err(err) => {
                    warn!(
                        org = owner.unwrap_or("*"),
                        variant,
                        language = %request.language,
                        error = %err,
                        "dropping unresolved organization/variant pair"
                    );
                    failures.push(err);
                }
            }
        }
        targets
    }

    async fn resolve_pair(
        &self,
        request: &ResolveRequest,
        owner: Option<&str>,
        variant: &str,
        trace: &SpanCollector,
    ) -> Result<Vec<Target>> {
        let language = request.language.as_str();
        let mut entries: Vec<CatalogEntry> = Vec::new();
        let mut catalog_error = None;

        for subject in request.kind.subjects() {
            let query = CatalogQuery::new(language, subject, owner);
            match self.catalog.search(&query, trace).await {
                Ok(found) => entries.extend(found.iter().cloned()),
                Err(err) => catalog_error = Some(err),
            }
        }

        if entries.is_empty() {
            return match (owner, catalog_error) {
                (Some(owner), Some(ResourceError::Fetch { .. })) => {
                    debug!(org = owner, variant, "catalog unreachable, assuming default layout");
                    Ok(vec![self.fallback_target(owner, language, variant)])
                }
                (_, Some(err)) => Err(err),
                (_, None) => Err(ResourceError::not_found(
                    request.kind.label(),
                    format!("{language}_{variant} ({})", owner.unwrap_or("any organization")),
                )),
            };
        }

        let targets = pick_variants(&entries, language, variant)
            .into_iter()
            .map(|entry| self.target_for(entry, language))
            .collect::<Vec<_>>();

        if targets.is_empty() {
            return Err(ResourceError::not_found(
                request.kind.label(),
                format!("{language}_{variant} ({})", owner.unwrap_or("any organization")),
            ));
        }
        Ok(targets)
    }

    fn target_for(&self, entry: &CatalogEntry, language: &str) -> Target {
        let git_ref = entry
            .branch_or_tag_name
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.default_branch.clone());
        Target {
            key: ArchiveKey::new(&entry.owner, &entry.name, git_ref),
            provenance: Provenance {
                organization: entry.owner.clone(),
                language: language.to_string(),
                code: entry.resource_code().to_ascii_lowercase(),
            },
        }
    }

    fn fallback_target(&self, owner: &str, language: &str, variant: &str) -> Target {
        Target {
            key: ArchiveKey::new(owner, format!("{language}_{variant}"), &self.default_branch),
            provenance: Provenance {
                organization: owner.to_string(),
                language: language.to_string(),
                code: variant.to_string(),
            },
        }
    }
}

/// For each owner present in `entries`, the repository matching the first
/// available code among `variant`'s candidates.
fn pick_variants<'a>(entries: &'a [CatalogEntry], language: &str, variant: &str) -> Vec<&'a CatalogEntry> {
    let mut by_owner: IndexMap<&str, Vec<&CatalogEntry>> = IndexMap::new();
    for entry in entries {
        if entry.language.is_empty() || entry.language.eq_ignore_ascii_case(language) {
            by_owner.entry(entry.owner.as_str()).or_default().push(entry);
        }
    }

    let candidates = variant_candidates(variant);
    by_owner
        .into_values()
        .filter_map(|owned| {
            candidates.iter().find_map(|code| {
                owned
                    .iter()
                    .find(|e| e.resource_code().eq_ignore_ascii_case(code))
                    .copied()
            })
        })
        .collect()
}

fn aggregate(request: &ResolveRequest, failures: &[ResourceError]) -> ResourceError {
    let description = request.describe();
    if failures.is_empty() || failures.iter().all(ResourceError::is_not_found) {
        return ResourceError::not_found(request.kind.label(), description);
    }
    if let Some(timeout) = failures.iter().find(|e| matches!(e, ResourceError::Timeout(_))) {
        return timeout.clone();
    }
    let status = failures.iter().find_map(|e| match e {
        ResourceError::Fetch { status, .. } => *status,
        _ => None,
    });
    let reasons: Vec<String> = failures
        .iter()
        .filter(|e| !e.is_not_found())
        .map(ToString::to_string)
        .collect();
    ResourceError::fetch(description, status, reasons.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_parsing() {
        assert_eq!(OrgSelector::parse(None), OrgSelector::All);
        assert_eq!(OrgSelector::parse(Some("  ")), OrgSelector::All);
        assert_eq!(OrgSelector::parse(Some("ALL")), OrgSelector::All);
        assert_eq!(
            OrgSelector::parse(Some("unfoldingWord")),
            OrgSelector::One("unfoldingWord".into())
        );
        assert_eq!(
            OrgSelector::parse(Some("A, B,,a")),
            OrgSelector::Many(vec!["A".into(), "B".into()])
        );
        assert_eq!(OrgSelector::parse(Some("A,")), OrgSelector::One("A".into()));
    }

    #[test]
    fn owners_expand_selector() {
        assert_eq!(OrgSelector::All.owners(), vec![None]);
        assert_eq!(
            OrgSelector::Many(vec!["A".into(), "B".into()]).owners(),
            vec![Some("A"), Some("B")]
        );
    }

    fn entry(owner: &str, name: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.into(),
            owner: owner.into(),
            language: "en".into(),
            subject: "Aligned Bible".into(),
            branch_or_tag_name: Some("v1".into()),
        }
    }

    #[test]
    fn variants_fall_back_within_family_per_owner() {
        let entries = vec![
            entry("A", "en_ult"),
            entry("A", "en_ust"),
            entry("B", "en_glt"),
            entry("C", "en_ulb"),
        ];
        let picked: Vec<&str> = pick_variants(&entries, "en", "ult")
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(picked, ["en_ult", "en_glt"]);

        let glt: Vec<&str> = pick_variants(&entries, "en", "glt")
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(glt, ["en_ult", "en_glt"]);
    }

    #[test]
    fn aggregate_prefers_fetch_errors_over_absence() {
        let request = ResolveRequest {
            language: "en".into(),
            kind: ResourceKind::Notes,
            variants: vec![],
            organizations: OrgSelector::All,
            identifier: "Titus 1:1".into(),
        };
        let absent = aggregate(&request, &[ResourceError::not_found("x", "y")]);
        assert!(absent.is_not_found());
        assert!(absent.to_string().contains("Titus 1:1"));

        let mixed = aggregate(
            &request,
            &[
                ResourceError::not_found("x", "y"),
                ResourceError::fetch("https://example.org", Some(502), "HTTP 502"),
            ],
        );
        assert!(matches!(mixed, ResourceError::Fetch { status: Some(502), .. }));
    }
}
