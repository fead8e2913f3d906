//! Remote content catalog: archive downloads, raw files, and catalog search.
//!
//! [`CatalogSource`] is the only seam that performs network I/O. The
//! production implementation is [`HttpCatalog`]; tests use
//! [`crate::testing::MockCatalog`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::ArchiveKey;
use crate::error::{ResourceError, Result};

/// A downloaded body plus what the transport reported about it.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: String,
    pub status: u16,
    pub bytes: Bytes,
}

/// One repository entry returned by catalog search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Repository name, e.g. `en_ult`.
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub subject: String,
    /// Release tag or branch the catalog publishes for this repository.
    #[serde(default)]
    pub branch_or_tag_name: Option<String>,
}

impl CatalogEntry {
    /// Resource code from the repository name: `en_ult` → `ult`.
    pub fn resource_code(&self) -> &str {
        self.name
            .rsplit_once('_')
            .map(|(_, code)| code)
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageEntry {
    #[serde(rename = "lc")]
    pub code: String,
    #[serde(rename = "ln", default)]
    pub name: String,
    #[serde(rename = "ang", default, skip_serializing_if = "Option::is_none")]
    pub anglicized: Option<String>,
}

/// Catalog search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogQuery {
    pub language: String,
    pub subject: String,
    pub owner: Option<String>,
}

impl CatalogQuery {
    pub fn new(language: &str, subject: &str, owner: Option<&str>) -> Self {
        Self {
            language: language.to_string(),
            subject: subject.to_string(),
            owner: owner.map(str::to_string),
        }
    }

    /// Stable path used for cache keys and trace spans.
    pub fn cache_path(&self) -> String {
        format!(
            "catalog/{}/{}/{}",
            self.owner.as_deref().unwrap_or("*"),
            self.language,
            self.subject.replace(' ', "-").to_lowercase()
        )
    }
}

/// Kinds of content the server knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Scripture,
    Notes,
    Questions,
    WordLinks,
    Words,
    Academy,
}

impl ResourceKind {
    /// Catalog subjects a repository of this kind may be published under.
    pub fn subjects(&self) -> &'static [&'static str] {
        match self {
            Self::Scripture => &["Aligned Bible", "Bible"],
            Self::Notes => &["TSV Translation Notes"],
            Self::Questions => &["TSV Translation Questions"],
            Self::WordLinks => &["TSV Translation Words Links"],
            Self::Words => &["Translation Words"],
            Self::Academy => &["Translation Academy"],
        }
    }

    /// Repository code for the non-scripture kinds.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Scripture => "ult",
            Self::Notes => "tn",
            Self::Questions => "tq",
            Self::WordLinks => "twl",
            Self::Words => "tw",
            Self::Academy => "ta",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Scripture => "scripture",
            Self::Notes => "translation notes",
            Self::Questions => "translation questions",
            Self::WordLinks => "translation word links",
            Self::Words => "translation words",
            Self::Academy => "translation academy",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResourceKind {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scripture" | "bible" => Ok(Self::Scripture),
            "tn" | "notes" => Ok(Self::Notes),
            "tq" | "questions" => Ok(Self::Questions),
            "twl" | "word-links" | "wordlinks" => Ok(Self::WordLinks),
            "tw" | "words" => Ok(Self::Words),
            "ta" | "academy" => Ok(Self::Academy),
            other => Err(ResourceError::not_found("resource kind", other)),
        }
    }
}

/// Scripture variants that stand in for one another across gateway languages.
const VARIANT_FAMILIES: &[&[&str]] = &[&["ult", "glt"], &["ust", "gst"]];

/// Repository codes to try for `variant`, exact code first.
pub fn variant_candidates(variant: &str) -> Vec<String> {
    let variant = variant.trim().to_ascii_lowercase();
    let mut candidates = vec![variant.clone()];
    if let Some(family) = VARIANT_FAMILIES.iter().find(|f| f.contains(&variant.as_str())) {
        candidates.extend(
            family
                .iter()
                .filter(|code| **code != variant)
                .map(|code| code.to_string()),
        );
    }
    candidates
}

/// Network access to the content catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Base URL used to label network spans.
    fn base_url(&self) -> &str;

    /// `GET /{org}/{repo}/archive/{ref}.zip`
    async fn fetch_archive(&self, key: &ArchiveKey) -> Result<Fetched>;

    /// `GET /{org}/{repo}/raw/branch/{branch}/{path}`
    async fn fetch_raw(&self, key: &ArchiveKey, path: &str) -> Result<Fetched>;

    async fn search(&self, query: &CatalogQuery) -> Result<Vec<CatalogEntry>>;

    async fn list_languages(&self, owner: Option<&str>) -> Result<Vec<LanguageEntry>>;
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct CatalogEnvelope<T> {
    #[serde(default)]
    data: Vec<T>,
}

/// [`CatalogSource`] backed by a Gitea/Door43-style HTTP API.
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
    stage: String,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("translation-helps-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ResourceError::fetch("client", None, e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            stage: "prod".to_string(),
        })
    }

    pub fn archive_url(&self, key: &ArchiveKey) -> String {
        format!(
            "{}/{}/{}/archive/{}.zip",
            self.base_url, key.organization, key.repository, key.git_ref
        )
    }

    async fn get_bytes(&self, url: &str, query: &[(&str, &str)]) -> Result<Fetched> {
        debug!(url = %url, "catalog request");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "catalog request failed");
                ResourceError::fetch(url, None, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResourceError::fetch(
                url,
                Some(status.as_u16()),
                format!("HTTP {status}"),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ResourceError::fetch(url, Some(status.as_u16()), e.to_string()))?;

        Ok(Fetched {
            url: url.to_string(),
            status: status.as_u16(),
            bytes,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let fetched = self.get_bytes(url, query).await?;
        let envelope: CatalogEnvelope<T> = serde_json::from_slice(&fetched.bytes)
            .map_err(|e| ResourceError::parse(format!("catalog response from {url}"), e.to_string()))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_archive(&self, key: &ArchiveKey) -> Result<Fetched> {
        let url = self.archive_url(key);
        self.get_bytes(&url, &[]).await
    }

    async fn fetch_raw(&self, key: &ArchiveKey, path: &str) -> Result<Fetched> {
        let url = format!(
            "{}/{}/{}/raw/branch/{}/{}",
            self.base_url,
            key.organization,
            key.repository,
            key.git_ref,
            path.trim_start_matches('/')
        );
        self.get_bytes(&url, &[]).await
    }

    async fn search(&self, query: &CatalogQuery) -> Result<Vec<CatalogEntry>> {
        let url = format!("{}/api/v1/catalog/search", self.base_url);
        let mut params = vec![
            ("lang", query.language.as_str()),
            ("subject", query.subject.as_str()),
            ("stage", self.stage.as_str()),
        ];
        if let Some(owner) = query.owner.as_deref() {
            params.push(("owner", owner));
        }
        self.get_json(&url, &params).await
    }

    async fn list_languages(&self, owner: Option<&str>) -> Result<Vec<LanguageEntry>> {
        let url = format!("{}/api/v1/catalog/list/languages", self.base_url);
        let mut params = vec![("stage", self.stage.as_str())];
        if let Some(owner) = owner {
            params.push(("owner", owner));
        }
        self.get_json(&url, &params).await
    }
}
