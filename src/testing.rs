//! Testing utilities: an in-memory catalog and fixture archives.
//!
//! [`MockCatalog`] serves zip archives built in memory, counts every archive
//! download for single-flight assertions, and can inject latency and
//! failures. [`MockCatalog::door43`] preloads a small `unfoldingWord`
//! snapshot covering John 3 and Titus 1.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::cache::ArchiveKey;
use crate::catalog::{CatalogEntry, CatalogQuery, CatalogSource, Fetched, LanguageEntry};
use crate::error::{ResourceError, Result};

pub const MOCK_BASE_URL: &str = "https://catalog.test";

/// Build a zip archive from `(path, contents)` pairs.
pub fn zip_archive(files: &[(&str, &str)]) -> Bytes {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (path, contents) in files {
        writer.start_file(*path, options).expect("in-memory zip entry");
        writer
            .write_all(contents.as_bytes())
            .expect("in-memory zip write");
    }
    let cursor = writer.finish().expect("in-memory zip finish");
    Bytes::from(cursor.into_inner())
}

/// Record of a call made to the mock catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCatalogCall {
    Archive(ArchiveKey),
    Raw(ArchiveKey, String),
    Search(CatalogQuery),
    Languages(Option<String>),
}

#[derive(Default)]
pub struct MockCatalog {
    archives: Mutex<HashMap<ArchiveKey, Bytes>>,
    raw_files: Mutex<HashMap<(ArchiveKey, String), Bytes>>,
    entries: Mutex<Vec<CatalogEntry>>,
    languages: Mutex<Vec<LanguageEntry>>,
    failures: Mutex<HashMap<ArchiveKey, u16>>,
    catalog_down: AtomicBool,
    latency: Mutex<Duration>,
    archive_fetches: AtomicUsize,
    calls: Mutex<Vec<MockCatalogCall>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, so concurrent callers overlap.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    /// Publish a repository: a catalog entry plus its archive. Files are
    /// placed under a `{name}/` root the way repository archives are.
    pub fn with_repository(
        self,
        owner: &str,
        name: &str,
        subject: &str,
        git_ref: &str,
        files: &[(&str, &str)],
    ) -> Self {
        let rooted: Vec<(String, &str)> = files
            .iter()
            .map(|(path, contents)| (format!("{name}/{path}"), *contents))
            .collect();
        let borrowed: Vec<(&str, &str)> = rooted.iter().map(|(p, c)| (p.as_str(), *c)).collect();
        let language = name.split_once('_').map(|(l, _)| l).unwrap_or_default();

        self.archives
            .lock()
            .insert(ArchiveKey::new(owner, name, git_ref), zip_archive(&borrowed));
        self.entries.lock().push(CatalogEntry {
            name: name.to_string(),
            owner: owner.to_string(),
            language: language.to_string(),
            subject: subject.to_string(),
            branch_or_tag_name: Some(git_ref.to_string()),
        });
        self
    }

    /// Serve `bytes` for `key` without listing it in the catalog.
    pub fn with_archive(self, key: ArchiveKey, bytes: Bytes) -> Self {
        self.archives.lock().insert(key, bytes);
        self
    }

    pub fn with_raw_file(self, key: ArchiveKey, path: &str, contents: &str) -> Self {
        self.raw_files
            .lock()
            .insert((key, path.to_string()), Bytes::from(contents.to_string()));
        self
    }

    pub fn with_language(self, code: &str, name: &str) -> Self {
        self.languages.lock().push(LanguageEntry {
            code: code.to_string(),
            name: name.to_string(),
            anglicized: None,
        });
        self
    }

    /// Answer downloads of `key` with HTTP `status`.
    pub fn fail_archive(&self, key: ArchiveKey, status: u16) {
        self.failures.lock().insert(key, status);
    }

    /// Make catalog search and language listing fail with 503.
    pub fn set_catalog_down(&self, down: bool) {
        self.catalog_down.store(down, Ordering::SeqCst);
    }

    /// Archive downloads attempted so far.
    pub fn archive_fetches(&self) -> usize {
        self.archive_fetches.load(Ordering::SeqCst)
    }

    pub fn fetches_for(&self, key: &ArchiveKey) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, MockCatalogCall::Archive(k) if k == key))
            .count()
    }

    pub fn search_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, MockCatalogCall::Search(_)))
            .count()
    }

    pub fn calls(&self) -> Vec<MockCatalogCall> {
        self.calls.lock().clone()
    }

    async fn pause(&self) {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn archive_url(key: &ArchiveKey) -> String {
        format!(
            "{MOCK_BASE_URL}/{}/{}/archive/{}.zip",
            key.organization, key.repository, key.git_ref
        )
    }

    fn catalog_unavailable(&self, url: &str) -> Result<()> {
        if self.catalog_down.load(Ordering::SeqCst) {
            return Err(ResourceError::fetch(url, Some(503), "HTTP 503 Service Unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for MockCatalog {
    fn base_url(&self) -> &str {
        MOCK_BASE_URL
    }

    async fn fetch_archive(&self, key: &ArchiveKey) -> Result<Fetched> {
        self.archive_fetches.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(MockCatalogCall::Archive(key.clone()));
        self.pause().await;

        let url = Self::archive_url(key);
        if let Some(status) = self.failures.lock().get(key).copied() {
            return Err(ResourceError::fetch(url, Some(status), format!("HTTP {status}")));
        }
        let bytes = self.archives.lock().get(key).cloned();
        match bytes {
            Some(bytes) => Ok(Fetched {
                url,
                status: 200,
                bytes,
            }),
            None => Err(ResourceError::fetch(url, Some(404), "HTTP 404 Not Found")),
        }
    }

    async fn fetch_raw(&self, key: &ArchiveKey, path: &str) -> Result<Fetched> {
        self.calls
            .lock()
            .push(MockCatalogCall::Raw(key.clone(), path.to_string()));
        self.pause().await;

        let url = format!(
            "{MOCK_BASE_URL}/{}/{}/raw/branch/{}/{path}",
            key.organization, key.repository, key.git_ref
        );
        let bytes = self
            .raw_files
            .lock()
            .get(&(key.clone(), path.to_string()))
            .cloned();
        match bytes {
            Some(bytes) => Ok(Fetched {
                url,
                status: 200,
                bytes,
            }),
            None => Err(ResourceError::fetch(url, Some(404), "HTTP 404 Not Found")),
        }
    }

    async fn search(&self, query: &CatalogQuery) -> Result<Vec<CatalogEntry>> {
        self.calls.lock().push(MockCatalogCall::Search(query.clone()));
        self.pause().await;
        self.catalog_unavailable(&format!("{MOCK_BASE_URL}/api/v1/catalog/search"))?;

        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| e.language == query.language && e.subject == query.subject)
            .filter(|e| query.owner.as_deref().map_or(true, |owner| e.owner == owner))
            .cloned()
            .collect())
    }

    async fn list_languages(&self, owner: Option<&str>) -> Result<Vec<LanguageEntry>> {
        self.calls
            .lock()
            .push(MockCatalogCall::Languages(owner.map(str::to_string)));
        self.pause().await;
        self.catalog_unavailable(&format!("{MOCK_BASE_URL}/api/v1/catalog/list/languages"))?;
        Ok(self.languages.lock().clone())
    }
}

pub mod fixtures {
    //! A trimmed `unfoldingWord` English snapshot.

    pub const ORG: &str = "unfoldingWord";
    pub const ULT_REF: &str = "v86";

    pub const JHN_USFM: &str = r#"\id JHN EN_ULT en_English_ltr unfoldingWord Literal Text
\usfm 3.0
\h John
\toc1 The Gospel of John
\mt John
\c 3
\p
\v 16 \zaln-s |x-strong="G10630" x-lemma="γάρ" x-morph="Gr,CC,,,,,,,," x-occurrence="1" x-occurrences="1" x-content="γὰρ"\*\w For|x-occurrence="1" x-occurrences="1"\w*\zaln-e\*
\zaln-s |x-strong="G23160" x-lemma="θεός" x-occurrence="1" x-occurrences="1" x-content="Θεὸς"\*\w God|x-occurrence="1" x-occurrences="1"\w*\zaln-e\*
\w so|x-occurrence="1" x-occurrences="1"\w* \w loved|x-occurrence="1" x-occurrences="1"\w* \w the|x-occurrence="1" x-occurrences="1"\w* \w world|x-occurrence="1" x-occurrences="1"\w*, \w that|x-occurrence="1" x-occurrences="1"\w* \w he|x-occurrence="1" x-occurrences="1"\w* \w gave|x-occurrence="1" x-occurrences="1"\w* \w his|x-occurrence="1" x-occurrences="1"\w* \w One|x-occurrence="1" x-occurrences="1"\w* \w and|x-occurrence="1" x-occurrences="1"\w* \w Only|x-occurrence="1" x-occurrences="1"\w* \w Son|x-occurrence="1" x-occurrences="1"\w*.
\v 17 \w For|x-occurrence="1" x-occurrences="1"\w* \w God|x-occurrence="1" x-occurrences="1"\w* \w did|x-occurrence="1" x-occurrences="1"\w* \w not|x-occurrence="1" x-occurrences="1"\w* \w send|x-occurrence="1" x-occurrences="1"\w* \w the|x-occurrence="1" x-occurrences="1"\w* \w Son|x-occurrence="1" x-occurrences="1"\w* \w into|x-occurrence="1" x-occurrences="1"\w* \w the|x-occurrence="1" x-occurrences="1"\w* \w world|x-occurrence="1" x-occurrences="1"\w*.
"#;

    pub const TIT_USFM: &str = r#"\id TIT EN_ULT
\h Titus
\mt Titus
\c 1
\s5
\p
\v 1 \w Paul|x-occurrence="1" x-occurrences="1"\w*, \w a|x-occurrence="1" x-occurrences="1"\w* \w servant|x-occurrence="1" x-occurrences="1"\w* \w of|x-occurrence="1" x-occurrences="1"\w* \w God|x-occurrence="1" x-occurrences="1"\w*.
\v 2 \w They|x-occurrence="1" x-occurrences="1"\w* \w are|x-occurrence="1" x-occurrences="1"\w* \w in|x-occurrence="1" x-occurrences="1"\w* \w hope|x-occurrence="1" x-occurrences="1"\w* \w of|x-occurrence="1" x-occurrences="1"\w* \w eternal|x-occurrence="1" x-occurrences="1"\w* \w life|x-occurrence="1" x-occurrences="1"\w*.
"#;

    pub const TIT_UST_USFM: &str = "\\id TIT EN_UST\n\\c 1\n\\p\n\\v 1 I, Paul, serve God.\n\\v 2 We confidently expect to live forever.\n";

    pub const TN_TIT: &str = "Reference\tID\tTags\tSupportReference\tQuote\tOccurrence\tNote
front:intro\tm2jr\t\t\t\t0\t# Introduction to Titus
1:intro\tc3ab\t\t\t\t0\t# Titus 1 General Notes
1:1\trtc9\tgrammar\trc://*/ta/man/translate/figs-metaphor\tδοῦλος Θεοῦ\t1\tPaul speaks of himself as a servant of God.
1:1\tzsy2\t\trc://*/ta/man/translate/figs-abstractnouns\tκατὰ πίστιν\t1\tfor the faith
1:2\tabc1\t\t\tἐπ’ ἐλπίδι\t1\tin hope
2:intro\tghi3\t\t\t\t0\t# Titus 2 General Notes
";

    pub const TQ_TIT: &str = "Reference\tID\tTags\tQuote\tOccurrence\tQuestion\tResponse
1:1\tq001\t\t\t\tWhat is Paul's role?\tPaul is a servant of God and an apostle.
1:2\tq002\t\t\t\tWhat did God promise?\tGod promised eternal life.
";

    pub const TWL_TIT: &str = "Reference\tID\tTags\tOrigWords\tOccurrence\tTWLink
1:1\tw001\tname\tΠαῦλος\t1\trc://*/tw/dict/bible/names/paul
1:1\tw002\tkeyterm\tΘεοῦ\t1\trc://*/tw/dict/bible/kt/god
1:1\tw003\tkeyterm\tΘεοῦ\t2\trc://*/tw/dict/bible/kt/god
1:2\tw004\tkeyterm\tζωῆς\t1\trc://*/tw/dict/bible/kt/eternity
";

    pub const TW_GOD: &str = "# God\n\n## Definition:\n\nIn the Bible, the term \"God\" refers to the eternal being who created the universe.\n";
    pub const TW_PAUL: &str = "# Paul, Saul\n\n## Facts:\n\nPaul was a leader of the early church.\n";

    pub const TA_METAPHOR_BODY: &str = "### Description\n\nA metaphor is a figure of speech in which one concept is spoken of as if it were another.\n";
    pub const TA_METAPHOR_TITLE: &str = "Metaphor";
    pub const TA_METAPHOR_SUBTITLE: &str = "What is a metaphor?";
}

impl MockCatalog {
    /// The fixture snapshot under [`fixtures::ORG`].
    pub fn door43() -> Self {
        use fixtures::*;

        Self::new()
            .with_language("en", "English")
            .with_language("es-419", "Español Latin America")
            .with_repository(
                ORG,
                "en_ult",
                "Aligned Bible",
                ULT_REF,
                &[("44-JHN.usfm", JHN_USFM), ("57-TIT.usfm", TIT_USFM)],
            )
            .with_repository(ORG, "en_ust", "Aligned Bible", ULT_REF, &[("57-TIT.usfm", TIT_UST_USFM)])
            .with_repository(ORG, "en_tn", "TSV Translation Notes", "v80", &[("tn_TIT.tsv", TN_TIT)])
            .with_repository(ORG, "en_tq", "TSV Translation Questions", "v40", &[("tq_TIT.tsv", TQ_TIT)])
            .with_repository(
                ORG,
                "en_twl",
                "TSV Translation Words Links",
                "v40",
                &[("twl_TIT.tsv", TWL_TIT)],
            )
            .with_repository(
                ORG,
                "en_tw",
                "Translation Words",
                "v40",
                &[("bible/kt/god.md", TW_GOD), ("bible/names/paul.md", TW_PAUL)],
            )
            .with_repository(
                ORG,
                "en_ta",
                "Translation Academy",
                "v40",
                &[
                    ("checking/figs-metaphor/01.md", ""),
                    ("process/figs-metaphor/01.md", ""),
                    ("translate/figs-metaphor/01.md", TA_METAPHOR_BODY),
                    ("translate/figs-metaphor/sub-title.md", TA_METAPHOR_SUBTITLE),
                    ("translate/figs-metaphor/title.md", TA_METAPHOR_TITLE),
                    ("intro/ta-intro/01.md", "# Introduction to Translation Academy\n"),
                ],
            )
    }
}
