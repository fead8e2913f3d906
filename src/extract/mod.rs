//! Resource Extractor: typed results from cached archive bytes.
//!
//! Nothing here performs I/O beyond reading the in-memory archive.

pub mod archive;
pub mod markdown;
pub mod tsv;
pub mod usfm;

use serde::Serialize;
use tracing::debug;

use crate::cache::CacheEntry;
use crate::catalog::ResourceKind;
use crate::error::{ResourceError, Result};
use crate::reference::Reference;

pub use archive::ArchiveReader;
pub use markdown::{ArticleId, MarkdownArticle};
pub use tsv::AnnotationRow;
pub use usfm::BookText;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptureResult {
    pub text: String,
    /// Upper-case variant plus release, e.g. `ULT v86`.
    pub translation: String,
    pub organization: String,
    pub language: String,
    pub reference: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ScriptureOptions {
    pub include_verse_numbers: bool,
}

impl Default for ScriptureOptions {
    fn default() -> Self {
        Self {
            include_verse_numbers: true,
        }
    }
}

/// Where an archive came from, carried into results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub organization: String,
    pub language: String,
    /// Resource code of the repository, e.g. `ult`.
    pub code: String,
}

pub fn scripture(
    entry: &CacheEntry,
    reference: &Reference,
    source: &Provenance,
    options: ScriptureOptions,
) -> Result<ScriptureResult> {
    let mut reader = ArchiveReader::open(entry)?;
    let book = reference.book;
    let stem = book.file_stem().to_ascii_uppercase();
    let code = book.code.to_ascii_uppercase();

    let path = reader
        .find_file(|name| {
            let upper = name.to_ascii_uppercase();
            upper.ends_with(".USFM")
                && (upper.starts_with(&stem)
                    || upper.ends_with(&format!("-{code}.USFM"))
                    || upper == format!("{code}.USFM"))
        })
        .ok_or_else(|| ResourceError::not_found(reader.label().to_string(), book.code))?;

    debug!(archive = %entry.key, path = %path, "parsing scripture");
    let usfm = reader.read_to_string(&path)?;
    let text = BookText::parse(&usfm).render(reference, options.include_verse_numbers);
    if text.is_empty() {
        return Err(ResourceError::not_found(
            reader.label().to_string(),
            reference.to_string(),
        ));
    }

    Ok(ScriptureResult {
        text,
        translation: format!("{} {}", source.code.to_ascii_uppercase(), entry.key.git_ref),
        organization: source.organization.clone(),
        language: source.language.clone(),
        reference: reference.to_string(),
    })
}

/// Rows of the book's table relevant to `reference`. An existing table
/// with no matching rows yields an empty list.
pub fn annotations(
    entry: &CacheEntry,
    reference: &Reference,
    kind: ResourceKind,
    include_intro: bool,
) -> Result<Vec<AnnotationRow>> {
    let mut reader = ArchiveReader::open(entry)?;
    let code = reference.book.code;
    let path = reader
        .find_file(|name| tsv::is_table_for(name, kind.code(), code))
        .ok_or_else(|| {
            ResourceError::not_found(reader.label().to_string(), format!("{} {code}", kind.code()))
        })?;

    debug!(archive = %entry.key, path = %path, "parsing annotation table");
    let table = tsv::parse_table(&reader.read_to_string(&path)?);
    Ok(tsv::filter_rows(table, reference, include_intro))
}

pub fn markdown(entry: &CacheEntry, id: &ArticleId) -> Result<MarkdownArticle> {
    let mut reader = ArchiveReader::open(entry)?;
    markdown::find_article(&mut reader, id)?
        .ok_or_else(|| ResourceError::not_found(reader.label().to_string(), id.describe()))
}
