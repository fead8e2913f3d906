//! Annotation tables: translation notes, questions and word links.
//!
//! Current tables carry a `Reference` column (`1:1`, `1:3-5`, `1:intro`,
//! `front:intro`). Older nine-column notes split it into `Chapter` and
//! `Verse`; both layouts are accepted and column names are kept as found.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::reference::Reference;

/// One table row keyed by the table's own column names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationRow(pub IndexMap<String, String>);

impl AnnotationRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// The row's reference cell, composed from legacy columns if needed.
    pub fn reference(&self) -> Option<String> {
        if let Some(reference) = self.get("Reference") {
            return Some(reference.to_string());
        }
        match (self.get("Chapter"), self.get("Verse")) {
            (Some(chapter), Some(verse)) => Some(format!("{chapter}:{verse}")),
            _ => None,
        }
    }
}

/// Where a row sits in the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAnchor {
    BookIntro,
    ChapterIntro(u32),
    Verses { from: (u32, u32), to: (u32, u32) },
}

impl RowAnchor {
    pub fn parse(cell: &str) -> Option<Self> {
        let (chapter, verse) = cell.trim().split_once(':')?;
        let verse = verse.trim();

        if chapter.trim() == "front" {
            return Some(Self::BookIntro);
        }
        let chapter: u32 = chapter.trim().parse().ok()?;
        if verse == "intro" {
            return Some(Self::ChapterIntro(chapter));
        }

        // "3", "3-5", "3,5", "3-4:2"
        let numbers = |s: &str| -> Option<(u32, u32)> {
            match s.split_once(':') {
                Some((c, v)) => Some((c.trim().parse().ok()?, v.trim().parse().ok()?)),
                None => Some((chapter, s.trim().parse().ok()?)),
            }
        };
        let mut points = verse.split([',', '-', '–']).map(numbers);
        let first = points.next()??;
        let mut last = first;
        for point in points {
            last = last.max(point?);
        }
        Some(Self::Verses { from: first, to: last })
    }

    pub fn matches(&self, reference: &Reference, include_intro: bool) -> bool {
        match *self {
            Self::BookIntro => include_intro,
            Self::ChapterIntro(chapter) => include_intro && reference.chapters().contains(&chapter),
            Self::Verses { from, to } => reference.overlaps(from, to),
        }
    }
}

/// Parse a whole table. Short rows are padded, blank lines skipped.
pub fn parse_table(text: &str) -> Vec<AnnotationRow> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();

    lines
        .map(|line| {
            let mut cells = line.split('\t');
            AnnotationRow(
                columns
                    .iter()
                    .map(|col| (col.to_string(), cells.next().unwrap_or_default().to_string()))
                    .collect(),
            )
        })
        .collect()
}

/// Rows of `table` relevant to `reference`, in table order.
pub fn filter_rows(
    table: Vec<AnnotationRow>,
    reference: &Reference,
    include_intro: bool,
) -> Vec<AnnotationRow> {
    table
        .into_iter()
        .filter(|row| {
            row.reference()
                .and_then(|cell| RowAnchor::parse(&cell))
                .is_some_and(|anchor| anchor.matches(reference, include_intro))
        })
        .collect()
}

/// Whether `file_name` is the table for `book_code` (`tn_TIT.tsv`,
/// `en_tn_57-TIT.tsv`).
pub fn is_table_for(file_name: &str, prefix: &str, book_code: &str) -> bool {
    let upper = file_name.to_ascii_uppercase();
    let Some(stem) = upper.strip_suffix(".TSV") else {
        return false;
    };
    let prefix = prefix.to_ascii_uppercase();
    let starts = stem.starts_with(&format!("{prefix}_")) || stem.contains(&format!("_{prefix}_"));
    let ends = stem.ends_with(&format!("_{book_code}")) || stem.ends_with(&format!("-{book_code}"));
    starts && ends
}
