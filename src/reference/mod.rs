//! Free-text Bible reference parsing.
//!
//! Accepted shapes, with any book name or abbreviation known to [`books`]:
//!
//! ```text
//! John 3            whole chapter
//! John 3-4          chapter range
//! John 3:16         single verse
//! Genesis 1:1-3     verse range in one chapter
//! Acts 1:8-2:4      range spanning chapters
//! ```

pub mod books;

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

pub use books::Book;

use crate::error::{ResourceError, Result};

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<book>.+?)\s*(?P<c1>\d+)(?::(?P<v1>\d+))?(?:\s*[-–]\s*(?P<n2>\d+)(?::(?P<v2>\d+))?)?$",
    )
    .expect("reference pattern is valid")
});

/// A parsed reference. Immutable once constructed.
///
/// `verse == None` means the reference starts at the top of `chapter`;
/// with no end either, it covers the whole chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub book: &'static Book,
    pub chapter: u32,
    pub verse: Option<u32>,
    /// Only set when the range crosses into another chapter.
    pub end_chapter: Option<u32>,
    pub end_verse: Option<u32>,
}

impl Reference {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ResourceError::InvalidReference("empty reference".into()));
        }

        let caps = REFERENCE_RE
            .captures(trimmed)
            .ok_or_else(|| ResourceError::InvalidReference(trimmed.to_string()))?;

        let book_name = caps.name("book").map(|m| m.as_str()).unwrap_or_default();
        let book = books::lookup(book_name).ok_or_else(|| {
            ResourceError::InvalidReference(format!("unknown book '{book_name}'"))
        })?;

        let number = |name: &str| -> Result<Option<u32>> {
            caps.name(name)
                .map(|m| {
                    m.as_str()
                        .parse::<u32>()
                        .map_err(|_| ResourceError::InvalidReference(trimmed.to_string()))
                })
                .transpose()
        };

        let chapter = number("c1")?.unwrap_or_default();
        let verse = number("v1")?;
        let after_dash = number("n2")?;
        let after_colon = number("v2")?;

        // "3:16-18" ends on a verse, "3-4" and "3:16-4:2" end on a chapter.
        let (end_chapter, end_verse) = match (verse, after_dash, after_colon) {
            (_, None, _) => (None, None),
            (_, Some(c2), Some(v2)) => (Some(c2), Some(v2)),
            (Some(_), Some(v2), None) => (None, Some(v2)),
            (None, Some(c2), None) => (Some(c2), None),
        };

        let reference = Self {
            book,
            chapter,
            verse,
            end_chapter: end_chapter.filter(|c2| *c2 != chapter || end_verse.is_none()),
            end_verse,
        };
        reference.validate(trimmed)?;
        Ok(reference.normalized())
    }

    fn validate(&self, input: &str) -> Result<()> {
        let invalid = || ResourceError::InvalidReference(input.to_string());
        let last = self.book.chapters;

        if self.chapter == 0 || self.chapter > last {
            return Err(invalid());
        }
        if self.verse == Some(0) || self.end_verse == Some(0) {
            return Err(invalid());
        }
        if let Some(end) = self.end_chapter {
            if end < self.chapter || end > last {
                return Err(invalid());
            }
        }
        let same_chapter = self.end_chapter.map_or(true, |c| c == self.chapter);
        if let (true, Some(start), Some(end)) = (same_chapter, self.verse, self.end_verse) {
            if end < start {
                return Err(invalid());
            }
        }
        Ok(())
    }

    /// `John 3-3` is just `John 3`; `John 3:16-3:18` is `John 3:16-18`.
    fn normalized(mut self) -> Self {
        if self.end_chapter == Some(self.chapter) {
            self.end_chapter = None;
            if self.verse.is_none() && self.end_verse.is_none() {
                return self;
            }
        }
        if self.end_chapter.is_none() && self.end_verse == self.verse {
            self.end_verse = None;
        }
        self
    }

    pub fn is_whole_chapter(&self) -> bool {
        self.verse.is_none() && self.end_verse.is_none()
    }

    pub fn chapters(&self) -> RangeInclusive<u32> {
        self.chapter..=self.end_chapter.unwrap_or(self.chapter)
    }

    fn start(&self) -> (u32, u32) {
        (self.chapter, self.verse.unwrap_or(1))
    }

    fn end(&self) -> (u32, u32) {
        match (self.end_chapter, self.end_verse, self.verse) {
            (Some(c), Some(v), _) => (c, v),
            (Some(c), None, _) => (c, u32::MAX),
            (None, Some(v), _) => (self.chapter, v),
            (None, None, Some(v)) => (self.chapter, v),
            (None, None, None) => (self.chapter, u32::MAX),
        }
    }

    /// Whether `chapter:verse` falls inside this reference.
    pub fn contains(&self, chapter: u32, verse: u32) -> bool {
        let point = (chapter, verse);
        self.start() <= point && point <= self.end()
    }

    /// Whether the inclusive span `from..=to` intersects this reference.
    pub fn overlaps(&self, from: (u32, u32), to: (u32, u32)) -> bool {
        from <= self.end() && self.start() <= to
    }
}

impl FromStr for Reference {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.book.name, self.chapter)?;
        if let Some(verse) = self.verse {
            write!(f, ":{verse}")?;
        }
        match (self.end_chapter, self.end_verse) {
            (Some(c), Some(v)) => write!(f, "-{c}:{v}"),
            (Some(c), None) => write!(f, "-{c}"),
            (None, Some(v)) => write!(f, "-{v}"),
            (None, None) => Ok(()),
        }
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Reference", 6)?;
        s.serialize_field("book", self.book.code)?;
        s.serialize_field("bookName", self.book.name)?;
        s.serialize_field("chapterStart", &self.chapter)?;
        s.serialize_field("verseStart", &self.verse)?;
        s.serialize_field("chapterEnd", &self.end_chapter)?;
        s.serialize_field("verseEnd", &self.end_verse)?;
        s.end()
    }
}
