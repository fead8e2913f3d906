//! USFM verse-text parsing.
//!
//! Aligned translations wrap every word in `\zaln-s ... \*` / `\w ...|...\w*`
//! markers. Those are reduced to plain words, notes and cross references are
//! dropped, and section headings never end up in verse text.

use std::sync::LazyLock;

use regex::Regex;

use crate::reference::Reference;

static ALIGNMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\zaln-[se][^\\]*\\\*").expect("alignment pattern is valid"));

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\\+?w\s+([^|\\]*)(?:\|[^\\]*)?\\\+?w\*").expect("word pattern is valid")
});

static NOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\\(?:f|fe|x)\s.*?\\(?:f|fe|x)\*").expect("note pattern is valid")
});

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Markers whose remaining line is metadata or a heading, not verse text.
const LINE_MARKERS: &[&str] = &[
    "id", "ide", "usfm", "h", "toc1", "toc2", "toc3", "toca1", "toca2", "mt", "mt1", "mt2",
    "mt3", "ms", "ms1", "ms2", "mr", "s", "s1", "s2", "s3", "s4", "sr", "r", "d", "sp", "cl",
    "cp", "ca", "va", "rem", "sts", "restore", "ip", "is", "is1", "imt", "imt1", "ie",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verse {
    pub chapter: u32,
    /// First verse number; bridged verses (`\v 4-5`) keep their label.
    pub number: u32,
    pub end: u32,
    pub label: String,
    pub text: String,
}

/// Parsed verses of one book, in document order.
#[derive(Debug, Clone, Default)]
pub struct BookText {
    pub verses: Vec<Verse>,
}

impl BookText {
    pub fn parse(usfm: &str) -> Self {
        let cleaned = ALIGNMENT_RE.replace_all(usfm, "");
        let cleaned = WORD_RE.replace_all(&cleaned, "$1");
        let cleaned = NOTE_RE.replace_all(&cleaned, "");

        let mut parser = Scanner::new(&cleaned);
        parser.run();

        let verses = parser
            .verses
            .into_iter()
            .map(|mut v| {
                v.text = WHITESPACE_RE.replace_all(v.text.trim(), " ").into_owned();
                v
            })
            .collect();
        Self { verses }
    }

    /// Verses intersecting `reference`.
    pub fn select<'a>(&'a self, reference: &'a Reference) -> impl Iterator<Item = &'a Verse> + 'a {
        self.verses
            .iter()
            .filter(move |v| reference.overlaps((v.chapter, v.number), (v.chapter, v.end)))
    }

    /// Plain text of `reference`, optionally prefixed with verse labels.
    ///
    /// Ranges crossing a chapter boundary label verses `chapter:verse`.
    pub fn render(&self, reference: &Reference, include_verse_numbers: bool) -> String {
        let multi_chapter = reference.chapters().count() > 1;
        self.select(reference)
            .filter(|v| !v.text.is_empty())
            .map(|v| match (include_verse_numbers, multi_chapter) {
                (false, _) => v.text.clone(),
                (true, false) => format!("{} {}", v.label, v.text),
                (true, true) => format!("{}:{} {}", v.chapter, v.label, v.text),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    chapter: u32,
    verses: Vec<Verse>,
    in_verse: bool,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            chapter: 0,
            verses: Vec::new(),
            in_verse: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn run(&mut self) {
        while let Some(c) = self.rest().chars().next() {
            if c == '\\' {
                self.pos += 1;
                self.marker();
            } else {
                self.pos += c.len_utf8();
                if self.in_verse {
                    if let Some(verse) = self.verses.last_mut() {
                        verse.text.push(c);
                    }
                }
            }
        }
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, keep: F) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !keep(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn skip_line(&mut self) {
        let rest = self.rest();
        self.pos += rest.find('\n').unwrap_or(rest.len());
    }

    fn marker(&mut self) {
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-');
        if self.rest().starts_with('*') {
            // closing character marker
            self.pos += 1;
            return;
        }
        let name = name.trim_start_matches('+');

        match name {
            "c" => {
                self.take_while(char::is_whitespace);
                let number = self.take_while(|c| c.is_ascii_digit());
                if let Ok(chapter) = number.parse() {
                    self.chapter = chapter;
                }
                self.in_verse = false;
            }
            "v" => {
                self.take_while(char::is_whitespace);
                let label = self.take_while(|c| c.is_ascii_digit() || c == '-' || c.is_ascii_lowercase());
                let mut bounds = label
                    .split('-')
                    .map(|part| part.trim_end_matches(|c: char| c.is_ascii_lowercase()).parse::<u32>());
                match bounds.next() {
                    Some(Ok(number)) if self.chapter > 0 => {
                        let end = bounds.next().and_then(|b| b.ok()).unwrap_or(number).max(number);
                        self.verses.push(Verse {
                            chapter: self.chapter,
                            number,
                            end,
                            label: label.to_string(),
                            text: String::new(),
                        });
                        self.in_verse = true;
                    }
                    _ => self.in_verse = false,
                }
            }
            name if LINE_MARKERS.contains(&name) => self.skip_line(),
            _ => {
                // paragraph and poetry breaks, character styles
                if self.in_verse {
                    if let Some(verse) = self.verses.last_mut() {
                        verse.text.push(' ');
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIGNED: &str = r#"\id JHN EN_ULT
\h John
\mt John
\c 3
\s5
\p
\v 16 \zaln-s |x-strong="G10630" x-lemma="γάρ" x-occurrence="1" x-occurrences="1" x-content="γὰρ"\*\w For|x-occurrence="1" x-occurrences="1"\w*\zaln-e\*
\zaln-s |x-strong="G37790" x-content="οὕτως"\*\w God|x-occurrence="1" x-occurrences="1"\w*
\w so|x-occurrence="1" x-occurrences="1"\w*\zaln-e\*
\w loved|x-occurrence="1"\w* \w the|x-occurrence="1"\w* \w world|x-occurrence="1"\w*\f + \ft Some manuscripts differ.\f*.
\v 17 \w For|x-occurrence="1"\w* \w God|x-occurrence="1"\w* \w did|x-occurrence="1"\w* \w not|x-occurrence="1"\w* \w send|x-occurrence="1"\w*.
\q1
\v 18 \w The|x-occurrence="1"\w* \w one|x-occurrence="1"\w* \add who\add* \w believes|x-occurrence="1"\w*.
"#;

    #[test]
    fn strips_alignment_markup() {
        let book = BookText::parse(ALIGNED);
        assert_eq!(book.verses.len(), 3);
        assert_eq!(book.verses[0].text, "For God so loved the world.");
        assert_eq!(book.verses[2].text, "The one who believes.");
    }

    #[test]
    fn renders_selected_verses() {
        let book = BookText::parse(ALIGNED);
        let r = Reference::parse("John 3:16").unwrap();
        assert_eq!(book.render(&r, true), "16 For God so loved the world.");
        assert_eq!(book.render(&r, false), "For God so loved the world.");

        let range = Reference::parse("John 3:17-18").unwrap();
        assert_eq!(
            book.render(&range, true),
            "17 For God did not send. 18 The one who believes."
        );
    }

    #[test]
    fn headings_are_not_verse_text() {
        let src = "\\c 1\n\\p\n\\v 1 First.\n\\s1 A Heading\n\\p\n\\v 2 Second.\n\\c 2\n\\v 1 Next chapter.\n";
        let book = BookText::parse(src);
        assert_eq!(book.verses[0].text, "First.");
        assert_eq!(book.verses[1].text, "Second.");
        assert_eq!(book.verses[2].chapter, 2);

        let across = Reference::parse("Titus 1:2-2:1").unwrap();
        assert_eq!(book.render(&across, true), "1:2 Second. 2:1 Next chapter.");
    }

    #[test]
    fn bridged_verses_match_either_number() {
        let src = "\\c 1\n\\v 4-5 Bridged text.\n\\v 6 After.\n";
        let book = BookText::parse(src);
        assert_eq!(book.verses[0].label, "4-5");
        let r = Reference::parse("Titus 1:5").unwrap();
        assert_eq!(book.render(&r, true), "4-5 Bridged text.");
    }
}
