use std::collections::HashMap;
use std::sync::LazyLock;

/// A canonical book of the protestant 66-book canon.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Book {
    /// Three-character USFM identifier, e.g. `JHN`.
    pub code: &'static str,
    pub name: &'static str,
    /// Number used in scripture archive file names (`44-JHN.usfm`).
    pub number: u8,
    pub chapters: u32,
    aliases: &'static [&'static str],
}

impl Book {
    /// File stem used by scripture archives, e.g. `44-JHN`.
    pub fn file_stem(&self) -> String {
        format!("{:02}-{}", self.number, self.code)
    }
}

macro_rules! book {
    ($code:literal, $name:literal, $number:literal, $chapters:literal, [$($alias:literal),* $(,)?]) => {
        Book {
            code: $code,
            name: $name,
            number: $number,
            chapters: $chapters,
            aliases: &[$($alias),*],
        }
    };
}

pub static BOOKS: [Book; 66] = [
    book!("GEN", "Genesis", 1, 50, ["gen", "ge", "gn"]),
    book!("EXO", "Exodus", 2, 40, ["exod", "ex"]),
    book!("LEV", "Leviticus", 3, 27, ["lev", "lv"]),
    book!("NUM", "Numbers", 4, 36, ["num", "nm", "nb"]),
    book!("DEU", "Deuteronomy", 5, 34, ["deut", "dt"]),
    book!("JOS", "Joshua", 6, 24, ["josh", "jsh"]),
    book!("JDG", "Judges", 7, 21, ["judg", "jdgs"]),
    book!("RUT", "Ruth", 8, 4, ["ru", "rth"]),
    book!("1SA", "1 Samuel", 9, 31, ["1sam", "1sm", "1 sam"]),
    book!("2SA", "2 Samuel", 10, 24, ["2sam", "2sm", "2 sam"]),
    book!("1KI", "1 Kings", 11, 22, ["1kgs", "1kg", "1 kgs"]),
    book!("2KI", "2 Kings", 12, 25, ["2kgs", "2kg", "2 kgs"]),
    book!("1CH", "1 Chronicles", 13, 29, ["1chr", "1chron", "1 chr"]),
    book!("2CH", "2 Chronicles", 14, 36, ["2chr", "2chron", "2 chr"]),
    book!("EZR", "Ezra", 15, 10, ["ezr"]),
    book!("NEH", "Nehemiah", 16, 13, ["neh", "ne"]),
    book!("EST", "Esther", 17, 10, ["esth", "es"]),
    book!("JOB", "Job", 18, 42, ["jb"]),
    book!("PSA", "Psalms", 19, 150, ["psalm", "ps", "pss", "psm"]),
    book!("PRO", "Proverbs", 20, 31, ["prov", "prv", "pr"]),
    book!("ECC", "Ecclesiastes", 21, 12, ["eccl", "eccles", "qoh"]),
    book!("SNG", "Song of Songs", 22, 8, ["song", "song of solomon", "sos", "canticles"]),
    book!("ISA", "Isaiah", 23, 66, ["isa", "is"]),
    book!("JER", "Jeremiah", 24, 52, ["jer", "jr"]),
    book!("LAM", "Lamentations", 25, 5, ["lam", "la"]),
    book!("EZK", "Ezekiel", 26, 48, ["ezek", "eze"]),
    book!("DAN", "Daniel", 27, 12, ["dan", "dn"]),
    book!("HOS", "Hosea", 28, 14, ["hos", "ho"]),
    book!("JOL", "Joel", 29, 3, ["joel", "jl"]),
    book!("AMO", "Amos", 30, 9, ["am"]),
    book!("OBA", "Obadiah", 31, 1, ["obad", "ob"]),
    book!("JON", "Jonah", 32, 4, ["jnh", "jonah"]),
    book!("MIC", "Micah", 33, 7, ["mic", "mc"]),
    book!("NAM", "Nahum", 34, 3, ["nah", "na"]),
    book!("HAB", "Habakkuk", 35, 3, ["hab", "hb"]),
    book!("ZEP", "Zephaniah", 36, 3, ["zeph", "zp"]),
    book!("HAG", "Haggai", 37, 2, ["hag", "hg"]),
    book!("ZEC", "Zechariah", 38, 14, ["zech", "zc"]),
    book!("MAL", "Malachi", 39, 4, ["mal", "ml"]),
    book!("MAT", "Matthew", 41, 28, ["matt", "mt"]),
    book!("MRK", "Mark", 42, 16, ["mk", "mrk", "mar"]),
    book!("LUK", "Luke", 43, 24, ["lk", "luk"]),
    book!("JHN", "John", 44, 21, ["jn", "jhn", "joh"]),
    book!("ACT", "Acts", 45, 28, ["acts", "ac"]),
    book!("ROM", "Romans", 46, 16, ["rom", "rm"]),
    book!("1CO", "1 Corinthians", 47, 16, ["1cor", "1 cor"]),
    book!("2CO", "2 Corinthians", 48, 13, ["2cor", "2 cor"]),
    book!("GAL", "Galatians", 49, 6, ["gal", "ga"]),
    book!("EPH", "Ephesians", 50, 6, ["eph"]),
    book!("PHP", "Philippians", 51, 4, ["phil", "php", "pp"]),
    book!("COL", "Colossians", 52, 4, ["col"]),
    book!("1TH", "1 Thessalonians", 53, 5, ["1thess", "1 thess", "1th"]),
    book!("2TH", "2 Thessalonians", 54, 3, ["2thess", "2 thess", "2th"]),
    book!("1TI", "1 Timothy", 55, 6, ["1tim", "1 tim", "1ti"]),
    book!("2TI", "2 Timothy", 56, 4, ["2tim", "2 tim", "2ti"]),
    book!("TIT", "Titus", 57, 3, ["tit"]),
    book!("PHM", "Philemon", 58, 1, ["philem", "phm", "phlm"]),
    book!("HEB", "Hebrews", 59, 13, ["heb"]),
    book!("JAS", "James", 60, 5, ["jas", "jm"]),
    book!("1PE", "1 Peter", 61, 5, ["1pet", "1 pet", "1pt"]),
    book!("2PE", "2 Peter", 62, 3, ["2pet", "2 pet", "2pt"]),
    book!("1JN", "1 John", 63, 5, ["1jn", "1 jn", "1jhn"]),
    book!("2JN", "2 John", 64, 1, ["2jn", "2 jn", "2jhn"]),
    book!("3JN", "3 John", 65, 1, ["3jn", "3 jn", "3jhn"]),
    book!("JUD", "Jude", 66, 1, ["jud", "jd"]),
    book!("REV", "Revelation", 67, 22, ["rev", "rv", "revelations", "apocalypse"]),
];

/// Lowercases and drops dots and whitespace so `1 Cor.` and `1cor` compare equal.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .flat_map(char::to_lowercase)
        .collect()
}

static INDEX: LazyLock<HashMap<String, &'static Book>> = LazyLock::new(|| {
    let mut index = HashMap::new();
    for book in BOOKS.iter() {
        index.insert(normalize(book.code), book);
        index.insert(normalize(book.name), book);
        for alias in book.aliases {
            index.insert(normalize(alias), book);
        }
    }
    index
});

/// Resolve a book name, USFM code, or common abbreviation, case-insensitively.
pub fn lookup(name: &str) -> Option<&'static Book> {
    INDEX.get(&normalize(name)).copied()
}
