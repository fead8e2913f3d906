//! Markdown articles: dictionary terms and training modules.

use serde::Serialize;

use super::archive::ArchiveReader;
use crate::error::Result;

/// Category order for training-module ids.
pub const ACADEMY_CATEGORIES: &[&str] = &["translate", "process", "checking", "intro"];

/// Category order for dictionary terms.
pub const WORD_CATEGORIES: &[&str] = &["kt", "names", "other"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownArticle {
    pub content: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Text of the first level-1 heading.
pub fn first_heading(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

/// How a caller named an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleId {
    /// Bare id searched across `categories`, e.g. `figs-metaphor` or `god`.
    Search {
        id: String,
        categories: Vec<String>,
        /// Directory prefix the categories live under (`bible` for words).
        root: Option<String>,
    },
    /// Inner path, either a directory or a `.md` file.
    Path(String),
}

impl ArticleId {
    pub fn module(id: &str) -> Self {
        Self::Search {
            id: id.trim().to_string(),
            categories: ACADEMY_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            root: None,
        }
    }

    pub fn word(term: &str, category: Option<&str>) -> Self {
        let categories = match category {
            Some(category) => vec![category.trim().to_string()],
            None => WORD_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        };
        Self::Search {
            id: term.trim().to_lowercase(),
            categories,
            root: Some("bible".to_string()),
        }
    }

    /// Interpret a user-supplied identifier: an RC link, a path, or an id.
    pub fn parse(identifier: &str) -> Self {
        let identifier = identifier.trim();
        if let Some(path) = rc_link_path(identifier) {
            return Self::Path(path);
        }
        if identifier.contains('/') {
            return Self::Path(identifier.trim_matches('/').to_string());
        }
        Self::module(identifier)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Search { id, .. } => id.clone(),
            Self::Path(path) => path.clone(),
        }
    }
}

/// Inner path of an RC link.
///
/// `rc://*/ta/man/translate/figs-metaphor` → `translate/figs-metaphor`,
/// `rc://en/tw/dict/bible/kt/god` → `bible/kt/god.md`.
pub fn rc_link_path(link: &str) -> Option<String> {
    let rest = link.trim().strip_prefix("rc://")?;
    let mut parts = rest.split('/');
    let _language = parts.next()?;
    let resource = parts.next()?;
    let _container_type = parts.next()?;
    let path: Vec<&str> = parts.filter(|p| !p.is_empty()).collect();
    if path.is_empty() {
        return None;
    }
    let path = path.join("/");
    match resource {
        "tw" if !path.ends_with(".md") => Some(format!("{path}.md")),
        _ => Some(path),
    }
}

/// Ordered category search: `Searching(index) → Found | Exhausted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    Searching(usize),
    Found { category: String, article: MarkdownArticle },
    Exhausted,
}

#[derive(Debug)]
pub struct CategorySearch<'a> {
    categories: &'a [String],
    state: SearchState,
}

impl<'a> CategorySearch<'a> {
    pub fn new(categories: &'a [String]) -> Self {
        let state = if categories.is_empty() {
            SearchState::Exhausted
        } else {
            SearchState::Searching(0)
        };
        Self { categories, state }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Probe the current category and advance.
    pub fn step<F>(&mut self, probe: &mut F) -> Result<&SearchState>
    where
        F: FnMut(&str) -> Result<Option<MarkdownArticle>>,
    {
        if let SearchState::Searching(index) = self.state {
            let category = &self.categories[index];
            self.state = match probe(category)? {
                Some(article) if !article.content.trim().is_empty() => SearchState::Found {
                    category: category.clone(),
                    article,
                },
                _ if index + 1 < self.categories.len() => SearchState::Searching(index + 1),
                _ => SearchState::Exhausted,
            };
        }
        Ok(&self.state)
    }

    pub fn run<F>(mut self, mut probe: F) -> Result<Option<MarkdownArticle>>
    where
        F: FnMut(&str) -> Result<Option<MarkdownArticle>>,
    {
        while matches!(self.state, SearchState::Searching(_)) {
            self.step(&mut probe)?;
        }
        Ok(match self.state {
            SearchState::Found { article, .. } => Some(article),
            _ => None,
        })
    }
}

/// Read the article at `path` from `reader`.
///
/// A `.md` path (or `path.md`) is a single file; a directory is every
/// markdown file under it joined in path order. Returns `None` when nothing
/// is there.
pub fn read_article(reader: &mut ArchiveReader, path: &str) -> Result<Option<MarkdownArticle>> {
    let path = path.trim_matches('/');

    let file = if path.ends_with(".md") {
        path.to_string()
    } else {
        format!("{path}.md")
    };
    if reader.contains(&file) {
        let content = reader.read_to_string(&file)?;
        let title = first_heading(&content);
        return Ok(Some(MarkdownArticle {
            content,
            path: file,
            title,
        }));
    }

    let files = reader.files_under(path, ".md");
    if files.is_empty() {
        return Ok(None);
    }

    let mut parts = Vec::with_capacity(files.len());
    let mut title_file = None;
    for file in &files {
        let text = reader.read_to_string(file)?;
        if file.ends_with("/title.md") {
            title_file = Some(text.trim().to_string()).filter(|t| !t.is_empty());
        }
        parts.push(text.trim_end().to_string());
    }
    let content = parts.join("\n\n");
    let title = first_heading(&content).or(title_file);

    Ok(Some(MarkdownArticle {
        content,
        path: path.to_string(),
        title,
    }))
}

/// Listing of every article in the archive, used when no identifier is given.
///
/// Training modules are listed as `category/module`, dictionary terms as
/// `category/term`.
pub fn table_of_contents(reader: &ArchiveReader, words: bool) -> MarkdownArticle {
    let mut entries: Vec<String> = reader
        .paths()
        .iter()
        .filter_map(|path| {
            let parts: Vec<&str> = path.split('/').collect();
            match (words, parts.as_slice()) {
                (true, ["bible", category, file]) => file
                    .strip_suffix(".md")
                    .map(|term| format!("{category}/{term}")),
                (false, [category, module, _]) if ACADEMY_CATEGORIES.contains(category) => {
                    Some(format!("{category}/{module}"))
                }
                _ => None,
            }
        })
        .collect();
    entries.dedup();

    let title = if words {
        "Translation Words"
    } else {
        "Translation Academy"
    };
    let mut content = format!("# {title}\n\n");
    for entry in &entries {
        content.push_str(&format!("- {entry}\n"));
    }

    MarkdownArticle {
        content,
        path: String::new(),
        title: Some(title.to_string()),
    }
}

/// Resolve `id` inside `reader`.
pub fn find_article(reader: &mut ArchiveReader, id: &ArticleId) -> Result<Option<MarkdownArticle>> {
    match id {
        ArticleId::Path(path) => read_article(reader, path),
        ArticleId::Search {
            id,
            categories,
            root,
        } => CategorySearch::new(categories).run(|category| {
            let path = match root {
                Some(root) => format!("{root}/{category}/{id}"),
                None => format!("{category}/{id}"),
            };
            read_article(reader, &path)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::zip_archive;

    fn academy() -> ArchiveReader {
        let bytes = zip_archive(&[
            ("en_ta/checking/figs-metaphor/01.md", ""),
            ("en_ta/process/figs-metaphor/01.md", "   \n"),
            ("en_ta/translate/figs-metaphor/01.md", "A metaphor is a figure of speech.\n"),
            ("en_ta/translate/figs-metaphor/sub-title.md", "What is a metaphor?\n"),
            ("en_ta/translate/figs-metaphor/title.md", "Metaphor\n"),
            ("en_ta/intro/ta-intro/01.md", "# Introduction\n\nWelcome.\n"),
            ("en_ta/process/only-process/01.md", "Process text.\n"),
        ]);
        ArchiveReader::from_bytes("en_ta", bytes).unwrap()
    }

    #[test]
    fn directory_articles_concatenate_in_path_order() {
        let mut reader = academy();
        let article = read_article(&mut reader, "translate/figs-metaphor").unwrap().unwrap();
        assert_eq!(
            article.content,
            "A metaphor is a figure of speech.\n\nWhat is a metaphor?\n\nMetaphor"
        );
        assert_eq!(article.title.as_deref(), Some("Metaphor"));
        assert_eq!(article.path, "translate/figs-metaphor");
    }

    #[test]
    fn category_search_takes_first_non_empty_in_order() {
        let mut reader = academy();
        let mut probed = Vec::new();
        let categories: Vec<String> = ACADEMY_CATEGORIES.iter().map(|c| c.to_string()).collect();
        let article = CategorySearch::new(&categories)
            .run(|category| {
                probed.push(category.to_string());
                read_article(&mut reader, &format!("{category}/only-process"))
            })
            .unwrap()
            .unwrap();
        assert_eq!(article.path, "process/only-process");
        assert_eq!(probed, ["translate", "process"]);
    }

    #[test]
    fn search_states_advance_to_exhausted() {
        let categories = vec!["a".to_string(), "b".to_string()];
        let mut search = CategorySearch::new(&categories);
        let mut probe = |_: &str| -> Result<Option<MarkdownArticle>> { Ok(None) };
        assert_eq!(search.step(&mut probe).unwrap(), &SearchState::Searching(1));
        assert_eq!(search.step(&mut probe).unwrap(), &SearchState::Exhausted);
        assert_eq!(search.step(&mut probe).unwrap(), &SearchState::Exhausted);
        assert_eq!(CategorySearch::new(&[]).state(), &SearchState::Exhausted);
    }

    #[test]
    fn headings_win_over_title_files() {
        let mut reader = academy();
        let article = find_article(&mut reader, &ArticleId::module("ta-intro")).unwrap().unwrap();
        assert_eq!(article.title.as_deref(), Some("Introduction"));
    }

    #[test]
    fn words_search_under_bible() {
        let bytes = zip_archive(&[
            ("en_tw/bible/kt/god.md", "# God\n\n## Definition:\n\nThe one true God.\n"),
            ("en_tw/bible/names/paul.md", "# Paul, Saul\n"),
        ]);
        let mut reader = ArchiveReader::from_bytes("en_tw", bytes).unwrap();
        let god = find_article(&mut reader, &ArticleId::word("God", None)).unwrap().unwrap();
        assert_eq!(god.path, "bible/kt/god.md");
        assert_eq!(god.title.as_deref(), Some("God"));

        let limited = find_article(&mut reader, &ArticleId::word("paul", Some("kt"))).unwrap();
        assert!(limited.is_none());
    }

    #[test]
    fn table_of_contents_lists_modules_once() {
        let reader = academy();
        let toc = table_of_contents(&reader, false);
        assert!(toc.content.starts_with("# Translation Academy\n"));
        assert_eq!(toc.content.matches("- translate/figs-metaphor\n").count(), 1);
        assert!(toc.content.contains("- intro/ta-intro\n"));
    }

    #[test]
    fn rc_links_resolve_to_inner_paths() {
        assert_eq!(
            rc_link_path("rc://*/ta/man/translate/figs-metaphor").as_deref(),
            Some("translate/figs-metaphor")
        );
        assert_eq!(
            rc_link_path("rc://en/tw/dict/bible/kt/god").as_deref(),
            Some("bible/kt/god.md")
        );
        assert_eq!(rc_link_path("https://example.org"), None);
        assert_eq!(
            ArticleId::parse("rc://*/ta/man/translate/figs-metaphor"),
            ArticleId::Path("translate/figs-metaphor".into())
        );
        assert_eq!(ArticleId::parse("figs-metaphor"), ArticleId::module("figs-metaphor"));
    }
}
