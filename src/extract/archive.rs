use std::io::{Cursor, Read};

use bytes::Bytes;
use zip::ZipArchive;

use crate::cache::CacheEntry;
use crate::error::{ResourceError, Result};

/// Read access to one cached archive.
///
/// Repository archives wrap everything in a single top-level directory
/// (`en_ult/44-JHN.usfm`); paths exposed here are relative to it.
pub struct ArchiveReader {
    zip: ZipArchive<Cursor<Bytes>>,
    label: String,
    prefix: String,
    paths: Vec<String>,
}

impl ArchiveReader {
    pub fn open(entry: &CacheEntry) -> Result<Self> {
        Self::from_bytes(entry.key.to_string(), entry.bytes.clone())
    }

    pub fn from_bytes(label: impl Into<String>, bytes: Bytes) -> Result<Self> {
        let label = label.into();
        let zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ResourceError::parse(format!("archive {label}"), e.to_string()))?;

        let names: Vec<&str> = zip.file_names().collect();
        let prefix = common_root(&names);
        let mut paths: Vec<String> = names
            .iter()
            .filter(|name| !name.ends_with('/'))
            .filter_map(|name| name.strip_prefix(prefix.as_str()))
            .map(str::to_string)
            .collect();
        paths.sort();

        Ok(Self {
            zip,
            label,
            prefix,
            paths,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Relative file paths, sorted.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.binary_search_by(|p| p.as_str().cmp(path)).is_ok()
    }

    /// First path whose file name satisfies `predicate`.
    pub fn find_file<F>(&self, predicate: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        self.paths
            .iter()
            .find(|p| predicate(file_name(p)))
            .cloned()
    }

    /// Files beneath `dir` with the given extension, sorted by path.
    pub fn files_under(&self, dir: &str, extension: &str) -> Vec<String> {
        let dir = format!("{}/", dir.trim_end_matches('/'));
        self.paths
            .iter()
            .filter(|p| p.starts_with(&dir) && p.ends_with(extension))
            .cloned()
            .collect()
    }

    pub fn read_to_string(&mut self, path: &str) -> Result<String> {
        let full = format!("{}{}", self.prefix, path);
        let mut file = self.zip.by_name(&full).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => ResourceError::not_found(self.label.clone(), path),
            other => ResourceError::parse(format!("{} in {}", path, self.label), other.to_string()),
        })?;

        let mut raw = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut raw)
            .map_err(|e| ResourceError::parse(format!("{} in {}", path, self.label), e.to_string()))?;

        let text = String::from_utf8(raw)
            .map_err(|e| ResourceError::parse(format!("{} in {}", path, self.label), e.to_string()))?;
        Ok(text.trim_start_matches('\u{feff}').to_string())
    }
}

pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// The shared top-level directory of every entry, including its slash.
fn common_root(names: &[&str]) -> String {
    let mut roots = names
        .iter()
        .map(|name| name.split_once('/').map(|(root, _)| root));

    match roots.next() {
        Some(Some(first)) if roots.all(|r| r == Some(first)) => format!("{first}/"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::zip_archive;

    #[test]
    fn strips_repository_root() {
        let bytes = zip_archive(&[
            ("en_tw/bible/kt/god.md", "# God\n"),
            ("en_tw/bible/kt/love.md", "# Love\n"),
            ("en_tw/manifest.yaml", "dublin_core: {}\n"),
        ]);
        let mut reader = ArchiveReader::from_bytes("en_tw", bytes).unwrap();
        assert_eq!(
            reader.paths(),
            ["bible/kt/god.md", "bible/kt/love.md", "manifest.yaml"]
        );
        assert!(reader.contains("bible/kt/god.md"));
        assert_eq!(reader.read_to_string("bible/kt/god.md").unwrap(), "# God\n");
        assert_eq!(reader.files_under("bible/kt", ".md").len(), 2);
    }

    #[test]
    fn keeps_flat_archives_as_is() {
        let bytes = zip_archive(&[("a.md", "a"), ("dir/b.md", "b")]);
        let reader = ArchiveReader::from_bytes("flat", bytes).unwrap();
        assert_eq!(reader.paths(), ["a.md", "dir/b.md"]);
    }

    #[test]
    fn missing_entries_are_not_found() {
        let bytes = zip_archive(&[("repo/a.md", "a")]);
        let mut reader = ArchiveReader::from_bytes("repo", bytes).unwrap();
        assert!(reader.read_to_string("b.md").unwrap_err().is_not_found());
    }

    #[test]
    fn corrupt_bytes_are_parse_errors() {
        let err = ArchiveReader::from_bytes("junk", Bytes::from_static(b"definitely not a zip"))
            .err()
            .unwrap();
        assert!(matches!(err, ResourceError::Parse { .. }));
    }
}
