//! Content entries shown in a display instance

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One piece of content held by a display instance.
///
/// `path` is empty when the content has no backing file (piped input).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub content: String,
}

impl ContentEntry {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            content: content.into(),
        }
    }

    /// Read a file into an entry. The stored path is absolute and the name
    /// defaults to the file name.
    pub fn from_file(path: &Path, name: Option<&str>) -> io::Result<Self> {
        let abs_path = std::path::absolute(path)?;
        let content = std::fs::read_to_string(&abs_path)?;
        let name = match name.filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => abs_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        Ok(Self {
            name,
            path: abs_path.to_string_lossy().into_owned(),
            content,
        })
    }

    /// Read piped content into a path-less entry named `stdin` by default.
    pub fn from_reader(mut reader: impl Read, name: Option<&str>) -> io::Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Ok(Self {
            name: name.filter(|n| !n.is_empty()).unwrap_or("stdin").to_string(),
            path: String::new(),
            content,
        })
    }

    /// Whether this entry is backed by a file on disk
    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }

    /// Directory containing the backing file, used to resolve relative URLs.
    pub fn base_dir(&self) -> Option<PathBuf> {
        if !self.has_path() {
            return None;
        }
        Path::new(&self.path).parent().map(Path::to_path_buf)
    }
}

/// Index at which `name` must be inserted to keep `entries` sorted by name.
///
/// Lands after any existing entries with an equal name, so insertion is stable.
pub(crate) fn sorted_insert_position(entries: &[ContentEntry], name: &str) -> usize {
    entries.partition_point(|e| e.name.as_str() <= name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_dir() {
        let entry = ContentEntry::new("a", "/tmp/site/a.html", "");
        assert_eq!(entry.base_dir(), Some(PathBuf::from("/tmp/site")));

        let piped = ContentEntry::new("stdin", "", "<p>hi</p>");
        assert_eq!(piped.base_dir(), None);
    }

    #[test]
    fn test_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("page.html");
        std::fs::write(&path, "<h1>hi</h1>").unwrap();

        let entry = ContentEntry::from_file(&path, None).unwrap();
        assert_eq!(entry.name, "page.html");
        assert_eq!(entry.content, "<h1>hi</h1>");
        assert!(Path::new(&entry.path).is_absolute());

        let named = ContentEntry::from_file(&path, Some("Report")).unwrap();
        assert_eq!(named.name, "Report");

        assert!(ContentEntry::from_file(&temp.path().join("missing.html"), None).is_err());
    }

    #[test]
    fn test_from_reader() {
        let entry = ContentEntry::from_reader("<p>x</p>".as_bytes(), None).unwrap();
        assert_eq!(entry, ContentEntry::new("stdin", "", "<p>x</p>"));

        let named = ContentEntry::from_reader("".as_bytes(), Some("diff")).unwrap();
        assert_eq!(named.name, "diff");
    }

    #[test]
    fn test_sorted_insert_position_is_stable() {
        let entries = vec![
            ContentEntry::new("a", "", ""),
            ContentEntry::new("b", "/1", ""),
            ContentEntry::new("b", "/2", ""),
            ContentEntry::new("d", "", ""),
        ];
        assert_eq!(sorted_insert_position(&entries, "0"), 0);
        assert_eq!(sorted_insert_position(&entries, "b"), 3);
        assert_eq!(sorted_insert_position(&entries, "c"), 3);
        assert_eq!(sorted_insert_position(&entries, "z"), 4);
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let entry: ContentEntry = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert_eq!(entry, ContentEntry::new("x", "", ""));
    }
}
