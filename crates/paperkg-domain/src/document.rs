//! Document module - the unit of input text (one paper)

use std::fmt;
use std::path::{Path, PathBuf};

/// Category a paper was discovered under
///
/// Priority papers are extracted first and may carry a per-document prompt;
/// general papers always use the shared template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Papers under `priority/`
    Priority,

    /// Papers under `general/` (or at the corpus root)
    General,
}

impl Category {
    /// Get the category name as used in directory names and log paths
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Priority => "priority",
            Category::General => "general",
        }
    }

    /// Parse a category from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "priority" => Some(Category::Priority),
            "general" => Some(Category::General),
            _ => None,
        }
    }

    /// Whether documents of this category may use per-document prompts
    pub fn is_priority(&self) -> bool {
        matches!(self, Category::Priority)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A paper found on disk whose text has not been read yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSource {
    /// Stable identifier (filename stem)
    pub id: String,

    /// Category the file was found under
    pub category: Category,

    /// Path to the text file
    pub path: PathBuf,
}

impl DocumentSource {
    /// Build a source from a file path, deriving the id from the file stem
    ///
    /// Returns `None` if the path has no usable UTF-8 file stem.
    ///
    /// # Examples
    ///
    /// ```
    /// use paperkg_domain::{Category, DocumentSource};
    ///
    /// let src = DocumentSource::from_path("papers/priority/bearing_faults.md", Category::Priority).unwrap();
    /// assert_eq!(src.id, "bearing_faults");
    /// assert_eq!(src.relative_path(), "priority/bearing_faults.md");
    /// ```
    pub fn from_path(path: impl Into<PathBuf>, category: Category) -> Option<Self> {
        let path = path.into();
        let id = path.file_stem()?.to_str()?.to_string();
        if id.is_empty() {
            return None;
        }
        Some(Self { id, category, path })
    }

    /// File name including extension (e.g. `a.md`)
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.id.clone())
    }

    /// Category-relative path used in logs (e.g. `priority/a.md`)
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.category.as_str(), self.file_name())
    }

    /// Attach the document text, producing an immutable [`Document`]
    pub fn with_text(&self, text: String) -> Document {
        Document {
            id: self.id.clone(),
            category: self.category,
            relative_path: self.relative_path(),
            text,
        }
    }

    /// Path of the source file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A paper with its full text, read once per extraction attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable identifier (filename stem)
    pub id: String,

    /// Category the file was found under
    pub category: Category,

    /// Category-relative path (e.g. `priority/a.md`)
    pub relative_path: String,

    /// Full text content
    pub text: String,
}

impl Document {
    /// Whether the document belongs to the priority category
    pub fn is_priority(&self) -> bool {
        self.category.is_priority()
    }
}
