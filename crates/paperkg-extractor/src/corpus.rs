//! Corpus discovery
//!
//! Papers live as Markdown files under `priority/` and `general/`. A corpus
//! without either subdirectory is treated as all-general.

use crate::error::ExtractorError;
use paperkg_domain::{Category, DocumentSource};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Documents found in a papers directory, each list sorted by file name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    /// Documents under `priority/`
    pub priority: Vec<DocumentSource>,

    /// Documents under `general/` not also present in `priority/`
    pub general: Vec<DocumentSource>,
}

impl Corpus {
    /// Scan `papers_dir`
    ///
    /// # Errors
    ///
    /// [`ExtractorError::Config`] if `papers_dir` is not a directory, or an
    /// I/O error while listing it.
    pub fn discover(papers_dir: &Path) -> Result<Self, ExtractorError> {
        if !papers_dir.is_dir() {
            return Err(ExtractorError::Config(format!(
                "papers directory {} does not exist",
                papers_dir.display()
            )));
        }

        let priority_dir = papers_dir.join(Category::Priority.as_str());
        let general_dir = papers_dir.join(Category::General.as_str());

        if !priority_dir.is_dir() && !general_dir.is_dir() {
            debug!(dir = %papers_dir.display(), "No category subdirectories, treating all papers as general");
            let general = list_markdown(papers_dir, Category::General)?;
            return Ok(Self {
                priority: Vec::new(),
                general,
            });
        }

        let priority = if priority_dir.is_dir() {
            list_markdown(&priority_dir, Category::Priority)?
        } else {
            Vec::new()
        };

        let priority_names: HashSet<String> = priority.iter().map(|d| d.file_name()).collect();
        let mut general = if general_dir.is_dir() {
            list_markdown(&general_dir, Category::General)?
        } else {
            Vec::new()
        };
        let before = general.len();
        general.retain(|d| !priority_names.contains(&d.file_name()));
        if general.len() < before {
            info!(
                "Dropped {} general papers already present in priority",
                before - general.len()
            );
        }

        Ok(Self { priority, general })
    }

    /// Drop the general documents
    pub fn only_priority(mut self) -> Self {
        self.general.clear();
        self
    }

    /// Total number of documents
    pub fn len(&self) -> usize {
        self.priority.len() + self.general.len()
    }

    /// Whether no documents were found
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn list_markdown(dir: &Path, category: Category) -> Result<Vec<DocumentSource>, ExtractorError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ExtractorError::file(dir, e))?;

    let mut docs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ExtractorError::file(dir, e))?.path();
        let is_markdown = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
        if !path.is_file() || !is_markdown {
            continue;
        }
        if let Some(source) = DocumentSource::from_path(path, category) {
            docs.push(source);
        }
    }

    docs.sort_by_key(|d| d.file_name());
    Ok(docs)
}
