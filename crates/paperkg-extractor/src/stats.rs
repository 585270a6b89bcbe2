//! Statistics over an output directory

use crate::error::ExtractorError;
use crate::run_log::count_graph_elements;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Counts for one extracted document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    /// Output file
    pub path: PathBuf,

    /// Entities in the graph
    pub entities: usize,

    /// Relations in the graph
    pub relations: usize,
}

/// Counts over every output file found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputStats {
    /// Readable outputs, sorted by path
    pub documents: Vec<DocumentStats>,

    /// Files that could not be read or parsed
    pub malformed: Vec<PathBuf>,
}

impl OutputStats {
    /// Scan `output_dir` recursively for `*.json` outputs
    ///
    /// Failure markers and raw outputs are ignored. Unreadable or malformed
    /// JSON files are listed in [`malformed`](Self::malformed) instead of
    /// failing the scan.
    ///
    /// # Errors
    ///
    /// [`ExtractorError::Config`] if `output_dir` is not a directory.
    pub fn collect(output_dir: &Path) -> Result<Self, ExtractorError> {
        if !output_dir.is_dir() {
            return Err(ExtractorError::Config(format!(
                "output directory {} does not exist",
                output_dir.display()
            )));
        }

        let mut files = Vec::new();
        walk_json(output_dir, &mut files)?;
        files.sort();

        let mut stats = Self::default();
        for path in files {
            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| {
                    serde_json::from_str::<serde_json::Value>(&text).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(value) => {
                    let (entities, relations) = count_graph_elements(&value);
                    stats.documents.push(DocumentStats {
                        path,
                        entities,
                        relations,
                    });
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping malformed output");
                    stats.malformed.push(path);
                }
            }
        }

        debug!(
            documents = stats.documents.len(),
            malformed = stats.malformed.len(),
            "Output scan complete"
        );
        Ok(stats)
    }

    /// Sum of entities over all documents
    pub fn total_entities(&self) -> usize {
        self.documents.iter().map(|d| d.entities).sum()
    }

    /// Sum of relations over all documents
    pub fn total_relations(&self) -> usize {
        self.documents.iter().map(|d| d.relations).sum()
    }

    /// Mean entities per document, 0 when there are none
    pub fn mean_entities(&self) -> f64 {
        if self.documents.is_empty() {
            0.0
        } else {
            self.total_entities() as f64 / self.documents.len() as f64
        }
    }
}

fn walk_json(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ExtractorError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ExtractorError::file(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| ExtractorError::file(dir, e))?.path();
        if path.is_dir() {
            walk_json(&path, files)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_counts_and_malformed() {
        let dir = TempDir::new().unwrap();
        let priority = dir.path().join("priority");
        let general = dir.path().join("general");
        fs::create_dir_all(&priority).unwrap();
        fs::create_dir_all(&general).unwrap();

        fs::write(priority.join("a.json"), r#"{"entities": [1, 2], "relations": [1]}"#).unwrap();
        fs::write(general.join("b.json"), r#"{"entities": {"X": [1, 2, 3]}, "relations": []}"#).unwrap();
        fs::write(general.join("c.json"), "not json").unwrap();
        fs::write(general.join("c.failed.txt"), "failed_at: now").unwrap();
        fs::write(general.join("c.raw.txt"), "not json").unwrap();

        let stats = OutputStats::collect(dir.path()).unwrap();
        assert_eq!(stats.documents.len(), 2);
        assert_eq!(stats.malformed, vec![general.join("c.json")]);
        assert_eq!(stats.total_entities(), 5);
        assert_eq!(stats.total_relations(), 1);
        assert_eq!(stats.mean_entities(), 2.5);
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let stats = OutputStats::collect(dir.path()).unwrap();
        assert!(stats.documents.is_empty());
        assert_eq!(stats.mean_entities(), 0.0);
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(OutputStats::collect(&dir.path().join("nope")).is_err());
    }
}
