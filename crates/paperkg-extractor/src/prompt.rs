//! Prompt template resolution and filling

use crate::error::ExtractorError;
use paperkg_domain::{Category, Document};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Replaced by the document text
pub const FULL_TEXT_PLACEHOLDER: &str = "{full_text_placeholder}";

/// Replaced by the schema vocabulary
pub const SCHEMA_PLACEHOLDER: &str = "{schema_placeholder}";

/// Alternative spelling of [`SCHEMA_PLACEHOLDER`]
pub const SCHEMA_JSON_PLACEHOLDER: &str = "{schema_json_placeholder}";

/// File names tried, in order, for the global default template
const DEFAULT_CANDIDATES: &[&str] = &["prompt.txt", "prompt_default.txt", "default_prompt.txt"];

/// Prefix of per-document template files
const PER_DOCUMENT_PREFIX: &str = "prompt_";

/// Where a resolved template came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    /// `prompt_<id>.txt` for a priority document
    PerDocument(PathBuf),

    /// Explicitly configured template
    Override(PathBuf),

    /// Global default template
    Default(PathBuf),
}

impl PromptSource {
    /// Path of the template file
    pub fn path(&self) -> &Path {
        match self {
            PromptSource::PerDocument(p) | PromptSource::Override(p) | PromptSource::Default(p) => p,
        }
    }

    /// Short kind label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            PromptSource::PerDocument(_) => "per_document",
            PromptSource::Override(_) => "override",
            PromptSource::Default(_) => "default",
        }
    }
}

impl fmt::Display for PromptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .path()
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        write!(f, "{}:{}", self.kind(), name)
    }
}

/// A template and its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    /// Template text with placeholders
    pub template: String,

    /// Where the template was found
    pub source: PromptSource,
}

impl ResolvedPrompt {
    /// Fill this template for `document`
    pub fn fill(&self, document: &Document, schema: Option<&str>, hint: Option<&str>) -> String {
        fill(&self.template, &document.text, schema, hint)
    }
}

/// Locates the template for each document
///
/// Resolution order: per-document template (priority documents only),
/// explicit override, global default.
#[derive(Debug, Clone)]
pub struct PromptResolver {
    prompt_dir: PathBuf,
    override_path: Option<PathBuf>,
    default_path: Option<PathBuf>,
}

impl PromptResolver {
    /// Create a resolver for templates in `prompt_dir`
    ///
    /// The global default is located once, here.
    pub fn new(prompt_dir: impl Into<PathBuf>) -> Self {
        let prompt_dir = prompt_dir.into();
        let default_path = locate_default(&prompt_dir);
        match &default_path {
            Some(path) => debug!(path = %path.display(), "Default prompt template located"),
            None => debug!(dir = %prompt_dir.display(), "No default prompt template"),
        }
        Self {
            prompt_dir,
            override_path: None,
            default_path,
        }
    }

    /// Use an explicit template file ahead of the default
    ///
    /// Relative paths are resolved against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractorError::Config`] when the resolved file does not exist.
    pub fn with_override(mut self, path: &Path, base_dir: &Path) -> Result<Self, ExtractorError> {
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        };
        if !resolved.is_file() {
            return Err(ExtractorError::Config(format!(
                "prompt override {} does not exist",
                resolved.display()
            )));
        }
        self.override_path = Some(resolved);
        Ok(self)
    }

    /// Directory searched for templates
    pub fn prompt_dir(&self) -> &Path {
        &self.prompt_dir
    }

    /// Whether some template applies to documents without their own file
    pub fn has_fallback(&self) -> bool {
        self.override_path.is_some() || self.default_path.is_some()
    }

    /// Resolve the template for a document
    ///
    /// Empty template files are treated as missing.
    ///
    /// # Errors
    ///
    /// [`ExtractorError::PromptNotFound`] when no level resolves.
    pub fn resolve(&self, document: &Document) -> Result<ResolvedPrompt, ExtractorError> {
        self.resolve_for(&document.id, document.category, &document.relative_path)
    }

    fn resolve_for(
        &self,
        id: &str,
        category: Category,
        relative_path: &str,
    ) -> Result<ResolvedPrompt, ExtractorError> {
        if category.is_priority() {
            let path = self.prompt_dir.join(format!("{}{}.txt", PER_DOCUMENT_PREFIX, id));
            if let Some(template) = read_template(&path)? {
                return Ok(ResolvedPrompt {
                    template,
                    source: PromptSource::PerDocument(path),
                });
            }
        }

        if let Some(path) = &self.override_path {
            if let Some(template) = read_template(path)? {
                return Ok(ResolvedPrompt {
                    template,
                    source: PromptSource::Override(path.clone()),
                });
            }
        }

        if let Some(path) = &self.default_path {
            if let Some(template) = read_template(path)? {
                return Ok(ResolvedPrompt {
                    template,
                    source: PromptSource::Default(path.clone()),
                });
            }
        }

        Err(ExtractorError::PromptNotFound {
            document: relative_path.to_string(),
        })
    }
}

/// Read a template, returning `None` for missing or blank files
fn read_template(path: &Path) -> Result<Option<String>, ExtractorError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| ExtractorError::file(path, e))?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(text))
}

/// Find the global default template in `dir`
///
/// Tries the fixed candidate names, then the only `.txt` file that is not a
/// per-document template.
fn locate_default(dir: &Path) -> Option<PathBuf> {
    for name in DEFAULT_CANDIDATES {
        let path = dir.join(name);
        if path.is_file() {
            return Some(path);
        }
    }

    let entries = std::fs::read_dir(dir).ok()?;
    let mut txts: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("txt")))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with(PER_DOCUMENT_PREFIX))
        })
        .collect();

    if txts.len() == 1 {
        txts.pop()
    } else {
        None
    }
}

/// Substitute document text and schema into a template
///
/// Missing placeholders are compensated by appending the content under a
/// `[Full text]` or `[Schema]` heading; `hint` is appended last.
///
/// # Examples
///
/// ```
/// use paperkg_extractor::prompt::fill;
///
/// let filled = fill("Extract from: {full_text_placeholder}", "paper body", None, None);
/// assert_eq!(filled, "Extract from: paper body");
///
/// let appended = fill("Extract entities.", "paper body", Some("{}"), None);
/// assert_eq!(appended, "Extract entities.\n\n[Full text]\npaper body\n\n[Schema]\n{}");
/// ```
pub fn fill(template: &str, full_text: &str, schema: Option<&str>, hint: Option<&str>) -> String {
    let schema_text = schema.unwrap_or("");
    let has_schema_placeholder =
        template.contains(SCHEMA_PLACEHOLDER) || template.contains(SCHEMA_JSON_PLACEHOLDER);
    let has_text_placeholder = template.contains(FULL_TEXT_PLACEHOLDER);

    let mut filled = template
        .replace(SCHEMA_PLACEHOLDER, schema_text)
        .replace(SCHEMA_JSON_PLACEHOLDER, schema_text);

    if has_text_placeholder {
        filled = filled.replace(FULL_TEXT_PLACEHOLDER, full_text);
    } else {
        filled.push_str("\n\n[Full text]\n");
        filled.push_str(full_text);
    }

    if !has_schema_placeholder && !schema_text.is_empty() {
        filled.push_str("\n\n[Schema]\n");
        filled.push_str(schema_text);
    }

    if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
        filled.push_str("\n\n");
        filled.push_str(hint);
    }

    filled
}
