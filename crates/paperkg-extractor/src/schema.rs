//! Schema vocabulary loading
//!
//! The schema file is a JSON document describing the entity and relation
//! types the model should use. Only the configured top-level fields are
//! forwarded into prompts.

use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Fields kept from the schema file unless configured otherwise
pub const DEFAULT_SCHEMA_FIELDS: &[&str] = &["entity_types", "relation_types"];

/// Split a comma-separated field list, dropping blanks
///
/// # Examples
///
/// ```
/// use paperkg_extractor::schema::parse_field_list;
///
/// assert_eq!(parse_field_list(" entity_types, ,relation_types "), vec!["entity_types", "relation_types"]);
/// ```
pub fn parse_field_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load the schema file and render the selected fields as pretty JSON
///
/// Returns `None` when the file does not exist, cannot be read, or is not
/// valid JSON; the latter two are logged as warnings. When none of `fields`
/// is present the whole document is used.
pub fn load_schema_text(path: &Path, fields: &[String]) -> Option<String> {
    if !path.exists() {
        debug!(path = %path.display(), "No schema file, prompts will carry no schema");
        return None;
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read schema file");
            return None;
        }
    };

    let value: Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Schema file is not valid JSON");
            return None;
        }
    };

    render_schema(&value, fields)
}

/// Filter `value` to `fields` and pretty-print it
pub fn render_schema(value: &Value, fields: &[String]) -> Option<String> {
    let selected = match value {
        Value::Object(map) => {
            let mut picked = Map::new();
            for field in fields {
                if let Some(v) = map.get(field) {
                    picked.insert(field.clone(), v.clone());
                }
            }
            if picked.is_empty() {
                value.clone()
            } else {
                Value::Object(picked)
            }
        }
        other => other.clone(),
    };
    serde_json::to_string_pretty(&selected).ok()
}
