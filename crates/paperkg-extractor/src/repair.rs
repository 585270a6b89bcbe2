//! Recover a JSON value from noisy model output
//!
//! Models wrap their answer in Markdown fences, prepend chatter ("Sure! Here
//! is the graph:") or trail explanations after it. Strategies are tried in
//! order and the first strict parse that succeeds wins:
//!
//! 1. the raw text as-is
//! 2. the text with a surrounding code fence (and language tag) removed
//! 3. the first balanced `{...}` / `[...]` span

use crate::error::ExtractorError;
use serde_json::Value;

/// Characters of raw output kept in a parse error
const PREVIEW_CHARS: usize = 200;

/// Language tags that may follow an opening fence
const FENCE_LANGUAGES: &[&str] = &["json", "js", "javascript"];

/// Parse model output into JSON, repairing common wrapping noise
///
/// # Errors
///
/// - [`ExtractorError::EmptyContent`] for empty or whitespace-only input
/// - [`ExtractorError::Parse`] when no strategy yields valid JSON
///
/// # Examples
///
/// ```
/// use paperkg_extractor::repair::parse_model_json;
///
/// let value = parse_model_json("Sure! {\"entities\": []} Hope this helps.").unwrap();
/// assert!(value["entities"].is_array());
/// ```
pub fn parse_model_json(raw: &str) -> Result<Value, ExtractorError> {
    if raw.trim().is_empty() {
        return Err(ExtractorError::EmptyContent);
    }

    if let Ok(value) = serde_json::from_str(raw) {
        return Ok(value);
    }

    if let Some(inner) = strip_code_fences(raw) {
        if let Ok(value) = serde_json::from_str(inner) {
            return Ok(value);
        }
    }

    if let Some(span) = first_balanced_span(raw) {
        if let Ok(value) = serde_json::from_str(span) {
            return Ok(value);
        }
    }

    Err(ExtractorError::Parse {
        length: raw.chars().count(),
        preview: raw.chars().take(PREVIEW_CHARS).collect(),
    })
}

/// Remove a surrounding triple-backtick fence
///
/// Applies only when the trimmed text both starts and ends with a fence.
/// A first inner line consisting of a known language tag is dropped.
/// Returns `None` when the text is not fenced.
pub fn strip_code_fences(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.len() < 6 || !trimmed.starts_with("```") || !trimmed.ends_with("```") {
        return None;
    }

    let inner = trimmed[3..trimmed.len() - 3].trim();
    if let Some((first_line, rest)) = inner.split_once('\n') {
        let tag = first_line.trim().to_lowercase();
        if FENCE_LANGUAGES.contains(&tag.as_str()) {
            return Some(rest);
        }
    }
    Some(inner)
}

/// Find the first balanced object or array span
///
/// Scans from the earliest `{` or `[` with a bracket stack, ignoring
/// brackets inside single- or double-quoted strings (backslash escapes
/// respected). A mismatched closing bracket or unterminated span yields
/// `None`; later candidates are not tried.
pub fn first_balanced_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
                if stack.is_empty() {
                    let end = start + offset + c.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}
