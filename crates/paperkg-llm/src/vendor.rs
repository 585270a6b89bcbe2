//! Vendor presets
//!
//! The three supported vendors all expose OpenAI-compatible chat-completion
//! endpoints; they differ in base URL, default model, where the API key is
//! read from, and how they phrase a rejected `response_format`.

use crate::client::{RequestOptions, TokenBudget};
use crate::LlmError;
use std::fmt;
use std::str::FromStr;

/// System message sent with every extraction request
const EXTRACTION_SYSTEM_PROMPT: &str = "You are an information extraction assistant. \
Output only a strict, parseable JSON object. Do not add explanations or Markdown code fences.";

/// Output instructions appended to DeepSeek prompts, which need the word
/// "json" in the prompt for JSON mode to engage
const DEEPSEEK_JSON_HINT: &str = "\n\n[JSON output requirements]\n\
- Output only a strictly valid json object, with no explanation, prefix, suffix or Markdown code fence.\n\
- Use sensible empty values (empty string, empty array or null) for missing fields so the output stays parseable.\n\
- Encode as UTF-8.\n";

/// LLM vendors supported by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    /// DeepSeek (api.deepseek.com)
    DeepSeek,

    /// Gemini through the hiapi.online OpenAI-compatible gateway
    Gemini,

    /// Kimi / Moonshot (api.moonshot.cn)
    Kimi,
}

impl Vendor {
    /// All vendors, in display order
    pub const ALL: [Vendor; 3] = [Vendor::DeepSeek, Vendor::Gemini, Vendor::Kimi];

    /// Vendor name as used in directory names and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::DeepSeek => "deepseek",
            Vendor::Gemini => "gemini",
            Vendor::Kimi => "kimi",
        }
    }

    /// Default API base URL (without the `/chat/completions` suffix)
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Vendor::DeepSeek => "https://api.deepseek.com",
            Vendor::Gemini => "https://hiapi.online/v1",
            Vendor::Kimi => "https://api.moonshot.cn/v1",
        }
    }

    /// Default model identifier
    pub fn default_model(&self) -> &'static str {
        match self {
            Vendor::DeepSeek => "deepseek-chat",
            Vendor::Gemini => "gemini-2.5-pro",
            Vendor::Kimi => "moonshot-v1-128k",
        }
    }

    /// Environment variables consulted for the API key, highest priority first
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            Vendor::DeepSeek => &["DEEPSEEK_API_KEY"],
            Vendor::Gemini => &["HIAPI_API_KEY", "GEMINI_API_KEY", "OPENAI_API_KEY", "API_KEY"],
            Vendor::Kimi => &["KIMI_API_KEY", "MOONSHOT_API_KEY"],
        }
    }

    /// Lowercase error-text fragments meaning "JSON mode not supported"
    pub fn unsupported_mode_markers(&self) -> &'static [&'static str] {
        match self {
            Vendor::Gemini => &["response_format", "unsupported"],
            Vendor::DeepSeek | Vendor::Kimi => &["response_format", "unsupported"],
        }
    }

    /// Completion token policy
    pub fn token_budget(&self) -> TokenBudget {
        match self {
            Vendor::DeepSeek => TokenBudget::Doubling { base: 2048, cap: 8192 },
            Vendor::Gemini => TokenBudget::Unset,
            Vendor::Kimi => TokenBudget::Fixed(2048),
        }
    }

    /// Output hint appended to every filled prompt, if the vendor needs one
    pub fn json_hint(&self) -> Option<&'static str> {
        match self {
            Vendor::DeepSeek => Some(DEEPSEEK_JSON_HINT),
            Vendor::Gemini | Vendor::Kimi => None,
        }
    }

    /// Request options used for extraction calls
    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            system_prompt: Some(EXTRACTION_SYSTEM_PROMPT.to_string()),
            temperature: Some(0.0),
            token_budget: self.token_budget(),
            prefer_json: true,
        }
    }

    /// Find the API key using `lookup` (usually `std::env::var`)
    ///
    /// Returns the key and the name of the variable it came from.
    ///
    /// # Examples
    ///
    /// ```
    /// use paperkg_llm::Vendor;
    ///
    /// let (key, source) = Vendor::Kimi
    ///     .resolve_api_key(|name| (name == "MOONSHOT_API_KEY").then(|| " sk-abc ".to_string()))
    ///     .unwrap();
    /// assert_eq!(key, "sk-abc");
    /// assert_eq!(source, "MOONSHOT_API_KEY");
    /// ```
    pub fn resolve_api_key<F>(&self, lookup: F) -> Result<(String, &'static str), LlmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for &var in self.api_key_vars() {
            if let Some(value) = lookup(var) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return Ok((trimmed.to_string(), var));
                }
            }
        }
        Err(LlmError::Config(format!(
            "No API key found for {}; set one of: {}",
            self,
            self.api_key_vars().join(", ")
        )))
    }

    /// Check a key/base-URL pairing before any request is sent
    ///
    /// The hiapi.online gateway only issues `sk-` keys; anything else is
    /// almost certainly a key for a different service.
    pub fn check_key(&self, base_url: &str, api_key: &str, source: &str) -> Result<(), LlmError> {
        if base_url.contains("hiapi.online") && !api_key.to_lowercase().starts_with("sk-") {
            return Err(LlmError::Config(format!(
                "base URL {} expects an sk- key, but the key from {} looks different: {}",
                base_url,
                source,
                mask_key(api_key)
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deepseek" => Ok(Vendor::DeepSeek),
            "gemini" | "hiapi" => Ok(Vendor::Gemini),
            "kimi" | "moonshot" => Ok(Vendor::Kimi),
            other => Err(LlmError::UnknownVendor(other.to_string())),
        }
    }
}

/// Normalize a base-URL override: strip trailing slashes and ensure `/v1`
///
/// # Examples
///
/// ```
/// use paperkg_llm::vendor::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://gw.example.com/"), "https://gw.example.com/v1");
/// assert_eq!(normalize_base_url("https://gw.example.com/v1/"), "https://gw.example.com/v1");
/// ```
pub fn normalize_base_url(url: &str) -> String {
    let clean = url.trim().trim_end_matches('/');
    if clean.ends_with("/v1") {
        clean.to_string()
    } else {
        format!("{}/v1", clean)
    }
}

/// Mask an API key for diagnostics, keeping only its first 6 and last 4 chars
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 8 {
        return "***".to_string();
    }
    let head: String = chars[..6.min(chars.len())].iter().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}...{}", head, tail)
}
