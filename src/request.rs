//! The immutable input of one generation run.

use crate::error::Text2PptxError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of slides when the caller does not ask for a count.
pub const DEFAULT_SLIDE_COUNT: usize = 5;

/// Longest prefix of the request text kept in task records.
const ECHO_TEXT_CHARS: usize = 100;

/// Language of slide titles and content.
///
/// Image prompts are always English regardless of this setting. Tags the
/// crate has no dedicated instructions for are kept as [`Language::Other`]
/// and get a generic instruction naming the tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Chinese,
    English,
    Japanese,
    Other(String),
}

impl Language {
    /// Parse a user-supplied tag. Accepts the native names used by the web
    /// front end (`中文`, `日本語`) as well as common English names and codes.
    pub fn from_tag(tag: &str) -> Self {
        let t = tag.trim();
        match t.to_lowercase().as_str() {
            "中文" | "zh" | "zh-cn" | "chinese" => Language::Chinese,
            "english" | "en" | "en-us" => Language::English,
            "日本語" | "ja" | "japanese" => Language::Japanese,
            _ => Language::Other(t.to_string()),
        }
    }

    /// The canonical tag, as shown to users and echoed in task records.
    pub fn tag(&self) -> &str {
        match self {
            Language::Chinese => "中文",
            Language::English => "English",
            Language::Japanese => "日本語",
            Language::Other(tag) => tag,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Serialize for Language {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Language::from_tag(&tag))
    }
}

/// What to generate.
///
/// # Example
/// ```rust
/// use edgequake_text2pptx::{GenerationRequest, Language};
///
/// let request = GenerationRequest::new("AI in healthcare")
///     .slide_count(3)
///     .language(Language::English)
///     .style("minimalist");
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub text: String,
    pub slide_count: usize,
    pub language: Language,
    /// Appended to every image prompt as `"<prompt>, <style> design style"`.
    pub style: Option<String>,
    /// Base name of the deck file, without extension.
    pub output_name: Option<String>,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            slide_count: DEFAULT_SLIDE_COUNT,
            language: Language::default(),
            style: None,
            output_name: None,
        }
    }

    pub fn slide_count(mut self, n: usize) -> Self {
        self.slide_count = n;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    /// Blank styles are ignored.
    pub fn style(mut self, style: impl Into<String>) -> Self {
        let style = style.into();
        self.style = if style.trim().is_empty() {
            None
        } else {
            Some(style.trim().to_string())
        };
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Reject requests the pipeline cannot start on.
    pub fn validate(&self) -> Result<(), Text2PptxError> {
        if self.text.trim().is_empty() {
            return Err(Text2PptxError::EmptyInput);
        }
        if self.slide_count == 0 {
            return Err(Text2PptxError::InvalidSlideCount {
                count: self.slide_count,
            });
        }
        Ok(())
    }

    /// A copy safe to keep in long-lived task records: the text is cut to
    /// its first 100 characters.
    pub fn echo(&self) -> RequestEcho {
        let text = if self.text.chars().count() > ECHO_TEXT_CHARS {
            let head: String = self.text.chars().take(ECHO_TEXT_CHARS).collect();
            format!("{head}...")
        } else {
            self.text.clone()
        };
        RequestEcho {
            text,
            num_slides: self.slide_count,
            language: self.language.tag().to_string(),
            style: self.style.clone(),
        }
    }
}

/// Redacted request parameters stored with a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEcho {
    pub text: String,
    pub num_slides: usize,
    pub language: String,
    pub style: Option<String>,
}
