//! Outline synthesis: turn raw text into an ordered list of [`SlideSpec`]s.
//!
//! One round trip to the language model produces a JSON array of slides.
//! Anything unusable (a failed call, broken JSON, an empty array) degrades
//! to a deterministic placeholder outline of the requested length, so this
//! stage never fails a run.
//!
//! ## Retry Strategy
//!
//! [`ProviderModel`] retries transient provider errors with exponential
//! backoff (`retry_backoff_ms * 2^attempt`): with a 500 ms base and 2
//! retries the waits are 500 ms → 1 s.

use crate::config::GenerationConfig;
use crate::error::Text2PptxError;
use crate::output::{assign_positions, SlideSpec};
use crate::pipeline::postprocess::{ensure_no_text_directive, join_points, strip_code_fences};
use crate::prompts::{self, PLACEHOLDER_IMAGE_PROMPT};
use crate::request::GenerationRequest;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

// ── Language-model capability ────────────────────────────────────────────────

/// A chat model that answers one system + user turn with text.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, Text2PptxError>;
}

/// [`CompletionModel`] over an `edgequake_llm` provider.
pub struct ProviderModel {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
}

impl ProviderModel {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &GenerationConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl CompletionModel for ProviderModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, Text2PptxError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let options = self.options();

        let mut last_err: Option<String> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Outline: retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "Outline: model {}, finish {:?}, {} input tokens, {} output tokens, {:?}",
                        response.model,
                        response.finish_reason,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Err(e) => {
                    let err_msg = format!("{}", e);
                    warn!("Outline: attempt {} failed: {}", attempt + 1, err_msg);
                    last_err = Some(err_msg);
                }
            }
        }

        Err(Text2PptxError::LlmApiError {
            message: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

// ── Synthesis ────────────────────────────────────────────────────────────────

/// The synthesized outline.
#[derive(Debug, Clone)]
pub struct Outline {
    pub slides: Vec<SlideSpec>,
    /// True when the model output was unusable and placeholders were used.
    pub placeholder: bool,
}

/// Produces outlines from a [`CompletionModel`].
pub struct OutlineSynthesizer {
    model: Arc<dyn CompletionModel>,
    system_prompt: Option<String>,
}

impl OutlineSynthesizer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self {
            model,
            system_prompt: None,
        }
    }

    /// Replace the built-in, language-specific system prompt.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Plan `request.slide_count` slides for `request.text`.
    pub async fn synthesize(&self, request: &GenerationRequest) -> Outline {
        let system = self
            .system_prompt
            .clone()
            .unwrap_or_else(|| prompts::system_prompt(&request.language));
        let user = prompts::user_prompt(&request.text, request.slide_count);

        let reply = match self.model.complete(&system, &user).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Outline request failed, using placeholder outline: {}", e);
                return placeholder(request);
            }
        };

        match parse_outline(&reply) {
            Some(slides) => {
                info!("Outline: {} slides planned", slides.len());
                Outline {
                    slides,
                    placeholder: false,
                }
            }
            None => {
                warn!(
                    "Outline response unusable, using placeholder outline: {}",
                    reply.chars().take(200).collect::<String>()
                );
                placeholder(request)
            }
        }
    }
}

fn placeholder(request: &GenerationRequest) -> Outline {
    Outline {
        slides: placeholder_outline(&request.text, request.slide_count),
        placeholder: true,
    }
}

/// `content` may arrive as one delimited string or as a list of points.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Points(Vec<String>),
}

impl RawContent {
    fn into_string(self) -> String {
        match self {
            RawContent::Text(s) => s,
            RawContent::Points(points) => join_points(&points),
        }
    }
}

/// Every field may be missing or `null`.
#[derive(Debug, Deserialize)]
struct RawSlide {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<RawContent>,
    #[serde(default)]
    image_prompt: Option<String>,
}

/// Parse a model reply into normalised slides.
///
/// Returns `None` when the reply is not a non-empty JSON array of objects.
/// Slides are renumbered by position, roles are assigned, and every
/// non-empty image prompt carries the no-text directive.
pub fn parse_outline(reply: &str) -> Option<Vec<SlideSpec>> {
    let body = strip_code_fences(reply);
    let raw: Vec<RawSlide> = serde_json::from_str(&body).ok()?;
    if raw.is_empty() {
        return None;
    }

    let mut slides: Vec<SlideSpec> = raw
        .into_iter()
        .map(|r| {
            SlideSpec::new(
                0,
                r.title.unwrap_or_default().trim(),
                r.content.map(RawContent::into_string).unwrap_or_default().trim(),
                ensure_no_text_directive(&r.image_prompt.unwrap_or_default()),
            )
        })
        .collect();
    assign_positions(&mut slides);
    Some(slides)
}

/// Deterministic outline of exactly `count` slides.
pub fn placeholder_outline(topic: &str, count: usize) -> Vec<SlideSpec> {
    let mut slides: Vec<SlideSpec> = (1..=count)
        .map(|i| {
            let content = if i == 1 {
                topic.to_string()
            } else {
                format!("Content for slide {i}")
            };
            SlideSpec::new(i, format!("Slide {i}"), content, PLACEHOLDER_IMAGE_PROMPT)
        })
        .collect();
    assign_positions(&mut slides);
    slides
}
