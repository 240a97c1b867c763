//! Configuration types for text-to-deck generation.
//!
//! All generation behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. What to generate (text, slide count,
//! language, style) lives in [`crate::request::GenerationRequest`]; this
//! module only covers *how*: which models to call, where files go, and how
//! tolerant the pipeline is of failures.

use crate::error::Text2PptxError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Base URL of the OpenAI-compatible image endpoint used when none is set.
pub const DEFAULT_IMAGE_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

/// Image model used when neither the config nor `IMAGE_ENDPOINT` name one.
pub const DEFAULT_IMAGE_MODEL: &str = "doubao-seedream-4-5";

/// Requested background size. The provider rejects anything under
/// 3 686 400 pixels, so 16:9 has to start at 2560×1440.
pub const DEFAULT_IMAGE_SIZE: &str = "2560x1440";

/// Connection settings for the text-to-image model.
#[derive(Clone)]
pub struct ImageModelConfig {
    /// API root; transports append `/images/generations`.
    pub base_url: String,
    /// Bearer token. `None` means the image stage cannot run.
    pub api_key: Option<String>,
    /// Model or endpoint identifier sent as `model`.
    pub model: String,
    /// `"<width>x<height>"`.
    pub size: String,
    /// Ask the provider to stamp its AI watermark. Default: false.
    pub watermark: bool,
}

impl Default for ImageModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_IMAGE_MODEL.to_string(),
            size: DEFAULT_IMAGE_SIZE.to_string(),
            watermark: false,
        }
    }
}

impl ImageModelConfig {
    /// Read `ARK_API_KEY`, `ARK_BASE_URL` and `IMAGE_ENDPOINT`, keeping the
    /// defaults for anything unset or empty.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(key) = non_empty_env("ARK_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(url) = non_empty_env("ARK_BASE_URL") {
            config.base_url = url;
        }
        if let Some(model) = non_empty_env("IMAGE_ENDPOINT") {
            config.model = model;
        }
        config
    }

    /// `{base_url}/images/generations`, tolerating a trailing slash.
    pub fn generations_url(&self) -> String {
        format!("{}/images/generations", self.base_url.trim_end_matches('/'))
    }

    /// Parse `size` into `(width, height)`.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = self.size.split_once(['x', 'X'])?;
        Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
    }
}

impl fmt::Debug for ImageModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageModelConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("size", &self.size)
            .field("watermark", &self.watermark)
            .finish()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Configuration for deck generation.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_text2pptx::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .model("gpt-4.1-mini")
///     .output_dir("decks")
///     .workers(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.images_dir, std::path::PathBuf::from("decks/images"));
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// LLM model identifier for the outline, e.g. "gpt-4.1-mini".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the outline call. Default: 0.7.
    ///
    /// The outline is a creative task; near-zero temperatures make every
    /// deck on a topic read the same.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate for the outline. Default: 4096.
    pub max_tokens: usize,

    /// Retries on a failed outline call before falling back to the
    /// placeholder outline. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom outline system prompt. If None, the language-specific built-in
    /// prompt is used.
    pub system_prompt: Option<String>,

    /// Text-to-image connection settings. Default: [`ImageModelConfig::from_env`].
    pub image: ImageModelConfig,

    /// Directory for finished decks. Default: `output`.
    pub output_dir: PathBuf,

    /// Directory for rendered backgrounds. Default: `<output_dir>/images`.
    pub images_dir: PathBuf,

    /// Timeout for fetching a background returned as a URL. Default: 60.
    pub download_timeout_secs: u64,

    /// Timeout for the raw HTTP fallback transport. Default: 300.
    ///
    /// High-resolution renders routinely take more than a minute.
    pub raw_timeout_secs: u64,

    /// Fewest rendered backgrounds that still count as a deck. Default: 1.
    ///
    /// Runs that render fewer fail with
    /// [`Text2PptxError::NoSlidesRendered`] instead of writing a deck.
    pub min_rendered_slides: usize,

    /// Concurrent generation jobs in service mode. Default: 2.
    pub workers: usize,

    /// Optional callback for stage and per-slide progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let output_dir = PathBuf::from("output");
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            system_prompt: None,
            image: ImageModelConfig::from_env(),
            images_dir: output_dir.join("images"),
            output_dir,
            download_timeout_secs: 60,
            raw_timeout_secs: 300,
            min_rendered_slides: 1,
            workers: 2,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("image", &self.image)
            .field("output_dir", &self.output_dir)
            .field("images_dir", &self.images_dir)
            .field("min_rendered_slides", &self.min_rendered_slides)
            .field("workers", &self.workers)
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
            images_dir_set: false,
        }
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
    images_dir_set: bool,
}

impl GenerationConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn image(mut self, image: ImageModelConfig) -> Self {
        self.config.image = image;
        self
    }

    pub fn image_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.image.api_key = Some(key.into());
        self
    }

    pub fn image_model(mut self, model: impl Into<String>) -> Self {
        self.config.image.model = model.into();
        self
    }

    pub fn image_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.image.base_url = url.into();
        self
    }

    pub fn image_size(mut self, size: impl Into<String>) -> Self {
        self.config.image.size = size.into();
        self
    }

    /// Also moves the images directory under the new output directory unless
    /// [`images_dir`](Self::images_dir) was set explicitly.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        if !self.images_dir_set {
            self.config.images_dir = self.config.output_dir.join("images");
        }
        self
    }

    pub fn images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.images_dir = dir.into();
        self.images_dir_set = true;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn raw_timeout_secs(mut self, secs: u64) -> Self {
        self.config.raw_timeout_secs = secs;
        self
    }

    pub fn min_rendered_slides(mut self, n: usize) -> Self {
        self.config.min_rendered_slides = n;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, Text2PptxError> {
        let c = &self.config;
        if c.workers == 0 {
            return Err(Text2PptxError::InvalidConfig("Workers must be ≥ 1".into()));
        }
        if c.image.dimensions().is_none() {
            return Err(Text2PptxError::InvalidConfig(format!(
                "Image size must look like 2560x1440, got '{}'",
                c.image.size
            )));
        }
        if c.min_rendered_slides == 0 {
            return Err(Text2PptxError::InvalidConfig(
                "min_rendered_slides must be ≥ 1".into(),
            ));
        }
        if c.download_timeout_secs == 0 || c.raw_timeout_secs == 0 {
            return Err(Text2PptxError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.min_rendered_slides, 1);
        assert_eq!(config.raw_timeout_secs, 300);
        assert_eq!(config.download_timeout_secs, 60);
        assert_eq!(config.images_dir, PathBuf::from("output/images"));
    }

    #[test]
    fn output_dir_moves_images_dir() {
        let config = GenerationConfig::builder()
            .output_dir("/tmp/decks")
            .build()
            .unwrap();
        assert_eq!(config.images_dir, PathBuf::from("/tmp/decks/images"));

        let config = GenerationConfig::builder()
            .images_dir("/tmp/bg")
            .output_dir("/tmp/decks")
            .build()
            .unwrap();
        assert_eq!(config.images_dir, PathBuf::from("/tmp/bg"));
    }

    #[test]
    fn rejects_bad_image_size() {
        let err = GenerationConfig::builder()
            .image_size("huge")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("huge"));
    }

    #[test]
    fn image_dimensions_and_url() {
        let image = ImageModelConfig {
            base_url: "https://example.test/api/v3/".into(),
            ..ImageModelConfig::default()
        };
        assert_eq!(image.dimensions(), Some((2560, 1440)));
        assert_eq!(
            image.generations_url(),
            "https://example.test/api/v3/images/generations"
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let image = ImageModelConfig {
            api_key: Some("secret-key".into()),
            ..ImageModelConfig::default()
        };
        let dbg = format!("{image:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn rejects_zero_minimum() {
        assert!(GenerationConfig::builder()
            .min_rendered_slides(0)
            .build()
            .is_err());
    }

    #[test]
    fn temperature_is_clamped() {
        let config = GenerationConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(config.temperature, 2.0);
    }
}
