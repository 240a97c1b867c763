//! Background rendering through an ordered list of image transports.
//!
//! Image providers are flaky in different ways: the structured client fails
//! on schema drift, slow renders hit client timeouts, and some gateways return
//! `url` where `b64_json` was asked for. Each [`ImageTransport`] turns one
//! prompt into a [`TransportOutcome`]; [`BackgroundRenderer`] tries them in
//! order and keeps the first image.

use crate::config::{GenerationConfig, ImageModelConfig};
use crate::error::{SlideError, Text2PptxError};
use crate::output::SlideSpec;
use crate::pipeline::persist::ImageStore;
use crate::progress::GenerationProgressCallback;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Image data as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Base64, optionally wrapped in a `data:` URL.
    Base64(String),
    /// A provider-hosted URL to fetch.
    Url(String),
}

/// Result of one transport attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    Image(ImagePayload),
    /// No image; the reason is only logged.
    Miss(String),
}

/// One way of asking the image model for a picture.
#[async_trait]
pub trait ImageTransport: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str) -> TransportOutcome;
}

// ── Structured transport ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerationsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    response_format: &'a str,
    watermark: bool,
}

#[derive(Debug, Deserialize)]
struct GenerationsResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Typed request/response client for `/images/generations`.
pub struct StructuredTransport {
    client: reqwest::Client,
    config: ImageModelConfig,
}

impl StructuredTransport {
    pub fn new(config: ImageModelConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ImageTransport for StructuredTransport {
    fn name(&self) -> &'static str {
        "structured"
    }

    async fn generate(&self, prompt: &str) -> TransportOutcome {
        let body = GenerationsRequest {
            model: &self.config.model,
            prompt,
            n: 1,
            size: &self.config.size,
            response_format: "b64_json",
            watermark: self.config.watermark,
        };

        let response = match self
            .client
            .post(self.config.generations_url())
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return TransportOutcome::Miss(format!("request failed: {e}")),
        };

        if let Some(id) = response.headers().get("x-request-id") {
            debug!("Image request id: {}", id.to_str().unwrap_or("<binary>"));
        }

        let response = match response.error_for_status() {
            Ok(r) => r,
            Err(e) => return TransportOutcome::Miss(format!("HTTP error: {e}")),
        };

        let parsed: GenerationsResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => return TransportOutcome::Miss(format!("unexpected response: {e}")),
        };

        match parsed.data.into_iter().next() {
            Some(GeneratedImage {
                b64_json: Some(b64),
                ..
            }) if !b64.is_empty() => TransportOutcome::Image(ImagePayload::Base64(b64)),
            Some(GeneratedImage { url: Some(url), .. }) if !url.is_empty() => {
                TransportOutcome::Image(ImagePayload::Url(url))
            }
            _ => TransportOutcome::Miss("response contained no image data".into()),
        }
    }
}

// ── Raw HTTP fallback ────────────────────────────────────────────────────────

/// Untyped JSON client with a long timeout.
pub struct RawHttpTransport {
    client: reqwest::Client,
    config: ImageModelConfig,
    timeout: Duration,
}

impl RawHttpTransport {
    pub fn new(config: ImageModelConfig, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            timeout,
        }
    }
}

/// Pull the first image out of a `{"data": [...]}` body.
///
/// Accepts `b64_json`, `image` (base64) or `url`, in that order.
pub fn extract_payload(body: &Value) -> Option<ImagePayload> {
    let first = body.get("data")?.as_array()?.first()?;
    let text = |key: &str| {
        first
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    text("b64_json")
        .or_else(|| text("image"))
        .map(ImagePayload::Base64)
        .or_else(|| text("url").map(ImagePayload::Url))
}

#[async_trait]
impl ImageTransport for RawHttpTransport {
    fn name(&self) -> &'static str {
        "raw-http"
    }

    async fn generate(&self, prompt: &str) -> TransportOutcome {
        let payload = json!({
            "model": self.config.model,
            "prompt": prompt,
            "n": 1,
            "size": self.config.size,
            "response_format": "b64_json",
            "watermark": self.config.watermark,
        });

        let response = match self
            .client
            .post(self.config.generations_url())
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return TransportOutcome::Miss(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
            Err(e) => return TransportOutcome::Miss(format!("request failed: {e}")),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => return TransportOutcome::Miss(format!("reading body failed: {e}")),
        };

        if !status.is_success() {
            let head: String = text.chars().take(200).collect();
            warn!("Raw image request returned {}: {}", status, head);
            return TransportOutcome::Miss(format!("HTTP {status}"));
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => match extract_payload(&body) {
                Some(p) => TransportOutcome::Image(p),
                None => TransportOutcome::Miss("no image field in data[0]".into()),
            },
            Err(e) => TransportOutcome::Miss(format!("invalid JSON: {e}")),
        }
    }
}

// ── Renderer ─────────────────────────────────────────────────────────────────

/// Paths and per-slide failures from one [`BackgroundRenderer::render_slides`] run.
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Saved backgrounds in slide-number order.
    pub paths: Vec<PathBuf>,
    pub errors: Vec<SlideError>,
}

/// Tries each transport in order and persists the first image.
pub struct BackgroundRenderer {
    transports: Vec<Arc<dyn ImageTransport>>,
    store: ImageStore,
}

impl BackgroundRenderer {
    pub fn new(transports: Vec<Arc<dyn ImageTransport>>, store: ImageStore) -> Self {
        Self { transports, store }
    }

    /// Structured transport first, raw HTTP fallback second.
    ///
    /// Fails when no image API key is configured.
    pub fn from_config(config: &GenerationConfig) -> Result<Self, Text2PptxError> {
        if config.image.api_key.is_none() {
            return Err(Text2PptxError::ImageModelNotConfigured {
                hint: "Set ARK_API_KEY or pass an image API key".into(),
            });
        }
        let transports: Vec<Arc<dyn ImageTransport>> = vec![
            Arc::new(StructuredTransport::new(config.image.clone())),
            Arc::new(RawHttpTransport::new(
                config.image.clone(),
                Duration::from_secs(config.raw_timeout_secs),
            )),
        ];
        let store = ImageStore::new(
            config.images_dir.clone(),
            Duration::from_secs(config.download_timeout_secs),
        );
        Ok(Self::new(transports, store))
    }

    /// Render one background, or `None` if every transport missed or the
    /// image could not be saved.
    pub async fn render(&self, prompt: &str, stem: &str) -> Option<PathBuf> {
        self.try_render(prompt, stem).await.ok()
    }

    async fn try_render(&self, prompt: &str, stem: &str) -> Result<PathBuf, String> {
        for transport in &self.transports {
            match transport.generate(prompt).await {
                TransportOutcome::Image(payload) => {
                    debug!("{}: transport '{}' returned an image", stem, transport.name());
                    return self.store.save(&payload, stem).await.map_err(|e| {
                        warn!("{}: could not save image: {}", stem, e);
                        e.to_string()
                    });
                }
                TransportOutcome::Miss(reason) => {
                    warn!("{}: transport '{}' missed: {}", stem, transport.name(), reason);
                }
            }
        }
        warn!("{}: every image transport failed", stem);
        Err("every image transport failed".into())
    }

    /// Render backgrounds for `slides` one at a time, in order.
    ///
    /// Files are named `<batch>_slide_<NN>`. Successful slides get their
    /// `image_path` set; the rest are reported and left out.
    pub async fn render_slides(
        &self,
        slides: &mut [SlideSpec],
        batch: &str,
        style: Option<&str>,
        progress: &dyn GenerationProgressCallback,
    ) -> RenderReport {
        let total = slides.len();
        let mut report = RenderReport::default();

        for slide in slides.iter_mut() {
            let n = slide.slide_number;
            progress.on_slide_start(n, total);

            if slide.image_prompt.trim().is_empty() {
                warn!("Slide {}: no image prompt, skipping", n);
                let err = SlideError::MissingPrompt { slide: n };
                progress.on_slide_error(n, total, &err.to_string());
                report.errors.push(err);
                continue;
            }

            let prompt = styled_prompt(&slide.image_prompt, style);
            let stem = format!("{batch}_slide_{n:02}");
            info!("Slide {}/{}: rendering background", n, total);

            match self.try_render(&prompt, &stem).await {
                Ok(path) => {
                    progress.on_slide_complete(n, total, &path);
                    slide.image_path = Some(path.clone());
                    report.paths.push(path);
                }
                Err(detail) => {
                    let err = SlideError::RenderFailed { slide: n, detail };
                    progress.on_slide_error(n, total, &err.to_string());
                    report.errors.push(err);
                }
            }
        }

        report
    }
}

/// `"<prompt>, <style> design style"`, or the prompt unchanged without a style.
pub fn styled_prompt(prompt: &str, style: Option<&str>) -> String {
    match style.map(str::trim).filter(|s| !s.is_empty()) {
        Some(style) => format!("{prompt}, {style} design style"),
        None => prompt.to_string(),
    }
}
