//! Synchronous (in-process, wait-for-result) generation entry points.
//!
//! [`Pipeline`] owns the three stages and runs them strictly in order:
//! outline, one background per slide, then deck assembly. [`generate`]
//! builds a pipeline from a [`GenerationConfig`] and runs one request;
//! [`crate::tasks::TaskManager`] shares one pipeline across queued jobs.

use crate::config::GenerationConfig;
use crate::error::Text2PptxError;
use crate::output::{DeckArtifact, GenerationOutput, GenerationStats, SlideSpec};
use crate::pipeline::deck::DeckAssembler;
use crate::pipeline::image::BackgroundRenderer;
use crate::pipeline::outline::{Outline, OutlineSynthesizer, ProviderModel};
use crate::progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
use crate::request::GenerationRequest;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outline model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// The three stages plus the minimum-deck rule.
pub struct Pipeline {
    outline: OutlineSynthesizer,
    renderer: BackgroundRenderer,
    assembler: DeckAssembler,
    min_rendered_slides: usize,
}

impl Pipeline {
    pub fn new(
        outline: OutlineSynthesizer,
        renderer: BackgroundRenderer,
        assembler: DeckAssembler,
    ) -> Self {
        Self {
            outline,
            renderer,
            assembler,
            min_rendered_slides: 1,
        }
    }

    /// Fewest rendered backgrounds that still produce a deck (at least 1).
    pub fn min_rendered_slides(mut self, n: usize) -> Self {
        self.min_rendered_slides = n.max(1);
        self
    }

    /// Build the production pipeline: resolved LLM provider, structured
    /// plus raw-HTTP image transports, and the configured directories.
    pub async fn from_config(config: &GenerationConfig) -> Result<Self, Text2PptxError> {
        let renderer = BackgroundRenderer::from_config(config)?;
        let provider = resolve_provider(config).await?;
        let outline = OutlineSynthesizer::new(Arc::new(ProviderModel::new(provider, config)))
            .with_system_prompt(config.system_prompt.clone());
        let assembler = DeckAssembler::new(config.output_dir.clone());

        Ok(Self::new(outline, renderer, assembler).min_rendered_slides(config.min_rendered_slides))
    }

    /// Run one request end to end.
    ///
    /// Backgrounds are named `<batch>_slide_<NN>` and the deck is written to
    /// `<output_dir>/<output_name>.pptx`.
    ///
    /// # Errors
    /// Returns `Err` only for fatal problems: an invalid request, fewer
    /// rendered slides than the configured minimum, or a deck that could not
    /// be written. Skipped slides are reported in `stats.slide_errors`.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        batch: &str,
        output_name: &str,
        progress: &dyn GenerationProgressCallback,
    ) -> Result<GenerationOutput, Text2PptxError> {
        let total_start = Instant::now();
        request.validate()?;
        info!(
            "Starting generation '{}': {} slides, language {}",
            output_name, request.slide_count, request.language
        );

        // ── Step 1: Outline ──────────────────────────────────────────────
        progress.on_outline_start();
        let outline_start = Instant::now();
        let Outline {
            mut slides,
            placeholder,
        } = self.outline.synthesize(request).await;
        let outline_duration_ms = outline_start.elapsed().as_millis() as u64;
        let planned = slides.len();
        progress.on_outline_complete(planned, placeholder);
        info!(
            "Outline ready: {} slides in {}ms{}",
            planned,
            outline_duration_ms,
            if placeholder { " (placeholder)" } else { "" }
        );

        // ── Step 2: Render backgrounds ───────────────────────────────────
        let render_start = Instant::now();
        let report = self
            .renderer
            .render_slides(&mut slides, batch, request.style.as_deref(), progress)
            .await;
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        info!(
            "Rendered {}/{} backgrounds in {}ms",
            report.paths.len(),
            planned,
            render_duration_ms
        );

        self.check_minimum(planned, report.paths.len())?;

        // ── Step 3: Assemble deck ────────────────────────────────────────
        let rendered: Vec<SlideSpec> = slides
            .iter()
            .filter(|s| s.image_path.is_some())
            .cloned()
            .collect();
        progress.on_assembly_start(rendered.len());
        let assemble_start = Instant::now();
        let deck = self
            .assembler
            .assemble(&report.paths, Some(&rendered), output_name)
            .await?;
        let assemble_duration_ms = assemble_start.elapsed().as_millis() as u64;

        if let Err(e) = self.check_minimum(planned, deck.slide_count) {
            // backgrounds vanished between rendering and assembly
            if let Err(rm) = tokio::fs::remove_file(&deck.path).await {
                warn!("Could not remove short deck {}: {}", deck.path.display(), rm);
            }
            return Err(e);
        }

        // ── Step 4: Stats ────────────────────────────────────────────────
        let mut slide_errors = report.errors;
        slide_errors.extend(deck.skipped);

        let stats = GenerationStats {
            planned_slides: planned,
            rendered_slides: deck.slide_count,
            skipped_slides: planned.saturating_sub(deck.slide_count),
            placeholder_outline: placeholder,
            outline_duration_ms,
            render_duration_ms,
            assemble_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            slide_errors,
        };

        info!(
            "Generation complete: {}/{} slides, {}ms total",
            stats.rendered_slides, planned, stats.total_duration_ms
        );
        progress.on_generation_complete(deck.slide_count, planned);

        Ok(GenerationOutput {
            artifact: DeckArtifact {
                path: deck.path,
                file_name: deck.file_name,
                slide_count: deck.slide_count,
                slides: slides.iter().map(SlideSpec::summary).collect(),
            },
            slides,
            stats,
        })
    }

    fn check_minimum(&self, planned: usize, rendered: usize) -> Result<(), Text2PptxError> {
        if rendered < self.min_rendered_slides {
            return Err(Text2PptxError::NoSlidesRendered {
                planned,
                rendered,
                minimum: self.min_rendered_slides,
            });
        }
        Ok(())
    }
}

/// Generate a deck for `request`.
///
/// This is the primary entry point for the library. The deck path is
/// `output.artifact.path`; the name defaults to
/// `presentation_<YYYYmmdd_HHMMSS>`, which is also the background batch stem.
///
/// # Errors
/// See [`Pipeline::run`]. Also fails when no LLM provider or image API key
/// is configured.
pub async fn generate(
    request: &GenerationRequest,
    config: &GenerationConfig,
) -> Result<GenerationOutput, Text2PptxError> {
    request.validate()?;
    let pipeline = Pipeline::from_config(config).await?;
    let output_name = request
        .output_name
        .clone()
        .unwrap_or_else(default_output_name);
    let progress: ProgressCallback = config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback));

    pipeline
        .run(request, &output_name, &output_name, progress.as_ref())
        .await
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    request: &GenerationRequest,
    config: &GenerationConfig,
) -> Result<GenerationOutput, Text2PptxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Text2PptxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(request, config))
}

/// `presentation_<YYYYmmdd_HHMMSS>` in local time.
pub fn default_output_name() -> String {
    format!("presentation_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Text2PptxError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Text2PptxError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    checked before auto-detection so the model choice is honoured even
///    when several API keys are present.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
async fn resolve_provider(
    config: &GenerationConfig,
) -> Result<Arc<dyn LLMProvider>, Text2PptxError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        debug!("Using named provider {} ({})", name, model);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Text2PptxError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
