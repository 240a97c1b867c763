//! Error types for the edgequake-text2pptx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Text2PptxError`]: **Fatal**: the deck cannot be produced at all
//!   (empty input, provider not configured, no background rendered, the
//!   package could not be written). Returned as `Err(Text2PptxError)` from
//!   the top-level `generate*` functions and recorded as a failed task in
//!   service mode.
//!
//! * [`SlideError`]: **Non-fatal**: a single slide was dropped (no prompt,
//!   every image transport missed, background vanished before assembly) but
//!   the rest of the deck is fine. Collected in
//!   [`crate::output::GenerationStats`] so callers can see why the deck is
//!   shorter than requested.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-text2pptx library.
#[derive(Debug, Error)]
pub enum Text2PptxError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The request text is empty or whitespace only.
    #[error("Text content is required")]
    EmptyInput,

    /// A deck needs at least one slide.
    #[error("Slide count must be at least 1, got {count}")]
    InvalidSlideCount { count: usize },

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error after all retries.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The image model has no API key or endpoint.
    #[error("Image model is not configured: {hint}")]
    ImageModelNotConfigured { hint: String },

    /// Fewer backgrounds rendered than the configured minimum.
    #[error("Only {rendered}/{planned} slide backgrounds rendered (minimum {minimum})")]
    NoSlidesRendered {
        planned: usize,
        rendered: usize,
        minimum: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A background image could not be read while packaging the deck.
    #[error("Failed to read image '{path}': {source}")]
    ImageReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image bytes are neither PNG nor JPEG.
    #[error("Unsupported image format for '{path}'")]
    UnsupportedImage { path: PathBuf },

    /// Could not create a directory or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The deck package could not be serialised.
    #[error("Failed to write deck '{path}': {detail}")]
    DeckWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single slide.
///
/// The slide is left out of the deck; every other slide is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideError {
    /// The outline gave this slide no image prompt.
    #[error("Slide {slide}: no image prompt")]
    MissingPrompt { slide: usize },

    /// Every image transport missed, or the payload could not be saved.
    #[error("Slide {slide}: background rendering failed: {detail}")]
    RenderFailed { slide: usize, detail: String },

    /// The background file disappeared before the deck was assembled.
    #[error("Slide {slide}: background '{path}' not found")]
    MissingBackground { slide: usize, path: PathBuf },
}

impl SlideError {
    /// The 1-based slide number the error refers to.
    pub fn slide(&self) -> usize {
        match self {
            SlideError::MissingPrompt { slide }
            | SlideError::RenderFailed { slide, .. }
            | SlideError::MissingBackground { slide, .. } => *slide,
        }
    }
}
