//! # edgequake-text2pptx
//!
//! Turn free-form text into a PowerPoint deck: an LLM plans the slides, a
//! text-to-image model paints one background per slide, and the titles and
//! bullets are laid over the backgrounds as real, editable text.
//!
//! ## Why text overlays?
//!
//! Image models garble lettering, especially outside Latin scripts. Every
//! image prompt therefore asks for a picture with no text at all, and the
//! words are added afterwards as native slide text boxes, which also keeps
//! the deck editable.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text
//!  │
//!  ├─ 1. Outline   one LLM call → JSON slide plan (placeholder on failure)
//!  ├─ 2. Render    one background per slide, structured API then raw HTTP
//!  ├─ 3. Persist   base64 / URL payload → <images_dir>/<batch>_slide_NN.ext
//!  └─ 4. Assemble  cover / content / closing layouts → 16:9 .pptx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_text2pptx::{generate, GenerationConfig, GenerationRequest, Language};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Outline provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY;
//!     // the image model reads ARK_API_KEY.
//!     let config = GenerationConfig::default();
//!     let request = GenerationRequest::new("AI in healthcare")
//!         .slide_count(3)
//!         .language(Language::English);
//!     let output = generate(&request, &config).await?;
//!     println!("{}", output.artifact.path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Service mode
//!
//! [`TaskManager`] queues requests and runs them on a bounded pool of
//! workers; the `server` feature puts the submit / status / download / list
//! routes in front of it.
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `text2pptx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Enables [`server`], the axum HTTP front end |
//!
//! Disable both when using only the library:
//! ```toml
//! edgequake-text2pptx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod pptx;
pub mod progress;
pub mod prompts;
pub mod request;
#[cfg(feature = "server")]
pub mod server;
pub mod tasks;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationConfig, GenerationConfigBuilder, ImageModelConfig};
pub use error::{SlideError, Text2PptxError};
pub use generate::{default_output_name, generate, generate_sync, Pipeline};
pub use output::{
    DeckArtifact, GenerationOutput, GenerationStats, SlideRole, SlideSpec, SlideSummary,
};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::{GenerationRequest, Language, RequestEcho};
pub use tasks::{TaskManager, TaskRecord, TaskResult, TaskStatus, TaskStore};
