//! Pipeline stages for text-to-deck generation.
//!
//! Each submodule implements one step. Keeping stages separate makes each
//! independently testable and lets the model-facing seams
//! ([`outline::CompletionModel`], [`image::ImageTransport`]) be swapped
//! without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! text ──▶ outline ──▶ image ──▶ persist ──▶ deck
//!          (LLM)       (T2I)     (files)     (pptx)
//! ```
//!
//! 1. [`outline`]: one LLM round trip to a JSON slide plan; falls back to a
//!    placeholder outline instead of failing
//! 2. [`postprocess`]: fence stripping and delimiter rules for the reply
//! 3. [`image`]  : one background per slide through an ordered list of
//!    transports; the only stage with per-slide network I/O
//! 4. [`persist`]: base64 or URL payload to `<images_dir>/<stem>.<ext>`
//! 5. [`deck`]   : lay text over each background and write the package;
//!    runs in `spawn_blocking`

pub mod deck;
pub mod image;
pub mod outline;
pub mod persist;
pub mod postprocess;
