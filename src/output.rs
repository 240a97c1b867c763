//! Data handed between pipeline stages and back to callers.
//!
//! A [`SlideSpec`] is created by the outline stage, gains an `image_path`
//! in the render stage, and is read (never modified) by the deck stage.
//! [`GenerationOutput`] bundles the finished [`DeckArtifact`] with the final
//! slide records and per-stage statistics.

use crate::error::SlideError;
use crate::pipeline::postprocess;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Layout category of a slide.
///
/// Decided once when the outline is synthesised, from the slide's position:
/// first slide is the cover, last slide is the closing page, everything in
/// between is content. A one-slide deck is just a cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideRole {
    Cover,
    Content,
    Closing,
}

impl SlideRole {
    /// Role of the slide at 0-based `index` in a deck of `total` slides.
    pub fn for_position(index: usize, total: usize) -> Self {
        if index == 0 {
            SlideRole::Cover
        } else if index + 1 == total {
            SlideRole::Closing
        } else {
            SlideRole::Content
        }
    }
}

/// One planned slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideSpec {
    /// 1-based position in the deck.
    pub slide_number: usize,
    pub title: String,
    /// Bullet points joined by `;` or `；`.
    pub content: String,
    /// English description of a text-free background.
    pub image_prompt: String,
    pub role: SlideRole,
    /// Set by the background renderer once the image is on disk.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image_path: Option<PathBuf>,
}

impl SlideSpec {
    /// A content-role slide with no background yet; call
    /// [`assign_positions`] once the whole outline is known.
    pub fn new(
        slide_number: usize,
        title: impl Into<String>,
        content: impl Into<String>,
        image_prompt: impl Into<String>,
    ) -> Self {
        Self {
            slide_number,
            title: title.into(),
            content: content.into(),
            image_prompt: image_prompt.into(),
            role: SlideRole::Content,
            image_path: None,
        }
    }

    /// The non-empty, trimmed bullet points of `content`.
    pub fn points(&self) -> Vec<String> {
        postprocess::split_points(&self.content)
    }

    /// Title/content echo used in reports.
    pub fn summary(&self) -> SlideSummary {
        SlideSummary {
            title: self.title.clone(),
            content: self.content.clone(),
        }
    }
}

/// Re-number `slides` 1..n by position and recompute their roles.
pub fn assign_positions(slides: &mut [SlideSpec]) {
    let total = slides.len();
    for (idx, slide) in slides.iter_mut().enumerate() {
        slide.slide_number = idx + 1;
        slide.role = SlideRole::for_position(idx, total);
    }
}

/// Title and content of one planned slide, as echoed in results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSummary {
    pub title: String,
    pub content: String,
}

/// The finished deck file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckArtifact {
    /// Full path of the written `.pptx`.
    pub path: PathBuf,
    /// File name used for downloads, e.g. `presentation_1a2b3c4d.pptx`.
    pub file_name: String,
    /// Slides actually in the file; can be lower than planned.
    pub slide_count: usize,
    /// Echo of every planned slide, rendered or not.
    pub slides: Vec<SlideSummary>,
}

/// Timing and outcome counters for one generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Slides in the outline.
    pub planned_slides: usize,
    /// Slides whose background was rendered and placed in the deck.
    pub rendered_slides: usize,
    /// Planned slides left out of the deck.
    pub skipped_slides: usize,
    /// The outline came from the placeholder generator, not the model.
    pub placeholder_outline: bool,
    pub outline_duration_ms: u64,
    pub render_duration_ms: u64,
    pub assemble_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Why each skipped slide was skipped.
    pub slide_errors: Vec<SlideError>,
}

/// Everything a synchronous run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub artifact: DeckArtifact,
    pub slides: Vec<SlideSpec>,
    pub stats: GenerationStats,
}
