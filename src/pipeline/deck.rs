//! Deck assembly: one slide per background, with text laid over it.
//!
//! Backgrounds come from the image model without any text, so every title
//! and bullet is a real, editable text box. Three layouts cover a deck:
//!
//! ```text
//! Cover                 Content                  Closing
//! ┌──────────────┐      ┌──────────────┐         ┌──────────────┐
//! │              │      │█ Title ██████│         │              │
//! │▓▓▓ TITLE ▓▓▓▓│      │ ┌──────────┐ │         │              │
//! │▓ sub · sub ▓▓│      │ │ • point  │ │         │▓▓ THANKS ▓▓▓▓│
//! │              │      │ │ • point  │ │         │              │
//! └──────────────┘      └─┴──────────┴─┘         └──────────────┘
//! ```
//!
//! ## Why spawn_blocking?
//!
//! Reading backgrounds and deflating the package is synchronous file and
//! CPU work; it runs on the blocking pool so a multi-megabyte deck does not
//! stall the runtime's worker threads.

use crate::error::{SlideError, Text2PptxError};
use crate::output::{SlideRole, SlideSpec};
use crate::pipeline::postprocess::inline_points;
use crate::pptx::{
    Align, Frame, Geometry, Paragraph, Presentation, Rgb, Shape, Slide, SLIDE_WIDTH_IN,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SUBTITLE_GREY: Rgb = Rgb(200, 200, 200);
const TITLE_BAR: Rgb = Rgb(51, 51, 51);

/// Opacity, in percent, of the cover and closing bands.
const BAND_ALPHA: u8 = 60;
/// Opacity, in percent, of the content panel.
const PANEL_ALPHA: u8 = 50;

/// A deck written to disk.
#[derive(Debug, Clone)]
pub struct AssembledDeck {
    pub path: PathBuf,
    pub file_name: String,
    pub slide_count: usize,
    /// Backgrounds that were missing on disk.
    pub skipped: Vec<SlideError>,
}

/// Builds `.pptx` files into one output directory.
#[derive(Debug, Clone)]
pub struct DeckAssembler {
    output_dir: PathBuf,
}

impl DeckAssembler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `<output_dir>/<output_name>.pptx`.
    ///
    /// `slides`, when given, is matched to `images` by position and decides
    /// each slide's layout and text. Without it every slide uses the content
    /// layout with no text.
    pub async fn assemble(
        &self,
        images: &[PathBuf],
        slides: Option<&[SlideSpec]>,
        output_name: &str,
    ) -> Result<AssembledDeck, Text2PptxError> {
        let images = images.to_vec();
        let slides = slides.map(<[SlideSpec]>::to_vec);
        let file_name = format!("{output_name}.pptx");
        let path = self.output_dir.join(&file_name);

        tokio::task::spawn_blocking(move || -> Result<AssembledDeck, Text2PptxError> {
            let (deck, skipped) = build_deck(&images, slides.as_deref())?;
            deck.save(&path)?;
            Ok(AssembledDeck {
                slide_count: deck.slides().len(),
                path,
                file_name,
                skipped,
            })
        })
        .await
        .map_err(|e| Text2PptxError::Internal(format!("Assembly task panicked: {}", e)))?
    }
}

/// Lay out one slide per existing background.
///
/// Missing files are skipped and reported; unreadable or unsupported ones
/// are fatal.
pub fn build_deck(
    images: &[PathBuf],
    slides: Option<&[SlideSpec]>,
) -> Result<(Presentation, Vec<SlideError>), Text2PptxError> {
    let mut deck = Presentation::new();
    let mut skipped = Vec::new();

    for (idx, image) in images.iter().enumerate() {
        let spec = slides.and_then(|s| s.get(idx));
        let slide_number = spec.map(|s| s.slide_number).unwrap_or(idx + 1);

        if !image.exists() {
            warn!("Background not found, skipping slide {}: {}", slide_number, image.display());
            skipped.push(SlideError::MissingBackground {
                slide: slide_number,
                path: image.clone(),
            });
            continue;
        }

        let media = deck.add_image_file(image)?;
        let slide = deck.add_slide();
        slide.push(Shape::picture(Frame::full_slide(), media));

        match spec {
            Some(s) => match s.role {
                SlideRole::Cover => cover_layout(slide, &s.title, &s.content),
                SlideRole::Content => content_layout(slide, &s.title, &s.points()),
                SlideRole::Closing => closing_layout(slide, &s.title),
            },
            None => content_layout(slide, "", &[]),
        }
        debug!("Laid out slide {} from {}", slide_number, image.display());
    }

    info!(
        "Assembled {} slides ({} backgrounds missing)",
        deck.slides().len(),
        skipped.len()
    );
    Ok((deck, skipped))
}

fn cover_layout(slide: &mut Slide, title: &str, content: &str) {
    slide.push(Shape::fill(
        Frame::inches(0.0, 2.5, SLIDE_WIDTH_IN, 3.0),
        Geometry::Rect,
        Rgb::BLACK,
        BAND_ALPHA,
    ));
    slide.push(Shape::text(
        Frame::inches(0.5, 2.8, SLIDE_WIDTH_IN - 1.0, 1.5),
        vec![Paragraph::new(title)
            .size(54.0)
            .bold()
            .color(Rgb::WHITE)
            .align(Align::Center)],
    ));

    let subtitle = inline_points(content);
    if !subtitle.is_empty() {
        slide.push(Shape::text(
            Frame::inches(0.5, 4.2, SLIDE_WIDTH_IN - 1.0, 0.8),
            vec![Paragraph::new(subtitle)
                .size(24.0)
                .color(SUBTITLE_GREY)
                .align(Align::Center)],
        ));
    }
}

fn content_layout(slide: &mut Slide, title: &str, points: &[String]) {
    slide.push(Shape::fill(
        Frame::inches(0.0, 0.0, SLIDE_WIDTH_IN, 1.4),
        Geometry::Rect,
        TITLE_BAR,
        100,
    ));
    slide.push(Shape::text(
        Frame::inches(0.6, 0.35, SLIDE_WIDTH_IN - 1.2, 0.9),
        vec![Paragraph::new(title).size(40.0).bold().color(Rgb::WHITE)],
    ));

    if points.is_empty() {
        return;
    }

    slide.push(Shape::fill(
        Frame::inches(0.5, 1.8, SLIDE_WIDTH_IN - 1.0, 4.8),
        Geometry::RoundRect,
        Rgb::BLACK,
        PANEL_ALPHA,
    ));
    let paragraphs = points
        .iter()
        .map(|p| {
            Paragraph::new(format!("• {p}"))
                .size(28.0)
                .color(Rgb::WHITE)
                .spacing(12.0, 8.0)
        })
        .collect();
    slide.push(Shape::text(
        Frame::inches(0.8, 2.0, SLIDE_WIDTH_IN - 1.6, 4.4),
        paragraphs,
    ));
}

fn closing_layout(slide: &mut Slide, title: &str) {
    slide.push(Shape::fill(
        Frame::inches(0.0, 2.8, SLIDE_WIDTH_IN, 2.5),
        Geometry::Rect,
        Rgb::BLACK,
        BAND_ALPHA,
    ));
    slide.push(Shape::text(
        Frame::inches(0.5, 3.2, SLIDE_WIDTH_IN - 1.0, 1.5),
        vec![Paragraph::new(title)
            .size(60.0)
            .bold()
            .color(Rgb::WHITE)
            .align(Align::Center)],
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::assign_positions;
    use image::{Rgb as Pixel, RgbImage};

    fn backgrounds(dir: &Path, n: usize) -> Vec<PathBuf> {
        (1..=n)
            .map(|i| {
                let path = dir.join(format!("bg_slide_{i:02}.png"));
                RgbImage::from_pixel(16, 9, Pixel([30, 60, 90])).save(&path).unwrap();
                path
            })
            .collect()
    }

    fn texts(slide: &Slide) -> Vec<String> {
        slide
            .shapes
            .iter()
            .filter_map(|s| match s {
                Shape::Text { paragraphs, .. } => Some(paragraphs.iter().map(|p| p.text.clone())),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn outline() -> Vec<SlideSpec> {
        let mut slides = vec![
            SlideSpec::new(0, "人工智能的未来", "探索AI技术；无限可能", "a"),
            SlideSpec::new(0, "核心技术", "机器学习；深度学习; NLP", "b"),
            SlideSpec::new(0, "感谢聆听", "", "c"),
        ];
        assign_positions(&mut slides);
        slides
    }

    #[test]
    fn layouts_follow_roles() {
        let dir = tempfile::tempdir().unwrap();
        let images = backgrounds(dir.path(), 3);
        let slides = outline();

        let (deck, skipped) = build_deck(&images, Some(&slides)).unwrap();
        assert!(skipped.is_empty());
        assert_eq!(deck.slides().len(), 3);

        let cover = &deck.slides()[0];
        assert!(matches!(cover.shapes[0], Shape::Picture { .. }));
        assert_eq!(texts(cover), vec!["人工智能的未来", "探索AI技术 · 无限可能"]);

        let content = &deck.slides()[1];
        assert_eq!(
            texts(content),
            vec!["核心技术", "• 机器学习", "• 深度学习", "• NLP"]
        );
        assert!(content
            .shapes
            .iter()
            .any(|s| matches!(s, Shape::Fill { geometry: Geometry::RoundRect, alpha: 50, .. })));

        let closing = &deck.slides()[2];
        assert_eq!(texts(closing), vec!["感谢聆听"]);
    }

    #[test]
    fn without_context_every_slide_is_content() {
        let dir = tempfile::tempdir().unwrap();
        let images = backgrounds(dir.path(), 3);

        let (deck, _) = build_deck(&images, None).unwrap();
        assert_eq!(deck.slides().len(), 3);
        for slide in deck.slides() {
            // picture, title bar, empty title; no panel without points
            assert_eq!(slide.shapes.len(), 3);
            assert!(matches!(
                slide.shapes[1],
                Shape::Fill { geometry: Geometry::Rect, alpha: 100, .. }
            ));
            assert_eq!(texts(slide), vec![""]);
        }
    }

    #[test]
    fn missing_background_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut images = backgrounds(dir.path(), 3);
        images[1] = dir.path().join("gone.png");
        let slides = outline();

        let (deck, skipped) = build_deck(&images, Some(&slides)).unwrap();
        assert_eq!(deck.slides().len(), 2);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].slide(), 2);
        // the closing slide keeps its own layout
        assert_eq!(texts(&deck.slides()[1]), vec!["感谢聆听"]);
    }

    #[test]
    fn cover_without_content_has_no_subtitle() {
        let mut slide = Slide::default();
        cover_layout(&mut slide, "Title", " ; ");
        assert_eq!(texts(&slide), vec!["Title"]);
    }

    #[tokio::test]
    async fn assemble_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let images = backgrounds(dir.path(), 2);
        let assembler = DeckAssembler::new(dir.path().join("out"));

        let deck = assembler
            .assemble(&images, None, "presentation_abc")
            .await
            .unwrap();
        assert_eq!(deck.file_name, "presentation_abc.pptx");
        assert_eq!(deck.slide_count, 2);
        assert!(deck.path.exists());
    }
}
