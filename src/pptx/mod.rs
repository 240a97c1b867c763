//! Minimal PresentationML writer.
//!
//! Covers exactly what background-plus-overlay decks need: full-bleed
//! pictures, filled rectangles (optionally rounded and translucent), and
//! text boxes with formatted paragraphs, on a fixed 16:9 canvas.
//!
//! ```rust
//! use edgequake_text2pptx::pptx::{Align, Frame, Paragraph, Presentation, Rgb, Shape};
//!
//! let mut deck = Presentation::new();
//! let slide = deck.add_slide();
//! slide.push(Shape::text(
//!     Frame::inches(0.5, 2.8, 12.333, 1.5),
//!     vec![Paragraph::new("Hello").size(54.0).bold().color(Rgb::WHITE).align(Align::Center)],
//! ));
//! assert_eq!(deck.slides().len(), 1);
//! ```

mod parts;
mod writer;

use crate::error::Text2PptxError;
use std::path::Path;

/// English Metric Units per inch.
pub const EMU_PER_INCH: f64 = 914_400.0;

/// Canvas width: 13.333 in.
pub const SLIDE_WIDTH_EMU: i64 = 12_192_000;

/// Canvas height: 7.5 in.
pub const SLIDE_HEIGHT_EMU: i64 = 6_858_000;

/// Canvas width in inches.
pub const SLIDE_WIDTH_IN: f64 = 13.333;

/// Canvas height in inches.
pub const SLIDE_HEIGHT_IN: f64 = 7.5;

/// Convert inches to EMU, rounding to the nearest unit.
pub fn inches(v: f64) -> i64 {
    (v * EMU_PER_INCH).round() as i64
}

/// An sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// `RRGGBB`, as DrawingML expects.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Horizontal paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
}

impl Align {
    fn attr(&self) -> &'static str {
        match self {
            Align::Left => "l",
            Align::Center => "ctr",
        }
    }
}

/// Preset outline of a filled shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    Rect,
    RoundRect,
}

impl Geometry {
    fn preset(&self) -> &'static str {
        match self {
            Geometry::Rect => "rect",
            Geometry::RoundRect => "roundRect",
        }
    }
}

/// Position and size in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Frame {
    pub fn inches(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: inches(x),
            y: inches(y),
            width: inches(width),
            height: inches(height),
        }
    }

    /// The whole canvas.
    pub fn full_slide() -> Self {
        Self {
            x: 0,
            y: 0,
            width: SLIDE_WIDTH_EMU,
            height: SLIDE_HEIGHT_EMU,
        }
    }
}

/// One paragraph holding a single formatted run.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub text: String,
    pub size_pt: f64,
    pub bold: bool,
    pub color: Rgb,
    pub align: Align,
    pub space_before_pt: Option<f64>,
    pub space_after_pt: Option<f64>,
}

impl Paragraph {
    /// 18 pt black, left-aligned.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            size_pt: 18.0,
            bold: false,
            color: Rgb::BLACK,
            align: Align::Left,
            space_before_pt: None,
            space_after_pt: None,
        }
    }

    pub fn size(mut self, pt: f64) -> Self {
        self.size_pt = pt;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn spacing(mut self, before_pt: f64, after_pt: f64) -> Self {
        self.space_before_pt = Some(before_pt);
        self.space_after_pt = Some(after_pt);
        self
    }
}

/// A drawable element. Shapes paint in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// An embedded image; `media` indexes [`Presentation::media`].
    Picture { frame: Frame, media: usize },
    /// A borderless solid fill. `alpha` is opacity in percent (100 = opaque).
    Fill {
        frame: Frame,
        geometry: Geometry,
        color: Rgb,
        alpha: u8,
    },
    /// A word-wrapped text box.
    Text {
        frame: Frame,
        paragraphs: Vec<Paragraph>,
    },
}

impl Shape {
    pub fn picture(frame: Frame, media: usize) -> Self {
        Shape::Picture { frame, media }
    }

    pub fn fill(frame: Frame, geometry: Geometry, color: Rgb, alpha: u8) -> Self {
        Shape::Fill {
            frame,
            geometry,
            color,
            alpha: alpha.min(100),
        }
    }

    pub fn text(frame: Frame, paragraphs: Vec<Paragraph>) -> Self {
        Shape::Text { frame, paragraphs }
    }
}

/// One slide on the blank layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slide {
    pub shapes: Vec<Shape>,
}

impl Slide {
    pub fn push(&mut self, shape: Shape) -> &mut Self {
        self.shapes.push(shape);
        self
    }

    /// Media indices of the slide's pictures, in paint order.
    pub(crate) fn pictures(&self) -> impl Iterator<Item = usize> + '_ {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Picture { media, .. } => Some(*media),
            _ => None,
        })
    }
}

/// Encodings accepted for embedded images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Png,
    Jpeg,
}

impl MediaFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Png => "png",
            MediaFormat::Jpeg => "jpeg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            MediaFormat::Png => "image/png",
            MediaFormat::Jpeg => "image/jpeg",
        }
    }

    /// Sniff the encoding from the bytes, then fall back to the file extension.
    pub fn detect(bytes: &[u8], path: &Path) -> Option<Self> {
        match image::guess_format(bytes) {
            Ok(image::ImageFormat::Png) => return Some(MediaFormat::Png),
            Ok(image::ImageFormat::Jpeg) => return Some(MediaFormat::Jpeg),
            _ => {}
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(MediaFormat::Png),
            "jpg" | "jpeg" => Some(MediaFormat::Jpeg),
            _ => None,
        }
    }
}

/// An embedded image file.
#[derive(Debug, Clone, PartialEq)]
pub struct Media {
    pub data: Vec<u8>,
    pub format: MediaFormat,
}

/// A deck under construction.
#[derive(Debug, Clone, Default)]
pub struct Presentation {
    slides: Vec<Slide>,
    media: Vec<Media>,
}

impl Presentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a blank slide and return it for filling.
    pub fn add_slide(&mut self) -> &mut Slide {
        self.slides.push(Slide::default());
        let last = self.slides.len() - 1;
        &mut self.slides[last]
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn media(&self) -> &[Media] {
        &self.media
    }

    /// Embed image bytes and return the media index.
    pub fn add_media(&mut self, media: Media) -> usize {
        self.media.push(media);
        self.media.len() - 1
    }

    /// Read and embed a PNG or JPEG file.
    pub fn add_image_file(&mut self, path: &Path) -> Result<usize, Text2PptxError> {
        let data = std::fs::read(path).map_err(|source| Text2PptxError::ImageReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let format = MediaFormat::detect(&data, path).ok_or_else(|| {
            Text2PptxError::UnsupportedImage {
                path: path.to_path_buf(),
            }
        })?;
        Ok(self.add_media(Media { data, format }))
    }
}
