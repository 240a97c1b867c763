//! Serialise a [`Presentation`] into an Office Open XML package.
//!
//! Part layout:
//!
//! ```text
//! [Content_Types].xml
//! _rels/.rels
//! docProps/{core,app}.xml
//! ppt/presentation.xml            ppt/_rels/presentation.xml.rels
//! ppt/slideMasters/slideMaster1.xml (+ rels)
//! ppt/slideLayouts/slideLayout1.xml (+ rels)
//! ppt/theme/theme1.xml
//! ppt/slides/slideN.xml           ppt/slides/_rels/slideN.xml.rels
//! ppt/media/imageN.{png,jpeg}
//! ```
//!
//! In slide rels `rId1` is always the layout; pictures follow from `rId2`.

use super::parts::*;
use super::{Frame, MediaFormat, Paragraph, Presentation, Shape, Slide, SLIDE_HEIGHT_EMU, SLIDE_WIDTH_EMU};
use crate::error::Text2PptxError;
use chrono::{SecondsFormat, Utc};
use quick_xml::escape::escape;
use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// First `sldId`; lower values are reserved.
const FIRST_SLIDE_ID: usize = 256;

#[derive(Debug, Error)]
enum PackageError {
    #[error("zip: {0}")]
    Zip(#[from] ZipError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml formatting failed")]
    Fmt(#[from] fmt::Error),
}

impl Presentation {
    /// Write the package to `path` atomically: a temp file in the same
    /// directory is renamed into place once complete.
    pub fn save(&self, path: &Path) -> Result<(), Text2PptxError> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|source| Text2PptxError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| {
            Text2PptxError::OutputWriteFailed {
                path: dir.to_path_buf(),
                source,
            }
        })?;

        self.write_package(tmp.as_file_mut())
            .map_err(|e| Text2PptxError::DeckWriteFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        tmp.persist(path)
            .map_err(|e| Text2PptxError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e.error,
            })?;

        info!("Wrote deck with {} slides: {}", self.slides().len(), path.display());
        Ok(())
    }

    /// The package as bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Text2PptxError> {
        self.write_package(Cursor::new(Vec::new()))
            .map(Cursor::into_inner)
            .map_err(|e| Text2PptxError::Internal(format!("deck serialisation: {e}")))
    }

    fn write_package<W: Write + Seek>(&self, writer: W) -> Result<W, PackageError> {
        let mut zip = ZipWriter::new(writer);
        let xml = FileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = FileOptions::default().compression_method(CompressionMethod::Stored);

        put(&mut zip, xml, "[Content_Types].xml", self.content_types_xml()?.as_bytes())?;
        put(&mut zip, xml, "_rels/.rels", ROOT_RELS.as_bytes())?;
        put(&mut zip, xml, "docProps/core.xml", core_xml()?.as_bytes())?;
        put(&mut zip, xml, "docProps/app.xml", self.app_xml()?.as_bytes())?;
        put(&mut zip, xml, "ppt/presentation.xml", self.presentation_xml()?.as_bytes())?;
        put(
            &mut zip,
            xml,
            "ppt/_rels/presentation.xml.rels",
            self.presentation_rels_xml()?.as_bytes(),
        )?;
        put(&mut zip, xml, "ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER.as_bytes())?;
        put(
            &mut zip,
            xml,
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            SLIDE_MASTER_RELS.as_bytes(),
        )?;
        put(&mut zip, xml, "ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT.as_bytes())?;
        put(
            &mut zip,
            xml,
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            SLIDE_LAYOUT_RELS.as_bytes(),
        )?;
        put(&mut zip, xml, "ppt/theme/theme1.xml", THEME.as_bytes())?;

        for (idx, slide) in self.slides().iter().enumerate() {
            let n = idx + 1;
            put(
                &mut zip,
                xml,
                &format!("ppt/slides/slide{n}.xml"),
                slide_xml(slide)?.as_bytes(),
            )?;
            put(
                &mut zip,
                xml,
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                self.slide_rels_xml(slide)?.as_bytes(),
            )?;
        }

        // Images are already compressed.
        for (idx, media) in self.media().iter().enumerate() {
            put(&mut zip, stored, &media_part_name(idx, media.format), &media.data)?;
        }

        debug!(
            "Packaged {} slides and {} media parts",
            self.slides().len(),
            self.media().len()
        );
        Ok(zip.finish()?)
    }

    fn content_types_xml(&self) -> Result<String, fmt::Error> {
        let mut xml = String::with_capacity(2048);
        xml.push_str(XML_DECL);
        xml.push_str(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
        );
        write!(xml, r#"<Default Extension="rels" ContentType="{CT_RELS}"/>"#)?;
        xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
        for format in [MediaFormat::Png, MediaFormat::Jpeg] {
            if self.media().iter().any(|m| m.format == format) {
                write!(
                    xml,
                    r#"<Default Extension="{}" ContentType="{}"/>"#,
                    format.extension(),
                    format.content_type()
                )?;
            }
        }

        let mut over = |part: &str, ct: &str| {
            write!(xml, r#"<Override PartName="{part}" ContentType="{ct}"/>"#)
        };
        over("/ppt/presentation.xml", CT_PRESENTATION)?;
        over("/ppt/slideMasters/slideMaster1.xml", CT_SLIDE_MASTER)?;
        over("/ppt/slideLayouts/slideLayout1.xml", CT_SLIDE_LAYOUT)?;
        over("/ppt/theme/theme1.xml", CT_THEME)?;
        over("/docProps/core.xml", CT_CORE_PROPS)?;
        over("/docProps/app.xml", CT_EXTENDED_PROPS)?;
        for n in 1..=self.slides().len() {
            over(&format!("/ppt/slides/slide{n}.xml"), CT_SLIDE)?;
        }

        xml.push_str("</Types>");
        Ok(xml)
    }

    fn app_xml(&self) -> Result<String, fmt::Error> {
        let mut xml = String::with_capacity(512);
        xml.push_str(XML_DECL);
        xml.push_str(r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">"#);
        write!(
            xml,
            "<Application>edgequake-text2pptx</Application><Slides>{}</Slides>",
            self.slides().len()
        )?;
        xml.push_str("</Properties>");
        Ok(xml)
    }

    fn presentation_xml(&self) -> Result<String, fmt::Error> {
        let mut xml = String::with_capacity(1024);
        xml.push_str(XML_DECL);
        write!(
            xml,
            r#"<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1">"#
        )?;
        xml.push_str("<p:sldMasterIdLst>");
        xml.push_str(r#"<p:sldMasterId id="2147483648" r:id="rId1"/>"#);
        xml.push_str("</p:sldMasterIdLst>");

        if !self.slides().is_empty() {
            xml.push_str("<p:sldIdLst>");
            for idx in 0..self.slides().len() {
                write!(
                    xml,
                    r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                    FIRST_SLIDE_ID + idx,
                    idx + 2
                )?;
            }
            xml.push_str("</p:sldIdLst>");
        }

        write!(
            xml,
            r#"<p:sldSz cx="{SLIDE_WIDTH_EMU}" cy="{SLIDE_HEIGHT_EMU}"/>"#
        )?;
        xml.push_str(r#"<p:notesSz cx="6858000" cy="9144000"/>"#);
        xml.push_str("</p:presentation>");
        Ok(xml)
    }

    /// `rId1` master, `rId2..` slides, theme last.
    fn presentation_rels_xml(&self) -> Result<String, fmt::Error> {
        let mut xml = rels_open();
        write_rel(&mut xml, 1, REL_SLIDE_MASTER, "slideMasters/slideMaster1.xml")?;
        for idx in 0..self.slides().len() {
            write_rel(&mut xml, idx + 2, REL_SLIDE, &format!("slides/slide{}.xml", idx + 1))?;
        }
        write_rel(&mut xml, self.slides().len() + 2, REL_THEME, "theme/theme1.xml")?;
        xml.push_str("</Relationships>");
        Ok(xml)
    }

    fn slide_rels_xml(&self, slide: &Slide) -> Result<String, fmt::Error> {
        let mut xml = rels_open();
        write_rel(&mut xml, 1, REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml")?;
        for (k, media) in slide.pictures().enumerate() {
            let format = self
                .media()
                .get(media)
                .map(|m| m.format)
                .unwrap_or(MediaFormat::Png);
            let target = format!("../{}", media_part_name(media, format).trim_start_matches("ppt/"));
            write_rel(&mut xml, k + 2, REL_IMAGE, &target)?;
        }
        xml.push_str("</Relationships>");
        Ok(xml)
    }
}

fn put<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    options: FileOptions,
    name: &str,
    body: &[u8],
) -> Result<(), PackageError> {
    zip.start_file(name, options)?;
    zip.write_all(body)?;
    Ok(())
}

fn media_part_name(idx: usize, format: MediaFormat) -> String {
    format!("ppt/media/image{}.{}", idx + 1, format.extension())
}

fn rels_open() -> String {
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_DECL);
    xml.push_str(r#"<Relationships xmlns=""#);
    xml.push_str(NS_PKG_RELS);
    xml.push_str(r#"">"#);
    xml
}

fn write_rel(xml: &mut String, id: usize, rel_type: &str, target: &str) -> fmt::Result {
    write!(
        xml,
        r#"<Relationship Id="rId{id}" Type="{rel_type}" Target="{target}"/>"#
    )
}

fn core_xml() -> Result<String, fmt::Error> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut xml = String::with_capacity(768);
    xml.push_str(XML_DECL);
    xml.push_str(r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#);
    xml.push_str("<dc:title>Presentation</dc:title><dc:creator>edgequake-text2pptx</dc:creator>");
    write!(
        xml,
        r#"<dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified>"#
    )?;
    xml.push_str("</cp:coreProperties>");
    Ok(xml)
}

// ── Slide XML ────────────────────────────────────────────────────────────────

fn slide_xml(slide: &Slide) -> Result<String, fmt::Error> {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_DECL);
    write!(xml, r#"<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}">"#)?;
    xml.push_str("<p:cSld><p:spTree>");
    xml.push_str(SP_TREE_HEADER);

    let mut picture_rel = 2;
    for (idx, shape) in slide.shapes.iter().enumerate() {
        // id 1 is the group itself
        let id = idx + 2;
        match shape {
            Shape::Picture { frame, .. } => {
                write_picture(&mut xml, id, picture_rel, frame)?;
                picture_rel += 1;
            }
            Shape::Fill {
                frame,
                geometry,
                color,
                alpha,
            } => {
                xml.push_str("<p:sp><p:nvSpPr>");
                write!(xml, r#"<p:cNvPr id="{id}" name="Shape {id}"/>"#)?;
                xml.push_str("<p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr>");
                write_xfrm(&mut xml, frame)?;
                write!(xml, r#"<a:prstGeom prst="{}"><a:avLst/></a:prstGeom>"#, geometry.preset())?;
                write!(xml, r#"<a:solidFill><a:srgbClr val="{}">"#, color.hex())?;
                if *alpha < 100 {
                    write!(xml, r#"<a:alpha val="{}"/>"#, u32::from(*alpha) * 1000)?;
                }
                xml.push_str("</a:srgbClr></a:solidFill><a:ln><a:noFill/></a:ln></p:spPr></p:sp>");
            }
            Shape::Text { frame, paragraphs } => {
                xml.push_str("<p:sp><p:nvSpPr>");
                write!(xml, r#"<p:cNvPr id="{id}" name="Text Box {id}"/>"#)?;
                xml.push_str(r#"<p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>"#);
                write_xfrm(&mut xml, frame)?;
                xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
                xml.push_str(r#"<p:txBody><a:bodyPr wrap="square" rtlCol="0" anchor="t"><a:normAutofit/></a:bodyPr><a:lstStyle/>"#);
                if paragraphs.is_empty() {
                    xml.push_str("<a:p/>");
                }
                for p in paragraphs {
                    write_paragraph(&mut xml, p)?;
                }
                xml.push_str("</p:txBody></p:sp>");
            }
        }
    }

    xml.push_str("</p:spTree></p:cSld>");
    xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>");
    xml.push_str("</p:sld>");
    Ok(xml)
}

fn write_xfrm(xml: &mut String, frame: &Frame) -> fmt::Result {
    write!(
        xml,
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        frame.x, frame.y, frame.width, frame.height
    )
}

fn write_picture(xml: &mut String, id: usize, rel: usize, frame: &Frame) -> fmt::Result {
    xml.push_str("<p:pic><p:nvPicPr>");
    write!(xml, r#"<p:cNvPr id="{id}" name="Background {id}"/>"#)?;
    xml.push_str(r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#);
    write!(
        xml,
        r#"<p:blipFill><a:blip r:embed="rId{rel}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#
    )?;
    xml.push_str("<p:spPr>");
    write_xfrm(xml, frame)?;
    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#);
    Ok(())
}

fn write_paragraph(xml: &mut String, p: &Paragraph) -> fmt::Result {
    write!(xml, r#"<a:p><a:pPr algn="{}">"#, p.align.attr())?;
    if let Some(pt) = p.space_before_pt {
        write!(xml, r#"<a:spcBef><a:spcPts val="{}"/></a:spcBef>"#, hundredths(pt))?;
    }
    if let Some(pt) = p.space_after_pt {
        write!(xml, r#"<a:spcAft><a:spcPts val="{}"/></a:spcAft>"#, hundredths(pt))?;
    }
    xml.push_str("</a:pPr><a:r>");
    write!(xml, r#"<a:rPr lang="en-US" sz="{}""#, hundredths(p.size_pt))?;
    if p.bold {
        xml.push_str(r#" b="1""#);
    }
    xml.push_str(r#" dirty="0">"#);
    write!(
        xml,
        r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:rPr>"#,
        p.color.hex()
    )?;
    write!(xml, "<a:t>{}</a:t></a:r></a:p>", escape(&xml_chars(&p.text)))
}

/// Drop characters XML 1.0 cannot carry: C0 controls other than tab, LF
/// and CR, plus U+FFFE and U+FFFF.
fn xml_chars(text: &str) -> Cow<'_, str> {
    let allowed =
        |c: char| !matches!(c, '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}');
    if text.chars().all(allowed) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|&c| allowed(c)).collect())
    }
}

/// Points to the hundredths DrawingML uses for sizes and spacing.
fn hundredths(pt: f64) -> u32 {
    (pt * 100.0).round() as u32
}
