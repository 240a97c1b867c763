//! Fakes and deck readers shared by the integration tests.
//!
//! Nothing here touches the network: the outline comes from a scripted
//! [`CompletionModel`] and backgrounds from an in-memory [`ImageTransport`].

#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use edgequake_text2pptx::pipeline::deck::DeckAssembler;
use edgequake_text2pptx::pipeline::image::{
    BackgroundRenderer, ImagePayload, ImageTransport, TransportOutcome,
};
use edgequake_text2pptx::pipeline::outline::{CompletionModel, OutlineSynthesizer};
use edgequake_text2pptx::pipeline::persist::ImageStore;
use edgequake_text2pptx::{Pipeline, TaskManager, TaskRecord, Text2PptxError};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

// ── Outline model ────────────────────────────────────────────────────────────

/// Replies with the same text every time.
pub struct ScriptedModel {
    reply: String,
    pub calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionModel for ScriptedModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, Text2PptxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// A fenced JSON outline, the way chat models usually answer.
pub fn outline_reply(slides: &[(&str, &str, &str)]) -> String {
    let items: Vec<serde_json::Value> = slides
        .iter()
        .enumerate()
        .map(|(i, (title, content, prompt))| {
            serde_json::json!({
                "slide_number": i + 1,
                "title": title,
                "content": content,
                "image_prompt": prompt,
            })
        })
        .collect();
    let body = serde_json::to_string_pretty(&items).unwrap_or_default();
    format!("```json\n{body}\n```")
}

// ── Image transport ──────────────────────────────────────────────────────────

pub fn png_bytes() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 18, Rgb([20, 40, 80])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Returns a small PNG for every prompt that does not contain `fail_on`.
pub struct PaintTransport {
    fail_on: Option<&'static str>,
    gate: Option<Arc<Semaphore>>,
    pub prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl PaintTransport {
    pub fn new() -> Arc<Self> {
        Self::build(None, None)
    }

    pub fn failing_on(marker: &'static str) -> Arc<Self> {
        Self::build(Some(marker), None)
    }

    /// Blocks every call until the semaphore has permits.
    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Self::build(None, Some(gate))
    }

    fn build(fail_on: Option<&'static str>, gate: Option<Arc<Semaphore>>) -> Arc<Self> {
        Arc::new(Self {
            fail_on,
            gate,
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn seen(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Calls currently waiting at the gate.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Most calls ever waiting at the gate at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageTransport for PaintTransport {
    fn name(&self) -> &'static str {
        "paint"
    }

    async fn generate(&self, prompt: &str) -> TransportOutcome {
        if let Some(gate) = &self.gate {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _permit = gate.acquire().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(marker) = self.fail_on {
            if prompt.contains(marker) {
                return TransportOutcome::Miss("HTTP 500: render failed".into());
            }
        }
        let b64 = base64::engine::general_purpose::STANDARD.encode(png_bytes());
        TransportOutcome::Image(ImagePayload::Base64(b64))
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

pub fn pipeline(
    dir: &Path,
    model: Arc<dyn CompletionModel>,
    transport: Arc<dyn ImageTransport>,
) -> Pipeline {
    Pipeline::new(
        OutlineSynthesizer::new(model),
        BackgroundRenderer::new(
            vec![transport],
            ImageStore::new(dir.join("images"), Duration::from_secs(5)),
        ),
        DeckAssembler::new(dir.to_path_buf()),
    )
}

/// Poll until the task reaches Completed or Failed.
pub async fn wait_for_terminal(manager: &TaskManager, task_id: &str) -> TaskRecord {
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        if let Some(record) = manager.status(task_id) {
            if record.status.is_terminal() {
                return record;
            }
        }
        assert!(Instant::now() < deadline, "task {task_id} did not finish");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ── Deck reading ─────────────────────────────────────────────────────────────

/// The `<a:t>` runs of every slide, in slide order.
pub fn deck_texts(path: &Path) -> Vec<Vec<String>> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();

    let mut slides = Vec::new();
    for n in 1.. {
        let name = format!("ppt/slides/slide{n}.xml");
        let mut xml = String::new();
        match archive.by_name(&name) {
            Ok(mut part) => {
                part.read_to_string(&mut xml).unwrap();
            }
            Err(_) => break,
        }
        slides.push(slide_texts(&xml));
    }
    slides
}

fn slide_texts(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut texts = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"a:t" => {
                in_text = true;
                texts.push(String::new());
            }
            Ok(Event::Text(ref e)) if in_text => {
                if let Some(last) = texts.last_mut() {
                    last.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"a:t" => in_text = false,
            Ok(Event::Eof) => break,
            Err(e) => panic!("bad slide xml: {e}"),
            _ => {}
        }
    }
    texts
}
