//! Whole-pipeline tests with scripted models: outline → backgrounds → deck.

mod common;

use async_trait::async_trait;
use common::{deck_texts, outline_reply, pipeline, wait_for_terminal, PaintTransport, ScriptedModel};
use edgequake_text2pptx::pipeline::outline::CompletionModel;
use edgequake_text2pptx::{
    GenerationRequest, Language, NoopProgressCallback, SlideError, SlideRole, TaskManager,
    TaskStatus, Text2PptxError,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

const NO_TEXT: &str = "no text no letters no words";

fn healthcare() -> String {
    outline_reply(&[
        ("AI in Healthcare", "Transforming patient care", "Soft blue medical gradient"),
        ("Key Applications", "Diagnosis; Drug discovery; Imaging", "Abstract teal network"),
        ("Thank You", "", "Calm sunrise over hills"),
    ])
}

fn five_slides() -> String {
    outline_reply(&[
        ("Opening", "A new era", "Sunrise gradient"),
        ("Background", "Where we are", "Paper texture"),
        ("Risks", "What can go wrong", "Dark storm clouds"),
        ("Plan", "Step one; Step two", "Clean geometric lines"),
        ("Thanks", "", "Starry night sky"),
    ])
}

#[tokio::test]
async fn three_slide_english_deck() {
    let dir = tempfile::tempdir().unwrap();
    let transport = PaintTransport::new();
    let p = pipeline(dir.path(), ScriptedModel::new(healthcare()), transport.clone());
    let request = GenerationRequest::new("AI in healthcare")
        .slide_count(3)
        .language(Language::English);

    let output = p
        .run(&request, "batch", "health", &NoopProgressCallback)
        .await
        .unwrap();

    assert_eq!(output.slides.len(), 3);
    assert_eq!(output.slides[0].role, SlideRole::Cover);
    assert_eq!(output.slides[1].role, SlideRole::Content);
    assert_eq!(output.slides[2].role, SlideRole::Closing);
    assert!(!output.stats.placeholder_outline);
    assert_eq!(output.stats.rendered_slides, 3);
    assert_eq!(output.stats.skipped_slides, 0);

    for (i, slide) in output.slides.iter().enumerate() {
        assert!(slide.image_prompt.contains(NO_TEXT));
        let path = slide.image_path.as_ref().unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("batch_slide_{:02}.png", i + 1)
        );
        assert!(path.exists());
    }

    assert_eq!(output.artifact.file_name, "health.pptx");
    assert_eq!(output.artifact.slide_count, 3);
    assert_eq!(output.artifact.slides[1].title, "Key Applications");

    let texts = deck_texts(&output.artifact.path);
    assert_eq!(texts.len(), 3);
    assert_eq!(texts[0], vec!["AI in Healthcare", "Transforming patient care"]);
    assert_eq!(
        texts[1],
        vec!["Key Applications", "• Diagnosis", "• Drug discovery", "• Imaging"]
    );
    assert_eq!(texts[2], vec!["Thank You"]);
    assert_eq!(transport.seen().len(), 3);
}

#[tokio::test]
async fn failed_background_drops_only_that_slide() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(
        dir.path(),
        ScriptedModel::new(five_slides()),
        PaintTransport::failing_on("storm"),
    );
    let request = GenerationRequest::new("a plan").slide_count(5);

    let output = p
        .run(&request, "b", "partial", &NoopProgressCallback)
        .await
        .unwrap();

    assert_eq!(output.stats.planned_slides, 5);
    assert_eq!(output.stats.rendered_slides, 4);
    assert_eq!(output.stats.skipped_slides, 1);
    assert!(matches!(
        output.stats.slide_errors.as_slice(),
        [SlideError::RenderFailed { slide: 3, .. }]
    ));
    assert!(output.slides[2].image_path.is_none());
    // the planned slide list still echoes all five
    assert_eq!(output.artifact.slides.len(), 5);
    assert_eq!(output.artifact.slide_count, 4);

    let titles: Vec<String> = deck_texts(&output.artifact.path)
        .into_iter()
        .map(|t| t[0].clone())
        .collect();
    assert_eq!(titles, vec!["Opening", "Background", "Plan", "Thanks"]);
}

#[tokio::test]
async fn unusable_reply_falls_back_to_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(
        dir.path(),
        ScriptedModel::new("Sorry, I cannot help with that."),
        PaintTransport::new(),
    );
    let request = GenerationRequest::new("量子计算入门").slide_count(4);

    let output = p
        .run(&request, "b", "fallback", &NoopProgressCallback)
        .await
        .unwrap();

    assert!(output.stats.placeholder_outline);
    assert_eq!(output.slides.len(), 4);
    let texts = deck_texts(&output.artifact.path);
    assert_eq!(texts.len(), 4);
    assert_eq!(texts[0], vec!["Slide 1", "量子计算入门"]);
    assert_eq!(texts[3], vec!["Slide 4"]);
}

#[tokio::test]
async fn form_feeds_in_source_text_stay_out_of_the_deck() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(
        dir.path(),
        ScriptedModel::new("not an outline"),
        PaintTransport::new(),
    );
    let request = GenerationRequest::new("Page one\u{000C}Page two").slide_count(1);

    let output = p
        .run(&request, "b", "paged", &NoopProgressCallback)
        .await
        .unwrap();

    assert!(output.stats.placeholder_outline);
    let texts = deck_texts(&output.artifact.path);
    assert_eq!(texts[0], vec!["Slide 1", "Page onePage two"]);
}

#[tokio::test]
async fn style_reaches_every_image_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let transport = PaintTransport::new();
    let p = pipeline(dir.path(), ScriptedModel::new(healthcare()), transport.clone());
    let request = GenerationRequest::new("AI").slide_count(3).style("minimalist");

    let output = p
        .run(&request, "b", "styled", &NoopProgressCallback)
        .await
        .unwrap();

    let prompts = transport.seen();
    assert_eq!(prompts.len(), 3);
    for prompt in &prompts {
        assert!(prompt.contains(NO_TEXT), "{prompt}");
        assert!(prompt.ends_with(", minimalist design style"), "{prompt}");
    }
    // the stored plan keeps the unstyled prompt
    assert!(!output.slides[0].image_prompt.contains("minimalist"));
}

#[tokio::test]
async fn nothing_rendered_writes_no_deck() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(
        dir.path(),
        ScriptedModel::new(healthcare()),
        PaintTransport::failing_on(NO_TEXT),
    );

    let err = p
        .run(&GenerationRequest::new("AI").slide_count(3), "b", "empty", &NoopProgressCallback)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Text2PptxError::NoSlidesRendered { planned: 3, rendered: 0, .. }
    ));
    assert!(!dir.path().join("empty.pptx").exists());
}

#[tokio::test]
async fn minimum_rendered_slides_is_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(
        dir.path(),
        ScriptedModel::new(five_slides()),
        PaintTransport::failing_on("storm"),
    )
    .min_rendered_slides(5);

    let err = p
        .run(&GenerationRequest::new("a plan").slide_count(5), "b", "short", &NoopProgressCallback)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Text2PptxError::NoSlidesRendered { rendered: 4, minimum: 5, .. }
    ));
}

// ── Task manager ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn queued_task_completes_with_partial_deck() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(
        dir.path(),
        ScriptedModel::new(five_slides()),
        PaintTransport::failing_on("storm"),
    );
    let manager = TaskManager::start(Arc::new(p), 2);

    let id = manager
        .submit(GenerationRequest::new("a plan").slide_count(5))
        .unwrap();
    assert_eq!(id.len(), 8);

    let record = wait_for_terminal(&manager, &id).await;
    assert_eq!(record.status, TaskStatus::Completed);
    assert!(record.error.is_none());
    let result = record.result.unwrap();
    assert_eq!(result.slides_count, 4);
    assert_eq!(result.ppt_filename, format!("presentation_{id}.pptx"));
    assert!(result.ppt_path.exists());
    assert_eq!(result.slides.len(), 5);

    // backgrounds are named after the task id
    assert!(dir
        .path()
        .join("images")
        .join(format!("{id}_slide_01.png"))
        .exists());
}

#[tokio::test]
async fn queued_task_without_backgrounds_fails() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(
        dir.path(),
        ScriptedModel::new(healthcare()),
        PaintTransport::failing_on(NO_TEXT),
    );
    let manager = TaskManager::start(Arc::new(p), 1);

    let id = manager
        .submit(GenerationRequest::new("AI").slide_count(3))
        .unwrap();
    let record = wait_for_terminal(&manager, &id).await;

    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record.result.is_none());
    assert!(record.error.unwrap().contains("0/3"));
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_queueing() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path(), ScriptedModel::new(healthcare()), PaintTransport::new());
    let manager = TaskManager::start(Arc::new(p), 1);

    assert!(matches!(
        manager.submit(GenerationRequest::new("   ")),
        Err(Text2PptxError::EmptyInput)
    ));
    assert!(matches!(
        manager.submit(GenerationRequest::new("x").slide_count(0)),
        Err(Text2PptxError::InvalidSlideCount { .. })
    ));
    assert!(manager.list().is_empty());
}

#[tokio::test]
async fn several_tasks_all_finish() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path(), ScriptedModel::new(healthcare()), PaintTransport::new());
    let manager = TaskManager::start(Arc::new(p), 2);

    let ids: Vec<String> = (0..4)
        .map(|i| {
            manager
                .submit(GenerationRequest::new(format!("topic {i}")).slide_count(3))
                .unwrap()
        })
        .collect();

    for id in &ids {
        let record = wait_for_terminal(&manager, id).await;
        assert_eq!(record.status, TaskStatus::Completed, "{id}: {:?}", record.error);
        assert_eq!(record.progress, "Done");
    }
    assert_eq!(manager.list().len(), 4);
}

struct PanickingModel;

#[async_trait]
impl CompletionModel for PanickingModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, Text2PptxError> {
        panic!("outline model exploded");
    }
}

#[tokio::test]
async fn panicking_job_is_recorded_as_failed() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline(dir.path(), Arc::new(PanickingModel), PaintTransport::new());
    let manager = TaskManager::start(Arc::new(p), 1);

    let id = manager.submit(GenerationRequest::new("AI").slide_count(2)).unwrap();
    let record = wait_for_terminal(&manager, &id).await;

    assert_eq!(record.status, TaskStatus::Failed);
    assert!(record.result.is_none());
    assert!(record.error.unwrap().contains("panicked"));

    // the worker survives and takes the next job
    let next = manager.submit(GenerationRequest::new("AI").slide_count(2)).unwrap();
    assert_eq!(wait_for_terminal(&manager, &next).await.status, TaskStatus::Failed);
}

#[tokio::test]
async fn at_most_workers_jobs_run_at_once() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Semaphore::new(0));
    let transport = PaintTransport::gated(gate.clone());
    let p = pipeline(dir.path(), ScriptedModel::new(healthcare()), transport.clone());
    let manager = TaskManager::start(Arc::new(p), 2);

    let ids: Vec<String> = (0..5)
        .map(|i| {
            manager
                .submit(GenerationRequest::new(format!("topic {i}")).slide_count(3))
                .unwrap()
        })
        .collect();

    let deadline = Instant::now() + Duration::from_secs(10);
    while transport.in_flight() < 2 {
        assert!(Instant::now() < deadline, "workers never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // give a third job the chance to start if the bound were broken
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.in_flight(), 2);
    let processing = manager
        .list()
        .iter()
        .filter(|r| r.status == TaskStatus::Processing)
        .count();
    assert_eq!(processing, 2);

    gate.add_permits(64);
    for id in &ids {
        assert_eq!(wait_for_terminal(&manager, id).await.status, TaskStatus::Completed);
    }
    assert!(transport.peak() <= 2, "peak was {}", transport.peak());
}
