//! Asynchronous, tracked generation: submit now, poll later.
//!
//! [`TaskManager::submit`] records a Pending [`TaskRecord`] and queues the
//! job; a single dispatcher drains the queue with at most `workers` jobs in
//! flight. Each job runs on its own spawned task so a panic inside the
//! pipeline is caught and recorded as Failed instead of killing a worker.
//!
//! ```text
//! submit ──▶ mpsc queue ──▶ dispatcher (for_each_concurrent(workers))
//!                               └─▶ tokio::spawn(Pipeline::run) ──▶ TaskStore
//! ```
//!
//! Status moves Pending → Processing → Completed | Failed; the last two are
//! final and later updates are ignored.

use crate::error::Text2PptxError;
use crate::generate::Pipeline;
use crate::output::{DeckArtifact, SlideSummary};
use crate::progress::GenerationProgressCallback;
use crate::request::{GenerationRequest, RequestEcho};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Completed and Failed never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// What a completed task produced, in the shape clients poll for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub ppt_path: PathBuf,
    pub ppt_filename: String,
    pub slides_count: usize,
    pub slides: Vec<SlideSummary>,
}

impl From<&DeckArtifact> for TaskResult {
    fn from(a: &DeckArtifact) -> Self {
        Self {
            ppt_path: a.path.clone(),
            ppt_filename: a.file_name.clone(),
            slides_count: a.slide_count,
            slides: a.slides.clone(),
        }
    }
}

/// One tracked generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    /// Human-readable stage description.
    pub progress: String,
    pub request: RequestEcho,
    /// Planned outline length, once the outline is ready.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub slides_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    fn pending(task_id: String, request: &GenerationRequest) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            status: TaskStatus::Pending,
            progress: "Queued".to_string(),
            request: request.echo(),
            slides_count: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ── Store ────────────────────────────────────────────────────────────────────

/// Concurrent task table. Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    records: Arc<DashMap<String, TaskRecord>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: TaskRecord) {
        self.records.insert(record.task_id.clone(), record);
    }

    /// Apply `f` to a non-terminal record. Returns false when the task is
    /// unknown or already Completed/Failed.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut TaskRecord)) -> bool {
        match self.records.get_mut(id) {
            Some(mut entry) if !entry.status.is_terminal() => {
                f(&mut entry);
                entry.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<TaskRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// All records, oldest first.
    pub fn list(&self) -> Vec<TaskRecord> {
        let mut all: Vec<TaskRecord> = self.records.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.task_id.cmp(&b.task_id)));
        all
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ── Progress ─────────────────────────────────────────────────────────────────

/// Turns pipeline events into progress strings on one record.
struct TaskProgress {
    store: TaskStore,
    task_id: String,
}

impl TaskProgress {
    fn set(&self, progress: String) {
        self.store.update(&self.task_id, |r| {
            r.status = TaskStatus::Processing;
            r.progress = progress;
        });
    }
}

impl GenerationProgressCallback for TaskProgress {
    fn on_outline_start(&self) {
        self.set("Analysing content structure...".to_string());
    }

    fn on_outline_complete(&self, slide_count: usize, _placeholder: bool) {
        self.store.update(&self.task_id, |r| {
            r.status = TaskStatus::Processing;
            r.slides_count = Some(slide_count);
            r.progress = format!("Generated {slide_count} slide outlines");
        });
    }

    fn on_slide_start(&self, slide_number: usize, total_slides: usize) {
        self.set(format!("Rendering slide {slide_number}/{total_slides}..."));
    }

    fn on_assembly_start(&self, _slide_count: usize) {
        self.set("Assembling presentation file...".to_string());
    }
}

// ── Manager ──────────────────────────────────────────────────────────────────

struct Job {
    task_id: String,
    request: GenerationRequest,
}

/// Queue-backed worker pool over one shared [`Pipeline`].
#[derive(Clone)]
pub struct TaskManager {
    store: TaskStore,
    queue: mpsc::UnboundedSender<Job>,
}

impl TaskManager {
    /// Spawn the dispatcher. Must be called inside a tokio runtime.
    pub fn start(pipeline: Arc<Pipeline>, workers: usize) -> Self {
        let store = TaskStore::new();
        let (queue, rx) = mpsc::unbounded_channel::<Job>();
        let workers = workers.max(1);

        let dispatch_store = store.clone();
        tokio::spawn(async move {
            UnboundedReceiverStream::new(rx)
                .for_each_concurrent(workers, |job| {
                    run_job(Arc::clone(&pipeline), dispatch_store.clone(), job)
                })
                .await;
            info!("Task queue closed; dispatcher exiting");
        });

        info!("Task manager started with {} workers", workers);
        Self { store, queue }
    }

    /// Validate and enqueue `request`; returns the new task id at once.
    pub fn submit(&self, request: GenerationRequest) -> Result<String, Text2PptxError> {
        request.validate()?;

        let task_id = self.new_task_id();
        self.store.insert(TaskRecord::pending(task_id.clone(), &request));

        if self
            .queue
            .send(Job {
                task_id: task_id.clone(),
                request,
            })
            .is_err()
        {
            self.store.update(&task_id, |r| {
                r.status = TaskStatus::Failed;
                r.error = Some("Task queue is closed".to_string());
            });
            return Err(Text2PptxError::Internal("Task queue is closed".into()));
        }

        info!("Task {} queued", task_id);
        Ok(task_id)
    }

    pub fn status(&self, task_id: &str) -> Option<TaskRecord> {
        self.store.get(task_id)
    }

    pub fn list(&self) -> Vec<TaskRecord> {
        self.store.list()
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// First 8 hex digits of a v4 UUID, re-drawn on collision.
    fn new_task_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().simple().to_string()[..8].to_string();
            if !self.store.contains(&id) {
                return id;
            }
        }
    }
}

async fn run_job(pipeline: Arc<Pipeline>, store: TaskStore, job: Job) {
    let Job { task_id, request } = job;
    store.update(&task_id, |r| {
        r.status = TaskStatus::Processing;
        r.progress = "Starting...".to_string();
    });

    let progress = TaskProgress {
        store: store.clone(),
        task_id: task_id.clone(),
    };
    let batch = task_id.clone();
    let handle = tokio::spawn(async move {
        let output_name = format!("presentation_{batch}");
        pipeline.run(&request, &batch, &output_name, &progress).await
    });

    match handle.await {
        Ok(Ok(output)) => {
            info!(
                "Task {} completed: {} slides",
                task_id, output.artifact.slide_count
            );
            store.update(&task_id, |r| {
                r.status = TaskStatus::Completed;
                r.progress = "Done".to_string();
                r.result = Some(TaskResult::from(&output.artifact));
            });
        }
        Ok(Err(e)) => {
            warn!("Task {} failed: {}", task_id, e);
            store.update(&task_id, |r| {
                r.status = TaskStatus::Failed;
                r.error = Some(e.to_string());
            });
        }
        Err(join) => {
            error!("Task {} panicked: {}", task_id, join);
            store.update(&task_id, |r| {
                r.status = TaskStatus::Failed;
                r.error = Some(format!("Generation task panicked: {join}"));
            });
        }
    }
}
