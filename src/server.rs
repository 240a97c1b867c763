//! HTTP front end over a [`TaskManager`].
//!
//! | Method | Path                      | Response                         |
//! |--------|---------------------------|----------------------------------|
//! | POST   | `/api/generate`           | `{task_id, status}`              |
//! | GET    | `/api/status/{task_id}`   | [`TaskRecord`]                   |
//! | GET    | `/api/download/{task_id}` | the `.pptx` as an attachment     |
//! | GET    | `/api/tasks`              | every [`TaskRecord`], oldest first |
//!
//! Errors are JSON: `{"error": {"code", "message", "hint"?}}`.

use crate::error::Text2PptxError;
use crate::request::{GenerationRequest, Language, DEFAULT_SLIDE_COUNT};
use crate::tasks::{TaskManager, TaskRecord, TaskStatus};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{info, warn};

const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

pub mod codes {
    pub const MISSING_INPUT: &str = "missing_input";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const TASK_NOT_FOUND: &str = "task_not_found";
    pub const NOT_READY: &str = "not_ready";
    pub const FILE_MISSING: &str = "file_missing";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
struct ApiErrorMessage {
    code: &'static str,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

/// A JSON error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    fn missing_input(hint: Option<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::MISSING_INPUT,
            "Text content is required",
            hint,
        )
    }

    fn task_not_found(task_id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            codes::TASK_NOT_FOUND,
            "Task not found",
            Some(format!("No task with id '{task_id}'")),
        )
    }

    fn not_ready(status: TaskStatus) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            codes::NOT_READY,
            "Presentation not ready yet",
            Some(format!("Task status is {status:?}")),
        )
    }

    fn file_missing(hint: String) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            codes::FILE_MISSING,
            "File not found",
            Some(hint),
        )
    }
}

impl From<Text2PptxError> for ApiError {
    fn from(error: Text2PptxError) -> Self {
        match error {
            Text2PptxError::EmptyInput => Self::missing_input(None),
            e @ Text2PptxError::InvalidSlideCount { .. } => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid slide count",
                Some(e.to_string()),
            ),
            e => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::INTERNAL,
                "Unexpected error occurred",
                Some(e.to_string()),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code,
                message: self.message,
                hint: self.hint,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// Body of `POST /api/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "default_num_slides")]
    pub num_slides: usize,
    #[serde(default)]
    pub language: Option<String>,
    /// Absent means the business style; `""` means no style.
    #[serde(default = "default_style")]
    pub style: Option<String>,
}

/// Style used when a request names none.
pub const DEFAULT_SERVICE_STYLE: &str = "商务";

fn default_num_slides() -> usize {
    DEFAULT_SLIDE_COUNT
}

fn default_style() -> Option<String> {
    Some(DEFAULT_SERVICE_STYLE.to_string())
}

impl GenerateBody {
    fn into_request(self) -> GenerationRequest {
        let mut request =
            GenerationRequest::new(self.text.unwrap_or_default()).slide_count(self.num_slides);
        if let Some(tag) = self.language.filter(|t| !t.trim().is_empty()) {
            request = request.language(Language::from_tag(&tag));
        }
        if let Some(style) = self.style {
            request = request.style(style);
        }
        request
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: TaskStatus,
}

async fn submit(
    State(manager): State<TaskManager>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::missing_input(Some(e.body_text())))?;
    let task_id = manager.submit(body.into_request())?;
    Ok(Json(SubmitResponse {
        task_id,
        status: TaskStatus::Pending,
    }))
}

async fn status(
    State(manager): State<TaskManager>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    manager
        .status(&task_id)
        .map(Json)
        .ok_or_else(|| ApiError::task_not_found(&task_id))
}

async fn download(
    State(manager): State<TaskManager>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let record = manager
        .status(&task_id)
        .ok_or_else(|| ApiError::task_not_found(&task_id))?;
    let result = match (record.status, record.result) {
        (TaskStatus::Completed, Some(result)) => result,
        (status, _) => return Err(ApiError::not_ready(status)),
    };

    let bytes = tokio::fs::read(&result.ppt_path).await.map_err(|e| {
        warn!(
            "Deck for task {} unreadable at {}: {}",
            task_id,
            result.ppt_path.display(),
            e
        );
        ApiError::file_missing(format!("{}: {}", result.ppt_path.display(), e))
    })?;

    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PPTX_CONTENT_TYPE),
    );
    let safe_name = result.ppt_filename.replace('"', "'");
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{safe_name}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

async fn list(State(manager): State<TaskManager>) -> Json<Vec<TaskRecord>> {
    Json(manager.list())
}

/// The API routes, bound to `manager`.
pub fn router(manager: TaskManager) -> Router {
    Router::new()
        .route("/api/generate", post(submit))
        .route("/api/status/{task_id}", get(status))
        .route("/api/download/{task_id}", get(download))
        .route("/api/tasks", get(list))
        .with_state(manager)
}

/// Serve [`router`] on `addr` until the process stops.
pub async fn serve(addr: SocketAddr, manager: TaskManager) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(manager)).await
}
