//! Typed client for the annotation server's JSON endpoints.

mod http;
#[cfg(test)]
pub(crate) mod testing;
mod types;

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use http::HttpTransport;
pub use types::{
    AiHealthReport, ExportImage, ExportQuestion, ExportResult, ExportTaskRequest,
    ExportTaskSnapshot, MarkdownLink, NotionItemRequest, NotionItemSnapshot, NotionItemStatus,
    NotionTaskRequest, NotionTaskSnapshot, RecognizeRequest, RecognizeResponse, TaskCreated,
    TaskStatus, UploadResponse, UploadedImage,
};
use types::TaskEnvelope;

pub const UPLOAD_PATH: &str = "/api/upload";
pub const RECOGNIZE_PATH: &str = "/api/recognize-question";
pub const EXPORT_TASKS_PATH: &str = "/api/export/tasks";
pub const NOTION_TASKS_PATH: &str = "/api/notion-upload/tasks";
pub const AI_HEALTH_PATH: &str = "/api/ai-health";

const ALLOWED_IMAGE_SUFFIXES: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiError {
    #[error("network error: {message}")]
    Network { message: String },
    #[error("server returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("{message}")]
    Rejected { message: String },
    #[error("invalid response: {message}")]
    Decode { message: String },
    #[error("no images selected")]
    EmptyUpload,
    #[error("unsupported image file: {name}")]
    UnsupportedImage { name: String },
    #[error("failed to read {path}: {message}")]
    ReadFile { path: String, message: String },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// One image file queued for `POST /api/upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn from_path(path: &Path) -> ApiResult<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(path).map_err(|err| ApiError::ReadFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Ok(Self { file_name, bytes })
    }
}

pub fn is_allowed_image(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_IMAGE_SUFFIXES.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

pub fn validate_upload(files: &[UploadFile]) -> ApiResult<()> {
    if files.is_empty() {
        return Err(ApiError::EmptyUpload);
    }
    if let Some(file) = files.iter().find(|file| !is_allowed_image(&file.file_name)) {
        return Err(ApiError::UnsupportedImage {
            name: file.file_name.clone(),
        });
    }
    Ok(())
}

/// Raw JSON exchange with the server. Implementations block the calling
/// thread, so callers run them on worker threads.
pub trait ApiTransport: Send + Sync {
    fn get_json(&self, path: &str) -> ApiResult<Value>;
    fn post_json(&self, path: &str, body: Value) -> ApiResult<Value>;
    fn post_images(&self, path: &str, files: &[UploadFile]) -> ApiResult<Value>;
}

impl<T: ApiTransport + ?Sized> ApiTransport for std::sync::Arc<T> {
    fn get_json(&self, path: &str) -> ApiResult<Value> {
        (**self).get_json(path)
    }

    fn post_json(&self, path: &str, body: Value) -> ApiResult<Value> {
        (**self).post_json(path, body)
    }

    fn post_images(&self, path: &str, files: &[UploadFile]) -> ApiResult<Value> {
        (**self).post_images(path, files)
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient<T> {
    transport: T,
}

impl<T: ApiTransport> ApiClient<T> {
    pub const fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn upload(&self, files: &[UploadFile]) -> ApiResult<UploadResponse> {
        validate_upload(files)?;
        tracing::info!(count = files.len(), "uploading images");
        let value = self.transport.post_images(UPLOAD_PATH, files)?;
        decode(accepted(value)?)
    }

    pub fn upload_paths(&self, paths: &[PathBuf]) -> ApiResult<UploadResponse> {
        let files = paths
            .iter()
            .map(|path| UploadFile::from_path(path))
            .collect::<ApiResult<Vec<_>>>()?;
        self.upload(&files)
    }

    pub fn recognize_question(&self, request: &RecognizeRequest) -> ApiResult<RecognizeResponse> {
        let value = self.transport.post_json(RECOGNIZE_PATH, encode(request)?)?;
        decode(accepted(value)?)
    }

    pub fn create_export_task(&self, request: &ExportTaskRequest) -> ApiResult<TaskCreated> {
        let value = self.transport.post_json(EXPORT_TASKS_PATH, encode(request)?)?;
        decode(accepted(value)?)
    }

    pub fn export_task(&self, task_id: &str) -> ApiResult<ExportTaskSnapshot> {
        let value = self
            .transport
            .get_json(&format!("{EXPORT_TASKS_PATH}/{task_id}"))?;
        decode::<TaskEnvelope<ExportTaskSnapshot>>(accepted(value)?).map(|envelope| envelope.task)
    }

    pub fn create_notion_task(&self, request: &NotionTaskRequest) -> ApiResult<TaskCreated> {
        let value = self.transport.post_json(NOTION_TASKS_PATH, encode(request)?)?;
        decode(accepted(value)?)
    }

    pub fn notion_task(&self, task_id: &str) -> ApiResult<NotionTaskSnapshot> {
        let value = self
            .transport
            .get_json(&format!("{NOTION_TASKS_PATH}/{task_id}"))?;
        decode::<TaskEnvelope<NotionTaskSnapshot>>(accepted(value)?).map(|envelope| envelope.task)
    }

    /// `ok:false` is a valid health report, not a transport failure.
    pub fn ai_health(&self) -> ApiResult<AiHealthReport> {
        decode(self.transport.get_json(AI_HEALTH_PATH)?)
    }
}

fn encode<S: Serialize>(body: &S) -> ApiResult<Value> {
    serde_json::to_value(body).map_err(|err| ApiError::Decode {
        message: err.to_string(),
    })
}

fn decode<D: DeserializeOwned>(value: Value) -> ApiResult<D> {
    serde_json::from_value(value).map_err(|err| ApiError::Decode {
        message: err.to_string(),
    })
}

/// Turns an `{ok:false, error}` body into [`ApiError::Rejected`].
fn accepted(value: Value) -> ApiResult<Value> {
    if value.get("ok").and_then(Value::as_bool) == Some(false) {
        return Err(ApiError::Rejected {
            message: error_message(&value).unwrap_or_else(|| "request rejected".to_string()),
        });
    }
    Ok(value)
}

pub(crate) fn error_message(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}
