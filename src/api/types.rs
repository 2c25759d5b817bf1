use serde::{Deserialize, Serialize};

use crate::geometry::NormRect;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub images: Vec<UploadedImage>,
    #[serde(default)]
    pub default_prompt_template: String,
    #[serde(default)]
    pub notion_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedImage {
    pub image_id: String,
    pub image_name: String,
    pub image_url: String,
    #[serde(default)]
    pub image_width: u32,
    #[serde(default)]
    pub image_height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizeRequest {
    pub session_id: String,
    pub image_id: String,
    pub question_bbox: NormRect,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub ocr_text: String,
    #[serde(default)]
    pub crop_data_url: Option<String>,
    #[serde(default)]
    pub ocr_elapsed_ms: Option<u64>,
    #[serde(default)]
    pub ocr_model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTaskRequest {
    pub session_id: String,
    pub prompt_template: String,
    pub images: Vec<ExportImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportImage {
    pub image_id: String,
    pub questions: Vec<ExportQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportQuestion {
    pub question_no: String,
    pub question_bbox: NormRect,
    pub figure_bboxes: Vec<NormRect>,
    pub has_figure: bool,
    pub ocr_text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskCreated {
    pub task_id: String,
    #[serde(default)]
    pub invalid_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct TaskEnvelope<S> {
    pub(crate) task: S,
}

/// Server-side task lifecycle. Unknown values are treated as still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Queued,
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedWithErrors | Self::Failed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ExportTaskSnapshot {
    pub status: TaskStatus,
    pub progress_percent: f64,
    pub question_total: u32,
    pub question_done: u32,
    pub current: String,
    pub last_ai_elapsed_sec: f64,
    pub ai_elapsed_total_sec: f64,
    pub result: Option<ExportResult>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct ExportResult {
    pub markdown_url: String,
    pub markdown_urls: Vec<MarkdownLink>,
    pub question_count: u32,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct MarkdownLink {
    pub title: String,
    pub url: String,
}

impl MarkdownLink {
    /// File name of the exported Markdown, i.e. the last url path segment.
    pub fn markdown_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotionTaskRequest {
    pub session_id: String,
    pub items: Vec<NotionItemRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotionItemRequest {
    pub title: String,
    pub markdown_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct NotionTaskSnapshot {
    pub status: TaskStatus,
    pub total: u32,
    pub completed: u32,
    pub success: u32,
    pub failed: u32,
    pub progress_percent: f64,
    pub current: String,
    pub error: String,
    pub items: Vec<NotionItemSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotionItemStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct NotionItemSnapshot {
    pub status: NotionItemStatus,
    pub title: String,
    pub markdown_name: String,
    pub page_url: String,
    pub error: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AiHealthReport {
    pub ok: bool,
    pub latency_ms: u64,
    pub base_url: String,
    pub model: String,
    pub error: String,
}

impl AiHealthReport {
    pub fn status_line(&self) -> String {
        if self.ok {
            format!("AI 正常 · {} · {}ms", self.model, self.latency_ms)
        } else {
            format!("AI 异常：{}（{}ms）", self.error, self.latency_ms)
        }
    }
}
