//! Interactive bounding-box editor: document, selection, hover and gestures.

pub mod document;
mod interaction;
pub mod view;

use thiserror::Error;

use crate::api::{ExportImage, ExportQuestion, ExportTaskRequest, UploadResponse};
use crate::geometry::{CanvasSize, NormRect};
use crate::ocr::{OcrApply, OcrRequest, OcrResponse};

pub use document::{Document, Question, QuestionId, Selection, Slide};
pub use hit_test::Hover;
pub use interaction::{Interaction, InteractionMode};
pub use view::{CanvasBox, CanvasBoxKind, CanvasView, FigureRow, ListRow, RenderSink};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EditorError {
    #[error("no slide loaded")]
    NoSlide,
    #[error("slide {index} out of range ({len} slides)")]
    SlideOutOfRange { index: usize, len: usize },
    #[error("question {qi} out of range ({len} questions)")]
    QuestionOutOfRange { qi: usize, len: usize },
    #[error("figure {fi} of question {qi} does not exist")]
    FigureOutOfRange { qi: usize, fi: usize },
    #[error("failed to decode image {name}: {message}")]
    ImageDecode { name: String, message: String },
    #[error("no upload session")]
    NoSession,
    #[error("Notion upload is not configured on the server")]
    NotionDisabled,
}

pub type EditorResult<T> = std::result::Result<T, EditorError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolKind {
    #[default]
    Select,
    DrawQuestion,
    DrawFigure,
}

impl ToolKind {
    pub const fn is_draw(self) -> bool {
        matches!(self, Self::DrawQuestion | Self::DrawFigure)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Select => "选择",
            Self::DrawQuestion => "框选题目",
            Self::DrawFigure => "框选配图",
        }
    }
}

/// Server session created by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub prompt_template: String,
    pub notion_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusLevel {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub message: String,
}

/// Application state for the annotation screen. Every mutation goes through
/// a method here so the list and canvas views stay in sync.
#[derive(Debug)]
pub struct Editor {
    document: Document,
    session: Option<Session>,
    tool: ToolKind,
    interaction: Interaction,
    hover: Hover,
    canvas: CanvasSize,
    status: StatusLine,
    ocr_outbox: Vec<OcrRequest>,
    needs_render: bool,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor {
    pub fn new() -> Self {
        Self {
            document: Document::new(),
            session: None,
            tool: ToolKind::default(),
            interaction: Interaction::Idle,
            hover: Hover::None,
            canvas: CanvasSize::new(1.0, 1.0),
            status: StatusLine::default(),
            ocr_outbox: Vec::new(),
            needs_render: true,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn hover(&self) -> Hover {
        self.hover
    }

    pub fn canvas_size(&self) -> CanvasSize {
        self.canvas
    }

    pub fn selection(&self) -> Option<Selection> {
        self.document.selection()
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn cursor(&self) -> &'static str {
        if self.tool.is_draw() {
            "crosshair"
        } else {
            self.hover.cursor()
        }
    }

    pub(crate) fn set_status(&mut self, level: StatusLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            StatusLevel::Info => tracing::debug!(%message, "status"),
            StatusLevel::Warning | StatusLevel::Error => tracing::warn!(%message, "status"),
        }
        self.status = StatusLine { level, message };
        self.needs_render = true;
    }

    fn mark_changed(&mut self) {
        self.needs_render = true;
    }

    fn reset_interaction(&mut self) {
        self.interaction = Interaction::Idle;
        self.hover = Hover::None;
    }

    pub fn set_canvas_size(&mut self, canvas: CanvasSize) {
        self.canvas = canvas;
        self.mark_changed();
    }

    pub fn select_tool(&mut self, tool: ToolKind) {
        if self.tool != tool {
            tracing::debug!(from = ?self.tool, to = ?tool, "tool switched");
        }
        self.tool = tool;
        self.reset_interaction();
        self.mark_changed();
    }

    /// Replaces the workspace with the slides of a fresh upload.
    pub fn apply_upload(&mut self, upload: &UploadResponse) {
        let slides = upload.images.iter().map(Slide::from_upload).collect::<Vec<_>>();
        tracing::info!(
            session_id = %upload.session_id,
            slides = slides.len(),
            "upload applied"
        );
        self.session = Some(Session {
            session_id: upload.session_id.clone(),
            prompt_template: upload.default_prompt_template.clone(),
            notion_enabled: upload.notion_enabled,
        });
        self.document.replace_slides(slides);
        self.ocr_outbox.clear();
        self.reset_interaction();
        self.set_status(
            StatusLevel::Info,
            format!("已上传 {} 张图片。", upload.images.len()),
        );
    }

    pub fn reset_workspace(&mut self) {
        self.document.reset();
        self.session = None;
        self.ocr_outbox.clear();
        self.reset_interaction();
        self.set_status(StatusLevel::Info, "工作区已清空。");
    }

    pub fn set_prompt_template(&mut self, template: impl Into<String>) -> EditorResult<()> {
        let session = self.session.as_mut().ok_or(EditorError::NoSession)?;
        session.prompt_template = template.into();
        Ok(())
    }

    pub fn switch_slide(&mut self, index: usize) -> EditorResult<()> {
        self.document.switch_slide(index)?;
        self.reset_interaction();
        self.mark_changed();
        Ok(())
    }

    pub fn load_slide_image(&mut self, index: usize, bytes: &[u8]) -> EditorResult<()> {
        let len = self.document.slides().len();
        self.document
            .slides_mut()
            .get_mut(index)
            .ok_or(EditorError::SlideOutOfRange { index, len })?
            .load_image(bytes)?;
        self.mark_changed();
        Ok(())
    }

    /// List-view selection entry point.
    pub fn select(&mut self, selection: Option<Selection>) -> EditorResult<()> {
        self.document.select(selection)?;
        self.mark_changed();
        Ok(())
    }

    /// List-view delete entry point; also used by the canvas delete icon. A
    /// move or resize in progress keeps tracking its own box.
    pub fn delete(&mut self, target: Selection) -> EditorResult<()> {
        self.document.delete(target)?;
        self.retarget_gesture(target);
        let message = match target {
            Selection::Question { qi } => format!("已删除第 {} 题。", qi + 1),
            Selection::Figure { qi, fi } => format!("已删除第 {} 题的配图 {}。", qi + 1, fi + 1),
        };
        tracing::debug!(?target, "box deleted");
        self.set_status(StatusLevel::Info, message);
        Ok(())
    }

    /// Keyboard delete: removes whatever is selected.
    pub fn delete_selected(&mut self) -> EditorResult<bool> {
        match self.document.selection() {
            Some(target) => self.delete(target).map(|()| true),
            None => Ok(false),
        }
    }

    /// Queues a recognition request for question `qi` of the current slide.
    pub(crate) fn request_ocr(&mut self, qi: usize) -> EditorResult<()> {
        let session_id = self
            .session
            .as_ref()
            .map(|session| session.session_id.clone())
            .ok_or(EditorError::NoSession)?;
        let image_id = self
            .document
            .current_slide()
            .map(|slide| slide.image_id.clone())
            .ok_or(EditorError::NoSlide)?;
        let question = self.document.question_mut(qi)?;
        let request_id = question.ocr.begin_request();
        let request = OcrRequest {
            session_id,
            image_id,
            question_id: question.id,
            request_id,
            bbox: question.question_bbox,
        };
        tracing::debug!(
            question_id = request.question_id,
            request_id,
            "OCR requested"
        );
        self.ocr_outbox.push(request);
        self.mark_changed();
        Ok(())
    }

    /// Hands queued recognition requests to the caller for dispatch.
    pub fn take_ocr_requests(&mut self) -> Vec<OcrRequest> {
        std::mem::take(&mut self.ocr_outbox)
    }

    pub fn apply_ocr_response(&mut self, response: &OcrResponse) -> OcrApply {
        let request = &response.request;
        let Some(question) = self
            .document
            .find_question_mut(&request.image_id, request.question_id)
        else {
            tracing::debug!(
                question_id = request.question_id,
                "OCR reply for deleted question dropped"
            );
            return OcrApply::Orphaned;
        };
        let applied = question.ocr.apply(request.request_id, &response.outcome);
        match applied {
            OcrApply::Applied => self.mark_changed(),
            OcrApply::Stale => tracing::debug!(
                question_id = request.question_id,
                request_id = request.request_id,
                "stale OCR reply dropped"
            ),
            OcrApply::Orphaned => {}
        }
        applied
    }

    /// Builds the `POST /api/export/tasks` body from every slide.
    pub fn export_request(&self) -> EditorResult<ExportTaskRequest> {
        let session = self.session.as_ref().ok_or(EditorError::NoSession)?;
        let images = self
            .document
            .slides()
            .iter()
            .map(|slide| ExportImage {
                image_id: slide.image_id.clone(),
                questions: slide.questions.iter().map(export_question).collect(),
            })
            .collect();
        Ok(ExportTaskRequest {
            session_id: session.session_id.clone(),
            prompt_template: session.prompt_template.clone(),
            images,
        })
    }

    pub fn ensure_notion_enabled(&self) -> EditorResult<&Session> {
        let session = self.session.as_ref().ok_or(EditorError::NoSession)?;
        if !session.notion_enabled {
            return Err(EditorError::NotionDisabled);
        }
        Ok(session)
    }
}

fn export_question(question: &Question) -> ExportQuestion {
    let figure_bboxes: Vec<NormRect> = question.figure_bboxes.clone();
    ExportQuestion {
        question_no: question.label.clone(),
        question_bbox: question.question_bbox,
        has_figure: !figure_bboxes.is_empty(),
        figure_bboxes,
        ocr_text: question.ocr.text.trim().to_string(),
    }
}
