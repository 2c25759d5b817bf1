//! Ties the editor to the server: uploads, OCR round trips and task runs.

use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use crate::api::{AiHealthReport, ApiClient, ApiTransport, HttpTransport, UploadFile};
use crate::config::AppConfig;
use crate::editor::{Editor, StatusLevel};
use crate::ocr::{OcrApply, OcrDispatcher};
use crate::tasks::{
    notion_request, spawn_export, spawn_notion_upload, ExportOutcome, NotionOutcome, TaskEvent,
    TaskProgress, TaskResult,
};
use crate::AppResult;

pub struct Workspace<T: ApiTransport + 'static> {
    config: AppConfig,
    api: Arc<ApiClient<T>>,
    editor: Editor,
    ocr: OcrDispatcher<T>,
}

impl Workspace<HttpTransport> {
    pub fn connect(config: AppConfig) -> AppResult<Self> {
        let transport = HttpTransport::new(config.server_url.clone())?;
        tracing::info!(server = %transport.base_url(), "workspace connected");
        Ok(Self::new(config, transport))
    }
}

impl<T: ApiTransport + 'static> Workspace<T> {
    pub fn new(config: AppConfig, transport: T) -> Self {
        let api = Arc::new(ApiClient::new(transport));
        Self {
            config,
            ocr: OcrDispatcher::new(Arc::clone(&api)),
            api,
            editor: Editor::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient<T> {
        &self.api
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    pub fn upload(&mut self, files: &[UploadFile]) -> AppResult<()> {
        match self.api.upload(files) {
            Ok(response) => {
                self.editor.apply_upload(&response);
                self.load_local_images(files);
                Ok(())
            }
            Err(err) => {
                self.editor
                    .set_status(StatusLevel::Error, format!("上传失败：{err}"));
                Err(err.into())
            }
        }
    }

    /// Decodes the uploaded bytes into their slides so the canvas can draw
    /// them; the server names each slide after the file it came from.
    fn load_local_images(&mut self, files: &[UploadFile]) {
        let names: Vec<String> = self
            .editor
            .document()
            .slides()
            .iter()
            .map(|slide| slide.name.clone())
            .collect();
        for (index, name) in names.iter().enumerate() {
            let Some(file) = files.iter().find(|file| &file.file_name == name) else {
                continue;
            };
            if let Err(err) = self.editor.load_slide_image(index, &file.bytes) {
                tracing::warn!(%name, %err, "slide image not decoded, keeping reported size");
            }
        }
    }

    pub fn upload_paths(&mut self, paths: &[PathBuf]) -> AppResult<()> {
        let files = paths
            .iter()
            .map(|path| UploadFile::from_path(path))
            .collect::<Result<Vec<_>, _>>()?;
        self.upload(&files)
    }

    /// Sends every queued OCR request to a worker thread.
    pub fn dispatch_ocr(&mut self) -> usize {
        let requests = self.editor.take_ocr_requests();
        let count = requests.len();
        self.ocr.dispatch_all(requests);
        count
    }

    pub fn ocr_in_flight(&self) -> usize {
        self.ocr.in_flight()
    }

    /// Applies the OCR replies that have arrived; returns how many were current.
    pub fn apply_ocr_replies(&mut self) -> usize {
        let mut applied = 0;
        for response in self.ocr.drain() {
            if self.editor.apply_ocr_response(&response) == OcrApply::Applied {
                applied += 1;
            }
        }
        applied
    }

    /// Blocks for the next OCR reply and applies it; `None` when nothing is
    /// in flight.
    pub fn wait_ocr_reply(&mut self) -> Option<OcrApply> {
        let response = self.ocr.recv()?;
        Some(self.editor.apply_ocr_response(&response))
    }

    pub fn start_export(&mut self) -> AppResult<mpsc::Receiver<TaskEvent<ExportOutcome>>> {
        let request = self.editor.export_request()?;
        self.editor.set_status(StatusLevel::Info, "导出任务已提交。");
        Ok(spawn_export(
            Arc::clone(&self.api),
            request,
            self.config.export_poll_interval(),
        ))
    }

    pub fn start_notion_upload(
        &mut self,
        export: &ExportOutcome,
    ) -> AppResult<mpsc::Receiver<TaskEvent<NotionOutcome>>> {
        let request = notion_request(&self.editor, export)?;
        self.editor.set_status(StatusLevel::Info, "Notion 上传任务已提交。");
        Ok(spawn_notion_upload(
            Arc::clone(&self.api),
            request,
            self.config.notion_poll_interval(),
        ))
    }

    pub fn report_progress(&mut self, progress: &TaskProgress) {
        self.editor
            .set_status(StatusLevel::Info, progress.status_line());
    }

    pub fn report_export(&mut self, result: &TaskResult<ExportOutcome>) {
        match result {
            Ok(outcome) if outcome.is_partial() => {
                self.editor.set_status(StatusLevel::Warning, outcome.message())
            }
            Ok(outcome) => self.editor.set_status(StatusLevel::Info, outcome.message()),
            Err(err) => self
                .editor
                .set_status(StatusLevel::Error, format!("导出失败：{err}")),
        }
    }

    pub fn report_notion(&mut self, result: &TaskResult<NotionOutcome>) {
        match result {
            Ok(outcome) if outcome.is_partial() => self.editor.set_status(
                StatusLevel::Warning,
                format!("{}{}", outcome.message(), outcome.errors.join("；")),
            ),
            Ok(outcome) => self.editor.set_status(StatusLevel::Info, outcome.message()),
            Err(err) => self
                .editor
                .set_status(StatusLevel::Error, format!("Notion 上传失败：{err}")),
        }
    }

    pub fn check_ai_health(&self) -> AppResult<AiHealthReport> {
        Ok(self.api.ai_health()?)
    }
}
