use std::sync::{mpsc, Arc};
use std::time::Duration;

use crate::api::{
    ApiClient, ApiTransport, ExportTaskRequest, ExportTaskSnapshot, MarkdownLink, TaskStatus,
};

use super::{poll_until_terminal, spawn_task, TaskError, TaskEvent, TaskProgress, TaskResult};

/// Result of a finished export task. Warnings make it a partial success.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub task_id: String,
    pub status: TaskStatus,
    pub question_count: u32,
    pub markdown_url: String,
    pub markdown_urls: Vec<MarkdownLink>,
    pub warnings: Vec<String>,
}

impl ExportOutcome {
    fn from_snapshot(task_id: String, snapshot: ExportTaskSnapshot) -> TaskResult<Self> {
        let Some(result) = snapshot.result else {
            return Err(TaskError::MissingResult { task_id });
        };
        Ok(Self {
            task_id,
            status: snapshot.status,
            question_count: result.question_count,
            markdown_url: result.markdown_url,
            markdown_urls: result.markdown_urls,
            warnings: result.warnings,
        })
    }

    pub fn is_partial(&self) -> bool {
        self.status == TaskStatus::CompletedWithErrors || !self.warnings.is_empty()
    }

    pub fn message(&self) -> String {
        if self.warnings.is_empty() {
            format!("导出完成，共 {} 道错题。", self.question_count)
        } else {
            format!(
                "导出完成，共 {} 道错题，{} 条警告。",
                self.question_count,
                self.warnings.len()
            )
        }
    }
}

/// Creates an export task and blocks until it reaches a terminal status.
pub fn run_export<T: ApiTransport>(
    api: &ApiClient<T>,
    request: &ExportTaskRequest,
    interval: Duration,
    on_progress: impl FnMut(&TaskProgress),
) -> TaskResult<ExportOutcome> {
    let created = api.create_export_task(request)?;
    tracing::info!(
        task_id = %created.task_id,
        session_id = %request.session_id,
        images = request.images.len(),
        "export task created"
    );
    let snapshot = poll_until_terminal(
        &created.task_id,
        interval,
        |task_id| api.export_task(task_id),
        on_progress,
    )?;
    let outcome = ExportOutcome::from_snapshot(created.task_id, snapshot)?;
    for warning in &outcome.warnings {
        tracing::warn!(task_id = %outcome.task_id, %warning, "export warning");
    }
    Ok(outcome)
}

pub fn spawn_export<T: ApiTransport + 'static>(
    api: Arc<ApiClient<T>>,
    request: ExportTaskRequest,
    interval: Duration,
) -> mpsc::Receiver<TaskEvent<ExportOutcome>> {
    spawn_task(move |report| run_export(&api, &request, interval, report))
}
