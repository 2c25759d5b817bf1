//! Long-running server jobs: create with a POST, then poll until terminal.

mod export;
mod notion;

use std::sync::mpsc;
use std::time::Duration;

use thiserror::Error;

use crate::api::{ApiError, ApiResult, ExportTaskSnapshot, NotionTaskSnapshot, TaskStatus};
use crate::editor::EditorError;

pub use export::{run_export, spawn_export, ExportOutcome};
pub use notion::{notion_items, notion_request, run_notion_upload, spawn_notion_upload, NotionOutcome};

pub const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(700);
pub const NOTION_POLL_INTERVAL: Duration = Duration::from_millis(900);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TaskError {
    #[error(transparent)]
    Transport(#[from] ApiError),
    #[error(transparent)]
    Input(#[from] EditorError),
    #[error("{message}")]
    Failed { message: String },
    #[error("task {task_id} finished without a result")]
    MissingResult { task_id: String },
    #[error("nothing to upload")]
    NoItems,
}

pub type TaskResult<T> = std::result::Result<T, TaskError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Export,
    Notion,
}

impl TaskKind {
    pub const fn default_interval(self) -> Duration {
        match self {
            Self::Export => EXPORT_POLL_INTERVAL,
            Self::Notion => NOTION_POLL_INTERVAL,
        }
    }

    const fn failure_fallback(self) -> &'static str {
        match self {
            Self::Export => "导出失败",
            Self::Notion => "Notion 上传失败",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressDetail {
    Export {
        question_done: u32,
        question_total: u32,
        last_ai_elapsed_sec: f64,
        ai_elapsed_total_sec: f64,
    },
    Notion {
        completed: u32,
        total: u32,
        success: u32,
        failed: u32,
    },
}

/// Latest snapshot of a running task, as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgress {
    pub kind: TaskKind,
    pub task_id: String,
    pub status: TaskStatus,
    pub percent: f64,
    pub current: String,
    pub detail: ProgressDetail,
}

impl TaskProgress {
    pub fn status_line(&self) -> String {
        let mut line = match self.kind {
            TaskKind::Export => format!("导出进度 {:.1}%", self.percent),
            TaskKind::Notion => format!("Notion 上传 {:.1}%", self.percent),
        };
        if !self.current.is_empty() {
            line.push_str(&format!(" · {}", self.current));
        }
        match self.detail {
            ProgressDetail::Export {
                question_done,
                question_total,
                last_ai_elapsed_sec,
                ai_elapsed_total_sec,
            } => {
                if question_total > 0 {
                    line.push_str(&format!(" · 题目 {question_done}/{question_total}"));
                }
                if last_ai_elapsed_sec > 0.0 {
                    line.push_str(&format!(" · 本题 AI {last_ai_elapsed_sec:.1}s"));
                }
                if ai_elapsed_total_sec > 0.0 {
                    line.push_str(&format!(" · AI 累计 {ai_elapsed_total_sec:.1}s"));
                }
            }
            ProgressDetail::Notion {
                completed,
                total,
                success,
                failed,
            } => {
                line.push_str(&format!(
                    " · {completed}/{total}（成功 {success}，失败 {failed}）"
                ));
            }
        }
        line
    }
}

/// Fields every polled task snapshot exposes.
pub trait TaskSnapshot {
    const KIND: TaskKind;

    fn status(&self) -> TaskStatus;
    fn error_message(&self) -> &str;
    fn progress(&self, task_id: &str) -> TaskProgress;
}

impl TaskSnapshot for ExportTaskSnapshot {
    const KIND: TaskKind = TaskKind::Export;

    fn status(&self) -> TaskStatus {
        self.status
    }

    fn error_message(&self) -> &str {
        &self.error
    }

    fn progress(&self, task_id: &str) -> TaskProgress {
        TaskProgress {
            kind: Self::KIND,
            task_id: task_id.to_string(),
            status: self.status,
            percent: self.progress_percent.clamp(0.0, 100.0),
            current: self.current.clone(),
            detail: ProgressDetail::Export {
                question_done: self.question_done,
                question_total: self.question_total,
                last_ai_elapsed_sec: self.last_ai_elapsed_sec,
                ai_elapsed_total_sec: self.ai_elapsed_total_sec,
            },
        }
    }
}

impl TaskSnapshot for NotionTaskSnapshot {
    const KIND: TaskKind = TaskKind::Notion;

    fn status(&self) -> TaskStatus {
        self.status
    }

    fn error_message(&self) -> &str {
        &self.error
    }

    fn progress(&self, task_id: &str) -> TaskProgress {
        TaskProgress {
            kind: Self::KIND,
            task_id: task_id.to_string(),
            status: self.status,
            percent: self.progress_percent.clamp(0.0, 100.0),
            current: self.current.clone(),
            detail: ProgressDetail::Notion {
                completed: self.completed,
                total: self.total,
                success: self.success,
                failed: self.failed,
            },
        }
    }
}

/// Fetches `task_id` until its status is terminal, one request at a time.
///
/// A 404 is read as "not visible yet" and polling continues. `failed`
/// becomes [`TaskError::Failed`]; both completed states return the last
/// snapshot. No request is issued after a terminal status.
pub fn poll_until_terminal<S, F, P>(
    task_id: &str,
    interval: Duration,
    mut fetch: F,
    mut on_progress: P,
) -> TaskResult<S>
where
    S: TaskSnapshot,
    F: FnMut(&str) -> ApiResult<S>,
    P: FnMut(&TaskProgress),
{
    let kind = S::KIND;
    let mut polls = 0_u32;
    loop {
        polls = polls.saturating_add(1);
        match fetch(task_id) {
            Ok(snapshot) => {
                let progress = snapshot.progress(task_id);
                tracing::debug!(
                    task_id,
                    kind = ?kind,
                    status = ?progress.status,
                    percent = progress.percent,
                    "task polled"
                );
                on_progress(&progress);
                let status = snapshot.status();
                if status == TaskStatus::Failed {
                    let message = snapshot.error_message().trim();
                    let message = if message.is_empty() {
                        kind.failure_fallback().to_string()
                    } else {
                        message.to_string()
                    };
                    tracing::warn!(task_id, kind = ?kind, %message, polls, "task failed");
                    return Err(TaskError::Failed { message });
                }
                if status.is_terminal() {
                    tracing::info!(task_id, kind = ?kind, ?status, polls, "task finished");
                    return Ok(snapshot);
                }
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!(task_id, kind = ?kind, "task not visible yet");
            }
            Err(err) => {
                tracing::warn!(task_id, kind = ?kind, %err, "task polling aborted");
                return Err(err.into());
            }
        }
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent<T> {
    Progress(TaskProgress),
    Finished(TaskResult<T>),
}

/// Runs a task workflow on a worker thread. The receiver yields progress
/// snapshots followed by exactly one [`TaskEvent::Finished`].
pub fn spawn_task<T, W>(work: W) -> mpsc::Receiver<TaskEvent<T>>
where
    T: Send + 'static,
    W: FnOnce(&mut dyn FnMut(&TaskProgress)) -> TaskResult<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<TaskEvent<T>>();
    std::thread::spawn(move || {
        let progress_tx = tx.clone();
        let mut report = move |progress: &TaskProgress| {
            let _ = progress_tx.send(TaskEvent::Progress(progress.clone()));
        };
        let result = work(&mut report);
        let _ = tx.send(TaskEvent::Finished(result));
    });
    rx
}
