use std::sync::{mpsc, Arc};
use std::time::Duration;

use crate::api::{
    ApiClient, ApiTransport, NotionItemRequest, NotionItemSnapshot, NotionItemStatus,
    NotionTaskRequest, NotionTaskSnapshot, TaskStatus,
};
use crate::editor::Editor;

use super::{
    poll_until_terminal, spawn_task, ExportOutcome, TaskError, TaskEvent, TaskProgress,
    TaskResult,
};

#[derive(Debug, Clone, PartialEq)]
pub struct NotionOutcome {
    pub task_id: String,
    pub status: TaskStatus,
    pub success: u32,
    pub failed: u32,
    pub items: Vec<NotionItemSnapshot>,
    /// Items rejected at creation followed by items that failed to upload.
    pub errors: Vec<String>,
}

impl NotionOutcome {
    fn from_snapshot(task_id: String, invalid_items: Vec<String>, snapshot: NotionTaskSnapshot) -> Self {
        let mut errors = invalid_items;
        errors.extend(
            snapshot
                .items
                .iter()
                .filter(|item| item.status == NotionItemStatus::Failed)
                .map(|item| {
                    let name = if item.title.is_empty() {
                        &item.markdown_name
                    } else {
                        &item.title
                    };
                    format!("{name}：{}", item.error)
                }),
        );
        Self {
            task_id,
            status: snapshot.status,
            success: snapshot.success,
            failed: snapshot.failed,
            items: snapshot.items,
            errors,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.status == TaskStatus::CompletedWithErrors || !self.errors.is_empty()
    }

    pub fn message(&self) -> String {
        format!(
            "Notion 上传完成：成功 {}，失败 {}。",
            self.success, self.failed
        )
    }

    pub fn page_urls(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .map(|item| item.page_url.as_str())
            .filter(|url| !url.is_empty())
    }
}

/// One upload item per exported Markdown file.
pub fn notion_items(export: &ExportOutcome) -> Vec<NotionItemRequest> {
    export
        .markdown_urls
        .iter()
        .enumerate()
        .filter_map(|(index, link)| {
            let markdown_name = link.markdown_name();
            if markdown_name.is_empty() {
                return None;
            }
            let title = match link.title.trim() {
                "" => format!("错题 {}", index + 1),
                title => title.to_string(),
            };
            Some(NotionItemRequest {
                title,
                markdown_name: markdown_name.to_string(),
            })
        })
        .collect()
}

pub fn notion_request(editor: &Editor, export: &ExportOutcome) -> TaskResult<NotionTaskRequest> {
    let session = editor.ensure_notion_enabled()?;
    let items = notion_items(export);
    if items.is_empty() {
        return Err(TaskError::NoItems);
    }
    Ok(NotionTaskRequest {
        session_id: session.session_id.clone(),
        items,
    })
}

/// Creates a Notion upload task and blocks until it reaches a terminal status.
pub fn run_notion_upload<T: ApiTransport>(
    api: &ApiClient<T>,
    request: &NotionTaskRequest,
    interval: Duration,
    on_progress: impl FnMut(&TaskProgress),
) -> TaskResult<NotionOutcome> {
    if request.items.is_empty() {
        return Err(TaskError::NoItems);
    }
    let created = api.create_notion_task(request)?;
    tracing::info!(
        task_id = %created.task_id,
        items = request.items.len(),
        invalid = created.invalid_items.len(),
        "notion upload task created"
    );
    let snapshot = poll_until_terminal(
        &created.task_id,
        interval,
        |task_id| api.notion_task(task_id),
        on_progress,
    )?;
    Ok(NotionOutcome::from_snapshot(
        created.task_id,
        created.invalid_items,
        snapshot,
    ))
}

pub fn spawn_notion_upload<T: ApiTransport + 'static>(
    api: Arc<ApiClient<T>>,
    request: NotionTaskRequest,
    interval: Duration,
) -> mpsc::Receiver<TaskEvent<NotionOutcome>> {
    spawn_task(move |report| run_notion_upload(&api, &request, interval, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedTransport;
    use crate::api::MarkdownLink;
    use crate::editor::test_support::upload;
    use crate::editor::EditorError;
    use serde_json::json;

    fn export_outcome() -> ExportOutcome {
        ExportOutcome {
            task_id: "e1".to_string(),
            status: TaskStatus::Completed,
            question_count: 2,
            markdown_url: "/exports/s1/all.md".to_string(),
            markdown_urls: vec![
                MarkdownLink {
                    title: "错题 1".to_string(),
                    url: "/exports/s1/q_001.md".to_string(),
                },
                MarkdownLink {
                    title: " ".to_string(),
                    url: "/exports/s1/q_002.md".to_string(),
                },
                MarkdownLink {
                    title: "broken".to_string(),
                    url: "/exports/s1/".to_string(),
                },
            ],
            warnings: Vec::new(),
        }
    }

    fn request() -> NotionTaskRequest {
        NotionTaskRequest {
            session_id: "s1".to_string(),
            items: notion_items(&export_outcome()),
        }
    }

    #[test]
    fn items_come_from_markdown_file_names() {
        let items = notion_items(&export_outcome());
        assert_eq!(
            items,
            vec![
                NotionItemRequest {
                    title: "错题 1".to_string(),
                    markdown_name: "q_001.md".to_string(),
                },
                NotionItemRequest {
                    title: "错题 2".to_string(),
                    markdown_name: "q_002.md".to_string(),
                },
            ]
        );
    }

    #[test]
    fn request_requires_notion_enabled_session() {
        let mut editor = Editor::new();
        editor.apply_upload(&upload(&["img1"], false));
        assert_eq!(
            notion_request(&editor, &export_outcome()),
            Err(TaskError::Input(EditorError::NotionDisabled))
        );

        editor.apply_upload(&upload(&["img1"], true));
        let request = notion_request(&editor, &export_outcome()).expect("request");
        assert_eq!(request.session_id, "s1");
        assert_eq!(request.items.len(), 2);
    }

    #[test]
    fn failed_task_surfaces_message_and_stops_polling() {
        let transport = ScriptedTransport::new();
        transport.push_ok(json!({"ok": true, "task_id": "n1", "invalid_items": []}));
        transport.push_ok(json!({"ok": true, "task": {"status": "failed", "error": "invalid token"}}));
        transport.push_ok(json!({"ok": true, "task": {"status": "running"}}));
        let api = ApiClient::new(transport.clone());

        let err = run_notion_upload(&api, &request(), Duration::ZERO, |_| {})
            .expect_err("failed task");
        assert_eq!(err.to_string(), "invalid token");
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(transport.remaining(), 1);
    }

    #[test]
    fn partial_upload_collects_invalid_and_failed_items() {
        let transport = ScriptedTransport::new();
        transport.push_ok(json!({
            "ok": true,
            "task_id": "n1",
            "invalid_items": ["错题 3：Markdown 不存在（q_003.md）"]
        }));
        transport.push_not_found();
        transport.push_ok(json!({"ok": true, "task": {
            "status": "completed_with_errors",
            "total": 2, "completed": 2, "success": 1, "failed": 1,
            "progress_percent": 100.0,
            "items": [
                {"status": "success", "title": "错题 1", "markdown_name": "q_001.md",
                 "page_url": "https://notion.so/p1", "steps": ["create_page"]},
                {"status": "failed", "title": "错题 2", "markdown_name": "q_002.md",
                 "error": "rate limited"}
            ]
        }}));
        let api = ApiClient::new(transport);

        let outcome = run_notion_upload(&api, &request(), Duration::ZERO, |_| {}).expect("upload");
        assert!(outcome.is_partial());
        assert_eq!(outcome.message(), "Notion 上传完成：成功 1，失败 1。");
        assert_eq!(
            outcome.errors,
            vec![
                "错题 3：Markdown 不存在（q_003.md）".to_string(),
                "错题 2：rate limited".to_string(),
            ]
        );
        assert_eq!(outcome.page_urls().collect::<Vec<_>>(), vec!["https://notion.so/p1"]);
        assert_eq!(outcome.items[0].steps, vec!["create_page".to_string()]);
    }

    #[test]
    fn empty_request_is_rejected_before_sending() {
        let transport = ScriptedTransport::new();
        let api = ApiClient::new(transport.clone());
        let request = NotionTaskRequest {
            session_id: "s1".to_string(),
            items: Vec::new(),
        };
        assert_eq!(
            run_notion_upload(&api, &request, Duration::ZERO, |_| {}),
            Err(TaskError::NoItems)
        );
        assert!(transport.requests().is_empty());
    }
}
