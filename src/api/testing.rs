use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::{ApiError, ApiResult, ApiTransport, UploadFile};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedRequest {
    pub(crate) method: &'static str,
    pub(crate) path: String,
    pub(crate) body: Option<Value>,
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<ApiResult<Value>>,
    requests: Vec<RecordedRequest>,
}

/// In-memory transport that replays queued responses in order and records
/// every request it receives.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_ok(&self, value: Value) {
        self.push(Ok(value));
    }

    pub(crate) fn push_err(&self, err: ApiError) {
        self.push(Err(err));
    }

    pub(crate) fn push_not_found(&self) {
        self.push_err(ApiError::Status {
            status: 404,
            message: "任务不存在或已过期。".to_string(),
        });
    }

    fn push(&self, response: ApiResult<Value>) {
        self.script
            .lock()
            .expect("script lock")
            .responses
            .push_back(response);
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.script.lock().expect("script lock").requests.clone()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.script.lock().expect("script lock").responses.len()
    }

    fn respond(&self, method: &'static str, path: &str, body: Option<Value>) -> ApiResult<Value> {
        let mut script = self.script.lock().expect("script lock");
        script.requests.push(RecordedRequest {
            method,
            path: path.to_string(),
            body,
        });
        script.responses.pop_front().unwrap_or_else(|| {
            Err(ApiError::Network {
                message: format!("no scripted response for {method} {path}"),
            })
        })
    }
}

impl ApiTransport for ScriptedTransport {
    fn get_json(&self, path: &str) -> ApiResult<Value> {
        self.respond("GET", path, None)
    }

    fn post_json(&self, path: &str, body: Value) -> ApiResult<Value> {
        self.respond("POST", path, Some(body))
    }

    fn post_images(&self, path: &str, files: &[UploadFile]) -> ApiResult<Value> {
        let names = files
            .iter()
            .map(|file| Value::String(file.file_name.clone()))
            .collect();
        self.respond("POST", path, Some(Value::Array(names)))
    }
}
