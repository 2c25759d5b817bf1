use reqwest::blocking::{multipart, Client, Response};
use serde_json::Value;

use super::{error_message, ApiError, ApiResult, ApiTransport, UploadFile};

/// Blocking HTTP transport. Requests carry no timeout: a stalled server
/// stalls the worker thread that issued the call.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(network_error)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl ApiTransport for HttpTransport {
    fn get_json(&self, path: &str) -> ApiResult<Value> {
        tracing::debug!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .send()
            .map_err(network_error)?;
        read_json(response)
    }

    fn post_json(&self, path: &str, body: Value) -> ApiResult<Value> {
        tracing::debug!(path, "POST json");
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .map_err(network_error)?;
        read_json(response)
    }

    fn post_images(&self, path: &str, files: &[UploadFile]) -> ApiResult<Value> {
        tracing::debug!(path, count = files.len(), "POST multipart");
        let form = files.iter().fold(multipart::Form::new(), |form, file| {
            let part = multipart::Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
            form.part("images", part)
        });
        let response = self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .map_err(network_error)?;
        read_json(response)
    }
}

fn network_error(err: reqwest::Error) -> ApiError {
    ApiError::Network {
        message: err.to_string(),
    }
}

fn read_json(response: Response) -> ApiResult<Value> {
    let status = response.status();
    let text = response.text().map_err(network_error)?;
    let value = serde_json::from_str::<Value>(&text).ok();
    if !status.is_success() {
        let message = value
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        tracing::warn!(status = status.as_u16(), %message, "server returned error status");
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }
    value.ok_or_else(|| ApiError::Decode {
        message: "response body is not JSON".to_string(),
    })
}
