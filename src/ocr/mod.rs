//! Per-question recognition requests with last-request-wins staleness.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use crate::api::{ApiClient, ApiTransport, RecognizeRequest, RecognizeResponse};
use crate::geometry::NormRect;

/// OCR fields carried by each question.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OcrState {
    pub text: String,
    pub loading: bool,
    pub error: Option<String>,
    pub preview: Option<String>,
    pub elapsed_ms: Option<u64>,
    pub model: Option<String>,
    request_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrApply {
    Applied,
    /// A newer request was issued after this one; the response was dropped.
    Stale,
    /// The question no longer exists.
    Orphaned,
}

impl OcrState {
    pub const fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Starts a new request and returns its identity.
    pub fn begin_request(&mut self) -> u64 {
        self.request_id = self.request_id.wrapping_add(1);
        self.loading = true;
        self.error = None;
        self.request_id
    }

    pub fn apply(&mut self, request_id: u64, outcome: &OcrOutcome) -> OcrApply {
        if request_id != self.request_id {
            return OcrApply::Stale;
        }
        self.loading = false;
        match outcome {
            Ok(recognized) => {
                self.text = recognized.ocr_text.trim().to_string();
                self.error = None;
                self.preview = recognized.crop_data_url.clone();
                self.elapsed_ms = recognized.ocr_elapsed_ms;
                self.model = recognized.ocr_model.clone();
            }
            Err(message) => {
                self.error = Some(message.clone());
            }
        }
        OcrApply::Applied
    }

    pub fn status_line(&self) -> String {
        if self.loading {
            return "OCR 识别中...".to_string();
        }
        if let Some(error) = &self.error {
            return format!("OCR 失败：{error}");
        }
        if self.request_id == 0 {
            return "OCR 未开始".to_string();
        }
        let mut line = format!("OCR 完成 · {} 字", self.text.chars().count());
        if let Some(elapsed) = self.elapsed_ms {
            line.push_str(&format!(" · {elapsed}ms"));
        }
        if let Some(model) = self.model.as_deref().filter(|model| !model.is_empty()) {
            line.push_str(&format!(" · {model}"));
        }
        line
    }
}

/// Identity and payload of one recognition request.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrRequest {
    pub session_id: String,
    pub image_id: String,
    pub question_id: u64,
    pub request_id: u64,
    pub bbox: NormRect,
}

impl OcrRequest {
    pub fn to_wire(&self) -> RecognizeRequest {
        RecognizeRequest {
            session_id: self.session_id.clone(),
            image_id: self.image_id.clone(),
            question_bbox: self.bbox,
        }
    }
}

pub type OcrOutcome = Result<RecognizeResponse, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct OcrResponse {
    pub request: OcrRequest,
    pub outcome: OcrOutcome,
}

/// Runs a single recognition call on the current thread.
pub fn recognize<T: ApiTransport>(api: &ApiClient<T>, request: OcrRequest) -> OcrResponse {
    let started = Instant::now();
    let outcome = api
        .recognize_question(&request.to_wire())
        .map(|mut recognized| {
            if recognized.ocr_elapsed_ms.is_none() {
                recognized.ocr_elapsed_ms =
                    Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
            }
            recognized
        })
        .map_err(|err| err.to_string());
    if let Err(message) = &outcome {
        tracing::warn!(
            question_id = request.question_id,
            request_id = request.request_id,
            %message,
            "OCR request failed"
        );
    }
    OcrResponse { request, outcome }
}

/// Issues recognition requests on worker threads and hands the replies back
/// to the UI thread in arrival order. Staleness is resolved by the document.
pub struct OcrDispatcher<T> {
    api: Arc<ApiClient<T>>,
    sender: mpsc::Sender<OcrResponse>,
    receiver: mpsc::Receiver<OcrResponse>,
    in_flight: usize,
}

impl<T: ApiTransport + 'static> OcrDispatcher<T> {
    pub fn new(api: Arc<ApiClient<T>>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            api,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    /// Requests dispatched whose replies have not been collected yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn dispatch(&mut self, request: OcrRequest) {
        tracing::debug!(
            question_id = request.question_id,
            request_id = request.request_id,
            "dispatch OCR request"
        );
        let api = Arc::clone(&self.api);
        let sender = self.sender.clone();
        self.in_flight += 1;
        std::thread::spawn(move || {
            let response = recognize(&api, request);
            let _ = sender.send(response);
        });
    }

    pub fn dispatch_all(&mut self, requests: impl IntoIterator<Item = OcrRequest>) {
        for request in requests {
            self.dispatch(request);
        }
    }

    /// Non-blocking drain of every reply that has arrived so far.
    pub fn drain(&mut self) -> Vec<OcrResponse> {
        let replies: Vec<_> = self.receiver.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(replies.len());
        replies
    }

    /// Blocks until the next reply arrives; `None` when nothing is in flight.
    pub fn recv(&mut self) -> Option<OcrResponse> {
        if self.in_flight == 0 {
            return None;
        }
        let reply = self.receiver.recv().ok()?;
        self.in_flight -= 1;
        Some(reply)
    }
}
