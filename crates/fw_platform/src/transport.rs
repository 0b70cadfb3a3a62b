//! Transport adapter: a non-blocking request/response channel with a polled state.
//!
//! Callers enqueue one request, then poll `state()` from their own timer:
//!
//!   Inactive -> Sending -> Receiving -> Idle   (response available)
//!                                    -> Issue  (network/HTTP failure)
//!
//! At most one request is in flight per transport. Large bodies can be
//! redirected to a file via `Request::save_to`; `response()` reads them back.
//!
//! `HttpTransport` runs each request on a short-lived thread with a
//! current-thread tokio runtime, so the caller's thread never blocks.
//! `ScriptedTransport` replays canned replies for tests and offline runs.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;

pub const SUCCESS_MARKER: &str = "[SUCCESS]";
pub const ERROR_MARKER: &str = "[ERROR]";
pub const PONG_MARKER: &str = "[PONG]";

/// Keep-alive replies from the radio firmware are not real responses.
pub fn is_keep_alive(text: &str) -> bool {
    text.contains(PONG_MARKER)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Inactive,
    Sending,
    Receiving,
    Idle,
    Issue,
}

impl TransportState {
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Sending | Self::Receiving)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub payload: Option<String>,
    pub save_to: Option<PathBuf>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: default_headers(),
            payload: None,
            save_to: None,
        }
    }

    pub fn post(url: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: default_headers(),
            payload: Some(payload.into()),
            save_to: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn save_to(mut self, path: Option<PathBuf>) -> Self {
        self.save_to = path;
        self
    }
}

fn default_headers() -> Vec<(String, String)> {
    vec![("Content-Type".to_string(), "application/json".to_string())]
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("a request is already in flight")]
    Busy,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("transport worker failed to start: {0}")]
    Spawn(String),
}

pub trait Transport: Send {
    /// Enqueue a request. Returns immediately; progress is observed via `state()`.
    fn request(&mut self, request: Request) -> Result<(), TransportError>;

    fn state(&mut self) -> TransportState;

    /// Body of the last completed request, if any.
    fn response(&self) -> Option<String>;

    /// Forget the last response and return to `Inactive`.
    fn reset(&mut self);
}

fn write_body(path: &PathBuf, body: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("{}: {e}", parent.display()))?;
    }
    fs::write(path, body).map_err(|e| format!("{}: {e}", path.display()))
}

fn read_body(saved_to: Option<&PathBuf>, body: Option<&String>) -> Option<String> {
    match saved_to {
        Some(path) => match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                log::error!("Failed to read saved response {}: {e}", path.display());
                None
            }
        },
        None => body.cloned(),
    }
}

// --- HTTP ---

#[derive(Debug, Default)]
struct HttpShared {
    state: TransportState,
    body: Option<String>,
    saved_to: Option<PathBuf>,
}

pub struct HttpTransport {
    shared: Arc<Mutex<HttpShared>>,
    worker: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Mutex::new(HttpShared::default())),
            worker: None,
            timeout,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HttpShared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("HTTP worker thread panicked");
            }
        }
    }
}

impl Transport for HttpTransport {
    fn request(&mut self, request: Request) -> Result<(), TransportError> {
        if self.lock().state.is_in_flight() {
            return Err(TransportError::Busy);
        }
        if request.url.is_empty() {
            return Err(TransportError::InvalidRequest("empty url".to_string()));
        }
        self.join_worker();
        {
            let mut shared = self.lock();
            shared.state = TransportState::Sending;
            shared.body = None;
            shared.saved_to = None;
        }

        let shared = Arc::clone(&self.shared);
        let timeout = self.timeout;
        let worker = std::thread::Builder::new()
            .name("fw-http".to_string())
            .spawn(move || run_request(shared, request, timeout))
            .map_err(|e| {
                self.lock().state = TransportState::Issue;
                TransportError::Spawn(e.to_string())
            })?;
        self.worker = Some(worker);
        Ok(())
    }

    fn state(&mut self) -> TransportState {
        self.lock().state
    }

    fn response(&self) -> Option<String> {
        let shared = self.lock();
        read_body(shared.saved_to.as_ref(), shared.body.as_ref())
    }

    fn reset(&mut self) {
        if self.lock().state.is_in_flight() {
            log::warn!("Resetting HTTP transport while a request is in flight");
            return;
        }
        self.join_worker();
        *self.lock() = HttpShared::default();
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        self.join_worker();
    }
}

fn run_request(shared: Arc<Mutex<HttpShared>>, request: Request, timeout: Duration) {
    let finish = |state: TransportState, body: Option<String>, saved_to: Option<PathBuf>| {
        let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
        guard.state = state;
        guard.body = body;
        guard.saved_to = saved_to;
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to create HTTP runtime: {e}");
            finish(
                TransportState::Issue,
                Some(format!("{ERROR_MARKER} runtime: {e}")),
                None,
            );
            return;
        }
    };

    let outcome = rt.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;
        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(payload) = &request.payload {
            builder = builder.body(payload.clone());
        }
        let response = builder
            .send()
            .await
            .map_err(|e| format!("Network error: {e}"))?;
        {
            let mut guard = shared.lock().unwrap_or_else(|e| e.into_inner());
            guard.state = TransportState::Receiving;
        }
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read body: {e}"))?;
        if !status.is_success() {
            return Err(format!("HTTP {status}: {text}"));
        }
        Ok(text)
    });

    match outcome {
        Ok(text) => {
            log::debug!("{} bytes received from {}", text.len(), request.url);
            match &request.save_to {
                Some(path) => match write_body(path, &text) {
                    Ok(()) => finish(TransportState::Idle, None, Some(path.clone())),
                    Err(e) => {
                        log::error!("Failed to save response: {e}");
                        finish(TransportState::Issue, Some(format!("{ERROR_MARKER} {e}")), None);
                    }
                },
                None => finish(TransportState::Idle, Some(text), None),
            }
        }
        Err(e) => {
            log::warn!("Request to {} failed: {e}", request.url);
            finish(TransportState::Issue, Some(format!("{ERROR_MARKER} {e}")), None);
        }
    }
}

// --- Scripted ---

#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub body: Result<String, String>,
    /// Number of `state()` polls that report `Receiving` before completion.
    pub polls_in_flight: u32,
}

impl ScriptedReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            body: Ok(body.into()),
            polls_in_flight: 0,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            body: Err(message.into()),
            polls_in_flight: 0,
        }
    }

    pub fn after_polls(mut self, polls: u32) -> Self {
        self.polls_in_flight = polls;
        self
    }
}

/// Replays queued replies in order, one per request.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: VecDeque<ScriptedReply>,
    log: Arc<Mutex<Vec<Request>>>,
    in_flight: Option<(ScriptedReply, Option<PathBuf>)>,
    state: TransportState,
    body: Option<String>,
    saved_to: Option<PathBuf>,
}

impl ScriptedTransport {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, reply: ScriptedReply) {
        self.replies.push_back(reply);
    }

    /// Shared view of every request issued, usable after the transport is boxed away.
    pub fn request_log(&self) -> Arc<Mutex<Vec<Request>>> {
        Arc::clone(&self.log)
    }

    fn complete(&mut self, reply: ScriptedReply, save_to: Option<PathBuf>) {
        match reply.body {
            Ok(text) => match save_to {
                Some(path) => match write_body(&path, &text) {
                    Ok(()) => {
                        self.saved_to = Some(path);
                        self.state = TransportState::Idle;
                    }
                    Err(e) => {
                        self.body = Some(format!("{ERROR_MARKER} {e}"));
                        self.state = TransportState::Issue;
                    }
                },
                None => {
                    self.body = Some(text);
                    self.state = TransportState::Idle;
                }
            },
            Err(message) => {
                self.body = Some(format!("{ERROR_MARKER} {message}"));
                self.state = TransportState::Issue;
            }
        }
    }
}

impl Transport for ScriptedTransport {
    fn request(&mut self, request: Request) -> Result<(), TransportError> {
        if self.state.is_in_flight() {
            return Err(TransportError::Busy);
        }
        let save_to = request.save_to.clone();
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        self.body = None;
        self.saved_to = None;
        let reply = self
            .replies
            .pop_front()
            .unwrap_or_else(|| ScriptedReply::fail("no scripted reply"));
        self.in_flight = Some((reply, save_to));
        self.state = TransportState::Sending;
        Ok(())
    }

    fn state(&mut self) -> TransportState {
        if let Some((mut reply, save_to)) = self.in_flight.take() {
            if reply.polls_in_flight > 0 {
                reply.polls_in_flight -= 1;
                self.in_flight = Some((reply, save_to));
                self.state = TransportState::Receiving;
            } else {
                self.complete(reply, save_to);
            }
        }
        self.state
    }

    fn response(&self) -> Option<String> {
        read_body(self.saved_to.as_ref(), self.body.as_ref())
    }

    fn reset(&mut self) {
        self.in_flight = None;
        self.state = TransportState::Inactive;
        self.body = None;
        self.saved_to = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_to_json_content_type() {
        let req = Request::post("http://localhost/api", "{}");
        assert_eq!(req.method, Method::Post);
        assert!(req
            .headers
            .iter()
            .any(|(k, v)| k == "Content-Type" && v == "application/json"));
    }

    #[test]
    fn scripted_reply_completes_on_first_poll() {
        let mut t = ScriptedTransport::new([ScriptedReply::ok("[SUCCESS] User found")]);
        assert_eq!(t.state(), TransportState::Inactive);
        t.request(Request::get("http://x/login")).expect("request");
        assert_eq!(t.state(), TransportState::Idle);
        assert_eq!(t.response().as_deref(), Some("[SUCCESS] User found"));
    }

    #[test]
    fn scripted_reply_can_stay_in_flight() {
        let mut t = ScriptedTransport::new([ScriptedReply::ok("body").after_polls(2)]);
        t.request(Request::get("http://x")).expect("request");
        assert_eq!(t.state(), TransportState::Receiving);
        assert!(t.request(Request::get("http://y")).is_err());
        assert_eq!(t.state(), TransportState::Receiving);
        assert_eq!(t.state(), TransportState::Idle);
    }

    #[test]
    fn scripted_failure_reports_issue_with_error_marker() {
        let mut t = ScriptedTransport::new([ScriptedReply::fail("no wifi")]);
        t.request(Request::get("http://x")).expect("request");
        assert_eq!(t.state(), TransportState::Issue);
        assert!(t.response().expect("body").starts_with(ERROR_MARKER));
    }

    #[test]
    fn exhausted_script_fails_instead_of_hanging() {
        let mut t = ScriptedTransport::default();
        t.request(Request::get("http://x")).expect("request");
        assert_eq!(t.state(), TransportState::Issue);
    }

    #[test]
    fn request_log_survives_boxing() {
        let t = ScriptedTransport::new([ScriptedReply::ok("a")]);
        let log = t.request_log();
        let mut boxed: Box<dyn Transport> = Box::new(t);
        boxed.request(Request::get("http://x/list")).expect("request");
        let seen = log.lock().expect("log lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].url, "http://x/list");
    }

    #[test]
    fn reset_returns_to_inactive() {
        let mut t = ScriptedTransport::new([ScriptedReply::ok("a")]);
        t.request(Request::get("http://x")).expect("request");
        t.state();
        t.reset();
        assert_eq!(t.state(), TransportState::Inactive);
        assert!(t.response().is_none());
    }

    #[test]
    fn keep_alive_detection() {
        assert!(is_keep_alive("[PONG]"));
        assert!(!is_keep_alive("[SUCCESS]"));
    }

    #[test]
    fn http_transport_rejects_empty_url() {
        let mut t = HttpTransport::new(Duration::from_secs(1));
        assert!(matches!(
            t.request(Request::get("")),
            Err(TransportError::InvalidRequest(_))
        ));
        assert_eq!(t.state(), TransportState::Inactive);
    }
}
