//! Polled fetch/parse sequencer for remote data.
//!
//! A `DataLoader` runs a list of steps, each a request followed by a parse
//! of its response. It never blocks: the UI thread calls `tick` from its own
//! timer and every due poll performs at most one transition.
//!
//! ```text
//! Initial --fetch ok--> Requested --transport Idle--> Received --parse ok--> Parsed
//!    ^                      |                             |                    |
//!    |                  Issue/send fail               Failed/Redirect          |
//!    |                      v                             v                    |
//!    |                    Error                       ParseError               |
//!    +------------------- more steps -------------------------------------------+
//! ```
//!
//! `Error` and `ParseError` are terminal, as is `Parsed` on the last step.
//! Reaching any terminal state releases the transport.

use std::time::{Duration, Instant};

use fw_core::Vector;
use fw_platform::transport::is_keep_alive;
use fw_platform::{Transport, TransportState};
use fw_render::{Canvas, TextAlign};
use thiserror::Error;

pub const POLL_INTERVAL: Duration = Duration::from_millis(250);
const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Initial,
    Requested,
    Received,
    Parsed,
    Error,
    ParseError,
}

/// Screens a parse step may send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    MainMenu,
    Game,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// Text to display; the sequence continues.
    Parsed(String),
    Failed(String),
    /// Abandon the sequence and switch screens.
    Redirect(View),
}

/// The work behind each loader step. Parsing may change `step_count`.
pub trait LoaderSteps: Send {
    fn step_count(&self) -> usize;

    /// Issue the request for `step`. False if it could not be sent.
    fn fetch(&mut self, step: usize, transport: &mut dyn Transport) -> bool;

    fn parse(&mut self, step: usize, response: &str) -> StepResult;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderPoll {
    Waiting,
    Advanced,
    ShowResult(String),
    ShowError(String),
    Navigate(View),
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("previous loader still holds its transport")]
    Busy,
    #[error("loader has no steps")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct PollTimer {
    interval: Duration,
    last: Option<Instant>,
}

impl PollTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True on the first call and then once per elapsed interval.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Spinner {
    frame: usize,
}

impl Spinner {
    pub fn advance(&mut self) {
        self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
    }

    pub fn glyph(&self) -> &'static str {
        SPINNER_FRAMES[self.frame]
    }
}

pub struct DataLoader {
    title: String,
    steps: Box<dyn LoaderSteps>,
    request_index: usize,
    state: LoaderState,
    transport: Option<Box<dyn Transport>>,
    response: Option<String>,
    result_text: Option<String>,
    timer: PollTimer,
    spinner: Spinner,
}

impl DataLoader {
    pub fn new(title: impl Into<String>, steps: Box<dyn LoaderSteps>, transport: Box<dyn Transport>) -> Self {
        Self {
            title: title.into(),
            steps,
            request_index: 0,
            state: LoaderState::Initial,
            transport: Some(transport),
            response: None,
            result_text: None,
            timer: PollTimer::new(POLL_INTERVAL),
            spinner: Spinner::default(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    #[cfg(test)]
    pub fn state(&self) -> LoaderState {
        self.state
    }

    #[cfg(test)]
    pub fn request_index(&self) -> usize {
        self.request_index
    }

    pub fn request_count(&self) -> usize {
        self.steps.step_count()
    }

    pub fn result_text(&self) -> Option<&str> {
        self.result_text.as_deref()
    }

    pub fn holds_transport(&self) -> bool {
        self.transport.is_some()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, LoaderState::Error | LoaderState::ParseError)
            || (self.state == LoaderState::Parsed && self.transport.is_none())
    }

    /// Poll if the timer is due.
    pub fn tick(&mut self, now: Instant) -> Option<LoaderPoll> {
        if !self.timer.due(now) {
            return None;
        }
        self.spinner.advance();
        Some(self.poll())
    }

    /// Perform at most one state transition.
    pub fn poll(&mut self) -> LoaderPoll {
        if self.is_finished() {
            return LoaderPoll::Waiting;
        }
        let Some(transport) = self.transport.as_mut() else {
            return self.fail(LoaderState::Error, "Transport unavailable".to_string());
        };

        match self.state {
            LoaderState::Initial => {
                let step = self.request_index;
                if step >= self.steps.step_count() {
                    return self.fail(LoaderState::Error, format!("No step {step} to run"));
                }
                if self.steps.fetch(step, transport.as_mut()) {
                    log::debug!("{}: step {step} requested", self.title);
                    self.state = LoaderState::Requested;
                    LoaderPoll::Advanced
                } else {
                    self.fail(LoaderState::Error, "Failed to send request".to_string())
                }
            }
            LoaderState::Requested => match transport.state() {
                TransportState::Idle => {
                    let body = transport.response().unwrap_or_default();
                    if body.trim().is_empty() || is_keep_alive(&body) {
                        return LoaderPoll::Waiting;
                    }
                    self.response = Some(body);
                    self.state = LoaderState::Received;
                    LoaderPoll::Advanced
                }
                TransportState::Issue => {
                    let detail = transport.response().unwrap_or_default();
                    self.fail(LoaderState::Error, format!("Request failed. {detail}"))
                }
                _ => LoaderPoll::Waiting,
            },
            LoaderState::Received => {
                let body = self.response.take().unwrap_or_default();
                match self.steps.parse(self.request_index, &body) {
                    StepResult::Parsed(text) => {
                        self.result_text = Some(text);
                        self.state = LoaderState::Parsed;
                        LoaderPoll::Advanced
                    }
                    StepResult::Failed(message) => self.fail(LoaderState::ParseError, message),
                    StepResult::Redirect(view) => {
                        log::info!("{}: step {} redirected to {view:?}", self.title, self.request_index);
                        self.state = LoaderState::ParseError;
                        self.release();
                        LoaderPoll::Navigate(view)
                    }
                }
            }
            LoaderState::Parsed => {
                if self.request_index + 1 < self.steps.step_count() {
                    self.request_index += 1;
                    transport.reset();
                    self.state = LoaderState::Initial;
                    LoaderPoll::Advanced
                } else {
                    self.release();
                    log::info!("{}: all {} steps done", self.title, self.request_index + 1);
                    LoaderPoll::ShowResult(self.result_text.clone().unwrap_or_default())
                }
            }
            LoaderState::Error | LoaderState::ParseError => LoaderPoll::Waiting,
        }
    }

    fn fail(&mut self, state: LoaderState, message: String) -> LoaderPoll {
        log::warn!("{}: step {} failed: {message}", self.title, self.request_index);
        self.state = state;
        self.release();
        LoaderPoll::ShowError(format!("{message}\nPress BACK to return."))
    }

    fn release(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if transport.state().is_in_flight() {
                log::warn!("{}: releasing transport with a request in flight", self.title);
            } else {
                transport.reset();
            }
        }
    }

    /// Abandon the sequence, releasing the transport.
    pub fn abort(&mut self) {
        if self.transport.is_some() {
            self.state = LoaderState::Error;
            self.release();
        }
    }

    pub fn draw(&self, canvas: &mut dyn Canvas) {
        canvas.clear();
        let center_x = canvas.width() as f32 / 2.0;
        canvas.draw_str(&self.title, Vector::new(center_x, 12.0), TextAlign::Center);
        let status = match (self.state, self.result_text()) {
            (LoaderState::Error | LoaderState::ParseError, _) => "Error".to_string(),
            (LoaderState::Parsed, Some(text)) if self.transport.is_none() => text.to_string(),
            _ => format!(
                "Loading {} {}/{}",
                self.spinner.glyph(),
                self.request_index + 1,
                self.steps.step_count()
            ),
        };
        canvas.draw_str(&status, Vector::new(center_x, 36.0), TextAlign::Center);
    }
}

impl Drop for DataLoader {
    fn drop(&mut self) {
        self.release();
    }
}

/// Runs one loader at a time on the UI thread.
pub struct LoaderHost {
    active: Option<DataLoader>,
    view: View,
}

impl Default for LoaderHost {
    fn default() -> Self {
        Self {
            active: None,
            view: View::MainMenu,
        }
    }
}

impl LoaderHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, loader: DataLoader) -> Result<(), LoaderError> {
        if self.active.as_ref().is_some_and(DataLoader::holds_transport) {
            return Err(LoaderError::Busy);
        }
        if loader.request_count() == 0 {
            return Err(LoaderError::Empty);
        }
        log::info!("Starting loader '{}'", loader.title());
        self.active = Some(loader);
        Ok(())
    }

    pub fn tick(&mut self, now: Instant) -> Option<LoaderPoll> {
        let poll = self.active.as_mut()?.tick(now)?;
        match &poll {
            LoaderPoll::Navigate(view) => self.view = *view,
            LoaderPoll::ShowResult(_) => self.view = View::Game,
            _ => {}
        }
        Some(poll)
    }

    pub fn active(&self) -> Option<&DataLoader> {
        self.active.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.active.as_ref().is_some_and(|l| !l.is_finished())
    }

    /// Remove the current loader, aborting it if still running.
    pub fn finish(&mut self) -> Option<DataLoader> {
        let mut loader = self.active.take()?;
        loader.abort();
        Some(loader)
    }

    pub fn view(&self) -> View {
        self.view
    }
}
