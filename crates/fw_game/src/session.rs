//! Simulation worker thread.
//!
//! A `GameSession` moves the `GameManager` onto its own thread and runs the
//! fixed-step loop there. The UI thread only feeds input and asks the
//! session to stop. Stopping raises a flag, joins the worker, and only then
//! is the manager (and its level and entities) dropped, so nothing is torn
//! down while a frame is still running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use fw_core::InputState;
use fw_render::Canvas;
use thiserror::Error;

use crate::game::GameManager;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to spawn game thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("game thread panicked")]
    Panicked,
}

/// Supplies one input snapshot per simulation frame. `None` ends the session.
pub trait InputSource: Send {
    fn next_frame(&mut self) -> Option<InputState>;
}

/// Live input written by the UI thread, sampled once per frame.
#[derive(Debug, Clone, Default)]
pub struct SharedInput(Arc<Mutex<InputState>>);

impl SharedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut InputState) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl InputSource for SharedInput {
    fn next_frame(&mut self) -> Option<InputState> {
        Some(self.with(InputState::take_frame))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Wall-clock fixed step, sleeping between frames.
    Realtime,
    /// One frame per input snapshot, as fast as possible.
    Headless,
}

pub struct GameSession {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<GameManager>>,
}

impl GameSession {
    pub fn start(
        manager: GameManager,
        input: Box<dyn InputSource>,
        canvas: Box<dyn Canvas + Send>,
        pacing: Pacing,
    ) -> Result<Self, SessionError> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let worker = std::thread::Builder::new()
            .name("fw-game".to_string())
            .spawn(move || run(manager, input, canvas, pacing, &flag))?;
        log::info!("Game session started ({pacing:?})");
        Ok(Self {
            stop,
            worker: Some(worker),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the worker, wait for it, and hand back the stopped manager.
    pub fn stop_and_join(mut self) -> Result<GameManager, SessionError> {
        self.join()
    }

    fn join(&mut self) -> Result<GameManager, SessionError> {
        self.stop.store(true, Ordering::Release);
        let worker = self.worker.take().ok_or(SessionError::Panicked)?;
        worker.join().map_err(|_| SessionError::Panicked)
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(e) = self.join() {
                log::error!("Game session ended badly: {e}");
            }
        }
    }
}

fn run(
    mut manager: GameManager,
    mut input: Box<dyn InputSource>,
    mut canvas: Box<dyn Canvas + Send>,
    pacing: Pacing,
    stop: &AtomicBool,
) -> GameManager {
    let frame_dt = Duration::from_secs_f64(manager.time_mut().fixed_dt);
    'frames: while !stop.load(Ordering::Acquire) && !manager.is_stopped() {
        match pacing {
            Pacing::Realtime => manager.time_mut().begin_frame(),
            Pacing::Headless => manager.time_mut().advance(frame_dt),
        }
        while manager.time_mut().should_step() {
            let Some(frame) = input.next_frame() else {
                log::info!("Input exhausted, ending session");
                break 'frames;
            };
            manager.on_frame(canvas.as_mut(), &frame);
            if manager.is_stopped() || stop.load(Ordering::Acquire) {
                break 'frames;
            }
        }
        if pacing == Pacing::Realtime {
            std::thread::sleep(manager.time_mut().time_until_next_step());
        }
    }
    log::info!("Game loop finished after {} frames", manager.frame_count());
    manager.shutdown();
    manager
}

/// Holds at most one running session.
#[derive(Default)]
pub struct SessionSlot {
    session: Option<GameSession>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session, stopping and joining any previous one first.
    pub fn start(
        &mut self,
        manager: GameManager,
        input: Box<dyn InputSource>,
        canvas: Box<dyn Canvas + Send>,
        pacing: Pacing,
    ) -> Result<(), SessionError> {
        if let Some(old) = self.session.take() {
            log::info!("Replacing running game session");
            old.stop_and_join()?;
        }
        self.session = Some(GameSession::start(manager, input, canvas, pacing)?);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_finished())
    }

    pub fn stop(&mut self) -> Option<Result<GameManager, SessionError>> {
        self.session.take().map(GameSession::stop_and_join)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameOptions;
    use crate::world::OfflineSource;
    use fw_core::GameKey;
    use fw_platform::storage::load_u32;
    use fw_platform::MemoryStore;
    use fw_render::RecordingCanvas;

    struct Frames(std::vec::IntoIter<InputState>);

    impl InputSource for Frames {
        fn next_frame(&mut self) -> Option<InputState> {
            self.0.next()
        }
    }

    fn frames(keys: &[&[GameKey]]) -> Box<dyn InputSource> {
        let states: Vec<InputState> = keys.iter().map(|k| InputState::with_held(k)).collect();
        Box::new(Frames(states.into_iter()))
    }

    fn manager(store: &MemoryStore) -> GameManager {
        GameManager::new(Box::new(store.clone()), Box::new(OfflineSource), GameOptions::default())
    }

    #[test]
    fn headless_session_runs_until_input_ends_and_saves() {
        let store = MemoryStore::new();
        let input = frames(&[&[GameKey::Left], &[GameKey::Left], &[]]);
        let session = GameSession::start(
            manager(&store),
            input,
            Box::new(RecordingCanvas::default()),
            Pacing::Headless,
        )
        .expect("spawn");
        let game = session.stop_and_join().expect("join");
        assert!(game.frame_count() <= 3);
        assert!(game.is_stopped());
        assert!(game.level().is_none());
        assert_eq!(load_u32(&store, "player/level").expect("saved"), 1);
    }

    #[test]
    fn back_ends_the_session_from_inside() {
        let store = MemoryStore::new();
        let input = frames(&[&[], &[GameKey::Back], &[], &[], &[]]);
        let session = GameSession::start(
            manager(&store),
            input,
            Box::new(RecordingCanvas::default()),
            Pacing::Headless,
        )
        .expect("spawn");
        let game = session.stop_and_join().expect("join");
        assert!(game.is_stopped());
        assert!(game.frame_count() <= 2);
    }

    #[test]
    fn slot_replaces_running_session() {
        let store = MemoryStore::new();
        let mut slot = SessionSlot::new();
        slot.start(
            manager(&store),
            Box::new(SharedInput::new()),
            Box::new(RecordingCanvas::default()),
            Pacing::Realtime,
        )
        .expect("first");
        slot.start(
            manager(&store),
            Box::new(SharedInput::new()),
            Box::new(RecordingCanvas::default()),
            Pacing::Realtime,
        )
        .expect("second");
        assert!(slot.is_active());
        let game = slot.stop().expect("running").expect("join");
        assert!(game.is_stopped());
        assert!(!slot.is_active());
    }

    #[test]
    fn shared_input_clears_edges_per_frame() {
        let mut shared = SharedInput::new();
        shared.with(|input| input.key_down(GameKey::Ok));
        let first = shared.next_frame().expect("frame");
        let second = shared.next_frame().expect("frame");
        assert!(first.is_just_pressed(GameKey::Ok));
        assert!(!second.is_just_pressed(GameKey::Ok));
        assert!(second.is_held(GameKey::Ok));
    }
}
