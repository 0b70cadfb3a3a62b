//! Input state tracking with both edge-triggered and level-triggered queries.
//!
//! - **Level-triggered (held):** `is_held(key)` returns true every frame the key
//!   is physically down. Movement and the confirm/attack action read this.
//!
//! - **Edge-triggered (just_pressed / just_released):** true only during the
//!   frame the transition happened, cleared by `end_frame()`. The back button
//!   reads this so a single press stops the session exactly once.
//!
//! The device has a five-way pad plus a back button, so the key set is closed.

use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameKey {
    Up,
    Down,
    Left,
    Right,
    Ok,
    Back,
}

impl GameKey {
    pub const ALL: &'static [GameKey] = &[
        GameKey::Up,
        GameKey::Down,
        GameKey::Left,
        GameKey::Right,
        GameKey::Ok,
        GameKey::Back,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Ok => "ok",
            Self::Back => "back",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    held: HashSet<GameKey>,
    just_pressed: HashSet<GameKey>,
    just_released: HashSet<GameKey>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot with the given keys held and freshly pressed this frame.
    pub fn with_held(keys: &[GameKey]) -> Self {
        let mut input = Self::new();
        for &key in keys {
            input.key_down(key);
        }
        input
    }

    pub fn key_down(&mut self, key: GameKey) {
        if self.held.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: GameKey) {
        if self.held.remove(&key) {
            self.just_released.insert(key);
        }
    }

    /// Release every held key (used when a session loses focus).
    pub fn release_all(&mut self) {
        let held: Vec<GameKey> = self.held.iter().copied().collect();
        for key in held {
            self.key_up(key);
        }
    }

    pub fn is_held(&self, key: GameKey) -> bool {
        self.held.contains(&key)
    }

    pub fn is_just_pressed(&self, key: GameKey) -> bool {
        self.just_pressed.contains(&key)
    }

    pub fn is_just_released(&self, key: GameKey) -> bool {
        self.just_released.contains(&key)
    }

    pub fn any_held(&self) -> bool {
        !self.held.is_empty()
    }

    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }

    /// Copy of the current state for one simulation frame; clears edges on `self`.
    pub fn take_frame(&mut self) -> InputState {
        let frame = self.clone();
        self.end_frame();
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_down_sets_held_and_just_pressed() {
        let mut input = InputState::new();
        input.key_down(GameKey::Up);
        assert!(input.is_held(GameKey::Up));
        assert!(input.is_just_pressed(GameKey::Up));
    }

    #[test]
    fn key_up_clears_held_sets_just_released() {
        let mut input = InputState::new();
        input.key_down(GameKey::Ok);
        input.key_up(GameKey::Ok);
        assert!(!input.is_held(GameKey::Ok));
        assert!(input.is_just_released(GameKey::Ok));
    }

    #[test]
    fn key_up_without_down_is_no_op() {
        let mut input = InputState::new();
        input.key_up(GameKey::Left);
        assert!(!input.is_just_released(GameKey::Left));
        assert!(!input.is_held(GameKey::Left));
    }

    #[test]
    fn end_frame_keeps_held_but_clears_edges() {
        let mut input = InputState::with_held(&[GameKey::Up, GameKey::Right]);
        input.end_frame();
        assert!(!input.is_just_pressed(GameKey::Up));
        assert!(input.is_held(GameKey::Up));
        assert!(input.is_held(GameKey::Right));
    }

    #[test]
    fn take_frame_returns_edges_once() {
        let mut shared = InputState::new();
        shared.key_down(GameKey::Back);
        let first = shared.take_frame();
        let second = shared.take_frame();
        assert!(first.is_just_pressed(GameKey::Back));
        assert!(!second.is_just_pressed(GameKey::Back));
        assert!(second.is_held(GameKey::Back));
    }

    #[test]
    fn release_all_reports_every_key_released() {
        let mut input = InputState::with_held(&[GameKey::Down, GameKey::Ok]);
        input.release_all();
        assert!(!input.any_held());
        assert!(input.is_just_released(GameKey::Down));
        assert!(input.is_just_released(GameKey::Ok));
    }

    #[test]
    fn labels_are_unique() {
        let labels: HashSet<&str> = GameKey::ALL.iter().map(|k| k.label()).collect();
        assert_eq!(labels.len(), GameKey::ALL.len());
    }
}
