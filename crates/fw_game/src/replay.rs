use fw_core::{FpsChoice, GameKey, InputState};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::session::InputSource;

#[derive(Debug, Deserialize, Clone)]
pub struct InputScript {
    #[serde(default)]
    pub fixed_dt: Option<f32>,
    pub frames: Vec<ScriptFrame>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScriptFrame {
    /// Keys held for the whole run of this frame.
    #[serde(default)]
    pub held: Vec<GameKey>,
    /// Keys tapped on the first repeat only.
    #[serde(default)]
    pub pressed: Vec<GameKey>,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

impl InputScript {
    /// One input snapshot per simulated frame, with press/release edges.
    pub fn expanded_inputs(&self) -> Vec<InputState> {
        let mut out = Vec::new();
        let mut live = InputState::new();
        for frame in &self.frames {
            for i in 0..frame.repeat.max(1) {
                let tapped: &[GameKey] = if i == 0 { frame.pressed.as_slice() } else { &[] };
                for &key in GameKey::ALL {
                    if frame.held.contains(&key) || tapped.contains(&key) {
                        live.key_down(key);
                    } else {
                        live.key_up(key);
                    }
                }
                out.push(live.take_frame());
            }
        }
        out
    }

    /// Frame rate closest to the script's `fixed_dt`, if it sets one.
    pub fn fps_hint(&self) -> Option<FpsChoice> {
        let dt = self.fixed_dt?;
        FpsChoice::ALL
            .iter()
            .copied()
            .min_by(|a, b| (a.frame_dt() - dt).abs().total_cmp(&(b.frame_dt() - dt).abs()))
    }
}

pub fn load_script_from_path(path: &Path) -> Result<InputScript, String> {
    let raw =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let script: InputScript = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse input script JSON {}: {e}", path.display()))?;
    validate_script(&script)?;
    Ok(script)
}

fn validate_script(script: &InputScript) -> Result<(), String> {
    if script.fixed_dt.is_some_and(|dt| dt <= 0.0) {
        return Err("Input script validation failed: fixed_dt must be > 0".to_string());
    }
    if script.frames.is_empty() {
        return Err("Input script validation failed: frames list is empty".to_string());
    }
    Ok(())
}

const fn default_repeat() -> u32 {
    1
}

/// Replays a script one frame per call, then ends the session.
pub struct ScriptedInput {
    frames: std::vec::IntoIter<InputState>,
}

impl ScriptedInput {
    pub fn new(script: &InputScript) -> Self {
        Self {
            frames: script.expanded_inputs().into_iter(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn next_frame(&mut self) -> Option<InputState> {
        self.frames.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameManager, GameOptions};
    use crate::world::OfflineSource;
    use fw_platform::MemoryStore;
    use fw_render::RecordingCanvas;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "fw_script_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn script_file_parses_and_expands() {
        let path = temp_file_path("parse");
        fs::write(
            &path,
            r#"{
              "frames": [
                { "held": ["right"], "repeat": 3 },
                { "pressed": ["back"] }
              ]
            }"#,
        )
        .expect("write script file");

        let script = load_script_from_path(&path).expect("script should load");
        let inputs = script.expanded_inputs();
        assert_eq!(inputs.len(), 4);
        assert!(inputs[0].is_just_pressed(GameKey::Right));
        assert!(inputs[1].is_held(GameKey::Right));
        assert!(!inputs[1].is_just_pressed(GameKey::Right));
        assert!(inputs[3].is_just_pressed(GameKey::Back));
        assert!(inputs[3].is_just_released(GameKey::Right));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn fixed_dt_maps_to_nearest_frame_rate() {
        let script: InputScript =
            serde_json::from_str(r#"{ "fixed_dt": 0.0166, "frames": [ {} ] }"#).expect("json");
        assert_eq!(script.fps_hint(), Some(FpsChoice::Fps60));
        let script: InputScript = serde_json::from_str(r#"{ "frames": [ {} ] }"#).expect("json");
        assert_eq!(script.fps_hint(), None);
    }

    #[test]
    fn empty_script_is_rejected() {
        let path = temp_file_path("empty");
        fs::write(&path, r#"{ "fixed_dt": 0.5, "frames": [] }"#).expect("write script file");
        assert!(load_script_from_path(&path).is_err());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn unknown_key_fails_to_parse() {
        let path = temp_file_path("badkey");
        fs::write(&path, r#"{ "frames": [ { "held": ["jump"] } ] }"#).expect("write script file");
        assert!(load_script_from_path(&path).is_err());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn replay_run_is_deterministic() {
        let script: InputScript = serde_json::from_str(
            r#"{
              "frames": [
                { "held": ["right"], "repeat": 30 },
                { "held": ["up", "left"], "repeat": 12 },
                { "held": ["down"], "repeat": 20 }
              ]
            }"#,
        )
        .expect("script json");

        let run = || {
            let store = MemoryStore::new();
            let mut game = GameManager::new(Box::new(store), Box::new(OfflineSource), GameOptions::default());
            let mut input = ScriptedInput::new(&script);
            let mut canvas = RecordingCanvas::default();
            while let Some(frame) = input.next_frame() {
                game.on_frame(&mut canvas, &frame);
            }
            let player = game.player().cloned().expect("player");
            let position = game
                .level()
                .and_then(|l| l.player())
                .map(|e| e.body.position)
                .expect("player entity");
            (player, position, game.enemy_count())
        };

        let (a, pos_a, enemies_a) = run();
        let (b, pos_b, enemies_b) = run();
        assert_eq!(pos_a, pos_b);
        assert_eq!(a.health, b.health);
        assert_eq!(a.direction, b.direction);
        assert_eq!(enemies_a, enemies_b);
    }
}
