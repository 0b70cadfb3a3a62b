//! Debug overlay drawn on top of the game frame.
//!
//! The screen is tiny, so the overlay is a few lines of text in the top-left
//! corner rather than a window. It only draws while `visible` is true.

use fw_core::time::TimeState;
use fw_render::{Canvas, TextAlign};
use glam::Vec2;

const LINE_HEIGHT: f32 = 8.0;

#[derive(Debug, Clone, Default)]
pub struct OverlayStats {
    pub entity_count: usize,
    pub enemy_count: usize,
    pub level_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct DebugOverlay {
    pub visible: bool,
}

impl DebugOverlay {
    pub fn new(visible: bool) -> Self {
        Self { visible }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        log::info!("Debug overlay: {}", if self.visible { "ON" } else { "OFF" });
    }

    pub fn lines(time: &TimeState, stats: &OverlayStats) -> Vec<String> {
        vec![
            format!("FPS {:.0}", time.smoothed_fps),
            format!("E{} N{}", stats.entity_count, stats.enemy_count),
            stats.level_id.clone(),
        ]
    }

    pub fn draw(&self, canvas: &mut dyn Canvas, time: &TimeState, stats: &OverlayStats) {
        if !self.visible {
            return;
        }
        for (row, line) in Self::lines(time, stats).iter().enumerate() {
            let y = LINE_HEIGHT * (row as f32 + 1.0);
            canvas.draw_str(line, Vec2::new(1.0, y), TextAlign::Left);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fw_core::FpsChoice;
    use fw_render::RecordingCanvas;

    fn stats() -> OverlayStats {
        OverlayStats {
            entity_count: 5,
            enemy_count: 2,
            level_id: "town_world".to_string(),
        }
    }

    #[test]
    fn hidden_overlay_draws_nothing() {
        let mut canvas = RecordingCanvas::default();
        let time = TimeState::new(FpsChoice::Fps30);
        DebugOverlay::new(false).draw(&mut canvas, &time, &stats());
        assert!(canvas.commands.is_empty());
    }

    #[test]
    fn visible_overlay_reports_counts_and_level() {
        let mut canvas = RecordingCanvas::default();
        let time = TimeState::new(FpsChoice::Fps60);
        DebugOverlay::new(true).draw(&mut canvas, &time, &stats());
        let texts: Vec<&str> = canvas.texts().collect();
        assert_eq!(texts, vec!["FPS 60", "E5 N2", "town_world"]);
    }

    #[test]
    fn toggle_flips_visibility() {
        let mut overlay = DebugOverlay::default();
        overlay.toggle();
        assert!(overlay.visible);
        overlay.toggle();
        assert!(!overlay.visible);
    }
}
