//! Drawing surface boundary.
//!
//! Game code draws in screen pixels (origin top-left, y down) through the
//! `Canvas` trait. The device backend blits monochrome bitmaps; on the host
//! the `RecordingCanvas` captures each call so a frame can be inspected.

use glam::Vec2;

/// Device screen size in pixels.
pub const SCREEN_WIDTH: u32 = 128;
pub const SCREEN_HEIGHT: u32 = 64;

/// Approximate advance of the secondary font, used for centering.
const GLYPH_WIDTH: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn clear(&mut self);

    /// Draw the named bitmap with its top-left corner at `top_left`.
    fn draw_sprite(&mut self, name: &str, top_left: Vec2, size: Vec2);

    /// Rectangle outline.
    fn draw_frame(&mut self, top_left: Vec2, size: Vec2);

    fn draw_dot(&mut self, at: Vec2);

    /// `at` is the baseline anchor: left edge or center depending on `align`.
    fn draw_str(&mut self, text: &str, at: Vec2, align: TextAlign);

    fn string_width(&self, text: &str) -> u32 {
        text.chars().count() as u32 * GLYPH_WIDTH
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Sprite {
        name: String,
        top_left: Vec2,
        size: Vec2,
    },
    Frame {
        top_left: Vec2,
        size: Vec2,
    },
    Dot(Vec2),
    Text {
        text: String,
        at: Vec2,
        align: TextAlign,
    },
}

/// Canvas that records draw calls instead of rasterizing them.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: u32,
    height: u32,
    pub commands: Vec<DrawCommand>,
}

impl Default for RecordingCanvas {
    fn default() -> Self {
        Self::new(SCREEN_WIDTH, SCREEN_HEIGHT)
    }
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn sprites(&self) -> impl Iterator<Item = (&str, Vec2)> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::Sprite { name, top_left, .. } => Some((name.as_str(), *top_left)),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.iter().filter_map(|cmd| match cmd {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites().count()
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn draw_sprite(&mut self, name: &str, top_left: Vec2, size: Vec2) {
        self.commands.push(DrawCommand::Sprite {
            name: name.to_string(),
            top_left,
            size,
        });
    }

    fn draw_frame(&mut self, top_left: Vec2, size: Vec2) {
        self.commands.push(DrawCommand::Frame { top_left, size });
    }

    fn draw_dot(&mut self, at: Vec2) {
        self.commands.push(DrawCommand::Dot(at));
    }

    fn draw_str(&mut self, text: &str, at: Vec2, align: TextAlign) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            at,
            align,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_discards_previous_frame() {
        let mut canvas = RecordingCanvas::default();
        canvas.draw_dot(Vec2::ZERO);
        canvas.clear();
        assert_eq!(canvas.commands, vec![DrawCommand::Clear]);
    }

    #[test]
    fn sprites_iterator_skips_other_commands() {
        let mut canvas = RecordingCanvas::default();
        canvas.draw_str("hi", Vec2::ZERO, TextAlign::Left);
        canvas.draw_sprite("tree", Vec2::new(4.0, 4.0), Vec2::splat(16.0));
        let sprites: Vec<_> = canvas.sprites().collect();
        assert_eq!(sprites, vec![("tree", Vec2::new(4.0, 4.0))]);
        assert_eq!(canvas.texts().collect::<Vec<_>>(), vec!["hi"]);
    }

    #[test]
    fn default_matches_device_screen() {
        let canvas = RecordingCanvas::default();
        assert_eq!((canvas.width(), canvas.height()), (128, 64));
        assert_eq!(canvas.string_width("abc"), 15);
    }
}
