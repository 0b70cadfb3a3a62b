pub mod camera;
pub mod canvas;

pub use camera::Camera2D;
pub use canvas::{Canvas, DrawCommand, RecordingCanvas, TextAlign};
