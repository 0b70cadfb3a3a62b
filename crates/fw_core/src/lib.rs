pub mod fps;
pub mod input;
pub mod time;
pub mod vector;

pub use fps::FpsChoice;
pub use input::{GameKey, InputState};
pub use time::TimeState;
pub use vector::Vector;
