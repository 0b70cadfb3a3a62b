//! 2D vector helpers on top of `glam::Vec2`.
//!
//! Simulation code compares positions with a fixed tolerance rather than exact
//! float equality: entities step by `speed * dt`, so "arrived" means "within
//! `EPSILON` on both axes".

pub use glam::Vec2 as Vector;

/// Arrival / "at position" tolerance in world units.
pub const EPSILON: f32 = 0.1;

/// True when `a` and `b` are within `eps` of each other on both axes.
pub fn approx_eq(a: Vector, b: Vector, eps: f32) -> bool {
    (a.x - b.x).abs() < eps && (a.y - b.y).abs() < eps
}

/// Clamp `v` componentwise into the box spanned by `a` and `b`, in either order.
pub fn clamp_between(v: Vector, a: Vector, b: Vector) -> Vector {
    v.clamp(a.min(b), a.max(b))
}

/// Per-axis sign of `target - current`, normalized to unit length.
///
/// Axes that already match contribute zero, so a purely horizontal walk
/// yields `(±1, 0)` and a diagonal one `(±0.707, ±0.707)`.
pub fn axis_direction(current: Vector, target: Vector) -> Vector {
    let sign = |from: f32, to: f32| {
        if from < to {
            1.0
        } else if from > to {
            -1.0
        } else {
            0.0
        }
    };
    let raw = Vector::new(sign(current.x, target.x), sign(current.y, target.y));
    raw.normalize_or_zero()
}

/// Move `current` along `direction` by `step`, never passing `target` on either axis.
pub fn step_towards(current: Vector, target: Vector, direction: Vector, step: f32) -> Vector {
    let mut next = current + direction * step;
    if (direction.x > 0.0 && next.x > target.x) || (direction.x < 0.0 && next.x < target.x) {
        next.x = target.x;
    }
    if (direction.y > 0.0 && next.y > target.y) || (direction.y < 0.0 && next.y < target.y) {
        next.y = target.y;
    }
    next
}
