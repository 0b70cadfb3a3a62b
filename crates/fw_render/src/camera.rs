use glam::Vec2;

/// Screen-sized window into the world. `position` is the world coordinate
/// of the screen's top-left pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2D {
    pub position: Vec2,
    pub viewport: (u32, u32),
}

impl Camera2D {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            position: Vec2::ZERO,
            viewport: (viewport_width, viewport_height),
        }
    }

    pub fn viewport_size(&self) -> Vec2 {
        Vec2::new(self.viewport.0 as f32, self.viewport.1 as f32)
    }

    /// Center on `target`, clamped so the view never leaves `[0, world_size]`.
    pub fn follow(&mut self, target: Vec2, world_size: Vec2) {
        let view = self.viewport_size();
        let max = (world_size - view).max(Vec2::ZERO);
        self.position = (target - view * 0.5).clamp(Vec2::ZERO, max);
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        world - self.position
    }

    /// Whether a box centered at `center` with `size` overlaps the screen.
    pub fn is_visible(&self, center: Vec2, size: Vec2) -> bool {
        let top_left = self.world_to_screen(center - size * 0.5);
        let bottom_right = top_left + size;
        let view = self.viewport_size();
        bottom_right.x >= 0.0 && bottom_right.y >= 0.0 && top_left.x <= view.x && top_left.y <= view.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: Vec2 = Vec2::new(384.0, 192.0);

    #[test]
    fn follow_centers_target_in_open_space() {
        let mut camera = Camera2D::new(128, 64);
        camera.follow(Vec2::new(192.0, 96.0), WORLD);
        assert_eq!(camera.position, Vec2::new(128.0, 64.0));
        assert_eq!(camera.world_to_screen(Vec2::new(192.0, 96.0)), Vec2::new(64.0, 32.0));
    }

    #[test]
    fn follow_clamps_at_world_edges() {
        let mut camera = Camera2D::new(128, 64);
        camera.follow(Vec2::new(5.0, 5.0), WORLD);
        assert_eq!(camera.position, Vec2::ZERO);
        camera.follow(Vec2::new(380.0, 190.0), WORLD);
        assert_eq!(camera.position, Vec2::new(256.0, 128.0));
    }

    #[test]
    fn off_screen_boxes_are_culled() {
        let camera = Camera2D::new(128, 64);
        assert!(camera.is_visible(Vec2::new(10.0, 10.0), Vec2::splat(16.0)));
        assert!(camera.is_visible(Vec2::new(-4.0, 10.0), Vec2::splat(16.0)));
        assert!(!camera.is_visible(Vec2::new(200.0, 10.0), Vec2::splat(16.0)));
    }
}
