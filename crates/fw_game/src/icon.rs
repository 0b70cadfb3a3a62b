//! Static scenery: houses, trees, fences, lake edges, rocks.
//!
//! Icons are solid. When the player overlaps one it is pushed back to where
//! it stood before this frame's move.

use fw_core::Vector;
use fw_render::{Camera2D, Canvas};

use crate::entity::{Body, Collider, EntityBehavior, EntityContext, Other};

pub struct IconSpec {
    pub name: &'static str,
    pub width: u8,
    pub height: u8,
}

const CATALOG: &[IconSpec] = &[
    IconSpec { name: "house", width: 48, height: 32 },
    IconSpec { name: "man", width: 7, height: 16 },
    IconSpec { name: "plant", width: 16, height: 16 },
    IconSpec { name: "tree", width: 16, height: 16 },
    IconSpec { name: "woman", width: 9, height: 16 },
    IconSpec { name: "fence", width: 16, height: 8 },
    IconSpec { name: "fence_end", width: 16, height: 8 },
    IconSpec { name: "fence_vertical_end", width: 6, height: 8 },
    IconSpec { name: "fence_vertical_start", width: 6, height: 15 },
    IconSpec { name: "flower", width: 16, height: 16 },
    IconSpec { name: "lake_bottom", width: 31, height: 12 },
    IconSpec { name: "lake_bottom_left", width: 24, height: 22 },
    IconSpec { name: "lake_bottom_right", width: 24, height: 22 },
    IconSpec { name: "lake_left", width: 11, height: 31 },
    IconSpec { name: "lake_right", width: 11, height: 31 },
    IconSpec { name: "lake_top", width: 31, height: 12 },
    IconSpec { name: "lake_top_left", width: 24, height: 22 },
    IconSpec { name: "lake_top_right", width: 24, height: 22 },
    IconSpec { name: "rock_large", width: 18, height: 19 },
    IconSpec { name: "rock_medium", width: 16, height: 14 },
    IconSpec { name: "rock_small", width: 10, height: 8 },
];

pub fn lookup(name: &str) -> Option<&'static IconSpec> {
    CATALOG.iter().find(|spec| spec.name == name)
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconContext {
    pub name: &'static str,
    pub size: Vector,
}

impl IconContext {
    pub fn from_name(name: &str) -> Option<Self> {
        lookup(name).map(|spec| Self {
            name: spec.name,
            size: Vector::new(spec.width as f32, spec.height as f32),
        })
    }

    pub fn radius(&self) -> f32 {
        (self.size.x + self.size.y) / 4.0
    }
}

impl EntityBehavior for IconContext {
    fn start(&mut self, body: &mut Body) {
        // Layouts give the top-left corner; entities are centered.
        body.position += self.size / 2.0;
        body.collider = Some(Collider::Circle {
            radius: self.radius(),
        });
    }

    fn collision(&mut self, _body: &mut Body, other: Other<'_>) {
        if let EntityContext::Player(player) = &mut *other.context {
            other.body.position = player.old_position;
            player.dx = 0;
            player.dy = 0;
        }
    }

    fn render(&self, body: &Body, canvas: &mut dyn Canvas, camera: &Camera2D) {
        if !camera.is_visible(body.position, self.size) {
            return;
        }
        let top_left = camera.world_to_screen(body.position - self.size / 2.0);
        canvas.draw_sprite(self.name, top_left, self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{collide_pair, Entity};
    use crate::player::PlayerContext;
    use fw_render::RecordingCanvas;

    #[test]
    fn catalog_names_are_unique() {
        let mut names: Vec<&str> = CATALOG.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn unknown_icon_is_none() {
        assert!(IconContext::from_name("castle").is_none());
        assert_eq!(
            IconContext::from_name("house").map(|i| i.size),
            Some(Vector::new(48.0, 32.0))
        );
    }

    #[test]
    fn start_centers_icon_on_declared_cell() {
        let mut icon = IconContext::from_name("house").expect("house");
        let mut body = Body::at(Vector::new(10.0, 20.0));
        icon.start(&mut body);
        assert_eq!(body.position, Vector::new(34.0, 36.0));
        assert_eq!(body.collider, Some(Collider::Circle { radius: 20.0 }));
    }

    #[test]
    fn player_is_pushed_back_to_old_position() {
        let icon = IconContext::from_name("rock_large").expect("rock");
        let mut rock = Entity::new(1, Vector::new(100.0, 100.0), EntityContext::Icon(icon));
        rock.start();

        let mut player_ctx = PlayerContext::default();
        player_ctx.old_position = Vector::new(80.0, 109.0);
        player_ctx.dx = 1;
        let mut player = Entity::new(2, rock.body.position, EntityContext::Player(Box::new(player_ctx)));
        player.start();

        assert!(collide_pair(&mut rock, &mut player));
        assert_eq!(player.body.position, Vector::new(80.0, 109.0));
        let ctx = player.context.as_player().expect("player");
        assert_eq!((ctx.dx, ctx.dy), (0, 0));
    }

    #[test]
    fn off_screen_icon_is_not_drawn() {
        let mut icon = IconContext::from_name("tree").expect("tree");
        let mut body = Body::at(Vector::new(300.0, 150.0));
        icon.start(&mut body);
        let camera = Camera2D::new(128, 64);
        let mut canvas = RecordingCanvas::default();
        icon.render(&body, &mut canvas, &camera);
        assert_eq!(canvas.sprite_count(), 0);

        let mut body = Body::at(Vector::new(8.0, 8.0));
        icon.start(&mut body);
        icon.render(&body, &mut canvas, &camera);
        let sprites: Vec<_> = canvas.sprites().collect();
        assert_eq!(sprites, vec![("tree", Vector::new(8.0, 8.0))]);
    }
}
