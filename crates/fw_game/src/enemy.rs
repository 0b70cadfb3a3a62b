//! Patrolling enemies.
//!
//! An enemy walks between `start_position` and `end_position`, pausing for
//! `move_timer` seconds at each end:
//!
//!   Idle --(elapsed >= move_timer)--> MovingToEnd   (if at start)
//!                                     MovingToStart (otherwise)
//!   Moving --(within EPSILON of target on both axes)--> Idle
//!
//! Touching the player deals `|enemy.strength - player.strength|` damage and
//! snaps the enemy back to its start, idle, whatever it was doing.

use fw_core::vector::{approx_eq, axis_direction, step_towards, EPSILON};
use fw_core::Vector;
use fw_render::{Camera2D, Canvas};

use crate::entity::{Body, Collider, EntityBehavior, EntityContext, EntityEvent, Other, TickContext};

const MAX_ID_LEN: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyDirection {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnemyState {
    Idle,
    MovingToEnd,
    MovingToStart,
}

/// Everything needed to place one enemy in a level.
#[derive(Debug, Clone, PartialEq)]
pub struct EnemySpawn {
    pub id: String,
    pub index: usize,
    pub size: Vector,
    pub start_position: Vector,
    pub end_position: Vector,
    pub move_timer: f32,
    pub speed: f32,
    pub attack_timer: f32,
    pub strength: f32,
    pub health: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnemyContext {
    pub id: String,
    pub index: usize,
    pub size: Vector,
    pub start_position: Vector,
    pub end_position: Vector,
    pub move_timer: f32,
    pub elapsed_move_timer: f32,
    pub speed: f32,
    pub attack_timer: f32,
    pub elapsed_attack_timer: f32,
    pub strength: f32,
    pub health: f32,
    pub direction: EnemyDirection,
    pub state: EnemyState,
    pub radius: f32,
    pub sprite_right: String,
    pub sprite_left: String,
}

impl EnemyContext {
    pub fn from_spawn(spawn: &EnemySpawn) -> Self {
        let id: String = spawn.id.chars().take(MAX_ID_LEN).collect();
        let direction = if spawn.start_position.x < spawn.end_position.x {
            EnemyDirection::Right
        } else {
            EnemyDirection::Left
        };
        let state = if spawn.start_position != spawn.end_position {
            EnemyState::MovingToEnd
        } else {
            EnemyState::Idle
        };
        Self {
            sprite_right: format!("{id}_right.fxbm"),
            sprite_left: format!("{id}_left.fxbm"),
            id,
            index: spawn.index,
            size: spawn.size,
            start_position: spawn.start_position,
            end_position: spawn.end_position,
            move_timer: spawn.move_timer,
            elapsed_move_timer: 0.0,
            speed: spawn.speed,
            attack_timer: spawn.attack_timer,
            elapsed_attack_timer: 0.0,
            strength: spawn.strength,
            health: spawn.health,
            direction,
            state,
            radius: (spawn.size.x + spawn.size.y) / 4.0,
        }
    }

    pub fn sprite(&self) -> &str {
        match self.direction {
            EnemyDirection::Left => &self.sprite_left,
            EnemyDirection::Right => &self.sprite_right,
        }
    }

    /// Where the current movement is headed; `None` while idle.
    pub fn target(&self) -> Option<Vector> {
        match self.state {
            EnemyState::Idle => None,
            EnemyState::MovingToEnd => Some(self.end_position),
            EnemyState::MovingToStart => Some(self.start_position),
        }
    }

    /// Advance the patrol by `dt` seconds from `position`; returns the new position.
    pub fn step(&mut self, position: Vector, dt: f32) -> Vector {
        match self.target() {
            None => {
                self.elapsed_move_timer += dt;
                if self.elapsed_move_timer >= self.move_timer {
                    self.state = if approx_eq(position, self.start_position, EPSILON) {
                        EnemyState::MovingToEnd
                    } else {
                        EnemyState::MovingToStart
                    };
                    self.elapsed_move_timer = 0.0;
                    log::debug!("Enemy {} transitioning to {:?}", self.id, self.state);
                }
                position
            }
            Some(target) => {
                if position.x < target.x {
                    self.direction = EnemyDirection::Right;
                } else if position.x > target.x {
                    self.direction = EnemyDirection::Left;
                }
                let heading = axis_direction(position, target);
                let next = step_towards(position, target, heading, self.speed * dt);
                if approx_eq(next, target, EPSILON) {
                    self.state = EnemyState::Idle;
                    self.elapsed_move_timer = 0.0;
                    log::debug!("Enemy {} reached target, idle", self.id);
                }
                next
            }
        }
    }

    /// Whether `other` is on the side this enemy is facing.
    pub fn is_facing(&self, own: Vector, other: Vector) -> bool {
        match self.direction {
            EnemyDirection::Left => other.x < own.x,
            EnemyDirection::Right => other.x > own.x,
        }
    }

    /// Subtract `amount` from health; true if this killed the enemy.
    pub fn take_damage(&mut self, amount: f32) -> bool {
        let was_alive = self.health > 0.0;
        self.health -= amount.max(0.0);
        was_alive && self.health <= 0.0
    }

    /// XP granted to the player for defeating this enemy.
    pub fn xp_reward(&self) -> u32 {
        (self.strength.round().max(1.0)) as u32
    }

    fn reset_to_start(&mut self, body: &mut Body) {
        body.position = self.start_position;
        self.state = EnemyState::Idle;
        self.elapsed_move_timer = 0.0;
    }
}

impl EntityBehavior for EnemyContext {
    fn start(&mut self, body: &mut Body) {
        body.position = self.start_position;
        body.collider = Some(Collider::Circle {
            radius: self.radius,
        });
    }

    fn update(&mut self, body: &mut Body, tick: &mut TickContext<'_>) {
        self.elapsed_attack_timer += tick.dt;
        body.position = self.step(body.position, tick.dt);
    }

    fn collision(&mut self, body: &mut Body, other: Other<'_>) {
        let EntityContext::Player(player) = &mut *other.context else {
            return;
        };
        let damage = (self.strength - player.strength as f32).abs();
        let dealt = player.apply_damage(damage);
        log::info!("Player took {dealt} damage from enemy '{}'", self.id);

        if self.is_facing(body.position, other.body.position) {
            log::info!("Enemy '{}' attacked the player", self.id);
        }

        self.reset_to_start(body);
        log::debug!("Enemy '{}' reset to start after collision", self.id);
    }

    fn render(&self, body: &Body, canvas: &mut dyn Canvas, camera: &Camera2D) {
        if !camera.is_visible(body.position, self.size) {
            return;
        }
        let top_left = camera.world_to_screen(body.position - self.size / 2.0);
        canvas.draw_sprite(self.sprite(), top_left, self.size);
    }

    fn event(&mut self, body: &mut Body, event: &EntityEvent) {
        if let EntityEvent::Damaged { amount } = *event {
            if self.take_damage(amount) {
                log::info!("Enemy '{}' defeated", self.id);
                body.alive = false;
            }
        }
    }

    fn stop(&mut self, _body: &mut Body) {
        log::debug!("Enemy '{}' #{} removed", self.id, self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{collide_pair, Entity};
    use crate::player::{PlayerContext, PlayerState};

    fn spawn(start: Vector, end: Vector) -> EnemySpawn {
        EnemySpawn {
            id: "goblin".to_string(),
            index: 0,
            size: Vector::new(10.0, 10.0),
            start_position: start,
            end_position: end,
            move_timer: 1.0,
            speed: 32.0,
            attack_timer: 0.5,
            strength: 10.0,
            health: 100.0,
        }
    }

    #[test]
    fn factory_sets_radius_sprites_and_initial_state() {
        let enemy = EnemyContext::from_spawn(&spawn(Vector::new(10.0, 0.0), Vector::new(0.0, 0.0)));
        assert_eq!(enemy.radius, 5.0);
        assert_eq!(enemy.state, EnemyState::MovingToEnd);
        assert_eq!(enemy.direction, EnemyDirection::Left);
        assert_eq!(enemy.sprite(), "goblin_left.fxbm");

        let still = EnemyContext::from_spawn(&spawn(Vector::ONE, Vector::ONE));
        assert_eq!(still.state, EnemyState::Idle);
    }

    #[test]
    fn long_ids_are_truncated() {
        let mut s = spawn(Vector::ZERO, Vector::ONE);
        s.id = "x".repeat(100);
        assert_eq!(EnemyContext::from_spawn(&s).id.len(), 63);
    }

    #[test]
    fn moving_never_leaves_patrol_box() {
        let start = Vector::new(203.0, 112.0);
        let end = Vector::new(181.0, 140.0);
        let mut enemy = EnemyContext::from_spawn(&spawn(start, end));
        let (lo, hi) = (start.min(end), start.max(end));
        let mut pos = start;
        let dt = 1.0 / 30.0;
        for _ in 0..600 {
            let moving = enemy.state != EnemyState::Idle;
            pos = enemy.step(pos, dt);
            if moving {
                assert!(pos.x >= lo.x && pos.y >= lo.y, "undershoot at {pos:?}");
                assert!(pos.x <= hi.x && pos.y <= hi.y, "overshoot at {pos:?}");
            }
        }
    }

    #[test]
    fn huge_step_lands_exactly_on_target() {
        let mut enemy = EnemyContext::from_spawn(&spawn(Vector::ZERO, Vector::new(5.0, 0.0)));
        enemy.speed = 1000.0;
        let pos = enemy.step(Vector::ZERO, 1.0);
        assert_eq!(pos, Vector::new(5.0, 0.0));
        assert_eq!(enemy.state, EnemyState::Idle);
        assert_eq!(enemy.elapsed_move_timer, 0.0);
    }

    #[test]
    fn idle_at_start_heads_to_end() {
        let start = Vector::new(50.0, 50.0);
        let mut enemy = EnemyContext::from_spawn(&spawn(start, Vector::new(80.0, 50.0)));
        enemy.state = EnemyState::Idle;
        let near_start = start + Vector::new(0.05, -0.05);
        let pos = enemy.step(near_start, 1.0);
        assert_eq!(pos, near_start);
        assert_eq!(enemy.state, EnemyState::MovingToEnd);
        assert_eq!(enemy.elapsed_move_timer, 0.0);
    }

    #[test]
    fn idle_away_from_start_heads_back() {
        let mut enemy = EnemyContext::from_spawn(&spawn(Vector::ZERO, Vector::new(30.0, 0.0)));
        enemy.state = EnemyState::Idle;
        enemy.step(Vector::new(30.0, 0.0), 0.5);
        assert_eq!(enemy.state, EnemyState::Idle);
        enemy.step(Vector::new(30.0, 0.0), 0.5);
        assert_eq!(enemy.state, EnemyState::MovingToStart);
    }

    #[test]
    fn direction_follows_horizontal_motion() {
        let mut enemy = EnemyContext::from_spawn(&spawn(Vector::ZERO, Vector::new(30.0, 0.0)));
        enemy.step(Vector::ZERO, 0.1);
        assert_eq!(enemy.direction, EnemyDirection::Right);
        enemy.state = EnemyState::MovingToStart;
        enemy.step(Vector::new(20.0, 0.0), 0.1);
        assert_eq!(enemy.direction, EnemyDirection::Left);
    }

    fn collide(enemy_ctx: EnemyContext, player_ctx: PlayerContext) -> (Entity, Entity) {
        let mut enemy = Entity::new(1, Vector::ZERO, EntityContext::Enemy(Box::new(enemy_ctx)));
        enemy.start();
        // Walk part way so the reset is observable.
        enemy.body.position += Vector::new(-4.0, 0.0);
        let mut player = Entity::new(2, enemy.body.position, EntityContext::Player(Box::new(player_ctx)));
        player.start();
        assert!(collide_pair(&mut enemy, &mut player));
        (enemy, player)
    }

    #[test]
    fn equal_strength_collision_deals_no_damage_but_resets_enemy() {
        let start = Vector::new(203.0, 112.0);
        let enemy_ctx = EnemyContext::from_spawn(&spawn(start, Vector::new(181.0, 112.0)));
        let player_ctx = PlayerContext::default();
        let (enemy, player) = collide(enemy_ctx, player_ctx);

        let p = player.context.as_player().expect("player");
        assert_eq!(p.health, 100);
        let e = enemy.context.as_enemy().expect("enemy");
        assert_eq!(enemy.body.position, start);
        assert_eq!(e.state, EnemyState::Idle);
        assert_eq!(e.elapsed_move_timer, 0.0);
    }

    #[test]
    fn stronger_enemy_hurts_player() {
        let mut s = spawn(Vector::new(50.0, 50.0), Vector::new(20.0, 50.0));
        s.strength = 25.0;
        let (_, player) = collide(EnemyContext::from_spawn(&s), PlayerContext::default());
        let p = player.context.as_player().expect("player");
        assert_eq!(p.health, 85);
        assert_eq!(p.state, PlayerState::Attacked);
    }

    #[test]
    fn lethal_damage_kills_enemy_once() {
        let mut body = Body::at(Vector::ZERO);
        let mut enemy = EnemyContext::from_spawn(&spawn(Vector::ZERO, Vector::ONE));
        enemy.event(&mut body, &EntityEvent::Damaged { amount: 60.0 });
        assert!(body.alive);
        enemy.event(&mut body, &EntityEvent::Damaged { amount: 60.0 });
        assert!(!body.alive);
        assert!(!enemy.take_damage(10.0));
        assert_eq!(enemy.xp_reward(), 10);
    }
}
