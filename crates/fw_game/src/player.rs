//! The player: movement, combat stats and persisted progression.

use fw_core::{GameKey, Vector};
use fw_platform::storage::{
    load_f32, load_i8, load_string, load_u32, save_f32, save_i8, save_u32,
};
use fw_platform::{Storage, StorageError};
use fw_render::{Camera2D, Canvas, TextAlign};

use crate::entity::{Body, Collider, Command, EntityBehavior, EntityEvent, TickContext};
use crate::world::WORLD_SIZE;

/// Pixels moved per tick per held direction.
pub const PLAYER_STEP: f32 = 2.0;
/// Distance kept from the world edge.
pub const WORLD_MARGIN: f32 = 5.0;
pub const PLAYER_SIZE: f32 = 10.0;
const COLLISION_PADDING: f32 = 2.0;

pub const NEXT_LEVEL_SETTLE: f32 = 0.5;
pub const ATTACK_SETTLE: f32 = 0.1;
const HEALTH_REGEN_INTERVAL: f32 = 1.0;
/// XP needed per level: `XP_PER_LEVEL * level`.
const XP_PER_LEVEL: u32 = 100;
const MAX_USERNAME_LEN: usize = 31;

pub const SPRITE_RIGHT: &str = "player_right.fxbm";
pub const SPRITE_LEFT: &str = "player_left.fxbm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerDirection {
    Up,
    Down,
    Left,
    Right,
}

impl PlayerDirection {
    pub fn code(self) -> u32 {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Left => 2,
            Self::Right => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::Left),
            3 => Some(Self::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Moving,
    Attacking,
    Attacked,
    Dead,
}

impl PlayerState {
    pub fn code(self) -> u32 {
        match self {
            Self::Idle => 0,
            Self::Moving => 1,
            Self::Attacking => 2,
            Self::Attacked => 3,
            Self::Dead => 4,
        }
    }

    /// 5 is the persisted "unknown" marker; it and anything larger map to `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Idle),
            1 => Some(Self::Moving),
            2 => Some(Self::Attacking),
            3 => Some(Self::Attacked),
            4 => Some(Self::Dead),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerContext {
    pub old_position: Vector,
    pub direction: PlayerDirection,
    pub state: PlayerState,
    pub start_position: Vector,
    pub dx: i8,
    pub dy: i8,
    pub xp: u32,
    pub level: u32,
    pub strength: u32,
    pub health: u32,
    pub max_health: u32,
    pub health_regen: u32,
    pub elapsed_health_regen: f32,
    pub attack_timer: f32,
    pub elapsed_attack_timer: f32,
    pub username: String,
}

impl Default for PlayerContext {
    fn default() -> Self {
        let center = WORLD_SIZE / 2.0;
        Self {
            old_position: center,
            direction: PlayerDirection::Right,
            state: PlayerState::Idle,
            start_position: center,
            dx: 1,
            dy: 0,
            xp: 0,
            level: 1,
            strength: 10,
            health: 100,
            max_health: 100,
            health_regen: 1,
            elapsed_health_regen: 0.0,
            attack_timer: 0.1,
            elapsed_attack_timer: 0.0,
            username: "Unknown".to_string(),
        }
    }
}

mod keys {
    pub const USERNAME: &str = "player/username";
    pub const LEVEL: &str = "player/level";
    pub const XP: &str = "player/xp";
    pub const HEALTH: &str = "player/health";
    pub const STRENGTH: &str = "player/strength";
    pub const MAX_HEALTH: &str = "player/max_health";
    pub const HEALTH_REGEN: &str = "player/health_regen";
    pub const ELAPSED_HEALTH_REGEN: &str = "player/elapsed_health_regen";
    pub const ATTACK_TIMER: &str = "player/attack_timer";
    pub const ELAPSED_ATTACK_TIMER: &str = "player/elapsed_attack_timer";
    pub const DIRECTION: &str = "player/direction";
    pub const STATE: &str = "player/state";
    pub const START_X: &str = "player/start_position_x";
    pub const START_Y: &str = "player/start_position_y";
    pub const DX: &str = "player/dx";
    pub const DY: &str = "player/dy";
}

fn or_default<T>(key: &str, loaded: Result<T, StorageError>, default: T) -> T {
    match loaded {
        Ok(value) => value,
        Err(StorageError::NotFound(_)) => {
            log::debug!("No saved value for {key}, using default");
            default
        }
        Err(e) => {
            log::warn!("Failed to load {key}: {e}; using default");
            default
        }
    }
}

impl PlayerContext {
    /// Load progression from `store`. Every field falls back to its default
    /// independently when missing or unparsable.
    pub fn load(store: &dyn Storage) -> Self {
        let d = Self::default();
        let username = or_default(keys::USERNAME, load_string(store, keys::USERNAME), d.username.clone());

        let direction_code = or_default(keys::DIRECTION, load_u32(store, keys::DIRECTION), d.direction.code());
        let direction = PlayerDirection::from_code(direction_code).unwrap_or_else(|| {
            log::warn!("Invalid player direction {direction_code}, using default");
            d.direction
        });
        let state_code = or_default(keys::STATE, load_u32(store, keys::STATE), d.state.code());
        let state = PlayerState::from_code(state_code).unwrap_or(d.state);

        let unit = |key: &str, value: i8, default: i8| {
            if (-1..=1).contains(&value) {
                value
            } else {
                log::warn!("{key} out of range ({value}), using default");
                default
            }
        };
        let dx = or_default(keys::DX, load_i8(store, keys::DX), d.dx);
        let dy = or_default(keys::DY, load_i8(store, keys::DY), d.dy);

        let start_position = Vector::new(
            or_default(keys::START_X, load_f32(store, keys::START_X), d.start_position.x),
            or_default(keys::START_Y, load_f32(store, keys::START_Y), d.start_position.y),
        );

        let mut player = Self {
            old_position: start_position,
            direction,
            state,
            start_position,
            dx: unit(keys::DX, dx, d.dx),
            dy: unit(keys::DY, dy, d.dy),
            xp: or_default(keys::XP, load_u32(store, keys::XP), d.xp),
            level: or_default(keys::LEVEL, load_u32(store, keys::LEVEL), d.level).max(1),
            strength: or_default(keys::STRENGTH, load_u32(store, keys::STRENGTH), d.strength),
            health: or_default(keys::HEALTH, load_u32(store, keys::HEALTH), d.health),
            max_health: or_default(keys::MAX_HEALTH, load_u32(store, keys::MAX_HEALTH), d.max_health).max(1),
            health_regen: or_default(keys::HEALTH_REGEN, load_u32(store, keys::HEALTH_REGEN), d.health_regen),
            elapsed_health_regen: or_default(
                keys::ELAPSED_HEALTH_REGEN,
                load_f32(store, keys::ELAPSED_HEALTH_REGEN),
                d.elapsed_health_regen,
            ),
            attack_timer: or_default(keys::ATTACK_TIMER, load_f32(store, keys::ATTACK_TIMER), d.attack_timer),
            elapsed_attack_timer: or_default(
                keys::ELAPSED_ATTACK_TIMER,
                load_f32(store, keys::ELAPSED_ATTACK_TIMER),
                d.elapsed_attack_timer,
            ),
            username: String::new(),
        };
        player.set_username(&username);
        player.health = player.health.min(player.max_health);
        if player.health == 0 {
            player.state = PlayerState::Dead;
        }
        player
    }

    pub fn save(&self, store: &mut dyn Storage) -> Result<(), StorageError> {
        store.save(keys::USERNAME, &self.username)?;
        save_u32(store, keys::LEVEL, self.level)?;
        save_u32(store, keys::XP, self.xp)?;
        save_u32(store, keys::HEALTH, self.health)?;
        save_u32(store, keys::STRENGTH, self.strength)?;
        save_u32(store, keys::MAX_HEALTH, self.max_health)?;
        save_u32(store, keys::HEALTH_REGEN, self.health_regen)?;
        save_f32(store, keys::ELAPSED_HEALTH_REGEN, self.elapsed_health_regen)?;
        save_f32(store, keys::ATTACK_TIMER, self.attack_timer)?;
        save_f32(store, keys::ELAPSED_ATTACK_TIMER, self.elapsed_attack_timer)?;
        save_u32(store, keys::DIRECTION, self.direction.code())?;
        save_u32(store, keys::STATE, self.state.code())?;
        save_f32(store, keys::START_X, self.start_position.x)?;
        save_f32(store, keys::START_Y, self.start_position.y)?;
        save_i8(store, keys::DX, self.dx)?;
        save_i8(store, keys::DY, self.dy)?;
        Ok(())
    }

    pub fn set_username(&mut self, name: &str) {
        self.username = name.chars().take(MAX_USERNAME_LEN).collect();
    }

    pub fn is_dead(&self) -> bool {
        self.state == PlayerState::Dead
    }

    pub fn sprite(&self) -> &'static str {
        if self.direction == PlayerDirection::Right {
            SPRITE_RIGHT
        } else {
            SPRITE_LEFT
        }
    }

    /// Health is clamped at zero; reaching it kills the player.
    /// Returns the damage actually taken.
    pub fn apply_damage(&mut self, amount: f32) -> u32 {
        if self.is_dead() {
            return 0;
        }
        let dealt = (amount.max(0.0).round() as u32).min(self.health);
        self.health -= dealt;
        if self.health == 0 {
            self.state = PlayerState::Dead;
            log::info!("Player '{}' died", self.username);
        } else if dealt > 0 {
            self.state = PlayerState::Attacked;
        }
        dealt
    }

    /// Add XP, levelling up as many times as it covers. True if the level changed.
    pub fn gain_xp(&mut self, amount: u32) -> bool {
        self.xp = self.xp.saturating_add(amount);
        let mut levelled = false;
        while self.xp >= XP_PER_LEVEL.saturating_mul(self.level) {
            self.level += 1;
            self.strength += 1;
            self.max_health += 10;
            self.health = self.max_health;
            levelled = true;
            log::info!("Player '{}' reached level {}", self.username, self.level);
        }
        levelled
    }

    /// Start an attack if the cooldown has elapsed.
    pub fn begin_attack(&mut self) -> bool {
        if self.is_dead() || self.elapsed_attack_timer < self.attack_timer {
            return false;
        }
        self.elapsed_attack_timer = 0.0;
        self.state = PlayerState::Attacking;
        true
    }

    /// Whether `target` lies on the side the player is facing.
    pub fn faces(&self, own: Vector, target: Vector) -> bool {
        match self.direction {
            PlayerDirection::Up => target.y <= own.y,
            PlayerDirection::Down => target.y >= own.y,
            PlayerDirection::Left => target.x <= own.x,
            PlayerDirection::Right => target.x >= own.x,
        }
    }

    pub fn revive(&mut self) {
        self.health = self.max_health;
        self.state = PlayerState::Idle;
        self.elapsed_health_regen = 0.0;
    }

    fn regenerate(&mut self, dt: f32) {
        if self.health >= self.max_health {
            self.elapsed_health_regen = 0.0;
            return;
        }
        self.elapsed_health_regen += dt;
        if self.elapsed_health_regen >= HEALTH_REGEN_INTERVAL {
            self.elapsed_health_regen -= HEALTH_REGEN_INTERVAL;
            self.health = self
                .health
                .saturating_add(self.health_regen)
                .min(self.max_health);
        }
    }
}

impl EntityBehavior for PlayerContext {
    fn start(&mut self, body: &mut Body) {
        self.old_position = body.position;
        body.collider = Some(Collider::Rect {
            half_extents: Vector::splat((PLAYER_SIZE + COLLISION_PADDING) / 2.0),
        });
    }

    fn update(&mut self, body: &mut Body, tick: &mut TickContext<'_>) {
        let input = tick.input;
        if self.is_dead() {
            if input.is_just_pressed(GameKey::Back) {
                tick.queue(Command::StopSession);
            }
            return;
        }

        self.elapsed_attack_timer += tick.dt;
        self.regenerate(tick.dt);
        self.old_position = body.position;

        let (prev_dx, prev_dy) = (self.dx, self.dy);
        self.dx = 0;
        self.dy = 0;

        // Evaluated in a fixed order; with several keys held the last one sets the facing.
        let mut pos = body.position;
        if input.is_held(GameKey::Up) {
            pos.y -= PLAYER_STEP;
            self.dy = -1;
            self.direction = PlayerDirection::Up;
        }
        if input.is_held(GameKey::Down) {
            pos.y += PLAYER_STEP;
            self.dy = 1;
            self.direction = PlayerDirection::Down;
        }
        if input.is_held(GameKey::Left) {
            pos.x -= PLAYER_STEP;
            self.dx = -1;
            self.direction = PlayerDirection::Left;
        }
        if input.is_held(GameKey::Right) {
            pos.x += PLAYER_STEP;
            self.dx = 1;
            self.direction = PlayerDirection::Right;
        }
        pos.x = pos.x.clamp(WORLD_MARGIN, WORLD_SIZE.x - WORLD_MARGIN);
        pos.y = pos.y.clamp(WORLD_MARGIN, WORLD_SIZE.y - WORLD_MARGIN);
        body.position = pos;

        if input.is_just_pressed(GameKey::Back) {
            tick.queue(Command::StopSession);
        }

        if input.is_held(GameKey::Ok) {
            if tick.enemy_count == 0 {
                tick.queue(Command::NextLevel);
                tick.request_settle(NEXT_LEVEL_SETTLE);
            } else {
                tick.queue(Command::Attack);
                tick.request_settle(ATTACK_SETTLE);
            }
            return;
        }

        if self.dx == 0 && self.dy == 0 {
            self.dx = prev_dx;
            self.dy = prev_dy;
            self.state = PlayerState::Idle;
        } else {
            self.state = PlayerState::Moving;
        }
    }

    fn render(&self, body: &Body, canvas: &mut dyn Canvas, camera: &Camera2D) {
        canvas.draw_frame(camera.world_to_screen(Vector::ZERO), WORLD_SIZE);

        let screen = camera.world_to_screen(body.position);
        let half = Vector::splat(PLAYER_SIZE / 2.0);
        canvas.draw_sprite(self.sprite(), screen - half, Vector::splat(PLAYER_SIZE));
        canvas.draw_str(
            &self.username,
            screen - Vector::new(0.0, half.y + 2.0),
            TextAlign::Center,
        );
    }

    fn event(&mut self, body: &mut Body, event: &EntityEvent) {
        if let EntityEvent::LevelChanged { index } = *event {
            self.old_position = body.position;
            if !self.is_dead() {
                self.state = PlayerState::Idle;
            }
            log::info!("Player '{}' entered level {index}", self.username);
        }
    }

    fn stop(&mut self, _body: &mut Body) {
        log::debug!("Player '{}' removed from level", self.username);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fw_core::{FpsChoice, InputState};
    use fw_platform::MemoryStore;
    use fw_render::RecordingCanvas;

    const DT: f32 = 1.0 / 30.0;

    fn tick_with(player: &mut PlayerContext, body: &mut Body, keys: &[GameKey], enemies: usize) -> Vec<Command> {
        let input = InputState::with_held(keys);
        let mut tick = TickContext::new(&input, DT, enemies);
        player.update(body, &mut tick);
        tick.into_commands()
    }

    #[test]
    fn up_and_right_in_one_tick_apply_both_deltas() {
        let mut player = PlayerContext::default();
        let mut body = Body::at(Vector::new(100.0, 100.0));
        tick_with(&mut player, &mut body, &[GameKey::Up, GameKey::Right], 1);
        assert_eq!(body.position, Vector::new(102.0, 98.0));
        assert_eq!(player.direction, PlayerDirection::Right);
        assert_eq!((player.dx, player.dy), (1, -1));
        assert_eq!(player.state, PlayerState::Moving);
        assert_eq!(player.old_position, Vector::new(100.0, 100.0));
    }

    #[test]
    fn up_and_down_cancel_but_down_sets_facing() {
        let mut player = PlayerContext::default();
        let mut body = Body::at(Vector::new(100.0, 100.0));
        tick_with(&mut player, &mut body, &[GameKey::Up, GameKey::Down], 1);
        assert_eq!(body.position, Vector::new(100.0, 100.0));
        assert_eq!(player.direction, PlayerDirection::Down);
        assert_eq!(player.dy, 1);
    }

    #[test]
    fn idle_player_keeps_previous_heading() {
        let mut player = PlayerContext::default();
        let mut body = Body::at(Vector::new(100.0, 100.0));
        tick_with(&mut player, &mut body, &[GameKey::Left], 1);
        tick_with(&mut player, &mut body, &[], 1);
        assert_eq!((player.dx, player.dy), (-1, 0));
        assert_eq!(player.state, PlayerState::Idle);
    }

    #[test]
    fn position_is_clamped_to_world_margin() {
        let mut player = PlayerContext::default();
        let mut body = Body::at(Vector::new(5.5, 190.0));
        tick_with(&mut player, &mut body, &[GameKey::Left, GameKey::Down], 1);
        assert_eq!(body.position, Vector::new(5.0, 187.0));
    }

    #[test]
    fn confirm_without_enemies_queues_next_level() {
        let mut player = PlayerContext::default();
        let mut body = Body::at(Vector::new(100.0, 100.0));
        let input = InputState::with_held(&[GameKey::Ok]);
        let mut tick = TickContext::new(&input, DT, 0);
        player.update(&mut body, &mut tick);
        assert_eq!(tick.settle(), NEXT_LEVEL_SETTLE);
        assert_eq!(tick.into_commands(), vec![Command::NextLevel]);
    }

    #[test]
    fn confirm_with_enemies_queues_attack() {
        let mut player = PlayerContext::default();
        let mut body = Body::at(Vector::new(100.0, 100.0));
        let commands = tick_with(&mut player, &mut body, &[GameKey::Ok], 2);
        assert_eq!(commands, vec![Command::Attack]);
    }

    #[test]
    fn back_press_stops_session() {
        let mut player = PlayerContext::default();
        let mut body = Body::at(Vector::new(100.0, 100.0));
        let commands = tick_with(&mut player, &mut body, &[GameKey::Back], 1);
        assert_eq!(commands, vec![Command::StopSession]);
    }

    #[test]
    fn back_still_stops_session_while_confirm_is_held() {
        let mut player = PlayerContext::default();
        let mut body = Body::at(Vector::new(100.0, 100.0));
        let commands = tick_with(&mut player, &mut body, &[GameKey::Ok, GameKey::Back], 2);
        assert_eq!(commands, vec![Command::StopSession, Command::Attack]);

        let commands = tick_with(&mut player, &mut body, &[GameKey::Back, GameKey::Ok], 0);
        assert_eq!(commands, vec![Command::StopSession, Command::NextLevel]);
    }

    #[test]
    fn dead_player_cannot_move() {
        let mut player = PlayerContext::default();
        player.apply_damage(500.0);
        assert!(player.is_dead());
        assert_eq!(player.health, 0);
        let mut body = Body::at(Vector::new(100.0, 100.0));
        tick_with(&mut player, &mut body, &[GameKey::Right], 1);
        assert_eq!(body.position, Vector::new(100.0, 100.0));
    }

    #[test]
    fn health_regenerates_once_per_second_up_to_max() {
        let mut player = PlayerContext::default();
        player.health = 98;
        player.health_regen = 5;
        let mut body = Body::at(Vector::new(100.0, 100.0));
        for _ in 0..29 {
            tick_with(&mut player, &mut body, &[], 1);
        }
        assert_eq!(player.health, 98);
        tick_with(&mut player, &mut body, &[], 1);
        tick_with(&mut player, &mut body, &[], 1);
        assert_eq!(player.health, 100);
    }

    #[test]
    fn attack_respects_cooldown() {
        let mut player = PlayerContext::default();
        player.attack_timer = 0.5;
        assert!(!player.begin_attack());
        player.elapsed_attack_timer = 0.5;
        assert!(player.begin_attack());
        assert_eq!(player.state, PlayerState::Attacking);
        assert!(!player.begin_attack());
    }

    #[test]
    fn xp_levels_up_and_heals() {
        let mut player = PlayerContext::default();
        player.health = 40;
        assert!(!player.gain_xp(99));
        assert!(player.gain_xp(1));
        assert_eq!(player.level, 2);
        assert_eq!(player.strength, 11);
        assert_eq!(player.max_health, 110);
        assert_eq!(player.health, 110);
        assert!(player.gain_xp(300));
        assert_eq!(player.level, 4);
    }

    #[test]
    fn save_then_load_round_trips_every_field() {
        let mut store = MemoryStore::new();
        let player = PlayerContext {
            old_position: Vector::new(40.0, 50.0),
            direction: PlayerDirection::Left,
            state: PlayerState::Attacked,
            start_position: Vector::new(120.5, 64.25),
            dx: -1,
            dy: 1,
            xp: 250,
            level: 3,
            strength: 12,
            health: 77,
            max_health: 120,
            health_regen: 2,
            elapsed_health_regen: 0.25,
            attack_timer: 0.1,
            elapsed_attack_timer: 1.5,
            username: "ada".to_string(),
        };
        player.save(&mut store).expect("save player");
        let loaded = PlayerContext::load(&store);
        assert_eq!(
            loaded,
            PlayerContext {
                old_position: player.start_position,
                ..player
            }
        );
    }

    #[test]
    fn tick_accumulated_timers_survive_save_and_load() {
        let mut store = MemoryStore::new();
        let dt = FpsChoice::Fps30.frame_dt();
        let mut player = PlayerContext {
            elapsed_attack_timer: dt,
            ..PlayerContext::default()
        };
        for _ in 0..22 {
            player.elapsed_health_regen += dt;
        }
        player.save(&mut store).expect("save player");
        let loaded = PlayerContext::load(&store);
        assert_eq!(loaded.elapsed_attack_timer, dt);
        assert_eq!(loaded.elapsed_health_regen, player.elapsed_health_regen);
    }

    #[test]
    fn every_enum_code_round_trips() {
        for code in 0..4 {
            let direction = PlayerDirection::from_code(code).expect("valid direction");
            assert_eq!(direction.code(), code);
        }
        for code in 0..5 {
            let state = PlayerState::from_code(code).expect("valid state");
            assert_eq!(state.code(), code);
        }
        assert_eq!(PlayerState::from_code(5), None);
    }

    #[test]
    fn missing_or_garbage_fields_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.save("player/level", "banana").expect("save");
        store.save("player/state", "5").expect("save");
        store.save("player/dx", "7").expect("save");
        let loaded = PlayerContext::load(&store);
        assert_eq!(loaded, PlayerContext::default());
    }

    #[test]
    fn render_draws_background_sprite_and_centered_name() {
        let player = PlayerContext {
            username: "ada".to_string(),
            ..PlayerContext::default()
        };
        let body = Body::at(Vector::new(192.0, 96.0));
        let mut camera = Camera2D::new(128, 64);
        camera.follow(body.position, WORLD_SIZE);
        let mut canvas = RecordingCanvas::default();
        player.render(&body, &mut canvas, &camera);

        assert_eq!(
            canvas.sprites().collect::<Vec<_>>(),
            vec![(SPRITE_RIGHT, Vector::new(59.0, 27.0))]
        );
        assert_eq!(canvas.texts().collect::<Vec<_>>(), vec!["ada"]);
        assert!(matches!(
            canvas.commands.first(),
            Some(fw_render::DrawCommand::Frame { .. })
        ));
    }
}
