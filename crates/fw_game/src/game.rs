//! Game driver: owns one play session's world state and runs a frame.
//!
//! `on_frame` is the whole frame contract:
//!
//!   1. settle period / menu input
//!   2. update every entity
//!   3. pairwise collisions
//!   4. camera follows the player; a dead player opens the menu
//!   5. clear + render entities, then the debug overlay
//!   6. apply queued commands (next level, attack, stop)
//!   7. sweep dead entities
//!
//! Level switches and attacks only happen in step 6, after the frame's
//! entities have all been updated and drawn.

use fw_core::{FpsChoice, GameKey, InputState, TimeState, Vector};
use fw_devtools::{DebugOverlay, OverlayStats};
use fw_platform::storage::load_string;
use fw_platform::Storage;
use fw_render::{Camera2D, Canvas, TextAlign};

use crate::account::USERNAME_KEY;
use crate::entity::{Command, EntityContext, EntityEvent, EntityId, TickContext};
use crate::level::{Level, LevelContext};
use crate::player::PlayerContext;
use crate::world::{parse_world_list, WorldLoader, WorldSource, DEFAULT_WORLD_ID, WORLD_LIST_PATH, WORLD_SIZE};

/// Base attack reach, added to the target's radius.
const ATTACK_REACH: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MenuScreen {
    #[default]
    Info,
    More,
}

impl MenuScreen {
    fn toggled(self) -> Self {
        match self {
            Self::Info => Self::More,
            Self::More => Self::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MenuState {
    pub open: bool,
    pub screen: MenuScreen,
}

#[derive(Debug, Clone, Default)]
pub struct GameOptions {
    pub fps: FpsChoice,
    pub show_fps: bool,
    pub imu_present: bool,
    /// Overrides the stored username when set.
    pub username: Option<String>,
}

pub struct GameManager {
    levels: Vec<LevelContext>,
    current_level: usize,
    level: Option<Level>,
    store: Box<dyn Storage>,
    source: Box<dyn WorldSource>,
    camera: Camera2D,
    overlay: DebugOverlay,
    time: TimeState,
    fps: FpsChoice,
    settle_remaining: f32,
    menu: MenuState,
    imu_present: bool,
    stopped: bool,
    frame_count: u64,
}

impl GameManager {
    pub fn new(store: Box<dyn Storage>, source: Box<dyn WorldSource>, options: GameOptions) -> Self {
        let levels = read_level_list(store.as_ref());

        let mut player = PlayerContext::load(store.as_ref());
        let stored_name = load_string(store.as_ref(), USERNAME_KEY)
            .ok()
            .filter(|name| !name.trim().is_empty());
        if let Some(name) = options.username.or(stored_name) {
            player.set_username(&name);
        }

        let mut manager = Self {
            levels,
            current_level: 0,
            level: None,
            store,
            source,
            camera: Camera2D::new(fw_render::canvas::SCREEN_WIDTH, fw_render::canvas::SCREEN_HEIGHT),
            overlay: DebugOverlay::new(options.show_fps),
            time: TimeState::new(options.fps),
            fps: options.fps,
            settle_remaining: 0.0,
            menu: MenuState::default(),
            imu_present: options.imu_present,
            stopped: false,
            frame_count: 0,
        };
        log::info!(
            "Starting game for '{}' with {} level(s) at {} fps",
            player.username,
            manager.levels.len(),
            manager.fps
        );
        manager.enter_level(0, Box::new(player));
        manager
    }

    /// Switch to level `index`. Out-of-range indices are refused and nothing changes.
    pub fn load_level_at(&mut self, index: usize) -> bool {
        if index >= self.levels.len() {
            log::warn!(
                "Level index {index} out of range ({} levels)",
                self.levels.len()
            );
            return false;
        }
        let player = match self.level.as_mut().and_then(Level::take_player) {
            Some(player) => player,
            None => {
                log::warn!("No player in current level, reloading from storage");
                Box::new(PlayerContext::load(self.store.as_ref()))
            }
        };
        self.enter_level(index, player);
        true
    }

    fn enter_level(&mut self, index: usize, player: Box<PlayerContext>) {
        // Stop the old level before the next one is built.
        self.level = None;
        let Some(context) = self.levels.get(index).cloned() else {
            log::error!("Level index {index} missing from level list");
            return;
        };
        let mut loader = WorldLoader::new(self.store.as_mut(), self.source.as_mut());
        let mut level = loader.load_level(&context, player);
        level.broadcast(&EntityEvent::LevelChanged { index });
        if let Some(player) = level.player() {
            self.camera.follow(player.body.position, WORLD_SIZE);
        }
        self.current_level = index;
        self.level = Some(level);
    }

    pub fn on_frame(&mut self, canvas: &mut dyn Canvas, input: &InputState) {
        if self.stopped {
            return;
        }
        self.frame_count += 1;
        let dt = self.fps.frame_dt();

        let quiet = InputState::new();
        let input = if self.settle_remaining > 0.0 {
            self.settle_remaining = (self.settle_remaining - dt).max(0.0);
            &quiet
        } else {
            input
        };

        if self.menu.open {
            self.menu_input(input);
            canvas.clear();
            self.draw_menu(canvas);
            return;
        }

        let Some(level) = self.level.as_mut() else {
            log::error!("Frame requested with no active level, stopping");
            self.stopped = true;
            return;
        };

        let mut tick = TickContext::new(input, dt, level.enemy_count());
        level.update(&mut tick);
        level.resolve_collisions();

        if let Some(player) = level.player() {
            self.camera.follow(player.body.position, WORLD_SIZE);
            if player.context.as_player().is_some_and(PlayerContext::is_dead) && !self.menu.open {
                self.menu = MenuState {
                    open: true,
                    screen: MenuScreen::Info,
                };
            }
        }

        canvas.clear();
        level.render(canvas, &self.camera);
        let stats = OverlayStats {
            entity_count: level.len(),
            enemy_count: level.enemy_count(),
            level_id: level.id().to_string(),
        };
        self.overlay.draw(canvas, &self.time, &stats);

        self.settle_remaining = self.settle_remaining.max(tick.settle());
        for command in tick.into_commands() {
            self.apply(command);
        }

        if let Some(level) = self.level.as_mut() {
            level.sweep();
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::NextLevel => {
                let next = (self.current_level + 1) % self.levels.len().max(1);
                log::info!("Advancing to level {next}");
                self.load_level_at(next);
            }
            Command::Attack => self.resolve_attack(),
            Command::StopSession => {
                log::info!("Stop requested by player");
                self.stopped = true;
            }
        }
    }

    /// Damage every live enemy in reach on the side the player faces.
    fn resolve_attack(&mut self) {
        let Some(level) = self.level.as_mut() else {
            return;
        };
        let targets: Vec<(EntityId, Vector, f32)> = level
            .entities()
            .iter()
            .filter(|e| e.is_alive())
            .filter_map(|e| e.context.as_enemy().map(|enemy| (e.id, e.body.position, enemy.radius)))
            .collect();

        let Some(entity) = level.player_mut() else {
            return;
        };
        let position = entity.body.position;
        let Some(player) = entity.context.as_player_mut() else {
            return;
        };
        if !player.begin_attack() {
            log::trace!("Attack still cooling down");
            return;
        }
        let strength = player.strength as f32;
        let hits: Vec<EntityId> = targets
            .into_iter()
            .filter(|&(_, at, radius)| {
                at.distance(position) <= ATTACK_REACH + radius && player.faces(position, at)
            })
            .map(|(id, _, _)| id)
            .collect();

        let mut xp = 0;
        for id in hits {
            let Some(enemy) = level.get_mut(id) else {
                continue;
            };
            enemy.event(&EntityEvent::Damaged { amount: strength });
            if !enemy.body.alive {
                xp += enemy.context.as_enemy().map_or(0, |e| e.xp_reward());
            }
        }
        if xp > 0 {
            if let Some(player) = level.player_mut().and_then(|e| e.context.as_player_mut()) {
                player.gain_xp(xp);
                log::info!("Player gained {xp} xp ({} total)", player.xp);
            }
        }
    }

    fn menu_input(&mut self, input: &InputState) {
        if input.is_just_pressed(GameKey::Left) || input.is_just_pressed(GameKey::Right) {
            self.menu.screen = self.menu.screen.toggled();
        }
        if input.is_just_pressed(GameKey::Back) {
            log::info!("Leaving game from menu");
            self.stopped = true;
            return;
        }
        if !input.is_just_pressed(GameKey::Ok) {
            return;
        }
        match self.menu.screen {
            MenuScreen::Info => {
                if let Some(entity) = self.level.as_mut().and_then(Level::player_mut) {
                    if let EntityContext::Player(player) = &mut entity.context {
                        player.revive();
                        entity.body.position = player.start_position;
                        player.old_position = player.start_position;
                        log::info!("Player '{}' revived", player.username);
                    }
                }
                self.menu.open = false;
            }
            MenuScreen::More => self.overlay.toggle(),
        }
    }

    fn draw_menu(&self, canvas: &mut dyn Canvas) {
        let mut lines = Vec::new();
        match self.menu.screen {
            MenuScreen::Info => {
                if let Some(player) = self.player() {
                    lines.push(player.username.clone());
                    lines.push(format!("Level {}  XP {}", player.level, player.xp));
                    lines.push(format!("HP {}/{}", player.health, player.max_health));
                    lines.push("OK: respawn".to_string());
                }
            }
            MenuScreen::More => {
                lines.push(format!("FPS {}", self.fps));
                lines.push(format!("Overlay {}", if self.overlay.visible { "on" } else { "off" }));
                lines.push(format!("IMU {}", if self.imu_present { "yes" } else { "no" }));
            }
        }
        let center_x = canvas.width() as f32 / 2.0;
        for (row, line) in lines.iter().enumerate() {
            canvas.draw_str(line, Vector::new(center_x, 12.0 + 12.0 * row as f32), TextAlign::Center);
        }
    }

    /// Persist the player and tear down the active level.
    pub fn shutdown(&mut self) {
        self.stopped = true;
        let Some(mut level) = self.level.take() else {
            return;
        };
        match level.take_player() {
            Some(player) => match player.save(self.store.as_mut()) {
                Ok(()) => log::info!("Saved player '{}'", player.username),
                Err(e) => log::error!("Failed to save player: {e}"),
            },
            None => log::warn!("No player to save at shutdown"),
        }
        level.clear();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    pub fn level(&self) -> Option<&Level> {
        self.level.as_ref()
    }

    #[cfg(test)]
    pub fn level_mut(&mut self) -> Option<&mut Level> {
        self.level.as_mut()
    }

    pub fn enemy_count(&self) -> usize {
        self.level.as_ref().map_or(0, Level::enemy_count)
    }

    pub fn player(&self) -> Option<&PlayerContext> {
        self.level
            .as_ref()
            .and_then(Level::player)
            .and_then(|e| e.context.as_player())
    }

    #[cfg(test)]
    pub fn menu(&self) -> MenuState {
        self.menu
    }

    #[cfg(test)]
    pub fn settle_remaining(&self) -> f32 {
        self.settle_remaining
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn time_mut(&mut self) -> &mut TimeState {
        &mut self.time
    }
}

fn read_level_list(store: &dyn Storage) -> Vec<LevelContext> {
    let levels = store
        .read_file(WORLD_LIST_PATH)
        .map_err(|e| e.to_string())
        .and_then(|text| parse_world_list(&text));
    match levels {
        Ok(levels) if !levels.is_empty() => levels,
        Ok(_) => {
            log::warn!("World list is empty, using '{DEFAULT_WORLD_ID}'");
            vec![LevelContext::new(DEFAULT_WORLD_ID, 0)]
        }
        Err(e) => {
            log::info!("{e}; using '{DEFAULT_WORLD_ID}'");
            vec![LevelContext::new(DEFAULT_WORLD_ID, 0)]
        }
    }
}
