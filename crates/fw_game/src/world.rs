//! World descriptions: cache layout, payload splitting, parsing, and the
//! level loader that turns a world id into a populated `Level`.
//!
//! A world arrives from the server as one payload holding two sibling arrays:
//!
//! ```text
//! {"json_data":[ ...tiles... ],"enemy_data":[ ...spawns... ]}
//! ```
//!
//! It is cached as two documents, `worlds/<id>/<id>_json_data.json` and
//! `worlds/<id>/<id>_enemy_data.json`, each wrapping one array under its key.
//! Tile data is required; enemy data is optional and treated as empty when
//! missing. Any failure to obtain tiles falls back to the built-in town.

use std::time::{Duration, Instant};

use fw_core::Vector;
use fw_platform::transport::{Request, Transport, TransportState};
use fw_platform::Storage;
use serde::Deserialize;

use crate::enemy::{EnemyContext, EnemySpawn};
use crate::entity::EntityContext;
use crate::icon::IconContext;
use crate::level::{Level, LevelContext, MAX_ENEMIES, MAX_ENTITIES, MAX_LEVELS};
use crate::player::PlayerContext;

pub const WORLD_SIZE: Vector = Vector::new(384.0, 192.0);
pub const WORLD_LIST_PATH: &str = "worlds/world_list.json";
pub const DEFAULT_WORLD_ID: &str = "town_world";

const JSON_DATA_KEY: &str = "json_data";
const ENEMY_DATA_KEY: &str = "enemy_data";

pub fn json_data_path(id: &str) -> String {
    format!("worlds/{id}/{id}_json_data.json")
}

pub fn enemy_data_path(id: &str) -> String {
    format!("worlds/{id}/{id}_enemy_data.json")
}

// --- Documents ---

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl From<Point> for Vector {
    fn from(p: Point) -> Self {
        Vector::new(p.x, p.y)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TileDescriptor {
    pub icon: String,
    pub x: f32,
    pub y: f32,
    /// Copies laid out back to back, spaced by the icon's size.
    #[serde(default = "default_amount")]
    pub amount: u32,
    #[serde(default = "default_horizontal")]
    pub horizontal: bool,
}

#[derive(Debug, Deserialize)]
struct TileDocument {
    json_data: Vec<TileDescriptor>,
}

#[derive(Debug, Deserialize)]
struct EnemyRecord {
    id: String,
    #[serde(default)]
    index: Option<usize>,
    size: Point,
    start_position: Point,
    end_position: Point,
    #[serde(default = "default_move_timer")]
    move_timer: f32,
    #[serde(default = "default_speed")]
    speed: f32,
    #[serde(default = "default_attack_timer")]
    attack_timer: f32,
    #[serde(default = "default_strength")]
    strength: f32,
    #[serde(default = "default_health")]
    health: f32,
}

#[derive(Debug, Deserialize)]
struct EnemyDocument {
    #[serde(default)]
    enemy_data: Vec<EnemyRecord>,
}

#[derive(Debug, Deserialize)]
struct WorldListDocument {
    worlds: Vec<String>,
}

const fn default_amount() -> u32 {
    1
}

const fn default_horizontal() -> bool {
    true
}

const fn default_move_timer() -> f32 {
    1.0
}

const fn default_speed() -> f32 {
    32.0
}

const fn default_attack_timer() -> f32 {
    0.5
}

const fn default_strength() -> f32 {
    10.0
}

const fn default_health() -> f32 {
    100.0
}

pub fn parse_tiles(doc: &str) -> Result<Vec<TileDescriptor>, String> {
    let parsed: TileDocument =
        serde_json::from_str(doc).map_err(|e| format!("Failed to parse tile JSON: {e}"))?;
    Ok(parsed.json_data)
}

/// Enemy spawns, capped at `MAX_ENEMIES`.
pub fn parse_enemies(doc: &str) -> Result<Vec<EnemySpawn>, String> {
    let parsed: EnemyDocument =
        serde_json::from_str(doc).map_err(|e| format!("Failed to parse enemy JSON: {e}"))?;
    if parsed.enemy_data.len() > MAX_ENEMIES {
        log::warn!(
            "World lists {} enemies, only the first {MAX_ENEMIES} are spawned",
            parsed.enemy_data.len()
        );
    }
    Ok(parsed
        .enemy_data
        .into_iter()
        .take(MAX_ENEMIES)
        .enumerate()
        .map(|(i, r)| EnemySpawn {
            id: r.id,
            index: r.index.unwrap_or(i),
            size: r.size.into(),
            start_position: r.start_position.into(),
            end_position: r.end_position.into(),
            move_timer: r.move_timer,
            speed: r.speed,
            attack_timer: r.attack_timer,
            strength: r.strength,
            health: r.health,
        })
        .collect())
}

/// Level slots from `{"worlds":[...]}`, at most `MAX_LEVELS`.
pub fn parse_world_list(text: &str) -> Result<Vec<LevelContext>, String> {
    let parsed: WorldListDocument =
        serde_json::from_str(text).map_err(|e| format!("Failed to parse world list: {e}"))?;
    Ok(parsed
        .worlds
        .iter()
        .filter(|id| !id.trim().is_empty())
        .take(MAX_LEVELS)
        .enumerate()
        .map(|(index, id)| LevelContext::new(id, index))
        .collect())
}

/// Expand tiles into `(icon, top-left)` placements. Unknown icons are skipped.
///
/// Expansion stops once the level could not hold another icon next to the player.
pub fn layout_icons(tiles: &[TileDescriptor]) -> Vec<(IconContext, Vector)> {
    let cap = MAX_ENTITIES - 1;
    let mut placed = Vec::new();
    for tile in tiles {
        if placed.len() >= cap {
            log::warn!("World layout exceeds {cap} icons, ignoring the rest");
            break;
        }
        let Some(icon) = IconContext::from_name(&tile.icon) else {
            log::warn!("Unknown icon '{}' in world layout, skipping", tile.icon);
            continue;
        };
        let stride = if tile.horizontal {
            Vector::new(icon.size.x, 0.0)
        } else {
            Vector::new(0.0, icon.size.y)
        };
        let origin = Vector::new(tile.x, tile.y);
        let wanted = tile.amount.max(1) as usize;
        let count = wanted.min(cap - placed.len());
        if count < wanted {
            log::warn!("Tile '{}' repeats {wanted} times, laying out {count}", tile.icon);
        }
        for i in 0..count {
            placed.push((icon.clone(), origin + stride * i as f32));
        }
    }
    placed
}

// --- Payload splitting ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldDocuments {
    pub json_data: String,
    pub enemy_data: String,
}

/// Index of the bracket closing the one at `open`, skipping brackets inside strings.
fn matching_bracket(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'[') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate `"key": [ ... ]`. Returns (start of the quoted key, '[' index, ']' index).
fn find_array(text: &str, key: &str) -> Option<(usize, usize, usize)> {
    let quoted = format!("\"{key}\"");
    let key_start = text.find(&quoted)?;
    let after_key = key_start + quoted.len();
    let rest = &text[after_key..];
    let colon = rest.find(|c: char| !c.is_whitespace())?;
    if !rest[colon..].starts_with(':') {
        return None;
    }
    let after_colon = &rest[colon + 1..];
    let open_rel = after_colon.find(|c: char| !c.is_whitespace())?;
    let open = after_key + colon + 1 + open_rel;
    let close = matching_bracket(text, open)?;
    Some((key_start, open, close))
}

fn wrap(key: &str, array: &str) -> String {
    format!("{{\"{key}\":{array}}}")
}

/// Split a combined world payload into its tile and enemy documents.
///
/// The tile segment (`"json_data":[...]` plus its trailing comma) is removed
/// before the enemy array is looked up, so an enemy key can never be matched
/// inside tile data. A missing enemy array yields an empty one.
pub fn split_world_payload(payload: &str) -> Result<WorldDocuments, String> {
    let (key_start, open, close) = find_array(payload, JSON_DATA_KEY)
        .ok_or_else(|| "World payload has no json_data array".to_string())?;
    let json_data = wrap(JSON_DATA_KEY, &payload[open..=close]);

    let mut segment_end = close + 1;
    let tail = &payload[segment_end..];
    if let Some(comma) = tail.find(|c: char| !c.is_whitespace()) {
        if tail[comma..].starts_with(',') {
            segment_end += comma + 1;
        }
    }
    let remainder = format!("{}{}", &payload[..key_start], &payload[segment_end..]);

    let enemy_data = match find_array(&remainder, ENEMY_DATA_KEY) {
        Some((_, open, close)) => wrap(ENEMY_DATA_KEY, &remainder[open..=close]),
        None => {
            log::warn!("World payload has no enemy_data array, treating as empty");
            wrap(ENEMY_DATA_KEY, "[]")
        }
    };
    Ok(WorldDocuments {
        json_data,
        enemy_data,
    })
}

// --- Sources ---

/// Where uncached worlds come from.
pub trait WorldSource: Send {
    fn fetch_world(&mut self, id: &str) -> Result<String, String>;
}

/// No network: every fetch fails, so uncached worlds become the town.
#[derive(Debug, Default)]
pub struct OfflineSource;

impl WorldSource for OfflineSource {
    fn fetch_world(&mut self, id: &str) -> Result<String, String> {
        Err(format!("Offline, cannot fetch world '{id}'"))
    }
}

/// Fetches through a transport from the game worker thread, polling its state.
pub struct TransportSource {
    transport: Box<dyn Transport>,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl TransportSource {
    pub fn new(transport: Box<dyn Transport>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            poll_interval: Duration::from_millis(100),
            timeout,
        }
    }

    #[cfg(test)]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn world_url(&self, id: &str) -> String {
        format!("{}/world/get/world/{id}", self.base_url.trim_end_matches('/'))
    }
}

impl WorldSource for TransportSource {
    fn fetch_world(&mut self, id: &str) -> Result<String, String> {
        let url = self.world_url(id);
        self.transport
            .request(Request::get(&url))
            .map_err(|e| format!("Failed to request world '{id}': {e}"))?;
        let deadline = Instant::now() + self.timeout;
        let outcome = loop {
            match self.transport.state() {
                TransportState::Idle => {
                    break self
                        .transport
                        .response()
                        .filter(|body| !body.trim().is_empty())
                        .ok_or_else(|| format!("Empty response for world '{id}'"));
                }
                TransportState::Issue => {
                    let detail = self.transport.response().unwrap_or_default();
                    break Err(format!("Failed to fetch world '{id}': {detail}"));
                }
                _ if Instant::now() >= deadline => {
                    break Err(format!("Timed out fetching world '{id}'"));
                }
                _ => std::thread::sleep(self.poll_interval),
            }
        };
        if !self.transport.state().is_in_flight() {
            self.transport.reset();
        }
        outcome
    }
}

// --- Level loading ---

pub struct WorldLoader<'a> {
    store: &'a mut dyn Storage,
    source: &'a mut dyn WorldSource,
}

impl<'a> WorldLoader<'a> {
    pub fn new(store: &'a mut dyn Storage, source: &'a mut dyn WorldSource) -> Self {
        Self { store, source }
    }

    /// Read the cached documents for `id`, fetching and caching them first if needed.
    pub fn world_documents(&mut self, id: &str) -> Result<WorldDocuments, String> {
        let tiles_path = json_data_path(id);
        if self.store.file_exists(&tiles_path) {
            let json_data = self
                .store
                .read_file(&tiles_path)
                .map_err(|e| format!("Failed to read {tiles_path}: {e}"))?;
            let enemy_data = self
                .store
                .read_file(&enemy_data_path(id))
                .unwrap_or_else(|e| {
                    log::warn!("No cached enemy data for '{id}': {e}");
                    wrap(ENEMY_DATA_KEY, "[]")
                });
            return Ok(WorldDocuments {
                json_data,
                enemy_data,
            });
        }

        log::info!("World '{id}' not cached, downloading");
        let payload = self.source.fetch_world(id)?;
        let docs = split_world_payload(&payload)?;
        cache_world(self.store, id, &docs)?;
        Ok(docs)
    }

    /// Build the level for `context` with `player` placed at the world center.
    pub fn load_level(&mut self, context: &LevelContext, player: Box<PlayerContext>) -> Level {
        let mut level = Level::new(context.clone());
        if let Err(e) = level.spawn(EntityContext::Player(player), WORLD_SIZE / 2.0) {
            log::error!("Failed to place player in '{}': {e}", context.id);
        }

        let populated = self
            .world_documents(&context.id)
            .and_then(|docs| populate(&mut level, &docs));
        if let Err(e) = populated {
            log::error!("{e}; loading default town for '{}'", context.id);
            build_town(&mut level);
        }
        log::info!(
            "Level {} '{}' ready: {} entities, {} enemies",
            context.index + 1,
            level.id(),
            level.len(),
            level.enemy_count()
        );
        level
    }
}

pub fn cache_world(store: &mut dyn Storage, id: &str, docs: &WorldDocuments) -> Result<(), String> {
    store
        .write_file(&json_data_path(id), &docs.json_data)
        .map_err(|e| format!("Failed to cache tiles for '{id}': {e}"))?;
    store
        .write_file(&enemy_data_path(id), &docs.enemy_data)
        .map_err(|e| format!("Failed to cache enemies for '{id}': {e}"))
}

/// Spawn icons and enemies. Tiles are parsed before anything is spawned so a
/// bad tile document leaves the level untouched for the fallback.
fn populate(level: &mut Level, docs: &WorldDocuments) -> Result<(), String> {
    let tiles = parse_tiles(&docs.json_data)?;
    let enemies = parse_enemies(&docs.enemy_data).unwrap_or_else(|e| {
        log::warn!("{e}; level '{}' has no enemies", level.id());
        Vec::new()
    });

    for (icon, top_left) in layout_icons(&tiles) {
        if let Err(e) = level.spawn(EntityContext::Icon(icon), top_left) {
            log::error!("{e}");
            break;
        }
    }
    for spawn in &enemies {
        let enemy = EnemyContext::from_spawn(spawn);
        if let Err(e) = level.spawn(EntityContext::Enemy(Box::new(enemy)), spawn.start_position) {
            log::error!("{e}");
            break;
        }
    }
    Ok(())
}

/// Built-in fallback layout, with two guards patrolling below the spawn point.
const TOWN_PAYLOAD: &str = r#"{
  "json_data": [
    {"icon": "house", "x": 24, "y": 20},
    {"icon": "house", "x": 88, "y": 20},
    {"icon": "man", "x": 78, "y": 60},
    {"icon": "woman", "x": 140, "y": 60},
    {"icon": "fence", "x": 24, "y": 70, "amount": 4},
    {"icon": "fence_end", "x": 88, "y": 70},
    {"icon": "tree", "x": 168, "y": 8, "amount": 6},
    {"icon": "tree", "x": 8, "y": 120, "amount": 3, "horizontal": false},
    {"icon": "flower", "x": 60, "y": 140, "amount": 2},
    {"icon": "plant", "x": 120, "y": 150},
    {"icon": "lake_top_left", "x": 280, "y": 100},
    {"icon": "lake_top", "x": 304, "y": 100},
    {"icon": "lake_top_right", "x": 335, "y": 100},
    {"icon": "lake_left", "x": 280, "y": 122},
    {"icon": "lake_right", "x": 348, "y": 122},
    {"icon": "lake_bottom_left", "x": 280, "y": 153},
    {"icon": "lake_bottom", "x": 304, "y": 163},
    {"icon": "lake_bottom_right", "x": 335, "y": 153},
    {"icon": "rock_large", "x": 300, "y": 30},
    {"icon": "rock_medium", "x": 330, "y": 40},
    {"icon": "rock_small", "x": 250, "y": 60}
  ],
  "enemy_data": [
    {"id": "player", "index": 0, "size": {"x": 10, "y": 10},
     "start_position": {"x": 203, "y": 112}, "end_position": {"x": 181, "y": 112},
     "move_timer": 1, "speed": 32, "attack_timer": 0.5, "strength": 10, "health": 100},
    {"id": "player", "index": 1, "size": {"x": 10, "y": 10},
     "start_position": {"x": 203, "y": 128}, "end_position": {"x": 181, "y": 128},
     "move_timer": 1, "speed": 32, "attack_timer": 0.5, "strength": 10, "health": 100}
  ]
}"#;

pub fn town_documents() -> Result<WorldDocuments, String> {
    split_world_payload(TOWN_PAYLOAD)
}

/// Populate `level` with the default town, leaving only the player from before.
pub fn build_town(level: &mut Level) {
    level.clear_except_player();
    match town_documents().and_then(|docs| populate(level, &docs)) {
        Ok(()) => {}
        Err(e) => log::error!("Default town failed to load: {e}"),
    }
}
