//! A level owns its entities and runs the per-frame passes over them.
//!
//! Order within a frame: `update` for every live entity, then pairwise
//! collision, then `render`, then `sweep` to drop anything marked dead.
//! Entities are kept in spawn order and every pass walks that order.

use fw_core::Vector;
use fw_render::{Camera2D, Canvas};
use thiserror::Error;

use crate::entity::{collide_pair, Entity, EntityContext, EntityEvent, EntityId, EntityKind, TickContext};
use crate::player::PlayerContext;

pub const MAX_ENEMIES: usize = 10;
pub const MAX_LEVELS: usize = 10;
/// Upper bound on entities of any kind in one level.
pub const MAX_ENTITIES: usize = 256;
const MAX_ID_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level '{level}' already holds the maximum of {max} {kind} entities")]
    Capacity {
        level: String,
        kind: EntityKind,
        max: usize,
    },
    #[error("out of memory spawning into level '{0}'")]
    OutOfMemory(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelContext {
    pub id: String,
    pub index: usize,
}

impl LevelContext {
    pub fn new(id: &str, index: usize) -> Self {
        Self {
            id: id.chars().take(MAX_ID_LEN).collect(),
            index,
        }
    }
}

pub struct Level {
    context: LevelContext,
    entities: Vec<Entity>,
    next_id: EntityId,
}

impl Level {
    pub fn new(context: LevelContext) -> Self {
        Self {
            context,
            entities: Vec::new(),
            next_id: 1,
        }
    }

    pub fn id(&self) -> &str {
        &self.context.id
    }

    /// Add an entity and run its `start`.
    pub fn spawn(&mut self, context: EntityContext, position: Vector) -> Result<EntityId, LevelError> {
        let kind = context.kind();
        let (count, max) = match kind {
            EntityKind::Enemy => (self.count(EntityKind::Enemy), MAX_ENEMIES),
            EntityKind::Player => (self.count(EntityKind::Player), 1),
            EntityKind::Icon => (self.entities.len(), MAX_ENTITIES),
        };
        if count >= max || self.entities.len() >= MAX_ENTITIES {
            return Err(LevelError::Capacity {
                level: self.context.id.clone(),
                kind,
                max,
            });
        }
        self.entities
            .try_reserve(1)
            .map_err(|_| LevelError::OutOfMemory(self.context.id.clone()))?;

        let id = self.next_id;
        self.next_id += 1;
        let mut entity = Entity::new(id, position, context);
        entity.start();
        log::trace!("Spawned {} #{id} at {:?} in '{}'", entity.kind(), entity.body.position, self.context.id);
        self.entities.push(entity);
        Ok(id)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    /// Live entities of `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities
            .iter()
            .filter(|e| e.kind() == kind && e.is_alive())
            .count()
    }

    pub fn enemy_count(&self) -> usize {
        self.count(EntityKind::Enemy)
    }

    pub fn player(&self) -> Option<&Entity> {
        self.entities.iter().find(|e| e.kind() == EntityKind::Player)
    }

    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        self.entities
            .iter_mut()
            .find(|e| e.kind() == EntityKind::Player)
    }

    pub fn update(&mut self, tick: &mut TickContext<'_>) {
        for entity in self.entities.iter_mut().filter(|e| e.is_alive()) {
            entity.update(tick);
        }
    }

    /// Fire collisions for every overlapping pair. Returns the number of pairs.
    pub fn resolve_collisions(&mut self) -> usize {
        let mut hits = 0;
        for i in 0..self.entities.len() {
            let (head, tail) = self.entities.split_at_mut(i + 1);
            let a = &mut head[i];
            for b in tail.iter_mut() {
                if collide_pair(a, b) {
                    hits += 1;
                }
            }
        }
        hits
    }

    pub fn render(&self, canvas: &mut dyn Canvas, camera: &Camera2D) {
        for entity in self.entities.iter().filter(|e| e.is_alive()) {
            entity.render(canvas, camera);
        }
    }

    pub fn broadcast(&mut self, event: &EntityEvent) {
        for entity in self.entities.iter_mut().filter(|e| e.is_alive()) {
            entity.event(event);
        }
    }

    /// Stop and drop entities marked dead. The player is never swept.
    pub fn sweep(&mut self) -> usize {
        let before = self.entities.len();
        for entity in &mut self.entities {
            if !entity.body.alive && entity.kind() != EntityKind::Player {
                entity.stop();
            }
        }
        self.entities.retain(|e| !e.is_stopped());
        before - self.entities.len()
    }

    /// Detach the player's context so it can move to the next level.
    /// `stop` is not run; the context lives on.
    pub fn take_player(&mut self) -> Option<Box<PlayerContext>> {
        let at = self
            .entities
            .iter()
            .position(|e| e.kind() == EntityKind::Player)?;
        match self.entities.remove(at).into_context() {
            EntityContext::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Stop and drop everything except the player.
    pub fn clear_except_player(&mut self) {
        for entity in &mut self.entities {
            if entity.kind() != EntityKind::Player {
                entity.stop();
            }
        }
        self.entities.retain(|e| !e.is_stopped());
    }

    /// Stop and drop every entity.
    pub fn clear(&mut self) {
        for entity in &mut self.entities {
            entity.stop();
        }
        self.entities.clear();
    }
}

impl Drop for Level {
    fn drop(&mut self) {
        if !self.is_empty() {
            log::debug!("Stopping level '{}'", self.context.id);
            self.clear();
        }
    }
}
