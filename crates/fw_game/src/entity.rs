//! Entity model.
//!
//! An entity is a `Body` (position, collider, alive flag) plus an
//! `EntityContext` holding the per-kind state. Behavior lives on the context
//! types through `EntityBehavior`; every callback defaults to a no-op, so a
//! kind only implements the slots it cares about.
//!
//! Callbacks never reach into the level directly. Anything that has to touch
//! the level as a whole (switching levels, resolving an attack, stopping the
//! session) is queued as a `Command` on the `TickContext` and applied by the
//! driver once the frame's update/collision/render pass has finished.

use fw_core::{InputState, Vector};
use fw_render::{Camera2D, Canvas};

use crate::enemy::EnemyContext;
use crate::icon::IconContext;
use crate::player::PlayerContext;

pub type EntityId = u32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    Rect { half_extents: Vector },
    Circle { radius: f32 },
}

impl Collider {
    /// Strict overlap test; touching edges do not collide.
    pub fn overlaps(self, at: Vector, other: Collider, other_at: Vector) -> bool {
        match (self, other) {
            (Self::Rect { half_extents: a }, Self::Rect { half_extents: b }) => {
                let d = (at - other_at).abs();
                d.x < a.x + b.x && d.y < a.y + b.y
            }
            (Self::Circle { radius: a }, Self::Circle { radius: b }) => {
                at.distance_squared(other_at) < (a + b) * (a + b)
            }
            (Self::Rect { half_extents }, Self::Circle { radius }) => {
                rect_circle_overlap(at, half_extents, other_at, radius)
            }
            (Self::Circle { radius }, Self::Rect { half_extents }) => {
                rect_circle_overlap(other_at, half_extents, at, radius)
            }
        }
    }
}

fn rect_circle_overlap(rect_at: Vector, half: Vector, circle_at: Vector, radius: f32) -> bool {
    let closest = circle_at.clamp(rect_at - half, rect_at + half);
    closest.distance_squared(circle_at) < radius * radius
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub position: Vector,
    pub collider: Option<Collider>,
    pub alive: bool,
}

impl Body {
    pub fn at(position: Vector) -> Self {
        Self {
            position,
            collider: None,
            alive: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Player,
    Enemy,
    Icon,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Player => "player",
            Self::Enemy => "enemy",
            Self::Icon => "icon",
        };
        f.write_str(label)
    }
}

/// Requests raised during a tick, applied after the frame completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NextLevel,
    Attack,
    StopSession,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityEvent {
    Damaged { amount: f32 },
    LevelChanged { index: usize },
}

/// Per-frame data handed to `update`.
pub struct TickContext<'a> {
    pub input: &'a InputState,
    pub dt: f32,
    /// Live enemies in the level when the frame began.
    pub enemy_count: usize,
    commands: Vec<Command>,
    settle: f32,
}

impl<'a> TickContext<'a> {
    pub fn new(input: &'a InputState, dt: f32, enemy_count: usize) -> Self {
        Self {
            input,
            dt,
            enemy_count,
            commands: Vec::new(),
            settle: 0.0,
        }
    }

    pub fn queue(&mut self, command: Command) {
        if !self.commands.contains(&command) {
            self.commands.push(command);
        }
    }

    /// Ignore player input for `seconds` after this frame.
    pub fn request_settle(&mut self, seconds: f32) {
        self.settle = self.settle.max(seconds);
    }

    pub fn settle(&self) -> f32 {
        self.settle
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// The other participant of a collision, mutable so either side can react.
pub struct Other<'a> {
    pub body: &'a mut Body,
    pub context: &'a mut EntityContext,
}

pub trait EntityBehavior {
    /// Runs once when the entity is spawned; may place the body and attach a collider.
    fn start(&mut self, _body: &mut Body) {}

    fn update(&mut self, _body: &mut Body, _tick: &mut TickContext<'_>) {}

    fn collision(&mut self, _body: &mut Body, _other: Other<'_>) {}

    fn render(&self, _body: &Body, _canvas: &mut dyn Canvas, _camera: &Camera2D) {}

    /// Runs exactly once, before the context is dropped.
    fn stop(&mut self, _body: &mut Body) {}

    fn event(&mut self, _body: &mut Body, _event: &EntityEvent) {}
}

#[derive(Debug)]
pub enum EntityContext {
    Player(Box<PlayerContext>),
    Enemy(Box<EnemyContext>),
    Icon(IconContext),
}

impl EntityContext {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Player(_) => EntityKind::Player,
            Self::Enemy(_) => EntityKind::Enemy,
            Self::Icon(_) => EntityKind::Icon,
        }
    }

    fn behavior(&self) -> &dyn EntityBehavior {
        match self {
            Self::Player(ctx) => ctx.as_ref(),
            Self::Enemy(ctx) => ctx.as_ref(),
            Self::Icon(ctx) => ctx,
        }
    }

    fn behavior_mut(&mut self) -> &mut dyn EntityBehavior {
        match self {
            Self::Player(ctx) => ctx.as_mut(),
            Self::Enemy(ctx) => ctx.as_mut(),
            Self::Icon(ctx) => ctx,
        }
    }

    pub fn as_player(&self) -> Option<&PlayerContext> {
        match self {
            Self::Player(ctx) => Some(ctx.as_ref()),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerContext> {
        match self {
            Self::Player(ctx) => Some(ctx.as_mut()),
            _ => None,
        }
    }

    pub fn as_enemy(&self) -> Option<&EnemyContext> {
        match self {
            Self::Enemy(ctx) => Some(ctx.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub body: Body,
    pub context: EntityContext,
    stopped: bool,
}

impl Entity {
    pub fn new(id: EntityId, position: Vector, context: EntityContext) -> Self {
        Self {
            id,
            body: Body::at(position),
            context,
            stopped: false,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.context.kind()
    }

    pub fn is_alive(&self) -> bool {
        self.body.alive && !self.stopped
    }

    pub fn start(&mut self) {
        self.context.behavior_mut().start(&mut self.body);
    }

    pub fn update(&mut self, tick: &mut TickContext<'_>) {
        self.context.behavior_mut().update(&mut self.body, tick);
    }

    pub fn render(&self, canvas: &mut dyn Canvas, camera: &Camera2D) {
        self.context.behavior().render(&self.body, canvas, camera);
    }

    pub fn event(&mut self, event: &EntityEvent) {
        self.context.behavior_mut().event(&mut self.body, event);
    }

    /// Mark dead and run `stop`. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.body.alive = false;
        self.context.behavior_mut().stop(&mut self.body);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Detach the context without running `stop` (ownership moves elsewhere).
    pub fn into_context(self) -> EntityContext {
        self.context
    }
}

/// Fire `collision` on both entities if their colliders overlap.
/// Overlap is tested once; both sides react even if the first moves away.
pub fn collide_pair(a: &mut Entity, b: &mut Entity) -> bool {
    if !a.is_alive() || !b.is_alive() {
        return false;
    }
    let (Some(ca), Some(cb)) = (a.body.collider, b.body.collider) else {
        return false;
    };
    if !ca.overlaps(a.body.position, cb, b.body.position) {
        return false;
    }
    a.context.behavior_mut().collision(
        &mut a.body,
        Other {
            body: &mut b.body,
            context: &mut b.context,
        },
    );
    b.context.behavior_mut().collision(
        &mut b.body,
        Other {
            body: &mut a.body,
            context: &mut a.context,
        },
    );
    true
}
