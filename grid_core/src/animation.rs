//! Per-entity animation state: movement phase, clip identity, facing, and
//! the continuously interpolated visual position.
//!
//! Visual position is decoupled from the authoritative tile while a
//! predicted animation is in flight; the two are reunited by the reconciler
//! on every transition back to idle.

use std::collections::HashMap;

use bevy::math::Vec2;
use bevy::prelude::*;
use tracing::{debug, error, warn};

use crate::attack::AttackLedger;
use crate::entities::{EntityId, EntityRoster};
use crate::events::{AttackStarted, MovementStarted};
use crate::movement::MovementLedger;
use crate::resources::EngineConfig;
use crate::tile::{Facing, TileCoord};

/// Movement lifecycle phase. `Idle` is initial and terminal-reentrant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MovementPhase {
    #[default]
    Idle,
    Moving,
}

/// Animation clip selected for playback. Playback itself belongs to the
/// rendering layer; the engine only decides identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationClip {
    #[default]
    Idle,
    Walk,
    Attack,
}

/// Visual state for one entity. Created lazily on first reference and kept
/// for the entity's lifetime.
#[derive(Debug, Clone)]
pub struct AnimationState {
    pub phase: MovementPhase,
    pub current_clip: AnimationClip,
    pub idle_clip: AnimationClip,
    pub facing: Facing,
    pub visual_position: Vec2,
    pub position_synced: bool,
    pub speed_tiles_per_sec: f32,
}

impl AnimationState {
    fn new(position: TileCoord, speed_tiles_per_sec: f32) -> Self {
        Self {
            phase: MovementPhase::Idle,
            current_clip: AnimationClip::Idle,
            idle_clip: AnimationClip::Idle,
            facing: Facing::default(),
            visual_position: position.to_vec2(),
            position_synced: true,
            speed_tiles_per_sec,
        }
    }
}

/// Arena of per-entity animation states, plus the read-only query surface
/// exposed to rendering and UI code.
#[derive(Resource, Debug, Default)]
pub struct AnimationLedger {
    states: HashMap<EntityId, AnimationState>,
}

impl AnimationLedger {
    /// Fetch the state for an entity, creating it at `position` on first
    /// reference.
    pub fn ensure(
        &mut self,
        entity: EntityId,
        position: TileCoord,
        config: &EngineConfig,
    ) -> &mut AnimationState {
        self.states
            .entry(entity)
            .or_insert_with(|| AnimationState::new(position, config.default_walk_speed_tiles_per_sec))
    }

    pub fn get(&self, entity: EntityId) -> Option<&AnimationState> {
        self.states.get(&entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut AnimationState> {
        self.states.get_mut(&entity)
    }

    pub fn is_moving(&self, entity: EntityId) -> bool {
        self.states
            .get(&entity)
            .map(|state| state.phase == MovementPhase::Moving)
            .unwrap_or(false)
    }

    pub fn facing(&self, entity: EntityId) -> Option<Facing> {
        self.states.get(&entity).map(|state| state.facing)
    }

    pub fn visual_position(&self, entity: EntityId) -> Option<Vec2> {
        self.states.get(&entity).map(|state| state.visual_position)
    }

    pub fn is_synced(&self, entity: EntityId) -> bool {
        self.states
            .get(&entity)
            .map(|state| state.position_synced)
            .unwrap_or(true)
    }
}

/// Consume [`MovementStarted`] and transition `Idle -> Moving`.
///
/// A started event whose generation no longer matches the live animation is
/// stale (the move was cancelled before this tick) and is skipped.
pub fn begin_movement_animations(
    mut started: EventReader<MovementStarted>,
    movements: Res<MovementLedger>,
    mut animations: ResMut<AnimationLedger>,
    config: Res<EngineConfig>,
) {
    for event in started.read() {
        let Some(live) = movements.get(event.entity) else {
            debug!(entity = %event.entity, generation = %event.generation, "stale movement start, nothing live");
            continue;
        };
        if live.generation != event.generation {
            debug!(entity = %event.entity, generation = %event.generation, current = %live.generation, "stale movement start");
            continue;
        }
        let start = *event
            .path
            .first()
            .expect("movement started with an empty path");
        let state = animations.ensure(event.entity, start, &config);
        state.phase = MovementPhase::Moving;
        state.current_clip = AnimationClip::Walk;
        state.position_synced = false;
        state.visual_position = start.to_vec2();
        state.facing = Facing::from_step(start, event.path[1])
            .expect("movement path began with a zero-length segment");
    }
}

/// Consume [`AttackStarted`]: select the attack clip and face the target.
pub fn begin_attack_animations(
    mut started: EventReader<AttackStarted>,
    attacks: Res<AttackLedger>,
    roster: Res<EntityRoster>,
    mut animations: ResMut<AnimationLedger>,
    config: Res<EngineConfig>,
) {
    for event in started.read() {
        let stale = attacks
            .get(event.entity)
            .map(|live| live.generation != event.generation)
            .unwrap_or(true);
        if stale {
            debug!(entity = %event.entity, generation = %event.generation, "stale attack start");
            continue;
        }
        let (Some(attacker), Some(target)) =
            (roster.position(event.entity), roster.position(event.target))
        else {
            error!(entity = %event.entity, target = %event.target, "attack started for entities missing from the roster");
            continue;
        };
        let state = animations.ensure(event.entity, attacker, &config);
        state.current_clip = AnimationClip::Attack;
        match Facing::from_step(attacker, target) {
            Some(facing) => state.facing = facing,
            None => warn!(entity = %event.entity, target = %event.target, "attacker and target share a tile, keeping facing"),
        }
    }
}

/// Advance every live movement animation by sampled wall-clock time.
///
/// Progress is clamped to the path length and never decreases; facing is
/// derived from the current segment, so it changes exactly at segment
/// boundaries.
pub fn advance_movement_animations(
    time: Res<Time>,
    mut movements: ResMut<MovementLedger>,
    mut animations: ResMut<AnimationLedger>,
) {
    let now = time.elapsed_seconds_f64();
    for anim in movements.iter_mut() {
        let Some(state) = animations.get_mut(anim.entity) else {
            error!(entity = %anim.entity, "live movement without animation state");
            debug_assert!(false, "movement animating an untracked entity");
            continue;
        };
        let elapsed = (now - anim.started_at).max(0.0) as f32;
        let sampled = (elapsed * anim.speed_tiles_per_sec).min(anim.end_progress());
        anim.progress = anim.progress.max(sampled);

        let last_segment = anim.path.len() - 2;
        let segment = (anim.progress.floor() as usize).min(last_segment);
        anim.segment = segment;
        let from = anim.path[segment];
        let to = anim.path[segment + 1];
        state.facing = Facing::from_step(from, to)
            .expect("movement path contains a zero-length segment");
        let t = anim.progress - segment as f32;
        state.visual_position = from.to_vec2().lerp(to.to_vec2(), t);
    }
}
