//! Movement coordinator: validates and starts optimistic moves.
//!
//! A move begins animating the instant it is requested; the authority's
//! verdict arrives later through [`crate::authority::pump_authority_replies`]
//! and is reconciled without visual discontinuity.

use std::collections::HashMap;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use tracing::{debug, info};

use crate::animation::AnimationLedger;
use crate::authority::{AuthorityError, AuthorityLink, AuthorityRequest};
use crate::entities::{EntityId, EntityRecord, EntityRoster, Generation, GenerationLedger};
use crate::events::MovementStarted;
use crate::resources::EngineConfig;
use crate::tile::TileCoord;

/// Adjudication recorded on a live animation once the authority replies.
///
/// The adopted record rides on the variant so the deferred `Idle` transition
/// needs no side lookup when the animation finishes traversing its path.
#[derive(Debug, Clone, Default)]
pub enum Approval {
    #[default]
    Pending,
    Approved(EntityRecord),
    Rejected(AuthorityError),
}

impl Approval {
    pub fn is_pending(&self) -> bool {
        matches!(self, Approval::Pending)
    }

    pub fn is_decided(&self) -> bool {
        !self.is_pending()
    }
}

/// A live optimistic movement animation.
///
/// `path` is inclusive of the starting tile; `progress` is measured in tiles
/// travelled along it and never decreases while the approval is undecided.
#[derive(Debug, Clone)]
pub struct MovementAnimation {
    pub entity: EntityId,
    pub path: Vec<TileCoord>,
    pub target: TileCoord,
    pub generation: Generation,
    pub started_at: f64,
    pub speed_tiles_per_sec: f32,
    pub progress: f32,
    pub segment: usize,
    pub approval: Approval,
}

impl MovementAnimation {
    /// Progress value at which the path has been fully traversed.
    pub fn end_progress(&self) -> f32 {
        (self.path.len().saturating_sub(1)) as f32
    }

    pub fn traversal_complete(&self) -> bool {
        self.progress >= self.end_progress()
    }
}

/// Live movement animations, at most one per entity.
#[derive(Resource, Debug, Default)]
pub struct MovementLedger {
    live: HashMap<EntityId, MovementAnimation>,
}

impl MovementLedger {
    pub fn is_live(&self, entity: EntityId) -> bool {
        self.live.contains_key(&entity)
    }

    pub fn get(&self, entity: EntityId) -> Option<&MovementAnimation> {
        self.live.get(&entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut MovementAnimation> {
        self.live.get_mut(&entity)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MovementAnimation> {
        self.live.values_mut()
    }

    pub(crate) fn insert(&mut self, animation: MovementAnimation) {
        let previous = self.live.insert(animation.entity, animation);
        debug_assert!(
            previous.is_none(),
            "movement registered while another was live"
        );
    }

    pub(crate) fn remove(&mut self, entity: EntityId) -> Option<MovementAnimation> {
        self.live.remove(&entity)
    }

    /// Entities whose animation has finished traversing and has a verdict.
    pub(crate) fn ready_to_finalize(&self) -> Vec<EntityId> {
        self.live
            .values()
            .filter(|anim| anim.traversal_complete() && anim.approval.is_decided())
            .map(|anim| anim.entity)
            .collect()
    }
}

/// Everything the movement coordinator touches when starting a move.
#[derive(SystemParam)]
pub struct MovementParams<'w> {
    pub roster: Res<'w, EntityRoster>,
    pub generations: ResMut<'w, GenerationLedger>,
    pub movements: ResMut<'w, MovementLedger>,
    pub animations: ResMut<'w, AnimationLedger>,
    pub config: Res<'w, EngineConfig>,
    pub time: Res<'w, Time>,
    pub started: EventWriter<'w, MovementStarted>,
    pub link: Res<'w, AuthorityLink>,
}

/// Start an optimistic move of `entity` toward `target`.
///
/// Returns `true` once the predicted animation has started, regardless of the
/// eventual authoritative outcome — callers that care about the verdict must
/// observe [`crate::events::MovementAdopted`] / [`crate::events::MovementRejected`].
/// Returns `false` without side effects when the entity is unknown, already
/// has a live movement, or has no precomputed path to `target`.
pub fn request_move(params: &mut MovementParams, entity: EntityId, target: TileCoord) -> bool {
    let Some(record) = params.roster.get(entity) else {
        debug!(%entity, %target, "move request for unknown entity");
        return false;
    };
    if params.movements.is_live(entity) {
        debug!(%entity, %target, "move request while a movement is in flight");
        return false;
    }
    let waypoints = match record.senses.paths.get(&target) {
        Some(waypoints) if !waypoints.is_empty() => waypoints,
        _ => {
            debug!(%entity, %target, "move request with no reachable path");
            return false;
        }
    };

    let mut path = Vec::with_capacity(waypoints.len() + 1);
    path.push(record.position);
    path.extend(waypoints.iter().copied());

    let generation = params.generations.advance(entity);
    let speed = params
        .animations
        .ensure(entity, record.position, &params.config)
        .speed_tiles_per_sec;

    params.movements.insert(MovementAnimation {
        entity,
        path: path.clone(),
        target,
        generation,
        started_at: params.time.elapsed_seconds_f64(),
        speed_tiles_per_sec: speed,
        progress: 0.0,
        segment: 0,
        approval: Approval::Pending,
    });
    params.started.send(MovementStarted {
        entity,
        path,
        generation,
    });
    params.link.send(AuthorityRequest::Move {
        entity,
        target,
        generation,
    });
    info!(%entity, %target, %generation, "optimistic move started");
    true
}
