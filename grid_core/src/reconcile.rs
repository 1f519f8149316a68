//! Position reconciler: the sole writer of animation state transitions back
//! to idle.
//!
//! Adjudications are stamped onto the live animation as they arrive; the
//! final idle transition (adopting the confirmed tile, or snapping back on
//! rejection) is deferred until the optimistic animation has visually
//! finished traversing its path, so the sprite is never teleported ahead of
//! or behind its own animation.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use tracing::{debug, error, info};

use crate::animation::{AnimationClip, AnimationLedger, AnimationState, MovementPhase};
use crate::attack::AttackLedger;
use crate::entities::{EntityId, EntityRoster, Generation, GenerationLedger};
use crate::events::{AttackAdopted, AttackRejected, MovementAdopted, MovementRejected};
use crate::movement::{Approval, MovementLedger};
use crate::resources::EngineConfig;
use crate::tile::TileCoord;

/// Stamp move adjudications onto the matching live animation.
pub fn record_move_adjudications(
    mut adopted: EventReader<MovementAdopted>,
    mut rejected: EventReader<MovementRejected>,
    mut movements: ResMut<MovementLedger>,
) {
    for event in adopted.read() {
        stamp_move(
            &mut movements,
            event.entity,
            event.generation,
            Approval::Approved(event.record.clone()),
        );
    }
    for event in rejected.read() {
        stamp_move(
            &mut movements,
            event.entity,
            event.generation,
            Approval::Rejected(event.error.clone()),
        );
    }
}

fn stamp_move(
    movements: &mut MovementLedger,
    entity: EntityId,
    generation: Generation,
    approval: Approval,
) {
    let Some(anim) = movements.get_mut(entity) else {
        debug!(%entity, %generation, "move adjudication without a live movement");
        return;
    };
    if anim.generation != generation {
        debug!(%entity, %generation, current = %anim.generation, "stale move adjudication");
        return;
    }
    if anim.approval.is_decided() {
        debug!(%entity, %generation, "duplicate move adjudication");
        return;
    }
    anim.approval = approval;
}

/// Stamp attack adjudications onto the matching live animation.
pub fn record_attack_adjudications(
    mut adopted: EventReader<AttackAdopted>,
    mut rejected: EventReader<AttackRejected>,
    mut attacks: ResMut<AttackLedger>,
) {
    for event in adopted.read() {
        stamp_attack(
            &mut attacks,
            event.entity,
            event.generation,
            Approval::Approved(event.record.clone()),
        );
    }
    for event in rejected.read() {
        stamp_attack(
            &mut attacks,
            event.entity,
            event.generation,
            Approval::Rejected(event.error.clone()),
        );
    }
}

fn stamp_attack(
    attacks: &mut AttackLedger,
    entity: EntityId,
    generation: Generation,
    approval: Approval,
) {
    let Some(anim) = attacks.get_mut(entity) else {
        debug!(%entity, %generation, "attack adjudication without a live attack");
        return;
    };
    if anim.generation != generation {
        debug!(%entity, %generation, current = %anim.generation, "stale attack adjudication");
        return;
    }
    if anim.approval.is_decided() {
        debug!(%entity, %generation, "duplicate attack adjudication");
        return;
    }
    anim.approval = approval;
}

/// Transition finished, adjudicated movements back to idle.
pub fn finalize_movements(
    mut movements: ResMut<MovementLedger>,
    mut animations: ResMut<AnimationLedger>,
    mut roster: ResMut<EntityRoster>,
) {
    for entity in movements.ready_to_finalize() {
        let anim = movements.remove(entity).expect("listed as ready");
        let Some(state) = animations.get_mut(entity) else {
            error!(%entity, "finalizing a movement without animation state");
            debug_assert!(false, "movement finalize for untracked entity {entity}");
            continue;
        };
        match anim.approval {
            Approval::Approved(record) => {
                let confirmed = record.position;
                roster.adopt(record);
                state.visual_position = confirmed.to_vec2();
                info!(%entity, generation = %anim.generation, position = %confirmed, "move adopted");
            }
            Approval::Rejected(error) => {
                match roster.position(entity) {
                    Some(confirmed) => state.visual_position = confirmed.to_vec2(),
                    None => {
                        error!(%entity, "rejected movement for an entity missing from the roster");
                        debug_assert!(false, "rejection finalize for unknown entity {entity}");
                    }
                }
                info!(%entity, generation = %anim.generation, %error, "move rejected, snapping back");
            }
            Approval::Pending => unreachable!("ready_to_finalize returns decided animations"),
        }
        state.phase = MovementPhase::Idle;
        state.current_clip = state.idle_clip;
        state.position_synced = true;
        if let Some(authoritative) = roster.position(entity) {
            assert_idle_synced(entity, state, authoritative);
        }
    }
}

/// Transition finished, adjudicated attacks back to the idle clip.
pub fn finalize_attacks(
    time: Res<Time>,
    mut attacks: ResMut<AttackLedger>,
    mut animations: ResMut<AnimationLedger>,
    mut roster: ResMut<EntityRoster>,
) {
    let now = time.elapsed_seconds_f64();
    for entity in attacks.ready_to_finalize(now) {
        let anim = attacks.remove(entity).expect("listed as ready");
        match anim.approval {
            Approval::Approved(record) => {
                roster.adopt(record);
                info!(%entity, generation = %anim.generation, "attack adopted");
            }
            Approval::Rejected(error) => {
                info!(%entity, generation = %anim.generation, %error, "attack rejected");
            }
            Approval::Pending => unreachable!("ready_to_finalize returns decided animations"),
        }
        if let Some(state) = animations.get_mut(entity) {
            if state.current_clip == AnimationClip::Attack {
                state.current_clip = state.idle_clip;
            }
        }
    }
}

/// Keep idle entities on their authoritative tile after background
/// refreshes. Entities with a live movement are left to the animation tick.
pub fn follow_authoritative_moves(
    roster: Res<EntityRoster>,
    movements: Res<MovementLedger>,
    mut animations: ResMut<AnimationLedger>,
) {
    for (entity, record) in roster.iter() {
        if movements.is_live(entity) {
            continue;
        }
        let Some(state) = animations.get_mut(entity) else {
            continue;
        };
        if state.phase != MovementPhase::Idle {
            continue;
        }
        let expected = record.position.to_vec2();
        if state.visual_position != expected {
            debug!(%entity, position = %record.position, "idle entity follows authoritative refresh");
            state.visual_position = expected;
            state.position_synced = true;
        }
    }
}

/// Everything the reconciler's direct operations touch.
#[derive(SystemParam)]
pub struct ReconcileParams<'w> {
    pub roster: Res<'w, EntityRoster>,
    pub generations: ResMut<'w, GenerationLedger>,
    pub movements: ResMut<'w, MovementLedger>,
    pub attacks: ResMut<'w, AttackLedger>,
    pub animations: ResMut<'w, AnimationLedger>,
    pub config: Res<'w, EngineConfig>,
}

/// Unconditionally destroy any in-flight action for `entity` and force the
/// animation state to idle on the authoritative tile.
///
/// The generation advances when anything was destroyed, so the network reply
/// still owed to the destroyed action is discarded on arrival. No rejection
/// event is emitted: cancellation is not an error.
pub fn cancel(params: &mut ReconcileParams, entity: EntityId) {
    let dropped_move = params.movements.remove(entity).is_some();
    let dropped_attack = params.attacks.remove(entity).is_some();
    if dropped_move || dropped_attack {
        let generation = params.generations.advance(entity);
        debug!(%entity, %generation, "cancelled in-flight action");
    }
    let Some(position) = params.roster.position(entity) else {
        debug!(%entity, "cancel for unknown entity");
        return;
    };
    let state = params.animations.ensure(entity, position, &params.config);
    state.phase = MovementPhase::Idle;
    state.current_clip = state.idle_clip;
    state.visual_position = position.to_vec2();
    state.position_synced = true;
}

/// Force the visual position back onto the authoritative tile without
/// touching the movement phase or clip identity. Idempotent; defensive
/// recovery only, unrelated to network adjudication.
pub fn resync(params: &mut ReconcileParams, entity: EntityId) {
    let Some(position) = params.roster.position(entity) else {
        debug!(%entity, "resync for unknown entity");
        return;
    };
    let state = params.animations.ensure(entity, position, &params.config);
    state.visual_position = position.to_vec2();
    state.position_synced = true;
}

fn assert_idle_synced(entity: EntityId, state: &AnimationState, authoritative: TileCoord) {
    let expected = authoritative.to_vec2();
    if state.visual_position != expected {
        error!(
            %entity,
            %authoritative,
            actual = ?state.visual_position,
            "idle transition left the visual position desynced"
        );
        debug_assert!(false, "idle transition desynced for entity {entity}");
    }
}
