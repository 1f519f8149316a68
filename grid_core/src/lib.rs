//! Optimistic movement core for the Gridfall operator client.
//!
//! Entities live on a tile grid whose true state is owned by a remote
//! authority. When the operator directs an entity, the engine starts a
//! locally predicted animation immediately, issues the authority request
//! without blocking, and later reconciles the asynchronous verdict: adopting
//! the confirmed state, or snapping the sprite back to its last confirmed
//! tile on rejection. Late or duplicate replies are correlated by a
//! per-entity generation counter and discarded when superseded.
//!
//! Call [`build_engine_app`] to assemble the headless app, then drive it
//! with [`run_tick`] from the render loop or a timer.

pub mod animation;
pub mod attack;
pub mod authority;
mod entities;
pub mod events;
pub mod movement;
pub mod reconcile;
mod resources;
pub mod snapshot;
mod tile;

use bevy::prelude::*;

pub use animation::{AnimationClip, AnimationLedger, AnimationState, MovementPhase};
pub use attack::{request_attack, AttackAnimation, AttackLedger, AttackParams};
pub use authority::{
    AuthorityEndpoint, AuthorityError, AuthorityLink, AuthorityReply, AuthorityRequest,
};
pub use entities::{EntityId, EntityRecord, EntityRoster, Generation, GenerationLedger, Senses};
pub use events::{
    AttackAdopted, AttackRejected, AttackStarted, MovementAdopted, MovementRejected,
    MovementStarted,
};
pub use movement::{request_move, Approval, MovementAnimation, MovementLedger, MovementParams};
pub use reconcile::{cancel, resync, ReconcileParams};
pub use resources::EngineConfig;
pub use snapshot::{
    EntityWire, SensesWire, SnapshotFeed, SnapshotIngest, SnapshotWire, WireError,
};
pub use tile::{Facing, ParseTileError, TileCoord};

/// Construct a headless Bevy [`App`] running the reconciliation pipeline.
///
/// The caller keeps the transport-side halves of both channels: the
/// [`AuthorityEndpoint`] matching `authority` services move/attack requests,
/// and the [`SnapshotIngest`] matching `snapshots` feeds periodic refreshes.
pub fn build_engine_app(authority: AuthorityLink, snapshots: SnapshotFeed) -> App {
    let mut app = App::new();

    app.insert_resource(EngineConfig::default())
        .insert_resource(authority)
        .insert_resource(snapshots)
        .init_resource::<EntityRoster>()
        .init_resource::<GenerationLedger>()
        .init_resource::<MovementLedger>()
        .init_resource::<AttackLedger>()
        .init_resource::<AnimationLedger>()
        .add_event::<MovementStarted>()
        .add_event::<MovementAdopted>()
        .add_event::<MovementRejected>()
        .add_event::<AttackStarted>()
        .add_event::<AttackAdopted>()
        .add_event::<AttackRejected>()
        .add_plugins(MinimalPlugins)
        .add_systems(
            Update,
            (
                snapshot::apply_pending_snapshots,
                reconcile::follow_authoritative_moves,
                authority::pump_authority_replies,
                animation::begin_movement_animations,
                animation::begin_attack_animations,
                reconcile::record_move_adjudications,
                reconcile::record_attack_adjudications,
                animation::advance_movement_animations,
                reconcile::finalize_movements,
                reconcile::finalize_attacks,
            )
                .chain(),
        );

    app
}

/// Advance the engine by one tick.
///
/// Each call drains pending snapshots and authority replies, consumes the
/// events they produce, and advances every live animation by the sampled
/// wall-clock delta.
pub fn run_tick(app: &mut App) {
    app.update();
}
