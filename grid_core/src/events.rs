//! Typed events connecting the coordinators to state mutation and observers.
//!
//! Producers are the movement/attack coordinators and the authority reply
//! pump; the animation state machine is the mandatory consumer, and any
//! number of additional readers (rendering, logging) may subscribe. For a
//! single entity, events are observed in emission order.

use bevy::prelude::Event;

use crate::authority::AuthorityError;
use crate::entities::{EntityId, EntityRecord, Generation};
use crate::tile::TileCoord;

/// An optimistic movement animation has started for `entity`.
///
/// `path` is inclusive of the entity's authoritative tile at request time.
#[derive(Event, Debug, Clone)]
pub struct MovementStarted {
    pub entity: EntityId,
    pub path: Vec<TileCoord>,
    pub generation: Generation,
}

/// The authority confirmed the move issued under `generation`.
#[derive(Event, Debug, Clone)]
pub struct MovementAdopted {
    pub entity: EntityId,
    pub record: EntityRecord,
    pub generation: Generation,
}

/// The authority rejected the move issued under `generation`.
#[derive(Event, Debug, Clone)]
pub struct MovementRejected {
    pub entity: EntityId,
    pub error: AuthorityError,
    pub generation: Generation,
}

/// An optimistic attack animation has started for `entity`.
#[derive(Event, Debug, Clone)]
pub struct AttackStarted {
    pub entity: EntityId,
    pub target: EntityId,
    pub generation: Generation,
}

/// The authority confirmed the attack issued under `generation`.
#[derive(Event, Debug, Clone)]
pub struct AttackAdopted {
    pub entity: EntityId,
    pub record: EntityRecord,
    pub generation: Generation,
}

/// The authority rejected the attack issued under `generation`.
#[derive(Event, Debug, Clone)]
pub struct AttackRejected {
    pub entity: EntityId,
    pub error: AuthorityError,
    pub generation: Generation,
}
