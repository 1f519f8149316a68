use std::collections::{HashMap, HashSet};
use std::fmt;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::tile::TileCoord;

/// Identifier for an entity tracked by the remote authority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-entity monotonic counter correlating asynchronous authority replies
/// with the optimistic action that issued them. A reply whose generation no
/// longer matches the live animation is stale and must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Precomputed reachability and visibility data for one entity, supplied by
/// the authority alongside each snapshot.
///
/// `paths[target]` holds the ordered waypoints from just after the entity's
/// current tile up to and including `target`; absence means the target is
/// currently unreachable. The whole struct is replaced wholesale on refresh,
/// never merged field by field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Senses {
    pub paths: HashMap<TileCoord, Vec<TileCoord>>,
    pub visible_tiles: HashSet<TileCoord>,
    pub seen_tiles: HashSet<TileCoord>,
    pub visible_entities: HashSet<EntityId>,
}

/// Authoritative record for one entity: its last confirmed tile plus the
/// senses computed from that tile.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: EntityId,
    pub position: TileCoord,
    pub senses: Senses,
}

/// Arena of authoritative entity records, keyed by entity id.
///
/// Position and senses are owned here and mutated only by authoritative data
/// (snapshot merges and adoptions); animation state lives elsewhere and is
/// never written through this resource.
#[derive(Resource, Debug, Default)]
pub struct EntityRoster {
    entities: HashMap<EntityId, EntityRecord>,
    last_revision: Option<u64>,
}

impl EntityRoster {
    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn position(&self, id: EntityId) -> Option<TileCoord> {
        self.entities.get(&id).map(|record| record.position)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &EntityRecord)> {
        self.entities.iter().map(|(id, record)| (*id, record))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Replace an entity's record with data confirmed by the authority.
    ///
    /// Adopting a record for an entity the roster has never seen indicates an
    /// upstream contract breach; it is reported loudly and the record is
    /// stored anyway so the roster converges on the authority's view.
    pub fn adopt(&mut self, record: EntityRecord) {
        let id = record.id;
        if self.entities.insert(id, record).is_none() {
            error!(entity = %id, "adopted a record for an entity missing from the roster");
            debug_assert!(false, "adoption for unknown entity {id}");
        }
    }

    /// Merge a full authoritative refresh, overwriting position and senses
    /// for every entity it carries. Returns `false` when the snapshot is not
    /// newer than the last one applied; stale snapshots are never merged.
    pub fn merge_snapshot(&mut self, revision: u64, records: Vec<EntityRecord>) -> bool {
        if let Some(last) = self.last_revision {
            if revision <= last {
                debug!(revision, last, "ignoring stale world snapshot");
                return false;
            }
        }
        self.last_revision = Some(revision);
        for record in records {
            self.entities.insert(record.id, record);
        }
        true
    }
}

/// Tracks the current generation for every entity.
#[derive(Resource, Debug, Default)]
pub struct GenerationLedger {
    current: HashMap<EntityId, Generation>,
}

impl GenerationLedger {
    /// Allocate the next generation for an entity.
    pub fn advance(&mut self, id: EntityId) -> Generation {
        let entry = self.current.entry(id).or_default();
        entry.0 += 1;
        *entry
    }

    pub fn current(&self, id: EntityId) -> Generation {
        self.current.get(&id).copied().unwrap_or_default()
    }
}
