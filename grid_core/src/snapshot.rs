//! Periodic authoritative world refresh.
//!
//! Snapshots arrive from outside the engine loop on a channel, carrying the
//! wire shape the authority publishes: per-entity position plus senses whose
//! path table is keyed by stringified tile coordinates. Merging only ever
//! overwrites authoritative fields; animation state is written exclusively
//! by the reconciler.

use std::collections::HashMap;

use bevy::prelude::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::animation::AnimationLedger;
use crate::entities::{EntityId, EntityRecord, EntityRoster, Senses};
use crate::resources::EngineConfig;
use crate::tile::TileCoord;

/// Wire shape of a full world refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotWire {
    pub revision: u64,
    pub entities: Vec<EntityWire>,
}

/// Wire shape of one entity inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityWire {
    pub id: u64,
    pub position: [i32; 2],
    #[serde(default)]
    pub senses: SensesWire,
}

/// Wire shape of an entity's senses. Paths are keyed by the `"x,y"`
/// rendering of the target tile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensesWire {
    #[serde(default)]
    pub paths: HashMap<String, Vec<[i32; 2]>>,
    #[serde(default)]
    pub visible_tiles: Vec<[i32; 2]>,
    #[serde(default)]
    pub seen_tiles: Vec<[i32; 2]>,
    #[serde(default)]
    pub visible_entities: Vec<u64>,
}

/// Error converting a wire payload into typed records.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed snapshot payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid tile key {key:?} in senses for entity {entity}")]
    InvalidTileKey { entity: u64, key: String },
}

impl SnapshotWire {
    pub fn from_json(payload: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(payload)?)
    }
}

fn tile(raw: [i32; 2]) -> TileCoord {
    TileCoord::new(raw[0], raw[1])
}

impl TryFrom<EntityWire> for EntityRecord {
    type Error = WireError;

    fn try_from(wire: EntityWire) -> Result<Self, Self::Error> {
        let mut paths = HashMap::with_capacity(wire.senses.paths.len());
        for (key, waypoints) in wire.senses.paths {
            let target: TileCoord = key.parse().map_err(|_| WireError::InvalidTileKey {
                entity: wire.id,
                key,
            })?;
            paths.insert(target, waypoints.into_iter().map(tile).collect());
        }
        Ok(EntityRecord {
            id: EntityId(wire.id),
            position: tile(wire.position),
            senses: Senses {
                paths,
                visible_tiles: wire.senses.visible_tiles.into_iter().map(tile).collect(),
                seen_tiles: wire.senses.seen_tiles.into_iter().map(tile).collect(),
                visible_entities: wire
                    .senses
                    .visible_entities
                    .into_iter()
                    .map(EntityId)
                    .collect(),
            },
        })
    }
}

/// Engine-side receiver of the snapshot feed.
#[derive(Resource)]
pub struct SnapshotFeed {
    pub(crate) incoming: Receiver<SnapshotWire>,
}

/// Producer handle for whatever polls or receives snapshots externally.
#[derive(Clone)]
pub struct SnapshotIngest {
    sender: Sender<SnapshotWire>,
}

impl SnapshotFeed {
    /// Create a connected ingest/feed pair.
    pub fn channel() -> (SnapshotIngest, SnapshotFeed) {
        let (sender, incoming) = unbounded();
        (SnapshotIngest { sender }, SnapshotFeed { incoming })
    }
}

impl SnapshotIngest {
    pub fn push(&self, snapshot: SnapshotWire) {
        if let Err(err) = self.sender.send(snapshot) {
            warn!("snapshot feed closed, dropping refresh: {err}");
        }
    }

    /// Parse a JSON payload and queue it for the next engine tick.
    pub fn push_json(&self, payload: &str) -> Result<(), WireError> {
        let snapshot = SnapshotWire::from_json(payload)?;
        self.push(snapshot);
        Ok(())
    }
}

/// Drain the feed and merge every pending refresh into the roster.
///
/// A malformed payload is an upstream contract breach: it is reported loudly
/// and the whole snapshot is dropped rather than half-applied.
pub fn apply_pending_snapshots(
    feed: Res<SnapshotFeed>,
    mut roster: ResMut<EntityRoster>,
    mut animations: ResMut<AnimationLedger>,
    config: Res<EngineConfig>,
) {
    while let Ok(wire) = feed.incoming.try_recv() {
        let revision = wire.revision;
        let mut records = Vec::with_capacity(wire.entities.len());
        let mut malformed = false;
        for entity in wire.entities {
            match EntityRecord::try_from(entity) {
                Ok(record) => records.push(record),
                Err(err) => {
                    error!(revision, "dropping snapshot: {err}");
                    malformed = true;
                    break;
                }
            }
        }
        if malformed {
            continue;
        }
        if !roster.merge_snapshot(revision, records) {
            continue;
        }
        debug!(revision, entities = roster.len(), "world snapshot merged");
        for (id, record) in roster.iter() {
            animations.ensure(id, record.position, &config);
        }
    }
}
