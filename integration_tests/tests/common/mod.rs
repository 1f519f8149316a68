#![allow(dead_code)]

use std::time::Duration;

use bevy::ecs::system::RunSystemOnce;
use bevy::prelude::*;

use grid_core::{
    build_engine_app, cancel, request_attack, request_move, AttackParams, AuthorityEndpoint,
    AuthorityLink, EntityId, MovementAdopted, MovementParams, MovementRejected, MovementStarted,
    ReconcileParams, SnapshotFeed, SnapshotIngest, TileCoord,
};

pub const SCOUT: EntityId = EntityId(7);
pub const RAIDER: EntityId = EntityId(9);

/// World refresh used by most scenarios: the scout at (2,2) with paths east
/// to (5,2) and south to (2,5), and a visible raider at (3,3).
pub const SCOUT_SNAPSHOT: &str = r#"{
    "revision": 1,
    "entities": [
        {
            "id": 7,
            "position": [2, 2],
            "senses": {
                "paths": {
                    "5,2": [[3, 2], [4, 2], [5, 2]],
                    "2,5": [[2, 3], [2, 4], [2, 5]]
                },
                "visible_tiles": [[2, 2], [3, 2], [4, 2], [5, 2]],
                "seen_tiles": [[2, 2]],
                "visible_entities": [9]
            }
        },
        {
            "id": 9,
            "position": [3, 3],
            "senses": {}
        }
    ]
}"#;

pub struct Harness {
    pub app: App,
    pub authority: AuthorityEndpoint,
    pub snapshots: SnapshotIngest,
}

/// Build the engine with an extra observer recording movement events, the
/// way a rendering or logging subscriber would.
pub fn harness() -> Harness {
    let (link, endpoint) = AuthorityLink::channel();
    let (ingest, feed) = SnapshotFeed::channel();
    let mut app = build_engine_app(link, feed);
    app.init_resource::<EventLog>();
    app.add_systems(Update, record_events);
    Harness {
        app,
        authority: endpoint,
        snapshots: ingest,
    }
}

#[derive(Resource, Default)]
pub struct EventLog {
    pub started: Vec<MovementStarted>,
    pub adopted: Vec<MovementAdopted>,
    pub rejected: Vec<MovementRejected>,
}

fn record_events(
    mut log: ResMut<EventLog>,
    mut started: EventReader<MovementStarted>,
    mut adopted: EventReader<MovementAdopted>,
    mut rejected: EventReader<MovementRejected>,
) {
    for event in started.read() {
        log.started.push(event.clone());
    }
    for event in adopted.read() {
        log.adopted.push(event.clone());
    }
    for event in rejected.read() {
        log.rejected.push(event.clone());
    }
}

/// Advance the engine clock by `secs` and run one tick.
pub fn advance(app: &mut App, secs: f32) {
    app.world
        .resource_mut::<Time<Virtual>>()
        .advance_by(Duration::from_secs_f32(secs));
    app.update();
}

pub fn request_move_now(app: &mut App, entity: EntityId, target: TileCoord) -> bool {
    app.world
        .run_system_once(move |mut params: MovementParams| {
            request_move(&mut params, entity, target)
        })
}

pub fn request_attack_now(app: &mut App, entity: EntityId, target: EntityId) -> bool {
    app.world
        .run_system_once(move |mut params: AttackParams| {
            request_attack(&mut params, entity, target)
        })
}

pub fn cancel_now(app: &mut App, entity: EntityId) {
    app.world
        .run_system_once(move |mut params: ReconcileParams| cancel(&mut params, entity));
}
