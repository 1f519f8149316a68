//! Headless demo driving the engine against a scripted loopback authority.
//!
//! Spawns a thread that approves every request after a short delay, feeds an
//! initial world snapshot, directs one entity across the grid, and ticks the
//! engine until the move reconciles.

use std::thread;
use std::time::Duration;

use bevy::ecs::system::RunSystemOnce;
use tracing::info;

use grid_core::{
    build_engine_app, request_move, run_tick, AnimationLedger, AuthorityEndpoint, AuthorityLink,
    AuthorityReply, AuthorityRequest, EntityId, EntityRecord, EntityRoster, MovementLedger,
    MovementParams, Senses, SnapshotFeed, TileCoord,
};

const SCOUT: EntityId = EntityId(7);

const INITIAL_SNAPSHOT: &str = r#"{
    "revision": 1,
    "entities": [
        {
            "id": 7,
            "position": [2, 2],
            "senses": {
                "paths": { "5,2": [[3, 2], [4, 2], [5, 2]] },
                "visible_tiles": [[2, 2], [3, 2], [4, 2], [5, 2]],
                "seen_tiles": [[2, 2]],
                "visible_entities": []
            }
        }
    ]
}"#;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (link, endpoint) = AuthorityLink::channel();
    let (ingest, feed) = SnapshotFeed::channel();
    let mut app = build_engine_app(link, feed);

    spawn_scripted_authority(endpoint);
    ingest
        .push_json(INITIAL_SNAPSHOT)
        .expect("demo snapshot is well formed");
    run_tick(&mut app);

    let target = TileCoord::new(5, 2);
    let accepted = app
        .world
        .run_system_once(move |mut params: MovementParams| {
            request_move(&mut params, SCOUT, target)
        });
    info!(accepted, %target, "move requested");

    while app.world.resource::<MovementLedger>().is_live(SCOUT) {
        run_tick(&mut app);
        thread::sleep(Duration::from_millis(16));
    }

    let animations = app.world.resource::<AnimationLedger>();
    let roster = app.world.resource::<EntityRoster>();
    info!(
        position = %roster.position(SCOUT).expect("scout is tracked"),
        visual = ?animations.visual_position(SCOUT),
        synced = animations.is_synced(SCOUT),
        "move reconciled"
    );
}

/// Approve every request after a short delay, echoing the entity back at its
/// requested target the way the real authority would.
fn spawn_scripted_authority(endpoint: AuthorityEndpoint) {
    thread::spawn(move || {
        while let Ok(request) = endpoint.requests.recv() {
            thread::sleep(Duration::from_millis(120));
            match request {
                AuthorityRequest::Move {
                    entity,
                    target,
                    generation,
                } => {
                    let record = EntityRecord {
                        id: entity,
                        position: target,
                        senses: Senses::default(),
                    };
                    let _ = endpoint.replies.send(AuthorityReply::Move {
                        entity,
                        generation,
                        outcome: Ok(record),
                    });
                }
                AuthorityRequest::Attack {
                    entity, generation, ..
                } => {
                    let record = EntityRecord {
                        id: entity,
                        position: TileCoord::new(2, 2),
                        senses: Senses::default(),
                    };
                    let _ = endpoint.replies.send(AuthorityReply::Attack {
                        entity,
                        generation,
                        outcome: Ok(record),
                    });
                }
            }
        }
    });
}
