mod common;

use std::time::Duration;

use anyhow::bail;
use grid_core::{
    AnimationLedger, AuthorityReply, AuthorityRequest, EntityRecord, EntityRoster, Senses,
    TileCoord,
};

use common::{advance, harness, request_move_now, SCOUT, SCOUT_SNAPSHOT};

/// Refresh placing the scout on the same tile but with a different senses
/// table, as the periodic poll would mid-move.
const MID_MOVE_REFRESH: &str = r#"{
    "revision": 2,
    "entities": [
        {
            "id": 7,
            "position": [2, 2],
            "senses": {
                "paths": { "6,2": [[3, 2], [4, 2], [5, 2], [6, 2]] }
            }
        }
    ]
}"#;

const MOVED_REFRESH: &str = r#"{
    "revision": 2,
    "entities": [
        { "id": 7, "position": [4, 4], "senses": {} }
    ]
}"#;

const STALE_REFRESH: &str = r#"{
    "revision": 1,
    "entities": [
        { "id": 7, "position": [8, 8], "senses": {} }
    ]
}"#;

#[test]
fn background_refresh_never_clobbers_inflight_visual_state() -> anyhow::Result<()> {
    let mut h = harness();
    h.snapshots.push_json(SCOUT_SNAPSHOT)?;
    h.app.update();

    assert!(request_move_now(&mut h.app, SCOUT, TileCoord::new(5, 2)));
    h.app.update();
    advance(&mut h.app, 0.25);

    h.snapshots.push_json(MID_MOVE_REFRESH)?;
    advance(&mut h.app, 0.05);

    let animations = h.app.world.resource::<AnimationLedger>();
    assert!(animations.is_moving(SCOUT), "refresh must not stop the move");
    assert!(!animations.is_synced(SCOUT));
    let visual = animations.visual_position(SCOUT).unwrap();
    assert!(
        visual.x > 2.0 && visual.x < 5.0,
        "visual position stays mid-path, got {visual:?}"
    );
    let roster = h.app.world.resource::<EntityRoster>();
    let record = roster.get(SCOUT).unwrap();
    assert!(
        record.senses.paths.contains_key(&TileCoord::new(6, 2)),
        "senses were replaced wholesale by the refresh"
    );

    // The move still reconciles normally afterwards.
    let request = h.authority.requests.recv_timeout(Duration::from_secs(1))?;
    let AuthorityRequest::Move {
        entity, generation, ..
    } = request
    else {
        bail!("expected a move request");
    };
    h.authority
        .replies
        .send(AuthorityReply::Move {
            entity,
            generation,
            outcome: Ok(EntityRecord {
                id: entity,
                position: TileCoord::new(5, 2),
                senses: Senses::default(),
            }),
        })
        .unwrap();
    advance(&mut h.app, 1.0);

    let animations = h.app.world.resource::<AnimationLedger>();
    assert!(!animations.is_moving(SCOUT));
    assert_eq!(
        animations.visual_position(SCOUT),
        Some(TileCoord::new(5, 2).to_vec2())
    );
    Ok(())
}

#[test]
fn idle_entities_follow_the_refresh() -> anyhow::Result<()> {
    let mut h = harness();
    h.snapshots.push_json(SCOUT_SNAPSHOT)?;
    h.app.update();

    h.snapshots.push_json(MOVED_REFRESH)?;
    h.app.update();

    let animations = h.app.world.resource::<AnimationLedger>();
    assert_eq!(
        animations.visual_position(SCOUT),
        Some(TileCoord::new(4, 4).to_vec2())
    );
    assert!(animations.is_synced(SCOUT));
    Ok(())
}

#[test]
fn stale_refresh_is_dropped() -> anyhow::Result<()> {
    let mut h = harness();
    h.snapshots.push_json(SCOUT_SNAPSHOT)?;
    h.app.update();

    h.snapshots.push_json(STALE_REFRESH)?;
    h.app.update();

    assert_eq!(
        h.app.world.resource::<EntityRoster>().position(SCOUT),
        Some(TileCoord::new(2, 2)),
        "an older revision must never overwrite a newer one"
    );
    Ok(())
}
