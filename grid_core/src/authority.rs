//! Engine-side half of the authority transport.
//!
//! Requests leave and replies return over crossbeam channels so the concrete
//! transport (thread, socket, test script) stays outside the engine loop.
//! Replies are completions of optimistic actions: they may arrive in any
//! order and may be duplicated, and every reply is matched against the live
//! animation's generation before anything is allowed to mutate.

use bevy::prelude::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, warn};

use crate::attack::AttackLedger;
use crate::entities::{EntityId, EntityRecord, Generation};
use crate::events::{AttackAdopted, AttackRejected, MovementAdopted, MovementRejected};
use crate::movement::MovementLedger;
use crate::tile::TileCoord;

/// Failure reported for an optimistic action. Every non-success outcome,
/// transport or validation, is treated uniformly as a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request denied: {0}")]
    Denied(String),
}

/// Request issued to the authority when an optimistic action starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorityRequest {
    Move {
        entity: EntityId,
        target: TileCoord,
        generation: Generation,
    },
    Attack {
        entity: EntityId,
        target: EntityId,
        generation: Generation,
    },
}

/// Asynchronous completion delivered back from the authority. A successful
/// outcome carries the refreshed entity record.
#[derive(Debug, Clone)]
pub enum AuthorityReply {
    Move {
        entity: EntityId,
        generation: Generation,
        outcome: Result<EntityRecord, AuthorityError>,
    },
    Attack {
        entity: EntityId,
        generation: Generation,
        outcome: Result<EntityRecord, AuthorityError>,
    },
}

/// Engine-side endpoints of the request/reply channels.
#[derive(Resource)]
pub struct AuthorityLink {
    requests: Sender<AuthorityRequest>,
    pub(crate) replies: Receiver<AuthorityReply>,
}

/// Transport-side endpoints, handed to whatever services the requests.
pub struct AuthorityEndpoint {
    pub requests: Receiver<AuthorityRequest>,
    pub replies: Sender<AuthorityReply>,
}

impl AuthorityLink {
    /// Create a connected link/endpoint pair.
    pub fn channel() -> (Self, AuthorityEndpoint) {
        let (request_tx, request_rx) = unbounded();
        let (reply_tx, reply_rx) = unbounded();
        (
            Self {
                requests: request_tx,
                replies: reply_rx,
            },
            AuthorityEndpoint {
                requests: request_rx,
                replies: reply_tx,
            },
        )
    }

    pub(crate) fn send(&self, request: AuthorityRequest) {
        if let Err(err) = self.requests.send(request) {
            warn!("authority link closed, dropping request: {err}");
        }
    }
}

/// Drain authority replies and emit adopted/rejected events for the ones
/// that still correspond to a live animation.
///
/// Anything else — no live animation, a superseded generation, a duplicate
/// of an already-adjudicated reply — is stale and silently discarded.
pub fn pump_authority_replies(
    link: Res<AuthorityLink>,
    movements: Res<MovementLedger>,
    attacks: Res<AttackLedger>,
    mut move_adopted: EventWriter<MovementAdopted>,
    mut move_rejected: EventWriter<MovementRejected>,
    mut attack_adopted: EventWriter<AttackAdopted>,
    mut attack_rejected: EventWriter<AttackRejected>,
) {
    while let Ok(reply) = link.replies.try_recv() {
        match reply {
            AuthorityReply::Move {
                entity,
                generation,
                outcome,
            } => {
                let Some(anim) = movements.get(entity) else {
                    debug!(%entity, %generation, "discarding move reply with no live movement");
                    continue;
                };
                if anim.generation != generation {
                    debug!(%entity, %generation, current = %anim.generation, "discarding stale move reply");
                    continue;
                }
                if !anim.approval.is_pending() {
                    debug!(%entity, %generation, "discarding duplicate move reply");
                    continue;
                }
                match outcome {
                    Ok(record) => {
                        move_adopted.send(MovementAdopted {
                            entity,
                            record,
                            generation,
                        });
                    }
                    Err(error) => {
                        move_rejected.send(MovementRejected {
                            entity,
                            error,
                            generation,
                        });
                    }
                }
            }
            AuthorityReply::Attack {
                entity,
                generation,
                outcome,
            } => {
                let Some(anim) = attacks.get(entity) else {
                    debug!(%entity, %generation, "discarding attack reply with no live attack");
                    continue;
                };
                if anim.generation != generation {
                    debug!(%entity, %generation, current = %anim.generation, "discarding stale attack reply");
                    continue;
                }
                if !anim.approval.is_pending() {
                    debug!(%entity, %generation, "discarding duplicate attack reply");
                    continue;
                }
                match outcome {
                    Ok(record) => {
                        attack_adopted.send(AttackAdopted {
                            entity,
                            record,
                            generation,
                        });
                    }
                    Err(error) => {
                        attack_rejected.send(AttackRejected {
                            entity,
                            error,
                            generation,
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    use crate::entities::Senses;
    use crate::movement::{Approval, MovementAnimation};

    fn test_app() -> (App, AuthorityEndpoint) {
        let mut app = App::new();
        let (link, endpoint) = AuthorityLink::channel();
        app.add_event::<MovementAdopted>();
        app.add_event::<MovementRejected>();
        app.add_event::<AttackAdopted>();
        app.add_event::<AttackRejected>();
        app.insert_resource(link);
        app.init_resource::<MovementLedger>();
        app.init_resource::<AttackLedger>();
        (app, endpoint)
    }

    fn live_movement(app: &mut App, entity: EntityId, generation: Generation) {
        let mut movements = app.world.resource_mut::<MovementLedger>();
        movements.insert(MovementAnimation {
            entity,
            path: vec![TileCoord::new(0, 0), TileCoord::new(1, 0)],
            target: TileCoord::new(1, 0),
            generation,
            started_at: 0.0,
            speed_tiles_per_sec: 4.0,
            progress: 0.0,
            segment: 0,
            approval: Approval::Pending,
        });
    }

    fn approved_record(entity: EntityId) -> EntityRecord {
        EntityRecord {
            id: entity,
            position: TileCoord::new(1, 0),
            senses: Senses::default(),
        }
    }

    #[test]
    fn matching_reply_emits_adoption() {
        let (mut app, endpoint) = test_app();
        let scout = EntityId(7);
        live_movement(&mut app, scout, Generation(3));

        endpoint
            .replies
            .send(AuthorityReply::Move {
                entity: scout,
                generation: Generation(3),
                outcome: Ok(approved_record(scout)),
            })
            .unwrap();
        app.world.run_system_once(pump_authority_replies);

        let mut events = app.world.resource_mut::<Events<MovementAdopted>>();
        assert_eq!(events.drain().count(), 1);
    }

    #[test]
    fn superseded_generation_is_discarded() {
        let (mut app, endpoint) = test_app();
        let scout = EntityId(7);
        live_movement(&mut app, scout, Generation(4));

        endpoint
            .replies
            .send(AuthorityReply::Move {
                entity: scout,
                generation: Generation(3),
                outcome: Ok(approved_record(scout)),
            })
            .unwrap();
        app.world.run_system_once(pump_authority_replies);

        let mut adopted = app.world.resource_mut::<Events<MovementAdopted>>();
        assert_eq!(adopted.drain().count(), 0, "stale reply must not surface");
    }

    #[test]
    fn reply_without_live_animation_is_discarded() {
        let (mut app, endpoint) = test_app();

        endpoint
            .replies
            .send(AuthorityReply::Move {
                entity: EntityId(7),
                generation: Generation(1),
                outcome: Err(AuthorityError::Denied("tile occupied".into())),
            })
            .unwrap();
        app.world.run_system_once(pump_authority_replies);

        let mut rejected = app.world.resource_mut::<Events<MovementRejected>>();
        assert_eq!(rejected.drain().count(), 0);
    }
}
