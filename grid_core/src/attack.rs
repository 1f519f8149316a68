//! Attack coordinator: mirrors the movement flow with a fixed-length
//! wind-up animation instead of a path traversal.

use std::collections::HashMap;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use tracing::{debug, info};

use crate::animation::AnimationLedger;
use crate::authority::{AuthorityLink, AuthorityRequest};
use crate::entities::{EntityId, EntityRoster, Generation, GenerationLedger};
use crate::events::AttackStarted;
use crate::movement::Approval;
use crate::resources::EngineConfig;

/// A live optimistic attack animation.
#[derive(Debug, Clone)]
pub struct AttackAnimation {
    pub entity: EntityId,
    pub target: EntityId,
    pub generation: Generation,
    pub started_at: f64,
    pub duration_secs: f32,
    pub approval: Approval,
}

impl AttackAnimation {
    pub fn wind_up_complete(&self, now: f64) -> bool {
        now - self.started_at >= f64::from(self.duration_secs)
    }
}

/// Live attack animations, at most one per entity.
#[derive(Resource, Debug, Default)]
pub struct AttackLedger {
    live: HashMap<EntityId, AttackAnimation>,
}

impl AttackLedger {
    pub fn is_live(&self, entity: EntityId) -> bool {
        self.live.contains_key(&entity)
    }

    pub fn get(&self, entity: EntityId) -> Option<&AttackAnimation> {
        self.live.get(&entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut AttackAnimation> {
        self.live.get_mut(&entity)
    }

    pub(crate) fn insert(&mut self, animation: AttackAnimation) {
        let previous = self.live.insert(animation.entity, animation);
        debug_assert!(previous.is_none(), "attack registered while another was live");
    }

    pub(crate) fn remove(&mut self, entity: EntityId) -> Option<AttackAnimation> {
        self.live.remove(&entity)
    }

    /// Entities whose wind-up has elapsed and whose verdict is known.
    pub(crate) fn ready_to_finalize(&self, now: f64) -> Vec<EntityId> {
        self.live
            .values()
            .filter(|anim| anim.wind_up_complete(now) && anim.approval.is_decided())
            .map(|anim| anim.entity)
            .collect()
    }
}

/// Everything the attack coordinator touches when starting an attack.
#[derive(SystemParam)]
pub struct AttackParams<'w> {
    pub roster: Res<'w, EntityRoster>,
    pub generations: ResMut<'w, GenerationLedger>,
    pub attacks: ResMut<'w, AttackLedger>,
    pub animations: ResMut<'w, AnimationLedger>,
    pub config: Res<'w, EngineConfig>,
    pub time: Res<'w, Time>,
    pub started: EventWriter<'w, AttackStarted>,
    pub link: Res<'w, AuthorityLink>,
}

/// Start an optimistic attack by `entity` on `target`.
///
/// Same contract as [`crate::movement::request_move`]: `true` means the
/// predicted animation has started; the authoritative verdict arrives via
/// [`crate::events::AttackAdopted`] / [`crate::events::AttackRejected`].
/// Fails without side effects when either entity is unknown, an attack is
/// already in flight, or the target is not currently visible to the attacker.
pub fn request_attack(params: &mut AttackParams, entity: EntityId, target: EntityId) -> bool {
    let Some(record) = params.roster.get(entity) else {
        debug!(%entity, %target, "attack request for unknown entity");
        return false;
    };
    if !params.roster.contains(target) {
        debug!(%entity, %target, "attack request for unknown target");
        return false;
    }
    if params.attacks.is_live(entity) {
        debug!(%entity, %target, "attack request while an attack is in flight");
        return false;
    }
    if !record.senses.visible_entities.contains(&target) {
        debug!(%entity, %target, "attack request for a target outside the senses");
        return false;
    }

    let generation = params.generations.advance(entity);
    params
        .animations
        .ensure(entity, record.position, &params.config);
    params.attacks.insert(AttackAnimation {
        entity,
        target,
        generation,
        started_at: params.time.elapsed_seconds_f64(),
        duration_secs: params.config.attack_duration_secs,
        approval: Approval::Pending,
    });
    params.started.send(AttackStarted {
        entity,
        target,
        generation,
    });
    params.link.send(AuthorityRequest::Attack {
        entity,
        target,
        generation,
    });
    info!(%entity, %target, %generation, "optimistic attack started");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    use crate::authority::AuthorityEndpoint;
    use crate::entities::{EntityRecord, Senses};
    use crate::tile::TileCoord;

    fn test_app() -> (App, AuthorityEndpoint) {
        let mut app = App::new();
        let (link, endpoint) = AuthorityLink::channel();
        app.add_event::<AttackStarted>();
        app.insert_resource(link);
        app.insert_resource(EngineConfig::default());
        app.init_resource::<EntityRoster>();
        app.init_resource::<GenerationLedger>();
        app.init_resource::<AttackLedger>();
        app.init_resource::<AnimationLedger>();
        app.init_resource::<Time>();
        (app, endpoint)
    }

    fn seed_pair(app: &mut App, attacker: EntityId, target: EntityId, target_visible: bool) {
        let mut senses = Senses::default();
        if target_visible {
            senses.visible_entities.insert(target);
        }
        let mut roster = app.world.resource_mut::<EntityRoster>();
        roster.merge_snapshot(
            1,
            vec![
                EntityRecord {
                    id: attacker,
                    position: TileCoord::new(2, 2),
                    senses,
                },
                EntityRecord {
                    id: target,
                    position: TileCoord::new(3, 3),
                    senses: Senses::default(),
                },
            ],
        );
    }

    fn try_attack(app: &mut App, entity: EntityId, target: EntityId) -> bool {
        app.world
            .run_system_once(move |mut params: AttackParams| {
                request_attack(&mut params, entity, target)
            })
    }

    #[test]
    fn invisible_target_fails_without_side_effects() {
        let (mut app, endpoint) = test_app();
        seed_pair(&mut app, EntityId(1), EntityId(2), false);

        assert!(!try_attack(&mut app, EntityId(1), EntityId(2)));
        assert!(endpoint.requests.try_recv().is_err());
        assert!(!app.world.resource::<AttackLedger>().is_live(EntityId(1)));
    }

    #[test]
    fn attack_is_single_flight() {
        let (mut app, endpoint) = test_app();
        seed_pair(&mut app, EntityId(1), EntityId(2), true);

        assert!(try_attack(&mut app, EntityId(1), EntityId(2)));
        assert!(!try_attack(&mut app, EntityId(1), EntityId(2)));

        assert_eq!(endpoint.requests.try_iter().count(), 1);
        let attacks = app.world.resource::<AttackLedger>();
        assert_eq!(
            attacks.get(EntityId(1)).expect("live attack").generation,
            Generation(1)
        );
    }
}
