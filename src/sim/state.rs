//! World state: entities, groups, spawning, damage and destruction
//!
//! The world owns every registry the simulation needs, so independent
//! worlds (tests, previews) never share state.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::behavior::MoveBehavior;
use super::collision::CollisionTable;
use super::effect::apply_effect;
use super::entity::{
    Body, Collider, Damageable, Entities, Entity, EntityId, Health, Kind, ProjectileState, Role,
    ShieldState, ShipState, Side,
};
use super::group::{Group, Groups};
use super::impact::ImpactLimits;
use super::level::LevelRun;
use super::mask::Mask;
use super::movement::{Bounds, Motion, Movable};
use super::screen::Screen;
use super::weapon::{Shot, Weapon};
use crate::blueprint::{EffectSpec, LevelSpec, ShapeSpec, ShipClass, ShipSpec};
use crate::settings::SimSettings;

/// Where the player ship appears, as proportions of the screen
pub const PLAYER_START: Vec2 = Vec2::new(0.5, 0.75);

/// Why an entity left the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestroyCause {
    /// Hull depleted, or destroyed from outside
    Killed,
    /// Drifted past the off-screen cutoff
    Culled,
    /// Projectile used up its piercing
    Spent,
    /// Shield whose owner is gone
    OwnerLost,
}

/// Something the adapters (renderer, audio, HUD) may react to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    EntityDestroyed {
        id: EntityId,
        kind: Kind,
        side: Side,
        key: Option<String>,
        pos: Vec2,
        mass: f32,
        cause: DestroyCause,
    },
    ProjectileFired {
        firer: EntityId,
        projectile: EntityId,
    },
    CollisionDamage {
        a: EntityId,
        b: EntityId,
        damage_a: f32,
        damage_b: f32,
    },
    WaveDeployed {
        wave: usize,
    },
    LevelComplete {
        name: String,
    },
}

/// The simulation
#[derive(Debug)]
pub struct World {
    settings: SimSettings,
    screen: Screen,
    pub(crate) limits: ImpactLimits,
    pub(crate) entities: Entities,
    pub(crate) groups: Groups,
    pub(crate) rng: Pcg32,
    /// Pairs that touched last step
    pub(crate) active_pairs: BTreeSet<(EntityId, EntityId)>,
    pub(crate) collisions: CollisionTable,
    /// Kind pairs already warned about as unhandled
    pub(crate) unhandled: HashSet<(Kind, Kind)>,
    pub(crate) events: Vec<SimEvent>,
    pub(crate) level: Option<LevelRun>,
    pub(crate) now: f64,
    masks: HashMap<ShapeSpec, Rc<Mask>>,
    player: Option<EntityId>,
    next_id: u32,
}

impl Default for World {
    fn default() -> Self {
        Self::new(SimSettings::default())
    }
}

impl World {
    pub fn new(settings: SimSettings) -> Self {
        Self {
            screen: settings.screen(),
            limits: ImpactLimits::from_settings(&settings),
            rng: Pcg32::seed_from_u64(settings.seed),
            settings,
            entities: Entities::new(),
            groups: Groups::default(),
            active_pairs: BTreeSet::new(),
            collisions: CollisionTable::standard(),
            unhandled: HashSet::new(),
            events: Vec::new(),
            level: None,
            now: 0.0,
            masks: HashMap::new(),
            player: None,
            next_id: 1,
        }
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// Time of the last step
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(Entity::is_alive)
    }

    /// Member ids in update order, for drawing
    pub fn members(&self, group: Group) -> &[EntityId] {
        self.groups.members(group)
    }

    pub fn group(&self, group: Group) -> impl Iterator<Item = &Entity> {
        self.groups
            .members(group)
            .iter()
            .filter_map(|id| self.entities.get(id))
    }

    pub fn player(&self) -> Option<EntityId> {
        self.player.filter(|&id| self.is_alive(id))
    }

    pub fn level(&self) -> Option<&LevelRun> {
        self.level.as_ref()
    }

    pub fn level_mut(&mut self) -> Option<&mut LevelRun> {
        self.level.as_mut()
    }

    /// Replace the running level
    pub fn start_level(&mut self, spec: LevelSpec) {
        log::info!("Starting level {}", spec.name);
        self.level = Some(LevelRun::new(spec, self.now));
    }

    /// Take the events produced since the last drain
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn push_event(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Shared mask for a shape
    pub fn mask_for(&mut self, shape: &ShapeSpec) -> Rc<Mask> {
        Rc::clone(
            self.masks
                .entry(shape.clone())
                .or_insert_with(|| Rc::new(Mask::from_shape(shape))),
        )
    }

    fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn sync_groups(&mut self, id: EntityId) {
        if let Some(e) = self.entities.get(&id) {
            let groups = Group::memberships(e.kind, e.side);
            self.groups.sync(id, &groups);
        }
    }

    fn insert(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.entities.insert(id, entity);
        self.sync_groups(id);
        id
    }

    /// Spawn a ship (and its shield) from a blueprint
    pub fn spawn_ship(&mut self, spec: &ShipSpec, side: Side, pos: Vec2, vel: Vec2) -> EntityId {
        let id = self.next_entity_id();
        let kind = match spec.class {
            ShipClass::Player => Kind::PlayerShip,
            ShipClass::Enemy => Kind::EnemyShip,
            ShipClass::Neutral => Kind::Ship,
        };
        let mut motion = Motion::new(spec.acceleration, Some(spec.max_speed)).at(pos, vel);
        if spec.stopping_distance > 0.0 {
            motion.stopping_distance = spec.stopping_distance;
        }
        let move_behavior = match (&spec.move_behavior, spec.class) {
            (_, ShipClass::Player) => MoveBehavior::Pilot,
            (Some(b), _) => MoveBehavior::from_spec(b, &self.screen),
            (None, _) => MoveBehavior::Idle,
        };
        let bounds = if spec.confined { Bounds::Confined } else { Bounds::Unconfined };
        let mut state = ShipState::new(spec.weapons.iter().map(Weapon::new).collect(), move_behavior, bounds);
        state.fire_behavior = spec.fire_behavior;

        let mask = self.mask_for(&spec.shape);
        let size = mask.size();
        let entity = Entity::new(
            id,
            kind,
            side,
            spec.key.clone(),
            motion,
            Collider::new(mask),
            Health::new(spec.hp),
            Body {
                mass: spec.mass,
                elasticity: spec.elasticity,
            },
            Role::Ship(Box::new(state)),
        );
        self.insert(entity);

        if let Some(shield) = &spec.shield {
            let shape = shield.shape.clone().unwrap_or(ShapeSpec::Ellipse {
                width: (size.x + 2.0 * shield.padding).round() as u32,
                height: (size.y + 2.0 * shield.padding).round() as u32,
            });
            let shield_id = self.next_entity_id();
            let entity = Entity::new(
                shield_id,
                Kind::Shield,
                side,
                shield.key.clone(),
                Motion::new(0.0, None).at(pos, vel),
                Collider::new(self.mask_for(&shape)),
                Health::new(shield.capacity),
                Body {
                    mass: spec.mass,
                    elasticity: shield.elasticity,
                },
                Role::Shield(ShieldState::new(id, shield.recharge_rate, shield.recharge_delay)),
            );
            self.insert(entity);
            if let Some(ship) = self.entities.get_mut(&id).and_then(Entity::ship_mut) {
                ship.shield = Some(shield_id);
            }
        }
        log::debug!("Spawned {kind:?} {:?} as {id:?} at {pos}", spec.key);
        id
    }

    /// Spawn the player ship at its start position, replacing any previous one
    pub fn spawn_player(&mut self, spec: &ShipSpec) -> EntityId {
        if let Some(old) = self.player() {
            self.destroy(old);
        }
        let pos = self.screen.to_pixels(PLAYER_START);
        let id = self.spawn_ship(spec, Side::Friendly, pos, Vec2::ZERO);
        self.player = Some(id);
        id
    }

    /// Spawn a projectile; weapons produce the shots
    pub fn spawn_projectile(&mut self, shot: Shot) -> EntityId {
        let id = self.next_entity_id();
        let spec = &shot.projectile;
        // Only guided projectiles are speed capped
        let guidance = spec
            .move_behavior
            .as_ref()
            .map(|b| MoveBehavior::from_spec(b, &self.screen));
        let max_speed = guidance.as_ref().map(|_| spec.max_speed);
        let state = ProjectileState {
            firer: shot.firer,
            damage: spec.damage,
            piercing_left: spec.piercing,
            passing_through: BTreeSet::new(),
            effects: spec.effects.clone(),
            guidance,
        };
        let mask = self.mask_for(&spec.shape);
        let entity = Entity::new(
            id,
            Kind::Projectile,
            shot.side,
            spec.key.clone(),
            Motion::new(spec.acceleration, max_speed).at(shot.pos, shot.vel),
            Collider::new(mask),
            Health::new(1.0),
            Body {
                mass: spec.mass,
                elasticity: spec.elasticity,
            },
            Role::Projectile(state),
        );
        self.insert(entity);
        self.push_event(SimEvent::ProjectileFired {
            firer: shot.firer,
            projectile: id,
        });
        id
    }

    /// Move an entity, setting its velocity
    pub fn place(&mut self, id: EntityId, pos: Vec2, vel: Vec2) {
        if let Some(e) = self.entities.get_mut(&id) {
            e.place(pos, vel);
        }
    }

    /// Damage an entity. Shields pass what they cannot absorb to their
    /// owner; a depleted hull destroys the ship.
    pub fn damage(&mut self, id: EntityId, amount: f32) {
        let now = self.now;
        let Some(e) = self.entities.get_mut(&id).filter(|e| e.is_alive()) else {
            return;
        };
        let overflow = e.damage(amount, now);
        let owner = e.shield().map(|s| s.owner);
        if e.is_destroyed() {
            log::debug!("{id:?} destroyed by {amount} damage");
            self.remove_entity(id, DestroyCause::Killed);
        }
        if let Some(owner) = owner.filter(|_| overflow > 0.0) {
            self.damage(owner, overflow);
        }
    }

    /// Apply a timed effect; `false` if the entity cannot carry effects
    pub fn apply_effect(&mut self, id: EntityId, spec: &EffectSpec) -> bool {
        let (now, screen) = (self.now, self.screen);
        let applied = self
            .entities
            .get_mut(&id)
            .filter(|e| e.is_alive())
            .is_some_and(|e| apply_effect(e, spec, now, &screen));
        if applied {
            self.sync_groups(id);
        }
        applied
    }

    pub fn destroy(&mut self, id: EntityId) {
        self.remove_entity(id, DestroyCause::Killed);
    }

    /// Mark an entity dead and record why. Dependents (a ship's shield) go
    /// with it. Removal from the groups happens in [`World::reap`].
    pub(crate) fn remove_entity(&mut self, id: EntityId, cause: DestroyCause) {
        let Some(e) = self.entities.get_mut(&id).filter(|e| e.is_alive()) else {
            return;
        };
        e.kill();
        let event = SimEvent::EntityDestroyed {
            id,
            kind: e.kind,
            side: e.side,
            key: e.key.clone(),
            pos: e.motion.pos,
            mass: e.body.mass,
            cause,
        };
        let shield = e.ship().and_then(|s| s.shield);
        self.push_event(event);
        if let Some(shield) = shield {
            self.remove_entity(shield, DestroyCause::OwnerLost);
        }
    }

    /// Drop dead entities from the world and every group
    pub fn reap(&mut self) {
        let dead: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| !e.is_alive())
            .map(|e| e.id)
            .collect();
        for id in dead {
            self.entities.remove(&id);
            self.groups.remove(id);
            if self.player == Some(id) {
                self.player = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::testing::{gunship, target_ship};

    #[test]
    fn test_spawn_ship_with_shield() {
        let mut world = World::default();
        let mut spec = target_ship(10.0);
        spec.shield = Some(crate::blueprint::ShieldSpec {
            key: None,
            capacity: 5.0,
            recharge_rate: 1.0,
            recharge_delay: 1.0,
            shape: None,
            padding: 6.0,
            elasticity: 0.5,
        });
        let id = world.spawn_ship(&spec, Side::Enemy, Vec2::new(100.0, 100.0), Vec2::ZERO);
        let shield = world.entity(id).and_then(|e| e.ship()).and_then(|s| s.shield).unwrap();
        assert_eq!(world.members(Group::EnemyShips), &[id]);
        assert_eq!(world.members(Group::AllShips), &[id]);
        assert_eq!(world.members(Group::EnemyShields), &[shield]);
        // Ellipse around a 32x32 hull with 6 px padding
        assert_eq!(world.entity(shield).unwrap().collider.size(), Vec2::new(44.0, 44.0));
    }

    #[test]
    fn test_shield_overflow_reaches_hull() {
        let mut world = World::default();
        let mut spec = target_ship(10.0);
        spec.shield = Some(crate::blueprint::ShieldSpec {
            key: None,
            capacity: 5.0,
            recharge_rate: 0.0,
            recharge_delay: 0.0,
            shape: None,
            padding: 6.0,
            elasticity: 0.5,
        });
        let id = world.spawn_ship(&spec, Side::Enemy, Vec2::new(100.0, 100.0), Vec2::ZERO);
        let shield = world.entity(id).and_then(|e| e.ship()).and_then(|s| s.shield).unwrap();
        world.damage(shield, 8.0);
        assert_eq!(world.entity(shield).unwrap().health.hp, 0.0);
        assert_eq!(world.entity(id).unwrap().health.hp, 7.0);
    }

    #[test]
    fn test_destroy_cascades_to_shield() {
        let mut world = World::default();
        let mut spec = gunship();
        spec.shield = Some(crate::blueprint::ShieldSpec {
            key: None,
            capacity: 5.0,
            recharge_rate: 0.0,
            recharge_delay: 0.0,
            shape: None,
            padding: 2.0,
            elasticity: 0.5,
        });
        let id = world.spawn_player(&spec);
        assert_eq!(world.entity(id).unwrap().motion.pos, Vec2::new(320.0, 360.0));
        world.destroy(id);
        let destroyed: Vec<_> = world
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                SimEvent::EntityDestroyed { kind, cause, .. } => Some((kind, cause)),
                _ => None,
            })
            .collect();
        assert_eq!(
            destroyed,
            vec![
                (Kind::PlayerShip, DestroyCause::Killed),
                (Kind::Shield, DestroyCause::OwnerLost)
            ]
        );
        world.reap();
        assert_eq!(world.entities().count(), 0);
        assert!(world.members(Group::FriendlyShields).is_empty());
        assert_eq!(world.player(), None);
    }

    #[test]
    fn test_masks_are_shared() {
        let mut world = World::default();
        let a = world.mask_for(&ShapeSpec::Circle { radius: 4 });
        let b = world.mask_for(&ShapeSpec::Circle { radius: 4 });
        assert!(Rc::ptr_eq(&a, &b));
    }
}
