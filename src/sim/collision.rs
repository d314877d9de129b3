//! Collision detection and dispatch
//!
//! Each step tests the configured group pairs, hands every touching pair to
//! the handler registered for their kinds, and fires a stop handler for
//! pairs that touched last step but no longer do.

use std::collections::{BTreeSet, HashMap};

use super::entity::{Collidable, Entity, EntityId, Kind};
use super::group::Group;
use super::impact::{BodySnapshot, resolve};
use super::state::{DestroyCause, SimEvent, World};

/// Two groups tested against each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollidablePair {
    pub a: Group,
    pub b: Group,
    /// Confirm rectangle hits against the pixel masks
    pub use_mask: bool,
}

const fn pair(a: Group, b: Group, use_mask: bool) -> CollidablePair {
    CollidablePair { a, b, use_mask }
}

/// Player projectiles use rectangles only, which makes them easier to land
pub const COLLIDABLE_PAIRS: [CollidablePair; 8] = [
    pair(Group::FriendlyShields, Group::EnemyShields, true),
    pair(Group::FriendlyShields, Group::EnemyShips, true),
    pair(Group::FriendlyShips, Group::EnemyShields, true),
    pair(Group::FriendlyShips, Group::EnemyShips, true),
    pair(Group::FriendlyShields, Group::EnemyProjectiles, true),
    pair(Group::EnemyShields, Group::FriendlyProjectiles, false),
    pair(Group::FriendlyShips, Group::EnemyProjectiles, true),
    pair(Group::EnemyShips, Group::FriendlyProjectiles, false),
];

/// Collision callback; the first id has the kind the handler was registered for
pub type Handler = fn(&mut World, EntityId, EntityId);

/// Handlers keyed by (own kind, other kind)
#[derive(Debug, Clone, Default)]
pub struct CollisionTable {
    collide: HashMap<(Kind, Kind), Handler>,
    stop: HashMap<(Kind, Kind), Handler>,
}

impl CollisionTable {
    /// The handlers every world starts with
    pub fn standard() -> Self {
        let mut table = Self::default();
        table.on_collide(Kind::Projectile, Kind::Ship, projectile_hit);
        table.on_collide(Kind::Projectile, Kind::Shield, projectile_hit);
        table.on_collide(Kind::Mass, Kind::Mass, mass_collision);
        table.on_stop(Kind::Projectile, Kind::Mass, projectile_left);
        table
    }

    pub fn on_collide(&mut self, own: Kind, other: Kind, handler: Handler) {
        self.collide.insert((own, other), handler);
    }

    pub fn on_stop(&mut self, own: Kind, other: Kind, handler: Handler) {
        self.stop.insert((own, other), handler);
    }

    /// Handler for `a` touching `b`, and whether the arguments must be swapped
    pub fn collide_handler(&self, a: Kind, b: Kind) -> Option<(Handler, bool)> {
        lookup(&self.collide, a, b)
    }

    pub fn stop_handler(&self, a: Kind, b: Kind) -> Option<(Handler, bool)> {
        lookup(&self.stop, a, b)
    }
}

/// Most derived match first, trying both orientations at each step up the
/// two lineages. The kinds are put in a fixed order before searching, so
/// `(a, b)` and `(b, a)` always land on the same handler.
fn lookup(table: &HashMap<(Kind, Kind), Handler>, a: Kind, b: Kind) -> Option<(Handler, bool)> {
    if b < a {
        return lookup(table, b, a).map(|(handler, swapped)| (handler, !swapped));
    }
    let (la, lb): (Vec<Kind>, Vec<Kind>) = (a.lineage().collect(), b.lineage().collect());
    for level in 0..la.len() + lb.len() - 1 {
        for (i, &own) in la.iter().enumerate().take(level + 1) {
            let Some(&other) = lb.get(level - i) else {
                continue;
            };
            if let Some(&handler) = table.get(&(own, other)) {
                return Some((handler, false));
            }
            if let Some(&handler) = table.get(&(other, own)) {
                return Some((handler, true));
            }
        }
    }
    None
}

fn ordered(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl World {
    /// Run the handler for `a` touching `b`
    pub fn collide(&mut self, a: EntityId, b: EntityId) {
        let Some((ka, kb)) = self.kinds(a, b) else {
            return;
        };
        match self.collisions.collide_handler(ka, kb) {
            Some((handler, false)) => handler(self, a, b),
            Some((handler, true)) => handler(self, b, a),
            None => {
                if self.unhandled.insert((ka, kb)) {
                    log::warn!("No collision handler for {ka:?} and {kb:?}");
                }
            }
        }
    }

    /// Run the stop handler for `a` and `b` parting, if any
    pub fn stop_colliding(&mut self, a: EntityId, b: EntityId) {
        let Some((ka, kb)) = self.kinds(a, b) else {
            return;
        };
        match self.collisions.stop_handler(ka, kb) {
            Some((handler, false)) => handler(self, a, b),
            Some((handler, true)) => handler(self, b, a),
            None => {}
        }
    }

    fn kinds(&self, a: EntityId, b: EntityId) -> Option<(Kind, Kind)> {
        Some((self.entities.get(&a)?.kind, self.entities.get(&b)?.kind))
    }

    fn touching(&self, a: EntityId, b: EntityId, use_mask: bool) -> bool {
        match (self.entities.get(&a), self.entities.get(&b)) {
            (Some(ea), Some(eb)) => {
                // Sides can flip mid-step (mind control)
                ea.side != eb.side
                    && ea.is_collidable()
                    && eb.is_collidable()
                    && ea.touches(eb, use_mask)
            }
            _ => false,
        }
    }

    /// Test every collidable pair, dispatching each touching pair once
    pub(crate) fn check_collisions(&mut self) {
        let mut touching = BTreeSet::new();
        for pair in COLLIDABLE_PAIRS {
            let left = self.groups.members(pair.a).to_vec();
            let right = self.groups.members(pair.b).to_vec();
            for &a in &left {
                for &b in &right {
                    let key = ordered(a, b);
                    if a == b || touching.contains(&key) || !self.touching(a, b, pair.use_mask) {
                        continue;
                    }
                    touching.insert(key);
                    self.collide(a, b);
                }
            }
        }

        let parted: Vec<_> = self.active_pairs.difference(&touching).copied().collect();
        for (a, b) in parted {
            // A pair that ended because one side died is dropped silently
            if self.is_alive(a) && self.is_alive(b) {
                self.stop_colliding(a, b);
            }
        }
        touching.retain(|&(a, b)| self.is_alive(a) && self.is_alive(b));
        self.active_pairs = touching;
    }
}

/// A projectile strikes a ship or a shield
fn projectile_hit(world: &mut World, projectile: EntityId, target: EntityId) {
    let Some(p) = world.entities.get(&projectile).and_then(Entity::projectile) else {
        return;
    };
    if p.passing_through.contains(&target) {
        return;
    }
    let damage = p.damage;
    let effects = p.effects.clone();
    let target_is_ship = world.entities.get(&target).is_some_and(|e| e.kind.is_ship());

    world.damage(target, damage);
    // Shields stop effects along with the projectile
    if target_is_ship {
        for effect in &effects {
            world.apply_effect(target, effect);
        }
    }

    let spent = match world.entities.get_mut(&projectile).and_then(Entity::projectile_mut) {
        Some(p) => {
            p.piercing_left = p.piercing_left.saturating_sub(1);
            if p.piercing_left > 0 {
                p.passing_through.insert(target);
            }
            p.piercing_left == 0
        }
        None => false,
    };
    if spent {
        world.remove_entity(projectile, DestroyCause::Spent);
    }
}

/// A piercing projectile has passed out of something it hit
fn projectile_left(world: &mut World, projectile: EntityId, target: EntityId) {
    if let Some(p) = world.entities.get_mut(&projectile).and_then(Entity::projectile_mut) {
        p.passing_through.remove(&target);
        if let Some(guidance) = &mut p.guidance {
            guidance.retarget();
        }
    }
}

/// Two masses (ships, shields) bump into each other
fn mass_collision(world: &mut World, a: EntityId, b: EntityId) {
    let (Some(ea), Some(eb)) = (world.entities.get(&a), world.entities.get(&b)) else {
        return;
    };
    fn snapshot(e: &Entity) -> BodySnapshot<'_> {
        BodySnapshot {
            pos: e.motion.pos,
            vel: e.motion.vel,
            mass: e.body.mass,
            elasticity: e.body.elasticity,
            mask: e.collider.mask(),
        }
    }
    let (roots, impact) = (
        (ea.root(), eb.root()),
        resolve(&snapshot(ea), &snapshot(eb), &world.limits),
    );
    let Some(impact) = impact else {
        return;
    };

    // A shield moves its owner with it
    for (id, root, pos, vel) in [
        (a, roots.0, impact.pos_a, impact.vel_a),
        (b, roots.1, impact.pos_b, impact.vel_b),
    ] {
        world.place(id, pos, vel);
        if root != id {
            world.place(root, pos, vel);
        }
    }
    world.damage(a, impact.damage_a);
    world.damage(b, impact.damage_b);
    world.push_event(SimEvent::CollisionDamage {
        a,
        b,
        damage_a: impact.damage_a,
        damage_b: impact.damage_b,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::Side;
    use crate::sim::testing::target_ship;
    use glam::Vec2;
    use std::ptr::fn_addr_eq;

    fn marker(world: &mut World, _a: EntityId, _b: EntityId) {
        world.push_event(SimEvent::WaveDeployed { wave: 99 });
    }

    #[test]
    fn test_lookup_walks_lineages() {
        let table = CollisionTable::standard();
        let (h, swapped) = table.collide_handler(Kind::Projectile, Kind::EnemyShip).unwrap();
        assert!(!swapped);
        assert!(fn_addr_eq(h, projectile_hit as Handler));
        let (h, swapped) = table.collide_handler(Kind::PlayerShip, Kind::Projectile).unwrap();
        assert!(swapped);
        assert!(fn_addr_eq(h, projectile_hit as Handler));
        let (h, _) = table.collide_handler(Kind::Shield, Kind::EnemyShip).unwrap();
        assert!(fn_addr_eq(h, mass_collision as Handler));
        assert!(table.collide_handler(Kind::Projectile, Kind::Projectile).is_none());
    }

    #[test]
    fn test_most_derived_handler_wins() {
        let mut table = CollisionTable::standard();
        table.on_collide(Kind::PlayerShip, Kind::EnemyShip, marker);
        let (h, _) = table.collide_handler(Kind::EnemyShip, Kind::PlayerShip).unwrap();
        assert!(fn_addr_eq(h, marker as Handler));
        let (h, _) = table.collide_handler(Kind::EnemyShip, Kind::EnemyShip).unwrap();
        assert!(fn_addr_eq(h, mass_collision as Handler));
    }

    #[test]
    fn test_dispatch_is_symmetric() {
        let mut table = CollisionTable::standard();
        table.on_collide(Kind::PlayerShip, Kind::EnemyShip, marker);
        let kinds = [
            Kind::PlayerShip,
            Kind::EnemyShip,
            Kind::Ship,
            Kind::Projectile,
            Kind::Shield,
            Kind::Mass,
        ];
        for a in kinds {
            for b in kinds {
                match (table.collide_handler(a, b), table.collide_handler(b, a)) {
                    (Some((f, f_swapped)), Some((g, g_swapped))) => {
                        assert!(fn_addr_eq(f, g), "{a:?} and {b:?} disagree");
                        if a != b {
                            assert_ne!(f_swapped, g_swapped);
                        }
                    }
                    (None, None) => {}
                    _ => panic!("{a:?} and {b:?} resolve in one order only"),
                }
            }
        }
    }

    fn ignore(_world: &mut World, _a: EntityId, _b: EntityId) {}

    fn parted(world: &mut World, _a: EntityId, _b: EntityId) {
        world.push_event(SimEvent::WaveDeployed { wave: 7 });
    }

    fn stop_count(world: &mut World) -> usize {
        world
            .drain_events()
            .iter()
            .filter(|e| **e == SimEvent::WaveDeployed { wave: 7 })
            .count()
    }

    /// Two overlapping ships whose stop handler records each parting
    fn overlapping_pair() -> (World, EntityId, EntityId) {
        let mut world = World::default();
        world.collisions = CollisionTable::default();
        world.collisions.on_collide(Kind::Ship, Kind::Ship, ignore);
        world.collisions.on_stop(Kind::Ship, Kind::Ship, parted);
        let spec = target_ship(5.0);
        let a = world.spawn_ship(&spec, Side::Friendly, Vec2::new(100.0, 100.0), Vec2::ZERO);
        let b = world.spawn_ship(&spec, Side::Enemy, Vec2::new(110.0, 100.0), Vec2::ZERO);
        (world, a, b)
    }

    #[test]
    fn test_stop_fires_once_when_pair_separates() {
        let (mut world, _, b) = overlapping_pair();
        let dt = 1.0 / 60.0;
        world.step(dt as f64, dt);
        world.step(2.0 * dt as f64, dt);
        assert_eq!(world.active_pairs.len(), 1);
        assert_eq!(stop_count(&mut world), 0);

        world.place(b, Vec2::new(400.0, 400.0), Vec2::ZERO);
        world.step(3.0 * dt as f64, dt);
        assert_eq!(stop_count(&mut world), 1);
        assert!(world.active_pairs.is_empty());
        world.step(4.0 * dt as f64, dt);
        assert_eq!(stop_count(&mut world), 0);
    }

    #[test]
    fn test_stop_skipped_when_member_dies() {
        let (mut world, _, b) = overlapping_pair();
        let dt = 1.0 / 60.0;
        world.step(dt as f64, dt);
        assert_eq!(world.active_pairs.len(), 1);

        world.destroy(b);
        world.step(2.0 * dt as f64, dt);
        world.step(3.0 * dt as f64, dt);
        assert_eq!(stop_count(&mut world), 0);
        assert!(world.active_pairs.is_empty());
    }

    #[test]
    fn test_unhandled_pair_is_ignored() {
        let mut world = World::default();
        world.collisions = CollisionTable::default();
        let spec = target_ship(5.0);
        let a = world.spawn_ship(&spec, Side::Friendly, Vec2::new(100.0, 100.0), Vec2::ZERO);
        let b = world.spawn_ship(&spec, Side::Enemy, Vec2::new(110.0, 100.0), Vec2::ZERO);
        world.collide(a, b);
        world.collide(a, b);
        assert_eq!(world.unhandled.len(), 1);
        assert!(world.drain_events().is_empty());
    }
}
