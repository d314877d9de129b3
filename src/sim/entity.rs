//! Entities and their components
//!
//! An entity is a bundle of components (motion, collider, health, body)
//! plus a role carrying the state only ships, projectiles or shields have.
//! Capabilities are traits: [`Movable`], [`Damageable`], [`Collidable`].

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use super::behavior::MoveBehavior;
use super::effect::EffectQueue;
use super::mask::Mask;
use super::movement::{Bounds, Motion, Movable};
use super::screen::Rect;
use super::weapon::Weapon;
use crate::blueprint::{EffectSpec, FireBehaviorSpec};

/// Live entities, keyed (and iterated) by id
pub type Entities = BTreeMap<EntityId, Entity>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Friendly,
    Enemy,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Friendly => Side::Enemy,
            Side::Enemy => Side::Friendly,
        }
    }

    /// Direction weapons point without a fire-control solution
    pub fn facing(self) -> Vec2 {
        match self {
            Side::Friendly => Vec2::NEG_Y,
            Side::Enemy => Vec2::Y,
        }
    }
}

/// Type tag used for collision dispatch.
///
/// Tags form a small hierarchy: player and enemy ships are ships, ships and
/// shields are masses. Handlers registered on an ancestor cover every
/// descendant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Kind {
    PlayerShip,
    EnemyShip,
    Ship,
    Projectile,
    Shield,
    Mass,
}

impl Kind {
    pub fn parent(self) -> Option<Kind> {
        match self {
            Kind::PlayerShip | Kind::EnemyShip => Some(Kind::Ship),
            Kind::Ship | Kind::Shield => Some(Kind::Mass),
            Kind::Projectile | Kind::Mass => None,
        }
    }

    /// This tag followed by its ancestors, most derived first
    pub fn lineage(self) -> impl Iterator<Item = Kind> {
        std::iter::successors(Some(self), |k| k.parent())
    }

    pub fn is_a(self, other: Kind) -> bool {
        self.lineage().any(|k| k == other)
    }

    pub fn is_ship(self) -> bool {
        self.is_a(Kind::Ship)
    }
}

/// Pixel mask plus the rectangle it fills, centered on the entity position
#[derive(Debug, Clone)]
pub struct Collider {
    mask: Rc<Mask>,
}

impl Collider {
    pub fn new(mask: Rc<Mask>) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn size(&self) -> Vec2 {
        self.mask.size()
    }

    pub fn rect(&self, pos: Vec2) -> Rect {
        Rect::from_center(pos, self.size())
    }

    /// Integer top-left corner of the mask for a center at `pos`
    pub fn origin(&self, pos: Vec2) -> IVec2 {
        self.mask.origin_at(pos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub hp: f32,
    pub max_hp: f32,
}

impl Health {
    pub fn new(max_hp: f32) -> Self {
        Self { hp: max_hp, max_hp }
    }

    pub fn is_depleted(&self) -> bool {
        self.hp <= 0.0
    }
}

/// Physical properties for mass collisions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub mass: f32,
    /// 0 (fully inelastic) to 1 (fully elastic)
    pub elasticity: f32,
}

#[derive(Debug)]
pub struct ShipState {
    pub weapons: Vec<Weapon>,
    pub shield: Option<EntityId>,
    pub move_behavior: MoveBehavior,
    /// `None` leaves the trigger to the pilot
    pub fire_behavior: Option<FireBehaviorSpec>,
    pub effects: EffectQueue,
    /// Pilot direction, each axis in -1..=1
    pub steer: IVec2,
    /// Pilot holds the trigger
    pub trigger: bool,
    /// Velocity of the formation anchor while the ship flies in formation
    pub follow: Option<Vec2>,
    pub bounds: Bounds,
}

impl ShipState {
    pub fn new(weapons: Vec<Weapon>, move_behavior: MoveBehavior, bounds: Bounds) -> Self {
        Self {
            weapons,
            shield: None,
            move_behavior,
            fire_behavior: None,
            effects: EffectQueue::default(),
            steer: IVec2::ZERO,
            trigger: false,
            follow: None,
            bounds,
        }
    }
}

#[derive(Debug)]
pub struct ProjectileState {
    pub firer: EntityId,
    pub damage: f32,
    /// Distinct targets still to hit before the projectile is spent
    pub piercing_left: u32,
    /// Targets hit and still overlapping
    pub passing_through: BTreeSet<EntityId>,
    pub effects: Vec<EffectSpec>,
    pub guidance: Option<MoveBehavior>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShieldState {
    pub owner: EntityId,
    pub recharge_rate: f32,
    pub recharge_delay: f32,
    pub last_damaged: f64,
    pub recharging: bool,
}

impl ShieldState {
    pub fn new(owner: EntityId, recharge_rate: f32, recharge_delay: f32) -> Self {
        Self {
            owner,
            recharge_rate,
            recharge_delay,
            last_damaged: f64::NEG_INFINITY,
            recharging: false,
        }
    }

    /// Take up to `amount` out of `integrity`; returns the part absorbed
    pub fn absorb(&mut self, integrity: &mut Health, amount: f32, now: f64) -> f32 {
        if amount <= 0.0 {
            return 0.0;
        }
        let absorbed = amount.min(integrity.hp.max(0.0));
        integrity.hp -= absorbed;
        self.last_damaged = now;
        self.recharging = false;
        absorbed
    }

    pub fn recharge(&mut self, integrity: &mut Health, now: f64, elapsed: f32) {
        if integrity.hp >= integrity.max_hp {
            self.recharging = false;
            return;
        }
        if !self.recharging && now - self.last_damaged > self.recharge_delay as f64 {
            self.recharging = true;
        }
        if self.recharging {
            integrity.hp = (integrity.hp + self.recharge_rate * elapsed).min(integrity.max_hp);
            if integrity.hp >= integrity.max_hp {
                self.recharging = false;
            }
        }
    }
}

#[derive(Debug)]
pub enum Role {
    Ship(Box<ShipState>),
    Projectile(ProjectileState),
    Shield(ShieldState),
}

#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub kind: Kind,
    pub side: Side,
    /// Template key, for display and serialization
    pub key: Option<String>,
    pub motion: Motion,
    pub collider: Collider,
    /// Hull for ships, integrity for shields
    pub health: Health,
    pub body: Body,
    pub role: Role,
    alive: bool,
}

impl Entity {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: EntityId,
        kind: Kind,
        side: Side,
        key: Option<String>,
        motion: Motion,
        collider: Collider,
        health: Health,
        body: Body,
        role: Role,
    ) -> Self {
        Self {
            id,
            kind,
            side,
            key,
            motion,
            collider,
            health,
            body,
            role,
            alive: true,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Mark dead; the world reaps it at the end of the step
    pub(crate) fn kill(&mut self) {
        self.alive = false;
    }

    pub fn ship(&self) -> Option<&ShipState> {
        match &self.role {
            Role::Ship(ship) => Some(ship),
            _ => None,
        }
    }

    pub fn ship_mut(&mut self) -> Option<&mut ShipState> {
        match &mut self.role {
            Role::Ship(ship) => Some(ship),
            _ => None,
        }
    }

    pub fn projectile(&self) -> Option<&ProjectileState> {
        match &self.role {
            Role::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn projectile_mut(&mut self) -> Option<&mut ProjectileState> {
        match &mut self.role {
            Role::Projectile(p) => Some(p),
            _ => None,
        }
    }

    pub fn shield(&self) -> Option<&ShieldState> {
        match &self.role {
            Role::Shield(s) => Some(s),
            _ => None,
        }
    }

    /// The entity whose body answers for this one (a shield's owner)
    pub fn root(&self) -> EntityId {
        self.shield().map_or(self.id, |s| s.owner)
    }
}

impl Movable for Entity {
    fn motion(&self) -> &Motion {
        &self.motion
    }

    fn motion_mut(&mut self) -> &mut Motion {
        &mut self.motion
    }
}

/// Something that can take damage
pub trait Damageable {
    fn health(&self) -> &Health;

    /// Apply `amount` of damage at time `now`; returns the part that passes
    /// through to an owner
    fn damage(&mut self, amount: f32, now: f64) -> f32;

    fn is_destroyed(&self) -> bool {
        self.health().is_depleted()
    }
}

impl Damageable for Entity {
    fn health(&self) -> &Health {
        &self.health
    }

    fn damage(&mut self, amount: f32, now: f64) -> f32 {
        match &mut self.role {
            Role::Ship(_) => {
                self.health.hp -= amount;
                0.0
            }
            Role::Shield(shield) => amount - shield.absorb(&mut self.health, amount, now),
            Role::Projectile(_) => 0.0,
        }
    }

    /// Only hulls are destroyed by damage; a drained shield goes inactive
    fn is_destroyed(&self) -> bool {
        matches!(self.role, Role::Ship(_)) && self.health.is_depleted()
    }
}

/// Something with a collision shape
pub trait Collidable {
    fn kind(&self) -> Kind;
    fn is_collidable(&self) -> bool;
    fn rect(&self) -> Rect;
    fn mask(&self) -> &Mask;
    fn mask_origin(&self) -> IVec2;

    /// Rectangle test, confirmed against the masks when `use_mask` is set
    fn touches<C: Collidable>(&self, other: &C, use_mask: bool) -> bool
    where
        Self: Sized,
    {
        if !self.rect().intersects(&other.rect()) {
            return false;
        }
        !use_mask || self.mask().overlap(other.mask(), other.mask_origin() - self.mask_origin())
    }
}

impl Collidable for Entity {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn is_collidable(&self) -> bool {
        self.alive && !(matches!(self.role, Role::Shield(_)) && self.health.is_depleted())
    }

    fn rect(&self) -> Rect {
        self.collider.rect(self.motion.pos)
    }

    fn mask(&self) -> &Mask {
        self.collider.mask()
    }

    fn mask_origin(&self) -> IVec2 {
        self.collider.origin(self.motion.pos)
    }
}
