//! Deterministic simulation module
//!
//! All gameplay logic lives here:
//! - Frame-duration scaled steps, driven by the caller's clock
//! - Seeded RNG only
//! - Stable iteration order (group order, then entity id)
//! - No rendering or platform dependencies

pub mod behavior;
pub mod collision;
pub mod effect;
pub mod entity;
pub mod formation;
pub mod group;
pub mod impact;
pub mod input;
pub mod level;
pub mod mask;
pub mod movement;
pub mod screen;
pub mod state;
pub mod tick;
pub mod wave;
pub mod weapon;

pub use behavior::{FireOrders, MoveBehavior, Route, acquire_target, fire_orders};
pub use collision::{COLLIDABLE_PAIRS, CollidablePair, CollisionTable, Handler};
pub use effect::{EffectKind, apply_effect, expire_effects};
pub use entity::{
    Body, Collidable, Collider, Damageable, Entities, Entity, EntityId, Health, Kind, Role, Side,
};
pub use formation::{FormationRun, layout_offsets};
pub use group::{Group, Groups, UPDATE_ORDER};
pub use impact::{BodySnapshot, Impact, ImpactLimits, resolve};
pub use input::{PlayerIntent, TickInput};
pub use level::{Campaign, CampaignProgress, LevelRun};
pub use mask::Mask;
pub use movement::{Bounds, Motion, Movable, lead_target};
pub use screen::{Rect, Screen};
pub use state::{DestroyCause, PLAYER_START, SimEvent, World};
pub use tick::tick;
pub use wave::{ConditionState, WaveCondition, WaveProgress};
pub use weapon::{Shot, Weapon};

/// Fixtures shared by the unit tests
#[cfg(test)]
pub(crate) mod testing {
    use std::rc::Rc;

    use glam::Vec2;

    use super::*;
    use crate::blueprint::{ProjectileSpec, ShapeSpec, ShipClass, ShipSpec, WeaponSpec};

    /// A bare 32x32 ship with an idle behavior
    pub fn ship_at(id: u32, side: Side, pos: Vec2) -> Entity {
        let kind = match side {
            Side::Friendly => Kind::PlayerShip,
            Side::Enemy => Kind::EnemyShip,
        };
        Entity::new(
            EntityId(id),
            kind,
            side,
            None,
            Motion::new(200.0, Some(100.0)).at(pos, Vec2::ZERO),
            Collider::new(Rc::new(Mask::filled(32, 32))),
            Health::new(10.0),
            Body {
                mass: 100.0,
                elasticity: 0.5,
            },
            Role::Ship(Box::new(entity::ShipState::new(
                Vec::new(),
                MoveBehavior::Idle,
                Bounds::Unconfined,
            ))),
        )
    }

    /// Unarmed enemy blueprint with the given hull
    pub fn target_ship(hp: f32) -> ShipSpec {
        ShipSpec {
            key: Some("Target".into()),
            class: ShipClass::Enemy,
            shape: ShapeSpec::Rect {
                width: 32,
                height: 32,
            },
            hp,
            mass: 100.0,
            elasticity: 0.5,
            acceleration: 200.0,
            max_speed: 100.0,
            stopping_distance: 0.0,
            confined: false,
            weapons: Vec::new(),
            shield: None,
            move_behavior: None,
            fire_behavior: None,
        }
    }

    pub fn bullet() -> ProjectileSpec {
        ProjectileSpec {
            key: Some("Bullet".into()),
            shape: ShapeSpec::Rect {
                width: 4,
                height: 12,
            },
            speed: 2000.0,
            damage: 1.0,
            piercing: 1,
            mass: 1.0,
            elasticity: 0.0,
            acceleration: 0.0,
            max_speed: 2000.0,
            move_behavior: None,
            effects: Vec::new(),
        }
    }

    /// Player blueprint carrying a Chaingun
    pub fn gunship() -> ShipSpec {
        ShipSpec {
            key: Some("Gunship".into()),
            class: ShipClass::Player,
            hp: 20.0,
            acceleration: 800.0,
            max_speed: 300.0,
            confined: true,
            weapons: vec![WeaponSpec {
                key: Some("Chaingun".into()),
                rate_of_fire: 10.0,
                shot_interval: 0.1,
                projectiles: vec![bullet()],
            }],
            ..target_ship(20.0)
        }
    }
}
