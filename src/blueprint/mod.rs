//! Strongly typed blueprints built from resolved templates
//!
//! The registry stores loosely typed field maps; everything the simulation
//! spawns goes through one of these structs first, so a type mismatch is a
//! load-time [`ConfigError`](crate::ConfigError) naming the class, key and field.

mod behavior;
mod items;
mod level;
mod shape;

pub use behavior::{EffectSpec, FireBehaviorSpec, MoveBehaviorSpec, PatrolRoute};
pub use items::{ProjectileSpec, ShieldSpec, ShipClass, ShipSpec, WeaponSpec};
pub use level::{
    CampaignSpec, ConditionKind, FormationLayout, FormationSpec, LevelSpec, WaveConditionSpec,
    WaveSpec,
};
pub use shape::ShapeSpec;
