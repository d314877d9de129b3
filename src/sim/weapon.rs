//! Weapons: rate-limited projectile launchers

use std::rc::Rc;

use glam::Vec2;

use super::entity::{EntityId, Side};
use crate::blueprint::{ProjectileSpec, WeaponSpec};

#[derive(Debug, Clone)]
pub struct Weapon {
    pub key: Option<String>,
    shot_interval: f64,
    projectiles: Vec<Rc<ProjectileSpec>>,
    last_fired: f64,
    firing: bool,
}

/// A projectile the world should spawn
#[derive(Debug, Clone)]
pub struct Shot {
    pub firer: EntityId,
    pub side: Side,
    pub projectile: Rc<ProjectileSpec>,
    pub pos: Vec2,
    pub vel: Vec2,
}

impl Weapon {
    pub fn new(spec: &WeaponSpec) -> Self {
        Self {
            key: spec.key.clone(),
            shot_interval: spec.shot_interval as f64,
            projectiles: spec.projectiles.iter().cloned().map(Rc::new).collect(),
            // Ready to fire as soon as the trigger is pulled
            last_fired: f64::NEG_INFINITY,
            firing: false,
        }
    }

    pub fn start_firing(&mut self) {
        self.firing = true;
    }

    pub fn stop_firing(&mut self) {
        self.firing = false;
    }

    pub fn is_firing(&self) -> bool {
        self.firing
    }

    /// Launch speed of the lead projectile, for fire control
    pub fn projectile_speed(&self) -> f32 {
        self.projectiles.first().map_or(0.0, |p| p.speed)
    }

    /// Fire if the trigger is held and the interval has passed.
    ///
    /// Projectiles start at the firer's center with the firer's velocity plus
    /// their own speed along `direction`.
    pub fn tick(&mut self, now: f64, firer: EntityId, side: Side, pos: Vec2, vel: Vec2, direction: Vec2) -> Vec<Shot> {
        if !self.firing || now - self.last_fired <= self.shot_interval {
            return Vec::new();
        }
        self.last_fired = now;
        self.projectiles
            .iter()
            .map(|projectile| Shot {
                firer,
                side,
                projectile: Rc::clone(projectile),
                pos,
                vel: vel + direction * projectile.speed,
            })
            .collect()
    }
}
