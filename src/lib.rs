//! Astro Sim - entity simulation core for a 2D arcade space shooter
//!
//! Core modules:
//! - `config`: Template registry (declarative documents, references, copies)
//! - `blueprint`: Strongly typed templates built from the registry
//! - `sim`: World, movement, collision engine, behaviors, formations, waves
//! - `persistence`: Player profile save/load
//! - `settings`: Engine tunables
//!
//! Rendering, audio, input mapping and menus live outside this crate and
//! talk to the [`sim::World`] with plain data.

pub mod blueprint;
pub mod config;
pub mod persistence;
pub mod settings;
pub mod sim;

pub use config::{ConfigError, Registry, TemplateId};
pub use settings::SimSettings;
pub use sim::World;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Default screen size in pixels
    pub const SCREEN_WIDTH: f32 = 640.0;
    pub const SCREEN_HEIGHT: f32 = 480.0;
    /// Nominal frame rate; the simulation itself is frame-duration scaled
    pub const MAX_FPS: f32 = 60.0;

    /// Unconfined entities are destroyed this far past the screen edge
    pub const OFF_SCREEN_CUTOFF: f32 = 500.0;

    /// Scales the averaged elasticity into a restitution coefficient
    pub const BOUNCINESS_MULT: f32 = 1.0;
    /// Converts inelastic impulse into hull damage
    pub const COLLISION_DAMAGE_MULT: f32 = 1.0 / 50000.0;
    /// Each side of a qualifying mass collision takes at least this much
    pub const MIN_COLLISION_DAMAGE: f32 = 1.0;

    /// Distance at which a patrol point counts as reached
    pub const REACHED_DEST_THRESHOLD: f32 = 10.0;

    /// Fire-control gives up on intercepts further out than this (seconds)
    pub const MAX_INTERCEPT_TIME: f32 = 10.0;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Unsigned angular distance between two headings, in [0, π]
#[inline]
pub fn angle_distance(a: f32, b: f32) -> f32 {
    normalize_angle(a - b).abs()
}

/// Heading of a vector (radians, screen coordinates with y pointing down)
#[inline]
pub fn heading(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

/// Unit vector for a heading
#[inline]
pub fn from_heading(theta: f32) -> Vec2 {
    Vec2::new(theta.cos(), theta.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_angle_distance_wraps() {
        assert!((angle_distance(PI - 0.1, -PI + 0.1) - 0.2).abs() < 1e-5);
        assert!((angle_distance(0.0, PI / 2.0) - PI / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_heading_roundtrip() {
        let v = from_heading(1.0);
        assert!((heading(v) - 1.0).abs() < 1e-6);
    }
}
