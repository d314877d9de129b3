//! Movement model
//!
//! Velocities change through bounded accelerations and positions integrate
//! with the trapezoidal rule, so a velocity step inside one frame moves the
//! entity by the average of the old and new velocity.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::screen::{Rect, Screen};
use crate::consts::MAX_INTERCEPT_TIME;

/// Kinematic state of anything that moves
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    /// Center position (sub-pixel)
    pub pos: Vec2,
    pub vel: Vec2,
    /// Velocity at the start of the current tick
    pub prev_vel: Vec2,
    /// Units per second squared
    pub acceleration: f32,
    /// `None` for uncapped movers (plain projectiles)
    pub max_speed: Option<f32>,
    /// `max_speed² / (2 * acceleration)`
    pub stopping_distance: f32,
}

impl Motion {
    pub fn new(acceleration: f32, max_speed: Option<f32>) -> Self {
        let stopping_distance = match max_speed {
            Some(max) if acceleration > 0.0 => max * max / (2.0 * acceleration),
            _ => 0.0,
        };
        Self {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            prev_vel: Vec2::ZERO,
            acceleration,
            max_speed,
            stopping_distance,
        }
    }

    pub fn at(mut self, pos: Vec2, vel: Vec2) -> Self {
        self.pos = pos;
        self.vel = vel;
        self.prev_vel = vel;
        self
    }

    /// Change the movement stats and recompute the stopping distance
    pub fn set_limits(&mut self, acceleration: f32, max_speed: Option<f32>) {
        let pos = self.pos;
        let (vel, prev_vel) = (self.vel, self.prev_vel);
        *self = Motion::new(acceleration, max_speed);
        self.pos = pos;
        self.vel = vel;
        self.prev_vel = prev_vel;
    }

    pub fn speed(&self) -> f32 {
        self.vel.length()
    }

    /// Remember this tick's starting velocity
    pub fn begin_tick(&mut self) {
        self.prev_vel = self.vel;
    }

    /// `pos += elapsed * (vel + prev_vel) / 2`
    pub fn integrate_position(&mut self, elapsed: f32) {
        self.pos += elapsed * (self.vel + self.prev_vel) / 2.0;
    }

    /// Move the velocity toward `target` by at most `acceleration * elapsed`
    pub fn accelerate_toward(&mut self, elapsed: f32, target: Vec2) {
        let dv = target - self.vel;
        let gap = dv.length();
        if gap == 0.0 {
            return;
        }
        let max_step = self.acceleration * elapsed;
        if gap <= max_step {
            self.vel = target;
        } else {
            self.vel += dv * (max_step / gap);
        }
    }

    /// Head for `point` at full speed, easing off inside the stopping
    /// distance when `decelerate` is set
    pub fn accelerate_toward_point(&mut self, elapsed: f32, point: Vec2, decelerate: bool) {
        let delta = point - self.pos;
        let distance = delta.length();
        if distance == 0.0 {
            return;
        }
        let mut target_speed = self.max_speed.unwrap_or(0.0);
        if decelerate && self.stopping_distance > 0.0 {
            target_speed *= (distance / self.stopping_distance).min(1.0);
        }
        self.accelerate_toward(elapsed, delta * (target_speed / distance));
    }

    /// Rescale the velocity to `max_speed` if it is faster
    pub fn clamp_speed(&mut self) {
        if let Some(max) = self.max_speed {
            let speed = self.speed();
            if speed > max && speed > 0.0 {
                self.vel *= max / speed;
            }
        }
    }

    pub fn kinetic_energy(&self, mass: f32) -> f32 {
        0.5 * mass * self.vel.length_squared()
    }
}

/// Anything carrying a [`Motion`]
pub trait Movable {
    fn motion(&self) -> &Motion;
    fn motion_mut(&mut self) -> &mut Motion;

    fn position(&self) -> Vec2 {
        self.motion().pos
    }

    fn velocity(&self) -> Vec2 {
        self.motion().vel
    }

    /// Put the mover at `pos` with velocity `vel`
    fn place(&mut self, pos: Vec2, vel: Vec2) {
        let motion = self.motion_mut();
        motion.pos = pos;
        motion.vel = vel;
        motion.prev_vel = vel;
    }

    fn accelerate_toward(&mut self, elapsed: f32, target: Vec2) {
        self.motion_mut().accelerate_toward(elapsed, target);
    }

    fn accelerate_toward_point(&mut self, elapsed: f32, point: Vec2, decelerate: bool) {
        self.motion_mut().accelerate_toward_point(elapsed, point, decelerate);
    }

    /// Distance check against a destination
    fn reached(&self, point: Vec2, threshold: f32) -> bool {
        self.position().distance(point) < threshold
    }
}

impl Movable for Motion {
    fn motion(&self) -> &Motion {
        self
    }

    fn motion_mut(&mut self) -> &mut Motion {
        self
    }
}

/// How an entity treats the screen edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bounds {
    /// Clamp to the screen and stop against the wall
    Confined,
    /// Free to leave; culled once far outside
    Unconfined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsOutcome {
    Inside,
    /// Pushed back onto the screen
    Clamped,
    /// Beyond the cutoff; the entity should be destroyed
    OutOfRange,
}

/// Apply the bounds rule to a mover whose solid area is `shape` (already
/// positioned for the current `motion.pos`)
pub fn apply_bounds(motion: &mut Motion, shape: Rect, mode: Bounds, screen: &Screen, cutoff: f32) -> BoundsOutcome {
    match mode {
        Bounds::Unconfined => {
            if screen.is_far_outside(shape.center(), cutoff) {
                BoundsOutcome::OutOfRange
            } else {
                BoundsOutcome::Inside
            }
        }
        Bounds::Confined => {
            let mut shift = Vec2::ZERO;
            let mut outcome = BoundsOutcome::Inside;
            for axis in 0..2 {
                let (lo, hi, extent) = (shape.min[axis], shape.max[axis], screen.size[axis]);
                if lo < 0.0 {
                    shift[axis] = -lo;
                } else if hi > extent {
                    shift[axis] = extent - hi;
                } else {
                    continue;
                }
                outcome = BoundsOutcome::Clamped;
                // Stop against the wall: drop the outward component
                let outward = shift[axis] < 0.0;
                for v in [&mut motion.vel, &mut motion.prev_vel] {
                    if (outward && v[axis] > 0.0) || (!outward && v[axis] < 0.0) {
                        v[axis] = 0.0;
                    }
                }
            }
            motion.pos += shift;
            outcome
        }
    }
}

/// Aim direction (unit vector) for a projectile launched at `projectile_speed`
/// relative to a shooter moving with `shooter_vel`, so that it meets a target
/// moving in a straight line.
///
/// Falls back to the point where the target leaves the screen when there is
/// no intercept, it lies too far in the future, or it is off screen.
pub fn lead_target(
    shooter_pos: Vec2,
    shooter_vel: Vec2,
    target_pos: Vec2,
    target_vel: Vec2,
    projectile_speed: f32,
    screen: &Screen,
) -> Vec2 {
    let d = target_pos - shooter_pos;
    let vr = target_vel - shooter_vel;
    let fallback = || {
        let exit = screen.exit_point(target_pos, target_vel);
        let aim = exit - shooter_pos;
        if aim.length_squared() > 0.0 {
            aim.normalize()
        } else {
            d.normalize_or(Vec2::NEG_Y)
        }
    };

    // |d + vr t| = s t
    let a = vr.length_squared() - projectile_speed * projectile_speed;
    let b = 2.0 * d.dot(vr);
    let c = d.length_squared();
    let t = if a.abs() < 1e-6 {
        if b.abs() < 1e-6 {
            return fallback();
        }
        -c / b
    } else {
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return fallback();
        }
        let root = disc.sqrt();
        let (t1, t2) = ((-b - root) / (2.0 * a), (-b + root) / (2.0 * a));
        match (t1 > 0.0, t2 > 0.0) {
            (true, true) => t1.min(t2),
            (true, false) => t1,
            (false, true) => t2,
            (false, false) => return fallback(),
        }
    };

    let intercept = target_pos + target_vel * t;
    if !(t > 0.0 && t <= MAX_INTERCEPT_TIME) || !screen.rect().contains(intercept) {
        return fallback();
    }
    (d + vr * t).normalize_or(Vec2::NEG_Y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mover() -> Motion {
        Motion::new(100.0, Some(200.0))
    }

    #[test]
    fn test_stopping_distance() {
        assert_eq!(mover().stopping_distance, 200.0);
        assert_eq!(Motion::new(0.0, Some(10.0)).stopping_distance, 0.0);
    }

    #[test]
    fn test_accelerate_toward_lands_exactly() {
        let mut m = mover();
        m.accelerate_toward(0.5, Vec2::new(30.0, 40.0));
        assert_eq!(m.vel, Vec2::new(30.0, 40.0));
        m.accelerate_toward(0.1, Vec2::new(30.0, 140.0));
        assert!((m.vel - Vec2::new(30.0, 50.0)).length() < 1e-4);
    }

    #[test]
    fn test_accelerate_toward_point_zero_distance() {
        let mut m = mover().at(Vec2::new(5.0, 5.0), Vec2::new(1.0, 0.0));
        m.accelerate_toward_point(0.1, Vec2::new(5.0, 5.0), true);
        assert_eq!(m.vel, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_decelerates_inside_stopping_distance() {
        let mut m = mover();
        // 50 px away with a 200 px stopping distance: approach at a quarter speed
        m.accelerate_toward_point(10.0, Vec2::new(50.0, 0.0), true);
        assert!((m.vel - Vec2::new(50.0, 0.0)).length() < 1e-4);
        let mut m = mover();
        m.accelerate_toward_point(10.0, Vec2::new(50.0, 0.0), false);
        assert!((m.vel - Vec2::new(200.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_confined_stops_at_wall() {
        let screen = Screen::new(640.0, 480.0);
        let mut m = mover().at(Vec2::new(635.0, 240.0), Vec2::new(50.0, -20.0));
        let shape = Rect::from_center(m.pos, Vec2::splat(20.0));
        let outcome = apply_bounds(&mut m, shape, Bounds::Confined, &screen, 500.0);
        assert_eq!(outcome, BoundsOutcome::Clamped);
        assert_eq!(m.pos, Vec2::new(630.0, 240.0));
        assert_eq!(m.vel, Vec2::new(0.0, -20.0));
    }

    #[test]
    fn test_unconfined_culled_past_cutoff() {
        let screen = Screen::new(640.0, 480.0);
        let mut m = mover().at(Vec2::new(320.0, -600.0), Vec2::ZERO);
        let shape = Rect::from_center(m.pos, Vec2::splat(10.0));
        assert_eq!(
            apply_bounds(&mut m, shape, Bounds::Unconfined, &screen, 500.0),
            BoundsOutcome::OutOfRange
        );
    }

    #[test]
    fn test_lead_stationary_target() {
        let screen = Screen::new(640.0, 480.0);
        let aim = lead_target(
            Vec2::new(100.0, 100.0),
            Vec2::ZERO,
            Vec2::new(100.0, 300.0),
            Vec2::ZERO,
            500.0,
            &screen,
        );
        assert!((aim - Vec2::new(0.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn test_lead_moving_target_intercepts() {
        let screen = Screen::new(640.0, 480.0);
        let (shooter, target, target_vel, speed) =
            (Vec2::new(320.0, 50.0), Vec2::new(100.0, 400.0), Vec2::new(60.0, 0.0), 400.0);
        let aim = lead_target(shooter, Vec2::ZERO, target, target_vel, speed, &screen);
        // Find the time the shot crosses the target's row and check both agree
        let t = (target.y - shooter.y) / (aim.y * speed);
        let shot = shooter + aim * speed * t;
        let future = target + target_vel * t;
        assert!((shot - future).length() < 0.5);
    }

    #[test]
    fn test_lead_unreachable_falls_back_to_exit_point() {
        let screen = Screen::new(640.0, 480.0);
        // Target outruns the projectile: aim where it leaves the screen
        let aim = lead_target(
            Vec2::new(320.0, 240.0),
            Vec2::ZERO,
            Vec2::new(400.0, 240.0),
            Vec2::new(1000.0, 0.0),
            100.0,
            &screen,
        );
        assert!((aim - Vec2::new(1.0, 0.0)).length() < 1e-5);
    }

    proptest! {
        #[test]
        fn prop_clamp_preserves_direction(vx in -1000.0f32..1000.0, vy in -1000.0f32..1000.0) {
            let mut m = mover();
            m.vel = Vec2::new(vx, vy);
            let before = m.vel;
            m.clamp_speed();
            if before.length() > 200.0 {
                prop_assert!((m.speed() - 200.0).abs() < 1e-2);
                prop_assert!(before.normalize().dot(m.vel.normalize()) > 0.9999);
            } else {
                prop_assert_eq!(m.vel, before);
            }
        }

        #[test]
        fn prop_acceleration_never_overshoots(
            tx in -300.0f32..300.0,
            ty in -300.0f32..300.0,
            dt in 0.001f32..0.1,
        ) {
            let mut m = mover();
            let target = Vec2::new(tx, ty);
            let mut gap = (target - m.vel).length();
            for _ in 0..10_000 {
                m.accelerate_toward(dt, target);
                let next = (target - m.vel).length();
                prop_assert!(next <= gap + 1e-3);
                gap = next;
                if m.vel == target {
                    break;
                }
            }
            prop_assert_eq!(m.vel, target);
        }

        #[test]
        fn prop_trapezoid_constant_velocity(
            vx in -500.0f32..500.0,
            vy in -500.0f32..500.0,
            n in 1usize..120,
            dt in 0.001f32..0.05,
        ) {
            let start = Vec2::new(10.0, 20.0);
            let mut m = Motion::new(0.0, None).at(start, Vec2::new(vx, vy));
            for _ in 0..n {
                m.begin_tick();
                m.integrate_position(dt);
            }
            let expected = start + Vec2::new(vx, vy) * (n as f32 * dt);
            prop_assert!((m.pos - expected).length() < 1e-1);
        }
    }
}
