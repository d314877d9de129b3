//! Mass collision response
//!
//! Given two overlapping bodies, step back in time until their masks part,
//! take the contact normal from the overlap region, and find the impulse
//! that conserves kinetic energy along the chosen axis. Restitution then
//! scales that impulse down between fully inelastic and fully elastic.

use std::f32::consts::FRAC_PI_2;

use glam::Vec2;

use super::mask::Mask;
use crate::from_heading;
use crate::settings::SimSettings;

/// A body as it is at the end of the frame
#[derive(Debug, Clone, Copy)]
pub struct BodySnapshot<'a> {
    pub pos: Vec2,
    pub vel: Vec2,
    pub mass: f32,
    pub elasticity: f32,
    pub mask: &'a Mask,
}

impl BodySnapshot<'_> {
    fn at(&self, t: f32) -> Vec2 {
        self.pos + self.vel * t
    }
}

/// Step sizes and iteration caps for the search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactLimits {
    /// Seconds per rewind step
    pub step: f32,
    pub max_steps: u32,
    pub bounciness: f32,
    pub damage_mult: f32,
    pub min_damage: f32,
    pub max_bracket_doublings: u32,
    pub max_bisections: u32,
}

impl ImpactLimits {
    pub fn from_settings(settings: &SimSettings) -> Self {
        Self {
            step: settings.impact_step(),
            max_steps: settings.max_impact_steps,
            bounciness: settings.bounciness,
            damage_mult: settings.collision_damage_mult,
            min_damage: settings.min_collision_damage,
            max_bracket_doublings: settings.max_bracket_doublings,
            max_bisections: settings.max_bisections,
        }
    }
}

impl Default for ImpactLimits {
    fn default() -> Self {
        Self::from_settings(&SimSettings::default())
    }
}

/// Outcome of a resolved collision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    /// Positions at the moment of contact
    pub pos_a: Vec2,
    pub pos_b: Vec2,
    pub vel_a: Vec2,
    pub vel_b: Vec2,
    /// Unit axis the impulse acts along, pointing from B toward A
    pub axis: Vec2,
    /// Energy-conserving impulse magnitude
    pub impulse: f32,
    pub damage_a: f32,
    pub damage_b: f32,
}

/// Angle between two non-zero vectors, radians
fn angle_between(a: Vec2, b: Vec2) -> f32 {
    (a.dot(b) / (a.length() * b.length())).clamp(-1.0, 1.0).acos()
}

/// Resolve a collision between `a` and `b`.
///
/// `None` means no physical response: both bodies still, no relative
/// motion, or a failed impulse search.
pub fn resolve(a: &BodySnapshot<'_>, b: &BodySnapshot<'_>, limits: &ImpactLimits) -> Option<Impact> {
    if a.vel == Vec2::ZERO && b.vel == Vec2::ZERO {
        return None;
    }
    let overlap_at = |t: f32| {
        let offset = b.mask.origin_at(b.at(t)) - a.mask.origin_at(a.at(t));
        a.mask.overlap_mask(b.mask, offset)
    };

    // Rewind to the earliest step that still overlaps
    let mut contact_t = 0.0;
    let mut contact = overlap_at(0.0);
    let mut separated = false;
    for k in 1..=limits.max_steps {
        let t = -(k as f32) * limits.step;
        let overlap = overlap_at(t);
        if overlap.count() == 0 {
            separated = true;
            break;
        }
        contact_t = t;
        contact = overlap;
    }
    if !separated {
        contact_t = 0.0;
    }
    let (pos_a, pos_b) = (a.at(contact_t), b.at(contact_t));

    let rel = a.vel - b.vel;
    if rel.length_squared() < 1e-12 {
        return None;
    }
    let centers = pos_a - pos_b;
    // The overlap lies along the contact surface; the normal is perpendicular
    let normal = contact.orientation().map(|theta| {
        let n = from_heading(theta + FRAC_PI_2);
        if n.dot(centers) >= 0.0 { n } else { -n }
    });
    let min_angle = 100f32.to_radians();
    let axis = [normal, centers.try_normalize(), Some(-rel.normalize())]
        .into_iter()
        .flatten()
        .find(|axis| angle_between(*axis, rel) > min_angle)?;

    let impulse = match find_impulse(a, b, axis, limits) {
        Some(f) => f,
        None => {
            log::error!(
                "impulse search failed: masses {} / {}, relative velocity {rel:?}",
                a.mass,
                b.mass
            );
            return None;
        }
    };

    let elasticity = (a.elasticity + b.elasticity) / 2.0;
    let restitution = (elasticity * limits.bounciness).clamp(0.0, 1.0);
    let applied = impulse * (1.0 + restitution) / 2.0;
    let damage = impulse * (1.0 - elasticity) * limits.damage_mult;

    Some(Impact {
        pos_a,
        pos_b,
        vel_a: a.vel + axis * (applied / a.mass),
        vel_b: b.vel - axis * (applied / b.mass),
        axis,
        impulse,
        damage_a: (damage * b.mass / a.mass).max(limits.min_damage),
        damage_b: (damage * a.mass / b.mass).max(limits.min_damage),
    })
}

/// Positive impulse along `axis` that leaves total kinetic energy unchanged.
///
/// Expanding bracket, then bisection, both capped.
fn find_impulse(a: &BodySnapshot<'_>, b: &BodySnapshot<'_>, axis: Vec2, limits: &ImpactLimits) -> Option<f32> {
    let (ma, mb) = (a.mass as f64, b.mass as f64);
    let (va, vb) = (a.vel.as_dvec2(), b.vel.as_dvec2());
    let axis = axis.as_dvec2();
    let energy = |va: glam::DVec2, vb: glam::DVec2| 0.5 * ma * va.length_squared() + 0.5 * mb * vb.length_squared();
    let before = energy(va, vb);
    // Energy lost when applying impulse `f`: positive below the root, negative above
    let lost = |f: f64| before - energy(va + axis * (f / ma), vb - axis * (f / mb));

    let (mut lo, mut hi) = (0.0f64, 1.0f64);
    let mut bracketed = false;
    for _ in 0..=limits.max_bracket_doublings {
        if lost(hi) < 0.0 {
            bracketed = true;
            break;
        }
        lo = hi;
        hi *= 2.0;
    }
    if !bracketed {
        return None;
    }
    for _ in 0..limits.max_bisections {
        let mid = (lo + hi) / 2.0;
        if lost(mid) >= 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-9 * hi {
            break;
        }
    }
    Some(((lo + hi) / 2.0) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn body(mask: &Mask, pos: Vec2, vel: Vec2, mass: f32, elasticity: f32) -> BodySnapshot<'_> {
        BodySnapshot {
            pos,
            vel,
            mass,
            elasticity,
            mask,
        }
    }

    fn kinetic(a: &BodySnapshot<'_>, va: Vec2, b: &BodySnapshot<'_>, vb: Vec2) -> f32 {
        0.5 * a.mass * va.length_squared() + 0.5 * b.mass * vb.length_squared()
    }

    #[test]
    fn test_still_bodies_are_ignored() {
        let mask = Mask::filled(10, 10);
        let a = body(&mask, Vec2::new(0.0, 0.0), Vec2::ZERO, 1.0, 1.0);
        let b = body(&mask, Vec2::new(5.0, 0.0), Vec2::ZERO, 1.0, 1.0);
        assert_eq!(resolve(&a, &b, &ImpactLimits::default()), None);
    }

    #[test]
    fn test_elastic_head_on_swaps_velocities() {
        let mask = Mask::filled(10, 10);
        // Moving toward each other at 60 px/s, overlapping by 2 px
        let a = body(&mask, Vec2::new(0.0, 0.0), Vec2::new(60.0, 0.0), 10.0, 1.0);
        let b = body(&mask, Vec2::new(8.0, 0.0), Vec2::new(-60.0, 0.0), 10.0, 1.0);
        let impact = resolve(&a, &b, &ImpactLimits::default()).unwrap();
        assert!((impact.vel_a - Vec2::new(-60.0, 0.0)).length() < 1e-2);
        assert!((impact.vel_b - Vec2::new(60.0, 0.0)).length() < 1e-2);
        assert!(impact.axis.x < 0.0);
        // Rewound: the bodies sit further apart than they ended the frame
        assert!(impact.pos_b.x - impact.pos_a.x > 8.0);
        // Elastic hits still cost the minimum damage
        assert_eq!(impact.damage_a, 1.0);
    }

    #[test]
    fn test_inelastic_hit_damages_lighter_body_more() {
        let mask = Mask::filled(10, 10);
        let a = body(&mask, Vec2::new(0.0, 0.0), Vec2::new(3000.0, 0.0), 1000.0, 0.0);
        let b = body(&mask, Vec2::new(9.0, 0.0), Vec2::ZERO, 100.0, 0.0);
        let limits = ImpactLimits::default();
        let impact = resolve(&a, &b, &limits).unwrap();
        assert!(impact.damage_b > impact.damage_a);
        assert!((impact.damage_b / impact.damage_a - 100.0).abs() < 1e-2 || impact.damage_a == 1.0);
        // Fully inelastic: both end with the same velocity along the axis
        assert!((impact.vel_a.x - impact.vel_b.x).abs() < 1e-1);
    }

    #[test]
    fn test_bracket_cap_reports_failure() {
        let mask = Mask::filled(10, 10);
        let a = body(&mask, Vec2::new(0.0, 0.0), Vec2::new(60.0, 0.0), 10.0, 1.0);
        let b = body(&mask, Vec2::new(8.0, 0.0), Vec2::new(-60.0, 0.0), 10.0, 1.0);
        let limits = ImpactLimits {
            max_bracket_doublings: 0,
            ..ImpactLimits::default()
        };
        assert_eq!(resolve(&a, &b, &limits), None);
    }

    proptest! {
        #[test]
        fn prop_kinetic_energy_never_increases(
            ax in -500.0f32..500.0, ay in -500.0f32..500.0,
            bx in -500.0f32..500.0, by in -500.0f32..500.0,
            dx in -9.0f32..9.0, dy in -9.0f32..9.0,
            ma in 1.0f32..1000.0, mb in 1.0f32..1000.0,
            ea in 0.0f32..=1.0, eb in 0.0f32..=1.0,
        ) {
            let mask = Mask::filled(10, 10);
            let a = body(&mask, Vec2::ZERO, Vec2::new(ax, ay), ma, ea);
            let b = body(&mask, Vec2::new(dx, dy), Vec2::new(bx, by), mb, eb);
            if let Some(impact) = resolve(&a, &b, &ImpactLimits::default()) {
                let before = kinetic(&a, a.vel, &b, b.vel);
                let after = kinetic(&a, impact.vel_a, &b, impact.vel_b);
                prop_assert!(after <= before * (1.0 + 1e-3) + 1e-3, "{after} > {before}");
                prop_assert!(impact.vel_a.is_finite() && impact.vel_b.is_finite());
                // The impulse pushes the bodies apart along the axis
                prop_assert!((impact.vel_a - impact.vel_b).dot(impact.axis) >= -1e-2 * (a.vel - b.vel).length());
            }
        }
    }
}
