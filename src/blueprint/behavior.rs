//! Move behaviors, fire behaviors and timed effects as typed blueprints

use glam::Vec2;

use crate::config::{ConfigError, FromTemplate, TemplateView, Value};
use crate::consts::REACHED_DEST_THRESHOLD;

/// Where a patrol goes next
#[derive(Debug, Clone, PartialEq)]
pub enum PatrolRoute {
    /// Fixed loop of points, as proportions of the screen size
    Points(Vec<Vec2>),
    /// Random points inside a box (proportional corners)
    Box { min: Vec2, max: Vec2 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveBehaviorSpec {
    Idle,
    Patrol {
        route: PatrolRoute,
        reached_dest_threshold: f32,
        decelerate: bool,
    },
    Homing {
        /// Half-angle of the acquisition cone, radians
        acquisition_angle: f32,
        decelerate: bool,
    },
    /// Fly to a proportional destination, then hold
    MoveOnScreen { dest: Vec2 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireBehaviorSpec {
    NeverFire,
    FireConstantly,
    AimAtTarget { lead: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EffectSpec {
    /// Switch the target to the other side until the effect expires
    MindControl {
        duration: f32,
        move_behavior: Option<MoveBehaviorSpec>,
        fire_behavior: Option<FireBehaviorSpec>,
    },
    /// Temporarily replace movement stats
    StatOverride {
        duration: f32,
        max_speed: Option<f32>,
        acceleration: Option<f32>,
    },
}

impl EffectSpec {
    pub fn duration(&self) -> f32 {
        match self {
            EffectSpec::MindControl { duration, .. } | EffectSpec::StatOverride { duration, .. } => {
                *duration
            }
        }
    }
}

/// `[x, y]` pair
pub(crate) fn point(view: &TemplateView<'_>, field: &str, value: &Value) -> Result<Vec2, ConfigError> {
    match value.as_list() {
        Some([x, y]) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => Ok(Vec2::new(x as f32, y as f32)),
            _ => Err(view.error(field, "coordinates must be numbers")),
        },
        _ => Err(view.error(field, "expected an [x, y] pair")),
    }
}

fn patrol_route(view: &TemplateView<'_>) -> Result<PatrolRoute, ConfigError> {
    if let Some(value) = view.value("box") {
        return match value.as_list() {
            Some([a, b]) => {
                let (a, b) = (point(view, "box", a)?, point(view, "box", b)?);
                Ok(PatrolRoute::Box {
                    min: a.min(b),
                    max: a.max(b),
                })
            }
            _ => Err(view.error("box", "expected [[x0, y0], [x1, y1]]")),
        };
    }
    let dests = view
        .list("dests")?
        .iter()
        .map(|v| point(view, "dests", v))
        .collect::<Result<Vec<_>, _>>()?;
    if dests.is_empty() {
        return Err(view.error("dests", "a patrol needs dests or a box"));
    }
    Ok(PatrolRoute::Points(dests))
}

impl FromTemplate for MoveBehaviorSpec {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError> {
        if view.is_a("Patrol") {
            Ok(MoveBehaviorSpec::Patrol {
                route: patrol_route(view)?,
                reached_dest_threshold: view.f32_or("reached_dest_threshold", REACHED_DEST_THRESHOLD)?,
                decelerate: view.bool_or("decelerate", true)?,
            })
        } else if view.is_a("Homing") {
            let degrees = view.f32_or("acquisition_angle", 45.0)?;
            if !(0.0..=180.0).contains(&degrees) {
                return Err(view.error("acquisition_angle", "must be between 0 and 180 degrees"));
            }
            Ok(MoveBehaviorSpec::Homing {
                acquisition_angle: degrees.to_radians(),
                decelerate: view.bool_or("decelerate", false)?,
            })
        } else if view.is_a("MoveOnScreen") {
            let dest = view
                .value("initial_dest")
                .ok_or_else(|| view.error("initial_dest", "missing"))?;
            Ok(MoveBehaviorSpec::MoveOnScreen {
                dest: point(view, "initial_dest", dest)?,
            })
        } else if view.is_a("MoveBehavior") {
            Ok(MoveBehaviorSpec::Idle)
        } else {
            Err(view.error("<class>", "not a MoveBehavior"))
        }
    }
}

impl FromTemplate for FireBehaviorSpec {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError> {
        if view.is_a("AimAtTarget") {
            Ok(FireBehaviorSpec::AimAtTarget {
                lead: view.bool_or("lead", true)?,
            })
        } else if view.is_a("FireConstantly") {
            Ok(FireBehaviorSpec::FireConstantly)
        } else if view.is_a("FireBehavior") {
            Ok(FireBehaviorSpec::NeverFire)
        } else {
            Err(view.error("<class>", "not a FireBehavior"))
        }
    }
}

impl FromTemplate for EffectSpec {
    fn from_template(view: &TemplateView<'_>) -> Result<Self, ConfigError> {
        let duration = view.f32("duration")?;
        if duration <= 0.0 {
            return Err(view.error("duration", "must be positive"));
        }
        if view.is_a("MindControl") {
            Ok(EffectSpec::MindControl {
                duration,
                move_behavior: view
                    .opt_template("move_behavior", "MoveBehavior")?
                    .map(|v| v.build())
                    .transpose()?,
                fire_behavior: view
                    .opt_template("fire_behavior", "FireBehavior")?
                    .map(|v| v.build())
                    .transpose()?,
            })
        } else if view.is_a("StatOverride") {
            Ok(EffectSpec::StatOverride {
                duration,
                max_speed: view.opt_f32("max_speed")?,
                acceleration: view.opt_f32("acceleration")?,
            })
        } else {
            Err(view.error("<class>", "not an Effect"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Registry;

    fn registry(doc: &str) -> Registry {
        let mut registry = Registry::new();
        registry.load_str(doc, "doc").unwrap();
        registry.check_for_undefined_objects().unwrap();
        registry
    }

    #[test]
    fn test_patrol_points() {
        let r = registry("Patrol[Sweep]:\n  dests: [[0.1, 0.2], [0.9, 0.2]]\n");
        let spec: MoveBehaviorSpec = r.build_key("Patrol", "Sweep").unwrap();
        match spec {
            MoveBehaviorSpec::Patrol {
                route: PatrolRoute::Points(points),
                reached_dest_threshold,
                ..
            } => {
                assert_eq!(points, vec![Vec2::new(0.1, 0.2), Vec2::new(0.9, 0.2)]);
                assert_eq!(reached_dest_threshold, 10.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_patrol_without_route_rejected() {
        let r = registry("Patrol[Lost]: {}\n");
        assert!(r.build_key::<MoveBehaviorSpec>("Patrol", "Lost").is_err());
    }

    #[test]
    fn test_homing_angle_in_radians() {
        let r = registry("Homing[Seek]: {acquisition_angle: 90}\n");
        let spec: MoveBehaviorSpec = r.build_key("Homing", "Seek").unwrap();
        match spec {
            MoveBehaviorSpec::Homing {
                acquisition_angle,
                decelerate,
            } => {
                assert!((acquisition_angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
                assert!(!decelerate);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_mind_control_with_behaviors() {
        let r = registry(
            "MindControl[Charm]:\n  duration: 3\n  fire_behavior: FireConstantly[]\n",
        );
        let spec: EffectSpec = r.build_key("MindControl", "Charm").unwrap();
        assert_eq!(spec.duration(), 3.0);
        assert!(matches!(
            spec,
            EffectSpec::MindControl {
                fire_behavior: Some(FireBehaviorSpec::FireConstantly),
                move_behavior: None,
                ..
            }
        ));
    }
}
