//! Move and fire behaviors at runtime
//!
//! Each entity owns its behavior state (patrol progress, homing target).
//! Behaviors only steer: they change the velocity through the bounded
//! acceleration primitives and never touch the position.

use glam::{IVec2, Vec2};
use rand::Rng;
use rand_pcg::Pcg32;

use super::entity::{Entities, EntityId, Side};
use super::movement::{Motion, Movable, lead_target};
use super::screen::Screen;
use crate::blueprint::{FireBehaviorSpec, MoveBehaviorSpec, PatrolRoute};
use crate::{angle_distance, heading};

/// What a behavior can see while steering
pub struct SteerContext<'a> {
    pub side: Side,
    /// Pilot direction (player ships)
    pub steer: IVec2,
    pub entities: &'a Entities,
    pub rng: &'a mut Pcg32,
    pub reach_threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Pixel waypoints, visited in a loop
    Points(Vec<Vec2>),
    /// Random pixel points inside a box
    Box { min: Vec2, max: Vec2 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveBehavior {
    /// Come to rest and hold
    Idle,
    /// Follow the pilot's direction intents
    Pilot,
    Patrol {
        route: Route,
        next: usize,
        dest: Option<Vec2>,
        threshold: f32,
        decelerate: bool,
    },
    Homing {
        acquisition_angle: f32,
        decelerate: bool,
        target: Option<EntityId>,
    },
    MoveOnScreen {
        dest: Vec2,
        arrived: bool,
    },
}

impl MoveBehavior {
    /// Instantiate a blueprint; proportional coordinates become pixels
    pub fn from_spec(spec: &MoveBehaviorSpec, screen: &Screen) -> Self {
        match spec {
            MoveBehaviorSpec::Idle => MoveBehavior::Idle,
            MoveBehaviorSpec::Patrol {
                route,
                reached_dest_threshold,
                decelerate,
            } => MoveBehavior::Patrol {
                route: match route {
                    PatrolRoute::Points(points) => {
                        Route::Points(points.iter().map(|p| screen.to_pixels(*p)).collect())
                    }
                    PatrolRoute::Box { min, max } => Route::Box {
                        min: screen.to_pixels(*min),
                        max: screen.to_pixels(*max),
                    },
                },
                next: 0,
                dest: None,
                threshold: *reached_dest_threshold,
                decelerate: *decelerate,
            },
            MoveBehaviorSpec::Homing {
                acquisition_angle,
                decelerate,
            } => MoveBehavior::Homing {
                acquisition_angle: *acquisition_angle,
                decelerate: *decelerate,
                target: None,
            },
            MoveBehaviorSpec::MoveOnScreen { dest } => MoveBehavior::MoveOnScreen {
                dest: screen.to_pixels(*dest),
                arrived: false,
            },
        }
    }

    pub fn target(&self) -> Option<EntityId> {
        match self {
            MoveBehavior::Homing { target, .. } => *target,
            _ => None,
        }
    }

    /// Forget the homing target; a new one is acquired on the next update
    pub fn retarget(&mut self) {
        if let MoveBehavior::Homing { target, .. } = self {
            *target = None;
        }
    }

    /// Adjust `motion.vel` for this tick
    pub fn update(&mut self, motion: &mut Motion, ctx: &mut SteerContext<'_>, elapsed: f32) {
        match self {
            MoveBehavior::Idle => motion.accelerate_toward(elapsed, Vec2::ZERO),
            MoveBehavior::Pilot => {
                let max = motion.max_speed.unwrap_or(0.0);
                motion.accelerate_toward(elapsed, ctx.steer.as_vec2() * max);
            }
            MoveBehavior::Patrol {
                route,
                next,
                dest,
                threshold,
                decelerate,
            } => {
                let mut goal = match *dest {
                    Some(goal) => goal,
                    None => pick_dest(route, next, ctx.rng),
                };
                if motion.reached(goal, *threshold) {
                    goal = pick_dest(route, next, ctx.rng);
                }
                *dest = Some(goal);
                motion.accelerate_toward_point(elapsed, goal, *decelerate);
            }
            MoveBehavior::Homing {
                acquisition_angle,
                decelerate,
                target,
            } => {
                let valid = target
                    .and_then(|id| ctx.entities.get(&id))
                    .is_some_and(|e| e.is_alive() && e.side != ctx.side);
                if !valid {
                    *target = acquire_target(motion, ctx.side, ctx.entities, *acquisition_angle);
                    if let Some(id) = target {
                        log::debug!("Homing acquired {id:?}");
                    }
                }
                // No target: coast
                if let Some(goal) = target.and_then(|id| ctx.entities.get(&id)) {
                    motion.accelerate_toward_point(elapsed, goal.motion.pos, *decelerate);
                }
            }
            MoveBehavior::MoveOnScreen { dest, arrived } => {
                if !*arrived && motion.reached(*dest, ctx.reach_threshold) {
                    *arrived = true;
                }
                if *arrived {
                    motion.accelerate_toward(elapsed, Vec2::ZERO);
                } else {
                    motion.accelerate_toward_point(elapsed, *dest, true);
                }
            }
        }
    }
}

fn pick_dest(route: &Route, next: &mut usize, rng: &mut Pcg32) -> Vec2 {
    match route {
        Route::Points(points) => {
            let Some(&point) = points.get(*next % points.len().max(1)) else {
                return Vec2::ZERO;
            };
            *next = (*next + 1) % points.len();
            point
        }
        Route::Box { min, max } => Vec2::new(
            if max.x > min.x { rng.random_range(min.x..=max.x) } else { min.x },
            if max.y > min.y { rng.random_range(min.y..=max.y) } else { min.y },
        ),
    }
}

/// Heading used for aiming cones: the velocity, or the side's facing when still
fn forward(motion: &Motion, side: Side) -> Vec2 {
    if motion.vel.length_squared() > 0.0 {
        motion.vel
    } else {
        side.facing()
    }
}

/// Closest opposing ship inside the acquisition cone, else the one closest
/// to the forward heading, else nothing
pub fn acquire_target(motion: &Motion, side: Side, entities: &Entities, cone: f32) -> Option<EntityId> {
    let facing = heading(forward(motion, side));
    let mut in_cone: Option<(f32, EntityId)> = None;
    let mut off_cone: Option<(f32, EntityId)> = None;
    for e in entities.values() {
        if !e.is_alive() || !e.kind.is_ship() || e.side == side {
            continue;
        }
        let to = e.motion.pos - motion.pos;
        let deviation = if to.length_squared() > 0.0 {
            angle_distance(heading(to), facing)
        } else {
            0.0
        };
        let distance = to.length();
        if deviation <= cone && in_cone.is_none_or(|(d, _)| distance < d) {
            in_cone = Some((distance, e.id));
        }
        if off_cone.is_none_or(|(a, _)| deviation < a) {
            off_cone = Some((deviation, e.id));
        }
    }
    in_cone.or(off_cone).map(|(_, id)| id)
}

/// Nearest living ship of the other side
pub fn nearest_enemy(pos: Vec2, side: Side, entities: &Entities) -> Option<EntityId> {
    entities
        .values()
        .filter(|e| e.is_alive() && e.kind.is_ship() && e.side != side)
        .min_by(|a, b| {
            a.motion
                .pos
                .distance_squared(pos)
                .total_cmp(&b.motion.pos.distance_squared(pos))
        })
        .map(|e| e.id)
}

/// Trigger state and aim for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireOrders {
    pub firing: bool,
    /// Unit launch direction; `None` shoots straight ahead
    pub aim: Option<Vec2>,
}

/// Fire control for a ship with a fire behavior
pub fn fire_orders(
    behavior: FireBehaviorSpec,
    motion: &Motion,
    side: Side,
    entities: &Entities,
    projectile_speed: f32,
    screen: &Screen,
) -> FireOrders {
    match behavior {
        FireBehaviorSpec::NeverFire => FireOrders {
            firing: false,
            aim: None,
        },
        FireBehaviorSpec::FireConstantly => FireOrders {
            firing: true,
            aim: None,
        },
        FireBehaviorSpec::AimAtTarget { lead } => {
            let Some(target) = nearest_enemy(motion.pos, side, entities).and_then(|id| entities.get(&id))
            else {
                return FireOrders {
                    firing: false,
                    aim: None,
                };
            };
            let aim = if lead {
                lead_target(
                    motion.pos,
                    motion.vel,
                    target.motion.pos,
                    target.motion.vel,
                    projectile_speed,
                    screen,
                )
            } else {
                (target.motion.pos - motion.pos).normalize_or(side.facing())
            };
            FireOrders {
                firing: true,
                aim: Some(aim),
            }
        }
    }
}
