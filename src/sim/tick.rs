//! Fixed timestep simulation tick
//!
//! One step ticks every entity once (in group update order), spawns the
//! shots fired, resolves collisions, reaps the dead and advances the level.

use std::collections::BTreeSet;

use rand_pcg::Pcg32;

use super::behavior::{FireOrders, SteerContext, fire_orders};
use super::effect::expire_effects;
use super::entity::{Entities, Entity, EntityId, Role};
use super::group::UPDATE_ORDER;
use super::input::TickInput;
use super::movement::{Bounds, BoundsOutcome, apply_bounds};
use super::screen::Screen;
use super::state::{DestroyCause, World};
use super::weapon::Shot;

/// Read-only view of the world plus the rng, for a detached entity
struct TickContext<'a> {
    now: f64,
    elapsed: f32,
    screen: Screen,
    cutoff: f32,
    reach_threshold: f32,
    entities: &'a Entities,
    rng: &'a mut Pcg32,
}

/// What became of an entity this tick
#[derive(Debug, Default)]
struct TickOutcome {
    shots: Vec<Shot>,
    destroyed: Option<DestroyCause>,
}

impl TickOutcome {
    fn destroyed(cause: DestroyCause) -> Self {
        Self {
            shots: Vec::new(),
            destroyed: Some(cause),
        }
    }
}

/// Apply the pilot's input, then advance the world by `dt`
pub fn tick(world: &mut World, input: &TickInput, dt: f32) {
    for &intent in &input.intents {
        world.apply_intent(intent);
    }
    let now = world.now() + dt as f64;
    world.step(now, dt);
}

impl World {
    /// Advance to time `now`, `elapsed` seconds after the previous step
    pub fn step(&mut self, now: f64, elapsed: f32) {
        self.now = now;
        let mut ticked = BTreeSet::new();
        for group in UPDATE_ORDER {
            // Entities spawned during this step wait for the next one
            let members = self.groups.members(group).to_vec();
            for id in members {
                if ticked.insert(id) {
                    self.tick_entity(id, elapsed);
                }
            }
        }
        self.check_collisions();
        self.reap();
        self.tick_level(elapsed);
    }

    fn tick_entity(&mut self, id: EntityId, elapsed: f32) {
        let Some(mut entity) = self.entities.remove(&id) else {
            return;
        };
        if !entity.is_alive() {
            self.entities.insert(id, entity);
            return;
        }
        let mut cx = TickContext {
            now: self.now,
            elapsed,
            screen: *self.screen(),
            cutoff: self.settings().off_screen_cutoff,
            reach_threshold: self.settings().reached_dest_threshold,
            entities: &self.entities,
            rng: &mut self.rng,
        };
        let outcome = match entity.role {
            Role::Ship(_) => tick_ship(&mut entity, &mut cx),
            Role::Projectile(_) => tick_projectile(&mut entity, &mut cx),
            Role::Shield(_) => tick_shield(&mut entity, &mut cx),
        };
        self.entities.insert(id, entity);
        // Effects may have flipped the side
        self.sync_groups(id);

        if let Some(cause) = outcome.destroyed {
            log::debug!("{id:?} removed: {cause:?}");
            self.remove_entity(id, cause);
        }
        for shot in outcome.shots {
            self.spawn_projectile(shot);
        }
    }

    fn tick_level(&mut self, elapsed: f32) {
        let Some(mut level) = self.level.take() else {
            return;
        };
        level.tick(self, elapsed);
        self.level = Some(level);
    }
}

fn tick_ship(entity: &mut Entity, cx: &mut TickContext<'_>) -> TickOutcome {
    expire_effects(entity, cx.now);
    let Entity {
        id,
        side,
        motion,
        collider,
        role,
        ..
    } = entity;
    let Role::Ship(ship) = role else {
        return TickOutcome::default();
    };
    let ship = &mut **ship;

    motion.begin_tick();
    match ship.follow {
        Some(anchor_vel) => motion.accelerate_toward(cx.elapsed, anchor_vel),
        None => {
            let mut steer = SteerContext {
                side: *side,
                steer: ship.steer,
                entities: cx.entities,
                rng: &mut *cx.rng,
                reach_threshold: cx.reach_threshold,
            };
            ship.move_behavior.update(motion, &mut steer, cx.elapsed);
        }
    }
    motion.clamp_speed();
    motion.integrate_position(cx.elapsed);
    let outcome = apply_bounds(motion, collider.rect(motion.pos), ship.bounds, &cx.screen, cx.cutoff);
    if outcome == BoundsOutcome::OutOfRange {
        return TickOutcome::destroyed(DestroyCause::Culled);
    }

    let orders = match ship.fire_behavior {
        Some(behavior) => {
            let speed = ship.weapons.first().map_or(0.0, |w| w.projectile_speed());
            fire_orders(behavior, motion, *side, cx.entities, speed, &cx.screen)
        }
        None => FireOrders {
            firing: ship.trigger,
            aim: None,
        },
    };
    let direction = orders.aim.unwrap_or(side.facing());
    let mut shots = Vec::new();
    for weapon in &mut ship.weapons {
        if orders.firing {
            weapon.start_firing();
        } else {
            weapon.stop_firing();
        }
        shots.extend(weapon.tick(cx.now, *id, *side, motion.pos, motion.vel, direction));
    }
    TickOutcome {
        shots,
        destroyed: None,
    }
}

fn tick_projectile(entity: &mut Entity, cx: &mut TickContext<'_>) -> TickOutcome {
    let Entity {
        side,
        motion,
        collider,
        role,
        ..
    } = entity;
    let Role::Projectile(projectile) = role else {
        return TickOutcome::default();
    };
    motion.begin_tick();
    if let Some(guidance) = &mut projectile.guidance {
        let mut steer = SteerContext {
            side: *side,
            steer: glam::IVec2::ZERO,
            entities: cx.entities,
            rng: &mut *cx.rng,
            reach_threshold: cx.reach_threshold,
        };
        guidance.update(motion, &mut steer, cx.elapsed);
    }
    motion.clamp_speed();
    motion.integrate_position(cx.elapsed);
    let rect = collider.rect(motion.pos);
    match apply_bounds(motion, rect, Bounds::Unconfined, &cx.screen, cx.cutoff) {
        BoundsOutcome::OutOfRange => TickOutcome::destroyed(DestroyCause::Culled),
        _ => TickOutcome::default(),
    }
}

/// Shields ride on their owner and recharge
fn tick_shield(entity: &mut Entity, cx: &mut TickContext<'_>) -> TickOutcome {
    let Entity {
        side,
        motion,
        health,
        role,
        ..
    } = entity;
    let Role::Shield(shield) = role else {
        return TickOutcome::default();
    };
    let Some(owner) = cx.entities.get(&shield.owner).filter(|o| o.is_alive()) else {
        return TickOutcome::destroyed(DestroyCause::OwnerLost);
    };
    motion.pos = owner.motion.pos;
    motion.vel = owner.motion.vel;
    motion.prev_vel = owner.motion.prev_vel;
    *side = owner.side;
    shield.recharge(health, cx.now, cx.elapsed);
    TickOutcome::default()
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::sim::SimEvent;
    use crate::sim::entity::{Collidable, Side};
    use crate::sim::group::Group;
    use crate::sim::input::PlayerIntent;
    use crate::sim::testing::{gunship, target_ship};

    const DT: f32 = 1.0 / 60.0;

    fn run(world: &mut World, frames: usize) {
        for _ in 0..frames {
            tick(world, &TickInput::default(), DT);
        }
    }

    #[test]
    fn test_player_flies_and_stays_on_screen() {
        let mut world = World::default();
        let player = world.spawn_player(&gunship());
        tick(
            &mut world,
            &TickInput {
                intents: vec![PlayerIntent::AccelLeft],
            },
            DT,
        );
        assert!(world.entity(player).unwrap().motion.vel.x < 0.0);
        run(&mut world, 600);
        let ship = world.entity(player).unwrap();
        assert!(ship.rect().min.x >= 0.0);
        assert_eq!(ship.motion.vel.x, 0.0);
    }

    #[test]
    fn test_trigger_fires_projectiles_upward() {
        let mut world = World::default();
        let player = world.spawn_player(&gunship());
        tick(
            &mut world,
            &TickInput {
                intents: vec![PlayerIntent::StartFiring],
            },
            DT,
        );
        let shots: Vec<_> = world.group(Group::FriendlyProjectiles).collect();
        assert_eq!(shots.len(), 1);
        assert!(shots[0].motion.vel.y < 0.0);
        assert!(world.drain_events().iter().any(|e| matches!(
            e,
            SimEvent::ProjectileFired { firer, .. } if *firer == player
        )));
    }

    #[test]
    fn test_projectiles_are_culled_off_screen() {
        let mut world = World::default();
        world.spawn_player(&gunship());
        world.apply_intent(PlayerIntent::StartFiring);
        run(&mut world, 1);
        world.apply_intent(PlayerIntent::StopFiring);
        // 2000 px/s: gone well within a second past the cutoff
        run(&mut world, 60);
        assert!(world.members(Group::FriendlyProjectiles).is_empty());
        assert!(world.drain_events().iter().any(|e| matches!(
            e,
            SimEvent::EntityDestroyed {
                cause: DestroyCause::Culled,
                ..
            }
        )));
    }

    #[test]
    fn test_unconfined_ship_drifts_away_and_is_culled() {
        let mut world = World::default();
        let mut spec = target_ship(5.0);
        spec.confined = false;
        spec.max_speed = 1000.0;
        let id = world.spawn_ship(&spec, Side::Enemy, Vec2::new(320.0, 400.0), Vec2::new(0.0, 1000.0));
        // Idle ships decelerate; give it a long way to go first
        world.entity_mut(id).unwrap().motion.acceleration = 0.0;
        run(&mut world, 120);
        assert!(!world.is_alive(id));
        assert!(world.entity(id).is_none());
    }

    #[test]
    fn test_shield_follows_owner() {
        let mut world = World::default();
        let mut spec = gunship();
        spec.shield = Some(crate::blueprint::ShieldSpec {
            key: None,
            capacity: 5.0,
            recharge_rate: 1.0,
            recharge_delay: 0.0,
            shape: None,
            padding: 4.0,
            elasticity: 0.5,
        });
        let player = world.spawn_player(&spec);
        world.apply_intent(PlayerIntent::AccelRight);
        run(&mut world, 30);
        let shield = world.entity(player).and_then(|e| e.ship()).and_then(|s| s.shield).unwrap();
        assert_eq!(
            world.entity(shield).unwrap().motion.pos,
            world.entity(player).unwrap().motion.pos
        );
    }
}
