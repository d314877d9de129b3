//! Timed status effects
//!
//! Applying an effect stashes whatever it replaces; expiry restores it.
//! Expiries sit in a min-heap. Re-applying an effect that is still active
//! extends it, and the stale heap entry is skipped by its sequence number.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use super::behavior::MoveBehavior;
use super::entity::{Entity, Role, Side};
use super::screen::Screen;
use crate::blueprint::{EffectSpec, FireBehaviorSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EffectKind {
    MindControl,
    StatOverride,
}

#[derive(Debug, Clone, Copy)]
struct Expiry {
    at: f64,
    seq: u64,
    kind: EffectKind,
}

impl PartialEq for Expiry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Expiry {}

impl PartialOrd for Expiry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expiry {
    // Reversed: BinaryHeap pops the earliest expiry first
    fn cmp(&self, other: &Self) -> Ordering {
        other.at.total_cmp(&self.at).then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug)]
enum Stash {
    MindControl {
        side: Side,
        move_behavior: Option<MoveBehavior>,
        fire_behavior: Option<Option<FireBehaviorSpec>>,
    },
    StatOverride {
        acceleration: f32,
        max_speed: Option<f32>,
    },
}

#[derive(Debug)]
struct Active {
    stash: Stash,
    expires_at: f64,
    seq: u64,
}

#[derive(Debug, Default)]
pub struct EffectQueue {
    heap: BinaryHeap<Expiry>,
    active: BTreeMap<EffectKind, Active>,
    next_seq: u64,
}

impl EffectQueue {
    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.active.contains_key(&kind)
    }

    pub fn expires_at(&self, kind: EffectKind) -> Option<f64> {
        self.active.get(&kind).map(|a| a.expires_at)
    }

    fn schedule(&mut self, kind: EffectKind, at: f64) -> u64 {
        self.next_seq += 1;
        self.heap.push(Expiry {
            at,
            seq: self.next_seq,
            kind,
        });
        self.next_seq
    }

    fn start(&mut self, kind: EffectKind, stash: Stash, expires_at: f64) {
        let seq = self.schedule(kind, expires_at);
        self.active.insert(
            kind,
            Active {
                stash,
                expires_at,
                seq,
            },
        );
    }

    /// Push back the expiry of an active effect
    fn extend(&mut self, kind: EffectKind, expires_at: f64) {
        let Some(current) = self.expires_at(kind) else {
            return;
        };
        if expires_at > current {
            let seq = self.schedule(kind, expires_at);
            if let Some(active) = self.active.get_mut(&kind) {
                active.expires_at = expires_at;
                active.seq = seq;
            }
        }
    }

    /// Pop every effect due at `now`, returning stashes to restore
    fn due(&mut self, now: f64) -> Vec<Stash> {
        let mut out = Vec::new();
        while let Some(top) = self.heap.peek().copied() {
            if top.at > now {
                break;
            }
            self.heap.pop();
            let current = self.active.get(&top.kind).is_some_and(|a| a.seq == top.seq);
            if let Some(active) = current.then(|| self.active.remove(&top.kind)).flatten() {
                out.push(active.stash);
            }
        }
        out
    }
}

/// Apply `spec` to a ship; other entities are unaffected.
///
/// Returns whether the effect took hold.
pub fn apply_effect(entity: &mut Entity, spec: &EffectSpec, now: f64, screen: &Screen) -> bool {
    let Entity {
        side, motion, role, ..
    } = entity;
    let Role::Ship(ship) = role else {
        return false;
    };
    let ship = &mut **ship;
    let expires_at = now + spec.duration() as f64;

    match spec {
        EffectSpec::MindControl {
            move_behavior,
            fire_behavior,
            ..
        } => {
            let kind = EffectKind::MindControl;
            let new_move = move_behavior.as_ref().map(|m| MoveBehavior::from_spec(m, screen));
            if ship.effects.is_active(kind) {
                // Already controlled: swap behaviors, keep the original stash
                if let Some(b) = new_move {
                    ship.move_behavior = b;
                }
                if let Some(f) = fire_behavior {
                    ship.fire_behavior = Some(*f);
                }
                ship.effects.extend(kind, expires_at);
                return true;
            }
            let stash = Stash::MindControl {
                side: *side,
                move_behavior: new_move.map(|b| std::mem::replace(&mut ship.move_behavior, b)),
                fire_behavior: fire_behavior.map(|f| ship.fire_behavior.replace(f)),
            };
            *side = side.opposite();
            ship.effects.start(kind, stash, expires_at);
        }
        EffectSpec::StatOverride {
            max_speed,
            acceleration,
            ..
        } => {
            let kind = EffectKind::StatOverride;
            if ship.effects.is_active(kind) {
                ship.effects.extend(kind, expires_at);
            } else {
                let stash = Stash::StatOverride {
                    acceleration: motion.acceleration,
                    max_speed: motion.max_speed,
                };
                ship.effects.start(kind, stash, expires_at);
            }
            motion.set_limits(
                acceleration.unwrap_or(motion.acceleration),
                max_speed.or(motion.max_speed),
            );
        }
    }
    log::debug!("{:?} under {spec:?} until {expires_at:.2}", entity.id);
    true
}

/// Revert every effect on `entity` that has expired by `now`
pub fn expire_effects(entity: &mut Entity, now: f64) {
    let Entity {
        id, side, motion, role, ..
    } = entity;
    let Role::Ship(ship) = role else {
        return;
    };
    for stash in ship.effects.due(now) {
        match stash {
            Stash::MindControl {
                side: original,
                move_behavior,
                fire_behavior,
            } => {
                *side = original;
                if let Some(b) = move_behavior {
                    ship.move_behavior = b;
                }
                if let Some(f) = fire_behavior {
                    ship.fire_behavior = f;
                }
                log::debug!("{id:?} released from mind control");
            }
            Stash::StatOverride {
                acceleration,
                max_speed,
            } => motion.set_limits(acceleration, max_speed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::MoveBehaviorSpec;
    use crate::sim::testing::ship_at;
    use glam::Vec2;

    fn screen() -> Screen {
        Screen::new(640.0, 480.0)
    }

    fn charm(duration: f32) -> EffectSpec {
        EffectSpec::MindControl {
            duration,
            move_behavior: Some(MoveBehaviorSpec::Idle),
            fire_behavior: Some(FireBehaviorSpec::FireConstantly),
        }
    }

    #[test]
    fn test_mind_control_flips_and_restores() {
        let mut ship = ship_at(1, Side::Enemy, Vec2::ZERO);
        ship.ship_mut().unwrap().move_behavior = MoveBehavior::MoveOnScreen {
            dest: Vec2::ONE,
            arrived: false,
        };
        assert!(apply_effect(&mut ship, &charm(2.0), 10.0, &screen()));
        assert_eq!(ship.side, Side::Friendly);
        assert_eq!(ship.ship().unwrap().move_behavior, MoveBehavior::Idle);
        assert_eq!(ship.ship().unwrap().fire_behavior, Some(FireBehaviorSpec::FireConstantly));

        expire_effects(&mut ship, 11.9);
        assert_eq!(ship.side, Side::Friendly);
        expire_effects(&mut ship, 12.0);
        assert_eq!(ship.side, Side::Enemy);
        assert!(matches!(ship.ship().unwrap().move_behavior, MoveBehavior::MoveOnScreen { .. }));
        assert_eq!(ship.ship().unwrap().fire_behavior, None);
    }

    #[test]
    fn test_reapplying_extends_without_restash() {
        let mut ship = ship_at(1, Side::Enemy, Vec2::ZERO);
        apply_effect(&mut ship, &charm(2.0), 0.0, &screen());
        apply_effect(&mut ship, &charm(2.0), 1.0, &screen());
        // The first expiry is stale now
        expire_effects(&mut ship, 2.5);
        assert_eq!(ship.side, Side::Friendly);
        expire_effects(&mut ship, 3.0);
        assert_eq!(ship.side, Side::Enemy);
    }

    #[test]
    fn test_stat_override_restores_limits() {
        let mut ship = ship_at(1, Side::Enemy, Vec2::ZERO);
        let before = (ship.motion.acceleration, ship.motion.max_speed);
        let slow = EffectSpec::StatOverride {
            duration: 1.0,
            max_speed: Some(10.0),
            acceleration: None,
        };
        apply_effect(&mut ship, &slow, 0.0, &screen());
        assert_eq!(ship.motion.max_speed, Some(10.0));
        assert_eq!(ship.motion.acceleration, before.0);
        expire_effects(&mut ship, 1.0);
        assert_eq!((ship.motion.acceleration, ship.motion.max_speed), before);
    }
}
