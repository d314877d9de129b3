//! Player intents
//!
//! The input adapter maps keys to intents; releasing a direction key sends
//! the opposite intent, so held keys cancel out.

use serde::{Deserialize, Serialize};

use super::state::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerIntent {
    AccelLeft,
    AccelRight,
    AccelUp,
    AccelDown,
    StartFiring,
    StopFiring,
}

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub intents: Vec<PlayerIntent>,
}

impl World {
    /// Apply an intent to the player ship; `false` without a player
    pub fn apply_intent(&mut self, intent: PlayerIntent) -> bool {
        let Some(ship) = self
            .player()
            .and_then(|id| self.entities.get_mut(&id))
            .and_then(|e| e.ship_mut())
        else {
            return false;
        };
        let steer = &mut ship.steer;
        match intent {
            PlayerIntent::AccelLeft => steer.x -= 1,
            PlayerIntent::AccelRight => steer.x += 1,
            PlayerIntent::AccelUp => steer.y -= 1,
            PlayerIntent::AccelDown => steer.y += 1,
            PlayerIntent::StartFiring => ship.trigger = true,
            PlayerIntent::StopFiring => ship.trigger = false,
        }
        ship.steer = ship.steer.clamp(glam::IVec2::NEG_ONE, glam::IVec2::ONE);
        true
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec2;

    use super::*;
    use crate::sim::testing::gunship;

    #[test]
    fn test_intents_without_player_are_dropped() {
        let mut world = World::default();
        assert!(!world.apply_intent(PlayerIntent::StartFiring));
    }

    #[test]
    fn test_steer_saturates_and_cancels() {
        let mut world = World::default();
        let id = world.spawn_player(&gunship());
        for intent in [PlayerIntent::AccelLeft, PlayerIntent::AccelLeft, PlayerIntent::AccelUp] {
            world.apply_intent(intent);
        }
        let steer = |w: &World| w.entity(id).and_then(|e| e.ship()).map(|s| s.steer);
        assert_eq!(steer(&world), Some(IVec2::new(-1, -1)));
        // Key releases
        world.apply_intent(PlayerIntent::AccelRight);
        world.apply_intent(PlayerIntent::AccelDown);
        assert_eq!(steer(&world), Some(IVec2::ZERO));
        world.apply_intent(PlayerIntent::StartFiring);
        assert!(world.entity(id).and_then(|e| e.ship()).is_some_and(|s| s.trigger));
    }
}
