//! Formations: enemy groups deployed as a unit
//!
//! A formation is an invisible anchor that flies in from above the screen.
//! Members appear at their slot as the slot crosses the top edge and copy
//! the anchor's velocity until the formation releases them on arrival.

use std::collections::VecDeque;

use glam::Vec2;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use super::behavior::{MoveBehavior, SteerContext};
use super::entity::{Entities, EntityId, Side};
use super::movement::Motion;
use super::screen::Screen;
use super::state::World;
use crate::blueprint::{FireBehaviorSpec, FormationLayout, FormationSpec, ShipSpec};

/// Slot offsets from the formation center for `count` ships laid out
/// inside a `size` rectangle
pub fn layout_offsets(layout: FormationLayout, count: usize, size: Vec2) -> Vec<Vec2> {
    let (rows, columns) = match layout {
        FormationLayout::Grid { rows, columns } => (rows.max(1), columns.max(1)),
        FormationLayout::Line => (1, count.max(1)),
    };
    let spread = |i: usize, n: usize, extent: f32| {
        if n <= 1 {
            0.0
        } else {
            -extent / 2.0 + i as f32 / (n - 1) as f32 * extent
        }
    };
    let last_row = count.saturating_sub(1) / columns;
    (0..count)
        .map(|i| {
            let (row, col) = (i / columns, i % columns);
            // A partial last row spreads its own ships over the width
            let row_len = if row == last_row {
                count - row * columns
            } else {
                columns
            };
            Vec2::new(spread(col, row_len, size.x), spread(row, rows, size.y))
        })
        .collect()
}

/// A member waiting for its slot to reach the screen
#[derive(Debug, Clone)]
struct Pending {
    ship: ShipSpec,
    offset: Vec2,
    /// Anchor y past which the member appears
    spawn_at: f32,
}

#[derive(Debug)]
pub struct FormationRun {
    pub key: Option<String>,
    anchor: Motion,
    behavior: MoveBehavior,
    /// Members are let go once the default fly-in arrives
    releases_members: bool,
    released: bool,
    fire_behavior: Option<FireBehaviorSpec>,
    pending: VecDeque<Pending>,
    members: Vec<EntityId>,
    num_ships: usize,
}

impl FormationRun {
    pub fn deploy(spec: &FormationSpec, screen: &Screen, rng: &mut Pcg32) -> Self {
        let size = Vec2::new(screen.prop_x(spec.width), screen.prop_y(spec.height));
        let mut ships: Vec<ShipSpec> = spec
            .ships
            .iter()
            .flat_map(|(ship, count)| std::iter::repeat_n(ship, *count))
            .cloned()
            .collect();
        ships.shuffle(rng);

        let offsets = layout_offsets(spec.layout, ships.len(), size);
        let mut pending: Vec<Pending> = ships
            .into_iter()
            .zip(offsets)
            .map(|(ship, offset)| Pending {
                spawn_at: -ship.shape.size().y / 2.0 - offset.y,
                ship,
                offset,
            })
            .collect();
        pending.sort_by(|a, b| a.spawn_at.total_cmp(&b.spawn_at));

        let acceleration = pending
            .iter()
            .map(|p| p.ship.acceleration)
            .reduce(f32::min)
            .unwrap_or(0.0);
        let max_speed = pending.iter().map(|p| p.ship.max_speed).reduce(f32::min);
        let center_x = screen.prop_x(spec.center_x);
        let anchor = Motion::new(acceleration, max_speed).at(Vec2::new(center_x, -size.y / 2.0), Vec2::ZERO);

        let (behavior, releases_members) = match &spec.move_behavior {
            Some(b) => (MoveBehavior::from_spec(b, screen), false),
            None => {
                let dest_y = spec.dest_y.map_or(size.y / 2.0, |y| screen.prop_y(y));
                (
                    MoveBehavior::MoveOnScreen {
                        dest: Vec2::new(center_x, dest_y),
                        arrived: false,
                    },
                    true,
                )
            }
        };
        log::debug!("Deploying formation {:?} with {} ships", spec.key, pending.len());
        Self {
            key: spec.key.clone(),
            anchor,
            behavior,
            releases_members,
            released: false,
            fire_behavior: spec.fire_behavior,
            num_ships: pending.len(),
            pending: pending.into(),
            members: Vec::new(),
        }
    }

    pub fn anchor(&self) -> &Motion {
        &self.anchor
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    /// Ships in the formation when deployed
    pub fn num_ships(&self) -> usize {
        self.num_ships
    }

    /// Members not yet on screen plus members still alive
    pub fn ships_remaining(&self, entities: &Entities) -> usize {
        let alive = self
            .members
            .iter()
            .filter(|id| entities.get(id).is_some_and(|e| e.is_alive()))
            .count();
        self.pending.len() + alive
    }

    pub(crate) fn tick(&mut self, world: &mut World, elapsed: f32) {
        let reach_threshold = world.settings().reached_dest_threshold;
        self.anchor.begin_tick();
        let mut steer = SteerContext {
            side: Side::Enemy,
            steer: glam::IVec2::ZERO,
            entities: &world.entities,
            rng: &mut world.rng,
            reach_threshold,
        };
        self.behavior.update(&mut self.anchor, &mut steer, elapsed);
        self.anchor.clamp_speed();
        self.anchor.integrate_position(elapsed);

        let arrived = matches!(self.behavior, MoveBehavior::MoveOnScreen { arrived: true, .. });
        if self.releases_members && arrived && !self.released {
            self.released = true;
            log::debug!("Formation {:?} released", self.key);
        }

        while self.pending.front().is_some_and(|p| p.spawn_at < self.anchor.pos.y) {
            let Some(slot) = self.pending.pop_front() else {
                break;
            };
            let pos = self.anchor.pos + slot.offset;
            let id = world.spawn_ship(&slot.ship, Side::Enemy, pos, self.anchor.vel);
            if let (Some(fire), Some(ship)) = (self.fire_behavior, world.entity_mut(id).and_then(|e| e.ship_mut())) {
                ship.fire_behavior = Some(fire);
            }
            self.members.push(id);
        }

        let follow = (!self.released).then_some(self.anchor.vel);
        for &id in &self.members {
            if let Some(ship) = world.entity_mut(id).and_then(|e| e.ship_mut()) {
                ship.follow = follow;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::testing::target_ship;
    use rand::SeedableRng;

    fn grid(rows: usize, columns: usize, ships: usize) -> FormationSpec {
        FormationSpec {
            key: Some("Wall".into()),
            layout: FormationLayout::Grid { rows, columns },
            ships: vec![(target_ship(3.0), ships)],
            width: 0.5,
            height: 0.25,
            move_behavior: None,
            fire_behavior: None,
            center_x: 0.5,
            dest_y: None,
        }
    }

    #[test]
    fn test_grid_offsets_center_partial_row() {
        let offsets = layout_offsets(FormationLayout::Grid { rows: 2, columns: 3 }, 4, Vec2::new(200.0, 100.0));
        assert_eq!(offsets[0], Vec2::new(-100.0, -50.0));
        assert_eq!(offsets[2], Vec2::new(100.0, -50.0));
        // One ship in the last row sits in the middle
        assert_eq!(offsets[3], Vec2::new(0.0, 50.0));
    }

    #[test]
    fn test_line_is_one_row() {
        let offsets = layout_offsets(FormationLayout::Line, 3, Vec2::new(100.0, 40.0));
        assert_eq!(offsets, vec![Vec2::new(-50.0, 0.0), Vec2::new(0.0, 0.0), Vec2::new(50.0, 0.0)]);
    }

    #[test]
    fn test_anchor_starts_above_screen() {
        let screen = Screen::new(640.0, 480.0);
        let mut rng = Pcg32::seed_from_u64(3);
        let run = FormationRun::deploy(&grid(2, 3, 6), &screen, &mut rng);
        assert_eq!(run.anchor().pos, Vec2::new(320.0, -60.0));
        assert_eq!(run.num_ships(), 6);
        assert_eq!(run.ships_remaining(&Entities::new()), 6);
    }

    #[test]
    fn test_members_appear_then_release() {
        let mut world = World::default();
        let mut rng = Pcg32::seed_from_u64(3);
        let mut run = FormationRun::deploy(&grid(2, 3, 6), world.screen(), &mut rng);
        let mut frames = 0;
        while !run.is_released() && frames < 1200 {
            run.tick(&mut world, 1.0 / 60.0);
            frames += 1;
        }
        assert!(run.is_released());
        assert_eq!(run.members().len(), 6);
        for &id in run.members() {
            let ship = world.entity(id).and_then(|e| e.ship()).unwrap();
            assert_eq!(ship.follow, None);
        }
        // The anchor stops at half the formation height
        assert!((run.anchor().pos.y - 60.0).abs() <= world.settings().reached_dest_threshold);
    }
}
