//! Membership groups
//!
//! Groups order updates and pair entities for collision tests. They hold
//! ids only; the world owns the entities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entity::{EntityId, Kind, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Group {
    FriendlyShips,
    EnemyShips,
    FriendlyProjectiles,
    EnemyProjectiles,
    FriendlyShields,
    EnemyShields,
    AllShips,
}

/// Groups in the order their members are ticked
pub const UPDATE_ORDER: [Group; 7] = [
    Group::FriendlyShips,
    Group::EnemyShips,
    Group::FriendlyProjectiles,
    Group::EnemyProjectiles,
    Group::FriendlyShields,
    Group::EnemyShields,
    Group::AllShips,
];

impl Group {
    /// Every group an entity of this kind and side belongs to
    pub fn memberships(kind: Kind, side: Side) -> Vec<Group> {
        let friendly = side == Side::Friendly;
        if kind.is_ship() {
            let own = if friendly { Group::FriendlyShips } else { Group::EnemyShips };
            vec![own, Group::AllShips]
        } else if kind == Kind::Projectile {
            vec![if friendly {
                Group::FriendlyProjectiles
            } else {
                Group::EnemyProjectiles
            }]
        } else if kind == Kind::Shield {
            vec![if friendly { Group::FriendlyShields } else { Group::EnemyShields }]
        } else {
            Vec::new()
        }
    }
}

/// Ordered member lists
#[derive(Debug, Clone, Default)]
pub struct Groups {
    members: BTreeMap<Group, Vec<EntityId>>,
}

impl Groups {
    pub fn members(&self, group: Group) -> &[EntityId] {
        self.members.get(&group).map_or(&[], Vec::as_slice)
    }

    pub fn contains(&self, group: Group, id: EntityId) -> bool {
        self.members(group).contains(&id)
    }

    pub fn add(&mut self, group: Group, id: EntityId) {
        let list = self.members.entry(group).or_default();
        if !list.contains(&id) {
            list.push(id);
        }
    }

    /// Drop `id` from every group
    pub fn remove(&mut self, id: EntityId) {
        for list in self.members.values_mut() {
            list.retain(|&m| m != id);
        }
    }

    /// Make `id` a member of exactly `groups`, keeping its position in
    /// groups it stays in
    pub fn sync(&mut self, id: EntityId, groups: &[Group]) {
        for (group, list) in self.members.iter_mut() {
            if !groups.contains(group) {
                list.retain(|&m| m != id);
            }
        }
        for &group in groups {
            self.add(group, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ships_join_all_ships() {
        assert_eq!(
            Group::memberships(Kind::EnemyShip, Side::Enemy),
            vec![Group::EnemyShips, Group::AllShips]
        );
        assert_eq!(
            Group::memberships(Kind::Shield, Side::Friendly),
            vec![Group::FriendlyShields]
        );
    }

    #[test]
    fn test_sync_moves_between_sides() {
        let mut groups = Groups::default();
        let (a, b) = (EntityId(1), EntityId(2));
        groups.sync(a, &Group::memberships(Kind::Ship, Side::Enemy));
        groups.sync(b, &Group::memberships(Kind::Ship, Side::Enemy));
        groups.sync(a, &Group::memberships(Kind::Ship, Side::Friendly));
        assert_eq!(groups.members(Group::EnemyShips), &[b]);
        assert_eq!(groups.members(Group::FriendlyShips), &[a]);
        // Order in a group it never left is kept
        assert_eq!(groups.members(Group::AllShips), &[a, b]);
        groups.remove(a);
        assert!(!groups.contains(Group::AllShips, a));
    }
}
