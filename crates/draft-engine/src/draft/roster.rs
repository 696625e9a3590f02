// Per-drafter roster construction and greedy slot assignment.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::entity::Draftable;
use super::pick::{Position, SlotKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RosterError {
    #[error("no open DEF slot for {entity_id}")]
    DefenseSlotsFull { entity_id: String },

    #[error("{entity_id} is not on this roster")]
    NotRostered { entity_id: String },
}

/// An entity occupying a roster slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosteredEntity {
    pub id: String,
    pub name: String,
    pub position: Position,
}

impl RosteredEntity {
    fn from_entity<E: Draftable + ?Sized>(entity: &E) -> Self {
        RosteredEntity {
            id: entity.id().to_string(),
            name: entity.name().to_string(),
            position: entity.position(),
        }
    }
}

/// One slot category and the entities filling it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotGroup {
    pub capacity: usize,
    pub occupants: Vec<RosteredEntity>,
}

impl SlotGroup {
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.occupants.len())
    }

    fn take(&mut self, id: &str) -> bool {
        match self.occupants.iter().position(|e| e.id == id) {
            Some(idx) => {
                self.occupants.remove(idx);
                true
            }
            None => false,
        }
    }
}

/// A drafter's roster keyed by slot category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRoster {
    groups: BTreeMap<SlotKind, SlotGroup>,
    /// Picks that found no open slot. Kept so undo remains an exact inverse.
    overflow: Vec<RosteredEntity>,
}

impl TeamRoster {
    /// Create an empty roster from slot capacities.
    pub fn new(slots: &HashMap<SlotKind, usize>) -> Self {
        let groups = slots
            .iter()
            .filter(|(_, &capacity)| capacity > 0)
            .map(|(&kind, &capacity)| {
                (
                    kind,
                    SlotGroup {
                        capacity,
                        occupants: Vec::new(),
                    },
                )
            })
            .collect();
        TeamRoster {
            groups,
            overflow: Vec::new(),
        }
    }

    /// Assign an entity to the first category with room.
    ///
    /// Priority: exact position, then FLEX (flex-eligible positions only),
    /// then bench. Defenses only ever target the DEF slot and a full DEF slot
    /// is an error. Any other entity with nowhere to go is recorded as
    /// overflow and `Ok(None)` is returned.
    pub fn update<E: Draftable + ?Sized>(
        &mut self,
        entity: &E,
    ) -> Result<Option<SlotKind>, RosterError> {
        let pos = entity.position();
        let rostered = RosteredEntity::from_entity(entity);

        if pos == Position::Defense {
            return match self.open_group(SlotKind::Exact(Position::Defense)) {
                Some(group) => {
                    group.occupants.push(rostered);
                    Ok(Some(SlotKind::Exact(Position::Defense)))
                }
                None => Err(RosterError::DefenseSlotsFull {
                    entity_id: rostered.id,
                }),
            };
        }

        let mut order = vec![SlotKind::Exact(pos)];
        if pos.is_flex_eligible() {
            order.push(SlotKind::Flex);
        }
        order.push(SlotKind::Bench);

        for kind in order {
            if let Some(group) = self.open_group(kind) {
                group.occupants.push(rostered);
                return Ok(Some(kind));
            }
        }

        warn!(
            "No open slot for {} ({}); pick recorded without a roster slot",
            rostered.name, pos
        );
        self.overflow.push(rostered);
        Ok(None)
    }

    /// Exact inverse of `update`.
    ///
    /// Searches bench, then FLEX (if eligible), then the exact slot, then the
    /// overflow list. Returns the category the entity was removed from, or
    /// `None` if it came out of overflow.
    pub fn undo_update<E: Draftable + ?Sized>(
        &mut self,
        entity: &E,
    ) -> Result<Option<SlotKind>, RosterError> {
        let pos = entity.position();
        let id = entity.id();

        let mut order = vec![SlotKind::Bench];
        if pos.is_flex_eligible() {
            order.push(SlotKind::Flex);
        }
        order.push(SlotKind::Exact(pos));

        for kind in order {
            if let Some(group) = self.groups.get_mut(&kind) {
                if group.take(id) {
                    return Ok(Some(kind));
                }
            }
        }

        if let Some(idx) = self.overflow.iter().position(|e| e.id == id) {
            self.overflow.remove(idx);
            return Ok(None);
        }

        Err(RosterError::NotRostered {
            entity_id: id.to_string(),
        })
    }

    fn open_group(&mut self, kind: SlotKind) -> Option<&mut SlotGroup> {
        self.groups.get_mut(&kind).filter(|g| g.remaining() > 0)
    }

    /// Whether the entity is on this roster (including overflow).
    pub fn contains(&self, id: &str) -> bool {
        self.groups
            .values()
            .any(|g| g.occupants.iter().any(|e| e.id == id))
            || self.overflow.iter().any(|e| e.id == id)
    }

    /// Number of occupied slots (overflow excluded).
    pub fn occupied_count(&self) -> usize {
        self.groups.values().map(|g| g.occupants.len()).sum()
    }

    /// Remaining capacity in one category (0 if the league has none).
    pub fn remaining(&self, kind: SlotKind) -> usize {
        self.groups.get(&kind).map_or(0, SlotGroup::remaining)
    }

    /// Open slot counts keyed by slot label.
    pub fn open_slots(&self) -> BTreeMap<String, usize> {
        self.groups
            .iter()
            .map(|(kind, g)| (kind.label().to_string(), g.remaining()))
            .collect()
    }

    /// Slot categories in display order with their occupants.
    pub fn slots(&self) -> impl Iterator<Item = (SlotKind, &SlotGroup)> {
        self.groups.iter().map(|(k, g)| (*k, g))
    }

    pub fn overflow(&self) -> &[RosteredEntity] {
        &self.overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::entity::{Player, Team};

    fn test_slots() -> HashMap<SlotKind, usize> {
        let mut m = HashMap::new();
        m.insert(SlotKind::Exact(Position::Quarterback), 1);
        m.insert(SlotKind::Exact(Position::RunningBack), 1);
        m.insert(SlotKind::Exact(Position::WideReceiver), 1);
        m.insert(SlotKind::Exact(Position::Defense), 1);
        m.insert(SlotKind::Flex, 1);
        m.insert(SlotKind::Bench, 1);
        m
    }

    fn wr(id: &str) -> Player {
        Player::new(id, id, Position::WideReceiver, 100.0)
    }

    #[test]
    fn update_fills_exact_then_flex_then_bench() {
        let mut roster = TeamRoster::new(&test_slots());
        assert_eq!(
            roster.update(&wr("w1")).unwrap(),
            Some(SlotKind::Exact(Position::WideReceiver))
        );
        assert_eq!(roster.update(&wr("w2")).unwrap(), Some(SlotKind::Flex));
        assert_eq!(roster.update(&wr("w3")).unwrap(), Some(SlotKind::Bench));
        assert_eq!(roster.occupied_count(), 3);
    }

    #[test]
    fn non_flex_position_skips_flex() {
        let mut roster = TeamRoster::new(&test_slots());
        let qb1 = Player::new("q1", "q1", Position::Quarterback, 300.0);
        let qb2 = Player::new("q2", "q2", Position::Quarterback, 290.0);
        roster.update(&qb1).unwrap();
        assert_eq!(roster.update(&qb2).unwrap(), Some(SlotKind::Bench));
        assert_eq!(roster.remaining(SlotKind::Flex), 1);
    }

    #[test]
    fn overflow_is_non_fatal() {
        let mut roster = TeamRoster::new(&test_slots());
        for id in ["w1", "w2", "w3"] {
            roster.update(&wr(id)).unwrap();
        }
        assert_eq!(roster.update(&wr("w4")).unwrap(), None);
        assert_eq!(roster.overflow().len(), 1);
        assert!(roster.contains("w4"));
        assert_eq!(roster.occupied_count(), 3);

        assert_eq!(roster.undo_update(&wr("w4")).unwrap(), None);
        assert!(!roster.contains("w4"));
    }

    #[test]
    fn full_defense_slot_is_an_error() {
        let mut roster = TeamRoster::new(&test_slots());
        roster.update(&Team::new("dst-a", "A", 120.0)).unwrap();
        let err = roster.update(&Team::new("dst-b", "B", 110.0)).unwrap_err();
        assert_eq!(
            err,
            RosterError::DefenseSlotsFull {
                entity_id: "dst-b".into()
            }
        );
        // No bench fallback for defenses.
        assert_eq!(roster.remaining(SlotKind::Bench), 1);
    }

    #[test]
    fn undo_searches_bench_first() {
        let mut roster = TeamRoster::new(&test_slots());
        let w1 = wr("w1");
        roster.update(&w1).unwrap();
        // Same id placed again lands on FLEX; undo must take it back out of
        // FLEX before touching the exact slot.
        roster.update(&w1).unwrap();
        assert_eq!(roster.undo_update(&w1).unwrap(), Some(SlotKind::Flex));
        assert_eq!(
            roster.undo_update(&w1).unwrap(),
            Some(SlotKind::Exact(Position::WideReceiver))
        );
    }

    #[test]
    fn undo_unknown_entity_is_an_error() {
        let mut roster = TeamRoster::new(&test_slots());
        let err = roster.undo_update(&wr("ghost")).unwrap_err();
        assert_eq!(
            err,
            RosterError::NotRostered {
                entity_id: "ghost".into()
            }
        );
    }

    #[test]
    fn counts_track_net_updates() {
        let mut roster = TeamRoster::new(&test_slots());
        let players: Vec<Player> = ["a", "b", "c"].iter().map(|id| wr(id)).collect();
        for p in &players {
            roster.update(p).unwrap();
        }
        roster.undo_update(&players[1]).unwrap();
        assert_eq!(roster.occupied_count(), 2);
        roster.undo_update(&players[0]).unwrap();
        roster.undo_update(&players[2]).unwrap();
        assert_eq!(roster.occupied_count(), 0);
        assert!(roster.open_slots().values().all(|&n| n >= 1));
        assert_eq!(roster.open_slots().get("BN"), Some(&1));
    }
}
