// Wire types: poll records, vision candidates, and engine output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::draft::entity::Draftable;
use crate::draft::pick::{Pick, Position};
use crate::draft::state::State;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One record of the poll source's "all picks so far" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolledPick {
    pub player_id: String,
    /// Empty or null for bot seats.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub picked_by: Option<String>,
    pub pick_no: u32,
    pub round: u32,
}

impl PolledPick {
    pub fn to_pick(&self) -> Pick {
        Pick {
            entity_id: self.player_id.clone(),
            drafter_id: self.picked_by.clone(),
            pick_no: self.pick_no,
            round: self.round,
        }
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let s = Option::<String>::deserialize(d)?;
    Ok(s.filter(|v| !v.trim().is_empty()))
}

/// A raw pick announced by the vision collaborator. Every field may be
/// missing; the correction tracker rejects incomplete candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionCandidate {
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default)]
    pub drafter_name: Option<String>,
    #[serde(default)]
    pub round: Option<u32>,
    #[serde(default)]
    pub pick_in_round: Option<u32>,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    pub name: String,
}

impl EntityRef {
    pub fn of<E: Draftable + ?Sized>(entity: &E) -> Self {
        EntityRef {
            id: entity.id().to_string(),
            name: entity.name().to_string(),
        }
    }
}

/// A speculative pick that the poll source contradicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionEvent {
    pub wrong: EntityRef,
    pub right: EntityRef,
    pub pick_no: u32,
    /// "round.pick"
    pub position: String,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableEntry {
    pub id: String,
    pub name: String,
    pub projected_points: f64,
    pub adp: Option<f64>,
    pub injury_status: Option<String>,
    /// VBD fields are absent for team defenses.
    pub vona: Option<f64>,
    pub vols: Option<f64>,
    pub vorp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotView {
    pub slot: String,
    pub occupants: Vec<String>,
    pub open: usize,
}

/// Everything downstream consumers need after a mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub draft_position: String,
    pub pick_no: u32,
    pub next_pick: u32,
    pub is_my_turn: bool,
    pub picks_until_my_turn: u32,
    pub roster: Vec<SlotView>,
    pub open_slots: BTreeMap<String, usize>,
    pub available: BTreeMap<String, Vec<AvailableEntry>>,
    pub generated_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot of the user's view with the top `top_n` available
    /// entities per position.
    pub fn from_state(state: &State, top_n: usize) -> Self {
        let (picks_until_my_turn, is_my_turn) = state.picks_till_my_next_turn(state.pick_no);

        let (roster, open_slots) = match state.my_roster() {
            Some(r) => (
                r.slots()
                    .map(|(kind, group)| SlotView {
                        slot: kind.label().to_string(),
                        occupants: group.occupants.iter().map(|e| e.name.clone()).collect(),
                        open: group.remaining(),
                    })
                    .collect(),
                r.open_slots(),
            ),
            None => (Vec::new(), BTreeMap::new()),
        };

        let mut available = BTreeMap::new();
        for pos in Position::ALL {
            let entries: Vec<AvailableEntry> = if pos == Position::Defense {
                state
                    .available_teams()
                    .iter()
                    .take(top_n)
                    .map(|t| AvailableEntry {
                        id: t.id.clone(),
                        name: t.name.clone(),
                        projected_points: t.projected_points,
                        adp: t.adp,
                        injury_status: None,
                        vona: None,
                        vols: None,
                        vorp: None,
                    })
                    .collect()
            } else {
                state
                    .top_available(pos, top_n)
                    .iter()
                    .map(|p| AvailableEntry {
                        id: p.id.clone(),
                        name: p.name.clone(),
                        projected_points: p.projected_points,
                        adp: p.adp,
                        injury_status: p.injury_status.clone(),
                        vona: Some(p.vona),
                        vols: Some(p.vols),
                        vorp: Some(p.vorp),
                    })
                    .collect()
            };
            if !entries.is_empty() {
                available.insert(pos.display_str().to_string(), entries);
            }
        }

        Snapshot {
            draft_position: state.draft_position_string(),
            pick_no: state.pick_no,
            next_pick: state.pick_no + 1,
            is_my_turn,
            picks_until_my_turn,
            roster,
            open_slots,
            available,
            generated_at: Utc::now(),
        }
    }

    pub fn flags(&self) -> TurnFlags {
        TurnFlags {
            is_my_turn: self.is_my_turn,
            next_pick: self.next_pick,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnFlags {
    pub is_my_turn: bool,
    pub next_pick: u32,
}

/// Messages published to the agent/UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineUpdate {
    Snapshot(Box<Snapshot>),
    TurnFlags(TurnFlags),
    Correction(CorrectionEvent),
}
