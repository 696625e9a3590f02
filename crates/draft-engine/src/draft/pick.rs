// Positions, roster slot categories, and individual pick records.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// Football positions an entity can be drafted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Quarterback,
    RunningBack,
    WideReceiver,
    TightEnd,
    Kicker,
    Defense,
}

impl Position {
    /// Every position, in display order.
    pub const ALL: [Position; 6] = [
        Position::Quarterback,
        Position::RunningBack,
        Position::WideReceiver,
        Position::TightEnd,
        Position::Kicker,
        Position::Defense,
    ];

    /// Parse a position string into a Position enum.
    ///
    /// Case-insensitive. Defense accepts the common provider spellings
    /// "DEF", "DST" and "D/ST".
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "QB" => Some(Position::Quarterback),
            "RB" => Some(Position::RunningBack),
            "WR" => Some(Position::WideReceiver),
            "TE" => Some(Position::TightEnd),
            "K" | "PK" => Some(Position::Kicker),
            "DEF" | "DST" | "D/ST" => Some(Position::Defense),
            _ => None,
        }
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Quarterback => "QB",
            Position::RunningBack => "RB",
            Position::WideReceiver => "WR",
            Position::TightEnd => "TE",
            Position::Kicker => "K",
            Position::Defense => "DEF",
        }
    }

    /// Whether this position may fill a FLEX slot.
    pub fn is_flex_eligible(&self) -> bool {
        matches!(
            self,
            Position::RunningBack | Position::WideReceiver | Position::TightEnd
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_str())
    }
}

// ---------------------------------------------------------------------------
// Slot categories
// ---------------------------------------------------------------------------

/// A roster slot category. The DEF slot is `Exact(Position::Defense)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotKind {
    Exact(Position),
    Flex,
    Bench,
}

impl SlotKind {
    /// Parse a roster settings key ("QB", "FLEX", "BN", ...).
    pub fn from_key(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "FLEX" | "W/R/T" => Some(SlotKind::Flex),
            "BN" | "BE" | "BENCH" => Some(SlotKind::Bench),
            other => Position::from_str_pos(other).map(SlotKind::Exact),
        }
    }

    /// Label used for this slot in snapshots and open-slot counts.
    pub fn label(&self) -> &'static str {
        match self {
            SlotKind::Exact(pos) => pos.display_str(),
            SlotKind::Flex => "FLEX",
            SlotKind::Bench => "BN",
        }
    }

    /// Whether this category counts toward starter demand.
    pub fn is_starter(&self) -> bool {
        !matches!(self, SlotKind::Bench)
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Pick records
// ---------------------------------------------------------------------------

/// A pick as applied to draft state.
///
/// `drafter_id` is `None` when the source leaves it empty (bot seats); the
/// drafter is then inferred from the pick number and order type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    pub entity_id: String,
    pub drafter_id: Option<String>,
    pub pick_no: u32,
    pub round: u32,
}

/// A vision-sourced pick that survived the correction tracker, resolved to
/// catalog and league ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeculativePick {
    pub entity_id: String,
    pub drafter_id: String,
    pub round: u32,
    pub pick_in_round: u32,
}

impl SpeculativePick {
    /// Overall (1-based) pick number for a league of `num_teams`.
    pub fn overall_pick(&self, num_teams: usize) -> u32 {
        self.round.saturating_sub(1) * num_teams as u32 + self.pick_in_round
    }

    /// The equivalent state pick at `pick_no`.
    pub fn to_pick(&self, pick_no: u32) -> Pick {
        Pick {
            entity_id: self.entity_id.clone(),
            drafter_id: Some(self.drafter_id.clone()),
            pick_no,
            round: self.round,
        }
    }
}
