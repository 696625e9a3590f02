// Draft and league settings normalization.
//
// Raw settings from league.toml may list fewer drafters than seats and may
// omit draft positions. Normalization produces a full seat order with bot
// participants, parsed slot capacities, order type and scoring format.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::pick::{Position, SlotKind};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeagueError {
    #[error("unsupported draft order type: {0}")]
    UnsupportedOrderType(String),

    #[error("unsupported scoring format: {0}")]
    UnsupportedScoring(String),

    #[error("unknown roster slot key: {0}")]
    UnknownSlot(String),

    #[error("invalid league settings: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Order type and scoring format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Same seat order every round.
    Linear,
    /// Seat order reverses each round.
    Snake,
}

impl OrderType {
    pub fn parse(s: &str) -> Result<Self, LeagueError> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(OrderType::Linear),
            "snake" => Ok(OrderType::Snake),
            other => Err(LeagueError::UnsupportedOrderType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoringFormat {
    Standard,
    HalfPpr,
    Ppr,
}

impl ScoringFormat {
    pub fn parse(s: &str) -> Result<Self, LeagueError> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "standard" | "std" | "non_ppr" => Ok(ScoringFormat::Standard),
            "half_ppr" | "half" | "0.5_ppr" => Ok(ScoringFormat::HalfPpr),
            "ppr" | "full_ppr" => Ok(ScoringFormat::Ppr),
            other => Err(LeagueError::UnsupportedScoring(other.to_string())),
        }
    }

    /// Points per reception, used to rank approximate format variants.
    fn reception_weight(&self) -> u8 {
        match self {
            ScoringFormat::Standard => 0,
            ScoringFormat::HalfPpr => 1,
            ScoringFormat::Ppr => 2,
        }
    }

    /// 0 for an exact match; larger is further away.
    pub fn distance(&self, other: ScoringFormat) -> u8 {
        self.reception_weight().abs_diff(other.reception_weight())
    }
}

impl fmt::Display for ScoringFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScoringFormat::Standard => "standard",
            ScoringFormat::HalfPpr => "half_ppr",
            ScoringFormat::Ppr => "ppr",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Raw settings (league.toml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RawLeagueSettings {
    pub id: String,
    pub name: String,
    pub num_teams: usize,
    /// Defaults to the total roster capacity.
    #[serde(default)]
    pub rounds: Option<u32>,
    pub order_type: String,
    pub scoring: String,
    /// Drafter id of the user this engine advises.
    pub my_drafter: String,
    pub slots: HashMap<String, usize>,
    #[serde(default)]
    pub drafters: Vec<RawDrafter>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDrafter {
    pub id: String,
    pub name: String,
    /// 1-based seat. Assigned automatically when omitted.
    #[serde(default)]
    pub draft_position: Option<usize>,
}

// ---------------------------------------------------------------------------
// Normalized settings
// ---------------------------------------------------------------------------

/// Static draft configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    /// Drafter ids by seat (index 0 picks first in round 1).
    pub draft_order: Vec<String>,
    pub order_type: OrderType,
    pub slots: HashMap<SlotKind, usize>,
    pub rounds: u32,
    pub num_teams: usize,
    pub scoring: ScoringFormat,
    pub my_drafter: String,
}

impl Draft {
    /// Seat index of a drafter, if they are in the draft.
    pub fn seat_of(&self, drafter_id: &str) -> Option<usize> {
        self.draft_order.iter().position(|d| d == drafter_id)
    }

    /// Total number of picks in the draft.
    pub fn total_picks(&self) -> u32 {
        self.rounds * self.num_teams as u32
    }

    /// Per-team starter capacity for a position's dedicated slot.
    pub fn starters_at(&self, pos: Position) -> usize {
        self.slots.get(&SlotKind::Exact(pos)).copied().unwrap_or(0)
    }
}

/// Static drafter id to display-name mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct League {
    pub id: String,
    pub name: String,
    pub members: BTreeMap<String, String>,
}

impl League {
    pub fn display_name(&self, drafter_id: &str) -> Option<&str> {
        self.members.get(drafter_id).map(String::as_str)
    }

    /// (id, display name) pairs.
    pub fn names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members.iter().map(|(id, name)| (id.as_str(), name.as_str()))
    }
}

/// Resolve raw settings into a `Draft` and `League`.
///
/// Every failure here is fatal: the engine never runs against partially
/// understood settings.
pub fn build(raw: &RawLeagueSettings) -> Result<(Draft, League), LeagueError> {
    let order_type = OrderType::parse(&raw.order_type)?;
    let scoring = ScoringFormat::parse(&raw.scoring)?;
    let n = raw.num_teams;

    if n == 0 {
        return Err(LeagueError::Invalid("num_teams must be greater than 0".into()));
    }
    if raw.drafters.len() > n {
        return Err(LeagueError::Invalid(format!(
            "{} drafters listed for {} seats",
            raw.drafters.len(),
            n
        )));
    }

    let mut slots = HashMap::new();
    for (key, &count) in &raw.slots {
        let kind = SlotKind::from_key(key).ok_or_else(|| LeagueError::UnknownSlot(key.clone()))?;
        *slots.entry(kind).or_insert(0) += count;
    }
    let capacity: usize = slots.values().sum();
    if capacity == 0 {
        return Err(LeagueError::Invalid("roster has no slots".into()));
    }

    // Seats: explicit positions first, then unseated humans, then bots, each
    // taking the lowest open seat.
    let mut seats: Vec<Option<&RawDrafter>> = vec![None; n];
    for d in raw.drafters.iter().filter(|d| d.draft_position.is_some()) {
        let pos = d.draft_position.unwrap_or_default();
        if pos == 0 || pos > n {
            return Err(LeagueError::Invalid(format!(
                "draft_position {pos} for {} is outside 1..={n}",
                d.id
            )));
        }
        if seats[pos - 1].is_some() {
            return Err(LeagueError::Invalid(format!(
                "draft_position {pos} is assigned twice"
            )));
        }
        seats[pos - 1] = Some(d);
    }
    for d in raw.drafters.iter().filter(|d| d.draft_position.is_none()) {
        if let Some(open) = seats.iter_mut().find(|s| s.is_none()) {
            *open = Some(d);
        }
    }

    let mut draft_order = Vec::with_capacity(n);
    let mut members = BTreeMap::new();
    for (idx, seat) in seats.iter().enumerate() {
        let (id, name) = match seat {
            Some(d) => (d.id.clone(), d.name.clone()),
            None => {
                let seat_no = idx + 1;
                debug!("Seat {} unclaimed; assigning a bot", seat_no);
                (format!("bot-{seat_no}"), format!("Bot {seat_no}"))
            }
        };
        if members.insert(id.clone(), name).is_some() {
            return Err(LeagueError::Invalid(format!("drafter id {id} listed twice")));
        }
        draft_order.push(id);
    }

    if !draft_order.contains(&raw.my_drafter) {
        return Err(LeagueError::Invalid(format!(
            "my_drafter {} is not in the draft",
            raw.my_drafter
        )));
    }

    let rounds = raw.rounds.unwrap_or(capacity as u32);
    if rounds == 0 {
        return Err(LeagueError::Invalid("rounds must be greater than 0".into()));
    }

    info!(
        "League {} resolved: {} seats ({} bots), {} rounds, {:?} order, {} scoring",
        raw.name,
        n,
        n - raw.drafters.len(),
        rounds,
        order_type,
        scoring
    );

    let draft = Draft {
        draft_order,
        order_type,
        slots,
        rounds,
        num_teams: n,
        scoring,
        my_drafter: raw.my_drafter.clone(),
    };
    let league = League {
        id: raw.id.clone(),
        name: raw.name.clone(),
        members,
    };
    Ok((draft, league))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(num_teams: usize, drafters: Vec<RawDrafter>) -> RawLeagueSettings {
        let mut slots = HashMap::new();
        slots.insert("WR".into(), 1);
        slots.insert("BN".into(), 1);
        RawLeagueSettings {
            id: "lg".into(),
            name: "Test League".into(),
            num_teams,
            rounds: None,
            order_type: "snake".into(),
            scoring: "ppr".into(),
            my_drafter: "me".into(),
            slots,
            drafters,
        }
    }

    fn drafter(id: &str, pos: Option<usize>) -> RawDrafter {
        RawDrafter {
            id: id.into(),
            name: id.to_uppercase(),
            draft_position: pos,
        }
    }

    #[test]
    fn bots_fill_lowest_open_seats() {
        let settings = raw(4, vec![drafter("me", Some(2)), drafter("x", Some(4))]);
        let (draft, league) = build(&settings).unwrap();
        assert_eq!(draft.draft_order, vec!["bot-1", "me", "bot-3", "x"]);
        assert_eq!(league.display_name("bot-3"), Some("Bot 3"));
        assert_eq!(league.display_name("me"), Some("ME"));
        assert_eq!(draft.seat_of("x"), Some(3));
    }

    #[test]
    fn unseated_humans_take_open_seats_before_bots() {
        let settings = raw(3, vec![drafter("a", Some(1)), drafter("me", None)]);
        let (draft, _) = build(&settings).unwrap();
        assert_eq!(draft.draft_order, vec!["a", "me", "bot-3"]);
    }

    #[test]
    fn rounds_default_to_roster_capacity() {
        let (draft, _) = build(&raw(2, vec![drafter("me", None)])).unwrap();
        assert_eq!(draft.rounds, 2);
        assert_eq!(draft.total_picks(), 4);
        assert_eq!(draft.starters_at(Position::WideReceiver), 1);
    }

    #[test]
    fn rejects_unsupported_order_type() {
        let mut settings = raw(2, vec![drafter("me", None)]);
        settings.order_type = "auction".into();
        assert_eq!(
            build(&settings).unwrap_err(),
            LeagueError::UnsupportedOrderType("auction".into())
        );
    }

    #[test]
    fn rejects_unsupported_scoring() {
        let mut settings = raw(2, vec![drafter("me", None)]);
        settings.scoring = "points_per_first_down".into();
        assert!(matches!(
            build(&settings).unwrap_err(),
            LeagueError::UnsupportedScoring(_)
        ));
    }

    #[test]
    fn rejects_duplicate_seat() {
        let settings = raw(3, vec![drafter("me", Some(1)), drafter("b", Some(1))]);
        assert!(matches!(build(&settings).unwrap_err(), LeagueError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_slot() {
        let mut settings = raw(2, vec![drafter("me", None)]);
        settings.slots.insert("IR".into(), 1);
        assert_eq!(
            build(&settings).unwrap_err(),
            LeagueError::UnknownSlot("IR".into())
        );
    }

    #[test]
    fn rejects_missing_user_drafter() {
        let settings = raw(2, vec![drafter("someone", None)]);
        assert!(matches!(build(&settings).unwrap_err(), LeagueError::Invalid(_)));
    }

    #[test]
    fn scoring_distance() {
        assert_eq!(ScoringFormat::Ppr.distance(ScoringFormat::Ppr), 0);
        assert_eq!(ScoringFormat::Ppr.distance(ScoringFormat::HalfPpr), 1);
        assert_eq!(ScoringFormat::Standard.distance(ScoringFormat::Ppr), 2);
        assert_eq!(ScoringFormat::parse("Half-PPR").unwrap(), ScoringFormat::HalfPpr);
    }
}
