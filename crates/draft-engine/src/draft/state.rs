// Draft state: pick ledger, roster assignment, turn arithmetic and VBD.

use std::collections::{BTreeSet, HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, info};

use super::entity::{rank_cmp, Draftable, Entity, Player, Team};
use super::league::{Draft, OrderType};
use super::pick::{Pick, Position, SlotKind};
use super::roster::{RosterError, TeamRoster};
use crate::valuation::projections::StatPool;
use crate::valuation::vbd;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("unknown entity id {0}")]
    UnknownEntity(String),

    #[error("unknown drafter id {0}")]
    UnknownDrafter(String),

    #[error("{entity_id} was never picked by {drafter_id}")]
    NotPicked {
        entity_id: String,
        drafter_id: String,
    },

    #[error(transparent)]
    Roster(#[from] RosterError),
}

impl StateError {
    /// Whether this error means the ledger and rosters have diverged.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StateError::NotPicked { .. } | StateError::Roster(RosterError::NotRostered { .. })
        )
    }
}

// ---------------------------------------------------------------------------
// Turn arithmetic
// ---------------------------------------------------------------------------

/// Seat index (0-based) that makes overall pick `pick_number` (1-based).
///
/// `pick_number` 0 is treated as the first pick.
pub fn seat_for_pick(order_type: OrderType, num_teams: usize, pick_number: u32) -> usize {
    let n = num_teams.max(1);
    let idx = pick_number.saturating_sub(1) as usize;
    let round = idx / n;
    let in_round = idx % n;
    match order_type {
        OrderType::Snake if round % 2 == 1 => n - 1 - in_round,
        _ => in_round,
    }
}

/// Picks made before `my_seat` is on the clock, given `pick_no` picks made
/// so far, and whether `my_seat` is on the clock right now.
pub fn picks_till_turn(
    order_type: OrderType,
    num_teams: usize,
    my_seat: usize,
    pick_no: u32,
) -> (u32, bool) {
    let n = num_teams.max(1);
    let round = pick_no as usize / n;
    let in_round = pick_no as usize % n;

    // Where my seat falls within a given round.
    let my_index = |r: usize| match order_type {
        OrderType::Snake if r % 2 == 1 => n - 1 - my_seat,
        _ => my_seat,
    };

    let this_round = my_index(round);
    let count = if in_round <= this_round {
        this_round - in_round
    } else {
        (n - in_round) + my_index(round + 1)
    };
    (count as u32, count == 0)
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct State {
    draft: Draft,
    /// Highest pick number observed. Never decreases.
    pub pick_no: u32,
    rosters: HashMap<String, TeamRoster>,
    picks: HashMap<String, BTreeSet<String>>,
    available: HashMap<Position, Vec<Player>>,
    available_teams: Vec<Team>,
    drafted_team_names: HashSet<String>,
    catalog: HashMap<String, Entity>,
    stale: BTreeSet<Position>,
}

impl State {
    pub fn new(draft: Draft, pool: StatPool) -> Self {
        let mut available: HashMap<Position, Vec<Player>> = HashMap::new();
        let mut catalog = HashMap::new();

        for p in pool.players {
            catalog.insert(p.id.clone(), Entity::Player(p.clone()));
            available.entry(p.position).or_default().push(p);
        }
        for players in available.values_mut() {
            players.sort_by(rank_cmp);
        }

        let mut available_teams = pool.teams;
        available_teams.sort_by(rank_cmp);
        for t in &available_teams {
            catalog.insert(t.id.clone(), Entity::Team(t.clone()));
        }

        let rosters = draft
            .draft_order
            .iter()
            .map(|id| (id.clone(), TeamRoster::new(&draft.slots)))
            .collect();
        let picks = draft
            .draft_order
            .iter()
            .map(|id| (id.clone(), BTreeSet::new()))
            .collect();
        let stale = available.keys().copied().collect();

        State {
            draft,
            pick_no: 0,
            rosters,
            picks,
            available,
            available_teams,
            drafted_team_names: HashSet::new(),
            catalog,
            stale,
        }
    }

    // -- Transitions --

    /// Apply a pick.
    ///
    /// Replaying a pick whose entity is already drafted only advances the
    /// counter, so replays of equal or earlier pick numbers are no-ops.
    pub fn process_pick(&mut self, pick: &Pick) -> Result<(), StateError> {
        let entity = self.entity(&pick.entity_id)?.clone();
        let drafter = self.resolve_drafter(pick)?;

        if let Some(owner) = self.picked_by(&pick.entity_id) {
            debug!(
                "Pick #{}: {} already drafted by {}; skipping",
                pick.pick_no,
                entity.name(),
                owner
            );
            self.pick_no = self.pick_no.max(pick.pick_no);
            return Ok(());
        }

        let roster = self
            .rosters
            .get_mut(&drafter)
            .ok_or_else(|| StateError::UnknownDrafter(drafter.clone()))?;
        let slot = roster.update(&entity)?;

        info!(
            "Pick #{}: {} -> {} ({})",
            pick.pick_no,
            entity.summary(),
            drafter,
            slot.map_or("overflow", |s| s.label())
        );

        self.picks
            .entry(drafter)
            .or_default()
            .insert(pick.entity_id.clone());
        self.take_from_pool(&entity);
        self.pick_no = self.pick_no.max(pick.pick_no);
        Ok(())
    }

    /// Exact inverse of `process_pick`. Leaves `pick_no` untouched.
    pub fn undo_pick(&mut self, pick: &Pick) -> Result<(), StateError> {
        let entity = self.entity(&pick.entity_id)?.clone();
        let drafter = self.resolve_drafter(pick)?;

        let picked = self
            .picks
            .get(&drafter)
            .is_some_and(|set| set.contains(&pick.entity_id));
        if !picked {
            return Err(StateError::NotPicked {
                entity_id: pick.entity_id.clone(),
                drafter_id: drafter,
            });
        }

        let roster = self
            .rosters
            .get_mut(&drafter)
            .ok_or_else(|| StateError::UnknownDrafter(drafter.clone()))?;
        roster.undo_update(&entity)?;

        if let Some(set) = self.picks.get_mut(&drafter) {
            set.remove(&pick.entity_id);
        }
        self.return_to_pool(&entity);

        info!("Undid pick #{}: {} from {}", pick.pick_no, entity.name(), drafter);
        Ok(())
    }

    fn take_from_pool(&mut self, entity: &Entity) {
        match entity {
            Entity::Player(p) => {
                if let Some(pool) = self.available.get_mut(&p.position) {
                    pool.retain(|a| a.id != p.id);
                }
                self.stale.insert(p.position);
            }
            Entity::Team(t) => {
                self.available_teams.retain(|a| a.id != t.id);
                self.drafted_team_names.insert(t.name.clone());
            }
        }
    }

    fn return_to_pool(&mut self, entity: &Entity) {
        match entity {
            Entity::Player(p) => {
                let pool = self.available.entry(p.position).or_default();
                if let Err(idx) = pool.binary_search_by(|a| rank_cmp(a, p)) {
                    pool.insert(idx, p.clone());
                }
                self.stale.insert(p.position);
            }
            Entity::Team(t) => {
                if let Err(idx) = self.available_teams.binary_search_by(|a| rank_cmp(a, t)) {
                    self.available_teams.insert(idx, t.clone());
                }
                self.drafted_team_names.remove(&t.name);
            }
        }
    }

    // -- Resolution --

    fn entity(&self, id: &str) -> Result<&Entity, StateError> {
        self.catalog
            .get(id)
            .ok_or_else(|| StateError::UnknownEntity(id.to_string()))
    }

    /// The drafter a pick belongs to, inferred from the pick number and
    /// order type when the source leaves it empty.
    pub fn resolve_drafter(&self, pick: &Pick) -> Result<String, StateError> {
        match pick.drafter_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                if self.rosters.contains_key(id) {
                    Ok(id.to_string())
                } else {
                    Err(StateError::UnknownDrafter(id.to_string()))
                }
            }
            _ => self
                .seat_of_pick(pick.pick_no)
                .map(str::to_string)
                .ok_or_else(|| StateError::UnknownDrafter(format!("pick #{}", pick.pick_no))),
        }
    }

    /// Drafter id that makes overall pick `pick_no`.
    pub fn seat_of_pick(&self, pick_no: u32) -> Option<&str> {
        let seat = seat_for_pick(self.draft.order_type, self.draft.num_teams, pick_no);
        self.draft.draft_order.get(seat).map(String::as_str)
    }

    /// Drafter holding the entity, if any.
    pub fn picked_by(&self, entity_id: &str) -> Option<&str> {
        self.picks
            .iter()
            .find(|(_, set)| set.contains(entity_id))
            .map(|(drafter, _)| drafter.as_str())
    }

    // -- Turn arithmetic --

    /// Picks made before the user is next on the clock, and whether the user
    /// is on the clock now, after `pick_no` picks.
    pub fn picks_till_my_next_turn(&self, pick_no: u32) -> (u32, bool) {
        self.picks_till_turn_for(&self.draft.my_drafter, pick_no)
    }

    /// `picks_till_my_next_turn` from another drafter's seat.
    pub fn picks_till_turn_for(&self, drafter_id: &str, pick_no: u32) -> (u32, bool) {
        match self.draft.seat_of(drafter_id) {
            Some(seat) => picks_till_turn(self.draft.order_type, self.draft.num_teams, seat, pick_no),
            None => (0, false),
        }
    }

    /// Draft position of the pick on the clock, as "round.pick".
    pub fn draft_position_string(&self) -> String {
        let n = self.draft.num_teams.max(1) as u32;
        let on_clock = (self.pick_no + 1).min(self.draft.total_picks().max(1));
        let idx = on_clock - 1;
        format!("{}.{}", idx / n + 1, idx % n + 1)
    }

    pub fn is_complete(&self) -> bool {
        self.pick_no >= self.draft.total_picks()
    }

    // -- VBD --

    /// Recompute vona/vols/vorp for every available player at `position`.
    pub fn calculate_user_vbd_metrics(&mut self, position: Position) {
        if position == Position::Defense {
            return;
        }
        let (picks_before_turn, _) = self.picks_till_my_next_turn(self.pick_no);
        let demand = self.starter_demand(position);
        if let Some(pool) = self.available.get_mut(&position) {
            vbd::apply(pool, picks_before_turn as usize, demand);
        }
        self.stale.remove(&position);
    }

    /// Recompute VBD for positions whose availability changed since their
    /// last recompute. Returns the refreshed positions.
    pub fn refresh_vbd(&mut self) -> Vec<Position> {
        let stale: Vec<Position> = std::mem::take(&mut self.stale).into_iter().collect();
        for &pos in &stale {
            self.calculate_user_vbd_metrics(pos);
        }
        if !stale.is_empty() {
            debug!("Refreshed VBD for {:?}", stale);
        }
        stale
    }

    /// Remaining dedicated starter capacity for a position across all drafters.
    pub fn starter_demand(&self, position: Position) -> usize {
        self.rosters
            .values()
            .map(|r| r.remaining(SlotKind::Exact(position)))
            .sum()
    }

    pub fn is_stale(&self, position: Position) -> bool {
        self.stale.contains(&position)
    }

    // -- Accessors --

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn roster(&self, drafter_id: &str) -> Option<&TeamRoster> {
        self.rosters.get(drafter_id)
    }

    pub fn my_roster(&self) -> Option<&TeamRoster> {
        self.roster(&self.draft.my_drafter)
    }

    pub fn picks_of(&self, drafter_id: &str) -> Option<&BTreeSet<String>> {
        self.picks.get(drafter_id)
    }

    /// Available players at a position, in rank order.
    pub fn available(&self, position: Position) -> &[Player] {
        self.available
            .get(&position)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The best `n` available players at a position.
    pub fn top_available(&self, position: Position, n: usize) -> &[Player] {
        let pool = self.available(position);
        &pool[..n.min(pool.len())]
    }

    /// Available team defenses, in rank order.
    pub fn available_teams(&self) -> &[Team] {
        &self.available_teams
    }

    pub fn is_team_drafted(&self, name: &str) -> bool {
        self.drafted_team_names.contains(name)
    }

    pub fn catalog_entity(&self, id: &str) -> Option<&Entity> {
        self.catalog.get(id)
    }

    /// (id, name) of every entity still available.
    pub fn available_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.available
            .values()
            .flatten()
            .map(|p| (p.id.as_str(), p.name.as_str()))
            .chain(
                self.available_teams
                    .iter()
                    .map(|t| (t.id.as_str(), t.name.as_str())),
            )
    }
}
