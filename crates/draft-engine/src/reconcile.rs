// Reconciliation between confirmed (poll) and speculative (vision) picks.
//
// State is kept in two phases: a monotonic log of confirmed picks and an
// overlay of provisional picks keyed by overall pick number. Speculative
// picks are written to State immediately; a confirmation for the same pick
// number either retires the overlay entry or replaces its entity and emits a
// correction event.

use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::draft::pick::{Pick, SpeculativePick};
use crate::draft::state::{State, StateError};
use crate::protocol::{CorrectionEvent, EntityRef, PolledPick, Snapshot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error(transparent)]
    State(#[from] StateError),
}

impl ReconcileError {
    /// Errors after which the session's state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        match self {
            ReconcileError::State(e) => e.is_corruption(),
        }
    }
}

/// What a confirmation changed besides the confirmed pick itself.
#[derive(Debug, Default, PartialEq)]
pub struct ConfirmOutcome {
    pub correction: Option<CorrectionEvent>,
    /// Speculative picks that were rolled back.
    pub released: Vec<SpeculativePick>,
}

pub struct ReconciliationManager {
    state: State,
    top_n: usize,
    last_confirmed: u32,
    confirmed: Vec<Pick>,
    speculative: BTreeMap<u32, SpeculativePick>,
}

impl ReconciliationManager {
    pub fn new(state: State, top_n: usize) -> Self {
        ReconciliationManager {
            state,
            top_n,
            last_confirmed: 0,
            confirmed: Vec::new(),
            speculative: BTreeMap::new(),
        }
    }

    /// Optimistically apply a vision pick.
    ///
    /// Returns `Ok(false)` when the pick is behind the confirmed log, its
    /// pick number is already speculated, or its entity is already drafted.
    pub fn add_speculative_pick(&mut self, pick: SpeculativePick) -> Result<bool, ReconcileError> {
        let overall = pick.overall_pick(self.state.draft().num_teams);
        if overall <= self.last_confirmed {
            debug!(
                "Speculative pick #{} is at or behind confirmed #{}; ignoring",
                overall, self.last_confirmed
            );
            return Ok(false);
        }
        if self.speculative.contains_key(&overall) {
            debug!("Pick #{} already speculated; ignoring", overall);
            return Ok(false);
        }
        if let Some(owner) = self.state.picked_by(&pick.entity_id) {
            debug!(
                "Speculative pick #{}: {} already drafted by {}; ignoring",
                overall, pick.entity_id, owner
            );
            return Ok(false);
        }

        self.state.process_pick(&pick.to_pick(overall))?;
        info!("Speculative pick #{} applied: {}", overall, pick.entity_id);
        self.speculative.insert(overall, pick);
        Ok(true)
    }

    /// Apply a confirmed pick from the poll source.
    ///
    /// On error the overlay and State are left as they were before the call.
    pub fn apply_confirmed(&mut self, polled: &PolledPick) -> Result<ConfirmOutcome, ReconcileError> {
        let pick = polled.to_pick();
        let right = self
            .state
            .catalog_entity(&pick.entity_id)
            .map(EntityRef::of)
            .ok_or_else(|| StateError::UnknownEntity(pick.entity_id.clone()))?;
        self.state.resolve_drafter(&pick)?;

        let mut undone = Vec::new();
        match self.replace_speculation(&pick, right, &mut undone) {
            Ok(correction) => {
                self.last_confirmed = self.last_confirmed.max(pick.pick_no);
                self.confirmed.push(pick);
                Ok(ConfirmOutcome {
                    correction,
                    released: undone.into_iter().map(|(_, s)| s).collect(),
                })
            }
            Err(e) => {
                warn!(
                    "Confirmed pick #{} could not be applied ({}); keeping {} speculative pick(s)",
                    pick.pick_no,
                    e,
                    undone.len()
                );
                self.restore(undone);
                Err(e)
            }
        }
    }

    /// Undo whatever the overlay holds for this confirmation, then apply it.
    /// Every undone speculation is pushed to `undone` as soon as it leaves
    /// State.
    fn replace_speculation(
        &mut self,
        pick: &Pick,
        right: EntityRef,
        undone: &mut Vec<(u32, SpeculativePick)>,
    ) -> Result<Option<CorrectionEvent>, ReconcileError> {
        // The confirmed entity may have been announced at the wrong pick number.
        let misplaced: Vec<u32> = self
            .speculative
            .iter()
            .filter(|(&no, s)| no != pick.pick_no && s.entity_id == pick.entity_id)
            .map(|(&no, _)| no)
            .collect();
        for no in misplaced {
            if let Some(provisional) = self.speculative.remove(&no) {
                warn!(
                    "{} was speculated at #{} but confirmed at #{}; rolling back",
                    provisional.entity_id, no, pick.pick_no
                );
                self.take_back(no, provisional, undone)?;
            }
        }

        let mut correction = None;
        match self.speculative.remove(&pick.pick_no) {
            Some(provisional) if provisional.entity_id == pick.entity_id => {
                let drafter = self.state.resolve_drafter(pick)?;
                if drafter != provisional.drafter_id {
                    debug!(
                        "Pick #{} confirmed for {} instead of {}; moving",
                        pick.pick_no, drafter, provisional.drafter_id
                    );
                    self.take_back(pick.pick_no, provisional, undone)?;
                } else {
                    debug!("Speculative pick #{} confirmed", pick.pick_no);
                }
            }
            Some(provisional) => {
                let wrong = self
                    .state
                    .catalog_entity(&provisional.entity_id)
                    .map(EntityRef::of)
                    .unwrap_or_else(|| EntityRef {
                        id: provisional.entity_id.clone(),
                        name: provisional.entity_id.clone(),
                    });
                correction = Some(CorrectionEvent {
                    wrong,
                    right,
                    pick_no: pick.pick_no,
                    position: format!("{}.{}", provisional.round, provisional.pick_in_round),
                    detected_at: Utc::now(),
                });
                self.take_back(pick.pick_no, provisional, undone)?;
            }
            None => {}
        }

        self.state.process_pick(pick)?;
        if let Some(event) = &correction {
            warn!(
                "Correction at #{} ({}): {} -> {}",
                event.pick_no, event.position, event.wrong.name, event.right.name
            );
        }
        Ok(correction)
    }

    fn take_back(
        &mut self,
        pick_no: u32,
        provisional: SpeculativePick,
        undone: &mut Vec<(u32, SpeculativePick)>,
    ) -> Result<(), ReconcileError> {
        match self.state.undo_pick(&provisional.to_pick(pick_no)) {
            Ok(()) => {
                undone.push((pick_no, provisional));
                Ok(())
            }
            Err(e) => {
                self.speculative.insert(pick_no, provisional);
                Err(e.into())
            }
        }
    }

    /// Re-apply undone speculations, newest first.
    fn restore(&mut self, undone: Vec<(u32, SpeculativePick)>) {
        for (no, provisional) in undone.into_iter().rev() {
            match self.state.process_pick(&provisional.to_pick(no)) {
                Ok(()) => {
                    self.speculative.insert(no, provisional);
                }
                Err(e) => error!(
                    "Could not restore speculative pick #{} ({}): {}",
                    no, provisional.entity_id, e
                ),
            }
        }
    }

    /// Refresh stale VBD and build a snapshot of the user's view.
    pub fn snapshot(&mut self) -> Snapshot {
        self.state.refresh_vbd();
        Snapshot::from_state(&self.state, self.top_n)
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn last_confirmed(&self) -> u32 {
        self.last_confirmed
    }

    pub fn confirmed_log(&self) -> &[Pick] {
        &self.confirmed
    }

    /// Provisional picks awaiting confirmation, by pick number.
    pub fn speculative(&self) -> &BTreeMap<u32, SpeculativePick> {
        &self.speculative
    }
}
