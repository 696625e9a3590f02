// Correction tracker: filters vision-sourced candidate picks before they are
// applied speculatively.
//
// A candidate is dropped when it is incomplete, when its draft position or
// entity was already seen, when its entity name cannot be resolved to exactly
// one entity, or when its drafter name does not match exactly one league
// member closely enough. An unmatched drafter is treated as a hallucination:
// the tracker never guesses a drafter.

use std::collections::{HashMap, HashSet};

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use tracing::{debug, warn};

use crate::draft::league::League;
use crate::draft::pick::SpeculativePick;
use crate::draft::state::State;
use crate::protocol::{PolledPick, VisionCandidate};

pub struct CorrectionTracker {
    threshold: f64,
    matcher: SkimMatcherV2,
    /// (round, pick in round) -> entity id
    seen_positions: HashMap<(u32, u32), String>,
    seen_entities: HashSet<String>,
}

/// A runner-up within this much of the best score makes a name ambiguous.
const AMBIGUITY_MARGIN: f64 = 0.05;

enum NameMatch<'a> {
    Unique(&'a str, f64),
    Ambiguous(&'a str, &'a str),
    NoMatch,
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl CorrectionTracker {
    /// `threshold` is the minimum similarity in [0, 1] for a name to match.
    pub fn new(threshold: f64) -> Self {
        CorrectionTracker {
            threshold,
            matcher: SkimMatcherV2::default(),
            seen_positions: HashMap::new(),
            seen_entities: HashSet::new(),
        }
    }

    /// Similarity of an announced name to a known one, in [0, 1].
    ///
    /// The skim score is normalized by the larger of the two names' scores
    /// against themselves, so a fragment of a longer name scores well below
    /// 1.0 and only an exact match reaches it.
    pub fn similarity(&self, announced: &str, known: &str) -> f64 {
        let a = normalize(announced);
        let k = normalize(known);
        if a.is_empty() || k.is_empty() {
            return 0.0;
        }
        if a == k {
            return 1.0;
        }
        let Some(score) = self.matcher.fuzzy_match(&k, &a) else {
            return 0.0;
        };
        let self_a = self.matcher.fuzzy_match(&a, &a).unwrap_or(score);
        let self_k = self.matcher.fuzzy_match(&k, &k).unwrap_or(score);
        let perfect = self_a.max(self_k).max(1);
        (score as f64 / perfect as f64).clamp(0.0, 1.0)
    }

    /// Resolve an announced name against known `(id, name)` pairs.
    fn resolve<'a>(
        &self,
        announced: &str,
        known: impl Iterator<Item = (&'a str, &'a str)>,
    ) -> NameMatch<'a> {
        let mut scored: Vec<(&'a str, f64)> = known
            .map(|(id, name)| (id, self.similarity(announced, name)))
            .filter(|&(_, score)| score >= self.threshold)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        match scored.as_slice() {
            [] => NameMatch::NoMatch,
            [(id, score)] => NameMatch::Unique(*id, *score),
            [(id, best), (runner_up, second), ..] => {
                if best - second < AMBIGUITY_MARGIN {
                    NameMatch::Ambiguous(*id, *runner_up)
                } else {
                    NameMatch::Unique(*id, *best)
                }
            }
        }
    }

    /// Screen a vision candidate. Returns the resolved pick if it should be
    /// applied speculatively.
    pub fn screen(
        &mut self,
        candidate: &VisionCandidate,
        state: &State,
        league: &League,
    ) -> Option<SpeculativePick> {
        let (Some(entity_name), Some(drafter_name), Some(round), Some(pick_in_round)) = (
            candidate.entity_name.as_deref().filter(|s| !s.trim().is_empty()),
            candidate.drafter_name.as_deref().filter(|s| !s.trim().is_empty()),
            candidate.round,
            candidate.pick_in_round,
        ) else {
            warn!("Dropping incomplete vision candidate: {:?}", candidate);
            return None;
        };

        let num_teams = state.draft().num_teams as u32;
        if round == 0 || pick_in_round == 0 || pick_in_round > num_teams {
            warn!(
                "Dropping vision candidate with impossible position {}.{}",
                round, pick_in_round
            );
            return None;
        }

        if self.seen_positions.contains_key(&(round, pick_in_round)) {
            debug!("Position {}.{} already seen; dropping", round, pick_in_round);
            return None;
        }

        let (entity_id, entity_score) = match self.resolve(entity_name, state.available_names()) {
            NameMatch::Unique(id, score) => (id, score),
            NameMatch::Ambiguous(first, second) => {
                warn!(
                    "Announced entity '{}' is ambiguous ({} / {}); dropping",
                    entity_name, first, second
                );
                return None;
            }
            NameMatch::NoMatch => {
                warn!("Could not resolve announced entity '{}'", entity_name);
                return None;
            }
        };

        if self.seen_entities.contains(entity_id) {
            debug!("Entity {} already seen; dropping", entity_id);
            return None;
        }

        let (drafter_id, drafter_score) = match self.resolve(drafter_name, league.names()) {
            NameMatch::Unique(id, score) => (id, score),
            NameMatch::Ambiguous(first, second) => {
                warn!(
                    "Announced drafter '{}' is ambiguous ({} / {}); not guessing",
                    drafter_name, first, second
                );
                return None;
            }
            NameMatch::NoMatch => {
                warn!(
                    "Announced drafter '{}' matches no league member; treating as hallucination",
                    drafter_name
                );
                return None;
            }
        };

        debug!(
            "Accepted {}.{}: '{}' -> {} ({:.2}), '{}' -> {} ({:.2})",
            round, pick_in_round, entity_name, entity_id, entity_score, drafter_name, drafter_id,
            drafter_score
        );

        self.seen_positions
            .insert((round, pick_in_round), entity_id.to_string());
        self.seen_entities.insert(entity_id.to_string());

        Some(SpeculativePick {
            entity_id: entity_id.to_string(),
            drafter_id: drafter_id.to_string(),
            round,
            pick_in_round,
        })
    }

    /// Mark a confirmed pick as seen so late vision announcements of it are
    /// dropped.
    pub fn observe_confirmed(&mut self, pick: &PolledPick, num_teams: usize) {
        let n = num_teams.max(1) as u32;
        let idx = pick.pick_no.saturating_sub(1);
        self.seen_positions
            .insert((idx / n + 1, idx % n + 1), pick.player_id.clone());
        self.seen_entities.insert(pick.player_id.clone());
    }

    /// Forget a position and the entity wrongly announced there, so a
    /// corrected announcement can be accepted later.
    pub fn rollback(&mut self, round: u32, pick_in_round: u32, wrong_entity_id: &str) {
        self.seen_positions.remove(&(round, pick_in_round));
        self.seen_entities.remove(wrong_entity_id);
        debug!(
            "Rolled back tracker ledger for {}.{} ({})",
            round, pick_in_round, wrong_entity_id
        );
    }

    pub fn has_seen_position(&self, round: u32, pick_in_round: u32) -> bool {
        self.seen_positions.contains_key(&(round, pick_in_round))
    }

    pub fn has_seen_entity(&self, entity_id: &str) -> bool {
        self.seen_entities.contains(entity_id)
    }
}
