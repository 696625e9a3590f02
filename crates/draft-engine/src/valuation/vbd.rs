// Value-based drafting (VBD) over a sorted available pool.
//
// Three reference projections are read off the pool for one position:
// - next: the player expected to be left when the user picks next
//   (index = picks made before the user's next turn)
// - last starter: the final starter taken league-wide
//   (index = remaining starter demand - 1)
// - replacement: the first player past the last starter
//   (index = remaining starter demand)
// Indices past the end clamp to the last player in the pool.

use crate::draft::entity::Player;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VbdReferences {
    pub next: f64,
    pub last_starter: f64,
    pub replacement: f64,
}

/// Compute reference projections, or `None` for an empty pool.
///
/// `pool` must already be in rank order.
pub fn reference_levels(
    pool: &[Player],
    picks_before_turn: usize,
    starter_demand: usize,
) -> Option<VbdReferences> {
    let last = pool.len().checked_sub(1)?;
    let at = |idx: usize| pool[idx.min(last)].projected_points;
    Some(VbdReferences {
        next: at(picks_before_turn),
        last_starter: at(starter_demand.saturating_sub(1)),
        replacement: at(starter_demand),
    })
}

/// Recompute vona/vols/vorp for every player in the pool.
pub fn apply(pool: &mut [Player], picks_before_turn: usize, starter_demand: usize) {
    let Some(refs) = reference_levels(pool, picks_before_turn, starter_demand) else {
        return;
    };
    for p in pool.iter_mut() {
        p.vona = p.projected_points - refs.next;
        p.vols = p.projected_points - refs.last_starter;
        p.vorp = p.projected_points - refs.replacement;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::pick::Position;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn pool(points: &[f64]) -> Vec<Player> {
        points
            .iter()
            .enumerate()
            .map(|(i, &pts)| Player::new(&format!("rb{i}"), "RB", Position::RunningBack, pts))
            .collect()
    }

    #[test]
    fn references_index_into_pool() {
        let p = pool(&[300.0, 250.0, 200.0, 150.0, 100.0]);
        let refs = reference_levels(&p, 1, 3).unwrap();
        assert!(approx_eq(refs.next, 250.0));
        assert!(approx_eq(refs.last_starter, 200.0));
        assert!(approx_eq(refs.replacement, 150.0));
    }

    #[test]
    fn indices_clamp_to_pool() {
        let p = pool(&[300.0, 250.0]);
        let refs = reference_levels(&p, 7, 12).unwrap();
        assert!(approx_eq(refs.next, 250.0));
        assert!(approx_eq(refs.last_starter, 250.0));
        assert!(approx_eq(refs.replacement, 250.0));
    }

    #[test]
    fn zero_demand_uses_top_player_as_last_starter() {
        let p = pool(&[300.0, 250.0, 200.0]);
        let refs = reference_levels(&p, 0, 0).unwrap();
        assert!(approx_eq(refs.next, 300.0));
        assert!(approx_eq(refs.last_starter, 300.0));
        assert!(approx_eq(refs.replacement, 300.0));
    }

    #[test]
    fn empty_pool_has_no_references() {
        assert!(reference_levels(&[], 0, 3).is_none());
    }

    #[test]
    fn apply_sets_differences() {
        let mut p = pool(&[300.0, 250.0, 200.0, 150.0]);
        apply(&mut p, 2, 2);
        assert!(approx_eq(p[0].vona, 100.0));
        assert!(approx_eq(p[0].vols, 50.0));
        assert!(approx_eq(p[0].vorp, 100.0));
        assert!(approx_eq(p[3].vorp, -50.0));
    }
}
