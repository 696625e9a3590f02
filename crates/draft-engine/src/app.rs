// Application event loop: the single task that mutates draft state.
//
// Confirmed picks arrive in pick order from the poller; vision candidates
// arrive on their own channel and skip the confirmed queue. Both are drained
// here so State only ever has one writer. After every mutation a snapshot
// and the turn flags are published downstream.

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::draft::league::League;
use crate::protocol::{EngineUpdate, PolledPick, VisionCandidate};
use crate::reconcile::ReconciliationManager;
use crate::tracker::CorrectionTracker;

/// Everything the event loop owns.
pub struct Engine {
    manager: ReconciliationManager,
    tracker: CorrectionTracker,
    league: League,
}

impl Engine {
    pub fn new(manager: ReconciliationManager, tracker: CorrectionTracker, league: League) -> Self {
        Engine {
            manager,
            tracker,
            league,
        }
    }

    pub fn manager(&self) -> &ReconciliationManager {
        &self.manager
    }

    pub fn tracker(&self) -> &CorrectionTracker {
        &self.tracker
    }

    async fn publish(&mut self, out: &mpsc::Sender<EngineUpdate>) {
        let snapshot = self.manager.snapshot();
        let flags = snapshot.flags();
        let _ = out.send(EngineUpdate::Snapshot(Box::new(snapshot))).await;
        let _ = out.send(EngineUpdate::TurnFlags(flags)).await;
    }

    async fn handle_confirmed(
        &mut self,
        pick: &PolledPick,
        out: &mpsc::Sender<EngineUpdate>,
    ) -> anyhow::Result<()> {
        let outcome = match self.manager.apply_confirmed(pick) {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => {
                error!("Confirmed pick #{} corrupted draft state: {}", pick.pick_no, e);
                return Err(e).with_context(|| {
                    format!("reconciliation halted at confirmed pick #{}", pick.pick_no)
                });
            }
            Err(e) => {
                warn!("Dropping confirmed pick #{}: {}", pick.pick_no, e);
                return Ok(());
            }
        };

        for released in &outcome.released {
            self.tracker
                .rollback(released.round, released.pick_in_round, &released.entity_id);
        }
        let num_teams = self.manager.state().draft().num_teams;
        self.tracker.observe_confirmed(pick, num_teams);

        if let Some(event) = outcome.correction {
            let _ = out.send(EngineUpdate::Correction(event)).await;
        }
        self.publish(out).await;
        Ok(())
    }

    async fn handle_vision(
        &mut self,
        candidate: &VisionCandidate,
        out: &mpsc::Sender<EngineUpdate>,
    ) -> anyhow::Result<()> {
        let Some(pick) = self
            .tracker
            .screen(candidate, self.manager.state(), &self.league)
        else {
            return Ok(());
        };

        match self.manager.add_speculative_pick(pick.clone()) {
            Ok(true) => self.publish(out).await,
            Ok(false) => {
                debug!("Speculative pick for {} not applied", pick.entity_id);
                self.tracker
                    .rollback(pick.round, pick.pick_in_round, &pick.entity_id);
            }
            Err(e) if e.is_fatal() => {
                error!("Speculative pick corrupted draft state: {}", e);
                return Err(e).context("reconciliation halted on a speculative pick");
            }
            Err(e) => {
                warn!("Dropping speculative pick {}: {}", pick.entity_id, e);
                self.tracker
                    .rollback(pick.round, pick.pick_in_round, &pick.entity_id);
            }
        }
        Ok(())
    }
}

/// Drain both inputs until they are closed.
///
/// Returns the engine so callers can inspect the final state. A state
/// corruption error ends the loop early.
pub async fn run(
    mut confirmed_rx: mpsc::Receiver<PolledPick>,
    mut vision_rx: mpsc::Receiver<VisionCandidate>,
    out_tx: mpsc::Sender<EngineUpdate>,
    mut engine: Engine,
) -> anyhow::Result<Engine> {
    info!("Engine event loop started");
    engine.publish(&out_tx).await;

    let mut confirmed_open = true;
    let mut vision_open = true;

    while confirmed_open || vision_open {
        tokio::select! {
            pick = confirmed_rx.recv(), if confirmed_open => match pick {
                Some(pick) => engine.handle_confirmed(&pick, &out_tx).await?,
                None => {
                    info!("Confirmed pick queue closed");
                    confirmed_open = false;
                }
            },
            candidate = vision_rx.recv(), if vision_open => match candidate {
                Some(candidate) => engine.handle_vision(&candidate, &out_tx).await?,
                None => {
                    info!("Vision feed closed");
                    vision_open = false;
                }
            },
        }
    }

    info!(
        "Engine event loop finished at pick #{}",
        engine.manager.state().pick_no
    );
    Ok(engine)
}
