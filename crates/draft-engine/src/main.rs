// Draft engine entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file; stdout carries engine updates)
// 2. Load config
// 3. Resolve league settings
// 4. Load and deduplicate the stat pool
// 5. Initialize draft state, reconciliation manager, and tracker
// 6. Create mpsc channels
// 7. Spawn the pick poller
// 8. Spawn the vision reader on stdin
// 9. Spawn the engine event loop and the update writer
// 10. Wait for Ctrl+C or the engine to stop, then clean up

use draft_engine::app;
use draft_engine::config;
use draft_engine::draft;
use draft_engine::poller;
use draft_engine::protocol::EngineUpdate;
use draft_engine::reconcile::ReconciliationManager;
use draft_engine::tracker::CorrectionTracker;
use draft_engine::valuation;
use draft_engine::vision;

use anyhow::Context;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Draft engine starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, {} teams, {} order, {} scoring",
        config.league.name, config.league.num_teams, config.league.order_type, config.league.scoring
    );

    // 3. Resolve league settings
    let (draft_settings, league) =
        draft::league::build(&config.league).context("invalid league settings")?;

    // 4. Load the stat pool
    let base_dir = std::env::current_dir()?;
    let pool = valuation::projections::load_stat_pool(&config.data_paths, &base_dir, &draft_settings)
        .context("failed to load projections")?;

    // 5. Draft state, reconciliation, tracker
    let state = draft::state::State::new(draft_settings, pool);
    let manager = ReconciliationManager::new(state, config.snapshot.top_n);
    let tracker = CorrectionTracker::new(config.tracker.similarity_threshold);
    let engine = app::Engine::new(manager, tracker, league);

    // 6. Channels
    let capacity = config.queue.capacity;
    let (confirmed_tx, confirmed_rx) = mpsc::channel(capacity);
    let (vision_tx, vision_rx) = mpsc::channel(capacity);
    let (out_tx, mut out_rx) = mpsc::channel::<EngineUpdate>(capacity);

    // 7. Poller
    let source = poller::HttpPickSource::new(
        &config.poller.url,
        Duration::from_millis(config.poller.request_timeout_ms),
    )
    .context("failed to build HTTP client")?;
    let poller = poller::Poller::new(source, &config.poller);
    let poll_handle = tokio::spawn(poller.run(confirmed_tx));

    // 8. Vision candidates, one JSON object per line on stdin
    let vision_handle = tokio::spawn(async move {
        let n = vision::forward_candidates(vision::lines_from(tokio::io::stdin()), vision_tx).await;
        info!("Vision feed ended after {} candidates", n);
    });

    // 9. Engine loop and update writer
    let mut app_handle = tokio::spawn(app::run(confirmed_rx, vision_rx, out_tx, engine));
    let writer_handle = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(update) = out_rx.recv().await {
            let line = match serde_json::to_string(&update) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to serialize update: {}", e);
                    continue;
                }
            };
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                warn!("Update consumer went away");
                break;
            }
        }
    });

    info!("Draft engine ready; polling {}", config.poller.url);

    // 10. Shutdown
    let mut engine_finished = false;
    let mut code = 0;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Ctrl+C received; shutting down"),
        result = &mut app_handle => {
            engine_finished = true;
            code = exit_code(&result);
            match result {
                Ok(Ok(engine)) => info!(
                    "Engine stopped at pick #{}",
                    engine.manager().state().pick_no
                ),
                Ok(Err(e)) => error!("Engine loop error: {:#}", e),
                Err(e) => error!("Engine task failed: {}", e),
            }
        }
    }

    poll_handle.abort();
    vision_handle.abort();
    if !engine_finished {
        if let Ok(result) = tokio::time::timeout(Duration::from_secs(5), &mut app_handle).await {
            code = exit_code(&result);
            if let Ok(Err(e)) = &result {
                error!("Engine loop error: {:#}", e);
            }
        }
        app_handle.abort();
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), writer_handle).await;

    if code == 0 {
        info!("Draft engine shut down cleanly");
    } else {
        error!("Draft engine shut down after an engine failure");
    }
    // A pending stdin read sits on a blocking thread and would keep the
    // runtime from shutting down.
    std::process::exit(code);
}

/// Process exit status for a finished engine task: non-zero when the loop
/// returned an error or the task itself failed.
fn exit_code<T, E>(result: &Result<anyhow::Result<T>, E>) -> i32 {
    match result {
        Ok(Ok(_)) => 0,
        Ok(Err(_)) | Err(_) => 1,
    }
}

/// Initialize tracing to log to a file; stdout is reserved for updates.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("draft-engine.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("draft_engine=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
