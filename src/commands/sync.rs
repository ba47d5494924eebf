use super::scan::scan_games;
use super::{spawn_event_printer, Roots};
use crate::config::SyncSettings;
use crate::core::scanner::GameScanner;
use crate::core::SyncEngine;
use crate::models::{RemoveReport, SyncReport};
use crate::session::ScanSession;
use crate::AppState;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

/// Result of a batch plus the catalogs scanned right after it
pub struct BatchOutcome<R> {
    pub report: R,
    pub session: ScanSession,
}

/// Raise the engine's cancel flag on Ctrl-C, between games
fn cancel_on_ctrl_c(engine: &SyncEngine) -> tokio::task::JoinHandle<()> {
    let flag = engine.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current game");
            flag.store(true, Ordering::SeqCst);
        }
    })
}

async fn rescan(state: &AppState, session: &ScanSession) -> ScanSession {
    let settings = SyncSettings::load(&state.config_dir);
    let scanner = GameScanner::with_config(settings.scan_config(false));
    session.rescan(state.storage.as_ref(), &scanner).await
}

/// Copy the selected games (all when `games` is empty) to the SD card
pub async fn copy_games(
    state: &AppState,
    roots: &Roots,
    games: &[String],
    shrink: &[String],
) -> Result<BatchOutcome<SyncReport>, String> {
    let mut session = scan_games(state, roots, false).await?;
    session.ensure_writable().map_err(|e| e.to_string())?;

    for name in session.unmatched_names(games) {
        warn!("no library game named {}", name);
    }
    session.mark_shrink(shrink);

    let selection = session.select(games);
    let plan = session.plan(&selection);
    info!("{} of {} selected game(s) need copying", plan.len(), selection.len());

    let settings = SyncSettings::load(&state.config_dir);
    let engine = SyncEngine::with_config(
        state.storage.clone(),
        session.sync_config(settings.sync_config()),
    );
    let interrupt = cancel_on_ctrl_c(&engine);
    let (tx, printer) = spawn_event_printer(100);

    let report = engine
        .run_copy(&plan, &session.device_root, session.occupied_slots(), Some(tx))
        .await;
    interrupt.abort();
    let _ = printer.await;

    let session = rescan(state, &session).await;
    Ok(BatchOutcome { report, session })
}

/// Delete the SD card copies of the selected games and of the given slots
pub async fn remove_games(
    state: &AppState,
    roots: &Roots,
    games: &[String],
    slots: &[u16],
) -> Result<BatchOutcome<RemoveReport>, String> {
    if games.is_empty() && slots.is_empty() {
        return Err("nothing selected: pass --game or --slot".to_string());
    }

    let session = scan_games(state, roots, false).await?;
    session.ensure_writable().map_err(|e| e.to_string())?;

    for name in session.unmatched_names(games) {
        warn!("no library game named {}", name);
    }
    // an empty name list selects the whole library, which is not what slot-only removal means
    let selection = if games.is_empty() {
        Vec::new()
    } else {
        session.select(games)
    };
    let targets = session.removal_targets(&selection, slots);

    let engine = SyncEngine::new(state.storage.clone());
    let interrupt = cancel_on_ctrl_c(&engine);
    let (tx, printer) = spawn_event_printer(100);

    let report = engine.run_remove(&targets, Some(tx)).await;
    interrupt.abort();
    let _ = printer.await;

    let session = rescan(state, &session).await;
    Ok(BatchOutcome { report, session })
}
