use super::{render_event, Roots};
use crate::config::SyncSettings;
use crate::core::comparator::{Classification, ReconciledGame};
use crate::core::scanner::{GameScanner, ScanIssue};
use crate::error::SyncError;
use crate::models::{LogLevel, SyncEvent};
use crate::session::ScanSession;
use crate::storage::{FreeSpace, Storage};
use crate::AppState;
use std::fmt::Write;

/// Scan both roots. Fails only when the library root is invalid.
pub async fn scan_games(
    state: &AppState,
    roots: &Roots,
    read_headers: bool,
) -> Result<ScanSession, String> {
    let settings = SyncSettings::load(&state.config_dir);
    let scanner = GameScanner::with_config(settings.scan_config(read_headers));
    let session = ScanSession::scan(state.storage.as_ref(), &scanner, &roots.pc, &roots.sd).await;

    if !session.is_successful() {
        return Err(SyncError::PathInvalid {
            role: "PC",
            path: roots.pc.clone(),
        }
        .to_string());
    }
    Ok(session)
}

fn status_label(game: &ReconciledGame) -> &'static str {
    match game.classification {
        Classification::Matched => "on SD",
        Classification::SizeMismatch => "size differs",
        Classification::ShrinkRequested => "shrink",
        Classification::Absent => "missing",
    }
}

/// Scan problems as operator log events. A missing card reads like a missing library.
pub fn issue_events(session: &ScanSession) -> Vec<SyncEvent> {
    let library = session.library.issues.iter().map(|i| ("PC", i));
    let device = session.device.issues.iter().map(|i| ("SD", i));

    library
        .chain(device)
        .map(|(role, issue)| {
            let message = match issue {
                ScanIssue::PathInvalid { path } => SyncError::PathInvalid {
                    role,
                    path: path.clone(),
                }
                .to_string(),
                other => other.to_string(),
            };
            SyncEvent::log(LogLevel::Error, message)
        })
        .collect()
}

/// Table of library games with their SD card state, then scan issues
pub fn render_session(session: &ScanSession, details: bool) -> String {
    let mut out = String::new();
    let reconciled = session.reconcile();

    let _ = writeln!(
        out,
        "{:<40} {:>10}  {:<12} {:>6} {:>10}",
        "Game", "Size", "Status", "Slot", "SD size"
    );
    for game in &reconciled {
        let (slot, sd_size) = match &game.device {
            Some(d) => (d.slot.to_string(), d.game.formatted_size.clone()),
            None => (String::new(), String::new()),
        };
        let _ = writeln!(
            out,
            "{:<40} {:>10}  {:<12} {:>6} {:>10}",
            game.pc.game.identity.as_str(),
            game.pc.game.formatted_size,
            status_label(game),
            slot,
            sd_size
        );

        if details {
            if let Some(header) = &game.pc.game.header {
                let _ = writeln!(
                    out,
                    "    {} {} v{} ({}) region {} by {}",
                    header.product_number,
                    header.disc,
                    header.product_version,
                    header.release_date,
                    header.region,
                    header.producer
                );
            }
            let _ = writeln!(out, "    {}", game.pc.game.full_path.display());
        }
    }

    let summary = session.summary();
    let _ = writeln!(
        out,
        "\n{} game(s) in library, {} on SD card: {} matched, {} to copy",
        session.library.entries.len(),
        session.device.entries.len(),
        summary.matched,
        summary.to_copy()
    );

    for line in issue_events(session).iter().filter_map(render_event) {
        let _ = writeln!(out, "{}", line);
    }
    out
}

/// Free space line shown under the table
pub async fn render_free_space(storage: &dyn Storage, session: &ScanSession) -> String {
    match storage.available_space(&session.device_root).await {
        Ok(bytes) => format!("Free space on SD card: {}", FreeSpace::new(bytes).formatted),
        Err(e) => format!("Free space on SD card: unknown ({})", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::tests::build_track;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// `HH:MM:SS: ` prefix
    fn is_timestamped(line: &str) -> bool {
        let bytes = line.as_bytes();
        bytes.len() > 10
            && [0, 1, 3, 4, 6, 7].iter().all(|&i| bytes[i].is_ascii_digit())
            && bytes[2] == b':'
            && bytes[5] == b':'
            && &line[8..10] == ": "
    }

    fn make_game(folder: &Path, title: &str) {
        fs::create_dir_all(folder).unwrap();
        fs::write(folder.join("disc.gdi"), b"1\n1 0 4 2352 track01.bin 0\n").unwrap();
        fs::write(folder.join("track01.bin"), build_track(title)).unwrap();
    }

    #[tokio::test]
    async fn invalid_library_fails_the_scan() {
        let config = TempDir::new().unwrap();
        let state = AppState::new(Some(config.path().to_path_buf())).unwrap();
        let roots = Roots {
            pc: config.path().join("missing"),
            sd: config.path().join("card"),
        };

        let err = scan_games(&state, &roots, false).await.unwrap_err();
        assert!(err.starts_with("PC path is invalid"));
    }

    #[tokio::test]
    async fn table_shows_sd_state_and_issues() {
        let config = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();
        let card = TempDir::new().unwrap();
        make_game(&library.path().join("Shenmue"), "SHENMUE");
        make_game(&library.path().join("Taxi"), "CRAZY TAXI");
        make_game(&card.path().join("02"), "SHENMUE");
        fs::create_dir_all(card.path().join("0007")).unwrap();
        fs::write(card.path().join("0007").join("a.gdi"), b"x").unwrap();
        fs::write(card.path().join("0007").join("b.gdi"), b"x").unwrap();

        let state = AppState::new(Some(config.path().to_path_buf())).unwrap();
        let roots = Roots {
            pc: library.path().to_path_buf(),
            sd: card.path().to_path_buf(),
        };
        let session = scan_games(&state, &roots, true).await.unwrap();
        let table = render_session(&session, true);

        let shenmue = table.lines().find(|l| l.starts_with("SHENMUE")).unwrap();
        assert!(shenmue.contains("on SD"));
        assert!(shenmue.contains(" 2 "));
        let taxi = table.lines().find(|l| l.starts_with("CRAZY TAXI")).unwrap();
        assert!(taxi.contains("missing"));
        assert!(table.contains("1 matched, 1 to copy"));
        let issue = table
            .lines()
            .find(|l| l.contains("2 descriptor files"))
            .unwrap();
        assert!(is_timestamped(issue));
    }

    #[tokio::test]
    async fn missing_card_is_reported_with_a_timestamp() {
        let config = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();
        make_game(&library.path().join("Shenmue"), "SHENMUE");

        let state = AppState::new(Some(config.path().to_path_buf())).unwrap();
        let roots = Roots {
            pc: library.path().to_path_buf(),
            sd: library.path().join("no-card"),
        };
        let session = scan_games(&state, &roots, false).await.unwrap();

        let events = issue_events(&session);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            SyncEvent::Log {
                level: LogLevel::Error,
                ..
            }
        ));

        let table = render_session(&session, false);
        let line = table
            .lines()
            .find(|l| l.contains("SD path is invalid"))
            .unwrap();
        assert!(is_timestamped(line));
        assert!(!table.contains("warning:"));
    }
}
