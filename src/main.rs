use anyhow::anyhow;
use clap::{Parser, Subcommand};
use gdemu_sync_lib::commands::{config, log, scan, space, sync, Roots};
use gdemu_sync_lib::logging::{get_log_dir, LogConfig, SizeRotatingWriter};
use gdemu_sync_lib::AppState;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "gdemu-sync")]
#[command(about = "Keep a GDEMU SD card in step with a Dreamcast game library", long_about = None)]
struct Cli {
    /// Directory holding config.json and the logs
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// Game library root (defaults to the saved path)
    #[arg(long, global = true)]
    pc: Option<PathBuf>,
    /// SD card root (defaults to the saved drive)
    #[arg(long, global = true)]
    sd: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan both roots and compare them
    Scan {
        /// Show boot header details and paths
        #[arg(long)]
        details: bool,
    },
    /// Copy missing or changed games to the SD card
    Copy {
        /// Only copy these games (name or folder); all when omitted
        #[arg(long = "game")]
        games: Vec<String>,
        /// Force a fresh copy of these games
        #[arg(long)]
        shrink: Vec<String>,
    },
    /// Delete games from the SD card
    Remove {
        /// Library games whose SD card copy should go
        #[arg(long = "game")]
        games: Vec<String>,
        /// Slot numbers to empty
        #[arg(long = "slot")]
        slots: Vec<u16>,
    },
    /// Free space on the SD card
    Space,
    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,
    /// Store --pc and --sd as the defaults
    SavePaths,
    /// Change log settings
    Log {
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        max_size_mb: Option<u32>,
        #[arg(long)]
        level: Option<String>,
    },
}

fn init_logging(config_dir: &Path) {
    let config = LogConfig::load(config_dir);

    if !config.enabled {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return;
    }

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(config.tracing_level().into());

    match SizeRotatingWriter::new(&get_log_dir(config_dir), config.max_size_mb) {
        Ok(file_writer) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false);

            // debug builds also trace to stderr
            #[cfg(debug_assertions)]
            {
                let console_layer = tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false);
                let subscriber = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(file_layer)
                    .with(console_layer);
                let _ = tracing::subscriber::set_global_default(subscriber);
            }

            #[cfg(not(debug_assertions))]
            {
                let subscriber = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(file_layer);
                let _ = tracing::subscriber::set_global_default(subscriber);
            }
        }
        Err(e) => {
            eprintln!("log file unavailable: {}", e);
            #[cfg(debug_assertions)]
            {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let state = AppState::new(cli.config_dir)?;
    init_logging(&state.config_dir);
    let roots = Roots::resolve(&state, cli.pc, cli.sd);

    match cli.command {
        Commands::Scan { details } => {
            let session = scan::scan_games(&state, &roots, details)
                .await
                .map_err(|e| anyhow!(e))?;
            print!("{}", scan::render_session(&session, details));
            println!(
                "{}",
                scan::render_free_space(state.storage.as_ref(), &session).await
            );
        }
        Commands::Copy { games, shrink } => {
            let outcome = sync::copy_games(&state, &roots, &games, &shrink)
                .await
                .map_err(|e| anyhow!(e))?;
            println!();
            print!("{}", scan::render_session(&outcome.session, false));
            if !outcome.report.is_complete() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Remove { games, slots } => {
            let outcome = sync::remove_games(&state, &roots, &games, &slots)
                .await
                .map_err(|e| anyhow!(e))?;
            println!();
            print!("{}", scan::render_session(&outcome.session, false));
            if !outcome.report.errors.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Space => {
            let free = space::free_space(&state, &roots)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("Free space on SD card: {}", free.formatted);
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => print_json(&config::show_config(&state))?,
            ConfigAction::SavePaths => {
                let paths = config::save_paths(&state, &roots).map_err(|e| anyhow!(e))?;
                print_json(&paths)?;
            }
            ConfigAction::Log {
                enabled,
                max_size_mb,
                level,
            } => {
                let updated = log::set_log_config(&state, enabled, max_size_mb, level)
                    .map_err(|e| anyhow!(e))?;
                print_json(&updated)?;
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
