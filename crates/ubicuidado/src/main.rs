//! `ubicui` - CLI for ubicuidado
//!
//! This binary follows the device position on a console map and manages
//! location check-ins.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use ubicuidado::checkin::{AssumeYes, Confirmation};
use ubicuidado::cli::{
    CheckinCommand, Cli, Command, ConfigCommand, StdinConfirmation, TrackCommand,
};
use ubicuidado::{
    init_logging, CheckinStore, Config, ConsoleMap, Coordinates, GeolocationProvider,
    ReplayProvider, SessionState, Storage, TrackingSession, UnsupportedProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Track(track_cmd) => handle_track(&config, track_cmd).await,
        Command::Checkin(checkin_cmd) => handle_checkin(&config, checkin_cmd).await,
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_track(config: &Config, cmd: TrackCommand) -> anyhow::Result<()> {
    let interval = cmd
        .interval_ms
        .map_or_else(|| config.tracking.replay_interval(), Duration::from_millis);

    match cmd.gpx.or_else(|| config.tracking.replay_path.clone()) {
        Some(path) => {
            let provider = replay_provider(&path, interval)?;
            info!(path = %path.display(), points = provider.len(), "Replaying track");
            run_session(provider, config).await
        }
        None => run_session(UnsupportedProvider, config).await,
    }
}

async fn run_session<P: GeolocationProvider>(provider: P, config: &Config) -> anyhow::Result<()> {
    let mut session = TrackingSession::new(provider, ConsoleMap::echoing(), config);

    if session.start().await == SessionState::Error {
        let message = session.error_message().unwrap_or("unknown error");
        if let Some(center) = session.map().view().center {
            println!("Showing fallback view at {center}");
        }
        session.stop();
        bail!("location unavailable: {message}");
    }

    println!("Tracking with {} provider, press Ctrl-C to stop", session.provider().name());

    let summary = session
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    println!();
    println!(
        "Stopped after {} fixes ({} errors)",
        summary.fixes_processed, summary.errors_seen
    );
    if let Some(fix) = summary.last_fix {
        println!(
            "Last position:  {}  heading {:.1}°",
            fix.coordinates(),
            summary.heading_degrees
        );
    }
    Ok(())
}

fn replay_provider(path: &Path, interval: Duration) -> anyhow::Result<ReplayProvider> {
    ReplayProvider::from_gpx(path, interval)
        .with_context(|| format!("failed to load track {}", path.display()))
}

async fn handle_checkin(config: &Config, cmd: CheckinCommand) -> anyhow::Result<()> {
    let storage = Storage::open(config.database_path())?;
    let mut checkins = CheckinStore::load(storage, config.storage.checkin_key.as_str())?;

    match cmd {
        CheckinCommand::Add {
            name,
            comment,
            lat,
            lng,
            gpx,
        } => {
            let position = match (lat, lng, gpx) {
                (Some(latitude), Some(longitude), _) => Some(Coordinates::new(latitude, longitude)),
                (_, _, Some(path)) => {
                    let provider = replay_provider(&path, Duration::ZERO)?;
                    match provider.current_fix(&config.tracking.fix_options()).await {
                        Ok(fix) => Some(fix.coordinates()),
                        Err(e) => {
                            warn!(error = %e, "No position from track");
                            None
                        }
                    }
                }
                _ => None,
            };

            let record = checkins.add(&name, &comment, position)?;
            println!("Checked in as {} ({})", record.display_name, record.id);
            println!("  {}", record.map_url());
        }
        CheckinCommand::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(checkins.records())?);
            } else if checkins.is_empty() {
                println!("No check-ins yet.");
            } else {
                let now = Utc::now();
                for record in checkins.records() {
                    println!(
                        "{}  {}  ({})",
                        record.id,
                        record.display_name,
                        record.time_ago(now)
                    );
                    println!("    {}", record.comment);
                    println!("    {}", record.map_url());
                }
            }
        }
        CheckinCommand::Remove { id, yes } => {
            let confirmation: &dyn Confirmation = if yes {
                &AssumeYes
            } else {
                &StdinConfirmation
            };
            if checkins.remove(&id, confirmation)? {
                println!("Removed check-in {id}");
            } else {
                println!("No check-in removed.");
            }
        }
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let database_path = config.database_path();
    let storage = Storage::open(&database_path)?;
    let stats = storage.stats()?;
    let keys = storage.keys()?;
    let checkins = CheckinStore::load(storage, config.storage.checkin_key.as_str())?;
    let replay = config.tracking.replay_path.as_ref();

    if json {
        let status = serde_json::json!({
            "database_path": database_path,
            "database_size_bytes": stats.db_size_bytes,
            "stored_keys": keys,
            "checkins": checkins.len(),
            "replay_path": replay,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("ubicui status");
        println!("-------------");
        println!("Database:      {}", database_path.display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Stored keys:   {}", stats.total_entries);
        for key in &keys {
            println!("  - {key}");
        }
        println!("Check-ins:     {}", checkins.len());
        match replay {
            Some(path) => println!("Replay track:  {}", path.display()),
            None => println!("Replay track:  (none)"),
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Check-in key:       {}", config.storage.checkin_key);
                println!();
                println!("[Tracking]");
                println!("  High accuracy:      {}", config.tracking.high_accuracy);
                println!("  Max fix age (ms):   {}", config.tracking.max_fix_age_ms);
                println!("  Timeout (ms):       {}", config.tracking.timeout_ms);
                println!(
                    "  Replay interval:    {} ms",
                    config.tracking.replay_interval_ms
                );
                println!();
                println!("[Map]");
                println!("  Fallback:           {}", config.map.fallback());
                println!("  Fallback zoom:      {}", config.map.fallback_zoom);
                println!("  Tracking zoom:      {}", config.map.tracking_zoom);
                println!();
                println!("[Marker]");
                println!(
                    "  Scale:              {} / {}",
                    config.marker.initial_scale, config.marker.tracking_scale
                );
                println!(
                    "  Colors:             {} on {}",
                    config.marker.fill_color, config.marker.stroke_color
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
