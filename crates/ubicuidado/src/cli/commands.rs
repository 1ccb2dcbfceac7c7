//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Track command arguments.
#[derive(Debug, Args)]
pub struct TrackCommand {
    /// Replay the track points of a GPX file instead of a live source
    #[arg(short, long, value_name = "FILE")]
    pub gpx: Option<PathBuf>,

    /// Delay between replayed points in milliseconds
    #[arg(short, long, value_name = "MS")]
    pub interval_ms: Option<u64>,
}

/// Check-in commands.
#[derive(Debug, Subcommand)]
pub enum CheckinCommand {
    /// Record a check-in at a position
    Add {
        /// Who is checking in
        name: String,

        /// A note to leave with the check-in
        comment: String,

        /// Latitude of the check-in
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude of the check-in
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,

        /// Take the position from the first point of a GPX file
        #[arg(short, long, value_name = "FILE", conflicts_with_all = ["lat", "lng"])]
        gpx: Option<PathBuf>,
    },

    /// List check-ins, newest first
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete a check-in
    Remove {
        /// Id of the check-in to delete
        id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
