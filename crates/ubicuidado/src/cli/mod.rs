//! Command-line interface for ubicuidado.
//!
//! This module provides the CLI structure for the `ubicui` binary, plus the
//! terminal prompt used to confirm destructive check-in operations.

mod commands;

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::checkin::Confirmation;
use crate::logging::Verbosity;

pub use commands::{CheckinCommand, ConfigCommand, StatusCommand, TrackCommand};

/// ubicui - Follow your location and leave check-ins
///
/// Tracks the device position on a map with a direction marker, and keeps
/// a list of named check-ins tied to the positions where they were made.
#[derive(Debug, Parser)]
#[command(name = "ubicui")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow the device position until interrupted
    Track(TrackCommand),

    /// Manage location check-ins
    #[command(subcommand)]
    Checkin(CheckinCommand),

    /// Show storage status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

/// Asks for confirmation on the terminal.
///
/// Anything other than `y` or `yes` (case-insensitive) declines, as does a
/// closed stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirmation;

impl Confirmation for StdinConfirmation {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if std::io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => false,
            Ok(_) => is_affirmative(&answer),
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
