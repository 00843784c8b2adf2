//! Command-line configuration for coolwatch.
//!
//! This module defines all CLI arguments using `clap` for parsing.
//! The configuration controls where telemetry and settings come from,
//! the polling interval, the alarm log and the display mode.

use clap::Parser;

/// Cooling container alarm dashboard.
///
/// coolwatch polls a site snapshot, resolves the active thresholds of each
/// cooling container and classifies its readings:
///
/// - Flashing for any reading outside the normal band
/// - Audible alarm for critically high readings (after operator consent)
/// - Threshold editing with automatic cascading of neighbouring levels
///
/// # Examples
///
/// ```bash
/// # Run the TUI against a snapshot refreshed by the poller
/// coolwatch --snapshot /var/lib/coolwatch/site.json
///
/// # Persist thresholds and log alarms without a TUI
/// coolwatch --snapshot site.json --settings-file settings.json --headless
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Classify cooling container telemetry and raise alarms")]
pub struct Config {
    /// Path to the site snapshot JSON.
    ///
    /// Re-read on every tick. It holds the site name and, per container,
    /// its model, status, latest telemetry and optional thresholds.
    #[arg(short, long, default_value = "site.json")]
    pub snapshot: String,

    /// Path to the container settings JSON.
    ///
    /// Saved thresholds are read from and written to this file. Without it
    /// settings only live for the session.
    #[arg(long)]
    pub settings_file: Option<String>,

    /// Interval in seconds between snapshot polls.
    #[arg(short, long, default_value_t = 5)]
    pub interval: u64,

    /// Path to CSV alarm log.
    ///
    /// One row per container per tick is appended. Headers are written
    /// only when the file is created.
    #[arg(short = 'c', long, default_value = "alarms.csv")]
    pub csv_file: String,

    /// Number of notifications kept for display.
    #[arg(long, default_value_t = 50)]
    pub history_size: usize,

    /// Run in headless mode (no TUI, just logging).
    #[arg(long)]
    pub headless: bool,

    /// Allow the audible alarm without asking.
    ///
    /// Consent is never stored; it lasts for this session only.
    #[arg(long)]
    pub sound_consent: bool,

    /// Write logs to this file.
    ///
    /// In TUI mode logs are discarded unless a file is given; in headless
    /// mode they go to stderr by default.
    #[arg(long)]
    pub log_file: Option<String>,
}
