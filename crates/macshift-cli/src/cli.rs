//! Command-line surface of the supervisor.

use clap::{Parser, ValueEnum};
use serde::Serialize;
use strum::{Display, EnumString};

/// Lifecycle actions the supervisor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Ensure a worker rotates each target.
    Start,
    /// Stop each target's worker and restore its original address.
    Stop,
    /// Report whether each target has a live worker.
    Status,
}

/// How the batch report is rendered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// One status line per interface.
    #[default]
    Human,
    /// A single JSON document on stdout.
    Json,
}

/// Periodically randomize interface hardware addresses.
///
/// Configuration flags such as `--state-dir` or `--interval-ms` must come
/// before the action.
#[derive(Parser, Debug)]
#[command(name = "macshift", version)]
pub(crate) struct Cli {
    /// `start`, `stop`, or `status`.
    #[arg(value_name = "ACTION", default_value = "start")]
    pub(crate) action: String,
    /// Comma-separated interface names.
    #[arg(long, value_name = "LIST", conflicts_with = "all_up")]
    pub(crate) iface: Option<String>,
    /// Target every interface that is up, loopback excluded.
    #[arg(long)]
    pub(crate) all_up: bool,
    /// Report what would happen without spawning, signalling, or changing
    /// addresses.
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub(crate) output: OutputFormat,
}
