//! Per-interface address rotation worker.
//!
//! One `macshiftd` process owns exactly one interface. It records the
//! interface's original hardware address, registers its pid, applies a fresh
//! locally administered address on every interval, and puts the original
//! back when asked to terminate.

mod args;
pub mod process;
mod worker;

pub use args::WorkerArgs;
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_worker};
pub use worker::{RestoreOutcome, TickOutcome, Worker, WorkerError, WorkerSettings, WorkerState};

#[cfg(test)]
mod tests;
