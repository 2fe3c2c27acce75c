//! Filesystem-backed per-interface state shared by the supervisor and its
//! workers.
//!
//! A registry is one directory. Each managed interface owns up to four files
//! named after it:
//!
//! - `<if>.orig` holds the hardware address captured before the first change.
//! - `<if>.pid` names the worker currently rotating the interface.
//! - `<if>.log` is the append-only activity log.
//! - `<if>.trace` receives the worker's diagnostic output.
//!
//! Pid and original-address files are replaced atomically and every file is
//! created owner-only.

mod activity;
mod errors;
mod files;
mod store;

pub use activity::{ActivityEvent, ActivityLog};
pub use errors::RegistryError;
pub use store::{Capture, Registry};

pub(crate) const REGISTRY_TARGET: &str = "macshift::registry";
