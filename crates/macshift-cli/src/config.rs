//! Configuration loading helpers for the supervisor.
//!
//! Configuration flags are peeled off the front of the argument list so the
//! loader only sees flags it understands. The same slice is forwarded to
//! every spawned worker.

use std::ffi::{OsStr, OsString};

use macshift_config::Config;
use ortho_config::OrthoConfig;

use crate::errors::AppError;

/// Flags consumed by the configuration loader rather than the action parser.
///
/// Must stay in sync with the fields of [`Config`].
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--state-dir",
    "--interval-ms",
    "--address-prefix",
    "--ip-command",
    "--spawn-grace-ms",
    "--stop-grace-ms",
    "--log-filter",
    "--log-format",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the peeled-off flags.
    ///
    /// Configuration flags appearing after the action are not seen here and
    /// fail action parsing instead.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Skip,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Skip;
    }
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (&*text, false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Skip
    }
}

/// Leading configuration flags and where the action tokens begin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// `argv[0]` followed by the configuration flags and their values.
    pub(crate) config_arguments: Vec<OsString>,
    /// Index of the first action token in the original arguments.
    pub(crate) command_start: usize,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let Some(program) = args.first() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_start: 0,
        };
    };

    let mut filtered = vec![program.clone()];
    let mut index = 1usize;
    while index < args.len() {
        match classify(&args[index]) {
            FlagAction::Include { needs_value } => {
                filtered.push(args[index].clone());
                index += 1;
                if needs_value && let Some(value) = args.get(index) {
                    filtered.push(value.clone());
                    index += 1;
                }
            }
            FlagAction::Skip => break,
        }
    }

    ConfigArgumentSplit {
        config_arguments: filtered,
        command_start: index,
    }
}

/// `argv[0]` followed by everything after the configuration flags.
pub(crate) fn action_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    args.first()
        .into_iter()
        .chain(args.iter().skip(split.command_start))
        .cloned()
        .collect()
}
