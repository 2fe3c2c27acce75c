//! Process exit statuses reported by the supervisor.

use std::process::ExitCode;

/// Exit statuses with a documented meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Every interface reached the requested state.
    Success,
    /// No targets were resolved, or the run failed before the batch began.
    Failure,
    /// The link utility is unavailable.
    DependencyMissing,
    /// A mutating action was requested without root privileges.
    PrivilegeRequired,
    /// The action is not one of `start`, `stop`, or `status`.
    UnknownAction,
    /// At least one interface failed or was not found.
    InterfaceFailure,
    /// `status` found at least one interface without a live worker.
    NotActive,
    /// Arguments or configuration could not be used.
    Usage,
}

impl ExitStatus {
    /// Numeric process status.
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::DependencyMissing => 2,
            Self::PrivilegeRequired => 3,
            Self::UnknownAction => 4,
            Self::InterfaceFailure => 5,
            Self::NotActive => 6,
            Self::Usage => 64,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        Self::from(status.code())
    }
}
