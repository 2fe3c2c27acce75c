use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Longest name the kernel accepts (`IFNAMSIZ` minus the terminator).
pub const MAX_INTERFACE_NAME_LEN: usize = 15;

/// A validated network interface name.
///
/// Names double as registry file stems, so anything that could escape the
/// registry directory is rejected up front using the kernel's own rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceName(String);

impl InterfaceName {
    /// Validates and wraps `name`.
    pub fn new(name: impl Into<String>) -> Result<Self, InterfaceNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InterfaceNameError::Empty);
        }
        if name.len() > MAX_INTERFACE_NAME_LEN {
            return Err(InterfaceNameError::TooLong { name });
        }
        if name == "." || name == ".." {
            return Err(InterfaceNameError::Reserved { name });
        }
        if let Some(character) = name
            .chars()
            .find(|character| *character == '/' || *character == ':' || character.is_whitespace())
        {
            return Err(InterfaceNameError::InvalidCharacter { name, character });
        }
        Ok(Self(name))
    }

    /// Borrowed name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InterfaceName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl AsRef<str> for InterfaceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for InterfaceName {
    type Err = InterfaceNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

/// Reasons an interface name is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterfaceNameError {
    /// No name was given.
    #[error("interface name must not be empty")]
    Empty,
    /// Longer than the kernel's interface name limit.
    #[error("interface name '{name}' exceeds {MAX_INTERFACE_NAME_LEN} bytes")]
    TooLong {
        /// Name as given.
        name: String,
    },
    /// `.` or `..`, which would escape the registry directory.
    #[error("interface name '{name}' is reserved")]
    Reserved {
        /// Name as given.
        name: String,
    },
    /// Contains `/`, `:` or whitespace.
    #[error("interface name '{name}' contains invalid character {character:?}")]
    InvalidCharacter {
        /// Name as given.
        name: String,
        /// First offending character.
        character: char,
    },
}
