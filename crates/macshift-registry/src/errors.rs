use std::io;
use std::path::PathBuf;

use macshift_link::LinkError;
use thiserror::Error;

/// Errors surfaced by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry directory could not be created.
    #[error("failed to prepare registry directory '{path}': {source}")]
    Directory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// An existing registry directory cannot be trusted with records.
    #[error("refusing registry directory '{path}': {reason}")]
    UntrustedDirectory {
        /// Directory that failed the ownership checks.
        path: PathBuf,
        /// What made it unsafe.
        reason: String,
    },
    /// A record could not be persisted.
    #[error("failed to write '{path}': {source}")]
    Write {
        /// File being written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A record exists but could not be read.
    #[error("failed to read '{path}': {source}")]
    Read {
        /// File being read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A record could not be removed.
    #[error("failed to remove '{path}': {source}")]
    Remove {
        /// File being removed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The pid file does not contain a process identifier.
    #[error("pid file '{path}' contains '{value}', not a process id")]
    ParsePid {
        /// Offending pid file.
        path: PathBuf,
        /// Trimmed file contents.
        value: String,
    },
    /// The original-address file does not contain a hardware address.
    #[error("original address file '{path}' contains '{value}', not a hardware address")]
    CorruptOriginal {
        /// Offending record.
        path: PathBuf,
        /// Trimmed file contents.
        value: String,
    },
    /// Reading the address to capture failed.
    #[error("failed to capture original address of '{interface}': {source}")]
    Capture {
        /// Interface being captured.
        interface: String,
        /// Underlying link error.
        #[source]
        source: LinkError,
    },
    /// The activity timestamp could not be rendered.
    #[error("failed to format activity timestamp: {source}")]
    Timestamp {
        /// Underlying formatting error.
        #[source]
        source: time::error::Format,
    },
}
