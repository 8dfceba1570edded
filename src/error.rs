//! Error handling for git-unmerged.
//!
//! ## Error Categories
//!
//! - [`CodecError`]: everything that can go wrong while encoding or decoding
//!   an unmerged index, including failures of the underlying git commands
//! - [`ConfigError`]: errors from configuration loading and validation
//!
//! A decode invoked on a commit that is not a marker commit is not an error;
//! it is reported as [`DecodeOutcome::NotMarker`](crate::codec::DecodeOutcome).

use std::path::PathBuf;
use thiserror::Error;

use crate::exit::ExitCode;

/// Errors raised by the encode/decode codec and the store it drives.
#[derive(Error, Debug)]
pub enum CodecError {
    /// A store operation ran but reported failure.
    #[error("git {operation} failed (exit {code}): {stderr}")]
    StoreFailure {
        /// Store operation name, e.g. `update-index`.
        operation: String,
        /// Status code reported by the operation.
        code: i32,
        /// Diagnostic output captured from the operation.
        stderr: String,
    },

    /// A store operation could not be started at all.
    #[error("failed to run git {operation}: {source}")]
    Spawn {
        /// Store operation name.
        operation: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// A real path collides with the bogus-name pattern, so encoding it
    /// could not be reversed unambiguously.
    #[error("path `{path}` collides with the bogus-name pattern for tag `{tag}`")]
    EncodingAmbiguity {
        /// The offending path.
        path: String,
        /// Marker tag in effect.
        tag: String,
    },

    /// HEAD is a marker commit, but none of its paths carry the marker tag
    /// in effect; it was most likely encoded with another tag.
    #[error("marker commit holds no entries encoded with tag `{tag}`; decode with the tag used to encode")]
    NoEncodedEntries {
        /// Marker tag in effect.
        tag: String,
    },

    /// Moving a working-tree file aside would overwrite an existing file.
    #[error("cannot move `{path}` aside: `{aside}` already exists")]
    AsideCollision {
        /// Path that needed to be moved aside.
        path: String,
        /// The occupied aside name.
        aside: String,
    },

    /// A record line emitted by the store could not be parsed.
    #[error("malformed index record: {line:?}")]
    MalformedRecord {
        /// The raw record text.
        line: String,
    },

    /// A marker tag or aside suffix is not usable as a path suffix.
    #[error("invalid tag `{tag}`: {reason}")]
    InvalidTag {
        /// The rejected tag.
        tag: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A working-tree file operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl CodecError {
    /// Builds a [`CodecError::StoreFailure`].
    pub fn store_failure(
        operation: impl Into<String>,
        code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        CodecError::StoreFailure {
            operation: operation.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Maps the error onto the process exit code it should produce.
    ///
    /// Store failures propagate the failing operation's own status.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CodecError::StoreFailure { code, .. } => ExitCode::from_store_status(*code),
            CodecError::EncodingAmbiguity { .. }
            | CodecError::NoEncodedEntries { .. }
            | CodecError::AsideCollision { .. } => ExitCode::Ambiguity,
            CodecError::Spawn { .. }
            | CodecError::MalformedRecord { .. }
            | CodecError::InvalidTag { .. }
            | CodecError::Io { .. } => ExitCode::GeneralError,
        }
    }
}

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file at {path}: {message}")]
    FileReadError {
        /// Path to the config file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Failed to parse the configuration file.
    #[error("Failed to parse config file at {path}: {message}")]
    ParseError {
        /// Path to the config file.
        path: PathBuf,
        /// Parse error message.
        message: String,
    },

    /// An invalid value was provided for a configuration field.
    #[error("Invalid value for {field} (from {origin}): {message}")]
    InvalidValue {
        /// Name of the field with invalid value.
        field: String,
        /// Where the value was set, e.g. `--tag` or `git config unmerged.tag`.
        origin: String,
        /// Description of why the value is invalid.
        message: String,
    },

    /// No config directory could be determined for this platform.
    #[error("Could not determine a configuration directory")]
    NoConfigDirectory,

    /// Failed to create config directory or file.
    #[error("Failed to write config at {path}: {message}")]
    WriteError {
        /// Path where the write failed.
        path: PathBuf,
        /// Error message.
        message: String,
    },
}
