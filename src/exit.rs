//! Process exit codes.
//!
//! A failing git command hands its own status straight through to the
//! caller, so scripts wrapping `git-unmerged` see the same code git reported.

/// Exit codes for `git-unmerged` invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// The operation completed (including the no-op cases).
    Success,

    /// General error (configuration, I/O, unparsable store output).
    GeneralError,

    /// The index contains paths that would make the encoding ambiguous,
    /// a marker commit does not match the tag in effect, or a working-tree
    /// file blocks a rename.
    Ambiguity,

    /// A git command failed with the contained status.
    Store(u8),
}

impl ExitCode {
    /// Converts a raw process status into an exit code.
    ///
    /// Statuses that cannot be represented (zero, negative, or above 255)
    /// collapse to [`ExitCode::GeneralError`] so a failure never exits 0.
    pub fn from_store_status(status: i32) -> Self {
        match u8::try_from(status) {
            Ok(0) | Err(_) => ExitCode::GeneralError,
            Ok(code) => ExitCode::Store(code),
        }
    }

    /// Returns the numeric exit code value.
    pub fn code(self) -> u8 {
        match self {
            ExitCode::Success => 0,
            ExitCode::GeneralError => 1,
            ExitCode::Ambiguity => 3,
            ExitCode::Store(code) => code,
        }
    }

    /// Returns a human-readable description of the exit code.
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Completed successfully",
            ExitCode::GeneralError => "General error occurred",
            ExitCode::Ambiguity => "Index paths do not fit the bogus-name encoding",
            ExitCode::Store(_) => "A git command failed",
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code())
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
