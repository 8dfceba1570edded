//! Command line interface.
//!
//! `git-unmerged encode` and `git-unmerged decode` are the only invocations
//! that do anything. Any other verb, extra argument or unparsable flag is
//! accepted as a no-op so wrapper scripts can call the tool unconditionally.

use std::path::PathBuf;

use clap::Parser;
use clap::error::ErrorKind;
use tracing::debug;

/// Output format for the command report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// A single JSON object.
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// The two operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Capture the unmerged index in a marker commit.
    Encode,
    /// Restore the unmerged index from a marker commit at HEAD.
    Decode,
}

impl Verb {
    /// The verb named by exactly one positional argument, if any.
    pub fn from_words(words: &[String]) -> Option<Self> {
        match words {
            [word] if word == "encode" => Some(Verb::Encode),
            [word] if word == "decode" => Some(Verb::Decode),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verb::Encode => write!(f, "encode"),
            Verb::Decode => write!(f, "decode"),
        }
    }
}

#[derive(Parser, Clone, Debug)]
#[command(
    name = "git-unmerged",
    author,
    version,
    long_version = crate::LONG_VERSION,
    about = "Checkpoint an unresolved merge conflict as an ordinary commit",
    long_about = "Checkpoint an unresolved merge conflict as an ordinary commit.\n\n\
        encode  flattens every conflicted index entry (stages 1-3) to a regular\n        \
        entry named <path>.<stage>.<tag> and commits them, together with the\n        \
        working-tree state of the conflicted paths, as \"TEMP-COMMIT: unmerged\".\n\
        decode  if HEAD is such a commit, drops it and restores the conflict.\n\n\
        Anything else is accepted and does nothing.\n\n\
        Configuration can be provided via CLI arguments, environment variables\n\
        (GIT_UNMERGED_*), git config (unmerged.*) or a config file\n\
        (~/.config/git-unmerged/config.toml).",
    after_help = "EXAMPLES:\n    \
        # Save a conflicted merge and carry it to another machine\n    \
        git-unmerged encode && git push origin HEAD:wip-conflict\n\n    \
        # Bring the conflict back\n    \
        git-unmerged decode\n\n    \
        # Create sample config file\n    \
        git-unmerged --create-config"
)]
pub struct Args {
    /// `encode` or `decode`
    #[arg(value_name = "VERB")]
    pub verb: Vec<String>,

    /// Run as if started in <DIR>
    #[arg(short = 'C', value_name = "DIR", help_heading = "Repository")]
    pub directory: Option<PathBuf>,

    /// Tag appended to flattened entry names
    #[arg(long, help_heading = "Naming")]
    pub tag: Option<String>,

    /// Suffix for working-tree files moved aside while decoding
    #[arg(long, help_heading = "Naming")]
    pub aside_suffix: Option<String>,

    /// Run commit hooks for the marker commit (hooks are skipped by default)
    #[arg(long, help_heading = "Repository")]
    pub run_hooks: bool,

    /// git executable to run
    #[arg(long, value_name = "PATH", help_heading = "Repository")]
    pub git: Option<String>,

    /// Output format: text, json
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, help_heading = "Output Options")]
    pub output: OutputFormat,

    /// Log level: trace, debug, info, warn, error (logging is off by default)
    #[arg(long, value_name = "LEVEL", help_heading = "Logging")]
    pub log_level: Option<String>,

    /// Write logs to <FILE> instead of stderr
    #[arg(long, value_name = "FILE", help_heading = "Logging")]
    pub log_file: Option<PathBuf>,

    /// Log format: text, json
    #[arg(long, value_name = "FORMAT", help_heading = "Logging")]
    pub log_format: Option<String>,

    /// Create a sample configuration file at ~/.config/git-unmerged/config.toml
    #[arg(long)]
    pub create_config: bool,
}

impl Args {
    /// Parses the process arguments.
    ///
    /// Help and version requests print and exit. Any other parse error
    /// yields `None`, meaning "do nothing".
    pub fn parse_lenient() -> Option<Self> {
        Self::parse_lenient_from(std::env::args_os())
    }

    pub fn parse_lenient_from<I, T>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        match Args::try_parse_from(args) {
            Ok(args) => Some(args),
            Err(e) => match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
                kind => {
                    debug!(?kind, "ignoring unrecognized invocation");
                    None
                }
            },
        }
    }

    pub fn verb(&self) -> Option<Verb> {
        Verb::from_words(&self.verb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// # Verb Recognition
    ///
    /// Tests that only a single `encode` or `decode` selects an operation.
    ///
    /// ## Test Scenario
    /// - Parses single verbs, unknown verbs, extra arguments and no verb
    ///
    /// ## Expected Outcome
    /// - Only the exact single-word forms map to a verb
    #[test]
    fn test_verb_recognition() {
        let verb = |argv: &[&str]| Args::parse_lenient_from(argv.iter().copied()).and_then(|a| a.verb());

        assert_eq!(verb(&["git-unmerged", "encode"]), Some(Verb::Encode));
        assert_eq!(verb(&["git-unmerged", "decode"]), Some(Verb::Decode));
        assert_eq!(verb(&["git-unmerged"]), None);
        assert_eq!(verb(&["git-unmerged", "status"]), None);
        assert_eq!(verb(&["git-unmerged", "encode", "now"]), None);
        assert_eq!(verb(&["git-unmerged", "Encode"]), None);
    }

    /// # Unknown Flags Are a No-op
    ///
    /// Tests that parse errors do not surface as errors.
    ///
    /// ## Test Scenario
    /// - Parses an unknown flag and a bad output format
    ///
    /// ## Expected Outcome
    /// - `None` in both cases
    #[test]
    fn test_parse_errors_are_ignored() {
        assert!(Args::parse_lenient_from(["git-unmerged", "--frobnicate", "encode"]).is_none());
        assert!(Args::parse_lenient_from(["git-unmerged", "--output", "xml", "decode"]).is_none());
    }

    /// # Option Parsing
    ///
    /// Tests that every option lands in its field.
    ///
    /// ## Test Scenario
    /// - Parses a command line using all options
    ///
    /// ## Expected Outcome
    /// - Each field holds the given value
    #[test]
    fn test_option_parsing() {
        let args = Args::try_parse_from([
            "git-unmerged",
            "-C",
            "/tmp/repo",
            "--tag",
            "T",
            "--aside-suffix",
            "A",
            "--run-hooks",
            "--git",
            "/usr/bin/git",
            "--output",
            "json",
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "decode",
        ])
        .unwrap();

        assert_eq!(args.directory, Some(PathBuf::from("/tmp/repo")));
        assert_eq!(args.tag.as_deref(), Some("T"));
        assert_eq!(args.aside_suffix.as_deref(), Some("A"));
        assert!(args.run_hooks);
        assert_eq!(args.git.as_deref(), Some("/usr/bin/git"));
        assert_eq!(args.output, OutputFormat::Json);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.verb(), Some(Verb::Decode));
        assert!(!args.create_config);
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
