//! # git-unmerged
//!
//! Checkpoints the unresolved state of a merge conflict as an ordinary
//! commit and restores it verbatim later.
//!
//! A conflicted path has up to three index entries (base, ours, theirs) and
//! cannot be committed. `encode` stores each of them at stage 0 under a
//! reversible "bogus" name (`path.<stage>.<tag>`) and commits them with the
//! message `TEMP-COMMIT: unmerged`. `decode` drops that commit and writes the
//! original entries back, keeping whatever the working tree holds at the
//! conflicted paths.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use git_unmerged::{Codec, CodecOptions, GitCli, Repository};
//!
//! # fn main() -> Result<(), git_unmerged::CodecError> {
//! let repo = Repository::discover(std::path::Path::new("."), "git")?;
//! let store = GitCli::new(repo, "git", false);
//! let codec = Codec::new(&store, &CodecOptions::default())?;
//!
//! let outcome = codec.encode()?;
//! println!("{outcome:?}");
//! // ... push, fetch, check out elsewhere ...
//! codec.decode()?;
//! # Ok(())
//! # }
//! ```
//!
//! The codec talks to the repository only through [`StoreClient`];
//! [`MemoryStore`] implements it in memory for tests.

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod exit;
pub mod logging;
pub mod naming;
pub mod output;
pub mod parsed_property;
pub mod record;
pub mod runner;
pub mod store;

// Re-export commonly used types for convenience
pub use cli::{Args, OutputFormat, Verb};
pub use codec::{Codec, CodecOptions, DecodeOutcome, EncodeOutcome, MARKER_MESSAGE};
pub use config::{Config, Settings};
pub use error::{CodecError, ConfigError};
pub use exit::ExitCode;
pub use naming::BogusNamer;
pub use record::{IndexRecord, Stage};
pub use store::{GitCli, MemoryStore, Repository, StoreClient};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version with the build's git revision, as shown by `--version`.
pub const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_UNMERGED_REVISION"), ")");
