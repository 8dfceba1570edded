//! Configuration for git-unmerged.
//!
//! Values are layered, highest precedence first:
//! - command line flags
//! - `GIT_UNMERGED_*` environment variables
//! - `unmerged.*` keys from `git config`
//! - `$XDG_CONFIG_HOME/git-unmerged/config.toml`
//! - built-in defaults
//!
//! Every value keeps its source as a [`ParsedProperty`] so validation errors
//! can say where a bad value came from.
//!
//! ## Example
//!
//! ```rust,no_run
//! use git_unmerged::Config;
//!
//! let settings = Config::default()
//!     .merge(Config::load_from_file().unwrap())
//!     .merge(Config::load_from_env())
//!     .resolve()
//!     .unwrap();
//! println!("marker tag: {}", settings.tag);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::cli::Args;
use crate::codec::CodecOptions;
use crate::error::ConfigError;
use crate::naming::{self, DEFAULT_ASIDE_SUFFIX, DEFAULT_MARKER_TAG};
use crate::parsed_property::{ParsedProperty, Source};

const CONFIG_DIR_NAME: &str = "git-unmerged";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_GIT: &str = "git";

/// Names of one setting in each layer.
struct Key {
    field: &'static str,
    flag: &'static str,
    env: &'static str,
    /// `None` for settings git config cannot provide.
    git: Option<&'static str>,
}

impl Key {
    fn cli(&self) -> Source {
        Source::Cli { flag: self.flag }
    }

    fn env(&self) -> Source {
        Source::Env { var: self.env }
    }
}

const TAG: Key = Key {
    field: "tag",
    flag: "--tag",
    env: "GIT_UNMERGED_TAG",
    git: Some("unmerged.tag"),
};
const ASIDE_SUFFIX: Key = Key {
    field: "aside_suffix",
    flag: "--aside-suffix",
    env: "GIT_UNMERGED_ASIDE_SUFFIX",
    git: Some("unmerged.asideSuffix"),
};
const RUN_HOOKS: Key = Key {
    field: "run_hooks",
    flag: "--run-hooks",
    env: "GIT_UNMERGED_RUN_HOOKS",
    git: Some("unmerged.runHooks"),
};
// The git executable cannot come from git config: it is needed to read it.
const GIT: Key = Key {
    field: "git",
    flag: "--git",
    env: "GIT_UNMERGED_GIT",
    git: None,
};

/// Boolean spellings accepted in the environment, as git accepts them.
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// On-disk shape of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    pub tag: Option<String>,
    pub aside_suffix: Option<String>,
    pub run_hooks: Option<bool>,
    pub git: Option<String>,
}

/// One configuration layer; `None` means "not set here".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// Marker tag appended to bogus names.
    pub tag: Option<ParsedProperty<String>>,
    /// Suffix for working-tree files moved aside during decode.
    pub aside_suffix: Option<ParsedProperty<String>>,
    /// Whether the marker commit runs commit hooks.
    pub run_hooks: Option<ParsedProperty<bool>>,
    /// The git executable.
    pub git: Option<ParsedProperty<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tag: Some(DEFAULT_MARKER_TAG.to_string().into()),
            aside_suffix: Some(DEFAULT_ASIDE_SUFFIX.to_string().into()),
            run_hooks: Some(false.into()),
            git: Some(DEFAULT_GIT.to_string().into()),
        }
    }
}

impl Config {
    /// A layer with nothing set.
    pub fn empty() -> Self {
        Self {
            tag: None,
            aside_suffix: None,
            run_hooks: None,
            git: None,
        }
    }

    /// Loads the file at the XDG location; a missing file is an empty layer.
    pub fn load_from_file() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::config_path()?)
    }

    /// Loads a configuration file; a missing file is an empty layer.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file");
            return Ok(Self::empty());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let source = || Source::File {
            path: path.to_path_buf(),
        };
        Ok(Self {
            tag: file.tag.map(|v| ParsedProperty::text(v, source())),
            aside_suffix: file.aside_suffix.map(|v| ParsedProperty::text(v, source())),
            run_hooks: file
                .run_hooks
                .map(|v| ParsedProperty::new(v, source(), v.to_string())),
            git: file.git.map(|v| ParsedProperty::text(v, source())),
        })
    }

    /// Reads `GIT_UNMERGED_*` variables. Unparsable booleans are ignored.
    pub fn load_from_env() -> Self {
        Self::load_from_vars(|var| std::env::var(var).ok())
    }

    fn load_from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &Key| var(key.env).map(|v| ParsedProperty::text(v, key.env()));
        Self {
            tag: text(&TAG),
            aside_suffix: text(&ASIDE_SUFFIX),
            run_hooks: var(RUN_HOOKS.env)
                .and_then(|s| ParsedProperty::parse_with(s, RUN_HOOKS.env(), parse_bool)),
            git: text(&GIT),
        }
    }

    /// Reads the `unmerged.*` keys from the repository's git configuration.
    ///
    /// Any failure to run git yields an empty layer.
    pub fn load_from_git_config(repo_root: &Path, git: &str) -> Self {
        let read = |key: &Key, bool_type: bool| -> Option<(String, Source)> {
            let name = key.git?;
            let mut cmd = Command::new(git);
            cmd.current_dir(repo_root).arg("config");
            if bool_type {
                cmd.arg("--type=bool");
            }
            let output = cmd.args(["--get", name]).output().ok()?;
            output.status.success().then(|| {
                (
                    String::from_utf8_lossy(&output.stdout).trim().to_string(),
                    Source::Git { key: name },
                )
            })
        };

        Self {
            tag: read(&TAG, false).map(|(v, source)| ParsedProperty::text(v, source)),
            aside_suffix: read(&ASIDE_SUFFIX, false)
                .map(|(v, source)| ParsedProperty::text(v, source)),
            run_hooks: read(&RUN_HOOKS, true)
                .and_then(|(v, source)| ParsedProperty::parse_with(v, source, parse_bool)),
            git: read(&GIT, false).map(|(v, source)| ParsedProperty::text(v, source)),
        }
    }

    /// Builds the command line layer.
    pub fn from_args(args: &Args) -> Self {
        let text = |value: &Option<String>, key: &Key| {
            value
                .as_ref()
                .map(|v| ParsedProperty::text(v.as_str(), key.cli()))
        };
        Self {
            tag: text(&args.tag, &TAG),
            aside_suffix: text(&args.aside_suffix, &ASIDE_SUFFIX),
            run_hooks: args
                .run_hooks
                .then(|| ParsedProperty::new(true, RUN_HOOKS.cli(), RUN_HOOKS.flag)),
            git: text(&args.git, &GIT),
        }
    }

    /// Merges `other` over `self`; values set in `other` win.
    pub fn merge(self, other: Self) -> Self {
        Self {
            tag: other.tag.or(self.tag),
            aside_suffix: other.aside_suffix.or(self.aside_suffix),
            run_hooks: other.run_hooks.or(self.run_hooks),
            git: other.git.or(self.git),
        }
    }

    /// Fills unset values with defaults and validates the result.
    pub fn resolve(self) -> Result<Settings, ConfigError> {
        let tag = self
            .tag
            .unwrap_or_else(|| DEFAULT_MARKER_TAG.to_string().into());
        let aside_suffix = self
            .aside_suffix
            .unwrap_or_else(|| DEFAULT_ASIDE_SUFFIX.to_string().into());
        let run_hooks = self.run_hooks.unwrap_or_else(|| false.into());
        let git = self.git.unwrap_or_else(|| DEFAULT_GIT.to_string().into());

        validate_name(&TAG, &tag)?;
        validate_name(&ASIDE_SUFFIX, &aside_suffix)?;
        if git.trim().is_empty() {
            return Err(invalid(&GIT, &git, "must not be empty"));
        }
        if *tag == *aside_suffix {
            return Err(invalid(&ASIDE_SUFFIX, &aside_suffix, "must differ from tag"));
        }

        Ok(Settings {
            tag: tag.into_value(),
            aside_suffix: aside_suffix.into_value(),
            run_hooks: run_hooks.into_value(),
            git: git.into_value(),
        })
    }

    /// Location of the configuration file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .ok_or(ConfigError::NoConfigDirectory)?
                .join(".config"),
        };
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Writes a commented sample file unless one exists. Returns its path.
    pub fn create_sample_config() -> Result<PathBuf, ConfigError> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            return Ok(config_path);
        }

        let write_err = |e: std::io::Error| ConfigError::WriteError {
            path: config_path.clone(),
            message: e.to_string(),
        };
        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        fs::write(&config_path, sample_config()).map_err(write_err)?;
        Ok(config_path)
    }
}

fn invalid<T>(key: &Key, value: &ParsedProperty<T>, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: key.field.to_string(),
        origin: value.source().to_string(),
        message: message.into(),
    }
}

fn validate_name(key: &Key, value: &ParsedProperty<String>) -> Result<(), ConfigError> {
    naming::validate_tag(value).map_err(|e| invalid(key, value, e.to_string()))
}

fn sample_config() -> String {
    format!(
        r#"# git-unmerged configuration
# Location: $XDG_CONFIG_HOME/git-unmerged/config.toml (~/.config/git-unmerged/config.toml)
#
# Values can also be set per repository with `git config unmerged.<key>`
# or per invocation with GIT_UNMERGED_* variables and command line flags.

# Tag appended to the names of flattened conflict entries
# (<path>.<stage>.<tag>). No dots, slashes or whitespace.
# tag = "{DEFAULT_MARKER_TAG}"

# Suffix for working-tree files moved aside while decoding.
# aside_suffix = "{DEFAULT_ASIDE_SUFFIX}"

# Run commit hooks for the marker commit (defaults to false).
# run_hooks = false

# git executable to use.
# git = "{DEFAULT_GIT}"
"#
    )
}

/// Fully resolved, validated settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub tag: String,
    pub aside_suffix: String,
    pub run_hooks: bool,
    pub git: String,
}

impl Settings {
    pub fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            tag: self.tag.clone(),
            aside_suffix: self.aside_suffix.clone(),
        }
    }
}
