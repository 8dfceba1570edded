use std::{fmt, ops::Deref, path::PathBuf};

use serde::Serialize;

/// Where a configuration value was set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    Cli { flag: &'static str },
    Env { var: &'static str },
    Git { key: &'static str },
    File { path: PathBuf },
    Default,
}

impl Source {
    /// Short layer name: `cli`, `env`, `git`, `file` or `default`.
    pub fn kind(&self) -> &'static str {
        match self {
            Source::Cli { .. } => "cli",
            Source::Env { .. } => "env",
            Source::Git { .. } => "git",
            Source::File { .. } => "file",
            Source::Default => "default",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Cli { flag } => write!(f, "{flag}"),
            Source::Env { var } => write!(f, "${var}"),
            Source::Git { key } => write!(f, "git config {key}"),
            Source::File { path } => write!(f, "{}", path.display()),
            Source::Default => write!(f, "built-in default"),
        }
    }
}

/// A configuration value together with where it came from and, unless it
/// is a default, the text it was read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedProperty<T> {
    value: T,
    source: Source,
    raw: Option<String>,
}

impl<T> ParsedProperty<T> {
    pub fn new(value: T, source: Source, raw: impl Into<String>) -> Self {
        Self {
            value,
            source,
            raw: Some(raw.into()),
        }
    }

    /// Parses `raw` with `parse`; `None` when it does not parse.
    pub fn parse_with(
        raw: String,
        source: Source,
        parse: impl FnOnce(&str) -> Option<T>,
    ) -> Option<Self> {
        let value = parse(&raw)?;
        Some(Self {
            value,
            source,
            raw: Some(raw),
        })
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

impl ParsedProperty<String> {
    /// A string property whose value is its own raw text.
    pub fn text(raw: impl Into<String>, source: Source) -> Self {
        let raw = raw.into();
        Self::new(raw.clone(), source, raw)
    }
}

impl<T> Deref for ParsedProperty<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T: fmt::Display> fmt::Display for ParsedProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T> From<T> for ParsedProperty<T> {
    fn from(value: T) -> Self {
        Self {
            value,
            source: Source::Default,
            raw: None,
        }
    }
}
