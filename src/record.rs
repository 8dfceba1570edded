//! Index records and their textual forms.
//!
//! A record is the `(mode, hash, stage, path)` tuple git prints from
//! `ls-files --stage` and accepts on `update-index --index-info`:
//!
//! ```text
//! <mode> SP <hash> SP <stage> TAB <path>
//! ```
//!
//! Mode and hash are opaque tokens; they are copied, never interpreted.
//! Paths are raw bytes: git does not require them to be UTF-8, and they are
//! handed back to git and the filesystem unchanged.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use bstr::{BString, ByteSlice};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// The distinct paths that carry at least one unmerged record.
pub type UnmergedPathSet = BTreeSet<BString>;

/// Index stage of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Stage 0, an ordinary resolved entry.
    Resolved,
    /// Stage 1, the common ancestor version.
    Base,
    /// Stage 2, our version.
    Ours,
    /// Stage 3, their version.
    Theirs,
}

impl Stage {
    /// The unmerged stages in index order.
    pub const UNMERGED: [Stage; 3] = [Stage::Base, Stage::Ours, Stage::Theirs];

    /// Returns the numeric stage git uses.
    pub fn number(self) -> u8 {
        match self {
            Stage::Resolved => 0,
            Stage::Base => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    /// Converts a numeric stage; `None` outside `0..=3`.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(Stage::Resolved),
            1 => Some(Stage::Base),
            2 => Some(Stage::Ours),
            3 => Some(Stage::Theirs),
            _ => None,
        }
    }

    /// Whether this stage marks an unmerged entry.
    pub fn is_unmerged(self) -> bool {
        self != Stage::Resolved
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl FromStr for Stage {
    type Err = ();

    /// Accepts only the canonical single digit, so `"01"` is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(Stage::Resolved),
            "1" => Ok(Stage::Base),
            "2" => Ok(Stage::Ours),
            "3" => Ok(Stage::Theirs),
            _ => Err(()),
        }
    }
}

/// Mode token git uses to drop every entry of a path in `--index-info`.
const REMOVAL_MODE: &str = "0";

/// One index entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Permission mode token, e.g. `100644`.
    pub mode: String,
    /// Object hash token.
    pub hash: String,
    /// Index stage.
    pub stage: Stage,
    /// Repository-relative path, as stored in the index.
    pub path: BString,
}

impl IndexRecord {
    pub fn new(
        mode: impl Into<String>,
        hash: impl Into<String>,
        stage: Stage,
        path: impl Into<BString>,
    ) -> Self {
        Self {
            mode: mode.into(),
            hash: hash.into(),
            stage,
            path: path.into(),
        }
    }

    /// A record that, fed to `--index-info`, removes all entries of `path`.
    ///
    /// The null hash must have the repository's hash width, so it is sized
    /// after `hash_len`.
    pub fn removal(path: impl Into<BString>, hash_len: usize) -> Self {
        Self {
            mode: REMOVAL_MODE.to_string(),
            hash: "0".repeat(hash_len),
            stage: Stage::Resolved,
            path: path.into(),
        }
    }

    /// Whether this record is a removal produced by [`IndexRecord::removal`].
    pub fn is_removal(&self) -> bool {
        self.mode == REMOVAL_MODE
    }

    /// Same content, moved to another path and stage.
    pub fn relocated(&self, path: impl Into<BString>, stage: Stage) -> Self {
        Self {
            mode: self.mode.clone(),
            hash: self.hash.clone(),
            stage,
            path: path.into(),
        }
    }

    /// Parses one `ls-files --stage` entry (without its terminator).
    ///
    /// The metadata before the tab must be ASCII; the path may hold any
    /// bytes but NUL.
    pub fn parse(entry: &[u8]) -> Result<Self, CodecError> {
        let malformed = || CodecError::MalformedRecord {
            line: entry.to_str_lossy().into_owned(),
        };

        let (meta, path) = entry.split_once_str("\t").ok_or_else(malformed)?;
        let meta = meta.to_str().map_err(|_| malformed())?;
        let mut fields = meta.split(' ');
        let (Some(mode), Some(hash), Some(stage), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(malformed());
        };

        if mode.is_empty() || hash.is_empty() || path.is_empty() {
            return Err(malformed());
        }
        let stage = stage.parse::<Stage>().map_err(|()| malformed())?;

        Ok(Self::new(mode, hash, stage, path))
    }

    /// Formats the record as an `--index-info` entry (without terminator).
    pub fn to_index_info(&self) -> BString {
        let mut out = BString::from(format!("{} {} {}\t", self.mode, self.hash, self.stage));
        out.extend_from_slice(&self.path);
        out
    }
}

impl fmt::Display for IndexRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_index_info())
    }
}

/// Parses NUL-terminated `ls-files -z --stage` output.
///
/// Each entry is parsed on its own, so an error names only the bad entry.
pub fn parse_records(output: &[u8]) -> Result<Vec<IndexRecord>, CodecError> {
    output
        .split_str("\0")
        .filter(|entry| !entry.is_empty())
        .map(IndexRecord::parse)
        .collect()
}

/// Renders records as `--index-info` input, each entry ended by `terminator`.
pub fn render_index_info(records: &[IndexRecord], terminator: u8) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        out.extend_from_slice(&record.to_index_info());
        out.push(terminator);
    }
    out
}

/// Collects the paths of all unmerged records.
pub fn unmerged_paths(records: &[IndexRecord]) -> UnmergedPathSet {
    records
        .iter()
        .filter(|r| r.stage.is_unmerged())
        .map(|r| r.path.clone())
        .collect()
}
