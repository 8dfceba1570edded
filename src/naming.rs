//! Bogus names: the reversible path encoding of `(path, stage)`.
//!
//! An unmerged record for `path` at stage `n` is stored under
//! `path.n.TAG` at stage 0. Decoding strips exactly one trailing
//! `.<n>.TAG`, so `a.1.TAG.2.TAG` decodes to `(a.1.TAG, 2)`.
//!
//! The encoding is only reversible if no real path already matches the
//! pattern; [`BogusNamer::check_unambiguous`] enforces that before encoding.

use bstr::{BStr, BString, ByteSlice};
use regex::bytes::Regex;

use crate::error::CodecError;
use crate::record::{IndexRecord, Stage};

/// Default marker tag appended to bogus names.
pub const DEFAULT_MARKER_TAG: &str = "GIT_INDEX_UNMERGED_TO_REGULAR_CODEC";

/// Default suffix for working-tree files moved aside during decode.
pub const DEFAULT_ASIDE_SUFFIX: &str = "GIT_INDEX_UNMERGED_CHECKOUT";

/// Checks that `tag` can be used as a trailing path component suffix.
///
/// Rejects empty tags and tags containing `.`, `/`, NUL or whitespace: a dot
/// would let the tag itself look like part of a `.<stage>.` segment.
pub fn validate_tag(tag: &str) -> Result<(), CodecError> {
    let reason = if tag.is_empty() {
        Some("must not be empty")
    } else if tag.contains('.') {
        Some("must not contain '.'")
    } else if tag.contains('/') {
        Some("must not contain '/'")
    } else if tag.chars().any(|c| c == '\0' || c.is_whitespace()) {
        Some("must not contain whitespace or NUL")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CodecError::InvalidTag {
            tag: tag.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Encodes and decodes bogus names for one marker tag.
#[derive(Debug, Clone)]
pub struct BogusNamer {
    tag: String,
    pattern: Regex,
}

impl BogusNamer {
    /// Creates a namer for `tag`, validating it first.
    pub fn new(tag: &str) -> Result<Self, CodecError> {
        validate_tag(tag)?;
        // (?s) for newlines in paths; (?-u:.) for bytes that are not UTF-8.
        let pattern = Regex::new(&format!(
            r"(?s)^((?-u:.)+)\.([0-9]+)\.{}$",
            regex::escape(tag)
        ))
            .map_err(|e| CodecError::InvalidTag {
                tag: tag.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            tag: tag.to_string(),
            pattern,
        })
    }

    /// The bogus name for `(path, stage)`.
    pub fn encode(&self, path: &[u8], stage: Stage) -> BString {
        let mut name = BString::from(path);
        name.extend_from_slice(format!(".{stage}.{}", self.tag).as_bytes());
        name
    }

    /// Whether `path` falls under the decode pattern at all.
    pub fn matches(&self, path: &[u8]) -> bool {
        self.pattern.is_match(path)
    }

    /// Decodes a bogus name back into `(original path, stage)`.
    ///
    /// Returns `Ok(None)` for ordinary paths. A name that matches the
    /// pattern but carries anything other than a canonical `1`, `2` or `3`
    /// is an [`CodecError::EncodingAmbiguity`]: no encode produces it.
    pub fn decode<'p>(&self, path: &'p [u8]) -> Result<Option<(&'p BStr, Stage)>, CodecError> {
        let Some(caps) = self.pattern.captures(path) else {
            return Ok(None);
        };
        let (Some(original), Some(stage)) = (caps.get(1), caps.get(2)) else {
            return Ok(None);
        };

        match stage.as_bytes().to_str().map(str::parse::<Stage>) {
            Ok(Ok(stage)) if stage.is_unmerged() => Ok(Some((original.as_bytes().as_bstr(), stage))),
            _ => Err(self.ambiguity(path)),
        }
    }

    /// Fails if any record's path already matches the decode pattern.
    pub fn check_unambiguous(&self, records: &[IndexRecord]) -> Result<(), CodecError> {
        match records.iter().find(|r| self.matches(&r.path)) {
            Some(record) => Err(self.ambiguity(&record.path)),
            None => Ok(()),
        }
    }

    pub(crate) fn no_encoded_entries(&self) -> CodecError {
        CodecError::NoEncodedEntries {
            tag: self.tag.clone(),
        }
    }

    pub(crate) fn ambiguity(&self, path: &[u8]) -> CodecError {
        CodecError::EncodingAmbiguity {
            path: path.to_str_lossy().into_owned(),
            tag: self.tag.clone(),
        }
    }
}
