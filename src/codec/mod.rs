//! The encode/decode transformation.
//!
//! `encode` = [`UnmergedReader`] → [`Encoder`] → [`Committer`]: unmerged
//! index records are flattened to stage-0 records under bogus names and
//! captured in a marker commit.
//!
//! `decode` = [`CommitDecoder`]: when the current commit is a marker commit,
//! it is discarded and the original multi-stage records are written back.

mod decode;
mod encode;
mod journal;

pub use decode::{Aside, AsideGuard, CommitDecoder, DecodeOutcome, DecodePlan};
pub use encode::{Committer, EncodeOutcome, EncodedIndex, Encoder, UnmergedReader, UnmergedState};
pub use journal::{Journal, Step};

use crate::error::CodecError;
use crate::naming::{self, BogusNamer, DEFAULT_ASIDE_SUFFIX, DEFAULT_MARKER_TAG};
use crate::store::StoreClient;

/// Exact message of a marker commit.
pub const MARKER_MESSAGE: &str = "TEMP-COMMIT: unmerged";

/// Naming knobs for the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecOptions {
    /// Tag appended to bogus names.
    pub tag: String,
    /// Suffix for working-tree files moved aside during decode.
    pub aside_suffix: String,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            tag: DEFAULT_MARKER_TAG.to_string(),
            aside_suffix: DEFAULT_ASIDE_SUFFIX.to_string(),
        }
    }
}

/// Encoder and decoder bound to one store.
#[derive(Debug)]
pub struct Codec<'s, S: StoreClient> {
    store: &'s S,
    namer: BogusNamer,
    aside_suffix: String,
}

impl<'s, S: StoreClient> Codec<'s, S> {
    /// Binds the codec to `store`, validating both naming knobs.
    pub fn new(store: &'s S, options: &CodecOptions) -> Result<Self, CodecError> {
        let namer = BogusNamer::new(&options.tag)?;
        naming::validate_tag(&options.aside_suffix)?;
        Ok(Self {
            store,
            namer,
            aside_suffix: options.aside_suffix.clone(),
        })
    }

    /// Captures the unmerged index in a marker commit.
    pub fn encode(&self) -> Result<EncodeOutcome, CodecError> {
        let state = UnmergedReader::new(self.store).read()?;
        if state.records.is_empty() {
            tracing::info!("no unmerged paths, nothing to encode");
            return Ok(EncodeOutcome::NothingToEncode);
        }

        let staged = self.store.list_staged()?;
        self.namer.check_unambiguous(&staged)?;

        let encoded = Encoder::new(&self.namer).encode(&state);
        if let Some(path) = encoded.bogus_paths().find(|p| self.store.path_exists(p)) {
            return Err(self.namer.ambiguity(path));
        }

        Committer::new(self.store).commit(&encoded)?;
        Ok(EncodeOutcome::from(&encoded))
    }

    /// Restores the unmerged index captured by a marker commit at HEAD.
    pub fn decode(&self) -> Result<DecodeOutcome, CodecError> {
        CommitDecoder::new(self.store, &self.namer, &self.aside_suffix).decode()
    }
}
