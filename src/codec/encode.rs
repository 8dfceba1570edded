use std::collections::HashSet;

use bstr::{BStr, BString, ByteSlice};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::MARKER_MESSAGE;
use super::journal::{Journal, Step};
use crate::error::CodecError;
use crate::naming::BogusNamer;
use crate::record::{self, IndexRecord, Stage, UnmergedPathSet};
use crate::store::StoreClient;

/// The unmerged part of the index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnmergedState {
    /// Every record with a non-zero stage, in index order.
    pub records: Vec<IndexRecord>,
    /// The distinct paths of `records`.
    pub paths: UnmergedPathSet,
}

/// Reads the unmerged records from the store. No side effects.
pub struct UnmergedReader<'s, S: StoreClient> {
    store: &'s S,
}

impl<'s, S: StoreClient> UnmergedReader<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn read(&self) -> Result<UnmergedState, CodecError> {
        let records: Vec<IndexRecord> = self
            .store
            .list_unmerged()?
            .into_iter()
            .filter(|r| r.stage.is_unmerged())
            .collect();
        let paths = record::unmerged_paths(&records);
        debug!(
            records = records.len(),
            paths = paths.len(),
            "read unmerged index"
        );
        Ok(UnmergedState { records, paths })
    }
}

/// Unmerged records paired with their stage-0 substitutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedIndex {
    /// The unmerged records, as read.
    pub originals: Vec<IndexRecord>,
    /// One stage-0 record per original, at its bogus name, same order.
    pub substitutes: Vec<IndexRecord>,
    /// Paths that were unmerged.
    pub paths: UnmergedPathSet,
}

impl EncodedIndex {
    pub fn bogus_paths(&self) -> impl Iterator<Item = &BStr> {
        self.substitutes.iter().map(|r| r.path.as_bstr())
    }

    pub fn original_paths(&self) -> Vec<BString> {
        self.paths.iter().cloned().collect()
    }
}

/// Maps unmerged records to stage-0 substitutes under bogus names.
pub struct Encoder<'n> {
    namer: &'n BogusNamer,
}

impl<'n> Encoder<'n> {
    pub fn new(namer: &'n BogusNamer) -> Self {
        Self { namer }
    }

    /// Total and order-preserving: substitute `i` encodes original `i`.
    pub fn encode(&self, state: &UnmergedState) -> EncodedIndex {
        let substitutes = state
            .records
            .iter()
            .map(|r| r.relocated(self.namer.encode(&r.path, r.stage), Stage::Resolved))
            .collect();
        EncodedIndex {
            originals: state.records.clone(),
            substitutes,
            paths: state.paths.clone(),
        }
    }
}

/// Realizes an [`EncodedIndex`] as a marker commit.
pub struct Committer<'s, S: StoreClient> {
    store: &'s S,
}

impl<'s, S: StoreClient> Committer<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Writes substitutes, stages originals, materializes bogus files and
    /// commits them all.
    ///
    /// If a step fails, completed steps are unwound best effort and the
    /// failing step's error is returned.
    #[instrument(skip_all, fields(records = encoded.originals.len()))]
    pub fn commit(&self, encoded: &EncodedIndex) -> Result<(), CodecError> {
        let mut journal = Journal::new();
        match self.apply(encoded, &mut journal) {
            Ok(()) => {
                info!(paths = encoded.paths.len(), "created marker commit");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, steps = journal.steps().len(), "encode failed, unwinding");
                let failures = journal.unwind(self.store);
                if !failures.is_empty() {
                    warn!(
                        failures = failures.len(),
                        "unwind incomplete, inspect the index manually"
                    );
                }
                Err(err)
            }
        }
    }

    fn apply(&self, encoded: &EncodedIndex, journal: &mut Journal) -> Result<(), CodecError> {
        let bogus: Vec<BString> = encoded.bogus_paths().map(BString::from).collect();
        let originals = encoded.original_paths();

        journal.record(Step::SubstitutesWritten {
            bogus: bogus.clone(),
            originals: encoded.originals.clone(),
        });
        self.store.update_index(&encoded.substitutes)?;

        journal.record(Step::OriginalsStaged {
            originals: encoded.originals.clone(),
        });
        self.store.stage_paths(&originals)?;

        journal.record(Step::BogusFilesMaterialized {
            paths: bogus.clone(),
        });
        self.store.checkout_paths(&bogus)?;

        let mut commit_paths = bogus;
        commit_paths.extend(self.committable(&originals)?);
        self.store.commit_paths(MARKER_MESSAGE, &commit_paths)
    }

    /// Original paths the marker commit can name after staging: those still
    /// in the index, plus those HEAD tracks (their deletion is committed).
    ///
    /// A conflict with no working-tree file on a path HEAD never had leaves
    /// nothing to commit at that path, and git rejects a pathspec for it.
    fn committable(&self, originals: &[BString]) -> Result<Vec<BString>, CodecError> {
        let staged: HashSet<BString> = self
            .store
            .list_staged()?
            .into_iter()
            .map(|r| r.path)
            .collect();
        let untracked: Vec<BString> = originals
            .iter()
            .filter(|p| !staged.contains(*p))
            .cloned()
            .collect();
        let committed = self.store.committed_paths(&untracked)?;

        let skipped = untracked.len() - committed.len();
        if skipped > 0 {
            debug!(skipped, "leaving absent paths out of the marker commit");
        }
        Ok(originals
            .iter()
            .filter(|p| staged.contains(*p) || committed.contains(*p))
            .cloned()
            .collect())
    }
}

/// Result of an encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EncodeOutcome {
    /// The index had no unmerged paths; nothing was changed.
    NothingToEncode,
    /// A marker commit was created.
    Encoded {
        /// Paths that were unmerged.
        paths: Vec<String>,
        /// Number of unmerged records captured.
        records: usize,
        /// Bogus paths now in the marker commit.
        bogus_paths: Vec<String>,
    },
}

impl From<&EncodedIndex> for EncodeOutcome {
    fn from(encoded: &EncodedIndex) -> Self {
        EncodeOutcome::Encoded {
            paths: encoded
                .paths
                .iter()
                .map(|p| p.to_str_lossy().into_owned())
                .collect(),
            records: encoded.originals.len(),
            bogus_paths: encoded
                .bogus_paths()
                .map(|p| p.to_str_lossy().into_owned())
                .collect(),
        }
    }
}
