//! Best-effort unwind log for encode.
//!
//! Each mutating encode step is recorded before it runs, since a git
//! command can fail part-way (a checkout may have written some files).
//! Undoing a step that never took effect is harmless: every undo is
//! idempotent. There is no cross-step atomicity and the unwind itself can
//! fail; failures are logged and returned, never retried.

use bstr::BString;
use tracing::{info, warn};

use crate::error::CodecError;
use crate::record::{IndexRecord, UnmergedPathSet};
use crate::store::StoreClient;

/// Hash width assumed when no record is available to size a removal.
const FALLBACK_HASH_LEN: usize = 40;

/// A reversible encode step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Stage-0 substitutes were written at the bogus paths.
    SubstitutesWritten {
        bogus: Vec<BString>,
        originals: Vec<IndexRecord>,
    },
    /// The original conflicted paths were staged from the working tree.
    OriginalsStaged { originals: Vec<IndexRecord> },
    /// Bogus paths were checked out into the working tree.
    BogusFilesMaterialized { paths: Vec<BString> },
}

impl Step {
    fn describe(&self) -> &'static str {
        match self {
            Step::SubstitutesWritten { .. } => "substitutes written",
            Step::OriginalsStaged { .. } => "originals staged",
            Step::BogusFilesMaterialized { .. } => "bogus files materialized",
        }
    }

    fn undo<S: StoreClient>(&self, store: &S) -> Result<(), CodecError> {
        match self {
            Step::SubstitutesWritten { bogus, originals } => {
                let hash_len = hash_len(originals);
                let mut records: Vec<IndexRecord> = bogus
                    .iter()
                    .map(|p| IndexRecord::removal(p.clone(), hash_len))
                    .collect();
                records.extend(restoring_records(originals));
                store.update_index(&records)
            }
            Step::OriginalsStaged { originals } => {
                store.update_index(&restoring_records(originals))
            }
            Step::BogusFilesMaterialized { paths } => {
                paths.iter().try_for_each(|p| store.discard_file(p))
            }
        }
    }
}

fn hash_len(records: &[IndexRecord]) -> usize {
    records
        .first()
        .map_or(FALLBACK_HASH_LEN, |r| r.hash.len())
}

/// Removal lines for every original path followed by the original records,
/// which puts the paths back into their multi-stage state.
pub(crate) fn restoring_records(originals: &[IndexRecord]) -> Vec<IndexRecord> {
    let hash_len = hash_len(originals);
    let paths: UnmergedPathSet = originals.iter().map(|r| r.path.clone()).collect();
    paths
        .into_iter()
        .map(|p| IndexRecord::removal(p, hash_len))
        .chain(originals.iter().cloned())
        .collect()
}

/// Ordered log of encode steps that may have taken effect.
#[derive(Debug, Default)]
pub struct Journal {
    steps: Vec<Step>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Undoes the recorded steps newest first, continuing past failures.
    ///
    /// Returns the errors of steps that could not be undone.
    pub fn unwind<S: StoreClient>(self, store: &S) -> Vec<CodecError> {
        let mut failures = Vec::new();
        for step in self.steps.iter().rev() {
            match step.undo(store) {
                Ok(()) => info!(step = step.describe(), "unwound encode step"),
                Err(err) => {
                    warn!(step = step.describe(), error = %err, "failed to unwind encode step");
                    failures.push(err);
                }
            }
        }
        failures
    }
}
