use std::collections::HashSet;

use bstr::{BString, ByteSlice};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::MARKER_MESSAGE;
use super::journal::restoring_records;
use crate::error::CodecError;
use crate::naming::BogusNamer;
use crate::record::{IndexRecord, UnmergedPathSet};
use crate::store::StoreClient;

/// A working-tree file moved out of the way while its path is rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aside {
    pub path: BString,
    pub aside: BString,
}

impl Aside {
    fn new(path: &[u8], suffix: &str) -> Self {
        let mut aside = BString::from(path);
        aside.push(b'.');
        aside.extend_from_slice(suffix.as_bytes());
        Self {
            path: BString::from(path),
            aside,
        }
    }
}

/// Everything decode will do, captured from the index before any mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodePlan {
    /// Original records rebuilt from bogus entries, in index order.
    pub replacements: Vec<IndexRecord>,
    /// Bogus paths, then indexed original paths, without duplicates.
    pub removals: Vec<BString>,
    /// Indexed original paths whose working-tree file must survive removal.
    pub asides: Vec<Aside>,
    /// Paths that will be unmerged again.
    pub originals: UnmergedPathSet,
}

impl DecodePlan {
    /// Builds the plan from the staged records of a marker commit's index.
    ///
    /// Pure: no store access. Fails if a path matches the bogus pattern
    /// without a stage encode could have produced.
    pub fn build(
        staged: &[IndexRecord],
        namer: &BogusNamer,
        aside_suffix: &str,
    ) -> Result<Self, CodecError> {
        let mut plan = DecodePlan::default();
        let mut removed: HashSet<&[u8]> = HashSet::new();

        for record in staged {
            if let Some((original, stage)) = namer.decode(&record.path)? {
                plan.replacements.push(record.relocated(original, stage));
                plan.originals.insert(BString::from(original));
                if removed.insert(&record.path) {
                    plan.removals.push(record.path.clone());
                }
            }
        }

        for record in staged {
            if plan.originals.contains(&record.path) && removed.insert(&record.path) {
                plan.removals.push(record.path.clone());
                plan.asides.push(Aside::new(&record.path, aside_suffix));
            }
        }

        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }
}

/// Keeps working-tree files renamed aside and puts them back when dropped.
///
/// Restoration happens however the rewrite between [`AsideGuard::move_aside`]
/// and [`AsideGuard::restore`] exits, including early returns and panics.
pub struct AsideGuard<'s, S: StoreClient> {
    store: &'s S,
    moved: Vec<Aside>,
}

impl<'s, S: StoreClient> AsideGuard<'s, S> {
    /// Renames every aside whose original file exists.
    ///
    /// Files moved before a failing rename are restored when the returned
    /// error drops the partially built guard.
    pub fn move_aside(store: &'s S, asides: &[Aside]) -> Result<Self, CodecError> {
        let mut guard = Self {
            store,
            moved: Vec::with_capacity(asides.len()),
        };
        for aside in asides {
            if !store.path_exists(&aside.path) {
                debug!(path = %aside.path, "no working-tree file to move aside");
                continue;
            }
            store.rename_path(&aside.path, &aside.aside)?;
            guard.moved.push(aside.clone());
        }
        Ok(guard)
    }

    /// Paths currently moved aside.
    pub fn moved(&self) -> &[Aside] {
        &self.moved
    }

    /// Renames every file back and disarms the guard.
    ///
    /// Returns the restored original paths.
    pub fn restore(mut self) -> Result<Vec<BString>, CodecError> {
        let mut restored = Vec::with_capacity(self.moved.len());
        while let Some(aside) = self.moved.pop() {
            if let Err(err) = self.store.rename_path(&aside.aside, &aside.path) {
                // Leave it for Drop to retry alongside the rest.
                self.moved.push(aside);
                return Err(err);
            }
            restored.push(aside.path);
        }
        restored.reverse();
        Ok(restored)
    }
}

impl<S: StoreClient> Drop for AsideGuard<'_, S> {
    fn drop(&mut self) {
        for aside in self.moved.drain(..).rev() {
            match self.store.rename_path(&aside.aside, &aside.path) {
                Ok(()) => info!(path = %aside.path, "restored file moved aside"),
                Err(err) => warn!(
                    path = %aside.path,
                    aside = %aside.aside,
                    error = %err,
                    "failed to restore file moved aside"
                ),
            }
        }
    }
}

/// Turns a marker commit at HEAD back into an unmerged index.
pub struct CommitDecoder<'s, 'n, S: StoreClient> {
    store: &'s S,
    namer: &'n BogusNamer,
    aside_suffix: &'n str,
}

impl<'s, 'n, S: StoreClient> CommitDecoder<'s, 'n, S> {
    pub fn new(store: &'s S, namer: &'n BogusNamer, aside_suffix: &'n str) -> Self {
        Self {
            store,
            namer,
            aside_suffix,
        }
    }

    /// Captures the plan and checks it against the working tree.
    ///
    /// A soft reset leaves the index alone, so the plan taken here is the
    /// one that applies after the reset.
    pub fn capture(&self) -> Result<DecodePlan, CodecError> {
        let staged = self.store.list_staged()?;
        let plan = DecodePlan::build(&staged, self.namer, self.aside_suffix)?;

        for aside in &plan.asides {
            if self.store.path_exists(&aside.path) && self.store.path_exists(&aside.aside) {
                return Err(CodecError::AsideCollision {
                    path: aside.path.to_str_lossy().into_owned(),
                    aside: aside.aside.to_str_lossy().into_owned(),
                });
            }
        }

        debug!(
            replacements = plan.replacements.len(),
            removals = plan.removals.len(),
            asides = plan.asides.len(),
            "captured decode plan"
        );
        Ok(plan)
    }

    /// Restores the index if HEAD is a marker commit; otherwise does nothing.
    #[instrument(skip_all)]
    pub fn decode(&self) -> Result<DecodeOutcome, CodecError> {
        match self.store.head_message()? {
            Some(message) if message == MARKER_MESSAGE => {}
            other => {
                info!(head = ?other, "current commit is not a marker commit");
                return Ok(DecodeOutcome::NotMarker);
            }
        }

        let plan = self.capture()?;
        if plan.is_empty() {
            return Err(self.namer.no_encoded_entries());
        }
        self.store.reset_soft_parent()?;
        info!("discarded marker commit");

        let preserved = self.apply(&plan)?;
        info!(
            paths = plan.originals.len(),
            records = plan.replacements.len(),
            "restored unmerged index"
        );

        Ok(DecodeOutcome::Decoded {
            paths: lossy(plan.originals.iter()),
            records: plan.replacements.len(),
            preserved: lossy(preserved.iter()),
        })
    }

    fn apply(&self, plan: &DecodePlan) -> Result<Vec<BString>, CodecError> {
        let guard = AsideGuard::move_aside(self.store, &plan.asides)?;
        self.store.remove_paths(&plan.removals)?;
        self.store
            .update_index(&restoring_records(&plan.replacements))?;
        guard.restore()
    }
}

fn lossy<'a>(paths: impl Iterator<Item = &'a BString>) -> Vec<String> {
    paths.map(|p| p.to_str_lossy().into_owned()).collect()
}

/// Result of a decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecodeOutcome {
    /// HEAD was not a marker commit; nothing was changed.
    NotMarker,
    /// The marker commit was discarded and the conflict restored.
    Decoded {
        /// Paths that are unmerged again.
        paths: Vec<String>,
        /// Number of multi-stage records written back.
        records: usize,
        /// Working-tree files kept through the rewrite.
        preserved: Vec<String>,
    },
}
