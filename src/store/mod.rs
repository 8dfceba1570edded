//! The store seam: every index, working-tree and commit operation the codec
//! needs, and nothing else.
//!
//! [`GitCli`] implements it by running `git` in an explicit repository
//! root. [`MemoryStore`] implements it in memory so the codec can be tested
//! without a repository.
//!
//! Paths are raw bytes, root-relative, exactly as the index stores them.
//!
//! All methods take `&self`. Decode keeps a scoped rename guard borrowing
//! the store while it keeps issuing commands through the same handle.

mod git;
mod memory;

pub use git::{GitCli, Repository};
pub use memory::MemoryStore;

use bstr::BString;

use crate::error::CodecError;
use crate::record::IndexRecord;

/// Operations the codec performs against a repository.
pub trait StoreClient {
    /// Lists every index record with a non-zero stage, in index order.
    fn list_unmerged(&self) -> Result<Vec<IndexRecord>, CodecError>;

    /// Lists every index record, in index order.
    fn list_staged(&self) -> Result<Vec<IndexRecord>, CodecError>;

    /// Applies records with `update-index --index-info` semantics.
    ///
    /// A stage-0 record replaces every entry of its path; a removal record
    /// (mode `0`) drops every entry of its path.
    fn update_index(&self, records: &[IndexRecord]) -> Result<(), CodecError>;

    /// Stages `paths` from the working tree, recording deletions for
    /// missing files.
    fn stage_paths(&self, paths: &[BString]) -> Result<(), CodecError>;

    /// Removes `paths` from the index and the working tree.
    fn remove_paths(&self, paths: &[BString]) -> Result<(), CodecError>;

    /// Writes the stage-0 index content of `paths` into the working tree.
    fn checkout_paths(&self, paths: &[BString]) -> Result<(), CodecError>;

    /// Commits the index state of exactly `paths` with `message`.
    fn commit_paths(&self, message: &str, paths: &[BString]) -> Result<(), CodecError>;

    /// Those of `paths` that the current commit's tree holds, in input
    /// order. Empty on an unborn branch.
    fn committed_paths(&self, paths: &[BString]) -> Result<Vec<BString>, CodecError>;

    /// Message of the current commit, or `None` on an unborn branch.
    fn head_message(&self) -> Result<Option<String>, CodecError>;

    /// Moves the current commit back to its first parent, leaving index and
    /// working tree untouched.
    fn reset_soft_parent(&self) -> Result<(), CodecError>;

    /// Whether anything (file, symlink, directory) exists at `path` in the
    /// working tree.
    fn path_exists(&self, path: &[u8]) -> bool;

    /// Renames a working-tree entry.
    fn rename_path(&self, from: &[u8], to: &[u8]) -> Result<(), CodecError>;

    /// Deletes a working-tree file; a missing file is not an error.
    fn discard_file(&self, path: &[u8]) -> Result<(), CodecError>;
}
