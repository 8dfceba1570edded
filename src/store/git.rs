use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use bstr::{BString, ByteSlice};
use tracing::{debug, trace};

use super::StoreClient;
use crate::error::CodecError;
use crate::record::{self, IndexRecord};

/// Handle on a repository's working-tree root.
///
/// Every git invocation runs with this root as its working directory, so
/// paths reported and accepted by the store are always root-relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    root: PathBuf,
}

impl Repository {
    /// Wraps a known working-tree root without checking it.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Finds the working-tree root containing `start`.
    pub fn discover(start: &Path, git: &str) -> Result<Self, CodecError> {
        let output = Command::new(git)
            .current_dir(start)
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .map_err(|source| CodecError::Spawn {
                operation: "rev-parse".to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(CodecError::store_failure(
                "rev-parse",
                output.status.code().unwrap_or(1),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }

        let root = output.stdout.trim_end().to_path_lossy().into_owned();
        debug!(root = %root.display(), "discovered repository");
        Ok(Self::at(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute working-tree location of a root-relative path.
    pub fn worktree_path(&self, path: &[u8]) -> PathBuf {
        self.root.join(path.to_path_lossy())
    }
}

/// [`StoreClient`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: Repository,
    git: String,
    run_hooks: bool,
}

impl GitCli {
    pub fn new(repo: Repository, git: impl Into<String>, run_hooks: bool) -> Self {
        Self {
            repo,
            git: git.into(),
            run_hooks,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.git);
        cmd.current_dir(self.repo.root());
        cmd
    }

    /// Runs `git <args>`, feeding `stdin` if given, and returns stdout.
    fn run<A: AsRef<OsStr> + fmt::Debug>(
        &self,
        operation: &str,
        args: &[A],
        stdin: Option<&[u8]>,
    ) -> Result<Vec<u8>, CodecError> {
        debug!(operation, args = ?args, "running git");
        let spawn_err = |source| CodecError::Spawn {
            operation: operation.to_string(),
            source,
        };

        let output: Output = match stdin {
            None => self.command().args(args).output().map_err(spawn_err)?,
            Some(input) => {
                let mut child = self
                    .command()
                    .args(args)
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(spawn_err)?;
                if let Some(mut pipe) = child.stdin.take() {
                    pipe.write_all(input).map_err(spawn_err)?;
                }
                child.wait_with_output().map_err(spawn_err)?
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(operation, status = ?output.status.code(), stderr = %stderr, "git failed");
            return Err(CodecError::store_failure(
                operation,
                output.status.code().unwrap_or(1),
                stderr,
            ));
        }

        trace!(operation, bytes = output.stdout.len(), "git succeeded");
        Ok(output.stdout)
    }

    /// Runs a pathspec-taking command with `paths` appended after `--`.
    ///
    /// Paths are passed literally so names containing `*` or `:` are never
    /// read as pathspec magic. An empty list runs nothing.
    fn run_with_paths(
        &self,
        operation: &str,
        args: &[&str],
        paths: &[BString],
    ) -> Result<Vec<u8>, CodecError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let mut full: Vec<OsString> = vec![OsString::from("--literal-pathspecs")];
        full.extend(args.iter().map(OsString::from));
        full.push(OsString::from("--"));
        full.extend(paths.iter().map(|p| p.to_os_str_lossy().into_owned()));
        self.run(operation, &full, None)
    }

    fn list(&self, operation: &str, flag: &str) -> Result<Vec<IndexRecord>, CodecError> {
        let stdout = self.run(operation, &["ls-files", "-z", flag], None)?;
        record::parse_records(&stdout)
    }

    /// Whether HEAD resolves to a commit.
    fn head_exists(&self) -> Result<bool, CodecError> {
        // rev-parse --verify -q exits 1 silently when HEAD is unborn.
        let status = self
            .command()
            .args(["rev-parse", "--verify", "-q", "HEAD"])
            .output()
            .map_err(|source| CodecError::Spawn {
                operation: "rev-parse".to_string(),
                source,
            })?
            .status;
        Ok(status.success())
    }

    fn io_error(&self, path: &[u8], source: std::io::Error) -> CodecError {
        CodecError::Io {
            path: self.repo.worktree_path(path),
            source,
        }
    }
}

impl StoreClient for GitCli {
    fn list_unmerged(&self) -> Result<Vec<IndexRecord>, CodecError> {
        self.list("ls-files", "--unmerged")
    }

    fn list_staged(&self) -> Result<Vec<IndexRecord>, CodecError> {
        self.list("ls-files", "--stage")
    }

    fn update_index(&self, records: &[IndexRecord]) -> Result<(), CodecError> {
        if records.is_empty() {
            return Ok(());
        }
        let input = record::render_index_info(records, b'\0');
        self.run(
            "update-index",
            &["update-index", "-z", "--index-info"],
            Some(input.as_slice()),
        )
        .map(|_| ())
    }

    fn stage_paths(&self, paths: &[BString]) -> Result<(), CodecError> {
        self.run_with_paths("add", &["add"], paths).map(|_| ())
    }

    fn remove_paths(&self, paths: &[BString]) -> Result<(), CodecError> {
        self.run_with_paths("rm", &["rm", "-q", "-f"], paths)
            .map(|_| ())
    }

    fn checkout_paths(&self, paths: &[BString]) -> Result<(), CodecError> {
        self.run_with_paths("checkout", &["checkout", "-q"], paths)
            .map(|_| ())
    }

    fn commit_paths(&self, message: &str, paths: &[BString]) -> Result<(), CodecError> {
        let mut args = vec!["commit", "-q", "-m", message];
        if !self.run_hooks {
            args.push("--no-verify");
        }
        self.run_with_paths("commit", &args, paths).map(|_| ())
    }

    fn committed_paths(&self, paths: &[BString]) -> Result<Vec<BString>, CodecError> {
        if paths.is_empty() || !self.head_exists()? {
            return Ok(Vec::new());
        }
        let stdout = self.run_with_paths(
            "ls-tree",
            &["ls-tree", "-r", "-z", "--full-tree", "--name-only", "HEAD"],
            paths,
        )?;
        let listed: HashSet<&[u8]> = stdout
            .split_str("\0")
            .filter(|name| !name.is_empty())
            .collect();
        Ok(paths
            .iter()
            .filter(|p| listed.contains(p.as_slice()))
            .cloned()
            .collect())
    }

    fn head_message(&self) -> Result<Option<String>, CodecError> {
        if !self.head_exists()? {
            debug!("HEAD does not resolve to a commit");
            return Ok(None);
        }

        let stdout = self.run("log", &["log", "-1", "--format=%B", "HEAD"], None)?;
        Ok(Some(String::from_utf8_lossy(&stdout).trim_end().to_string()))
    }

    fn reset_soft_parent(&self) -> Result<(), CodecError> {
        self.run("reset", &["reset", "-q", "--soft", "HEAD^"], None)
            .map(|_| ())
    }

    fn path_exists(&self, path: &[u8]) -> bool {
        self.repo.worktree_path(path).symlink_metadata().is_ok()
    }

    fn rename_path(&self, from: &[u8], to: &[u8]) -> Result<(), CodecError> {
        debug!(from = %from.as_bstr(), to = %to.as_bstr(), "renaming working-tree path");
        std::fs::rename(self.repo.worktree_path(from), self.repo.worktree_path(to))
            .map_err(|e| self.io_error(from, e))
    }

    fn discard_file(&self, path: &[u8]) -> Result<(), CodecError> {
        match std::fs::remove_file(self.repo.worktree_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(path, e)),
        }
    }
}
