//! Integration tests against real git repositories.
//!
//! Conflicts are staged directly with `update-index --index-info` so no
//! merge is in progress; git refuses partial commits while MERGE_HEAD or
//! CHERRY_PICK_HEAD exists.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use git_unmerged::{
    Codec, CodecError, CodecOptions, DecodeOutcome, EncodeOutcome, GitCli, MARKER_MESSAGE,
    Repository, StoreClient,
};
use tempfile::TempDir;

const TAG: &str = "GIT_INDEX_UNMERGED_TO_REGULAR_CODEC";
const MARKERS: &str = "<<<<<<< ours\nours\n=======\ntheirs\n>>>>>>> theirs\n";

fn git_output(dir: &Path, args: &[&str]) -> Output {
    Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap()
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = git_output(dir, args);
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim_end().to_string()
}

fn git_stdin(dir: &Path, args: &[&str], input: &[u8]) {
    use std::io::Write;
    use std::process::Stdio;

    let mut child = Command::new("git")
        .current_dir(dir)
        .args(args)
        .stdin(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input)
        .unwrap();
    assert!(child.wait().unwrap().success(), "git {:?} failed", args);
}

fn setup_test_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();
    git(path, &["init", "-q"]);
    git(path, &["config", "user.name", "Test User"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "commit.gpgsign", "false"]);
    fs::write(path.join("README.md"), "readme\n").unwrap();
    git(path, &["add", "README.md"]);
    git(path, &["commit", "-q", "-m", "initial"]);
    temp_dir
}

fn hash_blob(dir: &Path, content: &str) -> String {
    fs::write(dir.join(".blob"), content).unwrap();
    let hash = git(dir, &["hash-object", "-w", ".blob"]);
    fs::remove_file(dir.join(".blob")).unwrap();
    hash
}

/// Stages a conflict on `path` with one entry per `(stage, content)` and
/// writes `worktree` at the path.
fn stage_conflict(dir: &Path, path: &str, versions: &[(u8, &str)], worktree: &str) {
    let mut info = String::new();
    for (stage, content) in versions {
        let hash = hash_blob(dir, content);
        info.push_str(&format!("100644 {hash} {stage}\t{path}\n"));
    }
    git_stdin(dir, &["update-index", "--index-info"], info.as_bytes());

    let file = dir.join(path);
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(file, worktree).unwrap();
}

fn staged(dir: &Path) -> String {
    git(dir, &["ls-files", "--stage"])
}

fn store(dir: &Path) -> GitCli {
    GitCli::new(Repository::discover(dir, "git").unwrap(), "git", false)
}

fn head_message(dir: &Path) -> String {
    git(dir, &["log", "-1", "--format=%B"])
}

/// # Round Trip Through a Marker Commit
///
/// Tests encode and decode of a three-way conflict and a two-way conflict
/// on a path with spaces, using the git command line store.
///
/// ## Test Scenario
/// - Stages `f` at stages 1-3 and `dir/with space.txt` at stages 2-3
/// - Encodes, inspects the marker commit, then decodes
///
/// ## Expected Outcome
/// - The marker commit holds each stage under its bogus name with the
///   original hash, plus the working-tree content of the conflicted paths
/// - Decode restores the exact staged entries, HEAD and working tree
#[test]
fn test_round_trip_restores_conflict() {
    let temp_dir = setup_test_repo();
    let dir = temp_dir.path();
    stage_conflict(dir, "f", &[(1, "base\n"), (2, "ours\n"), (3, "theirs\n")], MARKERS);
    stage_conflict(
        dir,
        "dir/with space.txt",
        &[(2, "left\n"), (3, "right\n")],
        "both\n",
    );
    let before = staged(dir);
    let head_before = git(dir, &["rev-parse", "HEAD"]);

    let store = store(dir);
    let codec = Codec::new(&store, &CodecOptions::default()).unwrap();

    let outcome = codec.encode().unwrap();
    assert!(matches!(outcome, EncodeOutcome::Encoded { records: 5, .. }));
    assert_eq!(head_message(dir), MARKER_MESSAGE);
    assert_eq!(git(dir, &["rev-parse", "HEAD^"]), head_before);
    assert!(git(dir, &["ls-files", "--unmerged"]).is_empty());

    let tree = git(dir, &["ls-tree", "-r", "HEAD"]);
    let base = hash_blob(dir, "base\n");
    assert!(tree.contains(&format!("blob {base}\tf.1.{TAG}")));
    assert!(tree.contains(&format!("\tdir/with space.txt.3.{TAG}")));
    let f_hash = git(dir, &["rev-parse", "HEAD:f"]);
    assert_eq!(f_hash, hash_blob(dir, MARKERS));
    assert_eq!(
        fs::read_to_string(dir.join(format!("f.2.{TAG}"))).unwrap(),
        "ours\n"
    );

    let outcome = codec.decode().unwrap();
    assert_eq!(
        outcome,
        DecodeOutcome::Decoded {
            paths: vec!["dir/with space.txt".to_string(), "f".to_string()],
            records: 5,
            preserved: vec!["dir/with space.txt".to_string(), "f".to_string()],
        }
    );

    assert_eq!(staged(dir), before);
    assert_eq!(git(dir, &["rev-parse", "HEAD"]), head_before);
    assert_eq!(fs::read_to_string(dir.join("f")).unwrap(), MARKERS);
    assert_eq!(
        fs::read_to_string(dir.join("dir/with space.txt")).unwrap(),
        "both\n"
    );
    assert!(!dir.join(format!("f.1.{TAG}")).exists());
    assert!(!dir.join("f.GIT_INDEX_UNMERGED_CHECKOUT").exists());
}

/// # Decode on an Ordinary Commit
///
/// Tests that decode leaves a repository alone unless HEAD is a marker
/// commit.
///
/// ## Test Scenario
/// - Commits "unrelated change" and decodes
///
/// ## Expected Outcome
/// - NotMarker; HEAD and index unchanged
#[test]
fn test_decode_on_unrelated_commit_is_noop() {
    let temp_dir = setup_test_repo();
    let dir = temp_dir.path();
    fs::write(dir.join("a.txt"), "a\n").unwrap();
    git(dir, &["add", "a.txt"]);
    git(dir, &["commit", "-q", "-m", "unrelated change"]);
    let head = git(dir, &["rev-parse", "HEAD"]);
    let index = staged(dir);

    let store = store(dir);
    let outcome = Codec::new(&store, &CodecOptions::default())
        .unwrap()
        .decode()
        .unwrap();

    assert_eq!(outcome, DecodeOutcome::NotMarker);
    assert_eq!(git(dir, &["rev-parse", "HEAD"]), head);
    assert_eq!(staged(dir), index);
}

/// # Empty Index and Unborn Branch
///
/// Tests the no-op paths of both verbs.
///
/// ## Test Scenario
/// - Encodes in a repository without conflicts
/// - Decodes in a freshly initialized repository
///
/// ## Expected Outcome
/// - NothingToEncode and NotMarker; no commit created
#[test]
fn test_noop_paths() {
    let temp_dir = setup_test_repo();
    let dir = temp_dir.path();
    let head = git(dir, &["rev-parse", "HEAD"]);
    let store = store(dir);
    let codec = Codec::new(&store, &CodecOptions::default()).unwrap();
    assert_eq!(codec.encode().unwrap(), EncodeOutcome::NothingToEncode);
    assert_eq!(git(dir, &["rev-parse", "HEAD"]), head);

    let empty = TempDir::new().unwrap();
    git(empty.path(), &["init", "-q"]);
    let store = self::store(empty.path());
    let codec = Codec::new(&store, &CodecOptions::default()).unwrap();
    assert_eq!(codec.decode().unwrap(), DecodeOutcome::NotMarker);
}

/// # Working-tree Edits Survive the Cycle
///
/// Tests that working-tree content at a conflicted path that matches none
/// of the stages survives encode and decode, including edits made while
/// the marker commit is checked out.
///
/// ## Test Scenario
/// - Conflict on `f` with a half-resolved working-tree file
/// - Encode, edit `f`, decode
///
/// ## Expected Outcome
/// - Staged entries match the original conflict; `f` holds the latest edit
#[test]
fn test_worktree_edits_survive() {
    let temp_dir = setup_test_repo();
    let dir = temp_dir.path();
    stage_conflict(dir, "f", &[(2, "ours\n"), (3, "theirs\n")], "half resolved\n");
    let before = staged(dir);

    let store = store(dir);
    let codec = Codec::new(&store, &CodecOptions::default()).unwrap();
    codec.encode().unwrap();
    assert_eq!(
        fs::read_to_string(dir.join("f")).unwrap(),
        "half resolved\n"
    );

    fs::write(dir.join("f"), "edited on the other machine\n").unwrap();
    codec.decode().unwrap();

    assert_eq!(staged(dir), before);
    assert_eq!(
        fs::read_to_string(dir.join("f")).unwrap(),
        "edited on the other machine\n"
    );
}

/// # Ambiguous Path Is Refused
///
/// Tests that encode refuses to run when a tracked path already looks like
/// a bogus name.
///
/// ## Test Scenario
/// - Tracks `notes.1.TAG`, stages a conflict, encodes
///
/// ## Expected Outcome
/// - EncodingAmbiguity; index and HEAD unchanged
#[test]
fn test_ambiguous_path_is_refused() {
    let temp_dir = setup_test_repo();
    let dir = temp_dir.path();
    fs::write(dir.join(format!("notes.1.{TAG}")), "n\n").unwrap();
    git(dir, &["add", "--", &format!("notes.1.{TAG}")]);
    stage_conflict(dir, "f", &[(2, "ours\n"), (3, "theirs\n")], MARKERS);
    let index = staged(dir);
    let head = git(dir, &["rev-parse", "HEAD"]);

    let store = store(dir);
    let err = Codec::new(&store, &CodecOptions::default())
        .unwrap()
        .encode()
        .unwrap_err();

    assert!(matches!(err, CodecError::EncodingAmbiguity { .. }));
    assert_eq!(staged(dir), index);
    assert_eq!(git(dir, &["rev-parse", "HEAD"]), head);
}

/// # Failed Commit Is Unwound
///
/// Tests the unwind journal against git: a rejecting pre-commit hook makes
/// the marker commit fail after the index was rewritten.
///
/// ## Test Scenario
/// - Installs a pre-commit hook that exits 1 and enables hooks
/// - Encodes a conflict
///
/// ## Expected Outcome
/// - StoreFailure for `commit` with git's status
/// - The conflict is staged again and no bogus file is left behind
#[cfg(unix)]
#[test]
fn test_failed_commit_is_unwound() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = setup_test_repo();
    let dir = temp_dir.path();
    let hook = dir.join(".git/hooks/pre-commit");
    fs::create_dir_all(hook.parent().unwrap()).unwrap();
    fs::write(&hook, "#!/bin/sh\nexit 1\n").unwrap();
    fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();

    stage_conflict(dir, "f", &[(1, "base\n"), (2, "ours\n"), (3, "theirs\n")], MARKERS);
    let before = staged(dir);

    let store = GitCli::new(Repository::discover(dir, "git").unwrap(), "git", true);
    let err = Codec::new(&store, &CodecOptions::default())
        .unwrap()
        .encode()
        .unwrap_err();

    match err {
        CodecError::StoreFailure { operation, code, .. } => {
            assert_eq!(operation, "commit");
            assert_ne!(code, 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(staged(dir), before);
    assert_eq!(head_message(dir), "initial");
    assert!(!dir.join(format!("f.1.{TAG}")).exists());
    assert_eq!(fs::read_to_string(dir.join("f")).unwrap(), MARKERS);
    assert_eq!(store.list_unmerged().unwrap().len(), 3);
}

/// # Paths That Are Not UTF-8
///
/// Tests a repository whose tracked and conflicted paths hold Latin-1
/// bytes.
///
/// ## Test Scenario
/// - Commits `caf\xe9.txt`, stages a two-way conflict on `na\xefve.txt`
/// - Encodes, then decodes
///
/// ## Expected Outcome
/// - Bogus files carry the raw path bytes
/// - Decode restores the exact staged entries and working-tree content
#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_paths_round_trip() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp_dir = setup_test_repo();
    let dir = temp_dir.path();
    let tracked = OsStr::from_bytes(b"caf\xe9.txt");
    fs::write(dir.join(tracked), "menu\n").unwrap();
    let status = Command::new("git")
        .current_dir(dir)
        .arg("add")
        .arg("--")
        .arg(tracked)
        .status()
        .unwrap();
    assert!(status.success());
    git(dir, &["commit", "-q", "-m", "latin-1 file"]);

    let conflicted: &[u8] = b"na\xefve.txt";
    let mut info = Vec::new();
    for (stage, content) in [(2, "ours\n"), (3, "theirs\n")] {
        let hash = hash_blob(dir, content);
        info.extend_from_slice(format!("100644 {hash} {stage}\t").as_bytes());
        info.extend_from_slice(conflicted);
        info.push(0);
    }
    git_stdin(dir, &["update-index", "-z", "--index-info"], &info);
    fs::write(dir.join(OsStr::from_bytes(conflicted)), MARKERS).unwrap();
    let before = staged(dir);

    let store = store(dir);
    let codec = Codec::new(&store, &CodecOptions::default()).unwrap();
    assert!(matches!(
        codec.encode().unwrap(),
        EncodeOutcome::Encoded { records: 2, .. }
    ));
    let mut bogus = conflicted.to_vec();
    bogus.extend_from_slice(format!(".3.{TAG}").as_bytes());
    assert_eq!(
        fs::read_to_string(dir.join(OsStr::from_bytes(&bogus))).unwrap(),
        "theirs\n"
    );

    assert!(matches!(
        codec.decode().unwrap(),
        DecodeOutcome::Decoded { records: 2, .. }
    ));
    assert_eq!(staged(dir), before);
    assert_eq!(
        fs::read_to_string(dir.join(OsStr::from_bytes(conflicted))).unwrap(),
        MARKERS
    );
    assert_eq!(fs::read_to_string(dir.join(tracked)).unwrap(), "menu\n");
    assert!(!dir.join(OsStr::from_bytes(&bogus)).exists());
}

/// # Conflict on a Path Absent From HEAD and the Working Tree
///
/// Tests an add/add conflict whose file was deleted before encoding.
///
/// ## Test Scenario
/// - Stages `new` at stages 2 and 3, removes the working-tree file
/// - Encodes, then decodes
///
/// ## Expected Outcome
/// - The marker commit holds the bogus paths and no `new`
/// - Decode restores both stages and leaves `new` absent on disk
#[test]
fn test_conflict_without_file_or_history() {
    let temp_dir = setup_test_repo();
    let dir = temp_dir.path();
    stage_conflict(dir, "new", &[(2, "ours\n"), (3, "theirs\n")], "gone\n");
    fs::remove_file(dir.join("new")).unwrap();
    let before = staged(dir);

    let store = store(dir);
    let codec = Codec::new(&store, &CodecOptions::default()).unwrap();
    codec.encode().unwrap();

    assert_eq!(head_message(dir), MARKER_MESSAGE);
    let tree = git(dir, &["ls-tree", "-r", "--name-only", "HEAD"]);
    assert_eq!(
        tree.lines().collect::<Vec<_>>(),
        vec![
            "README.md".to_string(),
            format!("new.2.{TAG}"),
            format!("new.3.{TAG}"),
        ]
    );

    codec.decode().unwrap();
    assert_eq!(staged(dir), before);
    assert_eq!(head_message(dir), "initial");
    assert!(!dir.join("new").exists());
}

fn run_bin(dir: &Path, config_home: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_git-unmerged"));
    cmd.current_dir(dir).env("XDG_CONFIG_HOME", config_home);
    for var in [
        "GIT_UNMERGED_TAG",
        "GIT_UNMERGED_ASIDE_SUFFIX",
        "GIT_UNMERGED_RUN_HOOKS",
        "GIT_UNMERGED_GIT",
        "GIT_UNMERGED_LOG_LEVEL",
        "GIT_UNMERGED_LOG_FILE",
    ] {
        cmd.env_remove(var);
    }
    cmd.args(args).output().unwrap()
}

/// # Binary: Anything Else Is a No-op
///
/// Tests that unknown verbs, extra arguments and unknown flags exit 0
/// without output, even outside a repository.
///
/// ## Test Scenario
/// - Runs the binary with several non-verb invocations in an empty dir
///
/// ## Expected Outcome
/// - Exit status 0 and empty stdout every time
#[test]
fn test_binary_ignores_other_invocations() {
    let config_home = TempDir::new().unwrap();
    let empty = TempDir::new().unwrap();

    for args in [
        vec![],
        vec!["status"],
        vec!["encode", "extra"],
        vec!["--no-such-flag", "encode"],
    ] {
        let output = run_bin(empty.path(), config_home.path(), &args);
        assert_eq!(output.status.code(), Some(0), "args: {args:?}");
        assert!(output.stdout.is_empty(), "args: {args:?}");
    }
}

/// # Binary: Git Failures Pass Through
///
/// Tests that a failing git command sets the exit status and prints a
/// diagnostic naming the operation.
///
/// ## Test Scenario
/// - Runs `encode` outside any repository
///
/// ## Expected Outcome
/// - git's non-zero status; stderr mentions rev-parse
#[test]
fn test_binary_reports_git_failure() {
    let config_home = TempDir::new().unwrap();
    let empty = TempDir::new().unwrap();

    let output = run_bin(empty.path(), config_home.path(), &["encode"]);
    assert_ne!(output.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rev-parse"), "stderr: {stderr}");
}

/// # Binary: Round Trip With JSON Output
///
/// Tests the full command line flow with a custom tag from git config.
///
/// ## Test Scenario
/// - Sets `unmerged.tag=SNAP` in the repository
/// - Runs `encode --output json` then `decode --output json`
///
/// ## Expected Outcome
/// - Bogus names use the configured tag
/// - JSON reports carry the outcomes; the conflict is restored
#[test]
fn test_binary_round_trip() {
    let config_home = TempDir::new().unwrap();
    let temp_dir = setup_test_repo();
    let dir = temp_dir.path();
    git(dir, &["config", "unmerged.tag", "SNAP"]);
    stage_conflict(dir, "f", &[(1, "base\n"), (2, "ours\n"), (3, "theirs\n")], MARKERS);
    let before = staged(dir);

    let output = run_bin(dir, config_home.path(), &["--output", "json", "encode"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"], "encoded");
    assert_eq!(report["bogus_paths"][0], "f.1.SNAP");
    assert!(dir.join("f.3.SNAP").exists());

    let output = run_bin(dir, config_home.path(), &["--output", "json", "decode"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"], "decoded");
    assert_eq!(report["records"], 3);

    assert_eq!(staged(dir), before);
    assert_eq!(head_message(dir), "initial");
}

/// # Binary: Ambiguity Exit Code
///
/// Tests the dedicated exit status for an ambiguous index.
///
/// ## Test Scenario
/// - Tracks `x.2.T` and encodes with `--tag T`
///
/// ## Expected Outcome
/// - Exit status 3; index untouched
#[test]
fn test_binary_ambiguity_exit_code() {
    let config_home = TempDir::new().unwrap();
    let temp_dir = setup_test_repo();
    let dir = temp_dir.path();
    fs::write(dir.join("x.2.T"), "x\n").unwrap();
    git(dir, &["add", "x.2.T"]);
    stage_conflict(dir, "f", &[(2, "ours\n"), (3, "theirs\n")], MARKERS);
    let before = staged(dir);

    let output = run_bin(dir, config_home.path(), &["--tag", "T", "encode"]);
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(staged(dir), before);
}

/// # Binary: Decode With Another Tag
///
/// Tests that a marker commit encoded under one tag is not discarded by a
/// decode running under another.
///
/// ## Test Scenario
/// - Encodes with `--tag OTHER`, decodes with the default tag
/// - Decodes again with `--tag OTHER`
///
/// ## Expected Outcome
/// - The first decode exits 3 and leaves HEAD and the index alone
/// - The second decode restores the conflict
#[test]
fn test_binary_decode_with_other_tag() {
    let config_home = TempDir::new().unwrap();
    let temp_dir = setup_test_repo();
    let dir = temp_dir.path();
    stage_conflict(dir, "f", &[(1, "base\n"), (2, "ours\n"), (3, "theirs\n")], MARKERS);
    let before = staged(dir);

    let output = run_bin(dir, config_home.path(), &["--tag", "OTHER", "encode"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let marker = git(dir, &["rev-parse", "HEAD"]);
    let encoded = staged(dir);

    let output = run_bin(dir, config_home.path(), &["decode"]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(TAG), "stderr: {stderr}");
    assert_eq!(git(dir, &["rev-parse", "HEAD"]), marker);
    assert_eq!(staged(dir), encoded);

    let output = run_bin(dir, config_home.path(), &["--tag", "OTHER", "decode"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(staged(dir), before);
    assert_eq!(head_message(dir), "initial");
}

#[test]
fn test_library_version() {
    let version = git_unmerged::VERSION;
    assert!(!version.is_empty());
    assert!(version.contains('.'));
}
