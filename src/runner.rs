//! Runs one invocation: resolve configuration, bind the codec to the
//! repository, execute the verb and report.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::cli::{Args, Verb};
use crate::codec::Codec;
use crate::config::{Config, Settings};
use crate::error::{CodecError, ConfigError};
use crate::exit::ExitCode;
use crate::output::OutputWriter;
use crate::store::{GitCli, Repository};

/// Result of an invocation.
#[derive(Debug)]
pub struct RunResult {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Diagnostic to print on stderr.
    pub message: Option<String>,
}

impl RunResult {
    pub fn success() -> Self {
        Self {
            exit_code: ExitCode::Success,
            message: None,
        }
    }

    pub fn error(code: ExitCode, message: impl Into<String>) -> Self {
        Self {
            exit_code: code,
            message: Some(message.into()),
        }
    }

    fn from_codec(verb: Verb, err: &CodecError) -> Self {
        Self::error(err.exit_code(), format!("{verb}: {err}"))
    }

    fn from_config(err: &ConfigError) -> Self {
        Self::error(ExitCode::GeneralError, format!("configuration: {err}"))
    }

    pub fn is_success(&self) -> bool {
        matches!(self.exit_code, ExitCode::Success)
    }
}

/// Executes the verb named by `args`, writing its report to `out`.
///
/// Invocations without a recognized verb succeed without touching anything.
pub fn run<W: Write>(args: &Args, out: W) -> RunResult {
    let Some(verb) = args.verb() else {
        debug!(words = ?args.verb, "no verb, nothing to do");
        return RunResult::success();
    };

    let start = match &args.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    let (settings, repo) = match prepare(args, &start) {
        Ok(prepared) => prepared,
        Err(PrepareError::Config(err)) => return RunResult::from_config(&err),
        Err(PrepareError::Codec(err)) => return RunResult::from_codec(verb, &err),
    };
    info!(
        %verb,
        root = %repo.root().display(),
        tag = %settings.tag,
        "running"
    );

    let store = GitCli::new(repo, settings.git.clone(), settings.run_hooks);
    let codec = match Codec::new(&store, &settings.codec_options()) {
        Ok(codec) => codec,
        Err(err) => return RunResult::from_codec(verb, &err),
    };

    let mut output = OutputWriter::new(out, args.output);
    let reported = match verb {
        Verb::Encode => codec.encode().map(|o| output.write_encode(&o)),
        Verb::Decode => codec.decode().map(|o| output.write_decode(&o)),
    };

    match reported {
        Ok(Ok(())) => RunResult::success(),
        Ok(Err(io)) => RunResult::error(
            ExitCode::GeneralError,
            format!("{verb}: failed to write report: {io}"),
        ),
        Err(err) => {
            error!(%verb, error = %err, "operation failed");
            RunResult::from_codec(verb, &err)
        }
    }
}

enum PrepareError {
    Config(ConfigError),
    Codec(CodecError),
}

impl From<ConfigError> for PrepareError {
    fn from(err: ConfigError) -> Self {
        PrepareError::Config(err)
    }
}

impl From<CodecError> for PrepareError {
    fn from(err: CodecError) -> Self {
        PrepareError::Codec(err)
    }
}

/// Resolves settings and discovers the repository.
///
/// The git executable is resolved first without the repository's own
/// configuration, since reading that configuration needs git.
fn prepare(args: &Args, start: &Path) -> Result<(Settings, Repository), PrepareError> {
    let file = Config::load_from_file()?;
    let env = Config::load_from_env();
    let cli = Config::from_args(args);

    let outer = Config::default()
        .merge(file.clone())
        .merge(env.clone())
        .merge(cli.clone())
        .resolve()?;
    let repo = Repository::discover(start, &outer.git)?;

    let settings = Config::default()
        .merge(file)
        .merge(Config::load_from_git_config(repo.root(), &outer.git))
        .merge(env)
        .merge(cli)
        .resolve()?;
    debug!(?settings, "resolved settings");

    Ok((settings, repo))
}
