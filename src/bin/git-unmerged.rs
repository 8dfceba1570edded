use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};

use git_unmerged::{
    Args, Config,
    logging::{init_logging, parse_early_log_config},
    runner,
};

fn main() -> Result<ExitCode> {
    let raw: Vec<String> = std::env::args_os()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    let _log_guard = init_logging(parse_early_log_config(&raw));

    let Some(args) = Args::parse_lenient() else {
        return Ok(ExitCode::SUCCESS);
    };

    if args.create_config {
        let path = Config::create_sample_config().context("Failed to create sample config")?;
        println!("Sample config at: {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let result = runner::run(&args, io::stdout().lock());
    if let Some(message) = &result.message {
        eprintln!("git-unmerged: {message}");
    }
    Ok(result.exit_code.into())
}
