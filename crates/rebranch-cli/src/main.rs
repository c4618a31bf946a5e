use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};

use rebranch::preflight::ValidationError;
use rebranch::{CommandLock, Config, FileStore, Rebranch, RebranchError, SystemEditor};
use rebranch_git::{BranchName, GitRepo, GixRepo};

mod telemetry;

/// rebranch - move a branch's commits onto a new base, one cherry-pick at a time
///
/// Lists the commits unique to the current branch, lets you choose which to
/// keep, and replays them onto a temporary branch cut from the new base.
/// Nothing happens to your branch until `--done`; `--abort` throws the
/// attempt away at any point.
///
/// Typical flow:
///   rebranch main        # pick commits and replay them onto main
///   rebranch --continue  # after resolving and committing a conflict
///   rebranch --done      # replace your branch with the rebuilt one
#[derive(Parser)]
#[command(name = "rebranch", version, about, long_about)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["base", "continue_", "done", "abort", "status"])
))]
struct Cli {
    /// Branch to move the current branch's commits onto
    base: Option<BranchName>,

    /// Resume after resolving and committing a conflict
    #[arg(long = "continue")]
    continue_: bool,

    /// Replace the original branch with the rebuilt one
    #[arg(long)]
    done: bool,

    /// Throw the rebuilt branch away and return to the original
    #[arg(long)]
    abort: bool,

    /// Show the in-progress operation
    #[arg(long)]
    status: bool,
}

fn main() -> ExitCode {
    telemetry::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    let repo = GixRepo::open(&cwd).map_err(|e| {
        RebranchError::from(ValidationError::InvalidRepository {
            reason: e.to_string(),
        })
    })?;
    let git_dir = repo.git_dir().to_path_buf();

    let _lock = CommandLock::acquire(&git_dir)?;
    let config = Config::from_process_env(&git_dir).map_err(RebranchError::from)?;
    let store = FileStore::new(&git_dir);
    let editor = SystemEditor::new(config.editor.clone());

    let mut engine = Rebranch::new(&repo, &store, &editor, &config, io::stdout().lock());
    if let Some(base) = &cli.base {
        engine.start(base)?;
    } else if cli.continue_ {
        engine.continue_operation()?;
    } else if cli.done {
        engine.finish()?;
    } else if cli.abort {
        engine.abort()?;
    } else {
        engine.status()?;
    }
    Ok(())
}
