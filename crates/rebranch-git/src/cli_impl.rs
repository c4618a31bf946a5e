//! Working-tree mutations delegated to the `git` CLI.
//!
//! gix has no cherry-pick, and branch deletion/rename must keep the reflog
//! and `HEAD` symref consistent, so these go through `git` itself.

use std::process::Command;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::{BranchName, CherryPickOutcome, GitOid};

/// Exit code `git cherry-pick` uses when the pick stopped on a conflict.
const CHERRY_PICK_CONFLICT_EXIT: i32 = 1;

/// Captured result of a `git` invocation.
struct GitOutput {
    success: bool,
    exit_code: Option<i32>,
    stdout: String,
    stderr: String,
}

fn run_git(repo: &GixRepo, args: &[&str]) -> Result<GitOutput, GitError> {
    tracing::debug!(args = ?args, "running git");
    let output = Command::new("git")
        .args(args)
        .current_dir(&repo.workdir)
        .env("GIT_EDITOR", "true")
        .output()?;
    Ok(GitOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
    })
}

fn command_failed(args: &[&str], out: GitOutput) -> GitError {
    let stderr = if out.stderr.is_empty() {
        out.stdout
    } else {
        out.stderr
    };
    GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr,
        exit_code: out.exit_code,
    }
}

/// Run a git command, turning a non-zero exit into [`GitError::CommandFailed`].
fn git_ok(repo: &GixRepo, args: &[&str]) -> Result<(), GitError> {
    let out = run_git(repo, args)?;
    if out.success {
        Ok(())
    } else {
        Err(command_failed(args, out))
    }
}

pub fn checkout(repo: &GixRepo, name: &BranchName) -> Result<(), GitError> {
    git_ok(repo, &["checkout", "--quiet", name.as_str()])
}

pub fn delete_branch(repo: &GixRepo, name: &BranchName) -> Result<(), GitError> {
    git_ok(repo, &["branch", "-D", name.as_str()])
}

pub fn rename_branch(repo: &GixRepo, from: &BranchName, to: &BranchName) -> Result<(), GitError> {
    git_ok(repo, &["branch", "-m", from.as_str(), to.as_str()])
}

pub fn cherry_pick(repo: &GixRepo, commit: GitOid) -> Result<CherryPickOutcome, GitError> {
    let hex = commit.to_string();
    // A commit whose change is already on HEAD is kept as an empty commit
    // instead of stopping the pick the way a conflict does.
    let args = ["cherry-pick", "--keep-redundant-commits", hex.as_str()];
    let out = run_git(repo, &args)?;
    if out.success {
        return Ok(CherryPickOutcome::Applied);
    }
    if out.exit_code == Some(CHERRY_PICK_CONFLICT_EXIT) {
        tracing::info!(%commit, "cherry-pick stopped on a conflict");
        return Ok(CherryPickOutcome::Conflicted);
    }
    Err(command_failed(&args, out))
}

pub fn abort_cherry_pick(repo: &GixRepo) -> Result<(), GitError> {
    git_ok(repo, &["cherry-pick", "--abort"])
}
