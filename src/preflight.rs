//! Preconditions for each rebranch command.
//!
//! Every command runs its guard before touching anything. A guard either
//! returns what the command needs (the source branch for `start`, the loaded
//! record otherwise) or a [`ValidationError`] whose message says how to get
//! unstuck.

use std::fmt;

use rebranch_git::{BranchName, GitError, GitRepo, InProgressOperation};

use crate::error::RebranchError;
use crate::record::{OperationRecord, RecordStore, Stage};

/// The command a guard is protecting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// `rebranch <base>`
    Start,
    /// `rebranch --continue`
    Continue,
    /// `rebranch --done`
    Finish,
    /// `rebranch --abort`
    Abort,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Continue => write!(f, "--continue"),
            Self::Finish => write!(f, "--done"),
            Self::Abort => write!(f, "--abort"),
        }
    }
}

/// A precondition failed. Nothing has been changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// HEAD does not resolve to a commit.
    InvalidRepository {
        /// Why the repository is unusable.
        reason: String,
    },
    /// A rebranch is already in progress.
    AlreadyInProgress,
    /// Git itself is paused in another multi-step operation.
    ForeignOperation {
        /// Which operation.
        kind: InProgressOperation,
    },
    /// Tracked files have uncommitted changes.
    DirtyWorkingTree {
        /// The command that was refused.
        command: Command,
    },
    /// The requested base branch does not exist.
    BaseBranchMissing {
        /// The requested base.
        name: BranchName,
    },
    /// The current branch is the requested base.
    SameBranch {
        /// The branch name.
        name: BranchName,
    },
    /// HEAD is detached, so there is no branch to rebranch.
    DetachedHead,
    /// No rebranch is in progress.
    NoOperation,
    /// The in-progress rebranch is not at the stage the command needs.
    WrongStage {
        /// The command that was refused.
        command: Command,
        /// The record's stage.
        stage: Stage,
    },
    /// `--continue` or `--done` was run while not on the temp branch.
    NotOnTempBranch {
        /// The command that was refused.
        command: Command,
        /// The temp branch from the record.
        expected: BranchName,
        /// What HEAD points at.
        actual: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRepository { reason } => {
                write!(
                    f,
                    "not a usable git repository: {reason}\n  To fix: run rebranch inside a repository with at least one commit."
                )
            }
            Self::AlreadyInProgress => {
                write!(
                    f,
                    "a rebranch is already in progress.\n  To fix: finish or cancel it first:\n    rebranch --status     (see where it stopped)\n    rebranch --continue   (after resolving conflicts)\n    rebranch --done       (if all commits are applied)\n    rebranch --abort      (restore the original branch)"
                )
            }
            Self::ForeignOperation { kind } => {
                write!(
                    f,
                    "a git {kind} is in progress.\n  To fix: complete or abort it first (see `git status`), then retry."
                )
            }
            Self::DirtyWorkingTree { command } => match command {
                Command::Continue => write!(
                    f,
                    "working tree has uncommitted changes.\n  To fix: finish resolving the conflict and commit it:\n    git add <files>\n    git commit\n  Then run `rebranch --continue` again."
                ),
                _ => write!(
                    f,
                    "working tree has uncommitted changes.\n  To fix: commit or stash them first:\n    git stash\n  Then retry `rebranch {command}`."
                ),
            },
            Self::BaseBranchMissing { name } => {
                write!(
                    f,
                    "base branch '{name}' does not exist.\n  To fix: check the name, or list branches:\n    git branch -a"
                )
            }
            Self::SameBranch { name } => {
                write!(
                    f,
                    "current branch '{name}' is the base branch.\n  To fix: check out the branch you want to move, then retry:\n    git checkout <branch>"
                )
            }
            Self::DetachedHead => {
                write!(
                    f,
                    "HEAD is detached; there is no branch to rebranch.\n  To fix: check out a branch first:\n    git checkout <branch>"
                )
            }
            Self::NoOperation => write!(f, "no rebranch operation in progress"),
            Self::WrongStage { command, stage } => {
                let hint = match stage {
                    Stage::Picking => "the last run stopped before finishing; run `rebranch --continue` to retry the next pending commit, or `rebranch --abort`",
                    Stage::Conflicted => "resolve the conflict, commit, then run `rebranch --continue`",
                    Stage::Done => "all commits are applied; run `rebranch --done` to finish",
                };
                write!(
                    f,
                    "cannot run `rebranch {command}` while the rebranch is {stage}.\n  To fix: {hint}."
                )
            }
            Self::NotOnTempBranch {
                command,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "expected to be on temp branch '{expected}', but on {actual}.\n  To fix: switch back, then retry:\n    git checkout {expected}\n    rebranch {command}"
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Guard for `rebranch <base>`. Returns the branch to rebranch.
pub fn check_start(
    git: &dyn GitRepo,
    store: &dyn RecordStore,
    base: &BranchName,
) -> Result<BranchName, RebranchError> {
    check_repository(git)?;
    if store.exists()? {
        return Err(ValidationError::AlreadyInProgress.into());
    }
    if let Some(kind) = git.in_progress_operation()? {
        return Err(ValidationError::ForeignOperation { kind }.into());
    }
    check_clean(git, Command::Start)?;
    if !git.branch_exists(base)? {
        return Err(ValidationError::BaseBranchMissing { name: base.clone() }.into());
    }
    let current = current_branch(git)?;
    if &current == base {
        return Err(ValidationError::SameBranch { name: current }.into());
    }
    Ok(current)
}

/// Guard for `rebranch --continue`.
///
/// Accepts a conflicted record, and a picking record left behind when a
/// previous run stopped on a git failure. Either way HEAD must be on the
/// temp branch.
pub fn check_continue(
    git: &dyn GitRepo,
    store: &dyn RecordStore,
) -> Result<OperationRecord, RebranchError> {
    check_repository(git)?;
    let record = load(store)?;
    if record.stage == Stage::Done {
        return Err(ValidationError::WrongStage {
            command: Command::Continue,
            stage: record.stage,
        }
        .into());
    }
    check_clean(git, Command::Continue)?;
    // A pick resolved to nothing leaves git's own cherry-pick paused.
    if let Some(kind) = git.in_progress_operation()? {
        return Err(ValidationError::ForeignOperation { kind }.into());
    }
    check_on_temp_branch(git, &record, Command::Continue)?;
    Ok(record)
}

/// Guard for `rebranch --done`.
pub fn check_finish(
    git: &dyn GitRepo,
    store: &dyn RecordStore,
) -> Result<OperationRecord, RebranchError> {
    check_repository(git)?;
    let record = load(store)?;
    expect_stage(&record, Stage::Done, Command::Finish)?;
    check_on_temp_branch(git, &record, Command::Finish)?;
    check_clean(git, Command::Finish)?;
    Ok(record)
}

/// Guard for `rebranch --abort`. Only requires a record.
pub fn check_abort(store: &dyn RecordStore) -> Result<OperationRecord, RebranchError> {
    load(store)
}

/// Guard for `rebranch --status`.
pub fn check_status(store: &dyn RecordStore) -> Result<OperationRecord, RebranchError> {
    load(store)
}

fn check_repository(git: &dyn GitRepo) -> Result<(), ValidationError> {
    git.validate()
        .map_err(|e| ValidationError::InvalidRepository {
            reason: e.to_string(),
        })
}

fn check_clean(git: &dyn GitRepo, command: Command) -> Result<(), RebranchError> {
    if git.is_dirty()? {
        return Err(ValidationError::DirtyWorkingTree { command }.into());
    }
    Ok(())
}

fn current_branch(git: &dyn GitRepo) -> Result<BranchName, RebranchError> {
    match git.current_branch() {
        Ok(b) => Ok(b),
        Err(GitError::DetachedHead) => Err(ValidationError::DetachedHead.into()),
        Err(e) => Err(e.into()),
    }
}

fn load(store: &dyn RecordStore) -> Result<OperationRecord, RebranchError> {
    store
        .load()?
        .ok_or_else(|| ValidationError::NoOperation.into())
}

fn check_on_temp_branch(
    git: &dyn GitRepo,
    record: &OperationRecord,
    command: Command,
) -> Result<(), RebranchError> {
    let actual = match git.current_branch() {
        Ok(b) if b == record.temp_branch => return Ok(()),
        Ok(b) => format!("'{b}'"),
        Err(GitError::DetachedHead) => "a detached HEAD".to_owned(),
        Err(e) => return Err(e.into()),
    };
    Err(ValidationError::NotOnTempBranch {
        command,
        expected: record.temp_branch.clone(),
        actual,
    }
    .into())
}

fn expect_stage(
    record: &OperationRecord,
    stage: Stage,
    command: Command,
) -> Result<(), ValidationError> {
    if record.stage == stage {
        Ok(())
    } else {
        Err(ValidationError::WrongStage {
            command,
            stage: record.stage,
        })
    }
}
