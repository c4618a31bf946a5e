//! Top-level error type for rebranch commands.
//!
//! Every command returns [`RebranchError`]. Component errors keep their own
//! types ([`ValidationError`], [`SelectionError`], [`RecordError`], ...) and
//! are wrapped here so the binary can print a single message.

use std::path::PathBuf;

use rebranch_git::{GitError, GitOid};

use crate::config::ConfigError;
use crate::editor::EditorError;
use crate::preflight::ValidationError;
use crate::record::RecordError;
use crate::selection::SelectionError;

/// Unified error type for rebranch operations.
#[derive(Debug, thiserror::Error)]
pub enum RebranchError {
    /// A precondition for the requested command failed. Nothing was changed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A branch name given on the command line does not resolve.
    #[error("branch '{name}' not found.\n  To fix: check the name with `git branch --list`.")]
    ReferenceNotFound {
        /// The unresolvable name.
        name: String,
    },

    /// Replaying a commit stopped on a conflict. The record was saved first.
    #[error(
        "conflict while applying {short} \"{summary}\".\n  To fix: resolve the conflicts, stage the files, commit, then run:\n    rebranch --continue\n  Or give up and restore the original branch:\n    rebranch --abort"
    )]
    Conflict {
        /// The commit whose replay conflicted.
        id: GitOid,
        /// Abbreviated form of `id`, for display.
        short: String,
        /// First line of the commit message.
        summary: String,
    },

    /// The edited pick list could not be used.
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// The current branch has no commits that are not already on the base.
    #[error("nothing to rebranch: every commit on '{source_branch}' is already on '{base}'")]
    NothingToRebranch {
        /// The branch that was being rebranched.
        source_branch: String,
        /// The requested base.
        base: String,
    },

    /// A git operation failed for a reason other than a conflict.
    #[error("git: {0}")]
    Backend(#[from] GitError),

    /// The persisted operation record could not be read or written.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// The pick-list editor could not be run.
    #[error(transparent)]
    Editor(#[from] EditorError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Another rebranch command holds the repository lock.
    #[error(
        "another rebranch command is running in this repository (lock: {}).\n  To fix: wait for it to finish, then retry.",
        path.display()
    )]
    Locked {
        /// The lock file that is held.
        path: PathBuf,
    },

    /// Filesystem error outside the record store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
