//! The [`GitRepo`] trait: the single abstraction boundary between rebranch and git.
//!
//! The workflow engine interacts with git exclusively through this trait. The
//! trait is object-safe so callers can use `&dyn GitRepo`.
//!
//! | Group        | Methods                                                     |
//! |-------------|-------------------------------------------------------------|
//! | Repository   | `validate`, `git_dir`                                       |
//! | Branches     | `current_branch`, `branch_exists`, `resolve_branch`         |
//! | History      | `rev_walk`, `read_commit`                                   |
//! | Branch edits | `create_branch`, `delete_branch`, `rename_branch`           |
//! | Working tree | `checkout`, `cherry_pick`, `abort_cherry_pick`, `is_dirty`  |
//! | Operations   | `in_progress_operation`                                     |

use std::path::Path;

use crate::error::GitError;
use crate::types::{BranchName, CherryPickOutcome, CommitInfo, GitOid, InProgressOperation};

/// The git abstraction trait used by the rebranch engine.
///
/// Implementations may be backed by gix plus the git CLI ([`GixRepo`](crate::GixRepo))
/// or by a test double.
///
/// # Object safety
///
/// This trait is object-safe: no generic methods, no `Self` in return position
/// outside of `Result`. Callers may use `&dyn GitRepo` or `Box<dyn GitRepo>`.
pub trait GitRepo {
    // -----------------------------------------------------------------------
    // Repository
    // -----------------------------------------------------------------------

    /// Check that the repository is structurally usable: HEAD must resolve to
    /// a commit.
    ///
    /// Replaces: `git rev-parse --verify HEAD`.
    fn validate(&self) -> Result<(), GitError>;

    /// The repository's private metadata directory (`.git`).
    fn git_dir(&self) -> &Path;

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// The branch HEAD points at.
    ///
    /// Returns [`GitError::DetachedHead`] when HEAD is not symbolic.
    ///
    /// Replaces: `git symbolic-ref --short HEAD`.
    fn current_branch(&self) -> Result<BranchName, GitError>;

    /// Returns `true` if `refs/heads/<name>` exists.
    fn branch_exists(&self, name: &BranchName) -> Result<bool, GitError> {
        Ok(self.resolve_branch(name)?.is_some())
    }

    /// Resolve a local branch to the commit it points at, or `None` if the
    /// branch does not exist.
    ///
    /// Replaces: `git rev-parse --verify refs/heads/<name>`.
    fn resolve_branch(&self, name: &BranchName) -> Result<Option<GitOid>, GitError>;

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Every commit reachable from `head` (including `head`), each exactly
    /// once, in traversal order starting at `head`.
    ///
    /// Replaces: `git rev-list <head>`.
    fn rev_walk(&self, head: GitOid) -> Result<Vec<GitOid>, GitError>;

    /// Read a commit object's metadata.
    ///
    /// Replaces: `git log -1 --format=... <oid>`.
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError>;

    // -----------------------------------------------------------------------
    // Branch edits
    // -----------------------------------------------------------------------

    /// Create `refs/heads/<name>` pointing at `target`. Fails if the branch
    /// already exists.
    ///
    /// Replaces: `git branch <name> <target>`.
    fn create_branch(&self, name: &BranchName, target: GitOid) -> Result<(), GitError>;

    /// Force-delete a local branch.
    ///
    /// Replaces: `git branch -D <name>`.
    fn delete_branch(&self, name: &BranchName) -> Result<(), GitError>;

    /// Rename a local branch (including the checked-out one).
    ///
    /// Replaces: `git branch -m <from> <to>`.
    fn rename_branch(&self, from: &BranchName, to: &BranchName) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Working tree
    // -----------------------------------------------------------------------

    /// Switch the working tree and HEAD to `name`.
    ///
    /// Replaces: `git checkout <name>`.
    fn checkout(&self, name: &BranchName) -> Result<(), GitError>;

    /// Replay `commit` on top of HEAD.
    ///
    /// A conflicting replay is not an error: it returns
    /// [`CherryPickOutcome::Conflicted`] and leaves the conflict in the working
    /// tree for the user to resolve. Any other failure is an error.
    ///
    /// Replaces: `git cherry-pick <commit>`.
    fn cherry_pick(&self, commit: GitOid) -> Result<CherryPickOutcome, GitError>;

    /// Discard a paused cherry-pick, restoring the pre-pick HEAD and index.
    ///
    /// Replaces: `git cherry-pick --abort`.
    fn abort_cherry_pick(&self) -> Result<(), GitError>;

    /// Returns `true` if the working tree or index has uncommitted changes to
    /// tracked files.
    ///
    /// Replaces: `git diff --quiet && git diff --cached --quiet` (exit code check).
    fn is_dirty(&self) -> Result<bool, GitError>;

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Report a paused git-native operation (merge, rebase, cherry-pick,
    /// revert), if any.
    fn in_progress_operation(&self) -> Result<Option<InProgressOperation>, GitError>;
}
