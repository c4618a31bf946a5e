//! The gix-backed implementation of [`GitRepo`].

use std::path::{Path, PathBuf};

use crate::error::GitError;
use crate::repo::GitRepo;
use crate::types::{BranchName, CherryPickOutcome, CommitInfo, GitOid, InProgressOperation};

/// A [`GitRepo`] implementation backed by [gix](https://github.com/GitoxideLabs/gitoxide).
///
/// Reads (refs, history, status) go through gix. Operations that rewrite the
/// working tree (checkout, cherry-pick) and branch deletion/rename shell out
/// to the `git` CLI, which owns the reflog and index bookkeeping for them.
///
/// Construct via [`GixRepo::open`].
pub struct GixRepo {
    pub(crate) repo: gix::Repository,
    pub(crate) workdir: PathBuf,
    pub(crate) git_dir: PathBuf,
}

impl GixRepo {
    /// Open the git repository at or above `path`.
    ///
    /// Bare repositories are rejected: rebranch needs a working tree.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = gix::discover(path).map_err(|e| GitError::BackendError {
            message: format!("not a git repository ({}): {e}", path.display()),
        })?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| GitError::BackendError {
                message: "repository has no working tree (bare repository)".to_owned(),
            })?;
        let git_dir = repo.git_dir().to_path_buf();
        Ok(Self {
            repo,
            workdir,
            git_dir,
        })
    }

    /// The root of the working tree.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl GitRepo for GixRepo {
    // === Repository ===
    fn validate(&self) -> Result<(), GitError> {
        crate::refs_impl::validate(self)
    }

    fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    // === Branches ===
    fn current_branch(&self) -> Result<BranchName, GitError> {
        crate::refs_impl::current_branch(self)
    }

    fn resolve_branch(&self, name: &BranchName) -> Result<Option<GitOid>, GitError> {
        crate::refs_impl::resolve_branch(self, name)
    }

    // === History ===
    fn rev_walk(&self, head: GitOid) -> Result<Vec<GitOid>, GitError> {
        crate::objects_impl::rev_walk(self, head)
    }

    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError> {
        crate::objects_impl::read_commit(self, oid)
    }

    // === Branch edits ===
    fn create_branch(&self, name: &BranchName, target: GitOid) -> Result<(), GitError> {
        crate::refs_impl::create_branch(self, name, target)
    }

    fn delete_branch(&self, name: &BranchName) -> Result<(), GitError> {
        crate::cli_impl::delete_branch(self, name)
    }

    fn rename_branch(&self, from: &BranchName, to: &BranchName) -> Result<(), GitError> {
        crate::cli_impl::rename_branch(self, from, to)
    }

    // === Working tree ===
    fn checkout(&self, name: &BranchName) -> Result<(), GitError> {
        crate::cli_impl::checkout(self, name)
    }

    fn cherry_pick(&self, commit: GitOid) -> Result<CherryPickOutcome, GitError> {
        crate::cli_impl::cherry_pick(self, commit)
    }

    fn abort_cherry_pick(&self) -> Result<(), GitError> {
        crate::cli_impl::abort_cherry_pick(self)
    }

    fn is_dirty(&self) -> Result<bool, GitError> {
        crate::status_impl::is_dirty(self)
    }

    // === Operations ===
    fn in_progress_operation(&self) -> Result<Option<InProgressOperation>, GitError> {
        crate::status_impl::in_progress_operation(self)
    }
}
