//! gix-backed ref and HEAD operations.

use gix::refs::transaction::PreviousValue;

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::{BranchName, GitOid};

/// Convert a `GitOid` to a `gix::ObjectId`.
pub(crate) fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::from_bytes_or_panic(oid.as_bytes())
}

/// Convert a `gix::ObjectId` (or `&gix::oid`) to a `GitOid`.
pub(crate) fn from_gix_oid(oid: &gix::oid) -> GitOid {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(oid.as_bytes());
    GitOid::from_bytes(bytes)
}

pub fn validate(repo: &GixRepo) -> Result<(), GitError> {
    repo.repo
        .head_id()
        .map_err(|e| GitError::BackendError {
            message: format!("HEAD does not resolve to a commit: {e}"),
        })?;
    Ok(())
}

pub fn current_branch(repo: &GixRepo) -> Result<BranchName, GitError> {
    let name = repo
        .repo
        .head_name()
        .map_err(|e| GitError::BackendError {
            message: e.to_string(),
        })?
        .ok_or(GitError::DetachedHead)?;
    let full = name.as_bstr().to_string();
    let short = full.strip_prefix("refs/heads/").ok_or(GitError::DetachedHead)?;
    BranchName::new(short).map_err(|e| GitError::BackendError {
        message: e.to_string(),
    })
}

pub fn resolve_branch(repo: &GixRepo, name: &BranchName) -> Result<Option<GitOid>, GitError> {
    match repo.repo.try_find_reference(name.to_ref().as_str()) {
        Ok(Some(mut r)) => {
            let id = r
                .peel_to_id_in_place()
                .map_err(|e| GitError::BackendError {
                    message: e.to_string(),
                })?;
            Ok(Some(from_gix_oid(id.as_ref())))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(GitError::BackendError {
            message: e.to_string(),
        }),
    }
}

pub fn create_branch(repo: &GixRepo, name: &BranchName, target: GitOid) -> Result<(), GitError> {
    tracing::debug!(branch = %name, %target, "creating branch");
    repo.repo
        .reference(
            name.to_ref().as_str(),
            to_gix_oid(target),
            PreviousValue::MustNotExist,
            format!("rebranch: create {name}"),
        )
        .map_err(|e| GitError::BackendError {
            message: format!("create branch {name}: {e}"),
        })?;
    Ok(())
}
