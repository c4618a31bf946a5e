//! gix-backed history traversal and commit reads.

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::refs_impl::{from_gix_oid, to_gix_oid};
use crate::types::{CommitInfo, GitOid};

pub fn rev_walk(repo: &GixRepo, head: GitOid) -> Result<Vec<GitOid>, GitError> {
    let walk = repo
        .repo
        .rev_walk([to_gix_oid(head)])
        .all()
        .map_err(|e| GitError::BackendError {
            message: e.to_string(),
        })?;

    let mut oids = Vec::new();
    for info in walk {
        let info = info.map_err(|e| GitError::BackendError {
            message: e.to_string(),
        })?;
        oids.push(from_gix_oid(&info.id));
    }
    Ok(oids)
}

pub fn read_commit(repo: &GixRepo, oid: GitOid) -> Result<CommitInfo, GitError> {
    let commit = repo
        .repo
        .find_commit(to_gix_oid(oid))
        .map_err(|e| GitError::NotFound {
            message: format!("commit {oid}: {e}"),
        })?;

    let decoded = commit.decode().map_err(|e| GitError::BackendError {
        message: format!("failed to decode commit {oid}: {e}"),
    })?;

    let parents = decoded.parents().map(|p| from_gix_oid(&p)).collect();
    let message = decoded.message.to_string();
    let author_sig = decoded.author();
    let author = format!("{} <{}>", author_sig.name, author_sig.email);

    Ok(CommitInfo {
        oid,
        parents,
        message,
        author,
    })
}
