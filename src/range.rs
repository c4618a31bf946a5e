//! Commit range resolution: the commits on `head` that `base` lacks.

use std::collections::{HashMap, HashSet};

use rebranch_git::{BranchName, CommitInfo, GitOid, GitRepo};

use crate::error::RebranchError;
use crate::record::{Action, CommitEntry};

/// Commits reachable from `head` that are not ancestors of `base`, oldest
/// first.
///
/// Every candidate is tested on its own against the full ancestry of
/// `base`, so commits that reached `base` through a merge are excluded even
/// when history is not linear. The result is topologically ordered: each
/// commit comes after all of its parents in the set, first-parent history
/// ahead of merged-in branches. Merge commits are listed as `skip`, since
/// cherry-pick cannot replay them; everything else is `apply`.
pub fn resolve(
    git: &dyn GitRepo,
    base: &BranchName,
    head: &BranchName,
) -> Result<Vec<CommitEntry>, RebranchError> {
    let base_tip = tip(git, base)?;
    let head_tip = tip(git, head)?;

    let base_ancestry: HashSet<GitOid> = git.rev_walk(base_tip)?.into_iter().collect();
    let mut unique: HashMap<GitOid, CommitInfo> = HashMap::new();
    for oid in git.rev_walk(head_tip)? {
        if !base_ancestry.contains(&oid) {
            unique.insert(oid, git.read_commit(oid)?);
        }
    }

    let order = parents_first(head_tip, &unique);
    tracing::debug!(%base, %head, count = order.len(), "resolved commit range");

    Ok(order
        .into_iter()
        .filter_map(|oid| unique.remove(&oid))
        .map(|info| {
            let action = if info.parents.len() > 1 {
                Action::Skip
            } else {
                Action::Apply
            };
            CommitEntry::new(info.oid, info.summary(), action)
        })
        .collect())
}

/// Depth-first post-order from `head` over `commits`: parents before
/// children, earlier parents before later ones.
fn parents_first(head: GitOid, commits: &HashMap<GitOid, CommitInfo>) -> Vec<GitOid> {
    let mut order = Vec::with_capacity(commits.len());
    let mut visited = HashSet::new();
    // (commit, index of the next parent to visit)
    let mut stack: Vec<(GitOid, usize)> = Vec::new();
    if commits.contains_key(&head) {
        visited.insert(head);
        stack.push((head, 0));
    }

    while let Some(&(oid, next)) = stack.last() {
        let parent = commits
            .get(&oid)
            .and_then(|info| info.parents.get(next))
            .copied();
        match parent {
            Some(parent) => {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                if commits.contains_key(&parent) && visited.insert(parent) {
                    stack.push((parent, 0));
                }
            }
            None => {
                stack.pop();
                order.push(oid);
            }
        }
    }
    order
}

fn tip(git: &dyn GitRepo, name: &BranchName) -> Result<GitOid, RebranchError> {
    git.resolve_branch(name)?
        .ok_or_else(|| RebranchError::ReferenceNotFound {
            name: name.to_string(),
        })
}
