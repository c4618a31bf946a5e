//! gix-backed dirty detection and in-progress operation detection.

use crate::error::GitError;
use crate::gix_repo::GixRepo;
use crate::types::InProgressOperation;

pub fn is_dirty(repo: &GixRepo) -> Result<bool, GitError> {
    repo.repo
        .is_dirty()
        .map_err(|e| GitError::BackendError {
            message: e.to_string(),
        })
}

/// Probe the git dir for the marker entries git leaves behind while a
/// multi-step operation is paused.
pub fn in_progress_operation(repo: &GixRepo) -> Result<Option<InProgressOperation>, GitError> {
    for (marker, kind) in InProgressOperation::MARKERS {
        let path = repo.git_dir.join(marker);
        match path.try_exists() {
            Ok(true) => {
                tracing::debug!(marker, "in-progress operation detected");
                return Ok(Some(*kind));
            }
            Ok(false) => {}
            Err(e) => return Err(GitError::IoError(e)),
        }
    }
    Ok(None)
}
