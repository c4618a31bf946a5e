//! Error types for git operations.
//!
//! [`GitError`] is the single error type returned by all [`GitRepo`](crate::GitRepo) trait
//! methods. It uses rich enum variants so callers can match on specific failure
//! modes (missing ref, detached HEAD, failed git command) without parsing
//! error messages.

use thiserror::Error;

/// Errors returned by [`GitRepo`](crate::GitRepo) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A requested object, ref, or path was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// HEAD does not point at a branch.
    #[error("HEAD is not pointing to a branch (detached HEAD state)")]
    DetachedHead,

    /// An OID string could not be parsed or was otherwise invalid.
    #[error("invalid OID `{value}`: {reason}")]
    InvalidOid {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// An I/O error occurred (file system, process spawn, etc.).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A `git` subprocess exited unsuccessfully.
    #[error("`{command}` failed{}: {stderr}", exit_suffix(.exit_code))]
    CommandFailed {
        /// The command line that was run (e.g. `"git checkout main"`).
        command: String,
        /// Captured stderr (and stdout, when stderr was empty).
        stderr: String,
        /// Process exit code, `None` if killed by a signal.
        exit_code: Option<i32>,
    },

    /// The underlying git backend (gix) returned an unclassified error.
    ///
    /// This is the catch-all for errors that don't fit other variants. The
    /// `message` should include enough context to diagnose the failure.
    #[error("git backend error: {message}")]
    BackendError {
        /// Freeform error description from the backend.
        message: String,
    },
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit code {c})")).unwrap_or_default()
}
