//! Launching the user's editor on the pick list.

use std::path::Path;
use std::process::Command;

/// Opens a file for the user to edit and blocks until they are done.
pub trait Editor {
    /// Edit `path` in place. Returns once the editor exits.
    fn launch(&self, path: &Path) -> Result<(), EditorError>;
}

/// Errors launching or running the editor.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The configured editor command is empty.
    #[error("no editor configured.\n  To fix: set EDITOR or REBRANCH_EDITOR, e.g. `export EDITOR=vim`.")]
    NotConfigured,

    /// The editor could not be started.
    #[error("failed to start editor '{program}': {source}")]
    Spawn {
        /// The program that was run.
        program: String,
        /// Spawn failure.
        #[source]
        source: std::io::Error,
    },

    /// The editor exited unsuccessfully. Nothing was changed.
    #[error("editor '{command}' exited with {}; nothing was changed", status_text(.code))]
    Failed {
        /// The full editor command.
        command: String,
        /// Exit code, `None` if killed by a signal.
        code: Option<i32>,
    },
}

fn status_text(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_owned(), |c| format!("status {c}"))
}

/// The editor named by configuration, run as a child process with the
/// terminal attached.
///
/// The command is split on whitespace, so `code --wait` runs `code` with
/// `--wait` before the file path.
#[derive(Clone, Debug)]
pub struct SystemEditor {
    command: String,
}

impl SystemEditor {
    /// Use `command` (e.g. `vi`, `code --wait`).
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// The configured command line.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Editor for SystemEditor {
    fn launch(&self, path: &Path) -> Result<(), EditorError> {
        let mut words = self.command.split_whitespace();
        let program = words.next().ok_or(EditorError::NotConfigured)?;
        tracing::debug!(editor = %self.command, path = %path.display(), "launching editor");

        let status = Command::new(program)
            .args(words)
            .arg(path)
            .status()
            .map_err(|source| EditorError::Spawn {
                program: program.to_owned(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(EditorError::Failed {
                command: self.command.clone(),
                code: status.code(),
            })
        }
    }
}
