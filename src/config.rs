//! Runtime configuration.
//!
//! Built once at process start from, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. `EDITOR`
//! 3. `<git-dir>/rebranch.toml`
//! 4. `REBRANCH_EDITOR`
//!
//! A missing file means defaults. Unknown keys are rejected.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use rebranch_git::BranchName;

/// File name of the optional config file inside the git dir.
pub const CONFIG_FILE_NAME: &str = "rebranch.toml";

/// Editor used when nothing else is configured.
pub const DEFAULT_EDITOR: &str = "vi";

/// Prefix of generated temp branch names.
pub const DEFAULT_TEMP_BRANCH_PREFIX: &str = "rebranch-temp-";

/// Resolved configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Editor command for the pick list, split on whitespace when run.
    pub editor: String,
    /// Prefix for the temp branch; a unix timestamp is appended.
    pub temp_branch_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            editor: DEFAULT_EDITOR.to_owned(),
            temp_branch_prefix: DEFAULT_TEMP_BRANCH_PREFIX.to_owned(),
        }
    }
}

/// Contents of `rebranch.toml`. Every key is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Editor command.
    #[serde(default)]
    pub editor: Option<String>,
    /// Temp branch prefix.
    #[serde(default)]
    pub temp_branch_prefix: Option<String>,
}

impl FileConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML or unknown fields.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })
    }

    /// Load `path`, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }
}

impl Config {
    /// Resolve configuration for the repository at `git_dir`, reading
    /// environment variables through `env`.
    pub fn load(
        git_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let path = git_dir.join(CONFIG_FILE_NAME);
        let file = FileConfig::load(&path)?;
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();
        if let Some(editor) = non_empty("EDITOR") {
            config.editor = editor;
        }
        if let Some(editor) = file.editor {
            config.editor = editor;
        }
        if let Some(editor) = non_empty("REBRANCH_EDITOR") {
            config.editor = editor;
        }
        if let Some(prefix) = file.temp_branch_prefix {
            config.temp_branch_prefix = prefix;
        }

        config.validate().map_err(|message| ConfigError {
            path: Some(path),
            message,
        })?;
        tracing::debug!(editor = %config.editor, prefix = %config.temp_branch_prefix, "config loaded");
        Ok(config)
    }

    /// [`Config::load`] against the process environment.
    pub fn from_process_env(git_dir: &Path) -> Result<Self, ConfigError> {
        Self::load(git_dir, |key| std::env::var(key).ok())
    }

    fn validate(&self) -> Result<(), String> {
        if self.editor.trim().is_empty() {
            return Err("editor must not be empty".to_owned());
        }
        BranchName::new(&format!("{}0", self.temp_branch_prefix))
            .map(|_| ())
            .map_err(|e| format!("temp_branch_prefix does not make a valid branch name: {e}"))
    }
}

/// A configuration error with enough context to fix it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigError {
    /// The file that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(
                f,
                "configuration error in '{}': {}\n  To fix: edit the config file and correct the issue.",
                p.display(),
                self.message
            )
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
