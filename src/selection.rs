//! The editable pick list.
//!
//! [`render`] turns the resolved commits into the text the user edits;
//! [`parse`] turns the edited text back into a replay plan. The format is
//! line-oriented:
//!
//! ```text
//! pick 1a2b3c4 add parser
//! d    5d6e7f8 debug logging
//! ```
//!
//! Only the first two fields of a line matter. The summary after the id is
//! informational and always taken from the original commit.

use std::collections::HashMap;

use crate::record::{Action, CommitEntry};

/// File name of the pick list inside the git dir.
pub const PICK_FILE_NAME: &str = "REBRANCH_PICK";

/// Comment block written above the commit lines.
pub const HEADER: &str = "\
# Rebranch pick list: choose the commits to replay onto the new base.
# Commands:
#  pick, p = apply this commit
#  drop, d = skip this commit
#
# Commits are replayed top to bottom. Lines starting with # are ignored.
# Merge commits start as drop: cherry-pick cannot replay them.
";

/// Errors in an edited pick list. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// The first field is not a known action.
    #[error("line {line}: invalid action '{token}' (must be 'pick', 'p', 'drop', or 'd')")]
    InvalidAction {
        /// Line number.
        line: usize,
        /// The unrecognized action.
        token: String,
    },

    /// The line has fewer than two fields.
    #[error("line {line}: expected '<action> <commit>'")]
    MalformedLine {
        /// Line number.
        line: usize,
    },

    /// The id does not name any commit in the original list.
    #[error("line {line}: unknown commit '{id}'")]
    UnknownCommit {
        /// Line number.
        line: usize,
        /// The id as written.
        id: String,
    },

    /// The id names more than one commit in the original list.
    #[error("line {line}: commit '{id}' is ambiguous")]
    AmbiguousCommit {
        /// Line number.
        line: usize,
        /// The id as written.
        id: String,
    },

    /// No commit lines remained after editing.
    #[error("no commits selected; nothing was changed")]
    EmptySelection,
}

/// Render `commits` as an editable pick list, each line starting with the
/// entry's current action.
#[must_use]
pub fn render(commits: &[CommitEntry]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for commit in commits {
        out.push_str(match commit.action {
            Action::Apply => "pick ",
            Action::Skip => "drop ",
        });
        out.push_str(&commit.short_id());
        out.push(' ');
        out.push_str(&commit.summary);
        out.push('\n');
    }
    out
}

/// Parse an edited pick list against the commits it was rendered from.
///
/// Entries come back in line order, with id and summary taken from
/// `original` and the action from the line.
pub fn parse(text: &str, original: &[CommitEntry]) -> Result<Vec<CommitEntry>, SelectionError> {
    let mut by_short: HashMap<String, Vec<&CommitEntry>> = HashMap::new();
    for entry in original {
        by_short.entry(entry.short_id()).or_default().push(entry);
    }

    let mut selected = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let (Some(action), Some(id)) = (fields.next(), fields.next()) else {
            return Err(SelectionError::MalformedLine { line });
        };
        let action = parse_action(action).ok_or_else(|| SelectionError::InvalidAction {
            line,
            token: action.to_owned(),
        })?;

        let short = truncate_id(id);
        match by_short.get(short).map(Vec::as_slice) {
            Some([entry]) => selected.push(CommitEntry::new(entry.id, entry.summary.clone(), action)),
            Some([_, _, ..]) => {
                return Err(SelectionError::AmbiguousCommit {
                    line,
                    id: id.to_owned(),
                });
            }
            _ => {
                return Err(SelectionError::UnknownCommit {
                    line,
                    id: id.to_owned(),
                });
            }
        }
    }

    if selected.is_empty() {
        return Err(SelectionError::EmptySelection);
    }
    Ok(selected)
}

fn parse_action(token: &str) -> Option<Action> {
    match token {
        "pick" | "p" => Some(Action::Apply),
        "drop" | "d" => Some(Action::Skip),
        _ => None,
    }
}

/// The id as it is matched: its first 7 characters.
fn truncate_id(id: &str) -> &str {
    id.char_indices()
        .nth(rebranch_git::GitOid::SHORT_LEN)
        .map_or(id, |(end, _)| &id[..end])
}
