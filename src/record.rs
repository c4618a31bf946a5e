//! The persisted operation record and its on-disk store.
//!
//! The record is persisted to `<git-dir>/REBRANCH_STATE` as human-readable
//! JSON. Every write is atomic (write-to-temp + fsync + rename) so a crash
//! never leaves a half-written record behind. The file's presence is the
//! "rebranch in progress" signal.
//!
//! # Lifecycle
//!
//! ```text
//! start → Picking ⇄ Conflicted
//!            │
//!            └→ Done → (finish) record deleted
//! ```
//!
//! `--abort` deletes the record from any stage.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use rebranch_git::{BranchName, GitOid};

/// Schema version written into every record.
pub const RECORD_VERSION: u32 = 1;

/// File name of the record inside the git dir.
pub const STATE_FILE_NAME: &str = "REBRANCH_STATE";

const TMP_FILE_NAME: &str = ".REBRANCH_STATE.tmp";

// ---------------------------------------------------------------------------
// Stage / Action
// ---------------------------------------------------------------------------

/// Where the operation is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Commits are being replayed onto the temp branch.
    Picking,
    /// Replay stopped on a conflict the user must resolve.
    Conflicted,
    /// Every selected commit is on the temp branch; waiting for `--done`.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Picking => write!(f, "picking"),
            Self::Conflicted => write!(f, "conflicted"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// What to do with one commit of the plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Replay the commit.
    Apply,
    /// Leave the commit out.
    Skip,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

// ---------------------------------------------------------------------------
// CommitEntry
// ---------------------------------------------------------------------------

/// One commit in the replay plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    /// Full commit id.
    pub id: GitOid,
    /// First line of the commit message. Display only.
    pub summary: String,
    /// Fixed once the pick list is parsed.
    pub action: Action,
}

impl CommitEntry {
    /// Create a new entry.
    pub fn new(id: GitOid, summary: impl Into<String>, action: Action) -> Self {
        Self {
            id,
            summary: summary.into(),
            action,
        }
    }

    /// The abbreviated id used in the pick list.
    #[must_use]
    pub fn short_id(&self) -> String {
        self.id.short()
    }
}

/// Per-entry progress, derived from the cursor and stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    /// Replayed onto the temp branch.
    Applied,
    /// Dropped from the pick list.
    Skipped,
    /// Replay stopped here on a conflict.
    Conflicted,
    /// Not processed yet.
    Pending,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Skipped => write!(f, "skipped"),
            Self::Conflicted => write!(f, "conflicted"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

// ---------------------------------------------------------------------------
// OperationRecord
// ---------------------------------------------------------------------------

/// The single source of truth for an in-progress rebranch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Schema version; see [`RECORD_VERSION`].
    pub version: u32,
    /// The branch being rewritten.
    pub source_branch: BranchName,
    /// The branch being rebased onto.
    pub base_branch: BranchName,
    /// Scratch branch the commits are replayed onto.
    pub temp_branch: BranchName,
    /// Commits in replay order.
    pub commit_plan: Vec<CommitEntry>,
    /// Index of the next unprocessed entry.
    pub cursor: usize,
    /// Current stage.
    pub stage: Stage,
    /// Unix seconds when the operation started.
    pub started_at: u64,
    /// Unix seconds of the last persisted change.
    pub updated_at: u64,
}

impl OperationRecord {
    /// A fresh record at the start of replay: `Picking`, cursor 0.
    #[must_use]
    pub const fn new(
        source_branch: BranchName,
        base_branch: BranchName,
        temp_branch: BranchName,
        commit_plan: Vec<CommitEntry>,
        now: u64,
    ) -> Self {
        Self {
            version: RECORD_VERSION,
            source_branch,
            base_branch,
            temp_branch,
            commit_plan,
            cursor: 0,
            stage: Stage::Picking,
            started_at: now,
            updated_at: now,
        }
    }

    /// Check the schema version and that cursor and stage agree.
    ///
    /// - `cursor <= len(commit_plan)`
    /// - `Conflicted`: the cursor points at an `apply` entry
    /// - `Done`: the cursor is past the last entry
    pub fn check_consistency(&self) -> Result<(), RecordError> {
        if self.version != RECORD_VERSION {
            return Err(RecordError::UnsupportedVersion {
                found: self.version,
            });
        }
        let len = self.commit_plan.len();
        if self.commit_plan.is_empty() {
            return Err(RecordError::Inconsistent(
                "commit plan is empty".to_owned(),
            ));
        }
        if self.cursor > len {
            return Err(RecordError::Inconsistent(format!(
                "cursor {} is past the end of a {len}-entry plan",
                self.cursor
            )));
        }
        match self.stage {
            Stage::Picking => {}
            Stage::Conflicted => match self.commit_plan.get(self.cursor) {
                Some(entry) if entry.action == Action::Apply => {}
                Some(_) => {
                    return Err(RecordError::Inconsistent(format!(
                        "stage is conflicted but entry {} is a skipped commit",
                        self.cursor
                    )));
                }
                None => {
                    return Err(RecordError::Inconsistent(
                        "stage is conflicted but no entry is under the cursor".to_owned(),
                    ));
                }
            },
            Stage::Done => {
                if self.cursor != len {
                    return Err(RecordError::Inconsistent(format!(
                        "stage is done but cursor is {} of {len}",
                        self.cursor
                    )));
                }
            }
        }
        Ok(())
    }

    /// The entry under the cursor, if any.
    #[must_use]
    pub fn current_entry(&self) -> Option<&CommitEntry> {
        self.commit_plan.get(self.cursor)
    }

    /// Progress of entry `index`.
    #[must_use]
    pub fn entry_state(&self, index: usize) -> EntryState {
        match self.commit_plan.get(index) {
            Some(entry) if entry.action == Action::Skip => EntryState::Skipped,
            Some(_) if index < self.cursor => EntryState::Applied,
            Some(_) if index == self.cursor && self.stage == Stage::Conflicted => {
                EntryState::Conflicted
            }
            _ => EntryState::Pending,
        }
    }

    /// Number of entries that will be (or were) replayed.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.commit_plan
            .iter()
            .filter(|e| e.action == Action::Apply)
            .count()
    }

    /// Entry `index` was processed; move the cursor past it.
    pub const fn mark_processed(&mut self, index: usize, now: u64) {
        self.cursor = index + 1;
        self.updated_at = now;
    }

    /// Replay of entry `index` conflicted; park the cursor on it.
    pub const fn mark_conflicted(&mut self, index: usize, now: u64) {
        self.cursor = index;
        self.stage = Stage::Conflicted;
        self.updated_at = now;
    }

    /// Every entry was processed.
    pub fn mark_done(&mut self, now: u64) {
        self.cursor = self.commit_plan.len();
        self.stage = Stage::Done;
        self.updated_at = now;
    }

    /// The user resolved the conflicted entry by hand; step past it.
    pub const fn resume_after_conflict(&mut self, now: u64) {
        self.cursor += 1;
        self.stage = Stage::Picking;
        self.updated_at = now;
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, RecordError> {
        serde_json::to_string_pretty(self).map_err(|e| RecordError::Serialize(e.to_string()))
    }

    /// Deserialize from JSON and check consistency.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        let record: Self =
            serde_json::from_str(json).map_err(|e| RecordError::Deserialize(e.to_string()))?;
        record.check_consistency()?;
        Ok(record)
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Durable storage for the operation record.
pub trait RecordStore {
    /// Returns `true` if a record is present, without parsing it.
    fn exists(&self) -> Result<bool, RecordError>;

    /// Load the record, or `None` if no operation is in progress.
    fn load(&self) -> Result<Option<OperationRecord>, RecordError>;

    /// Persist `record`, replacing any previous one. Durable on return.
    fn save(&self, record: &OperationRecord) -> Result<(), RecordError>;

    /// Delete the record. Deleting an absent record is not an error.
    fn clear(&self) -> Result<(), RecordError>;
}

/// A [`RecordStore`] backed by `<git-dir>/REBRANCH_STATE`.
#[derive(Clone, Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store the record inside `git_dir`.
    #[must_use]
    pub fn new(git_dir: &Path) -> Self {
        Self {
            path: git_dir.join(STATE_FILE_NAME),
        }
    }

    /// Path of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, json: &str) -> Result<(), RecordError> {
        let dir = self.path.parent().ok_or_else(|| {
            RecordError::Io(format!("no parent directory for {}", self.path.display()))
        })?;

        // Same directory, so the rename stays on one filesystem.
        let tmp_path = dir.join(TMP_FILE_NAME);
        let mut file = fs::File::create(&tmp_path)
            .map_err(|e| RecordError::Io(format!("create {}: {e}", tmp_path.display())))?;
        file.write_all(json.as_bytes())
            .map_err(|e| RecordError::Io(format!("write {}: {e}", tmp_path.display())))?;
        file.sync_all()
            .map_err(|e| RecordError::Io(format!("fsync {}: {e}", tmp_path.display())))?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            RecordError::Io(format!(
                "rename {} → {}: {e}",
                tmp_path.display(),
                self.path.display()
            ))
        })
    }
}

impl RecordStore for FileStore {
    fn exists(&self) -> Result<bool, RecordError> {
        self.path
            .try_exists()
            .map_err(|e| RecordError::Io(format!("stat {}: {e}", self.path.display())))
    }

    fn load(&self) -> Result<Option<OperationRecord>, RecordError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RecordError::Io(format!(
                    "read {}: {e}",
                    self.path.display()
                )));
            }
        };
        OperationRecord::from_json(&contents)
            .map(Some)
            .map_err(|e| e.at(&self.path))
    }

    fn save(&self, record: &OperationRecord) -> Result<(), RecordError> {
        let json = record.to_json()?;
        self.write_atomic(&json)?;
        tracing::debug!(
            path = %self.path.display(),
            stage = %record.stage,
            cursor = record.cursor,
            "record saved"
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), RecordError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "record removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RecordError::Io(format!(
                "remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors reading, writing, or interpreting the operation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Serialization failed.
    Serialize(String),
    /// The file is not a valid record.
    Deserialize(String),
    /// The record was written by an incompatible version of rebranch.
    UnsupportedVersion {
        /// The version found in the file.
        found: u32,
    },
    /// The record parsed but its stage and cursor disagree.
    Inconsistent(String),
    /// I/O error.
    Io(String),
    /// Any of the above, located at a specific record file.
    At {
        /// The record file.
        path: PathBuf,
        /// The underlying problem.
        source: Box<Self>,
    },
}

impl RecordError {
    fn at(self, path: &Path) -> Self {
        Self::At {
            path: path.to_owned(),
            source: Box::new(self),
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize(msg) => write!(f, "record serialize error: {msg}"),
            Self::Deserialize(msg) => write!(f, "record is not valid JSON: {msg}"),
            Self::UnsupportedVersion { found } => write!(
                f,
                "record version {found} is not supported (expected {RECORD_VERSION})"
            ),
            Self::Inconsistent(msg) => write!(f, "record is inconsistent: {msg}"),
            Self::Io(msg) => write!(f, "record I/O error: {msg}"),
            Self::At { path, source } => write!(
                f,
                "{source}\n  File: {}\n  To fix: inspect the file. If the operation cannot be recovered, delete it and check out your original branch:\n    rm {}\n    git checkout <branch>",
                path.display(),
                path.display()
            ),
        }
    }
}

impl std::error::Error for RecordError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn oid(n: u8) -> GitOid {
        GitOid::from_bytes([n; 20])
    }

    fn branch(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    fn plan(actions: &[Action]) -> Vec<CommitEntry> {
        actions
            .iter()
            .enumerate()
            .map(|(i, a)| CommitEntry::new(oid(i as u8 + 1), format!("commit {i}"), *a))
            .collect()
    }

    fn record(actions: &[Action]) -> OperationRecord {
        OperationRecord::new(
            branch("feature"),
            branch("main"),
            branch("rebranch-temp-100"),
            plan(actions),
            100,
        )
    }

    // -- Stage / Action --

    #[test]
    fn stage_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Stage::Conflicted).unwrap(),
            "\"conflicted\""
        );
        assert_eq!(serde_json::to_string(&Action::Skip).unwrap(), "\"skip\"");
        assert_eq!(Stage::Picking.to_string(), "picking");
    }

    // -- OperationRecord --

    #[test]
    fn new_record_starts_picking_at_zero() {
        let r = record(&[Action::Apply, Action::Apply]);
        assert_eq!(r.version, RECORD_VERSION);
        assert_eq!(r.stage, Stage::Picking);
        assert_eq!(r.cursor, 0);
        assert_eq!(r.started_at, 100);
        r.check_consistency().unwrap();
    }

    #[test]
    fn transitions_move_cursor() {
        let mut r = record(&[Action::Apply, Action::Apply, Action::Apply]);
        r.mark_processed(0, 101);
        assert_eq!(r.cursor, 1);
        r.mark_conflicted(1, 102);
        assert_eq!(r.cursor, 1);
        assert_eq!(r.stage, Stage::Conflicted);
        assert_eq!(r.entry_state(1), EntryState::Conflicted);
        r.resume_after_conflict(103);
        assert_eq!(r.cursor, 2);
        assert_eq!(r.stage, Stage::Picking);
        r.mark_processed(2, 104);
        r.mark_done(105);
        assert_eq!(r.cursor, 3);
        assert_eq!(r.stage, Stage::Done);
        assert_eq!(r.updated_at, 105);
        assert_eq!(r.started_at, 100);
        r.check_consistency().unwrap();
    }

    #[test]
    fn entry_states() {
        let mut r = record(&[Action::Apply, Action::Skip, Action::Apply]);
        r.mark_processed(0, 1);
        r.mark_processed(1, 1);
        assert_eq!(r.entry_state(0), EntryState::Applied);
        assert_eq!(r.entry_state(1), EntryState::Skipped);
        assert_eq!(r.entry_state(2), EntryState::Pending);
        assert_eq!(r.selected_count(), 2);
    }

    #[test]
    fn rejects_cursor_past_end() {
        let mut r = record(&[Action::Apply]);
        r.cursor = 2;
        assert!(matches!(
            r.check_consistency(),
            Err(RecordError::Inconsistent(_))
        ));
    }

    #[test]
    fn rejects_conflicted_without_entry() {
        let mut r = record(&[Action::Apply]);
        r.cursor = 1;
        r.stage = Stage::Conflicted;
        assert!(r.check_consistency().is_err());
    }

    #[test]
    fn rejects_conflicted_on_skipped_entry() {
        let mut r = record(&[Action::Skip, Action::Apply]);
        r.stage = Stage::Conflicted;
        assert!(r.check_consistency().is_err());
    }

    #[test]
    fn rejects_done_before_end() {
        let mut r = record(&[Action::Apply, Action::Apply]);
        r.cursor = 1;
        r.stage = Stage::Done;
        assert!(r.check_consistency().is_err());
    }

    #[test]
    fn rejects_unknown_version() {
        let mut r = record(&[Action::Apply]);
        r.version = 99;
        let json = r.to_json().unwrap();
        assert_eq!(
            OperationRecord::from_json(&json),
            Err(RecordError::UnsupportedVersion { found: 99 })
        );
    }

    #[test]
    fn json_uses_full_ids_and_branch_names() {
        let r = record(&[Action::Apply]);
        let json = r.to_json().unwrap();
        assert!(json.contains(&"01".repeat(20)));
        assert!(json.contains("\"source_branch\": \"feature\""));
        assert!(json.contains("\"stage\": \"picking\""));
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(matches!(
            OperationRecord::from_json("{ not json"),
            Err(RecordError::Deserialize(_))
        ));
    }

    // -- FileStore --

    #[test]
    fn file_store_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(!store.exists().unwrap());
        assert_eq!(store.load().unwrap(), None);

        let r = record(&[Action::Apply, Action::Skip]);
        store.save(&r).unwrap();
        assert!(store.exists().unwrap());
        assert_eq!(store.path(), dir.path().join(STATE_FILE_NAME));
        assert_eq!(store.load().unwrap(), Some(r));
        assert!(!dir.path().join(TMP_FILE_NAME).exists());

        store.clear().unwrap();
        assert!(!store.exists().unwrap());
        store.clear().unwrap();
    }

    #[test]
    fn file_store_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let mut r = record(&[Action::Apply, Action::Apply]);
        store.save(&r).unwrap();
        r.mark_processed(0, 200);
        store.save(&r).unwrap();
        assert_eq!(store.load().unwrap().unwrap().cursor, 1);
    }

    #[test]
    fn file_store_reports_corrupt_file_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        fs::write(store.path(), "garbage").unwrap();
        assert!(store.exists().unwrap());
        let err = store.load().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("not valid JSON"), "{msg}");
        assert!(msg.contains(STATE_FILE_NAME), "{msg}");
        assert!(msg.contains("To fix"), "{msg}");
    }

    // -- Invariants under arbitrary replay --

    fn arb_actions() -> impl Strategy<Value = Vec<Action>> {
        prop::collection::vec(
            prop_oneof![Just(Action::Apply), Just(Action::Skip)],
            1..12,
        )
    }

    proptest! {
        #[test]
        fn replay_keeps_record_consistent(
            actions in arb_actions(),
            conflicts in prop::collection::vec(any::<bool>(), 12),
        ) {
            let mut r = record(&actions);
            let mut now = 100;
            let mut last_cursor = 0;
            while r.stage != Stage::Done {
                let i = r.cursor;
                if i == r.commit_plan.len() {
                    r.mark_done(now);
                } else if r.commit_plan[i].action == Action::Apply
                    && conflicts[i]
                    && r.stage == Stage::Picking
                {
                    r.mark_conflicted(i, now);
                    prop_assert!(r.check_consistency().is_ok());
                    r.resume_after_conflict(now);
                } else {
                    r.mark_processed(i, now);
                }
                now += 1;
                prop_assert!(r.cursor >= last_cursor);
                last_cursor = r.cursor;
                prop_assert!(r.check_consistency().is_ok());
                let back = OperationRecord::from_json(&r.to_json().unwrap()).unwrap();
                prop_assert_eq!(&back, &r);
            }
            prop_assert_eq!(r.cursor, actions.len());
        }
    }
}
