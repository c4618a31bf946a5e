//! The rebranch state machine.
//!
//! ```text
//! (none) ──start──▶ Picking ──conflict──▶ Conflicted
//!                     │  ▲                    │
//!                     │  └─────continue───────┘
//!                     │  ▲
//!                     │  └── continue (after a git failure)
//!                     ▼
//!                   Done ──finish──▶ (none)
//!
//! any active stage ──abort──▶ (none)
//! ```
//!
//! Each public method performs exactly one transition and returns. The
//! record is the only state carried between invocations; it is saved after
//! every processed commit and every stage change, before control returns.
//! The source branch is not touched until [`Rebranch::finish`].

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rebranch_git::{BranchName, CherryPickOutcome, GitError, GitRepo, InProgressOperation};

use crate::config::Config;
use crate::editor::Editor;
use crate::error::RebranchError;
use crate::preflight;
use crate::range;
use crate::record::{Action, CommitEntry, OperationRecord, RecordStore, Stage};
use crate::selection::{self, PICK_FILE_NAME};

/// Attempts at a free temp branch name before giving up.
const MAX_TEMP_NAME_ATTEMPTS: u32 = 100;

/// Current time as unix seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// One rebranch command's worth of collaborators.
///
/// User-facing progress goes to `out`; diagnostics go through `tracing`.
pub struct Rebranch<'a, W: Write> {
    git: &'a dyn GitRepo,
    store: &'a dyn RecordStore,
    editor: &'a dyn Editor,
    config: &'a Config,
    out: W,
    clock: fn() -> u64,
}

impl<'a, W: Write> Rebranch<'a, W> {
    /// Wire up an engine that writes progress to `out`.
    pub fn new(
        git: &'a dyn GitRepo,
        store: &'a dyn RecordStore,
        editor: &'a dyn Editor,
        config: &'a Config,
        out: W,
    ) -> Self {
        Self {
            git,
            store,
            editor,
            config,
            out,
            clock: unix_now,
        }
    }

    /// Replace the wall clock (used for timestamps and temp branch names).
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// Give back the output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    /// Start rebranching the current branch onto `base`.
    ///
    /// Lists the commits unique to the current branch, lets the user edit the
    /// pick list, then replays the selection onto a new temp branch cut from
    /// `base`. Returns [`RebranchError::Conflict`] if replay stops on a
    /// conflict; the operation is then resumable with
    /// [`continue_operation`](Self::continue_operation).
    pub fn start(&mut self, base: &BranchName) -> Result<(), RebranchError> {
        let source = preflight::check_start(self.git, self.store, base)?;

        let commits = range::resolve(self.git, base, &source)?;
        if commits.is_empty() {
            return Err(RebranchError::NothingToRebranch {
                source_branch: source.to_string(),
                base: base.to_string(),
            });
        }

        writeln!(
            self.out,
            "Found {} commits to rebranch from {source} onto {base}",
            commits.len()
        )?;
        for (i, commit) in commits.iter().enumerate() {
            writeln!(self.out, "  {}. {} {}", i + 1, commit.short_id(), commit.summary)?;
        }

        let plan = self.edit_pick_list(&commits)?;
        let selected = plan.iter().filter(|e| e.action == Action::Apply).count();
        writeln!(self.out, "Selected {selected} of {} commits to apply", plan.len())?;

        let base_tip = self
            .git
            .resolve_branch(base)?
            .ok_or_else(|| RebranchError::ReferenceNotFound {
                name: base.to_string(),
            })?;
        let temp = self.free_temp_branch()?;
        self.git.create_branch(&temp, base_tip)?;
        if let Err(e) = self.git.checkout(&temp) {
            self.discard_temp_branch(&temp);
            return Err(e.into());
        }

        let record = OperationRecord::new(source.clone(), base.clone(), temp.clone(), plan, self.now());
        if let Err(e) = self.store.save(&record) {
            // Nothing durable points at the temp branch yet; put HEAD back.
            if let Err(checkout_err) = self.git.checkout(&source) {
                tracing::warn!(error = %checkout_err, %source, "could not return to source branch");
            } else {
                self.discard_temp_branch(&temp);
            }
            return Err(e.into());
        }
        tracing::info!(%source, %base, %temp, entries = record.commit_plan.len(), "rebranch started");

        self.apply_loop(record)
    }

    /// Write the pick list, run the editor, and parse the result. The pick
    /// file is removed whatever the outcome.
    fn edit_pick_list(&mut self, commits: &[CommitEntry]) -> Result<Vec<CommitEntry>, RebranchError> {
        let path = self.git.git_dir().join(PICK_FILE_NAME);
        fs::write(&path, selection::render(commits))?;

        writeln!(self.out, "\nEdit the commit list and save to continue...")?;
        self.out.flush()?;

        let result = self.run_editor(&path, commits);
        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "could not remove pick file");
        }
        result
    }

    fn run_editor(&self, path: &Path, commits: &[CommitEntry]) -> Result<Vec<CommitEntry>, RebranchError> {
        self.editor.launch(path)?;
        let text = fs::read_to_string(path)?;
        Ok(selection::parse(&text, commits)?)
    }

    /// `<prefix><unix seconds>`, with `-2`, `-3`, ... appended if taken.
    fn free_temp_branch(&self) -> Result<BranchName, RebranchError> {
        let stem = format!("{}{}", self.config.temp_branch_prefix, self.now());
        for attempt in 1..=MAX_TEMP_NAME_ATTEMPTS {
            let candidate = if attempt == 1 {
                stem.clone()
            } else {
                format!("{stem}-{attempt}")
            };
            let name = BranchName::new(&candidate).map_err(|e| GitError::BackendError {
                message: e.to_string(),
            })?;
            if !self.git.branch_exists(&name)? {
                return Ok(name);
            }
        }
        Err(GitError::BackendError {
            message: format!("no free temp branch name starting with '{stem}'"),
        }
        .into())
    }

    fn discard_temp_branch(&self, temp: &BranchName) {
        if let Err(e) = self.git.delete_branch(temp) {
            tracing::warn!(%temp, error = %e, "could not delete temp branch");
        }
    }

    // -----------------------------------------------------------------------
    // apply loop
    // -----------------------------------------------------------------------

    /// Replay entries from the cursor to the end of the plan.
    fn apply_loop(&mut self, mut record: OperationRecord) -> Result<(), RebranchError> {
        while let Some(entry) = record.current_entry().cloned() {
            let index = record.cursor;
            match entry.action {
                Action::Skip => {
                    tracing::debug!(id = %entry.id, "skipping dropped commit");
                }
                Action::Apply => match self.git.cherry_pick(entry.id)? {
                    CherryPickOutcome::Applied => {
                        tracing::info!(id = %entry.id, index, "applied");
                    }
                    CherryPickOutcome::Conflicted => {
                        record.mark_conflicted(index, self.now());
                        self.store.save(&record)?;
                        tracing::info!(id = %entry.id, index, "replay paused on conflict");
                        return Err(RebranchError::Conflict {
                            id: entry.id,
                            short: entry.short_id(),
                            summary: entry.summary,
                        });
                    }
                },
            }
            record.mark_processed(index, self.now());
            self.store.save(&record)?;
        }

        record.mark_done(self.now());
        self.store.save(&record)?;
        tracing::info!(temp = %record.temp_branch, "all commits applied");

        writeln!(
            self.out,
            "Successfully applied {} commits to {}",
            record.selected_count(),
            record.temp_branch
        )?;
        writeln!(self.out, "Review the new branch history and run: rebranch --done")?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // continue / finish / abort
    // -----------------------------------------------------------------------

    /// Resume replay.
    ///
    /// After a conflict the user resolved and committed by hand, the
    /// conflicted entry is taken as done and replay continues with the next
    /// one. After a run that stopped on a git failure, replay retries the
    /// first unprocessed entry.
    pub fn continue_operation(&mut self) -> Result<(), RebranchError> {
        let mut record = preflight::check_continue(self.git, self.store)?;
        if record.stage == Stage::Conflicted {
            record.resume_after_conflict(self.now());
            self.store.save(&record)?;
        }
        tracing::info!(cursor = record.cursor, "rebranch resumed");
        self.apply_loop(record)
    }

    /// Replace the source branch with the temp branch and end the operation.
    pub fn finish(&mut self) -> Result<(), RebranchError> {
        let record = preflight::check_finish(self.git, self.store)?;
        let source = &record.source_branch;

        // A previous --done may have deleted the source before failing to rename.
        if self.git.branch_exists(source)? {
            self.git.delete_branch(source)?;
        } else {
            tracing::warn!(%source, "source branch already gone");
        }
        self.git.rename_branch(&record.temp_branch, source)?;
        self.store.clear()?;
        tracing::info!(%source, base = %record.base_branch, "rebranch finished");

        writeln!(
            self.out,
            "Successfully rebranched {source} onto {}",
            record.base_branch
        )?;
        Ok(())
    }

    /// Return to the source branch and throw the temp branch away.
    pub fn abort(&mut self) -> Result<(), RebranchError> {
        let record = preflight::check_abort(self.store)?;

        if self.git.in_progress_operation()? == Some(InProgressOperation::CherryPick) {
            self.git.abort_cherry_pick()?;
        }
        self.git.checkout(&record.source_branch)?;
        if let Err(e) = self.git.delete_branch(&record.temp_branch) {
            tracing::warn!(temp = %record.temp_branch, error = %e, "could not delete temp branch");
            writeln!(
                self.out,
                "Warning: failed to delete temp branch {}: {e}",
                record.temp_branch
            )?;
        }
        self.store.clear()?;
        tracing::info!(source = %record.source_branch, "rebranch aborted");

        writeln!(
            self.out,
            "Rebranch aborted; {} is unchanged",
            record.source_branch
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // status
    // -----------------------------------------------------------------------

    /// Print where the in-progress operation stands.
    pub fn status(&mut self) -> Result<(), RebranchError> {
        let record = preflight::check_status(self.store)?;
        let processed = record.cursor.min(record.commit_plan.len());

        writeln!(
            self.out,
            "Rebranching {} onto {}",
            record.source_branch, record.base_branch
        )?;
        writeln!(self.out, "  temp branch: {}", record.temp_branch)?;
        writeln!(self.out, "  stage:       {}", record.stage)?;
        writeln!(
            self.out,
            "  progress:    {processed} of {} entries processed",
            record.commit_plan.len()
        )?;
        writeln!(self.out)?;
        for (i, entry) in record.commit_plan.iter().enumerate() {
            let state = record.entry_state(i);
            writeln!(
                self.out,
                "  {:<10} {} {}",
                state.to_string(),
                entry.short_id(),
                entry.summary
            )?;
        }
        writeln!(self.out)?;
        writeln!(self.out, "Next: {}", next_step(&record))?;
        Ok(())
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }
}

fn next_step(record: &OperationRecord) -> &'static str {
    match record.stage {
        Stage::Conflicted => "resolve the conflict, commit, then run `rebranch --continue`",
        Stage::Done => "review the history, then run `rebranch --done`",
        Stage::Picking => {
            "the last run stopped early; run `rebranch --continue` to retry the next pending commit, or `rebranch --abort`"
        }
    }
}

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;
    use crate::selection::SelectionError;
    use crate::testing::{FakeRepo, MemoryStore, ScriptedEditor};
    use rebranch_git::GitOid;

    fn b(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    fn fixed_clock() -> u64 {
        1_700_000_000
    }

    const TEMP: &str = "rebranch-temp-1700000000";

    struct Fixture {
        _dir: tempfile::TempDir,
        repo: FakeRepo,
        store: MemoryStore,
        config: Config,
        commits: Vec<GitOid>,
    }

    /// `main` has a root commit plus one more; `feature` branches from root
    /// with three commits, each adding its own file. HEAD on feature.
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let repo = FakeRepo::with_git_dir(dir.path());
        let root = repo.commit_on("main", "root", &[("base.txt", "base")]);
        repo.branch_at("feature", root);
        let c1 = repo.commit_on("feature", "add one", &[("one.txt", "1")]);
        let c2 = repo.commit_on("feature", "add two", &[("two.txt", "2")]);
        let c3 = repo.commit_on("feature", "add three", &[("three.txt", "3")]);
        repo.commit_on("main", "trunk work", &[("trunk.txt", "t")]);
        repo.set_head("feature");
        Fixture {
            _dir: dir,
            repo,
            store: MemoryStore::new(),
            config: Config::default(),
            commits: vec![c1, c2, c3],
        }
    }

    fn run<F>(fx: &Fixture, editor: &ScriptedEditor, f: F) -> (Result<(), RebranchError>, String)
    where
        F: FnOnce(&mut Rebranch<'_, Vec<u8>>) -> Result<(), RebranchError>,
    {
        let mut engine =
            Rebranch::new(&fx.repo, &fx.store, editor, &fx.config, Vec::new()).with_clock(fixed_clock);
        let result = f(&mut engine);
        let out = String::from_utf8(engine.into_output()).unwrap();
        (result, out)
    }

    fn start(fx: &Fixture, editor: &ScriptedEditor) -> (Result<(), RebranchError>, String) {
        run(fx, editor, |e| e.start(&b("main")))
    }

    // -- start + finish --

    #[test]
    fn start_then_finish_replays_all_commits() {
        let fx = fixture();
        let editor = ScriptedEditor::keep();

        let (result, out) = start(&fx, &editor);
        result.unwrap();
        assert_eq!(editor.launches(), 1);
        assert!(out.contains("Found 3 commits to rebranch from feature onto main"));
        assert!(out.contains("Selected 3 of 3 commits to apply"));
        assert!(out.contains(&format!("Successfully applied 3 commits to {TEMP}")));

        let record = fx.store.record().unwrap();
        assert_eq!(record.stage, Stage::Done);
        assert_eq!(record.cursor, 3);
        assert_eq!(fx.repo.head_branch().as_deref(), Some(TEMP));
        // Source untouched until finish.
        assert_eq!(fx.repo.tip("feature"), fx.commits[2]);

        let (result, out) = run(&fx, &editor, |e| e.finish());
        result.unwrap();
        assert!(out.contains("Successfully rebranched feature onto main"));

        assert!(!fx.repo.has_branch(TEMP));
        assert!(fx.store.record().is_none());
        assert_eq!(fx.repo.head_branch().as_deref(), Some("feature"));
        assert_eq!(
            fx.repo.messages("feature"),
            vec!["root", "trunk work", "add one", "add two", "add three"]
        );
        assert_eq!(fx.repo.file("feature", "trunk.txt").as_deref(), Some("t"));
    }

    #[test]
    fn pick_file_is_removed_after_parsing() {
        let fx = fixture();
        let (result, _) = start(&fx, &ScriptedEditor::keep());
        result.unwrap();
        assert!(!fx.repo.git_dir().join(PICK_FILE_NAME).exists());
    }

    #[test]
    fn one_save_per_entry_then_done() {
        let fx = fixture();
        start(&fx, &ScriptedEditor::keep()).0.unwrap();
        let saves = fx.store.saves();
        let cursors: Vec<_> = saves.iter().map(|r| (r.cursor, r.stage)).collect();
        assert_eq!(
            cursors,
            vec![
                (0, Stage::Picking),
                (1, Stage::Picking),
                (2, Stage::Picking),
                (3, Stage::Picking),
                (3, Stage::Done),
            ]
        );
        assert!(saves.iter().all(|r| r.updated_at == fixed_clock()));
    }

    #[test]
    fn dropped_commit_is_left_out() {
        let fx = fixture();
        let editor = ScriptedEditor::drop_summaries(&["add two"]);
        let (result, out) = start(&fx, &editor);
        result.unwrap();
        assert!(out.contains("Selected 2 of 3 commits to apply"));
        run(&fx, &editor, |e| e.finish()).0.unwrap();

        assert_eq!(
            fx.repo.messages("feature"),
            vec!["root", "trunk work", "add one", "add three"]
        );
        assert_eq!(fx.repo.file("feature", "two.txt"), None);
        assert_eq!(fx.repo.file("feature", "three.txt").as_deref(), Some("3"));
        // Only the selected commits were picked.
        let picks: Vec<_> = fx
            .repo
            .ops()
            .into_iter()
            .filter(|op| op.starts_with("cherry-pick"))
            .collect();
        assert_eq!(picks.len(), 2);
    }

    #[test]
    fn reordered_list_replays_in_line_order() {
        let fx = fixture();
        let [c1, c2, c3] = [fx.commits[0], fx.commits[1], fx.commits[2]];
        let editor = ScriptedEditor::replace(&format!(
            "pick {}\npick {}\npick {}\n",
            c3.short(),
            c1.short(),
            c2.short()
        ));
        start(&fx, &editor).0.unwrap();
        run(&fx, &editor, |e| e.finish()).0.unwrap();
        assert_eq!(
            fx.repo.messages("feature"),
            vec!["root", "trunk work", "add three", "add one", "add two"]
        );
    }

    #[test]
    fn all_dropped_still_reaches_done() {
        let fx = fixture();
        let editor = ScriptedEditor::drop_summaries(&["add one", "add two", "add three"]);
        start(&fx, &editor).0.unwrap();
        assert_eq!(fx.store.record().unwrap().stage, Stage::Done);
        run(&fx, &editor, |e| e.finish()).0.unwrap();
        assert_eq!(fx.repo.messages("feature"), vec!["root", "trunk work"]);
    }

    // -- selection failures leave nothing behind --

    #[test]
    fn invalid_selection_creates_nothing() {
        let fx = fixture();
        let editor = ScriptedEditor::replace("squash abcdefg\n");
        let (result, _) = start(&fx, &editor);
        assert!(matches!(
            result,
            Err(RebranchError::Selection(SelectionError::InvalidAction { line: 1, .. }))
        ));
        assert!(fx.repo.ops().is_empty());
        assert!(fx.store.record().is_none());
        assert!(!fx.repo.git_dir().join(PICK_FILE_NAME).exists());
    }

    #[test]
    fn empty_selection_creates_nothing() {
        let fx = fixture();
        let (result, _) = start(&fx, &ScriptedEditor::replace("# nothing\n"));
        assert!(matches!(
            result,
            Err(RebranchError::Selection(SelectionError::EmptySelection))
        ));
        assert!(fx.repo.ops().is_empty());
        assert!(fx.store.record().is_none());
    }

    #[test]
    fn failing_editor_creates_nothing() {
        let fx = fixture();
        let (result, _) = start(&fx, &ScriptedEditor::failing());
        assert!(matches!(result, Err(RebranchError::Editor(_))));
        assert!(fx.repo.ops().is_empty());
        assert!(!fx.repo.git_dir().join(PICK_FILE_NAME).exists());
    }

    #[test]
    fn nothing_to_rebranch() {
        let fx = fixture();
        let tip = fx.repo.tip("main");
        fx.repo.branch_at("stale", tip);
        fx.repo.set_head("stale");
        let editor = ScriptedEditor::keep();
        let (result, _) = start(&fx, &editor);
        assert!(matches!(result, Err(RebranchError::NothingToRebranch { .. })));
        assert_eq!(editor.launches(), 0);
    }

    // -- conflicts --

    fn conflicting_fixture() -> Fixture {
        let fx = fixture();
        fx.repo.conflict_on(fx.commits[1]);
        fx
    }

    #[test]
    fn conflict_on_second_commit_pauses_there() {
        let fx = conflicting_fixture();
        let (result, _) = start(&fx, &ScriptedEditor::keep());
        match result {
            Err(RebranchError::Conflict { id, summary, .. }) => {
                assert_eq!(id, fx.commits[1]);
                assert_eq!(summary, "add two");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        let record = fx.store.record().unwrap();
        assert_eq!(record.stage, Stage::Conflicted);
        assert_eq!(record.cursor, 1);
        assert_eq!(fx.repo.tip("feature"), fx.commits[2]);
    }

    #[test]
    fn continue_after_resolving_reaches_done() {
        let fx = conflicting_fixture();
        let editor = ScriptedEditor::keep();
        assert!(start(&fx, &editor).0.is_err());

        fx.repo.resolve_conflict();
        let (result, out) = run(&fx, &editor, |e| e.continue_operation());
        result.unwrap();
        assert!(out.contains("Successfully applied 3 commits"));

        let record = fx.store.record().unwrap();
        assert_eq!(record.stage, Stage::Done);
        assert_eq!(record.cursor, 3);

        run(&fx, &editor, |e| e.finish()).0.unwrap();
        assert_eq!(
            fx.repo.messages("feature"),
            vec!["root", "trunk work", "add one", "add two", "add three"]
        );
        // The resolved commit was not picked a second time.
        let picks = fx
            .repo
            .ops()
            .iter()
            .filter(|op| op.starts_with("cherry-pick"))
            .count();
        assert_eq!(picks, 3);
    }

    #[test]
    fn continue_while_still_conflicted_is_refused() {
        let fx = conflicting_fixture();
        let editor = ScriptedEditor::keep();
        assert!(start(&fx, &editor).0.is_err());
        let (result, _) = run(&fx, &editor, |e| e.continue_operation());
        assert!(matches!(result, Err(RebranchError::Validation(_))));
        assert_eq!(fx.store.record().unwrap().cursor, 1);
    }

    #[test]
    fn finish_while_conflicted_is_refused() {
        let fx = conflicting_fixture();
        let editor = ScriptedEditor::keep();
        assert!(start(&fx, &editor).0.is_err());
        fx.repo.resolve_conflict();
        let (result, _) = run(&fx, &editor, |e| e.finish());
        assert!(matches!(result, Err(RebranchError::Validation(_))));
        assert!(fx.repo.has_branch("feature"));
    }

    #[test]
    fn backend_failure_keeps_last_saved_record() {
        let fx = fixture();
        fx.repo.break_pick(fx.commits[2]);
        let (result, _) = start(&fx, &ScriptedEditor::keep());
        assert!(matches!(result, Err(RebranchError::Backend(_))));
        let record = fx.store.record().unwrap();
        assert_eq!(record.stage, Stage::Picking);
        assert_eq!(record.cursor, 2);
    }

    #[test]
    fn continue_after_backend_failure_retries_pending_entry() {
        let fx = fixture();
        let editor = ScriptedEditor::keep();
        fx.repo.break_pick(fx.commits[2]);
        assert!(matches!(
            start(&fx, &editor).0,
            Err(RebranchError::Backend(_))
        ));

        let (result, out) = run(&fx, &editor, |e| e.status());
        result.unwrap();
        assert!(out.contains("rebranch --continue"));

        fx.repo.repair_pick(fx.commits[2]);
        let (result, out) = run(&fx, &editor, |e| e.continue_operation());
        result.unwrap();
        assert!(out.contains("Successfully applied 3 commits"));
        let record = fx.store.record().unwrap();
        assert_eq!(record.stage, Stage::Done);
        assert_eq!(record.cursor, 3);
        assert_eq!(
            fx.repo.messages(TEMP),
            vec!["root", "trunk work", "add one", "add two", "add three"]
        );
        assert_eq!(editor.launches(), 1);
    }

    // -- abort --

    #[test]
    fn abort_after_backend_failure_restores_source() {
        let fx = fixture();
        let editor = ScriptedEditor::keep();
        fx.repo.break_pick(fx.commits[1]);
        assert!(matches!(
            start(&fx, &editor).0,
            Err(RebranchError::Backend(_))
        ));
        assert_eq!(fx.store.record().unwrap().stage, Stage::Picking);

        let (result, out) = run(&fx, &editor, |e| e.abort());
        result.unwrap();
        assert!(out.contains("Rebranch aborted; feature is unchanged"));
        assert_eq!(fx.repo.head_branch().as_deref(), Some("feature"));
        assert_eq!(fx.repo.tip("feature"), fx.commits[2]);
        assert!(!fx.repo.has_branch(TEMP));
        assert!(fx.store.record().is_none());
    }

    #[test]
    fn abort_while_conflicted_restores_source() {
        let fx = conflicting_fixture();
        let editor = ScriptedEditor::keep();
        assert!(start(&fx, &editor).0.is_err());
        assert!(fx.repo.has_pending_pick());

        let (result, out) = run(&fx, &editor, |e| e.abort());
        result.unwrap();
        assert!(out.contains("Rebranch aborted"));
        assert!(!fx.repo.has_pending_pick());
        assert_eq!(fx.repo.head_branch().as_deref(), Some("feature"));
        assert_eq!(fx.repo.tip("feature"), fx.commits[2]);
        assert!(!fx.repo.has_branch(TEMP));
        assert!(fx.store.record().is_none());
    }

    #[test]
    fn abort_when_done_restores_source() {
        let fx = fixture();
        let editor = ScriptedEditor::keep();
        start(&fx, &editor).0.unwrap();
        run(&fx, &editor, |e| e.abort()).0.unwrap();
        assert_eq!(fx.repo.head_branch().as_deref(), Some("feature"));
        assert_eq!(fx.repo.tip("feature"), fx.commits[2]);
        assert!(!fx.repo.has_branch(TEMP));
    }

    #[test]
    fn abort_tolerates_temp_branch_delete_failure() {
        let fx = fixture();
        let editor = ScriptedEditor::keep();
        start(&fx, &editor).0.unwrap();
        fx.repo.fail_delete(TEMP);
        let (result, out) = run(&fx, &editor, |e| e.abort());
        result.unwrap();
        assert!(out.contains(&format!("Warning: failed to delete temp branch {TEMP}")));
        assert!(fx.store.record().is_none());
        assert_eq!(fx.repo.head_branch().as_deref(), Some("feature"));
    }

    // -- guards through the engine --

    #[test]
    fn start_while_in_progress_mutates_nothing() {
        let fx = conflicting_fixture();
        let editor = ScriptedEditor::keep();
        assert!(start(&fx, &editor).0.is_err());
        fx.repo.resolve_conflict();
        let ops_before = fx.repo.ops();
        let record_before = fx.store.record();

        let (result, _) = start(&fx, &editor);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("already in progress"), "{err}");
        assert_eq!(fx.repo.ops(), ops_before);
        assert_eq!(fx.store.record(), record_before);
        assert_eq!(editor.launches(), 1);
    }

    #[test]
    fn commands_without_record_report_no_operation() {
        let fx = fixture();
        let editor = ScriptedEditor::keep();
        for result in [
            run(&fx, &editor, |e| e.continue_operation()).0,
            run(&fx, &editor, |e| e.finish()).0,
            run(&fx, &editor, |e| e.abort()).0,
            run(&fx, &editor, |e| e.status()).0,
        ] {
            let err = result.unwrap_err();
            assert_eq!(err.to_string(), "no rebranch operation in progress");
        }
        assert!(fx.repo.ops().is_empty());
    }

    // -- finish edge cases --

    #[test]
    fn finish_retry_after_source_already_deleted() {
        let fx = fixture();
        let editor = ScriptedEditor::keep();
        start(&fx, &editor).0.unwrap();
        // Simulate a previous --done that deleted the source then died.
        fx.repo.delete_branch(&b("feature")).unwrap();
        run(&fx, &editor, |e| e.finish()).0.unwrap();
        assert_eq!(fx.repo.head_branch().as_deref(), Some("feature"));
        assert!(fx.store.record().is_none());
    }

    #[test]
    fn temp_name_collision_gets_suffix() {
        let fx = fixture();
        let tip = fx.repo.tip("main");
        fx.repo.branch_at(TEMP, tip);
        start(&fx, &ScriptedEditor::keep()).0.unwrap();
        let record = fx.store.record().unwrap();
        assert_eq!(record.temp_branch.as_str(), format!("{TEMP}-2"));
    }

    #[test]
    fn custom_prefix() {
        let mut fx = fixture();
        fx.config.temp_branch_prefix = "tmp/rb-".to_owned();
        start(&fx, &ScriptedEditor::keep()).0.unwrap();
        assert_eq!(
            fx.store.record().unwrap().temp_branch.as_str(),
            "tmp/rb-1700000000"
        );
    }

    // -- status --

    #[test]
    fn status_reports_progress() {
        let fx = conflicting_fixture();
        let editor = ScriptedEditor::keep();
        assert!(start(&fx, &editor).0.is_err());
        let (result, out) = run(&fx, &editor, |e| e.status());
        result.unwrap();
        assert!(out.contains("Rebranching feature onto main"));
        assert!(out.contains(&format!("temp branch: {TEMP}")));
        assert!(out.contains("stage:       conflicted"));
        assert!(out.contains("1 of 3 entries processed"));
        assert!(out.contains(&format!("applied    {} add one", fx.commits[0].short())));
        assert!(out.contains(&format!("conflicted {} add two", fx.commits[1].short())));
        assert!(out.contains(&format!("pending    {} add three", fx.commits[2].short())));
        assert!(out.contains("rebranch --continue"));
        // Status is read-only.
        assert_eq!(fx.store.record().unwrap().cursor, 1);
    }
}
