//! In-memory test doubles for the rebranch engine.
//!
//! [`FakeRepo`] models just enough of git for the workflow: a commit graph
//! whose commits carry whole-file snapshots, local branches, HEAD, a dirty
//! flag, and a cherry-pick that conflicts when a file it touches changed
//! underneath it. Failures can be injected per commit or per branch.
//! [`MemoryStore`] keeps the record in memory and remembers every save;
//! [`ScriptedEditor`] rewrites the pick list with a closure.
//!
//! Built for unit tests, and for other crates with the `testing` feature.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use rebranch_git::{
    BranchName, CherryPickOutcome, CommitInfo, GitError, GitOid, GitRepo, InProgressOperation,
};

use crate::editor::{Editor, EditorError};
use crate::record::{OperationRecord, RecordError, RecordStore};

type Tree = BTreeMap<String, String>;

#[derive(Clone, Debug)]
struct FakeCommit {
    parents: Vec<GitOid>,
    message: String,
    tree: Tree,
    /// `(path, content before, content after)` relative to the first parent.
    changes: Vec<(String, Option<String>, String)>,
    seq: u16,
}

#[derive(Clone, Debug)]
enum Head {
    Branch(BranchName),
    Detached(GitOid),
}

#[derive(Debug)]
struct State {
    commits: HashMap<GitOid, FakeCommit>,
    branches: BTreeMap<BranchName, GitOid>,
    head: Head,
    next_seq: u16,
    dirty: bool,
    foreign: Option<InProgressOperation>,
    pending_pick: Option<GitOid>,
    forced_conflicts: HashSet<GitOid>,
    broken_picks: HashSet<GitOid>,
    failing_deletes: HashSet<BranchName>,
    ops: Vec<String>,
}

/// An in-memory [`GitRepo`].
#[derive(Debug)]
pub struct FakeRepo {
    state: RefCell<State>,
    git_dir: PathBuf,
}

impl Default for FakeRepo {
    fn default() -> Self {
        Self::new()
    }
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap_or_else(|e| panic!("bad branch name in test: {e}"))
}

fn failed(command: String, stderr: &str) -> GitError {
    GitError::CommandFailed {
        command,
        stderr: stderr.to_owned(),
        exit_code: Some(128),
    }
}

impl FakeRepo {
    /// An empty repository with HEAD on an unborn `main`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_git_dir(Path::new(".git"))
    }

    /// Like [`FakeRepo::new`], reporting `git_dir` as the git dir. The pick
    /// list is written there, so workflow tests pass a temp directory.
    #[must_use]
    pub fn with_git_dir(git_dir: &Path) -> Self {
        Self {
            state: RefCell::new(State {
                commits: HashMap::new(),
                branches: BTreeMap::new(),
                head: Head::Branch(branch("main")),
                next_seq: 1,
                dirty: false,
                foreign: None,
                pending_pick: None,
                forced_conflicts: HashSet::new(),
                broken_picks: HashSet::new(),
                failing_deletes: HashSet::new(),
                ops: Vec::new(),
            }),
            git_dir: git_dir.to_owned(),
        }
    }

    // -- building history --

    /// Commit `files` on `branch_name` (creating the branch as a root commit
    /// if it does not exist) and return the new commit.
    pub fn commit_on(&self, branch_name: &str, message: &str, files: &[(&str, &str)]) -> GitOid {
        let name = branch(branch_name);
        let mut st = self.state.borrow_mut();
        let parent = st.branches.get(&name).copied();
        let parent_tree = parent
            .map(|p| st.commits[&p].tree.clone())
            .unwrap_or_default();
        let changes = files
            .iter()
            .map(|(path, content)| {
                (
                    (*path).to_owned(),
                    parent_tree.get(*path).cloned(),
                    (*content).to_owned(),
                )
            })
            .collect();
        let oid = st.add_commit(parent.into_iter().collect(), message, parent_tree, changes);
        st.branches.insert(name, oid);
        oid
    }

    /// Merge `other` into `target` with a two-parent commit. Files from
    /// `other` win.
    pub fn merge_into(&self, target: &str, other: &str, message: &str) -> GitOid {
        let mut st = self.state.borrow_mut();
        let ours = st.branches[&branch(target)];
        let theirs = st.branches[&branch(other)];
        let mut tree = st.commits[&ours].tree.clone();
        tree.extend(st.commits[&theirs].tree.clone());
        let oid = st.add_commit(vec![ours, theirs], message, tree, Vec::new());
        st.branches.insert(branch(target), oid);
        oid
    }

    /// Point `name` at `oid`, creating or moving it.
    pub fn branch_at(&self, name: &str, oid: GitOid) {
        self.state.borrow_mut().branches.insert(branch(name), oid);
    }

    /// Put HEAD on `name` without any checks.
    pub fn set_head(&self, name: &str) {
        self.state.borrow_mut().head = Head::Branch(branch(name));
    }

    /// Detach HEAD at its current commit.
    pub fn detach_head(&self) {
        let mut st = self.state.borrow_mut();
        let tip = st.head_commit().unwrap_or_else(|| panic!("HEAD is unborn"));
        st.head = Head::Detached(tip);
    }

    // -- failure injection --

    /// Mark the working tree dirty (or clean).
    pub fn set_dirty(&self, dirty: bool) {
        self.state.borrow_mut().dirty = dirty;
    }

    /// Pretend git is paused in `op`.
    pub fn set_foreign_operation(&self, op: Option<InProgressOperation>) {
        self.state.borrow_mut().foreign = op;
    }

    /// Make every cherry-pick of `oid` conflict.
    pub fn conflict_on(&self, oid: GitOid) {
        self.state.borrow_mut().forced_conflicts.insert(oid);
    }

    /// Make every cherry-pick of `oid` fail outright (not a conflict).
    pub fn break_pick(&self, oid: GitOid) {
        self.state.borrow_mut().broken_picks.insert(oid);
    }

    /// Undo [`break_pick`](Self::break_pick).
    pub fn repair_pick(&self, oid: GitOid) {
        self.state.borrow_mut().broken_picks.remove(&oid);
    }

    /// Make deleting `name` fail.
    pub fn fail_delete(&self, name: &str) {
        self.state.borrow_mut().failing_deletes.insert(branch(name));
    }

    /// Play the user resolving a conflicted pick: commit the paused commit's
    /// changes (theirs wins) and clear the conflict.
    pub fn resolve_conflict(&self) -> GitOid {
        let mut st = self.state.borrow_mut();
        let pending = st
            .pending_pick
            .take()
            .unwrap_or_else(|| panic!("no conflicted cherry-pick to resolve"));
        let oid = st.replay(pending);
        st.dirty = false;
        oid
    }

    // -- inspection --

    /// The commit `name` points at. Panics if it does not exist.
    #[must_use]
    pub fn tip(&self, name: &str) -> GitOid {
        self.state.borrow().branches[&branch(name)]
    }

    /// Whether `name` exists.
    #[must_use]
    pub fn has_branch(&self, name: &str) -> bool {
        self.state.borrow().branches.contains_key(&branch(name))
    }

    /// The branch HEAD is on, `None` when detached.
    #[must_use]
    pub fn head_branch(&self) -> Option<String> {
        match &self.state.borrow().head {
            Head::Branch(b) => Some(b.to_string()),
            Head::Detached(_) => None,
        }
    }

    /// Content of `path` at the tip of `name`.
    #[must_use]
    pub fn file(&self, name: &str, path: &str) -> Option<String> {
        let st = self.state.borrow();
        let tip = st.branches[&branch(name)];
        st.commits[&tip].tree.get(path).cloned()
    }

    /// Messages along the first-parent chain of `name`, oldest first.
    #[must_use]
    pub fn messages(&self, name: &str) -> Vec<String> {
        let st = self.state.borrow();
        let mut out = Vec::new();
        let mut cursor = st.branches.get(&branch(name)).copied();
        while let Some(oid) = cursor {
            let c = &st.commits[&oid];
            out.push(c.message.clone());
            cursor = c.parents.first().copied();
        }
        out.reverse();
        out
    }

    /// Every mutating call made through [`GitRepo`], in order.
    #[must_use]
    pub fn ops(&self) -> Vec<String> {
        self.state.borrow().ops.clone()
    }

    /// Whether a conflicted cherry-pick is waiting.
    #[must_use]
    pub fn has_pending_pick(&self) -> bool {
        self.state.borrow().pending_pick.is_some()
    }
}

impl State {
    fn add_commit(
        &mut self,
        parents: Vec<GitOid>,
        message: &str,
        mut tree: Tree,
        changes: Vec<(String, Option<String>, String)>,
    ) -> GitOid {
        let seq = self.next_seq;
        self.next_seq += 1;
        let [hi, lo] = seq.to_be_bytes();
        let mut bytes = [0u8; 20];
        bytes[0] = 0xfa;
        bytes[1] = hi;
        bytes[2] = lo;
        for (i, b) in bytes.iter_mut().enumerate().skip(3) {
            *b = lo.wrapping_mul(31).wrapping_add(i as u8);
        }
        let oid = GitOid::from_bytes(bytes);
        for (path, _, after) in &changes {
            tree.insert(path.clone(), after.clone());
        }
        self.commits.insert(
            oid,
            FakeCommit {
                parents,
                message: message.to_owned(),
                tree,
                changes,
                seq,
            },
        );
        oid
    }

    fn head_commit(&self) -> Option<GitOid> {
        match &self.head {
            Head::Branch(b) => self.branches.get(b).copied(),
            Head::Detached(oid) => Some(*oid),
        }
    }

    fn move_head(&mut self, oid: GitOid) {
        match self.head.clone() {
            Head::Branch(b) => {
                self.branches.insert(b, oid);
            }
            Head::Detached(_) => self.head = Head::Detached(oid),
        }
    }

    /// Commit `source`'s changes on top of HEAD.
    fn replay(&mut self, source: GitOid) -> GitOid {
        let head = self.head_commit();
        let tree = head.map(|h| self.commits[&h].tree.clone()).unwrap_or_default();
        let commit = self.commits[&source].clone();
        let changes = commit
            .changes
            .iter()
            .map(|(path, _, after)| (path.clone(), tree.get(path).cloned(), after.clone()))
            .collect();
        let oid = self.add_commit(head.into_iter().collect(), &commit.message, tree, changes);
        self.move_head(oid);
        oid
    }

    fn conflicts(&self, source: GitOid) -> bool {
        if self.forced_conflicts.contains(&source) {
            return true;
        }
        let Some(head) = self.head_commit() else {
            return false;
        };
        let tree = &self.commits[&head].tree;
        self.commits[&source]
            .changes
            .iter()
            .any(|(path, before, after)| {
                let current = tree.get(path);
                current != before.as_ref() && current != Some(after)
            })
    }
}

impl GitRepo for FakeRepo {
    fn validate(&self) -> Result<(), GitError> {
        match self.state.borrow().head_commit() {
            Some(_) => Ok(()),
            None => Err(GitError::NotFound {
                message: "HEAD does not point at a commit".to_owned(),
            }),
        }
    }

    fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    fn current_branch(&self) -> Result<BranchName, GitError> {
        match &self.state.borrow().head {
            Head::Branch(b) => Ok(b.clone()),
            Head::Detached(_) => Err(GitError::DetachedHead),
        }
    }

    fn resolve_branch(&self, name: &BranchName) -> Result<Option<GitOid>, GitError> {
        Ok(self.state.borrow().branches.get(name).copied())
    }

    fn rev_walk(&self, head: GitOid) -> Result<Vec<GitOid>, GitError> {
        let st = self.state.borrow();
        if !st.commits.contains_key(&head) {
            return Err(GitError::NotFound {
                message: format!("commit {head}"),
            });
        }
        let mut seen = HashSet::new();
        let mut stack = vec![head];
        while let Some(oid) = stack.pop() {
            if seen.insert(oid) {
                stack.extend(st.commits[&oid].parents.iter().copied());
            }
        }
        // Newest first, like git's default date order.
        let mut walk: Vec<GitOid> = seen.into_iter().collect();
        walk.sort_by_key(|oid| std::cmp::Reverse(st.commits[oid].seq));
        Ok(walk)
    }

    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError> {
        let st = self.state.borrow();
        let commit = st.commits.get(&oid).ok_or_else(|| GitError::NotFound {
            message: format!("commit {oid}"),
        })?;
        Ok(CommitInfo {
            oid,
            parents: commit.parents.clone(),
            message: commit.message.clone(),
            author: "Fake Author <fake@example.com>".to_owned(),
        })
    }

    fn create_branch(&self, name: &BranchName, target: GitOid) -> Result<(), GitError> {
        let mut st = self.state.borrow_mut();
        if st.branches.contains_key(name) {
            return Err(failed(
                format!("git branch {name} {target}"),
                "branch already exists",
            ));
        }
        if !st.commits.contains_key(&target) {
            return Err(GitError::NotFound {
                message: format!("commit {target}"),
            });
        }
        st.branches.insert(name.clone(), target);
        st.ops.push(format!("create {name}"));
        Ok(())
    }

    fn delete_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let mut st = self.state.borrow_mut();
        let command = format!("git branch -D {name}");
        if st.failing_deletes.contains(name) {
            return Err(failed(command, "injected failure"));
        }
        if matches!(&st.head, Head::Branch(b) if b == name) {
            return Err(failed(command, "cannot delete the checked-out branch"));
        }
        if st.branches.remove(name).is_none() {
            return Err(failed(command, "branch not found"));
        }
        st.ops.push(format!("delete {name}"));
        Ok(())
    }

    fn rename_branch(&self, from: &BranchName, to: &BranchName) -> Result<(), GitError> {
        let mut st = self.state.borrow_mut();
        let command = format!("git branch -m {from} {to}");
        if st.branches.contains_key(to) {
            return Err(failed(command, "a branch with that name already exists"));
        }
        let oid = st
            .branches
            .remove(from)
            .ok_or_else(|| failed(command, "branch not found"))?;
        st.branches.insert(to.clone(), oid);
        if matches!(&st.head, Head::Branch(b) if b == from) {
            st.head = Head::Branch(to.clone());
        }
        st.ops.push(format!("rename {from} {to}"));
        Ok(())
    }

    fn checkout(&self, name: &BranchName) -> Result<(), GitError> {
        let mut st = self.state.borrow_mut();
        let command = format!("git checkout {name}");
        if st.pending_pick.is_some() {
            return Err(failed(command, "you need to resolve your current index first"));
        }
        if !st.branches.contains_key(name) {
            return Err(failed(command, "pathspec did not match"));
        }
        st.head = Head::Branch(name.clone());
        st.ops.push(format!("checkout {name}"));
        Ok(())
    }

    fn cherry_pick(&self, commit: GitOid) -> Result<CherryPickOutcome, GitError> {
        let mut st = self.state.borrow_mut();
        let command = format!("git cherry-pick {commit}");
        if !st.commits.contains_key(&commit) {
            return Err(failed(command, "bad revision"));
        }
        if st.broken_picks.contains(&commit) {
            return Err(failed(command, "injected failure"));
        }
        if st.pending_pick.is_some() {
            return Err(failed(command, "a cherry-pick is already in progress"));
        }
        st.ops.push(format!("cherry-pick {}", commit.short()));
        if st.conflicts(commit) {
            st.pending_pick = Some(commit);
            st.dirty = true;
            return Ok(CherryPickOutcome::Conflicted);
        }
        st.replay(commit);
        Ok(CherryPickOutcome::Applied)
    }

    fn abort_cherry_pick(&self) -> Result<(), GitError> {
        let mut st = self.state.borrow_mut();
        if st.pending_pick.take().is_none() {
            return Err(failed(
                "git cherry-pick --abort".to_owned(),
                "no cherry-pick in progress",
            ));
        }
        st.dirty = false;
        st.ops.push("abort-cherry-pick".to_owned());
        Ok(())
    }

    fn is_dirty(&self) -> Result<bool, GitError> {
        Ok(self.state.borrow().dirty)
    }

    fn in_progress_operation(&self) -> Result<Option<InProgressOperation>, GitError> {
        let st = self.state.borrow();
        Ok(st
            .foreign
            .or_else(|| st.pending_pick.map(|_| InProgressOperation::CherryPick)))
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// An in-memory [`RecordStore`] that keeps a copy of every save.
#[derive(Debug, Default)]
pub struct MemoryStore {
    current: RefCell<Option<OperationRecord>>,
    saves: RefCell<Vec<OperationRecord>>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `record`.
    #[must_use]
    pub fn with_record(record: OperationRecord) -> Self {
        let store = Self::default();
        *store.current.borrow_mut() = Some(record);
        store
    }

    /// The stored record.
    #[must_use]
    pub fn record(&self) -> Option<OperationRecord> {
        self.current.borrow().clone()
    }

    /// Every record saved so far, oldest first.
    #[must_use]
    pub fn saves(&self) -> Vec<OperationRecord> {
        self.saves.borrow().clone()
    }
}

impl RecordStore for MemoryStore {
    fn exists(&self) -> Result<bool, RecordError> {
        Ok(self.current.borrow().is_some())
    }

    fn load(&self) -> Result<Option<OperationRecord>, RecordError> {
        let record = self.current.borrow().clone();
        if let Some(r) = &record {
            r.check_consistency()?;
        }
        Ok(record)
    }

    fn save(&self, record: &OperationRecord) -> Result<(), RecordError> {
        record.check_consistency()?;
        *self.current.borrow_mut() = Some(record.clone());
        self.saves.borrow_mut().push(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), RecordError> {
        *self.current.borrow_mut() = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedEditor
// ---------------------------------------------------------------------------

type Script = Box<dyn Fn(&str) -> String>;

/// An [`Editor`] that rewrites the file with a closure instead of asking a
/// person.
pub struct ScriptedEditor {
    script: Option<Script>,
    launches: RefCell<usize>,
}

impl std::fmt::Debug for ScriptedEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEditor")
            .field("launches", &self.launches)
            .finish_non_exhaustive()
    }
}

impl ScriptedEditor {
    /// Rewrite the file's text with `script`.
    pub fn new(script: impl Fn(&str) -> String + 'static) -> Self {
        Self {
            script: Some(Box::new(script)),
            launches: RefCell::new(0),
        }
    }

    /// Save the list unchanged.
    #[must_use]
    pub fn keep() -> Self {
        Self::new(str::to_owned)
    }

    /// Replace the whole file with `text`.
    #[must_use]
    pub fn replace(text: &str) -> Self {
        let text = text.to_owned();
        Self::new(move |_| text.clone())
    }

    /// Turn `pick` into `drop` on every line whose summary is in `summaries`.
    #[must_use]
    pub fn drop_summaries(summaries: &[&str]) -> Self {
        let summaries: Vec<String> = summaries.iter().map(|s| (*s).to_owned()).collect();
        Self::new(move |text| {
            text.lines()
                .map(|line| {
                    let dropped = line.starts_with("pick ")
                        && summaries
                            .iter()
                            .any(|s| line.splitn(3, ' ').nth(2) == Some(s.as_str()));
                    if dropped {
                        format!("drop {}\n", &line["pick ".len()..])
                    } else {
                        format!("{line}\n")
                    }
                })
                .collect()
        })
    }

    /// An editor that exits unsuccessfully.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            script: None,
            launches: RefCell::new(0),
        }
    }

    /// How many times the editor was launched.
    #[must_use]
    pub fn launches(&self) -> usize {
        *self.launches.borrow()
    }
}

impl Editor for ScriptedEditor {
    fn launch(&self, path: &Path) -> Result<(), EditorError> {
        *self.launches.borrow_mut() += 1;
        let Some(script) = &self.script else {
            return Err(EditorError::Failed {
                command: "scripted".to_owned(),
                code: Some(1),
            });
        };
        let io_error = |source| EditorError::Spawn {
            program: "scripted".to_owned(),
            source,
        };
        let text = std::fs::read_to_string(path).map_err(io_error)?;
        std::fs::write(path, script(&text)).map_err(io_error)?;
        Ok(())
    }
}
