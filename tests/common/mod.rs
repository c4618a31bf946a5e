//! Shared helpers for rebranch integration tests.
//!
//! Each test gets its own git repository in a temp directory.

#![allow(dead_code)]

use std::cell::Cell;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use rebranch::editor::{Editor, EditorError};
use rebranch_git::{BranchName, GitOid};

/// A throwaway git repository on `main` with one root commit.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let repo = Self { dir };
        repo.git(&["init", "-q"]);
        repo.git(&["config", "user.email", "test@test.com"]);
        repo.git(&["config", "user.name", "Test User"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo.git(&["checkout", "-q", "-B", "main"]);
        repo.commit_file("base.txt", "base\n", "root");
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run git and return trimmed stdout, asserting success.
    pub fn git(&self, args: &[&str]) -> String {
        let out = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("failed to run git");
        assert!(
            out.status.success(),
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).trim().to_owned()
    }

    /// Commit `content` to `file` on the current branch.
    pub fn commit_file(&self, file: &str, content: &str, message: &str) -> GitOid {
        std::fs::write(self.path().join(file), content).expect("failed to write file");
        self.git(&["add", file]);
        self.git(&["commit", "-q", "-m", message]);
        self.rev_parse("HEAD")
    }

    pub fn checkout(&self, branch: &str) {
        self.git(&["checkout", "-q", branch]);
    }

    pub fn rev_parse(&self, rev: &str) -> GitOid {
        self.git(&["rev-parse", rev])
            .parse()
            .expect("rev-parse printed a bad oid")
    }

    pub fn current_branch(&self) -> String {
        self.git(&["branch", "--show-current"])
    }

    /// Local branch names, sorted.
    pub fn branches(&self) -> Vec<String> {
        self.git(&["branch", "--format=%(refname:short)"])
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Commit subjects reachable from `rev`, oldest first.
    pub fn subjects(&self, rev: &str) -> Vec<String> {
        self.git(&["log", "--format=%s", "--reverse", rev])
            .lines()
            .map(str::to_owned)
            .collect()
    }

    pub fn read(&self, file: &str) -> Option<String> {
        std::fs::read_to_string(self.path().join(file)).ok()
    }

    pub fn is_clean(&self) -> bool {
        self.git(&["status", "--porcelain"]).is_empty()
    }
}

pub fn branch(name: &str) -> BranchName {
    BranchName::new(name).expect("invalid branch name")
}

/// `main` gains "trunk work" after `feature` forks with "add one", "add two"
/// and "add three". Leaves `feature` checked out.
pub fn forked_repo() -> TestRepo {
    let repo = TestRepo::new();
    repo.git(&["checkout", "-q", "-b", "feature"]);
    repo.commit_file("one.txt", "1\n", "add one");
    repo.commit_file("two.txt", "2\n", "add two");
    repo.commit_file("three.txt", "3\n", "add three");
    repo.checkout("main");
    repo.commit_file("trunk.txt", "trunk\n", "trunk work");
    repo.checkout("feature");
    repo
}

/// Rewrites the pick list line by line instead of opening an editor.
pub struct LineEditor {
    rewrite: fn(&str) -> String,
    launches: Cell<usize>,
}

impl LineEditor {
    /// Apply `rewrite` to every line of the pick list.
    pub fn new(rewrite: fn(&str) -> String) -> Self {
        Self {
            rewrite,
            launches: Cell::new(0),
        }
    }

    /// Save the list unchanged.
    pub fn keep() -> Self {
        Self::new(str::to_owned)
    }

    pub fn launches(&self) -> usize {
        self.launches.get()
    }
}

impl Editor for LineEditor {
    fn launch(&self, path: &Path) -> Result<(), EditorError> {
        self.launches.set(self.launches.get() + 1);
        let spawn_error = |source| EditorError::Spawn {
            program: "line-editor".to_owned(),
            source,
        };
        let text = std::fs::read_to_string(path).map_err(spawn_error)?;
        let edited: String = text
            .lines()
            .map(|line| format!("{}\n", (self.rewrite)(line)))
            .collect();
        std::fs::write(path, edited).map_err(spawn_error)
    }
}
