//! Integration tests for the persistence layer: MetadataStore, RepoLock, and
//! Journal against real Git repositories. Grounded in the teacher's
//! `tests/persistence_integration.rs` (tempfile + shelled `git` fixture,
//! `TestRepo` helper), adapted to pancake's single-file `stacks.json` schema.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use pancake::core::metadata::{BranchEntry, FreezeScope, FreezeState, MetadataStore, StacksFile};
use pancake::core::ops::journal::{Journal, OpPhase, StepKind};
use pancake::core::ops::lock::{LockError, RepoLock};
use pancake::core::types::{BranchName, Oid};
use pancake::git::Git;

struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        for args in [
            vec!["init", "-b", "main"],
            vec!["config", "user.email", "test@example.com"],
            vec!["config", "user.name", "Test User"],
        ] {
            Command::new("git").args(&args).current_dir(dir.path()).output().expect("git setup");
        }
        std::fs::write(dir.path().join("README.md"), "# Test\n").unwrap();
        Command::new("git").args(["add", "."]).current_dir(dir.path()).output().unwrap();
        Command::new("git")
            .args(["commit", "-m", "initial"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn pancake_dir(&self) -> std::path::PathBuf {
        self.path().join(".pancake")
    }

    fn git(&self) -> Git {
        Git::open(self.path()).expect("open git repo")
    }
}

fn oid_of(repo: &TestRepo, refname: &str) -> Oid {
    repo.git().try_resolve_ref(refname).unwrap().unwrap()
}

#[test]
fn metadata_store_roundtrips_through_atomic_save() {
    let repo = TestRepo::new();
    std::fs::create_dir_all(repo.pancake_dir()).unwrap();
    let store = MetadataStore::new(&repo.pancake_dir());

    let main = BranchName::new("main").unwrap();
    let head = oid_of(&repo, "refs/heads/main");
    let mut file = StacksFile::new(main.clone());
    file.insert(BranchEntry::new(main, None, head.clone(), head)).unwrap();
    store.save(&file).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.branches.len(), 1);
    assert_eq!(loaded.main_branch, file.main_branch);
}

#[test]
fn metadata_store_save_leaves_no_tmp_files() {
    let repo = TestRepo::new();
    std::fs::create_dir_all(repo.pancake_dir()).unwrap();
    let store = MetadataStore::new(&repo.pancake_dir());
    let file = StacksFile::new(BranchName::new("main").unwrap());
    store.save(&file).unwrap();

    let leftover: Vec<_> = std::fs::read_dir(repo.pancake_dir())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
        .collect();
    assert!(leftover.is_empty(), "atomic save left temp files: {leftover:?}");
}

#[test]
fn freeze_state_roundtrips() {
    let repo = TestRepo::new();
    std::fs::create_dir_all(repo.pancake_dir()).unwrap();
    let store = MetadataStore::new(&repo.pancake_dir());
    let main = BranchName::new("main").unwrap();
    let head = oid_of(&repo, "refs/heads/main");
    let mut file = StacksFile::new(main.clone());
    let mut entry = BranchEntry::new(BranchName::new("feature").unwrap(), Some(main.clone()), head.clone(), head);
    entry.freeze = FreezeState::Frozen { scope: FreezeScope::DownstackInclusive };
    file.insert(entry).unwrap();
    store.save(&file).unwrap();

    let loaded = store.load().unwrap();
    let got = loaded.find(&BranchName::new("feature").unwrap()).unwrap();
    assert!(got.is_frozen());
}

#[test]
fn repo_lock_blocks_second_acquire_then_allows_after_release() {
    let repo = TestRepo::new();
    std::fs::create_dir_all(repo.pancake_dir()).unwrap();

    let first = RepoLock::acquire(&repo.pancake_dir()).unwrap();
    let second = RepoLock::acquire(&repo.pancake_dir());
    assert!(matches!(second, Err(LockError::AlreadyLocked { .. })));

    drop(first);
    let third = RepoLock::acquire(&repo.pancake_dir());
    assert!(third.is_ok());
}

#[test]
fn journal_rejects_concurrent_begin_and_resolves_on_commit() {
    let repo = TestRepo::new();
    std::fs::create_dir_all(repo.pancake_dir()).unwrap();
    let journal = Journal::new(&repo.pancake_dir());

    let op_id = journal.begin("restack").unwrap();
    assert!(journal.begin("sync").is_err());

    journal.record_step(&op_id, "restack", StepKind::Checkpoint { name: "start".into() }).unwrap();
    journal.commit(&op_id, "restack").unwrap();

    assert!(journal.current_op().unwrap().is_none());
    let steps = journal.steps_for(&op_id).unwrap();
    assert_eq!(steps.len(), 1);
}

#[test]
fn journal_undo_snapshot_comes_from_most_recent_commit_only() {
    let repo = TestRepo::new();
    std::fs::create_dir_all(repo.pancake_dir()).unwrap();
    let journal = Journal::new(&repo.pancake_dir());

    let op1 = journal.begin("branch create").unwrap();
    journal
        .record_step(&op1, "branch create", StepKind::MetadataSnapshot { pre_image: "first".into() })
        .unwrap();
    journal.commit(&op1, "branch create").unwrap();

    let op2 = journal.begin("restack").unwrap();
    journal
        .record_step(&op2, "restack", StepKind::MetadataSnapshot { pre_image: "second".into() })
        .unwrap();
    journal.commit(&op2, "restack").unwrap();

    let (_, pre_image) = journal.last_undo_snapshot().unwrap().unwrap();
    assert_eq!(pre_image, "second");
}

#[test]
fn suspended_operation_is_resumable_and_blocks_new_work() {
    let repo = TestRepo::new();
    std::fs::create_dir_all(repo.pancake_dir()).unwrap();
    let journal = Journal::new(&repo.pancake_dir());

    let op_id = journal.begin("sync").unwrap();
    journal.suspend(&op_id, "sync").unwrap();

    let (_, command, phase) = journal.current_op().unwrap().unwrap();
    assert_eq!(command, "sync");
    assert_eq!(phase, OpPhase::Suspended);
    assert!(journal.begin("branch create").is_err());
}
