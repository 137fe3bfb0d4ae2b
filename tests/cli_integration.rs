//! End-to-end tests driving the `pk` binary against a real, throwaway Git
//! repository. Grounded in the teacher's `assert_cmd`-based command tests
//! (a `TempDir` repo plus `Command::cargo_bin`), narrowed to pancake's own
//! verb set: `init`, `branch create`, `log`, `branch delete`.

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let status = StdCommand::new("git").args(args).current_dir(dir).status().unwrap();
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "-b", "main"]);
    git(dir.path(), &["config", "user.email", "test@example.com"]);
    git(dir.path(), &["config", "user.name", "Test User"]);
    std::fs::write(dir.path().join("README.md"), "# Test\n").unwrap();
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-m", "initial"]);
    dir
}

fn pk(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pk").unwrap();
    cmd.current_dir(dir);
    cmd
}

#[test]
fn init_creates_stacks_file_tracking_main() {
    let repo = init_repo();
    pk(repo.path()).arg("init").assert().success();
    assert!(repo.path().join(".pancake").join("stacks.json").exists());
}

#[test]
fn init_twice_is_idempotent() {
    let repo = init_repo();
    pk(repo.path()).arg("init").assert().success();
    pk(repo.path()).arg("init").assert().success();
}

#[test]
fn branch_create_tracks_and_checks_out_new_branch() {
    let repo = init_repo();
    pk(repo.path()).arg("init").assert().success();

    pk(repo.path())
        .args(["branch", "create", "feature-a"])
        .assert()
        .success();

    let contents = std::fs::read_to_string(repo.path().join(".pancake/stacks.json")).unwrap();
    assert!(contents.contains("feature-a"));

    let out = StdCommand::new("git")
        .args(["branch", "--show-current"])
        .current_dir(repo.path())
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "feature-a");
}

#[test]
fn branch_create_duplicate_name_fails() {
    let repo = init_repo();
    pk(repo.path()).arg("init").assert().success();
    pk(repo.path()).args(["branch", "create", "feature-a"]).assert().success();
    pk(repo.path()).args(["branch", "create", "feature-a"]).assert().failure();
}

#[test]
fn log_lists_stack_with_current_marker() {
    let repo = init_repo();
    pk(repo.path()).arg("init").assert().success();
    pk(repo.path()).args(["branch", "create", "feature-a"]).assert().success();

    pk(repo.path())
        .arg("log")
        .assert()
        .success()
        .stdout(predicates::str::contains("feature-a"))
        .stdout(predicates::str::contains("main"));
}

#[test]
fn branch_delete_reparents_children_onto_trunk() {
    let repo = init_repo();
    pk(repo.path()).arg("init").assert().success();
    pk(repo.path()).args(["branch", "create", "feature-a"]).assert().success();
    pk(repo.path())
        .args(["branch", "create", "feature-b", "--base", "feature-a"])
        .assert()
        .success();

    pk(repo.path()).args(["branch", "delete", "feature-a", "--force"]).assert().success();

    let contents = std::fs::read_to_string(repo.path().join(".pancake/stacks.json")).unwrap();
    assert!(!contents.contains("\"feature-a\""));
    assert!(contents.contains("feature-b"));
}
