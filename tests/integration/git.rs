use crate::common::{git_available, write_file};
use nash::git::GitContextProvider;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("Failed to spawn git");
    assert!(status.success(), "git {:?} failed", args);
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    git(dir, &["config", "user.email", "dev@example.com"]);
    git(dir, &["config", "user.name", "Dev"]);
}

#[test]
fn test_status_outside_repository_is_empty() {
    let dir = tempdir().unwrap();
    let provider = GitContextProvider::new(dir.path());
    assert_eq!(provider.status(), "");
    assert_eq!(provider.staged_diff(provider.per_file_cap()), "");
    assert!(provider.capture().is_empty());
}

#[test]
fn test_staged_diff_is_labelled_and_truncated() {
    if !git_available() {
        return;
    }
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    write_file(dir.path(), "deploy.sh", &"echo step\n".repeat(300));
    git(dir.path(), &["add", "deploy.sh"]);

    let provider = GitContextProvider::new(dir.path());
    let diff = provider.staged_diff(200);

    assert!(diff.starts_with("deploy.sh:"), "unexpected diff: {}", diff);
    assert!(diff.contains("+echo step"));
    assert!(diff.len() <= "deploy.sh:".len() + 200);
}

#[test]
fn test_status_lists_untracked_and_staged_files() {
    if !git_available() {
        return;
    }
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    write_file(dir.path(), "staged.txt", "one");
    write_file(dir.path(), "loose.txt", "two");
    git(dir.path(), &["add", "staged.txt"]);

    let context = GitContextProvider::new(dir.path()).capture();
    assert!(context.status.contains("A  staged.txt"));
    assert!(context.status.contains("?? loose.txt"));
    assert!(context.staged_diff.starts_with("staged.txt:"));
    assert!(!context.staged_diff.contains("loose.txt"));
}

#[test]
fn test_staged_diff_from_subdirectory() {
    if !git_available() {
        return;
    }
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    write_file(dir.path(), "sub/run.sh", "echo run\n");
    write_file(dir.path(), "top.txt", "outside the subdirectory\n");
    git(dir.path(), &["add", "sub/run.sh", "top.txt"]);

    let provider = GitContextProvider::new(dir.path().join("sub"));
    let diff = provider.staged_diff(1000);

    assert!(diff.starts_with("run.sh:"), "unexpected diff: {:?}", diff);
    assert!(diff.contains("+echo run"));
    assert!(!diff.contains("top.txt"));
}

#[test]
fn test_staged_diff_with_non_ascii_name() {
    if !git_available() {
        return;
    }
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    write_file(dir.path(), "café [draft].md", "menu\n");
    git(dir.path(), &["--literal-pathspecs", "add", "--", "café [draft].md"]);

    let diff = GitContextProvider::new(dir.path()).staged_diff(1000);
    assert!(diff.starts_with("café [draft].md:"), "unexpected diff: {:?}", diff);
    assert!(diff.contains("+menu"));
}

#[test]
fn test_clean_repository_has_no_staged_diff() {
    if !git_available() {
        return;
    }
    let dir = tempdir().unwrap();
    init_repo(dir.path());
    let provider = GitContextProvider::new(dir.path());
    assert_eq!(provider.status(), "");
    assert_eq!(provider.staged_diff(1000), "");
}
