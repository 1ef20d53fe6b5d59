use crate::common::{setup_test_env, wait_until, write_file};
use nash::config::ReindexPolicy;
use nash::watcher::FileWatcher;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

const DEBOUNCE: Duration = Duration::from_millis(100);
const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn test_new_file_is_indexed() {
    let dir = tempdir().unwrap();
    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    let watcher = FileWatcher::start(dir.path(), env.indexer.clone(), DEBOUNCE).unwrap();
    assert!(watcher.is_running());

    write_file(dir.path(), "notes.md", "rotate the api keys");

    let store = env.store.clone();
    let indexed = wait_until(TIMEOUT, || {
        store
            .paths()
            .unwrap()
            .iter()
            .any(|p| p.ends_with("notes.md"))
    });
    assert!(indexed, "watcher never indexed notes.md");

    watcher.stop();
}

#[test]
fn test_excluded_paths_are_ignored() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("node_modules")).unwrap();
    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    let watcher = FileWatcher::start(dir.path(), env.indexer.clone(), DEBOUNCE).unwrap();

    write_file(dir.path(), "node_modules/dep.js", "module.exports = {}");
    write_file(dir.path(), "app.js", "require('dep')");

    let store = env.store.clone();
    assert!(wait_until(TIMEOUT, || store
        .paths()
        .unwrap()
        .iter()
        .any(|p| p.ends_with("app.js"))));
    // Both events arrive in the same debounce window; give stragglers a moment.
    std::thread::sleep(DEBOUNCE * 3);
    assert!(env
        .store
        .paths()
        .unwrap()
        .iter()
        .all(|p| !p.contains("node_modules")));

    watcher.stop();
}

#[test]
fn test_replace_policy_purges_deleted_file() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "old.py", "def legacy(): pass");
    let env = setup_test_env(dir.path(), ReindexPolicy::ReplaceByPath);
    env.indexer.index_root(dir.path(), 10);
    assert_eq!(env.store.len().unwrap(), 1);

    let watcher = FileWatcher::start(dir.path(), env.indexer.clone(), DEBOUNCE).unwrap();
    fs::remove_file(dir.path().join("old.py")).unwrap();

    let store = env.store.clone();
    assert!(
        wait_until(TIMEOUT, || store.is_empty().unwrap()),
        "deleted file still indexed"
    );

    watcher.stop();
}

#[test]
fn test_stop_halts_indexing() {
    let dir = tempdir().unwrap();
    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    let watcher = FileWatcher::start(dir.path(), env.indexer.clone(), DEBOUNCE).unwrap();
    watcher.stop();

    write_file(dir.path(), "late.txt", "written after stop");
    std::thread::sleep(DEBOUNCE * 5);
    assert!(env.store.is_empty().unwrap());
}

#[test]
fn test_dropping_watcher_stops_it() {
    let dir = tempdir().unwrap();
    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    {
        let _watcher = FileWatcher::start(dir.path(), env.indexer.clone(), DEBOUNCE).unwrap();
    }
    write_file(dir.path(), "after_drop.txt", "nobody listening");
    std::thread::sleep(DEBOUNCE * 5);
    assert!(env.store.is_empty().unwrap());
}
