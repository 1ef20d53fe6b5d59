use crate::common::{setup_test_env, write_file};
use nash::config::ReindexPolicy;
use nash::indexer::SkipReason;
use tempfile::tempdir;

#[test]
fn test_hidden_directories_are_skipped() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.py", &"x = 1\n".repeat(33));
    write_file(dir.path(), ".git/config", "[core]\n\tbare = false\n");

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    let report = env.indexer.index_root(dir.path(), 10);

    assert_eq!(report.indexed, 1);
    let paths = env.store.paths().unwrap();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].ends_with("a.py"), "unexpected path {}", paths[0]);
}

#[test]
fn test_excluded_directories_never_stored() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "src/ok.py", "def ok(): pass");
    write_file(dir.path(), "venv/lib/site.py", "import os");
    write_file(dir.path(), "pkg/__pycache__/m.py", "cached");
    write_file(dir.path(), "web/node_modules/dep/index.js", "module.exports = 1");
    write_file(dir.path(), ".cache/blob.txt", "hidden");

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    env.indexer.index_root(dir.path(), 100);

    let paths = env.store.paths().unwrap();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].ends_with("ok.py"));
    for excluded in ["venv", "__pycache__", "node_modules", ".cache"] {
        assert!(paths.iter().all(|p| !p.contains(excluded)));
    }

    // The watcher path applies the same rules.
    let outcome = env
        .indexer
        .reindex_one(&dir.path().join("venv/lib/site.py"));
    assert!(!outcome.is_indexed());
}

#[test]
fn test_gitignore_is_respected() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), ".gitignore", "generated.txt\n");
    write_file(dir.path(), "generated.txt", "build output");
    write_file(dir.path(), "notes.txt", "release checklist");

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    env.indexer.index_root(dir.path(), 10);

    let paths = env.store.paths().unwrap();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].ends_with("notes.txt"));
}

#[test]
fn test_max_files_caps_walk_in_name_order() {
    let dir = tempdir().unwrap();
    for name in ["e.txt", "c.txt", "a.txt", "d.txt", "b.txt"] {
        write_file(dir.path(), name, &format!("contents of {}", name));
    }

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    let report = env.indexer.index_root(dir.path(), 2);

    assert_eq!(report.visited, 2);
    assert_eq!(env.store.len().unwrap(), 2);
    let paths = env.store.paths().unwrap();
    assert!(paths[0].ends_with("a.txt"));
    assert!(paths[1].ends_with("b.txt"));
}

#[test]
fn test_append_only_reindex_never_shrinks() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.py", "print('a')");
    write_file(dir.path(), "b.py", "print('b')");

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    env.indexer.index_root(dir.path(), 10);
    let first = env.store.len().unwrap();

    write_file(dir.path(), "a.py", "print('changed')");
    env.indexer.index_root(dir.path(), 10);
    let second = env.store.len().unwrap();

    assert_eq!(first, 2);
    assert!(second >= first);
    assert_eq!(second, 4);
}

#[test]
fn test_replace_by_path_keeps_one_entry_per_file() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.py", "print('a')");

    let env = setup_test_env(dir.path(), ReindexPolicy::ReplaceByPath);
    env.indexer.index_root(dir.path(), 10);
    write_file(dir.path(), "a.py", "print('edited')");
    assert!(env.indexer.reindex_one(&dir.path().join("a.py")).is_indexed());

    assert_eq!(env.store.len().unwrap(), 1);
    let key = &env.store.paths().unwrap()[0];
    let ids = env.store.ids_for_path(key).unwrap();
    let doc = env.store.get(ids[0]).unwrap().unwrap();
    assert_eq!(doc.excerpt, "print('edited')");
}

#[test]
fn test_unreadable_files_are_reported_not_fatal() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "good.txt", "plain text");
    std::fs::write(dir.path().join("image.bin"), [0u8, 159, 146, 150, 255]).unwrap();

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    let report = env.indexer.index_root(dir.path(), 10);

    assert_eq!(report.indexed, 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].0.ends_with("image.bin"));
    assert_eq!(report.skipped[0].1, SkipReason::NotText);
}

#[test]
fn test_excerpt_is_bounded() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "long.txt", &"é".repeat(400));

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    env.indexer.index_root(dir.path(), 10);

    let doc = env.store.get(0).unwrap().unwrap();
    assert!(doc.excerpt.len() <= 500);
    assert_eq!(doc.excerpt.chars().count(), 250);
}
