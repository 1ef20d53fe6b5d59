use crate::common::{setup_test_env, setup_with_embedder, write_file, FailingEmbedder};
use nash::config::ReindexPolicy;
use nash::context::{FILES_HEADER, GIT_DIFF_HEADER, GIT_STATUS_HEADER, HISTORY_HEADER};
use nash::core::NashError;
use nash::history::{ConversationHistory, Role};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_context_contains_retrieved_file() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "fix.py", "bug fix logic");

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    env.indexer.index_root(dir.path(), 10);

    let context = env
        .assembler
        .build_context("fix the bug", &ConversationHistory::default())
        .unwrap();

    let path = &env.store.paths().unwrap()[0];
    assert!(context.contains(FILES_HEADER));
    assert!(context.contains(&format!("{}:bug fix logic", path)));
    assert!(!context.contains(HISTORY_HEADER));
    // A temp dir is not a repository.
    assert!(!context.contains(GIT_STATUS_HEADER));
    assert!(!context.contains(GIT_DIFF_HEADER));
}

#[test]
fn test_build_context_is_idempotent() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.sh", "#!/bin/sh\necho deploy");
    write_file(dir.path(), "b.py", "def deploy(): pass");

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    env.indexer.index_root(dir.path(), 10);

    let mut history = ConversationHistory::default();
    history.push_user("how do I deploy");
    let first = env.assembler.build_context("deploy", &history).unwrap();
    let second = env.assembler.build_context("deploy", &history).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_nearest_document_ranks_first() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "parser.rs", "bug fix logic in parser");
    write_file(dir.path(), "recipes.txt", "kitchen recipes pasta tomato basil");
    write_file(dir.path(), "weather.txt", "weather forecast rain clouds");

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    env.indexer.index_root(dir.path(), 10);

    let assembled = env
        .assembler
        .assemble("fix the parser bug", &ConversationHistory::default())
        .unwrap();
    assert_eq!(assembled.documents.len(), 3);
    assert!(assembled.documents[0].path.ends_with("parser.rs"));
    assert!(assembled
        .documents
        .windows(2)
        .all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn test_retrieval_is_capped_at_top_k() {
    let dir = tempdir().unwrap();
    for i in 0..6 {
        write_file(dir.path(), &format!("f{}.txt", i), &format!("file number {}", i));
    }

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    env.indexer.index_root(dir.path(), 10);

    let assembled = env
        .assembler
        .assemble("file", &ConversationHistory::default())
        .unwrap();
    assert_eq!(assembled.documents.len(), env.assembler.options().top_k);
}

#[test]
fn test_append_only_duplicates_collapse_to_newest() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "deploy.sh", "echo old deploy");

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    env.indexer.index_root(dir.path(), 10);
    write_file(dir.path(), "deploy.sh", "echo new deploy");
    env.indexer.index_root(dir.path(), 10);
    assert_eq!(env.store.len().unwrap(), 2);

    let assembled = env
        .assembler
        .assemble("deploy", &ConversationHistory::default())
        .unwrap();
    assert_eq!(assembled.documents.len(), 1);
    assert_eq!(assembled.documents[0].excerpt, "echo new deploy");
}

#[test]
fn test_frequently_saved_file_does_not_crowd_out_others() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "deploy.sh", "echo deploy");
    write_file(dir.path(), "other1.txt", "grocery list");
    write_file(dir.path(), "other2.txt", "meeting notes");

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    env.indexer.index_root(dir.path(), 10);
    let deploy = dir.path().join("deploy.sh");
    for _ in 0..20 {
        assert!(env.indexer.reindex_one(&deploy).is_indexed());
    }
    assert_eq!(env.store.len().unwrap(), 23);

    let assembled = env
        .assembler
        .assemble("echo deploy deploy", &ConversationHistory::default())
        .unwrap();
    assert_eq!(assembled.documents.len(), 3);
    assert!(assembled.documents[0].path.ends_with("deploy.sh"));
    let mut paths: Vec<&str> = assembled.documents.iter().map(|d| d.path.as_str()).collect();
    paths.sort_unstable();
    paths.dedup();
    assert_eq!(paths.len(), 3);
}

#[test]
fn test_empty_index_still_renders_history() {
    let dir = tempdir().unwrap();
    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);

    let mut history = ConversationHistory::default();
    history.push_user("ls -la");
    history.push_assistant("ls -la");

    let context = env.assembler.build_context("now sort by size", &history).unwrap();
    assert!(context.starts_with(HISTORY_HEADER));
    assert!(context.contains("user: ls -la"));
    assert!(context.contains("assistant: ls -la"));
    assert!(!context.contains(FILES_HEADER));
}

#[test]
fn test_messages_end_with_user_query() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "Makefile", "build:\n\tcargo build --release");

    let env = setup_test_env(dir.path(), ReindexPolicy::AppendOnly);
    env.indexer.index_root(dir.path(), 10);

    let mut history = ConversationHistory::default();
    history.push_user("what targets exist");

    let messages = env
        .assembler
        .build_messages("run the build", &history)
        .unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[0].content.contains("cargo build --release"));
    assert_eq!(messages[1].content, "what targets exist");
    assert_eq!(messages[2].role, Role::User);
    assert_eq!(messages[2].content, "run the build");
}

#[test]
fn test_query_embedding_failure_is_an_error() {
    let dir = tempdir().unwrap();
    let env = setup_with_embedder(
        dir.path(),
        ReindexPolicy::AppendOnly,
        Arc::new(FailingEmbedder),
    );

    let result = env
        .assembler
        .build_context("anything", &ConversationHistory::default());
    assert!(matches!(result, Err(NashError::Embedding(_))));
}
