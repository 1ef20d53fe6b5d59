use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::commands::index::run_initial_index;
use crate::commands::{resolve_root, Workspace};
use crate::config::AppConfig;
use crate::context::{ChatMessage, ContextAssembler};
use crate::core::{NashError, Result};
use crate::history::ConversationHistory;
use crate::watcher::FileWatcher;

/// Embeds the query and shells out to `git` on the blocking pool, keeping
/// the async loop free to notice Ctrl-C.
pub async fn assemble_messages(
    assembler: Arc<ContextAssembler>,
    query: String,
    history: ConversationHistory,
) -> Result<Vec<ChatMessage>> {
    tokio::task::spawn_blocking(move || assembler.build_messages(&query, &history))
        .await
        .map_err(|e| NashError::Generic(format!("Context task failed: {}", e)))?
}

/// Interactive loop: one query per stdin line, one JSON message list per
/// query on stdout. The watcher starts before the initial walk so edits made
/// while indexing are not missed; queries are answered from whatever is
/// indexed so far.
pub async fn run_session(path: Option<String>, config: &AppConfig) -> Result<()> {
    let root = resolve_root(path, config);
    let workspace = Workspace::open(&root, config)?;

    let watcher = FileWatcher::start(
        &root,
        workspace.indexer.clone(),
        Duration::from_millis(config.watch_debounce_ms),
    )?;

    let initial = tokio::spawn(run_initial_index(
        workspace.indexer.clone(),
        root.clone(),
        config.max_files,
    ));

    let mut history =
        ConversationHistory::with_turn_bytes(config.max_history, config.history_turn_bytes);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, ending session");
                break;
            }
            line = lines.next_line() => line,
        };
        let query = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };
        let query = query.trim().to_string();
        if query.is_empty() {
            continue;
        }

        let pending = assemble_messages(workspace.assembler.clone(), query.clone(), history.clone());
        let result = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted while assembling context, ending session");
                break;
            }
            result = pending => result,
        };
        match result {
            Ok(messages) => println!("{}", serde_json::to_string(&messages)?),
            Err(e) => warn!("Could not assemble context for '{}': {}", query, e),
        }
        history.push_user(&query);
    }

    watcher.stop();
    if initial.is_finished() {
        match initial.await {
            Ok(Ok(report)) => info!("Initial index: {} of {} files", report.indexed, report.visited),
            Ok(Err(e)) => warn!("Initial index failed: {}", e),
            Err(e) => warn!("Initial index task failed: {}", e),
        }
    } else {
        // Blocking tasks cannot be cancelled; runtime shutdown waits for the walk.
        info!("Session ended before the initial walk finished");
    }
    Ok(())
}
