use tracing::debug;

use crate::commands::index::run_initial_index;
use crate::commands::{resolve_root, Workspace};
use crate::config::AppConfig;
use crate::core::Result;
use crate::history::ConversationHistory;

pub struct ContextOptions {
    pub query: String,
    pub path: Option<String>,
    pub json: bool,
}

/// One-shot: index the directory, then print what a query would be sent with.
pub async fn print_context(options: ContextOptions, config: &AppConfig) -> Result<()> {
    let root = resolve_root(options.path, config);
    let workspace = Workspace::open(&root, config)?;

    let report = run_initial_index(workspace.indexer.clone(), root, config.max_files).await?;
    debug!("Indexed {} of {} files", report.indexed, report.visited);

    let history = ConversationHistory::with_turn_bytes(config.max_history, config.history_turn_bytes);
    if options.json {
        let messages = workspace.assembler.build_messages(&options.query, &history)?;
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else {
        let context = workspace.assembler.build_context(&options.query, &history)?;
        println!("{}", context);
    }
    Ok(())
}
