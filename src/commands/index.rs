use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::commands::{resolve_root, Workspace};
use crate::config::AppConfig;
use crate::core::{NashError, Result};
use crate::indexer::{IndexReport, Indexer};

pub struct IndexOptions {
    pub path: Option<String>,
    pub max_files: Option<usize>,
    pub json: bool,
}

/// Runs the initial walk off the async runtime.
pub async fn run_initial_index(
    indexer: Arc<Indexer>,
    root: PathBuf,
    max_files: usize,
) -> Result<IndexReport> {
    tokio::task::spawn_blocking(move || indexer.index_root(&root, max_files))
        .await
        .map_err(|e| NashError::Generic(format!("Indexing task failed: {}", e)))
}

pub async fn index_directory(options: IndexOptions, config: &AppConfig) -> Result<()> {
    let root = resolve_root(options.path, config);
    let max_files = options.max_files.unwrap_or(config.max_files);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg} [{elapsed_precise}]")
            .map_err(|e| NashError::Generic(e.to_string()))?,
    );
    if options.json {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Loading embedding model...");

    let workspace = Workspace::open(&root, config)?;

    pb.set_message(format!("Indexing {}...", root.display()));
    let report = run_initial_index(workspace.indexer.clone(), root.clone(), max_files).await?;
    pb.finish_and_clear();

    info!(
        "Index holds {} documents after walking {}",
        workspace.store.len()?,
        root.display()
    );

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} of {} files under {}",
        "Indexed".green().bold(),
        report.indexed.to_string().cyan(),
        report.visited,
        root.display().to_string().yellow()
    );
    for (path, reason) in &report.skipped {
        println!("  {} {} ({})", "skipped".dimmed(), path, reason);
    }
    Ok(())
}
