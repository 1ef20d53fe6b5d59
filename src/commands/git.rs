use colored::*;

use crate::commands::resolve_root;
use crate::config::AppConfig;
use crate::context::{GIT_DIFF_HEADER, GIT_STATUS_HEADER};
use crate::core::Result;
use crate::git::GitContextProvider;

pub fn print_git_context(path: Option<String>, config: &AppConfig) -> Result<()> {
    let root = resolve_root(path, config);
    let git = GitContextProvider::from_config(&root, config).capture();

    if git.is_empty() {
        println!("{}", "No Git context (not a repository, or clean with nothing staged)".dimmed());
        return Ok(());
    }
    if !git.status.is_empty() {
        println!("{}\n{}", GIT_STATUS_HEADER.bold(), git.status);
    }
    if !git.staged_diff.is_empty() {
        if !git.status.is_empty() {
            println!();
        }
        println!("{}\n{}", GIT_DIFF_HEADER.bold(), git.staged_diff);
    }
    Ok(())
}
