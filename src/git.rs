use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::config::AppConfig;
use crate::text::truncate_bytes;

/// Working-tree state captured fresh for each query; never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitContext {
    pub status: String,
    pub staged_diff: String,
}

impl GitContext {
    pub fn is_empty(&self) -> bool {
        self.status.is_empty() && self.staged_diff.is_empty()
    }
}

/// Shells out to `git`. Every failure (no binary, not a repository,
/// non-zero exit, non-UTF-8 output) degrades to an empty string.
#[derive(Debug, Clone)]
pub struct GitContextProvider {
    repo_dir: PathBuf,
    git_binary: String,
    status_cap: usize,
    per_file_cap: usize,
    max_files: usize,
}

impl GitContextProvider {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            git_binary: "git".to_string(),
            status_cap: 4000,
            per_file_cap: 1000,
            max_files: 20,
        }
    }

    pub fn from_config(repo_dir: impl Into<PathBuf>, config: &AppConfig) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            git_binary: config.git_binary.clone(),
            status_cap: config.git_status_bytes,
            per_file_cap: config.git_diff_file_bytes,
            max_files: config.git_diff_max_files,
        }
    }

    pub fn with_git_binary(mut self, binary: impl Into<String>) -> Self {
        self.git_binary = binary.into();
        self
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    pub fn per_file_cap(&self) -> usize {
        self.per_file_cap
    }

    fn run(&self, args: &[&str]) -> Option<String> {
        // Unquoted UTF-8 names, usable verbatim as pathspecs.
        let output = match Command::new(&self.git_binary)
            .args(["-c", "core.quotePath=false"])
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                debug!("git {:?} could not be spawned: {}", args, e);
                return None;
            }
        };
        if !output.status.success() {
            debug!("git {:?} exited with {}", args, output.status);
            return None;
        }
        String::from_utf8(output.stdout).ok()
    }

    /// Short-format status, capped in bytes.
    pub fn status(&self) -> String {
        self.run(&["status", "--short"])
            .map(|out| truncate_bytes(out.trim_end(), self.status_cap).to_string())
            .unwrap_or_default()
    }

    /// Staged changes under `repo_dir` as `<file>:<diff>` blocks, each diff
    /// cut to `per_file_cap` bytes, at most `max_files` files. File names are
    /// relative to `repo_dir`, which may be a subdirectory of the repository.
    pub fn staged_diff(&self, per_file_cap: usize) -> String {
        let names = match self.run(&["diff", "--cached", "--name-only", "--relative"]) {
            Some(out) => out,
            None => return String::new(),
        };

        let mut chunks = Vec::new();
        for file in names.lines().filter(|l| !l.is_empty()) {
            if chunks.len() >= self.max_files {
                break;
            }
            if let Some(diff) = self.run(&["--literal-pathspecs", "diff", "--cached", "--", file]) {
                let diff = diff.trim();
                if !diff.is_empty() {
                    chunks.push(format!("{}:{}", file, truncate_bytes(diff, per_file_cap)));
                }
            }
        }
        chunks.join("\n\n")
    }

    pub fn capture(&self) -> GitContext {
        GitContext {
            status: self.status(),
            staged_diff: self.staged_diff(self.per_file_cap),
        }
    }
}
