use ignore::WalkBuilder;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::embedding::Embedder;
use crate::storage::{ContextStore, DocId};
use crate::structure::StructureExtractor;

/// Decides which paths are never indexed. Both the initial walk and the
/// watcher go through [`Indexer`], so this is the only copy of the policy.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    hidden_marker: char,
    substrings: Vec<String>,
}

impl ExclusionRules {
    pub fn new(substrings: Vec<String>) -> Self {
        Self {
            hidden_marker: '.',
            substrings,
        }
    }

    /// True when any normal segment is hidden or contains an exclusion substring.
    /// `.`/`..`/root components are ignored so `./a.py` is not "hidden".
    pub fn is_excluded(&self, path: &Path) -> bool {
        path.components().any(|component| match component {
            Component::Normal(segment) => {
                let segment = segment.to_string_lossy();
                segment.starts_with(self.hidden_marker)
                    || self
                        .substrings
                        .iter()
                        .any(|ex| !ex.is_empty() && segment.contains(ex.as_str()))
            }
            _ => false,
        })
    }
}

impl Default for ExclusionRules {
    fn default() -> Self {
        Self::new(
            ["venv", "__pycache__", ".git", "site-packages", "node_modules", "target"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct IndexerOptions {
    pub max_file_size_bytes: u64,
    pub exclusions: ExclusionRules,
    /// Lowercase extensions without the dot; empty accepts everything.
    pub extensions: Vec<String>,
    pub respect_gitignore: bool,
    pub structural_summary: bool,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 1024 * 1024,
            exclusions: ExclusionRules::default(),
            extensions: Vec::new(),
            respect_gitignore: true,
            structural_summary: true,
        }
    }
}

impl IndexerOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes,
            exclusions: ExclusionRules::new(config.exclusions.clone()),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            respect_gitignore: config.respect_gitignore,
            structural_summary: config.structural_summary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    Excluded,
    NotAFile,
    UnsupportedExtension,
    TooLarge { size: u64, limit: u64 },
    Unreadable(String),
    NotText,
    Embedding(String),
    Store(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Excluded => write!(f, "excluded"),
            SkipReason::NotAFile => write!(f, "not a regular file"),
            SkipReason::UnsupportedExtension => write!(f, "extension not selected"),
            SkipReason::TooLarge { size, limit } => {
                write!(f, "size {} bytes exceeds limit of {} bytes", size, limit)
            }
            SkipReason::Unreadable(e) => write!(f, "unreadable: {}", e),
            SkipReason::NotText => write!(f, "not valid UTF-8 text"),
            SkipReason::Embedding(e) => write!(f, "embedding failed: {}", e),
            SkipReason::Store(e) => write!(f, "store rejected document: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    Ok(String),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed(DocId),
    Skipped(SkipReason),
}

impl IndexOutcome {
    pub fn is_indexed(&self) -> bool {
        matches!(self, IndexOutcome::Indexed(_))
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct IndexReport {
    /// Files that passed the exclusion and extension filters, capped at `max_files`.
    pub visited: usize,
    pub indexed: usize,
    pub skipped: Vec<(String, SkipReason)>,
}

pub struct Indexer {
    root: PathBuf,
    given_root: PathBuf,
    store: Arc<ContextStore>,
    embedder: Arc<dyn Embedder>,
    extractor: StructureExtractor,
    options: IndexerOptions,
}

impl Indexer {
    /// `root` anchors exclusion checks for incremental reindexing: only the
    /// part of an event path below it is inspected.
    pub fn new(
        root: impl AsRef<Path>,
        store: Arc<ContextStore>,
        embedder: Arc<dyn Embedder>,
        options: IndexerOptions,
    ) -> Self {
        let root = root.as_ref();
        Self {
            root: root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
            given_root: root.to_path_buf(),
            store,
            embedder,
            extractor: StructureExtractor::new(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }

    pub fn options(&self) -> &IndexerOptions {
        &self.options
    }

    fn relative<'p>(path: &'p Path, base: &Path) -> &'p Path {
        path.strip_prefix(base).unwrap_or(path)
    }

    /// Applies the exclusion rules to the part of `path` below the root,
    /// whichever spelling of the root the caller used.
    fn is_excluded(&self, path: &Path) -> bool {
        let rules = &self.options.exclusions;
        for base in [&self.root, &self.given_root] {
            if let Ok(rel) = path.strip_prefix(base) {
                return rules.is_excluded(rel);
            }
        }
        if let Ok(canonical) = path.canonicalize() {
            if let Ok(rel) = canonical.strip_prefix(&self.root) {
                return rules.is_excluded(rel);
            }
        }
        rules.is_excluded(path)
    }

    fn extension_selected(&self, path: &Path) -> bool {
        if self.options.extensions.is_empty() {
            return true;
        }
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        self.options.extensions.iter().any(|e| *e == ext)
    }

    /// Walks `root` in lexicographic order and indexes up to `max_files`
    /// eligible files. Per-file failures are recorded, never returned.
    pub fn index_root(&self, root: &Path, max_files: usize) -> IndexReport {
        let mut report = IndexReport::default();
        if max_files == 0 {
            return report;
        }

        let walk_root = root.to_path_buf();
        let rules = self.options.exclusions.clone();
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(self.options.respect_gitignore)
            .git_exclude(self.options.respect_gitignore)
            .git_global(false)
            .require_git(false)
            .ignore(false)
            .parents(self.options.respect_gitignore)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                entry.depth() == 0 || !rules.is_excluded(Self::relative(entry.path(), &walk_root))
            })
            .build();

        for result in walker {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Error walking entry: {}", err);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }

            let path = entry.path();
            if !self.extension_selected(path) {
                continue;
            }

            report.visited += 1;
            match self.index_path(path) {
                IndexOutcome::Indexed(_) => report.indexed += 1,
                IndexOutcome::Skipped(reason) => {
                    debug!("Skipped {}: {}", path.display(), reason);
                    report.skipped.push((path.display().to_string(), reason));
                }
            }

            if report.visited >= max_files {
                info!("Reached max_files limit of {}", max_files);
                break;
            }
        }

        info!(
            "Indexed {} of {} files under {}",
            report.indexed,
            report.visited,
            root.display()
        );
        report
    }

    /// Incremental entry point used by the watcher.
    pub fn reindex_one(&self, path: &Path) -> IndexOutcome {
        if self.is_excluded(path) {
            return IndexOutcome::Skipped(SkipReason::Excluded);
        }
        if !self.extension_selected(path) {
            return IndexOutcome::Skipped(SkipReason::UnsupportedExtension);
        }
        let outcome = self.index_path(path);
        match &outcome {
            IndexOutcome::Indexed(id) => info!("Re-indexed {} as #{}", path.display(), id),
            IndexOutcome::Skipped(reason) => debug!("Skipped {}: {}", path.display(), reason),
        }
        outcome
    }

    /// Forgets a path that no longer exists. Only meaningful under
    /// replace-by-path; append-only stores keep history by definition.
    pub fn remove_path(&self, path: &Path) -> usize {
        let key = document_key(path);
        match self.store.remove_path(&key) {
            Ok(removed) => {
                if removed > 0 {
                    info!("Removed {} entries for {}", removed, key);
                }
                removed
            }
            Err(e) => {
                warn!("Failed to remove entries for {}: {}", key, e);
                0
            }
        }
    }

    pub fn read_file(&self, path: &Path) -> ReadResult {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) => return ReadResult::Skipped(SkipReason::Unreadable(e.to_string())),
        };
        if !metadata.is_file() {
            return ReadResult::Skipped(SkipReason::NotAFile);
        }
        // OOM protection
        if metadata.len() > self.options.max_file_size_bytes {
            return ReadResult::Skipped(SkipReason::TooLarge {
                size: metadata.len(),
                limit: self.options.max_file_size_bytes,
            });
        }
        match fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(content) => ReadResult::Ok(content),
                Err(_) => ReadResult::Skipped(SkipReason::NotText),
            },
            Err(e) => ReadResult::Skipped(SkipReason::Unreadable(e.to_string())),
        }
    }

    fn embedding_input(&self, path: &Path, content: &str) -> String {
        if !self.options.structural_summary {
            return content.to_string();
        }
        match self.extractor.summarize(path, content) {
            Some(summary) if !summary.is_empty() => format!("{}\n{}", content, summary.render()),
            _ => content.to_string(),
        }
    }

    fn index_path(&self, path: &Path) -> IndexOutcome {
        let content = match self.read_file(path) {
            ReadResult::Ok(content) => content,
            ReadResult::Skipped(reason) => return IndexOutcome::Skipped(reason),
        };

        let input = self.embedding_input(path, &content);
        let embedding = match self.embedder.embed(&input) {
            Ok(v) => v,
            Err(e) => {
                warn!("Error generating embedding for {}: {}", path.display(), e);
                return IndexOutcome::Skipped(SkipReason::Embedding(e.to_string()));
            }
        };

        let key = document_key(path);
        match self.store.add_document(&key, &content, embedding) {
            Ok(id) => IndexOutcome::Indexed(id),
            Err(e) => {
                warn!("Error storing {}: {}", key, e);
                IndexOutcome::Skipped(SkipReason::Store(e.to_string()))
            }
        }
    }
}

/// Canonical spelling of `path` used as the stored document path, so the
/// initial walk and watcher events agree on one key per file. Paths that no
/// longer exist are resolved through their parent directory.
pub fn document_key(path: &Path) -> String {
    if let Ok(canonical) = path.canonicalize() {
        return canonical.display().to_string();
    }
    let resolved = match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or_else(|_| path.to_path_buf()),
        _ => path.to_path_buf(),
    };
    resolved.display().to_string()
}
