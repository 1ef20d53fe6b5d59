pub mod context;
pub mod git;
pub mod index;
pub mod session;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::context::{AssemblerOptions, ContextAssembler};
use crate::core::Result;
use crate::embedding::{build_embedder, Embedder};
use crate::git::GitContextProvider;
use crate::indexer::{Indexer, IndexerOptions};
use crate::storage::ContextStore;

/// The components every command shares, wired for one project directory.
pub struct Workspace {
    pub root: PathBuf,
    pub store: Arc<ContextStore>,
    pub embedder: Arc<dyn Embedder>,
    pub indexer: Arc<Indexer>,
    pub assembler: Arc<ContextAssembler>,
}

impl Workspace {
    pub fn open(root: &Path, config: &AppConfig) -> Result<Self> {
        let embedder = build_embedder(config)?;
        Self::with_embedder(root, config, embedder)
    }

    pub fn with_embedder(
        root: &Path,
        config: &AppConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        info!(
            "Opening workspace {} with model {} (dim {})",
            root.display(),
            embedder.model_name(),
            embedder.dim()
        );
        let store = Arc::new(ContextStore::new(
            embedder.dim(),
            config.distance_metric()?,
            config.excerpt_bytes,
            config.reindex_policy()?,
        ));
        let indexer = Arc::new(Indexer::new(
            root,
            store.clone(),
            embedder.clone(),
            IndexerOptions::from_config(config),
        ));
        let assembler = Arc::new(ContextAssembler::new(
            store.clone(),
            embedder.clone(),
            GitContextProvider::from_config(root, config),
            AssemblerOptions::from_config(config),
        ));
        Ok(Self {
            root: root.to_path_buf(),
            store,
            embedder,
            indexer,
            assembler,
        })
    }
}

/// Resolves an optional CLI path against the configured default.
pub fn resolve_root(path: Option<String>, config: &AppConfig) -> PathBuf {
    PathBuf::from(path.unwrap_or_else(|| config.index_path.clone()))
}
