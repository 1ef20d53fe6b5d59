use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{AppConfig, DEFAULT_SYSTEM_PROMPT};
use crate::core::Result;
use crate::embedding::Embedder;
use crate::git::{GitContext, GitContextProvider};
use crate::history::{ConversationHistory, Role, Turn};
use crate::storage::{ContextStore, DocId, SearchHit};
use crate::text::truncate_bytes;

pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";
pub const HISTORY_HEADER: &str = "[History]";
pub const FILES_HEADER: &str = "[Files]";
pub const GIT_STATUS_HEADER: &str = "[Git Status]";
pub const GIT_DIFF_HEADER: &str = "[Git Staged Diff]";

/// Initial candidate pool size relative to `top_k`. The pool doubles while
/// collapsing duplicate paths leaves fewer than `top_k` files and the index
/// has more entries to offer.
const CANDIDATE_MULTIPLIER: usize = 5;

#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub top_k: usize,
    pub max_history: usize,
    pub history_turn_bytes: usize,
    pub system_prompt: String,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_history: ConversationHistory::DEFAULT_MAX_TURNS,
            history_turn_bytes: ConversationHistory::DEFAULT_TURN_BYTES,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl AssemblerOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.top_k,
            max_history: config.max_history,
            history_turn_bytes: config.history_turn_bytes,
            system_prompt: config.system_prompt.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub id: DocId,
    pub path: String,
    pub excerpt: String,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Everything retrieved for one query, before it is flattened for a transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledContext {
    pub history: Vec<Turn>,
    pub documents: Vec<RetrievedDocument>,
    pub git: GitContext,
}

impl AssembledContext {
    fn retrieval_sections(&self) -> Vec<String> {
        let mut sections = Vec::new();
        if !self.documents.is_empty() {
            let files = self
                .documents
                .iter()
                .map(|d| format!("{}:{}", d.path, d.excerpt))
                .collect::<Vec<_>>()
                .join("\n\n");
            sections.push(format!("{}\n{}", FILES_HEADER, files));
        }
        if !self.git.status.is_empty() {
            sections.push(format!("{}\n{}", GIT_STATUS_HEADER, self.git.status));
        }
        if !self.git.staged_diff.is_empty() {
            sections.push(format!("{}\n{}", GIT_DIFF_HEADER, self.git.staged_diff));
        }
        sections
    }

    /// History, then files, then Git, each under its header.
    pub fn render(&self) -> String {
        let mut sections = Vec::new();
        if !self.history.is_empty() {
            let turns = self
                .history
                .iter()
                .map(|t| format!("{}: {}", t.role, t.text))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("{}\n{}", HISTORY_HEADER, turns));
        }
        sections.extend(self.retrieval_sections());
        sections.join(SECTION_SEPARATOR)
    }

    /// Single-string form: rendered context followed by the query.
    pub fn prompt(&self, query: &str) -> String {
        let context = self.render();
        if context.is_empty() {
            query.to_string()
        } else {
            format!("{}\n{}", context, query)
        }
    }

    /// Message-list form: system prompt carrying files and Git context,
    /// the history as role-tagged turns, then the query as the user turn.
    pub fn to_messages(&self, system_prompt: &str, query: &str) -> Vec<ChatMessage> {
        let retrieval = self.retrieval_sections().join(SECTION_SEPARATOR);
        let system = if retrieval.is_empty() {
            system_prompt.to_string()
        } else {
            format!("{}\n\n{}", system_prompt, retrieval)
        };

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::new(Role::System, system));
        messages.extend(
            self.history
                .iter()
                .map(|t| ChatMessage::new(t.role, t.text.clone())),
        );
        messages.push(ChatMessage::new(Role::User, query));
        messages
    }
}

pub struct ContextAssembler {
    store: Arc<ContextStore>,
    embedder: Arc<dyn Embedder>,
    git: GitContextProvider,
    options: AssemblerOptions,
}

impl ContextAssembler {
    pub fn new(
        store: Arc<ContextStore>,
        embedder: Arc<dyn Embedder>,
        git: GitContextProvider,
        options: AssemblerOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            git,
            options,
        }
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    /// Fails only when the query itself cannot be embedded. An empty or
    /// unqueryable index degrades to history plus Git context.
    pub fn assemble(&self, query: &str, history: &ConversationHistory) -> Result<AssembledContext> {
        let vector = self.embedder.embed(query)?;

        let documents = match self.retrieve(&vector) {
            Ok(docs) => docs,
            Err(e) => {
                warn!("Retrieval failed, continuing without file context: {}", e);
                Vec::new()
            }
        };

        let history = history
            .recent(self.options.max_history)
            .into_iter()
            .map(|turn| Turn {
                text: truncate_bytes(&turn.text, self.options.history_turn_bytes).to_string(),
                role: turn.role,
            })
            .collect();

        Ok(AssembledContext {
            history,
            documents,
            git: self.git.capture(),
        })
    }

    pub fn build_context(&self, query: &str, history: &ConversationHistory) -> Result<String> {
        Ok(self.assemble(query, history)?.render())
    }

    pub fn build_messages(
        &self,
        query: &str,
        history: &ConversationHistory,
    ) -> Result<Vec<ChatMessage>> {
        Ok(self
            .assemble(query, history)?
            .to_messages(&self.options.system_prompt, query))
    }

    /// Top-k hits with one entry per path. Ranking follows the nearest hit
    /// for a path; the excerpt comes from that path's newest entry.
    fn retrieve(&self, vector: &[f32]) -> Result<Vec<RetrievedDocument>> {
        let k = self.options.top_k;
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut pool = k.saturating_mul(CANDIDATE_MULTIPLIER);
        loop {
            let hits = self.store.search(vector, pool)?;
            let exhausted = hits.len() < pool;
            let candidates = hits.len();
            let documents = collapse_by_path(hits, k);
            if documents.len() >= k || exhausted || pool == usize::MAX {
                debug!(
                    "Collapsed {} candidates to {} files for top-{}",
                    candidates,
                    documents.len(),
                    k
                );
                return Ok(documents);
            }
            pool = pool.saturating_mul(2);
        }
    }
}

fn collapse_by_path(hits: Vec<SearchHit>, k: usize) -> Vec<RetrievedDocument> {
    let mut by_path: HashMap<String, usize> = HashMap::new();
    let mut collapsed: Vec<RetrievedDocument> = Vec::new();

    for hit in hits {
        match by_path.get(&hit.path) {
            Some(&pos) => {
                let existing = &mut collapsed[pos];
                if hit.id > existing.id {
                    existing.id = hit.id;
                    existing.excerpt = hit.excerpt;
                }
            }
            None => {
                by_path.insert(hit.path.clone(), collapsed.len());
                collapsed.push(RetrievedDocument {
                    id: hit.id,
                    path: hit.path,
                    excerpt: hit.excerpt,
                    distance: hit.distance,
                });
            }
        }
    }

    collapsed.truncate(k);
    collapsed
}
