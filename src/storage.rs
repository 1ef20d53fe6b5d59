//! In-memory vector index and document store.
//!
//! [`VectorIndex`] and [`DocumentStore`] are plain single-threaded
//! structures. [`ContextStore`] owns both behind one mutex so that every
//! insert, removal and search sees them in a consistent state: an id is
//! either present in both or in neither.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::config::{DistanceMetric, ReindexPolicy};
use crate::core::{NashError, Result};
use crate::text::truncate_bytes;

pub type DocId = u64;

/// Squared Euclidean distance. Monotonic with L2, no square root needed for ranking.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// `1 - cosine_similarity`; zero vectors are treated as maximally distant (1.0).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        1.0
    } else {
        1.0 - dot / (mag_a * mag_b)
    }
}

impl DistanceMetric {
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::SquaredEuclidean => squared_euclidean(a, b),
            DistanceMetric::Cosine => cosine_distance(a, b),
        }
    }
}

/// Flat (brute-force) nearest-neighbour index.
pub struct VectorIndex {
    dim: usize,
    metric: DistanceMetric,
    next_id: DocId,
    entries: Vec<(DocId, Vec<f32>)>,
}

impl VectorIndex {
    pub fn new(dim: usize, metric: DistanceMetric) -> Self {
        Self {
            dim,
            metric,
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn check_dim(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(NashError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Stores `vector` under the next monotonic id.
    pub fn insert(&mut self, vector: Vec<f32>) -> Result<DocId> {
        self.check_dim(&vector)?;
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, vector));
        Ok(id)
    }

    pub fn remove(&mut self, id: DocId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        before != self.entries.len()
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }

    /// Up to `k` `(id, distance)` pairs, nearest first. Equal distances keep
    /// insertion order. An empty index yields an empty list.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(DocId, f32)>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        self.check_dim(query)?;

        let mut scored: Vec<(DocId, f32)> = self
            .entries
            .iter()
            .map(|(id, vector)| (*id, self.metric.distance(query, vector)))
            .collect();

        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    pub path: String,
    pub excerpt: String,
}

/// `id -> (path, excerpt)`; keeps a bounded prefix, never the full content.
pub struct DocumentStore {
    excerpt_bytes: usize,
    documents: HashMap<DocId, StoredDocument>,
}

impl DocumentStore {
    pub fn new(excerpt_bytes: usize) -> Self {
        Self {
            excerpt_bytes,
            documents: HashMap::new(),
        }
    }

    pub fn put(&mut self, id: DocId, path: &str, content: &str) {
        self.documents.insert(
            id,
            StoredDocument {
                path: path.to_string(),
                excerpt: truncate_bytes(content, self.excerpt_bytes).to_string(),
            },
        );
    }

    pub fn get(&self, id: DocId) -> Option<&StoredDocument> {
        self.documents.get(&id)
    }

    pub fn remove(&mut self, id: DocId) -> Option<StoredDocument> {
        self.documents.remove(&id)
    }

    pub fn ids_for_path(&self, path: &str) -> Vec<DocId> {
        let mut ids: Vec<DocId> = self
            .documents
            .iter()
            .filter(|(_, doc)| doc.path == path)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: DocId,
    pub distance: f32,
    pub path: String,
    pub excerpt: String,
}

struct StoreInner {
    index: VectorIndex,
    documents: DocumentStore,
}

/// The process-wide index shared by the indexer, the watcher and the
/// context assembler. Pass it around as `Arc<ContextStore>`.
pub struct ContextStore {
    inner: Mutex<StoreInner>,
    policy: ReindexPolicy,
}

impl ContextStore {
    pub fn new(
        dim: usize,
        metric: DistanceMetric,
        excerpt_bytes: usize,
        policy: ReindexPolicy,
    ) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                index: VectorIndex::new(dim, metric),
                documents: DocumentStore::new(excerpt_bytes),
            }),
            policy,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        self.inner.lock().map_err(|_| NashError::LockPoisoned)
    }

    pub fn policy(&self) -> ReindexPolicy {
        self.policy
    }

    pub fn dim(&self) -> Result<usize> {
        Ok(self.lock()?.index.dim())
    }

    /// Inserts a document into both structures as one unit.
    ///
    /// Under [`ReindexPolicy::ReplaceByPath`] any earlier entries for `path`
    /// are removed inside the same critical section.
    pub fn add_document(&self, path: &str, content: &str, embedding: Vec<f32>) -> Result<DocId> {
        let mut inner = self.lock()?;
        // Validate before touching either structure.
        inner.index.check_dim(&embedding)?;

        if self.policy == ReindexPolicy::ReplaceByPath {
            for old in inner.documents.ids_for_path(path) {
                inner.index.remove(old);
                inner.documents.remove(old);
            }
        }

        let id = inner.index.insert(embedding)?;
        inner.documents.put(id, path, content);
        Ok(id)
    }

    /// Drops every entry stored for `path`. Returns how many were removed.
    pub fn remove_path(&self, path: &str) -> Result<usize> {
        let mut inner = self.lock()?;
        let ids = inner.documents.ids_for_path(path);
        for id in &ids {
            inner.index.remove(*id);
            inner.documents.remove(*id);
        }
        Ok(ids.len())
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let inner = self.lock()?;
        let neighbours = inner.index.search(query, k)?;
        Ok(neighbours
            .into_iter()
            .filter_map(|(id, distance)| {
                inner.documents.get(id).map(|doc| SearchHit {
                    id,
                    distance,
                    path: doc.path.clone(),
                    excerpt: doc.excerpt.clone(),
                })
            })
            .collect())
    }

    pub fn get(&self, id: DocId) -> Result<Option<StoredDocument>> {
        Ok(self.lock()?.documents.get(id).cloned())
    }

    pub fn ids_for_path(&self, path: &str) -> Result<Vec<DocId>> {
        Ok(self.lock()?.documents.ids_for_path(path))
    }

    /// All stored paths, one per document, in id order.
    pub fn paths(&self) -> Result<Vec<String>> {
        let inner = self.lock()?;
        let mut docs: Vec<(&DocId, &StoredDocument)> = inner.documents.documents.iter().collect();
        docs.sort_by_key(|(id, _)| **id);
        Ok(docs.into_iter().map(|(_, doc)| doc.path.clone()).collect())
    }

    pub fn len(&self) -> Result<usize> {
        let inner = self.lock()?;
        debug_assert_eq!(inner.index.len(), inner.documents.len());
        Ok(inner.documents.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
