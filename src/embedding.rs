use fastembed::{
    EmbeddingModel, InitOptions, InitOptionsUserDefined, TextEmbedding, TokenizerFiles,
    UserDefinedEmbeddingModel,
};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::{AppConfig, EmbeddingBackend};
use crate::core::{NashError, Result};
use crate::text::truncate_chars;

/// Turns text into a fixed-length vector.
///
/// Implementations are deterministic for a given model and input, accept
/// arbitrarily large input (truncating to a model-defined maximum) and
/// return a zero vector for empty input instead of failing.
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Selects the embedding strategy named by `embedding_backend`.
pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>> {
    match config.embedding_backend()? {
        EmbeddingBackend::FastEmbed => Ok(Arc::new(FastEmbedder::new(
            &config.embedding_model,
            config.embedding_model_path.as_deref(),
            config.embedding_max_chars,
            true,
        )?)),
        EmbeddingBackend::Hash => Ok(Arc::new(HashEmbedder::new(config.hash_dim))),
    }
}

fn load_tokenizer_files(path: &Path) -> std::io::Result<TokenizerFiles> {
    Ok(TokenizerFiles {
        tokenizer_file: fs::read(path.join("tokenizer.json"))?,
        config_file: fs::read(path.join("config.json"))?,
        special_tokens_map_file: fs::read(path.join("special_tokens_map.json"))?,
        tokenizer_config_file: fs::read(path.join("tokenizer_config.json"))?,
    })
}

fn model_from_name(name: &str) -> EmbeddingModel {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" => EmbeddingModel::AllMiniLML6V2,
        "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "nomic-embed-text-v1.5" => EmbeddingModel::NomicEmbedTextV15,
        _ => {
            tracing::warn!(
                "Unknown embedding model '{}', falling back to AllMiniLML6V2",
                name
            );
            EmbeddingModel::AllMiniLML6V2
        }
    }
}

/// ONNX sentence-embedding model run locally through fastembed.
pub struct FastEmbedder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    max_chars: usize,
    dim: usize,
}

impl FastEmbedder {
    pub fn new(
        embedding_model: &str,
        embedding_model_path: Option<&str>,
        max_chars: usize,
        quiet: bool,
    ) -> Result<Self> {
        let mut model = if let Some(path_str) = embedding_model_path {
            let path = Path::new(path_str);
            tracing::info!("Loading user-defined embedding model from: {}", path_str);

            let tokenizer_files = load_tokenizer_files(path)?;
            let onnx_file = fs::read(path.join("model.onnx"))?;

            let model_def = UserDefinedEmbeddingModel::new(onnx_file, tokenizer_files);
            TextEmbedding::try_new_from_user_defined(model_def, InitOptionsUserDefined::default())
                .map_err(|e| NashError::Embedding(e.to_string()))?
        } else {
            let mut options = InitOptions::new(model_from_name(embedding_model));
            options.show_download_progress = !quiet;
            TextEmbedding::try_new(options).map_err(|e| NashError::Embedding(e.to_string()))?
        };

        // Measure the output width once; every later vector must match it.
        let warmup = model
            .embed(vec!["warmup".to_string()], None)
            .map_err(|e| NashError::Embedding(e.to_string()))?;
        let dim = warmup
            .first()
            .map(|v| v.len())
            .ok_or_else(|| NashError::Embedding("model returned no warmup vector".into()))?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: embedding_model.to_string(),
            max_chars,
            dim,
        })
    }
}

impl Embedder for FastEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dim]);
        }
        let input = truncate_chars(text, self.max_chars).to_string();

        let mut model = self.model.lock().map_err(|_| NashError::LockPoisoned)?;
        let mut vectors = model
            .embed(vec![input], None)
            .map_err(|e| NashError::Embedding(e.to_string()))?;
        let vector = vectors
            .pop()
            .ok_or_else(|| NashError::Embedding("model returned no vector".into()))?;

        if vector.len() != self.dim {
            return Err(NashError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Feature-hashing bag-of-words embedder.
///
/// Lowercased alphanumeric tokens are hashed into `dim` signed buckets and
/// the result is L2-normalised, so texts sharing vocabulary land close to
/// each other. No model download, stable across runs and platforms.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub const MAX_TOKENS: usize = 8192;

    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "feature-hash"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dim];

        let tokens = text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
            .take(Self::MAX_TOKENS);

        for token in tokens {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dim as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}
