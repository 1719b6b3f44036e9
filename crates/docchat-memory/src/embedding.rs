use async_trait::async_trait;
use docchat_core::{DocchatError, DocchatResult};
use std::collections::HashMap;

/// Trait for computing text embeddings (vector representations).
///
/// Implementations must fail rather than return a zero vector: a zero vector
/// scores 0 against everything and would silently corrupt rankings.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embedding vector for a single text.
    async fn embed(&self, text: &str) -> DocchatResult<Vec<f32>>;

    /// Compute embeddings for a batch of texts, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> DocchatResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimension of the embedding vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Local bag-of-words embedding (no external service needed).
/// Uses TF-based sparse-to-dense mapping with a fixed dimension.
/// Deterministic, which makes it the embedder of choice for tests and offline runs.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    /// Create an embedder producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> DocchatResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(DocchatError::Embedding(
                "Cannot embed empty text".to_string(),
            ));
        }

        let lowered = text.to_lowercase();
        let mut tokens: Vec<String> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        // Punctuation-only text still gets a distinct, non-zero vector.
        if tokens.is_empty() {
            tokens = lowered
                .chars()
                .filter(|c| !c.is_whitespace())
                .map(String::from)
                .collect();
        }

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for token in &tokens {
            *freq.entry(token.as_str()).or_insert(0.0) += 1.0;
        }

        let total = tokens.len() as f32;
        let mut vector = vec![0.0f32; self.dimension];

        // Hash each token to several dimensions and add its TF weight
        for (token, count) in &freq {
            let tf = count / total;
            let hash1 = simple_hash(token.as_bytes()) as usize;
            let hash2 = simple_hash(&[token.as_bytes(), &[1u8]].concat()) as usize;
            let hash3 = simple_hash(&[token.as_bytes(), &[2u8]].concat()) as usize;

            vector[hash1 % self.dimension] += tf;
            vector[hash2 % self.dimension] += tf * 0.7;
            vector[hash3 % self.dimension] += tf * 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(DocchatError::Embedding(
                "Text produced a zero vector".to_string(),
            ));
        }
        for v in &mut vector {
            *v /= norm;
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Simple deterministic hash function (FNV-1a).
fn simple_hash(data: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}
