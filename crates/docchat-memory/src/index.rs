use async_trait::async_trait;
use docchat_core::{Chunk, DocchatError, DocchatResult};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A chunk together with its embedding, as stored in an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Embedding of `chunk.content`.
    pub embedding: Vec<f32>,
    /// The indexed chunk.
    pub chunk: Chunk,
}

/// Result of a similarity search.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The matching chunk.
    pub chunk: Chunk,
    /// Similarity to the query; higher is closer.
    pub score: f32,
}

/// How query and entry vectors are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    /// Cosine similarity in [-1, 1]; ignores vector magnitude.
    #[default]
    Cosine,
    /// `1 / (1 + L2 distance)`, in (0, 1].
    Euclidean,
}

impl Similarity {
    /// Score two vectors of equal length.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Similarity::Cosine => cosine_similarity(a, b),
            Similarity::Euclidean => {
                let dist: f32 = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + dist)
            }
        }
    }
}

/// Trait for nearest-neighbour indexes over chunk embeddings.
///
/// [`FlatIndex`] scans every entry; an approximate index can implement the
/// same trait without changing callers.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append entries. All-or-nothing: a bad entry rejects the whole batch.
    async fn add(&self, entries: Vec<IndexEntry>) -> DocchatResult<()>;

    /// The `k` entries most similar to `query`, best first. `k` is clamped to the index size.
    async fn search(&self, query: &[f32], k: usize) -> DocchatResult<Vec<ScoredChunk>>;

    /// Number of stored entries.
    async fn len(&self) -> usize;

    /// Whether the index holds no entries.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Vector dimension, fixed by the first entry.
    async fn dimension(&self) -> Option<usize>;
}

#[derive(Debug)]
struct FlatInner {
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
}

/// In-memory index using a brute-force similarity scan.
/// Suitable for single-document corpora (hundreds to a few thousand chunks).
#[derive(Debug)]
pub struct FlatIndex {
    inner: RwLock<FlatInner>,
    similarity: Similarity,
}

impl FlatIndex {
    /// Create an empty index; the dimension is fixed by the first `add`.
    pub fn new(similarity: Similarity) -> Self {
        Self {
            inner: RwLock::new(FlatInner {
                dimension: None,
                entries: Vec::new(),
            }),
            similarity,
        }
    }

    /// Build an index from entries, failing on inconsistent dimensions.
    pub fn build(entries: Vec<IndexEntry>, similarity: Similarity) -> DocchatResult<Self> {
        let dimension = validate_entries(None, &entries)?;
        Ok(Self {
            inner: RwLock::new(FlatInner { dimension, entries }),
            similarity,
        })
    }

    /// The comparison used by `search`.
    pub fn similarity(&self) -> Similarity {
        self.similarity
    }
}

impl Default for FlatIndex {
    fn default() -> Self {
        Self::new(Similarity::default())
    }
}

/// Checks entries against `dimension` (or the first entry's length) and returns the dimension.
fn validate_entries(
    dimension: Option<usize>,
    entries: &[IndexEntry],
) -> DocchatResult<Option<usize>> {
    let mut dimension = dimension;
    for entry in entries {
        let len = entry.embedding.len();
        if len == 0 {
            return Err(DocchatError::Embedding(format!(
                "Chunk {} has an empty embedding",
                entry.chunk.sequence
            )));
        }
        if entry.embedding.iter().any(|v| !v.is_finite()) {
            return Err(DocchatError::Embedding(format!(
                "Chunk {} has a non-finite embedding component",
                entry.chunk.sequence
            )));
        }
        match dimension {
            Some(expected) if expected != len => {
                return Err(DocchatError::DimensionMismatch {
                    expected,
                    actual: len,
                });
            }
            Some(_) => {}
            None => dimension = Some(len),
        }
    }
    Ok(dimension)
}

#[async_trait]
impl VectorIndex for FlatIndex {
    async fn add(&self, entries: Vec<IndexEntry>) -> DocchatResult<()> {
        let mut inner = self.inner.write().await;
        inner.dimension = validate_entries(inner.dimension, &entries)?;
        inner.entries.extend(entries);
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> DocchatResult<Vec<ScoredChunk>> {
        if query.is_empty() {
            return Err(DocchatError::Embedding("Empty query embedding".to_string()));
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(DocchatError::Embedding(
                "Query embedding has a non-finite component".to_string(),
            ));
        }

        let inner = self.inner.read().await;
        let Some(dimension) = inner.dimension else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(DocchatError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<ScoredChunk> = inner
            .entries
            .iter()
            .map(|e| ScoredChunk {
                chunk: e.chunk.clone(),
                score: self.similarity.score(query, &e.embedding),
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    async fn dimension(&self) -> Option<usize> {
        self.inner.read().await.dimension
    }
}

/// Cosine similarity between two vectors; 0 when either has zero norm.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
