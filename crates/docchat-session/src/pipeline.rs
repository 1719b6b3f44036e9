use docchat_core::{Chunk, DocchatError, DocchatResult, Document};
use docchat_memory::{Chunker, EmbeddingProvider, FlatIndex, IndexEntry, Similarity};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Summary of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Id of the ingested document.
    pub document_id: Uuid,
    /// File name or label of the document.
    pub source: String,
    /// Chunks stored in the index.
    pub chunks: usize,
    /// Whitespace-only chunks that were not embedded.
    pub skipped: usize,
    /// Embedding dimension of the index.
    pub dimension: usize,
    /// Wall time spent chunking and embedding.
    pub elapsed_ms: u64,
}

/// Chunk → embed → index, shared by every session of a manager.
///
/// Holds only immutable state, so one pipeline can serve concurrent
/// ingestions for independent sessions.
pub struct IngestPipeline {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    similarity: Similarity,
    embedding_timeout_secs: u64,
}

impl IngestPipeline {
    /// Create a pipeline. `embedding_timeout_secs` bounds every embedding call.
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        similarity: Similarity,
        embedding_timeout_secs: u64,
    ) -> Self {
        Self {
            chunker,
            embedder,
            similarity,
            embedding_timeout_secs,
        }
    }

    /// The chunker in use.
    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// The embedding backend in use.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Build a complete index for `document`.
    ///
    /// Errors are returned unwrapped; callers decide how to surface them.
    pub async fn build(&self, document: &Document) -> DocchatResult<(FlatIndex, IngestReport)> {
        let started = Instant::now();
        let chunks = self.chunker.split_document(document);
        let total = chunks.len();
        let chunks: Vec<Chunk> = chunks
            .into_iter()
            .filter(|c| !c.content.trim().is_empty())
            .collect();
        let skipped = total - chunks.len();

        if chunks.is_empty() {
            return Err(DocchatError::Embedding(format!(
                "'{}' contains no text to index",
                document.source
            )));
        }

        debug!(
            document_id = %document.id,
            chunks = chunks.len(),
            skipped,
            "Embedding chunks"
        );

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = within(
            "embedding",
            self.embedding_timeout_secs,
            self.embedder.embed_batch(&texts),
        )
        .await?;

        if vectors.len() != chunks.len() {
            return Err(DocchatError::Embedding(format!(
                "Requested {} embeddings, received {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let count = chunks.len();
        let entries: Vec<IndexEntry> = vectors
            .into_iter()
            .zip(chunks)
            .map(|(embedding, chunk)| IndexEntry { embedding, chunk })
            .collect();
        let dimension = entries.first().map_or(0, |e| e.embedding.len());
        let index = FlatIndex::build(entries, self.similarity)?;

        let report = IngestReport {
            document_id: document.id,
            source: document.source.clone(),
            chunks: count,
            skipped,
            dimension,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            document_id = %report.document_id,
            source = %report.source,
            chunks = report.chunks,
            dimension = report.dimension,
            elapsed_ms = report.elapsed_ms,
            "Index built"
        );
        Ok((index, report))
    }

    /// Embed a question for retrieval, under the embedding deadline.
    pub async fn embed_query(&self, text: &str) -> DocchatResult<Vec<f32>> {
        within(
            "embedding",
            self.embedding_timeout_secs,
            self.embedder.embed(text),
        )
        .await
    }
}

/// Run `fut` with a deadline, mapping expiry to [`DocchatError::Timeout`].
pub(crate) async fn within<T, F>(operation: &str, seconds: u64, fut: F) -> DocchatResult<T>
where
    F: Future<Output = DocchatResult<T>>,
{
    tokio::time::timeout(Duration::from_secs(seconds), fut)
        .await
        .map_err(|_| DocchatError::Timeout {
            operation: operation.to_string(),
            seconds,
        })?
}
