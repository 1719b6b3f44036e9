//! Retrieval building blocks: chunking, embeddings, the vector index,
//! document loaders and conversation memory.
//!
//! # Main types
//!
//! - [`Chunker`]: Splits extracted text into overlapping, separator-aligned chunks.
//! - [`EmbeddingProvider`]: Trait for turning text into vectors.
//! - [`LocalEmbedding`]: Deterministic hashed bag-of-words embedding.
//! - [`OllamaEmbedding`]: Embeddings served by Ollama (feature `http-embeddings`).
//! - [`VectorIndex`]: Trait for nearest-neighbour search over chunk embeddings.
//! - [`FlatIndex`]: Brute-force in-memory index (cosine or euclidean).
//! - [`ConversationMemory`]: Append-only log of question/answer turns.
//! - [`LoaderRegistry`]: Maps file formats to document extractors.

/// Character splitter with overlap.
pub mod chunker;
/// Conversation history.
pub mod conversation;
/// Embedding provider trait and local implementation.
pub mod embedding;
/// Vector index trait and flat implementation.
pub mod index;
/// Document extractors per file format.
pub mod loader;
/// Ollama embedding client.
#[cfg(feature = "http-embeddings")]
pub mod ollama;

pub use chunker::{ChunkSpan, Chunker, ChunkerConfig};
pub use conversation::ConversationMemory;
pub use embedding::{EmbeddingProvider, LocalEmbedding};
pub use index::{FlatIndex, IndexEntry, ScoredChunk, Similarity, VectorIndex};
pub use loader::{
    CommandLoader, CommandLoaderConfig, CsvLoader, DocumentExtractor, LoaderConfig,
    LoaderRegistry, TextLoader,
};
#[cfg(feature = "http-embeddings")]
pub use ollama::OllamaEmbedding;
