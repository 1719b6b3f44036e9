//! Document chat sessions: ingestion, configuration and question answering.
//!
//! # Main types
//!
//! - [`RagSession`]: one conversation over one indexed document.
//! - [`SessionState`]: `Empty`, `Indexed` or `Ready`, derived from the session.
//! - [`IngestPipeline`]: chunk, embed and index a document.
//! - [`SessionManager`]: many sessions behind per-session locks, with background ingestion.

/// Session registry.
pub mod manager;
/// Chunk, embed and index.
pub mod pipeline;
/// The per-document session state machine.
pub mod session;

pub use manager::SessionManager;
pub use pipeline::{IngestPipeline, IngestReport};
pub use session::{RagSession, SessionOptions, SessionState};
