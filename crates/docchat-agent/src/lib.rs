//! Session configuration, prompt assembly and completion back ends.
//!
//! # Main types
//!
//! - [`SessionConfig`]: model, temperature and system prompt chosen for a session.
//! - [`ModelCatalog`]: the models a user may choose from.
//! - [`Prompt`]: system prompt, retrieved chunks, history and question for one call.
//! - [`CompletionService`]: trait for a language model bound to one config.
//! - [`CompletionFactory`]: creates a fresh service whenever a session is reconfigured.
//! - [`BackendFactory`]: dispatches to the Ollama or OpenAI-compatible backend.

/// Provider back ends.
pub mod backends;
/// Completion service and factory traits.
pub mod completion;
/// Session, backend, retrieval and timeout settings.
pub mod config;
/// Prompt assembly.
pub mod prompt;

pub use completion::{BackendFactory, CompletionFactory, CompletionService};
pub use config::{
    BackendConfig, LlmProvider, ModelCatalog, RetrievalConfig, SessionConfig, TimeoutConfig,
};
pub use prompt::{ChatMessage, Prompt};
