use crate::pipeline::{within, IngestPipeline, IngestReport};
use docchat_agent::{
    CompletionFactory, CompletionService, ModelCatalog, Prompt, RetrievalConfig, SessionConfig,
    TimeoutConfig,
};
use docchat_core::{ConversationTurn, DocchatError, DocchatResult, Document};
use docchat_memory::{ConversationMemory, FlatIndex, ScoredChunk, VectorIndex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where a session is in its lifecycle. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No document has been indexed yet.
    Empty,
    /// A document is indexed but no model is bound.
    Indexed,
    /// Indexed and bound; questions can be asked.
    Ready,
}

impl SessionState {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Indexed => "indexed",
            SessionState::Ready => "ready",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by every session a manager creates.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Models a session may be configured with.
    pub catalog: ModelCatalog,
    /// Retrieval depth and prompt history settings.
    pub retrieval: RetrievalConfig,
    /// Deadlines for embedding and completion calls.
    pub timeouts: TimeoutConfig,
}

/// Log a rejected document and wrap the failure as [`DocchatError::Ingestion`].
pub(crate) fn ingestion_failed(
    session_id: Uuid,
    document: &Document,
    e: DocchatError,
) -> DocchatError {
    warn!(%session_id, source = %document.source, error = %e, "Ingestion rejected");
    DocchatError::ingestion(e)
}

/// One user's conversation over one document.
///
/// A session is driven by a single caller at a time; [`SessionManager`](crate::SessionManager)
/// serialises access when sessions are shared between tasks.
pub struct RagSession {
    id: Uuid,
    pipeline: Arc<IngestPipeline>,
    factory: Arc<dyn CompletionFactory>,
    options: SessionOptions,
    index: Option<FlatIndex>,
    document: Option<IngestReport>,
    config: Option<SessionConfig>,
    binding: Option<Box<dyn CompletionService>>,
    generation: u64,
    memory: ConversationMemory,
}

impl RagSession {
    /// Create an empty session.
    pub fn new(
        pipeline: Arc<IngestPipeline>,
        factory: Arc<dyn CompletionFactory>,
        options: SessionOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline,
            factory,
            options,
            index: None,
            document: None,
            config: None,
            binding: None,
            generation: 0,
            memory: ConversationMemory::new(),
        }
    }

    /// Session id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        match (&self.index, &self.binding) {
            (None, _) => SessionState::Empty,
            (Some(_), None) => SessionState::Indexed,
            (Some(_), Some(_)) => SessionState::Ready,
        }
    }

    /// The config bound at the last successful [`configure`](Self::configure).
    pub fn config(&self) -> Option<&SessionConfig> {
        self.config.as_ref()
    }

    /// Incremented every time a new completion service is bound.
    pub fn binding_generation(&self) -> u64 {
        self.generation
    }

    /// Report of the currently indexed document.
    pub fn document(&self) -> Option<&IngestReport> {
        self.document.as_ref()
    }

    /// Number of chunks in the index (0 when empty).
    pub fn index_len(&self) -> usize {
        self.document.as_ref().map_or(0, |d| d.chunks)
    }

    /// Conversation so far, oldest first.
    pub fn history(&self) -> &[ConversationTurn] {
        self.memory.history()
    }

    /// Forget the conversation. The index and binding are kept.
    pub fn clear_history(&mut self) {
        self.memory.clear();
        info!(session_id = %self.id, "History cleared");
    }

    /// Index `document`, replacing any previous index.
    ///
    /// On failure the session keeps its previous index and state, and the
    /// error is wrapped in [`DocchatError::Ingestion`].
    pub async fn ingest(&mut self, document: &Document) -> DocchatResult<IngestReport> {
        match self.pipeline.build(document).await {
            Ok((index, report)) => {
                self.install(index, report.clone());
                Ok(report)
            }
            Err(e) => Err(ingestion_failed(self.id, document, e)),
        }
    }

    /// Swap in an index built elsewhere. Memory and binding are untouched.
    pub(crate) fn install(&mut self, index: FlatIndex, report: IngestReport) {
        info!(
            session_id = %self.id,
            document_id = %report.document_id,
            chunks = report.chunks,
            "Document indexed"
        );
        self.index = Some(index);
        self.document = Some(report);
    }

    /// Bind a completion service for `config`.
    ///
    /// Returns `false` when `config` equals the bound one (nothing happens),
    /// `true` when a fresh service was bound. Conversation memory survives.
    pub fn configure(&mut self, config: SessionConfig) -> DocchatResult<bool> {
        config.validate(&self.options.catalog)?;
        if self.binding.is_some() && self.config.as_ref() == Some(&config) {
            debug!(session_id = %self.id, "Configuration unchanged");
            return Ok(false);
        }

        let binding = self.factory.connect(&config)?;
        self.generation += 1;
        info!(
            session_id = %self.id,
            model = %config.model,
            temperature = config.temperature,
            generation = self.generation,
            "Completion service bound"
        );
        self.binding = Some(binding);
        self.config = Some(config);
        Ok(true)
    }

    /// Retrieve the chunks most relevant to `question`, without asking the model.
    pub async fn retrieve(&self, question: &str) -> DocchatResult<Vec<ScoredChunk>> {
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| DocchatError::NotReady("upload a document first".to_string()))?;
        let query = self.pipeline.embed_query(question).await?;
        index.search(&query, self.options.retrieval.top_k).await
    }

    /// Answer `question` from the indexed document and the conversation so far.
    ///
    /// On success the question and the answer are appended to the history
    /// as two turns; on failure the history is unchanged.
    pub async fn ask(&mut self, question: &str) -> DocchatResult<String> {
        let (index, binding) = match (&self.index, &self.binding) {
            (Some(index), Some(binding)) => (index, binding.as_ref()),
            (None, _) => {
                return Err(DocchatError::NotReady(
                    "upload a document first".to_string(),
                ))
            }
            (Some(_), None) => {
                return Err(DocchatError::NotReady(
                    "choose a model before asking".to_string(),
                ))
            }
        };
        let question = question.trim();
        if question.is_empty() {
            return Err(DocchatError::Config("question must not be empty".to_string()));
        }

        let started = Instant::now();
        let completion_secs = self.options.timeouts.completion_secs;
        let history = match self.options.retrieval.max_history_turns {
            Some(n) => self.memory.last(n),
            None => self.memory.history(),
        };

        let search_text = if self.options.retrieval.condense_question && !history.is_empty() {
            let condensed = within(
                "completion",
                completion_secs,
                binding.complete(&Prompt::condense(history, question)),
            )
            .await?;
            debug!(session_id = %self.id, standalone = %condensed, "Condensed question");
            if condensed.trim().is_empty() {
                question.to_string()
            } else {
                condensed
            }
        } else {
            question.to_string()
        };

        let query = self.pipeline.embed_query(&search_text).await?;
        let context = index.search(&query, self.options.retrieval.top_k).await?;
        let system = self
            .config
            .as_ref()
            .map(|c| c.system_prompt.as_str())
            .unwrap_or_default();
        let prompt = Prompt::answer(system, history, context, question);
        debug!(
            session_id = %self.id,
            top_k = self.options.retrieval.top_k,
            prompt = %prompt.render(),
            "Prompt assembled"
        );

        let answer = within("completion", completion_secs, binding.complete(&prompt)).await?;

        self.memory.push_user(question);
        self.memory.push_assistant(answer.clone());
        info!(
            session_id = %self.id,
            turns = self.memory.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Question answered"
        );
        Ok(answer)
    }
}
