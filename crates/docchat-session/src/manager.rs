use crate::pipeline::{IngestPipeline, IngestReport};
use crate::session::{ingestion_failed, RagSession, SessionOptions, SessionState};
use docchat_agent::{CompletionFactory, SessionConfig};
use docchat_core::{ConversationTurn, DocchatError, DocchatResult, Document};
use docchat_memory::{LoaderConfig, LoaderRegistry};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

/// A registered session plus the lock serialising its callers.
struct SessionHandle {
    session: Mutex<RagSession>,
    /// Ticket of the most recently submitted ingest.
    latest_ingest: AtomicU64,
}

/// Owns every live session and routes calls to them by id.
///
/// Each session is locked independently, so different sessions proceed in
/// parallel. Indexes are built outside the session lock and swapped in at
/// the end, so a question never sees a half-built index. When uploads to one
/// session overlap, the last one submitted wins: an older build that finishes
/// later is discarded with [`DocchatError::Superseded`].
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
    pipeline: Arc<IngestPipeline>,
    factory: Arc<dyn CompletionFactory>,
    options: SessionOptions,
    loaders: Arc<LoaderRegistry>,
}

impl SessionManager {
    /// Create a manager with the default document loaders.
    pub fn new(
        pipeline: IngestPipeline,
        factory: Arc<dyn CompletionFactory>,
        options: SessionOptions,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            pipeline: Arc::new(pipeline),
            factory,
            options,
            loaders: Arc::new(LoaderRegistry::from_config(&LoaderConfig::default())),
        }
    }

    /// Replace the document loaders used by [`ingest_file`](Self::ingest_file).
    pub fn with_loaders(mut self, loaders: LoaderRegistry) -> Self {
        self.loaders = Arc::new(loaders);
        self
    }

    /// Settings applied to new sessions.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Register a new empty session and return its id.
    pub fn create(&self) -> Uuid {
        let session = RagSession::new(
            self.pipeline.clone(),
            self.factory.clone(),
            self.options.clone(),
        );
        let id = session.id();
        self.sessions.write().insert(
            id,
            Arc::new(SessionHandle {
                session: Mutex::new(session),
                latest_ingest: AtomicU64::new(0),
            }),
        );
        info!(session_id = %id, "Session created");
        id
    }

    /// Drop a session. Returns whether it existed.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Session removed");
        }
        removed
    }

    /// Ids of all live sessions.
    pub fn ids(&self) -> Vec<Uuid> {
        self.sessions.read().keys().copied().collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn handle(&self, id: Uuid) -> DocchatResult<Arc<SessionHandle>> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or(DocchatError::SessionNotFound(id))
    }

    /// Bind a model configuration. See [`RagSession::configure`].
    pub async fn configure(&self, id: Uuid, config: SessionConfig) -> DocchatResult<bool> {
        let handle = self.handle(id)?;
        let mut session = handle.session.lock().await;
        session.configure(config)
    }

    /// Index `document` for session `id`, replacing any previous index.
    pub async fn ingest(&self, id: Uuid, document: Document) -> DocchatResult<IngestReport> {
        let handle = self.handle(id)?;
        ingest_into(&self.pipeline, &handle, id, &document).await
    }

    /// Load `path` with the registered extractors, then ingest it.
    ///
    /// Loader failures such as an unsupported extension are returned as is;
    /// pipeline failures are wrapped in [`DocchatError::Ingestion`].
    pub async fn ingest_file(&self, id: Uuid, path: &Path) -> DocchatResult<IngestReport> {
        let handle = self.handle(id)?;
        let document = self.loaders.load(path).await?;
        ingest_into(&self.pipeline, &handle, id, &document).await
    }

    /// Ingest on a background task. Questions fail with `NotReady` until
    /// a first index is installed.
    ///
    /// The upload takes its place in line when this is called, not when the
    /// task first runs.
    pub fn spawn_ingest(
        &self,
        id: Uuid,
        document: Document,
    ) -> DocchatResult<JoinHandle<DocchatResult<IngestReport>>> {
        let handle = self.handle(id)?;
        let pipeline = self.pipeline.clone();
        let ticket = handle.next_ticket();
        Ok(tokio::spawn(async move {
            build_and_install(&pipeline, &handle, id, ticket, &document).await
        }))
    }

    /// Ask a question in session `id`. See [`RagSession::ask`].
    pub async fn ask(&self, id: Uuid, question: &str) -> DocchatResult<String> {
        let handle = self.handle(id)?;
        let mut session = handle.session.lock().await;
        session.ask(question).await
    }

    /// Forget the conversation of session `id`.
    pub async fn clear_history(&self, id: Uuid) -> DocchatResult<()> {
        let handle = self.handle(id)?;
        handle.session.lock().await.clear_history();
        Ok(())
    }

    /// Copy of the conversation of session `id`.
    pub async fn history(&self, id: Uuid) -> DocchatResult<Vec<ConversationTurn>> {
        let handle = self.handle(id)?;
        let session = handle.session.lock().await;
        Ok(session.history().to_vec())
    }

    /// Lifecycle state of session `id`.
    pub async fn state(&self, id: Uuid) -> DocchatResult<SessionState> {
        let handle = self.handle(id)?;
        let session = handle.session.lock().await;
        Ok(session.state())
    }

    /// The config bound to session `id`, if any.
    pub async fn config(&self, id: Uuid) -> DocchatResult<Option<SessionConfig>> {
        let handle = self.handle(id)?;
        let session = handle.session.lock().await;
        Ok(session.config().cloned())
    }

    /// Report of the document indexed in session `id`, if any.
    pub async fn document(&self, id: Uuid) -> DocchatResult<Option<IngestReport>> {
        let handle = self.handle(id)?;
        let session = handle.session.lock().await;
        Ok(session.document().cloned())
    }
}

impl SessionHandle {
    fn next_ticket(&self) -> u64 {
        self.latest_ingest.fetch_add(1, Ordering::SeqCst) + 1
    }
}

async fn ingest_into(
    pipeline: &IngestPipeline,
    handle: &SessionHandle,
    id: Uuid,
    document: &Document,
) -> DocchatResult<IngestReport> {
    let ticket = handle.next_ticket();
    build_and_install(pipeline, handle, id, ticket, document).await
}

/// Build outside the session lock, then install only if no newer upload was
/// submitted in the meantime.
async fn build_and_install(
    pipeline: &IngestPipeline,
    handle: &SessionHandle,
    id: Uuid,
    ticket: u64,
    document: &Document,
) -> DocchatResult<IngestReport> {
    let (index, report) = pipeline
        .build(document)
        .await
        .map_err(|e| ingestion_failed(id, document, e))?;

    let mut session = handle.session.lock().await;
    let latest = handle.latest_ingest.load(Ordering::SeqCst);
    if ticket != latest {
        warn!(
            session_id = %id,
            source = %document.source,
            ticket,
            latest,
            "Discarding index of a superseded upload"
        );
        return Err(DocchatError::Superseded(document.source.clone()));
    }
    session.install(index, report.clone());
    Ok(report)
}
