//! AlbanAI: the rule-based portfolio assistant.
//!
//! [`Responder`] classifies text against a fixed [`KnowledgeBase`];
//! [`AssistantService`] wraps it in per-session chat state with a deferred,
//! abortable reply and a persisted transcript.

pub mod knowledge;
pub mod responder;
pub mod session;
pub mod store;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{ApiError, StoreError};

pub use knowledge::KnowledgeBase;
pub use responder::{Responder, ResponseCategory, ResponseDelays};
pub use session::{ChatMessage, ChatSession, ChatState, SubmitError, Transcript};
pub use store::{FileStore, MemoryStore, TranscriptStore};

use store::TRANSCRIPT_KEY;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    #[serde(flatten)]
    pub state: ChatState,
    pub messages: Vec<ChatMessage>,
    pub suggested_questions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub user: ChatMessage,
    pub reply: ChatMessage,
    pub category: ResponseCategory,
    /// Matched topic id or skill name, if any.
    pub subject: Option<String>,
    pub delay_ms: u64,
}

/// Bounds on the in-memory session registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(30 * 60),
            max_sessions: 1000,
        }
    }
}

struct SessionSlot {
    chat: Mutex<ChatSession>,
    /// Ticket and abort handle of the outstanding deferred reply.
    pending: std::sync::Mutex<Option<(u64, AbortHandle)>>,
    tickets: AtomicU64,
    last_used: std::sync::Mutex<Instant>,
}

impl SessionSlot {
    fn new(transcript: Transcript) -> Arc<Self> {
        Arc::new(Self {
            chat: Mutex::new(ChatSession::new(transcript)),
            pending: std::sync::Mutex::new(None),
            tickets: AtomicU64::new(0),
            last_used: std::sync::Mutex::new(Instant::now()),
        })
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, Option<(u64, AbortHandle)>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn track(&self, handle: AbortHandle) -> u64 {
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        *self.pending() = Some((ticket, handle));
        ticket
    }

    fn take_pending(&self) -> Option<AbortHandle> {
        self.pending().take().map(|(_, handle)| handle)
    }

    fn clear_pending(&self, ticket: u64) {
        let mut pending = self.pending();
        if matches!(*pending, Some((current, _)) if current == ticket) {
            *pending = None;
        }
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }

    fn last_used(&self) -> Instant {
        *self.last_used.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Idle with no reply outstanding and nobody holding the chat.
    fn is_evictable(&self) -> bool {
        self.pending().is_none()
            && self
                .chat
                .try_lock()
                .map(|chat| chat.state() == ChatState::Idle)
                .unwrap_or(false)
    }
}

pub struct AssistantService {
    responder: Arc<Responder>,
    store: Arc<dyn TranscriptStore>,
    sessions: Mutex<HashMap<Uuid, Arc<SessionSlot>>>,
    limits: SessionLimits,
}

impl AssistantService {
    pub fn new(responder: Responder, store: Arc<dyn TranscriptStore>) -> Self {
        Self {
            responder: Arc::new(responder),
            store,
            sessions: Mutex::new(HashMap::new()),
            limits: SessionLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    fn seed(&self) -> &str {
        &self.responder.knowledge().seed
    }

    pub async fn create_session(&self) -> SessionView {
        let id = Uuid::new_v4();
        let transcript = Transcript::seeded(self.seed());
        persist(self.store.clone(), id, transcript.clone()).await;

        let slot = SessionSlot::new(transcript);
        let evicted = {
            let mut sessions = self.sessions.lock().await;
            let evicted = self.evict(&mut sessions);
            sessions.insert(id, slot.clone());
            evicted
        };
        self.forget(evicted).await;
        tracing::info!("Created assistant session {}", id);

        let chat = slot.chat.lock().await;
        self.render(id, &chat)
    }

    /// Live session, or one restored from the store after a restart or an
    /// eviction.
    async fn slot(&self, id: Uuid) -> Result<Arc<SessionSlot>, ApiError> {
        if let Some(slot) = self.sessions.lock().await.get(&id) {
            slot.touch();
            return Ok(slot.clone());
        }

        let restored = {
            let store = self.store.clone();
            let seed = self.seed().to_string();
            let key = id.to_string();
            blocking(move || Transcript::load(store.as_ref(), &key, &seed))
                .await
                .map_err(|e| ApiError::Internal(e.to_string()))?
                .ok_or(ApiError::SessionNotFound(id))?
        };
        tracing::debug!(
            "Restored assistant session {} from store ({} messages, next id {})",
            id,
            restored.messages().len(),
            restored.id_counter()
        );

        let (slot, evicted) = {
            let mut sessions = self.sessions.lock().await;
            if let Some(slot) = sessions.get(&id) {
                slot.touch();
                return Ok(slot.clone());
            }
            let evicted = self.evict(&mut sessions);
            let slot = SessionSlot::new(restored);
            sessions.insert(id, slot.clone());
            (slot, evicted)
        };
        self.forget(evicted).await;
        Ok(slot)
    }

    /// Drop expired idle slots, then the least recently used idle ones until
    /// there is room for one more.
    fn evict(&self, sessions: &mut HashMap<Uuid, Arc<SessionSlot>>) -> Vec<Uuid> {
        let now = Instant::now();
        let mut idle: Vec<(Uuid, Instant)> = sessions
            .iter()
            .filter(|(_, slot)| slot.is_evictable())
            .map(|(id, slot)| (*id, slot.last_used()))
            .collect();
        idle.sort_by_key(|(_, last_used)| *last_used);

        let mut evicted = Vec::new();
        for (id, last_used) in idle {
            let expired = now.duration_since(last_used) >= self.limits.idle_ttl;
            if !expired && sessions.len() < self.limits.max_sessions {
                break;
            }
            sessions.remove(&id);
            evicted.push(id);
        }
        evicted
    }

    /// A store that does not outlive the process cannot restore evicted
    /// sessions, so their transcripts go too.
    async fn forget(&self, evicted: Vec<Uuid>) {
        if evicted.is_empty() {
            return;
        }
        tracing::debug!("Evicted {} idle assistant sessions", evicted.len());
        if self.store.is_durable() {
            return;
        }
        let store = self.store.clone();
        let result = blocking(move || {
            evicted
                .iter()
                .try_for_each(|id| store.remove(&id.to_string(), TRANSCRIPT_KEY))
        })
        .await;
        if let Err(e) = result {
            tracing::warn!("Failed to drop evicted transcripts: {}", e);
        }
    }

    pub async fn view(&self, id: Uuid) -> Result<SessionView, ApiError> {
        let slot = self.slot(id).await?;
        let chat = slot.chat.lock().await;
        Ok(self.render(id, &chat))
    }

    /// Submit `text` and wait for the reply to land in the transcript.
    pub async fn send(&self, id: Uuid, text: &str) -> Result<SendOutcome, ApiError> {
        let slot = self.slot(id).await?;

        // The reply task is registered before the chat lock is released, so a
        // concurrent reset always finds it.
        let (pending, task, ticket) = {
            let mut chat = slot.chat.lock().await;
            let pending = chat.submit(text, &self.responder).map_err(|e| match e {
                SubmitError::Empty => ApiError::EmptyMessage,
                SubmitError::Busy => ApiError::ReplyPending,
            })?;
            persist(self.store.clone(), id, chat.transcript().clone()).await;
            tracing::debug!(
                "Session {} reply categorized as {:?}, due in {:?}",
                id,
                pending.category,
                pending.delay
            );

            let task = {
                let slot = slot.clone();
                let store = self.store.clone();
                let pending = pending.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(pending.delay).await;
                    let mut chat = slot.chat.lock().await;
                    let landed = chat.complete(&pending);
                    if landed {
                        persist(store, id, chat.transcript().clone()).await;
                    }
                    landed
                })
            };
            let ticket = slot.track(task.abort_handle());
            (pending, task, ticket)
        };

        let landed = match task.await {
            Ok(landed) => landed,
            Err(e) if e.is_cancelled() => false,
            Err(e) => return Err(ApiError::Internal(e.to_string())),
        };
        slot.clear_pending(ticket);
        slot.touch();

        if !landed {
            return Err(ApiError::ReplyCancelled);
        }
        Ok(SendOutcome {
            user: pending.user,
            reply: pending.reply,
            category: pending.category,
            subject: pending.subject,
            delay_ms: u64::try_from(pending.delay.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Abort any outstanding reply, clear the stored transcript and reseed.
    pub async fn reset(&self, id: Uuid) -> Result<SessionView, ApiError> {
        let slot = self.slot(id).await?;
        let mut chat = slot.chat.lock().await;
        if let Some(handle) = slot.take_pending() {
            handle.abort();
        }
        chat.reset(self.seed());

        let store = self.store.clone();
        let transcript = chat.transcript().clone();
        let key = id.to_string();
        let result = blocking(move || {
            store.remove(&key, TRANSCRIPT_KEY)?;
            transcript.persist(store.as_ref(), &key)
        })
        .await;
        if let Err(e) = result {
            tracing::warn!("Failed to clear transcript for session {}: {}", id, e);
        }
        tracing::info!("Reset assistant session {}", id);

        Ok(self.render(id, &chat))
    }

    #[cfg(test)]
    async fn live_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn render(&self, id: Uuid, chat: &ChatSession) -> SessionView {
        SessionView {
            id,
            state: chat.state(),
            messages: chat.transcript().messages().to_vec(),
            suggested_questions: self.responder.knowledge().suggested_questions.clone(),
        }
    }
}

/// Run store IO on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

async fn persist(store: Arc<dyn TranscriptStore>, id: Uuid, transcript: Transcript) {
    let key = id.to_string();
    if let Err(e) = blocking(move || transcript.persist(store.as_ref(), &key)).await {
        tracing::warn!("Failed to persist transcript for session {}: {}", id, e);
    }
}
