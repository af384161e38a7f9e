//! Chat transcript and the per-session exchange state machine.
//!
//! `Idle -> Sending -> Thinking -> Idle`. A session accepts one submission
//! at a time; anything submitted while a reply is pending is rejected and
//! leaves the transcript untouched.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::responder::{Responder, ResponseCategory};
use super::store::{TranscriptStore, TRANSCRIPT_KEY};
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub content: String,
}

/// Append-only message log plus the next id to hand out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    id_counter: u64,
}

impl Transcript {
    pub fn seeded(seed: &str) -> Self {
        Self {
            messages: vec![ChatMessage {
                id: 0,
                role: Role::Assistant,
                content: seed.to_string(),
            }],
            id_counter: 1,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn id_counter(&self) -> u64 {
        self.id_counter
    }

    /// Rebuild from a stored document, discarding anything malformed.
    ///
    /// Falls back to the seed when the document is unreadable or no valid
    /// message survives.
    pub fn from_document(raw: &str, seed: &str) -> Self {
        let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(raw) else {
            tracing::warn!("Stored transcript is not a JSON object, resetting");
            return Self::seeded(seed);
        };
        let Some(Value::Array(entries)) = doc.get("messages") else {
            tracing::warn!("Stored transcript has no message list, resetting");
            return Self::seeded(seed);
        };

        let total = entries.len();
        let messages: Vec<ChatMessage> = entries
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect();
        if messages.len() < total {
            tracing::warn!("Discarded {} malformed stored messages", total - messages.len());
        }
        if messages.is_empty() {
            return Self::seeded(seed);
        }

        let next_free = messages.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        let id_counter = doc
            .get("idCounter")
            .and_then(Value::as_u64)
            .filter(|counter| *counter >= next_free)
            .unwrap_or(next_free);

        Self {
            messages,
            id_counter,
        }
    }

    pub fn to_document(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn load(store: &dyn TranscriptStore, session: &str, seed: &str) -> Result<Option<Self>, StoreError> {
        Ok(store
            .get(session, TRANSCRIPT_KEY)?
            .map(|raw| Self::from_document(&raw, seed)))
    }

    pub fn persist(&self, store: &dyn TranscriptStore, session: &str) -> Result<(), StoreError> {
        store.set(session, TRANSCRIPT_KEY, &self.to_document()?)
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    fn reserve_pair(&mut self) -> (u64, u64) {
        let user = self.id_counter;
        self.id_counter += 2;
        (user, user + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state")]
pub enum ChatState {
    Idle,
    Sending,
    Thinking {
        #[serde(rename = "replyId")]
        reply_id: u64,
    },
}

/// A reply computed at submit time, to be appended once its delay elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    pub user: ChatMessage,
    pub reply: ChatMessage,
    pub category: ResponseCategory,
    pub subject: Option<String>,
    pub delay: Duration,
    /// Reset generation the reply was computed in.
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    Empty,
    Busy,
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    transcript: Transcript,
    state: ChatState,
    epoch: u64,
}

impl ChatSession {
    pub fn new(transcript: Transcript) -> Self {
        Self {
            transcript,
            state: ChatState::Idle,
            epoch: 0,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn submit(&mut self, text: &str, responder: &Responder) -> Result<PendingReply, SubmitError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SubmitError::Empty);
        }
        if self.state != ChatState::Idle {
            return Err(SubmitError::Busy);
        }

        self.state = ChatState::Sending;
        let (user_id, reply_id) = self.transcript.reserve_pair();
        let user = ChatMessage {
            id: user_id,
            role: Role::User,
            content: trimmed.to_string(),
        };
        self.transcript.push(user.clone());

        let reply = responder.respond(trimmed);
        self.state = ChatState::Thinking { reply_id };

        Ok(PendingReply {
            user,
            reply: ChatMessage {
                id: reply_id,
                role: Role::Assistant,
                content: reply.text,
            },
            category: reply.category,
            subject: reply.subject,
            delay: reply.delay,
            epoch: self.epoch,
        })
    }

    /// Append the pending reply. Returns false if it is no longer expected
    /// (the session was reset meanwhile). Reply ids restart after a reset, so
    /// the epoch is what tells an old reply from the current one.
    pub fn complete(&mut self, pending: &PendingReply) -> bool {
        if pending.epoch != self.epoch {
            return false;
        }
        match self.state {
            ChatState::Thinking { reply_id } if reply_id == pending.reply.id => {
                self.transcript.push(pending.reply.clone());
                self.state = ChatState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self, seed: &str) {
        self.transcript = Transcript::seeded(seed);
        self.state = ChatState::Idle;
        self.epoch += 1;
    }
}
