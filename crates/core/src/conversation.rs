//! Conversation-related types.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use grounded_chat_model::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,
    /// The model answering them.
    Assistant,
}

/// A retrieved evidence chunk that supports an answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Identifier of the index entry.
    pub id: String,
    /// Best-effort label of the chunk.
    pub title: String,
    /// Text of the chunk.
    pub content: String,
    /// Relevance score reported by the backend, higher is more relevant.
    pub similarity: f32,
    /// Link to the original document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Metadata stored alongside the vector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Records why sources could not be retrieved for an answer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetrievalFailure {
    /// The kind of the retrieval error.
    pub kind: ErrorKind,
    /// The message of the retrieval error.
    pub message: String,
}

/// One turn in a conversation.
///
/// Messages are immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: String,
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<Source>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retrieval_failure: Option<RetrievalFailure>,
}

impl Message {
    /// Creates a user message.
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            sources: None,
            confidence: None,
            retrieval_failure: None,
        }
    }

    /// Creates an assistant message. An empty source list is stored as
    /// absent.
    pub fn assistant<S: Into<String>>(
        content: S,
        sources: Vec<Source>,
        confidence: f32,
        retrieval_failure: Option<RetrievalFailure>,
    ) -> Self {
        Self {
            id: new_message_id(),
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            sources: (!sources.is_empty()).then_some(sources),
            confidence: Some(confidence),
            retrieval_failure,
        }
    }

    /// Returns the unique id of this message.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the author of this message.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text of this message.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the creation time of this message.
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the sources cited by this message, in backend ranking order.
    #[inline]
    pub fn sources(&self) -> &[Source] {
        self.sources.as_deref().unwrap_or_default()
    }

    /// Returns the confidence of an answer, in `[0, 1]`.
    #[inline]
    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }

    /// Returns the retrieval failure if the answer was generated without
    /// access to the document index.
    #[inline]
    pub fn retrieval_failure(&self) -> Option<&RetrievalFailure> {
        self.retrieval_failure.as_ref()
    }
}

#[inline]
fn new_message_id() -> String {
    format!("msg-{}", Uuid::new_v4())
}

#[inline]
fn new_conversation_id() -> String {
    format!("conv-{}", Uuid::new_v4())
}

/// Represents a conversation.
#[derive(Clone, Debug)]
pub struct Conversation {
    id: String,
    messages: Vec<Message>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            id: new_conversation_id(),
            messages: vec![],
        }
    }
}

impl Conversation {
    /// Returns the id of this conversation.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the messages in the order they were appended.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Starts over with an empty log and a new id.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A shared handle to the active conversation.
///
/// Clones refer to the same conversation. Appending and resetting are each
/// performed under one lock, so they never interleave.
#[derive(Clone, Debug, Default)]
pub struct ConversationStore {
    inner: Arc<Mutex<Conversation>>,
}

impl ConversationStore {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, Conversation> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the id of the active conversation.
    #[inline]
    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    /// Returns a copy of the message log.
    #[inline]
    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    /// Appends a message to the active conversation.
    #[inline]
    pub fn append(&self, message: Message) {
        self.lock().messages.push(message);
    }

    /// Appends a message and returns the conversation id together with the
    /// messages that preceded it.
    pub fn open_turn(&self, message: Message) -> (String, Vec<Message>) {
        let mut conversation = self.lock();
        let history = conversation.messages.clone();
        conversation.messages.push(message);
        (conversation.id.clone(), history)
    }

    /// Appends a message only if `conversation_id` is still the active
    /// conversation. Returns whether the message was appended.
    pub fn append_to(&self, conversation_id: &str, message: Message) -> bool {
        let mut conversation = self.lock();
        if conversation.id != conversation_id {
            return false;
        }
        conversation.messages.push(message);
        true
    }

    /// Discards the log and starts a new conversation. Returns the new id.
    #[inline]
    pub fn reset(&self) -> String {
        let mut conversation = self.lock();
        conversation.reset();
        conversation.id.clone()
    }
}
