use serde::{Deserialize, Serialize};

/// A request to be sent to the chat model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The input messages, in conversation order.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound of the generated tokens.
    pub max_tokens: u32,
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "lowercase")]
pub enum ChatMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant text.
    Assistant(String),
}

impl ChatMessage {
    /// Returns the text of this message.
    #[inline]
    pub fn content(&self) -> &str {
        match self {
            ChatMessage::System(content)
            | ChatMessage::User(content)
            | ChatMessage::Assistant(content) => content,
        }
    }
}
