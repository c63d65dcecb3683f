use grounded_chat_model::{ChatMessage, CompletionRequest};
use serde::{Deserialize, Serialize};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct EmbeddingResponse {
    #[serde(default)]
    pub data: Vec<EmbeddingData>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Option<Vec<f32>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub message: Option<ChoiceMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object { message: String },
    Text(String),
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_embedding_request<'a>(
    input: &'a str,
    config: &'a OpenAIConfig,
) -> EmbeddingRequest<'a> {
    EmbeddingRequest {
        model: &config.embedding_model,
        input,
    }
}

#[inline]
pub fn create_chat_request(
    req: &CompletionRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.chat_model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        temperature: req.temperature,
        max_tokens: req.max_tokens,
    }
}

#[inline]
fn create_message(msg: &ChatMessage) -> Message {
    let content = msg.content().to_owned();
    match msg {
        ChatMessage::System(_) => Message::System { content },
        ChatMessage::User(_) => Message::User { content },
        ChatMessage::Assistant(_) => Message::Assistant { content },
    }
}

impl EmbeddingResponse {
    /// Takes the first embedding out of the response.
    #[inline]
    pub fn into_first_embedding(self) -> Option<Vec<f32>> {
        self.data.into_iter().next()?.embedding
    }
}

impl ChatCompletion {
    /// Takes the content of the first choice out of the completion.
    #[inline]
    pub fn into_first_content(self) -> Option<String> {
        self.choices.into_iter().next()?.message?.content
    }
}

/// Extracts a human-readable message from an error body.
pub fn error_message(body: &str) -> Option<String> {
    let body: ErrorBody = serde_json::from_str(body).ok()?;
    let message = match body.error {
        ErrorDetail::Object { message } => message,
        ErrorDetail::Text(message) => message,
    };
    (!message.is_empty()).then_some(message)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_chat_request() {
        let request = CompletionRequest {
            messages: vec![
                ChatMessage::System("Answer from the context.".to_owned()),
                ChatMessage::User("Hello".to_owned()),
                ChatMessage::Assistant("Hi there".to_owned()),
                ChatMessage::User("What is a vector database?".to_owned()),
            ],
            temperature: 0.5,
            max_tokens: 1000,
        };
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_chat_model("custom")
            .build();
        let body = serde_json::to_value(create_chat_request(&request, &config))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "model": "custom",
                "messages": [
                    { "role": "system", "content": "Answer from the context." },
                    { "role": "user", "content": "Hello" },
                    { "role": "assistant", "content": "Hi there" },
                    { "role": "user", "content": "What is a vector database?" },
                ],
                "temperature": 0.5,
                "max_tokens": 1000,
            })
        );
    }

    #[test]
    fn test_create_embedding_request() {
        let config = OpenAIConfigBuilder::with_api_key("xxx").build();
        let body = serde_json::to_value(create_embedding_request(
            "What is a vector database?",
            &config,
        ))
        .unwrap();
        assert_eq!(
            body,
            json!({
                "model": "text-embedding-3-small",
                "input": "What is a vector database?",
            })
        );
    }

    #[test]
    fn test_parse_responses() {
        let resp: EmbeddingResponse = serde_json::from_value(json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": [0.5, -0.25] }],
        }))
        .unwrap();
        assert_eq!(resp.into_first_embedding(), Some(vec![0.5, -0.25]));

        let resp: EmbeddingResponse =
            serde_json::from_value(json!({ "object": "list" })).unwrap();
        assert_eq!(resp.into_first_embedding(), None);

        let resp: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Hi" } }],
        }))
        .unwrap();
        assert_eq!(resp.into_first_content().as_deref(), Some("Hi"));

        let resp: ChatCompletion =
            serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert_eq!(resp.into_first_content(), None);
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(
                r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#
            )
            .as_deref(),
            Some("Incorrect API key provided")
        );
        assert_eq!(
            error_message(r#"{"error":"Missing query or API key"}"#).as_deref(),
            Some("Missing query or API key")
        );
        assert_eq!(error_message("<html>Bad Gateway</html>"), None);
    }
}
