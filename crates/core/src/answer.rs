use std::fmt::Write;

use grounded_chat_model::{ChatMessage, CompletionRequest};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::client::ChatClient;
use crate::conversation::{Message, Role, Source};

const GROUNDED_INSTRUCTION: &str = "\
You are a helpful assistant that answers questions using the context \
retrieved from a document index. Base your answer on the provided context. \
If the context is only partially relevant, extract whatever information \
helps answer the question and say which parts remain uncertain. Only say \
that you lack the information when the context is empty or entirely \
unrelated to the question. Do not make up facts that are not supported by \
the context.";

const UNGROUNDED_INSTRUCTION: &str = "\
You are a helpful assistant. The document index could not be reached, so \
no context is available for this question. Answer from your general \
knowledge and briefly mention that the document index was unavailable, so \
the answer may not reflect the indexed documents.";

/// Settings of the completion request.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratorOptions {
    /// Sampling temperature. Low values keep the answer close to the
    /// context.
    pub temperature: f32,
    /// Upper bound of the answer length, in tokens.
    pub max_tokens: u32,
    /// How many trailing history messages are sent to the model.
    pub history_window: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1000,
            history_window: 5,
        }
    }
}

/// Builds grounded prompts and asks the chat model for an answer.
#[derive(Clone)]
pub struct AnswerGenerator {
    client: ChatClient,
    options: GeneratorOptions,
}

impl AnswerGenerator {
    /// Creates a generator.
    #[inline]
    pub fn new(client: ChatClient, options: GeneratorOptions) -> Self {
        Self { client, options }
    }

    /// Answers `query` from `sources`.
    ///
    /// `history` must not contain the message being answered. Without any
    /// source the model is not called and a fixed fallback text is
    /// returned.
    pub async fn generate(
        &self,
        query: &str,
        sources: &[Source],
        history: &[Message],
    ) -> Result<String, Error> {
        if sources.is_empty() {
            debug!("no sources to ground on, returning the fallback answer");
            return Ok(no_information_answer(query));
        }

        let mut messages = vec![
            ChatMessage::System(GROUNDED_INSTRUCTION.to_owned()),
            ChatMessage::System(context_block(sources)),
        ];
        self.push_history(&mut messages, history);
        messages.push(ChatMessage::User(query.to_owned()));
        self.complete(messages).await
    }

    /// Answers `query` without retrieved context, for turns where the
    /// document index could not be searched.
    pub async fn generate_ungrounded(
        &self,
        query: &str,
        history: &[Message],
    ) -> Result<String, Error> {
        let mut messages =
            vec![ChatMessage::System(UNGROUNDED_INSTRUCTION.to_owned())];
        self.push_history(&mut messages, history);
        messages.push(ChatMessage::User(query.to_owned()));
        self.complete(messages).await
    }

    fn push_history(&self, messages: &mut Vec<ChatMessage>, history: &[Message]) {
        let skip = history.len().saturating_sub(self.options.history_window);
        messages.extend(history[skip..].iter().map(|msg| {
            let content = msg.content().to_owned();
            match msg.role() {
                Role::User => ChatMessage::User(content),
                Role::Assistant => ChatMessage::Assistant(content),
            }
        }));
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, Error> {
        let req = CompletionRequest {
            messages,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        };
        self.client.complete(&req).await
    }
}

fn context_block(sources: &[Source]) -> String {
    let mut block = String::from("Context:\n");
    for (i, source) in sources.iter().enumerate() {
        let percent = (source.similarity * 100.0).round();
        // Writing into a `String` never fails.
        let _ = write!(
            block,
            "\nContext {} ({}, {percent}% match):\n{}\n",
            i + 1,
            source.title,
            source.content,
        );
    }
    block
}

fn no_information_answer(query: &str) -> String {
    format!(
        "I couldn't find any relevant information for your query \"{query}\" \
         in the document index. Could you please rephrase your question or \
         ask about something else?"
    )
}
