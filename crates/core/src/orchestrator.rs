mod builder;
#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use grounded_chat_model::ErrorKind;
use serde::Serialize;
use tracing::Instrument;

use crate::Error;
use crate::answer::AnswerGenerator;
use crate::conversation::{ConversationStore, Message, RetrievalFailure, Source};
use crate::index::IndexClient;
use crate::probe::ProbeReport;
pub use builder::OrchestratorBuilder;

type StageCallback = Arc<dyn Fn(TurnStage) + Send + Sync>;

/// The stage a turn is in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    /// No turn has run since the conversation started.
    #[default]
    Idle,
    /// Searching the document index.
    Retrieving,
    /// The search failed and the turn continues without sources.
    DegradedRetrieval,
    /// Waiting for the chat model.
    Generating,
    /// The answer has been stored.
    Completed,
    /// The chat model failed and the turn was aborted.
    Failed,
}

/// The result of a turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// The generated answer.
    pub answer: String,
    /// How well the sources support the answer, in `[0, 1]`.
    pub confidence: f32,
    /// The sources the answer was grounded on.
    pub sources: Vec<Source>,
    /// The conversation the turn belongs to.
    pub conversation_id: String,
    /// Id of the stored assistant message.
    pub message_id: String,
    /// Set when the document index could not be searched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_failure: Option<RetrievalFailure>,
}

/// Turns user messages into grounded answers.
///
/// Each turn searches the document index, asks the chat model and stores
/// both sides in the conversation. Callers are expected to serialize
/// [`send_message`](Self::send_message) calls. Clones share the same
/// conversation.
#[derive(Clone)]
pub struct Orchestrator {
    index: IndexClient,
    generator: AnswerGenerator,
    store: ConversationStore,
    top_k: usize,
    similarity_threshold: f32,
    probe_attempts: u32,
    probe_delay: Duration,
    stage: Arc<Mutex<TurnStage>>,
    on_stage: Option<StageCallback>,
}

impl Orchestrator {
    /// Runs one turn for `text`.
    ///
    /// A failed search doesn't fail the turn, the answer is generated
    /// without sources and carries the failure instead. A failed
    /// generation does, and only the user message is kept.
    pub async fn send_message(&self, text: &str) -> Result<ChatResponse, Error> {
        if text.trim().is_empty() {
            return Err(Error::new(
                ErrorKind::Validation,
                "Message must not be empty",
            ));
        }

        let (conversation_id, history) = self.store.open_turn(Message::user(text));
        let span = info_span!("turn", conversation_id = %conversation_id);
        self.run_turn(text, conversation_id, history)
            .instrument(span)
            .await
    }

    async fn run_turn(
        &self,
        text: &str,
        conversation_id: String,
        history: Vec<Message>,
    ) -> Result<ChatResponse, Error> {
        self.set_stage(TurnStage::Retrieving);
        let (sources, retrieval_failure) = match self
            .index
            .search(text, self.top_k, self.similarity_threshold)
            .await
        {
            Ok(sources) => (sources, None),
            Err(err) => {
                warn!("source retrieval failed, answering without sources: {err}");
                self.set_stage(TurnStage::DegradedRetrieval);
                let failure = RetrievalFailure {
                    kind: err.kind(),
                    message: err.message().to_owned(),
                };
                (vec![], Some(failure))
            }
        };

        self.set_stage(TurnStage::Generating);
        let result = if retrieval_failure.is_some() {
            self.generator.generate_ungrounded(text, &history).await
        } else {
            self.generator.generate(text, &sources, &history).await
        };
        let answer = match result {
            Ok(answer) => answer,
            Err(err) => {
                error!("answer generation failed: {err}");
                self.set_stage(TurnStage::Failed);
                return Err(err);
            }
        };

        let confidence = confidence(&sources, retrieval_failure.is_some());
        let message = Message::assistant(
            answer.clone(),
            sources.clone(),
            confidence,
            retrieval_failure.clone(),
        );
        let message_id = message.id().to_owned();
        if !self.store.append_to(&conversation_id, message) {
            warn!("conversation was reset during the turn, dropping the answer");
        }
        self.set_stage(TurnStage::Completed);

        Ok(ChatResponse {
            answer,
            confidence,
            sources,
            conversation_id,
            message_id,
            retrieval_failure,
        })
    }

    /// Returns a copy of the message log.
    #[inline]
    pub fn history(&self) -> Vec<Message> {
        self.store.messages()
    }

    /// Returns the id of the active conversation.
    #[inline]
    pub fn conversation_id(&self) -> String {
        self.store.id()
    }

    /// Returns the stage of the latest turn.
    #[inline]
    pub fn stage(&self) -> TurnStage {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Discards the conversation and starts a new one. Returns the new id.
    pub fn reset(&self) -> String {
        let id = self.store.reset();
        info!("started conversation {id}");
        self.set_stage(TurnStage::Idle);
        id
    }

    /// Checks that the document index is reachable, using the configured
    /// retry settings.
    pub async fn probe(&self) -> ProbeReport {
        self.index
            .prober()
            .probe(self.probe_attempts, self.probe_delay)
            .await
    }

    fn set_stage(&self, stage: TurnStage) {
        debug!("turn stage: {stage:?}");
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner) = stage;
        if let Some(on_stage) = &self.on_stage {
            on_stage(stage);
        }
    }
}

fn confidence(sources: &[Source], retrieval_failed: bool) -> f32 {
    if retrieval_failed {
        return 0.0;
    }
    sources
        .iter()
        .map(|s| s.similarity)
        .reduce(f32::max)
        .map_or(0.5, |max| max.clamp(0.0, 1.0))
}
