use std::time::Duration;

use grounded_chat_core::conversation::Message;
use grounded_chat_core::{
    ChatResponse, Error, FilterPolicy, Orchestrator, OrchestratorBuilder,
    ProbeReport, TurnStage,
};
use grounded_chat_openai::{OpenAIConfig, OpenAIProvider};
use grounded_chat_pinecone::{PineconeBackend, PineconeConfig};

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    orchestrator_builder: OrchestratorBuilder,
}

impl SessionBuilder {
    /// Creates a session builder that embeds and answers with OpenAI and
    /// searches a Pinecone index.
    pub fn new(openai: OpenAIConfig, pinecone: PineconeConfig) -> Self {
        let provider = OpenAIProvider::new(openai);
        let orchestrator_builder = OrchestratorBuilder::with_providers(
            provider.clone(),
            PineconeBackend::new(pinecone),
            provider,
        );
        Self {
            orchestrator_builder,
        }
    }

    /// Sets how many sources a turn retrieves at most.
    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.orchestrator_builder = self.orchestrator_builder.with_top_k(top_k);
        self
    }

    /// Sets the similarity a source should reach to count as relevant.
    #[inline]
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.orchestrator_builder = self
            .orchestrator_builder
            .with_similarity_threshold(threshold);
        self
    }

    /// Sets how the similarity threshold affects the sources.
    #[inline]
    pub fn with_filter_policy(mut self, policy: FilterPolicy) -> Self {
        self.orchestrator_builder =
            self.orchestrator_builder.with_filter_policy(policy);
        self
    }

    /// Sets how the index is probed before each search.
    #[inline]
    pub fn with_probe(mut self, max_attempts: u32, initial_delay: Duration) -> Self {
        self.orchestrator_builder = self
            .orchestrator_builder
            .with_probe(max_attempts, initial_delay);
        self
    }

    /// Attaches a callback to be invoked when a turn enters a new stage.
    #[inline]
    pub fn on_stage(
        mut self,
        on_stage: impl Fn(TurnStage) + Send + Sync + 'static,
    ) -> Self {
        self.orchestrator_builder = self.orchestrator_builder.on_stage(on_stage);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let orchestrator = self.orchestrator_builder.build();
        debug!("session started with conversation {}", orchestrator.conversation_id());
        Session { orchestrator }
    }
}

/// A chat session, like a window that displays messages and has an input
/// box.
///
/// It's basically a wrapper around [`Orchestrator`].
#[derive(Clone)]
pub struct Session {
    orchestrator: Orchestrator,
}

impl Session {
    /// Sends a message and waits for the answer.
    #[inline]
    pub async fn send_message(&self, message: &str) -> Result<ChatResponse, Error> {
        self.orchestrator.send_message(message).await
    }

    /// Starts a new conversation. Returns its id.
    #[inline]
    pub fn reset(&self) -> String {
        self.orchestrator.reset()
    }

    /// Returns the messages of the current conversation.
    #[inline]
    pub fn history(&self) -> Vec<Message> {
        self.orchestrator.history()
    }

    /// Returns the id of the current conversation.
    #[inline]
    pub fn conversation_id(&self) -> String {
        self.orchestrator.conversation_id()
    }

    /// Checks that the document index is reachable.
    #[inline]
    pub async fn test_connection(&self) -> ProbeReport {
        self.orchestrator.probe().await
    }
}
