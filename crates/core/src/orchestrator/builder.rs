use std::sync::Arc;
use std::time::Duration;

use grounded_chat_model::{ChatModel, EmbeddingProvider, VectorBackend};

use super::{Orchestrator, StageCallback, TurnStage};
use crate::answer::{AnswerGenerator, GeneratorOptions};
use crate::client::{BackendClient, ChatClient};
use crate::conversation::ConversationStore;
use crate::embedding::Embedder;
use crate::index::{FilterPolicy, IndexClient};

/// [`Orchestrator`] builder.
pub struct OrchestratorBuilder {
    embedder: Embedder,
    backend: BackendClient,
    chat_client: ChatClient,
    store: ConversationStore,
    top_k: usize,
    similarity_threshold: f32,
    filter_policy: FilterPolicy,
    probe_attempts: u32,
    probe_delay: Duration,
    generator_options: GeneratorOptions,
    on_stage: Option<StageCallback>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the specified providers.
    #[inline]
    pub fn with_providers<E, B, M>(embedding: E, backend: B, model: M) -> Self
    where
        E: EmbeddingProvider + 'static,
        B: VectorBackend + 'static,
        M: ChatModel + 'static,
    {
        Self {
            embedder: Embedder::new(embedding),
            backend: BackendClient::new(backend),
            chat_client: ChatClient::new(model),
            store: Default::default(),
            top_k: 5,
            similarity_threshold: 0.35,
            filter_policy: Default::default(),
            probe_attempts: 3,
            probe_delay: Duration::from_millis(1000),
            generator_options: Default::default(),
            on_stage: None,
        }
    }

    /// Sets how many sources a turn retrieves at most.
    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Sets the similarity a source should reach to count as relevant.
    #[inline]
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Sets how the similarity threshold affects the sources.
    #[inline]
    pub fn with_filter_policy(mut self, policy: FilterPolicy) -> Self {
        self.filter_policy = policy;
        self
    }

    /// Sets how the index is probed before each search.
    #[inline]
    pub fn with_probe(mut self, max_attempts: u32, initial_delay: Duration) -> Self {
        self.probe_attempts = max_attempts;
        self.probe_delay = initial_delay;
        self
    }

    /// Sets the completion settings of the answer generator.
    #[inline]
    pub fn with_generator_options(mut self, options: GeneratorOptions) -> Self {
        self.generator_options = options;
        self
    }

    /// Uses an existing conversation instead of starting a new one.
    #[inline]
    pub fn with_conversation_store(mut self, store: ConversationStore) -> Self {
        self.store = store;
        self
    }

    /// Attaches a callback to be invoked when a turn enters a new stage.
    #[inline]
    pub fn on_stage(
        mut self,
        on_stage: impl Fn(TurnStage) + Send + Sync + 'static,
    ) -> Self {
        self.on_stage = Some(Arc::new(on_stage));
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> Orchestrator {
        let Self {
            embedder,
            backend,
            chat_client,
            store,
            top_k,
            similarity_threshold,
            filter_policy,
            probe_attempts,
            probe_delay,
            generator_options,
            on_stage,
        } = self;

        Orchestrator {
            index: IndexClient::new(
                backend,
                embedder,
                filter_policy,
                probe_attempts,
                probe_delay,
            ),
            generator: AnswerGenerator::new(chat_client, generator_options),
            store,
            top_k,
            similarity_threshold,
            probe_attempts,
            probe_delay,
            stage: Default::default(),
            on_stage,
        }
    }
}
