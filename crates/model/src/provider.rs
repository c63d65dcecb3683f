use std::error::Error;

use crate::chat::CompletionRequest;
use crate::error::ErrorKind;
use crate::vector::{IndexDescriptor, QueryResponse, VectorQuery};

/// The error type for a provider.
pub trait ProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that turns text into embedding vectors.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
pub trait EmbeddingProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ProviderError;

    /// Embeds the given text.
    ///
    /// The returned vector always has the provider's fixed dimensionality.
    /// Implementations must not retry on their own.
    fn embed(
        &self,
        input: &str,
    ) -> impl Future<Output = Result<Vec<f32>, Self::Error>> + Send + 'static;
}

/// A vector search backend that hosts a single index.
pub trait VectorBackend: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: ProviderError;

    /// Checks that the credentials and the index identifier are present.
    ///
    /// This method must not perform any I/O.
    fn validate(&self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Fetches the descriptor of the configured index.
    ///
    /// The descriptor carries the host that later queries are routed to.
    fn describe_index(
        &self,
    ) -> impl Future<Output = Result<IndexDescriptor, Self::Error>> + Send + 'static;

    /// Runs a similarity query against the index served by `host`.
    fn query(
        &self,
        host: &str,
        query: &VectorQuery,
    ) -> impl Future<Output = Result<QueryResponse, Self::Error>> + Send + 'static;
}

/// A language model behind a chat-completion endpoint.
pub trait ChatModel: Send + Sync {
    /// The error type that may be returned by the model.
    type Error: ProviderError;

    /// Sends the request and returns the text of the first completion.
    fn complete(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static;
}
