use std::pin::Pin;
use std::sync::Arc;

use grounded_chat_model::{
    ChatModel, CompletionRequest, IndexDescriptor, QueryResponse,
    VectorBackend, VectorQuery,
};
use tracing::Instrument;

use crate::Error;

type BoxedFuture<T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send>>;
type CompleteFn =
    Arc<dyn Fn(&CompletionRequest) -> BoxedFuture<String> + Send + Sync>;

/// A wrapper around a chat model that provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct ChatClient {
    complete_fn: CompleteFn,
}

impl ChatClient {
    /// Wraps a chat model.
    #[inline]
    pub fn new<M: ChatModel + 'static>(model: M) -> Self {
        // We have to erase the type `M`, since `ChatClient` doesn't have a
        // generic parameter and we don't want it either.
        let complete_fn: CompleteFn = Arc::new(
            move |req: &CompletionRequest| -> BoxedFuture<String> {
                let message_count = req.messages.len();
                let fut = model.complete(req);
                Box::pin(
                    async move {
                        trace!("sending {message_count} messages to the model");
                        fut.await.map_err(|err| {
                            error!("got an error: {err:?}");
                            Error::from_provider(&err)
                        })
                    }
                    .instrument(trace_span!("chat client req")),
                )
            },
        );
        Self { complete_fn }
    }

    /// Sends a request and returns the completion text.
    #[inline]
    pub async fn complete(&self, req: &CompletionRequest) -> Result<String, Error> {
        (self.complete_fn)(req).await
    }
}

trait BackendObject: Send + Sync + 'static {
    fn validate(&self) -> Result<(), Error>;

    fn describe_index(&self) -> BoxedFuture<IndexDescriptor>;

    fn query(&self, host: &str, query: &VectorQuery) -> BoxedFuture<QueryResponse>;
}

struct AnyBackend<B: VectorBackend>(B);

impl<B: VectorBackend + 'static> BackendObject for AnyBackend<B> {
    #[inline]
    fn validate(&self) -> Result<(), Error> {
        self.0.validate().map_err(|err| Error::from_provider(&err))
    }

    fn describe_index(&self) -> BoxedFuture<IndexDescriptor> {
        let fut = self.0.describe_index();
        Box::pin(async move {
            fut.await.map_err(|err| {
                debug!("describe index failed: {err:?}");
                Error::from_provider(&err)
            })
        })
    }

    fn query(&self, host: &str, query: &VectorQuery) -> BoxedFuture<QueryResponse> {
        let fut = self.0.query(host, query);
        Box::pin(async move {
            fut.await.map_err(|err| {
                error!("got an error: {err:?}");
                Error::from_provider(&err)
            })
        })
    }
}

/// A type-erased handle to a vector backend.
#[derive(Clone)]
pub struct BackendClient {
    backend: Arc<dyn BackendObject>,
}

impl BackendClient {
    /// Wraps a vector backend.
    #[inline]
    pub fn new<B: VectorBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(AnyBackend(backend)),
        }
    }

    /// Checks the backend configuration without touching the network.
    #[inline]
    pub fn validate(&self) -> Result<(), Error> {
        self.backend.validate()
    }

    /// Asks the backend for the descriptor of the configured index.
    #[inline]
    pub async fn describe_index(&self) -> Result<IndexDescriptor, Error> {
        self.backend.describe_index().await
    }

    /// Runs a nearest-neighbour query against the index at `host`.
    #[inline]
    pub async fn query(
        &self,
        host: &str,
        query: &VectorQuery,
    ) -> Result<QueryResponse, Error> {
        self.backend.query(host, query).await
    }
}
