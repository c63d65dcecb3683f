use std::pin::Pin;
use std::sync::Arc;

use grounded_chat_model::{EmbeddingProvider, ErrorKind};
use tracing::Instrument;

use crate::Error;

type BoxedEmbedFuture =
    Pin<Box<dyn Future<Output = Result<Vec<f32>, Error>> + Send>>;
type EmbedFn = Arc<dyn Fn(&str) -> BoxedEmbedFuture + Send + Sync>;

/// Converts free text into an embedding vector.
///
/// The dimensionality is defined by the wrapped provider. No retry is done
/// here, failures are returned to the caller as-is.
#[derive(Clone)]
pub struct Embedder {
    embed_fn: EmbedFn,
}

impl Embedder {
    /// Wraps an embedding provider.
    #[inline]
    pub fn new<P: EmbeddingProvider + 'static>(provider: P) -> Self {
        let embed_fn: EmbedFn = Arc::new(move |input: &str| -> BoxedEmbedFuture {
            let fut = provider.embed(input);
            Box::pin(
                async move {
                    let embedding = fut.await.map_err(|err| {
                        error!("embedding failed: {err:?}");
                        Error::from_provider(&err)
                    })?;
                    trace!("got an embedding of {} dimensions", embedding.len());
                    Ok(embedding)
                }
                .instrument(trace_span!("embed")),
            )
        });
        Self { embed_fn }
    }

    /// Embeds `input`, which must not be blank.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, Error> {
        if input.trim().is_empty() {
            return Err(Error::new(
                ErrorKind::Validation,
                "Cannot embed empty text",
            ));
        }
        (self.embed_fn)(input).await
    }
}
