//! Embedding and chat-completion providers for OpenAI-compatible APIs.

#[macro_use]
extern crate tracing;

mod config;
mod http;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use grounded_chat_model::{
    ChatModel, CompletionRequest, EmbeddingProvider, ErrorKind, ProviderError,
};
use reqwest::{Client, header};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use proto::{ChatCompletion, EmbeddingResponse};

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible provider, serving both embeddings and chat
/// completions with a single credential.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: build_client(&config),
            config: Arc::new(config),
        }
    }

    fn check_api_key(&self) -> Result<(), Error> {
        if self.config.api_key.is_empty() {
            return Err(Error::new(
                "OpenAI API key is missing. Please configure it in settings.",
                ErrorKind::Config,
            ));
        }
        Ok(())
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.config.endpoint(path))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
    }
}

fn build_client(config: &OpenAIConfig) -> Client {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .unwrap_or_else(|err| {
            error!("failed to build the HTTP client, falling back to defaults: {err}");
            Client::new()
        })
}

impl EmbeddingProvider for OpenAIProvider {
    type Error = Error;

    fn embed(
        &self,
        input: &str,
    ) -> impl Future<Output = Result<Vec<f32>, Self::Error>> + Send + 'static
    {
        let checked = self.check_api_key().map(|_| {
            let body = proto::create_embedding_request(input, &self.config);
            self.post("/embeddings").json(&body).send()
        });

        async move {
            let resp = checked?.await.map_err(http::transport_error)?;
            let resp: EmbeddingResponse = http::read_json(resp).await?;
            let embedding = resp.into_first_embedding().ok_or_else(|| {
                Error::new(
                    "Invalid response from OpenAI: embedding is missing",
                    ErrorKind::Upstream,
                )
            })?;
            trace!("got an embedding with {} dimensions", embedding.len());
            Ok(embedding)
        }
    }
}

impl ChatModel for OpenAIProvider {
    type Error = Error;

    fn complete(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        let checked = self.check_api_key().map(|_| {
            let body = proto::create_chat_request(req, &self.config);
            self.post("/chat/completions").json(&body).send()
        });

        async move {
            let resp = checked?.await.map_err(http::transport_error)?;
            let completion: ChatCompletion = http::read_json(resp).await?;
            completion.into_first_content().ok_or_else(|| {
                Error::new(
                    "Invalid response from OpenAI: completion content is missing",
                    ErrorKind::Upstream,
                )
            })
        }
    }
}
