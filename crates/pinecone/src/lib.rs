//! A vector backend for Pinecone-compatible indexes.

#[macro_use]
extern crate tracing;

mod config;
mod http;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use grounded_chat_model::{
    ErrorKind, IndexDescriptor, ProviderError, QueryResponse, VectorBackend,
    VectorQuery,
};
use reqwest::{Client, RequestBuilder, header};

pub use config::{PineconeConfig, PineconeConfigBuilder};
use proto::{DescribeIndexResponse, QueryResponseBody};

const API_KEY_HEADER: &str = "Api-Key";
const API_VERSION_HEADER: &str = "X-Pinecone-API-Version";

/// Error type for [`PineconeBackend`].
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

/// Pinecone-compatible vector backend bound to one index.
#[derive(Clone, Debug)]
pub struct PineconeBackend {
    client: Client,
    config: Arc<PineconeConfig>,
}

impl PineconeBackend {
    /// Creates a new `PineconeBackend` with the given configuration.
    #[inline]
    pub fn new(config: PineconeConfig) -> Self {
        Self {
            client: build_client(&config),
            config: Arc::new(config),
        }
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(API_VERSION_HEADER, &self.config.api_version)
            .header(header::ACCEPT, "application/json")
    }
}

fn build_client(config: &PineconeConfig) -> Client {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .unwrap_or_else(|err| {
            error!("failed to build the HTTP client, falling back to defaults: {err}");
            Client::new()
        })
}

impl VectorBackend for PineconeBackend {
    type Error = Error;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.config.api_key.is_empty() {
            return Err(Error::new(
                "Pinecone API key is missing. Please configure it in settings.",
                ErrorKind::Config,
            ));
        }
        if self.config.index_name.is_empty() {
            return Err(Error::new(
                "Pinecone index name is missing. Please configure it in settings.",
                ErrorKind::Config,
            ));
        }
        Ok(())
    }

    fn describe_index(
        &self,
    ) -> impl Future<Output = Result<IndexDescriptor, Self::Error>> + Send + 'static
    {
        let checked = self.validate().map(|_| {
            self.authorize(self.client.get(self.config.describe_url()))
                .send()
        });
        let index_name = self.config.index_name.clone();

        async move {
            let resp = checked?.await.map_err(http::transport_error)?;
            let resp: DescribeIndexResponse = http::read_json(resp).await?;
            trace!("got an index description: {resp:?}");
            resp.into_descriptor(&index_name).ok_or_else(|| {
                Error::new(
                    format!("Index `{index_name}` was described without a host"),
                    ErrorKind::Upstream,
                )
            })
        }
    }

    fn query(
        &self,
        host: &str,
        query: &VectorQuery,
    ) -> impl Future<Output = Result<QueryResponse, Self::Error>> + Send + 'static
    {
        let checked = self.validate().map(|_| {
            let body = proto::create_query_request(query, &self.config);
            self.authorize(self.client.post(config::query_url(host)))
                .header(header::CONTENT_TYPE, "application/json")
                .json(&body)
                .send()
        });

        async move {
            let resp = checked?.await.map_err(http::transport_error)?;
            let body: QueryResponseBody = http::read_json(resp).await?;
            Ok(body.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use grounded_chat_test_model::{StubReply, StubServer};

    use super::*;

    #[test]
    fn test_validate() {
        let backend =
            PineconeBackend::new(PineconeConfigBuilder::new("", "docs").build());
        let err = backend.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.message().contains("API key"));

        let backend =
            PineconeBackend::new(PineconeConfigBuilder::new("k", " ").build());
        let err = backend.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.message().contains("index name"));

        let backend =
            PineconeBackend::new(PineconeConfigBuilder::new("k", "docs").build());
        assert!(backend.validate().is_ok());
    }

    #[tokio::test]
    async fn test_requests_fail_fast_without_config() {
        let backend =
            PineconeBackend::new(PineconeConfigBuilder::new("", "").build());
        let err = backend.describe_index().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let query = VectorQuery {
            vector: vec![0.1, 0.2],
            top_k: 3,
            include_metadata: true,
            include_values: false,
        };
        let err = backend.query("localhost", &query).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_unresponsive_server_times_out() {
        let server = StubServer::start([StubReply::Silent]).await.unwrap();
        let backend = PineconeBackend::new(
            PineconeConfigBuilder::new("pc-test", "docs")
                .with_control_plane_url(server.url())
                .with_timeout(Duration::from_millis(200))
                .build(),
        );

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            backend.describe_index(),
        )
        .await
        .expect("request should give up on its own")
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.message().contains("Pinecone did not respond in time"));
    }

    #[tokio::test]
    async fn test_describe_index() {
        let server = StubServer::start([StubReply::json(
            200,
            r#"{"name":"docs","dimension":1536,"host":"docs-abc123.svc.pinecone.io"}"#,
        )])
        .await
        .unwrap();
        let backend = PineconeBackend::new(
            PineconeConfigBuilder::new("pc-test", "docs")
                .with_control_plane_url(server.url())
                .build(),
        );
        let descriptor = backend.describe_index().await.unwrap();
        assert_eq!(descriptor.host, "docs-abc123.svc.pinecone.io");
    }
}
