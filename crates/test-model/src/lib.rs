//! Local fake providers for testing purpose.
//!
//! Every fake is cheaply cloneable and clones share their call logs, so a
//! test can hand one clone to the code under test and inspect the other.
//!
//! # Note
//!
//! These types are not optimized for production use, there are heavy memory
//! copies involved. You should only use them for testing.

mod preset;
mod stub_server;

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use grounded_chat_model::{
    ChatMessage, ChatModel, CompletionRequest, EmbeddingProvider, ErrorKind,
    IndexDescriptor, ProviderError, QueryResponse, VectorBackend, VectorQuery,
};
use tokio::time::sleep;

pub use preset::*;
pub use stub_server::{StubReply, StubServer};

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
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

impl From<&PresetFailure> for Error {
    fn from(failure: &PresetFailure) -> Self {
        Self {
            message: failure.message.clone(),
            kind: failure.kind,
        }
    }
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves the result after an optional delay, so tests can observe the
/// in-flight state.
async fn delayed<T>(delay: Option<Duration>, result: T) -> T {
    if let Some(delay) = delay {
        sleep(delay).await;
    }
    result
}

fn check_failure(
    failure: Option<&PresetFailure>,
    attempt: u64,
) -> Result<(), Error> {
    match failure {
        Some(failure) if failure.applies_to(attempt) => Err(failure.into()),
        _ => Ok(()),
    }
}

/// A fake embedding provider that derives vectors from the input bytes.
#[derive(Clone)]
pub struct TestEmbedder {
    dimension: usize,
    failure: Option<PresetFailure>,
    delay: Option<Duration>,
    inputs: Arc<Mutex<Vec<String>>>,
}

impl Default for TestEmbedder {
    fn default() -> Self {
        Self::new(8)
    }
}

impl TestEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            failure: None,
            delay: None,
            inputs: Default::default(),
        }
    }

    #[inline]
    pub fn set_failure(&mut self, failure: PresetFailure) {
        self.failure = Some(failure);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every input this embedder has been asked for.
    #[inline]
    pub fn inputs(&self) -> Vec<String> {
        lock(&self.inputs).clone()
    }
}

impl EmbeddingProvider for TestEmbedder {
    type Error = crate::Error;

    fn embed(
        &self,
        input: &str,
    ) -> impl Future<Output = Result<Vec<f32>, Self::Error>> + Send + 'static
    {
        let attempt = {
            let mut inputs = lock(&self.inputs);
            inputs.push(input.to_owned());
            inputs.len() as u64
        };
        let result = check_failure(self.failure.as_ref(), attempt).map(|_| {
            let seed = input.bytes().fold(0u32, |acc, b| {
                acc.wrapping_mul(31).wrapping_add(u32::from(b))
            });
            (0..self.dimension)
                .map(|i| ((seed.wrapping_add(i as u32) % 97) as f32) / 97.0)
                .collect()
        });
        delayed(self.delay, result)
    }
}

#[derive(Default)]
struct BackendLog {
    describe_calls: u64,
    queries: Vec<(String, VectorQuery)>,
}

/// A fake vector backend that answers every query with preset matches.
#[derive(Clone)]
pub struct TestVectorBackend {
    descriptor: IndexDescriptor,
    matches: Vec<PresetMatch>,
    config_failure: Option<PresetFailure>,
    describe_failure: Option<PresetFailure>,
    query_failure: Option<PresetFailure>,
    ignore_top_k: bool,
    log: Arc<Mutex<BackendLog>>,
}

impl Default for TestVectorBackend {
    fn default() -> Self {
        Self {
            descriptor: IndexDescriptor {
                name: "test-index".to_owned(),
                host: "test-index.svc.local".to_owned(),
                dimension: Some(8),
                metric: Some("cosine".to_owned()),
            },
            matches: vec![],
            config_failure: None,
            describe_failure: None,
            query_failure: None,
            ignore_top_k: false,
            log: Default::default(),
        }
    }
}

impl TestVectorBackend {
    /// Sets the matches returned by every query, most relevant first.
    #[inline]
    pub fn set_matches(&mut self, matches: impl Into<Vec<PresetMatch>>) {
        self.matches = matches.into();
    }

    /// Makes `validate` fail, as if credentials were not configured.
    #[inline]
    pub fn set_config_failure<S: Into<String>>(&mut self, message: S) {
        self.config_failure =
            Some(PresetFailure::always(ErrorKind::Config, message));
    }

    #[inline]
    pub fn set_describe_failure(&mut self, failure: PresetFailure) {
        self.describe_failure = Some(failure);
    }

    #[inline]
    pub fn set_query_failure(&mut self, failure: PresetFailure) {
        self.query_failure = Some(failure);
    }

    /// Makes queries return every preset match, like a backend that
    /// doesn't honour `top_k`.
    #[inline]
    pub fn set_ignore_top_k(&mut self, ignore: bool) {
        self.ignore_top_k = ignore;
    }

    #[inline]
    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    #[inline]
    pub fn describe_calls(&self) -> u64 {
        lock(&self.log).describe_calls
    }

    /// Returns every `(host, query)` pair this backend has received.
    #[inline]
    pub fn queries(&self) -> Vec<(String, VectorQuery)> {
        lock(&self.log).queries.clone()
    }
}

impl VectorBackend for TestVectorBackend {
    type Error = crate::Error;

    fn validate(&self) -> Result<(), Self::Error> {
        check_failure(self.config_failure.as_ref(), 1)
    }

    fn describe_index(
        &self,
    ) -> impl Future<Output = Result<IndexDescriptor, Self::Error>> + Send + 'static
    {
        let attempt = {
            let mut log = lock(&self.log);
            log.describe_calls += 1;
            log.describe_calls
        };
        let result = self
            .validate()
            .and_then(|_| check_failure(self.describe_failure.as_ref(), attempt))
            .map(|_| self.descriptor.clone());
        std::future::ready(result)
    }

    fn query(
        &self,
        host: &str,
        query: &VectorQuery,
    ) -> impl Future<Output = Result<QueryResponse, Self::Error>> + Send + 'static
    {
        let attempt = {
            let mut log = lock(&self.log);
            log.queries.push((host.to_owned(), query.clone()));
            log.queries.len() as u64
        };
        let result = self
            .validate()
            .and_then(|_| check_failure(self.query_failure.as_ref(), attempt))
            .map(|_| QueryResponse {
                matches: self
                    .matches
                    .iter()
                    .take(if self.ignore_top_k {
                        usize::MAX
                    } else {
                        query.top_k
                    })
                    .map(Into::into)
                    .collect(),
            });
        std::future::ready(result)
    }
}

/// A fake chat model.
///
/// It replies with the preset reply if there is one, otherwise it echoes
/// the last user message.
#[derive(Clone, Default)]
pub struct TestChatModel {
    reply: Option<String>,
    failure: Option<PresetFailure>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl TestChatModel {
    #[inline]
    pub fn set_reply<S: Into<String>>(&mut self, reply: S) {
        self.reply = Some(reply.into());
    }

    #[inline]
    pub fn set_failure(&mut self, failure: PresetFailure) {
        self.failure = Some(failure);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request this model has received.
    #[inline]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }
}

impl ChatModel for TestChatModel {
    type Error = crate::Error;

    fn complete(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'static
    {
        let attempt = {
            let mut requests = lock(&self.requests);
            requests.push(req.clone());
            requests.len() as u64
        };
        let result = check_failure(self.failure.as_ref(), attempt).map(|_| {
            self.reply.clone().unwrap_or_else(|| {
                let last_user = req.messages.iter().rev().find_map(|msg| {
                    match msg {
                        ChatMessage::User(text) => Some(text.as_str()),
                        _ => None,
                    }
                });
                format!("You said {}", last_user.unwrap_or_default())
            })
        });
        delayed(self.delay, result)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_embedder() {
        let embedder = TestEmbedder::new(4);
        let first = embedder.embed("vector databases").await.unwrap();
        let second = embedder.embed("vector databases").await.unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
        assert_eq!(embedder.inputs().len(), 2);

        let mut embedder = TestEmbedder::default();
        embedder.set_failure(PresetFailure::times(
            ErrorKind::Upstream,
            "overloaded",
            1,
        ));
        let err = embedder.embed("hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert!(embedder.embed("hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_backend() {
        let mut backend = TestVectorBackend::default();
        backend.set_matches([
            PresetMatch::new("a", 0.9)
                .with_metadata(json!({ "content": "alpha" })),
            PresetMatch::new("b", 0.8),
            PresetMatch::new("c", 0.7),
        ]);
        backend.set_describe_failure(PresetFailure::times(
            ErrorKind::Connection,
            "unreachable",
            1,
        ));

        let err = backend.describe_index().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        let descriptor = backend.describe_index().await.unwrap();
        assert_eq!(backend.describe_calls(), 2);

        let query = VectorQuery {
            vector: vec![0.0; 8],
            top_k: 2,
            include_metadata: true,
            include_values: false,
        };
        let resp = backend.query(&descriptor.host, &query).await.unwrap();
        assert_eq!(resp.matches.len(), 2);
        assert_eq!(resp.matches[0].id, "a");
        assert_eq!(backend.queries()[0].0, "test-index.svc.local");

        backend.set_ignore_top_k(true);
        let resp = backend.query(&descriptor.host, &query).await.unwrap();
        assert_eq!(resp.matches.len(), 3);
    }

    #[tokio::test]
    async fn test_chat_model() {
        let mut model = TestChatModel::default();
        let req = CompletionRequest {
            messages: vec![
                ChatMessage::System("Be helpful.".to_owned()),
                ChatMessage::User("Good morning".to_owned()),
            ],
            temperature: 0.3,
            max_tokens: 64,
        };
        assert_eq!(model.complete(&req).await.unwrap(), "You said Good morning");

        model.set_reply("Fixed reply");
        assert_eq!(model.complete(&req).await.unwrap(), "Fixed reply");
        assert_eq!(model.requests().len(), 2);

        model.set_failure(PresetFailure::always(ErrorKind::Upstream, "boom"));
        let err = model.complete(&req).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
