use std::time::Duration;

use grounded_chat_model::{ErrorKind, QueryMatch, VectorQuery};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::Error;
use crate::client::BackendClient;
use crate::conversation::Source;
use crate::embedding::Embedder;
use crate::probe::Prober;

const TITLE_KEYS: &[&str] = &[
    "title",
    "category",
    "filename",
    "file_name",
    "document_name",
    "original_filename",
    "file",
];
const CONTENT_KEYS: &[&str] = &["content", "text", "chunk_text"];
const URL_KEYS: &[&str] = &["url", "source_url"];
const NO_CONTENT: &str = "No content available";

/// Decides how the similarity threshold affects search results.
///
/// Neither policy returns an empty list while the backend reported at
/// least one match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Returns every match. The threshold only triggers a warning when no
    /// match reaches it.
    #[default]
    Advisory,
    /// Drops matches below the threshold, keeping the best match if
    /// nothing else is left.
    BestMatchFallback,
}

/// Returns the first value among `keys` that is a non-blank string.
pub fn resolve_field(
    metadata: Option<&Map<String, Value>>,
    keys: &[&str],
) -> Option<String> {
    let metadata = metadata?;
    keys.iter().find_map(|key| match metadata.get(*key) {
        Some(Value::String(value)) if !value.trim().is_empty() => {
            Some(value.clone())
        }
        _ => None,
    })
}

impl From<QueryMatch> for Source {
    fn from(m: QueryMatch) -> Self {
        let metadata = m.metadata.as_ref();
        let title = resolve_field(metadata, TITLE_KEYS).unwrap_or_else(|| {
            let short_id: String = m.id.chars().take(8).collect();
            format!("Document {short_id}")
        });
        let content = resolve_field(metadata, CONTENT_KEYS)
            .unwrap_or_else(|| NO_CONTENT.to_owned());
        let url = resolve_field(metadata, URL_KEYS);
        Source {
            id: m.id,
            title,
            content,
            similarity: m.score,
            url,
            metadata: m.metadata,
        }
    }
}

/// Searches the vector index for chunks similar to a text query.
#[derive(Clone)]
pub struct IndexClient {
    backend: BackendClient,
    embedder: Embedder,
    prober: Prober,
    policy: FilterPolicy,
    probe_attempts: u32,
    probe_delay: Duration,
}

impl IndexClient {
    /// Creates a client that probes the backend with the given retry
    /// settings before every search.
    pub fn new(
        backend: BackendClient,
        embedder: Embedder,
        policy: FilterPolicy,
        probe_attempts: u32,
        probe_delay: Duration,
    ) -> Self {
        Self {
            prober: Prober::new(backend.clone()),
            backend,
            embedder,
            policy,
            probe_attempts,
            probe_delay,
        }
    }

    /// Returns the prober used before each search.
    #[inline]
    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    /// Returns at most `top_k` sources for `query`, in backend ranking
    /// order.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<Source>, Error> {
        if query.trim().is_empty() {
            return Err(Error::new(
                ErrorKind::Validation,
                "Search query must not be empty",
            ));
        }
        self.backend.validate()?;

        let span = debug_span!("search", top_k, similarity_threshold);
        async move {
            let report =
                self.prober.probe(self.probe_attempts, self.probe_delay).await;
            let descriptor = match report.details {
                Some(descriptor) if report.success => descriptor,
                _ => {
                    error!("index is unreachable: {}", report.message);
                    return Err(Error::new(ErrorKind::Connection, report.message));
                }
            };

            let vector = self.embedder.embed(query).await?;
            let vector_query = VectorQuery {
                vector,
                top_k,
                include_metadata: true,
                include_values: false,
            };
            let resp = self.backend.query(&descriptor.host, &vector_query).await?;
            debug!("backend returned {} matches", resp.matches.len());

            let sources: Vec<Source> = resp
                .matches
                .into_iter()
                .take(top_k)
                .map(Source::from)
                .collect();
            Ok(apply_policy(self.policy, sources, similarity_threshold))
        }
        .instrument(span)
        .await
    }
}

fn apply_policy(
    policy: FilterPolicy,
    sources: Vec<Source>,
    threshold: f32,
) -> Vec<Source> {
    if sources.is_empty() || sources.iter().any(|s| s.similarity >= threshold) {
        return match policy {
            FilterPolicy::Advisory => sources,
            FilterPolicy::BestMatchFallback => sources
                .into_iter()
                .filter(|s| s.similarity >= threshold)
                .collect(),
        };
    }

    warn!(
        "no match reaches the similarity threshold {threshold}, \
         answering with low confidence"
    );
    match policy {
        FilterPolicy::Advisory => sources,
        FilterPolicy::BestMatchFallback => sources
            .into_iter()
            .reduce(|best, s| if s.similarity > best.similarity { s } else { best })
            .into_iter()
            .collect(),
    }
}
