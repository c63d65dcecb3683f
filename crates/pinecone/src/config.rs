use std::fmt::Debug;
use std::time::Duration;

const DEFAULT_CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const DEFAULT_API_VERSION: &str = "2024-07";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`PineconeConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PineconeConfigBuilder {
    api_key: String,
    index_name: String,
    namespace: Option<String>,
    control_plane_url: Option<String>,
    api_version: Option<String>,
    timeout: Duration,
}

impl PineconeConfigBuilder {
    /// Creates a builder with the given API key and index name.
    ///
    /// Both values are trimmed. Blank values are accepted here and
    /// reported by [`VectorBackend::validate`].
    ///
    /// [`VectorBackend::validate`]: grounded_chat_model::VectorBackend::validate
    #[inline]
    pub fn new<K: Into<String>, I: Into<String>>(
        api_key: K,
        index_name: I,
    ) -> Self {
        Self {
            api_key: api_key.into().trim().to_owned(),
            index_name: index_name.into().trim().to_owned(),
            namespace: None,
            control_plane_url: None,
            api_version: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Restricts queries to a namespace. A blank namespace is ignored.
    #[inline]
    pub fn with_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        let namespace = namespace.into().trim().to_owned();
        self.namespace = (!namespace.is_empty()).then_some(namespace);
        self
    }

    /// Sets a custom control-plane URL, e.g. a relay endpoint.
    #[inline]
    pub fn with_control_plane_url<S: Into<String>>(mut self, url: S) -> Self {
        self.control_plane_url = Some(url.into());
        self
    }

    /// Overrides the `X-Pinecone-API-Version` header.
    #[inline]
    pub fn with_api_version<S: Into<String>>(mut self, version: S) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Sets how long a single request may take, including reading the
    /// response. Defaults to 30 seconds.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> PineconeConfig {
        let control_plane_url = self
            .control_plane_url
            .unwrap_or_else(|| DEFAULT_CONTROL_PLANE_URL.to_owned());
        PineconeConfig {
            api_key: self.api_key,
            index_name: self.index_name,
            namespace: self.namespace,
            control_plane_url: control_plane_url.trim_end_matches('/').to_owned(),
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_owned()),
            timeout: self.timeout,
        }
    }
}

impl Debug for PineconeConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("index_name", &self.index_name)
            .field("namespace", &self.namespace)
            .field("control_plane_url", &self.control_plane_url)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Configuration for the Pinecone-compatible backend.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PineconeConfig {
    pub(crate) api_key: String,
    pub(crate) index_name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) control_plane_url: String,
    pub(crate) api_version: String,
    pub(crate) timeout: Duration,
}

impl PineconeConfig {
    /// Returns the configured namespace, if any.
    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[inline]
    pub(crate) fn describe_url(&self) -> String {
        format!("{}/indexes/{}", self.control_plane_url, self.index_name)
    }
}

/// Returns the query endpoint of a data-plane host.
///
/// Hosts reported by the control plane carry no scheme, but relays and
/// local emulators may be given with one.
#[inline]
pub(crate) fn query_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.contains("://") {
        format!("{host}/query")
    } else {
        format!("https://{host}/query")
    }
}

impl Debug for PineconeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PineconeConfig")
            .field("api_key", &"<redacted>")
            .field("index_name", &self.index_name)
            .field("namespace", &self.namespace)
            .field("control_plane_url", &self.control_plane_url)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build() {
        let config = PineconeConfigBuilder::new(" pc-secret ", " docs ")
            .with_namespace("   ")
            .build();
        assert_eq!(config.api_key, "pc-secret");
        assert_eq!(config.index_name, "docs");
        assert_eq!(config.namespace(), None);
        assert_eq!(config.describe_url(), "https://api.pinecone.io/indexes/docs");
        assert!(!format!("{config:?}").contains("pc-secret"));
        assert_eq!(config.timeout, Duration::from_secs(30));

        let config = PineconeConfigBuilder::new("k", "docs")
            .with_namespace("handbook")
            .with_control_plane_url("http://localhost:5080/")
            .with_timeout(Duration::from_secs(5))
            .build();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.namespace(), Some("handbook"));
        assert_eq!(config.describe_url(), "http://localhost:5080/indexes/docs");
    }

    #[test]
    fn test_query_url() {
        assert_eq!(
            query_url("docs-abc123.svc.gcp-starter.pinecone.io"),
            "https://docs-abc123.svc.gcp-starter.pinecone.io/query"
        );
        assert_eq!(
            query_url("http://localhost:5081/"),
            "http://localhost:5081/query"
        );
    }
}
