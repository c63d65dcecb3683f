use std::time::Duration;

use grounded_chat_model::IndexDescriptor;
use serde::Serialize;

use crate::client::BackendClient;
use crate::retry::{RetryPolicy, retry};

/// The outcome of a connectivity check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Whether the index answered.
    pub success: bool,
    /// Human-readable summary, or the last error on failure.
    pub message: String,
    /// The descriptor reported by the backend on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<IndexDescriptor>,
}

/// Verifies that the vector backend is reachable with the configured
/// credentials.
#[derive(Clone)]
pub struct Prober {
    backend: BackendClient,
}

impl Prober {
    /// Creates a prober for `backend`.
    #[inline]
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Describes the index, retrying up to `max_attempts` times with a
    /// doubling delay that starts at `initial_delay`.
    ///
    /// Missing configuration and rejected credentials are not retried.
    /// This never fails; the report carries the last error instead.
    pub async fn probe(
        &self,
        max_attempts: u32,
        initial_delay: Duration,
    ) -> ProbeReport {
        let policy = RetryPolicy::new(max_attempts.max(1), initial_delay);
        let result = retry(&policy, "index probe", || {
            let backend = self.backend.clone();
            async move {
                backend.validate()?;
                backend.describe_index().await
            }
        })
        .await;

        match result {
            Ok(descriptor) => {
                debug!("index `{}` is served by {}", descriptor.name, descriptor.host);
                ProbeReport {
                    success: true,
                    message: format!(
                        "Successfully connected to index `{}`",
                        descriptor.name
                    ),
                    details: Some(descriptor),
                }
            }
            Err(err) => {
                warn!("index probe failed: {err}");
                ProbeReport {
                    success: false,
                    message: err.message().to_owned(),
                    details: None,
                }
            }
        }
    }
}
