use grounded_chat_model::{
    IndexDescriptor, QueryMatch, QueryResponse, VectorQuery,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::PineconeConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DescribeIndexResponse {
    pub name: Option<String>,
    pub host: Option<String>,
    pub dimension: Option<u32>,
    pub metric: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct QueryResponseBody {
    #[serde(default)]
    pub matches: Vec<Match>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Match {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Flat { message: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Object { message: String },
    Text(String),
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_query_request<'a>(
    query: &'a VectorQuery,
    config: &'a PineconeConfig,
) -> QueryRequest<'a> {
    QueryRequest {
        vector: &query.vector,
        top_k: query.top_k,
        include_metadata: query.include_metadata,
        include_values: query.include_values,
        namespace: config.namespace(),
    }
}

impl DescribeIndexResponse {
    /// Converts the response into a descriptor, or `None` if the backend
    /// didn't report a usable host.
    pub fn into_descriptor(self, fallback_name: &str) -> Option<IndexDescriptor> {
        let host = self.host.filter(|host| !host.trim().is_empty())?;
        Some(IndexDescriptor {
            name: self.name.unwrap_or_else(|| fallback_name.to_owned()),
            host,
            dimension: self.dimension,
            metric: self.metric,
        })
    }
}

impl From<QueryResponseBody> for QueryResponse {
    fn from(body: QueryResponseBody) -> Self {
        let matches = body
            .matches
            .into_iter()
            .map(|m| QueryMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata,
            })
            .collect();
        QueryResponse { matches }
    }
}

/// Extracts a human-readable message from an error body.
pub fn error_message(body: &str) -> Option<String> {
    let message = match serde_json::from_str(body).ok()? {
        ErrorBody::Nested {
            error: ErrorDetail::Object { message },
        } => message,
        ErrorBody::Nested {
            error: ErrorDetail::Text(message),
        } => message,
        ErrorBody::Flat { message } => message,
    };
    (!message.is_empty()).then_some(message)
}
