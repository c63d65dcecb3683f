use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Describes a vector index as reported by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Name of the index.
    pub name: String,
    /// The data-plane host that serves queries for this index.
    pub host: String,
    /// Dimensionality of the stored vectors, if reported.
    pub dimension: Option<u32>,
    /// Similarity metric, if reported.
    pub metric: Option<String>,
}

/// A similarity query.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorQuery {
    /// The query embedding.
    pub vector: Vec<f32>,
    /// Maximum number of matches wanted.
    pub top_k: usize,
    /// Whether the backend should return the stored metadata.
    pub include_metadata: bool,
    /// Whether the backend should return the stored vector values.
    pub include_values: bool,
}

/// The matches of a similarity query, ranked by the backend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResponse {
    /// The matches, most relevant first.
    pub matches: Vec<QueryMatch>,
}

/// A single match of a similarity query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryMatch {
    /// Identifier of the index entry.
    pub id: String,
    /// Relevance score, higher is more relevant.
    pub score: f32,
    /// Metadata stored alongside the vector.
    pub metadata: Option<Map<String, Value>>,
}
