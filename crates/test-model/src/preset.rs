use grounded_chat_model::{ErrorKind, QueryMatch};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A match the fake backend returns for every query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresetMatch {
    /// Identifier of the index entry.
    pub id: String,
    /// Relevance score.
    pub score: f32,
    /// Metadata object, anything other than a JSON object is dropped.
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl PresetMatch {
    /// Creates a match without metadata.
    #[inline]
    pub fn new<S: Into<String>>(id: S, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
            metadata: None,
        }
    }

    /// Attaches a metadata object.
    #[inline]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl From<&PresetMatch> for QueryMatch {
    fn from(preset: &PresetMatch) -> Self {
        let metadata = match &preset.metadata {
            Some(Value::Object(map)) => Some(map.clone()),
            _ => None,
        };
        QueryMatch {
            id: preset.id.clone(),
            score: preset.score,
            metadata,
        }
    }
}

/// Makes a fake fail in the first `times` attempts. `0` means the fake
/// fails forever.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PresetFailure {
    /// The kind of the returned error.
    pub kind: ErrorKind,
    /// The message of the returned error.
    pub message: String,
    /// How many attempts fail before the fake recovers.
    pub times: u64,
}

impl PresetFailure {
    /// Creates a failure that never recovers.
    #[inline]
    pub fn always<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            times: 0,
        }
    }

    /// Creates a failure that recovers after `times` attempts.
    #[inline]
    pub fn times<S: Into<String>>(
        kind: ErrorKind,
        message: S,
        times: u64,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            times,
        }
    }

    /// Returns `true` if the given 1-based attempt should fail.
    #[inline]
    pub(crate) fn applies_to(&self, attempt: u64) -> bool {
        self.times == 0 || attempt <= self.times
    }
}
