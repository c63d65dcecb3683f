use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required credential or identifier is missing or blank.
    Config,
    /// The remote service is unreachable.
    Connection,
    /// The credential was rejected by the remote service.
    Auth,
    /// The remote service is reachable but returned a failure or a
    /// malformed payload.
    Upstream,
    /// The caller passed malformed input.
    Validation,
}

impl ErrorKind {
    /// Returns `true` if retrying the same operation can never succeed
    /// without outside intervention.
    #[inline]
    pub fn is_permanent(self) -> bool {
        matches!(
            self,
            ErrorKind::Config | ErrorKind::Auth | ErrorKind::Validation
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Config => write!(f, "Configuration error"),
            ErrorKind::Connection => write!(f, "Connection error"),
            ErrorKind::Auth => write!(f, "Authorization error"),
            ErrorKind::Upstream => write!(f, "Upstream error"),
            ErrorKind::Validation => write!(f, "Validation error"),
        }
    }
}
