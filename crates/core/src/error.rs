use std::error::Error as StdError;
use std::fmt::{self, Display};

use grounded_chat_model::{ErrorKind, ProviderError};

/// The error type of the pipeline.
///
/// Every error carries a human-readable message that can be shown to the
/// user as-is.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    /// Creates a new error.
    #[inline]
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates an error from a provider failure, keeping its kind and
    /// message.
    #[inline]
    pub fn from_provider<E: ProviderError + ?Sized>(err: &E) -> Self {
        Self::new(err.kind(), err.to_string())
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
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
