//! A ready-to-use grounded chat session backed by OpenAI and Pinecone.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring document-grounded chat into your own host
//! apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod session;

pub use session::{Session, SessionBuilder};

/// Re-exports of [`grounded_chat_core`] crate.
pub mod core {
    pub use grounded_chat_core::*;
}
