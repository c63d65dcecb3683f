//! An abstraction layer for the remote services a retrieval-augmented chat
//! depends on.
//!
//! This crate establishes a unified protocol for embedding providers,
//! vector search backends and chat-completion models, so that the pipeline
//! can switch between vendors without modifying the core codebase.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod chat;
mod error;
mod provider;
mod vector;

pub use chat::*;
pub use error::*;
pub use provider::*;
pub use vector::*;
