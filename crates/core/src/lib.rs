//! Retrieval-augmented chat pipeline: embedding, index search, connection
//! probing, conversation state and grounded answer generation.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod answer;
mod client;
pub mod conversation;
mod embedding;
mod error;
mod index;
mod orchestrator;
mod probe;
pub mod retry;

pub use answer::{AnswerGenerator, GeneratorOptions};
pub use client::{BackendClient, ChatClient};
pub use embedding::Embedder;
pub use error::Error;
pub use grounded_chat_model::ErrorKind;
pub use index::{FilterPolicy, IndexClient, resolve_field};
pub use orchestrator::{ChatResponse, Orchestrator, OrchestratorBuilder, TurnStage};
pub use probe::{ProbeReport, Prober};
