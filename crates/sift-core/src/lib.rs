//! Retrieval routing and context assembly for sift.

pub mod answer;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod retriever;
pub mod router;
pub mod secret;
#[cfg(test)]
mod testing;

pub use answer::{Answer, AnswerGenerator, ResponseMode};
pub use config::Config;
pub use context::{ContextBlock, Provenance, Segment};
pub use engine::{QueryRequest, RagEngine};
pub use error::EngineError;
pub use router::{Route, RouteDecision, SourceAvailability};
