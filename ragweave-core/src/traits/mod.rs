//! Capability traits at the seams between subsystems

mod embedder;
mod generator;
mod retriever;

pub use embedder::Embedder;
pub use generator::{GenerationRequest, Generator};
pub use retriever::{HealthStatus, Retriever, SearchRequest};
