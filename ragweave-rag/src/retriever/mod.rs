//! Specialist retrievers sharing the uniform search operation

mod local;
mod vector;
mod web;

pub use local::LocalDataRetriever;
pub use vector::{VectorRetriever, VectorRetrieverConfig};
pub use web::WebRetriever;
