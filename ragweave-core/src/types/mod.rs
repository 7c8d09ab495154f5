//! Shared data model for the ragweave workspace

mod analysis;
mod assessment;
mod episode;
mod metric;
mod query;
mod response;
mod search;
mod strategy;

pub use analysis::{QueryAnalysis, QueryType};
pub use metric::DistanceMetric;
pub use assessment::{
    Assessment, CorrectionAction, GenerationAssessment, RetrievalAssessment, RetrievalQuality,
    SupportLevel, UsefulnessLevel,
};
pub use episode::Episode;
pub use query::{Query, QueryConstraints, QueryMode};
pub use response::{QueryResponse, ResponseStatus, RouteUpdate, RoutedError, RoutedResult};
pub use search::{ChunkRecord, SearchResult};
pub use strategy::{StrategyKind, StrategyParameters, StrategySelection};
