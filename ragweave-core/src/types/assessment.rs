//! Self-assessment types produced by the reflective strategies

use serde::{Deserialize, Serialize};

/// Quality class assigned to a retrieval round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalQuality {
    Excellent,
    Good,
    Ambiguous,
    Poor,
}

impl RetrievalQuality {
    /// Whether this class calls for a corrective action
    #[must_use]
    pub const fn needs_correction(self) -> bool {
        matches!(self, Self::Ambiguous | Self::Poor)
    }
}

/// Corrective action recommended by an evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionAction {
    /// Evidence is sufficient, proceed to generation
    Use,
    /// Reformulate the query and retrieve again
    RefineQuery,
    /// Add a web search for missing coverage
    WebSearch,
    /// Combine refined local retrieval with web results
    Combine,
    /// Regenerate the answer with expanded context
    Regenerate,
}

impl CorrectionAction {
    /// Stable string form recorded in `corrections_applied`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Use => "use",
            Self::RefineQuery => "refine_query",
            Self::WebSearch => "web_search",
            Self::Combine => "combine",
            Self::Regenerate => "regenerate",
        }
    }
}

/// Assessment of a retrieval round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalAssessment {
    /// Quality class
    pub quality: RetrievalQuality,
    /// Evaluator confidence in `[0, 1]`
    pub confidence: f32,
    /// Recommended next action
    pub recommended_action: CorrectionAction,
    /// Short free-form explanation
    pub reasoning: String,
}

/// How well a generated answer is backed by its sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLevel {
    FullySupported,
    PartiallySupported,
    NotSupported,
}

/// How well a generated answer addresses the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsefulnessLevel {
    VeryUseful,
    Useful,
    SomewhatUseful,
    NotUseful,
}

/// Assessment of a generation round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationAssessment {
    /// Source-support class
    pub support: SupportLevel,
    /// Usefulness class
    pub usefulness: UsefulnessLevel,
    /// Evaluator confidence in `[0, 1]`
    pub confidence: f32,
    /// Short free-form explanation
    pub reasoning: String,
    /// Whether the engine should regenerate with expanded context
    pub should_regenerate: bool,
}

/// Either kind of assessment, as collected per iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assessment {
    Retrieval(RetrievalAssessment),
    Generation(GenerationAssessment),
}
