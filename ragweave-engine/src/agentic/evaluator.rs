//! Retrieval and generation evaluators
//!
//! Both evaluators prompt the generation service at low temperature and
//! parse a line-oriented verdict. Evaluator failures never fail the run:
//! a neutral default keeps the engine moving.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ragweave_core::traits::{GenerationRequest, Generator};
use ragweave_core::types::{
    CorrectionAction, GenerationAssessment, RetrievalAssessment, RetrievalQuality, SearchResult,
    SupportLevel, UsefulnessLevel,
};

/// Extract the value of a `KEY: value` line
fn parse_field<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        line.trim()
            .strip_prefix(key)
            .and_then(|rest| rest.strip_prefix(':'))
            .map(str::trim)
    })
}

fn parse_confidence(text: &str) -> f32 {
    parse_field(text, "CONFIDENCE")
        .and_then(|raw| raw.parse::<f32>().ok())
        .map_or(0.7, |c| c.clamp(0.0, 1.0))
}

fn excerpt(results: &[SearchResult], limit: usize, chars: usize) -> String {
    results
        .iter()
        .take(limit)
        .enumerate()
        .map(|(i, r)| {
            let snippet: String = r.text.chars().take(chars).collect();
            format!("Document {}:\n{snippet}", i + 1)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Assesses whether retrieved evidence suffices for the query
pub struct RetrievalEvaluator {
    generator: Arc<dyn Generator>,
    /// Confidence below this forces a corrective recommendation
    relevance_threshold: f32,
}

impl std::fmt::Debug for RetrievalEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEvaluator")
            .field("relevance_threshold", &self.relevance_threshold)
            .finish_non_exhaustive()
    }
}

impl RetrievalEvaluator {
    /// Create an evaluator
    pub fn new(generator: Arc<dyn Generator>, relevance_threshold: f32) -> Self {
        Self {
            generator,
            relevance_threshold,
        }
    }

    /// Assess one retrieval round
    pub async fn assess(
        &self,
        query: &str,
        results: &[SearchResult],
        cancel: &CancellationToken,
    ) -> RetrievalAssessment {
        if results.is_empty() {
            return RetrievalAssessment {
                quality: RetrievalQuality::Poor,
                confidence: 1.0,
                recommended_action: CorrectionAction::WebSearch,
                reasoning: "No documents retrieved".to_string(),
            };
        }

        let prompt = format!(
            "Evaluate the quality of retrieved documents for answering the query.\n\n\
             Query: {query}\n\n\
             Retrieved Documents:\n{}\n\n\
             Assess the retrieval quality:\n\
             - excellent: Documents fully answer the query with high confidence\n\
             - good: Documents contain sufficient information to answer\n\
             - ambiguous: Documents have some relevant info but may need more\n\
             - poor: Documents don't contain useful information\n\n\
             Based on quality, recommend action:\n\
             - use_retrieved: Use these documents (excellent/good quality)\n\
             - refine_query: Reformulate query for better results (ambiguous)\n\
             - web_search: Search web for additional info (poor/ambiguous)\n\
             - combine_sources: Use both local and web sources (ambiguous)\n\n\
             Provide evaluation:\n\
             QUALITY: [score]\n\
             CONFIDENCE: [0.0-1.0]\n\
             ACTION: [recommended action]\n\
             REASONING: [brief explanation]",
            excerpt(results, 5, 400)
        );

        let request = GenerationRequest::new(prompt)
            .for_assessment()
            .with_cancel(cancel.clone());
        let response = match self.generator.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "retrieval assessment failed, assuming usable evidence");
                return RetrievalAssessment {
                    quality: RetrievalQuality::Good,
                    confidence: 0.5,
                    recommended_action: CorrectionAction::Use,
                    reasoning: format!("Assessment failed: {e}"),
                };
            }
        };

        let quality = match parse_field(&response, "QUALITY").map(str::to_lowercase).as_deref() {
            Some("excellent") => RetrievalQuality::Excellent,
            Some("ambiguous") => RetrievalQuality::Ambiguous,
            Some("poor") => RetrievalQuality::Poor,
            _ => RetrievalQuality::Good,
        };
        let mut recommended_action =
            match parse_field(&response, "ACTION").map(str::to_lowercase).as_deref() {
                Some("refine_query") => CorrectionAction::RefineQuery,
                Some("web_search") => CorrectionAction::WebSearch,
                Some("combine_sources") => CorrectionAction::Combine,
                _ => CorrectionAction::Use,
            };
        let confidence = parse_confidence(&response);
        let reasoning = parse_field(&response, "REASONING")
            .unwrap_or("Evaluation completed")
            .to_string();

        // Low evaluator confidence forces a correction even when the
        // verdict text said the evidence was usable
        if confidence < self.relevance_threshold && recommended_action == CorrectionAction::Use {
            recommended_action = CorrectionAction::RefineQuery;
        }

        debug!(
            quality = ?quality,
            action = recommended_action.as_str(),
            confidence,
            "retrieval assessed"
        );
        RetrievalAssessment {
            quality,
            confidence,
            recommended_action,
            reasoning,
        }
    }
}

/// Assesses whether a generated answer is supported and useful
pub struct GenerationEvaluator {
    generator: Arc<dyn Generator>,
    /// Confidence below this recommends regeneration
    support_threshold: f32,
}

impl std::fmt::Debug for GenerationEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationEvaluator")
            .field("support_threshold", &self.support_threshold)
            .finish_non_exhaustive()
    }
}

impl GenerationEvaluator {
    /// Create an evaluator
    pub fn new(generator: Arc<dyn Generator>, support_threshold: f32) -> Self {
        Self {
            generator,
            support_threshold,
        }
    }

    /// Assess one generated answer against its sources
    pub async fn assess(
        &self,
        query: &str,
        answer: &str,
        results: &[SearchResult],
        cancel: &CancellationToken,
    ) -> GenerationAssessment {
        let prompt = format!(
            "Assess the quality of the generated response.\n\n\
             Query: {query}\n\n\
             Response: {answer}\n\n\
             Source Documents:\n{}\n\n\
             Evaluate:\n\
             1. SUPPORT: Is the response supported by the documents?\n\
                - fully_supported: All claims are backed by documents\n\
                - partially_supported: Some claims are backed\n\
                - not_supported: Claims are not in documents\n\n\
             2. USEFULNESS: Does the response answer the query?\n\
                - very_useful: Directly and completely answers\n\
                - useful: Answers the query adequately\n\
                - somewhat_useful: Partially answers\n\
                - not_useful: Doesn't answer the query\n\n\
             Provide assessment:\n\
             SUPPORT: [score]\n\
             USEFULNESS: [score]\n\
             CONFIDENCE: [0.0-1.0]\n\
             REASONING: [brief explanation]\n\
             REGENERATE: [yes/no]",
            excerpt(results, 3, 300)
        );

        let request = GenerationRequest::new(prompt)
            .for_assessment()
            .with_cancel(cancel.clone());
        let response = match self.generator.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "generation assessment failed, accepting answer");
                return GenerationAssessment {
                    support: SupportLevel::PartiallySupported,
                    usefulness: UsefulnessLevel::Useful,
                    confidence: 0.5,
                    reasoning: format!("Assessment failed: {e}"),
                    should_regenerate: false,
                };
            }
        };

        let support = match parse_field(&response, "SUPPORT").map(str::to_lowercase).as_deref() {
            Some("fully_supported") => SupportLevel::FullySupported,
            Some("not_supported") => SupportLevel::NotSupported,
            _ => SupportLevel::PartiallySupported,
        };
        let usefulness = match parse_field(&response, "USEFULNESS")
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("very_useful") => UsefulnessLevel::VeryUseful,
            Some("somewhat_useful") => UsefulnessLevel::SomewhatUseful,
            Some("not_useful") => UsefulnessLevel::NotUseful,
            _ => UsefulnessLevel::Useful,
        };
        let confidence = parse_confidence(&response);
        let regenerate_flag = parse_field(&response, "REGENERATE")
            .is_some_and(|raw| raw.to_lowercase().contains("yes"));

        let should_regenerate = regenerate_flag
            || confidence < self.support_threshold
            || support == SupportLevel::NotSupported
            || usefulness == UsefulnessLevel::NotUseful;

        debug!(
            support = ?support,
            usefulness = ?usefulness,
            confidence,
            should_regenerate,
            "generation assessed"
        );
        GenerationAssessment {
            support,
            usefulness,
            confidence,
            reasoning: parse_field(&response, "REASONING")
                .unwrap_or("Assessment completed")
                .to_string(),
            should_regenerate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{search_result, ClosureGenerator};
    use ragweave_core::error::RagError;

    fn results() -> Vec<SearchResult> {
        vec![search_result("c1", "d1", "Some evidence text", 0.9)]
    }

    #[tokio::test]
    async fn test_empty_retrieval_short_circuits_to_web_search() {
        let evaluator = RetrievalEvaluator::new(
            Arc::new(ClosureGenerator::new(|_| {
                panic!("generator must not be called for empty retrievals")
            })),
            0.6,
        );
        let assessment = evaluator
            .assess("query", &[], &CancellationToken::new())
            .await;
        assert_eq!(assessment.quality, RetrievalQuality::Poor);
        assert_eq!(assessment.recommended_action, CorrectionAction::WebSearch);
        assert!((assessment.confidence - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_retrieval_verdict_parsing() {
        let evaluator = RetrievalEvaluator::new(
            Arc::new(ClosureGenerator::new(|_| {
                Ok("QUALITY: ambiguous\nCONFIDENCE: 0.55\nACTION: combine_sources\nREASONING: partial coverage".to_string())
            })),
            0.6,
        );
        let assessment = evaluator
            .assess("query", &results(), &CancellationToken::new())
            .await;
        assert_eq!(assessment.quality, RetrievalQuality::Ambiguous);
        assert_eq!(assessment.recommended_action, CorrectionAction::Combine);
        assert!((assessment.confidence - 0.55).abs() < 1e-6);
        assert_eq!(assessment.reasoning, "partial coverage");
    }

    #[tokio::test]
    async fn test_low_confidence_use_becomes_refine() {
        let evaluator = RetrievalEvaluator::new(
            Arc::new(ClosureGenerator::new(|_| {
                Ok("QUALITY: good\nCONFIDENCE: 0.3\nACTION: use_retrieved\nREASONING: weak".to_string())
            })),
            0.6,
        );
        let assessment = evaluator
            .assess("query", &results(), &CancellationToken::new())
            .await;
        assert_eq!(assessment.recommended_action, CorrectionAction::RefineQuery);
    }

    #[tokio::test]
    async fn test_evaluator_failure_defaults_to_usable() {
        let evaluator = RetrievalEvaluator::new(
            Arc::new(ClosureGenerator::new(|_| {
                Err(RagError::generation("provider down"))
            })),
            0.6,
        );
        let assessment = evaluator
            .assess("query", &results(), &CancellationToken::new())
            .await;
        assert_eq!(assessment.quality, RetrievalQuality::Good);
        assert_eq!(assessment.recommended_action, CorrectionAction::Use);
        assert!((assessment.confidence - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_generation_verdict_parsing() {
        let evaluator = GenerationEvaluator::new(
            Arc::new(ClosureGenerator::new(|_| {
                Ok("SUPPORT: fully_supported\nUSEFULNESS: very_useful\nCONFIDENCE: 0.9\nREASONING: grounded\nREGENERATE: no".to_string())
            })),
            0.7,
        );
        let assessment = evaluator
            .assess("query", "answer", &results(), &CancellationToken::new())
            .await;
        assert_eq!(assessment.support, SupportLevel::FullySupported);
        assert_eq!(assessment.usefulness, UsefulnessLevel::VeryUseful);
        assert!(!assessment.should_regenerate);
    }

    #[tokio::test]
    async fn test_unsupported_answer_triggers_regeneration() {
        let evaluator = GenerationEvaluator::new(
            Arc::new(ClosureGenerator::new(|_| {
                Ok("SUPPORT: not_supported\nUSEFULNESS: useful\nCONFIDENCE: 0.8\nREASONING: hallucinated\nREGENERATE: no".to_string())
            })),
            0.7,
        );
        let assessment = evaluator
            .assess("query", "answer", &results(), &CancellationToken::new())
            .await;
        assert!(assessment.should_regenerate);
    }
}
