//! Query analysis: complexity, type, and mode recommendation
//!
//! Fast regex-based analysis on the request hot path. The analysis is a
//! pure function of the query text, so callers may cache it freely.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use ragweave_core::types::{QueryAnalysis, QueryMode, QueryType};

/// Patterns signalling a factual lookup
static FACTUAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(what is|who is|when|where|which|define|explain)\b").unwrap(),
        Regex::new(r"(?i)\b(how many|how much|how long)\b").unwrap(),
    ]
});

/// Patterns signalling analysis or comparison
static ANALYTICAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(why|how|analyze|compare|evaluate|assess)\b").unwrap(),
        Regex::new(r"(?i)\b(difference|similarity|relationship|impact|effect)\b").unwrap(),
        Regex::new(r"(?i)\b(pros and cons|advantages|disadvantages)\b").unwrap(),
    ]
});

/// Patterns signalling an explicitly sequenced request
static MULTI_STEP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(first|then|next|finally|step by step)\b").unwrap(),
        Regex::new(r"(?i)\b(and then|after that|following)\b").unwrap(),
        Regex::new(r"(?i)\b(multiple|several|various)\b").unwrap(),
    ]
});

/// Complexity indicator tiers: (weight, patterns)
static COMPLEXITY_INDICATORS: LazyLock<Vec<(f32, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            0.15,
            vec![
                Regex::new(r"(?i)\b(comprehensive|detailed|in-depth|thorough)\b").unwrap(),
                Regex::new(r"(?i)\b(all|every|complete|entire)\b").unwrap(),
                Regex::new(r"(?i)\b(analyze|synthesize|evaluate|critique)\b").unwrap(),
            ],
        ),
        (
            0.08,
            vec![
                Regex::new(r"(?i)\b(explain|describe|discuss|compare)\b").unwrap(),
                Regex::new(r"(?i)\b(some|few|several)\b").unwrap(),
            ],
        ),
        (
            -0.05,
            vec![
                Regex::new(r"(?i)\b(what|who|when|where|list)\b").unwrap(),
                Regex::new(r"(?i)\b(simple|quick|brief)\b").unwrap(),
            ],
        ),
    ]
});

static CONJUNCTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(and|or|but|also|additionally)\b").unwrap());

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").unwrap());

/// Capitalized phrases treated as entities
static ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").unwrap());

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
        "from", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    ]
    .into_iter()
    .collect()
});

const REASONING_KEYWORDS: &[&str] = &[
    "why", "how", "explain", "reason", "cause", "analyze", "evaluate", "compare", "contrast",
];

const MULTI_SOURCE_KEYWORDS: &[&str] = &[
    "compare",
    "contrast",
    "different",
    "various",
    "multiple",
    "all",
    "comprehensive",
    "complete",
];

/// Token overhead assumed for system prompts and retrieved context
const PROMPT_OVERHEAD_TOKENS: usize = 500;

/// Regex-based query analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryAnalyzer;

impl QueryAnalyzer {
    /// Create an analyzer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Analyze one query
    #[must_use]
    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let lower = query.to_lowercase();

        let complexity = Self::complexity(&lower);
        let query_type = Self::query_type(&lower);
        let requires_reasoning = REASONING_KEYWORDS.iter().any(|kw| lower.contains(kw));
        let requires_multiple_sources = MULTI_SOURCE_KEYWORDS.iter().any(|kw| lower.contains(kw));
        let estimated_tokens = Self::estimate_tokens(query);
        let keywords = Self::keywords(&lower);
        let entities = Self::entities(query);
        let recommended_mode = Self::recommend_mode(
            complexity,
            query_type,
            requires_reasoning,
            requires_multiple_sources,
        );

        QueryAnalysis {
            complexity,
            query_type,
            requires_reasoning,
            requires_multiple_sources,
            estimated_tokens,
            keywords,
            entities,
            recommended_mode,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn complexity(query: &str) -> f32 {
        let mut score: f32 = 0.3;

        let word_count = query.split_whitespace().count();
        if word_count > 20 {
            score += 0.2;
        } else if word_count > 10 {
            score += 0.1;
        }

        for (weight, patterns) in COMPLEXITY_INDICATORS.iter() {
            for pattern in patterns {
                if pattern.is_match(query) {
                    score += weight;
                }
            }
        }

        // Multiple questions compound complexity
        let question_count = query.matches('?').count();
        if question_count > 1 {
            score += 0.1 * (question_count - 1) as f32;
        }

        let conjunctions = CONJUNCTIONS.find_iter(query).count();
        score += 0.05 * conjunctions as f32;

        score.clamp(0.0, 1.0)
    }

    fn query_type(query: &str) -> QueryType {
        if MULTI_STEP_PATTERNS.iter().any(|p| p.is_match(query)) {
            return QueryType::MultiStep;
        }
        if ANALYTICAL_PATTERNS.iter().any(|p| p.is_match(query)) {
            return QueryType::Analytical;
        }
        if FACTUAL_PATTERNS.iter().any(|p| p.is_match(query)) {
            return QueryType::Factual;
        }
        QueryType::Conversational
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn estimate_tokens(query: &str) -> usize {
        let word_count = query.split_whitespace().count();
        (word_count as f32 / 0.75) as usize + PROMPT_OVERHEAD_TOKENS
    }

    fn keywords(query: &str) -> Vec<String> {
        WORD.find_iter(query)
            .map(|m| m.as_str())
            .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
            .take(10)
            .map(str::to_string)
            .collect()
    }

    fn entities(query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        ENTITY
            .find_iter(query)
            .map(|m| m.as_str().to_string())
            .filter(|e| seen.insert(e.clone()))
            .take(5)
            .collect()
    }

    fn recommend_mode(
        complexity: f32,
        query_type: QueryType,
        requires_reasoning: bool,
        requires_multiple_sources: bool,
    ) -> QueryMode {
        if complexity > 0.7 || query_type == QueryType::MultiStep {
            return QueryMode::Deep;
        }
        if requires_reasoning && requires_multiple_sources {
            return QueryMode::Deep;
        }
        if complexity < 0.35 || (query_type == QueryType::Factual && !requires_reasoning) {
            return QueryMode::Fast;
        }
        QueryMode::Balanced
    }
}
