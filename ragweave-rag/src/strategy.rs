//! Adaptive strategy selection
//!
//! Maps a query analysis plus caller constraints to a strategy and
//! parameter set via ordered rules, then adjusts for rolling historical
//! performance and caller context. Selection itself is a pure function;
//! the performance window is written after every execution.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use ragweave_core::types::{
    QueryAnalysis, QueryConstraints, QueryType, StrategyKind, StrategyParameters,
    StrategySelection,
};

/// Window length retained per strategy
const WINDOW_CAPACITY: usize = 100;
/// Executions consulted for the performance override
const OVERRIDE_LOOKBACK: usize = 20;
/// Rolling average below this substitutes Hybrid
const OVERRIDE_FLOOR: f32 = 0.60;
/// Complexity band edges
const SIMPLE_COMPLEXITY: f32 = 0.35;
const COMPLEX_COMPLEXITY: f32 = 0.70;

/// Per-strategy stats surfaced to callers and the monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyStats {
    /// Strategy identity
    pub strategy: StrategyKind,
    /// Executions recorded in the current window
    pub executions: usize,
    /// Rolling average confidence over the lookback, when any
    pub rolling_confidence: Option<f32>,
}

/// Bounded per-strategy confidence windows
#[derive(Debug, Default)]
pub struct StrategyTracker {
    windows: Mutex<HashMap<StrategyKind, VecDeque<f32>>>,
}

impl StrategyTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a confidence observation and trim the window
    pub fn record(&self, strategy: StrategyKind, confidence: f32) {
        let mut windows = self.windows.lock();
        let window = windows.entry(strategy).or_default();
        window.push_back(confidence.clamp(0.0, 1.0));
        while window.len() > WINDOW_CAPACITY {
            window.pop_front();
        }
    }

    /// Rolling average over the most recent `lookback` observations
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rolling_average(&self, strategy: StrategyKind, lookback: usize) -> Option<f32> {
        let windows = self.windows.lock();
        let window = windows.get(&strategy)?;
        if window.is_empty() {
            return None;
        }
        let recent: Vec<f32> = window.iter().rev().take(lookback).copied().collect();
        Some(recent.iter().sum::<f32>() / recent.len() as f32)
    }

    /// Current window length for a strategy
    #[must_use]
    pub fn window_len(&self, strategy: StrategyKind) -> usize {
        self.windows
            .lock()
            .get(&strategy)
            .map_or(0, VecDeque::len)
    }

    /// Stats for every strategy
    #[must_use]
    pub fn stats(&self) -> Vec<StrategyStats> {
        StrategyKind::all()
            .into_iter()
            .map(|strategy| StrategyStats {
                strategy,
                executions: self.window_len(strategy),
                rolling_confidence: self.rolling_average(strategy, OVERRIDE_LOOKBACK),
            })
            .collect()
    }
}

/// Rule-ordered strategy selector with performance feedback
#[derive(Debug, Default)]
pub struct StrategySelector {
    tracker: StrategyTracker,
}

impl StrategySelector {
    /// Create a selector with an empty performance history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an execution outcome for future selections
    pub fn record_performance(&self, strategy: StrategyKind, confidence: f32) {
        self.tracker.record(strategy, confidence);
    }

    /// Performance stats surface
    #[must_use]
    pub fn stats(&self) -> Vec<StrategyStats> {
        self.tracker.stats()
    }

    /// Select a strategy for an analyzed query
    #[must_use]
    pub fn select(
        &self,
        analysis: &QueryAnalysis,
        constraints: &QueryConstraints,
    ) -> StrategySelection {
        let (mut strategy, mut reasoning, mut parameters) = Self::base_rules(analysis);

        // Performance override: a strategy trending poorly yields to hybrid
        if let Some(average) = self.tracker.rolling_average(strategy, OVERRIDE_LOOKBACK) {
            if average < OVERRIDE_FLOOR && strategy != StrategyKind::Hybrid {
                warn!(
                    strategy = strategy.as_str(),
                    average, "strategy trending below floor, substituting hybrid"
                );
                strategy = StrategyKind::Hybrid;
                reasoning.push_str(" (adjusted based on performance history)");
            }
        }

        // Context overrides
        if constraints.fast_mode {
            parameters.top_k = parameters.top_k.min(7);
            if matches!(
                strategy,
                StrategyKind::SelfReflective | StrategyKind::Corrective
            ) {
                strategy = StrategyKind::Hybrid;
                reasoning.push_str(" (optimized for speed)");
            }
        }
        if constraints.high_accuracy {
            if strategy == StrategyKind::Direct {
                strategy = StrategyKind::SelfReflective;
                reasoning.push_str(" (optimized for accuracy)");
            }
            parameters.max_iterations = parameters.max_iterations.max(3);
        }
        if let Some(top_k) = constraints.top_k {
            parameters.top_k = top_k;
        }

        debug!(
            strategy = strategy.as_str(),
            top_k = parameters.top_k,
            reasoning, "strategy selected"
        );

        StrategySelection {
            strategy,
            confidence: 0.8,
            reasoning,
            parameters,
        }
    }

    /// The ordered rule table; first match wins
    fn base_rules(analysis: &QueryAnalysis) -> (StrategyKind, String, StrategyParameters) {
        let mut params = StrategyParameters::default();

        if analysis.complexity < SIMPLE_COMPLEXITY && analysis.query_type == QueryType::Factual {
            params.top_k = 5;
            return (
                StrategyKind::Direct,
                "Simple factual query - direct retrieval sufficient".to_string(),
                params,
            );
        }
        if analysis.complexity < SIMPLE_COMPLEXITY {
            params.top_k = 7;
            return (
                StrategyKind::Hybrid,
                "Simple query - hybrid search for better coverage".to_string(),
                params,
            );
        }
        if analysis.complexity < COMPLEX_COMPLEXITY && analysis.requires_reasoning {
            params.top_k = 10;
            params.max_iterations = 2;
            return (
                StrategyKind::SelfReflective,
                "Moderate complexity with reasoning - self-reflection needed".to_string(),
                params,
            );
        }
        if analysis.complexity < COMPLEX_COMPLEXITY {
            params.top_k = 10;
            return (
                StrategyKind::Hybrid,
                "Moderate complexity - hybrid search recommended".to_string(),
                params,
            );
        }
        if analysis.query_type == QueryType::MultiStep {
            params.top_k = 12;
            params.max_hops = 3;
            return (
                StrategyKind::MultiHop,
                "Multi-step query - multi-hop reasoning required".to_string(),
                params,
            );
        }
        if analysis.requires_multiple_sources {
            params.top_k = 15;
            params.enable_web = true;
            return (
                StrategyKind::Corrective,
                "Complex query needing multiple sources - corrective retrieval".to_string(),
                params,
            );
        }
        params.top_k = 12;
        params.max_iterations = 3;
        (
            StrategyKind::SelfReflective,
            "Complex query - self-reflective approach".to_string(),
            params,
        )
    }

    /// Log and record a completed execution in one step
    pub fn complete_execution(&self, strategy: StrategyKind, confidence: f32) {
        info!(
            strategy = strategy.as_str(),
            confidence, "strategy execution recorded"
        );
        self.record_performance(strategy, confidence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragweave_core::types::QueryMode;

    fn analysis(complexity: f32, query_type: QueryType) -> QueryAnalysis {
        QueryAnalysis {
            complexity,
            query_type,
            requires_reasoning: false,
            requires_multiple_sources: false,
            estimated_tokens: 500,
            keywords: vec![],
            entities: vec![],
            recommended_mode: QueryMode::Balanced,
        }
    }

    #[test]
    fn test_simple_factual_selects_direct() {
        let selector = StrategySelector::new();
        let selection = selector.select(
            &analysis(0.2, QueryType::Factual),
            &QueryConstraints::default(),
        );
        assert_eq!(selection.strategy, StrategyKind::Direct);
        assert_eq!(selection.parameters.top_k, 5);
    }

    #[test]
    fn test_simple_non_factual_selects_hybrid() {
        let selector = StrategySelector::new();
        let selection = selector.select(
            &analysis(0.2, QueryType::Conversational),
            &QueryConstraints::default(),
        );
        assert_eq!(selection.strategy, StrategyKind::Hybrid);
        assert_eq!(selection.parameters.top_k, 7);
    }

    #[test]
    fn test_moderate_with_reasoning_selects_self_reflective() {
        let selector = StrategySelector::new();
        let mut a = analysis(0.5, QueryType::Analytical);
        a.requires_reasoning = true;
        let selection = selector.select(&a, &QueryConstraints::default());
        assert_eq!(selection.strategy, StrategyKind::SelfReflective);
        assert_eq!(selection.parameters.top_k, 10);
        assert_eq!(selection.parameters.max_iterations, 2);
    }

    #[test]
    fn test_complex_multi_step_selects_multi_hop() {
        let selector = StrategySelector::new();
        let selection = selector.select(
            &analysis(0.8, QueryType::MultiStep),
            &QueryConstraints::default(),
        );
        assert_eq!(selection.strategy, StrategyKind::MultiHop);
        assert_eq!(selection.parameters.max_hops, 3);
    }

    #[test]
    fn test_complex_multi_source_selects_corrective() {
        let selector = StrategySelector::new();
        let mut a = analysis(0.8, QueryType::Analytical);
        a.requires_multiple_sources = true;
        let selection = selector.select(&a, &QueryConstraints::default());
        assert_eq!(selection.strategy, StrategyKind::Corrective);
        assert_eq!(selection.parameters.top_k, 15);
        assert!(selection.parameters.enable_web);
    }

    #[test]
    fn test_complex_default_selects_self_reflective() {
        let selector = StrategySelector::new();
        let selection = selector.select(
            &analysis(0.8, QueryType::Analytical),
            &QueryConstraints::default(),
        );
        assert_eq!(selection.strategy, StrategyKind::SelfReflective);
        assert_eq!(selection.parameters.max_iterations, 3);
    }

    #[test]
    fn test_performance_override_substitutes_hybrid() {
        let selector = StrategySelector::new();
        for _ in 0..OVERRIDE_LOOKBACK {
            selector.record_performance(StrategyKind::Direct, 0.4);
        }
        let selection = selector.select(
            &analysis(0.2, QueryType::Factual),
            &QueryConstraints::default(),
        );
        assert_eq!(selection.strategy, StrategyKind::Hybrid);
        assert!(selection.reasoning.contains("performance history"));
    }

    #[test]
    fn test_fast_mode_downgrades_and_caps_top_k() {
        let selector = StrategySelector::new();
        let mut a = analysis(0.8, QueryType::Analytical);
        a.requires_multiple_sources = true;
        let constraints = QueryConstraints {
            fast_mode: true,
            ..Default::default()
        };
        let selection = selector.select(&a, &constraints);
        assert_eq!(selection.strategy, StrategyKind::Hybrid);
        assert!(selection.parameters.top_k <= 7);
    }

    #[test]
    fn test_high_accuracy_upgrades_direct() {
        let selector = StrategySelector::new();
        let constraints = QueryConstraints {
            high_accuracy: true,
            ..Default::default()
        };
        let selection = selector.select(&analysis(0.2, QueryType::Factual), &constraints);
        assert_eq!(selection.strategy, StrategyKind::SelfReflective);
        assert!(selection.parameters.max_iterations >= 3);
    }

    #[test]
    fn test_window_is_bounded() {
        let tracker = StrategyTracker::new();
        for i in 0..250 {
            #[allow(clippy::cast_precision_loss)]
            tracker.record(StrategyKind::Hybrid, (i % 10) as f32 / 10.0);
        }
        assert_eq!(tracker.window_len(StrategyKind::Hybrid), WINDOW_CAPACITY);
    }

    #[test]
    fn test_rolling_average_uses_recent_entries() {
        let tracker = StrategyTracker::new();
        for _ in 0..OVERRIDE_LOOKBACK {
            tracker.record(StrategyKind::Direct, 0.2);
        }
        for _ in 0..OVERRIDE_LOOKBACK {
            tracker.record(StrategyKind::Direct, 0.9);
        }
        let average = tracker
            .rolling_average(StrategyKind::Direct, OVERRIDE_LOOKBACK)
            .unwrap();
        assert!((average - 0.9).abs() < 1e-5);
    }

    #[test]
    fn test_explicit_top_k_override_wins() {
        let selector = StrategySelector::new();
        let constraints = QueryConstraints {
            top_k: Some(3),
            ..Default::default()
        };
        let selection = selector.select(&analysis(0.5, QueryType::Analytical), &constraints);
        assert_eq!(selection.parameters.top_k, 3);
    }
}
