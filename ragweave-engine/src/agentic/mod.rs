//! Agentic reasoning engine
//!
//! A bounded plan/act/observe loop: decompose (or warm-start from a
//! similar past episode), retrieve, evaluate the evidence, take at most
//! one corrective action per iteration, generate, evaluate the answer,
//! and iterate until the answer is good enough or the budget runs out.
//! Within one iteration the order is strict: retrieval, then retrieval
//! evaluation, then generation, then generation evaluation. Iterations
//! never pipeline.

mod evaluator;
mod observation;

pub use evaluator::{GenerationEvaluator, RetrievalEvaluator};
pub use observation::ObservationFilter;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ragweave_config::EngineConfig;
use ragweave_core::error::{RagError, Result};
use ragweave_core::math::clamp_confidence;
use ragweave_core::traits::{
    Embedder, GenerationRequest, Generator, Retriever, SearchRequest,
};
use ragweave_core::types::{
    Assessment, CorrectionAction, Episode, Query, QueryAnalysis, SearchResult,
    StrategyParameters,
};

use crate::episodes::EpisodeStore;
use crate::generation::{answer_prompt, decompose_prompt, refine_prompt};

/// The specialist retrievers available to the engine
#[derive(Clone)]
pub struct RetrieverSet {
    /// Always present: the vector retriever
    pub vector: Arc<dyn Retriever>,
    /// Web search fallback, when configured
    pub web: Option<Arc<dyn Retriever>>,
    /// Local data retriever, when configured
    pub local: Option<Arc<dyn Retriever>>,
}

impl std::fmt::Debug for RetrieverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrieverSet")
            .field("web", &self.web.is_some())
            .field("local", &self.local.is_some())
            .finish_non_exhaustive()
    }
}

impl RetrieverSet {
    /// A set with only the vector retriever
    pub fn vector_only(vector: Arc<dyn Retriever>) -> Self {
        Self {
            vector,
            web: None,
            local: None,
        }
    }
}

/// How an agentic run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineOutcome {
    /// An accepted answer was produced
    Final,
    /// The iteration budget ran out before an answer was produced
    BudgetExhausted,
}

/// Output of one agentic run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgenticResult {
    /// Synthesized answer (empty on budget exhaustion)
    pub answer: String,
    /// Evidence backing the answer, best first
    pub sources: Vec<SearchResult>,
    /// Assessments collected across iterations
    pub assessments: Vec<Assessment>,
    /// Iterations consumed (≤ the configured cap)
    pub iterations: usize,
    /// `0.4 * retrieval + 0.6 * generation`, plus the correction boost,
    /// clamped to `[0, 1]`
    pub confidence: f32,
    /// Corrective actions applied, in order
    pub corrections_applied: Vec<String>,
    /// Terminal state
    pub outcome: EngineOutcome,
}

/// The multi-iteration reasoning engine
pub struct AgenticEngine {
    retrievers: RetrieverSet,
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn Embedder>,
    episodes: Arc<dyn EpisodeStore>,
    retrieval_eval: RetrievalEvaluator,
    generation_eval: GenerationEvaluator,
    observation_filter: ObservationFilter,
    config: EngineConfig,
}

impl std::fmt::Debug for AgenticEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgenticEngine")
            .field("retrievers", &self.retrievers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AgenticEngine {
    /// Assemble an engine
    pub fn new(
        retrievers: RetrieverSet,
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn Embedder>,
        episodes: Arc<dyn EpisodeStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            retrieval_eval: RetrievalEvaluator::new(
                Arc::clone(&generator),
                config.relevance_threshold,
            ),
            generation_eval: GenerationEvaluator::new(
                Arc::clone(&generator),
                config.support_threshold,
            ),
            observation_filter: ObservationFilter::new(
                Arc::clone(&embedder),
                config.observation_novelty_threshold,
            ),
            retrievers,
            generator,
            embedder,
            episodes,
            config,
        }
    }

    /// Decompose a query into sub-questions; exposed for multi-hop callers
    pub async fn decompose(&self, query: &str, cancel: &CancellationToken) -> Vec<String> {
        let request = GenerationRequest::new(decompose_prompt(query))
            .for_assessment()
            .with_cancel(cancel.clone());
        match self.generator.generate(&request).await {
            Ok(text) => {
                let steps: Vec<String> = text
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .take(3)
                    .map(str::to_string)
                    .collect();
                if steps.is_empty() {
                    vec![query.to_string()]
                } else {
                    steps
                }
            }
            Err(e) => {
                warn!(error = %e, "decomposition failed, using query as the only step");
                vec![query.to_string()]
            }
        }
    }

    /// Run the reasoning loop
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when the token fires and `Generation` when the
    /// answer generator fails even after its retry. Retriever and
    /// evaluator failures are absorbed into the loop.
    pub async fn run(
        &self,
        query: &Query,
        analysis: &QueryAnalysis,
        params: &StrategyParameters,
        cancel: &CancellationToken,
    ) -> Result<AgenticResult> {
        let budget = params.max_iterations.min(self.config.max_iterations);
        if budget == 0 {
            debug!("iteration budget is zero, returning immediately");
            return Ok(AgenticResult {
                answer: String::new(),
                sources: Vec::new(),
                assessments: Vec::new(),
                iterations: 0,
                confidence: 0.0,
                corrections_applied: Vec::new(),
                outcome: EngineOutcome::BudgetExhausted,
            });
        }

        let query_embedding = match self.embedder.embed(&[query.text.clone()]).await {
            Ok(mut vectors) => vectors.pop().unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "query embedding failed, warm start disabled");
                Vec::new()
            }
        };

        let plan = self
            .plan(query, &query_embedding, cancel)
            .await;

        let mut context: Vec<SearchResult> = Vec::new();
        let mut assessments: Vec<Assessment> = Vec::new();
        let mut corrections: Vec<String> = Vec::new();
        let mut last_action: Option<CorrectionAction> = None;
        let mut current_query = query.text.clone();
        let mut answer = String::new();
        let mut retrieval_confidence = 0.0f32;
        let mut generation_confidence = 0.0f32;
        let mut iteration = 0usize;

        while iteration < budget {
            iteration += 1;
            if cancel.is_cancelled() {
                return Err(RagError::cancelled("agentic run cancelled"));
            }
            debug!(iteration, budget, "agentic iteration");

            // Retrieve. The first iteration of a multi-hop plan issues one
            // search per hop; later iterations search the current query.
            let round_queries: Vec<String> = if iteration == 1 && plan.len() > 1 {
                plan.iter().take(params.max_hops.max(1)).cloned().collect()
            } else {
                vec![current_query.clone()]
            };
            let round = self
                .retrieve_round(&round_queries, params, analysis, cancel)
                .await?;
            let mut fresh = self.observation_filter.filter(&context, round).await;

            // Evaluate retrieval. Later iterations may produce nothing new
            // (everything redundant against accepted context); evaluate
            // the accepted evidence then, not the empty round.
            let eval_docs: &[SearchResult] = if fresh.is_empty() && !context.is_empty() {
                &context
            } else {
                &fresh
            };
            let retrieval = self
                .retrieval_eval
                .assess(&current_query, eval_docs, cancel)
                .await;
            retrieval_confidence = retrieval.confidence;
            let action = retrieval.recommended_action;
            let needs_correction =
                retrieval.quality.needs_correction() && action != CorrectionAction::Use;
            assessments.push(Assessment::Retrieval(retrieval));

            if needs_correction && iteration < budget {
                let action = self.pick_action(action, last_action);
                last_action = Some(action);
                match action {
                    CorrectionAction::RefineQuery => {
                        current_query = self.refine_query(&current_query, cancel).await;
                        corrections.push(format!("refine_query:{current_query}"));
                        context.extend(fresh);
                        // Re-retrieve with the refined query next iteration
                        continue;
                    }
                    CorrectionAction::WebSearch => {
                        let web = self
                            .web_round(&current_query, cancel)
                            .await;
                        if !web.is_empty() {
                            corrections.push("web_search".to_string());
                            fresh.extend(web);
                        }
                    }
                    CorrectionAction::Combine => {
                        current_query = self.refine_query(&current_query, cancel).await;
                        let extra_queries = vec![current_query.clone()];
                        let mut half = params.clone();
                        half.top_k = (params.top_k / 2).max(1);
                        if let Ok(more) = self
                            .retrieve_round(&extra_queries, &half, analysis, cancel)
                            .await
                        {
                            fresh.extend(self.observation_filter.filter(&context, more).await);
                        }
                        let web = self.web_round(&current_query, cancel).await;
                        let local = self.local_round(&current_query, params, cancel).await;
                        corrections.push("combine_sources".to_string());
                        fresh.extend(web);
                        fresh.extend(local);
                    }
                    CorrectionAction::Use | CorrectionAction::Regenerate => {}
                }
            }

            // Accept evidence
            for item in fresh {
                if !context.iter().any(|c| c.id == item.id) {
                    context.push(item);
                }
            }
            context.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            // Generate. A failure here (after the generator's own retry)
            // is fatal to the agentic path.
            let request = GenerationRequest {
                prompt: answer_prompt(&query.text, &context),
                max_tokens: 500,
                temperature: params.temperature,
                cancel: cancel.clone(),
            };
            answer = self.generator.generate(&request).await?;

            // Evaluate generation
            let generation = self
                .generation_eval
                .assess(&query.text, &answer, &context, cancel)
                .await;
            generation_confidence = generation.confidence;
            let regenerate = generation.should_regenerate;
            assessments.push(Assessment::Generation(generation));

            if regenerate && iteration < budget {
                info!(iteration, "regenerating with expanded context");
                last_action = Some(CorrectionAction::Regenerate);
                corrections.push("regenerate".to_string());
                continue;
            }
            break;
        }

        let mut confidence =
            clamp_confidence(0.4 * retrieval_confidence + 0.6 * generation_confidence);
        if !corrections.is_empty() && !answer.is_empty() {
            confidence = clamp_confidence(confidence + self.config.correction_confidence_boost);
        }

        let outcome = if answer.is_empty() {
            EngineOutcome::BudgetExhausted
        } else {
            EngineOutcome::Final
        };

        if outcome == EngineOutcome::Final {
            let mut episode = Episode::new(
                query.text.clone(),
                query_embedding,
                plan,
                answer.clone(),
                confidence,
                iteration,
            );
            episode.language = query.constraints.language.clone();
            if let Err(e) = self.episodes.record(episode).await {
                warn!(error = %e, "failed to record episode");
            }
        }

        info!(
            iterations = iteration,
            confidence,
            corrections = corrections.len(),
            outcome = ?outcome,
            "agentic run complete"
        );

        context.truncate(20);
        Ok(AgenticResult {
            answer,
            sources: context,
            assessments,
            iterations: iteration,
            confidence,
            corrections_applied: corrections,
            outcome,
        })
    }

    /// Initial plan: a warm start from a similar episode, or a fresh
    /// decomposition
    async fn plan(
        &self,
        query: &Query,
        query_embedding: &[f32],
        cancel: &CancellationToken,
    ) -> Vec<String> {
        if !query_embedding.is_empty() {
            match self
                .episodes
                .find_similar(
                    query_embedding,
                    self.config.warm_start_similarity,
                    query.constraints.language.as_deref(),
                )
                .await
            {
                Ok(Some(episode)) if !episode.plan.is_empty() => {
                    info!(past_query = %episode.query, "warm-starting from similar episode");
                    return episode.plan;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "episode lookup failed"),
            }
        }
        self.decompose(&query.text, cancel).await
    }

    /// One retrieval round over the vector retriever
    ///
    /// Individual failures are absorbed; only cancellation propagates. An
    /// all-failed round yields an empty result, which the evaluator then
    /// classifies as poor.
    async fn retrieve_round(
        &self,
        queries: &[String],
        params: &StrategyParameters,
        analysis: &QueryAnalysis,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let mut round = Vec::new();
        for text in queries {
            let request = SearchRequest {
                query_text: text.clone(),
                top_k: params.top_k,
                complexity: analysis.complexity,
                filters: Default::default(),
                partitions: Vec::new(),
                cancel: cancel.clone(),
            };
            match self.retrievers.vector.search(&request).await {
                Ok(results) => round.extend(results),
                Err(e @ RagError::Cancelled { .. }) => return Err(e),
                Err(e) => warn!(error = %e, query = %text, "vector retrieval failed, continuing"),
            }
        }
        Ok(round)
    }

    /// Web fallback round; consults the probe before dispatching
    async fn web_round(&self, query: &str, cancel: &CancellationToken) -> Vec<SearchResult> {
        let Some(web) = &self.retrievers.web else {
            warn!("web fallback requested but no web retriever is configured");
            return Vec::new();
        };
        let probe = web.health().await;
        if !probe.healthy {
            warn!(detail = %probe.detail, "web retriever unhealthy, skipping fallback");
            return Vec::new();
        }
        let request = SearchRequest {
            query_text: query.to_string(),
            top_k: self.config.web_fallback_results,
            complexity: 0.5,
            filters: Default::default(),
            partitions: Vec::new(),
            cancel: cancel.clone(),
        };
        match web.search(&request).await {
            Ok(results) => {
                info!(results = results.len(), "web fallback added results");
                results
            }
            Err(e) => {
                warn!(error = %e, "web fallback failed");
                Vec::new()
            }
        }
    }

    /// Local-data round used when combining sources; probe-gated like the
    /// web fallback
    async fn local_round(
        &self,
        query: &str,
        params: &StrategyParameters,
        cancel: &CancellationToken,
    ) -> Vec<SearchResult> {
        let Some(local) = &self.retrievers.local else {
            return Vec::new();
        };
        let probe = local.health().await;
        if !probe.healthy {
            warn!(detail = %probe.detail, "local retriever unhealthy, skipping");
            return Vec::new();
        }
        let request = SearchRequest {
            query_text: query.to_string(),
            top_k: (params.top_k / 2).max(1),
            complexity: 0.5,
            filters: Default::default(),
            partitions: Vec::new(),
            cancel: cancel.clone(),
        };
        match local.search(&request).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "local data retrieval failed");
                Vec::new()
            }
        }
    }

    /// Refine a query through the generator; the original survives failure
    async fn refine_query(&self, query: &str, cancel: &CancellationToken) -> String {
        let request = GenerationRequest::new(refine_prompt(query))
            .for_assessment()
            .with_cancel(cancel.clone());
        match self.generator.generate(&request).await {
            Ok(refined) => {
                let refined = refined.trim();
                if refined.is_empty() {
                    query.to_string()
                } else {
                    info!(original = %query, refined = %refined, "query refined");
                    refined.to_string()
                }
            }
            Err(e) => {
                warn!(error = %e, "query refinement failed, keeping original");
                query.to_string()
            }
        }
    }

    /// Enforce the no-repeat rule: the same corrective action is never
    /// applied in two consecutive iterations
    fn pick_action(
        &self,
        recommended: CorrectionAction,
        last: Option<CorrectionAction>,
    ) -> CorrectionAction {
        let web_available = self.retrievers.web.is_some();
        // A web search without a web retriever degrades to refinement
        let mut action = match recommended {
            CorrectionAction::WebSearch if !web_available => CorrectionAction::RefineQuery,
            other => other,
        };
        if last == Some(action) {
            action = match action {
                CorrectionAction::RefineQuery if web_available => CorrectionAction::WebSearch,
                CorrectionAction::RefineQuery => CorrectionAction::Combine,
                CorrectionAction::WebSearch => CorrectionAction::Combine,
                CorrectionAction::Combine | CorrectionAction::Regenerate => {
                    CorrectionAction::RefineQuery
                }
                CorrectionAction::Use => CorrectionAction::Use,
            };
            debug!(
                recommended = recommended.as_str(),
                chosen = action.as_str(),
                "corrective action repeated, choosing alternative"
            );
        }
        action
    }
}
