//! Hybrid query router
//!
//! Coordinates the speculative and agentic paths under separate
//! cancellation scopes and timeouts. Timeouts are transitions to
//! fallback, not errors: the router itself errors only when both paths
//! fail or the caller cancels. In balanced mode consumers receive an
//! interim speculative result followed by the final (or fallback) one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tracing::{debug, info, warn};

use ragweave_config::RouterConfig;
use ragweave_core::error::{ErrorKind, RagError, Result};
use ragweave_core::types::{
    Query, QueryAnalysis, QueryMode, QueryResponse, ResponseStatus, RouteUpdate, RoutedResult,
    StrategySelection,
};
use ragweave_rag::{QueryAnalyzer, StrategySelector};

use crate::agentic::{AgenticEngine, AgenticResult, EngineOutcome};
use crate::monitor::{PathKind, PerformanceMonitor, RequestEvent};
use crate::speculative::SpeculativeProcessor;

/// One path's terminal result with its latency
struct PathSuccess {
    response: QueryResponse,
    elapsed_ms: u64,
}

type PathResult = Result<PathSuccess>;

/// Coordinates the two execution paths
pub struct HybridQueryRouter {
    analyzer: QueryAnalyzer,
    selector: Arc<StrategySelector>,
    speculative: Arc<SpeculativeProcessor>,
    engine: Arc<AgenticEngine>,
    monitor: Arc<PerformanceMonitor>,
    config: RouterConfig,
}

impl std::fmt::Debug for HybridQueryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridQueryRouter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HybridQueryRouter {
    /// Assemble a router
    pub fn new(
        selector: Arc<StrategySelector>,
        speculative: Arc<SpeculativeProcessor>,
        engine: Arc<AgenticEngine>,
        monitor: Arc<PerformanceMonitor>,
        config: RouterConfig,
    ) -> Self {
        Self {
            analyzer: QueryAnalyzer::new(),
            selector,
            speculative,
            engine,
            monitor,
            config,
        }
    }

    /// Route a query to a single terminal response
    ///
    /// # Errors
    ///
    /// Returns an error only when every path that ran failed (the most
    /// informative kind wins) or the caller cancelled.
    pub async fn route(self: &Arc<Self>, query: &Query, cancel: &CancellationToken) -> Result<RoutedResult> {
        self.route_with_updates(query, cancel, None).await
    }

    /// Route a query, emitting interim/final updates on a channel
    ///
    /// Balanced mode emits `Interim` (speculative) then `Final`; single
    /// path modes emit only `Final`.
    pub async fn route_with_updates(
        self: &Arc<Self>,
        query: &Query,
        cancel: &CancellationToken,
        updates: Option<mpsc::Sender<RouteUpdate>>,
    ) -> Result<RoutedResult> {
        let request_id = Uuid::new_v4();
        let analysis = self.analyzer.analyze(&query.text);
        let selection = self.selector.select(&analysis, &query.constraints);
        debug!(
            %request_id,
            mode = query.mode.as_str(),
            strategy = selection.strategy.as_str(),
            complexity = analysis.complexity,
            "routing query"
        );

        let outcome = match query.mode {
            QueryMode::Fast => self.route_fast(query, &analysis, request_id).await,
            QueryMode::Deep => {
                self.route_deep(query, &analysis, &selection, request_id)
                    .await
            }
            QueryMode::Balanced => {
                self.route_balanced(query, &analysis, &selection, request_id, cancel, &updates)
                    .await
            }
        };

        if let (Ok(result), Some(tx)) = (&outcome, &updates) {
            let _ = tx.send(RouteUpdate::Final(result.response.clone())).await;
        }
        outcome
    }

    /// Fast mode: speculative only, timeout is a failure
    async fn route_fast(
        self: &Arc<Self>,
        query: &Query,
        analysis: &QueryAnalysis,
        request_id: Uuid,
    ) -> Result<RoutedResult> {
        let cancel = CancellationToken::new();
        let outcome = self
            .speculative_path(query, analysis, self.config.speculative_timeout_ms, &cancel)
            .await;

        let mut event = RequestEvent::new(query.mode);
        event.first_path = Some(PathKind::Speculative);
        match outcome {
            Ok(success) => {
                event.speculative_ms = Some(success.elapsed_ms);
                event.speculative_confidence = Some(success.response.confidence);
                self.monitor.record(event);
                self.selector
                    .complete_execution(success.response.strategy_used, success.response.confidence);
                Ok(RoutedResult {
                    request_id,
                    speculative_ms: Some(success.elapsed_ms),
                    agentic_ms: None,
                    response: success.response,
                })
            }
            Err(e) => {
                event.error_kind = Some(e.kind());
                self.monitor.record(event);
                Err(e)
            }
        }
    }

    /// Deep mode: agentic only
    async fn route_deep(
        self: &Arc<Self>,
        query: &Query,
        analysis: &QueryAnalysis,
        selection: &StrategySelection,
        request_id: Uuid,
    ) -> Result<RoutedResult> {
        let cancel = CancellationToken::new();
        let outcome = self
            .agentic_path(
                query,
                analysis,
                selection,
                self.config.agentic_timeout_ms,
                &cancel,
            )
            .await;

        let mut event = RequestEvent::new(query.mode);
        event.first_path = Some(PathKind::Agentic);
        match outcome {
            Ok(success) => {
                event.agentic_ms = Some(success.elapsed_ms);
                event.agentic_confidence = Some(success.response.confidence);
                self.monitor.record(event);
                self.selector
                    .complete_execution(selection.strategy, success.response.confidence);
                Ok(RoutedResult {
                    request_id,
                    speculative_ms: None,
                    agentic_ms: Some(success.elapsed_ms),
                    response: success.response,
                })
            }
            Err(e) => {
                event.error_kind = Some(e.kind());
                self.monitor.record(event);
                Err(e)
            }
        }
    }

    /// Balanced mode: both paths in parallel under child cancellation
    /// scopes, merged by completion and confidence
    #[allow(clippy::too_many_lines)]
    async fn route_balanced(
        self: &Arc<Self>,
        query: &Query,
        analysis: &QueryAnalysis,
        selection: &StrategySelection,
        request_id: Uuid,
        cancel: &CancellationToken,
        updates: &Option<mpsc::Sender<RouteUpdate>>,
    ) -> Result<RoutedResult> {
        // A zero speculative budget degrades to agentic-only
        if self.config.speculative_timeout_ms == 0 {
            debug!("speculative timeout is zero, running agentic only");
            return self.route_deep(query, analysis, selection, request_id).await;
        }

        let spec_cancel = cancel.child_token();
        let agentic_cancel = cancel.child_token();

        let mut spec_task: JoinHandle<PathResult> = {
            let router = Arc::clone(self);
            let query = query.clone();
            let analysis = analysis.clone();
            let cancel = spec_cancel.clone();
            let timeout_ms = self.config.speculative_timeout_ms;
            tokio::spawn(async move {
                router
                    .speculative_path(&query, &analysis, timeout_ms, &cancel)
                    .await
            })
        };
        let mut agentic_task: JoinHandle<PathResult> = {
            let router = Arc::clone(self);
            let query = query.clone();
            let analysis = analysis.clone();
            let selection = selection.clone();
            let cancel = agentic_cancel.clone();
            let timeout_ms = self.config.agentic_timeout_ms;
            tokio::spawn(async move {
                router
                    .agentic_path(&query, &analysis, &selection, timeout_ms, &cancel)
                    .await
            })
        };

        let mut spec_outcome: Option<PathResult> = None;
        let mut agentic_outcome: Option<PathResult> = None;
        let mut first_path: Option<PathKind> = None;

        while agentic_outcome.is_none() {
            tokio::select! {
                res = &mut spec_task, if spec_outcome.is_none() => {
                    let outcome = flatten_join(res);
                    if let Ok(success) = &outcome {
                        first_path.get_or_insert(PathKind::Speculative);
                        // Stream the interim result while agentic refines
                        if success.response.confidence >= self.config.interim_confidence_floor {
                            if let Some(tx) = updates {
                                let mut interim = success.response.clone();
                                interim.status = ResponseStatus::Interim;
                                let _ = tx.send(RouteUpdate::Interim(interim)).await;
                            }
                        }
                    }
                    spec_outcome = Some(outcome);
                }
                res = &mut agentic_task => {
                    first_path.get_or_insert(PathKind::Agentic);
                    agentic_outcome = Some(flatten_join(res));
                }
                () = cancel.cancelled() => {
                    spec_cancel.cancel();
                    agentic_cancel.cancel();
                    spec_task.abort();
                    agentic_task.abort();
                    let mut event = RequestEvent::new(query.mode);
                    event.error_kind = Some(ErrorKind::Cancelled);
                    self.monitor.record(event);
                    return Err(RagError::cancelled("routing cancelled by caller"));
                }
            }
        }

        let agentic_outcome =
            agentic_outcome.unwrap_or_else(|| Err(RagError::internal("agentic outcome missing")));

        // The agentic verdict is in; the speculative path either finished
        // or is now moot (when agentic succeeded)
        let spec_outcome = match spec_outcome {
            Some(outcome) => Some(outcome),
            None if agentic_outcome.is_ok() => {
                spec_cancel.cancel();
                spec_task.abort();
                None
            }
            None => Some(flatten_join(spec_task.await)),
        };

        self.merge_balanced(query, request_id, first_path, spec_outcome, agentic_outcome)
    }

    /// Apply the balanced-mode merge and tie-break rules
    fn merge_balanced(
        self: &Arc<Self>,
        query: &Query,
        request_id: Uuid,
        first_path: Option<PathKind>,
        spec_outcome: Option<PathResult>,
        agentic_outcome: PathResult,
    ) -> Result<RoutedResult> {
        let mut event = RequestEvent::new(query.mode);
        event.first_path = first_path;

        let (spec_success, spec_error) = match spec_outcome {
            Some(Ok(success)) => {
                event.speculative_ms = Some(success.elapsed_ms);
                event.speculative_confidence = Some(success.response.confidence);
                self.selector
                    .complete_execution(success.response.strategy_used, success.response.confidence);
                (Some(success), None)
            }
            Some(Err(e)) => (None, Some(e)),
            None => (None, None),
        };

        match agentic_outcome {
            Ok(agentic) => {
                event.agentic_ms = Some(agentic.elapsed_ms);
                event.agentic_confidence = Some(agentic.response.confidence);
                self.selector
                    .complete_execution(agentic.response.strategy_used, agentic.response.confidence);

                // The agentic result supersedes the speculative one unless
                // it is strictly less confident
                let (response, speculative_ms, agentic_ms) = match spec_success {
                    Some(spec) if spec.response.confidence > agentic.response.confidence => {
                        warn!(
                            speculative = spec.response.confidence,
                            agentic = agentic.response.confidence,
                            "agentic result less confident than speculative"
                        );
                        self.monitor.record_anomaly();
                        let response = spec
                            .response
                            .with_metadata("confidence_anomaly", json!(true));
                        (response, Some(spec.elapsed_ms), Some(agentic.elapsed_ms))
                    }
                    Some(spec) => (
                        agentic.response,
                        Some(spec.elapsed_ms),
                        Some(agentic.elapsed_ms),
                    ),
                    None => (agentic.response, None, Some(agentic.elapsed_ms)),
                };
                self.monitor.record(event);
                Ok(RoutedResult {
                    request_id,
                    response,
                    speculative_ms,
                    agentic_ms,
                })
            }
            Err(agentic_error) => match spec_success {
                // Timeouts and failures on the agentic path are
                // transitions to the speculative fallback
                Some(spec) => {
                    let mut response = spec.response;
                    response.status = ResponseStatus::Fallback;
                    if agentic_error.kind() == ErrorKind::Timeout {
                        response
                            .metadata
                            .insert("timeout".to_string(), json!("agentic"));
                    } else {
                        response.metadata.insert(
                            "agentic_error".to_string(),
                            json!(agentic_error.kind().as_str()),
                        );
                    }
                    info!(error = %agentic_error, "agentic path failed, falling back to speculative");
                    self.monitor
                        .record_component_error("agentic", agentic_error.kind());
                    self.monitor.record(event);
                    Ok(RoutedResult {
                        request_id,
                        speculative_ms: Some(spec.elapsed_ms),
                        agentic_ms: None,
                        response,
                    })
                }
                None => {
                    // Both paths failed: surface the most informative kind
                    let spec_error =
                        spec_error.unwrap_or_else(|| RagError::internal("speculative path lost"));
                    let kind = spec_error.kind().more_informative(agentic_error.kind());
                    event.error_kind = Some(kind);
                    self.monitor.record(event);
                    let message = format!(
                        "both paths failed: speculative: {spec_error}; agentic: {agentic_error}"
                    );
                    Err(RagError::from_kind(kind, message))
                }
            },
        }
    }

    /// Run the speculative path under its deadline
    async fn speculative_path(
        &self,
        query: &Query,
        analysis: &QueryAnalysis,
        timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> PathResult {
        let started = Instant::now();
        let work = self.speculative.process(query, analysis, cancel);
        match tokio::time::timeout(Duration::from_millis(timeout_ms), work).await {
            Ok(Ok(response)) => Ok(PathSuccess {
                response,
                elapsed_ms: elapsed_ms(started),
            }),
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => {
                cancel.cancel();
                Err(RagError::timeout(format!(
                    "speculative path exceeded {timeout_ms}ms"
                )))
            }
        }
    }

    /// Run the agentic path under its deadline
    async fn agentic_path(
        &self,
        query: &Query,
        analysis: &QueryAnalysis,
        selection: &StrategySelection,
        timeout_ms: u64,
        cancel: &CancellationToken,
    ) -> PathResult {
        let started = Instant::now();
        let work = self
            .engine
            .run(query, analysis, &selection.parameters, cancel);
        match tokio::time::timeout(Duration::from_millis(timeout_ms), work).await {
            Ok(Ok(result)) => Ok(PathSuccess {
                response: agentic_response(selection, result),
                elapsed_ms: elapsed_ms(started),
            }),
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => {
                cancel.cancel();
                Err(RagError::timeout(format!(
                    "agentic path exceeded {timeout_ms}ms"
                )))
            }
        }
    }
}

/// Convert an agentic result into a response
fn agentic_response(selection: &StrategySelection, result: AgenticResult) -> QueryResponse {
    let mut response = QueryResponse {
        answer: result.answer,
        sources: result.sources,
        confidence: result.confidence,
        strategy_used: selection.strategy,
        status: ResponseStatus::Final,
        metadata: Default::default(),
    };
    response
        .metadata
        .insert("iterations".to_string(), json!(result.iterations));
    response.metadata.insert(
        "strategy_reasoning".to_string(),
        json!(selection.reasoning),
    );
    if !result.corrections_applied.is_empty() {
        response.metadata.insert(
            "corrections_applied".to_string(),
            json!(result.corrections_applied),
        );
    }
    if result.outcome == EngineOutcome::BudgetExhausted {
        response
            .metadata
            .insert("outcome".to_string(), json!("budget_exhausted"));
    }
    response
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn flatten_join(res: std::result::Result<PathResult, tokio::task::JoinError>) -> PathResult {
    match res {
        Ok(outcome) => outcome,
        Err(e) => Err(RagError::internal(format!("path task failed: {e}"))),
    }
}
