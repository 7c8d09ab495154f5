//! End-to-end routing scenarios over scripted collaborators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio_util::sync::CancellationToken;

use ragweave_config::{EngineConfig, RouterConfig};
use ragweave_core::error::RagError;
use ragweave_core::traits::{Generator, Retriever};
use ragweave_core::types::{
    Query, QueryMode, ResponseStatus, RouteUpdate, SearchResult, StrategyKind,
};
use ragweave_engine::testing::{search_result, ClosureGenerator, SlowGenerator, StaticRetriever};
use ragweave_engine::{
    AgenticEngine, HybridQueryRouter, InMemoryEpisodeStore, PerformanceMonitor, RetrieverSet,
    RetryingGenerator, SpeculativeProcessor,
};
use ragweave_rag::{InMemoryRemoteCache, MockEmbedder, StrategySelector, TieredCache};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A generator scripted per prompt family
fn scripted_generator(answer: &'static str) -> Arc<dyn Generator> {
    Arc::new(ClosureGenerator::new(move |prompt| {
        if prompt.contains("Evaluate the quality of retrieved documents") {
            Ok("QUALITY: good\nCONFIDENCE: 0.8\nACTION: use_retrieved\nREASONING: coverage fine"
                .to_string())
        } else if prompt.contains("Assess the quality of the generated response") {
            Ok("SUPPORT: fully_supported\nUSEFULNESS: very_useful\nCONFIDENCE: 0.9\nREASONING: grounded\nREGENERATE: no"
                .to_string())
        } else if prompt.contains("Break the question") {
            Ok(String::new())
        } else if prompt.contains("Reformulate this query") {
            Ok("refined query".to_string())
        } else {
            Ok(answer.to_string())
        }
    }))
}

struct Harness {
    router: Arc<HybridQueryRouter>,
    monitor: Arc<PerformanceMonitor>,
}

fn harness(
    corpus: Vec<SearchResult>,
    web: Option<Arc<dyn Retriever>>,
    speculative_generator: Arc<dyn Generator>,
    agentic_generator: Arc<dyn Generator>,
    router_config: RouterConfig,
) -> Harness {
    init_tracing();
    let cache = Arc::new(TieredCache::new(
        &ragweave_config::CacheConfig::default(),
        Arc::new(InMemoryRemoteCache::new(100)),
    ));
    let vector: Arc<dyn Retriever> = Arc::new(StaticRetriever::new("vector", corpus));
    let embedder = Arc::new(MockEmbedder::new(32));
    let episodes = Arc::new(InMemoryEpisodeStore::new());

    let engine = Arc::new(AgenticEngine::new(
        RetrieverSet {
            vector: Arc::clone(&vector),
            web,
            local: None,
        },
        Arc::new(RetryingGenerator::new(agentic_generator)),
        embedder,
        episodes,
        EngineConfig::default(),
    ));
    let speculative = Arc::new(SpeculativeProcessor::new(
        vector,
        Arc::new(RetryingGenerator::new(speculative_generator)),
        cache,
    ));
    let selector = Arc::new(StrategySelector::new());
    let monitor = Arc::new(PerformanceMonitor::new(
        ragweave_config::MonitorConfig::default(),
    ));
    let router = Arc::new(HybridQueryRouter::new(
        selector,
        speculative,
        engine,
        Arc::clone(&monitor),
        router_config,
    ));
    Harness { router, monitor }
}

fn paris_corpus() -> Vec<SearchResult> {
    vec![search_result(
        "c1",
        "geo",
        "Paris is the capital and largest city of France.",
        1.0,
    )]
}

#[tokio::test]
async fn test_fast_path_factual_query() {
    let generator = scripted_generator("The capital of France is Paris.");
    let harness = harness(
        paris_corpus(),
        None,
        Arc::clone(&generator),
        generator,
        RouterConfig::default(),
    );

    let query = Query::new("What is the capital of France?", QueryMode::Fast);
    let started = Instant::now();
    let result = harness
        .router
        .route(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.response.status, ResponseStatus::Final);
    assert_eq!(result.response.strategy_used, StrategyKind::Direct);
    assert!(result.response.answer.contains("Paris"));
    assert!(result.response.confidence >= 0.7);
    assert!(result.response.sources.len() <= 5);
    assert!(started.elapsed() < Duration::from_millis(RouterConfig::default().speculative_timeout_ms));
    assert!(result.agentic_ms.is_none());
}

#[tokio::test]
async fn test_balanced_emits_interim_then_final() {
    let generator = scripted_generator("Transformers use attention; RNNs recur.");
    let harness = harness(
        vec![search_result(
            "c1",
            "ml",
            "Transformers rely on self-attention; RNNs process sequentially.",
            1.0,
        )],
        None,
        Arc::clone(&generator),
        generator,
        RouterConfig::default(),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel(8);
    let query = Query::new("Compare transformer and RNN architectures.", QueryMode::Balanced);
    let result = harness
        .router
        .route_with_updates(&query, &CancellationToken::new(), Some(tx))
        .await
        .unwrap();

    let first = rx.recv().await.expect("interim update");
    let RouteUpdate::Interim(interim) = first else {
        panic!("expected an interim update first, got {first:?}");
    };
    assert_eq!(interim.status, ResponseStatus::Interim);
    assert_eq!(interim.strategy_used, StrategyKind::Hybrid);

    let second = rx.recv().await.expect("final update");
    let RouteUpdate::Final(final_response) = second else {
        panic!("expected a final update second, got {second:?}");
    };
    assert_eq!(final_response.status, ResponseStatus::Final);
    assert_eq!(final_response.strategy_used, StrategyKind::SelfReflective);
    assert!(final_response.confidence > interim.confidence);

    assert_eq!(result.response.status, ResponseStatus::Final);
    assert!(result.speculative_ms.is_some());
    assert!(result.agentic_ms.is_some());
}

#[tokio::test]
async fn test_agentic_corrective_web_fallback() {
    // The corpus has nothing; the evaluator classifies the retrieval as
    // poor and the engine takes the web fallback
    let mut web_hit = search_result(
        "https://example.org/fusion",
        "",
        "2025 saw record plasma confinement times in tokamak experiments.",
        0.9,
    );
    web_hit
        .metadata
        .insert("source".to_string(), json!("web"));
    let web: Arc<dyn Retriever> = Arc::new(StaticRetriever::new("web", vec![web_hit]));

    let generator = scripted_generator("Fusion research advanced notably in 2025.");
    let harness = harness(
        Vec::new(),
        Some(web),
        Arc::clone(&generator),
        generator,
        RouterConfig::default(),
    );

    let query = Query::new("Latest developments in fusion energy 2025", QueryMode::Deep);
    let result = harness
        .router
        .route(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.response.status, ResponseStatus::Final);
    let corrections = result.response.metadata["corrections_applied"]
        .as_array()
        .expect("corrections recorded")
        .clone();
    assert!(corrections.iter().any(|c| c == "web_search"));
    assert!(result
        .response
        .sources
        .iter()
        .any(|s| s.metadata.get("source") == Some(&json!("web"))));
}

#[tokio::test]
async fn test_agentic_timeout_falls_back_to_speculative() {
    let fast = scripted_generator("Speculative answer.");
    let slow: Arc<dyn Generator> = Arc::new(SlowGenerator::new(
        scripted_generator("never finishes in time"),
        Duration::from_secs(10),
    ));
    let config = RouterConfig {
        agentic_timeout_ms: 100,
        ..Default::default()
    };
    let harness = harness(paris_corpus(), None, fast, slow, config);

    let query = Query::new("What is the capital of France?", QueryMode::Balanced);
    let result = harness
        .router
        .route(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.response.status, ResponseStatus::Fallback);
    assert_eq!(result.response.answer, "Speculative answer.");
    assert_eq!(result.response.metadata.get("timeout"), Some(&json!("agentic")));
    assert!(result.agentic_ms.is_none());
}

#[tokio::test]
async fn test_cancellation_stops_both_paths_promptly() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counting: Arc<dyn Generator> = {
        let calls = Arc::clone(&calls);
        Arc::new(ClosureGenerator::new(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("answer".to_string())
        }))
    };
    let slow: Arc<dyn Generator> = Arc::new(SlowGenerator::new(counting, Duration::from_secs(5)));
    let harness = harness(
        paris_corpus(),
        None,
        Arc::clone(&slow),
        slow,
        RouterConfig::default(),
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
    }

    let query = Query::new("anything at all", QueryMode::Balanced);
    let started = Instant::now();
    let err = harness.router.route(&query, &cancel).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, RagError::Cancelled { .. }));
    assert!(elapsed < Duration::from_millis(300), "took {elapsed:?}");

    // No further calls are issued after cancellation
    let calls_at_cancel = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(calls.load(Ordering::SeqCst), calls_at_cancel);
}

#[tokio::test]
async fn test_fast_mode_timeout_is_an_error() {
    let slow: Arc<dyn Generator> = Arc::new(SlowGenerator::new(
        scripted_generator("too late"),
        Duration::from_secs(5),
    ));
    let config = RouterConfig {
        speculative_timeout_ms: 50,
        ..Default::default()
    };
    let harness = harness(paris_corpus(), None, Arc::clone(&slow), slow, config);

    let query = Query::new("What is the capital of France?", QueryMode::Fast);
    let err = harness
        .router
        .route(&query, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Timeout { .. }));
}

#[tokio::test]
async fn test_zero_speculative_timeout_runs_agentic_only() {
    let generator = scripted_generator("Agentic-only answer.");
    let config = RouterConfig {
        speculative_timeout_ms: 0,
        ..Default::default()
    };
    let harness = harness(paris_corpus(), None, Arc::clone(&generator), generator, config);

    let query = Query::new("Compare transformer and RNN architectures.", QueryMode::Balanced);
    let result = harness
        .router
        .route(&query, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.response.status, ResponseStatus::Final);
    assert!(result.speculative_ms.is_none());
    assert!(result.agentic_ms.is_some());
}

#[tokio::test]
async fn test_both_paths_failing_surfaces_most_informative_kind() {
    let failing: Arc<dyn Generator> = Arc::new(ClosureGenerator::new(|_| {
        Err(RagError::generation("provider down"))
    }));
    let slow: Arc<dyn Generator> = Arc::new(SlowGenerator::new(
        scripted_generator("never"),
        Duration::from_secs(10),
    ));
    let config = RouterConfig {
        agentic_timeout_ms: 100,
        ..Default::default()
    };
    // Speculative fails with a generation error, agentic times out; the
    // timeout is the more informative kind
    let harness = harness(paris_corpus(), None, failing, slow, config);

    let query = Query::new("anything", QueryMode::Balanced);
    let err = harness
        .router
        .route(&query, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Timeout { .. }));
}

#[tokio::test]
async fn test_monitor_records_routed_requests() {
    let generator = scripted_generator("The capital of France is Paris.");
    let harness = harness(
        paris_corpus(),
        None,
        Arc::clone(&generator),
        generator,
        RouterConfig::default(),
    );

    for _ in 0..3 {
        harness
            .router
            .route(
                &Query::new("What is the capital of France?", QueryMode::Fast),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
    }

    let usage = harness.monitor.mode_usage();
    assert_eq!(usage.get(&QueryMode::Fast), Some(&3));
    let timing = harness
        .monitor
        .timing_summary(ragweave_engine::PathKind::Speculative, Some(QueryMode::Fast));
    assert_eq!(timing.count, 3);
}
