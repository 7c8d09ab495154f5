//! Agentic engine behavior and container wiring

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use ragweave_config::{EngineConfig, RagweaveConfig};
use ragweave_core::error::RagError;
use ragweave_core::traits::{Generator, Retriever};
use ragweave_core::types::{
    ChunkRecord, Episode, Query, QueryMode, ResponseStatus, StrategyParameters,
};
use ragweave_engine::testing::{search_result, ClosureGenerator, StaticRetriever};
use ragweave_engine::{
    AgenticEngine, ContainerDeps, EngineOutcome, EpisodeStore, InMemoryEpisodeStore, RetrieverSet,
    RetryingGenerator, ServiceContainer,
};
use ragweave_rag::{MockEmbedder, QueryAnalyzer};
use ragweave_storage::{InMemoryVectorBackend, VectorBackend};

fn corpus() -> Vec<ragweave_core::types::SearchResult> {
    vec![
        search_result("c1", "d1", "evidence alpha about the topic", 0.9),
        search_result("c2", "d2", "evidence beta about the topic", 0.8),
    ]
}

fn engine_with(
    generator: Arc<dyn Generator>,
    web: Option<Arc<dyn Retriever>>,
    episodes: Arc<dyn EpisodeStore>,
    config: EngineConfig,
) -> AgenticEngine {
    AgenticEngine::new(
        RetrieverSet {
            vector: Arc::new(StaticRetriever::new("vector", corpus())),
            web,
            local: None,
        },
        Arc::new(RetryingGenerator::new(generator)),
        Arc::new(MockEmbedder::new(32)),
        episodes,
        config,
    )
}

fn accepting_generator() -> Arc<dyn Generator> {
    Arc::new(ClosureGenerator::new(|prompt| {
        if prompt.contains("Evaluate the quality of retrieved documents") {
            Ok("QUALITY: good\nCONFIDENCE: 0.8\nACTION: use_retrieved\nREASONING: fine".to_string())
        } else if prompt.contains("Assess the quality of the generated response") {
            Ok("SUPPORT: fully_supported\nUSEFULNESS: useful\nCONFIDENCE: 0.85\nREASONING: ok\nREGENERATE: no".to_string())
        } else if prompt.contains("Break the question") {
            Ok("sub question one\nsub question two".to_string())
        } else if prompt.contains("Reformulate this query") {
            Ok("reformulated".to_string())
        } else {
            Ok("final answer".to_string())
        }
    }))
}

async fn run(
    engine: &AgenticEngine,
    query_text: &str,
    max_iterations: usize,
) -> ragweave_engine::AgenticResult {
    let query = Query::new(query_text, QueryMode::Deep);
    let analysis = QueryAnalyzer::new().analyze(query_text);
    let params = StrategyParameters {
        max_iterations,
        ..Default::default()
    };
    engine
        .run(&query, &analysis, &params, &CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_zero_budget_returns_budget_exhausted() {
    let engine = engine_with(
        accepting_generator(),
        None,
        Arc::new(InMemoryEpisodeStore::new()),
        EngineConfig::default(),
    );
    let result = run(&engine, "any question", 0).await;
    assert_eq!(result.outcome, EngineOutcome::BudgetExhausted);
    assert_eq!(result.iterations, 0);
    assert!(result.answer.is_empty());
}

#[tokio::test]
async fn test_iterations_never_exceed_budget() {
    // The generation evaluator always demands regeneration; the loop must
    // still stop at the budget
    let generator: Arc<dyn Generator> = Arc::new(ClosureGenerator::new(|prompt| {
        if prompt.contains("Evaluate the quality of retrieved documents") {
            Ok("QUALITY: good\nCONFIDENCE: 0.8\nACTION: use_retrieved\nREASONING: fine".to_string())
        } else if prompt.contains("Assess the quality of the generated response") {
            Ok("SUPPORT: partially_supported\nUSEFULNESS: somewhat_useful\nCONFIDENCE: 0.4\nREASONING: weak\nREGENERATE: yes".to_string())
        } else if prompt.contains("Break the question") {
            Ok(String::new())
        } else {
            Ok("an answer".to_string())
        }
    }));
    let engine = engine_with(
        generator,
        None,
        Arc::new(InMemoryEpisodeStore::new()),
        EngineConfig::default(),
    );
    let result = run(&engine, "hard question", 3).await;
    assert_eq!(result.iterations, 3);
    assert_eq!(result.outcome, EngineOutcome::Final);
    assert!(result
        .corrections_applied
        .iter()
        .any(|c| c == "regenerate"));
}

#[tokio::test]
async fn test_corrective_action_never_repeats_consecutively() {
    // The retrieval evaluator always recommends refine_query; with a web
    // retriever available the second application must switch away
    let generator: Arc<dyn Generator> = Arc::new(ClosureGenerator::new(|prompt| {
        if prompt.contains("Evaluate the quality of retrieved documents") {
            Ok("QUALITY: ambiguous\nCONFIDENCE: 0.4\nACTION: refine_query\nREASONING: thin".to_string())
        } else if prompt.contains("Assess the quality of the generated response") {
            Ok("SUPPORT: fully_supported\nUSEFULNESS: useful\nCONFIDENCE: 0.8\nREASONING: ok\nREGENERATE: no".to_string())
        } else if prompt.contains("Break the question") {
            Ok(String::new())
        } else if prompt.contains("Reformulate this query") {
            Ok("sharper query".to_string())
        } else {
            Ok("an answer".to_string())
        }
    }));
    let web: Arc<dyn Retriever> = Arc::new(StaticRetriever::new(
        "web",
        vec![search_result("w1", "", "web evidence", 0.7)],
    ));
    let engine = engine_with(
        generator,
        Some(web),
        Arc::new(InMemoryEpisodeStore::new()),
        EngineConfig::default(),
    );

    let result = run(&engine, "ambiguous question", 3).await;
    assert!(result.corrections_applied.len() >= 2);
    assert!(result.corrections_applied[0].starts_with("refine_query"));
    // The immediate repeat is redirected to the web fallback
    assert_eq!(result.corrections_applied[1], "web_search");
}

#[tokio::test]
async fn test_warm_start_skips_decomposition() {
    let embedder = MockEmbedder::new(32);
    let query_text = "how do I tune hnsw parameters";
    let embedding = {
        use ragweave_core::traits::Embedder;
        embedder
            .embed(&[query_text.to_string()])
            .await
            .unwrap()
            .remove(0)
    };

    let episodes = Arc::new(InMemoryEpisodeStore::new());
    episodes
        .record(Episode::new(
            query_text,
            embedding,
            vec!["check corpus size".to_string(), "check ef".to_string()],
            "prior answer",
            0.9,
            2,
        ))
        .await
        .unwrap();

    // Decomposition must not run when a warm start is available
    let generator: Arc<dyn Generator> = Arc::new(ClosureGenerator::new(|prompt| {
        assert!(
            !prompt.contains("Break the question"),
            "decomposition ran despite a warm start"
        );
        if prompt.contains("Evaluate the quality of retrieved documents") {
            Ok("QUALITY: good\nCONFIDENCE: 0.8\nACTION: use_retrieved\nREASONING: fine".to_string())
        } else if prompt.contains("Assess the quality of the generated response") {
            Ok("SUPPORT: fully_supported\nUSEFULNESS: useful\nCONFIDENCE: 0.85\nREASONING: ok\nREGENERATE: no".to_string())
        } else {
            Ok("warmed answer".to_string())
        }
    }));
    let engine = engine_with(generator, None, episodes, EngineConfig::default());

    let result = run(&engine, query_text, 3).await;
    assert_eq!(result.outcome, EngineOutcome::Final);
}

#[tokio::test]
async fn test_completed_run_records_an_episode() {
    let episodes = Arc::new(InMemoryEpisodeStore::new());
    let engine = engine_with(
        accepting_generator(),
        None,
        Arc::clone(&episodes) as Arc<dyn EpisodeStore>,
        EngineConfig::default(),
    );

    assert!(episodes.is_empty());
    let result = run(&engine, "a fresh question", 3).await;
    assert_eq!(result.outcome, EngineOutcome::Final);
    assert_eq!(episodes.len(), 1);
}

#[tokio::test]
async fn test_confidence_combines_retrieval_and_generation() {
    let generator: Arc<dyn Generator> = Arc::new(ClosureGenerator::new(|prompt| {
        if prompt.contains("Evaluate the quality of retrieved documents") {
            Ok("QUALITY: good\nCONFIDENCE: 0.5\nACTION: use_retrieved\nREASONING: fine".to_string())
        } else if prompt.contains("Assess the quality of the generated response") {
            Ok("SUPPORT: fully_supported\nUSEFULNESS: useful\nCONFIDENCE: 1.0\nREASONING: ok\nREGENERATE: no".to_string())
        } else if prompt.contains("Break the question") {
            Ok(String::new())
        } else {
            Ok("answer".to_string())
        }
    }));
    let engine = engine_with(
        generator,
        None,
        Arc::new(InMemoryEpisodeStore::new()),
        EngineConfig::default(),
    );
    let result = run(&engine, "plain question", 3).await;
    // 0.4 * 0.5 + 0.6 * 1.0
    assert!((result.confidence - 0.8).abs() < 1e-5);
}

#[tokio::test]
async fn test_fatal_generation_failure_surfaces() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let generator: Arc<dyn Generator> = Arc::new(ClosureGenerator::new(move |prompt| {
        if prompt.contains("Evaluate the quality of retrieved documents") {
            Ok("QUALITY: good\nCONFIDENCE: 0.8\nACTION: use_retrieved\nREASONING: fine".to_string())
        } else if prompt.contains("Break the question") {
            Ok(String::new())
        } else {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RagError::generation("provider outage"))
        }
    }));
    let engine = engine_with(
        generator,
        None,
        Arc::new(InMemoryEpisodeStore::new()),
        EngineConfig::default(),
    );

    let query = Query::new("question", QueryMode::Deep);
    let analysis = QueryAnalyzer::new().analyze(&query.text);
    let err = engine
        .run(
            &query,
            &analysis,
            &StrategyParameters::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Generation { .. }));
    // Answer generation was attempted twice (the single permitted retry)
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_container_end_to_end() {
    let backend: Arc<dyn VectorBackend> = Arc::new(InMemoryVectorBackend::new());
    let embedder = Arc::new(MockEmbedder::new(768));
    let generator: Arc<dyn Generator> = Arc::new(ClosureGenerator::new(|prompt| {
        if prompt.contains("Evaluate the quality of retrieved documents") {
            Ok("QUALITY: good\nCONFIDENCE: 0.8\nACTION: use_retrieved\nREASONING: fine".to_string())
        } else if prompt.contains("Assess the quality of the generated response") {
            Ok("SUPPORT: fully_supported\nUSEFULNESS: very_useful\nCONFIDENCE: 0.9\nREASONING: ok\nREGENERATE: no".to_string())
        } else if prompt.contains("Break the question") {
            Ok(String::new())
        } else if prompt.contains("Rewrite the search query") {
            Ok(String::new())
        } else {
            Ok("Paris is the capital of France.".to_string())
        }
    }));

    let container = ServiceContainer::initialize(
        RagweaveConfig::default(),
        ContainerDeps {
            backend,
            embedder: embedder.clone(),
            generator,
            remote_cache: None,
        },
    )
    .await
    .unwrap();

    // Ingest a document the way an ingestion collaborator would
    let cancel = CancellationToken::new();
    let text = "Paris is the capital and largest city of France.";
    let embedding = {
        use ragweave_core::traits::Embedder;
        embedder.embed(&[text.to_string()]).await.unwrap().remove(0)
    };
    let mut chunk = ChunkRecord::new("c1", "geo-doc", text, 0, "geography.txt", embedding);
    chunk.upload_date = 1_722_470_400;
    container
        .document_store()
        .insert_chunks(&[chunk], None, &cancel)
        .await
        .unwrap();

    // Route a fast query end to end
    let query = Query::new("What is the capital of France?", QueryMode::Fast);
    let result = container.router().route(&query, &cancel).await.unwrap();
    assert_eq!(result.response.status, ResponseStatus::Final);
    assert!(result.response.answer.contains("Paris"));
    assert!(!result.response.sources.is_empty());
    assert_eq!(result.response.sources[0].document_id, "geo-doc");

    // Delete consistency: removing the document removes its chunks from
    // subsequent searches
    let deleted = container
        .document_store()
        .delete_document("geo-doc", &cancel)
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    container
        .cache()
        .invalidate(ragweave_rag::CacheType::Search, None)
        .await;

    let embedding2 = {
        use ragweave_core::traits::Embedder;
        embedder
            .embed(&["What is the capital of France?".to_string()])
            .await
            .unwrap()
            .remove(0)
    };
    let hits = container
        .document_store()
        .search(&embedding2, 5, 0.5, None, &[], &cancel)
        .await
        .unwrap();
    assert!(hits
        .iter()
        .all(|h| h.row.fields.get("document_id") != Some(&Value::String("geo-doc".into()))));

    container.shutdown().await;
}
