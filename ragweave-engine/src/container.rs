//! Process-scoped service container
//!
//! Constructs every subsystem once, in explicit dependency order (pool →
//! embedder → vector stores → cache → MCP → retrievers → engine → router
//! → monitor wiring), and tears down in reverse. Request paths never
//! initialize services implicitly: a container is fully built before the
//! first query is routed.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use ragweave_config::RagweaveConfig;
use ragweave_core::error::Result;
use ragweave_core::traits::{Embedder, Generator, Retriever};
use ragweave_mcp::McpMultiplexer;
use ragweave_rag::{
    CachedEmbedder, InMemoryRemoteCache, LexicalReranker, LocalDataRetriever, RemoteCache,
    StrategySelector, TieredCache, VectorRetriever, VectorRetrieverConfig, WebRetriever,
};
use ragweave_storage::{
    chunk_collection_schema, episode_collection_schema, ConnectionPool, SharedClientFactory,
    VectorBackend, VectorStore,
};

use crate::agentic::{AgenticEngine, RetrieverSet};
use crate::episodes::{EpisodeStore, VectorEpisodeStore};
use crate::generation::RetryingGenerator;
use crate::monitor::PerformanceMonitor;
use crate::router::HybridQueryRouter;
use crate::speculative::SpeculativeProcessor;

/// Server name expected to expose `web_search`
const WEB_SERVER: &str = "search_server";
/// Server name expected to expose `local_search`
const LOCAL_SERVER: &str = "local_data_server";

/// Externally provided collaborators
pub struct ContainerDeps {
    /// Vector database client
    pub backend: Arc<dyn VectorBackend>,
    /// Embedding provider (wrapped with a cache by the container)
    pub embedder: Arc<dyn Embedder>,
    /// Generation service (wrapped with a single retry by the container)
    pub generator: Arc<dyn Generator>,
    /// L2 cache client; defaults to an in-process stand-in
    pub remote_cache: Option<Arc<dyn RemoteCache>>,
}

/// The assembled service graph
pub struct ServiceContainer {
    config: RagweaveConfig,
    pool: Arc<ConnectionPool>,
    document_store: Arc<VectorStore>,
    cache: Arc<TieredCache>,
    mcp: Arc<McpMultiplexer>,
    selector: Arc<StrategySelector>,
    monitor: Arc<PerformanceMonitor>,
    router: Arc<HybridQueryRouter>,
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("collection", &self.document_store.collection())
            .finish_non_exhaustive()
    }
}

impl ServiceContainer {
    /// Build the full service graph
    ///
    /// # Errors
    ///
    /// Returns configuration validation errors and collection-creation
    /// failures. MCP servers are registered but connected lazily, so an
    /// unavailable tool server does not fail startup.
    pub async fn initialize(config: RagweaveConfig, deps: ContainerDeps) -> Result<Self> {
        config.validate()?;
        let cancel = CancellationToken::new();
        info!("initializing service container");

        // Pool
        let pool = Arc::new(ConnectionPool::new(
            Arc::new(SharedClientFactory::new(Arc::clone(&deps.backend))),
            config.vector.pool_size,
            Duration::from_secs(config.vector.pool_idle_secs),
        ));

        // Embedder (cached)
        let embedder: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(
            Arc::clone(&deps.embedder),
            config.cache.l1_capacity,
        ));

        // Vector stores: documents and episodes share the pool
        let document_store = Arc::new(VectorStore::new(
            Arc::clone(&pool),
            config.vector.collection.clone(),
            config.vector.embedding_dim,
            config.vector.metric,
            config.vector.enable_korean_optimization,
        ));
        document_store
            .ensure_collection(
                &chunk_collection_schema(&config.vector.collection, config.vector.embedding_dim),
                &cancel,
            )
            .await?;

        let episode_store_inner = Arc::new(VectorStore::new(
            Arc::clone(&pool),
            config.vector.episode_collection.clone(),
            config.vector.embedding_dim,
            config.vector.metric,
            config.vector.enable_korean_optimization,
        ));
        episode_store_inner
            .ensure_collection(
                &episode_collection_schema(
                    &config.vector.episode_collection,
                    config.vector.embedding_dim,
                ),
                &cancel,
            )
            .await?;
        let episodes: Arc<dyn EpisodeStore> =
            Arc::new(VectorEpisodeStore::new(episode_store_inner));

        // Cache
        let remote: Arc<dyn RemoteCache> = deps
            .remote_cache
            .unwrap_or_else(|| Arc::new(InMemoryRemoteCache::new(config.cache.l2_max_size)));
        let cache = Arc::new(TieredCache::new(&config.cache, remote));

        // MCP multiplexer: servers connect lazily on first use
        let mcp = Arc::new(McpMultiplexer::from_config(&config.mcp));

        // Generator with single-retry policy
        let generator: Arc<dyn Generator> =
            Arc::new(RetryingGenerator::new(Arc::clone(&deps.generator)));

        // Retrievers
        let vector_retriever: Arc<dyn Retriever> = Arc::new(
            VectorRetriever::new(
                Arc::clone(&embedder),
                Arc::clone(&document_store),
                Arc::clone(&cache),
                VectorRetrieverConfig::default(),
            )
            .with_generator(Arc::clone(&generator))
            .with_reranker(Arc::new(LexicalReranker::default())),
        );
        let web_retriever: Option<Arc<dyn Retriever>> = config
            .mcp
            .servers
            .contains_key(WEB_SERVER)
            .then(|| -> Arc<dyn Retriever> {
                Arc::new(WebRetriever::new(Arc::clone(&mcp), WEB_SERVER))
            });
        let local_retriever: Option<Arc<dyn Retriever>> = config
            .mcp
            .servers
            .contains_key(LOCAL_SERVER)
            .then(|| -> Arc<dyn Retriever> {
                Arc::new(LocalDataRetriever::new(Arc::clone(&mcp), LOCAL_SERVER))
            });
        let retrievers = RetrieverSet {
            vector: Arc::clone(&vector_retriever),
            web: web_retriever,
            local: local_retriever,
        };

        // Engine, speculative path, selector, monitor, router
        let engine = Arc::new(AgenticEngine::new(
            retrievers,
            Arc::clone(&generator),
            Arc::clone(&embedder),
            episodes,
            config.engine.clone(),
        ));
        let speculative = Arc::new(SpeculativeProcessor::new(
            vector_retriever,
            Arc::clone(&generator),
            Arc::clone(&cache),
        ));
        let selector = Arc::new(StrategySelector::new());
        let monitor = Arc::new(PerformanceMonitor::new(config.monitor.clone()));
        let router = Arc::new(HybridQueryRouter::new(
            Arc::clone(&selector),
            speculative,
            engine,
            Arc::clone(&monitor),
            config.router.clone(),
        ));

        info!("service container initialized");
        Ok(Self {
            config,
            pool,
            document_store,
            cache,
            mcp,
            selector,
            monitor,
            router,
        })
    }

    /// Tear down in reverse dependency order
    pub async fn shutdown(&self) {
        info!("shutting down service container");
        self.mcp.disconnect_all().await;
        self.pool.close();
        info!("service container shut down");
    }

    /// The hybrid query router
    #[must_use]
    pub fn router(&self) -> &Arc<HybridQueryRouter> {
        &self.router
    }

    /// The performance monitor
    #[must_use]
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// The document vector store
    #[must_use]
    pub fn document_store(&self) -> &Arc<VectorStore> {
        &self.document_store
    }

    /// The two-tier cache
    #[must_use]
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// The MCP multiplexer
    #[must_use]
    pub fn mcp(&self) -> &Arc<McpMultiplexer> {
        &self.mcp
    }

    /// The strategy selector
    #[must_use]
    pub fn selector(&self) -> &Arc<StrategySelector> {
        &self.selector
    }

    /// The effective configuration
    #[must_use]
    pub fn config(&self) -> &RagweaveConfig {
        &self.config
    }
}
