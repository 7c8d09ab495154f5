//! Integration tests for the vector store layer

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ragweave_core::error::RagError;
use ragweave_core::types::{ChunkRecord, DistanceMetric};
use ragweave_storage::{
    chunk_collection_schema, to_search_result, ConnectionPool, FilterExpr, InMemoryVectorBackend,
    SharedClientFactory, VectorBackend, VectorStore,
};

const DIM: usize = 8;

fn embedding(seed: f32) -> Vec<f32> {
    (0..DIM).map(|i| seed + i as f32 * 0.1).collect()
}

fn chunk(id: &str, document_id: &str, index: i64, seed: f32) -> ChunkRecord {
    ChunkRecord::new(
        id,
        document_id,
        format!("chunk {id} of {document_id}"),
        index,
        format!("{document_id}.txt"),
        embedding(seed),
    )
}

async fn store() -> (VectorStore, CancellationToken) {
    let backend: Arc<dyn VectorBackend> = Arc::new(InMemoryVectorBackend::new());
    let pool = Arc::new(ConnectionPool::new(
        Arc::new(SharedClientFactory::new(backend)),
        4,
        Duration::from_secs(300),
    ));
    let store = VectorStore::new(pool, "documents", DIM, DistanceMetric::Cosine, false);
    let cancel = CancellationToken::new();
    store
        .ensure_collection(&chunk_collection_schema("documents", DIM), &cancel)
        .await
        .unwrap();
    (store, cancel)
}

#[tokio::test]
async fn test_insert_then_search_returns_exact_match() {
    let (store, cancel) = store().await;

    store
        .insert_chunks(&[chunk("c1", "d1", 0, 0.4)], None, &cancel)
        .await
        .unwrap();

    let hits = store
        .search(&embedding(0.4), 1, 0.5, None, &[], &cancel)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].row.id, "c1");
    // Exact-match recall: the just-inserted chunk comes back essentially
    // at full similarity
    assert!(hits[0].score >= 0.99);

    let result = to_search_result(hits.into_iter().next().unwrap());
    assert_eq!(result.document_id, "d1");
    assert_eq!(result.chunk_index, 0);
    assert_eq!(result.document_name, "d1.txt");
}

#[tokio::test]
async fn test_dimension_mismatch_rejected_before_write() {
    let (store, cancel) = store().await;
    let mut bad = chunk("c1", "d1", 0, 0.4);
    bad.embedding = vec![1.0, 2.0];

    let err = store
        .insert_chunks(&[bad], None, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::InvalidArgument { .. }));
}

#[tokio::test]
async fn test_delete_document_removes_all_chunks() {
    let (store, cancel) = store().await;

    store
        .insert_chunks(
            &[
                chunk("c1", "doc-d", 0, 0.2),
                chunk("c2", "doc-d", 1, 0.25),
                chunk("c3", "doc-d", 2, 0.3),
                chunk("x1", "doc-x", 0, 0.9),
            ],
            None,
            &cancel,
        )
        .await
        .unwrap();

    let before = store
        .search(&embedding(0.2), 10, 0.5, None, &[], &cancel)
        .await
        .unwrap();
    assert!(before
        .iter()
        .any(|hit| hit.row.fields["document_id"] == "doc-d"));

    let deleted = store.delete_document("doc-d", &cancel).await.unwrap();
    assert_eq!(deleted, 3);

    // No stale hits survive the filtered delete
    let after = store
        .search(&embedding(0.2), 10, 0.5, None, &[], &cancel)
        .await
        .unwrap();
    assert!(after
        .iter()
        .all(|hit| hit.row.fields["document_id"] != "doc-d"));

    // Deleting again finds nothing
    assert_eq!(store.delete_document("doc-d", &cancel).await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_collection_search_returns_empty() {
    let (store, cancel) = store().await;
    let hits = store
        .search(&embedding(0.1), 5, 0.5, None, &[], &cancel)
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_filtered_search() {
    let (store, cancel) = store().await;
    store
        .insert_chunks(
            &[chunk("c1", "d1", 0, 0.5), chunk("c2", "d2", 0, 0.5)],
            None,
            &cancel,
        )
        .await
        .unwrap();

    let filter = FilterExpr::eq("document_id", "d2");
    let hits = store
        .search(&embedding(0.5), 10, 0.5, Some(&filter), &[], &cancel)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].row.id, "c2");
}

#[tokio::test]
async fn test_cold_start_load_is_serialized_then_parallel() {
    let (store, cancel) = store().await;
    store
        .insert_chunks(&[chunk("c1", "d1", 0, 0.4)], None, &cancel)
        .await
        .unwrap();

    let store = Arc::new(store);
    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = Arc::clone(&store);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            store.search(&embedding(0.4), 1, 0.5, None, &[], &cancel).await
        }));
    }
    for handle in handles {
        let hits = handle.await.unwrap().unwrap();
        assert_eq!(hits.len(), 1);
    }
}

#[tokio::test]
async fn test_stats_report_recommended_index() {
    let (store, cancel) = store().await;
    store
        .insert_chunks(&[chunk("c1", "d1", 0, 0.4)], None, &cancel)
        .await
        .unwrap();

    let stats = store.stats(&cancel).await.unwrap();
    assert_eq!(stats.entity_count, 1);
    // Small corpus: HNSW recommended, and that is what was created
    assert!(stats.is_optimized);
    assert_eq!(
        stats.recommended_index.kind,
        ragweave_storage::IndexKind::Hnsw
    );
}

#[tokio::test]
async fn test_health_check_reports_entities() {
    let (store, cancel) = store().await;
    store
        .insert_chunks(&[chunk("c1", "d1", 0, 0.4)], None, &cancel)
        .await
        .unwrap();

    let report = store.health_check(&cancel).await;
    assert!(report.connected);
    assert!(report.collection_exists);
    assert_eq!(report.entity_count, Some(1));
}

#[tokio::test]
async fn test_partitioned_insert_and_date_range_search() {
    let (store, cancel) = store().await;

    let july = store.create_date_partition(2025, 7, &cancel).await.unwrap();
    assert_eq!(july, "date_2025_07");

    store
        .insert_chunks(&[chunk("c-jul", "d1", 0, 0.4)], Some(&july), &cancel)
        .await
        .unwrap();
    store
        .insert_chunks(
            &[chunk("c-jan", "d2", 0, 0.4)],
            Some("date_2025_01"),
            &cancel,
        )
        .await
        .unwrap();

    let hits = store
        .search_in_date_range(&embedding(0.4), (2025, 6), (2025, 8), 10, 0.5, &cancel)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].row.id, "c-jul");

    let stats = store.partition_stats(&cancel).await.unwrap();
    let july_stats = stats.iter().find(|p| p.name == "date_2025_07").unwrap();
    assert_eq!(july_stats.entity_count, 1);
}

#[tokio::test]
async fn test_cancelled_search_does_not_run() {
    let (store, cancel) = store().await;
    cancel.cancel();
    let err = store
        .search(&embedding(0.4), 5, 0.5, None, &[], &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Cancelled { .. }));
}
