//! Index and search parameter selection
//!
//! Index family follows corpus size; search-time `ef`/`nprobe` follow
//! query complexity. Korean-optimized variants widen the graph and the
//! probe space: agglutinative morphology spreads semantically close texts
//! further apart in embedding space, so recall needs more candidates.

use ragweave_core::types::DistanceMetric;

use crate::types::{IndexKind, IndexParams, IndexSpec, SearchParams};

/// Corpus-size boundary between HNSW and IVF-PQ
pub const SMALL_CORPUS: usize = 100_000;
/// Corpus-size boundary between IVF-PQ and IVF-SQ8
pub const LARGE_CORPUS: usize = 1_000_000;

/// Complexity below which a query runs in fast search mode
const FAST_COMPLEXITY: f32 = 0.3;
/// Complexity above which a query runs in deep search mode
const DEEP_COMPLEXITY: f32 = 0.7;

/// Pick the index family and build parameters for a corpus size
#[must_use]
pub fn select_index(corpus_size: usize, korean: bool, metric: DistanceMetric) -> IndexSpec {
    let (kind, params) = if corpus_size < SMALL_CORPUS {
        (
            IndexKind::Hnsw,
            if korean {
                IndexParams::Hnsw {
                    m: 24,
                    ef_construction: 300,
                }
            } else {
                IndexParams::Hnsw {
                    m: 16,
                    ef_construction: 200,
                }
            },
        )
    } else if corpus_size < LARGE_CORPUS {
        (
            IndexKind::IvfPq,
            if korean {
                IndexParams::IvfPq {
                    nlist: 2048,
                    m: 16,
                    nbits: 8,
                }
            } else {
                IndexParams::IvfPq {
                    nlist: 1024,
                    m: 8,
                    nbits: 8,
                }
            },
        )
    } else {
        (
            IndexKind::IvfSq8,
            if korean {
                IndexParams::IvfSq8 { nlist: 4096 }
            } else {
                IndexParams::IvfSq8 { nlist: 2048 }
            },
        )
    };

    IndexSpec {
        kind,
        metric,
        params,
    }
}

/// Base HNSW `ef` for a corpus size
#[must_use]
const fn base_ef(corpus_size: usize, korean: bool) -> usize {
    match (corpus_size < SMALL_CORPUS, korean) {
        (true, true) => 80,
        (true, false) => 64,
        (false, true) => 160,
        (false, false) => 128,
    }
}

/// Base IVF `nprobe` for a corpus size
#[must_use]
const fn base_nprobe(corpus_size: usize, korean: bool) -> usize {
    match (corpus_size < LARGE_CORPUS, korean) {
        (true, true) => 48,
        (true, false) => 32,
        (false, true) => 96,
        (false, false) => 64,
    }
}

/// Derive search-time parameters from index family, corpus size, and
/// query complexity
///
/// Fast queries (complexity < 0.3) trade recall for latency; deep queries
/// (complexity > 0.7) widen the candidate space.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn adaptive_search_params(
    index: IndexKind,
    corpus_size: usize,
    query_complexity: f32,
    korean: bool,
    metric: DistanceMetric,
) -> SearchParams {
    let complexity = query_complexity.clamp(0.0, 1.0);

    match index {
        IndexKind::Hnsw => {
            let base = base_ef(corpus_size, korean);
            let ef = if complexity < FAST_COMPLEXITY {
                (base as f32 * 0.75) as usize
            } else if complexity > DEEP_COMPLEXITY {
                (base as f32 * 1.5) as usize
            } else {
                base
            };
            SearchParams {
                metric,
                ef: Some(ef),
                nprobe: None,
            }
        }
        IndexKind::IvfPq | IndexKind::IvfSq8 => {
            let base = base_nprobe(corpus_size, korean);
            let nprobe = if complexity < FAST_COMPLEXITY {
                base / 2
            } else if complexity > DEEP_COMPLEXITY {
                base * 2
            } else {
                base
            };
            SearchParams {
                metric,
                ef: None,
                nprobe: Some(nprobe),
            }
        }
    }
}
