//! Ranks indexed tables against a natural-language query.
use std::cmp::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::TableDescriptor;
use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::index::SearchIndex;

#[derive(Debug, Clone)]
pub struct SearchResult {
    /// 1-based position in the ranking.
    pub rank: usize,
    pub table_id: String,
    /// Cosine similarity in [-1, 1].
    pub score: f32,
    pub descriptor: Arc<TableDescriptor>,
}

/// Cosine similarity of two equal-length vectors; 0 when either has zero norm
/// or the result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0)
}

/// Embed `query` and return the `top_k` most similar tables.
///
/// Ordered by descending score, ties broken by ascending table id. An empty
/// index yields no results; a query embedding whose dimensions or model differ
/// from the index is a configuration error.
pub fn search<E: Embedder + ?Sized>(
    index: &SearchIndex,
    query: &str,
    embedder: &E,
    top_k: usize,
) -> Result<Vec<SearchResult>> {
    if top_k == 0 {
        return Err(Error::Configuration("top_k must be at least 1".to_string()));
    }
    if index.is_empty() {
        return Ok(Vec::new());
    }
    if embedder.model_id() != index.model_id() {
        return Err(Error::Configuration(format!(
            "index was built with model {} but the active model is {}; rebuild the index",
            index.model_id(),
            embedder.model_id()
        )));
    }

    let query_vector = embedder
        .embed(query)
        .map_err(|e| Error::provider(format!("query {query:?}"), e))?;
    if query_vector.len() != index.dimensions() {
        return Err(Error::Configuration(format!(
            "query embedding has {} dimensions but the index has {}",
            query_vector.len(),
            index.dimensions()
        )));
    }

    let mut scored: Vec<(f32, &str, &Arc<TableDescriptor>)> = index
        .iter()
        .map(|entry| {
            (
                cosine_similarity(&query_vector, &entry.embedding),
                entry.table_id.as_str(),
                &entry.descriptor,
            )
        })
        .collect();

    scored.sort_by(|a, b| by_score_then_id(a.0, a.1, b.0, b.1));
    scored.truncate(top_k);

    debug!(
        "Query {query:?} matched {} of {} tables",
        scored.len(),
        index.entry_count()
    );

    Ok(scored
        .into_iter()
        .enumerate()
        .map(|(i, (score, table_id, descriptor))| SearchResult {
            rank: i + 1,
            table_id: table_id.to_string(),
            score,
            descriptor: Arc::clone(descriptor),
        })
        .collect())
}

fn by_score_then_id(score_a: f32, id_a: &str, score_b: f32, id_b: &str) -> Ordering {
    score_b.total_cmp(&score_a).then_with(|| id_a.cmp(id_b))
}

/// A loaded index paired with the provider that built it, shareable across
/// threads for concurrent read-only queries.
#[derive(Clone)]
pub struct SearchEngine {
    index: Arc<SearchIndex>,
    embedder: Arc<dyn Embedder>,
    default_top_k: usize,
}

impl SearchEngine {
    pub fn new(index: Arc<SearchIndex>, embedder: Arc<dyn Embedder>, default_top_k: usize) -> Self {
        Self {
            index,
            embedder,
            default_top_k: default_top_k.max(1),
        }
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Search with `top_k`, or the engine's default when `None`.
    pub fn search(&self, query: &str, top_k: Option<usize>) -> Result<Vec<SearchResult>> {
        search(
            &self.index,
            query,
            self.embedder.as_ref(),
            top_k.unwrap_or(self.default_top_k),
        )
    }
}
