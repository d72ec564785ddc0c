//! Term-overlap search over stored spans, with query logging.
//!
//! The ranking runs entirely in this crate over each candidate's
//! `searchable_text`, so every [`Store`] backend ranks identically. Stores
//! only have to find candidates sharing at least one term with the query.
//!
//! # Scoring
//!
//! For each distinct query term `t` found in a span:
//!
//! ```text
//! (1 + ln tf(t)) × (1 + 1 / (1 + first_pos(t)))
//! ```
//!
//! where `tf` counts occurrences in the span's tokens and `first_pos` is
//! the token index of the first occurrence, so terms in a span's heading
//! weigh up to twice as much. A span's score is the sum over terms.
//!
//! # Ordering
//!
//! Score (desc), span `updated_at` (desc), span id (asc).
//!
//! Every call appends exactly one [`QueryLog`] row, including calls that
//! return nothing, and tags every result with that row's id.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{now_millis, QueryLog, RankedResult};
use crate::store::Store;
use crate::tokenize::query_terms;

/// Bundles all inputs for a single search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    /// Recorded on the query log row.
    pub user_id: Option<&'a str>,
    /// Maximum results to return.
    pub limit: usize,
}

/// Ranked results plus the id of the query log row written for them.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query_id: String,
    pub results: Vec<RankedResult>,
}

/// Run a search against a [`Store`] backend.
///
/// This is the core search function that all frontends (CLI, HTTP)
/// delegate to. It never modifies contexts or spans.
pub async fn search<S: Store + ?Sized>(store: &S, req: &SearchRequest<'_>) -> Result<SearchResponse> {
    let log = QueryLog {
        id: Uuid::new_v4().to_string(),
        query: req.query.to_string(),
        feedback: None,
        user_id: req.user_id.map(str::to_string),
        created_at: now_millis(),
    };
    store.insert_query(&log).await?;

    let terms = query_terms(req.query);
    if terms.is_empty() || req.limit == 0 {
        return Ok(SearchResponse {
            query_id: log.id,
            results: Vec::new(),
        });
    }

    let candidates = store.matching_spans(&terms).await?;
    let candidate_count = candidates.len();

    let mut results: Vec<RankedResult> = candidates
        .into_iter()
        .filter_map(|c| {
            let score = score_span(&terms, &c.span.searchable_text);
            if score <= 0.0 {
                return None;
            }
            Some(RankedResult {
                span_id: c.span.id,
                content: c.span.content,
                span_meta: c.span.meta,
                context_id: c.span.context_id,
                context_meta: c.context_meta,
                query_id: log.id.clone(),
                score,
                updated_at: c.span.updated_at,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(b.updated_at.cmp(&a.updated_at))
            .then(a.span_id.cmp(&b.span_id))
    });
    results.truncate(req.limit);

    debug!(
        query_id = %log.id,
        terms = terms.len(),
        candidates = candidate_count,
        returned = results.len(),
        "search complete"
    );

    Ok(SearchResponse {
        query_id: log.id,
        results,
    })
}

/// Relevance of a span's `searchable_text` for distinct query `terms`.
///
/// Returns 0.0 when no term occurs.
pub fn score_span(terms: &[String], searchable_text: &str) -> f64 {
    let tokens: Vec<&str> = searchable_text.split(' ').filter(|t| !t.is_empty()).collect();
    let mut score = 0.0;
    for term in terms {
        let mut tf = 0usize;
        let mut first_pos = None;
        for (i, token) in tokens.iter().enumerate() {
            if *token == term.as_str() {
                tf += 1;
                first_pos.get_or_insert(i);
            }
        }
        if let Some(pos) = first_pos {
            score += (1.0 + (tf as f64).ln()) * (1.0 + 1.0 / (1.0 + pos as f64));
        }
    }
    score
}
