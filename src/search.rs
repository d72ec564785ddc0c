//! CLI frontends for search and the query log.
//!
//! Ranking lives in [`docspan_core::search`]; this module opens the
//! database, delegates, and prints.

use anyhow::Result;

use docspan_core::search::{search, SearchRequest, SearchResponse};
use docspan_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Longest excerpt printed per result, in characters.
const EXCERPT_CHARS: usize = 160;

/// Search the configured database and return structured results.
pub async fn search_spans(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    user_id: Option<&str>,
) -> Result<SearchResponse> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let req = SearchRequest {
        query,
        user_id,
        limit: limit.unwrap_or(config.retrieval.final_limit),
    };
    let response = search(&store, &req).await;
    pool.close().await;
    Ok(response?)
}

pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    user_id: Option<&str>,
) -> Result<()> {
    let response = search_spans(config, query, limit, user_id).await?;

    if response.results.is_empty() {
        println!("No results.");
        println!("query: {}", response.query_id);
        return Ok(());
    }

    for (i, result) in response.results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {}",
            i + 1,
            result.score,
            result.context_id
        );
        println!("    updated: {}", result.updated_at.format("%Y-%m-%d"));
        println!("    excerpt: \"{}\"", excerpt(&result.content));
        println!("    span: {}", result.span_id);
        println!();
    }
    println!("query: {}", response.query_id);

    Ok(())
}

/// Print the most recent logged queries, newest first.
pub async fn run_queries(config: &Config, limit: usize) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let queries = store.recent_queries(limit).await;
    pool.close().await;

    let queries = queries?;
    if queries.is_empty() {
        println!("No queries logged.");
        return Ok(());
    }

    for q in &queries {
        println!(
            "{}  {}  {}  \"{}\"",
            q.created_at.format("%Y-%m-%dT%H:%M:%SZ"),
            q.id,
            q.user_id.as_deref().unwrap_or("-"),
            q.query
        );
    }
    Ok(())
}

fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_flattens_whitespace() {
        assert_eq!(excerpt("## Title\n\nBody  text\n"), "## Title Body text");
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let long = "é".repeat(200);
        let out = excerpt(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), EXCERPT_CHARS + 3);
    }
}
