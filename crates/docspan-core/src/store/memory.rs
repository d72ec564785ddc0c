//! In-memory [`Store`] implementation for tests and single-process use.
//!
//! Contexts and spans live behind a single `RwLock` so a commit replaces
//! a context row and its span set in one critical section. Query logs sit
//! behind their own lock; search never holds both.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{CoreError, Result};
use crate::models::{Context, ContextWithSpans, QueryLog, Span};

use super::{ContextWrite, Precondition, SpanCandidate, Store};

#[derive(Default)]
struct Tables {
    contexts: HashMap<String, Context>,
    /// Spans per context id, kept in position order.
    spans: HashMap<String, Vec<Span>>,
}

/// In-memory store for tests and single-process use.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    queries: RwLock<Vec<QueryLog>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            queries: RwLock::new(Vec::new()),
        }
    }

    fn read_tables(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| poisoned())
    }

    fn write_tables(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| poisoned())
    }

    /// Number of stored query log rows.
    pub fn query_count(&self) -> usize {
        self.queries.read().map(|q| q.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> CoreError {
    CoreError::Storage("in-memory store lock poisoned".to_string())
}

fn check_precondition(current: Option<&Context>, expected: &Precondition) -> Result<()> {
    let holds = match (current, expected) {
        (None, Precondition::Absent) => true,
        (Some(ctx), Precondition::Checksum(checksum)) => &ctx.checksum == checksum,
        _ => false,
    };
    if holds {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "context changed concurrently (expected {:?})",
            expected
        )))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_context(&self, id: &str) -> Result<Option<Context>> {
        Ok(self.read_tables()?.contexts.get(id).cloned())
    }

    async fn get_spans(&self, context_id: &str) -> Result<Vec<Span>> {
        Ok(self
            .read_tables()?
            .spans
            .get(context_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_context_with_spans(&self, id: &str) -> Result<Option<ContextWithSpans>> {
        let tables = self.read_tables()?;
        Ok(tables.contexts.get(id).map(|context| ContextWithSpans {
            context: context.clone(),
            spans: tables.spans.get(id).cloned().unwrap_or_default(),
        }))
    }

    async fn commit_context(&self, write: &ContextWrite) -> Result<()> {
        let mut tables = self.write_tables()?;
        let id = write.context.id.as_str();
        check_precondition(tables.contexts.get(id), &write.precondition)?;

        let spans: Vec<Span> = write.spans.iter().map(|p| p.span.clone()).collect();
        tables.contexts.insert(id.to_string(), write.context.clone());
        tables.spans.insert(id.to_string(), spans);
        Ok(())
    }

    async fn matching_spans(&self, terms: &[String]) -> Result<Vec<SpanCandidate>> {
        let tables = self.read_tables()?;
        let mut candidates = Vec::new();
        for (context_id, spans) in &tables.spans {
            let context_meta = match tables.contexts.get(context_id) {
                Some(ctx) => ctx.meta.clone(),
                None => continue,
            };
            for span in spans {
                let matched = span
                    .searchable_text
                    .split(' ')
                    .any(|token| terms.iter().any(|t| t == token));
                if matched {
                    candidates.push(SpanCandidate {
                        span: span.clone(),
                        context_meta: context_meta.clone(),
                    });
                }
            }
        }
        Ok(candidates)
    }

    async fn insert_query(&self, query: &QueryLog) -> Result<()> {
        self.queries
            .write()
            .map_err(|_| poisoned())?
            .push(query.clone());
        Ok(())
    }

    async fn recent_queries(&self, limit: usize) -> Result<Vec<QueryLog>> {
        let queries = self.queries.read().map_err(|_| poisoned())?;
        Ok(queries.iter().rev().take(limit).cloned().collect())
    }
}
