//! Storage abstraction for docspan.
//!
//! The [`Store`] trait defines every storage operation needed by the
//! upsert protocol and the search engine, enabling pluggable backends
//! (SQLite in the application crate, [`memory::InMemoryStore`] here).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Context, ContextWithSpans, Meta, QueryLog, Span};

/// What the committing writer last observed for a context id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// No context row existed.
    Absent,
    /// A context row existed with this checksum.
    Checksum(Option<String>),
}

/// A span in a planned span set.
#[derive(Debug, Clone)]
pub struct PlannedSpan {
    pub span: Span,
    /// The span already exists with identical content and meta; only its
    /// position may need updating. Its derived index is left untouched.
    pub retained: bool,
}

/// One atomic change to a context and its full span set.
#[derive(Debug, Clone)]
pub struct ContextWrite {
    pub context: Context,
    pub precondition: Precondition,
    /// The complete new span set in document order. Stored spans of the
    /// context that are not listed here are deleted.
    pub spans: Vec<PlannedSpan>,
}

/// A span matching at least one query term, with its parent's meta.
#[derive(Debug, Clone)]
pub struct SpanCandidate {
    pub span: Span,
    pub context_meta: Meta,
}

/// Abstract storage backend for docspan.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_context`](Store::get_context) | Read a context row |
/// | [`get_spans`](Store::get_spans) | Read a context's spans in stored order |
/// | [`get_context_with_spans`](Store::get_context_with_spans) | Read both from one snapshot |
/// | [`commit_context`](Store::commit_context) | Compare-and-swap a context and its span set |
/// | [`matching_spans`](Store::matching_spans) | Spans sharing a term with a query |
/// | [`insert_query`](Store::insert_query) | Append a query log row |
/// | [`recent_queries`](Store::recent_queries) | Newest query log rows |
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_context(&self, id: &str) -> Result<Option<Context>>;

    /// Spans of a context ordered by position.
    async fn get_spans(&self, context_id: &str) -> Result<Vec<Span>>;

    /// A context and its spans read from the same committed state, so the
    /// spans always belong to the returned checksum.
    async fn get_context_with_spans(&self, id: &str) -> Result<Option<ContextWithSpans>>;

    /// Apply `write` atomically if its precondition still holds.
    ///
    /// Returns [`CoreError::Conflict`](crate::error::CoreError::Conflict)
    /// when another writer changed the context first. On any error the
    /// context and its spans are left exactly as they were.
    async fn commit_context(&self, write: &ContextWrite) -> Result<()>;

    /// Every span whose `searchable_text` contains at least one of `terms`.
    async fn matching_spans(&self, terms: &[String]) -> Result<Vec<SpanCandidate>>;

    async fn insert_query(&self, query: &QueryLog) -> Result<()>;

    /// Logged queries, newest first.
    async fn recent_queries(&self, limit: usize) -> Result<Vec<QueryLog>>;
}
