//! Core data models used throughout docspan.
//!
//! These types represent the contexts, spans, logged queries, and ranked
//! results that flow through the ingestion and retrieval pipeline.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Opaque caller-owned metadata. Stored and returned verbatim, never inspected.
pub type Meta = serde_json::Value;

/// A logical document/source unit tracked for change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Caller-supplied stable identifier (source path or URL).
    pub id: String,
    /// Fingerprint of the last ingested raw content.
    pub checksum: Option<String>,
    pub meta: Meta,
    /// Last successful create-or-change. Untouched by no-op ingests.
    pub updated_at: DateTime<Utc>,
}

/// One heading-bounded chunk of a context's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub id: String,
    pub context_id: String,
    /// 0-based document order within the owning context.
    pub position: i64,
    pub content: String,
    pub meta: Meta,
    /// Normalized token sequence derived from `content`.
    pub searchable_text: String,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied pre-chunked span for [`upsert_with_spans`](crate::context_store::ContextStore::upsert_with_spans).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanInput {
    pub content: String,
    #[serde(default = "empty_meta")]
    pub meta: Meta,
}

impl SpanInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            meta: empty_meta(),
        }
    }
}

/// A logged search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryLog {
    pub id: String,
    pub query: String,
    /// Populated after the fact by an external feedback process.
    pub feedback: Option<Meta>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a checksum-gated upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The context did not exist; it and its spans were inserted.
    Created,
    /// The stored checksum matched; nothing was written.
    Unchanged,
    /// The checksum differed; the context and its span set were replaced.
    Updated,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Unchanged => "unchanged",
            Outcome::Updated => "updated",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A context together with its spans in stored order.
#[derive(Debug, Clone, Serialize)]
pub struct ContextWithSpans {
    #[serde(flatten)]
    pub context: Context,
    pub spans: Vec<Span>,
}

/// One row of a search response.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub span_id: String,
    pub content: String,
    pub span_meta: Meta,
    pub context_id: String,
    pub context_meta: Meta,
    /// Id of the [`QueryLog`] row written for the search that produced this result.
    pub query_id: String,
    pub score: f64,
    pub updated_at: DateTime<Utc>,
}

/// Current time at millisecond precision, the resolution stores persist.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// The default metadata value for spans and contexts without caller meta.
pub fn empty_meta() -> Meta {
    serde_json::json!({})
}
