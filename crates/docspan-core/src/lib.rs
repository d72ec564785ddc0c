//! # docspan core
//!
//! Storage-agnostic logic for docspan: data models, the heading-boundary
//! chunker, the checksum engine, the shared tokenizer, the [`store::Store`]
//! abstraction, the checksum-gated upsert protocol, and the search engine.
//!
//! This crate contains no sqlx or filesystem I/O; tokio is used only for
//! the timer between upsert retries. Persistence adapters implement
//! [`store::Store`]; [`store::memory::InMemoryStore`] ships here for tests.

pub mod checksum;
pub mod chunk;
pub mod context_store;
pub mod error;
pub mod models;
pub mod search;
pub mod store;
pub mod tokenize;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use error::{CoreError, Result};
pub use models::{Context, Meta, Outcome, QueryLog, RankedResult, Span};
