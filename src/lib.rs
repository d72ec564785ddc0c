//! # docspan
//!
//! A change-aware span index for documentation.
//!
//! docspan splits documents into heading-bounded spans, stores them in
//! SQLite behind a checksum-gated upsert (re-ingesting unchanged content
//! writes nothing), and serves ranked term search over the spans with
//! every query logged for later feedback analysis.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌────────────┐
//! │   Ingest    │──▶│  ContextStore    │──▶│  SQLite    │
//! │ walk + glob │   │ checksum + chunk │   │ span_terms │
//! └─────────────┘   └──────────────────┘   └─────┬──────┘
//!                                                │
//!                         ┌──────────────────────┤
//!                         ▼                      ▼
//!                    ┌──────────┐          ┌──────────┐
//!                    │   CLI    │          │   HTTP   │
//!                    │(docspan) │          │ /tools/* │
//!                    └──────────┘          └──────────┘
//! ```
//!
//! The storage-agnostic pieces (chunker, checksum, upsert protocol, search)
//! live in the `docspan-core` crate; this crate adds persistence and the
//! outer surfaces.
//!
//! ## Quick Start
//!
//! ```bash
//! docspan init                      # create database
//! docspan ingest ./docs             # upsert every markdown file
//! docspan search "clone tables"
//! docspan serve                     # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `Store` implementation |
//! | [`ingest`] | Filesystem ingestion and single-file upsert |
//! | [`inspect`] | Offline chunk and fingerprint commands |
//! | [`search`] | Search and query-log commands |
//! | [`get`] | Context retrieval |
//! | [`server`] | JSON HTTP server |

pub mod config;
pub mod db;
pub mod get;
pub mod ingest;
pub mod inspect;
pub mod migrate;
pub mod search;
pub mod server;
pub mod sqlite_store;
