//! Database schema migrations (idempotent).
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `contexts` | one row per ingested source unit, with its checksum |
//! | `spans` | heading-bounded chunks, ordered by `position` |
//! | `span_terms` | term → span inverted index derived from `searchable_text` |
//! | `queries` | append-only search log |
//!
//! Timestamps are stored as Unix milliseconds; meta columns hold JSON text.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an open pool.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contexts (
            id TEXT PRIMARY KEY,
            checksum TEXT,
            meta TEXT NOT NULL DEFAULT '{}',
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS spans (
            id TEXT PRIMARY KEY,
            context_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            content TEXT NOT NULL,
            meta TEXT NOT NULL DEFAULT '{}',
            searchable_text TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (context_id) REFERENCES contexts(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS span_terms (
            term TEXT NOT NULL,
            span_id TEXT NOT NULL,
            PRIMARY KEY (term, span_id),
            FOREIGN KEY (span_id) REFERENCES spans(id) ON DELETE CASCADE
        ) WITHOUT ROWID
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queries (
            id TEXT PRIMARY KEY,
            query TEXT NOT NULL,
            feedback TEXT,
            user_id TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_spans_context ON spans(context_id, position)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_span_terms_span ON span_terms(span_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_queries_created_at ON queries(created_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
