//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation to SQL against the schema created by
//! [`migrate`](crate::migrate). A commit runs in one transaction: the
//! context row is compare-and-swapped first, then stale spans and their
//! terms are deleted, retained spans are repositioned, and new spans are
//! inserted together with their `span_terms` rows. Busy or locked errors
//! inside that transaction are reported as write conflicts.
//!
//! [`Store::get_context_with_spans`] reads inside a transaction too; under
//! WAL its two SELECTs see the same snapshot.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::debug;

use docspan_core::models::{Context, ContextWithSpans, Meta, QueryLog, Span};
use docspan_core::store::{ContextWrite, Precondition, SpanCandidate, Store};
use docspan_core::tokenize::query_terms;
use docspan_core::{CoreError, Result};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> CoreError {
    CoreError::Storage(e.to_string())
}

/// Like [`db_err`], but SQLITE_BUSY / SQLITE_LOCKED (and their extended
/// codes) become [`CoreError::Conflict`].
fn commit_err(e: sqlx::Error) -> CoreError {
    let busy = e
        .as_database_error()
        .and_then(|d| d.code())
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, 5 | 6))
        .unwrap_or(false);
    if busy {
        CoreError::Conflict(format!("database busy: {}", e))
    } else {
        db_err(e)
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| CoreError::Storage(format!("timestamp out of range: {}", ms)))
}

fn parse_meta(text: &str) -> Result<Meta> {
    Ok(serde_json::from_str(text)?)
}

fn context_from_row(row: &SqliteRow) -> Result<Context> {
    let meta: String = row.get("meta");
    Ok(Context {
        id: row.get("id"),
        checksum: row.get("checksum"),
        meta: parse_meta(&meta)?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}

fn span_from_row(row: &SqliteRow) -> Result<Span> {
    let meta: String = row.get("meta");
    Ok(Span {
        id: row.get("id"),
        context_id: row.get("context_id"),
        position: row.get("position"),
        content: row.get("content"),
        meta: parse_meta(&meta)?,
        searchable_text: row.get("searchable_text"),
        updated_at: from_millis(row.get("updated_at"))?,
    })
}

fn query_from_row(row: &SqliteRow) -> Result<QueryLog> {
    let feedback: Option<String> = row.get("feedback");
    Ok(QueryLog {
        id: row.get("id"),
        query: row.get("query"),
        feedback: feedback.as_deref().map(parse_meta).transpose()?,
        user_id: row.get("user_id"),
        created_at: from_millis(row.get("created_at"))?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_context(&self, id: &str) -> Result<Option<Context>> {
        let row = sqlx::query("SELECT id, checksum, meta, updated_at FROM contexts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(context_from_row).transpose()
    }

    async fn get_spans(&self, context_id: &str) -> Result<Vec<Span>> {
        let rows = sqlx::query(
            r#"
            SELECT id, context_id, position, content, meta, searchable_text, updated_at
            FROM spans
            WHERE context_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(context_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(span_from_row).collect()
    }

    async fn get_context_with_spans(&self, id: &str) -> Result<Option<ContextWithSpans>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query("SELECT id, checksum, meta, updated_at FROM contexts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let context = match row.as_ref().map(context_from_row).transpose()? {
            Some(context) => context,
            None => {
                tx.rollback().await.map_err(db_err)?;
                return Ok(None);
            }
        };

        let rows = sqlx::query(
            r#"
            SELECT id, context_id, position, content, meta, searchable_text, updated_at
            FROM spans
            WHERE context_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;
        let spans = rows.iter().map(span_from_row).collect::<Result<Vec<_>>>()?;

        tx.commit().await.map_err(db_err)?;
        Ok(Some(ContextWithSpans { context, spans }))
    }

    async fn commit_context(&self, write: &ContextWrite) -> Result<()> {
        let ctx = &write.context;
        let meta = serde_json::to_string(&ctx.meta)?;
        let updated_at = ctx.updated_at.timestamp_millis();

        let mut tx = self.pool.begin().await.map_err(commit_err)?;

        let swapped = match &write.precondition {
            Precondition::Absent => sqlx::query(
                r#"
                INSERT INTO contexts (id, checksum, meta, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&ctx.id)
            .bind(&ctx.checksum)
            .bind(&meta)
            .bind(updated_at)
            .execute(&mut *tx)
            .await
            .map_err(commit_err)?,
            Precondition::Checksum(expected) => sqlx::query(
                r#"
                UPDATE contexts SET checksum = ?, meta = ?, updated_at = ?
                WHERE id = ? AND checksum IS ?
                "#,
            )
            .bind(&ctx.checksum)
            .bind(&meta)
            .bind(updated_at)
            .bind(&ctx.id)
            .bind(expected)
            .execute(&mut *tx)
            .await
            .map_err(commit_err)?,
        };

        if swapped.rows_affected() == 0 {
            return Err(CoreError::Conflict(format!(
                "context {} changed since it was read",
                ctx.id
            )));
        }

        let retained: HashSet<&str> = write
            .spans
            .iter()
            .filter(|p| p.retained)
            .map(|p| p.span.id.as_str())
            .collect();

        let existing: Vec<String> = sqlx::query_scalar("SELECT id FROM spans WHERE context_id = ?")
            .bind(&ctx.id)
            .fetch_all(&mut *tx)
            .await
            .map_err(commit_err)?;

        for stale in existing.iter().filter(|id| !retained.contains(id.as_str())) {
            sqlx::query("DELETE FROM span_terms WHERE span_id = ?")
                .bind(stale)
                .execute(&mut *tx)
                .await
                .map_err(commit_err)?;
            sqlx::query("DELETE FROM spans WHERE id = ?")
                .bind(stale)
                .execute(&mut *tx)
                .await
                .map_err(commit_err)?;
        }

        for planned in &write.spans {
            let span = &planned.span;
            if planned.retained {
                let moved = sqlx::query("UPDATE spans SET position = ? WHERE id = ? AND context_id = ?")
                    .bind(span.position)
                    .bind(&span.id)
                    .bind(&ctx.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(commit_err)?;
                if moved.rows_affected() == 0 {
                    return Err(CoreError::Conflict(format!(
                        "retained span {} no longer exists",
                        span.id
                    )));
                }
                continue;
            }

            sqlx::query(
                r#"
                INSERT INTO spans (id, context_id, position, content, meta, searchable_text, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&span.id)
            .bind(&span.context_id)
            .bind(span.position)
            .bind(&span.content)
            .bind(serde_json::to_string(&span.meta)?)
            .bind(&span.searchable_text)
            .bind(span.updated_at.timestamp_millis())
            .execute(&mut *tx)
            .await
            .map_err(commit_err)?;

            for term in query_terms(&span.searchable_text) {
                sqlx::query("INSERT OR IGNORE INTO span_terms (term, span_id) VALUES (?, ?)")
                    .bind(&term)
                    .bind(&span.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(commit_err)?;
            }
        }

        tx.commit().await.map_err(commit_err)?;
        debug!(context_id = %ctx.id, spans = write.spans.len(), "sqlite commit");
        Ok(())
    }

    async fn matching_spans(&self, terms: &[String]) -> Result<Vec<SpanCandidate>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"
            SELECT s.id, s.context_id, s.position, s.content, s.meta, s.searchable_text,
                   s.updated_at, c.meta AS context_meta
            FROM spans s
            JOIN contexts c ON c.id = s.context_id
            WHERE s.id IN (SELECT span_id FROM span_terms WHERE term IN ("#,
        );
        let mut separated = qb.separated(", ");
        for term in terms {
            separated.push_bind(term.as_str());
        }
        separated.push_unseparated("))");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let context_meta: String = row.get("context_meta");
                Ok(SpanCandidate {
                    span: span_from_row(row)?,
                    context_meta: parse_meta(&context_meta)?,
                })
            })
            .collect()
    }

    async fn insert_query(&self, query: &QueryLog) -> Result<()> {
        let feedback = query
            .feedback
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO queries (id, query, feedback, user_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&query.id)
        .bind(&query.query)
        .bind(feedback)
        .bind(&query.user_id)
        .bind(query.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn recent_queries(&self, limit: usize) -> Result<Vec<QueryLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, query, feedback, user_id, created_at
            FROM queries
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(query_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate;
    use docspan_core::context_store::{ContextStore, UpsertOptions};
    use docspan_core::models::Outcome;
    use docspan_core::search::{search, SearchRequest};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const GUIDE: &str = "Intro text about the guide.\n\n## Tables\nCreate tables with SQL.\n\n### Clone tables\nDuplicate tables like a spreadsheet.\n\n## Backups\nDaily backups are included.\n";

    async fn open(tmp: &TempDir) -> ContextStore<SqliteStore> {
        let pool = db::connect_path(&tmp.path().join("docspan.sqlite"))
            .await
            .unwrap();
        migrate::migrate_pool(&pool).await.unwrap();
        ContextStore::new(
            SqliteStore::new(pool),
            UpsertOptions {
                max_heading_depth: 3,
                max_attempts: 5,
                retry_backoff: Duration::from_millis(5),
            },
        )
    }

    #[tokio::test]
    async fn test_created_unchanged_updated() {
        let tmp = TempDir::new().unwrap();
        let cs = open(&tmp).await;

        let (created, outcome) = cs.upsert("docs/guide.md", GUIDE, json!({"test": "test"})).await.unwrap();
        assert_eq!(outcome, Outcome::Created);

        let (unchanged, outcome) = cs.upsert("docs/guide.md", GUIDE, json!({"test": "test"})).await.unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert_eq!(unchanged.updated_at, created.updated_at);
        assert_eq!(unchanged.meta, json!({"test": "test"}));

        let changed = GUIDE.replace("Daily backups", "Hourly backups");
        let (_, outcome) = cs.upsert("docs/guide.md", &changed, json!({"test": "test"})).await.unwrap();
        assert_eq!(outcome, Outcome::Updated);

        let stored = cs.get("docs/guide.md").await.unwrap();
        let contents: Vec<String> = stored.spans.iter().map(|s| s.content.clone()).collect();
        assert_eq!(contents, docspan_core::chunk::chunk(&changed, 3).unwrap());
    }

    #[tokio::test]
    async fn test_update_keeps_unchanged_span_rows() {
        let tmp = TempDir::new().unwrap();
        let cs = open(&tmp).await;
        cs.upsert("a", GUIDE, json!({})).await.unwrap();
        let before = cs.get("a").await.unwrap().spans;

        let changed = GUIDE.replace("Daily backups", "Hourly backups");
        cs.upsert("a", &changed, json!({})).await.unwrap();
        let after = cs.get("a").await.unwrap().spans;

        assert_eq!(before.len(), after.len());
        for i in 0..3 {
            assert_eq!(before[i], after[i]);
        }
        assert_ne!(before[3].id, after[3].id);
    }

    #[tokio::test]
    async fn test_search_matches_terms_and_logs() {
        let tmp = TempDir::new().unwrap();
        let cs = open(&tmp).await;
        cs.upsert("a", GUIDE, json!({"title": "Guide"})).await.unwrap();

        let req = SearchRequest {
            query: "Clone TABLES?",
            user_id: Some("u1"),
            limit: 10,
        };
        let response = search(cs.store(), &req).await.unwrap();
        assert_eq!(response.results.len(), 2);
        assert!(response.results[0].content.starts_with("### Clone tables"));
        assert_eq!(response.results[0].context_meta, json!({"title": "Guide"}));
        assert!(response.results.iter().all(|r| r.query_id == response.query_id));

        let logged = cs.store().recent_queries(5).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].id, response.query_id);
        assert_eq!(logged[0].user_id.as_deref(), Some("u1"));
        assert!(logged[0].feedback.is_none());
    }

    #[tokio::test]
    async fn test_stale_terms_removed_on_update() {
        let tmp = TempDir::new().unwrap();
        let cs = open(&tmp).await;
        cs.upsert("a", GUIDE, json!({})).await.unwrap();
        cs.upsert("a", "## Something else\nEntirely.\n", json!({}))
            .await
            .unwrap();

        let hits = cs
            .store()
            .matching_spans(&["backups".to_string()])
            .await
            .unwrap();
        assert!(hits.is_empty());
        let orphans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM span_terms WHERE span_id NOT IN (SELECT id FROM spans)",
        )
        .fetch_one(cs.store().pool())
        .await
        .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_stale_precondition_conflicts_without_writes() {
        let tmp = TempDir::new().unwrap();
        let cs = open(&tmp).await;
        let (ctx, _) = cs.upsert("a", GUIDE, json!({})).await.unwrap();

        let write = ContextWrite {
            context: Context {
                checksum: Some("other".to_string()),
                ..ctx.clone()
            },
            precondition: Precondition::Checksum(Some("not-the-stored-one".to_string())),
            spans: Vec::new(),
        };
        let err = cs.store().commit_context(&write).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(cs.get("a").await.unwrap().spans.len(), 4);
        assert_eq!(
            cs.store().get_context("a").await.unwrap().unwrap().checksum,
            ctx.checksum
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_get_pairs_checksum_with_its_spans_under_writes() {
        let tmp = TempDir::new().unwrap();
        let cs = Arc::new(open(&tmp).await);
        let other = "# Replaced\nOne span only.\n";
        cs.upsert("a", GUIDE, json!({})).await.unwrap();

        let writer = {
            let cs = Arc::clone(&cs);
            tokio::spawn(async move {
                for i in 0..40 {
                    let content = if i % 2 == 0 { other } else { GUIDE };
                    cs.upsert("a", content, json!({})).await.unwrap();
                }
            })
        };

        let guide_sum = docspan_core::checksum::fingerprint(GUIDE);
        let mut reads = 0;
        while !writer.is_finished() || reads == 0 {
            let got = cs.get("a").await.unwrap();
            let content = if got.context.checksum.as_deref() == Some(guide_sum.as_str()) {
                GUIDE
            } else {
                other
            };
            let spans: Vec<&str> = got.spans.iter().map(|s| s.content.as_str()).collect();
            assert_eq!(spans, docspan_core::chunk::chunk(content, 3).unwrap());
            reads += 1;
        }
        writer.await.unwrap();
        assert!(cs.store().get_context_with_spans("missing").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_updates_with_backoff_all_commit() {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("docspan.sqlite"))
            .await
            .unwrap();
        migrate::migrate_pool(&pool).await.unwrap();
        let cs = Arc::new(ContextStore::new(
            SqliteStore::new(pool),
            UpsertOptions {
                max_heading_depth: 3,
                max_attempts: 10,
                retry_backoff: Duration::from_millis(2),
            },
        ));
        cs.upsert("shared", GUIDE, json!({})).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let cs = Arc::clone(&cs);
            handles.push(tokio::spawn(async move {
                let content = format!("# Writer {}\nBody {}.\n", i, i);
                cs.upsert("shared", &content, json!({})).await.map(|(_, o)| o)
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Outcome::Updated);
        }

        let stored = cs.get("shared").await.unwrap();
        let winner = (0..8)
            .map(|i| format!("# Writer {}\nBody {}.\n", i, i))
            .find(|c| stored.context.checksum == Some(docspan_core::checksum::fingerprint(c)))
            .expect("checksum of one writer's content");
        let spans: Vec<&str> = stored.spans.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(spans, docspan_core::chunk::chunk(&winner, 3).unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_race() {
        let tmp = TempDir::new().unwrap();
        let cs = Arc::new(open(&tmp).await);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cs = Arc::clone(&cs);
            handles.push(tokio::spawn(async move {
                cs.upsert("race", GUIDE, json!({})).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            let (_, outcome) = handle.await.unwrap().unwrap();
            if outcome == Outcome::Created {
                created += 1;
            } else {
                assert_eq!(outcome, Outcome::Unchanged);
            }
        }
        assert_eq!(created, 1);

        let contexts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contexts")
            .fetch_one(cs.store().pool())
            .await
            .unwrap();
        assert_eq!(contexts, 1);
        assert_eq!(cs.get("race").await.unwrap().spans.len(), 4);
    }
}
