//! Context retrieval by id.
//!
//! Used by the `docspan get` CLI command. `POST /tools/get` calls
//! [`ContextStore::get`] directly on the server's shared store.

use anyhow::Result;

use docspan_core::context_store::ContextStore;
use docspan_core::models::ContextWithSpans;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Fetch a context and its spans from the configured database.
pub async fn get_context(config: &Config, id: &str) -> Result<ContextWithSpans> {
    let pool = db::connect(config).await?;
    let store = ContextStore::new(SqliteStore::new(pool.clone()), config.upsert_options());
    let found = store.get(id).await;
    pool.close().await;
    Ok(found?)
}

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let found = get_context(config, id).await?;
    let ctx = &found.context;

    println!("--- Context ---");
    println!("id:         {}", ctx.id);
    println!("checksum:   {}", ctx.checksum.as_deref().unwrap_or("(none)"));
    println!("updated_at: {}", ctx.updated_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"));
    println!("meta:       {}", ctx.meta);
    println!();

    println!("--- Spans ({}) ---", found.spans.len());
    for span in &found.spans {
        println!("[span {}] {}", span.position, span.id);
        print!("{}", span.content);
        if !span.content.ends_with('\n') {
            println!();
        }
        println!();
    }

    Ok(())
}
