//! Filesystem ingestion.
//!
//! Walks a documentation tree, selects files with the configured include
//! and exclude globs, and upserts each one as a context. The context id is
//! the file's path relative to the root (forward slashes), prefixed with
//! `ingest.id_prefix` when one is set. Files whose checksum has not changed
//! since the last run come back `unchanged` and cost no writes.
//!
//! A dry run chunks and fingerprints the same files without opening the
//! database, and can print them as a JSON batch of
//! `{ "id", "checksum", "spans": [{ "content" }] }` documents for other
//! loaders to consume.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use docspan_core::checksum::{decode_utf8, fingerprint};
use docspan_core::chunk::chunk;
use docspan_core::context_store::ContextStore;
use docspan_core::{CoreError, Outcome};

use crate::config::{Config, IngestConfig};
use crate::db;
use crate::sqlite_store::SqliteStore;

/// One file selected for ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the ingest root, with `/` separators.
    pub relative: String,
    pub context_id: String,
}

/// Per-outcome counts for one ingest run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Files that were not valid UTF-8.
    pub skipped: usize,
}

impl IngestStats {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// A file as it would be ingested: context id, checksum, and spans.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub checksum: String,
    pub spans: Vec<DocumentSpan>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentSpan {
    pub content: String,
}

/// How `run_ingest` reports its work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Upsert into the database.
    Write,
    /// Chunk and fingerprint only; print a summary per file.
    DryRun,
    /// Chunk and fingerprint only; print the documents as JSON.
    DryRunJson,
}

pub async fn run_ingest(config: &Config, dir: Option<&Path>, mode: IngestMode) -> Result<()> {
    let root = dir.unwrap_or(&config.ingest.root);
    let files = scan_files(root, &config.ingest)?;

    if mode != IngestMode::Write {
        let (documents, skipped) = build_documents(&files, config.chunking.max_heading_depth)?;
        if mode == IngestMode::DryRunJson {
            println!("{}", serde_json::to_string_pretty(&documents)?);
            return Ok(());
        }
        println!("ingest {} (dry run)", root.display());
        for doc in &documents {
            println!("  {}  {} ({} spans)", doc.checksum, doc.id, doc.spans.len());
        }
        println!("  files: {}", files.len());
        if skipped > 0 {
            println!("  skipped: {}", skipped);
        }
        println!("ok");
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let store = ContextStore::new(SqliteStore::new(pool.clone()), config.upsert_options());
    let stats = ingest_files(&store, &files).await?;

    println!("ingest {}", root.display());
    println!("  files: {}", files.len());
    println!("  created: {}", stats.created);
    println!("  updated: {}", stats.updated);
    println!("  unchanged: {}", stats.unchanged);
    if stats.skipped > 0 {
        println!("  skipped: {}", stats.skipped);
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Upsert a single file as context `id` and print the outcome.
pub async fn run_upsert(config: &Config, id: &str, file: &Path, meta: Option<&str>) -> Result<()> {
    let meta = match meta {
        Some(raw) => serde_json::from_str(raw).context("--meta must be valid JSON")?,
        None => json!({}),
    };
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let pool = db::connect(config).await?;
    let store = ContextStore::new(SqliteStore::new(pool.clone()), config.upsert_options());
    let result = store.upsert_bytes(id, &bytes, meta).await;
    pool.close().await;

    let (context, outcome) = result?;
    println!("{}", outcome);
    println!("  id: {}", context.id);
    println!("  checksum: {}", context.checksum.as_deref().unwrap_or(""));
    Ok(())
}

/// Upsert every file in order, tallying outcomes.
pub async fn ingest_files(store: &ContextStore<SqliteStore>, files: &[SourceFile]) -> Result<IngestStats> {
    let mut stats = IngestStats::default();

    for file in files {
        let bytes = std::fs::read(&file.path)?;
        let meta = json!({ "path": file.relative });
        match store.upsert_bytes(&file.context_id, &bytes, meta).await {
            Ok((_, outcome)) => {
                info!(id = %file.context_id, outcome = %outcome, "ingested");
                stats.record(outcome);
            }
            Err(CoreError::InvalidInput(msg)) => {
                warn!(path = %file.path.display(), "skipping file: {}", msg);
                stats.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(stats)
}

/// Chunk and fingerprint every file without touching a store.
///
/// Returns the documents in file order and the number of files skipped
/// for not being valid UTF-8.
pub fn build_documents(files: &[SourceFile], max_heading_depth: usize) -> Result<(Vec<Document>, usize)> {
    let mut documents = Vec::with_capacity(files.len());
    let mut skipped = 0;

    for file in files {
        let bytes = std::fs::read(&file.path)
            .with_context(|| format!("Failed to read {}", file.path.display()))?;
        let text = match decode_utf8(&bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %file.path.display(), "skipping file: {}", e);
                skipped += 1;
                continue;
            }
        };
        let spans = chunk(text, max_heading_depth)?
            .into_iter()
            .map(|content| DocumentSpan { content })
            .collect();
        documents.push(Document {
            id: file.context_id.clone(),
            checksum: fingerprint(text),
            spans,
        });
    }

    Ok((documents, skipped))
}

/// Select files under `root` matching the include globs and none of the
/// exclude globs, sorted by context id.
pub fn scan_files(root: &Path, ingest: &IngestConfig) -> Result<Vec<SourceFile>> {
    if !root.exists() {
        bail!("Ingest root does not exist: {}", root.display());
    }

    let include_set = build_globset(&ingest.include_globs)?;

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(ingest.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(ingest.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(SourceFile {
            path: path.to_path_buf(),
            context_id: context_id(&ingest.id_prefix, &rel_str),
            relative: rel_str,
        });
    }

    files.sort_by(|a, b| a.context_id.cmp(&b.context_id));
    Ok(files)
}

/// `prefix/relative`, or just `relative` when no prefix is configured.
pub fn context_id(prefix: &str, relative: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", prefix, relative)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
