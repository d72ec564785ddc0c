//! Checksum-gated upsert protocol.
//!
//! [`ContextStore`] owns every mutation of contexts and spans. Re-ingesting
//! identical content is a zero-write, zero-recompute operation: the
//! fingerprint of the new content is compared with the stored checksum and,
//! when equal, nothing is chunked and nothing is written.
//!
//! # Protocol
//!
//! 1. Fingerprint the content.
//! 2. Read the stored context.
//! 3. Same checksum: return [`Outcome::Unchanged`] with the stored row.
//! 4. Otherwise chunk once, diff the chunks against the stored spans, and
//!    commit the context row plus the complete span set through
//!    [`Store::commit_context`] with a precondition naming what step 2 saw.
//! 5. A [`CoreError::Conflict`] means another writer committed first:
//!    wait [`retry_delay`] and go back to step 2. After `max_attempts`
//!    conflicts the call fails with [`CoreError::Unavailable`].
//!
//! Span diffing reuses a stored span (id, derived index, `updated_at`) when
//! a new chunk has identical content and meta; all other chunks become new
//! spans and unmatched stored spans are deleted.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::checksum::{decode_utf8, fingerprint};
use crate::chunk::chunk;
use crate::error::{CoreError, Result};
use crate::models::{
    empty_meta, now_millis, Context, ContextWithSpans, Meta, Outcome, Span, SpanInput,
};
use crate::store::{ContextWrite, PlannedSpan, Precondition, Store};
use crate::tokenize::searchable_text;

/// Tuning for the upsert protocol.
#[derive(Debug, Clone)]
pub struct UpsertOptions {
    /// Deepest heading level that starts a new span.
    pub max_heading_depth: usize,
    /// Commit attempts before giving up with `Unavailable`.
    pub max_attempts: usize,
    /// Base wait after the first conflict; doubles with each further one.
    pub retry_backoff: Duration,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            max_heading_depth: 3,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(10),
        }
    }
}

/// Wait before retrying after the `attempt`-th conflict (1-based).
///
/// `base * 2^(attempt-1)` plus a uniform jitter of up to the same amount,
/// so concurrent writers that collided once spread out on the next try.
pub fn retry_delay(base: Duration, attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(10) as u32;
    let step = base.saturating_mul(1 << shift);
    let step_micros = step.as_micros().min(u64::MAX as u128) as u64;
    if step_micros == 0 {
        return step;
    }
    let jitter = rand::thread_rng().gen_range(0..=step_micros);
    step + Duration::from_micros(jitter)
}

/// The only writer of contexts and spans.
pub struct ContextStore<S> {
    store: S,
    options: UpsertOptions,
}

impl<S: Store> ContextStore<S> {
    pub fn new(store: S, options: UpsertOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &UpsertOptions {
        &self.options
    }

    /// Ingest `content` for context `id`, chunking it at heading boundaries.
    pub async fn upsert(&self, id: &str, content: &str, meta: Meta) -> Result<(Context, Outcome)> {
        self.upsert_inner(id, content, meta, None).await
    }

    /// Ingest raw bytes, rejecting non-UTF-8 content before touching the store.
    pub async fn upsert_bytes(
        &self,
        id: &str,
        content: &[u8],
        meta: Meta,
    ) -> Result<(Context, Outcome)> {
        let text = decode_utf8(content)?;
        self.upsert_inner(id, text, meta, None).await
    }

    /// Ingest `content` with a caller-chunked span set.
    ///
    /// Change detection still uses the fingerprint of `content`; `spans`
    /// replaces the chunker output and carries per-span meta.
    pub async fn upsert_with_spans(
        &self,
        id: &str,
        content: &str,
        meta: Meta,
        spans: Vec<SpanInput>,
    ) -> Result<(Context, Outcome)> {
        self.upsert_inner(id, content, meta, Some(spans)).await
    }

    /// Fetch a context and its spans in stored order.
    ///
    /// Both come from one store snapshot, so a concurrent update never
    /// pairs the old checksum with the new spans.
    pub async fn get(&self, id: &str) -> Result<ContextWithSpans> {
        self.store
            .get_context_with_spans(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("context not found: {}", id)))
    }

    async fn upsert_inner(
        &self,
        id: &str,
        content: &str,
        meta: Meta,
        mut inputs: Option<Vec<SpanInput>>,
    ) -> Result<(Context, Outcome)> {
        if id.trim().is_empty() {
            return Err(CoreError::InvalidInput("context id must not be empty".to_string()));
        }
        if self.options.max_heading_depth < 1 {
            return Err(CoreError::InvalidInput(
                "max_heading_depth must be >= 1".to_string(),
            ));
        }

        let checksum = fingerprint(content);

        let max_attempts = self.options.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let existing = self.store.get_context(id).await?;

            let precondition = match &existing {
                Some(ctx) if ctx.checksum.as_deref() == Some(checksum.as_str()) => {
                    info!(context_id = id, "unchanged");
                    return Ok((ctx.clone(), Outcome::Unchanged));
                }
                Some(ctx) => Precondition::Checksum(ctx.checksum.clone()),
                None => Precondition::Absent,
            };

            let chunks = match inputs.take() {
                Some(chunks) => chunks,
                None => chunk(content, self.options.max_heading_depth)?
                    .into_iter()
                    .map(SpanInput::new)
                    .collect(),
            };

            let previous = match existing {
                Some(_) => self.store.get_spans(id).await?,
                None => Vec::new(),
            };

            let now = now_millis();
            let write = ContextWrite {
                context: Context {
                    id: id.to_string(),
                    checksum: Some(checksum.clone()),
                    meta: meta.clone(),
                    updated_at: now,
                },
                spans: plan_spans(id, &chunks, &previous, now),
                precondition,
            };

            match self.store.commit_context(&write).await {
                Ok(()) => {
                    let outcome = match write.precondition {
                        Precondition::Absent => Outcome::Created,
                        Precondition::Checksum(_) => Outcome::Updated,
                    };
                    let fresh = write.spans.iter().filter(|p| !p.retained).count();
                    info!(
                        context_id = id,
                        %outcome,
                        spans = write.spans.len(),
                        fresh_spans = fresh,
                        "committed"
                    );
                    return Ok((write.context, outcome));
                }
                Err(e) if e.is_conflict() => {
                    if attempt == max_attempts {
                        warn!(context_id = id, attempt, error = %e, "upsert conflict, giving up");
                        break;
                    }
                    let delay = retry_delay(self.options.retry_backoff, attempt);
                    warn!(
                        context_id = id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "upsert conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    inputs = Some(chunks);
                }
                Err(e) => return Err(e),
            }
        }

        Err(CoreError::Unavailable(format!(
            "upsert of {} conflicted {} times",
            id, max_attempts
        )))
    }
}

/// Build the new span set for `context_id`, reusing stored spans whose
/// content and meta are unchanged.
pub fn plan_spans(
    context_id: &str,
    chunks: &[SpanInput],
    previous: &[Span],
    now: DateTime<Utc>,
) -> Vec<PlannedSpan> {
    let mut unused: Vec<Option<&Span>> = previous.iter().map(Some).collect();

    chunks
        .iter()
        .enumerate()
        .map(|(i, input)| {
            let position = i as i64;
            let reused = unused
                .iter_mut()
                .find(|slot| {
                    matches!(slot, Some(s) if s.content == input.content && s.meta == input.meta)
                })
                .and_then(|slot| slot.take());

            match reused {
                Some(old) => {
                    debug!(span_id = %old.id, position, "span retained");
                    PlannedSpan {
                        span: Span {
                            position,
                            ..old.clone()
                        },
                        retained: true,
                    }
                }
                None => PlannedSpan {
                    span: Span {
                        id: Uuid::new_v4().to_string(),
                        context_id: context_id.to_string(),
                        position,
                        content: input.content.clone(),
                        meta: if input.meta.is_null() {
                            empty_meta()
                        } else {
                            input.meta.clone()
                        },
                        searchable_text: searchable_text(&input.content),
                        updated_at: now,
                    },
                    retained: false,
                },
            }
        })
        .collect()
}
