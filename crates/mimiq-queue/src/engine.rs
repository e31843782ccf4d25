//! Queue engine: lifecycle, send/receive/delete, visibility enforcement.
//!
//! Claiming is the invariant that matters here. A message may be handed to
//! at most one consumer at a time, so every claim is a single conditional
//! `UPDATE ... RETURNING` whose WHERE clause re-checks the "currently
//! visible" predicate. Two concurrent receives can select the same
//! candidate row, but only one conditional update succeeds; the loser just
//! skips the row.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use mimiq_core::batch::{BatchResults, apply_each};
use mimiq_core::clock::from_millis;
use mimiq_core::{Clock, MimiqError, Result};
use mimiq_store::Store;

use crate::types::{
    DEDUP_WINDOW_SECS, MAX_BATCH_ITEMS, MAX_RECEIVE_MESSAGES, MAX_SEND_DELAY_SECS,
    MAX_VISIBILITY_TIMEOUT_SECS, QueueAttributes, QueueConfig, QueueInfo, ReceiveOptions,
    ReceivedMessage, SendItem, SendOptions, SendReceipt,
};

/// Re-check interval while long-polling.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Queue engine bound to one store and one clock.
#[derive(Clone)]
pub struct QueueEngine {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

/// Persisted queue attributes, loaded per operation.
struct QueueRow {
    visibility_timeout_secs: u64,
    max_message_bytes: usize,
    retention_secs: u64,
    created_at_ms: i64,
}

fn queue_row(conn: &Connection, name: &str) -> Result<QueueRow> {
    conn.query_row(
        "SELECT visibility_timeout_secs, max_message_bytes, retention_secs, created_at
         FROM queues WHERE name = ?1",
        params![name],
        |row| {
            Ok(QueueRow {
                visibility_timeout_secs: row.get::<_, i64>(0)? as u64,
                max_message_bytes: row.get::<_, i64>(1)? as usize,
                retention_secs: row.get::<_, i64>(2)? as u64,
                created_at_ms: row.get(3)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| MimiqError::NotFound(format!("queue '{name}'")))
}

/// Insert one message inside an already-open transaction.
///
/// Shared with the scheduler engine so "claim schedule + enqueue message"
/// can be one atomic unit. `Transaction` derefs to `Connection`, so both
/// the engine's own `send` and the scheduler sweep call this.
pub fn enqueue_in_tx(
    conn: &Connection,
    now_ms: i64,
    queue: &str,
    body: &str,
    opts: &SendOptions,
) -> Result<SendReceipt> {
    let row = queue_row(conn, queue)?;
    if opts.delay_secs > MAX_SEND_DELAY_SECS {
        return Err(MimiqError::InvalidArgument(format!(
            "delay_secs {} exceeds maximum {MAX_SEND_DELAY_SECS}",
            opts.delay_secs
        )));
    }
    if body.len() > row.max_message_bytes {
        return Err(MimiqError::PayloadTooLarge {
            size: body.len(),
            limit: row.max_message_bytes,
        });
    }

    // Best-effort dedup: an undeleted message with the same key enqueued
    // inside the window wins, and the window is not refreshed.
    if let Some(key) = &opts.dedup_key {
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM messages
                 WHERE queue_name = ?1 AND dedup_key = ?2 AND enqueued_at > ?3
                 ORDER BY enqueued_at DESC LIMIT 1",
                params![queue, key, now_ms - DEDUP_WINDOW_SECS * 1000],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(message_id) = existing {
            tracing::debug!("send to '{queue}' deduplicated against {message_id}");
            return Ok(SendReceipt {
                message_id,
                deduplicated: true,
            });
        }
    }

    let message_id = format!("mq_{}", Uuid::new_v4().simple());
    let available_at = now_ms + opts.delay_secs as i64 * 1000;
    conn.execute(
        "INSERT INTO messages (id, queue_name, body, enqueued_at, available_at, dedup_key)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![message_id, queue, body, now_ms, available_at, opts.dedup_key],
    )?;
    tracing::debug!("sent {message_id} to '{queue}' (delay {}s)", opts.delay_secs);
    Ok(SendReceipt {
        message_id,
        deduplicated: false,
    })
}

impl QueueEngine {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    // ─── Queue lifecycle ──────────────────────────────────────

    /// Create a queue. Re-creating with identical attributes is a no-op
    /// returning the existing queue; conflicting attributes fail.
    pub fn create_queue(&self, name: &str, config: QueueConfig) -> Result<QueueInfo> {
        if name.is_empty() {
            return Err(MimiqError::InvalidArgument("queue name is empty".into()));
        }
        if config.visibility_timeout_secs > MAX_VISIBILITY_TIMEOUT_SECS {
            return Err(MimiqError::InvalidArgument(format!(
                "visibility_timeout_secs {} exceeds maximum {MAX_VISIBILITY_TIMEOUT_SECS}",
                config.visibility_timeout_secs
            )));
        }
        let now_ms = self.clock.now_ms();
        self.store.with_tx(|tx| {
            if let Ok(existing) = queue_row(tx, name) {
                let same = existing.visibility_timeout_secs == config.visibility_timeout_secs
                    && existing.max_message_bytes == config.max_message_bytes
                    && existing.retention_secs == config.retention_secs;
                if same {
                    return Ok(QueueInfo {
                        name: name.to_string(),
                        visibility_timeout_secs: existing.visibility_timeout_secs,
                        max_message_bytes: existing.max_message_bytes,
                        retention_secs: existing.retention_secs,
                        created_at: from_millis(existing.created_at_ms),
                    });
                }
                return Err(MimiqError::AlreadyExists(format!(
                    "queue '{name}' exists with different attributes"
                )));
            }
            tx.execute(
                "INSERT INTO queues (name, visibility_timeout_secs, max_message_bytes, retention_secs, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    name,
                    config.visibility_timeout_secs as i64,
                    config.max_message_bytes as i64,
                    config.retention_secs as i64,
                    now_ms
                ],
            )?;
            tracing::info!("created queue '{name}'");
            Ok(QueueInfo {
                name: name.to_string(),
                visibility_timeout_secs: config.visibility_timeout_secs,
                max_message_bytes: config.max_message_bytes,
                retention_secs: config.retention_secs,
                created_at: from_millis(now_ms),
            })
        })
    }

    /// Delete a queue and, via the schema's cascade, every message in it.
    pub fn delete_queue(&self, name: &str) -> Result<()> {
        self.store.with_tx(|tx| {
            let changed = tx.execute("DELETE FROM queues WHERE name = ?1", params![name])?;
            if changed == 0 {
                return Err(MimiqError::NotFound(format!("queue '{name}'")));
            }
            tracing::info!("deleted queue '{name}'");
            Ok(())
        })
    }

    /// Queue names, optionally filtered by prefix, sorted.
    pub fn list_queues(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM queues ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .filter_map(|r| r.ok())
                .filter(|n| prefix.is_none_or(|p| n.starts_with(p)))
                .collect();
            Ok(names)
        })
    }

    /// Drop every message in the queue. Irreversible; the queue itself stays.
    pub fn purge(&self, name: &str) -> Result<u64> {
        self.store.with_tx(|tx| {
            queue_row(tx, name)?;
            let purged = tx.execute("DELETE FROM messages WHERE queue_name = ?1", params![name])?;
            tracing::info!("purged {purged} messages from '{name}'");
            Ok(purged as u64)
        })
    }

    /// Configuration plus visible / in-flight / delayed / total counts.
    /// Retention-expired rows are excluded even before a receive reaps them.
    pub fn queue_attributes(&self, name: &str) -> Result<QueueAttributes> {
        let now_ms = self.clock.now_ms();
        self.store.with_conn(|conn| {
            let row = queue_row(conn, name)?;
            let retained_after = now_ms - row.retention_secs as i64 * 1000;
            let count = |predicate: &str| -> Result<u64> {
                let sql = format!(
                    "SELECT COUNT(*) FROM messages
                     WHERE queue_name = ?1 AND enqueued_at > ?2 AND {predicate}"
                );
                let n: i64 =
                    conn.query_row(&sql, params![name, retained_after, now_ms], |r| r.get(0))?;
                Ok(n as u64)
            };
            Ok(QueueAttributes {
                name: name.to_string(),
                visibility_timeout_secs: row.visibility_timeout_secs,
                max_message_bytes: row.max_message_bytes,
                retention_secs: row.retention_secs,
                created_at: from_millis(row.created_at_ms),
                visible: count(
                    "available_at <= ?3 AND (visible_until IS NULL OR visible_until <= ?3)",
                )?,
                in_flight: count("visible_until IS NOT NULL AND visible_until > ?3")?,
                delayed: count("available_at > ?3")?,
                // Tautology keeps the bind list uniform across the counts.
                total: count("?3 = ?3")?,
            })
        })
    }

    // ─── Messages ──────────────────────────────────────

    /// Enqueue one message. See [`SendOptions`] for delay and dedup.
    pub fn send(&self, queue: &str, body: &str, opts: &SendOptions) -> Result<SendReceipt> {
        let now_ms = self.clock.now_ms();
        self.store.with_tx(|tx| enqueue_in_tx(tx, now_ms, queue, body, opts))
    }

    /// Send up to [`MAX_BATCH_ITEMS`] messages, each independently; one bad
    /// item never rolls back its neighbors.
    pub fn send_batch(&self, queue: &str, items: Vec<SendItem>) -> Result<BatchResults<SendReceipt>> {
        check_batch_size(items.len())?;
        Ok(apply_each(items, |item| {
            self.send(
                queue,
                &item.body,
                &SendOptions {
                    delay_secs: item.delay_secs,
                    dedup_key: item.dedup_key,
                },
            )
        }))
    }

    /// Claim up to `max_messages` visible messages, oldest first. Each claim
    /// sets a fresh receipt handle and an invisibility window of
    /// `visibility_timeout_secs` (queue default when unset). With
    /// `wait_ms > 0` the call long-polls, re-checking every 100 ms, and
    /// returns an empty list once the wait lapses.
    pub fn receive(&self, queue: &str, opts: &ReceiveOptions) -> Result<Vec<ReceivedMessage>> {
        if let Some(t) = opts.visibility_timeout_secs
            && t > MAX_VISIBILITY_TIMEOUT_SECS
        {
            return Err(MimiqError::InvalidArgument(format!(
                "visibility_timeout_secs {t} exceeds maximum {MAX_VISIBILITY_TIMEOUT_SECS}"
            )));
        }
        let max = opts.max_messages.clamp(1, MAX_RECEIVE_MESSAGES);
        let deadline = Instant::now() + Duration::from_millis(opts.wait_ms);
        loop {
            let claimed = self.claim_batch(queue, max, opts.visibility_timeout_secs)?;
            if !claimed.is_empty() {
                return Ok(claimed);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(claimed);
            }
            std::thread::sleep(remaining.min(POLL_INTERVAL));
        }
    }

    /// One claim pass: reap retention-expired rows, pick candidates, then
    /// claim each with a conditional update that re-checks visibility.
    fn claim_batch(
        &self,
        queue: &str,
        max: u32,
        visibility_override: Option<u64>,
    ) -> Result<Vec<ReceivedMessage>> {
        let now_ms = self.clock.now_ms();
        self.store.with_tx(|tx| {
            let row = queue_row(tx, queue)?;
            let timeout_secs = visibility_override.unwrap_or(row.visibility_timeout_secs);
            let visible_until = now_ms + timeout_secs as i64 * 1000;

            let reaped = tx.execute(
                "DELETE FROM messages WHERE queue_name = ?1 AND enqueued_at <= ?2",
                params![queue, now_ms - row.retention_secs as i64 * 1000],
            )?;
            if reaped > 0 {
                tracing::debug!("reaped {reaped} retention-expired messages from '{queue}'");
            }

            let candidates: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM messages
                     WHERE queue_name = ?1 AND available_at <= ?2
                       AND (visible_until IS NULL OR visible_until <= ?2)
                     ORDER BY enqueued_at ASC, id ASC
                     LIMIT ?3",
                )?;
                stmt.query_map(params![queue, now_ms, max as i64], |r| r.get(0))?
                    .filter_map(|r| r.ok())
                    .collect()
            };

            let mut claimed = Vec::with_capacity(candidates.len());
            for id in candidates {
                let receipt_handle = format!("rh_{}", Uuid::new_v4().simple());
                // The WHERE clause re-checks visibility, so a row claimed by
                // a concurrent receive since the SELECT is skipped.
                let hit = tx
                    .query_row(
                        "UPDATE messages
                         SET receipt_handle = ?1, visible_until = ?2,
                             receive_count = receive_count + 1
                         WHERE id = ?3 AND available_at <= ?4
                           AND (visible_until IS NULL OR visible_until <= ?4)
                         RETURNING body, receive_count",
                        params![receipt_handle, visible_until, id, now_ms],
                        |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)),
                    )
                    .optional()?;
                if let Some((body, receive_count)) = hit {
                    claimed.push(ReceivedMessage {
                        id,
                        receipt_handle,
                        body,
                        receive_count: receive_count as u32,
                    });
                }
            }
            Ok(claimed)
        })
    }

    /// Delete a message by its current receipt handle. `HandleExpired` when
    /// the handle has been rotated by a redelivery or the message is gone,
    /// so the caller knows another consumer may hold a live copy.
    pub fn delete(&self, queue: &str, receipt_handle: &str) -> Result<()> {
        self.store.with_tx(|tx| {
            queue_row(tx, queue)?;
            let changed = tx.execute(
                "DELETE FROM messages WHERE queue_name = ?1 AND receipt_handle = ?2",
                params![queue, receipt_handle],
            )?;
            if changed == 0 {
                return Err(MimiqError::HandleExpired(receipt_handle.to_string()));
            }
            Ok(())
        })
    }

    /// Delete up to [`MAX_BATCH_ITEMS`] messages by handle, each
    /// independently. Success payload is the acknowledged handle.
    pub fn delete_batch(&self, queue: &str, handles: Vec<String>) -> Result<BatchResults<String>> {
        check_batch_size(handles.len())?;
        Ok(apply_each(handles, |handle| {
            self.delete(queue, &handle)?;
            Ok(handle)
        }))
    }

    /// Move the invisibility window of a claimed message to
    /// `now + timeout_secs`. A timeout of 0 makes it claimable immediately.
    /// Same staleness rules as [`QueueEngine::delete`].
    pub fn change_visibility(
        &self,
        queue: &str,
        receipt_handle: &str,
        timeout_secs: u64,
    ) -> Result<()> {
        if timeout_secs > MAX_VISIBILITY_TIMEOUT_SECS {
            return Err(MimiqError::InvalidArgument(format!(
                "visibility_timeout_secs {timeout_secs} exceeds maximum {MAX_VISIBILITY_TIMEOUT_SECS}"
            )));
        }
        let now_ms = self.clock.now_ms();
        self.store.with_tx(|tx| {
            queue_row(tx, queue)?;
            let changed = tx.execute(
                "UPDATE messages SET visible_until = ?1
                 WHERE queue_name = ?2 AND receipt_handle = ?3",
                params![now_ms + timeout_secs as i64 * 1000, queue, receipt_handle],
            )?;
            if changed == 0 {
                return Err(MimiqError::HandleExpired(receipt_handle.to_string()));
            }
            Ok(())
        })
    }
}

fn check_batch_size(len: usize) -> Result<()> {
    if len == 0 {
        return Err(MimiqError::InvalidArgument("batch is empty".into()));
    }
    if len > MAX_BATCH_ITEMS {
        return Err(MimiqError::InvalidArgument(format!(
            "batch has {len} items (maximum {MAX_BATCH_ITEMS})"
        )));
    }
    Ok(())
}
