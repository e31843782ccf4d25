//! Queue data model and option structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hard limits, matching the SQS surface this queue emulates.
pub const MAX_BATCH_ITEMS: usize = 10;
pub const MAX_RECEIVE_MESSAGES: u32 = 10;
pub const MAX_VISIBILITY_TIMEOUT_SECS: u64 = 43_200; // 12 hours
pub const MAX_SEND_DELAY_SECS: u64 = 900; // 15 minutes

/// Best-effort dedup window for `SendOptions::dedup_key`, measured from the
/// original message's enqueue time. A duplicate send does not refresh it.
pub const DEDUP_WINDOW_SECS: i64 = 300;

fn default_visibility_timeout() -> u64 {
    30
}
fn default_max_message_bytes() -> usize {
    262_144 // 256 KB
}
fn default_retention_secs() -> u64 {
    345_600 // 4 days
}

/// Attributes a queue is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Default invisibility window applied by `receive` when the caller
    /// does not override it.
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u64,
    /// Maximum UTF-8 bytes per message body.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Messages older than this are dropped lazily at receive time.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: default_visibility_timeout(),
            max_message_bytes: default_max_message_bytes(),
            retention_secs: default_retention_secs(),
        }
    }
}

/// A queue as persisted.
#[derive(Debug, Clone, Serialize)]
pub struct QueueInfo {
    pub name: String,
    pub visibility_timeout_secs: u64,
    pub max_message_bytes: usize,
    pub retention_secs: u64,
    pub created_at: DateTime<Utc>,
}

/// Queue configuration plus live message counts.
#[derive(Debug, Clone, Serialize)]
pub struct QueueAttributes {
    pub name: String,
    pub visibility_timeout_secs: u64,
    pub max_message_bytes: usize,
    pub retention_secs: u64,
    pub created_at: DateTime<Utc>,
    /// Claimable right now.
    pub visible: u64,
    /// Claimed and inside an invisibility window.
    pub in_flight: u64,
    /// Send delay not yet elapsed.
    pub delayed: u64,
    pub total: u64,
}

/// Options for a single `send`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendOptions {
    /// Seconds before the message becomes claimable (0..=900).
    #[serde(default)]
    pub delay_secs: u64,
    /// Best-effort idempotency key; see [`DEDUP_WINDOW_SECS`].
    #[serde(default)]
    pub dedup_key: Option<String>,
}

/// One entry of a `send_batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendItem {
    pub body: String,
    #[serde(default)]
    pub delay_secs: u64,
    #[serde(default)]
    pub dedup_key: Option<String>,
}

/// Result of a `send`.
#[derive(Debug, Clone, Serialize)]
pub struct SendReceipt {
    pub message_id: String,
    /// True when the send matched an existing message inside the dedup
    /// window and `message_id` is that original message's id.
    pub deduplicated: bool,
}

/// Options for `receive`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveOptions {
    /// Upper bound on claimed messages, clamped to 1..=10.
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    /// Invisibility window for this delivery; queue default when `None`.
    #[serde(default)]
    pub visibility_timeout_secs: Option<u64>,
    /// Long-poll budget in milliseconds; 0 returns immediately.
    #[serde(default)]
    pub wait_ms: u64,
}

fn default_max_messages() -> u32 {
    1
}

impl Default for ReceiveOptions {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            visibility_timeout_secs: None,
            wait_ms: 0,
        }
    }
}

/// A claimed message handed to a consumer.
#[derive(Debug, Clone, Serialize)]
pub struct ReceivedMessage {
    pub id: String,
    /// Valid until the message is redelivered under a new handle.
    pub receipt_handle: String,
    pub body: String,
    pub receive_count: u32,
}
