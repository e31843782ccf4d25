//! Schedule data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a schedule triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Fires once, then retires (`next_fire_at` becomes null).
    Once,
    /// Fires every `interval_secs`, advanced from the previous
    /// `next_fire_at` so fire times stay on the original grid.
    Rate,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::Once => "once",
            ScheduleKind::Rate => "rate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "once" => Some(ScheduleKind::Once),
            "rate" => Some(ScheduleKind::Rate),
            _ => None,
        }
    }
}

/// A schedule as persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub name: String,
    /// Queue that receives the message on each firing.
    pub queue_name: String,
    pub kind: ScheduleKind,
    /// Message body template enqueued verbatim on each firing.
    pub body: String,
    pub interval_secs: Option<u64>,
    /// Earliest future firing time; `None` once a one-shot has retired.
    pub next_fire_at: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_fired_at: Option<DateTime<Utc>>,
}

/// Fields `update_schedule` may change. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSchedule {
    /// Replace the message body template.
    #[serde(default)]
    pub body: Option<String>,
    /// Re-target another (existing) queue.
    #[serde(default)]
    pub queue: Option<String>,
    /// Re-arm at an absolute future time.
    #[serde(default)]
    pub fire_at: Option<DateTime<Utc>>,
    /// Re-arm relative to now.
    #[serde(default)]
    pub delay_secs: Option<u64>,
    /// Change a fixed-rate interval; re-arms `next_fire_at = now + interval`.
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl UpdateSchedule {
    pub fn is_empty(&self) -> bool {
        self.body.is_none()
            && self.queue.is_none()
            && self.fire_at.is_none()
            && self.delay_secs.is_none()
            && self.interval_secs.is_none()
    }
}

/// A schedule fired during a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct FiredSchedule {
    pub name: String,
    pub queue_name: String,
    /// Id of the enqueued message.
    pub message_id: String,
}

/// A due schedule that could not fire; `next_fire_at` was left unchanged
/// so the next sweep retries it.
#[derive(Debug, Clone, Serialize)]
pub struct FailedSchedule {
    pub name: String,
    pub queue_name: String,
    pub error: String,
}

/// Outcome of one `run_due` sweep.
#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub fired: Vec<FiredSchedule>,
    pub failed: Vec<FailedSchedule>,
}
