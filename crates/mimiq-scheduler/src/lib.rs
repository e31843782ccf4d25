//! # mimiq-scheduler
//!
//! One-shot and fixed-rate schedules that enqueue messages into a target
//! queue when due. Nothing runs in the background: the caller drives
//! progress by invoking [`SchedulerEngine::run_due`] on its own cadence
//! (a dev loop, a host tick, cron). Every firing claims the schedule with
//! the same atomic conditional-update pattern the queue uses for message
//! claims, so two concurrent sweeps never double-fire.

pub mod engine;
pub mod rate;
pub mod types;

pub use engine::SchedulerEngine;
pub use rate::parse_rate_expression;
pub use types::{FailedSchedule, FiredSchedule, Schedule, ScheduleKind, SweepReport, UpdateSchedule};
