//! Schedule lifecycle and the `run_due` sweep.
//!
//! A firing is claim-then-enqueue inside one transaction. The claim is a
//! conditional update keyed on the observed `next_fire_at`, so a concurrent
//! sweep that already fired the schedule makes the update a no-op and this
//! sweep skips it. If the enqueue fails (say the target queue was deleted),
//! the transaction rolls the claim back and the schedule stays due for the
//! next sweep.

use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension, Row, params};

use mimiq_core::clock::from_millis;
use mimiq_core::{Clock, MimiqError, Result};
use mimiq_queue::{SendOptions, enqueue_in_tx};
use mimiq_store::Store;

use crate::types::{
    FailedSchedule, FiredSchedule, Schedule, ScheduleKind, SweepReport, UpdateSchedule,
};

/// Upper bound on schedules fired per sweep.
pub const MAX_RUN_DUE: u32 = 500;

/// Scheduler engine bound to one store and one clock.
#[derive(Clone)]
pub struct SchedulerEngine {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

const SCHEDULE_COLUMNS: &str =
    "name, queue_name, kind, body, interval_secs, next_fire_at, enabled, created_at, last_fired_at";

fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<Schedule> {
    let kind_str: String = row.get(2)?;
    Ok(Schedule {
        name: row.get(0)?,
        queue_name: row.get(1)?,
        kind: ScheduleKind::parse(&kind_str).unwrap_or(ScheduleKind::Once),
        body: row.get(3)?,
        interval_secs: row.get::<_, Option<i64>>(4)?.map(|n| n as u64),
        next_fire_at: row.get::<_, Option<i64>>(5)?.map(from_millis),
        enabled: row.get::<_, i64>(6)? != 0,
        created_at: from_millis(row.get(7)?),
        last_fired_at: row.get::<_, Option<i64>>(8)?.map(from_millis),
    })
}

fn load_schedule(conn: &Connection, name: &str) -> Result<Schedule> {
    conn.query_row(
        &format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE name = ?1"),
        params![name],
        schedule_from_row,
    )
    .optional()?
    .ok_or_else(|| MimiqError::NotFound(format!("schedule '{name}'")))
}

fn queue_exists(conn: &Connection, queue: &str) -> Result<()> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM queues WHERE name = ?1", params![queue], |r| r.get(0))
        .optional()?;
    if found.is_none() {
        return Err(MimiqError::NotFound(format!("queue '{queue}'")));
    }
    Ok(())
}

impl SchedulerEngine {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    // ─── Schedule lifecycle ──────────────────────────────────────

    /// One-shot schedule at an absolute time, which must be strictly in the
    /// future; callers wanting an immediate message should `send` directly.
    pub fn schedule_at(
        &self,
        name: &str,
        queue: &str,
        body: &str,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<Schedule> {
        let now_ms = self.clock.now_ms();
        let at_ms = at.timestamp_millis();
        if at_ms <= now_ms {
            return Err(MimiqError::InPast(format!(
                "schedule '{name}' at {at} is not in the future"
            )));
        }
        self.create(name, queue, body, ScheduleKind::Once, None, at_ms)
    }

    /// One-shot schedule `delay_secs` from now (must be at least 1 second).
    pub fn schedule_in(
        &self,
        name: &str,
        queue: &str,
        body: &str,
        delay_secs: u64,
    ) -> Result<Schedule> {
        let now_ms = self.clock.now_ms();
        let at_ms = now_ms + delay_secs as i64 * 1000;
        if at_ms <= now_ms {
            return Err(MimiqError::InPast(format!(
                "schedule '{name}' with zero delay would already be due"
            )));
        }
        self.create(name, queue, body, ScheduleKind::Once, None, at_ms)
    }

    /// Fixed-rate schedule firing every `interval_secs`, first at
    /// `now + interval_secs`.
    pub fn schedule_rate(
        &self,
        name: &str,
        queue: &str,
        body: &str,
        interval_secs: u64,
    ) -> Result<Schedule> {
        if interval_secs == 0 {
            return Err(MimiqError::InvalidArgument(
                "rate interval must be at least 1 second".into(),
            ));
        }
        let now_ms = self.clock.now_ms();
        self.create(
            name,
            queue,
            body,
            ScheduleKind::Rate,
            Some(interval_secs),
            now_ms + interval_secs as i64 * 1000,
        )
    }

    fn create(
        &self,
        name: &str,
        queue: &str,
        body: &str,
        kind: ScheduleKind,
        interval_secs: Option<u64>,
        next_fire_ms: i64,
    ) -> Result<Schedule> {
        if name.is_empty() {
            return Err(MimiqError::InvalidArgument("schedule name is empty".into()));
        }
        let now_ms = self.clock.now_ms();
        self.store.with_tx(|tx| {
            queue_exists(tx, queue)?;
            if load_schedule(tx, name).is_ok() {
                return Err(MimiqError::AlreadyExists(format!("schedule '{name}'")));
            }
            tx.execute(
                "INSERT INTO schedules (name, queue_name, kind, body, interval_secs, next_fire_at, enabled, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
                params![
                    name,
                    queue,
                    kind.as_str(),
                    body,
                    interval_secs.map(|n| n as i64),
                    next_fire_ms,
                    now_ms
                ],
            )?;
            tracing::info!("created {} schedule '{name}' -> '{queue}'", kind.as_str());
            load_schedule(tx, name)
        })
    }

    pub fn get_schedule(&self, name: &str) -> Result<Schedule> {
        self.store.with_conn(|conn| load_schedule(conn, name))
    }

    /// Schedules ordered soonest-first. Retired one-shots
    /// (`next_fire_at` null) sort last and are skipped unless asked for.
    pub fn list_schedules(&self, include_retired: bool, limit: usize) -> Result<Vec<Schedule>> {
        self.store.with_conn(|conn| {
            let filter = if include_retired {
                ""
            } else {
                "WHERE next_fire_at IS NOT NULL"
            };
            let sql = format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedules {filter}
                 ORDER BY next_fire_at IS NULL, next_fire_at ASC LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let schedules = stmt
                .query_map(params![limit.clamp(1, 500) as i64], schedule_from_row)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(schedules)
        })
    }

    /// Update body, target queue, or trigger. Any trigger change
    /// (`fire_at` / `delay_secs` / `interval_secs`) re-arms the schedule,
    /// including a retired one-shot.
    pub fn update_schedule(&self, name: &str, changes: &UpdateSchedule) -> Result<Schedule> {
        if changes.is_empty() {
            return Err(MimiqError::InvalidArgument("no fields to update".into()));
        }
        let now_ms = self.clock.now_ms();
        self.store.with_tx(|tx| {
            let current = load_schedule(tx, name)?;

            if let Some(queue) = &changes.queue {
                queue_exists(tx, queue)?;
                tx.execute(
                    "UPDATE schedules SET queue_name = ?1 WHERE name = ?2",
                    params![queue, name],
                )?;
            }
            if let Some(body) = &changes.body {
                tx.execute(
                    "UPDATE schedules SET body = ?1 WHERE name = ?2",
                    params![body, name],
                )?;
            }
            if let Some(interval) = changes.interval_secs {
                if current.kind != ScheduleKind::Rate {
                    return Err(MimiqError::InvalidArgument(format!(
                        "schedule '{name}' is one-shot; it has no interval"
                    )));
                }
                if interval == 0 {
                    return Err(MimiqError::InvalidArgument(
                        "rate interval must be at least 1 second".into(),
                    ));
                }
                tx.execute(
                    "UPDATE schedules SET interval_secs = ?1, next_fire_at = ?2 WHERE name = ?3",
                    params![interval as i64, now_ms + interval as i64 * 1000, name],
                )?;
            }
            if let Some(at) = changes.fire_at {
                let at_ms = at.timestamp_millis();
                if at_ms <= now_ms {
                    return Err(MimiqError::InPast(format!(
                        "schedule '{name}' re-arm time {at} is not in the future"
                    )));
                }
                tx.execute(
                    "UPDATE schedules SET next_fire_at = ?1 WHERE name = ?2",
                    params![at_ms, name],
                )?;
            }
            if let Some(delay) = changes.delay_secs {
                let at_ms = now_ms + delay as i64 * 1000;
                if at_ms <= now_ms {
                    return Err(MimiqError::InPast(format!(
                        "schedule '{name}' re-arm delay must be at least 1 second"
                    )));
                }
                tx.execute(
                    "UPDATE schedules SET next_fire_at = ?1 WHERE name = ?2",
                    params![at_ms, name],
                )?;
            }
            load_schedule(tx, name)
        })
    }

    /// Paused schedules are skipped by the sweep; `next_fire_at` keeps
    /// advancing normally once resumed.
    pub fn pause_schedule(&self, name: &str) -> Result<()> {
        self.set_enabled(name, false)
    }

    pub fn resume_schedule(&self, name: &str) -> Result<()> {
        self.set_enabled(name, true)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.store.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE schedules SET enabled = ?1 WHERE name = ?2",
                params![enabled as i64, name],
            )?;
            if changed == 0 {
                return Err(MimiqError::NotFound(format!("schedule '{name}'")));
            }
            Ok(())
        })
    }

    /// Hard delete.
    pub fn cancel_schedule(&self, name: &str) -> Result<()> {
        self.store.with_tx(|tx| {
            let changed = tx.execute("DELETE FROM schedules WHERE name = ?1", params![name])?;
            if changed == 0 {
                return Err(MimiqError::NotFound(format!("schedule '{name}'")));
            }
            tracing::info!("cancelled schedule '{name}'");
            Ok(())
        })
    }

    // ─── The sweep ──────────────────────────────────────

    /// Fire up to `max_to_run` due schedules, soonest-due first. Pull-based:
    /// this never blocks and never spawns anything; call it on a cadence.
    ///
    /// Per-schedule failures (e.g. target queue deleted) land in
    /// [`SweepReport::failed`] with `next_fire_at` untouched; the sweep
    /// carries on with the remaining due schedules.
    pub fn run_due(&self, max_to_run: u32) -> Result<SweepReport> {
        let max = max_to_run.clamp(1, MAX_RUN_DUE);
        let now_ms = self.clock.now_ms();

        let due: Vec<Schedule> = self.store.with_conn(|conn| {
            let sql = format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedules
                 WHERE enabled = 1 AND next_fire_at IS NOT NULL AND next_fire_at <= ?1
                 ORDER BY next_fire_at ASC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let due = stmt
                .query_map(params![now_ms, max as i64], schedule_from_row)?
                .filter_map(|r| r.ok())
                .collect();
            Ok(due)
        })?;

        let mut report = SweepReport::default();
        for schedule in due {
            // Already filtered on IS NOT NULL.
            let observed_ms = match schedule.next_fire_at {
                Some(t) => t.timestamp_millis(),
                None => continue,
            };
            let outcome = self.store.with_tx(|tx| {
                let claimed = match schedule.kind {
                    ScheduleKind::Rate => {
                        // Creation always sets an interval; a NULL here means
                        // the row was tampered with, so fail the firing rather
                        // than guess a cadence.
                        let Some(interval_secs) = schedule.interval_secs else {
                            return Err(MimiqError::InvalidArgument(format!(
                                "rate schedule '{}' has no interval",
                                schedule.name
                            )));
                        };
                        // Advance from the previous next_fire_at, not from
                        // now, so fire times stay drift-free.
                        let interval_ms = interval_secs as i64 * 1000;
                        tx.execute(
                            "UPDATE schedules
                             SET next_fire_at = next_fire_at + ?1, last_fired_at = ?2
                             WHERE name = ?3 AND enabled = 1 AND next_fire_at = ?4",
                            params![interval_ms, now_ms, schedule.name, observed_ms],
                        )?
                    }
                    ScheduleKind::Once => tx.execute(
                        "UPDATE schedules
                         SET next_fire_at = NULL, last_fired_at = ?1
                         WHERE name = ?2 AND enabled = 1 AND next_fire_at = ?3",
                        params![now_ms, schedule.name, observed_ms],
                    )?,
                };
                if claimed == 0 {
                    // A concurrent sweep fired it first.
                    return Ok(None);
                }
                let receipt = enqueue_in_tx(
                    tx,
                    now_ms,
                    &schedule.queue_name,
                    &schedule.body,
                    &SendOptions::default(),
                )?;
                Ok(Some(receipt.message_id))
            });

            match outcome {
                Ok(Some(message_id)) => {
                    tracing::debug!(
                        "schedule '{}' fired into '{}'",
                        schedule.name,
                        schedule.queue_name
                    );
                    report.fired.push(FiredSchedule {
                        name: schedule.name,
                        queue_name: schedule.queue_name,
                        message_id,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("schedule '{}' failed to fire: {e}", schedule.name);
                    report.failed.push(FailedSchedule {
                        name: schedule.name,
                        queue_name: schedule.queue_name,
                        error: e.to_string(),
                    });
                }
            }
        }

        if !report.fired.is_empty() || !report.failed.is_empty() {
            tracing::info!(
                "sweep fired {} schedule(s), {} failed",
                report.fired.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use mimiq_core::ManualClock;
    use mimiq_queue::{QueueConfig, QueueEngine, ReceiveOptions};

    fn setup() -> (QueueEngine, SchedulerEngine, Arc<ManualClock>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::from_now());
        let queues = QueueEngine::new(store.clone(), clock.clone());
        let scheduler = SchedulerEngine::new(store, clock.clone());
        queues.create_queue("target", QueueConfig::default()).unwrap();
        (queues, scheduler, clock)
    }

    fn drain(queues: &QueueEngine, name: &str) -> Vec<String> {
        queues
            .receive(
                name,
                &ReceiveOptions {
                    max_messages: 10,
                    ..Default::default()
                },
            )
            .unwrap()
            .into_iter()
            .map(|m| m.body)
            .collect()
    }

    #[test]
    fn test_one_shot_fires_once_then_retires() {
        let (queues, scheduler, clock) = setup();
        scheduler.schedule_in("ping", "target", "hello", 60).unwrap();

        // Not due yet.
        assert!(scheduler.run_due(50).unwrap().fired.is_empty());

        clock.advance_secs(61);
        let report = scheduler.run_due(50).unwrap();
        assert_eq!(report.fired.len(), 1);
        assert_eq!(report.fired[0].name, "ping");
        assert_eq!(drain(&queues, "target"), vec!["hello".to_string()]);

        // Retired: fires at most once.
        let again = scheduler.run_due(50).unwrap();
        assert!(again.fired.is_empty());
        let sched = scheduler.get_schedule("ping").unwrap();
        assert!(sched.next_fire_at.is_none());
        assert!(sched.last_fired_at.is_some());
    }

    #[test]
    fn test_concurrent_sweeps_fire_once() {
        let (queues, scheduler, clock) = setup();
        scheduler.schedule_in("ping", "target", "hello", 5).unwrap();
        clock.advance_secs(6);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let scheduler = scheduler.clone();
            handles.push(std::thread::spawn(move || scheduler.run_due(50).unwrap()));
        }
        let reports: Vec<SweepReport> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Exactly one sweep wins the claim; the losers see a no-op update
        // and skip, so nothing fails and nothing fires twice.
        let fired: usize = reports.iter().map(|r| r.fired.len()).sum();
        let failed: usize = reports.iter().map(|r| r.failed.len()).sum();
        assert_eq!(fired, 1);
        assert_eq!(failed, 0);
        assert_eq!(drain(&queues, "target"), vec!["hello".to_string()]);
    }

    #[test]
    fn test_schedule_at_rejects_past() {
        let (_, scheduler, clock) = setup();
        let past = clock.now() - TimeDelta::seconds(1);
        assert!(matches!(
            scheduler.schedule_at("late", "target", "x", past),
            Err(MimiqError::InPast(_))
        ));
        // Exactly now is not strictly in the future either.
        assert!(matches!(
            scheduler.schedule_in("now", "target", "x", 0),
            Err(MimiqError::InPast(_))
        ));
    }

    #[test]
    fn test_fixed_rate_is_drift_free() {
        let (_, scheduler, clock) = setup();
        let t0_ms = clock.now_ms();
        scheduler.schedule_rate("tick", "target", "t", 60).unwrap();

        // Sweeps run at irregular times; fire times stay on the 60s grid.
        clock.advance_secs(65);
        assert_eq!(scheduler.run_due(50).unwrap().fired.len(), 1);
        let sched = scheduler.get_schedule("tick").unwrap();
        assert_eq!(
            sched.next_fire_at.unwrap().timestamp_millis(),
            t0_ms + 120_000
        );

        clock.advance_secs(73); // now at t0+138
        assert_eq!(scheduler.run_due(50).unwrap().fired.len(), 1);
        let sched = scheduler.get_schedule("tick").unwrap();
        assert_eq!(
            sched.next_fire_at.unwrap().timestamp_millis(),
            t0_ms + 180_000
        );
    }

    #[test]
    fn test_overdue_rate_catches_up_one_interval_per_sweep() {
        let (queues, scheduler, clock) = setup();
        scheduler.schedule_rate("tick", "target", "t", 60).unwrap();

        clock.advance_secs(200); // missed the 60s, 120s, and 180s firings
        let mut fired = 0;
        while !scheduler.run_due(50).unwrap().fired.is_empty() {
            fired += 1;
        }
        assert_eq!(fired, 3);
        assert_eq!(drain(&queues, "target").len(), 3);
    }

    #[test]
    fn test_enqueue_failure_leaves_schedule_due() {
        let (queues, scheduler, clock) = setup();
        scheduler.schedule_in("ping", "target", "x", 10).unwrap();
        let due_at = scheduler.get_schedule("ping").unwrap().next_fire_at;

        queues.delete_queue("target").unwrap();
        clock.advance_secs(11);
        let report = scheduler.run_due(50).unwrap();
        assert!(report.fired.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "ping");

        // Claim was rolled back; the next sweep retries.
        let sched = scheduler.get_schedule("ping").unwrap();
        assert_eq!(sched.next_fire_at, due_at);
        assert!(sched.last_fired_at.is_none());

        queues.create_queue("target", QueueConfig::default()).unwrap();
        assert_eq!(scheduler.run_due(50).unwrap().fired.len(), 1);
        assert_eq!(drain(&queues, "target"), vec!["x".to_string()]);
    }

    #[test]
    fn test_sweep_continues_past_a_failure() {
        let (queues, scheduler, clock) = setup();
        queues.create_queue("other", QueueConfig::default()).unwrap();
        scheduler.schedule_in("bad", "other", "x", 5).unwrap();
        scheduler.schedule_in("good", "target", "y", 10).unwrap();
        queues.delete_queue("other").unwrap();

        clock.advance_secs(11);
        let report = scheduler.run_due(50).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "bad");
        assert_eq!(report.fired.len(), 1);
        assert_eq!(report.fired[0].name, "good");
    }

    #[test]
    fn test_pause_and_resume() {
        let (queues, scheduler, clock) = setup();
        scheduler.schedule_rate("tick", "target", "t", 30).unwrap();
        scheduler.pause_schedule("tick").unwrap();

        clock.advance_secs(35);
        assert!(scheduler.run_due(50).unwrap().fired.is_empty());
        assert!(drain(&queues, "target").is_empty());

        scheduler.resume_schedule("tick").unwrap();
        assert_eq!(scheduler.run_due(50).unwrap().fired.len(), 1);
    }

    #[test]
    fn test_cancel_schedule() {
        let (_, scheduler, clock) = setup();
        scheduler.schedule_in("ping", "target", "x", 5).unwrap();
        scheduler.cancel_schedule("ping").unwrap();
        assert!(matches!(
            scheduler.get_schedule("ping"),
            Err(MimiqError::NotFound(_))
        ));
        assert!(matches!(
            scheduler.cancel_schedule("ping"),
            Err(MimiqError::NotFound(_))
        ));
        clock.advance_secs(10);
        assert!(scheduler.run_due(50).unwrap().fired.is_empty());
    }

    #[test]
    fn test_create_validations() {
        let (_, scheduler, _) = setup();
        scheduler.schedule_in("ping", "target", "x", 5).unwrap();
        assert!(matches!(
            scheduler.schedule_in("ping", "target", "x", 5),
            Err(MimiqError::AlreadyExists(_))
        ));
        assert!(matches!(
            scheduler.schedule_in("other", "ghost-queue", "x", 5),
            Err(MimiqError::NotFound(_))
        ));
        assert!(matches!(
            scheduler.schedule_rate("zero", "target", "x", 0),
            Err(MimiqError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_update_schedule() {
        let (queues, scheduler, clock) = setup();
        queues.create_queue("elsewhere", QueueConfig::default()).unwrap();
        scheduler.schedule_in("ping", "target", "old", 60).unwrap();

        scheduler
            .update_schedule(
                "ping",
                &UpdateSchedule {
                    body: Some("new".into()),
                    queue: Some("elsewhere".into()),
                    delay_secs: Some(5),
                    ..Default::default()
                },
            )
            .unwrap();

        clock.advance_secs(6);
        let report = scheduler.run_due(50).unwrap();
        assert_eq!(report.fired.len(), 1);
        assert_eq!(drain(&queues, "elsewhere"), vec!["new".to_string()]);

        // Interval on a one-shot is malformed; empty updates are too.
        assert!(matches!(
            scheduler.update_schedule(
                "ping",
                &UpdateSchedule {
                    interval_secs: Some(60),
                    ..Default::default()
                }
            ),
            Err(MimiqError::InvalidArgument(_))
        ));
        assert!(matches!(
            scheduler.update_schedule("ping", &UpdateSchedule::default()),
            Err(MimiqError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_update_rearms_retired_one_shot() {
        let (_, scheduler, clock) = setup();
        scheduler.schedule_in("ping", "target", "x", 5).unwrap();
        clock.advance_secs(6);
        assert_eq!(scheduler.run_due(50).unwrap().fired.len(), 1);
        assert!(scheduler.get_schedule("ping").unwrap().next_fire_at.is_none());

        scheduler
            .update_schedule(
                "ping",
                &UpdateSchedule {
                    delay_secs: Some(30),
                    ..Default::default()
                },
            )
            .unwrap();
        clock.advance_secs(31);
        assert_eq!(scheduler.run_due(50).unwrap().fired.len(), 1);
    }

    #[test]
    fn test_list_schedules_hides_retired_by_default() {
        let (_, scheduler, clock) = setup();
        scheduler.schedule_in("done", "target", "x", 5).unwrap();
        scheduler.schedule_in("pending", "target", "y", 120).unwrap();
        clock.advance_secs(6);
        scheduler.run_due(50).unwrap();

        let live = scheduler.list_schedules(false, 100).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].name, "pending");

        let all = scheduler.list_schedules(true, 100).unwrap();
        assert_eq!(all.len(), 2);
        // Retired schedules sort last.
        assert_eq!(all[1].name, "done");
    }

    #[test]
    fn test_rate_with_null_interval_reports_failure() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::from_now());
        let queues = QueueEngine::new(store.clone(), clock.clone());
        let scheduler = SchedulerEngine::new(store.clone(), clock.clone());
        queues.create_queue("target", QueueConfig::default()).unwrap();
        scheduler.schedule_rate("tick", "target", "t", 60).unwrap();

        // Corrupt the row the way a stray manual edit would.
        store
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE schedules SET interval_secs = NULL WHERE name = 'tick'",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        clock.advance_secs(61);
        let report = scheduler.run_due(50).unwrap();
        assert!(report.fired.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "tick");
        assert!(drain(&queues, "target").is_empty());
    }

    #[test]
    fn test_rate_schedule_update_interval() {
        let (_, scheduler, clock) = setup();
        scheduler.schedule_rate("tick", "target", "t", 600).unwrap();
        scheduler
            .update_schedule(
                "tick",
                &UpdateSchedule {
                    interval_secs: Some(10),
                    ..Default::default()
                },
            )
            .unwrap();
        clock.advance_secs(11);
        assert_eq!(scheduler.run_due(50).unwrap().fired.len(), 1);
        let sched = scheduler.get_schedule("tick").unwrap();
        assert_eq!(sched.interval_secs, Some(10));
    }
}
