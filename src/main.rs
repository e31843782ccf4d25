//! # mimiq — local queue + scheduler CLI
//!
//! Drives every queue and scheduler operation against a SQLite file, the
//! same way the cloud CLIs drive SQS/EventBridge. The engines are embedded;
//! this binary is just their outer wrapper and owns logging setup.
//!
//! Usage:
//!   mimiq --db ./mimiq.db queue create jobs
//!   mimiq --db ./mimiq.db queue send jobs "hello"
//!   mimiq --db ./mimiq.db queue receive jobs --wait-ms 2000
//!   mimiq --db ./mimiq.db schedule rate tick jobs "ping" --every "rate(5 minutes)"
//!   mimiq --db ./mimiq.db watch --interval-secs 5

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mimiq_core::SystemClock;
use mimiq_queue::{QueueConfig, QueueEngine, ReceiveOptions, SendItem, SendOptions};
use mimiq_scheduler::{SchedulerEngine, UpdateSchedule, parse_rate_expression};
use mimiq_store::Store;

#[derive(Parser)]
#[command(name = "mimiq", version, about = "📬 Local durable queue + scheduler on SQLite")]
struct Cli {
    /// Path to the SQLite database (or set MIMIQ_DB)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Queue operations
    #[command(subcommand)]
    Queue(QueueCmd),
    /// Schedule operations
    #[command(subcommand)]
    Schedule(ScheduleCmd),
    /// Fire due schedules once and exit
    RunDue {
        /// Max schedules to fire this sweep
        #[arg(long, default_value = "50")]
        max: u32,
    },
    /// Fire due schedules on a fixed cadence until interrupted
    Watch {
        #[arg(long, default_value = "5")]
        interval_secs: u64,
        #[arg(long, default_value = "50")]
        max: u32,
    },
}

#[derive(Subcommand)]
enum QueueCmd {
    /// Create a queue (no-op if it exists with identical attributes)
    Create {
        name: String,
        #[arg(long, default_value = "30")]
        visibility_timeout_secs: u64,
        #[arg(long, default_value = "262144")]
        max_message_bytes: usize,
        #[arg(long, default_value = "345600")]
        retention_secs: u64,
    },
    /// Delete a queue and every message in it
    Delete { name: String },
    /// List queue names
    List {
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Show configuration and message counts
    Attrs { name: String },
    /// Drop all messages, keep the queue
    Purge { name: String },
    /// Send one message
    Send {
        name: String,
        body: String,
        #[arg(long, default_value = "0")]
        delay_secs: u64,
        #[arg(long)]
        dedup_key: Option<String>,
    },
    /// Send several messages (up to 10), reported per item
    SendBatch {
        name: String,
        #[arg(required = true)]
        bodies: Vec<String>,
    },
    /// Claim visible messages
    Receive {
        name: String,
        #[arg(long, default_value = "1")]
        max: u32,
        #[arg(long)]
        visibility_timeout_secs: Option<u64>,
        /// Long-poll budget; 0 returns immediately
        #[arg(long, default_value = "0")]
        wait_ms: u64,
    },
    /// Delete a message by receipt handle
    Ack { name: String, receipt_handle: String },
    /// Delete several messages by receipt handle (up to 10)
    AckBatch {
        name: String,
        #[arg(required = true)]
        receipt_handles: Vec<String>,
    },
    /// Extend or shorten a claimed message's invisibility window
    Extend {
        name: String,
        receipt_handle: String,
        timeout_secs: u64,
    },
}

#[derive(Subcommand)]
enum ScheduleCmd {
    /// One-shot at an absolute RFC 3339 time
    At {
        name: String,
        queue: String,
        body: String,
        /// e.g. 2026-09-01T08:00:00Z
        #[arg(long)]
        at: String,
    },
    /// One-shot after a delay
    In {
        name: String,
        queue: String,
        body: String,
        #[arg(long)]
        delay_secs: u64,
    },
    /// Recurring at a fixed rate
    Rate {
        name: String,
        queue: String,
        body: String,
        /// e.g. "rate(5 minutes)"; alternative to --interval-secs
        #[arg(long, conflicts_with = "interval_secs")]
        every: Option<String>,
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Show one schedule
    Show { name: String },
    /// List schedules, soonest first
    List {
        #[arg(long)]
        include_retired: bool,
        #[arg(long, default_value = "100")]
        limit: usize,
    },
    /// Update body, target queue, or trigger
    Update {
        name: String,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        queue: Option<String>,
        #[arg(long)]
        at: Option<String>,
        #[arg(long)]
        delay_secs: Option<u64>,
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Skip firings until resumed
    Pause { name: String },
    Resume { name: String },
    /// Hard delete
    Cancel { name: String },
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .with_context(|| format!("'{s}' is not an RFC 3339 timestamp"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "mimiq=debug" } else { "mimiq=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let db = match cli.db.or_else(|| std::env::var("MIMIQ_DB").ok()) {
        Some(db) => db,
        None => bail!("--db is required (or set MIMIQ_DB)"),
    };
    let db_path = PathBuf::from(shellexpand::tilde(&db).to_string());
    tracing::debug!("using database {}", db_path.display());

    let store = Arc::new(Store::open(&db_path)?);
    let clock = Arc::new(SystemClock);
    let queues = QueueEngine::new(store.clone(), clock.clone());
    let scheduler = SchedulerEngine::new(store, clock);

    match cli.command {
        Command::Queue(cmd) => run_queue_cmd(&queues, cmd),
        Command::Schedule(cmd) => run_schedule_cmd(&scheduler, cmd),
        Command::RunDue { max } => print_json(&scheduler.run_due(max)?),
        Command::Watch { interval_secs, max } => {
            println!("⏰ sweeping every {interval_secs}s (ctrl-c to stop)");
            loop {
                let report = scheduler.run_due(max)?;
                for fired in &report.fired {
                    println!("🔔 {} -> '{}' ({})", fired.name, fired.queue_name, fired.message_id);
                }
                for failed in &report.failed {
                    println!("⚠️  {} failed: {}", failed.name, failed.error);
                }
                std::thread::sleep(std::time::Duration::from_secs(interval_secs));
            }
        }
    }
}

fn run_queue_cmd(queues: &QueueEngine, cmd: QueueCmd) -> Result<()> {
    match cmd {
        QueueCmd::Create {
            name,
            visibility_timeout_secs,
            max_message_bytes,
            retention_secs,
        } => print_json(&queues.create_queue(
            &name,
            QueueConfig {
                visibility_timeout_secs,
                max_message_bytes,
                retention_secs,
            },
        )?),
        QueueCmd::Delete { name } => {
            queues.delete_queue(&name)?;
            println!("deleted queue '{name}'");
            Ok(())
        }
        QueueCmd::List { prefix } => print_json(&queues.list_queues(prefix.as_deref())?),
        QueueCmd::Attrs { name } => print_json(&queues.queue_attributes(&name)?),
        QueueCmd::Purge { name } => {
            let purged = queues.purge(&name)?;
            println!("purged {purged} message(s) from '{name}'");
            Ok(())
        }
        QueueCmd::Send {
            name,
            body,
            delay_secs,
            dedup_key,
        } => print_json(&queues.send(&name, &body, &SendOptions { delay_secs, dedup_key })?),
        QueueCmd::SendBatch { name, bodies } => {
            let items = bodies
                .into_iter()
                .map(|body| SendItem {
                    body,
                    delay_secs: 0,
                    dedup_key: None,
                })
                .collect();
            let results = queues.send_batch(&name, items)?;
            for receipt in results.successes() {
                println!("✅ {}", receipt.message_id);
            }
            for failure in results.failures() {
                println!("❌ item {}: {} ({})", failure.index, failure.message, failure.kind);
            }
            Ok(())
        }
        QueueCmd::Receive {
            name,
            max,
            visibility_timeout_secs,
            wait_ms,
        } => print_json(&queues.receive(
            &name,
            &ReceiveOptions {
                max_messages: max,
                visibility_timeout_secs,
                wait_ms,
            },
        )?),
        QueueCmd::Ack { name, receipt_handle } => {
            queues.delete(&name, &receipt_handle)?;
            println!("deleted");
            Ok(())
        }
        QueueCmd::AckBatch { name, receipt_handles } => {
            let results = queues.delete_batch(&name, receipt_handles)?;
            for handle in results.successes() {
                println!("✅ {handle}");
            }
            for failure in results.failures() {
                println!("❌ item {}: {} ({})", failure.index, failure.message, failure.kind);
            }
            Ok(())
        }
        QueueCmd::Extend {
            name,
            receipt_handle,
            timeout_secs,
        } => {
            queues.change_visibility(&name, &receipt_handle, timeout_secs)?;
            println!("visibility set to {timeout_secs}s");
            Ok(())
        }
    }
}

fn run_schedule_cmd(scheduler: &SchedulerEngine, cmd: ScheduleCmd) -> Result<()> {
    match cmd {
        ScheduleCmd::At { name, queue, body, at } => {
            let at = parse_rfc3339(&at)?;
            print_json(&scheduler.schedule_at(&name, &queue, &body, at)?)
        }
        ScheduleCmd::In {
            name,
            queue,
            body,
            delay_secs,
        } => print_json(&scheduler.schedule_in(&name, &queue, &body, delay_secs)?),
        ScheduleCmd::Rate {
            name,
            queue,
            body,
            every,
            interval_secs,
        } => {
            let interval = match (every, interval_secs) {
                (Some(expr), _) => parse_rate_expression(&expr)?,
                (None, Some(secs)) => secs,
                (None, None) => bail!("provide --every or --interval-secs"),
            };
            print_json(&scheduler.schedule_rate(&name, &queue, &body, interval)?)
        }
        ScheduleCmd::Show { name } => print_json(&scheduler.get_schedule(&name)?),
        ScheduleCmd::List {
            include_retired,
            limit,
        } => print_json(&scheduler.list_schedules(include_retired, limit)?),
        ScheduleCmd::Update {
            name,
            body,
            queue,
            at,
            delay_secs,
            interval_secs,
        } => {
            let fire_at = at.as_deref().map(parse_rfc3339).transpose()?;
            print_json(&scheduler.update_schedule(
                &name,
                &UpdateSchedule {
                    body,
                    queue,
                    fire_at,
                    delay_secs,
                    interval_secs,
                },
            )?)
        }
        ScheduleCmd::Pause { name } => {
            scheduler.pause_schedule(&name)?;
            println!("paused '{name}'");
            Ok(())
        }
        ScheduleCmd::Resume { name } => {
            scheduler.resume_schedule(&name)?;
            println!("resumed '{name}'");
            Ok(())
        }
        ScheduleCmd::Cancel { name } => {
            scheduler.cancel_schedule(&name)?;
            println!("cancelled '{name}'");
            Ok(())
        }
    }
}
