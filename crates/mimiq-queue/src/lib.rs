//! # mimiq-queue
//!
//! At-least-once local message queue over a shared SQLite store.
//!
//! Core workflow, mirroring SQS:
//! `send` -> `receive` (claims messages, making them invisible for a
//! visibility timeout and handing out fresh receipt handles) -> `delete`
//! by receipt handle. A message that is never deleted becomes visible again
//! once its timeout lapses and is redelivered with a new handle and a
//! bumped `receive_count`.
//!
//! There are no background threads: visibility expiry is a predicate
//! evaluated at claim time. The only call that may block is `receive` with
//! a non-zero `wait_ms` (long poll), and it always returns by its deadline.

pub mod engine;
pub mod types;

pub use engine::{QueueEngine, enqueue_in_tx};
pub use types::{
    QueueAttributes, QueueConfig, QueueInfo, ReceiveOptions, ReceivedMessage, SendItem,
    SendOptions, SendReceipt,
};
