//! # mimiq-core
//!
//! Shared foundation for the mimiq queue and scheduler engines:
//! - typed errors ([`MimiqError`], [`Result`])
//! - an injectable time source ([`Clock`]) so expiry logic is testable
//!   without sleeping
//! - the batch coordinator ([`batch::apply_each`]) that gives send_batch
//!   and delete_batch their per-item failure isolation

pub mod batch;
pub mod clock;
pub mod error;

pub use batch::{BatchFailure, BatchResults};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{MimiqError, Result};
