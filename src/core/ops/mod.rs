//! core::ops
//!
//! Operation journaling and locking.
//!
//! # Modules
//!
//! - [`journal`] - Append-only operation journal for crash safety and undo
//! - [`lock`] - Exclusive repository lock
//!
//! # Architecture
//!
//! Every mutating command:
//! 1. Acquires the exclusive repo lock (`.pancake/lock`)
//! 2. Begins a journal entry before any irreversible step
//! 3. Records each step as it executes, pre-image first
//! 4. On success: marks the entry committed
//! 5. On conflict: marks the entry suspended, leaving state for `--continue`/`--abort`

pub mod journal;
pub mod lock;

pub use journal::{Journal, JournalError, OpId, OpPhase, StepKind};
pub use lock::{LockError, RepoLock};
