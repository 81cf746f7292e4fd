//! Write-ahead logging and crash recovery.
//!
//! The WAL is an append-only side file (`<db-path>.wal`) of length-framed,
//! checksummed records. Every mutation is logged and flushed before it is
//! applied to the B+-tree; on reopen, the transactional engine
//! ([`crate::concurrency::Engine`]) replays the log to restore the state a
//! crash interrupted.

mod record;
mod wal;

pub use record::{WalRecord, WalRecordType};
pub use wal::Wal;
