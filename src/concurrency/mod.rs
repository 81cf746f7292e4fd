//! Transaction management and the transactional engine.
//!
//! This engine is single-writer: there is no lock manager and no MVCC.
//! "Concurrency control" here means serializing WAL + B+-tree mutations
//! behind the engine's own locks so the crate's types stay `Send + Sync`,
//! not isolating concurrent writers from one another.

mod engine;
mod transaction;

pub use engine::Engine;
pub use transaction::{Transaction, TxnState};
