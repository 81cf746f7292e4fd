//! Eviction policy implementations (replacers).
//!
//! - [`LruReplacer`] - Least Recently Used, the buffer pool's eviction
//!   policy.
//! - [`FifoReplacer`] - Simple FIFO, kept around as the original baseline
//!   policy this crate started from.

mod fifo;
mod lru;

pub use fifo::FifoReplacer;
pub use lru::LruReplacer;