//! In-memory transaction bookkeeping.

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Committed,
    Aborted,
}

/// An open transaction tracked by the [`crate::concurrency::Engine`].
///
/// `inserted_keys` records every key this transaction has inserted, in
/// order, so `abort` can roll them back by deleting them again — the
/// engine keeps no undo log beyond this in-memory list, since an aborted
/// transaction's WAL records are simply never replayed during recovery.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: u64,
    pub state: TxnState,
    pub inserted_keys: Vec<Vec<u8>>,
}

impl Transaction {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: TxnState::Active,
            inserted_keys: Vec::new(),
        }
    }
}
