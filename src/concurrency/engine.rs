//! The transactional engine: composes the buffer pool, the B+-tree and
//! the WAL into a single durable key/value store with transaction
//! boundaries and crash recovery.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::config::{DEFAULT_POOL_SIZE, WAL_FILE_SUFFIX};
use crate::common::{Error, PageId, Result};
use crate::index::BTree;
use crate::recovery::{Wal, WalRecordType};

use super::transaction::{Transaction, TxnState};

/// Reserved transaction id for auto-committed, non-transactional
/// mutations. Always replayed on recovery regardless of the committed
/// set, since there is no begin/commit pair to look for.
const AUTO_TXN_ID: u64 = 0;

fn wal_path_for(db_path: &Path) -> PathBuf {
    let mut os_string = db_path.as_os_str().to_os_string();
    os_string.push(WAL_FILE_SUFFIX);
    PathBuf::from(os_string)
}

/// The single-writer transactional key/value engine backing a database.
pub struct Engine {
    bpm: Arc<BufferPoolManager>,
    btree: BTree,
    wal: Mutex<Wal>,
    next_txn_id: AtomicU64,
    transactions: Mutex<HashMap<u64, Transaction>>,
}

impl Engine {
    /// Open (or create) the database file at `db_path`, running crash
    /// recovery against its WAL sidecar if one holds records.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::open_with_pool_size(db_path, DEFAULT_POOL_SIZE)
    }

    pub fn open_with_pool_size<P: AsRef<Path>>(db_path: P, pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref();
        let disk_manager = crate::storage::DiskManager::open_or_create(db_path)?;
        let page_count = disk_manager.page_count();

        let bpm = Arc::new(BufferPoolManager::new(pool_size, disk_manager));
        let mut wal = Wal::open_or_create(wal_path_for(db_path))?;
        let needs_recovery = !wal.is_empty()?;

        // An existing multi-page file already has a B+-tree root at page
        // 1; anything smaller (empty, or just the bookkeeping from a
        // prior open that never got past an empty root) starts fresh.
        let btree = if page_count > 1 {
            BTree::open(Arc::clone(&bpm), PageId::new(1))
        } else {
            BTree::create(Arc::clone(&bpm))?
        };

        let engine = Self {
            bpm,
            btree,
            wal: Mutex::new(wal),
            next_txn_id: AtomicU64::new(1),
            transactions: Mutex::new(HashMap::new()),
        };

        if needs_recovery {
            engine.recover()?;
        }

        Ok(engine)
    }

    fn recover(&self) -> Result<()> {
        let records = self.wal.lock().read_all()?;

        let mut committed = HashSet::new();
        let mut aborted = HashSet::new();
        let mut max_txn_id = 0u64;
        for record in &records {
            max_txn_id = max_txn_id.max(record.txn_id);
            match record.record_type {
                WalRecordType::Commit => {
                    committed.insert(record.txn_id);
                }
                WalRecordType::Abort => {
                    aborted.insert(record.txn_id);
                }
                _ => {}
            }
        }
        // A transaction id seen in both sets is treated as aborted.
        committed.retain(|id| !aborted.contains(id));

        let checkpoint_idx = records
            .iter()
            .rposition(|r| r.record_type == WalRecordType::Checkpoint);
        let start = checkpoint_idx.map(|i| i + 1).unwrap_or(0);

        for record in &records[start..] {
            let replay = record.txn_id == AUTO_TXN_ID || committed.contains(&record.txn_id);
            if !replay {
                continue;
            }
            match record.record_type {
                WalRecordType::Insert | WalRecordType::Update => {
                    self.btree.insert(&record.key, &record.value)?;
                }
                WalRecordType::Delete => {
                    self.btree.delete(&record.key)?;
                }
                _ => {}
            }
        }

        self.next_txn_id.store(max_txn_id + 1, Ordering::SeqCst);
        Ok(())
    }

    fn check_active(&self, txn_id: u64) -> Result<()> {
        if txn_id == AUTO_TXN_ID {
            return Ok(());
        }
        match self.transactions.lock().get(&txn_id) {
            Some(txn) if txn.state == TxnState::Active => Ok(()),
            Some(_) => Err(Error::state(format!("transaction {txn_id} is not active"))),
            None => Err(Error::state(format!("unknown transaction {txn_id}"))),
        }
    }

    /// Begin a new explicit transaction, returning its id.
    pub fn begin(&self) -> Result<u64> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut wal = self.wal.lock();
            wal.log_begin(txn_id)?;
            wal.flush()?;
        }
        self.transactions.lock().insert(txn_id, Transaction::new(txn_id));
        Ok(txn_id)
    }

    /// Commit an active transaction.
    pub fn commit(&self, txn_id: u64) -> Result<()> {
        self.check_active(txn_id)?;
        {
            let mut wal = self.wal.lock();
            wal.log_commit(txn_id)?;
            wal.flush()?;
        }
        self.bpm.flush_all_pages()?;
        self.transactions.lock().remove(&txn_id);
        Ok(())
    }

    /// Abort an active transaction, rolling back every key it inserted.
    pub fn abort(&self, txn_id: u64) -> Result<()> {
        let inserted_keys = {
            let mut txns = self.transactions.lock();
            let txn = txns
                .get_mut(&txn_id)
                .ok_or_else(|| Error::state(format!("unknown transaction {txn_id}")))?;
            if txn.state != TxnState::Active {
                return Err(Error::state(format!("transaction {txn_id} is not active")));
            }
            txn.state = TxnState::Aborted;
            std::mem::take(&mut txn.inserted_keys)
        };

        for key in &inserted_keys {
            self.btree.delete(key)?;
        }

        {
            let mut wal = self.wal.lock();
            wal.log_abort(txn_id)?;
            wal.flush()?;
        }
        self.bpm.flush_all_pages()?;
        self.transactions.lock().remove(&txn_id);
        Ok(())
    }

    /// Write the abort record a failed auto-transaction must still leave
    /// behind, per the error-handling rules: its WAL record is already
    /// appended by the time the underlying B+-tree op can fail, so the log
    /// needs a follow-up abort marker or it would misreport the op as
    /// having taken effect. Explicit transactions are exempt — the caller
    /// owns calling `abort()` for those. Best-effort: a failure writing the
    /// abort record itself must never mask the original error.
    fn log_auto_txn_abort_on_error(&self, txn_id: u64) {
        if txn_id != AUTO_TXN_ID {
            return;
        }
        let mut wal = self.wal.lock();
        let _ = wal.log_abort(txn_id);
        let _ = wal.flush();
    }

    /// Insert under an explicit transaction.
    pub fn insert_txn(&self, txn_id: u64, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.check_active(txn_id)?;
        {
            let mut wal = self.wal.lock();
            wal.log_insert(txn_id, &key, &value)?;
            wal.flush()?;
        }
        if let Err(err) = self.btree.insert(&key, &value) {
            self.log_auto_txn_abort_on_error(txn_id);
            return Err(err);
        }
        if txn_id != AUTO_TXN_ID {
            if let Some(txn) = self.transactions.lock().get_mut(&txn_id) {
                txn.inserted_keys.push(key);
            }
        }
        Ok(())
    }

    /// Delete under an explicit transaction.
    pub fn delete_txn(&self, txn_id: u64, key: &[u8]) -> Result<()> {
        self.check_active(txn_id)?;
        {
            let mut wal = self.wal.lock();
            wal.log_delete(txn_id, key)?;
            wal.flush()?;
        }
        let deleted = match self.btree.delete(key) {
            Ok(deleted) => deleted,
            Err(err) => {
                self.log_auto_txn_abort_on_error(txn_id);
                return Err(err);
            }
        };
        if !deleted {
            self.log_auto_txn_abort_on_error(txn_id);
            return Err(Error::not_found(String::from_utf8_lossy(key).to_string()));
        }
        Ok(())
    }

    /// Auto-transaction insert: logged under the reserved id 0, applied
    /// immediately, always replayed on recovery.
    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.insert_txn(AUTO_TXN_ID, key, value)
    }

    /// Auto-transaction delete.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.delete_txn(AUTO_TXN_ID, key)
    }

    /// Point lookup. Errors with [`Error::NotFound`] on a missing key, per
    /// the literal `get`/`NotFound` contract the error-handling rules and
    /// abort-rollback scenario spell out; callers that legitimately expect
    /// an absent key (e.g. catalog stats before a table's first row) should
    /// use [`Engine::get_opt`] instead.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.get_opt(key)?.ok_or_else(|| Error::not_found(String::from_utf8_lossy(key).to_string()))
    }

    /// Point lookup returning `None` rather than erroring on a missing key.
    pub fn get_opt(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.btree.search(key)
    }

    pub fn range_scan(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.btree.range_scan(start, end)
    }

    /// Write a checkpoint record, flush every dirty page, flush the log,
    /// then truncate it — everything before the checkpoint is now durable
    /// in the page store itself and need not be replayed again.
    pub fn checkpoint(&self) -> Result<()> {
        {
            let mut wal = self.wal.lock();
            wal.log_checkpoint()?;
        }
        self.bpm.flush_all_pages()?;
        let mut wal = self.wal.lock();
        wal.flush()?;
        wal.truncate()?;
        Ok(())
    }
}
