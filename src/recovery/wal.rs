//! Append-only write-ahead log file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::Result;

use super::record::{WalRecord, WalRecordType};

/// The log file backing a single database. Not thread-safe on its own;
/// the transactional engine serializes access behind a lock, matching how
/// [`crate::storage::DiskManager`] is serialized behind the buffer pool.
pub struct Wal {
    file: File,
    next_lsn: u64,
}

impl Wal {
    /// Open the log at `path`, creating it if it doesn't exist, and
    /// initialize the LSN counter by scanning to the highest LSN already
    /// present (zero if the log is empty or new).
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let mut wal = Self { file, next_lsn: 1 };
        let records = wal.read_all()?;
        let max_lsn = records.iter().map(|r| r.lsn).max().unwrap_or(0);
        wal.next_lsn = max_lsn + 1;
        Ok(wal)
    }

    /// Whether the log currently holds no records.
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.read_all()?.is_empty())
    }

    fn append(
        &mut self,
        record_type: WalRecordType,
        txn_id: u64,
        page_id: u32,
        key: Vec<u8>,
        value: Vec<u8>,
    ) -> Result<u64> {
        let lsn = self.next_lsn;
        self.next_lsn += 1;

        let record = WalRecord::new(record_type, lsn, txn_id, page_id, key, value);
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&record.encode())?;
        Ok(lsn)
    }

    pub fn log_insert(&mut self, txn_id: u64, key: &[u8], value: &[u8]) -> Result<u64> {
        self.append(WalRecordType::Insert, txn_id, 0, key.to_vec(), value.to_vec())
    }

    pub fn log_update(&mut self, txn_id: u64, key: &[u8], value: &[u8]) -> Result<u64> {
        self.append(WalRecordType::Update, txn_id, 0, key.to_vec(), value.to_vec())
    }

    pub fn log_delete(&mut self, txn_id: u64, key: &[u8]) -> Result<u64> {
        self.append(WalRecordType::Delete, txn_id, 0, key.to_vec(), Vec::new())
    }

    pub fn log_begin(&mut self, txn_id: u64) -> Result<u64> {
        self.append(WalRecordType::Begin, txn_id, 0, Vec::new(), Vec::new())
    }

    pub fn log_commit(&mut self, txn_id: u64) -> Result<u64> {
        self.append(WalRecordType::Commit, txn_id, 0, Vec::new(), Vec::new())
    }

    pub fn log_abort(&mut self, txn_id: u64) -> Result<u64> {
        self.append(WalRecordType::Abort, txn_id, 0, Vec::new(), Vec::new())
    }

    pub fn log_checkpoint(&mut self) -> Result<u64> {
        self.append(WalRecordType::Checkpoint, 0, 0, Vec::new(), Vec::new())
    }

    /// Force the log to stable storage.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Read every record currently in the log, in order. Stops at the
    /// first record that fails checksum verification or is truncated —
    /// everything up to that point is trusted, everything after is
    /// discarded as an interrupted write.
    pub fn read_all(&mut self) -> Result<Vec<WalRecord>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::new();
        self.file.read_to_end(&mut buf)?;

        let mut records = Vec::new();
        let mut offset = 0;
        while offset < buf.len() {
            match WalRecord::decode(&buf[offset..]) {
                Ok(Some((record, consumed))) => {
                    offset += consumed;
                    records.push(record);
                }
                Ok(None) | Err(_) => break,
            }
        }
        Ok(records)
    }

    /// Discard all records (called after a checkpoint has made them
    /// durable in the page store). The LSN counter keeps counting up.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}
