//! WAL record type and wire format.
//!
//! Each record is laid out as:
//!
//! ```text
//! type:u8  lsn:u64  txn_id:u64  page_id:u32  key_len:u16  key  value_len:u16  value  checksum:u32
//! ```
//!
//! all multi-byte fields little-endian. `checksum` is the bitwise XOR of
//! the record's type, LSN, transaction id and page id (each folded down to
//! a `u32`), XORed with every byte of `key` and `value`.

use crate::common::{Error, Result};

const HEADER_LEN: usize = 1 + 8 + 8 + 4; // type + lsn + txn_id + page_id
const LEN_PREFIX: usize = 2;
const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    Insert = 1,
    Update = 2,
    Delete = 3,
    Checkpoint = 4,
    Begin = 5,
    Commit = 6,
    Abort = 7,
}

impl WalRecordType {
    fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(WalRecordType::Insert),
            2 => Ok(WalRecordType::Update),
            3 => Ok(WalRecordType::Delete),
            4 => Ok(WalRecordType::Checkpoint),
            5 => Ok(WalRecordType::Begin),
            6 => Ok(WalRecordType::Commit),
            7 => Ok(WalRecordType::Abort),
            other => Err(Error::CorruptionError(format!(
                "unknown WAL record type {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalRecord {
    pub record_type: WalRecordType,
    pub lsn: u64,
    pub txn_id: u64,
    pub page_id: u32,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl WalRecord {
    pub fn new(
        record_type: WalRecordType,
        lsn: u64,
        txn_id: u64,
        page_id: u32,
        key: Vec<u8>,
        value: Vec<u8>,
    ) -> Self {
        Self {
            record_type,
            lsn,
            txn_id,
            page_id,
            key,
            value,
        }
    }

    fn checksum(&self) -> u32 {
        compute_checksum(
            self.record_type as u8,
            self.lsn,
            self.txn_id,
            self.page_id,
            &self.key,
            &self.value,
        )
    }

    /// Serialize this record, appending its trailing checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            HEADER_LEN + LEN_PREFIX + self.key.len() + LEN_PREFIX + self.value.len() + CHECKSUM_LEN,
        );
        buf.push(self.record_type as u8);
        buf.extend_from_slice(&self.lsn.to_le_bytes());
        buf.extend_from_slice(&self.txn_id.to_le_bytes());
        buf.extend_from_slice(&self.page_id.to_le_bytes());
        buf.extend_from_slice(&(self.key.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&(self.value.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.value);
        buf.extend_from_slice(&self.checksum().to_le_bytes());
        buf
    }

    /// Decode one record from the front of `bytes`, returning it along
    /// with the number of bytes consumed. Returns `Ok(None)` if `bytes`
    /// doesn't hold a complete record (a short, truncated trailing write).
    /// Returns `Err` only for a structurally-decodable record whose stored
    /// checksum doesn't match — real corruption, not a torn write.
    pub fn decode(bytes: &[u8]) -> Result<Option<(WalRecord, usize)>> {
        if bytes.len() < HEADER_LEN + LEN_PREFIX {
            return Ok(None);
        }

        let record_type = match WalRecordType::from_u8(bytes[0]) {
            Ok(t) => t,
            Err(_) => return Ok(None),
        };
        let lsn = u64::from_le_bytes(bytes[1..9].try_into().unwrap());
        let txn_id = u64::from_le_bytes(bytes[9..17].try_into().unwrap());
        let page_id = u32::from_le_bytes(bytes[17..21].try_into().unwrap());

        let mut offset = HEADER_LEN;
        let key_len = u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap()) as usize;
        offset += LEN_PREFIX;
        if offset + key_len + LEN_PREFIX > bytes.len() {
            return Ok(None);
        }
        let key = bytes[offset..offset + key_len].to_vec();
        offset += key_len;

        let value_len = u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap()) as usize;
        offset += LEN_PREFIX;
        if offset + value_len + CHECKSUM_LEN > bytes.len() {
            return Ok(None);
        }
        let value = bytes[offset..offset + value_len].to_vec();
        offset += value_len;

        let stored_checksum = u32::from_le_bytes(bytes[offset..offset + CHECKSUM_LEN].try_into().unwrap());
        offset += CHECKSUM_LEN;

        let record = WalRecord {
            record_type,
            lsn,
            txn_id,
            page_id,
            key,
            value,
        };

        if record.checksum() != stored_checksum {
            return Err(Error::CorruptionError(format!(
                "WAL record at lsn {lsn} failed checksum verification"
            )));
        }

        Ok(Some((record, offset)))
    }
}

fn compute_checksum(record_type: u8, lsn: u64, txn_id: u64, page_id: u32, key: &[u8], value: &[u8]) -> u32 {
    let mut acc = record_type as u32;
    acc ^= (lsn as u32) ^ ((lsn >> 32) as u32);
    acc ^= (txn_id as u32) ^ ((txn_id >> 32) as u32);
    acc ^= page_id;
    for &b in key.iter().chain(value.iter()) {
        acc ^= b as u32;
    }
    acc
}
