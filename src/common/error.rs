//! Error types for InterchangeDB.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in InterchangeDB.
///
/// A single enum is shared by every layer (page store up through the SQL
/// executor) so callers only ever match on one error type.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    #[error("no free frames available in buffer pool")]
    NoFreeFrames,

    /// The provided page ID is invalid (e.g., exceeds max pages, or is 0).
    #[error("invalid page id: {0}")]
    InvalidPageId(u32),

    /// Buffer pool is at maximum capacity.
    #[error("buffer pool is full")]
    BufferPoolFull,

    /// Attempted to unpin a page that wasn't pinned.
    #[error("page {0} is not pinned")]
    PageNotPinned(u32),

    /// A page's stored checksum does not match its contents.
    #[error("page {0} failed checksum verification")]
    PageCorrupt(u32),

    /// Malformed SQL text.
    #[error("parse error at offset {offset}: {message}")]
    ParseError { offset: usize, message: String },

    /// Unknown table, unknown column, duplicate table, arity mismatch, etc.
    #[error("schema error: {0}")]
    SchemaError(String),

    /// A value could not be coerced to its declared column type.
    #[error("type error: {0}")]
    TypeError(String),

    /// A point lookup or delete targeted a key that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An operation was attempted against a transaction in a terminal
    /// state, or against an unknown transaction id.
    #[error("transaction state error: {0}")]
    StateError(String),

    /// The B+-tree or WAL detected structural corruption beyond a simple
    /// checksum mismatch on a single record (which is handled silently).
    #[error("corruption detected: {0}")]
    CorruptionError(String),
}

impl Error {
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::SchemaError(msg.into())
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Error::TypeError(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound(key.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Error::StateError(msg.into())
    }

    pub fn parse(offset: usize, message: impl Into<String>) -> Self {
        Error::ParseError {
            offset,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "page 42 not found");

        let err = Error::NoFreeFrames;
        assert_eq!(format!("{}", err), "no free frames available in buffer pool");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {}
            _ => panic!("expected Io error"),
        }
    }

    #[test]
    fn test_result_type_alias() {
        fn might_fail() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(might_fail().unwrap(), 42);
    }

    #[test]
    fn test_schema_error_helper() {
        let err = Error::schema("table 'x' already exists");
        assert_eq!(format!("{}", err), "schema error: table 'x' already exists");
    }
}
