//! Error types for Sable.

use thiserror::Error;

/// Result type alias using SableError.
pub type Result<T> = std::result::Result<T, SableError>;

/// Errors that can occur in Sable operations.
#[derive(Debug, Error)]
pub enum SableError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Storage errors
    #[error("Short read on page {page_id}: expected {expected} bytes, got {actual}")]
    ShortRead {
        page_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Page not found: {page_id}")]
    PageNotFound { page_id: String },

    #[error("Page {page_num} out of range for file {file_id} with {num_pages} pages")]
    PageOutOfRange {
        file_id: u32,
        page_num: u32,
        num_pages: u32,
    },

    #[error("Page full, unable to insert tuple")]
    PageFull,

    #[error("Buffer pool full, unable to allocate frame")]
    BufferPoolFull,

    #[error("File not registered: {0}")]
    FileNotRegistered(u32),

    // Transaction errors
    #[error("Transaction {txn} aborted: {reason}")]
    TransactionAborted { txn: u64, reason: String },

    #[error("Transaction {txn} does not hold an exclusive lock on page {page_id}")]
    LockNotHeld { txn: u64, page_id: String },

    // Schema and type errors
    #[error("Schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Field index {index} out of bounds for {len} fields")]
    FieldIndexOutOfBounds { index: usize, len: usize },

    #[error("Schema must contain at least one field")]
    EmptySchema,

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Corrupt field data: {0}")]
    CorruptField(String),

    // Tuple placement errors
    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Tuple is not stored on any page")]
    MissingTupleId,

    #[error("Slot {slot} on page {page_id} is not occupied")]
    SlotNotOccupied { page_id: String, slot: usize },

    #[error("Tuple belongs to page {actual}, not {expected}")]
    WrongPage { expected: String, actual: String },

    // Catalog errors
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Catalog parse error on line {line_no} ({line:?}): {reason}")]
    CatalogParse {
        line_no: usize,
        line: String,
        reason: String,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SableError {
    /// Returns true if the error means the transaction must be rolled back.
    pub fn is_abort(&self) -> bool {
        matches!(self, SableError::TransactionAborted { .. })
    }
}
