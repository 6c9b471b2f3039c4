use std::io;
use thiserror::Error;

/// Error types for M2 model decoding and runtime setup
#[derive(Error, Debug)]
pub enum M2Error {
    /// I/O Error during reading
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid magic number in the file header
    #[error("Invalid magic number: expected '{expected}', got '{actual}'")]
    InvalidMagic { expected: String, actual: String },

    /// Unsupported file version
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u32),

    /// The provider had no file for this path
    #[error("File not found: {0}")]
    NotFound(String),

    /// The file exists but holds no bytes
    #[error("Empty file: {0}")]
    EmptyFile(String),

    /// An offset/count table points outside of the buffer
    #[error("Table '{table}' out of bounds: {count} x {record_size} bytes at offset {offset}, buffer is {len} bytes")]
    OutOfBounds {
        table: &'static str,
        offset: u32,
        count: u32,
        record_size: usize,
        len: usize,
    },

    /// Error during parsing
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A particle or ribbon definition could not be turned into an emitter
    #[error("Invalid emitter {index}: {reason}")]
    InvalidEmitter { index: usize, reason: String },

    /// Animation id with no registered sequences
    #[error("Unknown animation id: {0}")]
    UnknownAnimation(u16),

    /// The loader shut down before a queued model was decoded
    #[error("Load of {0} cancelled, the loader shut down")]
    Cancelled(String),

    /// Decoding panicked inside a loader thread
    #[error("Decoding {path} panicked: {message}")]
    DecodePanic { path: String, message: String },

    /// Reference error: invalid index into another table
    #[error("Reference error: {0}")]
    ReferenceError(String),
}

/// Result type using M2Error
pub type Result<T> = std::result::Result<T, M2Error>;
