//! Error types for `CriKit`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `CriKit` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== UTF Table Errors ====================
    /// The data is not a valid @UTF table.
    #[error("invalid UTF table magic: expected @UTF, found {0:?}")]
    InvalidUtfMagic([u8; 4]),

    /// A table column uses a value type this library does not know.
    #[error("unknown UTF field type: {type_id:#04x}")]
    UnknownFieldType {
        /// The type nibble from the column flags byte.
        type_id: u8,
    },

    /// A table column uses a storage class this library does not know.
    #[error("unknown UTF storage class: {storage:#04x}")]
    UnknownStorageClass {
        /// The storage nibble from the column flags byte.
        storage: u8,
    },

    /// A field requested by name does not exist in the table schema.
    #[error("field not found in UTF table: {0}")]
    FieldNotFound(String),

    /// A field exists but holds a different value type than requested.
    #[error("field {name} has type {actual}, expected {expected}")]
    FieldTypeMismatch {
        /// The field name.
        name: String,
        /// The type the caller asked for.
        expected: &'static str,
        /// The type the schema declares.
        actual: &'static str,
    },

    /// A row index is past the end of the table.
    #[error("row {row} out of bounds (table has {rows} rows)")]
    RowOutOfBounds {
        /// The requested row.
        row: usize,
        /// The number of rows in the table.
        rows: usize,
    },

    /// A field was accessed before the row cursor was advanced.
    #[error("row cursor not advanced before field access")]
    CursorNotAdvanced,

    /// A row pushed into a table does not match the schema of the first row.
    #[error("row does not match table schema: {0}")]
    SchemaMismatch(String),

    // ==================== AFS2 Archive Errors ====================
    /// The data is not a valid AFS2 archive.
    #[error("invalid AFS2 magic: expected AFS2, found {0:?}")]
    InvalidAfs2Magic([u8; 4]),

    /// The AFS2 archive uses field widths this library does not support.
    #[error("unsupported AFS2 layout: offset width {offset_width}, id width {id_width}")]
    UnsupportedAfs2Layout {
        /// Width of each offset entry in bytes.
        offset_width: u8,
        /// Width of each id entry in bytes.
        id_width: u8,
    },

    // ==================== CPK Archive Errors ====================
    /// The data is not a valid CPK archive.
    #[error("invalid CPK magic: expected 'CPK ', found {0:?}")]
    InvalidCpkMagic([u8; 4]),

    /// A chunk header inside a CPK archive has the wrong magic.
    #[error("missing {magic} chunk in CPK archive")]
    MissingCpkChunk {
        /// The expected chunk magic.
        magic: &'static str,
    },

    /// The CPK archive carries no id index (ITOC).
    #[error("CPK archive has no ITOC index")]
    MissingCpkItoc,

    // ==================== Shared Archive Errors ====================
    /// No entry with the given id exists in the archive index.
    #[error("no archive entry with id {id}")]
    EntryNotFound {
        /// The requested entry id.
        id: u16,
    },

    /// An entry was added twice with the same id.
    #[error("duplicate archive entry id {id}")]
    DuplicateEntryId {
        /// The offending id.
        id: u16,
    },

    /// An entry parsed from an existing archive has no payload source file,
    /// so it cannot be embedded into a new archive.
    #[error("archive entry {id} has no payload source to embed")]
    NoPayloadSource {
        /// The entry id.
        id: u16,
    },

    /// A payload source file disappeared between add and save.
    #[error("payload source not found: {path}")]
    PayloadSourceMissing {
        /// The missing source file path.
        path: PathBuf,
    },

    // ==================== Extraction Errors ====================
    /// Batched extraction completed but some copy jobs failed.
    #[error("extraction failed for {failed} of {total} files: {first_error}")]
    ExtractionPartialFailure {
        /// Total number of copy jobs.
        total: usize,
        /// Number of failed jobs.
        failed: usize,
        /// The first error message encountered.
        first_error: String,
    },

    /// Worker pool construction failed.
    #[error("thread pool setup failed: {0}")]
    ThreadPool(String),

    // ==================== Generic/Fallback Errors ====================
    /// UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// Unexpected end of file.
    #[error("unexpected end of file")]
    UnexpectedEof,

    /// Invalid format error (use specific variants when possible).
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// A specialized Result type for `CriKit` operations.
pub type Result<T> = std::result::Result<T, Error>;
