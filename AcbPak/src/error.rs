//! Error types for `AcbPak`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `AcbPak` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine-level table/archive format error.
    #[error(transparent)]
    Format(#[from] crikit::Error),

    // ==================== Input Errors ====================
    /// The input path is neither an .acb file nor an unpacked directory.
    #[error("input is neither an .acb file nor a directory: {path}")]
    UnrecognizedInput {
        /// The offending path.
        path: PathBuf,
    },

    /// The cue sheet table has no rows.
    #[error("cue sheet table has no rows")]
    EmptyCueSheet,

    // ==================== Missing Dependency Errors ====================
    /// A streaming entry is referenced but no companion AWB file exists
    /// under any of the probed names.
    #[error(
        "unable to locate the corresponding streaming AWB file for {acb}; \
         ensure it is in the same directory"
    )]
    MissingStreamingArchive {
        /// The container whose streaming archive is missing.
        acb: PathBuf,
    },

    /// Packing requires the original container next to the unpacked
    /// directory, and it is gone.
    #[error("unable to locate the corresponding ACB file: {path}")]
    MissingAcbFile {
        /// The expected container path.
        path: PathBuf,
    },

    // ==================== Lookup Errors ====================
    /// A waveform row's positional cue index has no name-table entry.
    #[error("cue index {index} has no entry in the cue name table")]
    CueNameNotFound {
        /// The positional cue index.
        index: usize,
    },

    /// A waveform references the inline archive but the container holds
    /// none.
    #[error("waveform references the memory archive but the container holds none")]
    MissingMemoryArchive,

    /// The name and waveform tables must pair up row for row.
    #[error("cue name table has {names} rows but waveform table has {waveforms}")]
    TableLengthMismatch {
        /// Rows in the cue name table.
        names: usize,
        /// Rows in the waveform table.
        waveforms: usize,
    },

    // ==================== Pack Input Errors ====================
    /// An expected per-cue input file is absent from the unpacked directory.
    #[error("unable to locate {path}")]
    MissingInputFile {
        /// The exact path that was expected.
        path: PathBuf,
    },
}

/// A specialized Result type for `AcbPak` operations.
pub type Result<T> = std::result::Result<T, Error>;
