//! # AcbPak
//!
//! Unpack and repack CRI ACB audio cue sheets.
//!
//! An `.acb` file is one big @UTF table whose cells carry the cue name
//! table, the waveform table, an optional inline ("memory") payload archive,
//! and an optional streaming archive header whose payloads live in a
//! companion `.awb` file. Either archive slot may be an AFS2 or a CPK
//! container; the format is detected from magic bytes, never trusted from
//! metadata.
//!
//! ## Quick Start
//!
//! ```no_run
//! use acbpak::acb::{pack_dir, unpack_acb};
//!
//! // Unpack BGM.acb into BGM/, one file per cue
//! let out_dir = unpack_acb("BGM.acb")?;
//!
//! // ...edit the audio files, then rebuild the container in place
//! pack_dir(&out_dir)?;
//! # Ok::<(), acbpak::Error>(())
//! ```
//!
//! Round-tripping preserves the archive sub-format, obfuscation keys, and
//! the cue-to-payload mapping of the source container.

pub mod acb;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
