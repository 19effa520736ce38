//! # CriKit
//!
//! A pure-Rust library for CRI middleware container formats.
//!
//! ## Supported Formats
//!
//! - **@UTF tables** - The binary key/value row-table structure that frames
//!   ACB cue sheets and the internal indices of CPK archives
//! - **AFS2 archives** - The lightweight id-indexed payload container ("AWB"),
//!   with optional 16-bit obfuscation key metadata
//! - **CPK archives** - The generic length-indexed container, id-keyed mode
//! - **Batched extraction** - Parallel byte-span copy jobs for pulling
//!   payloads out of either archive kind
//!
//! ## Quick Start
//!
//! ```no_run
//! use crikit::utf::UtfReader;
//!
//! // Walk the rows of a cue sheet table
//! let mut reader = UtfReader::open("BGM.acb")?;
//! while reader.next_row()? {
//!     let len = reader.data_len("AwbFile")?;
//!     println!("inline archive: {len} bytes");
//! }
//! # Ok::<(), crikit::Error>(())
//! ```
//!
//! Payload bytes are always treated as opaque: this library indexes and
//! copies them but never decodes audio.

pub mod afs2;
pub mod cpk;
pub mod error;
pub mod extract;
pub mod utf;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::afs2::{Afs2Archive, Afs2Entry};
    pub use crate::cpk::{CpkArchive, CpkEntry};
    pub use crate::error::{Error, Result};
    pub use crate::extract::{DataExtractor, ExtractorConfig};
    pub use crate::utf::{UtfReader, UtfTable, UtfValue, WriterConfig};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
