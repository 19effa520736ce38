//! Shared types for the unpack/pack pipelines

use std::path::PathBuf;

use crikit::afs2::Afs2Archive;
use crikit::cpk::CpkArchive;

use crate::error::Result;

/// One fully resolved cue: where its payload bytes live and where they go.
#[derive(Debug, Clone)]
pub struct ResolvedAsset {
    /// File holding the payload (the container itself, or the streaming
    /// archive).
    pub source: PathBuf,
    /// Absolute byte offset of the payload within `source`.
    pub offset: u64,
    /// Payload length in bytes.
    pub length: u64,
    /// Destination file: cue name, optional `_streaming` suffix, codec
    /// extension.
    pub destination: PathBuf,
}

/// A parsed archive index for one slot, tagged by container format.
///
/// The slot-to-format decision is made once per slot and held through this
/// tag; lookups dispatch on it instead of re-branching per entry.
#[derive(Debug)]
pub(crate) enum ArchiveIndex {
    Afs2(Afs2Archive),
    Cpk(CpkArchive),
}

impl ArchiveIndex {
    /// Offset/length of an entry, relative to the archive start.
    pub(crate) fn entry_span(&self, id: u16) -> Result<(u64, u64)> {
        match self {
            Self::Afs2(archive) => {
                let entry = archive.entry(id)?;
                Ok((entry.offset, entry.length))
            }
            Self::Cpk(archive) => {
                let entry = archive.entry(id)?;
                Ok((entry.offset, entry.length))
            }
        }
    }
}

/// Phase of an unpack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcbPhase {
    /// Reading the cue sheet table.
    ReadingSheet,
    /// Resolving cues against the archive indices.
    ResolvingCues,
    /// Copying payload bytes to disk.
    ExtractingFiles,
    /// Operation complete.
    Complete,
}

impl AcbPhase {
    /// Get a human-readable description of this phase.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadingSheet => "Reading cue sheet",
            Self::ResolvingCues => "Resolving cues",
            Self::ExtractingFiles => "Extracting files",
            Self::Complete => "Complete",
        }
    }
}

/// Progress information during unpack operations.
#[derive(Debug, Clone)]
pub struct AcbProgress {
    /// Current operation phase.
    pub phase: AcbPhase,
    /// Current item number (1-indexed).
    pub current: usize,
    /// Total number of items.
    pub total: usize,
    /// Current file being processed (if applicable).
    pub current_file: Option<String>,
}

impl AcbProgress {
    /// Create a new progress update.
    #[must_use]
    pub fn new(phase: AcbPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_file: None,
        }
    }
}

/// Progress callback for unpack operations.
///
/// Must be `Sync + Send` because the copy phase reports from worker threads.
pub type ProgressCallback<'a> = &'a (dyn Fn(&AcbProgress) + Sync + Send);
