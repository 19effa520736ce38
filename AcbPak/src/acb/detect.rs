//! Archive format detection
//!
//! No field of the cue sheet reliably states which container format an
//! archive slot uses, so classification works on content: peek at the magic
//! bytes and decide. The peek restores the stream position because the same
//! source is handed to the actual archive reader afterwards.

use std::io::{Read, Seek, SeekFrom};

use crikit::afs2::AFS2_SIGNATURE;
use crikit::utf::{UTF_SIGNATURE, UtfReader};

use crate::error::Result;

/// The two archive container formats a slot can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Generic length-indexed container (CPK).
    Cpk,
    /// Lightweight id-indexed container (AFS2), optionally keyed.
    Afs2,
}

impl ArchiveFormat {
    /// Get a human-readable name for this format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpk => "CPK",
            Self::Afs2 => "AFS2",
        }
    }
}

/// Classify the archive starting at the source's current position.
///
/// Pure peek: the stream position is saved, four bytes are read, and the
/// position is restored before returning. An AFS2 signature classifies as
/// [`ArchiveFormat::Afs2`]; anything else is [`ArchiveFormat::Cpk`].
pub fn archive_format<R: Read + Seek>(source: &mut R) -> Result<ArchiveFormat> {
    let saved = source.stream_position()?;
    let mut magic = [0u8; 4];
    let format = match source.read_exact(&mut magic) {
        Ok(()) if magic == AFS2_SIGNATURE => ArchiveFormat::Afs2,
        _ => ArchiveFormat::Cpk,
    };
    source.seek(SeekFrom::Start(saved))?;
    Ok(format)
}

/// Classify an archive blob held in memory.
#[must_use]
pub fn blob_format(blob: &[u8]) -> ArchiveFormat {
    if blob.len() >= 4 && blob[..4] == AFS2_SIGNATURE {
        ArchiveFormat::Afs2
    } else {
        ArchiveFormat::Cpk
    }
}

/// Unwrap a streaming archive header blob.
///
/// Some sheets store the AFS2 index directly; others wrap it in a one-row
/// @UTF table whose `Header` field holds the index. Detect the wrapper by
/// its magic and peel it off before archive parsing.
pub fn unwrap_streaming_header(blob: Vec<u8>) -> Result<Vec<u8>> {
    if blob.len() >= 4 && blob[..4] == UTF_SIGNATURE {
        let mut wrapper = UtfReader::from_bytes(blob)?;
        wrapper.next_row()?;
        Ok(wrapper.get_data("Header")?)
    } else {
        Ok(blob)
    }
}
