//! ACB cue sheet operations
//!
//! Two pipelines over one data model: [`AcbExtractor`] unpacks a container
//! into per-cue audio files, [`AcbPacker`] rebuilds the container from a
//! previously-unpacked directory. Both resolve cues the same way, so the two
//! directions are inverses of each other.

mod codec;
mod detect;
mod extractor;
mod packer;
mod paths;
mod sheet;
mod sidecar;
mod tables;
mod types;

// Primary public API
pub use extractor::AcbExtractor;
pub use packer::{AcbPacker, PackProgressCallback};

// Re-export public types
pub use detect::ArchiveFormat;
pub use sheet::CueSheet;
pub use types::{AcbPhase, AcbProgress, ProgressCallback, ResolvedAsset};

// Internal API (used by the CLI)
pub use codec::extension_for_codec;
pub use paths::output_dir_for;

use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::Result;

/// Unpack an `.acb` container into its sibling directory (the container
/// path with the extension stripped), using default settings.
///
/// Returns the output directory path.
///
/// # Errors
/// See [`AcbExtractor::extract`].
pub fn unpack_acb<P: AsRef<Path>>(acb_path: P) -> Result<PathBuf> {
    let acb_path = acb_path.as_ref();
    let output_dir = paths::output_dir_for(acb_path);
    let extractor = AcbExtractor::new(Settings::default().extractor_config());
    extractor.extract(acb_path, output_dir.as_path(), &|_| {})?;
    Ok(output_dir)
}

/// Rebuild the container belonging to an unpacked directory, using default
/// settings. The original `.acb` must still sit next to the directory.
///
/// Returns the container path that was rewritten.
///
/// # Errors
/// See [`AcbPacker::pack`].
pub fn pack_dir<P: AsRef<Path>>(dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let packer = AcbPacker::new(Settings::default().extractor_config());
    packer.pack(dir, &|_, _, _| {})
}
