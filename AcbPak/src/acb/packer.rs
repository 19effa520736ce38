//! Pack pipeline
//!
//! The inverse of extraction: re-read the cue structure from the original
//! container (the tool never invents cues), reconstruct each expected input
//! filename, rebuild the archives in the container's own format, and rewrite
//! the sheet. Archive construction is strictly ordered so identical inputs
//! serialize identically across runs.

use std::path::{Path, PathBuf};

use crikit::afs2::Afs2Archive;
use crikit::cpk::CpkArchive;
use crikit::extract::ExtractorConfig;
use crikit::utf::{UtfReader, UtfTable, UtfValue, WriterConfig};

use super::codec;
use super::detect::ArchiveFormat;
use super::paths;
use super::sheet::CueSheet;
use super::sidecar;
use super::tables;
use crate::error::{Error, Result};

/// Progress callback for pack operations: current step, total steps, label.
pub type PackProgressCallback<'a> = &'a dyn Fn(usize, usize, &str);

/// Rebuilds a container from a previously-unpacked directory.
pub struct AcbPacker {
    config: ExtractorConfig,
}

impl AcbPacker {
    #[must_use]
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Pack `dir` back into its sibling `.acb` container, which must still
    /// exist. Returns the container path that was rewritten.
    ///
    /// Every expected input file is checked during the scan, before any
    /// archive bytes are produced; a missing file aborts with the exact path
    /// that was expected.
    ///
    /// # Errors
    /// Returns [`Error::MissingAcbFile`] when the original container is
    /// gone and [`Error::MissingInputFile`] for an absent per-cue file.
    ///
    /// [`Error::MissingAcbFile`]: crate::Error::MissingAcbFile
    /// [`Error::MissingInputFile`]: crate::Error::MissingInputFile
    pub fn pack<P: AsRef<Path>>(&self, dir: P, progress: PackProgressCallback) -> Result<PathBuf> {
        let dir = dir.as_ref();
        let acb_path = paths::acb_sibling(dir);
        if !acb_path.exists() {
            return Err(Error::MissingAcbFile { path: acb_path });
        }

        // Reuse whatever streaming archive name the source shipped with;
        // only a container that never had one falls back to the plain
        // suffix.
        let awb_path = paths::find_streaming_archive(dir)
            .unwrap_or_else(|| paths::fallback_streaming_archive(dir));

        let mut sheet = CueSheet::open(&acb_path)?;
        let target = sheet.target_format();
        tracing::debug!("packing {} as {}", acb_path.display(), target.as_str());

        let names = tables::read_cue_names(&mut UtfReader::from_bytes(sheet.cue_name_table()?)?)?;
        let waveforms =
            tables::read_waveform_rows(&mut UtfReader::from_bytes(sheet.waveform_table()?)?)?;
        tables::validate_alignment(names.len(), waveforms.len())?;

        // Four builders keyed by (streaming, format); the detected target
        // format picks which pair actually fills.
        let mut memory_afs2 = Afs2Archive::new();
        let mut stream_afs2 = Afs2Archive::new();
        let mut memory_cpk = CpkArchive::new();
        let mut stream_cpk = CpkArchive::new();

        let total = waveforms.len();
        for (cue_index, row) in waveforms.iter().enumerate() {
            let name = u16::try_from(cue_index)
                .ok()
                .and_then(|i| names.get(&i))
                .ok_or(Error::CueNameNotFound { index: cue_index })?;
            let file_name = codec::cue_file_name(name, row.streaming, row.codec);
            let input = dir.join(&file_name);
            progress(cue_index + 1, total, &file_name);

            if !input.exists() {
                return Err(Error::MissingInputFile { path: input });
            }

            match (row.streaming, target) {
                (false, ArchiveFormat::Afs2) => memory_afs2.add(row.id, &input)?,
                (true, ArchiveFormat::Afs2) => stream_afs2.add(row.id, &input)?,
                (false, ArchiveFormat::Cpk) => memory_cpk.add(row.id, &input)?,
                (true, ArchiveFormat::Cpk) => stream_cpk.add(row.id, &input)?,
            }
        }

        // Obfuscation keys ride along as sidecar files in the unpacked
        // directory; only Format B carries them.
        if let Some(key) = sidecar::read_key(&dir.join(sidecar::SUBKEY_FILE))? {
            memory_afs2.set_sub_key(key);
        }
        if let Some(key) = sidecar::read_key(&dir.join(sidecar::SUBKEY_STREAMING_FILE))? {
            stream_afs2.set_sub_key(key);
        }

        let header_was_wrapped = sheet.streaming_header_is_wrapped();
        let original_header = sheet.streaming_header().to_vec();
        sheet.clear_archives()?;

        if memory_afs2.count() > 0 || memory_cpk.count() > 0 {
            progress(total, total, "Saving memory archive");
            let bytes = match target {
                ArchiveFormat::Afs2 => memory_afs2.save()?,
                ArchiveFormat::Cpk => memory_cpk.save()?,
            };
            sheet.set_memory_archive(bytes)?;
        }

        if stream_afs2.count() > 0 || stream_cpk.count() > 0 {
            progress(total, total, "Saving streaming archive");
            match target {
                ArchiveFormat::Cpk => {
                    stream_cpk.save_to(&awb_path, self.config.buffer_size)?;
                }
                ArchiveFormat::Afs2 => {
                    stream_afs2.save_to(&awb_path, self.config.buffer_size)?;

                    // The sheet keeps the archive's index inline, either raw
                    // or re-wrapped the way the source stored it.
                    let header = stream_afs2.header_bytes()?;
                    if header_was_wrapped {
                        let mut wrapper = UtfTable::from_bytes(&original_header)?;
                        wrapper.set(0, "Header", UtfValue::Data(header))?;
                        sheet.set_streaming_header(wrapper.save(&WriterConfig::adx2())?)?;
                    } else {
                        sheet.set_streaming_header(header)?;
                    }
                }
            }
        }

        progress(total, total, "Saving cue sheet");
        sheet.save()?;
        Ok(acb_path)
    }
}
