//! Unpack pipeline
//!
//! Locate the container's archives, resolve every cue to a byte span, then
//! copy the spans out in parallel. Resolution is all-or-nothing: no output
//! is written until every cue has mapped to exactly one payload.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use crikit::afs2::Afs2Archive;
use crikit::cpk::CpkArchive;
use crikit::extract::{DataExtractor, ExtractorConfig};
use crikit::utf::UtfReader;

use super::codec;
use super::detect::{self, ArchiveFormat};
use super::paths;
use super::sheet::{AWB_FIELD, CUE_NAME_TABLE_FIELD, STREAM_HEADER_FIELD, WAVEFORM_TABLE_FIELD};
use super::sidecar;
use super::tables;
use super::types::{AcbPhase, AcbProgress, ArchiveIndex, ProgressCallback, ResolvedAsset};
use crate::error::{Error, Result};

/// Everything a successful resolution produced: the copy list plus any
/// obfuscation keys that need sidecar files.
struct Resolution {
    assets: Vec<ResolvedAsset>,
    sidecars: Vec<(&'static str, u16)>,
}

/// Unpacks a container into per-cue audio files.
pub struct AcbExtractor {
    config: ExtractorConfig,
}

impl AcbExtractor {
    #[must_use]
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Unpack `acb_path` into `output_dir`.
    ///
    /// A missing streaming archive, a dangling cue index, or an unknown
    /// archive identifier aborts before anything is written. Failures during
    /// the copy phase itself are reported per file without rolling back
    /// siblings.
    ///
    /// # Errors
    /// Returns [`Error::MissingStreamingArchive`] when a streaming entry has
    /// no companion archive, [`Error::CueNameNotFound`] or
    /// [`Error::Format`] for lookup failures, and
    /// [`Error::TableLengthMismatch`] for misaligned tables.
    ///
    /// [`Error::MissingStreamingArchive`]: crate::Error::MissingStreamingArchive
    /// [`Error::CueNameNotFound`]: crate::Error::CueNameNotFound
    /// [`Error::Format`]: crate::Error::Format
    /// [`Error::TableLengthMismatch`]: crate::Error::TableLengthMismatch
    pub fn extract<P: AsRef<Path>>(
        &self,
        acb_path: P,
        output_dir: P,
        progress: ProgressCallback,
    ) -> Result<()> {
        let acb_path = acb_path.as_ref();
        let output_dir = output_dir.as_ref();

        progress(&AcbProgress::new(AcbPhase::ReadingSheet, 0, 1));
        let resolution = self.resolve_all(acb_path, output_dir, progress)?;

        // Every cue resolved; only now touch the filesystem.
        std::fs::create_dir_all(output_dir)?;
        for (name, key) in &resolution.sidecars {
            sidecar::write_key(&output_dir.join(name), *key)?;
        }

        let mut extractor = DataExtractor::new(self.config);
        for asset in &resolution.assets {
            extractor.add(&asset.source, &asset.destination, asset.offset, asset.length);
        }

        let total = extractor.len();
        progress(&AcbProgress::new(AcbPhase::ExtractingFiles, 0, total));
        extractor.run(&|copy| {
            progress(&AcbProgress {
                phase: AcbPhase::ExtractingFiles,
                current: copy.current,
                total: copy.total,
                current_file: copy.current_file.clone(),
            });
        })?;

        progress(&AcbProgress::new(AcbPhase::Complete, total, total));
        Ok(())
    }

    /// Resolve every cue to its payload span without writing anything.
    ///
    /// # Errors
    /// Same failure modes as [`extract`].
    ///
    /// [`extract`]: AcbExtractor::extract
    pub fn resolve<P: AsRef<Path>>(
        &self,
        acb_path: P,
        output_dir: P,
    ) -> Result<Vec<ResolvedAsset>> {
        self.resolve_all(acb_path.as_ref(), output_dir.as_ref(), &|_| {})
            .map(|r| r.assets)
    }

    fn resolve_all(
        &self,
        acb_path: &Path,
        output_dir: &Path,
        progress: ProgressCallback,
    ) -> Result<Resolution> {
        let mut acb = UtfReader::open(acb_path)?;
        if !acb.next_row()? {
            return Err(Error::EmptyCueSheet);
        }

        let base = paths::base_for(acb_path);
        let streaming_path = paths::find_streaming_archive(&base);
        let mut sidecars = Vec::new();

        // Inline slot: classify from content, then parse the index. The
        // table reader keeps its own cursor, so the archive gets a separate
        // handle.
        let awb_len = if acb.has_field(AWB_FIELD) {
            acb.data_len(AWB_FIELD)?
        } else {
            0
        };
        let awb_position = if awb_len > 0 {
            acb.data_position(AWB_FIELD)?
        } else {
            0
        };
        let mut inline_format = ArchiveFormat::Cpk;
        let mut inline_index = None;
        if awb_len > 0 {
            let mut file = BufReader::new(File::open(acb_path)?);
            file.seek(SeekFrom::Start(awb_position))?;
            inline_format = detect::archive_format(&mut file)?;
            tracing::debug!(
                "inline archive at {awb_position:#x}: {} ({awb_len} bytes)",
                inline_format.as_str()
            );
            inline_index = Some(match inline_format {
                ArchiveFormat::Afs2 => {
                    let archive = Afs2Archive::read(&mut file)?;
                    if archive.sub_key() != 0 {
                        sidecars.push((sidecar::SUBKEY_FILE, archive.sub_key()));
                    }
                    ArchiveIndex::Afs2(archive)
                }
                ArchiveFormat::Cpk => ArchiveIndex::Cpk(CpkArchive::read(&mut file)?),
            });
        }

        // Streaming slot: a header blob pins the format to AFS2 and already
        // carries the index; otherwise the slot inherits the inline
        // detection and its index loads lazily from the archive file itself.
        // The two slots are decided independently.
        let mut streaming_format = inline_format;
        let mut streaming_index: Option<ArchiveIndex> = None;
        let header_len = if acb.has_field(STREAM_HEADER_FIELD) {
            acb.data_len(STREAM_HEADER_FIELD)?
        } else {
            0
        };
        if header_len > 0 {
            streaming_format = ArchiveFormat::Afs2;
            let header = detect::unwrap_streaming_header(acb.get_data(STREAM_HEADER_FIELD)?)?;
            let archive = Afs2Archive::from_bytes(&header)?;
            if streaming_path.is_none() {
                return Err(Error::MissingStreamingArchive {
                    acb: acb_path.to_path_buf(),
                });
            }
            if archive.sub_key() != 0 {
                sidecars.push((sidecar::SUBKEY_STREAMING_FILE, archive.sub_key()));
            }
            streaming_index = Some(ArchiveIndex::Afs2(archive));
        }

        // The two tables pair up positionally; reject any length drift
        // before resolving a single cue.
        let names =
            tables::read_cue_names(&mut UtfReader::from_bytes(acb.get_data(CUE_NAME_TABLE_FIELD)?)?)?;
        let waveforms = tables::read_waveform_rows(&mut UtfReader::from_bytes(
            acb.get_data(WAVEFORM_TABLE_FIELD)?,
        )?)?;
        tables::validate_alignment(names.len(), waveforms.len())?;

        progress(&AcbProgress::new(AcbPhase::ResolvingCues, 0, waveforms.len()));

        let mut assets = Vec::with_capacity(waveforms.len());
        for (cue_index, row) in waveforms.iter().enumerate() {
            let name = u16::try_from(cue_index)
                .ok()
                .and_then(|i| names.get(&i))
                .ok_or(Error::CueNameNotFound { index: cue_index })?;
            let destination = output_dir.join(codec::cue_file_name(name, row.streaming, row.codec));

            if row.streaming {
                let Some(awb_path) = streaming_path.as_deref() else {
                    return Err(Error::MissingStreamingArchive {
                        acb: acb_path.to_path_buf(),
                    });
                };
                // Parsed once, on the first streaming entry, then reused.
                if streaming_index.is_none() {
                    let mut file = BufReader::new(File::open(awb_path)?);
                    streaming_index = Some(match streaming_format {
                        ArchiveFormat::Afs2 => ArchiveIndex::Afs2(Afs2Archive::read(&mut file)?),
                        ArchiveFormat::Cpk => ArchiveIndex::Cpk(CpkArchive::read(&mut file)?),
                    });
                }
                let index = streaming_index
                    .as_ref()
                    .ok_or_else(|| Error::MissingStreamingArchive {
                        acb: acb_path.to_path_buf(),
                    })?;
                let (offset, length) = index.entry_span(row.id)?;
                assets.push(ResolvedAsset {
                    source: awb_path.to_path_buf(),
                    offset,
                    length,
                    destination,
                });
            } else {
                let index = inline_index.as_ref().ok_or(Error::MissingMemoryArchive)?;
                let (offset, length) = index.entry_span(row.id)?;
                assets.push(ResolvedAsset {
                    source: acb_path.to_path_buf(),
                    offset: awb_position + offset,
                    length,
                    destination,
                });
            }
        }

        Ok(Resolution { assets, sidecars })
    }
}
