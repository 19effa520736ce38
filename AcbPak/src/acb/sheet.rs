//! The root cue sheet container

use std::io::Write;
use std::path::{Path, PathBuf};

use crikit::utf::{UTF_SIGNATURE, UtfTable, UtfValue, WriterConfig};

use super::detect::{self, ArchiveFormat};
use crate::error::{Error, Result};

/// Field names in the root table.
pub(crate) const AWB_FIELD: &str = "AwbFile";
pub(crate) const STREAM_HEADER_FIELD: &str = "StreamAwbAfs2Header";
pub(crate) const CUE_NAME_TABLE_FIELD: &str = "CueNameTable";
pub(crate) const WAVEFORM_TABLE_FIELD: &str = "WaveformTable";

/// A cue sheet loaded fully into memory for repacking.
///
/// The pack pipeline mutates it in place - archive blobs are swapped for
/// freshly built ones - and then writes it back atomically over the original
/// path with the conventional layout settings.
pub struct CueSheet {
    path: PathBuf,
    table: UtfTable,
}

impl CueSheet {
    /// Load the container at `path`.
    ///
    /// # Errors
    /// Returns [`Error::EmptyCueSheet`] for a table without rows, or the
    /// underlying format error for anything that is not an @UTF table.
    ///
    /// [`Error::EmptyCueSheet`]: crate::Error::EmptyCueSheet
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let table = UtfTable::open(&path)?;
        if table.row_count() == 0 {
            return Err(Error::EmptyCueSheet);
        }
        Ok(Self { path, table })
    }

    fn blob(&self, name: &str) -> &[u8] {
        self.table.data(0, name).unwrap_or(&[])
    }

    fn required_blob(&self, name: &str) -> Result<Vec<u8>> {
        self.table
            .data(0, name)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| crikit::Error::FieldNotFound(name.to_string()).into())
    }

    /// The inline ("memory") archive bytes; empty when absent.
    #[must_use]
    pub fn memory_archive(&self) -> &[u8] {
        self.blob(AWB_FIELD)
    }

    /// The streaming archive header blob; empty when absent.
    #[must_use]
    pub fn streaming_header(&self) -> &[u8] {
        self.blob(STREAM_HEADER_FIELD)
    }

    /// Raw cue name table bytes.
    pub fn cue_name_table(&self) -> Result<Vec<u8>> {
        self.required_blob(CUE_NAME_TABLE_FIELD)
    }

    /// Raw waveform table bytes.
    pub fn waveform_table(&self) -> Result<Vec<u8>> {
        self.required_blob(WAVEFORM_TABLE_FIELD)
    }

    /// The archive format this container packs back to.
    ///
    /// One decision governs the whole run: Format B when the stored inline
    /// blob bears the AFS2 signature or a streaming header is present (a
    /// header blob only ever indexes Format B), Format A otherwise.
    #[must_use]
    pub fn target_format(&self) -> ArchiveFormat {
        if detect::blob_format(self.memory_archive()) == ArchiveFormat::Afs2
            || !self.streaming_header().is_empty()
        {
            ArchiveFormat::Afs2
        } else {
            ArchiveFormat::Cpk
        }
    }

    /// Whether the original streaming header was wrapped in a @UTF table
    /// rather than stored as a raw index.
    #[must_use]
    pub fn streaming_header_is_wrapped(&self) -> bool {
        let blob = self.streaming_header();
        blob.len() >= 4 && blob[..4] == UTF_SIGNATURE
    }

    /// Drop both archive blobs; the pack pipeline re-adds what it rebuilt.
    pub fn clear_archives(&mut self) -> Result<()> {
        if self.table.has_field(AWB_FIELD) {
            self.table.set(0, AWB_FIELD, UtfValue::Data(Vec::new()))?;
        }
        if self.table.has_field(STREAM_HEADER_FIELD) {
            self.table
                .set(0, STREAM_HEADER_FIELD, UtfValue::Data(Vec::new()))?;
        }
        Ok(())
    }

    /// Replace the inline archive blob.
    pub fn set_memory_archive(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.table.set(0, AWB_FIELD, UtfValue::Data(bytes))?;
        Ok(())
    }

    /// Replace the streaming header blob.
    pub fn set_streaming_header(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.table
            .set(0, STREAM_HEADER_FIELD, UtfValue::Data(bytes))?;
        Ok(())
    }

    /// Rewrite the container in place: serialize with the conventional
    /// layout settings, write to a temp file in the same directory, persist
    /// over the original path.
    pub fn save(&self) -> Result<()> {
        let bytes = self.table.save(&WriterConfig::adx2())?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// The container path this sheet was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
