//! AFS2 archive container
//!
//! The lightweight id-indexed payload container ("AWB"). Little-endian
//! framing: a fixed header, a sorted list of u16 entry ids, then
//! `count + 1` u32 offsets. Stored offsets are pre-padding positions - entry
//! *i* occupies `align_up(offset[i]) .. offset[i + 1]` relative to the
//! archive start, so the final offset doubles as the archive end.
//!
//! A streaming cue sheet stores only the bytes up to the offset table (the
//! "header") inline and keeps payloads in a separate `.awb` file; parsing
//! stops after the offset table, so [`Afs2Archive::read`] handles both whole
//! archives and header-only blobs.
//!
//! The optional 16-bit sub key marks obfuscated payloads. It is carried as
//! archive metadata only - payload bytes pass through this library untouched.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::utils::align_up;

/// Magic bytes at the start of an AFS2 archive.
pub const AFS2_SIGNATURE: [u8; 4] = *b"AFS2";

/// Bytes before the id list: magic, layout bytes, count, align, sub key.
const HEADER_FIXED: u64 = 0x10;

const OFFSET_WIDTH: u8 = 4;
const ID_WIDTH: u8 = 2;
const DEFAULT_ALIGN: u16 = 32;

/// One payload slot in an AFS2 archive.
#[derive(Debug, Clone)]
pub struct Afs2Entry {
    pub id: u16,
    /// Byte offset of the payload, relative to the archive start.
    pub offset: u64,
    pub length: u64,
    /// Source file to embed when building a new archive.
    path: Option<PathBuf>,
}

/// AFS2 ("AWB") archive index, readable from existing data or buildable
/// entry by entry for serialization.
#[derive(Debug, Clone)]
pub struct Afs2Archive {
    entries: BTreeMap<u16, Afs2Entry>,
    alignment: u16,
    sub_key: u16,
}

impl Default for Afs2Archive {
    fn default() -> Self {
        Self::new()
    }
}

impl Afs2Archive {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            alignment: DEFAULT_ALIGN,
            sub_key: 0,
        }
    }

    /// Parse an archive index from the source's current position.
    ///
    /// Only the header and offset table are consumed; payload bytes are never
    /// touched, which makes this safe for header-only streaming blobs.
    ///
    /// # Errors
    /// Returns [`Error::InvalidAfs2Magic`] when the magic does not match and
    /// [`Error::UnsupportedAfs2Layout`] for field widths other than 4-byte
    /// offsets with 2-byte ids.
    ///
    /// [`Error::InvalidAfs2Magic`]: crate::Error::InvalidAfs2Magic
    /// [`Error::UnsupportedAfs2Layout`]: crate::Error::UnsupportedAfs2Layout
    pub fn read<R: Read + Seek>(source: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        source.read_exact(&mut magic)?;
        if magic != AFS2_SIGNATURE {
            return Err(Error::InvalidAfs2Magic(magic));
        }

        let _version = source.read_u8()?;
        let offset_width = source.read_u8()?;
        let id_width = source.read_u8()?;
        let _reserved = source.read_u8()?;
        if offset_width != OFFSET_WIDTH || id_width != ID_WIDTH {
            return Err(Error::UnsupportedAfs2Layout {
                offset_width,
                id_width,
            });
        }

        let count = source.read_u32::<LittleEndian>()?;
        let alignment = source.read_u16::<LittleEndian>()?;
        let sub_key = source.read_u16::<LittleEndian>()?;

        let mut ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            ids.push(source.read_u16::<LittleEndian>()?);
        }

        let mut offsets = Vec::with_capacity(count as usize + 1);
        for _ in 0..=count {
            offsets.push(u64::from(source.read_u32::<LittleEndian>()?));
        }

        let mut entries = BTreeMap::new();
        for (i, id) in ids.into_iter().enumerate() {
            let start = align_up(offsets[i], u64::from(alignment));
            let end = offsets[i + 1];
            entries.insert(
                id,
                Afs2Entry {
                    id,
                    offset: start,
                    length: end.saturating_sub(start),
                    path: None,
                },
            );
        }

        Ok(Self {
            entries,
            alignment,
            sub_key,
        })
    }

    /// Parse an archive index from a byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read(&mut Cursor::new(data))
    }

    /// Look up an entry by id.
    ///
    /// # Errors
    /// Returns [`Error::EntryNotFound`] when the id has no entry.
    ///
    /// [`Error::EntryNotFound`]: crate::Error::EntryNotFound
    pub fn entry(&self, id: u16) -> Result<&Afs2Entry> {
        self.entries.get(&id).ok_or(Error::EntryNotFound { id })
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending id order.
    pub fn entries(&self) -> impl Iterator<Item = &Afs2Entry> {
        self.entries.values()
    }

    /// The archive's obfuscation key; 0 means none.
    #[must_use]
    pub fn sub_key(&self) -> u16 {
        self.sub_key
    }

    pub fn set_sub_key(&mut self, sub_key: u16) {
        self.sub_key = sub_key;
    }

    #[must_use]
    pub fn alignment(&self) -> u16 {
        self.alignment
    }

    /// Queue a payload file for embedding under the given id.
    ///
    /// The file's size is captured now so the index can be laid out before
    /// serialization; the bytes are streamed at save time.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateEntryId`] if the id is already taken and
    /// [`Error::Io`] if the file cannot be inspected.
    ///
    /// [`Error::DuplicateEntryId`]: crate::Error::DuplicateEntryId
    /// [`Error::Io`]: crate::Error::Io
    pub fn add<P: AsRef<Path>>(&mut self, id: u16, path: P) -> Result<()> {
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateEntryId { id });
        }
        let path = path.as_ref();
        let length = std::fs::metadata(path)?.len();
        self.entries.insert(
            id,
            Afs2Entry {
                id,
                offset: 0,
                length,
                path: Some(path.to_path_buf()),
            },
        );
        Ok(())
    }

    /// Compute the serialized layout: stored (pre-padding) offsets per entry
    /// plus the final end offset.
    fn layout(&self) -> (Vec<u64>, u64) {
        let mut stored = Vec::with_capacity(self.entries.len());
        let mut cursor = self.header_len();
        for entry in self.entries.values() {
            stored.push(cursor);
            cursor = align_up(cursor, u64::from(self.alignment)) + entry.length;
        }
        (stored, cursor)
    }

    /// Serialize only the index portion (what a cue sheet embeds for a
    /// streaming archive).
    pub fn header_bytes(&self) -> Result<Vec<u8>> {
        let (stored, end) = self.layout();
        let mut out = Cursor::new(Vec::new());

        out.write_all(&AFS2_SIGNATURE)?;
        out.write_u8(if self.sub_key == 0 { 1 } else { 2 })?;
        out.write_u8(OFFSET_WIDTH)?;
        out.write_u8(ID_WIDTH)?;
        out.write_u8(0)?;
        out.write_u32::<LittleEndian>(self.entries.len() as u32)?;
        out.write_u16::<LittleEndian>(self.alignment)?;
        out.write_u16::<LittleEndian>(self.sub_key)?;

        for id in self.entries.keys() {
            out.write_u16::<LittleEndian>(*id)?;
        }
        for offset in &stored {
            out.write_u32::<LittleEndian>(u32::try_from(*offset).map_err(|_| {
                Error::InvalidFormat(format!("archive offset {offset} exceeds 32 bits"))
            })?)?;
        }
        out.write_u32::<LittleEndian>(u32::try_from(end).map_err(|_| {
            Error::InvalidFormat(format!("archive end offset {end} exceeds 32 bits"))
        })?)?;

        Ok(out.into_inner())
    }

    /// Serialize the whole archive into memory.
    pub fn save(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(self.header_bytes()?);
        out.seek(io::SeekFrom::End(0))?;
        self.write_payloads(&mut out, 64 * 1024)?;
        Ok(out.into_inner())
    }

    /// Serialize the whole archive to a file, streaming payloads through a
    /// buffer of the given size.
    pub fn save_to<P: AsRef<Path>>(&self, path: P, buffer_size: usize) -> Result<()> {
        let mut writer = BufWriter::with_capacity(buffer_size, File::create(path)?);
        writer.write_all(&self.header_bytes()?)?;
        self.write_payloads(&mut writer, buffer_size)?;
        writer.flush()?;
        Ok(())
    }

    fn header_len(&self) -> u64 {
        HEADER_FIXED + self.entries.len() as u64 * 2 + (self.entries.len() as u64 + 1) * 4
    }

    /// Write padding and payload bytes after an already-written header.
    fn write_payloads<W: Write>(&self, out: &mut W, buffer_size: usize) -> Result<()> {
        let mut cursor = self.header_len();
        for entry in self.entries.values() {
            let start = align_up(cursor, u64::from(self.alignment));
            out.write_all(&vec![0u8; (start - cursor) as usize])?;

            let path = entry
                .path
                .as_ref()
                .ok_or(Error::NoPayloadSource { id: entry.id })?;
            let file = File::open(path).map_err(|_| Error::PayloadSourceMissing {
                path: path.clone(),
            })?;
            let mut reader = BufReader::with_capacity(buffer_size, file);
            let copied = io::copy(&mut reader, out)?;
            if copied != entry.length {
                return Err(Error::InvalidFormat(format!(
                    "payload {} changed size since it was added",
                    path.display()
                )));
            }
            cursor = start + entry.length;
        }
        Ok(())
    }
}
