//! CPK archive container, id-indexed mode
//!
//! The generic length-indexed container. A CPK file is a series of chunks,
//! each a 16-byte header (magic, flag, packet size) wrapping an @UTF packet:
//! the `CPK ` chunk at offset 0 describes the layout, the `ITOC` chunk holds
//! the id index. Payload bytes start at `ContentOffset`, laid out in
//! ascending id order and aligned per the header's `Align` field - entry
//! offsets are derived by walking the index, there is no per-entry offset
//! field.
//!
//! Only the id-keyed (ITOC) flavor is implemented; that is the one cue
//! sheets embed. Obfuscated index packets (flag byte other than 0xff) are
//! descrambled on read and always written plain.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::utf::{UtfReader, UtfTable, UtfValue, WriterConfig};
use crate::utils::align_up;

/// Magic bytes at the start of a CPK archive.
pub const CPK_SIGNATURE: [u8; 4] = *b"CPK ";

const ITOC_SIGNATURE: [u8; 4] = *b"ITOC";

/// The header chunk owns this much space; the ITOC chunk starts here.
const HEADER_REGION: u64 = 0x800;

const DEFAULT_ALIGN: u32 = 32;

/// Entries with sizes at or above this index through the wide (`DataH`)
/// sub-table; smaller ones fit the u16 fields of `DataL`.
const DATA_H_THRESHOLD: u64 = 0x10000;

/// One payload slot in a CPK archive.
#[derive(Debug, Clone)]
pub struct CpkEntry {
    pub id: u16,
    /// Byte offset of the payload, relative to the archive start.
    pub offset: u64,
    pub length: u64,
    /// Source file to embed when building a new archive.
    path: Option<PathBuf>,
}

/// CPK archive index, readable from existing data or buildable entry by
/// entry for serialization.
#[derive(Debug, Clone)]
pub struct CpkArchive {
    entries: BTreeMap<u16, CpkEntry>,
    align: u32,
}

impl Default for CpkArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl CpkArchive {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            align: DEFAULT_ALIGN,
        }
    }

    /// Parse an archive index from the source's current position.
    ///
    /// Reads the header and ITOC packets only; payload bytes are never
    /// touched.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCpkMagic`] when the magic does not match and
    /// [`Error::MissingCpkItoc`] when the archive carries no id index.
    ///
    /// [`Error::InvalidCpkMagic`]: crate::Error::InvalidCpkMagic
    /// [`Error::MissingCpkItoc`]: crate::Error::MissingCpkItoc
    pub fn read<R: Read + Seek>(source: &mut R) -> Result<Self> {
        let base = source.stream_position()?;

        let header_packet = read_chunk(source, CPK_SIGNATURE, "CPK ")?;
        let mut header = UtfReader::from_bytes(header_packet)?;
        if !header.next_row()? {
            return Err(Error::InvalidFormat("CPK header table has no rows".into()));
        }

        let content_offset = header.get_u64("ContentOffset")?;
        let align = if header.has_field("Align") {
            header.get_u32("Align")?
        } else {
            DEFAULT_ALIGN
        };
        if !header.has_field("ItocOffset") {
            return Err(Error::MissingCpkItoc);
        }
        let itoc_offset = header.get_u64("ItocOffset")?;
        if itoc_offset == 0 {
            return Err(Error::MissingCpkItoc);
        }

        source.seek(SeekFrom::Start(base + itoc_offset))?;
        let itoc_packet = read_chunk(source, ITOC_SIGNATURE, "ITOC")?;
        let mut itoc = UtfReader::from_bytes(itoc_packet)?;
        if !itoc.next_row()? {
            return Err(Error::MissingCpkItoc);
        }

        let mut sizes: Vec<(u16, u64)> = Vec::new();
        for (field, wide) in [("DataL", false), ("DataH", true)] {
            if !itoc.has_field(field) {
                continue;
            }
            let packet = itoc.get_data(field)?;
            if packet.is_empty() {
                continue;
            }
            let mut sub = UtfReader::from_bytes(packet)?;
            while sub.next_row()? {
                let id = sub.get_u16("ID")?;
                let size = if wide {
                    u64::from(sub.get_u32("FileSize")?)
                } else {
                    u64::from(sub.get_u16("FileSize")?)
                };
                sizes.push((id, size));
            }
        }
        sizes.sort_unstable_by_key(|(id, _)| *id);

        let mut entries = BTreeMap::new();
        let mut cursor = content_offset;
        for (id, size) in sizes {
            let start = align_up(cursor, u64::from(align));
            entries.insert(
                id,
                CpkEntry {
                    id,
                    offset: start,
                    length: size,
                    path: None,
                },
            );
            cursor = start + size;
        }

        Ok(Self { entries, align })
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
    pub fn entry(&self, id: u16) -> Result<&CpkEntry> {
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
    pub fn entries(&self) -> impl Iterator<Item = &CpkEntry> {
        self.entries.values()
    }

    /// Queue a payload file for embedding under the given id.
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
            CpkEntry {
                id,
                offset: 0,
                length,
                path: Some(path.to_path_buf()),
            },
        );
        Ok(())
    }

    /// Build the ITOC index packet for the current entries.
    fn build_itoc(&self) -> Result<Vec<u8>> {
        let mut data_l = UtfTable::new("CpkItocL");
        let mut data_h = UtfTable::new("CpkItocH");
        let mut count_l: u32 = 0;
        let mut count_h: u32 = 0;

        for entry in self.entries.values() {
            if entry.length < DATA_H_THRESHOLD {
                data_l.add_row(vec![
                    ("ID", UtfValue::U16(entry.id)),
                    ("FileSize", UtfValue::U16(entry.length as u16)),
                    ("ExtractSize", UtfValue::U16(entry.length as u16)),
                ])?;
                count_l += 1;
            } else {
                let length = u32::try_from(entry.length).map_err(|_| {
                    Error::InvalidFormat(format!("entry {} exceeds 32-bit size", entry.id))
                })?;
                data_h.add_row(vec![
                    ("ID", UtfValue::U16(entry.id)),
                    ("FileSize", UtfValue::U32(length)),
                    ("ExtractSize", UtfValue::U32(length)),
                ])?;
                count_h += 1;
            }
        }

        let config = WriterConfig::default();
        let l_bytes = if count_l == 0 {
            Vec::new()
        } else {
            data_l.save(&config)?
        };
        let h_bytes = if count_h == 0 {
            Vec::new()
        } else {
            data_h.save(&config)?
        };

        let mut itoc = UtfTable::new("CpkItocInfo");
        itoc.add_row(vec![
            ("FilesL", UtfValue::U32(count_l)),
            ("FilesH", UtfValue::U32(count_h)),
            ("DataL", UtfValue::Data(l_bytes)),
            ("DataH", UtfValue::Data(h_bytes)),
        ])?;
        itoc.save(&config)
    }

    /// Compute the content layout: per-entry absolute offsets plus the
    /// archive end, given where content starts.
    fn layout(&self, content_offset: u64) -> (Vec<u64>, u64) {
        let mut offsets = Vec::with_capacity(self.entries.len());
        let mut cursor = content_offset;
        for entry in self.entries.values() {
            let start = align_up(cursor, u64::from(self.align));
            offsets.push(start);
            cursor = start + entry.length;
        }
        (offsets, cursor)
    }

    /// Serialize the whole archive into memory.
    pub fn save(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.write_archive(&mut out, 64 * 1024)?;
        Ok(out.into_inner())
    }

    /// Serialize the whole archive to a file, streaming payloads through a
    /// buffer of the given size.
    pub fn save_to<P: AsRef<Path>>(&self, path: P, buffer_size: usize) -> Result<()> {
        let mut writer = BufWriter::with_capacity(buffer_size, File::create(path)?);
        self.write_archive(&mut writer, buffer_size)?;
        writer.flush()?;
        Ok(())
    }

    fn write_archive<W: Write>(&self, out: &mut W, buffer_size: usize) -> Result<()> {
        let itoc_packet = self.build_itoc()?;
        let itoc_end = HEADER_REGION + 16 + itoc_packet.len() as u64;
        let content_offset = align_up(itoc_end, u64::from(self.align).max(16));
        let (offsets, end) = self.layout(content_offset);

        let mut header = UtfTable::new("CpkHeader");
        header.add_row(vec![
            ("UpdateDateTime", UtfValue::U64(0)),
            ("ContentOffset", UtfValue::U64(content_offset)),
            ("ContentSize", UtfValue::U64(end - content_offset)),
            ("ItocOffset", UtfValue::U64(HEADER_REGION)),
            ("ItocSize", UtfValue::U64(16 + itoc_packet.len() as u64)),
            ("Align", UtfValue::U16(self.align as u16)),
            ("Files", UtfValue::U32(self.entries.len() as u32)),
            ("Version", UtfValue::U16(7)),
            ("Revision", UtfValue::U16(2)),
        ])?;
        let header_packet = header.save(&WriterConfig::default())?;
        if 16 + header_packet.len() as u64 > HEADER_REGION {
            return Err(Error::InvalidFormat(
                "CPK header packet overflows its region".into(),
            ));
        }

        // Header chunk, padded out to the ITOC position.
        write_chunk(out, CPK_SIGNATURE, &header_packet)?;
        let mut cursor = 16 + header_packet.len() as u64;
        cursor = pad_to(out, cursor, HEADER_REGION)?;

        // ITOC chunk, padded out to the content.
        write_chunk(out, ITOC_SIGNATURE, &itoc_packet)?;
        cursor += 16 + itoc_packet.len() as u64;
        cursor = pad_to(out, cursor, content_offset)?;

        // Payloads, in ascending id order.
        for (entry, start) in self.entries.values().zip(&offsets) {
            cursor = pad_to(out, cursor, *start)?;
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
            cursor += entry.length;
        }

        Ok(())
    }
}

/// Read a 16-byte chunk header at the source's current position and return
/// the @UTF packet it wraps, descrambled if necessary.
fn read_chunk<R: Read + Seek>(
    source: &mut R,
    expected: [u8; 4],
    label: &'static str,
) -> Result<Vec<u8>> {
    let mut magic = [0u8; 4];
    source.read_exact(&mut magic)?;
    if magic != expected {
        if expected == CPK_SIGNATURE {
            return Err(Error::InvalidCpkMagic(magic));
        }
        return Err(Error::MissingCpkChunk { magic: label });
    }

    let flag = source.read_u32::<LittleEndian>()?;
    let packet_size = source.read_u64::<LittleEndian>()?;
    let mut packet = vec![0u8; packet_size as usize];
    source.read_exact(&mut packet)?;

    if flag & 0xff != 0xff {
        descramble_packet(&mut packet);
    }
    Ok(packet)
}

/// In-place descramble of an obfuscated @UTF packet (multiplicative XOR
/// keystream; the scheme is its own inverse).
fn descramble_packet(packet: &mut [u8]) {
    let mut mask: u32 = 0x655f;
    for byte in &mut *packet {
        *byte ^= (mask & 0xff) as u8;
        mask = mask.wrapping_mul(0x4115);
    }
}

fn write_chunk<W: Write>(out: &mut W, magic: [u8; 4], packet: &[u8]) -> Result<()> {
    out.write_all(&magic)?;
    out.write_u32::<LittleEndian>(0xff)?;
    out.write_u64::<LittleEndian>(packet.len() as u64)?;
    out.write_all(packet)?;
    Ok(())
}

fn pad_to<W: Write>(out: &mut W, current: u64, target: u64) -> Result<u64> {
    if target > current {
        out.write_all(&vec![0u8; (target - current) as usize])?;
    }
    Ok(target.max(current))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descramble_is_involution() {
        let original: Vec<u8> = (0u8..64).collect();
        let mut packet = original.clone();
        descramble_packet(&mut packet);
        assert_ne!(packet, original);
        descramble_packet(&mut packet);
        assert_eq!(packet, original);
    }
}
