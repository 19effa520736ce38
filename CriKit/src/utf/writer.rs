//! In-memory @UTF tables and serialization

use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use byteorder::{BigEndian, WriteBytesExt};
use indexmap::IndexMap;

use super::{FieldType, NULL_STRING, Storage, UTF_SIGNATURE, UtfReader, UtfValue};
use crate::error::{Error, Result};
use crate::utils::align_up;

/// Fixed header size after the 8-byte magic/size prefix.
const HEADER_SIZE: u32 = 0x18;

/// Schema bytes per column: flags byte plus string pool offset.
const COLUMN_SIZE: u32 = 5;

const TABLE_VERSION: u16 = 1;

/// Layout settings for table serialization.
///
/// Opaque to callers beyond choosing a preset; the knobs only move bytes
/// around, never change field values.
#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    /// Alignment of the data pool and of each blob inside it.
    pub align: u32,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { align: 8 }
    }
}

impl WriterConfig {
    /// The layout the ADX2 authoring tools use for cue sheets.
    #[must_use]
    pub fn adx2() -> Self {
        Self { align: 32 }
    }
}

/// An @UTF table held fully in memory.
///
/// The schema is derived from the first row pushed into the table (or from
/// the parsed file when loading); every later row must match it. Cells are
/// replaced in place with [`set`], which is how repacking swaps archive blobs
/// without touching the rest of the sheet.
///
/// [`set`]: UtfTable::set
#[derive(Debug, Clone, Default)]
pub struct UtfTable {
    /// Table name, stored in the string pool.
    pub name: String,
    columns: Vec<(String, FieldType)>,
    rows: Vec<Vec<UtfValue>>,
}

impl UtfTable {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Append a row. The first row fixes the schema; later rows must carry
    /// the same field names and types in the same order.
    pub fn add_row(&mut self, values: Vec<(&str, UtfValue)>) -> Result<()> {
        if self.columns.is_empty() && self.rows.is_empty() {
            self.columns = values
                .iter()
                .map(|(name, value)| ((*name).to_string(), value.field_type()))
                .collect();
        } else {
            if values.len() != self.columns.len() {
                return Err(Error::SchemaMismatch(format!(
                    "expected {} fields, got {}",
                    self.columns.len(),
                    values.len()
                )));
            }
            for ((name, value), (col_name, col_kind)) in values.iter().zip(&self.columns) {
                if name != col_name {
                    return Err(Error::SchemaMismatch(format!(
                        "expected field {col_name}, got {name}"
                    )));
                }
                if value.field_type() != *col_kind {
                    return Err(Error::SchemaMismatch(format!(
                        "field {name} expects {}, got {}",
                        col_kind.name(),
                        value.type_name()
                    )));
                }
            }
        }
        self.rows.push(values.into_iter().map(|(_, v)| v).collect());
        Ok(())
    }

    /// Load a table from any seekable source positioned at its `@UTF` magic.
    ///
    /// Zero- and constant-storage columns are materialized into plain values,
    /// so saving always round-trips field contents even when the layout
    /// differs from the original file.
    pub fn load<R: Read + Seek>(source: R) -> Result<Self> {
        let mut reader = UtfReader::new(source)?;
        let schema = reader.schema();

        let mut table = Self::new(reader.name().to_string());
        table.columns = schema.clone();

        while reader.next_row()? {
            let mut row = Vec::with_capacity(schema.len());
            for (name, _kind) in &schema {
                row.push(reader.get_value(name)?);
            }
            table.rows.push(row);
        }

        Ok(table)
    }

    /// Load a table from a byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::load(Cursor::new(data))
    }

    /// Load a table from a file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(std::io::BufReader::new(File::open(path)?))
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether the schema contains a column with this name.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }

    /// Borrow a cell value, if the row and field exist.
    #[must_use]
    pub fn get(&self, row: usize, name: &str) -> Option<&UtfValue> {
        let idx = self.column(name)?;
        self.rows.get(row)?.get(idx)
    }

    /// Borrow a cell value, with typed errors for missing rows/fields.
    pub fn value(&self, row: usize, name: &str) -> Result<&UtfValue> {
        let idx = self
            .column(name)
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        let cells = self.rows.get(row).ok_or(Error::RowOutOfBounds {
            row,
            rows: self.rows.len(),
        })?;
        Ok(&cells[idx])
    }

    /// Borrow the bytes of a data cell, if the row and field exist.
    #[must_use]
    pub fn data(&self, row: usize, name: &str) -> Option<&[u8]> {
        self.get(row, name).and_then(UtfValue::as_bytes)
    }

    /// Replace a cell value. The new value must match the column type.
    pub fn set(&mut self, row: usize, name: &str, value: UtfValue) -> Result<()> {
        let idx = self
            .column(name)
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))?;
        let kind = self.columns[idx].1;
        if value.field_type() != kind {
            return Err(Error::FieldTypeMismatch {
                name: name.to_string(),
                expected: kind.name(),
                actual: value.type_name(),
            });
        }
        let rows = self.rows.len();
        let cells = self
            .rows
            .get_mut(row)
            .ok_or(Error::RowOutOfBounds { row, rows })?;
        cells[idx] = value;
        Ok(())
    }

    /// Serialize the table.
    ///
    /// Every column is written with per-row storage; offsets within the
    /// string and data pools are deduplicated and aligned per `config`.
    pub fn save(&self, config: &WriterConfig) -> Result<Vec<u8>> {
        let align = u64::from(config.align.max(1));
        let column_count = u16::try_from(self.columns.len())
            .map_err(|_| Error::InvalidFormat(format!("too many columns: {}", self.columns.len())))?;
        let row_count = u32::try_from(self.rows.len())
            .map_err(|_| Error::InvalidFormat(format!("too many rows: {}", self.rows.len())))?;

        let row_width: u16 = self.columns.iter().map(|(_, kind)| kind.cell_width()).sum();
        let rows_offset = HEADER_SIZE + COLUMN_SIZE * u32::from(column_count);
        let strings_offset = rows_offset + u32::from(row_width) * row_count;

        // String pool: dedupe while preserving first-seen order, <NULL> first.
        let mut pool: IndexMap<String, u32> = IndexMap::new();
        let mut pool_size: u32 = 0;
        let intern = |pool: &mut IndexMap<String, u32>, size: &mut u32, s: &str| -> u32 {
            if let Some(&off) = pool.get(s) {
                off
            } else {
                let off = *size;
                pool.insert(s.to_string(), off);
                *size += s.len() as u32 + 1;
                off
            }
        };

        intern(&mut pool, &mut pool_size, NULL_STRING);
        let name_offset = intern(&mut pool, &mut pool_size, &self.name);
        let column_names: Vec<u32> = self
            .columns
            .iter()
            .map(|(name, _)| intern(&mut pool, &mut pool_size, name))
            .collect();
        for row in &self.rows {
            for value in row {
                if let UtfValue::String(s) = value {
                    intern(&mut pool, &mut pool_size, s);
                }
            }
        }

        // Data pool starts aligned relative to the table start; blobs are
        // aligned within it.
        let data_offset = (align_up(8 + u64::from(strings_offset) + u64::from(pool_size), align)
            - 8) as u32;
        let mut data_cursor: u64 = 0;
        let mut data_refs: Vec<(u32, u32)> = Vec::new();
        for row in &self.rows {
            for value in row {
                if let UtfValue::Data(bytes) = value {
                    if bytes.is_empty() {
                        data_refs.push((0, 0));
                    } else {
                        let off = align_up(data_cursor, align);
                        let len = u32::try_from(bytes.len()).map_err(|_| {
                            Error::InvalidFormat(format!("data blob too large: {}", bytes.len()))
                        })?;
                        data_refs.push((off as u32, len));
                        data_cursor = off + u64::from(len);
                    }
                }
            }
        }

        let table_size = u64::from(data_offset) + data_cursor;
        let total = 8 + table_size;

        let mut out = Cursor::new(Vec::with_capacity(total as usize));
        out.write_all(&UTF_SIGNATURE)?;
        out.write_u32::<BigEndian>(table_size as u32)?;
        out.write_u16::<BigEndian>(TABLE_VERSION)?;
        out.write_u16::<BigEndian>(rows_offset as u16)?;
        out.write_u32::<BigEndian>(strings_offset)?;
        out.write_u32::<BigEndian>(data_offset)?;
        out.write_u32::<BigEndian>(name_offset)?;
        out.write_u16::<BigEndian>(column_count)?;
        out.write_u16::<BigEndian>(row_width)?;
        out.write_u32::<BigEndian>(row_count)?;

        // Schema
        for ((_, kind), name_off) in self.columns.iter().zip(&column_names) {
            out.write_u8(Storage::PerRow.flags() | kind.id())?;
            out.write_u32::<BigEndian>(*name_off)?;
        }

        // Row cells
        let mut data_iter = data_refs.iter();
        for row in &self.rows {
            for value in row {
                match value {
                    UtfValue::U8(v) => out.write_u8(*v)?,
                    UtfValue::S8(v) => out.write_i8(*v)?,
                    UtfValue::U16(v) => out.write_u16::<BigEndian>(*v)?,
                    UtfValue::S16(v) => out.write_i16::<BigEndian>(*v)?,
                    UtfValue::U32(v) => out.write_u32::<BigEndian>(*v)?,
                    UtfValue::S32(v) => out.write_i32::<BigEndian>(*v)?,
                    UtfValue::U64(v) => out.write_u64::<BigEndian>(*v)?,
                    UtfValue::S64(v) => out.write_i64::<BigEndian>(*v)?,
                    UtfValue::F32(v) => out.write_f32::<BigEndian>(*v)?,
                    UtfValue::F64(v) => out.write_f64::<BigEndian>(*v)?,
                    UtfValue::String(s) => {
                        out.write_u32::<BigEndian>(pool[s.as_str()])?;
                    }
                    UtfValue::Data(_) => {
                        let (off, len) = data_iter.next().ok_or_else(|| {
                            Error::InvalidFormat("data reference bookkeeping mismatch".into())
                        })?;
                        out.write_u32::<BigEndian>(*off)?;
                        out.write_u32::<BigEndian>(*len)?;
                    }
                }
            }
        }

        // String pool
        for s in pool.keys() {
            out.write_all(s.as_bytes())?;
            out.write_u8(0)?;
        }

        // Pad to the data pool, then emit blobs at their assigned offsets.
        let pool_end = 8 + u64::from(strings_offset) + u64::from(pool_size);
        pad_to(&mut out, pool_end, 8 + u64::from(data_offset))?;
        let mut data_iter = data_refs.iter();
        let data_base = 8 + u64::from(data_offset);
        let mut cursor = data_base;
        for row in &self.rows {
            for value in row {
                if let UtfValue::Data(bytes) = value {
                    let (off, _len) = data_iter.next().ok_or_else(|| {
                        Error::InvalidFormat("data reference bookkeeping mismatch".into())
                    })?;
                    if !bytes.is_empty() {
                        let target = data_base + u64::from(*off);
                        pad_to(&mut out, cursor, target)?;
                        out.write_all(bytes)?;
                        cursor = target + bytes.len() as u64;
                    }
                }
            }
        }

        Ok(out.into_inner())
    }

    /// Serialize the table straight to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P, config: &WriterConfig) -> Result<()> {
        let bytes = self.save(config)?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }
}

fn pad_to(out: &mut Cursor<Vec<u8>>, current: u64, target: u64) -> Result<()> {
    if target > current {
        let zeros = vec![0u8; (target - current) as usize];
        out.write_all(&zeros)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> UtfTable {
        let mut table = UtfTable::new("Waveform");
        table
            .add_row(vec![
                ("EncodeType", UtfValue::U8(2)),
                ("Streaming", UtfValue::U8(0)),
                ("Id", UtfValue::U16(0)),
                ("Label", UtfValue::String("intro".into())),
                ("Blob", UtfValue::Data(vec![1, 2, 3, 4])),
            ])
            .unwrap();
        table
            .add_row(vec![
                ("EncodeType", UtfValue::U8(24)),
                ("Streaming", UtfValue::U8(1)),
                ("Id", UtfValue::U16(7)),
                ("Label", UtfValue::String("outro".into())),
                ("Blob", UtfValue::Data(Vec::new())),
            ])
            .unwrap();
        table
    }

    #[test]
    fn test_save_load_round_trip() {
        let table = sample_table();
        let bytes = table.save(&WriterConfig::default()).unwrap();
        let reloaded = UtfTable::from_bytes(&bytes).unwrap();

        assert_eq!(reloaded.name, "Waveform");
        assert_eq!(reloaded.row_count(), 2);
        assert_eq!(reloaded.get(0, "EncodeType"), Some(&UtfValue::U8(2)));
        assert_eq!(reloaded.get(1, "Id"), Some(&UtfValue::U16(7)));
        assert_eq!(
            reloaded.get(0, "Label"),
            Some(&UtfValue::String("intro".into()))
        );
        assert_eq!(reloaded.data(0, "Blob"), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(reloaded.data(1, "Blob"), Some(&[][..]));
    }

    #[test]
    fn test_adx2_preset_aligns_data_pool() {
        let table = sample_table();
        let bytes = table.save(&WriterConfig::adx2()).unwrap();
        let reloaded = UtfTable::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.data(0, "Blob"), Some(&[1u8, 2, 3, 4][..]));
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let mut table = UtfTable::new("T");
        table.add_row(vec![("A", UtfValue::U8(1))]).unwrap();
        let err = table.add_row(vec![("B", UtfValue::U8(2))]).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
        let err = table.add_row(vec![("A", UtfValue::U16(2))]).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }

    #[test]
    fn test_set_replaces_cell() {
        let mut table = sample_table();
        table
            .set(1, "Blob", UtfValue::Data(vec![9, 9]))
            .unwrap();
        let bytes = table.save(&WriterConfig::default()).unwrap();
        let reloaded = UtfTable::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.data(1, "Blob"), Some(&[9u8, 9][..]));

        let err = table.set(0, "Id", UtfValue::U32(1)).unwrap_err();
        assert!(matches!(err, Error::FieldTypeMismatch { .. }));
    }
}
