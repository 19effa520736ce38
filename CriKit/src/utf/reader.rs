//! Streaming row-cursor reader for @UTF tables

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};

use super::{FieldType, Storage, UTF_SIGNATURE, UtfValue};
use crate::error::{Error, Result};

/// One column of the table schema.
#[derive(Debug, Clone)]
struct Column {
    name: String,
    kind: FieldType,
    storage: Storage,
    /// Value shared by every row (zero or constant storage).
    shared: Option<UtfValue>,
    /// Pool reference of a constant data column, kept so position queries
    /// work for every storage class.
    shared_data_ref: Option<(u32, u32)>,
    /// Byte offset of this column's cell inside a row (per-row storage).
    cell_offset: u16,
}

/// Reader over an @UTF table embedded anywhere in a seekable source.
///
/// The table is located at whatever position the source is at when the
/// reader is constructed; all pool offsets resolve relative to that base, so
/// tables nested inside containers read correctly without copying.
///
/// Field getters operate on the current row: advance with [`next_row`] before
/// the first access.
///
/// [`next_row`]: UtfReader::next_row
pub struct UtfReader<R: Read + Seek> {
    source: R,
    /// Absolute position of the `@UTF` magic in `source`.
    base: u64,
    name: String,
    columns: Vec<Column>,
    rows_offset: u32,
    strings_offset: u32,
    data_offset: u32,
    row_width: u16,
    row_count: u32,
    /// Current row, or `None` before the first `next_row` call.
    row: Option<u32>,
}

impl UtfReader<BufReader<File>> {
    /// Open a table stored at the start of a file.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file cannot be opened and
    /// [`Error::InvalidUtfMagic`] if it does not start with `@UTF`.
    ///
    /// [`Error::Io`]: crate::Error::Io
    /// [`Error::InvalidUtfMagic`]: crate::Error::InvalidUtfMagic
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl UtfReader<Cursor<Vec<u8>>> {
    /// Read a table from an owned byte buffer.
    ///
    /// # Errors
    /// Returns [`Error::InvalidUtfMagic`] if the buffer does not start with
    /// `@UTF`.
    ///
    /// [`Error::InvalidUtfMagic`]: crate::Error::InvalidUtfMagic
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::new(Cursor::new(data))
    }
}

impl<R: Read + Seek> UtfReader<R> {
    /// Read the table header and schema from the source's current position.
    ///
    /// # Errors
    /// Returns [`Error::InvalidUtfMagic`] if the magic does not match, or an
    /// error for unknown column types/storage classes.
    ///
    /// [`Error::InvalidUtfMagic`]: crate::Error::InvalidUtfMagic
    pub fn new(mut source: R) -> Result<Self> {
        let base = source.stream_position()?;

        let mut magic = [0u8; 4];
        source.read_exact(&mut magic)?;
        if magic != UTF_SIGNATURE {
            return Err(Error::InvalidUtfMagic(magic));
        }
        let _table_size = source.read_u32::<BigEndian>()?;

        // Remaining offsets are relative to the end of the 8-byte prefix.
        let _version = source.read_u16::<BigEndian>()?;
        let rows_offset = u32::from(source.read_u16::<BigEndian>()?);
        let strings_offset = source.read_u32::<BigEndian>()?;
        let data_offset = source.read_u32::<BigEndian>()?;
        let name_offset = source.read_u32::<BigEndian>()?;
        let column_count = source.read_u16::<BigEndian>()?;
        let row_width = source.read_u16::<BigEndian>()?;
        let row_count = source.read_u32::<BigEndian>()?;

        let mut reader = Self {
            source,
            base,
            name: String::new(),
            columns: Vec::with_capacity(usize::from(column_count)),
            rows_offset,
            strings_offset,
            data_offset,
            row_width,
            row_count,
            row: None,
        };

        reader.read_schema(column_count)?;
        reader.name = reader.string_at(name_offset)?;

        Ok(reader)
    }

    /// Parse the column schema. Constant values are stored inline in the
    /// schema stream, directly after the column's name offset.
    fn read_schema(&mut self, column_count: u16) -> Result<()> {
        let mut cell_offset: u16 = 0;

        for _ in 0..column_count {
            let flags = self.source.read_u8()?;
            let name_pool_offset = self.source.read_u32::<BigEndian>()?;
            let kind = FieldType::from_id(flags & 0x0f)?;
            let storage = Storage::from_flags(flags & 0xf0)?;

            let mut shared = None;
            let mut shared_data_ref = None;
            match storage {
                Storage::Zero => shared = Some(UtfValue::zero(kind)),
                Storage::Constant => {
                    if kind == FieldType::Data {
                        let off = self.source.read_u32::<BigEndian>()?;
                        let len = self.source.read_u32::<BigEndian>()?;
                        shared_data_ref = Some((off, len));
                        shared = Some(UtfValue::Data(self.data_at(off, len)?));
                    } else {
                        shared = Some(self.read_value(kind)?);
                    }
                }
                Storage::PerRow => {}
            }

            let name = self.string_at(name_pool_offset)?;
            self.columns.push(Column {
                name,
                kind,
                storage,
                shared,
                shared_data_ref,
                cell_offset,
            });

            if storage == Storage::PerRow {
                cell_offset += kind.cell_width();
            }
        }

        Ok(())
    }

    /// Table name from the string pool.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows in the table.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Whether the schema contains a column with this name.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Names and types of every column, in schema order.
    pub(crate) fn schema(&self) -> Vec<(String, FieldType)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.kind))
            .collect()
    }

    /// Advance the row cursor. Returns `false` past the last row.
    ///
    /// # Errors
    /// Infallible today; `Result` keeps the cursor interface uniform with the
    /// other readers in this crate.
    pub fn next_row(&mut self) -> Result<bool> {
        let next = match self.row {
            None => 0,
            Some(row) => row + 1,
        };
        if next < self.row_count {
            self.row = Some(next);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn current_row(&self) -> Result<u64> {
        match self.row {
            Some(row) => Ok(u64::from(row)),
            None => Err(Error::CursorNotAdvanced),
        }
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::FieldNotFound(name.to_string()))
    }

    /// Read the named field of the current row as a typed value.
    ///
    /// # Errors
    /// Returns [`Error::FieldNotFound`] for unknown names and
    /// [`Error::CursorNotAdvanced`] before the first [`next_row`] call.
    ///
    /// [`Error::FieldNotFound`]: crate::Error::FieldNotFound
    /// [`Error::CursorNotAdvanced`]: crate::Error::CursorNotAdvanced
    /// [`next_row`]: UtfReader::next_row
    pub fn get_value(&mut self, name: &str) -> Result<UtfValue> {
        let idx = self.column(name)?;
        let col = &self.columns[idx];
        match col.storage {
            Storage::Zero | Storage::Constant => Ok(col
                .shared
                .clone()
                .unwrap_or_else(|| UtfValue::zero(col.kind))),
            Storage::PerRow => {
                let kind = col.kind;
                let pos = self.cell_position(idx)?;
                self.source.seek(SeekFrom::Start(pos))?;
                self.read_value(kind)
            }
        }
    }

    /// Byte getter, accepting any integer cell that fits.
    pub fn get_u8(&mut self, name: &str) -> Result<u8> {
        let value = self.get_value(name)?;
        value
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| Error::FieldTypeMismatch {
                name: name.to_string(),
                expected: "u8",
                actual: value.type_name(),
            })
    }

    /// 16-bit getter, accepting any integer cell that fits.
    pub fn get_u16(&mut self, name: &str) -> Result<u16> {
        let value = self.get_value(name)?;
        value
            .as_u64()
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| Error::FieldTypeMismatch {
                name: name.to_string(),
                expected: "u16",
                actual: value.type_name(),
            })
    }

    /// 32-bit getter, accepting any integer cell that fits.
    pub fn get_u32(&mut self, name: &str) -> Result<u32> {
        let value = self.get_value(name)?;
        value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| Error::FieldTypeMismatch {
                name: name.to_string(),
                expected: "u32",
                actual: value.type_name(),
            })
    }

    /// 64-bit getter, accepting any integer cell.
    pub fn get_u64(&mut self, name: &str) -> Result<u64> {
        let value = self.get_value(name)?;
        value.as_u64().ok_or_else(|| Error::FieldTypeMismatch {
            name: name.to_string(),
            expected: "u64",
            actual: value.type_name(),
        })
    }

    /// Flag getter: any nonzero integer cell reads as `true`.
    pub fn get_bool(&mut self, name: &str) -> Result<bool> {
        let value = self.get_value(name)?;
        value
            .as_u64()
            .map(|v| v != 0)
            .ok_or_else(|| Error::FieldTypeMismatch {
                name: name.to_string(),
                expected: "integer",
                actual: value.type_name(),
            })
    }

    /// String getter.
    pub fn get_string(&mut self, name: &str) -> Result<String> {
        match self.get_value(name)? {
            UtfValue::String(s) => Ok(s),
            other => Err(Error::FieldTypeMismatch {
                name: name.to_string(),
                expected: "string",
                actual: other.type_name(),
            }),
        }
    }

    /// Copy the bytes of a data field out of the data pool.
    pub fn get_data(&mut self, name: &str) -> Result<Vec<u8>> {
        let (off, len) = self.data_ref(name)?;
        self.data_at(off, len)
    }

    /// Absolute position of a data field's bytes within the underlying
    /// source. Meaningful only when [`data_len`] is nonzero.
    ///
    /// [`data_len`]: UtfReader::data_len
    pub fn data_position(&mut self, name: &str) -> Result<u64> {
        let (off, _len) = self.data_ref(name)?;
        Ok(self.base + 8 + u64::from(self.data_offset) + u64::from(off))
    }

    /// Length in bytes of a data field.
    pub fn data_len(&mut self, name: &str) -> Result<u64> {
        let (_off, len) = self.data_ref(name)?;
        Ok(u64::from(len))
    }

    /// Pool offset and length of a data cell.
    fn data_ref(&mut self, name: &str) -> Result<(u32, u32)> {
        let idx = self.column(name)?;
        let col = &self.columns[idx];
        if col.kind != FieldType::Data {
            return Err(Error::FieldTypeMismatch {
                name: name.to_string(),
                expected: "data",
                actual: col.kind.name(),
            });
        }
        match col.storage {
            Storage::Zero => Ok((0, 0)),
            Storage::Constant => col.shared_data_ref.ok_or_else(|| {
                Error::InvalidFormat(format!("constant data column {name} has no pool reference"))
            }),
            Storage::PerRow => {
                let pos = self.cell_position(idx)?;
                self.source.seek(SeekFrom::Start(pos))?;
                let off = self.source.read_u32::<BigEndian>()?;
                let len = self.source.read_u32::<BigEndian>()?;
                Ok((off, len))
            }
        }
    }

    /// Absolute position of a per-row cell for the current row.
    fn cell_position(&self, idx: usize) -> Result<u64> {
        let row = self.current_row()?;
        Ok(self.base
            + 8
            + u64::from(self.rows_offset)
            + row * u64::from(self.row_width)
            + u64::from(self.columns[idx].cell_offset))
    }

    /// Read one value of `kind` from the source's current position.
    fn read_value(&mut self, kind: FieldType) -> Result<UtfValue> {
        Ok(match kind {
            FieldType::U8 => UtfValue::U8(self.source.read_u8()?),
            FieldType::S8 => UtfValue::S8(self.source.read_i8()?),
            FieldType::U16 => UtfValue::U16(self.source.read_u16::<BigEndian>()?),
            FieldType::S16 => UtfValue::S16(self.source.read_i16::<BigEndian>()?),
            FieldType::U32 => UtfValue::U32(self.source.read_u32::<BigEndian>()?),
            FieldType::S32 => UtfValue::S32(self.source.read_i32::<BigEndian>()?),
            FieldType::U64 => UtfValue::U64(self.source.read_u64::<BigEndian>()?),
            FieldType::S64 => UtfValue::S64(self.source.read_i64::<BigEndian>()?),
            FieldType::F32 => UtfValue::F32(self.source.read_f32::<BigEndian>()?),
            FieldType::F64 => UtfValue::F64(self.source.read_f64::<BigEndian>()?),
            FieldType::Str => {
                let off = self.source.read_u32::<BigEndian>()?;
                UtfValue::String(self.string_at(off)?)
            }
            FieldType::Data => {
                let off = self.source.read_u32::<BigEndian>()?;
                let len = self.source.read_u32::<BigEndian>()?;
                UtfValue::Data(self.data_at(off, len)?)
            }
        })
    }

    /// Read a NUL-terminated string at the given string pool offset,
    /// restoring the stream position afterwards.
    fn string_at(&mut self, pool_offset: u32) -> Result<String> {
        let saved = self.source.stream_position()?;
        let pos = self.base + 8 + u64::from(self.strings_offset) + u64::from(pool_offset);
        self.source.seek(SeekFrom::Start(pos))?;

        let mut bytes = Vec::new();
        loop {
            let b = self.source.read_u8()?;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }

        self.source.seek(SeekFrom::Start(saved))?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Read `len` bytes at the given data pool offset, restoring the stream
    /// position afterwards.
    fn data_at(&mut self, pool_offset: u32, len: u32) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let saved = self.source.stream_position()?;
        let pos = self.base + 8 + u64::from(self.data_offset) + u64::from(pool_offset);
        self.source.seek(SeekFrom::Start(pos))?;

        let mut bytes = vec![0u8; len as usize];
        self.source.read_exact(&mut bytes)?;

        self.source.seek(SeekFrom::Start(saved))?;
        Ok(bytes)
    }
}
