//! Cue name and waveform table parsing
//!
//! The two tables are read independently but pair up positionally: the Nth
//! name row describes the Nth waveform row. Nothing in either table's own
//! format enforces that, so the pipelines validate the row counts explicitly
//! after parsing instead of trusting the coincidence.

use std::collections::BTreeMap;
use std::io::{Read, Seek};

use crikit::utf::UtfReader;

use crate::error::{Error, Result};

/// One waveform row: codec, storage location, archive identifier.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WaveformRow {
    pub codec: u8,
    pub streaming: bool,
    pub id: u16,
}

/// Read the cue name table into an index-to-name map.
///
/// Full table scan; storage order is not assumed to match the indices.
pub(crate) fn read_cue_names<R: Read + Seek>(
    reader: &mut UtfReader<R>,
) -> Result<BTreeMap<u16, String>> {
    let mut names = BTreeMap::new();
    while reader.next_row()? {
        let index = reader.get_u16("CueIndex")?;
        let name = reader.get_string("CueName")?;
        names.insert(index, name);
    }
    Ok(names)
}

/// Read the waveform table in row order.
///
/// The identifier field moved across schema revisions: legacy sheets carry a
/// single `Id`, newer ones split it into `MemoryAwbId` and `StreamAwbId`.
/// When the legacy field is present it wins outright; otherwise the row's
/// streaming flag picks which split field to trust. The choice is made per
/// row from schema presence.
pub(crate) fn read_waveform_rows<R: Read + Seek>(
    reader: &mut UtfReader<R>,
) -> Result<Vec<WaveformRow>> {
    let mut rows = Vec::new();
    while reader.next_row()? {
        let codec = reader.get_u8("EncodeType")?;
        let streaming = reader.get_bool("Streaming")?;
        let id = if reader.has_field("Id") {
            reader.get_u16("Id")?
        } else if streaming {
            reader.get_u16("StreamAwbId")?
        } else {
            reader.get_u16("MemoryAwbId")?
        };
        rows.push(WaveformRow {
            codec,
            streaming,
            id,
        });
    }
    Ok(rows)
}

/// Reject positionally misaligned tables.
pub(crate) fn validate_alignment(names: usize, waveforms: usize) -> Result<()> {
    if names == waveforms {
        Ok(())
    } else {
        Err(Error::TableLengthMismatch { names, waveforms })
    }
}
