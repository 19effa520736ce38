use std::io::{Cursor, Seek, SeekFrom};

use crikit::Error;
use crikit::utf::{UtfReader, UtfTable, UtfValue, WriterConfig};
use pretty_assertions::assert_eq;

fn cue_table_bytes() -> Vec<u8> {
    let mut table = UtfTable::new("CueName");
    table
        .add_row(vec![
            ("CueName", UtfValue::String("intro".into())),
            ("CueIndex", UtfValue::U16(0)),
        ])
        .unwrap();
    table
        .add_row(vec![
            ("CueName", UtfValue::String("battle".into())),
            ("CueIndex", UtfValue::U16(1)),
        ])
        .unwrap();
    table.save(&WriterConfig::adx2()).unwrap()
}

#[test]
fn reader_walks_rows_with_typed_getters() {
    let mut reader = UtfReader::from_bytes(cue_table_bytes()).unwrap();

    assert_eq!(reader.name(), "CueName");
    assert_eq!(reader.row_count(), 2);
    assert!(reader.has_field("CueIndex"));
    assert!(!reader.has_field("Nope"));

    let mut names = Vec::new();
    while reader.next_row().unwrap() {
        let index = reader.get_u16("CueIndex").unwrap();
        let name = reader.get_string("CueName").unwrap();
        names.push((index, name));
    }
    assert_eq!(names, vec![(0, "intro".to_string()), (1, "battle".to_string())]);
}

#[test]
fn reader_rejects_access_before_first_row() {
    let mut reader = UtfReader::from_bytes(cue_table_bytes()).unwrap();
    let err = reader.get_u16("CueIndex").unwrap_err();
    assert!(matches!(err, Error::CursorNotAdvanced));
}

#[test]
fn reader_reports_missing_fields() {
    let mut reader = UtfReader::from_bytes(cue_table_bytes()).unwrap();
    reader.next_row().unwrap();
    let err = reader.get_u16("WaveformIndex").unwrap_err();
    assert!(matches!(err, Error::FieldNotFound(name) if name == "WaveformIndex"));
}

#[test]
fn reader_resolves_tables_embedded_mid_stream() {
    // A cue sheet reads its sub-tables from inside a larger file; the reader
    // must resolve every pool offset relative to where the table starts, not
    // to the start of the stream.
    let table_bytes = cue_table_bytes();
    let mut buffer = vec![0xEEu8; 123];
    buffer.extend_from_slice(&table_bytes);

    let mut cursor = Cursor::new(buffer);
    cursor.seek(SeekFrom::Start(123)).unwrap();
    let mut reader = UtfReader::new(cursor).unwrap();
    reader.next_row().unwrap();
    assert_eq!(reader.get_string("CueName").unwrap(), "intro");
}

#[test]
fn data_position_is_absolute_in_the_source() {
    let mut sheet = UtfTable::new("Sheet");
    sheet
        .add_row(vec![("AwbFile", UtfValue::Data(vec![0xAA; 48]))])
        .unwrap();
    let sheet_bytes = sheet.save(&WriterConfig::adx2()).unwrap();

    let mut buffer = vec![0u8; 64];
    buffer.extend_from_slice(&sheet_bytes);
    let mut cursor = Cursor::new(buffer.clone());
    cursor.seek(SeekFrom::Start(64)).unwrap();

    let mut reader = UtfReader::new(cursor).unwrap();
    reader.next_row().unwrap();
    let pos = reader.data_position("AwbFile").unwrap() as usize;
    let len = reader.data_len("AwbFile").unwrap() as usize;

    assert_eq!(len, 48);
    assert_eq!(&buffer[pos..pos + len], &[0xAA; 48][..]);
}

#[test]
fn bool_getter_reads_nonzero_integers() {
    let mut table = UtfTable::new("Waveform");
    table
        .add_row(vec![
            ("Streaming", UtfValue::U8(0)),
            ("LoopFlag", UtfValue::U16(2)),
        ])
        .unwrap();
    let mut reader = UtfReader::from_bytes(table.save(&WriterConfig::default()).unwrap()).unwrap();
    reader.next_row().unwrap();
    assert!(!reader.get_bool("Streaming").unwrap());
    assert!(reader.get_bool("LoopFlag").unwrap());
}

#[test]
fn load_save_load_preserves_all_values() {
    let mut table = UtfTable::new("Mixed");
    table
        .add_row(vec![
            ("Byte", UtfValue::U8(250)),
            ("Short", UtfValue::S16(-4)),
            ("Word", UtfValue::U32(0xDEADBEEF)),
            ("Wide", UtfValue::U64(1 << 40)),
            ("Ratio", UtfValue::F32(0.5)),
            ("Name", UtfValue::String("cue_00".into())),
            ("Blob", UtfValue::Data(vec![9, 8, 7])),
        ])
        .unwrap();

    let once = table.save(&WriterConfig::adx2()).unwrap();
    let reloaded = UtfTable::from_bytes(&once).unwrap();
    let twice = reloaded.save(&WriterConfig::adx2()).unwrap();

    // Identical layout settings produce identical bytes.
    assert_eq!(once, twice);
}
