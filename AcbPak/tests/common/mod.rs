//! Helpers for building synthetic cue sheets and archives on disk.

#![allow(dead_code)] // each test binary uses a different subset

use std::fs;
use std::path::Path;

use crikit::afs2::Afs2Archive;
use crikit::cpk::CpkArchive;
use crikit::utf::{UtfTable, UtfValue, WriterConfig};

/// One cue in a synthetic sheet.
pub struct CueSpec {
    pub name: &'static str,
    pub codec: u8,
    pub streaming: bool,
    pub id: u16,
}

impl CueSpec {
    pub fn memory(name: &'static str, codec: u8, id: u16) -> Self {
        Self {
            name,
            codec,
            streaming: false,
            id,
        }
    }

    pub fn streaming(name: &'static str, codec: u8, id: u16) -> Self {
        Self {
            name,
            codec,
            streaming: true,
            id,
        }
    }
}

pub fn cue_name_table(cues: &[CueSpec]) -> Vec<u8> {
    let mut table = UtfTable::new("CueName");
    for (i, cue) in cues.iter().enumerate() {
        table
            .add_row(vec![
                ("CueName", UtfValue::String(cue.name.to_string())),
                ("CueIndex", UtfValue::U16(i as u16)),
            ])
            .unwrap();
    }
    table.save(&WriterConfig::adx2()).unwrap()
}

pub fn waveform_table(cues: &[CueSpec]) -> Vec<u8> {
    let mut table = UtfTable::new("Waveform");
    for cue in cues {
        table
            .add_row(vec![
                ("EncodeType", UtfValue::U8(cue.codec)),
                ("Streaming", UtfValue::U8(u8::from(cue.streaming))),
                ("MemoryAwbId", UtfValue::U16(cue.id)),
                ("StreamAwbId", UtfValue::U16(cue.id)),
            ])
            .unwrap();
    }
    table.save(&WriterConfig::adx2()).unwrap()
}

/// Build an AFS2 archive in memory, staging payload files under `staging`.
pub fn afs2_archive(staging: &Path, entries: &[(u16, Vec<u8>)], sub_key: u16) -> Afs2Archive {
    fs::create_dir_all(staging).unwrap();
    let mut archive = Afs2Archive::new();
    for (id, payload) in entries {
        let path = staging.join(format!("{id}.bin"));
        fs::write(&path, payload).unwrap();
        archive.add(*id, &path).unwrap();
    }
    archive.set_sub_key(sub_key);
    archive
}

pub fn afs2_bytes(staging: &Path, entries: &[(u16, Vec<u8>)], sub_key: u16) -> Vec<u8> {
    afs2_archive(staging, entries, sub_key).save().unwrap()
}

pub fn cpk_bytes(staging: &Path, entries: &[(u16, Vec<u8>)]) -> Vec<u8> {
    fs::create_dir_all(staging).unwrap();
    let mut archive = CpkArchive::new();
    for (id, payload) in entries {
        let path = staging.join(format!("{id}.bin"));
        fs::write(&path, payload).unwrap();
        archive.add(*id, &path).unwrap();
    }
    archive.save().unwrap()
}

/// Wrap a streaming archive index in the one-row @UTF table some sheets use.
pub fn wrap_header(header: Vec<u8>) -> Vec<u8> {
    let mut table = UtfTable::new("StreamAwbHeader");
    table
        .add_row(vec![("Header", UtfValue::Data(header))])
        .unwrap();
    table.save(&WriterConfig::adx2()).unwrap()
}

/// Write a synthetic cue sheet container to `path`.
pub fn write_acb(path: &Path, awb: Vec<u8>, stream_header: Vec<u8>, cues: &[CueSpec]) {
    let mut table = UtfTable::new("Header");
    table
        .add_row(vec![
            ("Name", UtfValue::String("test_sheet".into())),
            ("AwbFile", UtfValue::Data(awb)),
            ("StreamAwbAfs2Header", UtfValue::Data(stream_header)),
            ("CueNameTable", UtfValue::Data(cue_name_table(cues))),
            ("WaveformTable", UtfValue::Data(waveform_table(cues))),
        ])
        .unwrap();
    table.save_to(path, &WriterConfig::adx2()).unwrap();
}
