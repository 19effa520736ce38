//! Failure-ordering tests: resolution errors must leave no output behind.

mod common;

use std::fs;

use acbpak::Error;
use acbpak::acb::{AcbPacker, pack_dir, unpack_acb};
use acbpak::config::Settings;
use common::{CueSpec, afs2_archive, afs2_bytes, write_acb};
use tempfile::TempDir;

#[test]
fn missing_streaming_archive_aborts_before_any_output() {
    let dir = TempDir::new().unwrap();
    let acb_path = dir.path().join("GONE.acb");
    let cues = [CueSpec::streaming("lost", 2, 0)];

    let archive = afs2_archive(&dir.path().join("stage"), &[(0, vec![1, 2, 3])], 0);
    // Header references a streaming archive, but no companion file exists.
    write_acb(
        &acb_path,
        Vec::new(),
        archive.header_bytes().unwrap(),
        &cues,
    );

    let err = unpack_acb(&acb_path).unwrap_err();
    assert!(matches!(err, Error::MissingStreamingArchive { .. }));
    assert!(
        !dir.path().join("GONE").exists(),
        "no output directory may exist after a resolution failure"
    );
}

#[test]
fn unknown_archive_id_aborts_before_any_output() {
    let dir = TempDir::new().unwrap();
    let acb_path = dir.path().join("DANGL.acb");
    // Waveform id 5 has no archive entry.
    let cues = [CueSpec::memory("ok", 2, 0), CueSpec::memory("dangling", 2, 5)];
    let awb = afs2_bytes(&dir.path().join("stage"), &[(0, b"fine".to_vec())], 0);
    write_acb(&acb_path, awb, Vec::new(), &cues);

    let err = unpack_acb(&acb_path).unwrap_err();
    assert!(matches!(
        err,
        Error::Format(crikit::Error::EntryNotFound { id: 5 })
    ));
    // Even the resolvable first cue must not have been written.
    assert!(!dir.path().join("DANGL").exists());
}

#[test]
fn misaligned_tables_rejected_before_output() {
    let dir = TempDir::new().unwrap();
    let acb_path = dir.path().join("NONAME.acb");
    let cues = [CueSpec::memory("only", 2, 0), CueSpec::memory("extra", 2, 1)];
    let awb = afs2_bytes(
        &dir.path().join("stage"),
        &[(0, b"a".to_vec()), (1, b"b".to_vec())],
        0,
    );
    // Misaligned on purpose: two waveform rows, one name row.
    let name_only = vec![CueSpec::memory("only", 2, 0)];
    let mut table = crikit::utf::UtfTable::new("Header");
    table
        .add_row(vec![
            ("Name", crikit::utf::UtfValue::String("t".into())),
            ("AwbFile", crikit::utf::UtfValue::Data(awb)),
            ("StreamAwbAfs2Header", crikit::utf::UtfValue::Data(Vec::new())),
            (
                "CueNameTable",
                crikit::utf::UtfValue::Data(common::cue_name_table(&name_only)),
            ),
            (
                "WaveformTable",
                crikit::utf::UtfValue::Data(common::waveform_table(&cues)),
            ),
        ])
        .unwrap();
    table
        .save_to(&acb_path, &crikit::utf::WriterConfig::adx2())
        .unwrap();

    let err = unpack_acb(&acb_path).unwrap_err();
    assert!(matches!(
        err,
        Error::TableLengthMismatch {
            names: 1,
            waveforms: 2
        }
    ));
    assert!(!dir.path().join("NONAME").exists());
}

#[test]
fn skipped_cue_index_is_a_lookup_failure() {
    let dir = TempDir::new().unwrap();
    let acb_path = dir.path().join("SKIP.acb");
    let awb = afs2_bytes(
        &dir.path().join("stage"),
        &[(0, b"a".to_vec()), (1, b"b".to_vec())],
        0,
    );

    // Two name rows whose indices are 0 and 2: row counts line up with the
    // waveform table, but positional index 1 has no name.
    let mut names = crikit::utf::UtfTable::new("CueName");
    for (name, index) in [("a", 0u16), ("c", 2u16)] {
        names
            .add_row(vec![
                ("CueName", crikit::utf::UtfValue::String(name.into())),
                ("CueIndex", crikit::utf::UtfValue::U16(index)),
            ])
            .unwrap();
    }
    let cues = [CueSpec::memory("a", 2, 0), CueSpec::memory("c", 2, 1)];
    let mut table = crikit::utf::UtfTable::new("Header");
    table
        .add_row(vec![
            ("Name", crikit::utf::UtfValue::String("t".into())),
            ("AwbFile", crikit::utf::UtfValue::Data(awb)),
            ("StreamAwbAfs2Header", crikit::utf::UtfValue::Data(Vec::new())),
            (
                "CueNameTable",
                crikit::utf::UtfValue::Data(
                    names
                        .save(&crikit::utf::WriterConfig::adx2())
                        .unwrap(),
                ),
            ),
            (
                "WaveformTable",
                crikit::utf::UtfValue::Data(common::waveform_table(&cues)),
            ),
        ])
        .unwrap();
    table
        .save_to(&acb_path, &crikit::utf::WriterConfig::adx2())
        .unwrap();

    let err = unpack_acb(&acb_path).unwrap_err();
    assert!(matches!(err, Error::CueNameNotFound { index: 1 }));
    assert!(!dir.path().join("SKIP").exists());
}

#[test]
fn pack_names_the_exact_missing_input_file() {
    let dir = TempDir::new().unwrap();
    let acb_path = dir.path().join("PACKME.acb");
    let cues = [
        CueSpec::memory("A", 0, 0),
        CueSpec::memory("B", 2, 1),
        CueSpec::memory("C", 2, 2),
    ];
    let awb = afs2_bytes(
        &dir.path().join("stage"),
        &[
            (0, b"one".to_vec()),
            (1, b"two".to_vec()),
            (2, b"three".to_vec()),
        ],
        0,
    );
    write_acb(&acb_path, awb, Vec::new(), &cues);

    let out = unpack_acb(&acb_path).unwrap();
    fs::remove_file(out.join("C.hca")).unwrap();
    let before = fs::read(&acb_path).unwrap();

    let err = pack_dir(&out).unwrap_err();
    match err {
        Error::MissingInputFile { path } => assert_eq!(path, out.join("C.hca")),
        other => panic!("expected MissingInputFile, got {other}"),
    }
    // The failure struck before any bytes were written back.
    assert_eq!(fs::read(&acb_path).unwrap(), before);
}

#[test]
fn pack_requires_the_original_container() {
    let dir = TempDir::new().unwrap();
    let unpacked = dir.path().join("ORPHAN");
    fs::create_dir_all(&unpacked).unwrap();

    let packer = AcbPacker::new(Settings::default().extractor_config());
    let err = packer.pack(&unpacked, &|_, _, _| {}).unwrap_err();
    match err {
        Error::MissingAcbFile { path } => assert_eq!(path, dir.path().join("ORPHAN.acb")),
        other => panic!("expected MissingAcbFile, got {other}"),
    }
}

#[test]
fn sub_key_sidecar_sets_the_rebuilt_inline_key() {
    let dir = TempDir::new().unwrap();
    let acb_path = dir.path().join("KEYED.acb");
    let cues = [CueSpec::memory("K", 2, 0)];
    let awb = afs2_bytes(&dir.path().join("stage"), &[(0, b"keyed".to_vec())], 0x1234);
    write_acb(&acb_path, awb, Vec::new(), &cues);

    let out = unpack_acb(&acb_path).unwrap();
    assert_eq!(fs::read(out.join(".subkey")).unwrap(), vec![0x34, 0x12]);

    pack_dir(&out).unwrap();

    let sheet = crikit::utf::UtfTable::open(&acb_path).unwrap();
    let blob = sheet.data(0, "AwbFile").unwrap().to_vec();
    let rebuilt = crikit::afs2::Afs2Archive::from_bytes(&blob).unwrap();
    assert_eq!(rebuilt.sub_key(), 0x1234);
}
