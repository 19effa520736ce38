//! Obfuscation key sidecar files
//!
//! A nonzero archive sub key rides along in the unpacked directory as a raw
//! little-endian u16 marker file, so a later pack run can restore it.

use std::fs::File;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Result;

/// Inline archive key sidecar, inside the unpacked directory.
pub(crate) const SUBKEY_FILE: &str = ".subkey";

/// Streaming archive key sidecar.
pub(crate) const SUBKEY_STREAMING_FILE: &str = ".subkey_streaming";

/// Write a key sidecar.
pub(crate) fn write_key(path: &Path, key: u16) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_u16::<LittleEndian>(key)?;
    Ok(())
}

/// Read a key sidecar; `None` when the file does not exist.
pub(crate) fn read_key(path: &Path) -> Result<Option<u16>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut file = File::open(path)?;
    Ok(Some(file.read_u16::<LittleEndian>()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SUBKEY_FILE);

        assert_eq!(read_key(&path).unwrap(), None);
        write_key(&path, 0x1234).unwrap();
        assert_eq!(read_key(&path).unwrap(), Some(0x1234));
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x34, 0x12]);
    }
}
