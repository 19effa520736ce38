//! Filesystem layout conventions
//!
//! Everything hangs off the container's base path (the `.acb` path with its
//! extension stripped): the unpack directory is the base itself, and the
//! companion streaming archive is the base plus one of three historical
//! suffixes.

use std::path::{Path, PathBuf};

/// Streaming archive suffixes, probed in fixed priority order.
const STREAMING_SUFFIXES: [&str; 3] = [".awb", "_streamfiles.awb", "_STR.awb"];

/// Base path shared by a container and its companions.
pub(crate) fn base_for(acb_path: &Path) -> PathBuf {
    acb_path.with_extension("")
}

/// Output directory an `.acb` file unpacks into.
#[must_use]
pub fn output_dir_for(acb_path: &Path) -> PathBuf {
    acb_path.with_extension("")
}

/// Append a suffix to a path's final component.
pub(crate) fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Locate the companion streaming archive for a base path: first probed
/// name that exists on disk wins.
pub(crate) fn find_streaming_archive(base: &Path) -> Option<PathBuf> {
    STREAMING_SUFFIXES
        .iter()
        .map(|suffix| with_suffix(base, suffix))
        .find(|candidate| candidate.exists())
}

/// Conventional path for a streaming archive created fresh, when no
/// pre-existing archive fixed the suffix.
pub(crate) fn fallback_streaming_archive(base: &Path) -> PathBuf {
    with_suffix(base, ".awb")
}

/// The container belonging to an unpacked directory.
pub(crate) fn acb_sibling(dir: &Path) -> PathBuf {
    with_suffix(dir, ".acb")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_strips_only_the_extension() {
        assert_eq!(base_for(Path::new("sound/BGM.acb")), PathBuf::from("sound/BGM"));
        assert_eq!(acb_sibling(Path::new("sound/BGM")), PathBuf::from("sound/BGM.acb"));
    }

    #[test]
    fn test_probing_is_order_stable() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("BGM");

        std::fs::write(with_suffix(&base, "_STR.awb"), b"x").unwrap();
        assert_eq!(
            find_streaming_archive(&base),
            Some(with_suffix(&base, "_STR.awb"))
        );

        std::fs::write(with_suffix(&base, "_streamfiles.awb"), b"x").unwrap();
        assert_eq!(
            find_streaming_archive(&base),
            Some(with_suffix(&base, "_streamfiles.awb"))
        );

        // The plain suffix outranks both when present.
        std::fs::write(with_suffix(&base, ".awb"), b"x").unwrap();
        assert_eq!(find_streaming_archive(&base), Some(with_suffix(&base, ".awb")));
    }

    #[test]
    fn test_fresh_archives_fall_back_to_plain_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("BGM");
        assert_eq!(find_streaming_archive(&base), None);
        assert_eq!(
            fallback_streaming_archive(&base),
            with_suffix(&base, ".awb")
        );
    }
}
