//! Codec id to file extension mapping

/// File extension for a waveform's codec id.
///
/// Unknown codecs fall back to `.bin`; the payload is still extracted, the
/// name just stops promising a decodable format.
#[must_use]
pub fn extension_for_codec(codec: u8) -> &'static str {
    match codec {
        0 | 3 => ".adx",
        1 => ".ahx",
        2 => ".hca",
        4 => ".wiiadpcm",
        5 => ".dsadpcm",
        6 => ".hcamx",
        7 | 10 => ".vag",
        8 => ".at3",
        9 => ".bcwav",
        11 | 18 => ".at9",
        12 => ".xma",
        13 => ".dsp",
        19 => ".m4a",
        24 => ".lopus",
        _ => ".bin",
    }
}

/// Output file name for a cue: name, optional streaming marker, codec
/// extension.
#[must_use]
pub fn cue_file_name(cue_name: &str, streaming: bool, codec: u8) -> String {
    let marker = if streaming { "_streaming" } else { "" };
    format!("{cue_name}{marker}{}", extension_for_codec(codec))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codecs() {
        assert_eq!(extension_for_codec(0), ".adx");
        assert_eq!(extension_for_codec(3), ".adx");
        assert_eq!(extension_for_codec(2), ".hca");
        assert_eq!(extension_for_codec(11), ".at9");
        assert_eq!(extension_for_codec(18), ".at9");
        assert_eq!(extension_for_codec(24), ".lopus");
    }

    #[test]
    fn test_unknown_codec_falls_back_to_bin() {
        assert_eq!(extension_for_codec(200), ".bin");
    }

    #[test]
    fn test_cue_file_name() {
        assert_eq!(cue_file_name("bgm_001", false, 2), "bgm_001.hca");
        assert_eq!(cue_file_name("bgm_001", true, 2), "bgm_001_streaming.hca");
    }
}
