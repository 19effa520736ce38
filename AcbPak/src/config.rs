//! Tool settings
//!
//! Process-wide tunables are resolved once at startup - optional
//! `acbpak.toml` in the working directory, overridden by CLI flags - and
//! passed down into the pipelines as explicit values, never read from
//! ambient state.

use crikit::extract::ExtractorConfig;
use serde::Deserialize;

const CONFIG_FILE: &str = "acbpak.toml";

/// Runtime tunables for the extraction copy pool.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// I/O buffer size for payload copies, in bytes.
    pub buffer_size: usize,
    /// Worker threads for extraction; 0 means the rayon default.
    pub max_threads: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
            max_threads: 0,
        }
    }
}

impl Settings {
    /// Load settings from `acbpak.toml` in the working directory.
    ///
    /// A missing file means defaults; a malformed file is logged and
    /// ignored rather than aborting the run.
    #[must_use]
    pub fn load() -> Self {
        match std::fs::read_to_string(CONFIG_FILE) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!("ignoring malformed {CONFIG_FILE}: {e}");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// The engine-level copy pool configuration these settings describe.
    #[must_use]
    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            buffer_size: self.buffer_size,
            max_threads: self.max_threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.buffer_size, 64 * 1024);
        assert_eq!(settings.max_threads, 0);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str("max_threads = 4").unwrap();
        assert_eq!(settings.max_threads, 4);
        assert_eq!(settings.buffer_size, 64 * 1024);
    }
}
