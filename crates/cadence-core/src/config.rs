//! Decoder and filter configuration.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Collapse a stereo stream to one of its channels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FakeMono {
    #[default]
    Off,
    Left,
    Right,
}

/// Filter chain configuration, passed explicitly to the chain builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FilterConfig {
    /// Play only one channel of a stereo input on every output channel.
    pub fake_mono: FakeMono,
    /// Frames per resampler processing chunk.
    pub resampler_chunk_frames: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            fake_mono: FakeMono::Off,
            resampler_chunk_frames: 1024,
        }
    }
}

/// Per-stream decoder configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DecoderConfig {
    /// Ask drivers for float output when they support it.
    pub prefer_float: bool,
    /// Filter chain configuration.
    pub filter: FilterConfig,
}

impl DecoderConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DecoderConfig =
            serde_json::from_str(r#"{"filter":{"fake_mono":"left"}}"#).unwrap();
        assert!(!config.prefer_float);
        assert_eq!(config.filter.fake_mono, FakeMono::Left);
        assert_eq!(config.filter.resampler_chunk_frames, 1024);
    }

    #[test]
    fn test_empty_config() {
        let config: DecoderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DecoderConfig::default());
    }
}
