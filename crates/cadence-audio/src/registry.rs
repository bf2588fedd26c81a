//! Codec registry: the ordered table of codec descriptors.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::collections::HashSet;
use std::path::Path;

use cadence_core::{format_tags, CodecDescriptor, CodecStatus, Error, Result};
use tracing::debug;

/// Ordered list of codec descriptors; earlier entries are preferred within a
/// stability tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecRegistry {
    codecs: Vec<CodecDescriptor>,
}

impl CodecRegistry {
    /// Build a registry, rejecting duplicate codec names.
    pub fn new(codecs: Vec<CodecDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        for codec in &codecs {
            if !seen.insert(codec.name.as_str()) {
                return Err(Error::InvalidArgument(format!(
                    "Duplicate codec entry: {}",
                    codec.name
                )));
            }
        }
        Ok(Self { codecs })
    }

    /// The built-in codec table.
    pub fn builtin() -> Self {
        use CodecStatus::{Buggy, Untested, Working};

        let codecs = vec![
            CodecDescriptor::new(
                "pcm",
                "Uncompressed PCM",
                "pcm",
                Working,
                vec![
                    format_tags::PCM,
                    format_tags::IEEE_FLOAT,
                    format_tags::TWOS,
                    format_tags::SOWT,
                ],
            ),
            CodecDescriptor::new(
                "mp3",
                "MPEG layer-3 audio",
                "symphonia",
                Working,
                vec![format_tags::MP3],
            ),
            CodecDescriptor::new(
                "mp2",
                "MPEG layer-2 audio",
                "symphonia",
                Working,
                vec![format_tags::MP2],
            ),
            CodecDescriptor::new(
                "flac",
                "Free Lossless Audio Codec",
                "symphonia",
                Working,
                vec![format_tags::FLAC],
            ),
            CodecDescriptor::new(
                "vorbis",
                "Ogg Vorbis audio",
                "symphonia",
                Working,
                vec![format_tags::VORBIS],
            ),
            CodecDescriptor::new(
                "aac",
                "AAC low complexity",
                "symphonia",
                Buggy,
                vec![format_tags::AAC],
            ),
            CodecDescriptor::new(
                "alac",
                "Apple Lossless",
                "symphonia",
                Untested,
                vec![format_tags::ALAC],
            ),
            CodecDescriptor::new(
                "opus",
                "Opus audio (libopus)",
                "libopus",
                Working,
                vec![format_tags::OPUS],
            ),
        ];

        Self { codecs }
    }

    /// Parse a registry from a JSON array of descriptors.
    pub fn from_json(json: &str) -> Result<Self> {
        let codecs: Vec<CodecDescriptor> = serde_json::from_str(json)?;
        debug!("Loaded {} codec entries", codecs.len());
        Self::new(codecs)
    }

    /// Load a registry from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// All entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = &CodecDescriptor> {
        self.codecs.iter()
    }

    /// Entries decoding `format_tag`, in table order.
    pub fn for_format(&self, format_tag: u32) -> impl Iterator<Item = &CodecDescriptor> {
        self.codecs.iter().filter(move |c| c.supports(format_tag))
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&CodecDescriptor> {
        self.codecs.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_pcm() {
        let registry = CodecRegistry::builtin();
        let pcm: Vec<_> = registry.for_format(format_tags::PCM).collect();
        assert_eq!(pcm.len(), 1);
        assert_eq!(pcm[0].family, "pcm");
        assert!(registry.get("mp3").is_some());
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"name": "a", "family": "x", "status": "working", "formats": [85]},
            {"name": "b", "family": "y", "status": "crashing", "formats": [85, 80]}
        ]"#;
        let registry = CodecRegistry::from_json(json).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.for_format(0x50).count(), 1);
        assert_eq!(registry.get("b").unwrap().status, CodecStatus::Crashing);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"[
            {"name": "a", "family": "x", "status": "working", "formats": [1]},
            {"name": "a", "family": "y", "status": "buggy", "formats": [1]}
        ]"#;
        assert!(matches!(
            CodecRegistry::from_json(json),
            Err(Error::InvalidArgument(_))
        ));
    }
}
