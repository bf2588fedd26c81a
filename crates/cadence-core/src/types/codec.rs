//! Codec descriptors and stability tiers.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stability tier of a codec entry.
///
/// Ordered from least to most preferred for automatic selection:
/// `Crashing < Buggy < Working < Untested`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CodecStatus {
    /// Known to crash; never picked automatically.
    Crashing,
    /// Works with known problems.
    Buggy,
    /// Known to work.
    Working,
    /// Not yet verified.
    Untested,
}

impl CodecStatus {
    /// Tiers scanned by automatic selection, highest first.
    pub const AUTO_TIERS: [Self; 3] = [Self::Untested, Self::Working, Self::Buggy];

    /// Whether automatic selection may ever pick this tier.
    pub const fn is_auto_eligible(self) -> bool {
        !matches!(self, Self::Crashing)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crashing => "crashing",
            Self::Buggy => "buggy",
            Self::Working => "working",
            Self::Untested => "untested",
        }
    }
}

impl fmt::Display for CodecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the codec registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodecDescriptor {
    /// Unique codec name, matched by forced and excluded directives.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub info: String,
    /// Driver family implementing this codec.
    pub family: String,
    /// Stability tier.
    pub status: CodecStatus,
    /// Format tags this codec can decode.
    pub formats: Vec<u32>,
}

impl CodecDescriptor {
    pub fn new(
        name: impl Into<String>,
        info: impl Into<String>,
        family: impl Into<String>,
        status: CodecStatus,
        formats: Vec<u32>,
    ) -> Self {
        Self {
            name: name.into(),
            info: info.into(),
            family: family.into(),
            status,
            formats,
        }
    }

    /// Check if this codec handles a format tag.
    pub fn supports(&self, format_tag: u32) -> bool {
        self.formats.contains(&format_tag)
    }
}
