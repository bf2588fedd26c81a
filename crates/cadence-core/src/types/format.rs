//! Sample and stream format types.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known compressed format tags (`WAVEFORMATEX` ids and fourccs).
pub mod format_tags {
    /// Build a little-endian fourcc tag.
    pub const fn fourcc(code: &[u8; 4]) -> u32 {
        u32::from_le_bytes(*code)
    }

    pub const PCM: u32 = 0x0001;
    pub const IEEE_FLOAT: u32 = 0x0003;
    pub const MP2: u32 = 0x0050;
    pub const MP3: u32 = 0x0055;
    pub const AAC: u32 = 0x00FF;
    pub const VORBIS: u32 = 0x566F;
    pub const FLAC: u32 = 0xF1AC;
    /// Big-endian signed 16-bit PCM.
    pub const TWOS: u32 = fourcc(b"twos");
    /// Little-endian signed 16-bit PCM.
    pub const SOWT: u32 = fourcc(b"sowt");
    pub const OPUS: u32 = fourcc(b"Opus");
    pub const ALAC: u32 = fourcc(b"alac");
}

/// Sample representation of decoded audio. Multi-byte formats are native-endian.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Unsigned 8-bit.
    U8,
    /// Signed 16-bit.
    #[default]
    S16,
    /// Signed 32-bit.
    S32,
    /// 32-bit IEEE float.
    F32,
}

impl SampleFormat {
    /// Size of one sample in bytes.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
        }
    }

    /// Whether this is a floating-point representation.
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32)
    }

    /// Pick the integer format matching a bit depth, if any.
    pub const fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            8 => Some(Self::U8),
            16 => Some(Self::S16),
            24 | 32 => Some(Self::S32),
            _ => None,
        }
    }

    /// Short display name.
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::S16 => "s16ne",
            Self::S32 => "s32ne",
            Self::F32 => "floatne",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A fully specified PCM format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct AudioFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample representation.
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    /// Size of one sample in bytes.
    pub const fn bytes_per_sample(&self) -> usize {
        self.sample_format.bytes_per_sample()
    }

    /// Size of one interleaved frame (one sample per channel) in bytes.
    pub const fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.bytes_per_sample()
    }

    /// Uncompressed byte rate.
    pub const fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.bytes_per_frame()
    }

    /// Whether rate and channel count are both known.
    pub const fn is_complete(&self) -> bool {
        self.sample_rate != 0 && self.channels != 0
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz/{}ch/{}",
            self.sample_rate, self.channels, self.sample_format
        )
    }
}

/// A requested output format; unset fields fall back to the input format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FormatRequest {
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub channels: Option<u16>,
    #[serde(default)]
    pub sample_format: Option<SampleFormat>,
}

impl FormatRequest {
    /// Resolve against an input format.
    pub fn resolve(&self, input: &AudioFormat) -> AudioFormat {
        AudioFormat {
            sample_rate: self
                .sample_rate
                .filter(|&r| r != 0)
                .unwrap_or(input.sample_rate),
            channels: self.channels.filter(|&c| c != 0).unwrap_or(input.channels),
            sample_format: self.sample_format.unwrap_or(input.sample_format),
        }
    }
}

impl From<AudioFormat> for FormatRequest {
    fn from(format: AudioFormat) -> Self {
        Self {
            sample_rate: Some(format.sample_rate),
            channels: Some(format.channels),
            sample_format: Some(format.sample_format),
        }
    }
}

/// Container-level description of an audio stream, as provided by a demuxer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct WaveFormat {
    pub format_tag: u32,
    pub channels: u16,
    pub sample_rate: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}
