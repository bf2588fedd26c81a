//! Core domain types for Cadence.

pub mod codec;
pub mod format;

pub use codec::{CodecDescriptor, CodecStatus};
pub use format::{format_tags, AudioFormat, FormatRequest, SampleFormat, WaveFormat};
