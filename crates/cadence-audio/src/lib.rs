//! # cadence-audio
//!
//! Audio decoding pipeline for Cadence.
//!
//! Features:
//! - Codec selection over a registry of codec entries and driver families
//! - Decoder sessions with all-or-nothing initialization
//! - Chunked decode-filter loop feeding a caller-owned byte accumulator
//! - Symphonia-based container demuxing and compressed decoding
//! - Rubato-based resampling in the standard filter chain

pub mod buffer;
pub mod demux;
pub mod driver;
pub mod drivers;
pub mod fill;
pub mod filter;
pub mod registry;
pub mod resample;
pub mod select;
pub mod session;

#[cfg(test)]
mod testing;

pub use buffer::{pad_front, ByteBuffer};
pub use demux::{ContainerDemuxer, Demuxer, Packet, PacketQueue};
pub use driver::{
    list_drivers, AudioDriver, ControlOp, ControlResult, DriverContext, DriverFactory, DriverInfo,
    DriverRegistry,
};
pub use fill::{ChunkStatus, FillOutcome};
pub use filter::{AudioBlock, FilterChain, FilterChainBuilder, StandardChain, StandardChainBuilder};
pub use registry::CodecRegistry;
pub use select::Directive;
pub use session::{AudioStream, StreamHeader};
