//! Growable byte buffers for decoded and filtered audio.

pub mod accumulator;

pub use accumulator::{pad_front, ByteBuffer};
