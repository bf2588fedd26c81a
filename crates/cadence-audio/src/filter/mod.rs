//! Filter chain interface between the decoder and the caller's output format.

pub mod convert;
pub mod standard;

use cadence_core::{AudioFormat, FilterConfig, Result};

pub use standard::{StandardChain, StandardChainBuilder};

/// One block of decoded audio handed to the filter chain.
#[derive(Debug, Clone, Copy)]
pub struct AudioBlock<'a> {
    pub data: &'a [u8],
    pub format: AudioFormat,
}

/// Converts decoded audio into the output format.
///
/// A chain may buffer input internally and emit output in larger blocks.
pub trait FilterChain: Send {
    fn input_format(&self) -> AudioFormat;

    fn output_format(&self) -> AudioFormat;

    /// Average output bytes produced per input byte.
    fn expansion_ratio(&self) -> f64;

    /// Filter one block; `None` means the chain failed.
    ///
    /// The returned slice may be empty while the chain is buffering.
    fn process(&mut self, block: &AudioBlock<'_>) -> Option<&[u8]>;

    /// Emit everything still buffered; called before the chain is dropped
    /// or rebuilt. `None` means the chain failed.
    fn flush(&mut self) -> Option<&[u8]> {
        Some(&[])
    }
}

/// Creates filter chains between two formats.
pub trait FilterChainBuilder {
    fn build(
        &self,
        input: AudioFormat,
        output: AudioFormat,
        config: &FilterConfig,
    ) -> Result<Box<dyn FilterChain>>;
}

/// Output bytes per input byte for a pure format conversion.
pub fn nominal_expansion_ratio(input: &AudioFormat, output: &AudioFormat) -> f64 {
    let in_rate = input.bytes_per_second();
    if in_rate == 0 {
        return 1.0;
    }
    output.bytes_per_second() as f64 / in_rate as f64
}
