//! Built-in filter chain: sample conversion, channel mapping and resampling.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use cadence_core::{AudioFormat, Error, FakeMono, FilterConfig, Result};
use tracing::{debug, warn};

use super::convert::{bytes_to_f32, f32_to_bytes};
use super::{nominal_expansion_ratio, AudioBlock, FilterChain, FilterChainBuilder};
use crate::resample::Resampler;

/// Largest channel count the chain accepts on either side.
pub const MAX_CHANNELS: u16 = 8;

/// Builds [`StandardChain`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardChainBuilder;

impl FilterChainBuilder for StandardChainBuilder {
    fn build(
        &self,
        input: AudioFormat,
        output: AudioFormat,
        config: &FilterConfig,
    ) -> Result<Box<dyn FilterChain>> {
        Ok(Box::new(StandardChain::new(input, output, config)?))
    }
}

/// Converts any complete PCM format into any other.
pub struct StandardChain {
    input: AudioFormat,
    output: AudioFormat,
    fake_mono: FakeMono,
    resampler: Resampler,
    samples: Vec<f32>,
    mapped: Vec<f32>,
    resampled: Vec<f32>,
    out: Vec<u8>,
}

impl StandardChain {
    pub fn new(input: AudioFormat, output: AudioFormat, config: &FilterConfig) -> Result<Self> {
        for (side, format) in [("input", &input), ("output", &output)] {
            if !format.is_complete() {
                return Err(Error::FormatNegotiation(format!(
                    "Incomplete {side} format {format}"
                )));
            }
            if format.channels > MAX_CHANNELS {
                return Err(Error::FormatNegotiation(format!(
                    "Unsupported {side} channel count {}",
                    format.channels
                )));
            }
        }

        let fake_mono = if config.fake_mono != FakeMono::Off && input.channels != 2 {
            warn!("Fake mono needs a stereo input, ignoring for {input}");
            FakeMono::Off
        } else {
            config.fake_mono
        };

        let resampler = Resampler::new(
            input.sample_rate,
            output.sample_rate,
            usize::from(output.channels),
            config.resampler_chunk_frames,
        )?;

        debug!("Audio filter chain: {input} -> {output}");

        Ok(Self {
            input,
            output,
            fake_mono,
            resampler,
            samples: Vec::new(),
            mapped: Vec::new(),
            resampled: Vec::new(),
            out: Vec::new(),
        })
    }

    fn map_channels(&mut self) {
        let in_ch = usize::from(self.input.channels);
        let out_ch = usize::from(self.output.channels);
        self.mapped.clear();

        if self.fake_mono != FakeMono::Off {
            let pick = usize::from(self.fake_mono == FakeMono::Right);
            for frame in self.samples.chunks_exact(in_ch) {
                for _ in 0..out_ch {
                    self.mapped.push(frame[pick]);
                }
            }
            return;
        }

        if in_ch == out_ch {
            self.mapped.extend_from_slice(&self.samples);
            return;
        }

        for frame in self.samples.chunks_exact(in_ch) {
            for j in 0..out_ch {
                if in_ch > out_ch {
                    let (sum, n) = frame
                        .iter()
                        .enumerate()
                        .filter(|(c, _)| c % out_ch == j)
                        .fold((0.0f32, 0u16), |(sum, n), (_, &s)| (sum + s, n + 1));
                    self.mapped.push(sum / f32::from(n.max(1)));
                } else {
                    self.mapped.push(frame[j % in_ch]);
                }
            }
        }
    }
}

impl FilterChain for StandardChain {
    fn input_format(&self) -> AudioFormat {
        self.input
    }

    fn output_format(&self) -> AudioFormat {
        self.output
    }

    fn expansion_ratio(&self) -> f64 {
        nominal_expansion_ratio(&self.input, &self.output)
    }

    fn process(&mut self, block: &AudioBlock<'_>) -> Option<&[u8]> {
        if block.format != self.input {
            warn!(
                "Audio filter chain expects {} but got {}",
                self.input, block.format
            );
            return None;
        }

        self.samples.clear();
        bytes_to_f32(block.data, self.input.sample_format, &mut self.samples);
        self.map_channels();

        self.resampled.clear();
        if let Err(e) = self.resampler.process(&self.mapped, &mut self.resampled) {
            warn!("Audio filter chain failed: {e}");
            return None;
        }

        self.out.clear();
        f32_to_bytes(&self.resampled, self.output.sample_format, &mut self.out);
        Some(&self.out)
    }

    fn flush(&mut self) -> Option<&[u8]> {
        self.resampled.clear();
        if let Err(e) = self.resampler.flush(&mut self.resampled) {
            warn!("Audio filter chain failed to flush: {e}");
            return None;
        }
        self.out.clear();
        f32_to_bytes(&self.resampled, self.output.sample_format, &mut self.out);
        Some(&self.out)
    }
}
