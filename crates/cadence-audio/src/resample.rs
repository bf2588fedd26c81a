//! Sample rate conversion using rubato.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use cadence_core::{Error, Result};
use rubato::{FftFixedIn, Resampler as RubatoResampler};
use tracing::debug;

/// Streaming resampler over interleaved f32 samples.
///
/// Input that does not fill a whole chunk is kept until the next call.
pub struct Resampler {
    #[allow(clippy::struct_field_names)]
    resampler: Option<FftFixedIn<f32>>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    chunk_size: usize,
    /// Deinterleaved input waiting for a full chunk.
    pending: Vec<Vec<f32>>,
}

impl Resampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: usize, chunk_size: usize) -> Result<Self> {
        if channels == 0 || chunk_size == 0 {
            return Err(Error::FormatNegotiation(format!(
                "Invalid resampler layout: {channels} channels, chunk {chunk_size}"
            )));
        }

        let resampler = if input_rate == output_rate {
            None
        } else {
            let inner = FftFixedIn::new(
                input_rate as usize,
                output_rate as usize,
                chunk_size,
                2,
                channels,
            )
            .map_err(|e| Error::FormatNegotiation(format!("Failed to create resampler: {e}")))?;
            debug!(
                "Resampler created: {}Hz -> {}Hz, {} channels",
                input_rate, output_rate, channels
            );
            Some(inner)
        };

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
            channels,
            chunk_size,
            pending: vec![Vec::new(); channels],
        })
    }

    pub const fn needs_resampling(&self) -> bool {
        self.input_rate != self.output_rate
    }

    pub const fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub const fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Frames buffered and not yet resampled.
    pub fn pending_frames(&self) -> usize {
        self.pending[0].len()
    }

    /// Resample `input` and append whatever complete chunks produce to `output`.
    pub fn process(&mut self, input: &[f32], output: &mut Vec<f32>) -> Result<()> {
        let Some(resampler) = self.resampler.as_mut() else {
            output.extend_from_slice(input);
            return Ok(());
        };

        for frame in input.chunks_exact(self.channels) {
            for (buffer, &sample) in self.pending.iter_mut().zip(frame) {
                buffer.push(sample);
            }
        }

        while self.pending[0].len() >= self.chunk_size {
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| ch.drain(..self.chunk_size).collect())
                .collect();

            let resampled = resampler
                .process(&chunk, None)
                .map_err(|e| Error::Filter(format!("Resample failed: {e}")))?;

            let frames = resampled.first().map_or(0, Vec::len);
            output.reserve(frames * self.channels);
            for frame in 0..frames {
                for ch in &resampled {
                    output.push(ch[frame]);
                }
            }
        }

        Ok(())
    }

    /// Resample whatever is still buffered, padding the final partial chunk
    /// with silence and keeping only the output it accounts for.
    pub fn flush(&mut self, output: &mut Vec<f32>) -> Result<()> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(());
        };
        let remaining = self.pending[0].len();
        if remaining == 0 {
            return Ok(());
        }
        debug_assert!(remaining < self.chunk_size);

        let chunk: Vec<Vec<f32>> = self
            .pending
            .iter_mut()
            .map(|ch| {
                let mut data = std::mem::take(ch);
                data.resize(self.chunk_size, 0.0);
                data
            })
            .collect();

        let resampled = resampler
            .process(&chunk, None)
            .map_err(|e| Error::Filter(format!("Resample failed: {e}")))?;

        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let wanted = (remaining as f64 * f64::from(self.output_rate)
            / f64::from(self.input_rate)) as usize;
        let frames = resampled.first().map_or(0, Vec::len).min(wanted);
        output.reserve(frames * self.channels);
        for frame in 0..frames {
            for ch in &resampled {
                output.push(ch[frame]);
            }
        }
        Ok(())
    }
}
