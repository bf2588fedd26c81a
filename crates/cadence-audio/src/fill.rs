//! Chunked decode-filter loop.
//!
//! Decoded audio is produced into the session's decode buffer, handed to the
//! filter chain in unit-aligned blocks, and the filter output is appended to
//! a caller-owned [`ByteBuffer`] until it holds the requested amount.

use cadence_core::{AudioFormat, Error, Result};
use tracing::{debug, trace};

use crate::buffer::ByteBuffer;
use crate::driver::DriverContext;
use crate::filter::AudioBlock;
use crate::session::AudioStream;

/// Request size used once a filter is known to buffer heavily.
pub const SMALL_REQUEST_LEN: usize = 2000;

/// Extra units added to every estimated request to absorb filter buffering.
const SLACK_UNITS: usize = 32;

/// Decoded audio is only ever cut at multiples of this many bytes.
pub const fn unit_size(format: &AudioFormat) -> usize {
    format.channels as usize * format.bytes_per_sample() * 16
}

/// Largest request that still leaves room for a driver's overshoot.
pub const fn max_decode_len(capacity: usize, out_min_size: usize, unit: usize) -> usize {
    let len = capacity.saturating_sub(out_min_size);
    if unit == 0 {
        return len;
    }
    len - len % unit
}

/// Estimates how many decoded bytes to request per iteration.
#[derive(Debug, Clone, Copy)]
pub struct RequestPlanner {
    unit: usize,
    max_decode_len: usize,
    ratio: f64,
    huge_filter_buffer: bool,
}

impl RequestPlanner {
    /// `ratio` is the filter's output/input byte ratio; unusable values count
    /// as 1.0.
    pub fn new(unit: usize, max_decode_len: usize, ratio: f64) -> Self {
        let ratio = if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            1.0
        };
        Self {
            unit: unit.max(1),
            max_decode_len,
            ratio,
            huge_filter_buffer: false,
        }
    }

    /// Whether an earlier request already failed to produce enough output.
    pub const fn huge_filter_buffer(&self) -> bool {
        self.huge_filter_buffer
    }

    /// Bytes to decode next when `missing` filtered bytes are still needed.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn next_len(&mut self, missing: usize) -> usize {
        let mut len = if self.huge_filter_buffer {
            SMALL_REQUEST_LEN
        } else {
            ((missing as f64 / self.ratio) as usize).saturating_add(SLACK_UNITS * self.unit)
        };
        len -= len % self.unit;
        if len > self.max_decode_len {
            len = self.max_decode_len;
        } else {
            // an uncapped request that does not finish the job means some
            // filter holds back a lot of data
            self.huge_filter_buffer = true;
        }
        len.max(self.unit)
    }
}

/// Result of one [`AudioStream::filter_chunk`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    /// The full request was decoded and filtered.
    Complete,
    /// The decoder switched formats; bytes in the new format were dropped.
    FormatChanged,
    /// The decoder produced no more data.
    EndOfStream,
}

/// Result of [`AudioStream::decode_audio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// The accumulator holds at least the requested length.
    Filled,
    /// The decoded format changed; renegotiate the filter chain before
    /// decoding further.
    FormatChanged,
    /// The stream ended; the accumulator may be short.
    EndOfStream,
}

enum Stop {
    FormatChanged,
    EndOfStream,
    Failed(Error),
}

impl AudioStream {
    /// Decode `len` bytes, filter them and append the result to `out`.
    ///
    /// If the driver stops early, only what was decoded before the stop is
    /// filtered and the returned status says why.
    pub fn filter_chunk(&mut self, out: &mut ByteBuffer, len: usize) -> Result<ChunkStatus> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        debug_assert!(len + self.header.out_min_size <= self.decoded.capacity() + 1);

        let before = self.header.audio_format();
        let mut len = len;
        let mut stop = None;

        while self.decoded.len() < len {
            let min_len = len - self.decoded.len();
            let Some(driver) = self.driver.as_mut() else {
                return Err(Error::NotInitialized);
            };
            let result = driver.decode(
                &mut DriverContext {
                    header: &mut self.header,
                    demuxer: self.demuxer.as_mut(),
                    input: &mut self.input,
                },
                self.decoded.spare_mut(),
                min_len,
            );

            let after = self.header.audio_format();
            let status = if after != before {
                debug!("Audio format changed during decode: {before} -> {after}");
                Some(Stop::FormatChanged)
            } else {
                match result {
                    Ok(0) => {
                        trace!("Audio decoder returned no data");
                        Some(Stop::EndOfStream)
                    }
                    Ok(n) => {
                        self.decoded.commit(n);
                        None
                    }
                    Err(e) => Some(Stop::Failed(e)),
                }
            };

            if let Some(status) = status {
                len = self.decoded.len();
                stop = Some(status);
                break;
            }
        }

        let filter = self.filter.as_mut().ok_or(Error::NotInitialized)?;
        let mut format = before;
        if let Some(rate) = self.filter_input_rate {
            format.sample_rate = rate;
        }
        let block = AudioBlock {
            data: &self.decoded.as_slice()[..len],
            format,
        };
        let Some(filtered) = filter.process(&block) else {
            return Err(Error::Filter("filter chain produced no output".to_string()));
        };
        out.append(filtered);
        self.decoded.consume(len);

        match stop {
            None => Ok(ChunkStatus::Complete),
            Some(Stop::FormatChanged) => Ok(ChunkStatus::FormatChanged),
            Some(Stop::EndOfStream) => Ok(ChunkStatus::EndOfStream),
            Some(Stop::Failed(e @ Error::AudioDecode(_))) => Err(e),
            Some(Stop::Failed(e)) => Err(Error::AudioDecode(e.to_string())),
        }
    }

    /// Decode and filter until `out` holds at least `min_len` bytes.
    ///
    /// Bytes already in `out` count towards `min_len`. Anything but
    /// [`FillOutcome::Filled`] may leave `out` short.
    pub fn decode_audio(&mut self, out: &mut ByteBuffer, min_len: usize) -> Result<FillOutcome> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        let Some(filter) = self.filter.as_ref() else {
            return Err(Error::NotInitialized);
        };

        let unit = unit_size(&self.header.audio_format());
        let max_len = max_decode_len(self.decoded.capacity(), self.header.out_min_size, unit);
        if max_len == 0 {
            return Err(Error::UnsupportedFormat(format!(
                "decode buffer of {} bytes cannot hold one {unit} byte unit",
                self.decoded.capacity()
            )));
        }
        let mut planner = RequestPlanner::new(unit, max_len, filter.expansion_ratio());

        while out.len() < min_len {
            let len = planner.next_len(min_len - out.len());
            trace!("Requesting {len} decoded bytes, have {} of {min_len}", out.len());
            match self.filter_chunk(out, len)? {
                ChunkStatus::Complete => {}
                ChunkStatus::FormatChanged => return Ok(FillOutcome::FormatChanged),
                ChunkStatus::EndOfStream => return Ok(FillOutcome::EndOfStream),
            }
        }
        Ok(FillOutcome::Filled)
    }

    /// Append whatever the filter chain still buffers to `out`.
    ///
    /// Call before the chain is dropped or rebuilt, e.g. after
    /// [`FillOutcome::EndOfStream`] or [`FillOutcome::FormatChanged`].
    pub fn drain_filter(&mut self, out: &mut ByteBuffer) -> Result<()> {
        let filter = self.filter.as_mut().ok_or(Error::NotInitialized)?;
        let Some(tail) = filter.flush() else {
            return Err(Error::Filter("filter chain failed to flush".to_string()));
        };
        debug!("Filter chain flushed {} bytes", tail.len());
        out.append(tail);
        Ok(())
    }
}
