//! Compressed audio driver backed by symphonia's codec registry.

use cadence_core::{Error, Result, SampleFormat};
use ::symphonia::core::{
    audio::{Channels, SampleBuffer},
    codecs::{CodecParameters, Decoder, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::Packet as SymphoniaPacket,
};
use tracing::{debug, warn};

use crate::buffer::ByteBuffer;
use crate::demux::container::codec_for_format_tag;
use crate::driver::{
    AudioDriver, ControlOp, ControlResult, DriverContext, DriverFactory, DriverInfo,
};
use crate::filter::convert::f32_to_bytes;

pub const INFO: DriverInfo = DriverInfo {
    short_name: "symphonia",
    name: "Symphonia audio decoders",
    comment: "MPEG audio, AAC, FLAC, Vorbis, ALAC",
};

pub fn factory() -> DriverFactory {
    DriverFactory::new(INFO, || Box::new(SymphoniaDriver::default()))
}

/// Channel mask for the first `count` standard positions.
pub fn channels_from_count(count: u16) -> Option<Channels> {
    if count == 0 || count > 26 {
        return None;
    }
    Channels::from_bits((1u32 << count) - 1)
}

/// One decoded packet, already in the output sample format.
struct Frame {
    sample_rate: u32,
    channels: u16,
    data: Vec<u8>,
}

/// Decoded bytes not yet handed out, and a frame held back across a format
/// change until the older bytes have drained.
#[derive(Default)]
struct FrameQueue {
    pending: ByteBuffer,
    deferred: Option<Frame>,
}

impl FrameQueue {
    fn apply(&mut self, ctx: &mut DriverContext<'_>, frame: Frame) {
        ctx.header.sample_rate = frame.sample_rate;
        ctx.header.channels = frame.channels;
        self.pending.clear();
        self.pending.append(&frame.data);
    }

    /// Copy at most `dest.len()` bytes out, pulling frames from `next` until
    /// `min_len` bytes are pending. `Ok(0)` with a changed header reports a
    /// format change.
    fn read<F>(
        &mut self,
        ctx: &mut DriverContext<'_>,
        dest: &mut [u8],
        min_len: usize,
        mut next: F,
    ) -> Result<usize>
    where
        F: FnMut(&mut DriverContext<'_>) -> Result<Option<Frame>>,
    {
        if let Some(frame) = self.deferred.take() {
            self.apply(ctx, frame);
            return Ok(0);
        }

        while self.pending.len() < min_len {
            let Some(frame) = next(ctx)? else {
                break;
            };
            if frame.sample_rate == ctx.header.sample_rate && frame.channels == ctx.header.channels
            {
                self.pending.append(&frame.data);
            } else if self.pending.is_empty() {
                self.apply(ctx, frame);
                return Ok(0);
            } else {
                self.deferred = Some(frame);
                break;
            }
        }

        let n = self.pending.len().min(dest.len());
        dest[..n].copy_from_slice(&self.pending.as_slice()[..n]);
        self.pending.consume(n);
        Ok(n)
    }

    fn clear(&mut self) {
        self.pending.clear();
        self.deferred = None;
    }

    fn release(&mut self) {
        self.pending.release();
        self.deferred = None;
    }
}

/// Decode packets until one yields audio; `None` at end of stream.
fn next_frame(
    decoder: &mut Option<Box<dyn Decoder>>,
    sample_format: SampleFormat,
    ctx: &mut DriverContext<'_>,
) -> Result<Option<Frame>> {
    let decoder = decoder.as_mut().ok_or(Error::NotInitialized)?;
    loop {
        let Some(packet) = ctx.demuxer.next_packet() else {
            return Ok(None);
        };
        let encoded = SymphoniaPacket::new_from_slice(0, 0, 0, &packet.data);
        let mut needs_reset = false;

        match decoder.decode(&encoded) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                samples.copy_interleaved_ref(decoded);

                let mut data = Vec::new();
                f32_to_bytes(samples.samples(), sample_format, &mut data);
                if packet.pts.is_some() {
                    ctx.header.pts = packet.pts;
                }
                #[allow(clippy::cast_possible_truncation)]
                let channels = spec.channels.count() as u16;
                return Ok(Some(Frame {
                    sample_rate: spec.rate,
                    channels,
                    data,
                }));
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Decode error (skipping): {e}");
            }
            Err(SymphoniaError::ResetRequired) => {
                debug!("Decoder reset required");
                needs_reset = true;
            }
            Err(e) => {
                return Err(Error::AudioDecode(format!("Decode failed: {e}")));
            }
        }
        if needs_reset {
            decoder.reset();
        }
    }
}

#[derive(Default)]
pub struct SymphoniaDriver {
    decoder: Option<Box<dyn Decoder>>,
    sample_format: SampleFormat,
    frames: FrameQueue,
}

impl AudioDriver for SymphoniaDriver {
    fn preinit(&mut self, ctx: &mut DriverContext<'_>) -> Result<()> {
        let tag = ctx.header.format_tag;
        let available = codec_for_format_tag(tag)
            .is_some_and(|codec| ::symphonia::default::get_codecs().get_codec(codec).is_some());
        if !available {
            return Err(Error::DecoderInit(format!(
                "No symphonia decoder for format 0x{tag:X}"
            )));
        }
        ctx.header.in_min_size = 0;
        Ok(())
    }

    fn init(&mut self, ctx: &mut DriverContext<'_>) -> Result<()> {
        let tag = ctx.header.format_tag;
        let codec = codec_for_format_tag(tag)
            .ok_or_else(|| Error::DecoderInit(format!("Unknown format 0x{tag:X}")))?;
        self.sample_format = ctx.header.sample_format;

        let mut params = CodecParameters::new();
        params.for_codec(codec);
        if let Some(wave) = ctx.header.wave {
            if wave.sample_rate > 0 {
                params.with_sample_rate(wave.sample_rate);
            }
            if let Some(channels) = channels_from_count(wave.channels) {
                params.with_channels(channels);
            }
            if wave.bits_per_sample > 0 {
                params.with_bits_per_sample(u32::from(wave.bits_per_sample));
            }
        }
        if !ctx.header.extradata.is_empty() {
            params.with_extra_data(ctx.header.extradata.to_vec().into_boxed_slice());
        }

        let registry = ::symphonia::default::get_codecs();
        let decoder = registry
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::DecoderInit(format!("Failed to create decoder: {e}")))?;
        self.decoder = Some(decoder);
        ctx.header.codec_label = registry.get_codec(codec).map(|d| d.long_name.to_string());

        // the first frame tells the real rate and layout
        let frame = next_frame(&mut self.decoder, self.sample_format, ctx)
            .map_err(|e| Error::DecoderInit(e.to_string()))?
            .ok_or_else(|| Error::DecoderInit("No audio packets to decode".to_string()))?;
        debug!(
            "First frame: {} Hz, {} ch, {} bytes",
            frame.sample_rate,
            frame.channels,
            frame.data.len()
        );
        self.frames.apply(ctx, frame);
        Ok(())
    }

    fn decode(
        &mut self,
        ctx: &mut DriverContext<'_>,
        dest: &mut [u8],
        min_len: usize,
    ) -> Result<usize> {
        let Self {
            decoder,
            sample_format,
            frames,
        } = self;
        let sample_format = *sample_format;
        frames.read(ctx, dest, min_len, |ctx| next_frame(decoder, sample_format, ctx))
    }

    fn control(&mut self, _ctx: &mut DriverContext<'_>, op: ControlOp) -> ControlResult {
        match op {
            ControlOp::QueryFormat(SampleFormat::S16 | SampleFormat::F32) => ControlResult::True,
            ControlOp::QueryFormat(_) => ControlResult::False,
            ControlOp::Resync => {
                if let Some(decoder) = self.decoder.as_mut() {
                    decoder.reset();
                }
                self.frames.clear();
                ControlResult::True
            }
            ControlOp::SkipFrame => ControlResult::Unsupported,
        }
    }

    fn uninit(&mut self, _ctx: &mut DriverContext<'_>) {
        self.decoder = None;
        self.frames.release();
    }
}
