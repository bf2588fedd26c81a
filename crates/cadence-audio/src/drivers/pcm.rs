//! Uncompressed PCM driver.
//!
//! Packets are staged in the stream's input buffer and converted frame by
//! frame into native-endian samples.

use cadence_core::{format_tags, Error, Result, SampleFormat};
use tracing::debug;

use crate::driver::{
    AudioDriver, ControlOp, ControlResult, DriverContext, DriverFactory, DriverInfo,
};

/// Input staging buffer requested from the session.
pub const PCM_STAGING_SIZE: usize = 16384;

pub const INFO: DriverInfo = DriverInfo {
    short_name: "pcm",
    name: "Uncompressed PCM audio decoder",
    comment: "8/16/24/32-bit integer and 32-bit float, either byte order",
};

pub fn factory() -> DriverFactory {
    DriverFactory::new(INFO, || Box::new(PcmDriver::default()))
}

/// Sample layout of the incoming bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    U8,
    /// Signed 8-bit, as stored by big-endian containers.
    S8,
    S16 { big_endian: bool },
    /// Packed 3-byte samples, widened to 32 bits.
    S24 { big_endian: bool },
    S32 { big_endian: bool },
    F32,
}

impl Layout {
    fn detect(format_tag: u32, bits: u16) -> Result<Self> {
        let big_endian = format_tag == format_tags::TWOS;
        let layout = match (format_tag, bits) {
            (format_tags::IEEE_FLOAT, 32 | 0) => Self::F32,
            (format_tags::PCM, 8) => Self::U8,
            (format_tags::TWOS, 8) => Self::S8,
            (format_tags::PCM | format_tags::TWOS | format_tags::SOWT, 16 | 0) => {
                Self::S16 { big_endian }
            }
            (format_tags::PCM | format_tags::TWOS, 24) => Self::S24 { big_endian },
            (format_tags::PCM | format_tags::TWOS, 32) => Self::S32 { big_endian },
            _ => {
                return Err(Error::DecoderInit(format!(
                    "Unsupported PCM layout: tag 0x{format_tag:X}, {bits} bits"
                )))
            }
        };
        Ok(layout)
    }

    const fn input_bytes(self) -> usize {
        match self {
            Self::U8 | Self::S8 => 1,
            Self::S16 { .. } => 2,
            Self::S24 { .. } => 3,
            Self::S32 { .. } | Self::F32 => 4,
        }
    }

    const fn output_format(self) -> SampleFormat {
        match self {
            Self::U8 | Self::S8 => SampleFormat::U8,
            Self::S16 { .. } => SampleFormat::S16,
            Self::S24 { .. } | Self::S32 { .. } => SampleFormat::S32,
            Self::F32 => SampleFormat::F32,
        }
    }

    /// Convert one sample from `src` into `dst`.
    fn convert(self, src: &[u8], dst: &mut [u8]) {
        match self {
            Self::U8 => dst[0] = src[0],
            Self::S8 => dst[0] = src[0] ^ 0x80,
            Self::S16 { big_endian } => {
                let bytes = [src[0], src[1]];
                let v = if big_endian {
                    i16::from_be_bytes(bytes)
                } else {
                    i16::from_le_bytes(bytes)
                };
                dst.copy_from_slice(&v.to_ne_bytes());
            }
            Self::S24 { big_endian } => {
                let v = if big_endian {
                    i32::from_be_bytes([src[0], src[1], src[2], 0])
                } else {
                    i32::from_le_bytes([0, src[0], src[1], src[2]])
                };
                dst.copy_from_slice(&v.to_ne_bytes());
            }
            Self::S32 { big_endian } => {
                let bytes = [src[0], src[1], src[2], src[3]];
                let v = if big_endian {
                    i32::from_be_bytes(bytes)
                } else {
                    i32::from_le_bytes(bytes)
                };
                dst.copy_from_slice(&v.to_ne_bytes());
            }
            Self::F32 => {
                let v = f32::from_le_bytes([src[0], src[1], src[2], src[3]]);
                dst.copy_from_slice(&v.to_ne_bytes());
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct PcmDriver {
    layout: Option<Layout>,
    channels: usize,
}

impl AudioDriver for PcmDriver {
    fn preinit(&mut self, ctx: &mut DriverContext<'_>) -> Result<()> {
        let wave = ctx
            .header
            .wave
            .ok_or_else(|| Error::DecoderInit("PCM needs a wave header".to_string()))?;
        self.layout = Some(Layout::detect(ctx.header.format_tag, wave.bits_per_sample)?);
        ctx.header.in_min_size = PCM_STAGING_SIZE;
        Ok(())
    }

    fn init(&mut self, ctx: &mut DriverContext<'_>) -> Result<()> {
        let (Some(layout), Some(wave)) = (self.layout, ctx.header.wave) else {
            return Err(Error::DecoderInit("PCM driver not prepared".to_string()));
        };
        self.channels = usize::from(wave.channels);
        ctx.header.sample_rate = wave.sample_rate;
        ctx.header.channels = wave.channels;
        ctx.header.sample_format = layout.output_format();
        if ctx.header.input_bitrate == 0 {
            let rate = wave.sample_rate as usize * self.channels * layout.input_bytes();
            ctx.header.input_bitrate = u32::try_from(rate).unwrap_or(u32::MAX);
        }
        debug!("PCM layout {layout:?}, {} channels", wave.channels);
        Ok(())
    }

    fn decode(
        &mut self,
        ctx: &mut DriverContext<'_>,
        dest: &mut [u8],
        min_len: usize,
    ) -> Result<usize> {
        let Some(layout) = self.layout else {
            return Err(Error::NotInitialized);
        };
        let in_bytes = layout.input_bytes();
        let out_bytes = layout.output_format().bytes_per_sample();
        let in_frame = in_bytes * self.channels;
        let out_frame = out_bytes * self.channels;
        if in_frame == 0 {
            return Err(Error::AudioDecode("PCM stream has no channels".to_string()));
        }

        let mut written = 0;
        while written < min_len {
            if ctx.input.len() < in_frame {
                match ctx.demuxer.next_packet() {
                    Some(packet) => {
                        if packet.pts.is_some() {
                            ctx.header.pts = packet.pts;
                        }
                        ctx.input.append(&packet.data);
                        continue;
                    }
                    None => break,
                }
            }

            let frames = (ctx.input.len() / in_frame).min((dest.len() - written) / out_frame);
            if frames == 0 {
                break;
            }
            let src = &ctx.input.as_slice()[..frames * in_frame];
            let dst = &mut dest[written..written + frames * out_frame];
            for (s, d) in src.chunks_exact(in_bytes).zip(dst.chunks_exact_mut(out_bytes)) {
                layout.convert(s, d);
            }
            ctx.input.consume(frames * in_frame);
            written += frames * out_frame;
        }
        Ok(written)
    }

    fn control(&mut self, ctx: &mut DriverContext<'_>, op: ControlOp) -> ControlResult {
        match op {
            ControlOp::QueryFormat(format) => match self.layout {
                Some(layout) if layout.output_format() == format => ControlResult::True,
                Some(_) => ControlResult::False,
                None => ControlResult::Unsupported,
            },
            ControlOp::Resync => {
                ctx.input.clear();
                ControlResult::True
            }
            ControlOp::SkipFrame if !ctx.input.is_empty() => {
                ctx.input.clear();
                ControlResult::True
            }
            ControlOp::SkipFrame => ControlResult::Unsupported,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::buffer::ByteBuffer;
    use crate::demux::{Packet, PacketQueue};
    use crate::session::StreamHeader;
    use cadence_core::WaveFormat;

    struct Harness {
        header: StreamHeader,
        demuxer: PacketQueue,
        input: ByteBuffer,
        driver: PcmDriver,
    }

    impl Harness {
        fn new(format_tag: u32, channels: u16, bits: u16, packets: &[&[u8]]) -> Self {
            let wave = WaveFormat {
                format_tag,
                channels,
                sample_rate: 8000,
                avg_bytes_per_sec: 0,
                block_align: channels * bits.div_ceil(8),
                bits_per_sample: bits,
            };
            let mut demuxer = PacketQueue::new();
            for (i, data) in packets.iter().enumerate() {
                demuxer.push(Packet::new(data.to_vec(), Some(i as f64)));
            }
            Self {
                header: StreamHeader::from_wave(wave),
                demuxer,
                input: ByteBuffer::new(),
                driver: PcmDriver::default(),
            }
        }

        fn ctx(&mut self) -> (&mut PcmDriver, DriverContext<'_>) {
            (
                &mut self.driver,
                DriverContext {
                    header: &mut self.header,
                    demuxer: &mut self.demuxer,
                    input: &mut self.input,
                },
            )
        }

        fn open(&mut self) -> Result<()> {
            let (driver, mut ctx) = self.ctx();
            driver.preinit(&mut ctx)?;
            driver.init(&mut ctx)
        }

        fn decode(&mut self, max: usize, min: usize) -> Vec<u8> {
            let mut dest = vec![0; max];
            let (driver, mut ctx) = self.ctx();
            let n = driver.decode(&mut ctx, &mut dest, min).unwrap();
            dest.truncate(n);
            dest
        }
    }

    fn ne16(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn test_s16_le_across_packets() {
        let a = [1i16, 2, 3].iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>();
        let b = [4i16, 5, 6].iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<_>>();
        let mut h = Harness::new(format_tags::PCM, 2, 16, &[&a, &b]);
        h.open().unwrap();
        assert_eq!(h.header.audio_format().sample_format, SampleFormat::S16);
        assert_eq!(h.header.input_bitrate, 8000 * 2 * 2);

        // half a frame of the first packet stays staged until the second arrives
        let out = h.decode(64, 4);
        assert_eq!(out, ne16(&[1, 2]));
        assert_eq!(h.input.len(), 2);
        assert_eq!(h.header.pts, Some(0.0));

        let out = h.decode(64, 4);
        assert_eq!(out, ne16(&[3, 4, 5, 6]));
        assert_eq!(h.header.pts, Some(1.0));
        assert!(h.decode(64, 4).is_empty());
    }

    #[test]
    fn test_never_writes_past_dest() {
        let data = vec![0u8; 400];
        let mut h = Harness::new(format_tags::PCM, 1, 16, &[&data]);
        h.open().unwrap();
        assert_eq!(h.decode(10, 100).len(), 10);
        assert_eq!(h.input.len(), 390);
    }

    #[test]
    fn test_big_endian_16() {
        let mut h = Harness::new(format_tags::TWOS, 1, 16, &[&[0x01, 0x02]]);
        h.open().unwrap();
        assert_eq!(h.decode(2, 2), 0x0102i16.to_ne_bytes().to_vec());
    }

    #[test]
    fn test_signed_8_bit_becomes_unsigned() {
        let mut h = Harness::new(format_tags::TWOS, 1, 8, &[&[0x00, 0x80, 0x7F]]);
        h.open().unwrap();
        assert_eq!(h.header.sample_format, SampleFormat::U8);
        assert_eq!(h.decode(3, 3), vec![0x80, 0x00, 0xFF]);
    }

    #[test]
    fn test_packed_24_bit_widens() {
        let mut h = Harness::new(format_tags::PCM, 1, 24, &[&[0x56, 0x34, 0x12]]);
        h.open().unwrap();
        assert_eq!(h.header.sample_format, SampleFormat::S32);
        assert_eq!(h.decode(4, 4), 0x1234_5600i32.to_ne_bytes().to_vec());
    }

    #[test]
    fn test_float_format_query() {
        let mut h = Harness::new(format_tags::IEEE_FLOAT, 1, 32, &[]);
        h.open().unwrap();
        let (driver, mut ctx) = h.ctx();
        assert_eq!(
            driver.control(&mut ctx, ControlOp::QueryFormat(SampleFormat::F32)),
            ControlResult::True
        );
        assert_eq!(
            driver.control(&mut ctx, ControlOp::QueryFormat(SampleFormat::S16)),
            ControlResult::False
        );
    }

    #[test]
    fn test_rejects_odd_layouts() {
        let mut h = Harness::new(format_tags::PCM, 2, 12, &[]);
        assert!(matches!(h.open(), Err(Error::DecoderInit(_))));

        let mut h = Harness::new(format_tags::PCM, 2, 16, &[]);
        h.header.wave = None;
        assert!(h.open().is_err());
    }

    #[test]
    fn test_skip_drops_staged_input() {
        let mut h = Harness::new(format_tags::PCM, 1, 16, &[&[0; 6]]);
        h.open().unwrap();
        let (driver, mut ctx) = h.ctx();
        assert_eq!(driver.control(&mut ctx, ControlOp::SkipFrame), ControlResult::Unsupported);

        h.decode(2, 2);
        assert_eq!(h.input.len(), 4);
        let (driver, mut ctx) = h.ctx();
        assert_eq!(driver.control(&mut ctx, ControlOp::SkipFrame), ControlResult::True);
        assert!(h.input.is_empty());
    }
}
