//! Container demuxing using symphonia.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use cadence_core::{format_tags, Error, Result, WaveFormat};
use symphonia::core::{
    codecs::{self, CodecType, CODEC_TYPE_NULL},
    formats::{FormatOptions, FormatReader},
    io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
    units::TimeBase,
};
use tracing::{debug, warn};

use super::{Demuxer, Packet};

/// Map a symphonia codec type to the format tag codecs are registered under.
pub(crate) fn format_tag_for_codec(codec: CodecType) -> Option<u32> {
    let tag = match codec {
        codecs::CODEC_TYPE_PCM_U8
        | codecs::CODEC_TYPE_PCM_S16LE
        | codecs::CODEC_TYPE_PCM_S24LE
        | codecs::CODEC_TYPE_PCM_S32LE => format_tags::PCM,
        codecs::CODEC_TYPE_PCM_F32LE => format_tags::IEEE_FLOAT,
        codecs::CODEC_TYPE_PCM_S16BE => format_tags::TWOS,
        codecs::CODEC_TYPE_MP2 => format_tags::MP2,
        codecs::CODEC_TYPE_MP3 => format_tags::MP3,
        codecs::CODEC_TYPE_AAC => format_tags::AAC,
        codecs::CODEC_TYPE_VORBIS => format_tags::VORBIS,
        codecs::CODEC_TYPE_FLAC => format_tags::FLAC,
        codecs::CODEC_TYPE_OPUS => format_tags::OPUS,
        codecs::CODEC_TYPE_ALAC => format_tags::ALAC,
        _ => return None,
    };
    Some(tag)
}

/// Map a compressed format tag back to a symphonia codec type.
pub(crate) fn codec_for_format_tag(format_tag: u32) -> Option<CodecType> {
    let codec = match format_tag {
        format_tags::MP2 => codecs::CODEC_TYPE_MP2,
        format_tags::MP3 => codecs::CODEC_TYPE_MP3,
        format_tags::AAC => codecs::CODEC_TYPE_AAC,
        format_tags::VORBIS => codecs::CODEC_TYPE_VORBIS,
        format_tags::FLAC => codecs::CODEC_TYPE_FLAC,
        format_tags::OPUS => codecs::CODEC_TYPE_OPUS,
        format_tags::ALAC => codecs::CODEC_TYPE_ALAC,
        _ => return None,
    };
    Some(codec)
}

/// Demuxer reading the first audio track of a container.
pub struct ContainerDemuxer {
    format: Box<dyn FormatReader>,
    track_id: u32,
    time_base: Option<TimeBase>,
    wave: WaveFormat,
    extradata: Bytes,
    duration: Option<f64>,
}

impl ContainerDemuxer {
    /// Open a container held in memory.
    #[allow(clippy::needless_pass_by_value)] // Bytes is cheaply cloneable
    pub fn from_bytes(data: Bytes, extension_hint: Option<&str>) -> Result<Self> {
        let cursor = Cursor::new(data.to_vec());
        Self::from_source(Box::new(cursor), extension_hint)
    }

    /// Open a container file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        Self::from_source(Box::new(file), extension)
    }

    fn from_source(source: Box<dyn MediaSource>, extension_hint: Option<&str>) -> Result<Self> {
        let mss = MediaSourceStream::new(source, MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension_hint {
            hint.with_extension(extension);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let metadata_opts = MetadataOptions::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &metadata_opts)
            .map_err(|e| Error::UnsupportedFormat(format!("Failed to probe format: {e}")))?;

        let format = probed.format;

        // Find the first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::UnsupportedFormat("No audio tracks found".to_string()))?;

        let params = &track.codec_params;
        let format_tag = format_tag_for_codec(params.codec).unwrap_or(0);
        #[allow(clippy::cast_possible_truncation)]
        let channels = params.channels.map_or(0, |c| c.count() as u16);
        let sample_rate = params.sample_rate.unwrap_or(0);
        let bits_per_sample = params
            .bits_per_coded_sample
            .or(params.bits_per_sample)
            .unwrap_or(0) as u16;
        let block_align = channels * bits_per_sample.div_ceil(8);
        let wave = WaveFormat {
            format_tag,
            channels,
            sample_rate,
            avg_bytes_per_sec: sample_rate * u32::from(block_align),
            block_align,
            bits_per_sample,
        };

        let duration = params
            .time_base
            .zip(params.n_frames)
            .map(|(tb, n)| {
                let time = tb.calc_time(n);
                time.seconds as f64 + time.frac
            });

        debug!(
            "Audio track: id={}, codec={}, tag=0x{:X}, sample_rate={}, channels={}",
            track.id, params.codec, format_tag, sample_rate, channels
        );

        Ok(Self {
            track_id: track.id,
            time_base: params.time_base,
            wave,
            extradata: params
                .extra_data
                .as_deref()
                .map(Bytes::copy_from_slice)
                .unwrap_or_default(),
            duration,
            format,
        })
    }

    /// Stream description for the decoder session.
    pub const fn wave_format(&self) -> WaveFormat {
        self.wave
    }

    /// Codec-specific setup data.
    pub fn extradata(&self) -> Bytes {
        self.extradata.clone()
    }

    /// Total duration in seconds, if known.
    pub const fn duration(&self) -> Option<f64> {
        self.duration
    }
}

impl Demuxer for ContainerDemuxer {
    fn next_packet(&mut self) -> Option<Packet> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return None; // End of stream
                }
                Err(e) => {
                    warn!("Failed to read packet: {e}");
                    return None;
                }
            };

            // Skip packets for other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            let pts = self.time_base.map(|tb| {
                let time = tb.calc_time(packet.ts());
                time.seconds as f64 + time.frac
            });
            return Some(Packet::new(Bytes::from(packet.data), pts));
        }
    }
}
