//! Decode job: container in, raw PCM out.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use cadence_audio::{
    AudioStream, ByteBuffer, CodecRegistry, ContainerDemuxer, DriverRegistry, FillOutcome,
    StandardChainBuilder, StreamHeader,
};
use cadence_core::{AudioFormat, DecoderConfig, FormatRequest};
use tracing::{debug, info};

/// Bytes requested from the decoder per pass.
const CHUNK_LEN: usize = 65536;

#[derive(Debug, Clone)]
pub struct DecodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub directives: Vec<String>,
    pub families: Vec<String>,
    pub request: FormatRequest,
    pub config: DecoderConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeSummary {
    pub format: AudioFormat,
    pub bytes_written: usize,
    pub format_changes: usize,
}

pub fn run(job: &DecodeJob, codecs: &CodecRegistry, drivers: &DriverRegistry) -> Result<DecodeSummary> {
    let demuxer = ContainerDemuxer::open(&job.input)
        .with_context(|| format!("Failed to open {}", job.input.display()))?;
    if let Some(duration) = demuxer.duration() {
        debug!("Input duration: {duration:.2}s");
    }
    let header = StreamHeader::from_wave(demuxer.wave_format()).with_extradata(demuxer.extradata());

    let mut stream = AudioStream::new(header, Box::new(demuxer));
    stream.select_best_codec(codecs, drivers, &job.directives, &job.families, &job.config)?;

    let format = stream.attach_filter_chain(
        &StandardChainBuilder,
        None,
        job.request,
        &job.config.filter,
    )?;
    info!("Output format: {format}");
    // a raw stream cannot change format midway, so later chains target this one
    let pinned = FormatRequest::from(format);

    let file = File::create(&job.output)
        .with_context(|| format!("Failed to create {}", job.output.display()))?;
    let mut writer = BufWriter::new(file);
    let mut out = ByteBuffer::new();
    let mut summary = DecodeSummary {
        format,
        bytes_written: 0,
        format_changes: 0,
    };

    loop {
        let outcome = stream.decode_audio(&mut out, CHUNK_LEN)?;
        if outcome != FillOutcome::Filled {
            // the chain is about to be rebuilt or dropped
            stream.drain_filter(&mut out)?;
        }
        writer.write_all(out.as_slice())?;
        summary.bytes_written += out.len();
        out.clear();

        match outcome {
            FillOutcome::Filled => {}
            FillOutcome::FormatChanged => {
                summary.format_changes += 1;
                info!("Decoder format changed to {}", stream.format());
                stream.attach_filter_chain(&StandardChainBuilder, None, pinned, &job.config.filter)?;
            }
            FillOutcome::EndOfStream => break,
        }
    }

    writer.flush()?;
    stream.close();
    Ok(summary)
}
