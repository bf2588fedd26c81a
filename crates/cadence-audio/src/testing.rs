//! Scriptable driver, demuxer and filter chain for unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use cadence_core::{
    AudioFormat, CodecDescriptor, CodecStatus, Error, FilterConfig, Result, SampleFormat,
};

use crate::demux::{Demuxer, Packet};
use crate::driver::{
    AudioDriver, ControlOp, ControlResult, DriverContext, DriverFactory, DriverInfo,
};
use crate::filter::{AudioBlock, FilterChain, FilterChainBuilder};
use crate::session::{AudioStream, StreamHeader, DEFAULT_OUT_MIN_SIZE};

/// Format tag every mock codec claims.
pub const MOCK_TAG: u32 = 0xABCD;

/// How many bytes a mock decode call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFill {
    /// Fill the whole destination.
    Max,
    /// Produce exactly the requested minimum.
    Min,
    /// Produce this many bytes, capped at the destination size.
    Fixed(usize),
}

#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub in_min_size: usize,
    pub out_min_size: usize,
    pub fail_preinit: bool,
    pub fail_init: bool,
    pub sample_rate: u32,
    pub channels: u16,
    pub float_capable: bool,
    pub native_skip: bool,
    pub fill: DecodeFill,
    /// 1-based decode call that switches the sample rate to 48000.
    pub change_format_on_call: Option<usize>,
    /// Decode returns `Ok(0)` once this many calls succeeded.
    pub eof_after_calls: Option<usize>,
    /// 1-based decode call that returns an error.
    pub fail_decode_on_call: Option<usize>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            in_min_size: 0,
            out_min_size: DEFAULT_OUT_MIN_SIZE,
            fail_preinit: false,
            fail_init: false,
            sample_rate: 44100,
            channels: 2,
            float_capable: false,
            native_skip: false,
            fill: DecodeFill::Max,
            change_format_on_call: None,
            eof_after_calls: None,
            fail_decode_on_call: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockLogState {
    pub uninit_calls: usize,
    pub controls: Vec<ControlOp>,
    /// `(min_len, dest.len())` per decode call.
    pub decode_calls: Vec<(usize, usize)>,
}

/// Shared record of what mock drivers were asked to do.
#[derive(Debug, Clone, Default)]
pub struct MockLog(Arc<Mutex<MockLogState>>);

impl MockLog {
    pub fn snapshot(&self) -> MockLogState {
        self.0.lock().unwrap().clone()
    }

    fn with<R>(&self, f: impl FnOnce(&mut MockLogState) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }
}

#[derive(Debug, Default)]
pub struct MockDriver {
    behavior: MockBehavior,
    log: MockLog,
    calls: usize,
}

impl MockDriver {
    pub fn new(behavior: MockBehavior, log: MockLog) -> Self {
        Self {
            behavior,
            log,
            calls: 0,
        }
    }
}

impl AudioDriver for MockDriver {
    fn preinit(&mut self, ctx: &mut DriverContext<'_>) -> Result<()> {
        if self.behavior.fail_preinit {
            return Err(Error::DecoderInit("mock preinit failure".to_string()));
        }
        ctx.header.in_min_size = self.behavior.in_min_size;
        ctx.header.out_min_size = self.behavior.out_min_size;
        Ok(())
    }

    fn init(&mut self, ctx: &mut DriverContext<'_>) -> Result<()> {
        if self.behavior.fail_init {
            return Err(Error::DecoderInit("mock init failure".to_string()));
        }
        ctx.header.sample_rate = self.behavior.sample_rate;
        ctx.header.channels = self.behavior.channels;
        Ok(())
    }

    fn decode(
        &mut self,
        ctx: &mut DriverContext<'_>,
        dest: &mut [u8],
        min_len: usize,
    ) -> Result<usize> {
        self.calls += 1;
        let call = self.calls;
        self.log.with(|s| s.decode_calls.push((min_len, dest.len())));

        if self.behavior.fail_decode_on_call == Some(call) {
            return Err(Error::AudioDecode("mock decode failure".to_string()));
        }
        if self.behavior.eof_after_calls.is_some_and(|n| call > n) {
            return Ok(0);
        }

        let n = match self.behavior.fill {
            DecodeFill::Max => dest.len(),
            DecodeFill::Min => min_len.min(dest.len()),
            DecodeFill::Fixed(n) => n.min(dest.len()),
        };
        dest[..n].fill(call as u8);

        if self.behavior.change_format_on_call == Some(call) {
            ctx.header.sample_rate = 48000;
        }
        Ok(n)
    }

    fn control(&mut self, _ctx: &mut DriverContext<'_>, op: ControlOp) -> ControlResult {
        self.log.with(|s| s.controls.push(op));
        match op {
            ControlOp::QueryFormat(SampleFormat::S16) | ControlOp::Resync => ControlResult::True,
            ControlOp::QueryFormat(SampleFormat::F32) if self.behavior.float_capable => {
                ControlResult::True
            }
            ControlOp::QueryFormat(_) => ControlResult::False,
            ControlOp::SkipFrame if self.behavior.native_skip => ControlResult::True,
            ControlOp::SkipFrame => ControlResult::Unsupported,
        }
    }

    fn uninit(&mut self, _ctx: &mut DriverContext<'_>) {
        self.log.with(|s| s.uninit_calls += 1);
    }
}

pub fn mock_factory(name: &'static str, behavior: MockBehavior, log: &MockLog) -> DriverFactory {
    let log = log.clone();
    DriverFactory::new(
        DriverInfo {
            short_name: name,
            name: "Mock decoder",
            comment: "test driver",
        },
        move || Box::new(MockDriver::new(behavior.clone(), log.clone())),
    )
}

pub fn mock_codec(name: &str, family: &str, status: CodecStatus) -> CodecDescriptor {
    CodecDescriptor::new(name, "", family, status, vec![MOCK_TAG])
}

/// Observes how many packets a [`MockDemuxer`] still holds.
#[derive(Debug, Clone, Default)]
pub struct PacketCounter(Arc<AtomicUsize>);

impl PacketCounter {
    pub fn remaining(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct MockDemuxer {
    counter: PacketCounter,
}

impl Demuxer for MockDemuxer {
    fn next_packet(&mut self) -> Option<Packet> {
        let left = self.counter.0.load(Ordering::SeqCst);
        if left == 0 {
            return None;
        }
        self.counter.0.store(left - 1, Ordering::SeqCst);
        Some(Packet::new(Bytes::from_static(&[0; 16]), None))
    }
}

/// An uninitialized stream over 100 dummy packets.
pub fn mock_stream() -> (AudioStream, PacketCounter) {
    let counter = PacketCounter(Arc::new(AtomicUsize::new(100)));
    let demuxer = MockDemuxer {
        counter: counter.clone(),
    };
    (
        AudioStream::new(StreamHeader::new(MOCK_TAG), Box::new(demuxer)),
        counter,
    )
}

/// Builds chains that copy input to output unchanged.
#[derive(Debug, Clone)]
pub struct PassthroughBuilder {
    pub fail_build: bool,
    pub fail_process: bool,
    /// Expansion ratio the chain reports.
    pub ratio: f64,
    /// Hold input until this many bytes are buffered.
    pub buffer_until: usize,
    /// Length of every block the chain received.
    pub blocks: Arc<Mutex<Vec<usize>>>,
}

impl Default for PassthroughBuilder {
    fn default() -> Self {
        Self {
            fail_build: false,
            fail_process: false,
            ratio: 1.0,
            buffer_until: 0,
            blocks: Arc::default(),
        }
    }
}

impl PassthroughBuilder {
    pub fn block_lengths(&self) -> Vec<usize> {
        self.blocks.lock().unwrap().clone()
    }
}

impl FilterChainBuilder for PassthroughBuilder {
    fn build(
        &self,
        input: AudioFormat,
        output: AudioFormat,
        _config: &FilterConfig,
    ) -> Result<Box<dyn FilterChain>> {
        if self.fail_build {
            return Err(Error::FormatNegotiation("mock build failure".to_string()));
        }
        Ok(Box::new(PassthroughChain {
            input,
            output,
            settings: self.clone(),
            held: Vec::new(),
            out: Vec::new(),
        }))
    }
}

struct PassthroughChain {
    input: AudioFormat,
    output: AudioFormat,
    settings: PassthroughBuilder,
    held: Vec<u8>,
    out: Vec<u8>,
}

impl FilterChain for PassthroughChain {
    fn input_format(&self) -> AudioFormat {
        self.input
    }

    fn output_format(&self) -> AudioFormat {
        self.output
    }

    fn expansion_ratio(&self) -> f64 {
        self.settings.ratio
    }

    fn process(&mut self, block: &AudioBlock<'_>) -> Option<&[u8]> {
        self.settings.blocks.lock().unwrap().push(block.data.len());
        if self.settings.fail_process {
            return None;
        }
        self.held.extend_from_slice(block.data);
        self.out.clear();
        if self.held.len() >= self.settings.buffer_until {
            std::mem::swap(&mut self.out, &mut self.held);
        }
        Some(&self.out)
    }

    fn flush(&mut self) -> Option<&[u8]> {
        self.out.clear();
        std::mem::swap(&mut self.out, &mut self.held);
        Some(&self.out)
    }
}
