//! Decoder session: one audio stream and the driver decoding it.
//!
//! An [`AudioStream`] is either fully initialized (driver set, buffers
//! allocated, format known) or fully uninitialized. Every failure while
//! opening a driver releases what was acquired before returning.

use bytes::Bytes;
use cadence_core::{
    AudioFormat, CodecDescriptor, DecoderConfig, Error, FilterConfig, FormatRequest, Result,
    SampleFormat, WaveFormat,
};
use tracing::{debug, error, info, trace};

use crate::buffer::ByteBuffer;
use crate::demux::Demuxer;
use crate::driver::{AudioDriver, ControlOp, ControlResult, DriverContext, DriverFactory, DriverInfo};
use crate::filter::{FilterChain, FilterChainBuilder};

/// Fixed part of the decode buffer; drivers add their `out_min_size`.
pub const DECODE_BUFFER_BASE: usize = 65536;

/// Default `out_min_size` before the driver's preinit adjusts it.
pub const DEFAULT_OUT_MIN_SIZE: usize = 8192;

/// Per-stream values negotiated between the session and its driver.
#[derive(Debug, Clone, Default)]
pub struct StreamHeader {
    /// Compressed format tag used for codec lookup.
    pub format_tag: u32,
    /// Container-level description, when the demuxer provides one.
    pub wave: Option<WaveFormat>,
    /// Codec setup data.
    pub extradata: Bytes,
    /// Decoded sample rate in Hz; set by the driver.
    pub sample_rate: u32,
    /// Decoded channel count; set by the driver.
    pub channels: u16,
    /// Decoded sample representation.
    pub sample_format: SampleFormat,
    /// Compressed byte rate, if the driver knows it.
    pub input_bitrate: u32,
    /// Uncompressed byte rate.
    pub output_bitrate: u32,
    /// Input staging buffer size requested by the driver.
    pub in_min_size: usize,
    /// Largest overshoot past `min_len` a single decode call may produce.
    pub out_min_size: usize,
    /// Timestamp of the most recently consumed packet.
    pub pts: Option<f64>,
    /// Name of the concrete decoder, if the driver reports one.
    pub codec_label: Option<String>,
}

impl StreamHeader {
    pub fn new(format_tag: u32) -> Self {
        Self {
            format_tag,
            ..Self::default()
        }
    }

    /// Describe a stream from its container header.
    pub fn from_wave(wave: WaveFormat) -> Self {
        Self {
            format_tag: wave.format_tag,
            wave: Some(wave),
            input_bitrate: wave.avg_bytes_per_sec,
            ..Self::default()
        }
    }

    pub fn with_extradata(mut self, extradata: Bytes) -> Self {
        self.extradata = extradata;
        self
    }

    /// The decoded format as currently negotiated.
    pub const fn audio_format(&self) -> AudioFormat {
        AudioFormat::new(self.sample_rate, self.channels, self.sample_format)
    }

    pub const fn bytes_per_sample(&self) -> usize {
        self.sample_format.bytes_per_sample()
    }
}

/// One audio stream: demuxer, selected codec, driver instance and buffers.
pub struct AudioStream {
    pub(crate) header: StreamHeader,
    pub(crate) demuxer: Box<dyn Demuxer>,
    codec: Option<CodecDescriptor>,
    driver_info: Option<DriverInfo>,
    pub(crate) driver: Option<Box<dyn AudioDriver>>,
    pub(crate) initialized: bool,
    pub(crate) input: ByteBuffer,
    pub(crate) decoded: ByteBuffer,
    pub(crate) filter: Option<Box<dyn FilterChain>>,
    /// Sample rate the filter chain was built for, if it overrides the
    /// decoded rate.
    pub(crate) filter_input_rate: Option<u32>,
}

impl AudioStream {
    /// Create an uninitialized stream.
    pub fn new(header: StreamHeader, demuxer: Box<dyn Demuxer>) -> Self {
        Self {
            header,
            demuxer,
            codec: None,
            driver_info: None,
            driver: None,
            initialized: false,
            input: ByteBuffer::new(),
            decoded: ByteBuffer::new(),
            filter: None,
            filter_input_rate: None,
        }
    }

    pub const fn header(&self) -> &StreamHeader {
        &self.header
    }

    /// The negotiated decoded format.
    pub const fn format(&self) -> AudioFormat {
        self.header.audio_format()
    }

    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The codec entry in use.
    pub const fn codec(&self) -> Option<&CodecDescriptor> {
        self.codec.as_ref()
    }

    /// The driver family in use.
    pub const fn driver_info(&self) -> Option<&DriverInfo> {
        self.driver_info.as_ref()
    }

    /// Bytes decoded but not yet filtered.
    pub const fn decoded_len(&self) -> usize {
        self.decoded.len()
    }

    pub fn decode_buffer_capacity(&self) -> usize {
        self.decoded.capacity()
    }

    pub fn input_buffer_capacity(&self) -> usize {
        self.input.capacity()
    }

    pub fn filter_chain(&self) -> Option<&dyn FilterChain> {
        self.filter.as_deref()
    }

    /// Open `codec` with a fresh driver from `factory`.
    ///
    /// A decoder that is already open is closed first.
    pub fn open_codec(
        &mut self,
        codec: &CodecDescriptor,
        factory: &DriverFactory,
        config: &DecoderConfig,
    ) -> Result<()> {
        if self.initialized {
            debug!("Closing the current decoder before opening another");
            self.close();
        }
        self.resync();

        self.codec = Some(codec.clone());
        self.driver_info = Some(factory.info);
        self.header.sample_format = SampleFormat::S16;
        self.header.out_min_size = DEFAULT_OUT_MIN_SIZE;
        self.header.in_min_size = 0;
        self.header.output_bitrate = 0;

        let mut driver = factory.instantiate();

        if config.prefer_float {
            let mut ctx = DriverContext {
                header: &mut self.header,
                demuxer: self.demuxer.as_mut(),
                input: &mut self.input,
            };
            if driver.control(&mut ctx, ControlOp::QueryFormat(SampleFormat::F32))
                == ControlResult::True
            {
                self.header.sample_format = SampleFormat::F32;
            }
        }

        let preinit = driver.preinit(&mut DriverContext {
            header: &mut self.header,
            demuxer: self.demuxer.as_mut(),
            input: &mut self.input,
        });
        if let Err(e) = preinit {
            error!("Audio decoder preinit failed: {e}");
            self.close();
            return Err(Error::DecoderInit(format!("preinit failed: {e}")));
        }

        if self.header.in_min_size > 0 {
            debug!(
                "Allocating {} bytes for decoder input buffer",
                self.header.in_min_size
            );
            self.input = ByteBuffer::with_capacity(self.header.in_min_size);
        }

        let decode_size = DECODE_BUFFER_BASE + self.header.out_min_size;
        debug!(
            "Allocating {} + {} = {} bytes for decode buffer",
            self.header.out_min_size, DECODE_BUFFER_BASE, decode_size
        );
        self.decoded = ByteBuffer::with_capacity(decode_size);

        let init = driver.init(&mut DriverContext {
            header: &mut self.header,
            demuxer: self.demuxer.as_mut(),
            input: &mut self.input,
        });
        if let Err(e) = init {
            debug!("Audio decoder init failed: {e}");
            self.close();
            return Err(Error::DecoderInit(format!("init failed: {e}")));
        }

        self.driver = Some(driver);
        self.initialized = true;

        if !self.header.audio_format().is_complete() {
            error!("Audio decoder did not specify audio format");
            self.close();
            return Err(Error::DecoderInit(
                "decoder did not specify audio format".to_string(),
            ));
        }

        if self.header.output_bitrate == 0 {
            let rate = self.header.audio_format().bytes_per_second();
            self.header.output_bitrate = u32::try_from(rate).unwrap_or(u32::MAX);
        }

        Ok(())
    }

    /// Release the filter chain, the driver and both buffers.
    ///
    /// Safe to call on an uninitialized stream.
    pub fn close(&mut self) {
        if self.filter.take().is_some() {
            debug!("Uninit audio filters...");
        }
        self.filter_input_rate = None;
        if self.initialized {
            if let Some(driver) = self.driver.as_mut() {
                debug!(
                    "Uninit audio: {}",
                    self.codec.as_ref().map_or("", |c| c.family.as_str())
                );
                driver.uninit(&mut DriverContext {
                    header: &mut self.header,
                    demuxer: self.demuxer.as_mut(),
                    input: &mut self.input,
                });
            }
            self.initialized = false;
        }
        self.driver = None;
        self.driver_info = None;
        self.codec = None;
        self.decoded.release();
        self.input.release();
    }

    /// Build the filter chain from the decoded format to `desired`.
    ///
    /// `input_rate` overrides the decoded sample rate (e.g. for playback
    /// speed changes). Returns the output format the chain achieves; on
    /// failure no chain is attached.
    pub fn attach_filter_chain(
        &mut self,
        builder: &dyn FilterChainBuilder,
        input_rate: Option<u32>,
        desired: FormatRequest,
        config: &FilterConfig,
    ) -> Result<AudioFormat> {
        let mut input = self.header.audio_format();
        if let Some(rate) = input_rate {
            input.sample_rate = rate;
        }
        let output = desired.resolve(&input);

        debug!("Building audio filter chain for {input} -> {output}...");

        match builder.build(input, output, config) {
            Ok(chain) => {
                let achieved = chain.output_format();
                if achieved != output {
                    info!("Audio filter chain output is {achieved} instead of {output}");
                }
                self.filter = Some(chain);
                self.filter_input_rate = input_rate;
                Ok(achieved)
            }
            Err(e) => {
                self.filter = None;
                self.filter_input_rate = None;
                Err(e)
            }
        }
    }

    /// Reset decoding state after a discontinuity such as a seek.
    pub fn resync(&mut self) {
        self.input.clear();
        self.header.pts = None;
        if !self.initialized {
            return;
        }
        if let Some(driver) = self.driver.as_mut() {
            driver.control(
                &mut DriverContext {
                    header: &mut self.header,
                    demuxer: self.demuxer.as_mut(),
                    input: &mut self.input,
                },
                ControlOp::Resync,
            );
        }
    }

    /// Skip one compressed unit, natively if the driver can.
    pub fn skip_frame(&mut self) {
        if !self.initialized {
            return;
        }
        if let Some(driver) = self.driver.as_mut() {
            let result = driver.control(
                &mut DriverContext {
                    header: &mut self.header,
                    demuxer: self.demuxer.as_mut(),
                    input: &mut self.input,
                },
                ControlOp::SkipFrame,
            );
            if result == ControlResult::True {
                return;
            }
        }
        trace!("Driver cannot skip natively, dropping one packet");
        self.demuxer.discard_next_unit();
    }
}

impl Drop for AudioStream {
    fn drop(&mut self) {
        self.close();
    }
}
