//! Codec candidate selection.
//!
//! Walks the codec registry for the stream's format tag and tries each
//! matching entry until a driver initializes. User directives can exclude
//! codecs, force one by name, or prefer driver families.

use std::collections::HashSet;

use cadence_core::{CodecDescriptor, CodecStatus, DecoderConfig, Error, Result};
use tracing::{debug, error, info, warn};

use crate::driver::{DriverFactory, DriverRegistry};
use crate::registry::CodecRegistry;
use crate::session::AudioStream;

/// One entry of the user's codec list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// Empty entry: automatic selection.
    Auto,
    /// `-name`: never use this codec.
    Exclude(&'a str),
    /// `name` or `+name`; the `+` form also allows unstable entries.
    Force { name: &'a str, unstable: bool },
}

impl<'a> Directive<'a> {
    pub fn parse(directive: &'a str) -> Self {
        let directive = directive.trim();
        if directive.is_empty() {
            Self::Auto
        } else if let Some(name) = directive.strip_prefix('-') {
            Self::Exclude(name)
        } else if let Some(name) = directive.strip_prefix('+') {
            Self::Force {
                name,
                unstable: true,
            }
        } else {
            Self::Force {
                name: directive,
                unstable: false,
            }
        }
    }
}

/// Codec names already tried (or excluded) during one search.
#[derive(Debug, Clone, Default)]
pub struct AttemptedCodecs {
    names: HashSet<String>,
}

impl AttemptedCodecs {
    /// Mark a codec; returns false if it was already marked.
    pub fn insert(&mut self, name: &str) -> bool {
        self.names.insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Constraints for one pass over the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchCriteria<'a> {
    pub format_tag: u32,
    pub codec_name: Option<&'a str>,
    pub family: Option<&'a str>,
    /// Lowest acceptable tier; ignored when `force` is set.
    pub min_status: Option<CodecStatus>,
    /// Accept any tier, including crashing entries.
    pub force: bool,
}

impl SearchCriteria<'_> {
    pub const fn for_format(format_tag: u32) -> Self {
        Self {
            format_tag,
            codec_name: None,
            family: None,
            min_status: None,
            force: false,
        }
    }

    fn matches(&self, codec: &CodecDescriptor) -> bool {
        if !codec.supports(self.format_tag) {
            return false;
        }
        if !self.force && !codec.status.is_auto_eligible() {
            return false;
        }
        if self.codec_name.is_some_and(|name| name != codec.name) {
            return false;
        }
        if self.family.is_some_and(|family| family != codec.family) {
            return false;
        }
        self.force || !self.min_status.is_some_and(|min| codec.status < min)
    }
}

/// A matching registry entry.
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'r> {
    Ready {
        codec: &'r CodecDescriptor,
        factory: &'r DriverFactory,
    },
    /// The entry's driver family is not compiled in.
    DriverUnavailable(&'r CodecDescriptor),
}

/// Cursor over the registry for one set of criteria.
#[derive(Debug)]
pub struct CandidateSearch<'r, 'c> {
    codecs: &'r CodecRegistry,
    drivers: &'r DriverRegistry,
    criteria: SearchCriteria<'c>,
    position: usize,
}

impl<'r, 'c> CandidateSearch<'r, 'c> {
    pub const fn new(
        codecs: &'r CodecRegistry,
        drivers: &'r DriverRegistry,
        criteria: SearchCriteria<'c>,
    ) -> Self {
        Self {
            codecs,
            drivers,
            criteria,
            position: 0,
        }
    }

    /// The next untried match, marked as attempted before it is returned.
    pub fn next_candidate(&mut self, attempted: &mut AttemptedCodecs) -> Option<Candidate<'r>> {
        let codecs = self.codecs;
        for (index, codec) in codecs.iter().enumerate().skip(self.position) {
            self.position = index + 1;
            if attempted.contains(&codec.name) || !self.criteria.matches(codec) {
                continue;
            }
            attempted.insert(&codec.name);

            return Some(match self.drivers.get(&codec.family) {
                Some(factory) => Candidate::Ready { codec, factory },
                None => Candidate::DriverUnavailable(codec),
            });
        }
        None
    }
}

impl AudioStream {
    /// Try every candidate matching `criteria`; true once one opened.
    fn try_codecs(
        &mut self,
        codecs: &CodecRegistry,
        drivers: &DriverRegistry,
        criteria: SearchCriteria<'_>,
        attempted: &mut AttemptedCodecs,
        config: &DecoderConfig,
    ) -> bool {
        let mut search = CandidateSearch::new(codecs, drivers, criteria);
        while let Some(candidate) = search.next_candidate(attempted) {
            match candidate {
                Candidate::DriverUnavailable(codec) => {
                    let err = Error::DriverUnavailable {
                        codec: codec.name.clone(),
                        family: codec.family.clone(),
                    };
                    error!("{err}");
                }
                Candidate::Ready { codec, factory } => {
                    debug!(
                        "Opening audio decoder: [{}] {}",
                        factory.info.short_name, factory.info.name
                    );
                    match self.open_codec(codec, factory, config) {
                        Ok(()) => return true,
                        Err(e) => {
                            warn!("Audio decoder init failed for codec entry \"{}\": {e}", codec.name);
                        }
                    }
                }
            }
        }
        false
    }

    /// Find and open the best codec for this stream.
    ///
    /// `directives` is the user's codec list (empty means automatic);
    /// `families` lists driver families to prefer during automatic search.
    /// Any previously opened codec is closed first.
    pub fn select_best_codec<D, F>(
        &mut self,
        codecs: &CodecRegistry,
        drivers: &DriverRegistry,
        directives: &[D],
        families: &[F],
        config: &DecoderConfig,
    ) -> Result<()>
    where
        D: AsRef<str>,
        F: AsRef<str>,
    {
        self.close();

        let format_tag = self.header.format_tag;
        let mut directives: Vec<Directive<'_>> =
            directives.iter().map(|d| Directive::parse(d.as_ref())).collect();
        if directives.is_empty() {
            directives.push(Directive::Auto);
        }

        let mut attempted = AttemptedCodecs::default();
        for directive in &directives {
            if let Directive::Exclude(name) = directive {
                attempted.insert(name);
            }
        }

        for directive in directives {
            if self.initialized {
                break;
            }
            match directive {
                Directive::Exclude(_) => {}
                Directive::Force { name, unstable } => {
                    info!("Forced audio codec: {name}");
                    let criteria = SearchCriteria {
                        codec_name: Some(name),
                        force: unstable,
                        ..SearchCriteria::for_format(format_tag)
                    };
                    self.try_codecs(codecs, drivers, criteria, &mut attempted, config);
                }
                Directive::Auto => {
                    for family in families {
                        if self.initialized {
                            break;
                        }
                        let family = family.as_ref();
                        info!("Trying to force audio codec driver family {family}...");
                        for tier in CodecStatus::AUTO_TIERS {
                            let criteria = SearchCriteria {
                                family: Some(family),
                                min_status: Some(tier),
                                ..SearchCriteria::for_format(format_tag)
                            };
                            if self.try_codecs(codecs, drivers, criteria, &mut attempted, config) {
                                break;
                            }
                        }
                    }
                    if !self.initialized {
                        for tier in CodecStatus::AUTO_TIERS {
                            let criteria = SearchCriteria {
                                min_status: Some(tier),
                                ..SearchCriteria::for_format(format_tag)
                            };
                            if self.try_codecs(codecs, drivers, criteria, &mut attempted, config) {
                                break;
                            }
                        }
                    }
                }
            }
        }

        if !self.initialized {
            error!("Cannot find codec for audio format 0x{format_tag:X}");
            return Err(Error::NoCodecFound { format_tag });
        }

        self.log_selection();
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn log_selection(&self) {
        let (Some(codec), Some(driver)) = (self.codec(), self.driver_info()) else {
            return;
        };
        let header = &self.header;
        let label = header
            .codec_label
            .as_deref()
            .filter(|l| !l.is_empty())
            .unwrap_or(&codec.info);
        info!("Selected audio codec: {label} [{}]", driver.name);
        debug!(
            "Audio codec entry: {} ({})  family: {}",
            codec.name, codec.info, codec.family
        );

        let in_bps = f64::from(header.input_bitrate);
        let out_bps = f64::from(header.output_bitrate.max(1));
        info!(
            "AUDIO: {} Hz, {} ch, {}, {:.1} kbit/{:.2}% (ratio: {}->{})",
            header.sample_rate,
            header.channels,
            header.sample_format.short_name(),
            in_bps * 8.0 * 0.001,
            in_bps / out_bps * 100.0,
            header.input_bitrate,
            header.output_bitrate
        );
    }
}
