//! # cadence-core
//!
//! Core types, configuration, and error handling for the Cadence audio
//! decoding pipeline.

pub mod config;
pub mod error;
pub mod types;

pub use config::{DecoderConfig, FakeMono, FilterConfig};
pub use error::{Error, Result};
pub use types::*;
