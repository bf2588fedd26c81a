//! Error types for Cadence.

use thiserror::Error;

/// Result type alias using Cadence's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Cadence.
#[derive(Error, Debug)]
pub enum Error {
    // Codec selection errors
    #[error("Cannot find codec for audio format 0x{format_tag:X}")]
    NoCodecFound { format_tag: u32 },

    #[error("Requested audio codec family [{codec}] (afm={family}) not available")]
    DriverUnavailable { codec: String, family: String },

    #[error("Audio decoder init failed: {0}")]
    DecoderInit(String),

    // Decode loop errors
    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Audio filter error: {0}")]
    Filter(String),

    #[error("Format negotiation failed: {0}")]
    FormatNegotiation(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio decoder is not initialized")]
    NotInitialized,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
