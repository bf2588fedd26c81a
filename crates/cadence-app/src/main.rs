//! # Cadence
//!
//! Command-line front end for the Cadence audio decoding pipeline.

mod pipeline;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cadence_audio::{list_drivers, CodecRegistry, DriverRegistry};
use cadence_core::{DecoderConfig, FormatRequest, SampleFormat};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "cadence", version, about = "Decode audio streams to raw PCM")]
struct Cli {
    /// Decoder configuration file (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Codec registry file (JSON); the built-in table is used otherwise.
    #[arg(long, global = true)]
    codecs: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the available decoder driver families.
    Drivers,
    /// List the codec registry.
    Codecs,
    /// Decode the first audio track of a file to raw PCM.
    Decode {
        input: PathBuf,
        output: PathBuf,
        /// Codec directives, e.g. `mp3,-flac,` or `+mad`.
        #[arg(long = "ac", value_delimiter = ',', allow_hyphen_values = true)]
        directives: Vec<String>,
        /// Preferred driver families, in order.
        #[arg(long = "afm", value_delimiter = ',')]
        families: Vec<String>,
        /// Output sample rate.
        #[arg(long)]
        rate: Option<u32>,
        /// Output channel count.
        #[arg(long)]
        channels: Option<u16>,
        /// Output sample format: u8, s16, s32 or float.
        #[arg(long, value_parser = parse_sample_format)]
        format: Option<SampleFormat>,
        /// Ask the decoder for float samples.
        #[arg(long)]
        float: bool,
    },
}

fn parse_sample_format(value: &str) -> Result<SampleFormat, String> {
    match value.to_ascii_lowercase().as_str() {
        "u8" => Ok(SampleFormat::U8),
        "s16" | "s16ne" => Ok(SampleFormat::S16),
        "s32" | "s32ne" => Ok(SampleFormat::S32),
        "float" | "floatne" | "f32" => Ok(SampleFormat::F32),
        other => Err(format!("unknown sample format '{other}'")),
    }
}

fn default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "cadence").map(|dirs| dirs.config_dir().to_path_buf())
}

fn load_config(path: Option<&Path>) -> Result<DecoderConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_dir().map(|dir| dir.join("config.json")) {
            Some(path) if path.exists() => path,
            _ => return Ok(DecoderConfig::default()),
        },
    };
    debug!("Loading config from {}", path.display());
    DecoderConfig::from_file(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))
}

fn load_codecs(path: Option<&Path>) -> Result<CodecRegistry> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_dir().map(|dir| dir.join("codecs.json")) {
            Some(path) if path.exists() => path,
            _ => return Ok(CodecRegistry::builtin()),
        },
    };
    debug!("Loading codec registry from {}", path.display());
    CodecRegistry::from_file(&path)
        .with_context(|| format!("Failed to load codec registry {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence=info,cadence_audio=info".into()),
        )
        .init();

    let cli = Cli::parse();
    debug!("Starting Cadence v{}", env!("CARGO_PKG_VERSION"));

    let drivers = DriverRegistry::with_builtin_drivers();

    match cli.command {
        Command::Drivers => {
            for info in list_drivers(&drivers) {
                println!("{:<12} {:<32} {}", info.short_name, info.name, info.comment);
            }
        }
        Command::Codecs => {
            let codecs = load_codecs(cli.codecs.as_deref())?;
            for codec in codecs.iter() {
                let formats: Vec<String> =
                    codec.formats.iter().map(|tag| format!("0x{tag:X}")).collect();
                println!(
                    "{:<12} {:<10} {:<9} {:<40} {}",
                    codec.name,
                    codec.family,
                    codec.status,
                    codec.info,
                    formats.join(",")
                );
            }
        }
        Command::Decode {
            input,
            output,
            directives,
            families,
            rate,
            channels,
            format,
            float,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            config.prefer_float |= float;
            let codecs = load_codecs(cli.codecs.as_deref())?;
            let job = pipeline::DecodeJob {
                input,
                output,
                directives,
                families,
                request: FormatRequest {
                    sample_rate: rate,
                    channels,
                    sample_format: format,
                },
                config,
            };
            let summary = pipeline::run(&job, &codecs, &drivers)?;
            info!(
                "Wrote {} bytes of {} audio to {}",
                summary.bytes_written,
                summary.format,
                job.output.display()
            );
        }
    }

    Ok(())
}
