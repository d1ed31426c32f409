use adaptive_recompress::{compress_file, Format, Options};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

#[derive(Copy, Clone, Debug, PartialEq, ValueEnum)]
enum OutFormat {
    Jpeg,
    Webp,
    Png,
}

impl From<OutFormat> for Format {
    fn from(f: OutFormat) -> Self {
        match f {
            OutFormat::Jpeg => Format::Jpeg,
            OutFormat::Webp => Format::Webp,
            OutFormat::Png => Format::Png,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "recompress", about = "Compress an image to fit under a target size (KB)")]
struct Args {
    /// Input image path
    input: PathBuf,
    /// Output image path
    output: PathBuf,

    /// Target size in KB (upper bound)
    #[arg(long)]
    target_kb: u64,

    /// Output format: jpeg, webp, or png
    #[arg(long, value_enum, default_value_t = OutFormat::Jpeg)]
    format: OutFormat,

    /// PNG only: zlib compression effort (0-9)
    #[arg(long, default_value_t = 6)]
    png_compression_level: u8,

    /// Optional max width (pre-scale cap applied before the dimension ladder)
    #[arg(long)]
    max_width: Option<u32>,
    /// Optional max height (pre-scale cap applied before the dimension ladder)
    #[arg(long)]
    max_height: Option<u32>,

    /// Inclusive lower quality bound for non-fallback passes
    #[arg(long, default_value_t = 40)]
    min_quality: u8,
    /// Inclusive upper quality bound
    #[arg(long, default_value_t = 92)]
    initial_quality: u8,
    /// Lower bound substituted during the near-target path
    #[arg(long, default_value_t = 80)]
    preferred_min_quality: u8,

    /// JPEG only: preserve the source's EXIF metadata
    #[arg(long)]
    keep_exif: bool,

    /// Ratio defining the early-stop band's lower edge
    #[arg(long, default_value_t = 0.95)]
    early_stop_ratio: f64,
    /// Factor defining the near-target fast-path threshold
    #[arg(long, default_value_t = 1.2)]
    near_target_factor: f64,
    /// Attempt cap per dimension in the ladder
    #[arg(long, default_value_t = 5)]
    max_attempts_per_dim: u32,
    /// Total encoder-trial cap for one request
    #[arg(long, default_value_t = 24)]
    max_total_trials: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let options = Options {
        target_size_kb: args.target_kb,
        initial_quality: args.initial_quality,
        min_quality: args.min_quality,
        format: args.format.into(),
        png_compression_level: args.png_compression_level,
        keep_exif: args.keep_exif,
        early_stop_ratio: args.early_stop_ratio,
        near_target_factor: args.near_target_factor,
        preferred_min_quality: args.preferred_min_quality,
        max_attempts_per_dim: args.max_attempts_per_dim,
        max_total_trials: args.max_total_trials,
        max_width: args.max_width,
        max_height: args.max_height,
    };

    info!(input = ?args.input, target_kb = args.target_kb, format = ?args.format, "starting compression");

    let result = compress_file(&args.input, options)
        .await
        .with_context(|| format!("failed to compress {:?}", args.input))?;

    std::fs::write(&args.output, &result.bytes)
        .with_context(|| format!("failed to write output: {:?}", args.output))?;

    info!(
        output = ?args.output,
        bytes = result.bytes.len(),
        quality_used = result.quality_used,
        width = ?result.width,
        height = ?result.height,
        "compression complete"
    );

    Ok(())
}
