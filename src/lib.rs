//! Adaptive image recompression engine: given source bytes and a byte
//! budget, produces output bytes whose encoded size is as close as
//! possible to — but not exceeding — that budget.
//!
//! The public surface is [`compress_bytes`] and [`compress_file`]. Both are
//! `async fn`s: the permit from the process-wide [`ConcurrencyGate`] is
//! held across a [`tokio::task::spawn_blocking`] call that does the actual
//! decode/search/encode work, so callers never block their own executor.

mod adaptive_search;
mod encoder;
mod error;
mod fast_path;
mod gate;
mod options;
mod orchestrator;
mod outcome;
mod policy;
mod predictor;
mod quality_search;

pub use error::CompressionError;
pub use gate::ConcurrencyGate;
pub use options::{Format, Options};
pub use orchestrator::CompressionResult;

use orchestrator::CompressionOrchestrator;
use std::path::Path;
use tracing::instrument;

/// Compress an in-memory image to fit `options.target_size_kb`, best-effort.
///
/// Acquires a permit from the shared [`ConcurrencyGate`] before doing any
/// work and releases it on every exit path, including cancellation.
#[instrument(skip(bytes, options), fields(input_len = bytes.len()))]
pub async fn compress_bytes(
    bytes: Vec<u8>,
    options: Options,
) -> Result<CompressionResult, CompressionError> {
    let _permit = ConcurrencyGate::shared().acquire().await;
    tokio::task::spawn_blocking(move || CompressionOrchestrator::compress(bytes, &options))
        .await
        .expect("compression worker task panicked")
}

/// Read `path` and compress it to fit `options.target_size_kb`.
pub async fn compress_file(
    path: impl AsRef<Path>,
    options: Options,
) -> Result<CompressionResult, CompressionError> {
    let path = path.as_ref().to_path_buf();
    let bytes = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || std::fs::read(&path))
            .await
            .expect("read worker task panicked")
            .map_err(|source| CompressionError::Read { path, source })?
    };
    compress_bytes(bytes, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn noise_jpeg(w: u32, h: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(ImageBuffer::from_fn(w, h, |x, y| {
            Rgb([
                ((x * 7 + y * 13) % 256) as u8,
                ((x * 3 + y * 29) % 256) as u8,
                ((x * 17 + y) % 256) as u8,
            ])
        }));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn compress_bytes_passthrough_scenario() {
        let jpeg = noise_jpeg(16, 16);
        let opts = Options {
            target_size_kb: 1_000_000,
            ..Default::default()
        };
        let result = compress_bytes(jpeg.clone(), opts).await.unwrap();
        assert_eq!(result.bytes, jpeg);
        assert_eq!(result.quality_used, 100);
    }

    #[tokio::test]
    async fn compress_bytes_is_idempotent_on_its_own_output() {
        let jpeg = noise_jpeg(200, 200);
        let opts = Options {
            target_size_kb: 20,
            ..Default::default()
        };
        let first = compress_bytes(jpeg, opts.clone()).await.unwrap();
        let second = compress_bytes(first.bytes.clone(), opts).await.unwrap();
        // Feeding the result back in with the same options takes the
        // passthrough path and returns it verbatim.
        assert_eq!(second.bytes, first.bytes);
        assert_eq!(second.quality_used, 100);
    }

    #[tokio::test]
    async fn compress_file_surfaces_read_error() {
        let opts = Options::default();
        let result = compress_file("/nonexistent/path/does-not-exist.jpg", opts).await;
        assert!(matches!(result, Err(CompressionError::Read { .. })));
    }

    #[tokio::test]
    async fn concurrent_compress_calls_all_complete() {
        let mut handles = Vec::new();
        for i in 0..8 {
            let jpeg = noise_jpeg(64 + i, 64 + i);
            let opts = Options {
                target_size_kb: 10,
                ..Default::default()
            };
            handles.push(tokio::spawn(async move { compress_bytes(jpeg, opts).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
    }
}
