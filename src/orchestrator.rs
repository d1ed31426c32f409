use crate::adaptive_search::{enforcement_sweep, AdaptiveSearch};
use crate::encoder::{self, EncodedBlob};
use crate::error::CompressionError;
use crate::fast_path::FastPathEncoder;
use crate::options::Options;
use crate::outcome::SearchOutcome;
use image::GenericImageView;
use tracing::{debug, info, instrument};

/// What one `compress` call hands back to its caller.
#[derive(Clone, Debug)]
pub struct CompressionResult {
    pub bytes: Vec<u8>,
    pub quality_used: u8,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Top-level entry point. Executes the tiered contract: passthrough,
/// near-target fast-path/adaptive, general fast-path/adaptive, final
/// enforcement, original-unchanged. Does not itself touch the
/// concurrency gate — callers (the library's `compress_bytes`/
/// `compress_file`) wrap this with the permit.
pub struct CompressionOrchestrator;

impl CompressionOrchestrator {
    #[instrument(skip(source_bytes, opts), fields(input_len = source_bytes.len()))]
    pub fn compress(
        source_bytes: Vec<u8>,
        opts: &Options,
    ) -> Result<CompressionResult, CompressionError> {
        let original_len = source_bytes.len() as u64;
        let target_bytes = opts.target_bytes();

        // 1. Passthrough.
        if original_len <= target_bytes {
            info!(original_len, target_bytes, "input already under target, passthrough");
            return Ok(CompressionResult {
                bytes: source_bytes,
                quality_used: 100,
                width: None,
                height: None,
            });
        }

        // 2. Safe working budget.
        let safe_target = opts.safe_target_bytes();

        let img = encoder::decode(&source_bytes).map_err(|e| match e {
            crate::error::EncoderUnavailable::Decode(source) => CompressionError::Decode { source },
            crate::error::EncoderUnavailable::Encode(source) => CompressionError::Decode { source },
        })?;
        let img = apply_max_dimensions(img, opts.max_width, opts.max_height);

        if opts.format == crate::options::Format::Png {
            return Self::compress_png(&img, opts, safe_target, &source_bytes);
        }

        // 3. Near-target branch.
        let near_target_threshold = (safe_target as f64 * opts.near_target_factor).floor() as u64;
        let mut best_overall: Option<EncodedBlob> = None;

        if original_len <= near_target_threshold {
            debug!("near-target branch engaged");
            let elevated_min = opts.preferred_min_quality.max(opts.min_quality);

            if let SearchOutcome::Found(blob) =
                FastPathEncoder::try_compress(&img, opts.format, opts, elevated_min, safe_target)
            {
                return Ok(finalize(blob, opts, &source_bytes, &img));
            }

            let result = AdaptiveSearch::run(
                &img,
                opts.format,
                opts,
                elevated_min,
                safe_target,
                opts.max_total_trials,
            );
            if let SearchOutcome::Found(blob) = result.outcome {
                return Ok(finalize(blob, opts, &source_bytes, &img));
            }
            best_overall = better_of(best_overall, result.smallest_overall);
        } else {
            // 4. General branch.
            if let SearchOutcome::Found(blob) = FastPathEncoder::try_compress(
                &img,
                opts.format,
                opts,
                opts.min_quality,
                safe_target,
            ) {
                return Ok(finalize(blob, opts, &source_bytes, &img));
            }

            let result = AdaptiveSearch::run(
                &img,
                opts.format,
                opts,
                opts.min_quality,
                safe_target,
                opts.max_total_trials,
            );
            if let SearchOutcome::Found(blob) = result.outcome {
                return Ok(finalize(blob, opts, &source_bytes, &img));
            }
            best_overall = better_of(best_overall, result.smallest_overall);
        }

        // 5. Final enforcement, only if nothing under target has been seen yet.
        if best_overall.as_ref().is_some_and(|b| b.len() > safe_target) {
            let mut budget = crate::policy::SearchPolicy::ENFORCEMENT_LADDER.len() as u32;
            if let Some(blob) = enforcement_sweep(&img, opts.format, safe_target, &mut budget) {
                return Ok(finalize(blob, opts, &source_bytes, &img));
            }
        }

        // 6. Nothing beat the original: return the smallest candidate
        // observed if it's strictly smaller than the original, else the
        // original unchanged.
        if let Some(blob) = best_overall {
            if blob.len() < original_len {
                return Ok(CompressionResult {
                    bytes: blob.bytes,
                    quality_used: blob.quality,
                    width: Some(blob.width),
                    height: Some(blob.height),
                });
            }
        }

        Ok(CompressionResult {
            bytes: source_bytes,
            quality_used: 100,
            width: None,
            height: None,
        })
    }

    /// PNG degrades to dimension-only: quality search is meaningless for a
    /// lossless format, so this only walks the primary ladder's dimensions
    /// looking for one that lands the PNG encode under target, at the
    /// caller's configured compression level.
    fn compress_png(
        img: &image::DynamicImage,
        opts: &Options,
        safe_target: u64,
        source_bytes: &[u8],
    ) -> Result<CompressionResult, CompressionError> {
        let mut best: Option<EncodedBlob> = None;
        for &dim in crate::policy::SearchPolicy::PRIMARY_LADDER {
            let resized = encoder::resize_to_longest_side(img, dim);
            let Ok(bytes) = encoder::encode(&resized, opts.png_compression_level, opts.format) else {
                continue;
            };
            let (w, h) = resized.dimensions();
            let size = bytes.len() as u64;
            let blob = EncodedBlob {
                bytes,
                quality: opts.png_compression_level,
                width: w,
                height: h,
            };
            if size <= safe_target {
                return Ok(finalize(blob, opts, source_bytes, img));
            }
            let smaller = match &best {
                Some(existing) => size < existing.len(),
                None => true,
            };
            if smaller {
                best = Some(blob);
            }
        }
        if let Some(blob) = best {
            if blob.len() < source_bytes.len() as u64 {
                return Ok(CompressionResult {
                    bytes: blob.bytes,
                    quality_used: blob.quality,
                    width: Some(blob.width),
                    height: Some(blob.height),
                });
            }
        }
        Ok(CompressionResult {
            bytes: source_bytes.to_vec(),
            quality_used: 100,
            width: None,
            height: None,
        })
    }
}

/// `max_width`/`max_height` are honored as a hard pre-scale cap applied
/// once, before the dimension ladder runs. Scales down to fit both
/// bounds, never up.
fn apply_max_dimensions(
    img: image::DynamicImage,
    max_w: Option<u32>,
    max_h: Option<u32>,
) -> image::DynamicImage {
    if max_w.is_none() && max_h.is_none() {
        return img;
    }
    let (w, h) = img.dimensions();
    let scale_w = max_w.map(|mw| mw as f64 / w as f64).unwrap_or(1.0);
    let scale_h = max_h.map(|mh| mh as f64 / h as f64).unwrap_or(1.0);
    let scale = scale_w.min(scale_h).min(1.0);
    if scale < 1.0 {
        let new_w = ((w as f64 * scale).round() as u32).max(1);
        let new_h = ((h as f64 * scale).round() as u32).max(1);
        img.resize(new_w, new_h, image::imageops::FilterType::Lanczos3)
    } else {
        img
    }
}

fn better_of(a: Option<EncodedBlob>, b: Option<EncodedBlob>) -> Option<EncodedBlob> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if a.len() <= b.len() { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn finalize(
    blob: EncodedBlob,
    opts: &Options,
    source_bytes: &[u8],
    img: &image::DynamicImage,
) -> CompressionResult {
    let bytes = if opts.format == crate::options::Format::Jpeg && opts.keep_exif {
        // Re-run the encode with EXIF splicing for the winning candidate
        // only — cheaper than carrying EXIF through every trial.
        let resized = encoder::resize_to_longest_side(img, longest_side_hint(blob.width, blob.height, img));
        encoder::encode_with_exif(&resized, blob.quality, opts.format, true, Some(source_bytes))
            .unwrap_or(blob.bytes)
    } else {
        blob.bytes
    };
    CompressionResult {
        quality_used: blob.quality,
        width: Some(blob.width),
        height: Some(blob.height),
        bytes,
    }
}

/// The ladder dimension that produced `(width, height)` isn't tracked
/// alongside the blob, so derive the longest-side cap that reproduces it
/// for the EXIF-preserving re-encode.
fn longest_side_hint(width: u32, height: u32, original: &image::DynamicImage) -> u32 {
    let (ow, oh) = original.dimensions();
    if width == ow && height == oh {
        0
    } else {
        width.max(height)
    }
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

    #[test]
    fn passthrough_when_already_under_target() {
        let jpeg = noise_jpeg(16, 16);
        let opts = Options {
            target_size_kb: 1_000_000,
            ..Default::default()
        };
        let result = CompressionOrchestrator::compress(jpeg.clone(), &opts).unwrap();
        assert_eq!(result.bytes, jpeg);
        assert_eq!(result.quality_used, 100);
    }

    #[test]
    fn non_passthrough_result_respects_safe_target_or_shrinks() {
        let jpeg = noise_jpeg(300, 300);
        let opts = Options {
            target_size_kb: 5,
            ..Default::default()
        };
        let original_len = jpeg.len() as u64;
        let result = CompressionOrchestrator::compress(jpeg, &opts).unwrap();
        let safe_target = opts.safe_target_bytes();
        assert!(
            result.bytes.len() as u64 <= safe_target || (result.bytes.len() as u64) < original_len
        );
    }

    #[test]
    fn quality_used_is_100_only_on_passthrough_or_fallback_to_original() {
        let jpeg = noise_jpeg(8, 8);
        let opts = Options {
            target_size_kb: 1_000_000,
            ..Default::default()
        };
        let result = CompressionOrchestrator::compress(jpeg, &opts).unwrap();
        assert_eq!(result.quality_used, 100);
    }

    #[test]
    fn decode_error_surfaces_when_passthrough_impossible() {
        let garbage = vec![0u8; 50 * 1024];
        let opts = Options {
            target_size_kb: 1,
            ..Default::default()
        };
        let result = CompressionOrchestrator::compress(garbage, &opts);
        assert!(result.is_err());
    }
}
