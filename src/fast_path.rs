use crate::encoder::{self, EncodedBlob};
use crate::options::{Format, Options};
use crate::outcome::SearchOutcome;
use crate::policy::SearchPolicy;
use image::{DynamicImage, GenericImageView};

/// Quality-only binary search, no resize, a hard cap of 6 attempts. Models
/// the tier a platform codec would occupy if one were available in this
/// environment; it shares the pure encoder but is structurally isolated so
/// a real platform codec can be swapped in later without touching the
/// orchestrator's tiering.
pub struct FastPathEncoder;

impl FastPathEncoder {
    pub fn try_compress(
        img: &DynamicImage,
        format: Format,
        opts: &Options,
        min_quality: u8,
        target: u64,
    ) -> SearchOutcome {
        let (w, h) = img.dimensions();
        let mut lo = min_quality as i32;
        let mut hi = opts.initial_quality as i32;
        let band = opts.early_stop_band(target);

        let mut best_under: Option<EncodedBlob> = None;
        let mut attempts = 0u32;

        while lo <= hi && attempts < SearchPolicy::FAST_PATH_MAX_ATTEMPTS {
            let mid = ((lo + hi) / 2) as u8;
            attempts += 1;

            let Ok(bytes) = encoder::encode(img, mid, format) else {
                // Codec call failed: swallow it, the tier simply ends here.
                hi = mid as i32 - 1;
                continue;
            };
            let size = bytes.len() as u64;
            let candidate = EncodedBlob {
                bytes,
                quality: mid,
                width: w,
                height: h,
            };

            if size <= target {
                let larger = match &best_under {
                    Some(existing) => size > existing.len(),
                    None => true,
                };
                if larger {
                    best_under = Some(candidate);
                }
                if size >= band.0 && size <= band.1 {
                    break;
                }
                lo = mid as i32 + 1;
            } else {
                hi = mid as i32 - 1;
            }
        }

        match best_under {
            Some(blob) => SearchOutcome::Found(blob),
            None => SearchOutcome::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn noise_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(w, h, |x, y| {
            image::Rgb([
                ((x * 7 + y * 13) % 256) as u8,
                ((x * 3 + y * 29) % 256) as u8,
                ((x * 17 + y) % 256) as u8,
            ])
        }))
    }

    #[test]
    fn succeeds_when_target_is_generous() {
        let img = noise_image(64, 64);
        let opts = Options::default();
        let outcome = FastPathEncoder::try_compress(&img, Format::Jpeg, &opts, opts.min_quality, 1_000_000);
        assert!(outcome.is_found());
    }

    #[test]
    fn reports_not_found_when_target_unreachable_without_resize() {
        let img = noise_image(256, 256);
        let opts = Options::default();
        let outcome = FastPathEncoder::try_compress(&img, Format::Jpeg, &opts, opts.min_quality, 50);
        assert!(!outcome.is_found());
    }
}
