use crate::encoder::{self, EncodedBlob};
use crate::options::Format;
use crate::outcome::SearchOutcome;
use image::{DynamicImage, GenericImageView};

/// Bounded binary search over quality at a fixed dimension: configurable
/// bounds, a per-dimension attempt cap, and a shared trial-budget counter
/// for the whole request.
pub struct QualitySearch;

pub struct QualitySearchResult {
    pub outcome: SearchOutcome,
    /// Smallest candidate observed at this dimension, even if over target
    /// (folded into the caller's `smallest_overall` accumulator).
    pub smallest_observed: Option<EncodedBlob>,
    pub trials: Vec<EncodedBlob>,
}

impl QualitySearch {
    /// `low = min_quality`, `high = initial_quality`. Stops on crossover,
    /// on `max_attempts_per_dim`, on `trial_budget` exhaustion, or when a
    /// candidate lands in the early-stop band.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        img: &DynamicImage,
        format: Format,
        min_quality: u8,
        initial_quality: u8,
        target: u64,
        early_stop_band: (u64, u64),
        max_attempts_per_dim: u32,
        trial_budget: &mut u32,
    ) -> QualitySearchResult {
        let (w, h) = img.dimensions();
        let mut lo = min_quality as i32;
        let mut hi = initial_quality as i32;

        let mut best_under: Option<EncodedBlob> = None;
        let mut smallest_observed: Option<EncodedBlob> = None;
        let mut trials = Vec::new();
        let mut attempts = 0u32;

        while lo <= hi && attempts < max_attempts_per_dim && *trial_budget > 0 {
            let mid = ((lo + hi) / 2) as u8;
            attempts += 1;
            *trial_budget -= 1;

            let Ok(bytes) = encoder::encode(img, mid, format) else {
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
            trials.push(candidate.clone());

            let smaller = match &smallest_observed {
                Some(existing) => size < existing.len(),
                None => true,
            };
            if smaller {
                smallest_observed = Some(candidate.clone());
            }

            if size <= target {
                let larger = match &best_under {
                    Some(existing) => size > existing.len(),
                    None => true,
                };
                if larger {
                    best_under = Some(candidate);
                }
                if size >= early_stop_band.0 && size <= early_stop_band.1 {
                    break;
                }
                lo = mid as i32 + 1;
            } else {
                hi = mid as i32 - 1;
            }
        }
        let outcome = match best_under {
            Some(blob) => SearchOutcome::Found(blob),
            None => SearchOutcome::NotFound,
        };

        QualitySearchResult {
            outcome,
            smallest_observed,
            trials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn noise_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(w, h, |x, y| {
            Rgb([
                ((x * 7 + y * 13) % 256) as u8,
                ((x * 3 + y * 29) % 256) as u8,
                ((x * 17 + y) % 256) as u8,
            ])
        }))
    }

    #[test]
    fn respects_max_attempts_per_dim() {
        let img = noise_image(64, 64);
        let mut budget = 1000;
        let result = QualitySearch::run(&img, Format::Jpeg, 1, 100, 1, (0, 1), 3, &mut budget);
        assert!(result.trials.len() <= 3);
    }

    #[test]
    fn respects_shared_trial_budget() {
        let img = noise_image(64, 64);
        let mut budget = 2;
        let result = QualitySearch::run(&img, Format::Jpeg, 1, 100, 1, (0, 1), 10, &mut budget);
        assert_eq!(result.trials.len(), 2);
        assert_eq!(budget, 0);
    }

    #[test]
    fn single_probe_when_min_equals_initial_quality() {
        let img = noise_image(32, 32);
        let mut budget = 10;
        let result =
            QualitySearch::run(&img, Format::Jpeg, 50, 50, 1_000_000, (0, 1_000_000), 5, &mut budget);
        assert_eq!(result.trials.len(), 1);
    }

    #[test]
    fn finds_under_target_candidate_for_generous_budget() {
        let img = noise_image(64, 64);
        let mut budget = 20;
        let result = QualitySearch::run(
            &img,
            Format::Jpeg,
            1,
            100,
            50_000,
            (45_000, 50_000),
            6,
            &mut budget,
        );
        assert!(result.outcome.is_found());
    }
}
