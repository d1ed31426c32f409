use crate::encoder::{self, resize_to_longest_side, EncodedBlob};
use crate::options::{Format, Options};
use crate::outcome::{Accumulators, SearchOutcome};
use crate::policy::SearchPolicy;
use crate::predictor::LinearPredictor;
use crate::quality_search::QualitySearch;
use image::DynamicImage;

/// Orchestrates the predictor and the per-dimension quality searches for
/// one decoded image, tracking the two accumulators across every attempt.
pub struct AdaptiveSearch;

pub struct AdaptiveSearchResult {
    pub outcome: SearchOutcome,
    pub smallest_overall: Option<EncodedBlob>,
}

impl AdaptiveSearch {
    pub fn run(
        img: &DynamicImage,
        format: Format,
        opts: &Options,
        min_quality: u8,
        target: u64,
        max_total_trials: u32,
    ) -> AdaptiveSearchResult {
        let mut acc = Accumulators::default();
        let mut trial_budget = max_total_trials;
        let band = opts.early_stop_band(target);

        // 1. no-resize predictor probe.
        let mut s_hi_at_full_size: Option<u64> = None;
        let mut s_lo_at_full_size: Option<u64> = None;
        if trial_budget > 0 {
            if let Some(pass) = LinearPredictor::no_resize_probe(img, format, opts, target) {
                for t in pass.trials {
                    trial_budget = trial_budget.saturating_sub(1);
                    acc.observe(t, target);
                }
                s_hi_at_full_size = Some(pass.s_hi);
                s_lo_at_full_size = Some(pass.s_lo);
                if acc.in_early_stop_band(band.0, band.1) {
                    return finish(acc);
                }
            }
        }

        // 2. downscale predictor probe, only if the low-quality probe was
        // still over target. Reuses the q=85 sample from step 1 instead of
        // spending another trial re-encoding it.
        if let (Some(s_hi), Some(s_lo)) = (s_hi_at_full_size, s_lo_at_full_size) {
            if s_lo > target && trial_budget > 0 {
                if let Some(pass) =
                    LinearPredictor::downscale_probe(img, format, opts, target, s_hi, s_lo)
                {
                    for t in pass.trials {
                        trial_budget = trial_budget.saturating_sub(1);
                        acc.observe(t, target);
                    }
                    if acc.in_early_stop_band(band.0, band.1) {
                        return finish(acc);
                    }
                }
            }
        }

        // 3. primary ladder: resize once per dimension, run QualitySearch.
        for &dim in SearchPolicy::PRIMARY_LADDER {
            if trial_budget == 0 {
                break;
            }
            let resized = resize_to_longest_side(img, dim);
            let result = QualitySearch::run(
                &resized,
                format,
                min_quality,
                opts.initial_quality,
                target,
                band,
                opts.max_attempts_per_dim,
                &mut trial_budget,
            );
            for t in result.trials {
                acc.observe(t, target);
            }
            if acc.in_early_stop_band(band.0, band.1) {
                return finish(acc);
            }
        }

        // 4. fallback pass: widened bounds over the fallback ladder.
        let smallest_over_target = acc
            .smallest_overall()
            .is_some_and(|b| b.len() > target);
        if acc.best_under().is_none() && smallest_over_target && min_quality > SearchPolicy::FALLBACK_MIN_QUALITY
        {
            for &dim in SearchPolicy::FALLBACK_LADDER {
                if trial_budget == 0 {
                    break;
                }
                let resized = resize_to_longest_side(img, dim);
                let result = QualitySearch::run(
                    &resized,
                    format,
                    SearchPolicy::FALLBACK_MIN_QUALITY,
                    opts.initial_quality,
                    target,
                    band,
                    opts.max_attempts_per_dim,
                    &mut trial_budget,
                );
                for t in result.trials {
                    acc.observe(t, target);
                }
                if acc.best_under().is_some() {
                    return finish(acc);
                }
            }
        }

        // 5. enforcement sweep: quality = 1 over the enforcement ladder.
        if acc.best_under().is_none() {
            if let Some(blob) = enforcement_sweep(img, format, target, &mut trial_budget) {
                acc.observe(blob, target);
            }
        }

        finish(acc)
    }
}

/// Quality = 1 over the enforcement ladder — the very last resort before
/// giving up on reaching the target. Shared by `AdaptiveSearch::run`'s
/// internal step 5 and the orchestrator's own final-enforcement step, so
/// both paths agree byte-for-byte on what "last resort" means.
pub fn enforcement_sweep(
    img: &DynamicImage,
    format: Format,
    target: u64,
    trial_budget: &mut u32,
) -> Option<EncodedBlob> {
    use image::GenericImageView;
    let mut best: Option<EncodedBlob> = None;
    for &dim in SearchPolicy::ENFORCEMENT_LADDER {
        if *trial_budget == 0 {
            break;
        }
        *trial_budget -= 1;
        let resized = resize_to_longest_side(img, dim);
        if let Ok(bytes) = encoder::encode(&resized, SearchPolicy::ENFORCEMENT_QUALITY, format) {
            let size = bytes.len() as u64;
            let (w, h) = resized.dimensions();
            if size <= target {
                return Some(EncodedBlob {
                    bytes,
                    quality: SearchPolicy::ENFORCEMENT_QUALITY,
                    width: w,
                    height: h,
                });
            }
            let smaller = match &best {
                Some(existing) => size < existing.len(),
                None => true,
            };
            if smaller {
                best = Some(EncodedBlob {
                    bytes,
                    quality: SearchPolicy::ENFORCEMENT_QUALITY,
                    width: w,
                    height: h,
                });
            }
        }
    }
    best.filter(|b| b.len() <= target)
}

fn finish(acc: Accumulators) -> AdaptiveSearchResult {
    let smallest_overall = acc.smallest_overall().cloned();
    let outcome = match acc.into_best_under() {
        Some(blob) => SearchOutcome::Found(blob),
        None => SearchOutcome::NotFound,
    };
    AdaptiveSearchResult {
        outcome,
        smallest_overall,
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
    fn finds_under_target_candidate_for_generous_target() {
        let img = noise_image(64, 64);
        let opts = Options::default();
        let result = AdaptiveSearch::run(&img, Format::Jpeg, &opts, opts.min_quality, 1_000_000, 24);
        assert!(result.outcome.is_found());
    }

    #[test]
    fn falls_to_enforcement_for_unreachable_target() {
        let img = noise_image(256, 256);
        let opts = Options::default();
        let result = AdaptiveSearch::run(&img, Format::Jpeg, &opts, opts.min_quality, 200, 24);
        // Either the enforcement sweep found something under 200 bytes, or
        // nothing did and the caller falls back to smallest_overall — both
        // are acceptable outcomes for such an aggressive target.
        if let SearchOutcome::Found(blob) = result.outcome {
            assert!(blob.len() <= 200);
        }
        assert!(result.smallest_overall.is_some());
    }

    #[test]
    fn terminates_within_trial_budget() {
        let img = noise_image(512, 512);
        let opts = Options::default();
        let budget = 24u32;
        // Just confirming this returns promptly is implicit in the test
        // harness timing out otherwise; the assertion covers output shape.
        let result = AdaptiveSearch::run(&img, Format::Jpeg, &opts, opts.min_quality, 500, budget);
        assert!(result.smallest_overall.is_some() || result.outcome.is_found());
    }
}
