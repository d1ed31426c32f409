use crate::encoder::{self, resize_to_longest_side, EncodedBlob};
use crate::options::{Format, Options};
use crate::outcome::SearchOutcome;
use image::{DynamicImage, GenericImageView};

const PROBE_Q_HI: u8 = 85;
const PROBE_Q_LO: u8 = 35;
const DOWNSCALE_PROBE_MID: f64 = 75.0;
const DOWNSCALE_Q_HI: u8 = 80;
const DOWNSCALE_Q_LO: u8 = 50;
const MIN_DIM_SCALE: f64 = 0.1;

/// Output of one predictor pass: every trial it ran (so the caller can feed
/// them into its accumulators), whether one satisfied the target, and — for
/// the downscale variant — the resized image the trials were taken against.
pub struct PredictorPass {
    pub trials: Vec<EncodedBlob>,
    pub outcome: SearchOutcome,
    pub probed_image: Option<DynamicImage>,
    pub s_hi: u64,
    pub s_lo: u64,
}

/// Two-probe linear model mapping JPEG/WebP quality to encoded size.
pub struct LinearPredictor;

impl LinearPredictor {
    /// Encode at `q_hi`/`q_lo`, fit `size(q) = a*q + b`, and try the
    /// resulting `{q*, q*+5, q*-5}` trial set at the image's current size.
    pub fn no_resize_probe(
        img: &DynamicImage,
        format: Format,
        opts: &Options,
        target: u64,
    ) -> Option<PredictorPass> {
        let hi = encoder::encode(img, PROBE_Q_HI, format).ok()?;
        let lo = encoder::encode(img, PROBE_Q_LO, format).ok()?;
        let (w, h) = img.dimensions();
        let s_hi = hi.len() as u64;
        let s_lo = lo.len() as u64;

        let mut trials = vec![
            blob_of(hi, PROBE_Q_HI, w, h),
            blob_of(lo, PROBE_Q_LO, w, h),
        ];

        let band = opts.early_stop_band(target);
        let mut found: Option<EncodedBlob> = None;

        if let Some(q_star) = fit_and_solve(s_hi, s_lo, PROBE_Q_HI, PROBE_Q_LO, target as f64) {
            for q in candidate_qualities(q_star, opts.min_quality) {
                if let Ok(bytes) = encoder::encode(img, q, format) {
                    let len = bytes.len() as u64;
                    let candidate = blob_of(bytes, q, w, h);
                    if len >= band.0 && len <= band.1 {
                        found = Some(candidate.clone());
                        trials.push(candidate);
                        break;
                    }
                    let better = match &found {
                        Some(existing) => len <= target && len > existing.len(),
                        None => len <= target,
                    };
                    if better {
                        found = Some(candidate.clone());
                    }
                    trials.push(candidate);
                }
            }
        }

        let outcome = match found {
            Some(blob) => SearchOutcome::Found(blob),
            None => SearchOutcome::NotFound,
        };

        Some(PredictorPass {
            trials,
            outcome,
            probed_image: None,
            s_hi,
            s_lo,
        })
    }

    /// Estimate a downscale factor from the two no-resize probes, resize
    /// once, then repeat the linear solve at the new size with probes at
    /// q=80/50.
    pub fn downscale_probe(
        img: &DynamicImage,
        format: Format,
        opts: &Options,
        target: u64,
        s_hi: u64,
        s_lo: u64,
    ) -> Option<PredictorPass> {
        let s_75 = {
            let a = (s_hi as f64 - s_lo as f64) / (PROBE_Q_HI as f64 - PROBE_Q_LO as f64);
            if a.abs() > 1e-6 {
                let b = s_lo as f64 - a * PROBE_Q_LO as f64;
                a * DOWNSCALE_PROBE_MID + b
            } else {
                (s_hi as f64 + s_lo as f64) / 2.0
            }
        };
        if s_75 <= 0.0 {
            return None;
        }
        let byte_scale = target as f64 / s_75;
        let dim_scale = byte_scale.sqrt().max(MIN_DIM_SCALE);

        let (w, h) = img.dimensions();
        let longest = w.max(h) as f64;
        let new_longest = ((longest * dim_scale).round() as u32).max(1);
        let resized = resize_to_longest_side(img, new_longest);
        let (rw, rh) = resized.dimensions();

        let hi = encoder::encode(&resized, DOWNSCALE_Q_HI, format).ok()?;
        let lo = encoder::encode(&resized, DOWNSCALE_Q_LO, format).ok()?;
        let rs_hi = hi.len() as u64;
        let rs_lo = lo.len() as u64;

        let mut trials = vec![
            blob_of(hi, DOWNSCALE_Q_HI, rw, rh),
            blob_of(lo, DOWNSCALE_Q_LO, rw, rh),
        ];

        let band = opts.early_stop_band(target);
        let mut found: Option<EncodedBlob> = None;

        if let Some(q_star) =
            fit_and_solve(rs_hi, rs_lo, DOWNSCALE_Q_HI, DOWNSCALE_Q_LO, target as f64)
        {
            for q in candidate_qualities(q_star, opts.min_quality) {
                if let Ok(bytes) = encoder::encode(&resized, q, format) {
                    let len = bytes.len() as u64;
                    let candidate = blob_of(bytes, q, rw, rh);
                    if len >= band.0 && len <= band.1 {
                        found = Some(candidate.clone());
                        trials.push(candidate);
                        break;
                    }
                    let better = match &found {
                        Some(existing) => len <= target && len > existing.len(),
                        None => len <= target,
                    };
                    if better {
                        found = Some(candidate.clone());
                    }
                    trials.push(candidate);
                }
            }
        }

        let outcome = match found {
            Some(blob) => SearchOutcome::Found(blob),
            None => SearchOutcome::NotFound,
        };

        Some(PredictorPass {
            trials,
            outcome,
            probed_image: Some(resized),
            s_hi: rs_hi,
            s_lo: rs_lo,
        })
    }
}

fn fit_and_solve(s_hi: u64, s_lo: u64, q_hi: u8, q_lo: u8, target: f64) -> Option<u8> {
    let a = (s_hi as f64 - s_lo as f64) / (q_hi as f64 - q_lo as f64);
    if a.abs() <= 1e-6 {
        return None;
    }
    let b = s_lo as f64 - a * q_lo as f64;
    let q_star = ((target - b) / a).round();
    Some(q_star.clamp(10.0, 100.0) as u8)
}

fn candidate_qualities(q_star: u8, min_quality: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    for q in [q_star as i32, q_star as i32 + 5, q_star as i32 - 5] {
        let clamped = q.clamp(min_quality as i32, 100);
        if clamped >= min_quality as i32 && !out.contains(&(clamped as u8)) {
            out.push(clamped as u8);
        }
    }
    out
}

fn blob_of(bytes: Vec<u8>, quality: u8, width: u32, height: u32) -> EncodedBlob {
    EncodedBlob {
        bytes,
        quality,
        width,
        height,
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
    fn no_resize_probe_returns_two_base_trials_at_minimum() {
        let img = noise_image(64, 64);
        let opts = Options::default();
        let pass = LinearPredictor::no_resize_probe(&img, Format::Jpeg, &opts, 1_000_000).unwrap();
        assert!(pass.trials.len() >= 2);
    }

    #[test]
    fn downscale_probe_shrinks_for_aggressive_target() {
        let img = noise_image(400, 300);
        let opts = Options::default();
        let first = LinearPredictor::no_resize_probe(&img, Format::Jpeg, &opts, 2_000).unwrap();
        let s_hi = first.trials[0].len();
        let s_lo = first.trials[1].len();
        let pass =
            LinearPredictor::downscale_probe(&img, Format::Jpeg, &opts, 2_000, s_hi, s_lo).unwrap();
        let probed = pass.probed_image.unwrap();
        let (w, h) = probed.dimensions();
        assert!(w.max(h) < 400);
    }

    #[test]
    fn candidate_qualities_respects_min_quality_floor() {
        let qs = candidate_qualities(42, 40);
        assert!(qs.iter().all(|&q| q >= 40));
    }

    #[test]
    fn fit_and_solve_handles_degenerate_slope() {
        assert!(fit_and_solve(1000, 1000, 85, 35, 500.0).is_none());
    }
}
