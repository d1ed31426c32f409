/// Output container format. Quality only has an effect for `Jpeg`/`Webp`;
/// `Png` degrades to the dimension-only path (see `orchestrator`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Jpeg,
    Webp,
    Png,
}

/// Knobs for one compression request. Mirrors the CLI's flat argument
/// surface so the binary can build one of these directly from `clap`.
#[derive(Clone, Debug)]
pub struct Options {
    /// Target size in KB. The working byte budget is `target_size_kb * 1024`,
    /// floored internally at 10 KiB (`safe_target_bytes`).
    pub target_size_kb: u64,
    /// Inclusive upper quality bound for non-fallback passes.
    pub initial_quality: u8,
    /// Inclusive lower quality bound for non-fallback passes.
    pub min_quality: u8,
    pub format: Format,
    /// PNG only: zlib compression effort (0-9, higher shrinks harder but
    /// is slower). No effect on JPEG/WebP, which take `quality` instead.
    pub png_compression_level: u8,
    /// JPEG only: preserve the source's EXIF APP1 segment in the output.
    pub keep_exif: bool,
    pub early_stop_ratio: f64,
    pub near_target_factor: f64,
    pub preferred_min_quality: u8,
    pub max_attempts_per_dim: u32,
    pub max_total_trials: u32,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            target_size_kb: 200,
            initial_quality: 92,
            min_quality: 40,
            format: Format::Jpeg,
            png_compression_level: crate::policy::SearchPolicy::DEFAULT_PNG_COMPRESSION_LEVEL,
            keep_exif: false,
            early_stop_ratio: 0.95,
            near_target_factor: 1.2,
            preferred_min_quality: 80,
            max_attempts_per_dim: 5,
            max_total_trials: 24,
            max_width: None,
            max_height: None,
        }
    }
}

impl Options {
    pub fn target_bytes(&self) -> u64 {
        self.target_size_kb * 1024
    }

    /// `max(target_bytes, 10 KiB)` — the internal working budget.
    pub fn safe_target_bytes(&self) -> u64 {
        self.target_bytes().max(10 * 1024)
    }

    /// `[floor(early_stop_ratio * target), target]`.
    pub fn early_stop_band(&self, target: u64) -> (u64, u64) {
        let low = (self.early_stop_ratio * target as f64).floor() as u64;
        (low, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_target_floors_at_10kib() {
        let opts = Options {
            target_size_kb: 1,
            ..Default::default()
        };
        assert_eq!(opts.safe_target_bytes(), 10 * 1024);
    }

    #[test]
    fn safe_target_passes_through_above_floor() {
        let opts = Options {
            target_size_kb: 100,
            ..Default::default()
        };
        assert_eq!(opts.safe_target_bytes(), 100 * 1024);
    }

    #[test]
    fn early_stop_band_is_inclusive_upper() {
        let opts = Options::default();
        let (low, high) = opts.early_stop_band(100_000);
        assert_eq!(high, 100_000);
        assert_eq!(low, 95_000);
    }
}
