/// Pure data: the dimension ladders the search walks, longest-side caps in
/// pixels, `0` meaning "no resize". Ordering matters — each ladder starts
/// at the largest allowed size and shrinks monotonically.
pub struct SearchPolicy;

impl SearchPolicy {
    pub const PRIMARY_LADDER: &'static [u32] = &[
        0, 3000, 2048, 1600, 1280, 1024, 800, 640, 480, 360, 320, 256, 224, 200, 180, 160, 128,
    ];

    pub const FALLBACK_LADDER: &'static [u32] = &[360, 320, 256, 224, 200, 180, 160, 128];

    pub const ENFORCEMENT_LADDER: &'static [u32] = &[
        640, 480, 360, 320, 256, 224, 200, 180, 160, 128, 112, 96, 80,
    ];

    /// The fallback pass always widens the lower bound down to 10; not
    /// exposed as a configurable knob.
    pub const FALLBACK_MIN_QUALITY: u8 = 10;

    /// The enforcement sweep only ever tries quality 1.
    pub const ENFORCEMENT_QUALITY: u8 = 1;

    pub const FAST_PATH_MAX_ATTEMPTS: u32 = 6;

    /// Default PNG zlib compression effort (0-9) when `Options` doesn't
    /// override it.
    pub const DEFAULT_PNG_COMPRESSION_LEVEL: u8 = 6;
}
