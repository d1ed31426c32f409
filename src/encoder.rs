use crate::error::EncoderUnavailable;
use crate::options::Format;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageEncoder};
use std::io::Cursor;

/// One encoded candidate produced by a single trial.
#[derive(Clone, Debug)]
pub struct EncodedBlob {
    pub bytes: Vec<u8>,
    pub quality: u8,
    pub width: u32,
    pub height: u32,
}

impl EncodedBlob {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Decode source bytes into an in-memory image. Pure, no I/O beyond the
/// bytes already in hand.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, EncoderUnavailable> {
    image::load_from_memory(bytes).map_err(EncoderUnavailable::Decode)
}

/// Re-encode an image at the given quality (ignored for PNG, which instead
/// treats `quality` as a compression level 0-9) and format.
///
/// Deterministic for a fixed `(image, quality, format)` triple; size may be
/// non-monotonic in quality for pathological inputs, which is why every
/// search here treats the oracle as heuristic rather than authoritative.
pub fn encode(img: &DynamicImage, quality: u8, format: Format) -> Result<Vec<u8>, EncoderUnavailable> {
    let mut buf = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buf);
        match format {
            Format::Jpeg => {
                let rgb = img.to_rgb8();
                let (w, h) = rgb.dimensions();
                let enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
                enc.write_image(rgb.as_raw(), w, h, image::ExtendedColorType::Rgb8)
                    .map_err(EncoderUnavailable::Encode)?;
            }
            Format::Webp => {
                if img.color().has_alpha() {
                    let rgba = img.to_rgba8();
                    let (w, h) = rgba.dimensions();
                    let encoder = webp::Encoder::from_rgba(&rgba, w, h);
                    buf = encoder.encode(quality as f32).to_vec();
                } else {
                    let rgb = img.to_rgb8();
                    let (w, h) = rgb.dimensions();
                    let encoder = webp::Encoder::from_rgb(&rgb, w, h);
                    buf = encoder.encode(quality as f32).to_vec();
                }
            }
            Format::Png => {
                use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
                let level = quality.min(9);
                if img.color().has_alpha() {
                    let rgba = img.to_rgba8();
                    let (w, h) = rgba.dimensions();
                    let enc = PngEncoder::new_with_quality(
                        &mut cursor,
                        CompressionType::Level(level),
                        PngFilterType::Adaptive,
                    );
                    enc.write_image(rgba.as_raw(), w, h, image::ExtendedColorType::Rgba8)
                        .map_err(EncoderUnavailable::Encode)?;
                } else {
                    let rgb = img.to_rgb8();
                    let (w, h) = rgb.dimensions();
                    let enc = PngEncoder::new_with_quality(
                        &mut cursor,
                        CompressionType::Level(level),
                        PngFilterType::Adaptive,
                    );
                    enc.write_image(rgb.as_raw(), w, h, image::ExtendedColorType::Rgb8)
                        .map_err(EncoderUnavailable::Encode)?;
                }
            }
        }
    }
    Ok(buf)
}

/// Re-encode, then (JPEG only, when requested) splice the source's EXIF
/// APP1 segment back into the output. The `image` crate's JPEG encoder
/// writes pixels only, so this is the only way to honor `keep_exif`
/// without a platform codec.
pub fn encode_with_exif(
    img: &DynamicImage,
    quality: u8,
    format: Format,
    keep_exif: bool,
    source_bytes: Option<&[u8]>,
) -> Result<Vec<u8>, EncoderUnavailable> {
    let bytes = encode(img, quality, format)?;
    if format == Format::Jpeg && keep_exif {
        if let Some(src) = source_bytes {
            if let Some(exif) = extract_exif_segment(src) {
                return Ok(splice_exif_segment(&bytes, &exif));
            }
        }
    }
    Ok(bytes)
}

/// Scan a JPEG byte stream for its first APP1 (0xFFE1) marker segment and
/// return it verbatim (marker + length + payload), or `None` if absent or
/// the stream isn't well-formed enough to walk.
fn extract_exif_segment(jpeg: &[u8]) -> Option<Vec<u8>> {
    if jpeg.len() < 4 || jpeg[0] != 0xFF || jpeg[1] != 0xD8 {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= jpeg.len() {
        if jpeg[pos] != 0xFF {
            return None;
        }
        let marker = jpeg[pos + 1];
        // SOS (start of scan) ends the header region; no APP1 found before it.
        if marker == 0xDA {
            return None;
        }
        let seg_len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        if seg_len < 2 || pos + 2 + seg_len > jpeg.len() {
            return None;
        }
        if marker == 0xE1 {
            return Some(jpeg[pos..pos + 2 + seg_len].to_vec());
        }
        pos += 2 + seg_len;
    }
    None
}

/// Insert an APP1 segment right after the SOI marker of a freshly encoded
/// JPEG, ahead of any segments the encoder itself wrote.
fn splice_exif_segment(jpeg: &[u8], exif_segment: &[u8]) -> Vec<u8> {
    if jpeg.len() < 2 {
        return jpeg.to_vec();
    }
    let mut out = Vec::with_capacity(jpeg.len() + exif_segment.len());
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(exif_segment);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Scale so the image's longer side equals `max_dim`. `max_dim == 0` is
/// "no resize"; a scale factor >= 1.0 leaves the image unchanged (never
/// upscale).
pub fn resize_to_longest_side(img: &DynamicImage, max_dim: u32) -> DynamicImage {
    if max_dim == 0 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    if longest <= max_dim {
        return img.clone();
    }
    let scale = max_dim as f64 / longest as f64;
    let new_w = ((w as f64 * scale).round() as u32).max(1);
    let new_h = ((h as f64 * scale).round() as u32).max(1);
    img.resize(new_w, new_h, FilterType::Lanczos3)
}
