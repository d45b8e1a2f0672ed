//! Image transcoding: fit-within-box resize and JPEG re-encode.
//!
//! Resizing scales to fit inside the target box with the aspect ratio
//! preserved - the longer side is clamped, the shorter side scales in
//! proportion. Never cropped, never upscaled past the source size.

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

use crate::error::UploadError;

/// Quality used when the caller gives none.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Compute the output dimensions for fitting `w`x`h` inside `max_w`x`max_h`.
///
/// The scale factor is the smaller of the two axis ratios, clamped to 1.0 so
/// the image is never upscaled. Degenerate inputs pass through unchanged.
pub fn fit_within(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if w == 0 || h == 0 || max_w == 0 || max_h == 0 {
        return (w, h);
    }
    let scale = f64::min(max_w as f64 / w as f64, max_h as f64 / h as f64).min(1.0);
    let out_w = (w as f64 * scale).round().max(1.0) as u32;
    let out_h = (h as f64 * scale).round().max(1.0) as u32;
    (out_w, out_h)
}

/// Decode, optionally resize, and re-encode an image as JPEG.
///
/// `mime` is only used for error reporting; the decoder sniffs the actual
/// format from the bytes.
pub fn transcode_image(
    bytes: &[u8],
    mime: &str,
    resize_to: Option<(u32, u32)>,
    quality: u8,
) -> Result<Vec<u8>, UploadError> {
    let img = image::load_from_memory(bytes)
        .map_err(|_| UploadError::InvalidFileKind { mime: mime.to_string() })?;

    let (w, h) = (img.width(), img.height());
    let img = match resize_to {
        Some((max_w, max_h)) => {
            let (out_w, out_h) = fit_within(w, h, max_w, max_h);
            if (out_w, out_h) != (w, h) {
                debug!(w, h, out_w, out_h, "resizing image to fit target box");
                img.resize_exact(out_w, out_h, FilterType::Lanczos3)
            } else {
                img
            }
        }
        None => img,
    };

    // JPEG has no alpha channel; flatten before encoding.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|_| UploadError::InvalidFileKind { mime: mime.to_string() })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_of(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 120, 40])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        buf
    }

    #[test]
    fn test_fit_within_clamps_longer_side() {
        assert_eq!(fit_within(800, 600, 400, 400), (400, 300));
        assert_eq!(fit_within(600, 800, 400, 400), (300, 400));
    }

    #[test]
    fn test_fit_within_never_upscales() {
        assert_eq!(fit_within(100, 50, 400, 400), (100, 50));
        assert_eq!(fit_within(400, 400, 400, 400), (400, 400));
    }

    #[test]
    fn test_fit_within_preserves_aspect_within_rounding() {
        let (w, h) = (1280u32, 720u32);
        let (out_w, out_h) = fit_within(w, h, 500, 500);
        assert!(out_w <= 500 && out_h <= 500);
        let src_ratio = w as f64 / h as f64;
        let out_ratio = out_w as f64 / out_h as f64;
        assert!((src_ratio - out_ratio).abs() < 0.01);
    }

    #[test]
    fn test_transcode_resizes_and_emits_jpeg() {
        let png = png_of(800, 600);
        let jpeg = transcode_image(&png, "image/png", Some((400, 400)), 80).unwrap();

        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 300));
    }

    #[test]
    fn test_transcode_without_target_keeps_dimensions() {
        let png = png_of(120, 80);
        let jpeg = transcode_image(&png, "image/png", None, 70).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 80));
    }

    #[test]
    fn test_transcode_small_image_is_not_upscaled() {
        let png = png_of(100, 50);
        let jpeg = transcode_image(&png, "image/png", Some((400, 400)), 80).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[test]
    fn test_undecodable_bytes_are_invalid_kind() {
        let err = transcode_image(b"not an image", "image/png", None, 80).unwrap_err();
        assert!(matches!(err, UploadError::InvalidFileKind { .. }));
    }
}
