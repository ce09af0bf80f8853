//! Utility functions for the pipeline.
//!
//! This module provides logging setup, image decoding and encoding helpers,
//! and the crop transforms used to cut regions and text lines out of a page.

pub mod transform;

pub use transform::{crop_rect, get_rotate_crop_image};

use crate::core::{OCRError, OcrResult, ProcessingStage};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Initializes the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this more
/// than once is harmless.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Returns true when `bytes` start with the PDF magic number.
pub fn is_pdf_bytes(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Converts to RGB, compositing any transparency onto a white background.
pub fn flatten_alpha(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Decodes an encoded raster image.
///
/// Bytes that no image decoder recognizes yield `UnsupportedInput`.
pub fn decode_image(bytes: &[u8]) -> OcrResult<RgbImage> {
    let format = image::guess_format(bytes).map_err(|_| OCRError::UnsupportedInput {
        message: "input is neither a supported image nor a PDF".to_string(),
    })?;
    let image = image::load_from_memory_with_format(bytes, format)?;
    Ok(flatten_alpha(image))
}

/// Encodes an image as PNG.
pub fn encode_png(image: &RgbImage) -> OcrResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| OCRError::processing(ProcessingStage::Encoding, "encode png", e))?;
    Ok(buffer.into_inner())
}

/// Base64 of arbitrary bytes.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Base64-encoded PNG of an image.
pub fn png_base64(image: &RgbImage) -> OcrResult<String> {
    Ok(to_base64(&encode_png(image)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_is_pdf_bytes() {
        assert!(is_pdf_bytes(b"%PDF-1.7\n..."));
        assert!(!is_pdf_bytes(b"\x89PNG\r\n"));
    }

    #[test]
    fn test_flatten_alpha_onto_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let rgb = flatten_alpha(DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_png_round_trip_through_decode() {
        let image = RgbImage::from_pixel(3, 2, Rgb([1, 2, 3]));
        let png = encode_png(&image).unwrap();
        assert_eq!(decode_image(&png).unwrap(), image);
    }

    #[test]
    fn test_decode_garbage_is_unsupported() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, OCRError::UnsupportedInput { .. }));
    }
}
