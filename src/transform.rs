//! Resize and recompress uploads before they are stored.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use log::debug;

use crate::error::{Error, Result};

pub const DEFAULT_MAX_WIDTH: u32 = 1920;
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Synchronous, CPU-bound image transform. Callers run it on a blocking thread.
pub trait ImageTransform: Send + Sync {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// Downscale to `max_width` (keeping the aspect ratio) and re-encode as JPEG
#[derive(Debug, Clone, Copy)]
pub struct JpegTransform {
    pub max_width: u32,
    pub quality: u8,
}

impl Default for JpegTransform {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ImageTransform for JpegTransform {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>> {
        let img = image::load_from_memory(input)
            .map_err(|e| Error::Validation(format!("unsupported or corrupt image: {}", e)))?;

        let img = if img.width() > self.max_width {
            debug!("Resizing {}x{} image to width {}", img.width(), img.height(), self.max_width);
            img.resize(self.max_width, u32::MAX, FilterType::Lanczos3)
        } else {
            img
        };

        let mut output = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut output, self.quality);
        img.to_rgb8()
            .write_with_encoder(encoder)
            .map_err(|e| Error::Validation(format!("failed to encode image: {}", e)))?;
        Ok(output)
    }
}

/// Stores uploads exactly as received
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransform;

impl ImageTransform for PassthroughTransform {
    fn apply(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 80, 20])));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_wide_image_is_downscaled_to_jpeg() {
        let output = JpegTransform { max_width: 64, quality: 85 }.apply(&png(256, 128)).unwrap();
        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!(decoded.dimensions(), (64, 32));
    }

    #[test]
    fn test_narrow_image_keeps_dimensions() {
        let output = JpegTransform::default().apply(&png(40, 30)).unwrap();
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_non_image_is_a_validation_error() {
        let err = JpegTransform::default().apply(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(PassthroughTransform.apply(b"raw").unwrap(), b"raw".to_vec());
    }
}
