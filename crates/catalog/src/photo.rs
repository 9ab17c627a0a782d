//! Photo encoding for cooking logs.
//!
//! Photos are downscaled so the longer side fits a maximum dimension, then
//! re-encoded as JPEG and wrapped in a `data:` URL that can be used directly
//! as an image source.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType, GenericImageView};
use thiserror::Error;

/// Default and largest bound for the longer side, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 800;

/// Default JPEG quality (1-100).
pub const DEFAULT_QUALITY: u8 = 70;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Errors produced while encoding a photo.
#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("No image data")]
    Empty,

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Turns raw image bytes into an embeddable encoded string.
pub trait PhotoEncoder: Send + Sync {
    fn encode(&self, raw: &[u8]) -> Result<String, PhotoError>;
}

/// Output bounds for [`JpegPhotoEncoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub max_dimension: u32,
    pub quality: u8,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            quality: DEFAULT_QUALITY,
        }
    }
}

/// Encodes photos as bounded-size JPEG data URLs.
#[derive(Debug, Clone, Default)]
pub struct JpegPhotoEncoder {
    settings: EncoderSettings,
}

impl JpegPhotoEncoder {
    /// Settings are clamped: the bound to `1..=DEFAULT_MAX_DIMENSION`, the
    /// quality to `1..=100`.
    pub fn new(settings: EncoderSettings) -> Self {
        Self {
            settings: EncoderSettings {
                max_dimension: settings.max_dimension.clamp(1, DEFAULT_MAX_DIMENSION),
                quality: settings.quality.clamp(1, 100),
            },
        }
    }

    pub fn settings(&self) -> EncoderSettings {
        self.settings
    }
}

impl PhotoEncoder for JpegPhotoEncoder {
    fn encode(&self, raw: &[u8]) -> Result<String, PhotoError> {
        if raw.is_empty() {
            return Err(PhotoError::Empty);
        }

        let img = image::load_from_memory(raw).map_err(PhotoError::Decode)?;
        let (width, height) = img.dimensions();
        let (target_w, target_h) = bounded_dimensions(width, height, self.settings.max_dimension);

        let img = if (target_w, target_h) == (width, height) {
            img
        } else {
            img.resize_exact(target_w, target_h, FilterType::Triangle)
        };
        let rgb = img.to_rgb8();

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.settings.quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(PhotoError::Encode)?;

        tracing::debug!(
            width,
            height,
            target_w,
            target_h,
            bytes = buf.len(),
            "Encoded photo"
        );

        Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(&buf)))
    }
}

/// Scales `(width, height)` down so the longer side is at most `max`,
/// keeping the aspect ratio. Images already within bounds are unchanged.
pub fn bounded_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    let scale = |side: u32, long: u32| -> u32 {
        let scaled = u64::from(side) * u64::from(max) / u64::from(long);
        u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
    };

    if width > height {
        if width > max {
            return (max, scale(height, width));
        }
    } else if height > max {
        return (scale(width, height), max);
    }
    (width, height)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};

    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn decode_data_url(url: &str) -> DynamicImage {
        let payload = url.strip_prefix(DATA_URL_PREFIX).unwrap();
        let bytes = STANDARD.decode(payload).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        image::load_from_memory(&bytes).unwrap()
    }

    #[test]
    fn test_bounded_dimensions() {
        assert_eq!(bounded_dimensions(1600, 400, 800), (800, 200));
        assert_eq!(bounded_dimensions(400, 1600, 800), (200, 800));
        assert_eq!(bounded_dimensions(1000, 1000, 800), (800, 800));
        assert_eq!(bounded_dimensions(640, 480, 800), (640, 480));
        assert_eq!(bounded_dimensions(10_000, 1, 800), (800, 1));
    }

    #[test]
    fn test_wide_image_is_scaled_by_width() {
        let encoded = JpegPhotoEncoder::default().encode(&png(1600, 400)).unwrap();
        assert_eq!(decode_data_url(&encoded).dimensions(), (800, 200));
    }

    #[test]
    fn test_small_image_keeps_size() {
        let encoded = JpegPhotoEncoder::default().encode(&png(120, 90)).unwrap();
        assert_eq!(decode_data_url(&encoded).dimensions(), (120, 90));
    }

    #[test]
    fn test_custom_bound() {
        let encoder = JpegPhotoEncoder::new(EncoderSettings {
            max_dimension: 100,
            quality: 50,
        });
        let encoded = encoder.encode(&png(300, 600)).unwrap();
        assert_eq!(decode_data_url(&encoded).dimensions(), (50, 100));
    }

    #[test]
    fn test_bound_never_exceeds_default() {
        let encoder = JpegPhotoEncoder::new(EncoderSettings {
            max_dimension: 4000,
            quality: 0,
        });
        assert_eq!(
            encoder.settings(),
            EncoderSettings {
                max_dimension: DEFAULT_MAX_DIMENSION,
                quality: 1,
            }
        );

        let encoded = encoder.encode(&png(1200, 900)).unwrap();
        assert_eq!(decode_data_url(&encoded).dimensions(), (800, 600));
    }

    #[test]
    fn test_rejects_garbage() {
        let encoder = JpegPhotoEncoder::default();
        assert!(matches!(encoder.encode(&[]), Err(PhotoError::Empty)));
        assert!(matches!(
            encoder.encode(b"not an image"),
            Err(PhotoError::Decode(_))
        ));
    }
}
