use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageEncoder};

use crate::error::{Result, SpectrogramError};

/// Every artifact is written at this quality.
pub const JPEG_QUALITY: u8 = 100;

/// Encode a finished raster once. Alpha, if any, is dropped.
pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>> {
    let rgb = match image {
        DynamicImage::ImageRgb8(img) => std::borrow::Cow::Borrowed(img),
        other => std::borrow::Cow::Owned(other.to_rgb8()),
    };

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY);
    encoder
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        .map_err(|e| SpectrogramError::Render(format!("JPEG encoding failed: {}", e)))?;
    Ok(bytes)
}
