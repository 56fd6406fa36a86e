//! Perceptual post-processing applied to rendered figures.
//!
//! Each adjustment blends the image with a degenerate version of itself:
//! contrast with its mean-luminance grey, saturation with its greyscale,
//! sharpness with a smoothed copy and brightness with black. A factor of 1.0
//! leaves the image unchanged.

use image::{DynamicImage, ImageBuffer, Pixel};
use rayon::prelude::*;

use crate::error::{Result, SpectrogramError};
use crate::spectrum::Mode;

/// 3×3 smoothing kernel used as the sharpness reference, normalised by 13.
const SMOOTH_KERNEL: [[u32; 3]; 3] = [[1, 1, 1], [1, 5, 1], [1, 1, 1]];
const SMOOTH_SCALE: u32 = 13;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnsharpMask {
    pub radius: f32,
    pub percent: f32,
    pub threshold: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnhanceSettings {
    pub contrast: f32,
    pub saturation: f32,
    pub sharpness: f32,
    pub unsharp: Option<UnsharpMask>,
    pub brightness: Option<f32>,
}

impl EnhanceSettings {
    /// Adjustments for `mode`; `None` for classic, which is left untouched.
    pub fn for_mode(mode: Mode) -> Option<Self> {
        match mode {
            Mode::Classic => None,
            Mode::Sharp => Some(Self {
                contrast: 1.3,
                saturation: 1.2,
                sharpness: 1.5,
                unsharp: Some(UnsharpMask {
                    radius: 1.2,
                    percent: 130.0,
                    threshold: 3,
                }),
                brightness: None,
            }),
            Mode::Sharper => Some(Self {
                contrast: 1.6,
                saturation: 1.5,
                sharpness: 2.0,
                unsharp: Some(UnsharpMask {
                    radius: 1.8,
                    percent: 180.0,
                    threshold: 2,
                }),
                brightness: Some(1.1),
            }),
        }
    }
}

/// Apply the adjustments of `mode`. Failures are logged and the input is
/// returned as it was.
pub fn enhance(image: DynamicImage, mode: Mode) -> DynamicImage {
    let Some(settings) = EnhanceSettings::for_mode(mode) else {
        return image;
    };
    match apply(&image, &settings) {
        Ok(enhanced) => enhanced,
        Err(e) => {
            log::warn!("{}; using unenhanced image", e);
            image
        }
    }
}

/// Contrast, saturation, sharpness (then unsharp mask), brightness, in that
/// order. Only 8-bit RGB and RGBA images are supported; alpha is preserved.
pub fn apply(image: &DynamicImage, settings: &EnhanceSettings) -> Result<DynamicImage> {
    match image {
        DynamicImage::ImageRgb8(img) => Ok(DynamicImage::ImageRgb8(apply_buffer(img, settings))),
        DynamicImage::ImageRgba8(img) => Ok(DynamicImage::ImageRgba8(apply_buffer(img, settings))),
        other => Err(SpectrogramError::Enhancement(format!(
            "unsupported pixel format {:?}",
            other.color()
        ))),
    }
}

fn apply_buffer<P>(img: &ImageBuffer<P, Vec<u8>>, settings: &EnhanceSettings) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync + 'static,
{
    let channels = P::CHANNEL_COUNT as usize;
    let (width, height) = img.dimensions();
    let mut out = img.clone();

    contrast(&mut out, channels, settings.contrast);
    saturation(&mut out, channels, settings.saturation);
    sharpness(&mut out, width as usize, height as usize, channels, settings.sharpness);
    if let Some(mask) = settings.unsharp {
        let blurred = image::imageops::blur(&out, mask.radius);
        unsharp(&mut out, &blurred, channels, mask);
    }
    if let Some(factor) = settings.brightness {
        brightness(&mut out, channels, factor);
    }
    out
}

fn luma(px: &[u8]) -> u32 {
    (px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000
}

/// `degenerate + (value - degenerate) * factor`, rounded and clipped.
fn mix(degenerate: f32, value: u8, factor: f32) -> u8 {
    (degenerate + (value as f32 - degenerate) * factor)
        .round()
        .clamp(0.0, 255.0) as u8
}

fn contrast(buf: &mut [u8], channels: usize, factor: f32) {
    let count = buf.len() / channels;
    if count == 0 {
        return;
    }
    let total: u64 = buf.chunks_exact(channels).map(|px| luma(px) as u64).sum();
    let mean = (total as f64 / count as f64 + 0.5).floor() as f32;
    buf.par_chunks_exact_mut(channels).for_each(|px| {
        for c in px.iter_mut().take(3) {
            *c = mix(mean, *c, factor);
        }
    });
}

fn saturation(buf: &mut [u8], channels: usize, factor: f32) {
    buf.par_chunks_exact_mut(channels).for_each(|px| {
        let grey = luma(px) as f32;
        for c in px.iter_mut().take(3) {
            *c = mix(grey, *c, factor);
        }
    });
}

fn sharpness(buf: &mut [u8], width: usize, height: usize, channels: usize, factor: f32) {
    if width < 3 || height < 3 {
        return;
    }
    let src = buf.to_vec();
    let stride = width * channels;
    buf.par_chunks_exact_mut(stride)
        .enumerate()
        .filter(|(y, _)| *y > 0 && *y < height - 1)
        .for_each(|(y, row)| {
            for x in 1..width - 1 {
                for c in 0..3 {
                    let mut sum = 0u32;
                    for (ky, kernel_row) in SMOOTH_KERNEL.iter().enumerate() {
                        let line = (y + ky - 1) * stride;
                        for (kx, &k) in kernel_row.iter().enumerate() {
                            sum += k * src[line + (x + kx - 1) * channels + c] as u32;
                        }
                    }
                    let smooth = (sum as f32 / SMOOTH_SCALE as f32).round();
                    let idx = x * channels + c;
                    row[idx] = mix(smooth, src[y * stride + idx], factor);
                }
            }
        });
}

fn unsharp(buf: &mut [u8], blurred: &[u8], channels: usize, mask: UnsharpMask) {
    let amount = mask.percent / 100.0;
    buf.par_chunks_exact_mut(channels)
        .zip(blurred.par_chunks_exact(channels))
        .for_each(|(px, soft)| {
            for c in 0..3 {
                let diff = px[c] as f32 - soft[c] as f32;
                if diff.abs() > mask.threshold as f32 {
                    px[c] = (px[c] as f32 + diff * amount).round().clamp(0.0, 255.0) as u8;
                }
            }
        });
}

fn brightness(buf: &mut [u8], channels: usize, factor: f32) {
    buf.par_chunks_exact_mut(channels).for_each(|px| {
        for c in px.iter_mut().take(3) {
            *c = mix(0.0, *c, factor);
        }
    });
}
