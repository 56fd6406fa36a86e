use anyhow::{Context, Result};
use fontdue::{Font, FontSettings};
use image::RgbImage;
use std::path::Path;

/// Places fonts are commonly installed, tried in order when nothing is
/// configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Coverage mask for one line of text, `width × height`, one byte per pixel.
struct GlyphMask {
    width: usize,
    height: usize,
    alpha: Vec<u8>,
}

pub struct TextOverlay {
    font: Font,
}

impl TextOverlay {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font: {}", e))?;
        Ok(Self { font })
    }

    /// Resolve a font from an explicit path, then a URL, then the usual
    /// system locations. Returns `None` when none of them yields a font.
    pub fn resolve(path: Option<&Path>, url: Option<&str>) -> Option<Self> {
        if let Some(path) = path {
            match std::fs::read(path)
                .with_context(|| format!("Failed to read font {}", path.display()))
                .and_then(|bytes| Self::from_bytes(&bytes))
            {
                Ok(overlay) => return Some(overlay),
                Err(e) => log::warn!("{:#}", e),
            }
        }

        if let Some(url) = url {
            match load_font_from_url(url).and_then(|bytes| Self::from_bytes(&bytes)) {
                Ok(overlay) => {
                    log::info!("Loaded font from {}", url);
                    return Some(overlay);
                }
                Err(e) => log::warn!("Failed to load font from URL: {:#}", e),
            }
        }

        for candidate in SYSTEM_FONTS {
            let Ok(bytes) = std::fs::read(candidate) else {
                continue;
            };
            if let Ok(overlay) = Self::from_bytes(&bytes) {
                log::debug!("Using system font {}", candidate);
                return Some(overlay);
            }
        }

        log::warn!("No usable font found; figures will be rendered without text");
        None
    }

    /// Width and height of `text` at `size` pixels.
    pub fn measure(&self, text: &str, size: f32) -> (u32, u32) {
        let width: f32 = text
            .chars()
            .map(|ch| self.font.metrics(ch, size).advance_width)
            .sum();
        (width.ceil() as u32, self.line_height(size))
    }

    pub fn line_height(&self, size: f32) -> u32 {
        self.font
            .horizontal_line_metrics(size)
            .map(|m| (m.ascent - m.descent).ceil() as u32)
            .unwrap_or(size.ceil() as u32)
    }

    /// Draw `text` horizontally with its top-left corner at `(x, y)`.
    pub fn draw(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32, size: f32, color: [u8; 3]) {
        let mask = self.rasterize(text, size);
        for my in 0..mask.height {
            for mx in 0..mask.width {
                let a = mask.alpha[my * mask.width + mx];
                blend(canvas, x + mx as i32, y + my as i32, color, a);
            }
        }
    }

    /// Draw `text` rotated a quarter turn counter-clockwise, reading bottom to
    /// top, with the top-left corner of its bounding box at `(x, y)`.
    pub fn draw_vertical(
        &self,
        canvas: &mut RgbImage,
        text: &str,
        x: i32,
        y: i32,
        size: f32,
        color: [u8; 3],
    ) {
        let mask = self.rasterize(text, size);
        for my in 0..mask.height {
            for mx in 0..mask.width {
                let a = mask.alpha[my * mask.width + mx];
                let px = x + my as i32;
                let py = y + (mask.width - 1 - mx) as i32;
                blend(canvas, px, py, color, a);
            }
        }
    }

    fn rasterize(&self, text: &str, size: f32) -> GlyphMask {
        let (width, height) = self.measure(text, size);
        let (width, height) = (width.max(1) as usize, height.max(1) as usize);
        let ascent = self
            .font
            .horizontal_line_metrics(size)
            .map(|m| m.ascent)
            .unwrap_or(size);

        let mut alpha = vec![0u8; width * height];
        let mut cursor_x = 0.0f32;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, size);
            let glyph_x = cursor_x.round() as i32 + metrics.xmin;
            let glyph_y = ascent.round() as i32 - metrics.height as i32 - metrics.ymin;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage == 0 {
                        continue;
                    }
                    let px = glyph_x + gx as i32;
                    let py = glyph_y + gy as i32;
                    if px < 0 || py < 0 || px as usize >= width || py as usize >= height {
                        continue;
                    }
                    let idx = py as usize * width + px as usize;
                    alpha[idx] = alpha[idx].max(coverage);
                }
            }

            cursor_x += metrics.advance_width;
        }

        GlyphMask {
            width,
            height,
            alpha,
        }
    }
}

fn blend(canvas: &mut RgbImage, x: i32, y: i32, color: [u8; 3], alpha: u8) {
    if alpha == 0 || x < 0 || y < 0 || x as u32 >= canvas.width() || y as u32 >= canvas.height() {
        return;
    }
    let a = alpha as f32 / 255.0;
    let inv_a = 1.0 - a;
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    for c in 0..3 {
        pixel.0[c] = (color[c] as f32 * a + pixel.0[c] as f32 * inv_a).round() as u8;
    }
}

/// Download a font file.
pub fn load_font_from_url(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::blocking::Client::new()
        .get(url)
        .send()
        .with_context(|| format!("Failed to fetch font from {}", url))?
        .error_for_status()?;
    let bytes = response.bytes().context("Failed to read font response")?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(TextOverlay::from_bytes(b"definitely not a font").is_err());
    }

    #[test]
    fn missing_font_path_falls_through() {
        // Whatever the system offers, a missing explicit path must not panic.
        let _ = TextOverlay::resolve(Some(Path::new("/nonexistent/font.ttf")), None);
    }

    #[test]
    fn vertical_text_occupies_transposed_box() {
        let Some(overlay) = TextOverlay::resolve(None, None) else {
            return;
        };
        let (w, h) = overlay.measure("Hz", 20.0);
        let mut canvas = RgbImage::new(200, 200);
        overlay.draw_vertical(&mut canvas, "Hz", 10, 10, 20.0, [255, 255, 255]);
        let lit: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!lit.is_empty());
        assert!(lit.iter().all(|&(x, y)| x >= 10 && x < 10 + h && y >= 10 && y < 10 + w));
    }
}
