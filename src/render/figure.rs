use image::{Rgb, RgbImage};
use rayon::prelude::*;

use super::palette::Palette;
use super::text::TextOverlay;
use crate::error::{Result, SpectrogramError};
use crate::spectrum::axis::nice_ticks;
use crate::spectrum::mel::band_centers;
use crate::spectrum::{DisplayBounds, DynamicRange, Scale, SpectrogramMatrix};

pub const BACKGROUND: [u8; 3] = [0x0d, 0x02, 0x21];
pub const SPINE: [u8; 3] = [0x41, 0x5a, 0x77];
pub const TEXT: [u8; 3] = [0xff, 0xff, 0xff];

pub const TITLE: &str = "Audio Spectrogram";
pub const TIME_LABEL: &str = "Time (s)";
pub const COLORBAR_LABEL: &str = "Intensity (dB)";

const FIGURE_WIDTH_IN: f32 = 22.8;
const FIGURE_HEIGHT_IN: f32 = 12.8;
const FINAL_DPI: f32 = 168.0;
const PREVIEW_WIDTH_PX: u32 = 320;
const PREVIEW_DPI: f32 = 160.0;
const PREVIEW_FONT_SCALE: f32 = 0.5;

// Base font sizes in points, with the smallest size each may shrink to.
const LABEL_PT: (f32, f32) = (12.0, 5.0);
const TITLE_PT: (f32, f32) = (14.0, 6.0);
const TICK_PT: (f32, f32) = (10.0, 5.0);
const COLORBAR_TICK_PT: (f32, f32) = (9.0, 5.0);
const COLORBAR_LABEL_PT: (f32, f32) = (10.0, 5.0);

const TICK_LENGTH_PT: f32 = 3.5;
const TICK_PAD_PT: f32 = 3.5;
const LABEL_PAD_PT: f32 = 4.0;
const TITLE_PAD_PT: f32 = 6.0;
const EDGE_PAD_PT: f32 = 6.0;
const SPINE_WIDTH_PT: f32 = 0.8;

/// Output resolution and text scaling for one kind of render.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderProfile {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub dpi: f32,
    pub font_scale: f32,
}

impl RenderProfile {
    /// Full-size figure: 22.8 × 12.8 in at 168 dpi.
    pub fn final_render() -> Self {
        Self {
            name: "final",
            width: (FIGURE_WIDTH_IN * FINAL_DPI).round() as u32,
            height: (FIGURE_HEIGHT_IN * FINAL_DPI).round() as u32,
            dpi: FINAL_DPI,
            font_scale: 1.0,
        }
    }

    /// Small figure with the same aspect ratio and half-size text.
    pub fn preview() -> Self {
        let height = (PREVIEW_WIDTH_PX as f32 * FIGURE_HEIGHT_IN / FIGURE_WIDTH_IN).round() as u32;
        Self {
            name: "preview",
            width: PREVIEW_WIDTH_PX,
            height,
            dpi: PREVIEW_DPI,
            font_scale: PREVIEW_FONT_SCALE,
        }
    }

    fn points(&self, pt: f32) -> f32 {
        pt * self.dpi / 72.0
    }

    fn font_px(&self, (base, min): (f32, f32)) -> f32 {
        self.points((base * self.font_scale).max(min))
    }

    fn spacing_px(&self, pt: f32) -> i32 {
        (self.points(pt) * self.font_scale).round().max(1.0) as i32
    }
}

/// Everything the renderer needs to draw one spectrogram.
pub struct FigureSpec<'a> {
    pub matrix: &'a SpectrogramMatrix,
    pub sample_rate: u32,
    pub hop_length: usize,
    pub scale: Scale,
    pub bounds: DisplayBounds,
    pub range: DynamicRange,
    pub palette: &'a Palette,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Shading {
    Nearest,
    Bilinear,
}

/// Position of a coordinate between two data samples.
#[derive(Clone, Copy, Debug)]
struct Sample {
    lo: usize,
    hi: usize,
    frac: f32,
}

#[derive(Clone, Copy, Debug)]
struct Rect {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
}

impl Rect {
    fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    fn height(&self) -> i32 {
        self.y1 - self.y0
    }
}

struct FontSizes {
    title: f32,
    label: f32,
    ticks: f32,
    colorbar_ticks: f32,
    colorbar_label: f32,
}

struct Tick {
    pos: i32,
    label: String,
}

/// Draws spectrogram figures in the fixed dark theme.
pub struct Renderer {
    text: Option<TextOverlay>,
}

impl Renderer {
    pub fn new(text: Option<TextOverlay>) -> Self {
        Self { text }
    }

    pub fn without_text() -> Self {
        Self { text: None }
    }

    pub fn render(&self, spec: &FigureSpec, profile: &RenderProfile) -> Result<RgbImage> {
        let matrix = spec.matrix;
        if matrix.frequency_bins() == 0 || matrix.time_frames() == 0 {
            return Err(SpectrogramError::Render("spectrogram matrix is empty".into()));
        }
        if spec.sample_rate == 0 || spec.hop_length == 0 {
            return Err(SpectrogramError::Render(format!(
                "invalid timing: sample_rate={}, hop={}",
                spec.sample_rate, spec.hop_length
            )));
        }
        if profile.width == 0 || profile.height == 0 {
            return Err(SpectrogramError::Render(format!(
                "profile '{}' has no pixels",
                profile.name
            )));
        }

        let fonts = FontSizes {
            title: profile.font_px(TITLE_PT),
            label: profile.font_px(LABEL_PT),
            ticks: profile.font_px(TICK_PT),
            colorbar_ticks: profile.font_px(COLORBAR_TICK_PT),
            colorbar_label: profile.font_px(COLORBAR_LABEL_PT),
        };
        let tick_len = profile.spacing_px(TICK_LENGTH_PT);
        let tick_pad = profile.spacing_px(TICK_PAD_PT);
        let label_pad = profile.spacing_px(LABEL_PAD_PT);
        let title_pad = profile.spacing_px(TITLE_PAD_PT);
        let edge_pad = profile.spacing_px(EDGE_PAD_PT);
        let spine = profile.points(SPINE_WIDTH_PT).round().max(1.0) as i32;

        let duration = (matrix.time_frames() * spec.hop_length) as f32 / spec.sample_rate as f32;
        let freq_ticks = spec.bounds.ticks(spec.scale);
        let time_ticks = time_tick_values(duration);
        let db_ticks = colorbar_tick_values(spec.range);

        let freq_labels: Vec<String> = freq_ticks.iter().map(|&hz| format_hz(hz)).collect();
        let time_step = time_ticks.get(1).map(|t| t - time_ticks[0]).unwrap_or(1.0);
        let time_labels: Vec<String> =
            time_ticks.iter().map(|&t| format_seconds(t, time_step)).collect();
        let db_labels: Vec<String> = db_ticks.iter().map(|&db| format_db(db)).collect();

        let widest = |labels: &[String], size: f32| {
            labels
                .iter()
                .map(|l| self.text_size(l, size).0 as i32)
                .max()
                .unwrap_or(0)
        };
        let title_h = self.text_size(TITLE, fonts.title).1 as i32;
        let xlabel_h = self.text_size(TIME_LABEL, fonts.label).1 as i32;
        let ylabel_h = self.text_size(spec.scale.axis_label(), fonts.label).1 as i32;
        let xtick_h = self.text_size("0", fonts.ticks).1 as i32;
        let cbar_label_h = self.text_size(COLORBAR_LABEL, fonts.colorbar_label).1 as i32;

        let width = profile.width as i32;
        let height = profile.height as i32;

        let top = edge_pad + title_h + title_pad;
        let bottom = tick_len + tick_pad + xtick_h + label_pad + xlabel_h + edge_pad;
        let plot_h = height - top - bottom;
        let cbar_w = (plot_h / 20).max(2);
        let cbar_gap = (width / 60).max(2);

        let left = edge_pad + ylabel_h + label_pad + widest(&freq_labels, fonts.ticks) + tick_pad + tick_len;
        let right = cbar_gap
            + cbar_w
            + tick_len
            + tick_pad
            + widest(&db_labels, fonts.colorbar_ticks)
            + label_pad
            + cbar_label_h
            + edge_pad;
        let plot_w = width - left - right;

        if plot_w < 2 || plot_h < 2 {
            return Err(SpectrogramError::Render(format!(
                "{}x{} figure leaves no room for the plot",
                profile.width, profile.height
            )));
        }

        let plot = Rect {
            x0: left,
            y0: top,
            x1: left + plot_w,
            y1: top + plot_h,
        };
        let cbar = Rect {
            x0: plot.x1 + cbar_gap,
            y0: plot.y0,
            x1: plot.x1 + cbar_gap + cbar_w,
            y1: plot.y1,
        };

        let mut canvas = RgbImage::from_pixel(profile.width, profile.height, Rgb(BACKGROUND));

        self.raster(&mut canvas, spec, plot, duration);
        draw_colorbar(&mut canvas, spec, cbar);

        outline(&mut canvas, plot, spine, SPINE);
        outline(&mut canvas, cbar, spine, SPINE);

        // Tick positions
        let transform = spec.scale.axis_transform();
        let (lo, hi) = (
            transform.forward(spec.bounds.min),
            transform.forward(spec.bounds.max),
        );
        let freq_ticks: Vec<Tick> = freq_ticks
            .iter()
            .zip(freq_labels)
            .map(|(&hz, label)| Tick {
                pos: to_row(plot, (transform.forward(hz) - lo) / (hi - lo)),
                label,
            })
            .collect();
        let time_ticks: Vec<Tick> = time_ticks
            .iter()
            .zip(time_labels)
            .map(|(&t, label)| Tick {
                pos: to_column(plot, if duration > 0.0 { t / duration } else { 0.0 }),
                label,
            })
            .collect();
        let span = spec.range.vmax - spec.range.vmin;
        let db_ticks: Vec<Tick> = db_ticks
            .iter()
            .zip(db_labels)
            .map(|(&db, label)| Tick {
                pos: to_row(cbar, if span > 0.0 { (db - spec.range.vmin) / span } else { 0.0 }),
                label,
            })
            .collect();

        for tick in &freq_ticks {
            fill(&mut canvas, Rect { x0: plot.x0 - tick_len, y0: tick.pos, x1: plot.x0, y1: tick.pos + spine }, TEXT);
        }
        for tick in &time_ticks {
            fill(&mut canvas, Rect { x0: tick.pos, y0: plot.y1, x1: tick.pos + spine, y1: plot.y1 + tick_len }, TEXT);
        }
        for tick in &db_ticks {
            fill(&mut canvas, Rect { x0: cbar.x1, y0: tick.pos, x1: cbar.x1 + tick_len, y1: tick.pos + spine }, TEXT);
        }

        let Some(text) = &self.text else {
            return Ok(canvas);
        };

        // Title and axis labels
        let (w, _) = text.measure(TITLE, fonts.title);
        text.draw(&mut canvas, TITLE, plot.x0 + (plot_w - w as i32) / 2, edge_pad, fonts.title, TEXT);

        let label_y = plot.y1 + tick_len + tick_pad + xtick_h + label_pad;
        let (w, _) = text.measure(TIME_LABEL, fonts.label);
        text.draw(&mut canvas, TIME_LABEL, plot.x0 + (plot_w - w as i32) / 2, label_y, fonts.label, TEXT);

        let ylabel = spec.scale.axis_label();
        let (w, _) = text.measure(ylabel, fonts.label);
        text.draw_vertical(&mut canvas, ylabel, edge_pad, plot.y0 + (plot_h - w as i32) / 2, fonts.label, TEXT);

        let (w, _) = text.measure(COLORBAR_LABEL, fonts.colorbar_label);
        text.draw_vertical(
            &mut canvas,
            COLORBAR_LABEL,
            width - edge_pad - cbar_label_h,
            cbar.y0 + (cbar.height() - w as i32) / 2,
            fonts.colorbar_label,
            TEXT,
        );

        // Tick labels
        for tick in &freq_ticks {
            let (w, h) = text.measure(&tick.label, fonts.ticks);
            let x = plot.x0 - tick_len - tick_pad - w as i32;
            text.draw(&mut canvas, &tick.label, x, tick.pos - h as i32 / 2, fonts.ticks, TEXT);
        }
        for tick in &time_ticks {
            let (w, _) = text.measure(&tick.label, fonts.ticks);
            let y = plot.y1 + tick_len + tick_pad;
            text.draw(&mut canvas, &tick.label, tick.pos - w as i32 / 2, y, fonts.ticks, TEXT);
        }
        for tick in &db_ticks {
            let (_, h) = text.measure(&tick.label, fonts.colorbar_ticks);
            let x = cbar.x1 + tick_len + tick_pad;
            text.draw(&mut canvas, &tick.label, x, tick.pos - h as i32 / 2, fonts.colorbar_ticks, TEXT);
        }

        Ok(canvas)
    }

    fn text_size(&self, text: &str, size: f32) -> (u32, u32) {
        match &self.text {
            Some(overlay) => overlay.measure(text, size),
            None => (
                (text.chars().count() as f32 * size * 0.6).ceil() as u32,
                (size * 1.2).ceil() as u32,
            ),
        }
    }

    /// Colour-map the matrix into the plot area, one row of pixels per task.
    fn raster(&self, canvas: &mut RgbImage, spec: &FigureSpec, plot: Rect, duration: f32) {
        let matrix = spec.matrix;
        let shading = match spec.scale {
            Scale::Mel => Shading::Bilinear,
            Scale::Linear | Scale::Log => Shading::Nearest,
        };

        let transform = spec.scale.axis_transform();
        let lo = transform.forward(spec.bounds.min);
        let hi = transform.forward(spec.bounds.max);
        let freqs = row_frequencies(spec);
        let rows: Vec<Sample> = (0..plot.height())
            .map(|y| {
                let u = (plot.height() - y) as f32 - 0.5;
                let coord = lo + (hi - lo) * u / plot.height() as f32;
                locate(&freqs, transform.inverse(coord), shading)
            })
            .collect();

        let frame_secs = spec.hop_length as f32 / spec.sample_rate as f32;
        let centers: Vec<f32> = (0..matrix.time_frames())
            .map(|f| (f as f32 + 0.5) * frame_secs)
            .collect();
        let columns: Vec<Sample> = (0..plot.width())
            .map(|x| {
                let t = (x as f32 + 0.5) / plot.width() as f32 * duration;
                locate(&centers, t, shading)
            })
            .collect();

        let range = spec.range;
        let span = range.vmax - range.vmin;
        let stride = canvas.width() as usize * 3;
        let x0 = plot.x0 as usize * 3;
        let buf: &mut [u8] = canvas;

        buf.par_chunks_mut(stride)
            .skip(plot.y0 as usize)
            .take(plot.height() as usize)
            .zip(rows.par_iter())
            .for_each(|(line, row)| {
                let pixels = &mut line[x0..x0 + columns.len() * 3];
                for (px, col) in pixels.chunks_exact_mut(3).zip(columns.iter()) {
                    let top = lerp(matrix.get(row.hi, col.lo), matrix.get(row.hi, col.hi), col.frac);
                    let bottom = lerp(matrix.get(row.lo, col.lo), matrix.get(row.lo, col.hi), col.frac);
                    let value = lerp(bottom, top, row.frac);
                    let t = if span > 0.0 { (value - range.vmin) / span } else { 0.0 };
                    px.copy_from_slice(&spec.palette.color(t));
                }
            });
    }
}

/// Centre frequency of every matrix row, ascending.
fn row_frequencies(spec: &FigureSpec) -> Vec<f32> {
    let bins = spec.matrix.frequency_bins();
    match spec.scale {
        Scale::Mel => band_centers(bins, spec.bounds.min, spec.bounds.data_fmax),
        Scale::Linear | Scale::Log => {
            let n_fft = (2 * bins.saturating_sub(1)).max(1);
            let hz_per_bin = spec.sample_rate as f32 / n_fft as f32;
            (0..bins).map(|k| k as f32 * hz_per_bin).collect()
        }
    }
}

/// Where `x` falls among ascending `coords`. Outside the covered range the
/// edge sample is held.
fn locate(coords: &[f32], x: f32, shading: Shading) -> Sample {
    let p = coords.partition_point(|&c| c <= x);
    if p == 0 {
        return Sample { lo: 0, hi: 0, frac: 0.0 };
    }
    if p >= coords.len() {
        let last = coords.len() - 1;
        return Sample { lo: last, hi: last, frac: 0.0 };
    }
    let (lo, hi) = (p - 1, p);
    let gap = coords[hi] - coords[lo];
    let frac = if gap > 0.0 { (x - coords[lo]) / gap } else { 0.0 };
    match shading {
        Shading::Bilinear => Sample { lo, hi, frac },
        Shading::Nearest => {
            let pick = if frac < 0.5 { lo } else { hi };
            Sample { lo: pick, hi: pick, frac: 0.0 }
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    if t == 0.0 {
        a
    } else {
        a + (b - a) * t
    }
}

fn draw_colorbar(canvas: &mut RgbImage, spec: &FigureSpec, cbar: Rect) {
    let range = spec.range;
    let span = range.vmax - range.vmin;
    for y in cbar.y0..cbar.y1 {
        let u = (cbar.y1 - y) as f32 - 0.5;
        let t = if span > 0.0 { u / cbar.height() as f32 } else { 0.0 };
        fill(canvas, Rect { x0: cbar.x0, y0: y, x1: cbar.x1, y1: y + 1 }, spec.palette.color(t));
    }
}

fn fill(canvas: &mut RgbImage, rect: Rect, color: [u8; 3]) {
    let x0 = rect.x0.max(0) as u32;
    let y0 = rect.y0.max(0) as u32;
    let x1 = (rect.x1.max(0) as u32).min(canvas.width());
    let y1 = (rect.y1.max(0) as u32).min(canvas.height());
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, Rgb(color));
        }
    }
}

/// Frame drawn just outside `rect`, `width` pixels thick.
fn outline(canvas: &mut RgbImage, rect: Rect, width: i32, color: [u8; 3]) {
    let outer = Rect {
        x0: rect.x0 - width,
        y0: rect.y0 - width,
        x1: rect.x1 + width,
        y1: rect.y1 + width,
    };
    fill(canvas, Rect { y1: rect.y0, ..outer }, color);
    fill(canvas, Rect { y0: rect.y1, ..outer }, color);
    fill(canvas, Rect { x1: rect.x0, ..outer }, color);
    fill(canvas, Rect { x0: rect.x1, ..outer }, color);
}

/// Pixel row for a position in `[0, 1]` measured upward from the bottom.
fn to_row(rect: Rect, pos: f32) -> i32 {
    let y = rect.y1 as f32 - pos.clamp(0.0, 1.0) * rect.height() as f32;
    (y.round() as i32).clamp(rect.y0, rect.y1 - 1)
}

fn to_column(rect: Rect, pos: f32) -> i32 {
    let x = rect.x0 as f32 + pos.clamp(0.0, 1.0) * rect.width() as f32;
    (x.round() as i32).clamp(rect.x0, rect.x1 - 1)
}

fn time_tick_values(duration: f32) -> Vec<f32> {
    if duration <= 0.0 {
        return vec![0.0];
    }
    nice_ticks(0.0, duration, 8)
}

fn colorbar_tick_values(range: DynamicRange) -> Vec<f32> {
    if range.vmax > range.vmin {
        nice_ticks(range.vmin, range.vmax, 6)
    } else {
        vec![range.vmin]
    }
}

fn format_hz(hz: f32) -> String {
    if hz >= 1000.0 {
        let k = hz / 1000.0;
        if (k - k.round()).abs() < 1e-3 {
            format!("{:.0}k", k)
        } else {
            format!("{:.1}k", k)
        }
    } else {
        format!("{:.0}", hz)
    }
}

fn format_seconds(t: f32, step: f32) -> String {
    if step >= 1.0 {
        format!("{:.0}", t)
    } else if step >= 0.1 {
        format!("{:.1}", t)
    } else {
        format!("{:.2}", t)
    }
}

fn format_db(db: f32) -> String {
    // + 0.0 turns -0 into 0
    format!("{:+.0} dB", db.round() + 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::{display_bounds, DB_FLOOR};

    fn ramp_matrix(bins: usize, frames: usize) -> SpectrogramMatrix {
        let data = (0..bins * frames)
            .map(|i| -((i % 97) as f32))
            .collect();
        SpectrogramMatrix::new(data, bins, frames)
    }

    fn spec<'a>(m: &'a SpectrogramMatrix, scale: Scale, palette: &'a Palette) -> FigureSpec<'a> {
        FigureSpec {
            matrix: m,
            sample_rate: 16000,
            hop_length: 256,
            scale,
            bounds: display_bounds(16000, scale),
            range: DynamicRange {
                vmin: m.min(),
                vmax: m.max(),
            },
            palette,
        }
    }

    #[test]
    fn profiles_share_aspect_ratio() {
        let full = RenderProfile::final_render();
        let preview = RenderProfile::preview();
        assert_eq!((full.width, full.height), (3830, 2150));
        assert_eq!((preview.width, preview.height), (320, 180));
        let a = full.width as f32 / full.height as f32;
        let b = preview.width as f32 / preview.height as f32;
        assert!((a - b).abs() < 0.01);
    }

    #[test]
    fn preview_fonts_respect_minimums() {
        let preview = RenderProfile::preview();
        assert_eq!(preview.font_px(LABEL_PT), preview.points(6.0));
        assert_eq!(preview.font_px(TITLE_PT), preview.points(7.0));
        assert_eq!(preview.font_px(COLORBAR_TICK_PT), preview.points(5.0));
        let full = RenderProfile::final_render();
        assert_eq!(full.font_px(TITLE_PT), 14.0 * 168.0 / 72.0);
    }

    #[test]
    fn rendering_is_deterministic() {
        let m = ramp_matrix(129, 40);
        let palette = Palette::from_name("viridis");
        let renderer = Renderer::new(TextOverlay::resolve(None, None));
        for scale in [Scale::Linear, Scale::Log, Scale::Mel] {
            let s = spec(&m, scale, &palette);
            let a = renderer.render(&s, &RenderProfile::preview()).unwrap();
            let b = renderer.render(&s, &RenderProfile::preview()).unwrap();
            assert_eq!(a, b, "{scale}");
        }
    }

    #[test]
    fn silent_matrix_renders_single_colour_plot() {
        let m = SpectrogramMatrix::filled(DB_FLOOR, 65, 10);
        let palette = Palette::from_name("magma");
        let mut s = spec(&m, Scale::Linear, &palette);
        s.range = DynamicRange {
            vmin: DB_FLOOR,
            vmax: DB_FLOOR,
        };
        let img = Renderer::without_text()
            .render(&s, &RenderProfile::preview())
            .unwrap();
        let (w, h) = (img.width(), img.height());
        assert_eq!(img.get_pixel(w / 2, h / 2).0, palette.color(0.0));
    }

    #[test]
    fn loud_cells_use_the_top_of_the_palette() {
        let m = SpectrogramMatrix::filled(0.0, 33, 8);
        let palette = Palette::from_name("gray");
        let mut s = spec(&m, Scale::Log, &palette);
        s.range = DynamicRange {
            vmin: -80.0,
            vmax: 0.0,
        };
        let img = Renderer::without_text()
            .render(&s, &RenderProfile::preview())
            .unwrap();
        assert_eq!(img.get_pixel(img.width() / 2, img.height() / 2).0, [255, 255, 255]);
    }

    #[test]
    fn empty_matrix_is_a_render_error() {
        let m = SpectrogramMatrix::new(Vec::new(), 0, 0);
        let palette = Palette::from_name("magma");
        let err = Renderer::without_text()
            .render(&spec(&m, Scale::Linear, &palette), &RenderProfile::preview())
            .unwrap_err();
        assert!(matches!(err, SpectrogramError::Render(_)));
    }

    #[test]
    fn nearest_and_bilinear_sampling() {
        let coords = [0.0, 10.0, 20.0];
        let s = locate(&coords, 14.0, Shading::Nearest);
        assert_eq!((s.lo, s.hi), (1, 1));
        let s = locate(&coords, 16.0, Shading::Nearest);
        assert_eq!((s.lo, s.hi), (2, 2));
        let s = locate(&coords, 15.0, Shading::Bilinear);
        assert_eq!((s.lo, s.hi), (1, 2));
        assert!((s.frac - 0.5).abs() < 1e-6);
        let s = locate(&coords, 99.0, Shading::Bilinear);
        assert_eq!((s.lo, s.hi), (2, 2));
    }

    #[test]
    fn tick_labels_are_compact() {
        assert_eq!(format_hz(500.0), "500");
        assert_eq!(format_hz(2000.0), "2k");
        assert_eq!(format_hz(2500.0), "2.5k");
        assert_eq!(format_db(-40.0), "-40 dB");
        assert_eq!(format_db(0.0), "+0 dB");
        assert_eq!(format_db(-0.2), "+0 dB");
        assert_eq!(format_seconds(1.5, 0.5), "1.5");
    }
}
