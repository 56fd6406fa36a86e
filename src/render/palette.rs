//! Colour map resolution.
//!
//! `custom` is a fixed deep-navy to warm-highlight gradient, `gray` is a
//! black-to-white ramp, and every other name is looked up in `colorous`.
//! A `_r` suffix reverses any of them.

/// Entries in a sampled colour table.
pub const LUT_SIZE: usize = 256;

const CUSTOM_STOPS: [[u8; 3]; 8] = [
    [0x0d, 0x02, 0x21],
    [0x0d, 0x1b, 0x2a],
    [0x1b, 0x26, 0x3b],
    [0x41, 0x5a, 0x77],
    [0x77, 0x8d, 0xa9],
    [0xe0, 0xe1, 0xdd],
    [0xff, 0x6b, 0x6b],
    [0xff, 0xd9, 0x3d],
];

const FALLBACK: &str = "magma";

#[derive(Clone, Copy)]
enum Source {
    Gradient(colorous::Gradient),
    Stops(&'static [[u8; 3]]),
    Gray,
}

/// A resolved colour map, sampled into a fixed lookup table.
#[derive(Clone)]
pub struct Palette {
    name: String,
    lut: Vec<[u8; 3]>,
}

impl Palette {
    /// Resolve a colour map by name. Unknown names fall back to magma.
    pub fn from_name(name: &str) -> Self {
        let requested = name.trim().to_ascii_lowercase();
        let (base, reversed) = match requested.strip_suffix("_r") {
            Some(base) => (base.to_string(), true),
            None => (requested.clone(), false),
        };

        let (source, resolved) = match lookup(&base) {
            Some(source) => (source, requested),
            None => {
                log::warn!("Unknown colormap '{}', using {}", name, FALLBACK);
                (Source::Gradient(colorous::MAGMA), FALLBACK.to_string())
            }
        };
        let reversed = reversed && resolved != FALLBACK;

        let lut = (0..LUT_SIZE)
            .map(|i| {
                let mut t = i as f64 / (LUT_SIZE - 1) as f64;
                if reversed {
                    t = 1.0 - t;
                }
                sample(source, t)
            })
            .collect();

        Self {
            name: resolved,
            lut,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Colour for a normalised position in `[0, 1]`; out-of-range values clip.
    pub fn color(&self, t: f32) -> [u8; 3] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let idx = ((t * LUT_SIZE as f32) as usize).min(LUT_SIZE - 1);
        self.lut[idx]
    }
}

/// Every `colorous` gradient under its lowercase matplotlib name.
const GRADIENTS: &[(&str, colorous::Gradient)] = &[
    ("magma", colorous::MAGMA),
    ("inferno", colorous::INFERNO),
    ("plasma", colorous::PLASMA),
    ("viridis", colorous::VIRIDIS),
    ("cividis", colorous::CIVIDIS),
    ("turbo", colorous::TURBO),
    ("warm", colorous::WARM),
    ("cool", colorous::COOL),
    ("cubehelix", colorous::CUBEHELIX),
    ("rainbow", colorous::RAINBOW),
    ("sinebow", colorous::SINEBOW),
    ("blues", colorous::BLUES),
    ("greens", colorous::GREENS),
    ("greys", colorous::GREYS),
    ("oranges", colorous::ORANGES),
    ("purples", colorous::PURPLES),
    ("reds", colorous::REDS),
    ("bugn", colorous::BLUE_GREEN),
    ("bupu", colorous::BLUE_PURPLE),
    ("gnbu", colorous::GREEN_BLUE),
    ("orrd", colorous::ORANGE_RED),
    ("pubugn", colorous::PURPLE_BLUE_GREEN),
    ("pubu", colorous::PURPLE_BLUE),
    ("purd", colorous::PURPLE_RED),
    ("rdpu", colorous::RED_PURPLE),
    ("ylgnbu", colorous::YELLOW_GREEN_BLUE),
    ("ylgn", colorous::YELLOW_GREEN),
    ("ylorbr", colorous::YELLOW_ORANGE_BROWN),
    ("ylorrd", colorous::YELLOW_ORANGE_RED),
    ("brbg", colorous::BROWN_GREEN),
    ("prgn", colorous::PURPLE_GREEN),
    ("piyg", colorous::PINK_GREEN),
    ("puor", colorous::PURPLE_ORANGE),
    ("rdbu", colorous::RED_BLUE),
    ("rdgy", colorous::RED_GREY),
    ("rdylbu", colorous::RED_YELLOW_BLUE),
    ("rdylgn", colorous::RED_YELLOW_GREEN),
    ("spectral", colorous::SPECTRAL),
];

fn lookup(name: &str) -> Option<Source> {
    match name {
        "custom" => Some(Source::Stops(&CUSTOM_STOPS)),
        "gray" | "grey" => Some(Source::Gray),
        _ => GRADIENTS
            .iter()
            .find(|(key, _)| *key == name)
            .map(|&(_, gradient)| Source::Gradient(gradient)),
    }
}

fn sample(source: Source, t: f64) -> [u8; 3] {
    match source {
        Source::Gradient(gradient) => {
            let c = gradient.eval_continuous(t);
            [c.r, c.g, c.b]
        }
        Source::Gray => {
            let g = (t * 255.0).round() as u8;
            [g, g, g]
        }
        Source::Stops(stops) => {
            let segments = (stops.len() - 1) as f64;
            let pos = t * segments;
            let i = (pos.floor() as usize).min(stops.len() - 2);
            let local = (pos - i as f64) as f32;
            let (a, b) = (stops[i], stops[i + 1]);
            [
                lerp_u8(a[0], b[0], local),
                lerp_u8(a[1], b[1], local),
                lerp_u8(a[2], b[2], local),
            ]
        }
    }
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_gradient_spans_its_stops() {
        let p = Palette::from_name("custom");
        assert_eq!(p.color(0.0), CUSTOM_STOPS[0]);
        assert_eq!(p.color(1.0), CUSTOM_STOPS[7]);
    }

    #[test]
    fn gray_is_monochrome_ramp() {
        let p = Palette::from_name("Gray");
        assert_eq!(p.color(0.0), [0, 0, 0]);
        assert_eq!(p.color(1.0), [255, 255, 255]);
        let [r, g, b] = p.color(0.4);
        assert!(r == g && g == b);
    }

    #[test]
    fn unknown_name_falls_back_to_magma() {
        let p = Palette::from_name("not-a-map");
        assert_eq!(p.name(), "magma");
        let magma = Palette::from_name("magma");
        assert_eq!(p.color(0.3), magma.color(0.3));
    }

    #[test]
    fn every_library_gradient_resolves_by_name() {
        for (key, _) in GRADIENTS.iter().filter(|(key, _)| *key != FALLBACK) {
            assert_ne!(Palette::from_name(key).name(), FALLBACK, "{key}");
        }
        for name in ["YlGn", "PuBu", "RdYlGn", "BrBG", "OrRd", "PRGn", "PiYG", "RdGy_r"] {
            assert_eq!(Palette::from_name(name).name(), name.to_ascii_lowercase());
        }
    }

    #[test]
    fn reversed_maps_swap_ends() {
        let fwd = Palette::from_name("viridis");
        let rev = Palette::from_name("viridis_r");
        assert_eq!(fwd.color(0.0), rev.color(1.0));
        assert_eq!(fwd.color(1.0), rev.color(0.0));
    }

    #[test]
    fn out_of_range_positions_clip() {
        let p = Palette::from_name("inferno");
        assert_eq!(p.color(-3.0), p.color(0.0));
        assert_eq!(p.color(7.0), p.color(1.0));
        assert_eq!(p.color(f32::NAN), p.color(0.0));
    }
}
