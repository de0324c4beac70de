use serde::{Deserialize, Serialize};

/// An 8-bit-per-channel color as the host describes it.
///
/// Ordering compares red, green, blue, then alpha, so colors can key
/// ordered maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 0xff)
    }

    /// The color with its hue rotated by 180 degrees, keeping saturation,
    /// value and alpha.
    pub fn opposite(&self) -> Self {
        let (h, s, v) = self.to_hsv();
        let (r, g, b) = hsv_to_rgb((h + 180.0) % 360.0, s, v);
        Rgba::new(r, g, b, self.a)
    }

    /// Hue in degrees [0, 360), saturation and value in [0, 1].
    pub fn to_hsv(&self) -> (f64, f64, f64) {
        let r = self.r as f64 / 255.0;
        let g = self.g as f64 / 255.0;
        let b = self.b as f64 / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let h = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * (((g - b) / delta).rem_euclid(6.0))
        } else if max == g {
            60.0 * (((b - r) / delta) + 2.0)
        } else {
            60.0 * (((r - g) / delta) + 4.0)
        };

        let s = if max == 0.0 { 0.0 } else { delta / max };

        (h, s, max)
    }
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h as u32 {
        0..=59 => (c, x, 0.0),
        60..=119 => (x, c, 0.0),
        120..=179 => (0.0, c, x),
        180..=239 => (0.0, x, c),
        240..=299 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let to_byte = |f: f64| ((f + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_byte(r), to_byte(g), to_byte(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_hue() {
        assert_eq!(Rgba::rgb(255, 0, 0).opposite(), Rgba::rgb(0, 255, 255));
        assert_eq!(Rgba::rgb(0, 0, 255).opposite(), Rgba::rgb(255, 255, 0));
        // Grays have no hue to rotate.
        assert_eq!(Rgba::rgb(64, 64, 64).opposite(), Rgba::rgb(64, 64, 64));
    }
}
