//! Palette parsing, tinting and RGB/HSL conversion.
//!
//! Everything here degrades instead of failing: malformed input passes through
//! [`tint`] unchanged and comes back as `None` from the parsers.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn lerp(a: Rgb, b: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let lerp1 = |x: u8, y: u8| -> u8 {
            (x as f32 + (y as f32 - x as f32) * t).round().clamp(0.0, 255.0) as u8
        };
        Rgb {
            r: lerp1(a.r, b.r),
            g: lerp1(a.g, b.g),
            b: lerp1(a.b, b.b),
        }
    }

    pub fn scale(self, k: f32) -> Rgb {
        let k = k.max(0.0);
        let s = |v: u8| -> u8 { ((v as f32) * k).round().clamp(0.0, 255.0) as u8 };
        Rgb {
            r: s(self.r),
            g: s(self.g),
            b: s(self.b),
        }
    }
}

/// Hue in degrees, saturation and lightness in percent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsl {
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

impl Hsl {
    pub const fn new(h: f32, s: f32, l: f32) -> Self {
        Self { h, s, l }
    }
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hsl({:.1}, {:.1}%, {:.1}%)",
            wrap_hue(self.h),
            self.s,
            self.l
        )
    }
}

fn wrap_hue(h: f32) -> f32 {
    let h = h.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negatives
    if h >= 360.0 {
        0.0
    } else {
        h
    }
}

fn parse_hex(s: &str) -> Option<Rgb> {
    let hex = s.strip_prefix('#')?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
}

fn parse_rgb_fn(s: &str) -> Option<Rgb> {
    let inner = s.strip_prefix("rgb(")?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(|p| p.trim().parse::<f32>().ok());
    let mut next = || -> Option<u8> {
        let v = parts.next()??;
        Some(v.round().clamp(0.0, 255.0) as u8)
    };
    let rgb = Rgb::new(next()?, next()?, next()?);
    if parts.next().is_some() {
        return None;
    }
    Some(rgb)
}

/// Accepts `#rrggbb` or `rgb(r, g, b)`.
pub fn parse_color(s: &str) -> Option<Rgb> {
    let s = s.trim();
    parse_hex(s).or_else(|| parse_rgb_fn(s))
}

pub fn format_rgb(c: Rgb) -> String {
    format!("rgb({}, {}, {})", c.r, c.g, c.b)
}

/// Multiplies every channel of a `#rrggbb` color by `factor`.
///
/// Anything that is not a six-digit hex color is returned unchanged.
pub fn tint(color: &str, factor: f32) -> String {
    match parse_hex(color.trim()) {
        Some(c) => format_rgb(c.scale(factor)),
        None => color.to_string(),
    }
}

pub fn rgb_to_hsl(c: Rgb) -> Hsl {
    let r = c.r as f32 / 255.0;
    let g = c.g as f32 / 255.0;
    let b = c.b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() <= f32::EPSILON {
        return Hsl::new(0.0, 0.0, l * 100.0);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    Hsl::new(wrap_hue(h * 60.0), s * 100.0, l * 100.0)
}

/// `None` is the "unparseable" sentinel.
pub fn rgb_to_hsl_tuple(color: &str) -> Option<Hsl> {
    parse_color(color).map(rgb_to_hsl)
}

pub fn hsl_to_rgb(hsl: Hsl) -> Rgb {
    let h = wrap_hue(hsl.h) / 360.0;
    let s = (hsl.s / 100.0).clamp(0.0, 1.0);
    let l = (hsl.l / 100.0).clamp(0.0, 1.0);

    let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;

    if s <= 0.0 {
        let v = to_u8(l);
        return Rgb::new(v, v, v);
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;

    let hue_to_rgb = |mut t: f32| -> f32 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };

    Rgb::new(
        to_u8(hue_to_rgb(h + 1.0 / 3.0)),
        to_u8(hue_to_rgb(h)),
        to_u8(hue_to_rgb(h - 1.0 / 3.0)),
    )
}

/// Paint-ready `hsl(H, S%, L%)` string, one decimal per component.
pub fn format_hsl(hsl: Hsl) -> String {
    hsl.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.05
    }

    #[test]
    fn tint_identity_is_rgb_equivalent() {
        assert_eq!(tint("#808080", 1.0), "rgb(128, 128, 128)");
    }

    #[test]
    fn tint_malformed_passes_through() {
        assert_eq!(tint("bad", 1.5), "bad");
        assert_eq!(tint("#12345", 0.5), "#12345");
        assert_eq!(tint("#gg0000", 0.5), "#gg0000");
        assert_eq!(tint("rgb(1, 2, 3)", 2.0), "rgb(1, 2, 3)");
    }

    #[test]
    fn tint_clamps_channels() {
        assert_eq!(tint("#ff8000", 1.18), "rgb(255, 151, 0)");
        assert_eq!(tint("#ff8000", 0.0), "rgb(0, 0, 0)");
    }

    #[test]
    fn red_to_hsl() {
        let hsl = rgb_to_hsl_tuple("#ff0000").unwrap();
        assert!(close(hsl.h, 0.0));
        assert!(close(hsl.s, 100.0));
        assert!(close(hsl.l, 50.0));
    }

    #[test]
    fn accepts_rgb_function_form() {
        let a = rgb_to_hsl_tuple("rgb(0, 0, 255)").unwrap();
        let b = rgb_to_hsl_tuple("#0000ff").unwrap();
        assert_eq!(a, b);
        assert!(close(a.h, 240.0));
    }

    #[test]
    fn unparseable_is_none() {
        assert!(rgb_to_hsl_tuple("hsl(0, 100%, 50%)").is_none());
        assert!(rgb_to_hsl_tuple("rgb(1, 2)").is_none());
        assert!(rgb_to_hsl_tuple("rgb(1, 2, 3, 4)").is_none());
        assert!(rgb_to_hsl_tuple("").is_none());
    }

    #[test]
    fn hsl_round_trip_reproduces_red() {
        let hsl = rgb_to_hsl_tuple("#ff0000").unwrap();
        assert_eq!(hsl_to_rgb(hsl), Rgb::new(255, 0, 0));
        assert_eq!(format_hsl(hsl), "hsl(0.0, 100.0%, 50.0%)");
    }

    #[test]
    fn round_trip_palette_colors() {
        for c in ["#7dd3fc", "#a78bfa", "#f472b6", "#34d399", "#fbbf24", "#808080"] {
            let rgb = parse_color(c).unwrap();
            let back = hsl_to_rgb(rgb_to_hsl(rgb));
            assert!((rgb.r as i32 - back.r as i32).abs() <= 1, "{c}");
            assert!((rgb.g as i32 - back.g as i32).abs() <= 1, "{c}");
            assert!((rgb.b as i32 - back.b as i32).abs() <= 1, "{c}");
        }
    }

    #[test]
    fn format_wraps_hue() {
        assert_eq!(format_hsl(Hsl::new(370.3, 50.0, 40.0)), "hsl(10.3, 50.0%, 40.0%)");
        assert_eq!(format_hsl(Hsl::new(-30.0, 50.0, 40.0)), "hsl(330.0, 50.0%, 40.0%)");
    }
}
