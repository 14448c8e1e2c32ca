//! Color parsing, formatting and mixing for theme tokens.
//!
//! Token values are strings, so a color is anything that parses here:
//! `#rgb`, `#rrggbb`, `#aarrggbb` (alpha first), `rgb(r,g,b)` and
//! `rgba(r,g,b,a)` with `a` in `[0, 1]`. Everything else is "not a color"
//! and is treated as an opaque string by the animator.

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Syntax family a color was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    /// `#rrggbb` / `#aarrggbb`
    Hex,
    /// `rgba(r,g,b,a)`
    Functional,
}

impl Rgba {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses a token value as a color.
    pub fn parse(value: &str) -> Option<Self> {
        Self::parse_with_format(value).map(|(color, _)| color)
    }

    /// Parses a token value and reports which syntax it used.
    pub fn parse_with_format(value: &str) -> Option<(Self, ColorFormat)> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex).map(|c| (c, ColorFormat::Hex));
        }
        parse_functional(value).map(|c| (c, ColorFormat::Functional))
    }

    /// `#rrggbb` when opaque, `#aarrggbb` otherwise.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.a, self.r, self.g, self.b)
        }
    }

    /// `rgba(r,g,b,a)` with alpha as a fraction.
    pub fn to_functional(&self) -> String {
        format!(
            "rgba({},{},{},{:.2})",
            self.r,
            self.g,
            self.b,
            f64::from(self.a) / 255.0
        )
    }

    pub fn format(&self, format: ColorFormat) -> String {
        match format {
            ColorFormat::Hex => self.to_hex(),
            ColorFormat::Functional => self.to_functional(),
        }
    }

    /// Linear mix towards `other`; `t` is clamped to `[0, 1]`.
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| {
            let (a, b) = (f64::from(a), f64::from(b));
            (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
        };
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    /// Perceived brightness in `[0, 1]` (Rec. 709 weights).
    pub fn luminance(&self) -> f64 {
        (0.2126 * f64::from(self.r) + 0.7152 * f64::from(self.g) + 0.0722 * f64::from(self.b))
            / 255.0
    }

    pub fn is_dark(&self) -> bool {
        self.luminance() < 0.5
    }

    /// Moves each channel `amount` of the way towards white. Alpha is kept.
    pub fn lighten(&self, amount: f64) -> Self {
        Self { a: self.a, ..self.lerp(&Self::WHITE, amount) }
    }

    /// Moves each channel `amount` of the way towards black. Alpha is kept.
    pub fn darken(&self, amount: f64) -> Self {
        Self { a: self.a, ..self.lerp(&Self::BLACK, amount) }
    }

    /// Same color with a new alpha.
    pub fn with_alpha(&self, alpha: f64) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..*self
        }
    }
}

/// Returns true if the token value parses as a color.
pub fn is_color(value: &str) -> bool {
    Rgba::parse(value).is_some()
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some(Rgba::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
        }
        6 => Some(Rgba::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Rgba::rgba(byte(2)?, byte(4)?, byte(6)?, byte(0)?)),
        _ => None,
    }
}

fn parse_functional(value: &str) -> Option<Rgba> {
    let lower = value.to_ascii_lowercase();
    let body = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))?
        .strip_suffix(')')?;

    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let channel = |s: &str| -> Option<u8> {
        let v: f64 = s.parse().ok()?;
        (0.0..=255.0).contains(&v).then(|| v.round() as u8)
    };
    let (r, g, b) = match parts.as_slice() {
        [r, g, b] | [r, g, b, _] => (channel(r)?, channel(g)?, channel(b)?),
        _ => return None,
    };
    let a = match parts.get(3) {
        Some(alpha) => {
            let v: f64 = alpha.parse().ok()?;
            if !(0.0..=1.0).contains(&v) {
                return None;
            }
            (v * 255.0).round() as u8
        }
        None => 255,
    };
    Some(Rgba::rgba(r, g, b, a))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(Rgba::parse("#fff"), Some(Rgba::WHITE));
        assert_eq!(Rgba::parse("#BD93F9"), Some(Rgba::rgb(0xbd, 0x93, 0xf9)));
        assert_eq!(
            Rgba::parse("#80112233"),
            Some(Rgba::rgba(0x11, 0x22, 0x33, 0x80))
        );
        assert_eq!(Rgba::parse("#12345"), None);
        assert_eq!(Rgba::parse("#gggggg"), None);
    }

    #[test]
    fn test_parse_functional_forms() {
        assert_eq!(Rgba::parse("rgb(1, 2, 3)"), Some(Rgba::rgb(1, 2, 3)));
        assert_eq!(
            Rgba::parse_with_format("rgba(255,255,255,0.12)"),
            Some((Rgba::rgba(255, 255, 255, 31), ColorFormat::Functional))
        );
        assert_eq!(Rgba::parse("rgba(1,2,3,1.5)"), None);
        assert_eq!(Rgba::parse("rgb(300,0,0)"), None);
        assert_eq!(Rgba::parse("8px"), None);
        assert!(!is_color("Segoe UI"));
    }

    #[test]
    fn test_formatting() {
        assert_eq!(Rgba::rgb(0xbd, 0x93, 0xf9).to_hex(), "#bd93f9");
        assert_eq!(Rgba::rgba(1, 2, 3, 0x80).to_hex(), "#80010203");
        assert_eq!(Rgba::rgba(40, 42, 54, 13).to_functional(), "rgba(40,42,54,0.05)");
    }

    #[test]
    fn test_lerp_endpoints() {
        let a = Rgba::rgb(0, 100, 200);
        let b = Rgba::rgba(200, 100, 0, 0);
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
        assert_eq!(a.lerp(&b, 0.5), Rgba::rgba(100, 100, 100, 128));
    }

    #[test]
    fn test_lighten_darken() {
        let bg = Rgba::rgb(100, 100, 100);
        assert_eq!(bg.lighten(0.5), Rgba::rgb(178, 178, 178));
        assert_eq!(bg.darken(0.5), Rgba::rgb(50, 50, 50));
        assert!(bg.is_dark());
        assert!(!Rgba::WHITE.is_dark());
    }
}
