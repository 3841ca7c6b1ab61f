use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::foundation::error::MarkerError;

/// Marker fill color, straight (non-premultiplied) RGBA8.
///
/// Accepted textual forms: `#RRGGBB`, `#RRGGBBAA`, `rgb(r, g, b)`, `rgba(r, g, b, a)` with
/// `a` in `0..=1`, and the basic SVG color names (`red`, `lime`, `navy`, ...). Other ImageMagick
/// color names are rejected. [`Self::to_css`] always emits the `rgb(..)`/`rgba(..)` form, which
/// ImageMagick's `-fill` understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl MarkerColor {
    pub const RED: Self = Self::rgb(255, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_opaque(self) -> bool {
        self.a == 255
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_css(self) -> String {
        if self.is_opaque() {
            format!("rgb({}, {}, {})", self.r, self.g, self.b)
        } else {
            let a = f64::from(self.a) / 255.0;
            format!("rgba({}, {}, {}, {a:.4})", self.r, self.g, self.b)
        }
    }
}

impl Default for MarkerColor {
    fn default() -> Self {
        Self::RED
    }
}

impl fmt::Display for MarkerColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

impl FromStr for MarkerColor {
    type Err = MarkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('#') {
            return parse_hex(s).map_err(MarkerError::validation);
        }
        if let Some(c) = named(s) {
            return Ok(c);
        }
        parse_functional(s).map_err(MarkerError::validation)
    }
}

impl Serialize for MarkerColor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_css())
    }
}

impl<'de> Deserialize<'de> for MarkerColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            RgbaObj {
                r: u8,
                g: u8,
                b: u8,
                #[serde(default = "opaque")]
                a: u8,
            },
            Arr(Vec<u8>),
        }

        fn opaque() -> u8 {
            255
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse::<Self>().map_err(serde::de::Error::custom),
            Repr::RgbaObj { r, g, b, a } => Ok(Self::rgba(r, g, b, a)),
            Repr::Arr(v) => match v.as_slice() {
                [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
                [r, g, b, a] => Ok(Self::rgba(*r, *g, *b, *a)),
                _ => Err(serde::de::Error::custom(
                    "rgba array must have len 3 ([r,g,b]) or 4 ([r,g,b,a])",
                )),
            },
        }
    }
}

/// SVG 1.1 basic color keywords; ImageMagick resolves these names to the same values.
const NAMED: &[(&str, MarkerColor)] = &[
    ("black", MarkerColor::rgb(0, 0, 0)),
    ("silver", MarkerColor::rgb(192, 192, 192)),
    ("gray", MarkerColor::rgb(128, 128, 128)),
    ("grey", MarkerColor::rgb(128, 128, 128)),
    ("white", MarkerColor::rgb(255, 255, 255)),
    ("maroon", MarkerColor::rgb(128, 0, 0)),
    ("red", MarkerColor::RED),
    ("purple", MarkerColor::rgb(128, 0, 128)),
    ("fuchsia", MarkerColor::rgb(255, 0, 255)),
    ("magenta", MarkerColor::rgb(255, 0, 255)),
    ("green", MarkerColor::rgb(0, 128, 0)),
    ("lime", MarkerColor::rgb(0, 255, 0)),
    ("olive", MarkerColor::rgb(128, 128, 0)),
    ("yellow", MarkerColor::rgb(255, 255, 0)),
    ("navy", MarkerColor::rgb(0, 0, 128)),
    ("blue", MarkerColor::rgb(0, 0, 255)),
    ("teal", MarkerColor::rgb(0, 128, 128)),
    ("aqua", MarkerColor::rgb(0, 255, 255)),
    ("cyan", MarkerColor::rgb(0, 255, 255)),
    ("orange", MarkerColor::rgb(255, 165, 0)),
    ("transparent", MarkerColor::rgba(0, 0, 0, 0)),
];

fn named(s: &str) -> Option<MarkerColor> {
    NAMED
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(s))
        .map(|(_, c)| *c)
}

fn parse_hex(s: &str) -> Result<MarkerColor, String> {
    let s = s.strip_prefix('#').unwrap_or(s);

    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    if !s.is_ascii() {
        return Err("hex color must be #RRGGBB or #RRGGBBAA (case-insensitive)".to_owned());
    }

    match s.len() {
        6 => Ok(MarkerColor::rgb(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
        )),
        8 => Ok(MarkerColor::rgba(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
            hex_byte(&s[6..8])?,
        )),
        _ => Err("hex color must be #RRGGBB or #RRGGBBAA (case-insensitive)".to_owned()),
    }
}

fn parse_functional(s: &str) -> Result<MarkerColor, String> {
    let lower = s.to_ascii_lowercase();
    let (has_alpha, body) = if let Some(rest) = lower.strip_prefix("rgba(") {
        (true, rest)
    } else if let Some(rest) = lower.strip_prefix("rgb(") {
        (false, rest)
    } else {
        return Err(format!(
            "unsupported color \"{s}\" (expected #RRGGBB, #RRGGBBAA, rgb(..), rgba(..) or a basic color name)"
        ));
    };
    let body = body
        .strip_suffix(')')
        .ok_or_else(|| format!("color \"{s}\" is missing a closing ')'"))?;

    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let expected = if has_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return Err(format!(
            "color \"{s}\" must have {expected} components, got {}",
            parts.len()
        ));
    }

    fn channel(p: &str) -> Result<u8, String> {
        p.parse::<u8>()
            .map_err(|_| format!("color channel \"{p}\" must be an integer in 0..=255"))
    }

    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    let a = if has_alpha {
        let a: f64 = parts[3]
            .parse()
            .map_err(|_| format!("alpha \"{}\" must be a number in 0..=1", parts[3]))?;
        if !(0.0..=1.0).contains(&a) {
            return Err(format!("alpha \"{}\" must be a number in 0..=1", parts[3]));
        }
        (a * 255.0).round() as u8
    } else {
        255
    };

    Ok(MarkerColor::rgba(r, g, b, a))
}
