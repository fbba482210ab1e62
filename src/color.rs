//! RGB colors as used by schemes, icons and render calls.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::Deserialize;

/// Generic dark neutral used when nothing else specifies a color.
pub const DEFAULT_COLOR: Color = Color::rgb(0x44, 0x44, 0x44);

/// Color of secondary icons that do not carry their own color.
pub const EXTRA_ICON_COLOR: Color = Color::rgb(0x88, 0x88, 0x88);

static NAMED_COLORS: Lazy<HashMap<&'static str, Color>> = Lazy::new(|| {
    [
        ("black", Color::rgb(0, 0, 0)),
        ("white", Color::rgb(255, 255, 255)),
        ("gray", Color::rgb(128, 128, 128)),
        ("grey", Color::rgb(128, 128, 128)),
        ("silver", Color::rgb(192, 192, 192)),
        ("red", Color::rgb(255, 0, 0)),
        ("maroon", Color::rgb(128, 0, 0)),
        ("orange", Color::rgb(255, 165, 0)),
        ("yellow", Color::rgb(255, 255, 0)),
        ("gold", Color::rgb(255, 215, 0)),
        ("green", Color::rgb(0, 128, 0)),
        ("lime", Color::rgb(0, 255, 0)),
        ("olive", Color::rgb(128, 128, 0)),
        ("teal", Color::rgb(0, 128, 128)),
        ("blue", Color::rgb(0, 0, 255)),
        ("navy", Color::rgb(0, 0, 128)),
        ("purple", Color::rgb(128, 0, 128)),
        ("pink", Color::rgb(255, 192, 203)),
        ("brown", Color::rgb(165, 42, 42)),
        ("beige", Color::rgb(245, 245, 220)),
    ]
    .into_iter()
    .collect()
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("Unknown color `{0}`.")]
pub struct UnknownColor(pub String);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    /// Gray with all channels set to `part` of full intensity.
    pub fn gray(part: f64) -> Self {
        let channel = (part.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color::rgb(channel, channel, channel)
    }

    /// Perceived brightness test used to choose a contrasting outline.
    pub fn is_bright(&self) -> bool {
        0.2126 * self.r as f64 + 0.7152 * self.g as f64 + 0.0722 * self.b as f64 > 0.78125 * 255.0
    }

    /// Scales every channel towards black by `factor` (0 keeps, 1 blackens).
    pub fn darken(&self, factor: f64) -> Self {
        let keep = 1.0 - factor.clamp(0.0, 1.0);
        let scale = |channel: u8| (channel as f64 * keep).round() as u8;
        Color::rgb(scale(self.r), scale(self.g), scale(self.b))
    }

    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = UnknownColor;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let unknown = || UnknownColor(text.to_owned());

        if let Some(digits) = text.strip_prefix('#') {
            if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(unknown());
            }
            let channel = |range: std::ops::Range<usize>| {
                u8::from_str_radix(&digits[range], 16).map_err(|_| unknown())
            };
            return match digits.len() {
                3 => {
                    // `#abc` is short for `#aabbcc`
                    let short = |i: usize| channel(i..i + 1).map(|value| value * 17);
                    Ok(Color::rgb(short(0)?, short(1)?, short(2)?))
                }
                6 => Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
                _ => Err(unknown()),
            };
        }

        NAMED_COLORS
            .get(text.to_lowercase().as_str())
            .copied()
            .ok_or_else(unknown)
    }
}

impl TryFrom<String> for Color {
    type Error = UnknownColor;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_and_names() {
        assert_eq!(Color::rgb(0xAA, 0xBB, 0xCC), "#aabbcc".parse().unwrap());
        assert_eq!(Color::rgb(0xAA, 0xBB, 0xCC), "#abc".parse().unwrap());
        assert_eq!(Color::rgb(255, 0, 0), "Red".parse().unwrap());
        assert!("#12345".parse::<Color>().is_err());
        assert!("#ggg".parse::<Color>().is_err());
        assert!("chartreuse-ish".parse::<Color>().is_err());
    }

    #[test]
    fn test_brightness_and_shades() {
        assert!(Color::rgb(255, 255, 255).is_bright());
        assert!(!DEFAULT_COLOR.is_bright());
        assert_eq!(Color::rgb(100, 50, 0), Color::rgb(200, 100, 0).darken(0.5));
        assert_eq!("#808080", Color::gray(0.5).hex());
    }
}
