//! Label colors.
//!
//! Colors are rendered as `rgba(r,g,b,a)` strings together with a W3C
//! brightness value the UI uses to pick a readable foreground.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::fingerprint::sha1_hex;

/// Background color and brightness for one label value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelColors {
    /// CSS color string.
    pub background: String,
    /// Brightness in `0..=255`.
    pub brightness: i32,
}

/// Label name to value to color.
pub type LabelsColorMap = BTreeMap<String, BTreeMap<String, LabelColors>>;

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    /// Red channel.
    pub red: u8,
    /// Green channel.
    pub green: u8,
    /// Blue channel.
    pub blue: u8,
}

impl Rgb {
    /// Parses `#rgb`, `#rrggbb` or `rgb(r, g, b)`.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || ModelError::InvalidColor {
            value: value.to_string(),
        };
        let trimmed = value.trim();

        if let Some(hex) = trimmed.strip_prefix('#') {
            let expanded: String = match hex.len() {
                3 => hex.chars().flat_map(|c| [c, c]).collect(),
                6 => hex.to_string(),
                _ => return Err(invalid()),
            };
            let bytes = hex::decode(expanded).map_err(|_| invalid())?;
            return Ok(Self {
                red: bytes[0],
                green: bytes[1],
                blue: bytes[2],
            });
        }

        let inner = trimmed
            .strip_prefix("rgb(")
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(invalid)?;
        let channels: Vec<u8> = inner
            .split(',')
            .map(|c| c.trim().parse::<u8>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| invalid())?;
        match channels.as_slice() {
            [red, green, blue] => Ok(Self {
                red: *red,
                green: *green,
                blue: *blue,
            }),
            _ => Err(invalid()),
        }
    }

    /// Deterministic light color for a label name and value.
    pub fn unique(name: &str, value: &str) -> Self {
        let digest = sha1_hex(format!("{name}{value}"));
        let seed = u32::from_str_radix(&digest[..8], 16).unwrap_or_default();
        let hue = f64::from(seed % 360);
        let saturation = 0.55 + f64::from((seed >> 9) % 30) / 100.0;
        let lightness = 0.72 + f64::from((seed >> 17) % 14) / 100.0;
        Self::from_hsl(hue, saturation, lightness)
    }

    fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Self {
        let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let h = hue / 60.0;
        let x = chroma * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = lightness - chroma / 2.0;
        let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Self {
            red: channel(r),
            green: channel(g),
            blue: channel(b),
        }
    }

    /// W3C perceived brightness.
    pub fn brightness(&self) -> i32 {
        (i32::from(self.red) * 299 + i32::from(self.green) * 587 + i32::from(self.blue) * 114) / 1000
    }

    /// Converts into the color pair served to clients.
    pub fn to_label_colors(self) -> LabelColors {
        LabelColors {
            background: format!("rgba({},{},{},255)", self.red, self.green, self.blue),
            brightness: self.brightness(),
        }
    }
}

/// Merges `other` into `target`, keeping existing entries.
pub fn merge_colors(target: &mut LabelsColorMap, other: &LabelsColorMap) {
    for (name, values) in other {
        let entry = target.entry(name.clone()).or_default();
        for (value, color) in values {
            entry.entry(value.clone()).or_insert_with(|| color.clone());
        }
    }
}
