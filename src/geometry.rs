//! Geometry primitives - rectangles, colors, cover-fit cropping

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    /// Split horizontally into `count` equal columns separated by `gap`.
    pub fn columns(&self, count: usize, gap: f32) -> Vec<Rect> {
        if count == 0 {
            return vec![];
        }
        let total_gap = gap * (count as f32 - 1.0);
        let width = ((self.width - total_gap) / count as f32).max(0.0);
        (0..count)
            .map(|i| Rect::new(self.x + i as f32 * (width + gap), self.y, width, self.height))
            .collect()
    }
}

/// Source-space crop window, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Compute the cover-fit source window for drawing a `src_w`x`src_h` image
/// into a `dest_w`x`dest_h` box.
///
/// The image is scaled until it covers the destination on both axes, then the
/// overflowing axis is center-cropped. A source that is narrower than the
/// destination aspect loses rows (top/bottom); a wider one loses columns.
pub fn cover_fit(src_w: u32, src_h: u32, dest_w: f32, dest_h: f32) -> Option<CropRect> {
    if src_w == 0 || src_h == 0 || dest_w <= 0.0 || dest_h <= 0.0 {
        return None;
    }
    let scale = (dest_w as f64 / src_w as f64).max(dest_h as f64 / src_h as f64);
    let visible_w = ((dest_w as f64 / scale).round() as u32).clamp(1, src_w);
    let visible_h = ((dest_h as f64 / scale).round() as u32).clamp(1, src_h);
    Some(CropRect {
        x: (src_w - visible_w) / 2,
        y: (src_h - visible_h) / 2,
        width: visible_w,
        height: visible_h,
    })
}

/// RGBA color, serialized as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub fn parse(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
                a: channel(6)?,
            }),
            _ => None,
        }
    }

    /// `#rrggbb` without alpha, for SVG paint attributes.
    pub fn svg_rgb(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(&self) -> f32 {
        self.a as f32 / 255.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 0xff {
            write!(f, "{}", self.svg_rgb())
        } else {
            write!(f, "{}{:02x}", self.svg_rgb(), self.a)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value).ok_or_else(|| format!("invalid color: {value}"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}
