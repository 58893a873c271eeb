//! Stat-row glyphs and the agent silhouette as SVG path data.
//!
//! Every glyph is authored on a 24-unit grid and placed with a
//! translate/scale transform, so no image resource is ever involved.

use crate::geometry::Color;

const GRID: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Bed,
    Bath,
    Area,
    Person,
}

impl Icon {
    pub fn path_data(self) -> &'static str {
        match self {
            // headboard, mattress with legs, pillow
            Icon::Bed => "M2 5h2v6h18v8h-2v-3H4v3H2z M5 8h5v3H5z",
            // tub, faucet, feet
            Icon::Bath => concat!(
                "M2 11h20v3a5 5 0 0 1-5 5H7a5 5 0 0 1-5-5z ",
                "M5 11V5a2 2 0 0 1 4 0v1H7.5V5a.5 .5 0 0 0-1 0v6z ",
                "M6 19h2v2H6z M16 19h2v2h-2z"
            ),
            // frame with a diagonal double arrow inside
            Icon::Area => concat!(
                "M3 3h18v18H3z M5 5v14h14V5z ",
                "M8 8h5l-1.8 1.8 4 4L17 12v5h-5l1.8-1.8-4-4L8 13z"
            ),
            // head and shoulders
            Icon::Person => "M12 3a4 4 0 1 1 0 8a4 4 0 1 1 0-8z M4 21a8 7 0 0 1 16 0z",
        }
    }

    /// `<path>` element filling a `size`-pixel square at (`x`, `y`).
    pub fn svg(self, x: f32, y: f32, size: f32, color: Color) -> String {
        format!(
            r#"<path transform="translate({x} {y}) scale({scale})" fill="{fill}" fill-opacity="{opacity}" fill-rule="evenodd" d="{d}"/>"#,
            scale = size / GRID,
            fill = color.svg_rgb(),
            opacity = color.opacity(),
            d = self.path_data(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icons_are_pure_path_commands() {
        for icon in [Icon::Bed, Icon::Bath, Icon::Area, Icon::Person] {
            let d = icon.path_data();
            assert!(d.starts_with('M'));
            assert!(d.chars().all(|c| c.is_ascii_alphanumeric() || " .-".contains(c)), "{icon:?}");
        }
    }

    #[test]
    fn test_svg_scales_to_requested_size() {
        let svg = Icon::Bed.svg(10.0, 20.0, 48.0, Color::WHITE);
        assert!(svg.contains(r#"translate(10 20) scale(2)"#));
        assert!(svg.contains(r##"fill="#ffffff""##));
    }
}
