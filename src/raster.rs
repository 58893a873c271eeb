//! Scene rasterization and PNG encoding
//!
//! The composed SVG scene is the single source of truth for a graphic; this
//! module only turns it into pixels and bytes.

use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::compositor::ComposeError;
use crate::config::EngineConfig;
use crate::print::PrintProfile;
use crate::text::{ApproxMetrics, FontSpec, TextMeasure};

/// Owns the font database shared by every render of an engine.
pub struct Rasterizer {
    fontdb: Arc<fontdb::Database>,
    font_family: String,
}

impl Rasterizer {
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut db = fontdb::Database::new();
        if config.load_system_fonts {
            db.load_system_fonts();
        }
        for path in &config.font_files {
            if let Err(err) = db.load_font_file(path) {
                warn!(path = %path.display(), error = %err, "skipping unreadable font file");
            }
        }
        debug!(faces = db.len(), family = %config.font_family, "font database ready");
        Self {
            fontdb: Arc::new(db),
            font_family: config.font_family.clone(),
        }
    }

    /// CSS font-family list written on every text element.
    pub fn font_family(&self) -> &str {
        &self.font_family
    }

    /// Text measurement backed by the faces this rasterizer draws with.
    pub fn measure(&self) -> Arc<dyn TextMeasure> {
        Arc::new(FontMetrics {
            fontdb: self.fontdb.clone(),
            families: parse_families(&self.font_family),
        })
    }

    pub fn rasterize(&self, svg: &str, width: u32, height: u32) -> Result<Pixmap, ComposeError> {
        let options = usvg::Options {
            fontdb: self.fontdb.clone(),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_str(svg, &options).map_err(|e| ComposeError::Scene(e.to_string()))?;
        let mut pixmap = Pixmap::new(width, height).ok_or(ComposeError::Canvas { width, height })?;
        resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());
        Ok(pixmap)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FamilyName {
    Named(String),
    Serif,
    SansSerif,
    Cursive,
    Fantasy,
    Monospace,
}

impl FamilyName {
    fn as_family(&self) -> fontdb::Family<'_> {
        match self {
            FamilyName::Named(name) => fontdb::Family::Name(name),
            FamilyName::Serif => fontdb::Family::Serif,
            FamilyName::SansSerif => fontdb::Family::SansSerif,
            FamilyName::Cursive => fontdb::Family::Cursive,
            FamilyName::Fantasy => fontdb::Family::Fantasy,
            FamilyName::Monospace => fontdb::Family::Monospace,
        }
    }
}

/// CSS family list, plus the serif fallback usvg appends when selecting a face.
fn parse_families(list: &str) -> Vec<FamilyName> {
    let mut families: Vec<_> = list
        .split(',')
        .map(|name| name.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|name| !name.is_empty())
        .map(|name| match name {
            "serif" => FamilyName::Serif,
            "sans-serif" => FamilyName::SansSerif,
            "cursive" => FamilyName::Cursive,
            "fantasy" => FamilyName::Fantasy,
            "monospace" => FamilyName::Monospace,
            named => FamilyName::Named(named.to_string()),
        })
        .collect();
    families.push(FamilyName::Serif);
    families
}

/// Advance widths from the face resvg selects for the same family and weight.
/// Falls back to `ApproxMetrics` when the database has no matching face.
struct FontMetrics {
    fontdb: Arc<fontdb::Database>,
    families: Vec<FamilyName>,
}

impl TextMeasure for FontMetrics {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        let families: Vec<_> = self.families.iter().map(FamilyName::as_family).collect();
        let query = fontdb::Query {
            families: &families,
            weight: fontdb::Weight(font.weight),
            ..fontdb::Query::default()
        };
        self.fontdb
            .query(&query)
            .and_then(|id| {
                self.fontdb
                    .with_face_data(id, |data, index| advance_width(data, index, text, font))
            })
            .flatten()
            .unwrap_or_else(|| ApproxMetrics.measure(text, font))
    }
}

fn advance_width(data: &[u8], index: u32, text: &str, font: &FontSpec) -> Option<f32> {
    let face = ttf_parser::Face::parse(data, index).ok()?;
    let units_per_em = face.units_per_em() as f32;
    let fallback = (units_per_em / 2.0) as u16;
    let mut units = 0.0;
    let mut count = 0usize;
    for c in text.chars() {
        let advance = face
            .glyph_index(c)
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(fallback);
        units += advance as f32;
        count += 1;
    }
    Some(units * font.size / units_per_em + font.letter_spacing * count as f32)
}

/// Straight-alpha RGBA PNG. Print profiles add a `pHYs` chunk so the file
/// carries its physical size.
pub fn encode_png(pixmap: &Pixmap, print: Option<&PrintProfile>) -> Result<Vec<u8>, ComposeError> {
    let mut data = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let c = pixel.demultiply();
        data.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);
        if let Some(profile) = print {
            let ppm = profile.pixels_per_meter();
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu: ppm,
                yppu: ppm,
                unit: png::Unit::Meter,
            }));
        }
        let mut writer = encoder.write_header().map_err(|e| ComposeError::Encode(e.to_string()))?;
        writer
            .write_image_data(&data)
            .map_err(|e| ComposeError::Encode(e.to_string()))?;
        writer.finish().map_err(|e| ComposeError::Encode(e.to_string()))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rasterizer() -> Rasterizer {
        Rasterizer::from_config(&EngineConfig {
            load_system_fonts: false,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_rasterize_fills_canvas() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="2"><rect width="4" height="2" fill="#ff0000"/></svg>"##;
        let pixmap = rasterizer().rasterize(svg, 4, 2).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (4, 2));
        let px = pixmap.pixel(3, 1).unwrap();
        assert_eq!((px.red(), px.green(), px.blue(), px.alpha()), (255, 0, 0, 255));
    }

    fn dejavu() -> Rasterizer {
        let fonts = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fonts");
        Rasterizer::from_config(&EngineConfig {
            load_system_fonts: false,
            font_files: vec![fonts.join("DejaVuSans.ttf"), fonts.join("DejaVuSans-Bold.ttf")],
            font_family: "'DejaVu Sans', sans-serif".to_string(),
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_measure_follows_requested_weight() {
        let measure = dejavu().measure();
        let regular = FontSpec { size: 50.0, weight: 400, letter_spacing: 0.0 };
        let bold = FontSpec { weight: 800, ..regular };
        let text = "Welcome home to the harbor";
        let light = measure.measure(text, &regular);
        let heavy = measure.measure(text, &bold);
        assert!(heavy > light * 1.05, "{heavy} vs {light}");
        assert_ne!(light, ApproxMetrics.measure(text, &regular));
    }

    #[test]
    fn test_measure_without_faces_uses_approx() {
        let font = FontSpec { size: 20.0, weight: 700, letter_spacing: 1.0 };
        let measured = rasterizer().measure().measure("Listing", &font);
        assert_eq!(measured, ApproxMetrics.measure("Listing", &font));
    }

    #[test]
    fn test_parse_families() {
        assert_eq!(
            parse_families("'DejaVu Sans', \"Arial\", sans-serif"),
            vec![
                FamilyName::Named("DejaVu Sans".to_string()),
                FamilyName::Named("Arial".to_string()),
                FamilyName::SansSerif,
                FamilyName::Serif,
            ]
        );
    }

    #[test]
    fn test_invalid_scene_is_reported() {
        let err = rasterizer().rasterize("<svg", 4, 4).unwrap_err();
        assert!(matches!(err, ComposeError::Scene(_)));
    }

    #[test]
    fn test_png_carries_print_density() {
        let pixmap = Pixmap::new(3, 3).unwrap();
        let bytes = encode_png(&pixmap, Some(&PrintProfile::letter_300dpi())).unwrap();
        let decoder = png::Decoder::new(std::io::Cursor::new(bytes));
        let reader = decoder.read_info().unwrap();
        let dims = reader.info().pixel_dims.unwrap();
        assert_eq!(dims.xppu, 11811);
        assert_eq!(dims.unit, png::Unit::Meter);
        assert_eq!(reader.info().width, 3);
    }

    #[test]
    fn test_png_without_profile_has_no_density() {
        let pixmap = Pixmap::new(2, 2).unwrap();
        let bytes = encode_png(&pixmap, None).unwrap();
        let reader = png::Decoder::new(std::io::Cursor::new(bytes)).read_info().unwrap();
        assert!(reader.info().pixel_dims.is_none());
    }
}
