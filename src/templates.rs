//! Template Registry - statically configured canvases and region geometry
//!
//! A template is a contract: the same format id always yields the same canvas
//! size and the same rectangles. Nothing outside this module branches on a
//! format id; everything asks the registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::geometry::{Color, Rect};
use crate::print::PrintProfile;
use crate::text::TruncationMode;

pub type TemplateId = String;

pub const SOCIAL_PORTRAIT: &str = "social-portrait";
pub const SOCIAL_SQUARE: &str = "social-square";
pub const PRINT_LETTER: &str = "print-letter";

#[derive(Debug, Error)]
#[error("unknown template: {0}")]
pub struct UnknownTemplate(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    pub id: TemplateId,
    pub name: String,
    /// One-line blurb for template pickers.
    pub summary: String,
    pub template_version: String,
    #[serde(default = "default_engine_min_version")]
    pub engine_min_version: String,
    pub canvas: CanvasSize,
    #[serde(default)]
    pub print: Option<PrintProfile>,
    pub background: Color,
    pub header: HeaderRegion,
    pub photo_grid: PhotoGrid,
    #[serde(default)]
    pub photo_overlay: Option<GradientOverlay>,
    pub address: AddressRegion,
    pub stats: StatRow,
    #[serde(default)]
    pub headline: Option<TextRegion>,
    pub description: TextRegion,
    #[serde(default)]
    pub agent: Option<AgentRegion>,
    #[serde(default)]
    pub open_house: Option<RibbonRegion>,
    /// Paint order, back to front. Layers left out are not drawn.
    #[serde(default = "default_layers")]
    pub layers: Vec<Layer>,
}

fn default_engine_min_version() -> String {
    "1.0.0".to_string()
}

/// Drawable layers of a listing graphic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    Background,
    Header,
    Photos,
    Address,
    Stats,
    Copy,
    Agent,
    OpenHouse,
}

fn default_layers() -> Vec<Layer> {
    vec![
        Layer::Background,
        Layer::Header,
        Layer::Address,
        Layer::Photos,
        Layer::Stats,
        Layer::Copy,
        Layer::Agent,
        Layer::OpenHouse,
    ]
}

/// Photos under the header, for layouts whose hero bleeds behind the badge.
fn photos_first_layers() -> Vec<Layer> {
    vec![
        Layer::Background,
        Layer::Photos,
        Layer::Header,
        Layer::Address,
        Layer::Stats,
        Layer::Copy,
        Layer::Agent,
        Layer::OpenHouse,
    ]
}

impl TemplateSpec {
    /// Number of photo slots.
    pub fn capacity(&self) -> usize {
        self.photo_grid.capacity()
    }

    /// Hard input limit for headlines; `None` when the template draws no headline.
    pub fn headline_max_chars(&self) -> Option<usize> {
        self.headline.as_ref().map(|region| region.max_chars)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_size: f32,
    #[serde(default = "default_weight")]
    pub font_weight: u16,
    pub color: Color,
    #[serde(default)]
    pub align: TextAlign,
    #[serde(default)]
    pub letter_spacing: f32,
}

fn default_weight() -> u16 {
    400
}

impl TextStyle {
    fn new(font_size: f32, font_weight: u16, color: Color) -> Self {
        Self {
            font_size,
            font_weight,
            color,
            align: TextAlign::Start,
            letter_spacing: 0.0,
        }
    }

    fn aligned(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    fn spaced(mut self, letter_spacing: f32) -> Self {
        self.letter_spacing = letter_spacing;
        self
    }

    /// Same style with size and tracking multiplied by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            font_size: self.font_size * factor,
            letter_spacing: self.letter_spacing * factor,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderRegion {
    pub rect: Rect,
    #[serde(default)]
    pub fill: Option<Color>,
    #[serde(default)]
    pub logo: Option<Rect>,
    pub badge: BadgeRegion,
}

/// Fixed-size price/status badge. Width does not follow the text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeRegion {
    pub rect: Rect,
    pub fill: Color,
    #[serde(default)]
    pub corner_radius: f32,
    pub status: TextStyle,
    pub price: TextStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoGrid {
    pub hero: Rect,
    #[serde(default)]
    pub secondary: Vec<Rect>,
    pub placeholder: Color,
    pub placeholder_label: TextStyle,
}

impl PhotoGrid {
    pub fn capacity(&self) -> usize {
        1 + self.secondary.len()
    }

    /// Hero first, then secondary tiles.
    pub fn slots(&self) -> Vec<Rect> {
        std::iter::once(self.hero).chain(self.secondary.iter().copied()).collect()
    }
}

/// Vertical fade drawn over the photo grid for legibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradientOverlay {
    pub rect: Rect,
    pub color: Color,
    pub from_opacity: f32,
    pub to_opacity: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreetFormat {
    #[default]
    Plain,
    LetterSpaced,
    TokenSpaced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRegion {
    pub rect: Rect,
    #[serde(default)]
    pub fill: Option<Color>,
    #[serde(default)]
    pub street_format: StreetFormat,
    pub primary: TextStyle,
    pub secondary: TextStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatRow {
    pub rect: Rect,
    pub value: TextStyle,
    pub label: TextStyle,
    pub icon_color: Color,
    pub icon_size: f32,
    #[serde(default)]
    pub divider: Option<Color>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRegion {
    pub rect: Rect,
    pub style: TextStyle,
    pub line_height: f32,
    pub max_lines: usize,
    pub max_chars: usize,
    #[serde(default)]
    pub truncation: TruncationMode,
    #[serde(default)]
    pub gap_after: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRegion {
    pub rect: Rect,
    #[serde(default)]
    pub fill: Option<Color>,
    /// Square box; the photo is clipped to its inscribed circle.
    pub photo: Rect,
    pub placeholder: Color,
    pub name: TextStyle,
    pub title: TextStyle,
    pub phone: TextStyle,
    #[serde(default)]
    pub logo_mark: Option<Rect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RibbonRegion {
    pub rect: Rect,
    pub fill: Color,
    pub text: TextStyle,
}

/// Template registry - built-ins plus any templates registered at startup
pub struct TemplateRegistry {
    templates: BTreeMap<TemplateId, TemplateSpec>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self { templates: BTreeMap::new() }
    }

    /// The three shipped layouts.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(social_portrait());
        registry.register(social_square());
        registry.register(print_letter());
        registry
    }

    /// Register every `*.json` template found in `dir`. Unparseable files are
    /// skipped with a warning.
    pub fn load_from_dir(&mut self, dir: &Path) -> Result<usize, std::io::Error> {
        let mut loaded = 0;
        if !dir.exists() {
            return Ok(loaded);
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == "json") {
                let content = fs::read_to_string(&path)?;
                match serde_json::from_str::<TemplateSpec>(&content) {
                    Ok(template) => {
                        debug!(template = %template.id, path = %path.display(), "registered template");
                        self.register(template);
                        loaded += 1;
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping invalid template");
                    }
                }
            }
        }
        Ok(loaded)
    }

    pub fn get(&self, id: &str) -> Option<&TemplateSpec> {
        self.templates.get(id)
    }

    pub fn resolve(&self, format: &str) -> Result<&TemplateSpec, UnknownTemplate> {
        self.get(format).ok_or_else(|| UnknownTemplate(format.to_string()))
    }

    pub fn list(&self) -> Vec<&TemplateSpec> {
        self.templates.values().collect()
    }

    pub fn register(&mut self, template: TemplateSpec) {
        self.templates.insert(template.id.clone(), template);
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

const NAVY: Color = Color::rgb(0x0f, 0x17, 0x2a);
const SLATE_700: Color = Color::rgb(0x33, 0x41, 0x55);
const SLATE_500: Color = Color::rgb(0x64, 0x74, 0x8b);
const SLATE_400: Color = Color::rgb(0x94, 0xa3, 0xb8);
const SLATE_300: Color = Color::rgb(0xcb, 0xd5, 0xe1);
const SLATE_200: Color = Color::rgb(0xe2, 0xe8, 0xf0);
const SLATE_100: Color = Color::rgb(0xf1, 0xf5, 0xf9);
const AMBER: Color = Color::rgb(0xf5, 0x9e, 0x0b);
const BRICK: Color = Color::rgb(0xb9, 0x1c, 0x1c);

fn social_portrait() -> TemplateSpec {
    TemplateSpec {
        id: SOCIAL_PORTRAIT.to_string(),
        name: "Social Portrait".to_string(),
        summary: "Story-format listing graphic with a single hero photo".to_string(),
        template_version: "3.0.0".to_string(),
        engine_min_version: default_engine_min_version(),
        canvas: CanvasSize { width: 1080, height: 1920 },
        print: None,
        background: NAVY,
        header: HeaderRegion {
            rect: Rect::new(0.0, 0.0, 1080.0, 220.0),
            fill: None,
            logo: Some(Rect::new(48.0, 48.0, 260.0, 110.0)),
            badge: BadgeRegion {
                rect: Rect::new(712.0, 48.0, 320.0, 150.0),
                fill: Color::WHITE,
                corner_radius: 16.0,
                status: TextStyle::new(30.0, 700, NAVY).aligned(TextAlign::Middle).spaced(3.0),
                price: TextStyle::new(52.0, 800, NAVY).aligned(TextAlign::Middle),
            },
        },
        photo_grid: PhotoGrid {
            hero: Rect::new(0.0, 0.0, 1080.0, 1080.0),
            secondary: vec![],
            placeholder: SLATE_700,
            placeholder_label: TextStyle::new(40.0, 600, SLATE_300).aligned(TextAlign::Middle),
        },
        photo_overlay: Some(GradientOverlay {
            rect: Rect::new(0.0, 760.0, 1080.0, 320.0),
            color: NAVY,
            from_opacity: 0.0,
            to_opacity: 1.0,
        }),
        address: AddressRegion {
            rect: Rect::new(48.0, 1110.0, 984.0, 170.0),
            fill: None,
            street_format: StreetFormat::LetterSpaced,
            primary: TextStyle::new(58.0, 800, Color::WHITE).spaced(4.0),
            secondary: TextStyle::new(36.0, 400, SLATE_300),
        },
        stats: StatRow {
            rect: Rect::new(48.0, 1300.0, 984.0, 120.0),
            value: TextStyle::new(48.0, 700, Color::WHITE),
            label: TextStyle::new(24.0, 600, SLATE_400).spaced(3.0),
            icon_color: AMBER,
            icon_size: 44.0,
            divider: Some(SLATE_700),
        },
        headline: Some(TextRegion {
            rect: Rect::new(48.0, 1450.0, 984.0, 130.0),
            style: TextStyle::new(50.0, 700, Color::WHITE),
            line_height: 62.0,
            max_lines: 2,
            max_chars: 70,
            truncation: TruncationMode::WordBoundary,
            gap_after: 24.0,
        }),
        description: TextRegion {
            rect: Rect::new(48.0, 1590.0, 984.0, 290.0),
            style: TextStyle::new(34.0, 400, SLATE_200),
            line_height: 48.0,
            max_lines: 6,
            max_chars: 320,
            truncation: TruncationMode::WordBoundary,
            gap_after: 0.0,
        },
        agent: None,
        open_house: Some(RibbonRegion {
            rect: Rect::new(0.0, 980.0, 1080.0, 100.0),
            fill: AMBER,
            text: TextStyle::new(44.0, 800, NAVY).aligned(TextAlign::Middle).spaced(4.0),
        }),
        layers: photos_first_layers(),
    }
}

fn social_square() -> TemplateSpec {
    let ink = Color::rgb(0x11, 0x18, 0x27);
    TemplateSpec {
        id: SOCIAL_SQUARE.to_string(),
        name: "Social Square".to_string(),
        summary: "Feed-format listing graphic with a single hero photo".to_string(),
        template_version: "2.1.0".to_string(),
        engine_min_version: default_engine_min_version(),
        canvas: CanvasSize { width: 1080, height: 1080 },
        print: None,
        background: ink,
        header: HeaderRegion {
            rect: Rect::new(0.0, 0.0, 1080.0, 180.0),
            fill: None,
            logo: Some(Rect::new(40.0, 40.0, 220.0, 90.0)),
            badge: BadgeRegion {
                rect: Rect::new(780.0, 40.0, 260.0, 120.0),
                fill: Color::WHITE,
                corner_radius: 12.0,
                status: TextStyle::new(24.0, 700, ink).aligned(TextAlign::Middle).spaced(2.0),
                price: TextStyle::new(42.0, 800, ink).aligned(TextAlign::Middle),
            },
        },
        photo_grid: PhotoGrid {
            hero: Rect::new(0.0, 0.0, 1080.0, 640.0),
            secondary: vec![],
            placeholder: SLATE_700,
            placeholder_label: TextStyle::new(34.0, 600, SLATE_300).aligned(TextAlign::Middle),
        },
        photo_overlay: Some(GradientOverlay {
            rect: Rect::new(0.0, 440.0, 1080.0, 200.0),
            color: ink,
            from_opacity: 0.0,
            to_opacity: 0.9,
        }),
        address: AddressRegion {
            rect: Rect::new(40.0, 660.0, 1000.0, 120.0),
            fill: None,
            street_format: StreetFormat::TokenSpaced,
            primary: TextStyle::new(44.0, 800, Color::WHITE),
            secondary: TextStyle::new(28.0, 400, SLATE_300),
        },
        stats: StatRow {
            rect: Rect::new(40.0, 790.0, 1000.0, 90.0),
            value: TextStyle::new(38.0, 700, Color::WHITE),
            label: TextStyle::new(20.0, 600, SLATE_400).spaced(2.0),
            icon_color: AMBER,
            icon_size: 34.0,
            divider: Some(SLATE_700),
        },
        headline: Some(TextRegion {
            rect: Rect::new(40.0, 892.0, 1000.0, 50.0),
            style: TextStyle::new(36.0, 700, Color::WHITE),
            line_height: 44.0,
            max_lines: 1,
            max_chars: 50,
            truncation: TruncationMode::WordBoundary,
            gap_after: 8.0,
        }),
        description: TextRegion {
            rect: Rect::new(40.0, 944.0, 1000.0, 110.0),
            style: TextStyle::new(26.0, 400, SLATE_200),
            line_height: 34.0,
            max_lines: 3,
            max_chars: 160,
            truncation: TruncationMode::WordBoundary,
            gap_after: 0.0,
        },
        agent: None,
        open_house: Some(RibbonRegion {
            rect: Rect::new(0.0, 570.0, 1080.0, 70.0),
            fill: AMBER,
            text: TextStyle::new(34.0, 800, ink).aligned(TextAlign::Middle).spaced(3.0),
        }),
        layers: photos_first_layers(),
    }
}

fn print_letter() -> TemplateSpec {
    TemplateSpec {
        id: PRINT_LETTER.to_string(),
        name: "Print Letter".to_string(),
        summary: "US Letter flyer at 300 dpi with three photos and an agent block".to_string(),
        template_version: "4.2.0".to_string(),
        engine_min_version: default_engine_min_version(),
        canvas: CanvasSize { width: 2550, height: 3300 },
        print: Some(PrintProfile::letter_300dpi()),
        background: Color::WHITE,
        header: HeaderRegion {
            rect: Rect::new(0.0, 0.0, 2550.0, 420.0),
            fill: Some(NAVY),
            logo: Some(Rect::new(150.0, 110.0, 700.0, 200.0)),
            badge: BadgeRegion {
                rect: Rect::new(1750.0, 90.0, 650.0, 240.0),
                fill: BRICK,
                corner_radius: 0.0,
                status: TextStyle::new(56.0, 700, Color::WHITE).aligned(TextAlign::Middle).spaced(6.0),
                price: TextStyle::new(104.0, 800, Color::WHITE).aligned(TextAlign::Middle),
            },
        },
        photo_grid: PhotoGrid {
            hero: Rect::new(150.0, 470.0, 2250.0, 1350.0),
            secondary: vec![
                Rect::new(150.0, 1850.0, 1110.0, 640.0),
                Rect::new(1290.0, 1850.0, 1110.0, 640.0),
            ],
            placeholder: SLATE_200,
            placeholder_label: TextStyle::new(64.0, 600, SLATE_500).aligned(TextAlign::Middle),
        },
        photo_overlay: None,
        address: AddressRegion {
            rect: Rect::new(150.0, 2520.0, 2250.0, 190.0),
            fill: None,
            street_format: StreetFormat::Plain,
            primary: TextStyle::new(92.0, 800, NAVY),
            secondary: TextStyle::new(56.0, 400, Color::rgb(0x47, 0x55, 0x69)),
        },
        stats: StatRow {
            rect: Rect::new(150.0, 2720.0, 2250.0, 150.0),
            value: TextStyle::new(72.0, 700, NAVY),
            label: TextStyle::new(36.0, 600, SLATE_500).spaced(4.0),
            icon_color: BRICK,
            icon_size: 72.0,
            divider: Some(SLATE_200),
        },
        headline: Some(TextRegion {
            rect: Rect::new(150.0, 2890.0, 1400.0, 152.0),
            style: TextStyle::new(64.0, 700, NAVY),
            line_height: 76.0,
            max_lines: 2,
            max_chars: 80,
            truncation: TruncationMode::WordBoundary,
            gap_after: 14.0,
        }),
        description: TextRegion {
            rect: Rect::new(150.0, 2990.0, 1400.0, 270.0),
            style: TextStyle::new(40.0, 400, SLATE_700),
            line_height: 54.0,
            max_lines: 4,
            max_chars: 420,
            truncation: TruncationMode::SentenceAware,
            gap_after: 0.0,
        },
        agent: Some(AgentRegion {
            rect: Rect::new(1650.0, 2890.0, 750.0, 370.0),
            fill: Some(SLATE_100),
            photo: Rect::new(1680.0, 2920.0, 220.0, 220.0),
            placeholder: SLATE_300,
            name: TextStyle::new(52.0, 700, NAVY),
            title: TextStyle::new(36.0, 400, SLATE_500),
            phone: TextStyle::new(40.0, 600, NAVY),
            logo_mark: Some(Rect::new(1680.0, 3170.0, 300.0, 70.0)),
        }),
        open_house: Some(RibbonRegion {
            rect: Rect::new(150.0, 1720.0, 2250.0, 100.0),
            fill: BRICK,
            text: TextStyle::new(56.0, 800, Color::WHITE).aligned(TextAlign::Middle).spaced(6.0),
        }),
        layers: default_layers(),
    }
}
