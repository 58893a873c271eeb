//! Compositor - draws a listing graphic as an SVG scene
//!
//! Composition is a pure function of the descriptor, the slot assignment, the
//! loaded images, the planned text and the template. Layers are painted in the
//! order the template lists them:
//!
//! - background
//! - header: logo and the fixed-size status/price badge
//! - address
//! - photo grid (cover-fit crops or numbered placeholders), then the legibility gradient
//! - stat row
//! - headline and description
//! - agent block
//! - open-house ribbon

use base64::Engine as _;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};
use thiserror::Error;

use crate::descriptor::{format_price, format_stat, title_case, AssetDescriptor};
use crate::geometry::{cover_fit, Color, Rect};
use crate::icons::Icon;
use crate::loader::{ResolvedImage, ResourceSet};
use crate::raster::{encode_png, Rasterizer};
use crate::slots::{PhotoSlotAssignment, SlotEntry};
use crate::templates::{Layer, TextAlign, TextRegion, TextStyle, TemplateSpec};
use crate::text::{clamp_headline, fit_line, fit_wrapped, format_street, layout_text, FittedText, FontSpec, TextMeasure};

/// Cap height as a fraction of font size, used to center text in a line box.
const CAP_HEIGHT: f32 = 0.7;

const STAT_LABELS: [(Icon, &str); 3] = [(Icon::Bed, "BEDS"), (Icon::Bath, "BATHS"), (Icon::Area, "SQ FT")];

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("scene could not be parsed: {0}")]
    Scene(String),

    #[error("cannot allocate a {width}x{height} canvas")]
    Canvas { width: u32, height: u32 },

    #[error("failed to encode embedded image: {0}")]
    Embed(String),

    #[error("failed to encode png: {0}")]
    Encode(String),

    #[error("composition task failed: {0}")]
    Task(String),
}

/// Fitted lines anchored at the top of their first line box.
#[derive(Debug, Clone, Default)]
pub struct PlacedText {
    pub text: FittedText,
    pub top: f32,
}

/// All measured text, wrapped and positioned before drawing starts.
#[derive(Debug, Clone, Default)]
pub struct TextLayout {
    pub street: FittedText,
    pub locality: FittedText,
    pub headline: Option<PlacedText>,
    pub description: PlacedText,
}

/// Fit the address lines and the headline, then let the description start
/// below whatever the headline actually occupied. The headline shrinks to fit
/// its lines; the description loses lines rather than spilling past the
/// bottom of its region.
pub fn plan_text(descriptor: &AssetDescriptor, template: &TemplateSpec, measure: &dyn TextMeasure) -> TextLayout {
    let address = &template.address;
    let (street, locality) = descriptor.address_lines();
    let street = fit_line(
        &format_street(&street, address.street_format),
        address.rect.width,
        &FontSpec::from(&address.primary),
        measure,
    );
    let locality = fit_line(&locality, address.rect.width, &FontSpec::from(&address.secondary), measure);

    let headline_text = descriptor
        .headline
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty());
    let headline = template.headline.as_ref().zip(headline_text).map(|(region, text)| {
        let text = clamp_headline(text, region.max_chars);
        PlacedText {
            text: fit_wrapped(&text, region.rect.width, region.max_lines, &FontSpec::from(&region.style), measure),
            top: region.rect.y,
        }
    });

    let region = &template.description;
    let top = match (&template.headline, &headline) {
        (Some(h), Some(placed)) => placed.top + placed.text.lines.len() as f32 * h.line_height + h.gap_after,
        (Some(h), None) => h.rect.y,
        (None, _) => region.rect.y,
    };
    let room = ((region.rect.bottom() - top) / region.line_height).floor().max(0.0) as usize;
    let max_lines = room.min(region.max_lines);
    let description = if max_lines == 0 {
        FittedText::default()
    } else {
        layout_text(
            &descriptor.description,
            region.max_chars,
            region.truncation,
            region.rect.width,
            max_lines,
            &FontSpec::from(&region.style),
            measure,
        )
        .into()
    };
    TextLayout {
        street,
        locality,
        headline,
        description: PlacedText { text: description, top },
    }
}

/// Everything one graphic is drawn from.
pub struct Scene<'a> {
    pub descriptor: &'a AssetDescriptor,
    pub template: &'a TemplateSpec,
    pub slots: &'a PhotoSlotAssignment,
    pub images: &'a ResourceSet,
    pub text: &'a TextLayout,
}

/// Draw the scene and encode it as PNG at the template's canvas size.
pub fn compose(scene: &Scene<'_>, rasterizer: &Rasterizer) -> Result<Vec<u8>, ComposeError> {
    let svg = build_scene(scene, rasterizer.font_family())?;
    let canvas = scene.template.canvas;
    let pixmap = rasterizer.rasterize(&svg, canvas.width, canvas.height)?;
    encode_png(&pixmap, scene.template.print.as_ref())
}

pub fn build_scene(scene: &Scene<'_>, font_family: &str) -> Result<String, ComposeError> {
    let mut svg = SceneWriter::new(scene.template, font_family);
    for layer in &scene.template.layers {
        match layer {
            Layer::Background => svg.background(),
            Layer::Header => svg.header(scene.descriptor, scene.images)?,
            Layer::Photos => svg.photos(scene.slots, scene.images)?,
            Layer::Address => svg.address(scene.text),
            Layer::Stats => svg.stats(scene.descriptor),
            Layer::Copy => svg.copy(scene.text),
            Layer::Agent => svg.agent(scene.descriptor, scene.images)?,
            Layer::OpenHouse => svg.ribbon(scene.descriptor),
        }
    }
    Ok(svg.finish())
}

struct SceneWriter<'a> {
    out: String,
    template: &'a TemplateSpec,
    font_family: String,
}

impl<'a> SceneWriter<'a> {
    fn new(template: &'a TemplateSpec, font_family: &str) -> Self {
        let (w, h) = (template.canvas.width, template.canvas.height);
        let out = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
        );
        Self {
            out,
            template,
            font_family: escape(font_family),
        }
    }

    fn finish(mut self) -> String {
        self.out.push_str("</svg>");
        self.out
    }

    fn background(&mut self) {
        let canvas = self.template.canvas;
        let rect = Rect::new(0.0, 0.0, canvas.width as f32, canvas.height as f32);
        self.rect(rect, self.template.background, 0.0);
    }

    fn photos(&mut self, slots: &PhotoSlotAssignment, images: &ResourceSet) -> Result<(), ComposeError> {
        let template = self.template;
        let grid = &template.photo_grid;
        for (index, (dest, entry)) in grid.slots().into_iter().zip(slots.slots()).enumerate() {
            let embedded = match entry {
                SlotEntry::Photo(photo) => images.get(photo).map(|image| cover_data_uri(image, dest)).transpose()?.flatten(),
                SlotEntry::Empty => None,
            };
            match embedded {
                Some(uri) => self.image(dest, &uri, "none", None),
                None => {
                    self.rect(dest, grid.placeholder, 0.0);
                    let label = format!("Photo {}", index + 1);
                    let baseline = dest.center_y() + grid.placeholder_label.font_size * CAP_HEIGHT / 2.0;
                    self.text(dest, baseline, &label, &grid.placeholder_label);
                }
            }
        }

        if let Some(overlay) = &template.photo_overlay {
            self.out.push_str(&format!(
                r#"<defs><linearGradient id="photo-fade" x1="0" y1="0" x2="0" y2="1"><stop offset="0" stop-color="{c}" stop-opacity="{from}"/><stop offset="1" stop-color="{c}" stop-opacity="{to}"/></linearGradient></defs>"#,
                c = overlay.color.svg_rgb(),
                from = overlay.from_opacity,
                to = overlay.to_opacity,
            ));
            let r = overlay.rect;
            self.out.push_str(&format!(
                r#"<rect x="{}" y="{}" width="{}" height="{}" fill="url(#photo-fade)"/>"#,
                r.x, r.y, r.width, r.height
            ));
        }
        Ok(())
    }

    fn header(&mut self, descriptor: &AssetDescriptor, images: &ResourceSet) -> Result<(), ComposeError> {
        let template = self.template;
        let header = &template.header;
        if let Some(fill) = header.fill {
            self.rect(header.rect, fill, 0.0);
        }
        if let Some(area) = header.logo {
            self.logo(descriptor, images, area)?;
        }

        // Badge geometry comes from the template only; long text is not refitted.
        let badge = &header.badge;
        self.rect(badge.rect, badge.fill, badge.corner_radius);
        let gap = badge.status.font_size * 0.35;
        let total = badge.status.font_size + gap + badge.price.font_size;
        let start = badge.rect.y + (badge.rect.height - total) / 2.0;
        let status_baseline = start + badge.status.font_size * 0.8;
        let price_baseline = start + badge.status.font_size + gap + badge.price.font_size * 0.8;
        self.text(badge.rect, status_baseline, descriptor.status.label(), &badge.status);
        self.text(badge.rect, price_baseline, &format_price(&descriptor.price), &badge.price);
        Ok(())
    }

    fn logo(&mut self, descriptor: &AssetDescriptor, images: &ResourceSet, area: Rect) -> Result<(), ComposeError> {
        let Some(image) = descriptor.logo.as_ref().and_then(|logo| images.get(logo)) else {
            return Ok(());
        };
        let uri = contain_data_uri(image, area)?;
        self.image(area, &uri, "xMidYMid meet", None);
        Ok(())
    }

    fn address(&mut self, layout: &TextLayout) {
        let template = self.template;
        let region = &template.address;
        if let Some(fill) = region.fill {
            self.rect(region.rect, fill, 0.0);
        }
        // Baselines follow the styled sizes so a shrunk street keeps the locality in place.
        let street_baseline = region.rect.y + region.primary.font_size * 0.9;
        if let Some(line) = layout.street.lines.first() {
            self.text(region.rect, street_baseline, line, &region.primary.scaled(layout.street.scale));
        }
        if let Some(line) = layout.locality.lines.first() {
            let baseline = street_baseline + region.secondary.font_size * 1.5;
            self.text(region.rect, baseline, line, &region.secondary.scaled(layout.locality.scale));
        }
    }

    fn stats(&mut self, descriptor: &AssetDescriptor) {
        let template = self.template;
        let row = &template.stats;
        let values = [
            format_stat(descriptor.bedrooms.as_deref()),
            format_stat(descriptor.bathrooms.as_deref()),
            format_stat(descriptor.square_feet.as_deref()),
        ];
        let pad = row.icon_size * 0.5;
        for (i, (column, ((icon, label), value))) in row
            .rect
            .columns(STAT_LABELS.len(), 0.0)
            .into_iter()
            .zip(STAT_LABELS.iter().zip(&values))
            .enumerate()
        {
            let mut x = column.x;
            if i > 0 {
                if let Some(divider) = row.divider {
                    self.rect(Rect::new(column.x, column.y + column.height * 0.1, 2.0, column.height * 0.8), divider, 0.0);
                }
                x += pad;
            }
            let icon_y = column.y + (column.height * 0.55 - row.icon_size) / 2.0;
            self.out.push_str(&icon.svg(x, icon_y.max(column.y), row.icon_size, row.icon_color));

            let text_x = x + row.icon_size + row.icon_size * 0.35;
            let text_box = Rect::new(text_x, column.y, (column.right() - text_x).max(0.0), column.height);
            self.text(text_box, column.y + column.height * 0.5, value, &row.value);
            self.text(
                Rect::new(x, column.y, column.right() - x, column.height),
                column.y + column.height * 0.92,
                label,
                &row.label,
            );
        }
    }

    fn copy(&mut self, layout: &TextLayout) {
        let template = self.template;
        if let (Some(region), Some(placed)) = (&template.headline, &layout.headline) {
            self.lines(region, placed);
        }
        let region = &template.description;
        self.lines(region, &layout.description);
    }

    fn lines(&mut self, region: &TextRegion, placed: &PlacedText) {
        let style = region.style.scaled(placed.text.scale);
        for (i, line) in placed.text.lines.iter().enumerate() {
            let line_top = placed.top + i as f32 * region.line_height;
            let baseline = line_top + (region.line_height + style.font_size * CAP_HEIGHT) / 2.0;
            self.text(region.rect, baseline, line, &style);
        }
    }

    fn agent(&mut self, descriptor: &AssetDescriptor, images: &ResourceSet) -> Result<(), ComposeError> {
        let template = self.template;
        let (Some(region), Some(agent)) = (&template.agent, &descriptor.agent) else {
            return Ok(());
        };
        if let Some(fill) = region.fill {
            self.rect(region.rect, fill, 0.0);
        }

        let photo = region.photo;
        let radius = photo.width.min(photo.height) / 2.0;
        let portrait = agent
            .photo
            .as_ref()
            .and_then(|p| images.get(p))
            .map(|image| cover_data_uri(image, photo))
            .transpose()?
            .flatten();
        match portrait {
            Some(uri) => {
                self.out.push_str(&format!(
                    r#"<defs><clipPath id="agent-photo"><circle cx="{}" cy="{}" r="{radius}"/></clipPath></defs>"#,
                    photo.center_x(),
                    photo.center_y()
                ));
                self.image(photo, &uri, "none", Some("agent-photo"));
            }
            None => {
                self.out.push_str(&format!(
                    r#"<circle cx="{}" cy="{}" r="{radius}" fill="{}"/>"#,
                    photo.center_x(),
                    photo.center_y(),
                    region.placeholder.svg_rgb()
                ));
                let size = radius * 1.3;
                self.out.push_str(&Icon::Person.svg(
                    photo.center_x() - size / 2.0,
                    photo.center_y() - size / 2.0,
                    size,
                    Color::WHITE,
                ));
            }
        }

        let x = photo.right() + photo.width * 0.15;
        let text_box = Rect::new(x, region.rect.y, (region.rect.right() - x).max(0.0), region.rect.height);
        let mut baseline = photo.y + region.name.font_size * 0.9;
        self.text(text_box, baseline, &title_case(&agent.name), &region.name);
        for (value, style) in [(&agent.title, &region.title), (&agent.phone, &region.phone)] {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                baseline += style.font_size * 1.5;
                self.text(text_box, baseline, value, style);
            }
        }

        if let Some(area) = region.logo_mark {
            self.logo(descriptor, images, area)?;
        }
        Ok(())
    }

    fn ribbon(&mut self, descriptor: &AssetDescriptor) {
        let template = self.template;
        let (Some(region), Some(parts)) = (&template.open_house, descriptor.open_house_parts()) else {
            return;
        };
        self.rect(region.rect, region.fill, 0.0);
        let label = format!("OPEN HOUSE \u{00b7} {}", parts.join(" \u{00b7} ").to_uppercase());
        let baseline = region.rect.center_y() + region.text.font_size * CAP_HEIGHT / 2.0;
        self.text(region.rect, baseline, &label, &region.text);
    }

    fn rect(&mut self, r: Rect, fill: Color, radius: f32) {
        self.out.push_str(&format!(
            r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{radius}" fill="{}" fill-opacity="{}"/>"#,
            r.x,
            r.y,
            r.width,
            r.height,
            fill.svg_rgb(),
            fill.opacity()
        ));
    }

    fn image(&mut self, r: Rect, uri: &str, aspect: &str, clip: Option<&str>) {
        let clip = clip.map(|id| format!(r#" clip-path="url(#{id})""#)).unwrap_or_default();
        self.out.push_str(&format!(
            r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="{aspect}" href="{uri}"{clip}/>"#,
            r.x, r.y, r.width, r.height
        ));
    }

    /// One line of text; `bounds` supplies the anchor for the style's alignment.
    fn text(&mut self, bounds: Rect, baseline: f32, content: &str, style: &TextStyle) {
        if content.is_empty() {
            return;
        }
        let (x, anchor) = match style.align {
            TextAlign::Start => (bounds.x, "start"),
            TextAlign::Middle => (bounds.center_x(), "middle"),
            TextAlign::End => (bounds.right(), "end"),
        };
        self.out.push_str(&format!(
            r#"<text x="{x}" y="{baseline}" text-anchor="{anchor}" font-family="{family}" font-size="{size}" font-weight="{weight}" letter-spacing="{spacing}" fill="{fill}" fill-opacity="{opacity}" xml:space="preserve">{content}</text>"#,
            family = self.font_family,
            size = style.font_size,
            weight = style.font_weight,
            spacing = style.letter_spacing,
            fill = style.color.svg_rgb(),
            opacity = style.color.opacity(),
            content = escape(content),
        ));
    }
}

/// Cover-fit crop of `image` for `dest`, downscaled to the destination's pixel
/// size. `None` for an image with no pixels.
fn cover_data_uri(image: &ResolvedImage, dest: Rect) -> Result<Option<String>, ComposeError> {
    if image.is_empty() {
        return Ok(None);
    }
    let Some(crop) = cover_fit(image.width(), image.height(), dest.width, dest.height) else {
        return Ok(None);
    };
    let cropped = imageops::crop_imm(image.pixels(), crop.x, crop.y, crop.width, crop.height).to_image();
    let target_w = (dest.width.round() as u32).max(1);
    let target_h = (dest.height.round() as u32).max(1);
    let pixels = if cropped.width() > target_w || cropped.height() > target_h {
        imageops::resize(&cropped, target_w, target_h, FilterType::Triangle)
    } else {
        cropped
    };
    png_data_uri(&pixels).map(Some)
}

/// Whole image scaled down to fit inside `area`; placement is left to
/// `preserveAspectRatio`.
fn contain_data_uri(image: &ResolvedImage, area: Rect) -> Result<String, ComposeError> {
    let (w, h) = (image.width().max(1) as f32, image.height().max(1) as f32);
    let scale = (area.width / w).min(area.height / h);
    if scale >= 1.0 {
        return png_data_uri(image.pixels());
    }
    let target_w = ((w * scale).round() as u32).max(1);
    let target_h = ((h * scale).round() as u32).max(1);
    png_data_uri(&imageops::resize(image.pixels(), target_w, target_h, FilterType::Triangle))
}

fn png_data_uri(pixels: &RgbaImage) -> Result<String, ComposeError> {
    let mut bytes = Vec::new();
    PngEncoder::new_with_quality(&mut bytes, CompressionType::Fast, PngFilter::Adaptive)
        .write_image(pixels.as_raw(), pixels.width(), pixels.height(), ExtendedColorType::Rgba8)
        .map_err(|e| ComposeError::Embed(e.to_string()))?;
    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

/// XML-escape free text. Characters XML 1.0 cannot carry are dropped.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}
