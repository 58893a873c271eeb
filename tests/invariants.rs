//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees of a render.

use image::{ImageFormat, ImageReader, Rgba, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use listing_graphics_core::{
    assign_slots, canonical_json,
    loader::{Fetch, LoadError},
    slots::{PhotoSelection, PhotoSuggestion, SlotEntry, UploadOutcome},
    templates::{PRINT_LETTER, SOCIAL_PORTRAIT, SOCIAL_SQUARE},
    AssetDescriptor, EngineConfig, PhotoRef, RenderEngine, RenderError, TemplateRegistry,
};

const HERO: &str = "https://mls.test/listing/IMG-100_1.jpg";
const SECOND: &str = "https://mls.test/listing/IMG-100_2.jpg";
const THIRD: &str = "https://mls.test/listing/IMG-100_3.jpg";

/// Serves canned bytes; anything else is a 404.
struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
    delay: Duration,
}

impl Fetch for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        tokio::time::sleep(self.delay).await;
        self.files.get(url).cloned().ok_or(LoadError::Status(404))
    }
}

fn photo_bytes(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([shade, (x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 255])
    });
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn config() -> EngineConfig {
    EngineConfig {
        resource_timeout_ms: 2_000,
        load_system_fonts: false,
        ..EngineConfig::default()
    }
}

/// Bundled DejaVu Sans faces, so text is actually rasterized.
fn font_config() -> EngineConfig {
    let fonts = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fonts");
    EngineConfig {
        font_files: vec![fonts.join("DejaVuSans.ttf"), fonts.join("DejaVuSans-Bold.ttf")],
        font_family: "'DejaVu Sans', sans-serif".to_string(),
        ..config()
    }
}

fn engine_serving(urls: &[&str]) -> RenderEngine<MemoryFetcher> {
    engine_with(urls, Duration::ZERO, config())
}

fn engine_with(urls: &[&str], delay: Duration, config: EngineConfig) -> RenderEngine<MemoryFetcher> {
    let files = urls
        .iter()
        .enumerate()
        .map(|(i, url)| (url.to_string(), photo_bytes(64, 48, 40 * i as u8)))
        .collect();
    RenderEngine::with_fetcher(TemplateRegistry::builtin(), MemoryFetcher { files, delay }, &config)
}

fn descriptor(format: &str, photos: &[&str]) -> AssetDescriptor {
    serde_json::from_value(serde_json::json!({
        "format": format,
        "status": "just-listed",
        "price": "685000",
        "bedrooms": "3",
        "bathrooms": "2",
        "squareFeet": "1840",
        "address": "42 Harbor View Dr\nPortland, ME 04101",
        "description": "Sunlit rooms, a chef's kitchen and a deck over the water. Walk to the ferry.",
        "headline": "Harbor views",
        "photoRefs": photos,
        "agent": {"name": "ALEX MORGAN", "title": "Broker", "phone": "207-555-0134"}
    }))
    .unwrap()
}

fn png_dimensions(bytes: &[u8]) -> (u32, u32) {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .unwrap()
        .into_dimensions()
        .unwrap()
}

#[tokio::test]
async fn invariant_output_matches_template_dimensions() {
    let engine = engine_serving(&[HERO, SECOND, THIRD]);
    for format in [SOCIAL_PORTRAIT, SOCIAL_SQUARE, PRINT_LETTER] {
        let asset = engine.render(&descriptor(format, &[HERO, SECOND, THIRD])).await.unwrap();
        let template = engine.get_template(format).unwrap();
        assert!(!asset.png.is_empty());
        assert_eq!(png_dimensions(&asset.png), (template.canvas.width, template.canvas.height));
        assert_eq!((asset.width, asset.height), (template.canvas.width, template.canvas.height));
        assert_eq!(asset.format, format);
        assert_eq!(asset.status_label, "JUST LISTED");
    }
}

#[tokio::test]
async fn invariant_render_is_idempotent() {
    let engine = engine_serving(&[HERO]);
    let input = descriptor(SOCIAL_SQUARE, &[HERO]);
    let first = engine.render(&input).await.unwrap();
    let second = engine.render(&input).await.unwrap();
    assert_eq!(first.png, second.png);
    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(first.job_hash, second.job_hash);
}

#[tokio::test]
async fn invariant_job_hash_tracks_descriptor() {
    let engine = engine_serving(&[HERO]);
    let a = engine.render(&descriptor(SOCIAL_SQUARE, &[HERO])).await.unwrap();
    let mut changed = descriptor(SOCIAL_SQUARE, &[HERO]);
    changed.price = "690000".to_string();
    let b = engine.render(&changed).await.unwrap();
    assert_ne!(a.job_hash, b.job_hash);
}

#[tokio::test]
async fn invariant_missing_hero_aborts() {
    let engine = engine_serving(&[SECOND]);
    let err = engine
        .render(&descriptor(PRINT_LETTER, &[HERO, SECOND]))
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::MissingRequiredPhoto));
    assert!(err.user_message().contains("photo"));
}

#[tokio::test]
async fn invariant_no_photos_aborts() {
    let engine = engine_serving(&[]);
    let err = engine.render(&descriptor(SOCIAL_PORTRAIT, &[])).await.unwrap_err();
    assert!(matches!(err, RenderError::MissingRequiredPhoto));
}

#[tokio::test]
async fn invariant_hero_timeout_is_fatal() {
    let config = EngineConfig {
        resource_timeout_ms: 50,
        ..config()
    };
    let engine = engine_with(&[HERO], Duration::from_secs(10), config);
    let err = engine.render(&descriptor(SOCIAL_SQUARE, &[HERO])).await.unwrap_err();
    assert!(matches!(err, RenderError::MissingRequiredPhoto));
}

#[tokio::test]
async fn invariant_secondary_failure_degrades_to_placeholder() {
    let engine = engine_serving(&[HERO]);
    let mut input = descriptor(PRINT_LETTER, &[HERO, SECOND, THIRD]);
    input.logo = Some(PhotoRef::parse("https://brand.test/missing-logo.png").unwrap());
    let asset = engine.render(&input).await.unwrap();
    assert_eq!(png_dimensions(&asset.png), (2550, 3300));
    assert_eq!(asset.dpi, Some(300));
}

#[tokio::test]
async fn invariant_unknown_template_error() {
    let engine = engine_serving(&[HERO]);
    let err = engine.render(&descriptor("billboard", &[HERO])).await.unwrap_err();
    assert!(matches!(err, RenderError::UnknownTemplate(_)));
    assert!(err.to_string().contains("billboard"));
}

#[tokio::test]
async fn invariant_render_calls_validate() {
    let engine = engine_serving(&[HERO]);

    let mut long_headline = descriptor(SOCIAL_SQUARE, &[HERO]);
    long_headline.headline = Some("An extraordinary waterfront residence with panoramic harbor views".to_string());
    let err = engine.render(&long_headline).await.unwrap_err();
    assert!(matches!(err, RenderError::ValidationFailed(_)));
    assert!(err.to_string().contains("headline_length"));

    let mut no_price = descriptor(SOCIAL_SQUARE, &[HERO]);
    no_price.price = String::new();
    let err = engine.render(&no_price).await.unwrap_err();
    assert!(err.to_string().contains("price_required"));
}

#[tokio::test]
async fn invariant_warnings_travel_with_output() {
    let engine = engine_serving(&[HERO]);
    let mut input = descriptor(SOCIAL_SQUARE, &[HERO, SECOND]);
    input.description = "Sunlit rooms and a deck over the water. ".repeat(10);
    let asset = engine.render(&input).await.unwrap();
    let rules: Vec<_> = asset.warnings.iter().map(|w| w.rule.as_str()).collect();
    assert_eq!(rules, vec!["description_budget", "photo_capacity"]);
}

#[tokio::test]
async fn invariant_awkward_text_renders_with_real_fonts() {
    let engine = engine_with(&[HERO, SECOND, THIRD], Duration::ZERO, font_config());
    for format in [SOCIAL_PORTRAIT, SOCIAL_SQUARE, PRINT_LETTER] {
        let mut input = descriptor(format, &[HERO, SECOND, THIRD]);
        input.headline = Some("Bell\u{7} & <whistle> \"ready\"".to_string());
        input.description = "Tom & Jerry's <loft>.\u{8} Ready\u{0}now!\tCall today\u{1F}.".to_string();
        input.address =
            "98765 North Extraordinarily Long Waterfront Boulevard Extension Unit 4412\nPortland\u{C}, ME 04101"
                .to_string();
        if let Some(agent) = input.agent.as_mut() {
            agent.name = "o'brien\u{1} & sons".to_string();
        }
        let asset = engine.render(&input).await.unwrap();
        let template = engine.get_template(format).unwrap();
        assert_eq!(png_dimensions(&asset.png), (template.canvas.width, template.canvas.height));
    }
}

#[tokio::test]
async fn invariant_text_is_rasterized_when_fonts_load() {
    let with_fonts = engine_with(&[HERO], Duration::ZERO, font_config());
    let without_fonts = engine_serving(&[HERO]);
    let input = descriptor(SOCIAL_SQUARE, &[HERO]);
    let drawn = with_fonts.render(&input).await.unwrap();
    let blank = without_fonts.render(&input).await.unwrap();
    assert_ne!(drawn.content_hash, blank.content_hash);
    assert_eq!(drawn.job_hash, blank.job_hash);
}

#[test]
fn invariant_validation_result_structure() {
    let engine = engine_serving(&[]);
    let mut input = descriptor(SOCIAL_PORTRAIT, &[HERO]);
    input.price = " ".to_string();
    let result = engine.validate(&input).unwrap();

    assert!(!result.valid);
    assert!(!result.violations.is_empty());
    for v in &result.violations {
        assert!(!v.rule.is_empty());
        assert!(!v.message.is_empty());
    }
    assert_eq!(result.template_id, SOCIAL_PORTRAIT);
    assert_eq!(result.template_version, "3.0.0");
}

#[test]
fn invariant_slot_count_never_exceeds_capacity() {
    let pool: Vec<PhotoRef> = (0..8)
        .map(|i| PhotoRef::parse(&format!("https://cdn.test/p{i}.jpg")).unwrap())
        .collect();
    for capacity in 1..=4 {
        let mut selection = PhotoSelection::new(capacity);
        for (step, photo) in pool.iter().enumerate() {
            if step % 3 == 0 {
                selection.upload(vec![photo.clone(), pool[(step + 1) % pool.len()].clone()]);
            } else {
                selection.toggle(photo.clone());
            }
            assert!(selection.total() <= capacity);
            assert_eq!(selection.assignment().len(), capacity);
        }
        assert_eq!(assign_slots(&pool, &pool, capacity).len(), capacity);
    }
}

#[test]
fn invariant_overflow_upload_replaces_selection() {
    let registry = TemplateRegistry::builtin();
    let capacity = registry.get(PRINT_LETTER).unwrap().capacity();
    let mut selection = PhotoSelection::new(capacity);
    for url in [HERO, SECOND, THIRD] {
        selection.toggle(PhotoRef::parse(url).unwrap());
    }
    let upload = PhotoRef::parse("data:image/png;base64,iVBORw0KGgo=").unwrap();
    let outcome = selection.upload(vec![upload.clone()]);
    assert_eq!(outcome, UploadOutcome::Replaced { cleared: 3, accepted: 1 });
    assert!(selection.manual().is_empty());

    let assignment = selection.assignment();
    assert!(assignment.len() <= capacity);
    assert_eq!(assignment.photos().cloned().collect::<Vec<_>>(), vec![upload]);
}

#[test]
fn invariant_auto_select_prefers_local_copy() {
    let local = PhotoRef::parse("https://photos.myapp.test/cache/IMG-ABC123_4.jpg?w=1600").unwrap();
    let other = PhotoRef::parse("https://photos.myapp.test/cache/IMG-ABC123_5.jpg").unwrap();
    let suggestion = PhotoSuggestion {
        url: "https://mls-feed.test/media/IMG-ABC123_4.jpg".to_string(),
        classification: Some("Kitchen".to_string()),
        quality_score: Some(0.92),
    };
    let mut selection = PhotoSelection::new(1);
    assert_eq!(selection.auto_select(&[suggestion], &[other, local.clone()]), 1);
    let assignment = selection.assignment();
    assert!(matches!(assignment.slots(), [SlotEntry::Photo(p)] if *p == local));
}

#[test]
fn invariant_canonical_json_deterministic() {
    use serde_json::json;

    let obj1 = json!({"z": 1, "a": 2, "m": {"b": 1, "a": 2}});
    let obj2 = json!({"a": 2, "m": {"a": 2, "b": 1}, "z": 1});

    assert_eq!(canonical_json(&obj1).unwrap(), canonical_json(&obj2).unwrap());
}

#[cfg(feature = "test-hooks")]
#[tokio::test]
async fn invariant_validation_counted_per_render() {
    use listing_graphics_core::pipeline::get_validation_call_count;

    let engine = engine_serving(&[HERO]);
    let before = get_validation_call_count();
    engine.render(&descriptor(SOCIAL_SQUARE, &[HERO])).await.unwrap();
    assert!(get_validation_call_count() > before);
}
