//! Render Pipeline - Single Entry Point
//!
//! `render` is the only way to produce a graphic. On-screen previews and
//! downloaded artifacts both call it with the same descriptor; there is no
//! second drawing path.
//!
//! Order: resolve template -> engine version gate -> validate -> assign slots
//! -> load resources (concurrent, joined) -> plan text -> compose -> hash.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use crate::compositor::{compose, plan_text, ComposeError, Scene};
use crate::config::EngineConfig;
use crate::descriptor::AssetDescriptor;
use crate::hashing::{compute_job_hash, sha256_hex};
use crate::loader::{Fetch, HttpFetcher, LoadError, ResourceLoader, ResourceRequest};
use crate::raster::Rasterizer;
use crate::slots::{assign_slots, PhotoSlotAssignment};
use crate::templates::{TemplateRegistry, TemplateSpec, UnknownTemplate};
use crate::text::TextMeasure;
use crate::validation::{ValidationResult, ValidationViolation, Validator};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("the hero photo is missing or could not be loaded")]
    MissingRequiredPhoto,

    #[error(transparent)]
    UnknownTemplate(#[from] UnknownTemplate),

    #[error("validation failed: {}", .0.error_summary())]
    ValidationFailed(ValidationResult),

    #[error("template {template} requires engine >= {required}, current is {engine}")]
    EngineVersionMismatch {
        template: String,
        required: String,
        engine: String,
    },

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RenderError {
    /// The single terminal message shown to the person who asked for the graphic.
    pub fn user_message(&self) -> &'static str {
        match self {
            RenderError::MissingRequiredPhoto => "Add at least one photo to create this graphic.",
            RenderError::ValidationFailed(_) => "Some listing details need attention before this graphic can be created.",
            RenderError::UnknownTemplate(_) | RenderError::EngineVersionMismatch { .. } => {
                "This graphic format is not available."
            }
            RenderError::Compose(_) | RenderError::Serialization(_) => {
                "Something went wrong while rendering. Please try again."
            }
        }
    }
}

/// Output bytes plus the metadata a caller stores alongside them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedAsset {
    pub format: String,
    pub status_label: String,
    pub width: u32,
    pub height: u32,
    pub dpi: Option<u32>,
    pub template_version: String,
    pub engine_version: String,
    pub job_hash: String,
    pub content_hash: String,
    pub warnings: Vec<ValidationViolation>,
    #[serde(skip)]
    pub png: Vec<u8>,
}

/// The render engine - single entry point for all graphic production
pub struct RenderEngine<F: Fetch = HttpFetcher> {
    registry: TemplateRegistry,
    validator: Validator,
    loader: ResourceLoader<F>,
    rasterizer: Arc<Rasterizer>,
    measure: Arc<dyn TextMeasure>,
}

impl RenderEngine<HttpFetcher> {
    pub fn new(registry: TemplateRegistry, config: &EngineConfig) -> Result<Self, LoadError> {
        Ok(Self::with_fetcher(registry, HttpFetcher::new(config)?, config))
    }
}

impl<F: Fetch> RenderEngine<F> {
    pub fn with_fetcher(registry: TemplateRegistry, fetcher: F, config: &EngineConfig) -> Self {
        let rasterizer = Rasterizer::from_config(config);
        let measure = rasterizer.measure();
        Self {
            registry,
            validator: Validator::new(),
            loader: ResourceLoader::new(fetcher, config),
            rasterizer: Arc::new(rasterizer),
            measure,
        }
    }

    /// List all available templates
    pub fn list_templates(&self) -> Vec<&TemplateSpec> {
        self.registry.list()
    }

    /// Get a specific template
    pub fn get_template(&self, id: &str) -> Option<&TemplateSpec> {
        self.registry.get(id)
    }

    /// Validate a descriptor against the template it names.
    pub fn validate(&self, descriptor: &AssetDescriptor) -> Result<ValidationResult, RenderError> {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let template = self.registry.resolve(&descriptor.format)?;
        check_engine_version(template)?;
        Ok(self.validator.validate(descriptor, template))
    }

    /// Render one graphic.
    ///
    /// Validation always runs first and any error blocks the render. Only the
    /// hero photo is required; every other resource degrades to a placeholder.
    pub async fn render(&self, descriptor: &AssetDescriptor) -> Result<RenderedAsset, RenderError> {
        let started = Instant::now();
        let template = self.registry.resolve(&descriptor.format)?;
        let report = self.validate(descriptor)?;
        if !report.valid {
            return Err(RenderError::ValidationFailed(report));
        }

        let slots = assign_slots(&descriptor.photo_refs, &[], template.capacity());
        let hero = slots.hero().cloned().ok_or(RenderError::MissingRequiredPhoto)?;
        let images = self.loader.load_all(resource_requests(descriptor, template, &slots)).await;
        if images.get(&hero).is_none() {
            debug!(
                format = %template.id,
                error = %images.failure(&hero).map(ToString::to_string).unwrap_or_default(),
                "hero photo unavailable"
            );
            return Err(RenderError::MissingRequiredPhoto);
        }

        let text = plan_text(descriptor, template, self.measure.as_ref());
        let rasterizer = self.rasterizer.clone();
        let owned_template = template.clone();
        let owned_descriptor = descriptor.clone();
        let png = tokio::task::spawn_blocking(move || {
            let scene = Scene {
                descriptor: &owned_descriptor,
                template: &owned_template,
                slots: &slots,
                images: &images,
                text: &text,
            };
            compose(&scene, &rasterizer)
        })
        .await
        .map_err(|e| ComposeError::Task(e.to_string()))??;

        let job_hash = compute_job_hash(&template.id, &template.template_version, descriptor, ENGINE_VERSION)?;
        let asset = RenderedAsset {
            format: template.id.clone(),
            status_label: descriptor.status.label().to_string(),
            width: template.canvas.width,
            height: template.canvas.height,
            dpi: template.print.as_ref().map(|p| p.dpi),
            template_version: template.template_version.clone(),
            engine_version: ENGINE_VERSION.to_string(),
            job_hash,
            content_hash: sha256_hex(&png),
            warnings: report.warnings().cloned().collect(),
            png,
        };
        info!(
            format = %asset.format,
            width = asset.width,
            height = asset.height,
            bytes = asset.png.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered listing graphic"
        );
        Ok(asset)
    }
}

/// Every resource one render needs. Only the hero is required.
fn resource_requests(
    descriptor: &AssetDescriptor,
    template: &TemplateSpec,
    slots: &PhotoSlotAssignment,
) -> Vec<ResourceRequest> {
    let mut requests: Vec<_> = slots
        .photos()
        .enumerate()
        .map(|(i, photo)| ResourceRequest {
            photo: photo.clone(),
            required: i == 0,
        })
        .collect();
    let wants_logo = template.header.logo.is_some()
        || template.agent.as_ref().is_some_and(|agent| agent.logo_mark.is_some());
    if let Some(logo) = descriptor.logo.as_ref().filter(|_| wants_logo) {
        requests.push(ResourceRequest {
            photo: logo.clone(),
            required: false,
        });
    }
    if template.agent.is_some() {
        if let Some(photo) = descriptor.agent.as_ref().and_then(|agent| agent.photo.as_ref()) {
            requests.push(ResourceRequest {
                photo: photo.clone(),
                required: false,
            });
        }
    }
    requests
}

fn check_engine_version(template: &TemplateSpec) -> Result<(), RenderError> {
    let mismatch = || RenderError::EngineVersionMismatch {
        template: format!("{}@{}", template.id, template.template_version),
        required: template.engine_min_version.clone(),
        engine: ENGINE_VERSION.to_string(),
    };
    let engine = semver::Version::parse(ENGINE_VERSION).map_err(|_| mismatch())?;
    let required = semver::Version::parse(&template.engine_min_version).map_err(|_| mismatch())?;
    if engine < required {
        return Err(mismatch());
    }
    Ok(())
}
