//! Listing Graphics Core - marketing graphic composition engine
//!
//! Turns one listing descriptor into one fixed-size PNG.
//!
//! # Ground rules
//! 1. Templates are contracts: a format id always means the same canvas and regions
//! 2. Validation runs inside every render
//! 3. Only a missing hero photo or an unknown format aborts; everything else degrades
//! 4. Deterministic output: identical inputs yield identical bytes
//! 5. One render path for preview and download

pub mod compositor;
pub mod config;
pub mod descriptor;
pub mod geometry;
pub mod hashing;
pub mod icons;
pub mod loader;
pub mod pipeline;
pub mod print;
pub mod raster;
pub mod slots;
pub mod templates;
pub mod text;
pub mod validation;

pub use compositor::{ComposeError, TextLayout};
pub use config::{ConfigError, EngineConfig};
pub use descriptor::{AgentInfo, AssetDescriptor, ListingStatus, OpenHouse, PhotoRef};
pub use hashing::{canonical_json, compute_job_hash};
pub use loader::{Fetch, HttpFetcher, LoadError, ResolvedImage, ResourceLoader};
pub use pipeline::{RenderEngine, RenderError, RenderedAsset};
pub use print::PrintProfile;
pub use slots::{assign_slots, PhotoSelection, PhotoSlotAssignment, PhotoSuggestion};
pub use templates::{Layer, TemplateId, TemplateRegistry, TemplateSpec, UnknownTemplate};
pub use text::{fit_line, fit_wrapped, truncate, wrap, FittedText, TextMeasure, TruncationMode, WrappedTextBlock};
pub use validation::{ValidationResult, ValidationRule, ValidationViolation, ViolationSeverity};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
